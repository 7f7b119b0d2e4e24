use anyhow::{bail, Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded two-channel recording, one vector per channel.
pub struct StereoAudio {
    pub channels: [Vec<f32>; 2],
    pub sample_rate: u32,
}

impl StereoAudio {
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f32 {
        self.len() as f32 / self.sample_rate as f32
    }

    /// Block-sized slices of both channels, in stream order. The last block
    /// may be short.
    pub fn blocks(&self, block_size: usize) -> impl Iterator<Item = [&[f32]; 2]> {
        self.channels[0]
            .chunks(block_size)
            .zip(self.channels[1].chunks(block_size))
            .map(|(left, right)| [left, right])
    }
}

pub fn decode_stereo(path: &Path) -> Result<StereoAudio> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    if let Some(channels) = track.codec_params.channels {
        if channels.count() != 2 {
            bail!(
                "{} has {} channels, pulse detection needs exactly 2",
                path.display(),
                channels.count()
            );
        }
    }
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(err)) => {
                log::warn!("Skipping undecodable packet: {}", err);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if spec.channels.count() != 2 {
            bail!(
                "{} has {} channels, pulse detection needs exactly 2",
                path.display(),
                spec.channels.count()
            );
        }
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        for frame in sample_buf.samples().chunks_exact(2) {
            left.push(frame[0]);
            right.push(frame[1]);
        }
    }

    log::info!(
        "Decoded {}: {} frames, {}Hz, {:.1}s",
        path.display(),
        left.len(),
        sample_rate,
        left.len() as f32 / sample_rate as f32
    );

    Ok(StereoAudio {
        channels: [left, right],
        sample_rate,
    })
}
