/// One channel/phase accumulation buffer. Storage is allocated once and
/// rewritten in place for every window.
#[derive(Debug, Clone)]
struct PhaseBuffer {
    samples: Vec<f32>,
    filled: usize,
}

/// Tapers incoming samples into per channel x phase buffers.
///
/// Phase `p` starts accepting samples `p * size / 2` samples into the stream,
/// so with two phases the completed windows interleave into a single
/// sequence with a hop of half a window.
#[derive(Debug, Clone)]
pub struct Windower {
    taper: Vec<f32>,
    channels: usize,
    phases: usize,
    buffers: Vec<PhaseBuffer>, // channel-major: channel * phases + phase
    seen: usize,
}

impl Windower {
    pub fn new(size: usize, channels: usize, phases: usize) -> Self {
        let buffers = (0..channels * phases)
            .map(|_| PhaseBuffer {
                samples: vec![0.0; size],
                filled: 0,
            })
            .collect();
        Self {
            taper: hann_window(size),
            channels,
            phases,
            buffers,
            seen: 0,
        }
    }

    pub fn taper(&self) -> &[f32] {
        &self.taper
    }

    /// Push one sample per channel. Returns the phase whose window this
    /// sample completed; its contents stay readable through
    /// [`window`](Self::window) until the next push.
    pub fn push(&mut self, frame: &[f32]) -> Option<usize> {
        debug_assert_eq!(frame.len(), self.channels);
        let size = self.taper.len();
        let mut ready = None;
        for phase in 0..self.phases {
            if self.seen < phase * size / 2 {
                continue;
            }
            let mut pos = 0;
            for (channel, &sample) in frame.iter().enumerate() {
                let buf = &mut self.buffers[channel * self.phases + phase];
                pos = buf.filled;
                buf.samples[pos] = sample * self.taper[pos];
                buf.filled += 1;
                if buf.filled == size {
                    buf.filled = 0;
                }
            }
            if pos + 1 == size {
                ready = Some(phase);
            }
        }
        self.seen += 1;
        ready
    }

    pub fn window(&self, channel: usize, phase: usize) -> &[f32] {
        &self.buffers[channel * self.phases + phase].samples
    }

    /// Samples waiting in the given phase buffer.
    pub fn pending(&self, channel: usize, phase: usize) -> usize {
        self.buffers[channel * self.phases + phase].filled
    }

    /// Empty every buffer without releasing storage.
    pub fn reset(&mut self) {
        for buf in &mut self.buffers {
            buf.filled = 0;
        }
        self.seen = 0;
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_positions(windower: &mut Windower, samples: usize) -> Vec<(usize, usize)> {
        (0..samples)
            .filter_map(|n| windower.push(&[1.0, -1.0]).map(|phase| (n, phase)))
            .collect()
    }

    #[test]
    fn single_phase_fires_every_window() {
        let mut windower = Windower::new(8, 2, 1);
        assert_eq!(ready_positions(&mut windower, 24), vec![(7, 0), (15, 0), (23, 0)]);
    }

    #[test]
    fn two_phases_interleave_at_half_window() {
        let mut windower = Windower::new(8, 2, 2);
        assert_eq!(
            ready_positions(&mut windower, 24),
            vec![(7, 0), (11, 1), (15, 0), (19, 1), (23, 0)]
        );
    }

    #[test]
    fn window_holds_tapered_samples() {
        let mut windower = Windower::new(8, 2, 1);
        ready_positions(&mut windower, 8);
        let taper = windower.taper().to_vec();
        assert_eq!(windower.window(0, 0), taper.as_slice());
        let negated: Vec<f32> = taper.iter().map(|w| -w).collect();
        assert_eq!(windower.window(1, 0), negated.as_slice());
    }

    #[test]
    fn taper_is_symmetric_with_zero_ends() {
        let taper = hann_window(16);
        assert_eq!(taper[0], 0.0);
        for i in 0..8 {
            assert!((taper[i] - taper[15 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn reset_discards_partial_windows() {
        let mut windower = Windower::new(8, 2, 2);
        ready_positions(&mut windower, 13);
        assert_eq!(windower.pending(0, 0), 5);
        assert_eq!(windower.pending(0, 1), 1);
        windower.reset();
        assert_eq!(windower.pending(0, 0), 0);
        assert_eq!(windower.pending(1, 1), 0);
        assert_eq!(ready_positions(&mut windower, 8), vec![(7, 0)]);
    }
}
