use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::error::DetectorError;

/// Forward FFT of tapered windows, reduced to power in the monitored bins.
///
/// Power is `|X[k]|^2 * power_scale` with `power_scale = 2 / (sum w)^2`, so a
/// bin-centred sinusoid of amplitude `A` reads as its mean square `A^2 / 2`.
pub struct SpectralPowerEngine {
    size: usize,
    bins: RangeInclusive<usize>,
    power_scale: f32,
    planner: FftPlanner<f32>,
    plans: HashMap<(usize, usize), Arc<dyn Fft<f32>>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    power: Vec<f32>,
}

impl SpectralPowerEngine {
    pub fn new(taper: &[f32], bins: RangeInclusive<usize>) -> Self {
        let size = taper.len();
        let taper_sum: f32 = taper.iter().sum();
        let power = vec![0.0; bins.clone().count()];
        Self {
            size,
            bins,
            power_scale: 2.0 / (taper_sum * taper_sum),
            planner: FftPlanner::new(),
            plans: HashMap::new(),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: Vec::new(),
            power,
        }
    }

    /// Plans prepared so far.
    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    /// Power of each monitored bin, first bin first. The slice is
    /// overwritten by the next call.
    pub fn transform(&mut self, window: &[f32], phase: usize) -> Result<&[f32], DetectorError> {
        if window.len() != self.size {
            return Err(DetectorError::Transform {
                phase,
                reason: format!("window has {} samples, plan expects {}", window.len(), self.size),
            });
        }

        let size = self.size;
        let planner = &mut self.planner;
        let fft = self
            .plans
            .entry((size, phase))
            .or_insert_with(|| {
                log::debug!("Preparing {}-point FFT plan for phase {}", size, phase);
                planner.plan_fft_forward(size)
            })
            .clone();

        let scratch_len = fft.get_inplace_scratch_len();
        if self.scratch.len() < scratch_len {
            self.scratch.resize(scratch_len, Complex::new(0.0, 0.0));
        }

        for (slot, &sample) in self.buffer.iter_mut().zip(window) {
            *slot = Complex::new(sample, 0.0);
        }
        fft.process_with_scratch(&mut self.buffer, &mut self.scratch[..scratch_len]);

        let scale = self.power_scale;
        for (out, bin) in self.power.iter_mut().zip(self.bins.clone()) {
            *out = self.buffer[bin].norm_sqr() * scale;
        }
        Ok(&self.power)
    }
}
