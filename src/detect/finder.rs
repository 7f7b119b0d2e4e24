use std::collections::VecDeque;

use super::params::BaselinePolicy;

/// A run of above-threshold windows in one bin, in detector units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinPulse {
    /// Index of the first window of the run.
    pub onset_window: u64,
    /// Number of consecutive windows in the run.
    pub windows: usize,
    pub peak_power: f32,
    /// Baseline the run was measured against.
    pub baseline: f32,
    /// The stream ended before the power fell back below threshold.
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PulseRun {
    onset_window: u64,
    windows: usize,
    peak_power: f32,
    baseline: f32,
}

impl PulseRun {
    fn start(window: u64, power: f32, baseline: f32) -> Self {
        Self {
            onset_window: window,
            windows: 1,
            peak_power: power,
            baseline,
        }
    }

    fn extend(&mut self, power: f32) {
        self.windows += 1;
        self.peak_power = self.peak_power.max(power);
    }

    fn finish(self, truncated: bool) -> BinPulse {
        BinPulse {
            onset_window: self.onset_window,
            windows: self.windows,
            peak_power: self.peak_power,
            baseline: self.baseline,
            truncated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FinderState {
    Idle,
    /// Above threshold, but not yet for `min_windows` windows.
    Candidate(PulseRun),
    InPulse(PulseRun),
}

/// Adaptive threshold detector for the power sequence of one frequency bin.
///
/// A window is above threshold when its power is at least `margin` times the
/// mean of the last `span` baseline samples and at least `floor`. Runs of at
/// least `min_windows` such windows are reported once they end. Under
/// [`BaselinePolicy::Exclude`] a run keeps its windows out of the baseline
/// for at most `max_excluded` windows.
#[derive(Debug, Clone)]
pub struct BinPulseFinder {
    history: VecDeque<f32>,
    span: usize,
    margin: f32,
    floor: f32,
    min_windows: usize,
    max_excluded: usize,
    policy: BaselinePolicy,
    state: FinderState,
}

impl BinPulseFinder {
    pub fn new(
        span: usize,
        margin: f32,
        floor: f32,
        min_windows: usize,
        max_excluded: usize,
        policy: BaselinePolicy,
    ) -> Self {
        let span = span.max(1);
        let min_windows = min_windows.max(1);
        Self {
            history: VecDeque::with_capacity(span),
            span,
            margin,
            floor,
            min_windows,
            max_excluded: max_excluded.max(min_windows),
            policy,
            state: FinderState::Idle,
        }
    }

    /// Mean of the baseline history, once it holds `span` samples.
    pub fn baseline(&self) -> Option<f32> {
        if self.history.len() < self.span {
            return None;
        }
        Some(self.history.iter().sum::<f32>() / self.span as f32)
    }

    pub fn in_pulse(&self) -> bool {
        matches!(self.state, FinderState::InPulse(_))
    }

    /// Feed the power of window `window`. Returns a pulse when this window
    /// ends one.
    pub fn push(&mut self, window: u64, power: f32) -> Option<BinPulse> {
        let baseline = self.baseline();
        let above = match baseline {
            Some(b) => power >= b * self.margin && power >= self.floor,
            None => false,
        };

        let mut emitted = None;
        self.state = match (self.state, above) {
            (FinderState::Idle, false) => FinderState::Idle,
            (FinderState::Idle, true) => {
                let run = PulseRun::start(window, power, baseline.unwrap_or(0.0));
                self.promote(run)
            }
            (FinderState::Candidate(mut run), true) => {
                run.extend(power);
                self.promote(run)
            }
            (FinderState::Candidate(run), false) => {
                log::trace!(
                    "Rejected {}-window excursion at window {}",
                    run.windows,
                    run.onset_window
                );
                FinderState::Idle
            }
            (FinderState::InPulse(mut run), true) => {
                run.extend(power);
                FinderState::InPulse(run)
            }
            (FinderState::InPulse(run), false) => {
                emitted = Some(run.finish(false));
                FinderState::Idle
            }
        };

        if !above || self.policy == BaselinePolicy::Include || self.exclusion_expired() {
            if self.history.len() == self.span {
                self.history.pop_front();
            }
            self.history.push_back(power);
        }
        emitted
    }

    /// The current run has outlasted the exclusion cap, so its level is
    /// taken as the new floor.
    fn exclusion_expired(&self) -> bool {
        match self.state {
            FinderState::InPulse(run) if run.windows > self.max_excluded => {
                if run.windows == self.max_excluded + 1 {
                    log::debug!(
                        "Run at window {} passed {} windows, admitting it into the baseline",
                        run.onset_window,
                        self.max_excluded
                    );
                }
                true
            }
            _ => false,
        }
    }

    fn promote(&self, run: PulseRun) -> FinderState {
        if run.windows >= self.min_windows {
            FinderState::InPulse(run)
        } else {
            FinderState::Candidate(run)
        }
    }

    /// Close the stream. An active pulse is reported as truncated; a run
    /// still too short to count is dropped as noise.
    pub fn flush(&mut self) -> Option<BinPulse> {
        let state = std::mem::replace(&mut self.state, FinderState::Idle);
        match state {
            FinderState::InPulse(run) => Some(run.finish(true)),
            FinderState::Candidate(run) => {
                log::trace!("Dropped {}-window excursion at stream end", run.windows);
                None
            }
            FinderState::Idle => None,
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.state = FinderState::Idle;
    }
}
