use std::time::Duration;

/// Lines that must be cleared for each speed-up step.
pub const LINES_PER_SPEED_STEP: usize = 3;

/// Speed-factor increase per step, before the difficulty multiplier.
const SPEED_STEP: f64 = 0.1;

/// Drop interval at speed factor 1.0.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(1);

/// The auto-drop interval never goes below this.
pub const MIN_DROP_INTERVAL: Duration = Duration::from_millis(100);

/// Auto-drop cadence.
///
/// The speed factor starts at 1.0 and grows by `0.1 × multiplier` for every
/// [`LINES_PER_SPEED_STEP`] lines cleared. The interval is the base interval
/// divided by the factor, clamped at [`MIN_DROP_INTERVAL`], so it only ever
/// shrinks as lines are cleared.
#[derive(Debug, Clone)]
pub struct SpeedModel {
    multiplier: f64,
    reference_interval: Duration,
    reference_factor: f64,
    floor: Duration,
    factor: f64,
    lines_at_last_step: usize,
}

impl SpeedModel {
    #[must_use]
    pub fn new(multiplier: f64, base_interval: Duration) -> Self {
        Self {
            multiplier,
            reference_interval: base_interval,
            reference_factor: 1.0,
            floor: MIN_DROP_INTERVAL.min(base_interval),
            factor: 1.0,
            lines_at_last_step: 0,
        }
    }

    /// Current speed factor; starts at 1.0.
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Current auto-drop interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        // The factor never decreases, so it is at the reference until the next step.
        if self.factor <= self.reference_factor {
            return self.reference_interval.max(self.floor);
        }
        self.reference_interval
            .mul_f64(self.reference_factor / self.factor)
            .max(self.floor)
    }

    /// Applies every speed step earned up to `total_lines`.
    ///
    /// Returns `true` when the factor changed.
    pub fn update(&mut self, total_lines: usize) -> bool {
        let mut changed = false;
        while total_lines >= self.lines_at_last_step + LINES_PER_SPEED_STEP {
            self.lines_at_last_step += LINES_PER_SPEED_STEP;
            self.factor += SPEED_STEP * self.multiplier;
            changed = true;
        }
        changed
    }

    /// Pins the current interval to `interval`; later steps keep shrinking it from there.
    pub fn override_interval(&mut self, interval: Duration) {
        self.reference_interval = interval;
        self.reference_factor = self.factor;
        self.floor = self.floor.min(interval);
    }

    /// Returns to factor 1.0 with the given base interval.
    pub fn reset(&mut self, base_interval: Duration) {
        *self = Self::new(self.multiplier, base_interval);
    }
}
