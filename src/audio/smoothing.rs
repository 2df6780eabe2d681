//! One-pole parameter smoothing.
//!
//! Jumps in frequency or amplitude produce audible clicks, so the renderer
//! glides toward each new target with an exponential approach:
//!
//! ```text
//! y[n] = y[n-1] + coeff * (target - y[n-1]),   coeff = 1 - exp(-1 / (tau * fs))
//! ```

/// Exponential smoother advanced once per sample.
#[derive(Debug, Clone)]
pub struct OnePoleSmoother {
    value: f32,
    target: f32,
    coeff: f32,
}

impl OnePoleSmoother {
    /// Create a smoother resting at `initial`.
    ///
    /// A time constant of zero disables smoothing.
    pub fn new(initial: f32, time_constant_ms: f32, sample_rate: f32) -> Self {
        Self {
            value: initial,
            target: initial,
            coeff: Self::coefficient(time_constant_ms, sample_rate),
        }
    }

    fn coefficient(time_constant_ms: f32, sample_rate: f32) -> f32 {
        let samples = time_constant_ms * 0.001 * sample_rate;
        if samples <= 1.0 {
            return 1.0;
        }
        1.0 - (-1.0 / samples).exp()
    }

    /// Recompute the coefficient, keeping the current value and target.
    pub fn set_time_constant(&mut self, time_constant_ms: f32, sample_rate: f32) {
        self.coeff = Self::coefficient(time_constant_ms, sample_rate);
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump straight to `value` with no glide.
    pub fn snap_to(&mut self, value: f32) {
        self.value = value;
        self.target = value;
    }

    /// Advance one sample and return the smoothed value.
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        let next = self.value + self.coeff * (self.target - self.value);
        // A step below half an ulp rounds away; settle exactly instead.
        if next == self.value
            || (self.target - next).abs() <= 1.0e-6_f32.max(self.target.abs() * 1.0e-6)
        {
            self.value = self.target;
        } else {
            self.value = next;
        }
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        self.value == self.target
    }
}
