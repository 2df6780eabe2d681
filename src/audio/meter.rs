//! Peak level meter with attack/release ballistics.
//!
//! Fed once per audio buffer with that buffer's absolute peak. The level
//! rises with the `attack` coefficient and falls with `release`, so bars jump
//! up quickly and decay smoothly. Input and level are both kept in [0, 1].

/// Absolute peak of an interleaved buffer, ignoring non-finite samples.
#[inline]
pub fn buffer_peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .filter(|s| s.is_finite())
        .fold(0.0_f32, |peak, s| peak.max(s.abs()))
}

#[derive(Debug, Clone)]
pub struct PeakMeter {
    level: f32,
    attack: f32,
    release: f32,
}

impl PeakMeter {
    pub fn new(attack: f32, release: f32) -> Self {
        Self {
            level: 0.0,
            attack: attack.clamp(0.0, 1.0),
            release: release.clamp(0.0, 1.0),
        }
    }

    /// Feed one buffer peak and return the updated level.
    #[inline]
    pub fn process(&mut self, peak: f32) -> f32 {
        let peak = if peak.is_finite() {
            peak.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let coeff = if peak > self.level {
            self.attack
        } else {
            self.release
        };
        self.level += coeff * (peak - self.level);
        if self.level < 1.0e-5 {
            self.level = 0.0;
        }
        self.level = self.level.clamp(0.0, 1.0);
        self.level
    }

    /// Convenience for `process(buffer_peak(samples))`.
    #[inline]
    pub fn process_buffer(&mut self, samples: &[f32]) -> f32 {
        self.process(buffer_peak(samples))
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_peak() {
        assert_eq!(buffer_peak(&[]), 0.0);
        assert_eq!(buffer_peak(&[0.1, -0.7, 0.3]), 0.7);
        assert_eq!(buffer_peak(&[f32::NAN, 0.2, f32::INFINITY]), 0.2);
    }

    #[test]
    fn test_attack_faster_than_release() {
        let mut meter = PeakMeter::new(0.8, 0.1);

        let risen = meter.process(1.0);
        assert!((risen - 0.8).abs() < 1e-6);

        let fallen = meter.process(0.0);
        assert!((fallen - 0.72).abs() < 1e-6);
        assert!(fallen > 0.5, "release should only pull the level down slightly");
    }

    #[test]
    fn test_level_stays_normalized() {
        let mut meter = PeakMeter::new(1.0, 1.0);
        assert_eq!(meter.process(4.0), 1.0);
        assert_eq!(meter.process(-3.0), 0.0);
        assert_eq!(meter.process(f32::NAN), 0.0);

        let mut meter = PeakMeter::new(0.5, 0.05);
        for i in 0..1_000 {
            let level = meter.process((i % 7) as f32 * 0.3);
            assert!((0.0..=1.0).contains(&level));
        }
    }

    #[test]
    fn test_decays_to_zero() {
        let mut meter = PeakMeter::new(1.0, 0.5);
        meter.process(1.0);
        for _ in 0..100 {
            meter.process(0.0);
        }
        assert_eq!(meter.level(), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut meter = PeakMeter::new(1.0, 0.1);
        meter.process_buffer(&[0.5, -0.9]);
        assert!((meter.level() - 0.9).abs() < 1e-6);
        meter.reset();
        assert_eq!(meter.level(), 0.0);
    }
}
