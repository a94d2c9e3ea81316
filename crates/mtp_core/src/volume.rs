//! Volume slider to decoder gain mapping.
//!
//! The slider runs `0..=slider_max` (200 by default) and maps linearly to a
//! gain in `[0, 1]`. The reference slider value (100) gives gain 0.5, which
//! is the baseline loudness of the boosted extract. Going above the
//! reference amplifies, going below attenuates.

use std::collections::BTreeMap;

use crate::config::VolumeSettings;
use crate::decoder::clamp_gain;

/// Fixed, monotonic slider/gain mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeMapper {
    slider_max: u32,
    slider_reference: u32,
}

impl VolumeMapper {
    pub fn new(slider_max: u32, slider_reference: u32) -> Self {
        let slider_max = slider_max.max(1);
        Self {
            slider_max,
            slider_reference: slider_reference.min(slider_max),
        }
    }

    pub fn from_settings(settings: &VolumeSettings) -> Self {
        Self::new(settings.slider_max, settings.slider_reference)
    }

    pub fn slider_max(&self) -> u32 {
        self.slider_max
    }

    pub fn slider_reference(&self) -> u32 {
        self.slider_reference
    }

    /// Gain for a slider value. Values above the range saturate at 1.0.
    pub fn gain(&self, slider: u32) -> f32 {
        slider.min(self.slider_max) as f32 / self.slider_max as f32
    }

    /// Nearest slider value for a gain.
    pub fn slider(&self, gain: f32) -> u32 {
        (clamp_gain(gain) * self.slider_max as f32).round() as u32
    }

    /// Gain that reproduces the extract's loudness unchanged.
    pub fn baseline_gain(&self) -> f32 {
        self.gain(self.slider_reference)
    }

    /// Linear multiplier relative to baseline, for offline mixing.
    ///
    /// Reference gives 1.0, the top of the slider gives
    /// `slider_max / slider_reference`.
    pub fn export_multiplier(&self, gain: f32) -> f64 {
        let baseline = self.baseline_gain() as f64;
        let gain = clamp_gain(gain) as f64;
        if baseline <= 0.0 {
            gain
        } else {
            gain / baseline
        }
    }

    /// Initial gains for `track_count` tracks.
    ///
    /// Remembered slider values are keyed by track index; tracks without
    /// one start at baseline.
    pub fn initial_gains(&self, track_count: usize, remembered: &BTreeMap<usize, u32>) -> Vec<f32> {
        (0..track_count)
            .map(|i| {
                remembered
                    .get(&i)
                    .map(|s| self.gain(*s))
                    .unwrap_or_else(|| self.baseline_gain())
            })
            .collect()
    }
}

impl Default for VolumeMapper {
    fn default() -> Self {
        Self::from_settings(&VolumeSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_silence_and_reference_is_baseline() {
        let mapper = VolumeMapper::default();
        assert_eq!(mapper.gain(0), 0.0);
        assert_eq!(mapper.gain(100), 0.5);
        assert_eq!(mapper.baseline_gain(), 0.5);
        assert_eq!(mapper.gain(200), 1.0);
    }

    #[test]
    fn mapping_is_monotonic() {
        let mapper = VolumeMapper::default();
        let gains: Vec<f32> = (0..=mapper.slider_max()).map(|s| mapper.gain(s)).collect();
        assert!(gains.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(mapper.gain(500), 1.0);
    }

    #[test]
    fn slider_round_trips_through_gain() {
        let mapper = VolumeMapper::default();
        for slider in [0, 1, 73, 100, 150, 200] {
            assert_eq!(mapper.slider(mapper.gain(slider)), slider);
        }
    }

    #[test]
    fn export_multiplier_is_relative_to_baseline() {
        let mapper = VolumeMapper::default();
        assert!((mapper.export_multiplier(mapper.gain(100)) - 1.0).abs() < 1e-6);
        assert!((mapper.export_multiplier(mapper.gain(200)) - 2.0).abs() < 1e-6);
        assert!((mapper.export_multiplier(mapper.gain(50)) - 0.5).abs() < 1e-6);
        assert_eq!(mapper.export_multiplier(0.0), 0.0);
    }

    #[test]
    fn initial_gains_use_remembered_values() {
        let mapper = VolumeMapper::default();
        let remembered = BTreeMap::from([(1, 200), (7, 0)]);
        assert_eq!(mapper.initial_gains(3, &remembered), vec![0.5, 1.0, 0.5]);
        assert!(mapper.initial_gains(0, &remembered).is_empty());
    }

    #[test]
    fn degenerate_ranges_are_sanitized() {
        let mapper = VolumeMapper::new(0, 10);
        assert_eq!(mapper.slider_max(), 1);
        assert_eq!(mapper.slider_reference(), 1);
        assert_eq!(mapper.gain(0), 0.0);
    }
}
