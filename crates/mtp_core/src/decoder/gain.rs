//! Per-track gain cells.
//!
//! Gain is the only state written from outside the coordinator's thread
//! (slider callbacks) while the poll tick reads it. Each track gets its own
//! atomic cell; there is no lock over the whole collection.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Clamp a gain to `[0, 1]`, mapping NaN to silence.
pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        0.0
    } else {
        gain.clamp(0.0, 1.0)
    }
}

/// Atomic gain value for one audio track, with a dirty flag that tells the
/// poll tick to push the new value to the decoder.
#[derive(Debug)]
pub struct TrackGain {
    bits: AtomicU32,
    dirty: AtomicBool,
}

impl TrackGain {
    pub fn new(gain: f32) -> Self {
        Self {
            bits: AtomicU32::new(clamp_gain(gain).to_bits()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Store a new gain and mark it for application.
    pub fn set(&self, gain: f32) {
        self.bits.store(clamp_gain(gain).to_bits(), Ordering::Release);
        self.dirty.store(true, Ordering::Release);
    }

    /// Store a gain that has already been applied to the decoder.
    pub(crate) fn set_applied(&self, gain: f32) {
        self.bits.store(clamp_gain(gain).to_bits(), Ordering::Release);
        self.dirty.store(false, Ordering::Release);
    }

    /// Take the pending gain, if it changed since the last take.
    pub fn take_dirty(&self) -> Option<f32> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            Some(self.get())
        } else {
            None
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

impl Default for TrackGain {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Thread-safe view over one session's gain cells.
///
/// Clone it into slider callbacks. Writes land in the cells and reach the
/// decoders on the next poll tick (or the next coordinator command).
#[derive(Debug, Clone, Default)]
pub struct GainControls {
    cells: Arc<Vec<Arc<TrackGain>>>,
}

impl GainControls {
    pub(crate) fn new(cells: Vec<Arc<TrackGain>>) -> Self {
        Self {
            cells: Arc::new(cells),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Set the gain of track `index`. Out-of-range indices are ignored and
    /// return `false`.
    pub fn set(&self, index: usize, gain: f32) -> bool {
        match self.cells.get(index) {
            Some(cell) => {
                cell.set(gain);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.cells.get(index).map(|c| c.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn clamps_and_marks_dirty() {
        let gain = TrackGain::new(0.5);
        assert!(!gain.is_dirty());

        gain.set(1.7);
        assert_eq!(gain.get(), 1.0);
        assert_eq!(gain.take_dirty(), Some(1.0));
        assert_eq!(gain.take_dirty(), None);

        gain.set(-0.3);
        assert_eq!(gain.get(), 0.0);
        gain.set(f32::NAN);
        assert_eq!(gain.get(), 0.0);
    }

    #[test]
    fn applied_gain_is_not_dirty() {
        let gain = TrackGain::new(0.2);
        gain.set(0.4);
        gain.set_applied(0.6);
        assert!(!gain.is_dirty());
        assert_eq!(gain.get(), 0.6);
    }

    #[test]
    fn controls_ignore_out_of_range() {
        let controls = GainControls::new(vec![Arc::new(TrackGain::new(0.5))]);
        assert!(controls.set(0, 0.25));
        assert!(!controls.set(3, 0.25));
        assert_eq!(controls.get(0), Some(0.25));
        assert_eq!(controls.get(3), None);
    }

    #[test]
    fn concurrent_writers_leave_a_valid_value() {
        let cells: Vec<Arc<TrackGain>> = (0..4).map(|_| Arc::new(TrackGain::new(0.5))).collect();
        let controls = GainControls::new(cells);

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let controls = controls.clone();
                thread::spawn(move || {
                    for step in 0..1000 {
                        controls.set(i, (step % 100) as f32 / 100.0);
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        for i in 0..4 {
            let g = controls.get(i).unwrap();
            assert!((0.0..=1.0).contains(&g));
            assert_eq!(g, 0.99);
        }
    }
}
