//! Key press tracking
//!
//! Devices report every transition; this keeps the last known state of each
//! key so the controller can tell real changes from repeated reports.

use crate::config::MAX_KEYS;

/// Pressed state of every key on a deck
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyStates {
    /// true if pressed, false if released
    keys: [bool; MAX_KEYS],
    /// Number of keys on this device
    active_count: usize,
}

impl KeyStates {
    /// All keys released
    pub fn new(active_count: usize) -> Self {
        Self {
            keys: [false; MAX_KEYS],
            active_count: active_count.min(MAX_KEYS),
        }
    }

    pub fn is_pressed(&self, key: usize) -> bool {
        key < self.active_count && self.keys[key]
    }

    /// Record a transition, returning whether the state actually changed.
    ///
    /// Out-of-range keys are never recorded.
    pub fn set(&mut self, key: usize, pressed: bool) -> bool {
        if key < self.active_count && self.keys[key] != pressed {
            self.keys[key] = pressed;
            true
        } else {
            false
        }
    }

    pub fn pressed_count(&self) -> usize {
        self.keys[..self.active_count].iter().filter(|k| **k).count()
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_released() {
        let states = KeyStates::new(6);
        assert_eq!(states.active_count(), 6);
        assert_eq!(states.pressed_count(), 0);
        assert!(!states.is_pressed(0));
    }

    #[test]
    fn test_transition_reports_change_once() {
        let mut states = KeyStates::new(6);
        assert!(states.set(2, true));
        assert!(!states.set(2, true));
        assert!(states.is_pressed(2));
        assert!(states.set(2, false));
        assert!(!states.is_pressed(2));
    }

    #[test]
    fn test_out_of_range_ignored() {
        let mut states = KeyStates::new(6);
        assert!(!states.set(6, true));
        assert!(!states.is_pressed(6));
        assert!(!states.is_pressed(100));
        assert_eq!(states.pressed_count(), 0);
    }

    #[test]
    fn test_clamps_to_max_keys() {
        assert_eq!(KeyStates::new(100).active_count(), MAX_KEYS);
    }
}
