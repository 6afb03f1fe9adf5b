//! Device collaborator boundary
//!
//! The transport, firmware protocol and enumeration live outside this crate.
//! [`DeckDevice`] is what the controller needs from a driver; [`DeviceManager`]
//! is how candidates are found.

pub mod model;
pub mod simulated;

use log::{info, warn};
use thiserror::Error;

use crate::channels::KeyEventSender;
use crate::error::DeckError;
use crate::types::KeyImageFormat;

pub use model::{DeckModel, KeyLayout};
pub use simulated::{SimulatedDeck, SimulatedKeys, SimulatedManager, SimulatedProbe};

/// Failures reported by a device driver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device not found")]
    NotFound,
    #[error("device disconnected")]
    Disconnected,
    #[error("image for key {key} is {actual} bytes, expected {expected}")]
    InvalidImage {
        key: u8,
        expected: usize,
        actual: usize,
    },
    #[error("i/o error: {0}")]
    Io(String),
}

/// Operations the controller needs from a deck driver.
///
/// `open` and `set_key_image` may block on the transport and are awaited
/// under a timeout. The remaining commands are short and synchronous so that
/// they can also run from `Drop`.
#[allow(async_fn_in_trait)]
pub trait DeckDevice {
    /// Identification for logs
    fn name(&self) -> &str;

    async fn open(&mut self) -> Result<(), DeviceError>;

    /// Blank every key and restore firmware defaults
    fn reset(&mut self) -> Result<(), DeviceError>;

    fn close(&mut self) -> Result<(), DeviceError>;

    /// Set backlight brightness (0-100%)
    fn set_brightness(&mut self, percent: u8) -> Result<(), DeviceError>;

    fn key_count(&self) -> usize;

    fn key_image_format(&self) -> KeyImageFormat;

    /// Transfer a rendered key image; `image` is exactly
    /// `width * height * 3` bytes in the device's channel order.
    async fn set_key_image(&mut self, key: u8, image: &[u8]) -> Result<(), DeviceError>;

    /// Install the sink the driver reports key transitions to.
    ///
    /// Drivers may call the sender from any thread.
    fn register_key_callback(&mut self, sender: KeyEventSender);
}

/// Device discovery
pub trait DeviceManager {
    type Device: DeckDevice;

    fn enumerate(&mut self) -> Vec<Self::Device>;
}

/// Pick the only candidate, refusing to guess between several.
pub fn select_single<D: DeckDevice>(mut candidates: Vec<D>) -> Result<D, DeckError> {
    info!("Found {} deck(s)", candidates.len());
    match candidates.len() {
        0 => Err(DeckError::DeviceUnavailable("no deck found".into())),
        1 => Ok(candidates.remove(0)),
        count => {
            for device in &candidates {
                warn!("Candidate deck: {}", device.name());
            }
            Err(DeckError::DeviceBusy { count })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_single_requires_exactly_one() {
        let none: Vec<SimulatedDeck> = Vec::new();
        assert!(matches!(select_single(none), Err(DeckError::DeviceUnavailable(_))));

        let one = vec![SimulatedDeck::new(DeckModel::Original)];
        assert!(select_single(one).is_ok());

        let two = vec![
            SimulatedDeck::new(DeckModel::Original),
            SimulatedDeck::new(DeckModel::Original),
        ];
        assert!(matches!(select_single(two), Err(DeckError::DeviceBusy { count: 2 })));
    }
}
