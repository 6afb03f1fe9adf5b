//! In-memory deck
//!
//! Behaves like a connected deck without any transport: records every
//! command it receives, keeps the last image per key, and lets tests or the
//! demo binary press keys from any thread. Faults can be injected to exercise
//! error paths.

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Timer;
use log::{debug, info};

use super::{DeckDevice, DeckModel, DeviceError, DeviceManager};
use crate::channels::KeyEventSender;
use crate::types::KeyImageFormat;

/// Faults a simulated deck can be told to produce
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedFaults {
    pub fail_open: bool,
    pub fail_reset: bool,
    pub fail_transfer: bool,
    /// Latency before `open` completes
    pub open_delay_ms: u64,
    /// Latency added to every key image transfer
    pub transfer_delay_ms: u64,
}

#[derive(Default)]
struct SimState {
    is_open: bool,
    connected: bool,
    open_calls: usize,
    reset_calls: usize,
    close_calls: usize,
    brightness: Option<u8>,
    images: Vec<Option<Vec<u8>>>,
    transfers: usize,
    sender: Option<KeyEventSender>,
    faults: SimulatedFaults,
}

type Shared = Arc<Mutex<CriticalSectionRawMutex, RefCell<SimState>>>;

pub struct SimulatedDeck {
    name: String,
    key_count: usize,
    format: KeyImageFormat,
    shared: Shared,
}

impl SimulatedDeck {
    pub fn new(model: DeckModel) -> Self {
        info!(
            "Simulating {} ({:04x}:{:04x})",
            model.device_name(),
            DeckModel::VENDOR_ID,
            model.pid()
        );
        Self::with_format(model.device_name(), model.key_count(), model.key_image_format())
    }

    /// A deck reporting an arbitrary key count and image format
    pub fn with_format(name: impl Into<String>, key_count: usize, format: KeyImageFormat) -> Self {
        let state = SimState {
            connected: true,
            images: vec![None; key_count],
            ..SimState::default()
        };
        Self {
            name: name.into(),
            key_count,
            format,
            shared: Arc::new(Mutex::new(RefCell::new(state))),
        }
    }

    pub fn with_faults(self, faults: SimulatedFaults) -> Self {
        self.shared.lock(|s| s.borrow_mut().faults = faults);
        self
    }

    /// Handle for producing key events
    pub fn keys(&self) -> SimulatedKeys {
        SimulatedKeys {
            shared: self.shared.clone(),
        }
    }

    /// Handle for inspecting what the deck received
    pub fn probe(&self) -> SimulatedProbe {
        SimulatedProbe {
            shared: self.shared.clone(),
        }
    }
}

impl DeckDevice for SimulatedDeck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> Result<(), DeviceError> {
        let delay_ms = self.shared.lock(|s| s.borrow().faults.open_delay_ms);
        if delay_ms > 0 {
            Timer::after_millis(delay_ms).await;
        }

        self.shared.lock(|s| {
            let mut s = s.borrow_mut();
            s.open_calls += 1;
            if s.faults.fail_open || !s.connected {
                return Err(DeviceError::NotFound);
            }
            s.is_open = true;
            info!("Simulated deck '{}' opened", self.name);
            Ok(())
        })
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        self.shared.lock(|s| {
            let mut s = s.borrow_mut();
            s.reset_calls += 1;
            if s.faults.fail_reset {
                return Err(DeviceError::Io("reset rejected".into()));
            }
            if !s.is_open || !s.connected {
                return Err(DeviceError::Disconnected);
            }
            s.images.iter_mut().for_each(|image| *image = None);
            Ok(())
        })
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.shared.lock(|s| {
            let mut s = s.borrow_mut();
            s.close_calls += 1;
            s.is_open = false;
        });
        info!("Simulated deck '{}' closed", self.name);
        Ok(())
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), DeviceError> {
        self.shared.lock(|s| {
            let mut s = s.borrow_mut();
            if !s.is_open || !s.connected {
                return Err(DeviceError::Disconnected);
            }
            s.brightness = Some(percent.min(100));
            Ok(())
        })
    }

    fn key_count(&self) -> usize {
        self.key_count
    }

    fn key_image_format(&self) -> KeyImageFormat {
        self.format
    }

    async fn set_key_image(&mut self, key: u8, image: &[u8]) -> Result<(), DeviceError> {
        let delay_ms = self.shared.lock(|s| s.borrow().faults.transfer_delay_ms);
        if delay_ms > 0 {
            Timer::after_millis(delay_ms).await;
        }

        let expected = self.format.image_bytes();
        self.shared.lock(|s| -> Result<(), DeviceError> {
            let mut s = s.borrow_mut();
            if !s.is_open || !s.connected {
                return Err(DeviceError::Disconnected);
            }
            if s.faults.fail_transfer {
                return Err(DeviceError::Io("transfer rejected".into()));
            }
            if image.len() != expected {
                return Err(DeviceError::InvalidImage {
                    key,
                    expected,
                    actual: image.len(),
                });
            }
            let slot = s
                .images
                .get_mut(key as usize)
                .ok_or_else(|| DeviceError::Io(format!("no key {}", key)))?;
            *slot = Some(image.to_vec());
            s.transfers += 1;
            Ok(())
        })
    }

    fn register_key_callback(&mut self, sender: KeyEventSender) {
        self.shared.lock(|s| s.borrow_mut().sender = Some(sender));
    }
}

/// Presses keys on a simulated deck. Cloneable and usable from any thread.
#[derive(Clone)]
pub struct SimulatedKeys {
    shared: Shared,
}

impl SimulatedKeys {
    /// Returns false if no callback is registered or the event was dropped
    pub fn press(&self, key: u8) -> bool {
        self.deliver(|sender| sender.key_changed(key, true))
    }

    pub fn release(&self, key: u8) -> bool {
        self.deliver(|sender| sender.key_changed(key, false))
    }

    pub fn tap(&self, key: u8) -> bool {
        self.press(key) && self.release(key)
    }

    /// Drop the connection; later transfers fail with `Disconnected`
    pub fn disconnect(&self) -> bool {
        self.shared.lock(|s| s.borrow_mut().connected = false);
        self.deliver(|sender| sender.disconnected())
    }

    fn deliver(&self, send: impl FnOnce(&KeyEventSender) -> bool) -> bool {
        // Clone out so the channel is never touched under the device lock
        let sender = self.shared.lock(|s| s.borrow().sender.clone());
        match sender {
            Some(sender) => send(&sender),
            None => {
                debug!("No key callback registered, event discarded");
                false
            }
        }
    }
}

/// Read-only view of what a simulated deck has received, plus fault control
#[derive(Clone)]
pub struct SimulatedProbe {
    shared: Shared,
}

impl SimulatedProbe {
    pub fn is_open(&self) -> bool {
        self.shared.lock(|s| s.borrow().is_open)
    }

    pub fn open_calls(&self) -> usize {
        self.shared.lock(|s| s.borrow().open_calls)
    }

    pub fn reset_calls(&self) -> usize {
        self.shared.lock(|s| s.borrow().reset_calls)
    }

    pub fn close_calls(&self) -> usize {
        self.shared.lock(|s| s.borrow().close_calls)
    }

    pub fn brightness(&self) -> Option<u8> {
        self.shared.lock(|s| s.borrow().brightness)
    }

    /// Number of successful key image transfers
    pub fn transfers(&self) -> usize {
        self.shared.lock(|s| s.borrow().transfers)
    }

    /// Last image transferred to `key` since the previous reset
    pub fn image(&self, key: u8) -> Option<Vec<u8>> {
        self.shared
            .lock(|s| s.borrow().images.get(key as usize).cloned().flatten())
    }

    pub fn has_callback(&self) -> bool {
        self.shared.lock(|s| s.borrow().sender.is_some())
    }

    pub fn set_faults(&self, faults: SimulatedFaults) {
        self.shared.lock(|s| s.borrow_mut().faults = faults);
    }
}

/// Enumerates a fixed set of simulated decks
pub struct SimulatedManager {
    decks: Vec<SimulatedDeck>,
}

impl SimulatedManager {
    pub fn new(decks: Vec<SimulatedDeck>) -> Self {
        Self { decks }
    }
}

impl DeviceManager for SimulatedManager {
    type Device = SimulatedDeck;

    fn enumerate(&mut self) -> Vec<SimulatedDeck> {
        core::mem::take(&mut self.decks)
    }
}
