//! Event channel between the device collaborator and the controller
//!
//! The collaborator delivers key transitions from its own I/O threads; they
//! are queued here and consumed one at a time by the controller loop.
//!
//! Key events travel through a bounded queue. Device loss and presses that
//! find the queue full are latched beside it and raised through a signal, so
//! the controller always sees them even when the queue is saturated.

use core::cell::RefCell;
use std::sync::Arc;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::signal::Signal;
use log::warn;

use crate::config::{KEY_EVENT_QUEUE_DEPTH, MAX_KEYS};
use crate::types::{DeckEvent, KeyEvent};

/// Events that bypassed the queue
#[derive(Clone, Copy, Default)]
struct Latched {
    disconnected: bool,
    /// One bit per key pressed while the queue was full
    presses: u32,
}

/// Device events for the controller
/// Buffer size: 16 (absorbs bursts while a key image is transferring)
pub struct DeckEventChannel {
    keys: Channel<CriticalSectionRawMutex, KeyEvent, KEY_EVENT_QUEUE_DEPTH>,
    latched: Mutex<CriticalSectionRawMutex, RefCell<Latched>>,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl DeckEventChannel {
    pub fn new() -> Self {
        Self {
            keys: Channel::new(),
            latched: Mutex::new(RefCell::new(Latched::default())),
            wake: Signal::new(),
        }
    }

    /// Next event without waiting.
    ///
    /// Device loss comes first, then queued key events in arrival order,
    /// then presses latched on overflow (lowest key first).
    pub fn try_receive(&self) -> Option<DeckEvent> {
        if self.take_disconnect() {
            return Some(DeckEvent::Disconnected);
        }
        if let Ok(event) = self.keys.try_receive() {
            return Some(DeckEvent::Key(event));
        }
        self.take_latched_press()
            .map(|key| DeckEvent::Key(KeyEvent::pressed(key)))
    }

    /// Wait for the next event
    pub async fn receive(&self) -> DeckEvent {
        loop {
            if let Some(event) = self.try_receive() {
                return event;
            }
            match select(self.keys.receive(), self.wake.wait()).await {
                Either::First(event) => return DeckEvent::Key(event),
                Either::Second(()) => {}
            }
        }
    }

    fn push_key(&self, event: KeyEvent) -> bool {
        match self.keys.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) if event.pressed && (event.key as usize) < MAX_KEYS => {
                warn!("Event queue full, latching press of key {}", event.key);
                self.latched
                    .lock(|l| l.borrow_mut().presses |= 1 << event.key);
                self.wake.signal(());
                true
            }
            Err(TrySendError::Full(event)) => {
                warn!("Event queue full, dropping {:?}", event);
                false
            }
        }
    }

    fn push_disconnect(&self) {
        self.latched.lock(|l| l.borrow_mut().disconnected = true);
        self.wake.signal(());
    }

    fn take_disconnect(&self) -> bool {
        self.latched.lock(|l| {
            let mut l = l.borrow_mut();
            core::mem::take(&mut l.disconnected)
        })
    }

    fn take_latched_press(&self) -> Option<u8> {
        self.latched.lock(|l| {
            let mut l = l.borrow_mut();
            if l.presses == 0 {
                return None;
            }
            let key = l.presses.trailing_zeros();
            l.presses &= !(1 << key);
            Some(key as u8)
        })
    }
}

impl Default for DeckEventChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle the device collaborator uses to report events.
///
/// Sending never blocks. When the queue is full a press is latched and
/// delivered once the queue drains; a release is dropped with a warning.
#[derive(Clone)]
pub struct KeyEventSender {
    channel: Arc<DeckEventChannel>,
}

impl KeyEventSender {
    pub fn new(channel: Arc<DeckEventChannel>) -> Self {
        Self { channel }
    }

    /// Report a key transition. Returns false if the event was dropped.
    pub fn key_changed(&self, key: u8, pressed: bool) -> bool {
        self.channel.push_key(KeyEvent { key, pressed })
    }

    /// Report that the device connection was lost. Never dropped.
    pub fn disconnected(&self) -> bool {
        self.channel.push_disconnect();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    fn fill(sender: &KeyEventSender, key: u8) {
        for _ in 0..KEY_EVENT_QUEUE_DEPTH {
            assert!(sender.key_changed(key, true));
        }
    }

    #[test]
    fn test_sender_queues_in_order() {
        let channel = Arc::new(DeckEventChannel::new());
        let sender = KeyEventSender::new(channel.clone());

        assert!(sender.key_changed(1, true));
        assert!(sender.key_changed(1, false));
        assert!(sender.key_changed(2, true));

        assert_eq!(channel.try_receive(), Some(DeckEvent::Key(KeyEvent::pressed(1))));
        assert_eq!(channel.try_receive(), Some(DeckEvent::Key(KeyEvent::released(1))));
        assert_eq!(channel.try_receive(), Some(DeckEvent::Key(KeyEvent::pressed(2))));
        assert_eq!(channel.try_receive(), None);
    }

    #[test]
    fn test_full_queue_drops_release_only() {
        let channel = Arc::new(DeckEventChannel::new());
        let sender = KeyEventSender::new(channel.clone());
        fill(&sender, 0);
        assert!(!sender.key_changed(0, false));
        assert!(!sender.key_changed(MAX_KEYS as u8, true));
    }

    #[test]
    fn test_press_on_full_queue_is_latched() {
        let channel = Arc::new(DeckEventChannel::new());
        let sender = KeyEventSender::new(channel.clone());
        fill(&sender, 0);
        assert!(sender.key_changed(4, true));
        assert!(sender.key_changed(3, true));

        for _ in 0..KEY_EVENT_QUEUE_DEPTH {
            assert_eq!(channel.try_receive(), Some(DeckEvent::Key(KeyEvent::pressed(0))));
        }
        assert_eq!(channel.try_receive(), Some(DeckEvent::Key(KeyEvent::pressed(3))));
        assert_eq!(channel.try_receive(), Some(DeckEvent::Key(KeyEvent::pressed(4))));
        assert_eq!(channel.try_receive(), None);
    }

    #[test]
    fn test_disconnect_delivered_past_full_queue() {
        let channel = Arc::new(DeckEventChannel::new());
        let sender = KeyEventSender::new(channel.clone());
        fill(&sender, 0);
        assert!(sender.disconnected());

        assert_eq!(block_on(channel.receive()), DeckEvent::Disconnected);
        assert_eq!(channel.try_receive(), Some(DeckEvent::Key(KeyEvent::pressed(0))));
    }

    #[test]
    fn test_receive_wakes_on_other_thread_send() {
        let channel = Arc::new(DeckEventChannel::new());
        let sender = KeyEventSender::new(channel.clone());
        let producer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            sender.key_changed(4, true);
        });
        assert_eq!(block_on(channel.receive()), DeckEvent::Key(KeyEvent::pressed(4)));
        producer.join().unwrap();

        let sender = KeyEventSender::new(channel.clone());
        let producer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            sender.disconnected();
        });
        assert_eq!(block_on(channel.receive()), DeckEvent::Disconnected);
        producer.join().unwrap();
    }
}
