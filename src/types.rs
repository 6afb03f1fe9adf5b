//! Common types and data structures used across KeyDeck
//!
//! Image format descriptions reported by devices, key events travelling from
//! the device collaborator to the controller, and controller lifecycle state.

use crate::config::{MAX_KEY_IMAGE_SIZE, MAX_KEYS};
use crate::error::DeckError;

/// One color channel of an RGB pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    R,
    G,
    B,
}

/// Order in which the device firmware expects the three color channels
///
/// Always a permutation of `{R, G, B}`; construction validates this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelOrder([Channel; 3]);

impl ChannelOrder {
    pub const RGB: Self = Self([Channel::R, Channel::G, Channel::B]);
    pub const BGR: Self = Self([Channel::B, Channel::G, Channel::R]);

    pub fn new(order: [Channel; 3]) -> Result<Self, DeckError> {
        let [a, b, c] = order;
        if a == b || b == c || a == c {
            return Err(DeckError::InvalidFormat(
                "channel order must be a permutation of R, G, B",
            ));
        }
        Ok(Self(order))
    }

    /// Parse a three letter order such as `"BGR"`
    pub fn parse(order: &str) -> Result<Self, DeckError> {
        let mut channels = [Channel::R; 3];
        let mut chars = order.chars();
        for slot in channels.iter_mut() {
            *slot = match chars.next().map(|c| c.to_ascii_uppercase()) {
                Some('R') => Channel::R,
                Some('G') => Channel::G,
                Some('B') => Channel::B,
                _ => return Err(DeckError::InvalidFormat("channel order must be three of R, G, B")),
            };
        }
        if chars.next().is_some() {
            return Err(DeckError::InvalidFormat("channel order must be three of R, G, B"));
        }
        Self::new(channels)
    }

    pub fn channels(&self) -> [Channel; 3] {
        self.0
    }
}

/// How reordered channels are laid out in the transferred buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PixelLayout {
    /// Whole planes one after another, each row-major
    #[default]
    Planar,
    /// Three reordered bytes per pixel, row-major
    Interleaved,
}

/// Key image format reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyImageFormat {
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub layout: PixelLayout,
}

impl KeyImageFormat {
    pub const fn new(width: u32, height: u32, order: ChannelOrder) -> Self {
        Self {
            width,
            height,
            order,
            layout: PixelLayout::Planar,
        }
    }

    pub const fn with_layout(mut self, layout: PixelLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn validate(&self) -> Result<(), DeckError> {
        if self.width == 0 || self.height == 0 {
            return Err(DeckError::InvalidFormat("key image dimensions must be non-zero"));
        }
        if self.width > MAX_KEY_IMAGE_SIZE || self.height > MAX_KEY_IMAGE_SIZE {
            return Err(DeckError::InvalidFormat("key image dimensions too large"));
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of a rendered key image in bytes
    pub fn image_bytes(&self) -> usize {
        self.pixel_count() * 3
    }
}

/// A key transition delivered by the device collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    pub key: u8,
    pub pressed: bool,
}

impl KeyEvent {
    pub const fn pressed(key: u8) -> Self {
        Self { key, pressed: true }
    }

    pub const fn released(key: u8) -> Self {
        Self { key, pressed: false }
    }
}

/// Messages carried by the controller's event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeckEvent {
    Key(KeyEvent),
    /// The device connection was lost
    Disconnected,
}

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerState {
    Idle,
    Initialized,
    Running,
    /// Terminal; a fresh controller and device session is needed to run again
    Terminated,
}

/// Validate a device-reported key count
pub fn check_key_count(count: usize) -> Result<(), DeckError> {
    if count == 0 {
        return Err(DeckError::InvalidFormat("device reports no keys"));
    }
    if count > MAX_KEYS {
        return Err(DeckError::InvalidFormat("device reports more keys than supported"));
    }
    Ok(())
}

/// Current library version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_order_rejects_duplicates() {
        assert!(ChannelOrder::new([Channel::R, Channel::R, Channel::B]).is_err());
        assert!(ChannelOrder::new([Channel::G, Channel::B, Channel::G]).is_err());
        assert_eq!(
            ChannelOrder::new([Channel::B, Channel::G, Channel::R]).unwrap(),
            ChannelOrder::BGR
        );
    }

    #[test]
    fn test_channel_order_parse() {
        assert_eq!(ChannelOrder::parse("BGR").unwrap(), ChannelOrder::BGR);
        assert_eq!(ChannelOrder::parse("rgb").unwrap(), ChannelOrder::RGB);
        assert!(ChannelOrder::parse("RG").is_err());
        assert!(ChannelOrder::parse("RGBA").is_err());
        assert!(ChannelOrder::parse("RRB").is_err());
        assert!(ChannelOrder::parse("XYZ").is_err());
    }

    #[test]
    fn test_format_validation() {
        assert!(KeyImageFormat::new(72, 72, ChannelOrder::BGR).validate().is_ok());
        assert!(KeyImageFormat::new(0, 72, ChannelOrder::BGR).validate().is_err());
        assert!(KeyImageFormat::new(72, 0, ChannelOrder::BGR).validate().is_err());
        assert!(KeyImageFormat::new(4096, 72, ChannelOrder::BGR).validate().is_err());
        assert_eq!(KeyImageFormat::new(72, 72, ChannelOrder::BGR).image_bytes(), 72 * 72 * 3);
    }

    #[test]
    fn test_key_count_limits() {
        assert!(check_key_count(0).is_err());
        assert!(check_key_count(15).is_ok());
        assert!(check_key_count(MAX_KEYS).is_ok());
        assert!(check_key_count(MAX_KEYS + 1).is_err());
    }
}
