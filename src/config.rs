//! Runtime and compile-time configuration for KeyDeck
//!
//! Constants below are the defaults; [`DeckConfig`] carries the values a
//! session actually uses and can be loaded from TOML.

use embedded_graphics::mono_font::{iso_8859_1, MonoFont};
use embedded_graphics::pixelcolor::Rgb888;
use serde::{Deserialize, Serialize};

use crate::error::DeckError;

// ===================================================================
// Device Session Defaults
// ===================================================================

pub const DEFAULT_BRIGHTNESS: u8 = 30; // Percent, applied right after reset
pub const MAX_BRIGHTNESS: u8 = 100;
pub const DEVICE_IO_TIMEOUT_MS: u64 = 1000; // Bound for open and image transfer

// ===================================================================
// Key Layout Limits
// ===================================================================

pub const MAX_KEYS: usize = 32; // Largest deck (XL) has 32 keys
pub const MAX_KEY_IMAGE_SIZE: u32 = 256; // Per-side pixel limit accepted from a device
pub const LABEL_CAPACITY: usize = 32; // Bytes of UTF-8 stored per key label

// ===================================================================
// Label Rendering
// ===================================================================

pub const LABEL_ALPHA: u8 = 128; // ~50% white over the fill
pub const LABEL_ANCHOR: (i32, i32) = (0, 0); // Top-left corner of the text box
pub const LABEL_COLOR: Rgb888 = Rgb888::new(255, 255, 255);

// ===================================================================
// Key Press Feedback
// ===================================================================

pub const HIGHLIGHT_COLOR: [u8; 3] = [255, 0, 0];
pub const PRESS_MARKER: &str = "*";

// ===================================================================
// Event Delivery
// ===================================================================

pub const KEY_EVENT_QUEUE_DEPTH: usize = 16;

/// Monospace face used for key labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelFont {
    /// 6x10 glyphs
    Small,
    /// 7x14 glyphs, the 14px face keys are designed around
    #[default]
    Medium,
    /// 10x20 glyphs
    Large,
}

impl LabelFont {
    pub fn font(&self) -> &'static MonoFont<'static> {
        match self {
            LabelFont::Small => &iso_8859_1::FONT_6X10,
            LabelFont::Medium => &iso_8859_1::FONT_7X14,
            LabelFont::Large => &iso_8859_1::FONT_10X20,
        }
    }
}

/// Label overlay settings shared by every surface of a deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelStyle {
    pub font: LabelFont,
    pub alpha: u8,
    pub anchor: (i32, i32),
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font: LabelFont::default(),
            alpha: LABEL_ALPHA,
            anchor: LABEL_ANCHOR,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Brightness percentage applied after reset (0-100)
    pub brightness: u8,
    /// Timeout for device open and key image transfer, in milliseconds
    pub io_timeout_ms: u64,
    /// Fill color applied to a key when it is pressed
    pub highlight: [u8; 3],
    /// Label applied to a key when it is pressed
    pub press_marker: String,
    pub label: LabelStyle,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            brightness: DEFAULT_BRIGHTNESS,
            io_timeout_ms: DEVICE_IO_TIMEOUT_MS,
            highlight: HIGHLIGHT_COLOR,
            press_marker: PRESS_MARKER.into(),
            label: LabelStyle::default(),
        }
    }
}

impl DeckConfig {
    /// Parse and validate a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, DeckError> {
        let config: DeckConfig =
            toml::from_str(text).map_err(|e| DeckError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DeckError> {
        if self.brightness > MAX_BRIGHTNESS {
            return Err(DeckError::Config(format!(
                "brightness {} exceeds {}%",
                self.brightness, MAX_BRIGHTNESS
            )));
        }
        if self.io_timeout_ms == 0 {
            return Err(DeckError::Config("io_timeout_ms must be non-zero".into()));
        }
        if self.press_marker.len() > LABEL_CAPACITY {
            return Err(DeckError::Config(format!(
                "press_marker longer than {} bytes",
                LABEL_CAPACITY
            )));
        }
        Ok(())
    }

    pub fn highlight_color(&self) -> Rgb888 {
        let [r, g, b] = self.highlight;
        Rgb888::new(r, g, b)
    }

    pub fn io_timeout(&self) -> embassy_time::Duration {
        embassy_time::Duration::from_millis(self.io_timeout_ms)
    }
}
