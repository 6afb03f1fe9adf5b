//! Known deck models
//!
//! Only raw-bitmap decks are listed; JPEG models need a different pipeline.
//! The Mini panels are mounted rotated, which their driver undoes after the
//! mirrored BGR buffer arrives.

use crate::types::{ChannelOrder, KeyImageFormat, PixelLayout};

/// Key grid of a deck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLayout {
    pub cols: usize,
    pub rows: usize,
    /// Total number of keys (cols * rows)
    pub total_keys: usize,
}

impl KeyLayout {
    pub const fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            total_keys: cols * rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeckModel {
    /// StreamDeck Original, 15 keys (PID: 0x0060)
    Original,
    /// StreamDeck Mini, 6 keys (PID: 0x0063)
    Mini,
    /// StreamDeck Revised Mini, 6 keys (PID: 0x0090)
    RevisedMini,
}

impl DeckModel {
    pub const VENDOR_ID: u16 = 0x0fd9; // Elgato Systems

    /// Get model by USB PID
    pub fn from_pid(pid: u16) -> Option<Self> {
        match pid {
            0x0060 => Some(DeckModel::Original),
            0x0063 => Some(DeckModel::Mini),
            0x0090 => Some(DeckModel::RevisedMini),
            _ => None,
        }
    }

    pub fn pid(&self) -> u16 {
        match self {
            DeckModel::Original => 0x0060,
            DeckModel::Mini => 0x0063,
            DeckModel::RevisedMini => 0x0090,
        }
    }

    pub fn device_name(&self) -> &'static str {
        match self {
            DeckModel::Original => "StreamDeck Original",
            DeckModel::Mini => "StreamDeck Mini",
            DeckModel::RevisedMini => "StreamDeck Revised Mini",
        }
    }

    pub fn key_layout(&self) -> KeyLayout {
        match self {
            DeckModel::Original => KeyLayout::new(5, 3),
            DeckModel::Mini | DeckModel::RevisedMini => KeyLayout::new(3, 2),
        }
    }

    pub fn key_count(&self) -> usize {
        self.key_layout().total_keys
    }

    pub fn key_image_format(&self) -> KeyImageFormat {
        let size = match self {
            DeckModel::Original => 72,
            DeckModel::Mini | DeckModel::RevisedMini => 80,
        };
        KeyImageFormat::new(size, size, ChannelOrder::BGR).with_layout(PixelLayout::Interleaved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_original_table() {
        let model = DeckModel::from_pid(0x0060).unwrap();
        assert_eq!(model, DeckModel::Original);
        assert_eq!(model.pid(), 0x0060);
        assert_eq!(model.key_count(), 15);
        assert_eq!(model.key_layout().cols, 5);

        let format = model.key_image_format();
        assert_eq!((format.width, format.height), (72, 72));
        assert_eq!(format.order, ChannelOrder::BGR);
        assert!(format.validate().is_ok());
    }

    #[test]
    fn test_mini_table() {
        for (pid, model, name) in [
            (0x0063, DeckModel::Mini, "StreamDeck Mini"),
            (0x0090, DeckModel::RevisedMini, "StreamDeck Revised Mini"),
        ] {
            assert_eq!(DeckModel::from_pid(pid), Some(model));
            assert_eq!(model.pid(), pid);
            assert_eq!(model.device_name(), name);
            assert_eq!(model.key_layout(), KeyLayout::new(3, 2));
            assert_eq!(model.key_count(), 6);

            let format = model.key_image_format();
            assert_eq!((format.width, format.height), (80, 80));
            assert_eq!(format.order, ChannelOrder::BGR);
            assert_eq!(format.layout, PixelLayout::Interleaved);
            assert_eq!(format.image_bytes(), 80 * 80 * 3);
        }
    }

    #[test]
    fn test_unknown_pid() {
        assert_eq!(DeckModel::from_pid(0x006c), None);
    }
}
