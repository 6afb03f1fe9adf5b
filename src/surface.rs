//! Per-key image surface
//!
//! A [`KeySurface`] owns one key's RGB buffer and label. Mutators only change
//! state; [`KeySurface::render`] composes the label over a copy of the fill,
//! mirrors it and lays the channels out for the device. Transferring the
//! result is the controller's job.

use embedded_graphics::pixelcolor::Rgb888;
use heapless::String;
use log::warn;

use crate::config::{LabelStyle, LABEL_CAPACITY};
use crate::display::{draw_label, encode, mirror_horizontal};
use crate::error::{DeckError, RenderError};
use crate::types::{Channel, ChannelOrder, KeyImageFormat};

const BLACK: Rgb888 = Rgb888::new(0, 0, 0);

#[derive(Debug, Clone)]
pub struct KeySurface {
    index: u8,
    format: KeyImageFormat,
    pixels: Vec<Rgb888>,
    label: Option<String<LABEL_CAPACITY>>,
    style: LabelStyle,
}

impl KeySurface {
    /// Black surface for key `index` in the device's image format
    pub fn new(index: u8, format: KeyImageFormat, style: LabelStyle) -> Result<Self, DeckError> {
        format.validate()?;
        Ok(Self {
            index,
            format,
            pixels: vec![BLACK; format.pixel_count()],
            label: None,
            style,
        })
    }

    /// Standalone planar surface with the default label style
    pub fn create(width: u32, height: u32, order: [Channel; 3]) -> Result<Self, DeckError> {
        let order = ChannelOrder::new(order)?;
        Self::new(0, KeyImageFormat::new(width, height, order), LabelStyle::default())
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn format(&self) -> KeyImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.format.width
    }

    pub fn height(&self) -> u32 {
        self.format.height
    }

    pub fn pixels(&self) -> &[Rgb888] {
        &self.pixels
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn fill(&mut self, color: Rgb888) {
        self.pixels.fill(color);
    }

    /// Store a label; `None` or an empty string removes it.
    ///
    /// Text beyond the label capacity is cut at a character boundary.
    pub fn set_label(&mut self, text: Option<&str>) {
        let text = match text {
            Some(text) if !text.is_empty() => text,
            _ => {
                self.label = None;
                return;
            }
        };

        let mut label = String::new();
        for c in text.chars() {
            if label.push(c).is_err() {
                warn!(
                    "Key {} label truncated to {} bytes: {:?}",
                    self.index, LABEL_CAPACITY, text
                );
                break;
            }
        }
        self.label = Some(label);
    }

    /// Blank black, no label
    pub fn clear(&mut self) {
        self.label = None;
        self.fill(BLACK);
    }

    /// Render, failing if the label cannot be rasterized
    pub fn try_render(&self) -> Result<Vec<u8>, RenderError> {
        let mut scratch = self.pixels.clone();
        if let Some(label) = self.label() {
            draw_label(&mut scratch, self.width(), self.height(), label, &self.style)?;
        }
        Ok(self.finish(scratch))
    }

    /// Device-ready bytes, `width * height * 3` long.
    ///
    /// A label that cannot be rasterized is skipped with a warning.
    pub fn render(&self) -> Vec<u8> {
        self.try_render().unwrap_or_else(|e| {
            warn!("Key {}: {}, rendering without label", self.index, e);
            self.finish(self.pixels.clone())
        })
    }

    fn finish(&self, mut scratch: Vec<Rgb888>) -> Vec<u8> {
        // Deck scan order is mirrored relative to image coordinates
        mirror_horizontal(&mut scratch, self.width() as usize);
        encode(&scratch, self.format.order, self.format.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelLayout;
    use embedded_graphics::prelude::RgbColor;
    use proptest::prelude::*;

    const BGR: [Channel; 3] = [Channel::B, Channel::G, Channel::R];

    fn channel_order_strategy() -> impl Strategy<Value = [Channel; 3]> {
        prop_oneof![
            Just([Channel::R, Channel::G, Channel::B]),
            Just([Channel::R, Channel::B, Channel::G]),
            Just([Channel::G, Channel::R, Channel::B]),
            Just([Channel::G, Channel::B, Channel::R]),
            Just([Channel::B, Channel::R, Channel::G]),
            Just([Channel::B, Channel::G, Channel::R]),
        ]
    }

    fn component(color: Rgb888, channel: Channel) -> u8 {
        match channel {
            Channel::R => color.r(),
            Channel::G => color.g(),
            Channel::B => color.b(),
        }
    }

    #[test]
    fn test_create_rejects_bad_format() {
        assert!(matches!(KeySurface::create(0, 72, BGR), Err(DeckError::InvalidFormat(_))));
        assert!(matches!(KeySurface::create(72, 0, BGR), Err(DeckError::InvalidFormat(_))));
        assert!(matches!(
            KeySurface::create(72, 72, [Channel::R, Channel::R, Channel::G]),
            Err(DeckError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_new_surface_is_black() {
        let surface = KeySurface::create(8, 4, BGR).unwrap();
        assert!(surface.pixels().iter().all(|p| *p == BLACK));
        assert_eq!(surface.render(), vec![0u8; 8 * 4 * 3]);
        assert_eq!(surface.label(), None);
    }

    #[test]
    fn test_blue_fill_bgr_planes() {
        let mut surface = KeySurface::create(72, 72, BGR).unwrap();
        surface.fill(Rgb888::new(0, 0, 255));
        let bytes = surface.render();

        let plane = 72 * 72;
        assert_eq!(bytes.len(), plane * 3);
        assert!(bytes[..plane].iter().all(|b| *b == 0xFF));
        assert!(bytes[plane..].iter().all(|b| *b == 0x00));
    }

    #[test]
    fn test_interleaved_fill_repeats_pixel() {
        let format = KeyImageFormat::new(4, 4, ChannelOrder::BGR).with_layout(PixelLayout::Interleaved);
        let mut surface = KeySurface::new(1, format, LabelStyle::default()).unwrap();
        surface.fill(Rgb888::new(10, 20, 30));
        let bytes = surface.render();
        assert_eq!(bytes.len(), 4 * 4 * 3);
        for pixel in bytes.chunks_exact(3) {
            assert_eq!(pixel, [30, 20, 10]);
        }
    }

    #[test]
    fn test_render_does_not_mutate_fill() {
        let mut surface = KeySurface::create(72, 72, BGR).unwrap();
        surface.fill(Rgb888::new(255, 0, 0));
        surface.set_label(Some("tomten"));
        let first = surface.render();
        let second = surface.render();
        assert_eq!(first, second);
        assert!(surface.pixels().iter().all(|p| *p == Rgb888::new(255, 0, 0)));
    }

    #[test]
    fn test_label_lands_top_right_after_mirror() {
        let format = KeyImageFormat::new(72, 72, ChannelOrder::RGB).with_layout(PixelLayout::Interleaved);
        let mut surface = KeySurface::new(0, format, LabelStyle::default()).unwrap();
        surface.set_label(Some("A"));
        let bytes = surface.render();

        let lit: Vec<(usize, usize)> = bytes
            .chunks_exact(3)
            .enumerate()
            .filter(|(_, p)| p.iter().any(|b| *b != 0))
            .map(|(i, _)| (i % 72, i / 72))
            .collect();
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|(x, y)| *x >= 72 - 7 && *y < 14));
    }

    #[test]
    fn test_cleared_label_matches_unlabeled() {
        let mut plain = KeySurface::create(72, 72, BGR).unwrap();
        plain.fill(Rgb888::new(0, 0, 255));

        let mut labeled = plain.clone();
        labeled.set_label(Some("tomten"));
        assert_ne!(labeled.render(), plain.render());

        labeled.set_label(None);
        assert_eq!(labeled.render(), plain.render());

        labeled.set_label(Some("x"));
        labeled.set_label(Some(""));
        assert_eq!(labeled.label(), None);
    }

    #[test]
    fn test_missing_glyph_falls_back_to_fill() {
        let mut plain = KeySurface::create(72, 72, BGR).unwrap();
        plain.fill(Rgb888::new(0, 255, 0));

        let mut labeled = plain.clone();
        labeled.set_label(Some("日本"));
        assert!(matches!(labeled.try_render(), Err(RenderError::MissingGlyph('日'))));
        assert_eq!(labeled.render(), plain.render());
    }

    #[test]
    fn test_long_label_truncated_on_char_boundary() {
        let mut surface = KeySurface::create(72, 72, BGR).unwrap();
        let long = "ä".repeat(40);
        surface.set_label(Some(&long));
        let label = surface.label().unwrap();
        assert!(label.len() <= LABEL_CAPACITY);
        assert_eq!(label.chars().count(), LABEL_CAPACITY / 2);
    }

    #[test]
    fn test_clear_resets_to_black() {
        let mut surface = KeySurface::create(16, 16, BGR).unwrap();
        surface.fill(Rgb888::new(1, 2, 3));
        surface.set_label(Some("x"));
        surface.clear();
        assert_eq!(surface.label(), None);
        assert_eq!(surface.render(), vec![0u8; 16 * 16 * 3]);
    }

    proptest! {
        #[test]
        fn prop_fill_renders_permuted_color(
            width in 1u32..48,
            height in 1u32..48,
            order in channel_order_strategy(),
            r in any::<u8>(),
            g in any::<u8>(),
            b in any::<u8>(),
        ) {
            let color = Rgb888::new(r, g, b);
            let mut surface = KeySurface::create(width, height, order).unwrap();
            surface.fill(color);
            let bytes = surface.render();

            let plane = (width * height) as usize;
            prop_assert_eq!(bytes.len(), plane * 3);
            for (i, channel) in order.iter().enumerate() {
                let expected = component(color, *channel);
                prop_assert!(bytes[i * plane..(i + 1) * plane].iter().all(|v| *v == expected));
            }
        }
    }
}
