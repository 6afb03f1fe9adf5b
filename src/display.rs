//! Key image pixel pipeline
//!
//! Label compositing, horizontal mirroring and channel reordering that turn a
//! key's RGB buffer into the byte layout the deck firmware expects.

use core::convert::Infallible;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};

use crate::config::{LabelStyle, LABEL_COLOR};
use crate::error::RenderError;
use crate::types::{Channel, ChannelOrder, PixelLayout};

// ===================================================================
// Alpha Compositing
// ===================================================================

/// Straight alpha-over of `src` onto an opaque `dst`, per channel:
/// `(src * a + dst * (255 - a) + 127) / 255`
pub fn blend(dst: Rgb888, src: Rgb888, alpha: u8) -> Rgb888 {
    let a = alpha as u16;
    let mix = |s: u8, d: u8| ((s as u16 * a + d as u16 * (255 - a) + 127) / 255) as u8;
    Rgb888::new(mix(src.r(), dst.r()), mix(src.g(), dst.g()), mix(src.b(), dst.b()))
}

/// Draw target that blends every drawn pixel into an opaque buffer.
///
/// Pixels outside the buffer are clipped.
pub struct LabelCanvas<'a> {
    pixels: &'a mut [Rgb888],
    width: u32,
    height: u32,
    alpha: u8,
}

impl<'a> LabelCanvas<'a> {
    pub fn new(pixels: &'a mut [Rgb888], width: u32, height: u32, alpha: u8) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            pixels,
            width,
            height,
            alpha,
        }
    }
}

impl DrawTarget for LabelCanvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels.into_iter() {
            if let Ok((x, y)) = <(u32, u32)>::try_from(coord) {
                if x < self.width && y < self.height {
                    let index = y as usize * self.width as usize + x as usize;
                    self.pixels[index] = blend(self.pixels[index], color, self.alpha);
                }
            }
        }
        Ok(())
    }
}

impl OriginDimensions for LabelCanvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

// ===================================================================
// Label Rasterization
// ===================================================================

/// Whether the ISO 8859-1 label fonts can draw `c`
pub fn glyph_supported(c: char) -> bool {
    matches!(c, '\n' | ' '..='~' | '\u{a0}'..='\u{ff}')
}

/// Rasterize `text` in white onto `pixels` using the label style.
///
/// Fails before touching the buffer if any character has no glyph.
pub fn draw_label(
    pixels: &mut [Rgb888],
    width: u32,
    height: u32,
    text: &str,
    style: &LabelStyle,
) -> Result<(), RenderError> {
    if let Some(c) = text.chars().find(|c| !glyph_supported(*c)) {
        return Err(RenderError::MissingGlyph(c));
    }

    let mut canvas = LabelCanvas::new(pixels, width, height, style.alpha);
    let text_style = MonoTextStyle::new(style.font.font(), LABEL_COLOR);
    let (x, y) = style.anchor;
    if let Err(never) = Text::with_baseline(text, Point::new(x, y), text_style, Baseline::Top)
        .draw(&mut canvas)
    {
        match never {}
    }
    Ok(())
}

// ===================================================================
// Orientation and Channel Layout
// ===================================================================

/// Flip every row left-to-right in place
pub fn mirror_horizontal(pixels: &mut [Rgb888], width: usize) {
    if width == 0 {
        return;
    }
    for row in pixels.chunks_exact_mut(width) {
        row.reverse();
    }
}

fn channel_value(pixel: Rgb888, channel: Channel) -> u8 {
    match channel {
        Channel::R => pixel.r(),
        Channel::G => pixel.g(),
        Channel::B => pixel.b(),
    }
}

/// Split a buffer into its R, G and B planes
pub fn split_planes(pixels: &[Rgb888]) -> [Vec<u8>; 3] {
    [Channel::R, Channel::G, Channel::B]
        .map(|channel| pixels.iter().map(|p| channel_value(*p, channel)).collect())
}

fn plane_index(channel: Channel) -> usize {
    match channel {
        Channel::R => 0,
        Channel::G => 1,
        Channel::B => 2,
    }
}

/// Reassemble planes in device channel order. Output is `pixels * 3` bytes.
pub fn encode(pixels: &[Rgb888], order: ChannelOrder, layout: PixelLayout) -> Vec<u8> {
    let planes = split_planes(pixels);
    let ordered = order.channels().map(|channel| &planes[plane_index(channel)]);
    let mut out = Vec::with_capacity(pixels.len() * 3);

    match layout {
        PixelLayout::Planar => {
            for plane in ordered {
                out.extend_from_slice(plane);
            }
        }
        PixelLayout::Interleaved => {
            for i in 0..pixels.len() {
                out.extend(ordered.iter().map(|plane| plane[i]));
            }
        }
    }

    out
}
