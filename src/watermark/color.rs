//! Hex colour parsing for fill and stroke colours.
//!
//! Parsing fails closed: anything that is not exactly six hex digits (after an
//! optional leading `#`) resolves to a fixed fallback instead of an error.
//! Fill colours fall back to white, stroke colours to black.

use image::Rgba;
use tracing::debug;

use super::types::opacity_to_alpha;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn with_alpha(&self, alpha: u8) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, alpha])
    }
}

/// Parse `RRGGBB` or `#RRGGBB`, returning `fallback` for anything else.
pub fn parse_color(hex: &str, fallback: Color) -> Color {
    match try_parse_hex(hex) {
        Some(color) => color,
        None => {
            debug!("Invalid colour {:?}, using fallback {:?}", hex, fallback);
            fallback
        }
    }
}

/// Fill colour, white when malformed.
pub fn parse_fill_color(hex: &str) -> Color {
    parse_color(hex, Color::WHITE)
}

/// Stroke colour, black when malformed.
pub fn parse_stroke_color(hex: &str) -> Color {
    parse_color(hex, Color::BLACK)
}

/// Combine a colour with an opacity in `[0, 1]`.
pub fn apply_opacity(color: Color, opacity: f32) -> Rgba<u8> {
    color.with_alpha(opacity_to_alpha(opacity))
}

fn try_parse_hex(hex: &str) -> Option<Color> {
    let trimmed = hex.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);

    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(Color::new(channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_hash() {
        assert_eq!(parse_fill_color("#FF0000"), Color::new(255, 0, 0));
        assert_eq!(parse_fill_color("00ff00"), Color::new(0, 255, 0));
        assert_eq!(parse_fill_color("#0000Ff"), Color::new(0, 0, 255));
        assert_eq!(parse_fill_color("#123456"), Color::new(0x12, 0x34, 0x56));
        assert_eq!(parse_stroke_color(" #abcdef "), Color::new(0xab, 0xcd, 0xef));
    }

    #[test]
    fn test_every_channel_value_round_trips() {
        for v in 0..=255u8 {
            let hex = format!("#{:02X}{:02x}{:02X}", v, 255 - v, v / 2);
            assert_eq!(parse_stroke_color(&hex), Color::new(v, 255 - v, v / 2));
        }
    }

    #[test]
    fn test_malformed_fill_falls_back_to_white() {
        for bad in ["", "#", "zzzzzz", "#FFF", "#FF00000", "##FFFFFF", "12345g", "#ＦＦＦＦＦＦ"] {
            assert_eq!(parse_fill_color(bad), Color::WHITE, "input {:?}", bad);
        }
    }

    #[test]
    fn test_malformed_stroke_falls_back_to_black() {
        for bad in ["", "red", "#12 456", "+12345"] {
            assert_eq!(parse_stroke_color(bad), Color::BLACK, "input {:?}", bad);
        }
    }

    #[test]
    fn test_malformed_fill_with_half_opacity() {
        let fill = apply_opacity(parse_fill_color("zzzzzz"), 0.5);
        assert_eq!(fill, Rgba([255, 255, 255, 128]));
    }
}
