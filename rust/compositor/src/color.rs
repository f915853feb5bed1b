// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hex color parsing

use crate::error::{Error, Result};
use image::Rgb;

/// Default floor grout, `#F0EBE4`
pub const DEFAULT_FLOOR_GROUT: Rgb<u8> = Rgb([240, 235, 228]);

/// Default wall grout, `#F5F0EB`
pub const DEFAULT_WALL_GROUT: Rgb<u8> = Rgb([245, 240, 235]);

/// Parse a `#RRGGBB` (or `RRGGBB`) color string.
///
/// Anything other than exactly six hex digits after at most one leading `#`
/// is rejected, including surrounding whitespace; there is no fallback color.
pub fn parse_hex_color(value: &str) -> Result<Rgb<u8>> {
    let invalid = || Error::InvalidColor {
        value: value.to_string(),
    };

    let digits = value.strip_prefix('#').unwrap_or(value);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Format a color as uppercase `#RRGGBB`
pub fn format_hex_color(color: Rgb<u8>) -> String {
    let [r, g, b] = color.0;
    format!("#{:02X}{:02X}{:02X}", r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF5733").unwrap(), Rgb([255, 87, 51]));
        assert_eq!(parse_hex_color("f0ebe4").unwrap(), DEFAULT_FLOOR_GROUT);
        assert_eq!(parse_hex_color("#F5F0EB").unwrap(), DEFAULT_WALL_GROUT);
    }

    #[test]
    fn test_malformed_colors_rejected() {
        for bad in ["red", "#FFF", "#GG0000", "#FF57331", "", "#", "+F+F+F"] {
            let err = parse_hex_color(bad).unwrap_err();
            assert!(err.is_validation(), "{bad:?} should be a validation error");
        }
    }

    #[test]
    fn test_only_one_bare_hash_prefix_accepted() {
        for bad in ["##FF5733", " #FF5733", "#FF5733 ", "\tFF5733", "#FF5733\n"] {
            let err = parse_hex_color(bad).unwrap_err();
            assert!(err.is_validation(), "{bad:?} should be a validation error");
        }
    }

    #[test]
    fn test_format_roundtrip() {
        assert_eq!(format_hex_color(Rgb([240, 235, 228])), "#F0EBE4");
    }
}
