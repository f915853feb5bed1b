// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lighting-aware compositing
//!
//! The candidate surface is modulated by a lighting factor taken from the
//! blurred luminance of the room photo, then alpha-blended into the photo
//! through a softened region mask.

use crate::error::{Error, Result};
use crate::image_ops::{gaussian_blur, luminance, mask_to_plane, to_u8, Plane};
use crate::types::{RegionMask, Surface};
use image::{Luma, Rgb, Rgb32FImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Kernel size of the blur that turns luminance into a smooth lighting field
pub const LIGHTING_KERNEL: usize = 15;

/// Kernel size of the blur that softens the mask seam
pub const ALPHA_KERNEL: usize = 5;

/// Affine map from luminance to a clamped lighting multiplier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LightingParams {
    pub gain: f32,
    pub bias: f32,
    pub min: f32,
    pub max: f32,
}

impl LightingParams {
    /// Floors follow shadows and highlights more strongly
    pub const FLOOR: Self = Self {
        gain: 1.2,
        bias: 0.3,
        min: 0.4,
        max: 1.3,
    };

    /// Walls stay visually flatter
    pub const WALL: Self = Self {
        gain: 1.1,
        bias: 0.4,
        min: 0.5,
        max: 1.2,
    };

    pub fn for_surface(surface: Surface) -> Self {
        match surface {
            Surface::Floor => Self::FLOOR,
            Surface::Wall => Self::WALL,
        }
    }

    /// Lighting multiplier for a luminance value; always within `[min, max]`
    #[inline]
    pub fn factor(&self, luminance: f32) -> f32 {
        let raw = luminance * self.gain + self.bias;
        if raw.is_nan() {
            return self.min;
        }
        raw.clamp(self.min, self.max)
    }
}

/// Smooth local-lighting field: luminance blurred with a 15x15 Gaussian
pub fn lighting_field(room: &RgbImage) -> Plane {
    gaussian_blur(&luminance(room), LIGHTING_KERNEL)
}

/// Per-pixel lighting multipliers for a room
pub fn lighting_factors(room: &RgbImage, params: &LightingParams) -> Plane {
    let mut field = lighting_field(room);
    for pixel in field.pixels_mut() {
        pixel.0[0] = params.factor(pixel.0[0]);
    }
    field
}

/// Apply lighting multipliers to a surface, clamping to [0, 1]
pub fn light_surface(surface: &RgbImage, factors: &Plane) -> Rgb32FImage {
    Rgb32FImage::from_fn(surface.width(), surface.height(), |x, y| {
        let factor = factors.get_pixel(x, y).0[0];
        let [r, g, b] = surface.get_pixel(x, y).0;
        Rgb([r, g, b].map(|c| (c as f32 / 255.0 * factor).clamp(0.0, 1.0)))
    })
}

/// Blend weight: the binary mask blurred with a 5x5 Gaussian
pub fn smooth_alpha(mask: &RegionMask) -> Plane {
    gaussian_blur(&mask_to_plane(mask), ALPHA_KERNEL)
}

fn check_dimensions(expected: (u32, u32), actual: (u32, u32)) -> Result<()> {
    if expected != actual {
        return Err(Error::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Re-light `surface` and blend it into `room` through `mask`.
///
/// `result = alpha * lit_surface + (1 - alpha) * room`. Pixels whose alpha is
/// exactly zero are copied from the room untouched.
pub fn blend_with_lighting(
    room: &RgbImage,
    surface: &RgbImage,
    mask: &RegionMask,
    kind: Surface,
) -> Result<RgbImage> {
    let dims = room.dimensions();
    check_dimensions(dims, surface.dimensions())?;
    check_dimensions(dims, mask.dimensions())?;
    if dims.0 == 0 || dims.1 == 0 {
        return Err(Error::EmptyImage("room image"));
    }

    tracing::debug!(surface = %kind, "Blending with room lighting");

    let factors = lighting_factors(room, &LightingParams::for_surface(kind));
    let lit = light_surface(surface, &factors);
    let alpha = smooth_alpha(mask);

    let mut out = room.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let Luma([a]) = *alpha.get_pixel(x, y);
        if a <= 0.0 {
            continue;
        }
        let lit_px = lit.get_pixel(x, y).0;
        for c in 0..3 {
            let original = pixel.0[c] as f32 / 255.0;
            pixel.0[c] = to_u8(a * lit_px[c] + (1.0 - a) * original);
        }
    }

    Ok(out)
}

/// Blend a uniform color into the masked region with the same lighting math
pub fn blend_solid_color(
    room: &RgbImage,
    color: Rgb<u8>,
    mask: &RegionMask,
    kind: Surface,
) -> Result<RgbImage> {
    let field = RgbImage::from_pixel(room.width(), room.height(), color);
    blend_with_lighting(room, &field, mask, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_room(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_lighting_factor_bounds() {
        for params in [LightingParams::FLOOR, LightingParams::WALL] {
            for i in -200..=400 {
                let luminance = i as f32 / 100.0;
                let factor = params.factor(luminance);
                assert!(factor >= params.min && factor <= params.max);
            }
            assert_eq!(params.factor(f32::NAN), params.min);
            assert_eq!(params.factor(f32::INFINITY), params.max);
        }
        assert_eq!(LightingParams::FLOOR.factor(0.0), 0.4);
        assert_eq!(LightingParams::FLOOR.factor(1.0), 1.3);
        assert_eq!(LightingParams::WALL.factor(0.0), 0.5);
        assert_eq!(LightingParams::WALL.factor(1.0), 1.2);
    }

    #[test]
    fn test_floor_range_wider_than_wall() {
        let floor = LightingParams::FLOOR;
        let wall = LightingParams::WALL;
        assert!(floor.max - floor.min > wall.max - wall.min);
    }

    #[test]
    fn test_zero_mask_is_identity() {
        let room = gradient_room(40, 30);
        let surface = RgbImage::from_pixel(40, 30, Rgb([255, 0, 0]));
        let mask = RegionMask::empty(40, 30);

        for kind in [Surface::Floor, Surface::Wall] {
            let out = blend_with_lighting(&room, &surface, &mask, kind).unwrap();
            assert_eq!(out.as_raw(), room.as_raw());
        }
    }

    #[test]
    fn test_full_mask_gives_lit_surface() {
        let room = gradient_room(40, 30);
        let surface = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 3) as u8, 120, (y * 4) as u8]));
        let mask = RegionMask::full(40, 30);

        let out = blend_with_lighting(&room, &surface, &mask, Surface::Floor).unwrap();
        let lit = light_surface(&surface, &lighting_factors(&room, &LightingParams::FLOOR));

        for (x, y, pixel) in out.enumerate_pixels() {
            let expected = lit.get_pixel(x, y).0;
            for c in 0..3 {
                let diff = (pixel.0[c] as i32 - to_u8(expected[c]) as i32).abs();
                assert!(diff <= 1, "pixel ({x},{y}) channel {c} differs by {diff}");
            }
        }
    }

    #[test]
    fn test_dark_room_darkens_surface() {
        let room = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let surface = RgbImage::from_pixel(20, 20, Rgb([200, 200, 200]));
        let out = blend_with_lighting(&room, &surface, &RegionMask::full(20, 20), Surface::Wall).unwrap();
        // Wall factor bottoms out at 0.5
        assert_eq!(*out.get_pixel(10, 10), Rgb([100, 100, 100]));
    }

    #[test]
    fn test_seam_is_soft() {
        let room = RgbImage::from_pixel(40, 10, Rgb([0, 0, 0]));
        let surface = RgbImage::from_pixel(40, 10, Rgb([255, 255, 255]));
        let mask = RegionMask::from_fn(40, 10, |x, _| x >= 20);

        let out = blend_with_lighting(&room, &surface, &mask, Surface::Floor).unwrap();
        let inside = out.get_pixel(20, 5).0[0];
        let outside = out.get_pixel(19, 5).0[0];
        assert!(outside > 0, "blur should leak a little surface across the seam");
        assert!(inside > outside);
        assert_eq!(out.get_pixel(0, 5).0[0], 0);
    }

    #[test]
    fn test_solid_color_blend() {
        let room = RgbImage::from_pixel(16, 16, Rgb([255, 255, 255]));
        let out = blend_solid_color(&room, Rgb([100, 50, 20]), &RegionMask::full(16, 16), Surface::Wall)
            .unwrap();
        // White room: wall factor saturates at 1.2
        assert_eq!(*out.get_pixel(8, 8), Rgb([120, 60, 24]));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let room = RgbImage::new(10, 10);
        let surface = RgbImage::new(10, 11);
        let err = blend_with_lighting(&room, &surface, &RegionMask::empty(10, 10), Surface::Floor)
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }
}
