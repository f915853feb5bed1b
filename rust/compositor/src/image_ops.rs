// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image processing operations shared by the mask, warp and blend stages

use crate::types::{ClassMap, RegionMask};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, RgbImage};
use imageproc::distance_transform::Norm;

/// Single-channel float raster, values nominally in [0, 1]
pub type Plane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Morphological closing (dilate then erode) with a square element - fills small holes
pub fn morphological_close(mask: &RegionMask, radius: u8) -> RegionMask {
    RegionMask::from_gray(imageproc::morphology::close(
        mask.as_gray(),
        Norm::LInf,
        radius,
    ))
}

/// Morphological opening (erode then dilate) with a square element - removes small specks
pub fn morphological_open(mask: &RegionMask, radius: u8) -> RegionMask {
    RegionMask::from_gray(imageproc::morphology::open(
        mask.as_gray(),
        Norm::LInf,
        radius,
    ))
}

/// Resize a class map with nearest-neighbour sampling so labels stay discrete.
///
/// Output pixel `x` reads source pixel `floor(x * src_w / dst_w)`; no value is
/// ever interpolated between two labels.
pub fn resize_nearest(class_map: &ClassMap, width: u32, height: u32) -> ClassMap {
    let (src_w, src_h) = class_map.dimensions();
    if (src_w, src_h) == (width, height) {
        return class_map.clone();
    }
    if src_w == 0 || src_h == 0 {
        // No source labels: fill with an index no ADE20K class uses
        return ClassMap::from_pixel(width, height, Luma([u8::MAX]));
    }

    ClassMap::from_fn(width, height, |x, y| {
        let sx = (x as u64 * src_w as u64 / width as u64).min(src_w as u64 - 1);
        let sy = (y as u64 * src_h as u64 / height as u64).min(src_h as u64 - 1);
        *class_map.get_pixel(sx as u32, sy as u32)
    })
}

/// Resize an RGB image with Lanczos3, skipping the work when already sized
pub fn resize_lanczos(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Lanczos3)
}

/// Normalized luminance (ITU-R BT.601) of an RGB image
pub fn luminance(image: &RgbImage) -> Plane {
    Plane::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([luma / 255.0])
    })
}

/// Binary mask as a 0.0 / 1.0 plane
pub fn mask_to_plane(mask: &RegionMask) -> Plane {
    let gray = mask.as_gray();
    Plane::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([if gray.get_pixel(x, y).0[0] != 0 { 1.0 } else { 0.0 }])
    })
}

/// Threshold a plane back into a binary mask (strictly greater than `level`)
pub fn plane_to_mask(plane: &Plane, level: f32) -> RegionMask {
    RegionMask::from_fn(plane.width(), plane.height(), |x, y| {
        plane.get_pixel(x, y).0[0] > level
    })
}

/// Convert a normalized channel value to 8 bits, rounding to nearest
#[inline]
pub fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Normalized 1D Gaussian taps for an odd kernel size.
///
/// Sigma follows the usual size-derived rule `0.3 * ((k - 1) / 2 - 1) + 0.8`,
/// so a 15-tap kernel has sigma 2.6 and a 5-tap kernel 1.1.
pub fn gaussian_kernel(size: usize) -> Vec<f32> {
    let size = size.max(1) | 1;
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let denom = 2.0 * sigma * sigma;

    let mut taps: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = taps.iter().sum();
    for tap in &mut taps {
        *tap /= sum;
    }
    taps
}

/// Separable Gaussian blur of a plane with a `size`x`size` kernel.
///
/// Border pixels are replicated, so a constant plane stays constant.
pub fn gaussian_blur(plane: &Plane, size: usize) -> Plane {
    imageproc::filter::separable_filter_equal(plane, &gaussian_kernel(size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Rgb;

    #[test]
    fn test_gaussian_kernel_normalized() {
        for size in [3, 5, 15] {
            let taps = gaussian_kernel(size);
            assert_eq!(taps.len(), size);
            assert_relative_eq!(taps.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
            // Symmetric and peaked in the middle
            assert_relative_eq!(taps[0], taps[size - 1]);
            assert!(taps[size / 2] > taps[0]);
        }
    }

    #[test]
    fn test_blur_preserves_constant_plane() {
        let plane = Plane::from_pixel(20, 12, Luma([0.75]));
        let blurred = gaussian_blur(&plane, 15);
        for pixel in blurred.pixels() {
            assert_relative_eq!(pixel.0[0], 0.75, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_blur_of_zero_plane_is_exactly_zero() {
        let plane = Plane::new(8, 8);
        let blurred = gaussian_blur(&plane, 5);
        assert!(blurred.pixels().all(|p| p.0[0] == 0.0));
    }

    #[test]
    fn test_blur_softens_step() {
        let plane = Plane::from_fn(20, 1, |x, _| Luma([if x < 10 { 0.0 } else { 1.0 }]));
        let blurred = gaussian_blur(&plane, 5);
        let left = blurred.get_pixel(9, 0).0[0];
        let right = blurred.get_pixel(10, 0).0[0];
        assert!(left > 0.0 && left < 0.5);
        assert!(right > 0.5 && right < 1.0);
    }

    #[test]
    fn test_blur_spreads_impulse_by_kernel_product() {
        let taps = gaussian_kernel(5);
        let mut plane = Plane::new(9, 9);
        plane.put_pixel(4, 4, Luma([1.0]));

        let blurred = gaussian_blur(&plane, 5);
        for y in 2..7u32 {
            for x in 2..7u32 {
                let expected = taps[(6 - x) as usize] * taps[(6 - y) as usize];
                assert_relative_eq!(blurred.get_pixel(x, y).0[0], expected, epsilon = 1e-6);
            }
        }
        assert_eq!(blurred.get_pixel(1, 4).0[0], 0.0);
        assert_eq!(blurred.get_pixel(4, 7).0[0], 0.0);
    }

    #[test]
    fn test_blur_replicates_corner_pixel() {
        let taps = gaussian_kernel(5);
        let mut plane = Plane::new(9, 9);
        plane.put_pixel(0, 0, Luma([1.0]));

        // Offsets -2..=0 all clamp onto the corner
        let edge: f32 = taps[..3].iter().sum();
        let blurred = gaussian_blur(&plane, 5);
        assert_relative_eq!(blurred.get_pixel(0, 0).0[0], edge * edge, epsilon = 1e-6);
    }

    #[test]
    fn test_luminance() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        img.put_pixel(1, 0, Rgb([255, 0, 0]));

        let luma = luminance(&img);
        assert_relative_eq!(luma.get_pixel(0, 0).0[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(luma.get_pixel(1, 0).0[0], 0.299, epsilon = 1e-5);
    }

    #[test]
    fn test_close_fills_hole_and_open_removes_speck() {
        // Solid block with a one-pixel hole
        let holed = RegionMask::from_fn(30, 30, |x, y| {
            (5..25).contains(&x) && (5..25).contains(&y) && !(x == 15 && y == 15)
        });
        let closed = morphological_close(&holed, 2);
        assert!(closed.contains(15, 15));

        // Isolated speck far from anything else
        let speck = RegionMask::from_fn(30, 30, |x, y| x == 3 && y == 3);
        let opened = morphological_open(&speck, 2);
        assert!(opened.is_empty());
    }

    #[test]
    fn test_resize_nearest_keeps_labels() {
        let map = ClassMap::from_fn(4, 4, |x, _| Luma([if x < 2 { 3 } else { 7 }]));
        let resized = resize_nearest(&map, 16, 9);
        assert_eq!(resized.dimensions(), (16, 9));
        assert!(resized.pixels().all(|p| p.0[0] == 3 || p.0[0] == 7));
    }

    #[test]
    fn test_to_u8_rounds_and_clamps() {
        assert_eq!(to_u8(-0.5), 0);
        assert_eq!(to_u8(1.5), 255);
        assert_eq!(to_u8(100.0 / 255.0), 100);
    }
}
