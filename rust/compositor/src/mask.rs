// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Segmentation mask post-processing
//!
//! Turns a raw class map from a segmentation model into a clean binary
//! region mask at room resolution.

use crate::image_ops::{
    gaussian_blur, mask_to_plane, morphological_close, morphological_open, plane_to_mask,
    resize_nearest,
};
use crate::types::{ClassMap, MaskConfig, RegionMask, Surface};
use image::Luma;
use imageproc::region_labelling::{connected_components, Connectivity};

/// Resize a class map to room size and keep the pixels labelled `target`
pub fn class_mask(class_map: &ClassMap, target: u8, width: u32, height: u32) -> RegionMask {
    let resized = resize_nearest(class_map, width, height);
    RegionMask::from_fn(width, height, |x, y| resized.get_pixel(x, y).0[0] == target)
}

/// Close then open with a square element to fill holes and drop specks
pub fn clean_mask(mask: &RegionMask, radius: u8) -> RegionMask {
    let closed = morphological_close(mask, radius);
    morphological_open(&closed, radius)
}

/// Keep the union of all 8-connected components with at least `min_area` pixels
pub fn retain_large_components(mask: &RegionMask, min_area: f64) -> RegionMask {
    let labels = connected_components(mask.as_gray(), Connectivity::Eight, Luma([0u8]));

    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    if max_label == 0 {
        return mask.clone();
    }

    let mut areas = vec![0u64; max_label + 1];
    for pixel in labels.pixels() {
        areas[pixel.0[0] as usize] += 1;
    }

    let kept = areas
        .iter()
        .skip(1)
        .filter(|&&area| area as f64 >= min_area)
        .count();
    tracing::debug!(
        components = max_label,
        kept,
        min_area,
        "Filtered mask components"
    );

    RegionMask::from_fn(mask.width(), mask.height(), |x, y| {
        let label = labels.get_pixel(x, y).0[0] as usize;
        label != 0 && areas[label] as f64 >= min_area
    })
}

/// Soften jagged edges: 3x3 Gaussian blur, then re-threshold at 0.5
pub fn smooth_edges(mask: &RegionMask) -> RegionMask {
    let blurred = gaussian_blur(&mask_to_plane(mask), 3);
    plane_to_mask(&blurred, 0.5)
}

/// Post-processor that applies the per-surface cleanup pipeline
#[derive(Debug, Clone, Default)]
pub struct MaskPostProcessor {
    config: MaskConfig,
}

impl MaskPostProcessor {
    pub fn new(config: MaskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MaskConfig {
        &self.config
    }

    /// Produce the binary region mask of `surface` at `width` x `height`.
    ///
    /// Steps:
    /// 1. Nearest-neighbour resize and class threshold
    /// 2. Morphological close + open
    /// 3. Walls only: drop components under the minimum region fraction
    /// 4. Optional edge smoothing
    pub fn process(
        &self,
        class_map: &ClassMap,
        surface: Surface,
        width: u32,
        height: u32,
    ) -> RegionMask {
        let target = self.config.class_for(surface);
        let raw = class_mask(class_map, target, width, height);
        let raw_area = raw.area();

        let mut mask = clean_mask(&raw, self.config.morph_radius);

        if surface == Surface::Wall && !mask.is_empty() {
            let min_area = width as f64 * height as f64 * self.config.min_region_fraction;
            mask = retain_large_components(&mask, min_area);
        }

        if self.config.smooth_edges_for(surface) && !mask.is_empty() {
            mask = smooth_edges(&mask);
        }

        tracing::debug!(
            surface = %surface,
            class = target,
            raw_pixels = raw_area,
            mask_pixels = mask.area(),
            "Region mask created"
        );

        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_from_fn<F: Fn(u32, u32) -> u8>(width: u32, height: u32, f: F) -> ClassMap {
        ClassMap::from_fn(width, height, |x, y| Luma([f(x, y)]))
    }

    #[test]
    fn test_class_mask_upsamples_low_resolution_map() {
        // 4x4 map: bottom half is floor (3), top half is wall (0)
        let map = map_from_fn(4, 4, |_, y| if y >= 2 { 3 } else { 0 });
        let mask = class_mask(&map, 3, 40, 40);

        assert_eq!(mask.dimensions(), (40, 40));
        assert!(mask.contains(0, 39));
        assert!(!mask.contains(0, 0));
        assert_eq!(mask.area(), 40 * 20);
    }

    #[test]
    fn test_retain_large_components_keeps_every_large_region() {
        // Two large walls and one tiny patch
        let mask = RegionMask::from_fn(100, 100, |x, y| {
            (x < 30 && y < 60) || (x >= 70 && y < 60) || ((48..50).contains(&x) && (90..92).contains(&y))
        });

        let filtered = retain_large_components(&mask, 100.0 * 100.0 * 0.02);
        assert!(filtered.contains(0, 0));
        assert!(filtered.contains(99, 0));
        assert!(!filtered.contains(48, 90));
        assert_eq!(filtered.area(), 2 * 30 * 60);
    }

    #[test]
    fn test_retain_on_empty_mask() {
        let mask = RegionMask::empty(10, 10);
        assert!(retain_large_components(&mask, 1.0).is_empty());
    }

    #[test]
    fn test_smooth_edges_keeps_interior() {
        let mask = RegionMask::from_fn(20, 20, |x, y| (4..16).contains(&x) && (4..16).contains(&y));
        let smoothed = smooth_edges(&mask);
        assert!(smoothed.contains(10, 10));
        assert!(!smoothed.contains(0, 0));
    }

    #[test]
    fn test_wall_processing_drops_picture_frame() {
        // Wall across the top, plus a small "wall-like" frame lower down
        let map = map_from_fn(200, 100, |x, y| {
            if y < 40 || ((100..108).contains(&x) && (70..78).contains(&y)) {
                0
            } else {
                5
            }
        });

        let processor = MaskPostProcessor::default();
        let wall = processor.process(&map, Surface::Wall, 200, 100);
        assert!(wall.contains(100, 10));
        assert!(!wall.contains(104, 74));
    }

    #[test]
    fn test_floor_processing_keeps_small_regions() {
        // Floor components are not area filtered
        let map = map_from_fn(200, 100, |x, y| {
            if (100..110).contains(&x) && (70..80).contains(&y) {
                3
            } else {
                1
            }
        });

        let processor = MaskPostProcessor::default();
        let floor = processor.process(&map, Surface::Floor, 200, 100);
        assert!(floor.contains(105, 75));
    }

    #[test]
    fn test_missing_class_yields_empty_mask() {
        let map = map_from_fn(32, 32, |_, _| 12);
        let processor = MaskPostProcessor::default();
        assert!(processor.process(&map, Surface::Floor, 64, 64).is_empty());
        assert!(processor.process(&map, Surface::Wall, 64, 64).is_empty());
    }
}
