// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types shared by the renovation pipeline

use crate::color::{DEFAULT_FLOOR_GROUT, DEFAULT_WALL_GROUT};
use crate::error::{Error, Result};
use image::{GrayImage, Luma, Rgb};
use serde::{Deserialize, Serialize};

/// Per-pixel semantic class indices (ADE20K labels fit in a byte)
pub type ClassMap = GrayImage;

/// A 2D point in image coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned pixel bounding box; `width` and `height` count pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Which room surface a pass operates on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Floor,
    Wall,
}

impl Surface {
    /// Smallest tile edge in pixels, regardless of grid density
    pub fn min_tile_size(self) -> u32 {
        match self {
            Surface::Floor => 10,
            Surface::Wall => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Surface::Floor => "floor",
            Surface::Wall => "wall",
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Grid and grout parameters for a synthesized tile pattern
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TileSpec {
    /// Number of tiles across the room width
    pub tiles_x: u32,
    /// Number of tiles across the room height
    pub tiles_y: u32,
    /// Grout line thickness in pixels
    pub grout_width: u32,
    /// Grout RGB color
    pub grout_color: [u8; 3],
}

impl TileSpec {
    pub fn new(tiles_x: u32, tiles_y: u32, grout_width: u32, grout_color: Rgb<u8>) -> Self {
        Self {
            tiles_x,
            tiles_y,
            grout_width,
            grout_color: grout_color.0,
        }
    }

    /// Defaults used for floor tiling: 25x18 grid, 2px warm-white grout
    pub fn floor_default() -> Self {
        Self::new(25, 18, 2, DEFAULT_FLOOR_GROUT)
    }

    /// Defaults used for wall tiling: 20x15 grid, 2px off-white grout
    pub fn wall_default() -> Self {
        Self::new(20, 15, 2, DEFAULT_WALL_GROUT)
    }

    pub fn grout_rgb(&self) -> Rgb<u8> {
        Rgb(self.grout_color)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tiles_x == 0 || self.tiles_y == 0 {
            return Err(Error::InvalidTileGrid {
                tiles_x: self.tiles_x,
                tiles_y: self.tiles_y,
            });
        }
        Ok(())
    }
}

/// Pixel value of a member in a [`RegionMask`]
pub const MASK_MEMBER: u8 = 255;

/// Binary per-pixel membership grid for a detected surface.
///
/// Pixels are exactly 0 or [`MASK_MEMBER`], which is the foreground
/// convention of the `imageproc` morphology and contour routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMask(GrayImage);

impl RegionMask {
    /// Mask with no member pixels
    pub fn empty(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Mask where every pixel is a member
    pub fn full(width: u32, height: u32) -> Self {
        Self(GrayImage::from_pixel(width, height, Luma([MASK_MEMBER])))
    }

    pub fn from_fn<F>(width: u32, height: u32, mut member: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        Self(GrayImage::from_fn(width, height, |x, y| {
            Luma([if member(x, y) { MASK_MEMBER } else { 0 }])
        }))
    }

    /// Binarize a grayscale image: any non-zero pixel becomes a member
    pub fn from_gray(gray: GrayImage) -> Self {
        let mut gray = gray;
        for pixel in gray.pixels_mut() {
            if pixel.0[0] != 0 {
                pixel.0[0] = MASK_MEMBER;
            }
        }
        Self(gray)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y).0[0] != 0
    }

    /// Number of member pixels
    pub fn area(&self) -> u64 {
        self.0.as_raw().iter().filter(|&&v| v != 0).count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_raw().iter().all(|&v| v == 0)
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_gray(self) -> GrayImage {
        self.0
    }
}

/// Parameters of the segmentation mask post-processor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaskConfig {
    /// ADE20K label of the floor class
    pub floor_class: u8,
    /// ADE20K label of the wall class
    pub wall_class: u8,
    /// Wall components smaller than this fraction of the image area are dropped
    pub min_region_fraction: f64,
    /// Chebyshev radius of the square close/open element (2 = 5x5)
    pub morph_radius: u8,
    /// Blur and re-threshold floor mask edges
    pub smooth_floor_edges: bool,
    /// Blur and re-threshold wall mask edges
    pub smooth_wall_edges: bool,
}

impl MaskConfig {
    pub fn class_for(&self, surface: Surface) -> u8 {
        match surface {
            Surface::Floor => self.floor_class,
            Surface::Wall => self.wall_class,
        }
    }

    pub fn smooth_edges_for(&self, surface: Surface) -> bool {
        match surface {
            Surface::Floor => self.smooth_floor_edges,
            Surface::Wall => self.smooth_wall_edges,
        }
    }
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            floor_class: 3,
            wall_class: 0,
            min_region_fraction: 0.02,
            morph_radius: 2,
            smooth_floor_edges: false,
            smooth_wall_edges: true,
        }
    }
}

/// Trapezoid spread applied to the floor bounding box before warping.
///
/// The values are visually tuned, not derived from camera parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WarpConfig {
    /// Outward push of the bottom corners, as a fraction of box width
    pub horizontal_spread: f64,
    /// Vertical push of both edges, as a fraction of box height
    pub vertical_spread: f64,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            horizontal_spread: 0.2,
            vertical_spread: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_spec_validation() {
        assert!(TileSpec::floor_default().validate().is_ok());

        let zero = TileSpec::new(0, 3, 2, Rgb([0, 0, 0]));
        match zero.validate() {
            Err(Error::InvalidTileGrid { tiles_x, tiles_y }) => {
                assert_eq!((tiles_x, tiles_y), (0, 3));
            }
            other => panic!("expected InvalidTileGrid, got {:?}", other),
        }
    }

    #[test]
    fn test_region_mask_area() {
        let mask = RegionMask::from_fn(10, 10, |x, _| x < 4);
        assert_eq!(mask.area(), 40);
        assert!(mask.contains(3, 9));
        assert!(!mask.contains(4, 0));
        assert!(!mask.is_empty());
        assert!(RegionMask::empty(5, 5).is_empty());
        assert_eq!(RegionMask::full(5, 4).area(), 20);
    }

    #[test]
    fn test_from_gray_binarizes() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([x as u8]));
        let mask = RegionMask::from_gray(gray);
        assert_eq!(mask.as_gray().as_raw(), &vec![0, MASK_MEMBER, MASK_MEMBER]);
    }

    #[test]
    fn test_surface_minimum_tile_sizes() {
        assert_eq!(Surface::Floor.min_tile_size(), 10);
        assert_eq!(Surface::Wall.min_tile_size(), 8);
        assert_eq!(Surface::Wall.to_string(), "wall");
    }
}
