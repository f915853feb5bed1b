// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room photo re-surfacing
//!
//! This crate provides a complete pipeline for:
//! 1. Synthesizing a room-sized tile pattern (texture grid plus grout lines)
//! 2. Turning segmentation class maps into clean floor and wall masks
//! 3. Warping the floor pattern with a planar homography heuristic
//! 4. Blending the new surface into the photo under the photo's own lighting
//!
//! Segmentation itself is an injected capability ([`SegmentationOracle`]).
//!
//! # Usage
//!
//! ```rust,ignore
//! use roomtile_compositor::{
//!     ClassMapOracle, MaskConfig, RenovationRequest, Renovator, SurfaceDetector, SurfaceTexture,
//! };
//! use std::sync::Arc;
//!
//! let oracle = ClassMapOracle::from_files(&floor_map, Some(&wall_map))?;
//! let detector = SurfaceDetector::new(Arc::new(oracle), MaskConfig::default());
//! let renovator = Renovator::new(Arc::new(detector));
//!
//! let request = RenovationRequest::FloorOnly {
//!     room,
//!     floor: SurfaceTexture::floor(tile),
//! };
//! let renovation = renovator.renovate(request)?;
//! ```

pub mod codec;
pub mod color;
pub mod compositor;
pub mod error;
pub mod image_ops;
pub mod mask;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod oracle;
pub mod orchestrator;
pub mod tiles;
pub mod types;
pub mod warp;

// Re-export commonly used types and functions
pub use color::{format_hex_color, parse_hex_color, DEFAULT_FLOOR_GROUT, DEFAULT_WALL_GROUT};
pub use compositor::{blend_solid_color, blend_with_lighting, LightingParams};
pub use error::{Error, Result};
pub use mask::MaskPostProcessor;
#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;
pub use oracle::{ClassMapOracle, SegmentationOracle, Segmenter, SerializedOracle, SurfaceDetector};
pub use orchestrator::{
    PassReport, Renovation, RenovationReport, RenovationRequest, Renovator, RequestKind,
    SurfaceTexture,
};
pub use tiles::{generate_floor_tiles, generate_tile_pattern, generate_wall_tiles};
pub use types::{
    BoundingBox, ClassMap, MaskConfig, Point2D, RegionMask, Surface, TileSpec, WarpConfig,
};
pub use warp::{warp_to_floor, Homography, WarpedFloor};
