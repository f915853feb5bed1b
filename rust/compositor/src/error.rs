// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for renovation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while renovating a room image
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid hex color {value:?}: expected 6 hex digits like #RRGGBB")]
    InvalidColor { value: String },

    #[error("Invalid tile grid {tiles_x}x{tiles_y}: both counts must be at least 1")]
    InvalidTileGrid { tiles_x: u32, tiles_y: u32 },

    #[error("Tile canvas {width}x{height} exceeds the limit of {limit} pixels")]
    TileCanvasTooLarge { width: u64, height: u64, limit: u64 },

    #[error("Empty image: {0} has zero width or height")]
    EmptyImage(&'static str),

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Failed to load image {}: {source}", .path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode image: {0}")]
    ImageEncode(#[source] image::ImageError),

    #[error("Failed to write image {}: {source}", .path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "onnx")]
    #[error("Failed to load segmentation model {}: {source}", .path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },

    #[error("Segmentation oracle error: {0}")]
    Oracle(String),

    #[error("Request exceeded its time budget of {budget_ms} ms during {stage}")]
    DeadlineExceeded { stage: &'static str, budget_ms: u64 },
}

impl Error {
    /// Whether the error was caused by bad caller input rather than by the pipeline
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidColor { .. }
                | Error::InvalidTileGrid { .. }
                | Error::EmptyImage(_)
                | Error::ImageLoad { .. }
                | Error::TileCanvasTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        let color = Error::InvalidColor {
            value: "red".into(),
        };
        assert!(color.is_validation());
        assert!(color.to_string().contains("\"red\""));

        let oracle = Error::Oracle("model crashed".into());
        assert!(!oracle.is_validation());

        let deadline = Error::DeadlineExceeded {
            stage: "floor mask",
            budget_ms: 50,
        };
        assert!(!deadline.is_validation());
        assert!(deadline.to_string().contains("floor mask"));
    }
}
