// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Segmentation source selection.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use roomtile_compositor::{ClassMapOracle, MaskConfig, SegmentationOracle, SurfaceDetector};
use std::sync::Arc;

/// Build the shared surface detector from whichever segmentation source is configured.
///
/// Models take precedence over precomputed class maps.
pub fn build_detector(config: &Config) -> Result<SurfaceDetector> {
    let masks = MaskConfig {
        min_region_fraction: config.min_wall_fraction,
        ..MaskConfig::default()
    };
    let oracle = build_oracle(config)?;
    Ok(SurfaceDetector::new(oracle, masks))
}

fn build_oracle(config: &Config) -> Result<Arc<dyn SegmentationOracle>> {
    if let Some(floor_model) = &config.floor_model {
        return model_oracle(floor_model, config);
    }

    let Some(floor_map) = &config.floor_class_map else {
        bail!("No floor segmentation source: pass --floor-map or --floor-model");
    };
    let oracle = ClassMapOracle::from_files(floor_map, config.wall_class_map.as_deref())
        .context("Failed to load class maps")?;
    tracing::info!(
        floor = %floor_map.display(),
        wall = config.wall_class_map.is_some(),
        "Using precomputed class maps"
    );
    Ok(Arc::new(oracle))
}

#[cfg(feature = "onnx")]
fn model_oracle(floor_model: &std::path::Path, config: &Config) -> Result<Arc<dyn SegmentationOracle>> {
    use roomtile_compositor::OnnxSegmenter;

    let segmenter = OnnxSegmenter::load(floor_model, config.wall_model.as_deref())
        .context("Failed to load segmentation models")?;
    Ok(Arc::new(segmenter.into_oracle()))
}

#[cfg(not(feature = "onnx"))]
fn model_oracle(floor_model: &std::path::Path, _config: &Config) -> Result<Arc<dyn SegmentationOracle>> {
    bail!(
        "Cannot load {}: roomtile was built without the `onnx` feature",
        floor_model.display()
    );
}
