// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SegFormer (ADE20K) segmentation on ONNX Runtime

use crate::error::{Error, Result};
use crate::oracle::{SegmentationOracle, Segmenter, SerializedOracle};
use crate::types::ClassMap;
use image::imageops::{self, FilterType};
use image::{Luma, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;

/// Square input resolution expected by the SegFormer exports
pub const INPUT_SIZE: u32 = 512;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

fn load_session(path: &Path) -> Result<Session> {
    let model_err = |source| Error::ModelLoad {
        path: path.to_path_buf(),
        source,
    };
    Session::builder()
        .map_err(model_err)?
        .commit_from_file(path)
        .map_err(model_err)
}

fn inference_err(e: ort::Error) -> Error {
    Error::Oracle(format!("inference failed: {e}"))
}

/// Run one model and return the argmax class map at the logits' resolution
fn run_segmentation(session: &mut Session, room: &RgbImage) -> Result<ClassMap> {
    let resized = imageops::resize(room, INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3);

    let size = INPUT_SIZE as usize;
    let mut input = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }

    let input_val = Value::from_array(input).map_err(inference_err)?;
    let input_name = session
        .inputs
        .first()
        .map(|i| i.name.clone())
        .unwrap_or_else(|| "pixel_values".into());
    let outputs = session
        .run(ort::inputs![input_name => input_val])
        .map_err(inference_err)?;
    let logits = outputs[0].try_extract_array::<f32>().map_err(inference_err)?;

    // (1, classes, H/4, W/4) or (classes, H/4, W/4)
    let shape = logits.shape().to_vec();
    let (num_classes, oh, ow) = match shape.len() {
        4 => (shape[1], shape[2], shape[3]),
        3 => (shape[0], shape[1], shape[2]),
        _ => return Err(Error::Oracle(format!("unexpected logits shape {:?}", shape))),
    };
    if num_classes == 0 || oh == 0 || ow == 0 {
        return Err(Error::Oracle(format!("empty logits shape {:?}", shape)));
    }

    let flat: Vec<f32> = logits.iter().copied().collect();
    let class_map = ClassMap::from_fn(ow as u32, oh as u32, |x, y| {
        let offset = y as usize * ow + x as usize;
        let mut best = (0usize, f32::MIN);
        for c in 0..num_classes {
            let value = flat[c * oh * ow + offset];
            if value > best.1 {
                best = (c, value);
            }
        }
        Luma([best.0.min(u8::MAX as usize) as u8])
    });

    tracing::debug!(classes = num_classes, width = ow, height = oh, "Segmentation inference done");
    Ok(class_map)
}

/// SegFormer floor model plus an optional wall model
pub struct OnnxSegmenter {
    floor: Session,
    wall: Option<Session>,
}

impl OnnxSegmenter {
    /// Load the floor model (required) and the wall model (optional).
    ///
    /// A wall model that fails to load is logged and leaves wall support off.
    pub fn load(floor_model: &Path, wall_model: Option<&Path>) -> Result<Self> {
        let floor = load_session(floor_model)?;
        tracing::info!(path = %floor_model.display(), "Floor segmentation model loaded");

        let wall = match wall_model {
            Some(path) => match load_session(path) {
                Ok(session) => {
                    tracing::info!(path = %path.display(), "Wall segmentation model loaded");
                    Some(session)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not load wall segmentation model");
                    None
                }
            },
            None => None,
        };

        Ok(Self { floor, wall })
    }

    /// Wrap in a mutex so the models can be shared across request threads
    pub fn into_oracle(self) -> impl SegmentationOracle {
        SerializedOracle::new(self)
    }
}

impl Segmenter for OnnxSegmenter {
    fn segment_floor(&mut self, room: &RgbImage) -> Result<ClassMap> {
        run_segmentation(&mut self.floor, room)
    }

    fn segment_wall(&mut self, room: &RgbImage) -> Result<ClassMap> {
        match self.wall.as_mut() {
            Some(session) => run_segmentation(session, room),
            None => Err(Error::Oracle("wall segmentation model not loaded".into())),
        }
    }

    fn supports_walls(&self) -> bool {
        self.wall.is_some()
    }
}
