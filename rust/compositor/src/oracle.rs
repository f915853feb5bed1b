// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Segmentation oracles
//!
//! The pipeline treats semantic segmentation as a black box that maps a room
//! image to a per-pixel ADE20K class map. Implementations may be neural
//! models, precomputed maps, or test doubles.

use crate::codec::load_class_map;
use crate::error::{Error, Result};
use crate::mask::MaskPostProcessor;
use crate::types::{ClassMap, MaskConfig, RegionMask, Surface};
use image::RgbImage;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Thread-safe segmentation capability
pub trait SegmentationOracle: Send + Sync {
    /// Class map used for floor detection (floor = ADE20K label 3)
    fn segment_floor(&self, room: &RgbImage) -> Result<ClassMap>;

    /// Class map used for wall detection (wall = ADE20K label 0)
    fn segment_wall(&self, room: &RgbImage) -> Result<ClassMap>;

    /// Whether wall segmentation is available at all
    fn supports_walls(&self) -> bool {
        true
    }
}

/// Segmentation model that needs exclusive access while running inference
pub trait Segmenter: Send {
    fn segment_floor(&mut self, room: &RgbImage) -> Result<ClassMap>;
    fn segment_wall(&mut self, room: &RgbImage) -> Result<ClassMap>;
    fn supports_walls(&self) -> bool;
}

/// Serializes inference calls of a [`Segmenter`] behind a mutex.
///
/// Only the inference itself is locked; tile synthesis, warping and blending
/// of concurrent requests proceed in parallel.
pub struct SerializedOracle<S> {
    inner: Mutex<S>,
    wall_support: bool,
}

impl<S: Segmenter> SerializedOracle<S> {
    pub fn new(segmenter: S) -> Self {
        let wall_support = segmenter.supports_walls();
        Self {
            inner: Mutex::new(segmenter),
            wall_support,
        }
    }

    fn with_segmenter<T>(&self, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| Error::Oracle("segmentation model lock poisoned".into()))?;
        f(&mut guard)
    }
}

impl<S: Segmenter> SegmentationOracle for SerializedOracle<S> {
    fn segment_floor(&self, room: &RgbImage) -> Result<ClassMap> {
        self.with_segmenter(|s| s.segment_floor(room))
    }

    fn segment_wall(&self, room: &RgbImage) -> Result<ClassMap> {
        self.with_segmenter(|s| s.segment_wall(room))
    }

    fn supports_walls(&self) -> bool {
        self.wall_support
    }
}

/// Oracle serving precomputed class maps.
///
/// The maps may be at any resolution; they are resized to the room by the
/// mask post-processor. Without a wall map, wall support is unavailable.
#[derive(Debug, Clone)]
pub struct ClassMapOracle {
    floor: ClassMap,
    wall: Option<ClassMap>,
}

impl ClassMapOracle {
    pub fn new(floor: ClassMap, wall: Option<ClassMap>) -> Self {
        Self { floor, wall }
    }

    /// Load label maps stored as 8-bit grayscale images
    pub fn from_files(floor: &Path, wall: Option<&Path>) -> Result<Self> {
        let floor = load_class_map(floor)?;
        let wall = wall.map(load_class_map).transpose()?;
        Ok(Self::new(floor, wall))
    }
}

impl SegmentationOracle for ClassMapOracle {
    fn segment_floor(&self, _room: &RgbImage) -> Result<ClassMap> {
        Ok(self.floor.clone())
    }

    fn segment_wall(&self, _room: &RgbImage) -> Result<ClassMap> {
        self.wall
            .clone()
            .ok_or_else(|| Error::Oracle("no wall class map loaded".into()))
    }

    fn supports_walls(&self) -> bool {
        self.wall.is_some()
    }
}

/// Holds the oracle and turns its class maps into clean region masks.
///
/// Wall availability is read from the oracle once, at construction; when it
/// is unavailable every wall detection yields an empty mask.
pub struct SurfaceDetector {
    oracle: Arc<dyn SegmentationOracle>,
    masks: MaskPostProcessor,
    wall_support: bool,
}

impl SurfaceDetector {
    pub fn new(oracle: Arc<dyn SegmentationOracle>, config: MaskConfig) -> Self {
        let wall_support = oracle.supports_walls();
        if !wall_support {
            tracing::warn!("Wall segmentation unavailable, wall detection will return empty masks");
        }
        Self {
            oracle,
            masks: MaskPostProcessor::new(config),
            wall_support,
        }
    }

    pub fn wall_support(&self) -> bool {
        self.wall_support
    }

    /// Binary floor mask at the room's dimensions
    pub fn detect_floor(&self, room: &RgbImage) -> Result<RegionMask> {
        tracing::debug!("Detecting floor areas");
        let class_map = self.oracle.segment_floor(room)?;
        self.post_process(&class_map, Surface::Floor, room)
    }

    /// Binary wall mask at the room's dimensions; empty without wall support
    pub fn detect_wall(&self, room: &RgbImage) -> Result<RegionMask> {
        if !self.wall_support {
            tracing::debug!("Wall detection not available");
            return Ok(RegionMask::empty(room.width(), room.height()));
        }
        tracing::debug!("Detecting wall areas");
        let class_map = self.oracle.segment_wall(room)?;
        self.post_process(&class_map, Surface::Wall, room)
    }

    fn post_process(&self, class_map: &ClassMap, surface: Surface, room: &RgbImage) -> Result<RegionMask> {
        if class_map.width() == 0 || class_map.height() == 0 {
            return Err(Error::Oracle(format!("{} segmentation returned an empty class map", surface)));
        }
        Ok(self
            .masks
            .process(class_map, surface, room.width(), room.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    struct CountingSegmenter {
        calls: usize,
        walls: bool,
    }

    impl Segmenter for CountingSegmenter {
        fn segment_floor(&mut self, room: &RgbImage) -> Result<ClassMap> {
            self.calls += 1;
            Ok(ClassMap::from_pixel(room.width(), room.height(), Luma([3])))
        }

        fn segment_wall(&mut self, room: &RgbImage) -> Result<ClassMap> {
            self.calls += 1;
            Ok(ClassMap::from_pixel(room.width(), room.height(), Luma([0])))
        }

        fn supports_walls(&self) -> bool {
            self.walls
        }
    }

    #[test]
    fn test_serialized_oracle_forwards_calls() {
        let oracle = SerializedOracle::new(CountingSegmenter { calls: 0, walls: true });
        let room = RgbImage::new(8, 6);

        assert_eq!(oracle.segment_floor(&room).unwrap().dimensions(), (8, 6));
        assert_eq!(oracle.segment_wall(&room).unwrap().get_pixel(0, 0).0[0], 0);
        assert!(oracle.supports_walls());
        assert_eq!(oracle.inner.lock().unwrap().calls, 2);
    }

    #[test]
    fn test_detector_without_wall_support_returns_empty_mask() {
        let oracle = SerializedOracle::new(CountingSegmenter { calls: 0, walls: false });
        let detector = SurfaceDetector::new(Arc::new(oracle), MaskConfig::default());
        assert!(!detector.wall_support());

        let room = RgbImage::new(50, 40);
        let wall = detector.detect_wall(&room).unwrap();
        assert_eq!(wall.dimensions(), (50, 40));
        assert!(wall.is_empty());

        let floor = detector.detect_floor(&room).unwrap();
        assert_eq!(floor.area(), 50 * 40);
    }

    #[test]
    fn test_class_map_oracle_wall_support() {
        let floor = ClassMap::from_pixel(4, 4, Luma([3]));
        assert!(!ClassMapOracle::new(floor.clone(), None).supports_walls());

        let with_wall = ClassMapOracle::new(floor, Some(ClassMap::from_pixel(4, 4, Luma([0]))));
        assert!(with_wall.supports_walls());
        let map = with_wall.segment_wall(&RgbImage::new(1, 1)).unwrap();
        assert_eq!(map.dimensions(), (4, 4));
    }

    #[test]
    fn test_empty_class_map_is_an_oracle_error() {
        let oracle = ClassMapOracle::new(ClassMap::new(0, 0), None);
        let detector = SurfaceDetector::new(Arc::new(oracle), MaskConfig::default());
        let err = detector.detect_floor(&RgbImage::new(10, 10)).unwrap_err();
        assert!(matches!(err, Error::Oracle(_)));
    }
}
