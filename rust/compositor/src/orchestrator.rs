// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Renovation orchestration
//!
//! Dispatches the five request shapes onto shared floor and wall passes.
//! Two-pass requests run strictly in sequence: the wall pass sees the floor
//! pass's output as its room, for segmentation, lighting and blending alike.

use crate::color::parse_hex_color;
use crate::compositor::{blend_solid_color, blend_with_lighting};
use crate::error::{Error, Result};
use crate::oracle::SurfaceDetector;
use crate::tiles::{generate_floor_tiles, generate_wall_tiles};
use crate::types::{BoundingBox, Surface, TileSpec, WarpConfig};
use crate::warp::warp_to_floor;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// A tile texture together with its grid parameters
#[derive(Debug, Clone)]
pub struct SurfaceTexture {
    pub texture: RgbImage,
    pub spec: TileSpec,
}

impl SurfaceTexture {
    pub fn new(texture: RgbImage, spec: TileSpec) -> Self {
        Self { texture, spec }
    }

    /// Texture with the default floor grid
    pub fn floor(texture: RgbImage) -> Self {
        Self::new(texture, TileSpec::floor_default())
    }

    /// Texture with the default wall grid
    pub fn wall(texture: RgbImage) -> Self {
        Self::new(texture, TileSpec::wall_default())
    }
}

/// One renovation request; owns its images and is consumed by the call
#[derive(Debug, Clone)]
pub enum RenovationRequest {
    FloorOnly {
        room: RgbImage,
        floor: SurfaceTexture,
    },
    WallTexture {
        room: RgbImage,
        wall: SurfaceTexture,
    },
    WallColor {
        room: RgbImage,
        color: Rgb<u8>,
    },
    Complete {
        room: RgbImage,
        floor: SurfaceTexture,
        wall: SurfaceTexture,
    },
    FloorAndWallColor {
        room: RgbImage,
        floor: SurfaceTexture,
        color: Rgb<u8>,
    },
}

impl RenovationRequest {
    /// Wall recolor from a `#RRGGBB` string; a malformed color fails the request
    pub fn wall_color_hex(room: RgbImage, color: &str) -> Result<Self> {
        Ok(Self::WallColor {
            room,
            color: parse_hex_color(color)?,
        })
    }

    /// Floor tiling plus wall recolor from a `#RRGGBB` string
    pub fn floor_and_wall_color_hex(room: RgbImage, floor: SurfaceTexture, color: &str) -> Result<Self> {
        Ok(Self::FloorAndWallColor {
            room,
            floor,
            color: parse_hex_color(color)?,
        })
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Self::FloorOnly { .. } => RequestKind::FloorTiling,
            Self::WallTexture { .. } => RequestKind::WallTiling,
            Self::WallColor { .. } => RequestKind::WallColoring,
            Self::Complete { .. } => RequestKind::CompleteTiling,
            Self::FloorAndWallColor { .. } => RequestKind::FloorTilingWallColoring,
        }
    }

    pub fn room(&self) -> &RgbImage {
        match self {
            Self::FloorOnly { room, .. }
            | Self::WallTexture { room, .. }
            | Self::WallColor { room, .. }
            | Self::Complete { room, .. }
            | Self::FloorAndWallColor { room, .. } => room,
        }
    }
}

/// Request shape tag, as reported and logged
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    FloorTiling,
    WallTiling,
    WallColoring,
    CompleteTiling,
    FloorTilingWallColoring,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::FloorTiling => "floor-tiling",
            RequestKind::WallTiling => "wall-tiling",
            RequestKind::WallColoring => "wall-coloring",
            RequestKind::CompleteTiling => "complete-tiling",
            RequestKind::FloorTilingWallColoring => "floor-tiling-wall-coloring",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single surface pass did
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassReport {
    pub surface: Surface,
    /// Member pixels of the region mask
    pub mask_area: u64,
    /// Floor bounding box used for the perspective warp, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warp_bounds: Option<BoundingBox>,
    /// True when the pass left its input untouched (empty mask)
    pub skipped: bool,
}

/// Summary of a finished request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenovationReport {
    pub kind: RequestKind,
    pub width: u32,
    pub height: u32,
    pub passes: Vec<PassReport>,
    pub elapsed_ms: u64,
}

impl RenovationReport {
    pub fn pass(&self, surface: Surface) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.surface == surface)
    }
}

/// Composite image plus its report
#[derive(Debug, Clone)]
pub struct Renovation {
    pub image: RgbImage,
    pub report: RenovationReport,
}

/// Wall-clock budget of one request, checked between stages
struct Deadline {
    start: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    fn new(budget: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    fn check(&self, stage: &'static str) -> Result<()> {
        match self.budget {
            Some(budget) if self.start.elapsed() >= budget => Err(Error::DeadlineExceeded {
                stage,
                budget_ms: budget.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

enum WallFill<'a> {
    Texture(&'a SurfaceTexture),
    Color(Rgb<u8>),
}

/// Runs renovation requests against a shared surface detector.
///
/// The renovator is immutable once built and can serve concurrent requests.
#[derive(Clone)]
pub struct Renovator {
    detector: Arc<SurfaceDetector>,
    warp: WarpConfig,
    time_budget: Option<Duration>,
}

impl Renovator {
    pub fn new(detector: Arc<SurfaceDetector>) -> Self {
        Self {
            detector,
            warp: WarpConfig::default(),
            time_budget: None,
        }
    }

    pub fn with_warp_config(mut self, warp: WarpConfig) -> Self {
        self.warp = warp;
        self
    }

    /// Abort requests that run longer than `budget`
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn detector(&self) -> &SurfaceDetector {
        &self.detector
    }

    pub fn warp_config(&self) -> &WarpConfig {
        &self.warp
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget
    }

    /// Run one request to completion
    #[instrument(name = "renovate", skip_all, fields(kind = %request.kind()))]
    pub fn renovate(&self, request: RenovationRequest) -> Result<Renovation> {
        let deadline = Deadline::new(self.time_budget);
        let kind = request.kind();
        let (width, height) = request.room().dimensions();
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage("room image"));
        }
        deadline.check("start")?;

        let mut passes = Vec::with_capacity(2);
        let image = match request {
            RenovationRequest::FloorOnly { room, floor } => {
                self.floor_pass(&room, &floor, &deadline, &mut passes)?
            }
            RenovationRequest::WallTexture { room, wall } => {
                self.wall_pass(&room, WallFill::Texture(&wall), &deadline, &mut passes)?
            }
            RenovationRequest::WallColor { room, color } => {
                self.wall_pass(&room, WallFill::Color(color), &deadline, &mut passes)?
            }
            RenovationRequest::Complete { room, floor, wall } => {
                let floored = self.floor_pass(&room, &floor, &deadline, &mut passes)?;
                self.wall_pass(&floored, WallFill::Texture(&wall), &deadline, &mut passes)?
            }
            RenovationRequest::FloorAndWallColor { room, floor, color } => {
                let floored = self.floor_pass(&room, &floor, &deadline, &mut passes)?;
                self.wall_pass(&floored, WallFill::Color(color), &deadline, &mut passes)?
            }
        };

        let report = RenovationReport {
            kind,
            width,
            height,
            passes,
            elapsed_ms: deadline.elapsed_ms(),
        };
        tracing::info!(
            kind = %kind,
            width,
            height,
            elapsed_ms = report.elapsed_ms,
            "Renovation complete"
        );

        Ok(Renovation { image, report })
    }

    /// Tile pattern, floor mask, perspective warp, floor-lit blend
    fn floor_pass(
        &self,
        room: &RgbImage,
        floor: &SurfaceTexture,
        deadline: &Deadline,
        passes: &mut Vec<PassReport>,
    ) -> Result<RgbImage> {
        let (width, height) = room.dimensions();
        let pattern = generate_floor_tiles(&floor.texture, width, height, &floor.spec)?;
        deadline.check("floor tiles")?;

        let mask = self.detector.detect_floor(room)?;
        deadline.check("floor mask")?;

        let warped = warp_to_floor(&pattern, &mask, &self.warp)?;
        deadline.check("floor warp")?;

        let image = blend_with_lighting(room, &warped.image, &mask, Surface::Floor)?;
        deadline.check("floor blend")?;

        passes.push(PassReport {
            surface: Surface::Floor,
            mask_area: mask.area(),
            warp_bounds: warped.bounds,
            skipped: mask.is_empty(),
        });
        Ok(image)
    }

    /// Wall mask, then either a wall tile pattern or a flat color, wall-lit
    fn wall_pass(
        &self,
        room: &RgbImage,
        fill: WallFill<'_>,
        deadline: &Deadline,
        passes: &mut Vec<PassReport>,
    ) -> Result<RgbImage> {
        let (width, height) = room.dimensions();

        let mask = self.detector.detect_wall(room)?;
        deadline.check("wall mask")?;

        let mut report = PassReport {
            surface: Surface::Wall,
            mask_area: mask.area(),
            warp_bounds: None,
            skipped: false,
        };

        let image = match fill {
            WallFill::Texture(wall) => {
                let pattern = generate_wall_tiles(&wall.texture, width, height, &wall.spec)?;
                deadline.check("wall tiles")?;
                report.skipped = mask.is_empty();
                blend_with_lighting(room, &pattern, &mask, Surface::Wall)?
            }
            WallFill::Color(color) => {
                if mask.is_empty() {
                    tracing::info!("No walls detected, returning room unchanged");
                    report.skipped = true;
                    room.clone()
                } else {
                    blend_solid_color(room, color, &mask, Surface::Wall)?
                }
            }
        };
        deadline.check("wall blend")?;

        passes.push(report);
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kind_names() {
        let kinds = [
            (RequestKind::FloorTiling, "\"floor-tiling\""),
            (RequestKind::WallTiling, "\"wall-tiling\""),
            (RequestKind::WallColoring, "\"wall-coloring\""),
            (RequestKind::CompleteTiling, "\"complete-tiling\""),
            (RequestKind::FloorTilingWallColoring, "\"floor-tiling-wall-coloring\""),
        ];
        for (kind, json) in kinds {
            assert_eq!(serde_json::to_string(&kind).unwrap(), json);
            assert_eq!(format!("\"{}\"", kind), json);
        }
    }

    #[test]
    fn test_malformed_hex_fails_request_construction() {
        let room = RgbImage::new(4, 4);
        let err = RenovationRequest::wall_color_hex(room, "red").unwrap_err();
        assert!(err.is_validation());

        let room = RgbImage::new(4, 4);
        let request = RenovationRequest::wall_color_hex(room, "#FF5733").unwrap();
        assert_eq!(request.kind(), RequestKind::WallColoring);
    }

    #[test]
    fn test_zero_budget_deadline_fails_immediately() {
        let deadline = Deadline::new(Some(Duration::ZERO));
        match deadline.check("start") {
            Err(Error::DeadlineExceeded { stage, budget_ms }) => {
                assert_eq!(stage, "start");
                assert_eq!(budget_ms, 0);
            }
            other => panic!("expected DeadlineExceeded, got {:?}", other),
        }
        assert!(Deadline::new(None).check("start").is_ok());
    }
}
