// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Perspective warp of the floor pattern
//!
//! The floor plane is approximated by a trapezoid built around the bounding
//! box of the largest floor contour: the bottom edge is pushed outward and
//! both edges are pushed vertically, mimicking a floor receding toward a
//! vanishing point. This is a visual heuristic, not a camera model.

use crate::error::Result;
use crate::image_ops::resize_lanczos;
use crate::types::{BoundingBox, Point2D, RegionMask, WarpConfig};
use image::{Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

const EPS: f64 = 1e-12;

/// 3x3 planar projective transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Solve the homography mapping each `src[i]` onto `dst[i]`.
    ///
    /// Fixes `h33 = 1` and solves the remaining eight unknowns from the
    /// four correspondences. Returns `None` for degenerate (e.g. collinear)
    /// point sets.
    pub fn from_correspondences(src: &[Point2D; 4], dst: &[Point2D; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let r = 2 * i;
            a[(r, 0)] = s.x;
            a[(r, 1)] = s.y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -d.x * s.x;
            a[(r, 7)] = -d.x * s.y;
            b[r] = d.x;

            a[(r + 1, 3)] = s.x;
            a[(r + 1, 4)] = s.y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -d.y * s.x;
            a[(r + 1, 7)] = -d.y * s.y;
            b[r + 1] = d.y;
        }

        let h = a.lu().solve(&b)?;
        if h.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        if matrix.determinant().abs() <= EPS {
            return None;
        }
        Some(Self { matrix })
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Map a point; `None` when it lands on the line at infinity
    pub fn apply(&self, point: Point2D) -> Option<Point2D> {
        let v = self.matrix * Vector3::new(point.x, point.y, 1.0);
        if v[2].abs() <= EPS {
            return None;
        }
        Some(Point2D::new(v[0] / v[2], v[1] / v[2]))
    }

    /// Row-major `f32` projection usable by the `imageproc` resampler
    fn to_projection(self) -> Option<Projection> {
        let m = &self.matrix;
        Projection::from_matrix([
            m[(0, 0)] as f32,
            m[(0, 1)] as f32,
            m[(0, 2)] as f32,
            m[(1, 0)] as f32,
            m[(1, 1)] as f32,
            m[(1, 2)] as f32,
            m[(2, 0)] as f32,
            m[(2, 1)] as f32,
            m[(2, 2)] as f32,
        ])
    }
}

/// Enclosed area of a closed contour (shoelace formula)
fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x as f64 * points[j].y as f64;
        area -= points[j].x as f64 * points[i].y as f64;
    }
    (area / 2.0).abs()
}

fn bounding_box(contour: &Contour<i32>) -> Option<BoundingBox> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Bounding box of the external contour with the greatest enclosed area.
///
/// Ties keep the first contour found in scan order.
pub fn largest_contour_bounds(mask: &RegionMask) -> Option<BoundingBox> {
    let contours = find_contours::<i32>(mask.as_gray());

    let mut best: Option<(&Contour<i32>, f64)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        let area = contour_area(contour);
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((contour, area)),
        }
    }

    best.and_then(|(contour, _)| bounding_box(contour))
}

/// Destination trapezoid for a floor bounding box, ordered
/// bottom-left, bottom-right, top-right, top-left
pub fn floor_quad(bounds: &BoundingBox, config: &WarpConfig) -> [Point2D; 4] {
    let x = bounds.x as f64;
    let y = bounds.y as f64;
    let w = bounds.width as f64;
    let h = bounds.height as f64;
    let offset_x = w * config.horizontal_spread;
    let offset_y = h * config.vertical_spread;

    [
        Point2D::new(x - offset_x, y + h + offset_y),
        Point2D::new(x + w + offset_x, y + h + offset_y),
        Point2D::new(x + w, y - offset_y),
        Point2D::new(x, y - offset_y),
    ]
}

/// Pattern corners in the same order as [`floor_quad`]
pub fn pattern_corners(width: u32, height: u32) -> [Point2D; 4] {
    let w = width as f64;
    let h = height as f64;
    [
        Point2D::new(0.0, h),
        Point2D::new(w, h),
        Point2D::new(w, 0.0),
        Point2D::new(0.0, 0.0),
    ]
}

/// Result of warping a tile pattern onto the floor
#[derive(Debug, Clone)]
pub struct WarpedFloor {
    /// Room-sized image; pixels outside the floor quad are black
    pub image: RgbImage,
    /// Floor bounding box the warp was built from; `None` when unwarped
    pub bounds: Option<BoundingBox>,
}

/// Warp a tile pattern so it appears to lie on the detected floor.
///
/// With no floor contour (or a degenerate quad) the pattern is only
/// resized to the mask's dimensions.
pub fn warp_to_floor(pattern: &RgbImage, mask: &RegionMask, config: &WarpConfig) -> Result<WarpedFloor> {
    let (width, height) = mask.dimensions();
    let pattern = resize_lanczos(pattern, width, height);

    let unwarped = |pattern: RgbImage| WarpedFloor {
        image: pattern,
        bounds: None,
    };

    let bounds = match largest_contour_bounds(mask) {
        Some(bounds) => bounds,
        None => {
            tracing::debug!("No floor contour found, using unwarped pattern");
            return Ok(unwarped(pattern));
        }
    };

    let src = pattern_corners(width, height);
    let dst = floor_quad(&bounds, config);

    let projection = match Homography::from_correspondences(&src, &dst).and_then(Homography::to_projection) {
        Some(projection) => projection,
        None => {
            tracing::warn!(?bounds, "Degenerate floor quad, using unwarped pattern");
            return Ok(unwarped(pattern));
        }
    };

    tracing::debug!(
        x = bounds.x,
        y = bounds.y,
        w = bounds.width,
        h = bounds.height,
        "Warping floor pattern"
    );

    let image = warp(&pattern, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]));
    Ok(WarpedFloor {
        image,
        bounds: Some(bounds),
    })
}
