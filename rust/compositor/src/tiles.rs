// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tile pattern synthesis
//!
//! A pattern is a regular grid of resized copies of a texture separated by
//! solid grout lines, finally resized to exactly the room's pixel size.

use crate::error::{Error, Result};
use crate::image_ops::resize_lanczos;
use crate::types::{Surface, TileSpec};
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Canvases above this many pixels are always rejected as too large,
/// unless the room itself is bigger (see [`canvas_pixel_limit`])
pub const MIN_CANVAS_PIXEL_LIMIT: u64 = 1 << 24;

/// How many times the room area an oversubscribed canvas may cover
pub const CANVAS_AREA_FACTOR: u64 = 64;

/// Edge length of a single tile along one axis.
///
/// `available / count` uses floor division so an oversubscribed grid (negative
/// available space) still lands on `minimum` instead of wrapping.
fn tile_extent(room: u32, count: u32, grout: u32, minimum: u32) -> u32 {
    let available = room as i128 - grout as i128 * (count as i128 + 1);
    let per_tile = available.div_euclid(count as i128);
    // Never above `room`, so it fits back into u32
    per_tile.max(minimum as i128) as u32
}

/// `tile * count + grout * (count + 1)`, or `None` on overflow
fn canvas_extent(tile: u32, count: u32, grout: u32) -> Option<u64> {
    let tiles = (tile as u64).checked_mul(count as u64)?;
    let grout = (grout as u64).checked_mul(count as u64 + 1)?;
    tiles.checked_add(grout)
}

/// Largest canvas, in pixels, allowed before the final resize to the room
pub fn canvas_pixel_limit(room_width: u32, room_height: u32) -> u64 {
    (room_width as u64 * room_height as u64)
        .saturating_mul(CANVAS_AREA_FACTOR)
        .max(MIN_CANVAS_PIXEL_LIMIT)
}

/// Pixel size of one tile for the given room size, spec and surface
pub fn tile_size(room_width: u32, room_height: u32, spec: &TileSpec, surface: Surface) -> (u32, u32) {
    let minimum = surface.min_tile_size();
    (
        tile_extent(room_width, spec.tiles_x, spec.grout_width, minimum),
        tile_extent(room_height, spec.tiles_y, spec.grout_width, minimum),
    )
}

/// Canvas dimensions for a grid, rejecting sizes that overflow or exceed
/// [`canvas_pixel_limit`]
fn checked_canvas_size(
    room_width: u32,
    room_height: u32,
    (tile_w, tile_h): (u32, u32),
    spec: &TileSpec,
) -> Result<(u32, u32)> {
    let limit = canvas_pixel_limit(room_width, room_height);
    let too_large = |width: Option<u64>, height: Option<u64>| Error::TileCanvasTooLarge {
        width: width.unwrap_or(u64::MAX),
        height: height.unwrap_or(u64::MAX),
        limit,
    };

    let width = canvas_extent(tile_w, spec.tiles_x, spec.grout_width);
    let height = canvas_extent(tile_h, spec.tiles_y, spec.grout_width);
    let (w, h) = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        _ => return Err(too_large(width, height)),
    };

    let fits = w
        .checked_mul(h)
        .map_or(false, |pixels| pixels <= limit);
    match (u32::try_from(w), u32::try_from(h)) {
        (Ok(cw), Ok(ch)) if fits => Ok((cw, ch)),
        _ => Err(too_large(width, height)),
    }
}

/// Build the grout-filled canvas with every tile pasted, before the final resize.
///
/// The canvas measures `tile_w * tx + g * (tx + 1)` by `tile_h * ty + g * (ty + 1)`.
/// Grids whose canvas would exceed [`canvas_pixel_limit`] are rejected with
/// [`Error::TileCanvasTooLarge`] before anything is allocated.
pub fn build_tile_canvas(
    texture: &RgbImage,
    room_width: u32,
    room_height: u32,
    spec: &TileSpec,
    surface: Surface,
) -> Result<RgbImage> {
    spec.validate()?;
    if texture.width() == 0 || texture.height() == 0 {
        return Err(Error::EmptyImage("tile texture"));
    }
    if room_width == 0 || room_height == 0 {
        return Err(Error::EmptyImage("room image"));
    }

    let (tile_w, tile_h) = tile_size(room_width, room_height, spec, surface);

    let grout = spec.grout_width;
    let (canvas_w, canvas_h) = checked_canvas_size(room_width, room_height, (tile_w, tile_h), spec)?;
    let tile = imageops::resize(texture, tile_w, tile_h, FilterType::Lanczos3);
    let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, spec.grout_rgb());

    for row in 0..spec.tiles_y {
        for col in 0..spec.tiles_x {
            // Bounded by the canvas size checked above
            let paste_x = grout + col * (tile_w + grout);
            let paste_y = grout + row * (tile_h + grout);
            imageops::replace(&mut canvas, &tile, paste_x as i64, paste_y as i64);
        }
    }

    tracing::debug!(
        surface = %surface,
        tiles_x = spec.tiles_x,
        tiles_y = spec.tiles_y,
        tile_w,
        tile_h,
        canvas_w,
        canvas_h,
        "Built tile canvas"
    );

    Ok(canvas)
}

/// Generate a room-sized tile pattern for the given surface
pub fn generate_tile_pattern(
    texture: &RgbImage,
    room_width: u32,
    room_height: u32,
    spec: &TileSpec,
    surface: Surface,
) -> Result<RgbImage> {
    let canvas = build_tile_canvas(texture, room_width, room_height, spec, surface)?;
    Ok(resize_lanczos(&canvas, room_width, room_height))
}

/// Floor pattern: minimum tile edge of 10 pixels
pub fn generate_floor_tiles(
    texture: &RgbImage,
    room_width: u32,
    room_height: u32,
    spec: &TileSpec,
) -> Result<RgbImage> {
    generate_tile_pattern(texture, room_width, room_height, spec, Surface::Floor)
}

/// Wall pattern: minimum tile edge of 8 pixels
pub fn generate_wall_tiles(
    texture: &RgbImage,
    room_width: u32,
    room_height: u32,
    spec: &TileSpec,
) -> Result<RgbImage> {
    generate_tile_pattern(texture, room_width, room_height, spec, Surface::Wall)
}
