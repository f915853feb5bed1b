// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Roomtile - re-tile floors and re-tile or re-color walls in room photos.
//!
//! # Commands
//!
//! - `floor` - tile the floor with a texture
//! - `wall` - tile the walls with a texture
//! - `wall-color` - paint the walls a flat `#RRGGBB` color
//! - `complete` - tile the floor, then the walls
//! - `floor-wall-color` - tile the floor, then paint the walls
//!
//! Every command accepts one or more room images. With several rooms the
//! output path is a directory and the rooms are rendered in parallel.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use image::{Rgb, RgbImage};
use rayon::prelude::*;
use roomtile_compositor::{
    codec, parse_hex_color, RenovationReport, RenovationRequest, Renovator, SurfaceTexture,
    TileSpec,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

mod config;
mod detector;

use config::Config;

/// Re-surface floors and walls in room photos.
#[derive(Parser, Debug)]
#[command(name = "roomtile")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    segmentation: SegmentationArgs,

    /// Abort a room that takes longer than this many seconds.
    #[arg(long, global = true, value_name = "SECS")]
    time_budget: Option<u64>,

    /// Worker threads for multi-room runs.
    #[arg(long, global = true, value_name = "INT")]
    threads: Option<usize>,

    /// Print a JSON report per room on stdout.
    #[arg(long, global = true)]
    report: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct SegmentationArgs {
    /// Precomputed floor class map (8-bit image of ADE20K labels).
    #[arg(long, global = true, value_name = "PATH")]
    floor_map: Option<PathBuf>,

    /// Precomputed wall class map; without one walls are never detected.
    #[arg(long, global = true, value_name = "PATH")]
    wall_map: Option<PathBuf>,

    /// SegFormer ONNX model for floors (requires the `onnx` feature).
    #[arg(long, global = true, value_name = "PATH")]
    floor_model: Option<PathBuf>,

    /// SegFormer ONNX model for walls (requires the `onnx` feature).
    #[arg(long, global = true, value_name = "PATH")]
    wall_model: Option<PathBuf>,

    /// Drop wall regions smaller than this fraction of the image.
    #[arg(long, global = true, value_name = "FLOAT")]
    min_wall_fraction: Option<f64>,
}

#[derive(Args, Debug)]
struct RoomArgs {
    /// Room photo(s).
    #[arg(required = true, value_name = "ROOM")]
    rooms: Vec<PathBuf>,

    /// Output file, or output directory when several rooms are given.
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    /// Image format for files written into an output directory.
    #[arg(long, value_enum, default_value_t = Format::Png)]
    format: Format,
}

#[derive(Args, Debug)]
struct FloorGrid {
    /// Floor tiles across the room width.
    #[arg(long, default_value = "25", value_name = "INT")]
    floor_tiles_x: u32,

    /// Floor tiles across the room height.
    #[arg(long, default_value = "18", value_name = "INT")]
    floor_tiles_y: u32,

    /// Floor grout line width in pixels.
    #[arg(long, default_value = "2", value_name = "INT")]
    floor_grout_width: u32,

    /// Floor grout color.
    #[arg(long, default_value = "#F0EBE4", value_name = "HEX")]
    floor_grout_color: String,
}

#[derive(Args, Debug)]
struct WallGrid {
    /// Wall tiles across the room width.
    #[arg(long, default_value = "20", value_name = "INT")]
    wall_tiles_x: u32,

    /// Wall tiles across the room height.
    #[arg(long, default_value = "15", value_name = "INT")]
    wall_tiles_y: u32,

    /// Wall grout line width in pixels.
    #[arg(long, default_value = "2", value_name = "INT")]
    wall_grout_width: u32,

    /// Wall grout color.
    #[arg(long, default_value = "#F5F0EB", value_name = "HEX")]
    wall_grout_color: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tile the floor.
    Floor {
        #[command(flatten)]
        rooms: RoomArgs,
        /// Floor tile texture.
        #[arg(long, value_name = "PATH")]
        tile: PathBuf,
        #[command(flatten)]
        grid: FloorGrid,
    },
    /// Tile the walls.
    Wall {
        #[command(flatten)]
        rooms: RoomArgs,
        /// Wall tile texture.
        #[arg(long, value_name = "PATH")]
        tile: PathBuf,
        #[command(flatten)]
        grid: WallGrid,
    },
    /// Paint the walls a flat color.
    WallColor {
        #[command(flatten)]
        rooms: RoomArgs,
        /// Wall color as #RRGGBB.
        #[arg(long, value_name = "HEX")]
        color: String,
    },
    /// Tile the floor, then the walls.
    Complete {
        #[command(flatten)]
        rooms: RoomArgs,
        /// Floor tile texture.
        #[arg(long, value_name = "PATH")]
        floor_tile: PathBuf,
        /// Wall tile texture.
        #[arg(long, value_name = "PATH")]
        wall_tile: PathBuf,
        #[command(flatten)]
        floor_grid: FloorGrid,
        #[command(flatten)]
        wall_grid: WallGrid,
    },
    /// Tile the floor, then paint the walls.
    FloorWallColor {
        #[command(flatten)]
        rooms: RoomArgs,
        /// Floor tile texture.
        #[arg(long, value_name = "PATH")]
        floor_tile: PathBuf,
        /// Wall color as #RRGGBB.
        #[arg(long, value_name = "HEX")]
        color: String,
        #[command(flatten)]
        floor_grid: FloorGrid,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Png,
    Jpeg,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Png => "png",
            Format::Jpeg => "jpg",
        }
    }
}

/// Everything a request needs apart from the room; shared by all rooms of a run
enum Template {
    Floor(SurfaceTexture),
    Wall(SurfaceTexture),
    WallColor(Rgb<u8>),
    Complete(SurfaceTexture, SurfaceTexture),
    FloorWallColor(SurfaceTexture, Rgb<u8>),
}

impl Template {
    fn request(&self, room: RgbImage) -> RenovationRequest {
        match self {
            Template::Floor(floor) => RenovationRequest::FloorOnly {
                room,
                floor: floor.clone(),
            },
            Template::Wall(wall) => RenovationRequest::WallTexture {
                room,
                wall: wall.clone(),
            },
            Template::WallColor(color) => RenovationRequest::WallColor { room, color: *color },
            Template::Complete(floor, wall) => RenovationRequest::Complete {
                room,
                floor: floor.clone(),
                wall: wall.clone(),
            },
            Template::FloorWallColor(floor, color) => RenovationRequest::FloorAndWallColor {
                room,
                floor: floor.clone(),
                color: *color,
            },
        }
    }
}

fn load_texture(path: &Path, spec: TileSpec) -> Result<SurfaceTexture> {
    let texture = codec::load_rgb(path).context("Failed to load tile texture")?;
    Ok(SurfaceTexture::new(texture, spec))
}

fn parse_color(value: &str) -> Result<Rgb<u8>> {
    parse_hex_color(value).with_context(|| format!("Invalid color {value:?}"))
}

impl FloorGrid {
    fn spec(&self) -> Result<TileSpec> {
        Ok(TileSpec::new(
            self.floor_tiles_x,
            self.floor_tiles_y,
            self.floor_grout_width,
            parse_color(&self.floor_grout_color)?,
        ))
    }
}

impl WallGrid {
    fn spec(&self) -> Result<TileSpec> {
        Ok(TileSpec::new(
            self.wall_tiles_x,
            self.wall_tiles_y,
            self.wall_grout_width,
            parse_color(&self.wall_grout_color)?,
        ))
    }
}

impl Command {
    fn rooms(&self) -> &RoomArgs {
        match self {
            Command::Floor { rooms, .. }
            | Command::Wall { rooms, .. }
            | Command::WallColor { rooms, .. }
            | Command::Complete { rooms, .. }
            | Command::FloorWallColor { rooms, .. } => rooms,
        }
    }

    /// Parse colors and load textures up front so bad input fails before any room is read
    fn template(&self) -> Result<Template> {
        Ok(match self {
            Command::Floor { tile, grid, .. } => Template::Floor(load_texture(tile, grid.spec()?)?),
            Command::Wall { tile, grid, .. } => Template::Wall(load_texture(tile, grid.spec()?)?),
            Command::WallColor { color, .. } => Template::WallColor(parse_color(color)?),
            Command::Complete {
                floor_tile,
                wall_tile,
                floor_grid,
                wall_grid,
                ..
            } => Template::Complete(
                load_texture(floor_tile, floor_grid.spec()?)?,
                load_texture(wall_tile, wall_grid.spec()?)?,
            ),
            Command::FloorWallColor {
                floor_tile,
                color,
                floor_grid,
                ..
            } => Template::FloorWallColor(
                load_texture(floor_tile, floor_grid.spec()?)?,
                parse_color(color)?,
            ),
        })
    }
}

/// One line of `--report` output
#[derive(Serialize)]
struct RoomReport<'a> {
    room: &'a Path,
    output: &'a Path,
    #[serde(flatten)]
    report: &'a RenovationReport,
}

fn output_path(args: &RoomArgs, room: &Path) -> PathBuf {
    if args.rooms.len() == 1 {
        return args.output.clone();
    }
    let stem = room
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "room".into());
    args.output
        .join(format!("{stem}.{}", args.format.extension()))
}

/// Output path of every room, in order; two rooms sharing a file stem would
/// overwrite each other's composite, so that is an error
fn output_paths(args: &RoomArgs) -> Result<Vec<PathBuf>> {
    let mut seen: HashMap<PathBuf, &Path> = HashMap::new();
    let mut outputs = Vec::with_capacity(args.rooms.len());
    for room in &args.rooms {
        let output = output_path(args, room);
        if let Some(first) = seen.insert(output.clone(), room) {
            bail!(
                "Rooms {} and {} would both be written to {}",
                first.display(),
                room.display(),
                output.display()
            );
        }
        outputs.push(output);
    }
    Ok(outputs)
}

fn render_room(
    renovator: &Renovator,
    template: &Template,
    room_path: &Path,
    output: &Path,
) -> Result<RenovationReport> {
    let room = codec::load_rgb(room_path).context("Failed to load room image")?;
    let renovation = renovator
        .renovate(template.request(room))
        .context("Renovation failed")?;
    codec::save(&renovation.image, output).context("Failed to write output")?;
    Ok(renovation.report)
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    let seg = &cli.segmentation;
    if seg.floor_map.is_some() {
        config.floor_class_map = seg.floor_map.clone();
    }
    if seg.wall_map.is_some() {
        config.wall_class_map = seg.wall_map.clone();
    }
    if seg.floor_model.is_some() {
        config.floor_model = seg.floor_model.clone();
    }
    if seg.wall_model.is_some() {
        config.wall_model = seg.wall_model.clone();
    }
    if let Some(fraction) = seg.min_wall_fraction {
        config.min_wall_fraction = fraction;
    }
    if cli.time_budget.is_some() {
        config.time_budget_secs = cli.time_budget;
    }
    if let Some(threads) = cli.threads {
        config.worker_threads = threads;
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "info,roomtile_compositor=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            tracing::error!(failed, "Some rooms could not be renovated");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns the number of rooms that failed
fn run(cli: &Cli) -> Result<usize> {
    let mut config = Config::from_env();
    apply_overrides(&mut config, cli);

    let args = cli.command.rooms();
    let template = cli.command.template()?;
    let outputs = output_paths(args)?;

    let detector = detector::build_detector(&config)?;
    let mut renovator = Renovator::new(Arc::new(detector));
    if let Some(budget) = config.time_budget() {
        renovator = renovator.with_time_budget(budget);
    }

    tracing::info!(
        rooms = args.rooms.len(),
        worker_threads = config.worker_threads,
        wall_support = renovator.detector().wall_support(),
        time_budget_secs = ?config.time_budget_secs,
        "Starting roomtile"
    );

    if args.rooms.len() > 1 {
        std::fs::create_dir_all(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?;
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads.max(1))
        .build()
        .context("Failed to build worker pool")?;

    let results: Vec<(PathBuf, PathBuf, Result<RenovationReport>)> = pool.install(|| {
        args.rooms
            .par_iter()
            .zip(outputs.par_iter())
            .map(|(room, output)| {
                let result = render_room(&renovator, &template, room, output);
                (room.clone(), output.clone(), result)
            })
            .collect()
    });

    let mut failed = 0;
    for (room, output, result) in &results {
        match result {
            Ok(report) => {
                tracing::info!(
                    room = %room.display(),
                    output = %output.display(),
                    elapsed_ms = report.elapsed_ms,
                    "Room renovated"
                );
                if cli.report {
                    let line = serde_json::to_string(&RoomReport {
                        room,
                        output,
                        report,
                    })?;
                    println!("{line}");
                }
            }
            Err(err) => {
                failed += 1;
                tracing::error!(room = %room.display(), "{err:#}");
            }
        }
    }

    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_complete_command() {
        let cli = Cli::try_parse_from([
            "roomtile",
            "complete",
            "room.jpg",
            "-o",
            "out.png",
            "--floor-tile",
            "floor.png",
            "--wall-tile",
            "wall.png",
            "--floor-map",
            "floor_labels.png",
            "--wall-tiles-x",
            "8",
        ])
        .unwrap();

        assert_eq!(cli.segmentation.floor_map, Some(PathBuf::from("floor_labels.png")));
        match &cli.command {
            Command::Complete {
                floor_grid,
                wall_grid,
                ..
            } => {
                assert_eq!(floor_grid.floor_tiles_x, 25);
                assert_eq!(wall_grid.wall_tiles_x, 8);
                assert_eq!(wall_grid.spec().unwrap().grout_color, [245, 240, 235]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bad_color_fails_before_loading_anything() {
        let cli = Cli::try_parse_from([
            "roomtile",
            "wall-color",
            "room.jpg",
            "-o",
            "out.png",
            "--color",
            "red",
        ])
        .unwrap();
        assert!(cli.command.template().is_err());
    }

    #[test]
    fn test_output_paths_for_many_rooms() {
        let cli = Cli::try_parse_from([
            "roomtile",
            "wall-color",
            "a/kitchen.jpg",
            "b/bath.png",
            "-o",
            "out",
            "--format",
            "jpeg",
            "--color",
            "#FFFFFF",
        ])
        .unwrap();
        let args = cli.command.rooms();
        assert_eq!(
            output_path(args, Path::new("a/kitchen.jpg")),
            PathBuf::from("out/kitchen.jpg")
        );
        assert_eq!(output_path(args, Path::new("b/bath.png")), PathBuf::from("out/bath.jpg"));
    }

    #[test]
    fn test_rooms_sharing_a_stem_are_rejected() {
        let cli = Cli::try_parse_from([
            "roomtile",
            "wall-color",
            "a/kitchen.jpg",
            "b/kitchen.jpg",
            "-o",
            "out",
            "--color",
            "#FFFFFF",
        ])
        .unwrap();
        let err = output_paths(cli.command.rooms()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("a/kitchen.jpg"), "{message}");
        assert!(message.contains("b/kitchen.jpg"), "{message}");
    }

    #[test]
    fn test_distinct_stems_keep_room_order() {
        let cli = Cli::try_parse_from([
            "roomtile",
            "wall-color",
            "b/bath.png",
            "a/kitchen.jpg",
            "-o",
            "out",
            "--color",
            "#FFFFFF",
        ])
        .unwrap();
        let outputs = output_paths(cli.command.rooms()).unwrap();
        assert_eq!(outputs, vec![PathBuf::from("out/bath.png"), PathBuf::from("out/kitchen.png")]);
    }
}
