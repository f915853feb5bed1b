// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI configuration loaded from environment variables.
//!
//! Command-line flags override every value read here.

use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Precomputed floor class map (8-bit label image).
    pub floor_class_map: Option<PathBuf>,
    /// Precomputed wall class map; absent means no wall support.
    pub wall_class_map: Option<PathBuf>,
    /// SegFormer ONNX model used for floors.
    pub floor_model: Option<PathBuf>,
    /// SegFormer ONNX model used for walls.
    pub wall_model: Option<PathBuf>,
    /// Wall components smaller than this fraction of the image are dropped.
    pub min_wall_fraction: f64,
    /// Per-request wall-clock budget in seconds.
    pub time_budget_secs: Option<u64>,
    /// Number of worker threads for multi-room runs.
    pub worker_threads: usize,
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            floor_class_map: env_path("ROOMTILE_FLOOR_CLASS_MAP"),
            wall_class_map: env_path("ROOMTILE_WALL_CLASS_MAP"),
            floor_model: env_path("ROOMTILE_FLOOR_MODEL"),
            wall_model: env_path("ROOMTILE_WALL_MODEL"),
            min_wall_fraction: std::env::var("ROOMTILE_MIN_WALL_FRACTION")
                .unwrap_or_else(|_| "0.02".into())
                .parse()
                .unwrap_or(0.02),
            time_budget_secs: std::env::var("ROOMTILE_TIME_BUDGET_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
            worker_threads: std::env::var("ROOMTILE_WORKER_THREADS")
                .unwrap_or_else(|_| num_cpus::get().to_string())
                .parse()
                .unwrap_or_else(|_| num_cpus::get()),
        }
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
