//! CLI flags plus an optional TOML config file, merged CLI-wins.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "roverd", about = "Rover autonomy daemon")]
pub struct Args {
    /// Path to an optional TOML config file; CLI flags win over its values.
    #[arg(short, long, default_value = "config/rover.toml")]
    pub config: PathBuf,

    #[arg(long)]
    pub wheel_base: Option<f64>,
    #[arg(long)]
    pub max_speed_mps: Option<f64>,

    #[arg(long)]
    pub grid_resolution: Option<f64>,
    #[arg(long)]
    pub grid_size_m: Option<f64>,

    #[arg(long)]
    pub lidar_port: Option<String>,
    #[arg(long)]
    pub lidar_baudrate: Option<u32>,
    #[arg(long)]
    pub lidar_min_range: Option<f64>,
    #[arg(long)]
    pub lidar_max_range: Option<f64>,

    #[arg(long)]
    pub nav_speed: Option<i32>,
    #[arg(long)]
    pub nav_obstacle_threshold: Option<f64>,
    #[arg(long)]
    pub nav_sector_count: Option<usize>,
    #[arg(long)]
    pub nav_front_sector_half: Option<usize>,

    #[arg(long)]
    pub explore_speed: Option<i32>,
    #[arg(long)]
    pub explore_frontier_min_dist: Option<f64>,
    #[arg(long)]
    pub explore_complete_pct: Option<f64>,

    #[arg(long)]
    pub safety_timeout: Option<f64>,
    #[arg(long)]
    pub maps_dir: Option<String>,

    #[arg(long, default_value = "./logs")]
    pub log_dir: PathBuf,
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub chassis: ChassisFileConfig,
    pub grid: GridFileConfig,
    pub lidar: LidarFileConfig,
    pub nav: NavFileConfig,
    pub explore: ExploreFileConfig,
    pub safety: SafetyFileConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChassisFileConfig {
    pub wheel_base: f64,
    pub max_speed_mps: f64,
}

impl Default for ChassisFileConfig {
    fn default() -> Self {
        Self {
            wheel_base: 0.3,
            max_speed_mps: 0.5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GridFileConfig {
    pub resolution: f64,
    pub size_m: f64,
}

impl Default for GridFileConfig {
    fn default() -> Self {
        Self {
            resolution: 0.05,
            size_m: 20.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LidarFileConfig {
    pub port: String,
    pub baudrate: u32,
    pub min_range: f64,
    pub max_range: f64,
}

impl Default for LidarFileConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 115200,
            min_range: 0.12,
            max_range: 8.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NavFileConfig {
    pub speed: i32,
    pub obstacle_threshold: f64,
    pub sector_count: usize,
    pub front_sector_half: usize,
}

impl Default for NavFileConfig {
    fn default() -> Self {
        Self {
            speed: 40,
            obstacle_threshold: 0.35,
            sector_count: 24,
            front_sector_half: 2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExploreFileConfig {
    pub speed: i32,
    pub frontier_min_dist: f64,
    pub complete_pct: f64,
}

impl Default for ExploreFileConfig {
    fn default() -> Self {
        Self {
            speed: 35,
            frontier_min_dist: 0.3,
            complete_pct: 85.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SafetyFileConfig {
    pub timeout: f64,
    pub maps_dir: String,
}

impl Default for SafetyFileConfig {
    fn default() -> Self {
        Self {
            timeout: 0.8,
            maps_dir: "./maps".to_string(),
        }
    }
}

impl FileConfig {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(FileConfig::default())
        }
    }
}

/// Fully resolved runtime configuration, CLI flags winning over the TOML
/// file, which wins over built-in defaults.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub wheel_base: f64,
    pub max_speed_mps: f64,
    pub grid_resolution: f64,
    pub grid_size_m: f64,
    pub lidar_port: String,
    pub lidar_baudrate: u32,
    pub lidar_min_range: f64,
    pub lidar_max_range: f64,
    pub nav_speed: i32,
    pub nav_obstacle_threshold: f64,
    pub nav_sector_count: usize,
    pub nav_front_sector_half: usize,
    pub explore_speed: i32,
    pub explore_frontier_min_dist: f64,
    pub explore_complete_pct: f64,
    pub safety_timeout: f64,
    pub maps_dir: String,
}

impl RuntimeConfig {
    pub fn merge(args: &Args, file: &FileConfig) -> Self {
        Self {
            wheel_base: args.wheel_base.unwrap_or(file.chassis.wheel_base),
            max_speed_mps: args.max_speed_mps.unwrap_or(file.chassis.max_speed_mps),
            grid_resolution: args.grid_resolution.unwrap_or(file.grid.resolution),
            grid_size_m: args.grid_size_m.unwrap_or(file.grid.size_m),
            lidar_port: args.lidar_port.clone().unwrap_or(file.lidar.port.clone()),
            lidar_baudrate: args.lidar_baudrate.unwrap_or(file.lidar.baudrate),
            lidar_min_range: args.lidar_min_range.unwrap_or(file.lidar.min_range),
            lidar_max_range: args.lidar_max_range.unwrap_or(file.lidar.max_range),
            nav_speed: args.nav_speed.unwrap_or(file.nav.speed),
            nav_obstacle_threshold: args
                .nav_obstacle_threshold
                .unwrap_or(file.nav.obstacle_threshold),
            nav_sector_count: args.nav_sector_count.unwrap_or(file.nav.sector_count),
            nav_front_sector_half: args
                .nav_front_sector_half
                .unwrap_or(file.nav.front_sector_half),
            explore_speed: args.explore_speed.unwrap_or(file.explore.speed),
            explore_frontier_min_dist: args
                .explore_frontier_min_dist
                .unwrap_or(file.explore.frontier_min_dist),
            explore_complete_pct: args
                .explore_complete_pct
                .unwrap_or(file.explore.complete_pct),
            safety_timeout: args.safety_timeout.unwrap_or(file.safety.timeout),
            maps_dir: args.maps_dir.clone().unwrap_or(file.safety.maps_dir.clone()),
        }
    }
}
