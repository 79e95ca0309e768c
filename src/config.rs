// ============================================================================
// config.rs — gpulife
// Grid configuration, initial-state policies, runtime parameters, and the
// command-line / JSON config layer.
// ============================================================================

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, InitError};

/// Largest accepted grid edge, in cells.
pub const MAX_GRID_DIM: u32 = 2048;

// ======================== Grid ========================

/// Grid dimensions for one session. Changing them means building a new
/// session, never patching a live one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
        }
    }
}

impl GridConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn validate(&self) -> Result<(), InitError> {
        if self.width == 0 || self.height == 0 {
            return Err(InitError::InvalidConfig(format!(
                "grid {}x{} has an empty dimension",
                self.width, self.height
            )));
        }
        if self.width > MAX_GRID_DIM || self.height > MAX_GRID_DIM {
            return Err(InitError::InvalidConfig(format!(
                "grid {}x{} exceeds the {}x{} limit",
                self.width, self.height, MAX_GRID_DIM, MAX_GRID_DIM
            )));
        }
        Ok(())
    }

    pub fn cell_count(&self) -> u32 {
        self.width * self.height
    }

    /// Byte length of one state buffer (one `u32` per cell).
    pub fn state_bytes(&self) -> u64 {
        self.cell_count() as u64 * std::mem::size_of::<u32>() as u64
    }

    /// Row-major index of cell (x, y).
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// Same grid with both edges scaled by `factor`, clamped to valid range.
    pub fn scaled(&self, factor: f32) -> Self {
        let scale = |v: u32| ((v as f32 * factor).round() as u32).clamp(1, MAX_GRID_DIM);
        Self {
            width: scale(self.width),
            height: scale(self.height),
        }
    }
}

// ======================== Initial State ========================

/// How the first state buffer is populated when a session is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitialState {
    /// Every cell dead.
    Clear,
    /// Each cell alive with probability `density`.
    Random { density: f32, seed: Option<u64> },
    /// Only the listed row-major indices alive.
    Alive { cells: Vec<u32> },
}

impl Default for InitialState {
    fn default() -> Self {
        InitialState::Random {
            density: 0.4,
            seed: None,
        }
    }
}

impl InitialState {
    /// Produce `width * height` cell words for `grid`.
    pub fn materialize(&self, grid: GridConfig) -> Result<Vec<u32>, InitError> {
        let n = grid.cell_count() as usize;
        let mut cells = vec![0u32; n];

        match self {
            InitialState::Clear => {}
            InitialState::Random { density, seed } => {
                if !(0.0..=1.0).contains(density) {
                    return Err(InitError::InvalidConfig(format!(
                        "density {density} outside [0, 1]"
                    )));
                }
                let mut rng = match seed {
                    Some(s) => StdRng::seed_from_u64(*s),
                    None => StdRng::from_entropy(),
                };
                for cell in cells.iter_mut() {
                    if rng.gen::<f32>() < *density {
                        *cell = 1;
                    }
                }
            }
            InitialState::Alive { cells: indices } => {
                for &idx in indices {
                    let slot = cells.get_mut(idx as usize).ok_or_else(|| {
                        InitError::InvalidConfig(format!(
                            "live cell index {idx} outside {}x{} grid",
                            grid.width, grid.height
                        ))
                    })?;
                    *slot = 1;
                }
            }
        }

        Ok(cells)
    }
}

// ======================== Runtime Parameters ========================

/// Runtime knobs for the frame driver and diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub tick_interval_ms: u64,
    pub paused: bool,
    /// Log population statistics every this many generations (0 = never).
    pub diag_interval: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            paused: false,
            diag_interval: 100,
        }
    }
}

impl SimulationParams {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

// ======================== App Config ========================

/// Everything the binary needs to start: either loaded from a JSON file,
/// built from flags, or both (flags win).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub grid: GridConfig,
    pub initial: InitialState,
    pub sim: SimulationParams,
    /// Run this many generations without a window, then exit.
    pub headless_generations: Option<u64>,
    /// In headless runs, check every generation against the CPU rule.
    pub verify: bool,
}

impl AppConfig {
    pub fn from_json_file(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_json_str(path, &text)
    }

    fn from_json_str(path: &str, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: path.to_string(),
            source,
        })
    }

    /// Build a config from command-line arguments (without the program name).
    /// `--config <path>` is applied first, regardless of position.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();

        let mut config = match args.iter().position(|a| a == "--config") {
            Some(i) => {
                let path = args
                    .get(i + 1)
                    .ok_or_else(|| ConfigError::MissingValue("--config".into()))?;
                Self::from_json_file(path)?
            }
            None => Self::default(),
        };

        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let mut value = || {
                iter.next()
                    .cloned()
                    .ok_or_else(|| ConfigError::MissingValue(flag.clone()))
            };
            match flag.as_str() {
                "--config" => {
                    value()?;
                }
                "--width" => config.grid.width = parse_value(flag, &value()?)?,
                "--height" => config.grid.height = parse_value(flag, &value()?)?,
                "--interval-ms" => config.sim.tick_interval_ms = parse_value(flag, &value()?)?,
                "--headless" => config.headless_generations = Some(parse_value(flag, &value()?)?),
                "--density" => {
                    let density: f32 = parse_value(flag, &value()?)?;
                    let seed = match &config.initial {
                        InitialState::Random { seed, .. } => *seed,
                        _ => None,
                    };
                    config.initial = InitialState::Random { density, seed };
                }
                "--seed" => {
                    let seed: u64 = parse_value(flag, &value()?)?;
                    let density = match &config.initial {
                        InitialState::Random { density, .. } => *density,
                        _ => 0.4,
                    };
                    config.initial = InitialState::Random {
                        density,
                        seed: Some(seed),
                    };
                }
                "--clear" => config.initial = InitialState::Clear,
                "--paused" => config.sim.paused = true,
                "--verify" => config.verify = true,
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
        }

        // Only the headless runner keeps a CPU mirror to verify against.
        if config.verify && config.headless_generations.is_none() {
            return Err(ConfigError::RequiresFlag {
                flag: "--verify",
                requires: "--headless",
            });
        }

        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_grid_validation() {
        assert!(GridConfig::new(1, 1).validate().is_ok());
        assert!(GridConfig::new(0, 4).validate().is_err());
        assert!(GridConfig::new(4, 0).validate().is_err());
        assert!(GridConfig::new(MAX_GRID_DIM + 1, 4).validate().is_err());
    }

    #[test]
    fn test_grid_sizes() {
        let grid = GridConfig::new(32, 32);
        assert_eq!(grid.cell_count(), 1024);
        assert_eq!(grid.state_bytes(), 4096);
        assert_eq!(grid.index(3, 2), 67);
        assert_eq!(GridConfig::new(64, 64).scaled(0.5), GridConfig::new(32, 32));
        assert_eq!(GridConfig::new(1, 1).scaled(0.5), GridConfig::new(1, 1));
    }

    #[test]
    fn test_materialize_clear_and_alive() {
        let grid = GridConfig::new(4, 4);
        let clear = InitialState::Clear.materialize(grid).unwrap();
        assert_eq!(clear.len(), 16);
        assert!(clear.iter().all(|&c| c == 0));

        let alive = InitialState::Alive { cells: vec![5] }.materialize(grid).unwrap();
        assert_eq!(alive.iter().sum::<u32>(), 1);
        assert_eq!(alive[5], 1);

        assert!(InitialState::Alive { cells: vec![16] }.materialize(grid).is_err());
    }

    #[test]
    fn test_materialize_random_is_seeded() {
        let grid = GridConfig::new(32, 16);
        let policy = InitialState::Random {
            density: 0.5,
            seed: Some(7),
        };
        let a = policy.materialize(grid).unwrap();
        let b = policy.materialize(grid).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 512);
        let live = a.iter().filter(|&&c| c == 1).count();
        assert!(live > 0 && live < 512);

        let bad = InitialState::Random {
            density: 1.5,
            seed: None,
        };
        assert!(bad.materialize(grid).is_err());
    }

    #[test]
    fn test_from_args() {
        let config = AppConfig::from_args(args(&[
            "--width", "128", "--height", "96", "--seed", "3", "--density", "0.25",
            "--interval-ms", "50", "--headless", "10", "--verify",
        ]))
        .unwrap();
        assert_eq!(config.grid, GridConfig::new(128, 96));
        assert_eq!(config.sim.tick_interval(), Duration::from_millis(50));
        assert_eq!(
            config.initial,
            InitialState::Random {
                density: 0.25,
                seed: Some(3)
            }
        );
        assert_eq!(config.headless_generations, Some(10));
        assert!(config.verify);
    }

    #[test]
    fn test_from_args_errors() {
        assert!(matches!(
            AppConfig::from_args(args(&["--bogus"])),
            Err(ConfigError::UnknownFlag(_))
        ));
        assert!(matches!(
            AppConfig::from_args(args(&["--width"])),
            Err(ConfigError::MissingValue(_))
        ));
        assert!(matches!(
            AppConfig::from_args(args(&["--width", "wide"])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AppConfig::from_args(args(&["--verify"])),
            Err(ConfigError::RequiresFlag {
                flag: "--verify",
                ..
            })
        ));
    }

    #[test]
    fn test_json_config() {
        let text = r#"{
            "grid": { "width": 16, "height": 8 },
            "initial": { "kind": "alive", "cells": [1, 17, 33] }
        }"#;
        let config = AppConfig::from_json_str("inline", text).unwrap();
        assert_eq!(
            config.initial,
            InitialState::Alive {
                cells: vec![1, 17, 33]
            }
        );
        assert!(!config.sim.paused);

        let text = r#"{
            "grid": { "width": 16, "height": 8 },
            "initial": { "kind": "random", "density": 0.1, "seed": 9 },
            "sim": { "tick_interval_ms": 250 }
        }"#;
        let config = AppConfig::from_json_str("inline", text).unwrap();
        assert_eq!(config.grid, GridConfig::new(16, 8));
        assert_eq!(config.sim.tick_interval_ms, 250);
        assert_eq!(config.sim.diag_interval, 100);
        assert!(matches!(
            config.initial,
            InitialState::Random { seed: Some(9), .. }
        ));
    }
}
