use crate::model::Tuning;
use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

#[derive(Parser, Debug, Clone)]
#[command(name = "danfo-dash")]
#[command(about = "Endless road runner for the terminal", long_about = None)]
pub(crate) struct Cli {
    /// FPS cap (render rate). The simulation always steps at 60 Hz.
    #[arg(long)]
    pub(crate) fps: Option<u32>,

    /// Fixed RNG seed for a reproducible road (0 = random)
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Monochrome output
    #[arg(long, default_value_t = false)]
    pub(crate) no_color: bool,

    /// Forget the stored high score before starting
    #[arg(long, default_value_t = false)]
    pub(crate) reset_high_score: bool,

    /// Log filter written to the log file, e.g. "debug" (RUST_LOG wins if set)
    #[arg(long)]
    pub(crate) log_level: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Settings {
    pub(crate) fps_cap: u32,
    pub(crate) enable_color: bool,
    pub(crate) seed: u64,
    #[serde(default = "default_log_level")]
    pub(crate) log_level: String,
    #[serde(default)]
    pub(crate) tuning: Tuning,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 60,
            enable_color: true,
            seed: 0,
            log_level: default_log_level(),
            tuning: Tuning::default(),
        }
    }
}

impl Settings {
    /// Stored settings with command-line overrides on top.
    pub(crate) fn merged(&self, cli: &Cli) -> Settings {
        let mut s = self.clone();
        if let Some(fps) = cli.fps {
            s.fps_cap = fps;
        }
        if let Some(seed) = cli.seed {
            s.seed = seed;
        }
        if cli.no_color {
            s.enable_color = false;
        }
        if let Some(level) = &cli.log_level {
            s.log_level = level.clone();
        }
        s.fps_cap = s.fps_cap.clamp(10, 240);
        s
    }

    pub(crate) fn resolve_seed(&self) -> u64 {
        if self.seed == 0 {
            rand::random()
        } else {
            self.seed
        }
    }
}

pub(crate) struct Paths {
    pub(crate) dir: PathBuf,
    pub(crate) settings_path: PathBuf,
    pub(crate) high_score_path: PathBuf,
    pub(crate) log_path: PathBuf,
}

pub(crate) fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "danfo-dash", "DanfoDash")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(Paths {
        settings_path: dir.join("settings.json"),
        high_score_path: dir.join("highscore.json"),
        log_path: dir.join("danfo-dash.log"),
        dir,
    })
}

pub(crate) fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        if let Ok(v) = serde_json::from_str::<Settings>(&s) {
            return v;
        }
    }
    Settings::default()
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data)?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn atomic_rename(from: &Path, to: &Path) -> io::Result<()> {
    // rename over an existing file fails on Windows
    if cfg!(windows) && to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)
}
