mod app;
mod config;
mod effects;
mod error;
mod events;
mod geometry;
mod input;
mod logging;
mod model;
mod render;
mod sim;
mod storage;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = config::Cli::parse();
    app::run(cli)
}
