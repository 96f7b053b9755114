mod config;
mod entity;
mod error;
mod game;
mod group;
mod keys;
mod round;
mod snake;
mod term;
mod world;

use std::fs::File;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use simplelog::{Config, WriteLogger};

use crate::config::{Args, GameConfig};
use crate::game::SnakeGame;

/// Board position as (row, column).
pub type Coords = (i32, i32);

fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = File::create(&args.log_file)
        .with_context(|| format!("Error creating log file {}", args.log_file.display()))?;
    WriteLogger::init(args.log_level, Config::default(), log_file)
        .context("Error initializing logger")?;
    info!("Starting duosnake");

    let config = GameConfig::from_args(&args)?;
    let result = SnakeGame::new(config).and_then(|mut game| game.run());
    // The terminal is restored by now, so the error can reach stderr
    if let Err(err) = &result {
        error!("Exiting on error: {:#}", err);
    }
    result
}
