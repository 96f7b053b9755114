// Configuration - command-line arguments and the validated game settings they produce
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use log::LevelFilter;

use crate::entity::Heading;

const MIN_BOARD_SIDE: i32 = 12;
const MAX_BOARD_SIDE: i32 = 4096;
// Slowest accepted speed, in steps or frames per second
const MIN_SPEED: f64 = 0.1;
// Snakes never start closer than this to the top or bottom wall
const MIN_START_ROW: i32 = 5;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Two snakes, one terminal",
    long_about = "Two-player terminal snake. Each snake moves on its own clock; eating an apple\n\
                  grows the snake and drops a new block on the board. The round ends as soon as\n\
                  either snake hits a wall, a block or a body."
)]
pub struct Args {
    /// Column of the right wall
    #[arg(long, default_value_t = 70)]
    pub width: i32,

    /// Row of the bottom wall, which also carries the scores
    #[arg(long, default_value_t = 30)]
    pub height: i32,

    /// Initial snake length, head included
    #[arg(short = 'l', long, default_value_t = 5)]
    pub length: usize,

    /// Apples on the board at round start
    #[arg(short, long, default_value_t = 2)]
    pub apples: usize,

    /// Blocks on the board at round start
    #[arg(short, long, default_value_t = 1)]
    pub blocks: usize,

    /// Steps per second while moving up or down
    #[arg(long, default_value_t = 9.0)]
    pub vertical_speed: f64,

    /// Steps per second while moving left or right
    #[arg(long, default_value_t = 15.0)]
    pub horizontal_speed: f64,

    /// Frames per second
    #[arg(long, default_value_t = 100.0)]
    pub render_speed: f64,

    /// Seed for apple and block placement
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Log file (the terminal is taken by the game)
    #[arg(long, default_value = "duosnake.log")]
    pub log_file: PathBuf,

    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,
}

/// Settings for one round.
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub width: i32,
    pub height: i32,
    pub initial_length: usize,
    pub apples: usize,
    pub blocks: usize,
    pub vertical_speed: f64,
    pub horizontal_speed: f64,
    pub render_speed: f64,
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            width: 70,
            height: 30,
            initial_length: 5,
            apples: 2,
            blocks: 1,
            vertical_speed: 9.0,
            horizontal_speed: 15.0,
            render_speed: 100.0,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = GameConfig {
            width: args.width,
            height: args.height,
            initial_length: args.length,
            apples: args.apples,
            blocks: args.blocks,
            vertical_speed: args.vertical_speed,
            horizontal_speed: args.horizontal_speed,
            render_speed: args.render_speed,
            seed: args.seed,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let sides = MIN_BOARD_SIDE..=MAX_BOARD_SIDE;
        if !sides.contains(&self.width) || !sides.contains(&self.height) {
            bail!(
                "board sides must be between {} and {}, got {}x{}",
                MIN_BOARD_SIDE, MAX_BOARD_SIDE, self.width, self.height
            );
        }
        if self.initial_length < 2 {
            bail!("snake length must be at least 2, got {}", self.initial_length);
        }
        let both_rows = i32::try_from(self.initial_length)
            .ok()
            .and_then(|length| length.max(MIN_START_ROW).checked_mul(2));
        if !matches!(both_rows, Some(rows) if rows < self.height) {
            bail!(
                "a board {} rows high has no room for two snakes of length {}",
                self.height, self.initial_length
            );
        }
        for (name, speed) in [
            ("vertical speed", self.vertical_speed),
            ("horizontal speed", self.horizontal_speed),
            ("render speed", self.render_speed),
        ] {
            if !(speed.is_finite() && speed >= MIN_SPEED) {
                bail!("{} must be a number of at least {}, got {}", name, MIN_SPEED, speed);
            }
        }
        Ok(())
    }

    /// Distance of the starting heads from the wall they face away from,
    /// leaving room for the whole tail inside the board.
    pub fn start_row(&self) -> i32 {
        i32::try_from(self.initial_length).unwrap_or(i32::MAX).max(MIN_START_ROW)
    }

    /// Terminal cells needed to show the board, walls and scoreboard row.
    pub fn required_terminal_size(&self) -> (u16, u16) {
        let cells = |side: i32| u16::try_from(side.saturating_add(1)).unwrap_or(u16::MAX);
        (cells(self.width), cells(self.height))
    }

    /// Sleep between steps for a snake moving along `heading`.
    pub fn step_interval(&self, heading: Heading) -> Duration {
        let speed = if heading.is_vertical() { self.vertical_speed } else { self.horizontal_speed };
        interval(speed)
    }

    pub fn render_interval(&self) -> Duration {
        interval(self.render_speed)
    }
}

// Speeds under the minimum, NaN included, run at the minimum
fn interval(speed: f64) -> Duration {
    Duration::from_secs_f64(1.0 / speed.max(MIN_SPEED))
}
