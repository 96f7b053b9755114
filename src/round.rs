use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use log::{debug, error, info};

use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::keys::Key;
use crate::term::{KeySource, Screen};
use crate::world::{Mode, TickOutcome, World};

// Longest uninterrupted sleep of any worker, so a stop is seen promptly
const MAX_NAP: Duration = Duration::from_millis(10);
const INPUT_POLL: Duration = Duration::from_millis(20);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Running,
    Over,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EndReason {
    SnakeDied(usize),
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundSummary {
    pub reason: EndReason,
    pub scores: Vec<u32>,
    /// Key that dismissed the death banner.
    pub ack: Key,
}

/// One round: a fresh world, one movement worker per snake, one input
/// worker, and the render loop on the calling thread.
pub struct Round {
    config: GameConfig,
    mode: Mode,
    world: Mutex<World>,
    stop: AtomicBool,
    state: RoundState,
}

impl Round {
    pub fn new(mode: Mode, config: &GameConfig) -> GameResult<Self> {
        let world = World::new(mode, config)?;
        Ok(Round::with_world(world, config))
    }

    pub fn with_world(world: World, config: &GameConfig) -> Self {
        Round {
            config: config.clone(),
            mode: world.mode(),
            world: Mutex::new(world),
            stop: AtomicBool::new(false),
            state: RoundState::Idle,
        }
    }

    /// A new idle round with the same mode and settings and a brand new world.
    pub fn restart(&self) -> GameResult<Round> {
        Round::new(self.mode, &self.config)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn world(&self) -> GameResult<MutexGuard<'_, World>> {
        self.world.lock().map_err(|_| GameError::WorldPoisoned)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Plays the round to the end, shows the death banner and waits for a
    /// key. A round can only be played once.
    pub fn run<S, K>(&mut self, screen: &mut S, keys: &mut K) -> Result<RoundSummary>
    where
        S: Screen,
        K: KeySource,
    {
        if self.state != RoundState::Idle {
            bail!("round is {:?}, only idle rounds can be started", self.state);
        }
        self.state = RoundState::Running;
        info!(
            "Round started: {} mode, {}x{} board, seed {:?}",
            self.mode, self.config.width, self.config.height, self.config.seed
        );

        let this = &*self;
        let input_keys = &mut *keys;
        let played = thread::scope(|s| {
            let input = s.spawn(move || this.worker(|| this.input_loop(input_keys)));
            let snakes = match this.world() {
                Ok(world) => world.snakes().len(),
                Err(err) => {
                    this.request_stop();
                    return Err(anyhow::Error::from(err));
                }
            };
            let movers: Vec<_> = (0..snakes)
                .map(|i| s.spawn(move || this.worker(|| this.movement_loop(i))))
                .collect();

            let rendered = this.worker(|| this.render_loop(screen));
            this.request_stop();

            let mut result = rendered;
            for handle in movers.into_iter().chain(std::iter::once(input)) {
                let joined = handle.join().unwrap_or_else(|_| Err(anyhow!("worker panicked")));
                if result.is_ok() {
                    result = joined;
                }
            }
            result
        });
        self.state = RoundState::Over;

        if let Err(err) = played {
            error!("Round abandoned: {:#}", err);
            return Err(err);
        }

        let (reason, scores) = {
            let world = self.world()?;
            let reason = match world.snakes().iter().position(|s| !s.is_alive()) {
                Some(i) => EndReason::SnakeDied(i),
                None => EndReason::Stopped,
            };
            info!(
                "Round over: {:?}, scores {:?}, {} apples and {} blocks on the board",
                reason, world.scores(), world.apples().len(), world.blocks().len()
            );
            (reason, world.scores().to_vec())
        };

        screen.show_death_banner(&scores)?;
        let ack = keys.read_key()?;
        Ok(RoundSummary { reason, scores, ack })
    }

    ///////////////////////////////////////////////////////////////////////////

    /// Runs a worker body; any failure, panics included, stops the whole
    /// round.
    fn worker(&self, body: impl FnOnce() -> Result<()>) -> Result<()> {
        let result = panic::catch_unwind(AssertUnwindSafe(body))
            .unwrap_or_else(|_| Err(anyhow!("worker panicked")));
        if let Err(err) = &result {
            error!("Worker failed: {:#}", err);
            self.request_stop();
        }
        result
    }

    fn movement_loop(&self, snake: usize) -> Result<()> {
        while !self.is_stopped() {
            let interval = {
                let world = self.world()?;
                if world.is_game_over() {
                    break;
                }
                self.config.step_interval(world.snake(snake)?.pending_heading())
            };

            if !self.nap(interval) {
                break;
            }

            let outcome = self.world()?.tick(snake)?;
            match outcome {
                TickOutcome::Moved | TickOutcome::Ate => {}
                TickOutcome::Died(_) | TickOutcome::Idle => break,
            }
        }
        debug!("Snake {} worker done", snake);
        Ok(())
    }

    fn input_loop<K: KeySource>(&self, keys: &mut K) -> Result<()> {
        while !self.is_stopped() {
            let key = match keys.poll_key(INPUT_POLL)? {
                Some(key) => key,
                None => continue,
            };

            if key.is_stop() {
                info!("Round stopped from the keyboard");
                self.request_stop();
                break;
            }
            self.world()?.steer(key);
        }
        Ok(())
    }

    fn render_loop<S: Screen>(&self, screen: &mut S) -> Result<()> {
        loop {
            let (frame, over) = {
                let world = self.world()?;
                (world.frame(), world.is_game_over())
            };
            // The last frame shows the dead snake
            screen.paint(&frame)?;

            if over || !self.nap(self.config.render_interval()) {
                return Ok(());
            }
        }
    }

    /// Sleeps for `duration` in short slices. Returns false if the round was
    /// stopped meanwhile.
    fn nap(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(MAX_NAP));
        }
    }
}
