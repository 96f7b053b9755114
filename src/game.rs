use anyhow::Result;
use log::{error, info};

use crate::config::GameConfig;
use crate::keys::Key;
use crate::round::Round;
use crate::term::{KeySource, Screen, TermInput, TermManager};
use crate::world::Mode;

/// Home screen loop: pick a mode, play rounds of it, come back.
pub struct SnakeGame {
    config: GameConfig,
    term: TermManager,
    input: TermInput,
}

impl SnakeGame {
    pub fn new(config: GameConfig) -> Result<Self> {
        let term = TermManager::setup(config.required_terminal_size())?;
        Ok(SnakeGame { config, term, input: TermInput })
    }

    /// Returns once the player quits from the mode select screen.
    pub fn run(&mut self) -> Result<()> {
        while let Some(mode) = self.choose_mode()? {
            self.play(mode)?;
        }
        info!("Quitting");
        Ok(())
    }

    ///////////////////////////////////////////////////////////////////////////

    fn choose_mode(&mut self) -> Result<Option<Mode>> {
        self.term.show_mode_select()?;
        loop {
            let key = self.input.read_key()?;
            if key.is_stop() {
                return Ok(None);
            }
            if let Some(mode) = Mode::from_key(key) {
                info!("Mode selected: {}", mode);
                return Ok(Some(mode));
            }
        }
    }

    fn play(&mut self, mode: Mode) -> Result<()> {
        let mut round = match Round::new(mode, &self.config) {
            Ok(round) => round,
            Err(err) => return self.abandon(err.into()),
        };

        loop {
            self.term.clear()?;
            match round.run(&mut self.term, &mut self.input) {
                Ok(summary) if summary.ack == Key::Char('r') => {
                    info!("Restarting {} round", round.mode());
                    round = match round.restart() {
                        Ok(round) => round,
                        Err(err) => return self.abandon(err.into()),
                    };
                }
                Ok(_) => return Ok(()),
                Err(err) => return self.abandon(err),
            }
        }
    }

    // Shows the error and waits for a key before going back to the menu
    fn abandon(&mut self, err: anyhow::Error) -> Result<()> {
        error!("Round abandoned: {:#}", err);
        self.term.show_error(&format!("{:#}", err))?;
        self.input.read_key()?;
        Ok(())
    }
}
