use std::io::{stdout, Stdout, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::style::{self, Color};
use crossterm::terminal::{ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue, terminal};
use log::{debug, warn};

use crate::Coords;
use crate::entity::{Cell, ColorTag};
use crate::keys::Key;

const BLANK: Cell = Cell { glyph: ' ', color: ColorTag::White };

/// Paints frames and banners.
pub trait Screen {
    fn paint(&mut self, frame: &[(Coords, Cell)]) -> Result<()>;
    fn show_death_banner(&mut self, scores: &[u32]) -> Result<()>;
    fn show_mode_select(&mut self) -> Result<()>;
    fn show_error(&mut self, message: &str) -> Result<()>;
}

/// Source of key presses.
pub trait KeySource: Send {
    /// Waits up to `timeout` for a key.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>>;

    fn read_key(&mut self) -> Result<Key> {
        loop {
            if let Some(key) = self.poll_key(Duration::from_secs(3600))? {
                return Ok(key);
            }
        }
    }
}

/// Owns the terminal for the lifetime of the game. Dropping it restores the
/// terminal, whichever way the program is leaving.
pub struct TermManager {
    width: u16,
    height: u16,
    stdout: Stdout,
    screen: Vec<Cell>,
    current_msg: Option<Message>,
}

struct Message {
    top_left: (u16, u16),
    width: u16,
    height: u16,
}

impl TermManager {
    /// Takes over the terminal. Fails if it is smaller than `required`
    /// (columns, rows).
    pub fn setup(required: (u16, u16)) -> Result<Self> {
        let (width, height) = terminal::size().context("Error reading terminal size")?;
        if width < required.0 || height < required.1 {
            bail!(
                "terminal is {}x{}, the board needs at least {}x{}",
                width, height, required.0, required.1
            );
        }

        let mut term = TermManager {
            width,
            height,
            stdout: stdout(),
            screen: vec![BLANK; width as usize * height as usize],
            current_msg: None,
        };

        execute!(term.stdout, EnterAlternateScreen).context("Error entering alt screen")?;
        terminal::enable_raw_mode().context("Error setting raw mode")?;
        execute!(term.stdout, cursor::Hide, cursor::DisableBlinking)
            .context("Error hiding cursor")?;
        term.clear()?;

        debug!("Terminal ready, {}x{}", width, height);
        Ok(term)
    }

    pub fn clear(&mut self) -> Result<()> {
        execute!(self.stdout, terminal::Clear(ClearType::All)).context("Error clearing")?;
        self.screen = vec![BLANK; self.width as usize * self.height as usize];
        self.current_msg = None;
        Ok(())
    }

    pub fn show_message(&mut self, lines: &[&str]) -> Result<()> {
        if self.has_message() {
            self.hide_message()?;
        }

        let msg_height = (lines.len() + 2) as u16;
        let msg_width = (lines.iter().map(|x| x.chars().count()).max().unwrap_or(0) + 2) as u16;
        let center = (self.width / 2, self.height / 2);
        let top_left = (
            center.0.saturating_sub(msg_width / 2),
            center.1.saturating_sub(msg_height / 2),
        );

        // Print the top and bottom empty lines
        for y in [top_left.1, top_left.1 + msg_height - 1] {
            for x_diff in 0..msg_width {
                self.print_at_no_save((top_left.0 + x_diff, y), BLANK)?;
            }
        }

        // Print the message lines
        for (i, line) in lines.iter().enumerate() {
            let padded_line = format!("{line: ^width$}", line = line, width = msg_width as usize);
            let y = top_left.1 + i as u16 + 1;
            for (x_diff, ch) in padded_line.chars().enumerate() {
                let cell = Cell { glyph: ch, color: ColorTag::White };
                self.print_at_no_save((top_left.0 + x_diff as u16, y), cell)?;
            }
        }

        self.current_msg = Some(Message { width: msg_width, height: msg_height, top_left });
        self.flush()
    }

    pub fn hide_message(&mut self) -> Result<()> {
        let msg = match self.current_msg.take() {
            Some(msg) => msg,
            None => return Ok(()),
        };

        // Restore the content from the screen buffer
        for y in msg.top_left.1..msg.top_left.1 + msg.height {
            for x in msg.top_left.0..msg.top_left.0 + msg.width {
                if let Some(cell) = self.buffered(x, y) {
                    self.print_at_no_save((x, y), cell)?;
                }
            }
        }

        self.flush()
    }

    pub fn has_message(&self) -> bool {
        self.current_msg.is_some()
    }

    ///////////////////////////////////////////////////////////////////////////

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(self.width as usize * y as usize + x as usize)
        } else {
            None
        }
    }

    fn buffered(&self, x: u16, y: u16) -> Option<Cell> {
        self.index(x, y).map(|i| self.screen[i])
    }

    fn print_at(&mut self, x: u16, y: u16, cell: Cell) -> Result<()> {
        if let Some(i) = self.index(x, y) {
            self.print_at_no_save((x, y), cell)?;
            self.screen[i] = cell;
        }
        Ok(())
    }

    fn print_at_no_save(&mut self, pos: (u16, u16), cell: Cell) -> Result<()> {
        // To be used for printing messages, where we don't wanna overwrite our
        // local buffer to restore it when the message is hidden
        queue!(
            self.stdout,
            cursor::MoveTo(pos.0, pos.1),
            style::SetForegroundColor(term_color(cell.color)),
            style::Print(cell.glyph)
        )?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.stdout.flush().context("Error flushing")
    }

    fn restore(&mut self) -> Result<()> {
        terminal::disable_raw_mode()?;
        execute!(
            self.stdout,
            style::ResetColor,
            cursor::Show,
            cursor::EnableBlinking,
            LeaveAlternateScreen
        )?;
        Ok(())
    }
}

impl Screen for TermManager {
    /// Writes only the cells that differ from the last painted frame.
    fn paint(&mut self, frame: &[(Coords, Cell)]) -> Result<()> {
        self.hide_message()?;

        let mut next = vec![BLANK; self.screen.len()];
        for &((row, col), cell) in frame {
            if let (Ok(x), Ok(y)) = (u16::try_from(col), u16::try_from(row)) {
                if let Some(i) = self.index(x, y) {
                    next[i] = cell;
                }
            }
        }

        for i in 0..next.len() {
            if next[i] != self.screen[i] {
                let (x, y) = ((i % self.width as usize) as u16, (i / self.width as usize) as u16);
                self.print_at(x, y, next[i])?;
            }
        }

        self.flush()
    }

    fn show_death_banner(&mut self, scores: &[u32]) -> Result<()> {
        let score_line = scores.iter().enumerate()
            .map(|(i, score)| format!("Player {}: {}", i + 1, score))
            .collect::<Vec<_>>()
            .join("   ");

        self.show_message(&[
            "Game over!",
            "",
            &score_line,
            "",
            "R to play again, any other key for the menu",
        ])
    }

    fn show_mode_select(&mut self) -> Result<()> {
        self.clear()?;
        self.show_message(&[
            "D U O S N A K E",
            "",
            "Up    mirrored mode",
            "Down  switching mode",
            "W     two-handed mode",
            "Q     quit",
        ])
    }

    fn show_error(&mut self, message: &str) -> Result<()> {
        self.show_message(&["Round aborted", "", message, "", "Press any key"])
    }
}

impl Drop for TermManager {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!("Error restoring terminal: {:#}", err);
        }
    }
}

/// Keyboard input through crossterm's global event queue.
pub struct TermInput;

impl KeySource for TermInput {
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>> {
        if !poll(timeout)? {
            return Ok(None);
        }
        match read()? {
            Event::Key(ev) => Ok(to_key(ev)),
            _ => Ok(None),
        }
    }
}

fn to_key(ev: KeyEvent) -> Option<Key> {
    match ev {
        KeyEvent { code: KeyCode::Char('c'), modifiers: KeyModifiers::CONTROL } => Some(Key::CtrlC),
        KeyEvent { code, .. } => match code {
            KeyCode::Up => Some(Key::Up),
            KeyCode::Down => Some(Key::Down),
            KeyCode::Left => Some(Key::Left),
            KeyCode::Right => Some(Key::Right),
            KeyCode::Esc => Some(Key::Esc),
            KeyCode::Char(c) => Some(Key::Char(c.to_ascii_lowercase())),
            _ => None,
        },
    }
}

fn term_color(color: ColorTag) -> Color {
    match color {
        ColorTag::White => Color::White,
        ColorTag::Red => Color::Red,
        ColorTag::Green => Color::Green,
        ColorTag::Yellow => Color::Yellow,
        ColorTag::Cyan => Color::Cyan,
        ColorTag::Blue => Color::Blue,
    }
}
