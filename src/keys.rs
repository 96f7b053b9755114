use std::collections::HashMap;

use crate::entity::Heading;

/// Backend-independent key code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Char(char),
    Esc,
    CtrlC,
}

impl Key {
    /// Ends the current round, or quits from the mode select screen.
    pub fn is_stop(self) -> bool {
        matches!(self, Key::Char('q') | Key::CtrlC)
    }
}

/// Fixed binding from keys to the four unit headings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keymap {
    bindings: HashMap<Key, Heading>,
}

impl Keymap {
    fn from_bindings(bindings: [(Key, Heading); 4]) -> Self {
        Keymap { bindings: bindings.into_iter().collect() }
    }

    pub fn wasd() -> Self {
        Keymap::from_bindings([
            (Key::Char('w'), Heading::UP),
            (Key::Char('s'), Heading::DOWN),
            (Key::Char('a'), Heading::LEFT),
            (Key::Char('d'), Heading::RIGHT),
        ])
    }

    pub fn arrows() -> Self {
        Keymap::from_bindings([
            (Key::Up, Heading::UP),
            (Key::Down, Heading::DOWN),
            (Key::Left, Heading::LEFT),
            (Key::Right, Heading::RIGHT),
        ])
    }

    /// Arrow keys with both axes flipped, for the snake that starts facing
    /// the other player.
    pub fn mirrored_arrows() -> Self {
        Keymap::from_bindings([
            (Key::Up, Heading::DOWN),
            (Key::Down, Heading::UP),
            (Key::Left, Heading::RIGHT),
            (Key::Right, Heading::LEFT),
        ])
    }

    pub fn heading_for(&self, key: Key) -> Option<Heading> {
        self.bindings.get(&key).copied()
    }
}
