use thiserror::Error;

use crate::entity::EntityId;

/// Errors raised by the entity model and the movement engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("entity {id} is not a member of this group")]
    InvalidMembership { id: EntityId },

    #[error("entity {id} is already a member of this group")]
    InvalidComposition { id: EntityId },

    #[error("a snake needs at least two segments, got {length}")]
    SnakeTooShort { length: usize },

    #[error("no glyph for a stationary heading")]
    StationaryDirection,

    #[error("no snake with index {index}")]
    UnknownSnake { index: usize },

    #[error("world state poisoned by a panicked worker")]
    WorldPoisoned,
}

pub type GameResult<T> = Result<T, GameError>;
