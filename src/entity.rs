use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::Coords;
use crate::error::{GameError, GameResult};
use crate::world::World;

pub const APPLE_CHAR: char = 'o';
pub const BLOCK_CHAR: char = 'x';
pub const WALL_VERTICAL_CHAR: char = '|';
pub const WALL_HORIZONTAL_CHAR: char = '-';
pub const TAIL_VERTICAL_CHAR: char = '|';
pub const TAIL_HORIZONTAL_CHAR: char = '-';

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        EntityId(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColorTag {
    White,
    Red,
    Green,
    Yellow,
    Cyan,
    Blue,
}

/// Per-tick movement delta as (row, column).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Heading {
    row: i32,
    col: i32,
}

impl Heading {
    pub const UP: Heading = Heading::new(-1, 0);
    pub const DOWN: Heading = Heading::new(1, 0);
    pub const LEFT: Heading = Heading::new(0, -1);
    pub const RIGHT: Heading = Heading::new(0, 1);

    pub const fn new(row: i32, col: i32) -> Self {
        Heading { row, col }
    }

    pub fn is_stationary(self) -> bool {
        self.row == 0 && self.col == 0
    }

    pub fn is_vertical(self) -> bool {
        self.row != 0
    }

    /// Both components negated. A heading sharing only one negated axis
    /// with `other` is a legal turn.
    pub fn is_opposite(self, other: Heading) -> bool {
        !self.is_stationary() && self.row == -other.row && self.col == -other.col
    }

    /// The cell one step ahead of `pos`.
    pub fn step(self, pos: Coords) -> Coords {
        (pos.0 + self.row, pos.1 + self.col)
    }

    /// The cell one step behind `pos`.
    pub fn behind(self, pos: Coords) -> Coords {
        (pos.0 - self.row, pos.1 - self.col)
    }

    pub fn head_glyph(self) -> GameResult<char> {
        match (self.row.signum(), self.col.signum()) {
            (-1, 0) => Ok('^'),
            (1, 0) => Ok('v'),
            (0, -1) => Ok('<'),
            (0, 1) => Ok('>'),
            _ => Err(GameError::StationaryDirection),
        }
    }

    pub fn tail_glyph(self) -> GameResult<char> {
        if self.row != 0 {
            Ok(TAIL_VERTICAL_CHAR)
        } else if self.col != 0 {
            Ok(TAIL_HORIZONTAL_CHAR)
        } else {
            Err(GameError::StationaryDirection)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Apple,
    Block,
    Wall,
    Head { snake: usize, heading: Heading },
    Tail { snake: usize, heading: Heading },
    Score { snake: usize },
}

/// What a snake's head runs into. Heads and score digits are never
/// collision targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Collider {
    Apple(EntityId),
    Block,
    WallSegment,
    TailSegment { owner: usize },
}

/// Effect applied to the world when a snake's head lands on a collider.
pub trait Collidable {
    fn on_collision(&self, world: &mut World, snake: usize) -> GameResult<()>;
}

/// What the renderer needs to paint one cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub glyph: char,
    pub color: ColorTag,
}

/// A single positioned, drawable game object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    id: EntityId,
    pos: Coords,
    glyph: char,
    color: ColorTag,
    kind: EntityKind,
}

impl Entity {
    fn new(pos: Coords, glyph: char, color: ColorTag, kind: EntityKind) -> Self {
        Entity { id: EntityId::next(), pos, glyph, color, kind }
    }

    pub fn apple(pos: Coords) -> Self {
        Entity::new(pos, APPLE_CHAR, ColorTag::Red, EntityKind::Apple)
    }

    pub fn block(pos: Coords) -> Self {
        Entity::new(pos, BLOCK_CHAR, ColorTag::White, EntityKind::Block)
    }

    pub fn wall(pos: Coords, vertical: bool) -> Self {
        let glyph = if vertical { WALL_VERTICAL_CHAR } else { WALL_HORIZONTAL_CHAR };
        Entity::new(pos, glyph, ColorTag::White, EntityKind::Wall)
    }

    pub fn head(snake: usize, pos: Coords, heading: Heading, color: ColorTag) -> GameResult<Self> {
        Ok(Entity::new(pos, heading.head_glyph()?, color, EntityKind::Head { snake, heading }))
    }

    pub fn tail(snake: usize, pos: Coords, heading: Heading, color: ColorTag) -> GameResult<Self> {
        Ok(Entity::new(pos, heading.tail_glyph()?, color, EntityKind::Tail { snake, heading }))
    }

    pub fn score_digit(snake: usize, pos: Coords, digit: char, color: ColorTag) -> Self {
        Entity::new(pos, digit, color, EntityKind::Score { snake })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn pos(&self) -> Coords {
        self.pos
    }

    pub fn glyph(&self) -> char {
        self.glyph
    }

    pub fn color(&self) -> ColorTag {
        self.color
    }

    pub fn cell(&self) -> Cell {
        Cell { glyph: self.glyph(), color: self.color() }
    }

    pub fn set_color(&mut self, color: ColorTag) {
        self.color = color;
    }

    /// Heading of a snake segment, `None` for everything else.
    pub fn heading(&self) -> Option<Heading> {
        match self.kind {
            EntityKind::Head { heading, .. } | EntityKind::Tail { heading, .. } => Some(heading),
            _ => None,
        }
    }

    /// Moves a snake segment and refreshes its glyph for the new heading.
    /// Non-segment entities only take the new position.
    pub fn place_segment(&mut self, pos: Coords, new_heading: Heading) -> GameResult<()> {
        match &mut self.kind {
            EntityKind::Head { heading, .. } => {
                self.glyph = new_heading.head_glyph()?;
                *heading = new_heading;
            }
            EntityKind::Tail { heading, .. } => {
                self.glyph = new_heading.tail_glyph()?;
                *heading = new_heading;
            }
            _ => {}
        }
        self.pos = pos;
        Ok(())
    }

    pub fn collider(&self) -> Option<Collider> {
        match self.kind {
            EntityKind::Apple => Some(Collider::Apple(self.id)),
            EntityKind::Block => Some(Collider::Block),
            EntityKind::Wall => Some(Collider::WallSegment),
            EntityKind::Tail { snake, .. } => Some(Collider::TailSegment { owner: snake }),
            EntityKind::Head { .. } | EntityKind::Score { .. } => None,
        }
    }
}
