use crate::Coords;
use crate::entity::{ColorTag, Entity, Heading};
use crate::error::{GameError, GameResult};
use crate::group::EntityGroup;
use crate::keys::Keymap;

/// One player's body: a head plus a tail group ordered from the neck to the
/// tip. Each tail segment sits one step behind the segment in front of it.
#[derive(Clone, Debug)]
pub struct Snake {
    index: usize,
    head: Entity,
    tail: EntityGroup,
    pending: Heading,
    alive: bool,
    keymap: Keymap,
    tail_color: ColorTag,
}

impl Snake {
    pub fn new(
        index: usize,
        pos: Coords,
        heading: Heading,
        length: usize,
        keymap: Keymap,
        head_color: ColorTag,
        tail_color: ColorTag,
    ) -> GameResult<Self> {
        if length < 2 {
            return Err(GameError::SnakeTooShort { length });
        }

        let head = Entity::head(index, pos, heading, head_color)?;
        let mut snake = Snake {
            index,
            head,
            tail: EntityGroup::new(),
            pending: heading,
            alive: true,
            keymap,
            tail_color,
        };

        for _ in 1..length {
            snake.grow()?;
        }
        Ok(snake)
    }

    pub fn head(&self) -> &Entity {
        &self.head
    }

    pub fn tail(&self) -> &EntityGroup {
        &self.tail
    }

    /// Segment count, head included.
    pub fn len(&self) -> usize {
        self.tail.len() + 1
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    /// The heading the head last moved along.
    pub fn heading(&self) -> GameResult<Heading> {
        segment_heading(&self.head)
    }

    pub fn pending_heading(&self) -> Heading {
        self.pending
    }

    /// Requests a heading for the next tick. An exact reversal of the
    /// current heading is ignored.
    pub fn set_heading(&mut self, heading: Heading) {
        match self.heading() {
            Ok(current) if heading.is_opposite(current) => {}
            _ => self.pending = heading,
        }
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn replace_keymap(&mut self, keymap: Keymap) -> Keymap {
        std::mem::replace(&mut self.keymap, keymap)
    }

    pub fn head_color(&self) -> ColorTag {
        self.head.color()
    }

    pub fn set_head_color(&mut self, color: ColorTag) {
        self.head.set_color(color);
    }

    pub fn tail_color(&self) -> ColorTag {
        self.tail_color
    }

    pub fn set_tail_color(&mut self, color: ColorTag) {
        self.tail_color = color;
        for segment in self.tail.leaves_mut() {
            segment.set_color(color);
        }
    }

    /// Moves the whole body one step.
    ///
    /// Segments are copied from the tip toward the neck, each taking the
    /// position and heading its leader had before this step; then the head
    /// steps along the pending heading.
    pub fn advance(&mut self) -> GameResult<()> {
        let heading = self.pending;
        heading.head_glyph()?;

        let mut segments = self.tail.leaves_mut();
        for i in (0..segments.len()).rev() {
            let (pos, leader_heading) = if i == 0 {
                (self.head.pos(), segment_heading(&self.head)?)
            } else {
                (segments[i - 1].pos(), segment_heading(&*segments[i - 1])?)
            };
            segments[i].place_segment(pos, leader_heading)?;
        }

        let new_head = heading.step(self.head.pos());
        self.head.place_segment(new_head, heading)
    }

    /// Adds one segment behind the current last one, sharing its heading.
    pub fn grow(&mut self) -> GameResult<()> {
        let last = self.tail.last().unwrap_or(&self.head);
        let heading = segment_heading(last)?;
        let pos = heading.behind(last.pos());

        let segment = Entity::tail(self.index, pos, heading, self.tail_color)?;
        self.tail.append(segment)
    }

    pub fn is_self_colliding(&self) -> bool {
        self.tail.collision_at(self.head.pos()).is_some()
    }
}

fn segment_heading(segment: &Entity) -> GameResult<Heading> {
    segment.heading().ok_or(GameError::StationaryDirection)
}
