use std::fmt;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::Coords;
use crate::config::GameConfig;
use crate::entity::{Cell, ColorTag, Collidable, Collider, Entity, EntityId, Heading};
use crate::error::{GameError, GameResult};
use crate::group::{EntityGroup, GroupView};
use crate::keys::{Key, Keymap};
use crate::snake::Snake;

const HEAD_COLORS: [ColorTag; 2] = [ColorTag::Green, ColorTag::Cyan];
const TAIL_COLORS: [ColorTag; 2] = [ColorTag::Yellow, ColorTag::Blue];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Each snake has its own keys.
    Independent,
    /// Snakes start facing each other, one on arrows, one on mirrored arrows.
    Paired,
    /// Paired, and every apple swaps the snakes' keys and colors.
    Switching,
}

impl Mode {
    pub fn from_key(key: Key) -> Option<Mode> {
        match key {
            Key::Char('w') => Some(Mode::Independent),
            Key::Up => Some(Mode::Paired),
            Key::Down => Some(Mode::Switching),
            _ => None,
        }
    }

    pub fn is_paired(self) -> bool {
        matches!(self, Mode::Paired | Mode::Switching)
    }

    fn keymaps(self) -> [Keymap; 2] {
        match self {
            Mode::Independent => [Keymap::wasd(), Keymap::arrows()],
            Mode::Paired | Mode::Switching => [Keymap::arrows(), Keymap::mirrored_arrows()],
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Independent => "independent",
            Mode::Paired => "paired",
            Mode::Switching => "switching",
        };
        f.write_str(name)
    }
}

/// Result of one movement step for one snake.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Moved,
    Ate,
    Died(Collider),
    /// The round is already decided; nothing moved.
    Idle,
}

/// Everything on the board for one round.
pub struct World {
    width: i32,
    height: i32,
    mode: Mode,
    snakes: Vec<Snake>,
    scores: Vec<u32>,
    scoreboard: EntityGroup,
    apples: EntityGroup,
    blocks: EntityGroup,
    walls: EntityGroup,
    rng: StdRng,
}

impl World {
    pub fn new(mode: Mode, config: &GameConfig) -> GameResult<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        World::with_rng(mode, config, rng)
    }

    pub fn with_rng(mode: Mode, config: &GameConfig, rng: StdRng) -> GameResult<Self> {
        let (width, height) = (config.width, config.height);
        let start_row = config.start_row();

        let starts = if mode.is_paired() {
            [((start_row, width / 3), Heading::DOWN), ((height - start_row, 2 * width / 3), Heading::UP)]
        } else {
            [((start_row, width / 3), Heading::DOWN), ((start_row, 2 * width / 3), Heading::DOWN)]
        };

        let mut snakes = Vec::with_capacity(starts.len());
        for (i, ((pos, heading), keymap)) in starts.into_iter().zip(mode.keymaps()).enumerate() {
            snakes.push(Snake::new(i, pos, heading, config.initial_length, keymap, HEAD_COLORS[i], TAIL_COLORS[i])?);
        }

        let mut world = World {
            width,
            height,
            mode,
            scores: vec![0; snakes.len()],
            snakes,
            scoreboard: EntityGroup::new(),
            apples: EntityGroup::new(),
            blocks: EntityGroup::new(),
            walls: make_walls(width, height)?,
            rng,
        };

        for i in 0..world.snakes.len() {
            let digits = world.score_digits(i)?;
            world.scoreboard.append(digits)?;
        }
        for _ in 0..config.apples {
            world.add_apple(None)?;
        }
        for _ in 0..config.blocks {
            world.add_block(None)?;
        }

        Ok(world)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn snakes(&self) -> &[Snake] {
        &self.snakes
    }

    pub fn snake(&self, index: usize) -> GameResult<&Snake> {
        self.snakes.get(index).ok_or(GameError::UnknownSnake { index })
    }

    pub fn snake_mut(&mut self, index: usize) -> GameResult<&mut Snake> {
        self.snakes.get_mut(index).ok_or(GameError::UnknownSnake { index })
    }

    pub fn scores(&self) -> &[u32] {
        &self.scores
    }

    pub fn apples(&self) -> &EntityGroup {
        &self.apples
    }

    pub fn blocks(&self) -> &EntityGroup {
        &self.blocks
    }

    pub fn is_game_over(&self) -> bool {
        self.snakes.iter().any(|s| !s.is_alive())
    }

    /// A uniformly random interior cell. Occupancy is not checked.
    pub fn random_location(&mut self) -> Coords {
        (self.rng.gen_range(1..self.height), self.rng.gen_range(1..self.width))
    }

    pub fn add_apple(&mut self, pos: Option<Coords>) -> GameResult<EntityId> {
        let pos = pos.unwrap_or_else(|| self.random_location());
        let apple = Entity::apple(pos);
        self.apples.append(apple)?;
        Ok(apple.id())
    }

    pub fn remove_apple(&mut self, id: EntityId) -> GameResult<()> {
        self.apples.remove(id).map(|_| ())
    }

    pub fn add_block(&mut self, pos: Option<Coords>) -> GameResult<EntityId> {
        let pos = pos.unwrap_or_else(|| self.random_location());
        let block = Entity::block(pos);
        self.blocks.append(block)?;
        Ok(block.id())
    }

    pub fn increment_score(&mut self, snake: usize) -> GameResult<u32> {
        let score = self.scores.get_mut(snake).ok_or(GameError::UnknownSnake { index: snake })?;
        *score += 1;
        let score = *score;

        let digits = self.score_digits(snake)?;
        if let Some(group) = self.scoreboard.group_mut(snake) {
            *group = digits;
        }
        Ok(score)
    }

    /// Swaps keymaps and colors between the two snakes.
    pub fn switch_snakes(&mut self) {
        if let [first, second, ..] = self.snakes.as_mut_slice() {
            let keymap = first.replace_keymap(second.keymap().clone());
            second.replace_keymap(keymap);

            let (head, tail) = (first.head_color(), first.tail_color());
            first.set_head_color(second.head_color());
            first.set_tail_color(second.tail_color());
            second.set_head_color(head);
            second.set_tail_color(tail);
            debug!("Snakes switched keys and colors");
        }
    }

    /// Routes a key to every snake whose keymap binds it.
    pub fn steer(&mut self, key: Key) -> bool {
        let mut handled = false;
        for snake in self.snakes.iter_mut() {
            if let Some(heading) = snake.keymap().heading_for(key) {
                snake.set_heading(heading);
                handled = true;
            }
        }
        handled
    }

    /// Blocks, apples, walls and every tail segment.
    pub fn collidables(&self) -> GroupView<'_> {
        let mut view = GroupView::new();
        view.push_group(&self.blocks);
        view.push_group(&self.apples);
        view.push_group(&self.walls);
        for snake in &self.snakes {
            view.push_group(snake.tail());
        }
        view
    }

    /// Everything visible, in paint order: scores over walls, heads over tails.
    pub fn drawables(&self) -> GroupView<'_> {
        let mut view = GroupView::new();
        view.push_group(&self.blocks);
        view.push_group(&self.apples);
        view.push_group(&self.walls);
        view.push_group(&self.scoreboard);
        for snake in &self.snakes {
            view.push_group(snake.tail());
            view.push_entity(snake.head());
        }
        view
    }

    /// A consistent copy of the drawable cells, safe to paint after the
    /// world lock is released.
    pub fn frame(&self) -> Vec<(Coords, Cell)> {
        self.drawables().flatten().into_iter().map(|(pos, e)| (pos, e.cell())).collect()
    }

    /// Advances one snake and applies whatever its head lands on.
    pub fn tick(&mut self, snake: usize) -> GameResult<TickOutcome> {
        if self.is_game_over() {
            return Ok(TickOutcome::Idle);
        }

        let moving = self.snake_mut(snake)?;
        moving.advance()?;
        let head = moving.head().pos();

        let hit = if moving.is_self_colliding() {
            Some(Collider::TailSegment { owner: snake })
        } else {
            self.collidables().collision_at(head).and_then(Entity::collider)
        };
        match hit {
            None => Ok(TickOutcome::Moved),
            Some(collider) => {
                collider.on_collision(self, snake)?;
                match collider {
                    Collider::Apple(_) => Ok(TickOutcome::Ate),
                    other => {
                        info!("Snake {} died on {:?} at {:?}", snake, other, head);
                        Ok(TickOutcome::Died(other))
                    }
                }
            }
        }
    }

    ///////////////////////////////////////////////////////////////////////////

    fn eat_apple(&mut self, snake: usize, apple: EntityId) -> GameResult<()> {
        let score = self.increment_score(snake)?;
        self.snake_mut(snake)?.grow()?;
        self.add_apple(None)?;
        self.remove_apple(apple)?;
        self.add_block(None)?;
        let length = self.snake(snake)?.len();
        info!("Snake {} ate an apple, score {}, length {}", snake, score, length);

        if self.mode == Mode::Switching {
            self.switch_snakes();
        }
        Ok(())
    }

    /// Score digits for one snake, on the bottom wall under its start column.
    fn score_digits(&self, snake: usize) -> GameResult<EntityGroup> {
        let col = (snake as i32 + 1) * self.width / 3;
        let color = HEAD_COLORS.get(snake).copied().unwrap_or(ColorTag::White);
        let score = self.scores.get(snake).copied().unwrap_or_default();

        EntityGroup::with_members(score.to_string().chars().enumerate().map(|(i, digit)| {
            Entity::score_digit(snake, (self.height, col + i as i32), digit, color)
        }))
    }
}

impl Collidable for Collider {
    fn on_collision(&self, world: &mut World, snake: usize) -> GameResult<()> {
        match *self {
            Collider::Apple(apple) => world.eat_apple(snake, apple),
            Collider::Block | Collider::WallSegment | Collider::TailSegment { .. } => {
                world.snake_mut(snake)?.kill();
                Ok(())
            }
        }
    }
}

/// The bounding box: rows 0 and `height`, columns 0 and `width`.
fn make_walls(width: i32, height: i32) -> GameResult<EntityGroup> {
    let top = EntityGroup::with_members((0..=width).map(|col| Entity::wall((0, col), false)))?;
    let bottom = EntityGroup::with_members((0..=width).map(|col| Entity::wall((height, col), false)))?;
    let left = EntityGroup::with_members((1..height).map(|row| Entity::wall((row, 0), true)))?;
    let right = EntityGroup::with_members((1..height).map(|row| Entity::wall((row, width), true)))?;

    EntityGroup::with_members(vec![top, left, right, bottom])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::thread;

    const RNG_SEED: u64 = 0x5EED_5A4E;

    fn config(apples: usize, blocks: usize) -> GameConfig {
        GameConfig { width: 24, height: 16, apples, blocks, ..GameConfig::default() }
    }

    fn world(mode: Mode, config: &GameConfig) -> World {
        World::with_rng(mode, config, StdRng::seed_from_u64(RNG_SEED)).unwrap()
    }

    fn next_head(world: &World, snake: usize) -> Coords {
        let snake = world.snake(snake).unwrap();
        snake.pending_heading().step(snake.head().pos())
    }

    #[test]
    fn fresh_world_matches_config() {
        let config = config(3, 2);
        let world = world(Mode::Independent, &config);

        assert_eq!(world.apples().len(), 3);
        assert_eq!(world.blocks().len(), 2);
        assert_eq!(world.scores(), &[0, 0]);
        assert_eq!(world.snakes().len(), 2);
        assert!(world.snakes().iter().all(|s| s.len() == config.initial_length && s.is_alive()));
        assert_eq!(world.walls.len(), 2 * (24 + 1) + 2 * (16 - 1));
        assert!(!world.is_game_over());
    }

    #[test]
    fn starting_layout_per_mode() {
        let config = config(0, 0);

        let independent = world(Mode::Independent, &config);
        assert_eq!(independent.snake(0).unwrap().head().pos(), (5, 8));
        assert_eq!(independent.snake(1).unwrap().head().pos(), (5, 16));
        assert_eq!(independent.snake(1).unwrap().heading(), Ok(Heading::DOWN));
        assert_eq!(independent.snake(0).unwrap().keymap(), &Keymap::wasd());

        let paired = world(Mode::Paired, &config);
        assert_eq!(paired.snake(1).unwrap().head().pos(), (11, 16));
        assert_eq!(paired.snake(1).unwrap().heading(), Ok(Heading::UP));
        assert_eq!(paired.snake(1).unwrap().keymap(), &Keymap::mirrored_arrows());
    }

    #[test]
    fn random_spawns_stay_inside_walls() {
        let mut world = world(Mode::Paired, &config(0, 0));
        for _ in 0..2000 {
            let (row, col) = world.random_location();
            assert!((1..16).contains(&row) && (1..24).contains(&col), "{:?}", (row, col));
        }
    }

    #[test]
    fn eating_an_apple() {
        let mut world = world(Mode::Independent, &config(0, 0));
        let target = next_head(&world, 0);
        world.add_apple(Some(target)).unwrap();
        let length = world.snake(0).unwrap().len();

        assert_eq!(world.tick(0), Ok(TickOutcome::Ate));
        assert_eq!(world.scores(), &[1, 0]);
        assert_eq!(world.apples().len(), 1);
        assert_eq!(world.snake(0).unwrap().len(), length + 1);
        assert_eq!(world.blocks().len(), 1);
        assert!(world.snake(0).unwrap().is_alive());
    }

    #[test]
    fn hitting_a_block_kills_without_scoring() {
        let mut world = world(Mode::Independent, &config(0, 0));
        let target = next_head(&world, 1);
        world.add_block(Some(target)).unwrap();

        assert_eq!(world.tick(1), Ok(TickOutcome::Died(Collider::Block)));
        assert!(!world.snake(1).unwrap().is_alive());
        assert!(world.snake(0).unwrap().is_alive());
        assert_eq!(world.scores(), &[0, 0]);
        assert!(world.is_game_over());

        // Decided rounds stop moving
        let head = world.snake(0).unwrap().head().pos();
        assert_eq!(world.tick(0), Ok(TickOutcome::Idle));
        assert_eq!(world.snake(0).unwrap().head().pos(), head);
    }

    #[test]
    fn running_into_the_wall() {
        let mut world = world(Mode::Independent, &config(0, 0));
        world.steer(Key::Char('a'));

        let mut outcome = TickOutcome::Moved;
        for _ in 0..8 {
            outcome = world.tick(0).unwrap();
        }
        assert_eq!(outcome, TickOutcome::Died(Collider::WallSegment));
        assert_eq!(world.snake(0).unwrap().head().pos(), (5, 0));
    }

    #[test]
    fn running_into_a_rival_tail() {
        let mut world = world(Mode::Independent, &config(0, 0));

        world.steer(Key::Char('d'));
        for _ in 0..7 {
            assert_eq!(world.tick(0), Ok(TickOutcome::Moved));
        }
        world.steer(Key::Char('w'));
        assert_eq!(world.tick(0), Ok(TickOutcome::Moved));
        world.steer(Key::Char('d'));

        assert_eq!(next_head(&world, 0), (4, 16));
        assert_eq!(world.tick(0), Ok(TickOutcome::Died(Collider::TailSegment { owner: 1 })));
        assert!(!world.snake(0).unwrap().is_alive());
    }

    #[test]
    fn running_into_own_tail() {
        let mut world = world(Mode::Independent, &config(0, 0));
        for key in ['d', 'w'] {
            world.steer(Key::Char(key));
            assert_eq!(world.tick(0), Ok(TickOutcome::Moved));
        }
        world.steer(Key::Char('a'));
        assert_eq!(world.tick(0), Ok(TickOutcome::Died(Collider::TailSegment { owner: 0 })));
    }

    #[test]
    fn steering_follows_keymaps() {
        let mut world = world(Mode::Independent, &config(0, 0));
        assert!(world.steer(Key::Char('d')));
        assert!(world.steer(Key::Left));
        assert!(!world.steer(Key::Char('x')));

        assert_eq!(world.snake(0).unwrap().pending_heading(), Heading::RIGHT);
        assert_eq!(world.snake(1).unwrap().pending_heading(), Heading::LEFT);
    }

    #[test]
    fn paired_arrows_steer_both_snakes() {
        let mut world = world(Mode::Paired, &config(0, 0));
        world.steer(Key::Left);
        assert_eq!(world.snake(0).unwrap().pending_heading(), Heading::LEFT);
        assert_eq!(world.snake(1).unwrap().pending_heading(), Heading::RIGHT);
    }

    #[test]
    fn switching_mode_swaps_on_every_apple() {
        let mut world = world(Mode::Switching, &config(0, 0));
        let target = next_head(&world, 0);
        world.add_apple(Some(target)).unwrap();

        assert_eq!(world.tick(0), Ok(TickOutcome::Ate));
        let (first, second) = (world.snake(0).unwrap(), world.snake(1).unwrap());
        assert_eq!(first.keymap(), &Keymap::mirrored_arrows());
        assert_eq!(second.keymap(), &Keymap::arrows());
        assert_eq!(first.head_color(), ColorTag::Cyan);
        assert_eq!(second.head_color(), ColorTag::Green);
        assert!(first.tail().leaves().all(|s| s.color() == ColorTag::Blue));
        assert!(second.tail().leaves().all(|s| s.color() == ColorTag::Yellow));
    }

    #[test]
    fn paired_mode_never_swaps() {
        let mut world = world(Mode::Paired, &config(0, 0));
        let target = next_head(&world, 1);
        world.add_apple(Some(target)).unwrap();

        assert_eq!(world.tick(1), Ok(TickOutcome::Ate));
        assert_eq!(world.snake(0).unwrap().keymap(), &Keymap::arrows());
        assert_eq!(world.snake(1).unwrap().head_color(), ColorTag::Cyan);
    }

    #[test]
    fn scores_overdraw_the_bottom_wall() {
        let mut world = world(Mode::Independent, &config(0, 0));
        for _ in 0..12 {
            world.increment_score(1).unwrap();
        }

        let frame: std::collections::HashMap<Coords, Cell> = world.frame().into_iter().collect();
        assert_eq!(frame[&(16, 16)], Cell { glyph: '1', color: ColorTag::Cyan });
        assert_eq!(frame[&(16, 17)], Cell { glyph: '2', color: ColorTag::Cyan });
        assert_eq!(frame[&(16, 8)], Cell { glyph: '0', color: ColorTag::Green });
        assert_eq!(frame[&(16, 18)].glyph, '-');

        // Score digits are drawn but never collide
        let under_score = world.collidables().collision_at((16, 16)).and_then(Entity::collider);
        assert_eq!(under_score, Some(Collider::WallSegment));
    }

    #[test]
    fn removing_a_missing_apple_fails() {
        let mut world = world(Mode::Independent, &config(1, 0));
        let stray = Entity::apple((1, 1));
        assert_eq!(
            world.remove_apple(stray.id()),
            Err(GameError::InvalidMembership { id: stray.id() })
        );
        assert_eq!(world.apples().len(), 1);
    }

    #[test]
    fn unknown_snake_is_an_error() {
        let mut world = world(Mode::Independent, &config(0, 0));
        assert_eq!(world.tick(2), Err(GameError::UnknownSnake { index: 2 }));
        assert_eq!(world.increment_score(5), Err(GameError::UnknownSnake { index: 5 }));
    }

    #[test]
    fn concurrent_feeding_loses_no_updates() {
        const MEALS: usize = 500;
        let config = config(2, 1);
        let world = Mutex::new(world(Mode::Switching, &config));

        thread::scope(|s| {
            for snake in 0..2 {
                let world = &world;
                s.spawn(move || {
                    for _ in 0..MEALS {
                        let mut world = world.lock().unwrap();
                        let apple = world.apples().leaf(0).map(Entity::id).unwrap();
                        Collider::Apple(apple).on_collision(&mut *world, snake).unwrap();
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..MEALS {
                    let frame = world.lock().unwrap().frame();
                    assert!(!frame.is_empty());
                }
            });
            s.spawn(|| {
                for i in 0..MEALS {
                    let key = if i % 2 == 0 { Key::Left } else { Key::Up };
                    world.lock().unwrap().steer(key);
                }
            });
        });

        let world = world.into_inner().unwrap();
        assert_eq!(world.scores(), &[MEALS as u32, MEALS as u32]);
        assert_eq!(world.apples().len(), config.apples);
        assert_eq!(world.blocks().len(), config.blocks + 2 * MEALS);
        for snake in world.snakes() {
            assert_eq!(snake.len(), config.initial_length + MEALS);
        }
    }
}
