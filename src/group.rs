use std::cell::OnceCell;
use std::collections::HashMap;
use std::iter;

use crate::Coords;
use crate::entity::{Entity, EntityId};
use crate::error::{GameError, GameResult};

#[derive(Clone, Debug)]
pub enum Member {
    Entity(Entity),
    Group(EntityGroup),
}

impl From<Entity> for Member {
    fn from(entity: Entity) -> Self {
        Member::Entity(entity)
    }
}

impl From<EntityGroup> for Member {
    fn from(group: EntityGroup) -> Self {
        Member::Group(group)
    }
}

/// An ordered composite of entities and nested groups.
///
/// The location map is built lazily and dropped on every mutable access,
/// so a lookup always sees current positions. When two leaves share a cell
/// the one later in depth-first order owns it.
#[derive(Clone, Debug, Default)]
pub struct EntityGroup {
    members: Vec<Member>,
    // Cell -> ordinal of the owning leaf in depth-first order
    locations: OnceCell<HashMap<Coords, usize>>,
}

impl EntityGroup {
    pub fn new() -> Self {
        EntityGroup::default()
    }

    pub fn with_members<I, M>(members: I) -> GameResult<Self>
    where
        I: IntoIterator<Item = M>,
        M: Into<Member>,
    {
        let mut group = EntityGroup::new();
        for member in members {
            group.append(member)?;
        }
        Ok(group)
    }

    /// Adds a member at the end (top of the z-order).
    pub fn append(&mut self, member: impl Into<Member>) -> GameResult<()> {
        let member = member.into();
        let incoming: Vec<EntityId> = match &member {
            Member::Entity(entity) => vec![entity.id()],
            Member::Group(group) => group.leaves().map(Entity::id).collect(),
        };
        if let Some(&id) = incoming.iter().find(|id| self.contains(**id)) {
            return Err(GameError::InvalidComposition { id });
        }

        self.invalidate();
        self.members.push(member);
        Ok(())
    }

    /// Removes a top-level entity member.
    pub fn remove(&mut self, id: EntityId) -> GameResult<Entity> {
        let index = self.members.iter().position(|m| matches!(m, Member::Entity(e) if e.id() == id));

        match index {
            Some(i) => {
                self.invalidate();
                match self.members.remove(i) {
                    Member::Entity(entity) => Ok(entity),
                    Member::Group(_) => unreachable!("position matched an entity member"),
                }
            }
            None => Err(GameError::InvalidMembership { id }),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.leaves().any(|e| e.id() == id)
    }

    /// Number of leaf entities, nested groups included.
    pub fn len(&self) -> usize {
        self.members.iter().map(|m| match m {
            Member::Entity(_) => 1,
            Member::Group(g) => g.len(),
        }).sum()
    }

    /// Leaf entities in depth-first order, which is also the paint order.
    pub fn leaves<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Entity> + 'a> {
        Box::new(self.members.iter().flat_map(|m: &'a Member| -> Box<dyn Iterator<Item = &'a Entity> + 'a> {
            match m {
                Member::Entity(entity) => Box::new(iter::once(entity)),
                Member::Group(group) => group.leaves(),
            }
        }))
    }

    pub fn leaves_mut(&mut self) -> Vec<&mut Entity> {
        let mut out = Vec::with_capacity(self.members.len());
        self.collect_leaves_mut(&mut out);
        out
    }

    pub fn leaf(&self, index: usize) -> Option<&Entity> {
        self.leaves().nth(index)
    }

    pub fn last(&self) -> Option<&Entity> {
        self.leaves().last()
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut EntityGroup> {
        self.invalidate();
        match self.members.get_mut(index) {
            Some(Member::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// Location of every leaf, last writer wins.
    pub fn flatten(&self) -> HashMap<Coords, &Entity> {
        let mut map = HashMap::with_capacity(self.len());
        for entity in self.leaves() {
            map.insert(entity.pos(), entity);
        }
        map
    }

    pub fn collision_at(&self, pos: Coords) -> Option<&Entity> {
        let ordinal = *self.locations().get(&pos)?;
        self.leaf(ordinal)
    }

    ///////////////////////////////////////////////////////////////////////////

    fn locations(&self) -> &HashMap<Coords, usize> {
        self.locations.get_or_init(|| {
            self.leaves().enumerate().map(|(i, e)| (e.pos(), i)).collect()
        })
    }

    fn collect_leaves_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Entity>) {
        self.invalidate();
        for member in self.members.iter_mut() {
            match member {
                Member::Entity(entity) => out.push(entity),
                Member::Group(group) => group.collect_leaves_mut(out),
            }
        }
    }

    fn invalidate(&mut self) {
        self.locations.take();
    }
}

#[derive(Copy, Clone, Debug)]
pub enum Layer<'a> {
    Entity(&'a Entity),
    Group(&'a EntityGroup),
}

/// A borrowed composite over entities and groups owned elsewhere. Built per
/// query; each layer keeps its own location cache.
#[derive(Clone, Debug, Default)]
pub struct GroupView<'a> {
    layers: Vec<Layer<'a>>,
}

impl<'a> GroupView<'a> {
    pub fn new() -> Self {
        GroupView::default()
    }

    pub fn push_entity(&mut self, entity: &'a Entity) {
        self.layers.push(Layer::Entity(entity));
    }

    pub fn push_group(&mut self, group: &'a EntityGroup) {
        self.layers.push(Layer::Group(group));
    }

    pub fn len(&self) -> usize {
        self.layers.iter().map(|l| match l {
            Layer::Entity(_) => 1,
            Layer::Group(g) => g.len(),
        }).sum()
    }

    /// Location of every entity across the layers, later layers winning.
    pub fn flatten(&self) -> HashMap<Coords, &'a Entity> {
        let mut map = HashMap::with_capacity(self.len());
        for layer in &self.layers {
            match *layer {
                Layer::Entity(entity) => {
                    map.insert(entity.pos(), entity);
                }
                Layer::Group(group) => map.extend(group.flatten()),
            }
        }
        map
    }

    /// Topmost entity at `pos`, consistent with `flatten`.
    pub fn collision_at(&self, pos: Coords) -> Option<&'a Entity> {
        self.layers.iter().rev().find_map(|l| match *l {
            Layer::Entity(entity) => Some(entity).filter(|e| e.pos() == pos),
            Layer::Group(group) => group.collision_at(pos),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ColorTag, Heading};
    use pretty_assertions::assert_eq;

    #[test]
    fn flatten_is_last_write_wins() {
        let a = Entity::block((3, 4));
        let b = Entity::apple((3, 4));
        let group = EntityGroup::with_members(vec![a, b]).unwrap();

        let map = group.flatten();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&(3, 4)].id(), b.id());
        assert_eq!(group.collision_at((3, 4)).map(Entity::id), Some(b.id()));
    }

    #[test]
    fn nested_groups_flatten_recursively() {
        let inner = EntityGroup::with_members(vec![Entity::block((1, 1)), Entity::block((1, 2))]).unwrap();
        let deeper = EntityGroup::with_members(vec![
            Member::from(Entity::apple((2, 2))),
            Member::from(EntityGroup::with_members(vec![Entity::wall((0, 0), true)]).unwrap()),
        ]).unwrap();

        let mut outer = EntityGroup::new();
        outer.append(inner).unwrap();
        outer.append(deeper).unwrap();
        outer.append(Entity::apple((5, 5))).unwrap();

        assert_eq!(outer.len(), 5);
        let map = outer.flatten();
        let mut cells: Vec<Coords> = map.keys().copied().collect();
        cells.sort();
        assert_eq!(cells, vec![(0, 0), (1, 1), (1, 2), (2, 2), (5, 5)]);
        assert_eq!(outer.leaf(3).map(Entity::pos), Some((0, 0)));
    }

    #[test]
    fn collision_at_misses_empty_cells() {
        let group = EntityGroup::with_members(vec![Entity::block((1, 1))]).unwrap();
        assert!(group.collision_at((1, 2)).is_none());
        assert!(EntityGroup::new().collision_at((0, 0)).is_none());
    }

    #[test]
    fn remove_unknown_member_fails() {
        let apple = Entity::apple((1, 1));
        let stranger = Entity::apple((1, 1));
        let mut group = EntityGroup::with_members(vec![apple]).unwrap();

        assert_eq!(
            group.remove(stranger.id()),
            Err(GameError::InvalidMembership { id: stranger.id() })
        );
        assert_eq!(group.remove(apple.id()), Ok(apple));
        assert_eq!(group.len(), 0);
        assert_eq!(
            group.remove(apple.id()),
            Err(GameError::InvalidMembership { id: apple.id() })
        );
    }

    #[test]
    fn remove_drops_location() {
        let apple = Entity::apple((4, 4));
        let mut group = EntityGroup::with_members(vec![apple]).unwrap();
        assert!(group.collision_at((4, 4)).is_some());

        group.remove(apple.id()).unwrap();
        assert!(group.collision_at((4, 4)).is_none());
    }

    #[test]
    fn double_membership_is_rejected() {
        let block = Entity::block((2, 2));
        let mut group = EntityGroup::with_members(vec![block]).unwrap();

        assert_eq!(group.append(block), Err(GameError::InvalidComposition { id: block.id() }));

        let nested = EntityGroup::with_members(vec![Entity::block((3, 3)), block]).unwrap();
        assert_eq!(group.append(nested), Err(GameError::InvalidComposition { id: block.id() }));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn lookups_follow_moved_entities() {
        let tail = Entity::tail(0, (5, 5), Heading::DOWN, ColorTag::Yellow).unwrap();
        let mut group = EntityGroup::with_members(vec![tail]).unwrap();
        assert!(group.collision_at((5, 5)).is_some());

        for segment in group.leaves_mut() {
            segment.place_segment((6, 5), Heading::DOWN).unwrap();
        }

        assert!(group.collision_at((5, 5)).is_none());
        assert_eq!(group.collision_at((6, 5)).map(Entity::id), Some(tail.id()));
    }

    #[test]
    fn nested_moves_invalidate_parent() {
        let tail = Entity::tail(0, (1, 1), Heading::RIGHT, ColorTag::Yellow).unwrap();
        let mut outer = EntityGroup::new();
        outer.append(EntityGroup::with_members(vec![tail]).unwrap()).unwrap();
        assert!(outer.collision_at((1, 1)).is_some());

        let inner = outer.group_mut(0).unwrap();
        inner.leaves_mut()[0].place_segment((1, 2), Heading::RIGHT).unwrap();

        assert!(outer.collision_at((1, 1)).is_none());
        assert!(outer.collision_at((1, 2)).is_some());
    }

    #[test]
    fn view_layers_stack_in_order() {
        let wall = EntityGroup::with_members(vec![Entity::wall((0, 3), false), Entity::wall((0, 4), false)]).unwrap();
        let score = Entity::score_digit(0, (0, 3), '7', ColorTag::Green);

        let mut view = GroupView::new();
        view.push_group(&wall);
        view.push_entity(&score);

        assert_eq!(view.len(), 3);
        assert_eq!(view.flatten()[&(0, 3)].glyph(), '7');
        assert_eq!(view.collision_at((0, 3)).map(Entity::id), Some(score.id()));
        assert_eq!(view.collision_at((0, 4)).map(Entity::glyph), Some('-'));
        assert!(view.collision_at((0, 5)).is_none());
    }
}
