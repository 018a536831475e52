use std::collections::HashMap;

use bevy::prelude::{IVec3, Resource, Vec3};
use serde::{Deserialize, Serialize};

use crate::types::Aabb;

pub type ContentId = u16;

pub const CONTENT_UNKNOWN: ContentId = 125;
pub const CONTENT_AIR: ContentId = 126;
pub const CONTENT_IGNORE: ContentId = 127;

const BLOCK_SIZE: i32 = 16;
const BLOCK_VOLUME: usize = (BLOCK_SIZE * BLOCK_SIZE * BLOCK_SIZE) as usize;

/// Read access to voxel content. `None` means the position is not loaded.
pub trait VoxelQuery {
    fn get_node(&self, p: IVec3) -> Option<ContentId>;
}

/// Sparse map of 16³ blocks. Positions inside a missing block are invalid.
#[derive(Resource, Default, Clone)]
pub struct VoxelMap {
    blocks: HashMap<IVec3, Vec<ContentId>>,
}

impl VoxelMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn split(p: IVec3) -> (IVec3, usize) {
        let block = IVec3::new(
            p.x.div_euclid(BLOCK_SIZE),
            p.y.div_euclid(BLOCK_SIZE),
            p.z.div_euclid(BLOCK_SIZE),
        );
        let local = IVec3::new(
            p.x.rem_euclid(BLOCK_SIZE),
            p.y.rem_euclid(BLOCK_SIZE),
            p.z.rem_euclid(BLOCK_SIZE),
        );
        let idx = (local.y * BLOCK_SIZE * BLOCK_SIZE + local.z * BLOCK_SIZE + local.x) as usize;
        (block, idx)
    }

    pub fn load_block(&mut self, block: IVec3) {
        self.blocks
            .entry(block)
            .or_insert_with(|| vec![CONTENT_AIR; BLOCK_VOLUME]);
    }

    /// Makes every block overlapping the node range `min..=max` valid.
    pub fn load_region(&mut self, min: IVec3, max: IVec3) {
        let (bmin, _) = Self::split(min.min(max));
        let (bmax, _) = Self::split(min.max(max));
        for y in bmin.y..=bmax.y {
            for z in bmin.z..=bmax.z {
                for x in bmin.x..=bmax.x {
                    self.load_block(IVec3::new(x, y, z));
                }
            }
        }
    }

    pub fn unload_block(&mut self, block: IVec3) {
        self.blocks.remove(&block);
    }

    pub fn is_loaded(&self, p: IVec3) -> bool {
        self.blocks.contains_key(&Self::split(p).0)
    }

    pub fn set_node(&mut self, p: IVec3, content: ContentId) {
        let (block, idx) = Self::split(p);
        let nodes = self
            .blocks
            .entry(block)
            .or_insert_with(|| vec![CONTENT_AIR; BLOCK_VOLUME]);
        nodes[idx] = content;
    }

    pub fn fill(&mut self, min: IVec3, max: IVec3, content: ContentId) {
        let lo = min.min(max);
        let hi = min.max(max);
        for y in lo.y..=hi.y {
            for z in lo.z..=hi.z {
                for x in lo.x..=hi.x {
                    self.set_node(IVec3::new(x, y, z), content);
                }
            }
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl VoxelQuery for VoxelMap {
    fn get_node(&self, p: IVec3) -> Option<ContentId> {
        let (block, idx) = Self::split(p);
        self.blocks.get(&block).and_then(|nodes| nodes.get(idx).copied())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeBox {
    #[default]
    Regular,
    /// Boxes in node-local coordinates, `[min_x, min_y, min_z, max_x, max_y, max_z]`.
    Fixed { boxes: Vec<[f32; 6]> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDef {
    pub name: String,
    pub walkable: bool,
    pub climbable: bool,
    pub liquid_move_physics: bool,
    pub move_resistance: u8,
    pub groups: HashMap<String, i32>,
    pub collision_box: NodeBox,
}

impl Default for NodeDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            walkable: true,
            climbable: false,
            liquid_move_physics: false,
            move_resistance: 0,
            groups: HashMap::new(),
            collision_box: NodeBox::Regular,
        }
    }
}

impl NodeDef {
    pub fn solid(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn passable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            walkable: false,
            ..Default::default()
        }
    }

    pub fn liquid(name: &str, move_resistance: u8) -> Self {
        Self {
            name: name.to_string(),
            walkable: false,
            liquid_move_physics: true,
            move_resistance,
            ..Default::default()
        }
    }

    pub fn with_group(mut self, group: &str, rating: i32) -> Self {
        self.groups.insert(group.to_string(), rating);
        self
    }

    pub fn with_boxes(mut self, boxes: Vec<[f32; 6]>) -> Self {
        self.collision_box = NodeBox::Fixed { boxes };
        self
    }

    pub fn climbable(mut self) -> Self {
        self.climbable = true;
        self
    }

    pub fn collision_boxes(&self) -> Vec<Aabb> {
        match &self.collision_box {
            NodeBox::Regular => vec![Aabb::unit()],
            NodeBox::Fixed { boxes } => boxes.iter().copied().map(Aabb::from_array).collect(),
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        let boxes = self.collision_boxes();
        let mut iter = boxes.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, Aabb::union),
            None => Aabb::new(Vec3::ZERO, Vec3::ZERO),
        }
    }

    pub fn group(&self, name: &str) -> i32 {
        itemgroup_get(&self.groups, name)
    }
}

pub fn itemgroup_get(groups: &HashMap<String, i32>, name: &str) -> i32 {
    groups.get(name).copied().unwrap_or(0)
}

/// Content id to node definition table.
#[derive(Resource, Clone, Debug)]
pub struct NodeRegistry {
    defs: HashMap<ContentId, NodeDef>,
    by_name: HashMap<String, ContentId>,
    unknown: NodeDef,
    next_id: ContentId,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            defs: HashMap::new(),
            by_name: HashMap::new(),
            unknown: NodeDef::passable("undefined"),
            next_id: 0,
        };
        registry.insert(CONTENT_AIR, NodeDef::passable("air"));
        registry.insert(CONTENT_IGNORE, NodeDef::passable("ignore"));
        registry.insert(CONTENT_UNKNOWN, NodeDef::solid("unknown"));
        registry
    }

    pub fn from_defs(defs: impl IntoIterator<Item = NodeDef>) -> Self {
        let mut registry = Self::new();
        for def in defs {
            registry.register(def);
        }
        registry
    }

    fn insert(&mut self, id: ContentId, def: NodeDef) {
        self.by_name.insert(def.name.clone(), id);
        self.defs.insert(id, def);
    }

    /// Registers `def` under the next free id. Re-registering a name
    /// replaces the definition and keeps its id.
    pub fn register(&mut self, def: NodeDef) -> ContentId {
        if let Some(&id) = self.by_name.get(&def.name) {
            self.defs.insert(id, def);
            return id;
        }
        while matches!(self.next_id, CONTENT_UNKNOWN | CONTENT_AIR | CONTENT_IGNORE) {
            self.next_id += 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.insert(id, def);
        id
    }

    pub fn get(&self, id: ContentId) -> &NodeDef {
        self.defs.get(&id).unwrap_or(&self.unknown)
    }

    pub fn id_of(&self, name: &str) -> Option<ContentId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Another collidable entity near the player, in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynamicObject {
    pub id: u32,
    pub collision_box: Aabb,
    pub velocity: Vec3,
    pub bouncy: i32,
}

impl DynamicObject {
    pub fn at_rest(&self) -> bool {
        self.velocity.length_squared() < 1e-6
    }
}

/// Borrowed view of everything the movement core reads from the world.
#[derive(Clone, Copy)]
pub struct WorldView<'a> {
    map: &'a dyn VoxelQuery,
    nodes: &'a NodeRegistry,
    objects: &'a [DynamicObject],
}

impl<'a> WorldView<'a> {
    pub fn new(map: &'a dyn VoxelQuery, nodes: &'a NodeRegistry) -> Self {
        Self {
            map,
            nodes,
            objects: &[],
        }
    }

    pub fn with_objects(mut self, objects: &'a [DynamicObject]) -> Self {
        self.objects = objects;
        self
    }

    pub fn objects(&self) -> &'a [DynamicObject] {
        self.objects
    }

    pub fn nodes(&self) -> &'a NodeRegistry {
        self.nodes
    }

    pub fn node(&self, p: IVec3) -> Option<(ContentId, &'a NodeDef)> {
        self.map.get_node(p).map(|id| (id, self.nodes.get(id)))
    }

    pub fn def_at(&self, p: IVec3) -> Option<&'a NodeDef> {
        self.node(p).map(|(_, def)| def)
    }

    pub fn walkable_at(&self, p: IVec3) -> bool {
        self.def_at(p).is_some_and(|def| def.walkable)
    }

    pub fn group_at(&self, p: IVec3, group: &str) -> i32 {
        self.def_at(p).map_or(0, |def| def.group(group))
    }
}

pub fn floor_to_node(pos: Vec3) -> IVec3 {
    pos.floor().as_ivec3()
}
