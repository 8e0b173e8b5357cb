use rustc_hash::FxHashMap;

use crate::entity::{Entity, EntityId, EntityType};
use crate::scene::{ClipKey, MeshKey, NodeHandle, SkeletonKey};

/// Where the registered object actually lives.
///
/// Entities are owned by their arenas (scene nodes, mesh library, clip
/// table, skeleton pool); the registry only maps ids back to those keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityHandle {
    Node(NodeHandle),
    Mesh(MeshKey),
    Clip(ClipKey),
    Skeleton(SkeletonKey),
}

#[derive(Debug, Clone, Copy)]
struct EntityRecord {
    entity_type: EntityType,
    handle: EntityHandle,
}

/// Assigns ids and answers id / type queries.
#[derive(Debug)]
pub struct EntityRegistry {
    next_id: u64,
    by_id: FxHashMap<EntityId, EntityRecord>,
    by_type: FxHashMap<EntityType, Vec<EntityId>>,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            by_id: FxHashMap::default(),
            by_type: FxHashMap::default(),
        }
    }

    /// Assigns the next id to `entity` and indexes it.
    ///
    /// Returns `false` when the entity already carries an id: that means
    /// "already registered", not a failure.
    pub fn register(&mut self, entity: &mut Entity, handle: EntityHandle) -> bool {
        if entity.id.is_assigned() {
            log::debug!("Entity {} is already registered", entity.id);
            return false;
        }

        let id = EntityId(self.next_id);
        self.next_id += 1;
        entity.id = id;

        let entity_type = entity.entity_type();
        self.by_id.insert(id, EntityRecord { entity_type, handle });
        self.by_type.entry(entity_type).or_default().push(id);
        if entity_type.is_scene_node() && entity_type != EntityType::SceneNode {
            self.by_type.entry(EntityType::SceneNode).or_default().push(id);
        }

        true
    }

    /// Removes `entity` from every index and resets its id to the sentinel.
    pub fn unregister(&mut self, entity: &mut Entity) -> bool {
        let Some(record) = self.by_id.remove(&entity.id) else {
            log::debug!("Unregister ignored: entity {} is not registered", entity.id);
            return false;
        };

        let id = entity.id;
        self.remove_from_bucket(record.entity_type, id);
        if record.entity_type.is_scene_node() && record.entity_type != EntityType::SceneNode {
            self.remove_from_bucket(EntityType::SceneNode, id);
        }

        entity.id = EntityId::UNASSIGNED;
        true
    }

    fn remove_from_bucket(&mut self, entity_type: EntityType, id: EntityId) {
        if let Some(bucket) = self.by_type.get_mut(&entity_type)
            && let Some(pos) = bucket.iter().position(|&x| x == id)
        {
            bucket.remove(pos);
        }
    }

    /// Resolves an id that must exist.
    ///
    /// # Panics
    /// Dereferencing an unknown id is a caller bug.
    #[must_use]
    pub fn get_by_id(&self, id: EntityId) -> EntityHandle {
        match self.by_id.get(&id) {
            Some(record) => record.handle,
            None => panic!("Entity {id} does not exist in the registry"),
        }
    }

    /// Non-fatal variant of [`get_by_id`](Self::get_by_id).
    #[must_use]
    pub fn try_get(&self, id: EntityId) -> Option<EntityHandle> {
        self.by_id.get(&id).map(|r| r.handle)
    }

    /// All ids registered under `entity_type`, in registration order.
    #[must_use]
    pub fn get_type_list(&self, entity_type: EntityType) -> &[EntityId] {
        self.by_type.get(&entity_type).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.by_id.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
