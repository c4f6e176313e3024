//! Module: repository::write
//! Responsibility: create, update, delete and restore, with relation
//! extraction, lifecycle events and cache invalidation.
//! Does not own: persistence itself; the entity saves through its own
//! backend handle.

use super::Repository;
use crate::{
    error::{EntityNotFound, Error},
    events::EntityEvent,
    traits::{Entity, QueryExecutor},
    types::{AttributeMap, Value, WriteAction},
};

///
/// Target
///
/// What a write operation addresses: an id still to be resolved, or
/// an entity the caller already holds.
///

pub enum Target<E> {
    Id(Value),
    Entity(E),
}

impl<E> Target<E> {
    pub fn id(id: impl Into<Value>) -> Self {
        Self::Id(id.into())
    }
}

impl<E> From<Value> for Target<E> {
    fn from(id: Value) -> Self {
        Self::Id(id)
    }
}

impl<X: QueryExecutor> Repository<X> {
    // ------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------

    /// Create a new entity. With `sync_relations` set, relation
    /// values are split out of the attribute map and synced after the
    /// save; otherwise they ride through the fill, where the entity's
    /// fillable filter decides. The created event and cache
    /// invalidation fire only when the backend confirms the save.
    pub fn create(
        &mut self,
        attributes: AttributeMap,
        sync_relations: bool,
    ) -> Result<X::Entity, Error> {
        let mut entity = self.executor().new_entity()?;
        self.dispatch(EntityEvent::Creating, Some(&entity));

        let (attributes, relations) = if sync_relations {
            extract_relations(&entity, attributes)
        } else {
            (attributes, Vec::new())
        };
        entity.fill(&attributes);
        let created = entity.save()?;
        sync_relation_values(&mut entity, relations)?;

        if created {
            self.dispatch(EntityEvent::Created, Some(&entity));
            self.invalidate_after(WriteAction::Create);
        }

        Ok(entity)
    }

    /// Update an existing entity. The updated event fires only when
    /// the save succeeds and actually changed something; filling an
    /// entity with the values it already holds is a quiet no-op.
    pub fn update(
        &mut self,
        target: impl Into<Target<X::Entity>>,
        attributes: AttributeMap,
        sync_relations: bool,
    ) -> Result<X::Entity, Error> {
        let mut entity = self.resolve(target.into())?;
        self.dispatch(EntityEvent::Updating, Some(&entity));

        let (attributes, relations) = if sync_relations {
            extract_relations(&entity, attributes)
        } else {
            (attributes, Vec::new())
        };
        entity.fill(&attributes);
        let dirty = entity.dirty();
        let updated = entity.save()?;
        sync_relation_values(&mut entity, relations)?;

        if updated && !dirty.is_empty() {
            self.dispatch(EntityEvent::Updated, Some(&entity));
            self.invalidate_after(WriteAction::Update);
        }

        Ok(entity)
    }

    /// Create when no id is given, update otherwise.
    pub fn store(
        &mut self,
        id: Option<Value>,
        attributes: AttributeMap,
        sync_relations: bool,
    ) -> Result<X::Entity, Error> {
        match id {
            None => self.create(attributes, sync_relations),
            Some(id) => self.update(Target::Id(id), attributes, sync_relations),
        }
    }

    pub fn delete(&mut self, target: impl Into<Target<X::Entity>>) -> Result<X::Entity, Error> {
        let mut entity = self.resolve(target.into())?;
        self.dispatch(EntityEvent::Deleting, Some(&entity));

        if entity.delete()? {
            self.dispatch(EntityEvent::Deleted, Some(&entity));
            self.invalidate_after(WriteAction::Delete);
        }

        Ok(entity)
    }

    /// Undo a soft delete. Restoring never invalidates the cache; the
    /// configured clear actions cover writes only.
    pub fn restore(&mut self, target: impl Into<Target<X::Entity>>) -> Result<X::Entity, Error> {
        let mut entity = self.resolve(target.into())?;
        self.dispatch(EntityEvent::Restoring, Some(&entity));

        if entity.restore()? {
            self.dispatch(EntityEvent::Restored, Some(&entity));
        }

        Ok(entity)
    }

    // ------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------

    /// Writes always work on a live entity, so id resolution queries
    /// the backend directly instead of going through the cache.
    fn resolve(&mut self, target: Target<X::Entity>) -> Result<X::Entity, Error> {
        match target {
            Target::Entity(entity) => Ok(entity),
            Target::Id(id) => {
                let found = self
                    .prepared_query()
                    .and_then(|query| self.executor().find(query, &id, &[]));
                self.reset_scope();

                found?.ok_or_else(|| {
                    EntityNotFound::new(self.model(), super::display_id(&id)).into()
                })
            }
        }
    }

    fn invalidate_after(&self, action: WriteAction) {
        if self.cache.clears_on(action) {
            self.forget_cache();
        }
    }
}

/// Split relation values out of an attribute map.
fn extract_relations<E: Entity>(
    entity: &E,
    attributes: AttributeMap,
) -> (AttributeMap, Vec<(String, Value)>) {
    let mut plain = AttributeMap::new();
    let mut relations = Vec::new();

    for (name, value) in attributes {
        if entity.is_relation(&name) {
            relations.push((name, value));
        } else {
            plain.insert(name, value);
        }
    }

    (plain, relations)
}

fn sync_relation_values<E: Entity>(
    entity: &mut E,
    relations: Vec<(String, Value)>,
) -> Result<(), Error> {
    for (name, values) in relations {
        entity.sync_relation(&name, &values, true)?;
    }

    Ok(())
}
