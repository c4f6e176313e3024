use crate::traits::EventSink;
use derive_more::Display;
use serde_json::Value;

///
/// EntityEvent
///
/// Lifecycle verbs fired around repository operations. The qualified
/// event name is `"<repository_id>.entity.<verb>"`.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum EntityEvent {
    #[display("creating")]
    Creating,
    #[display("created")]
    Created,
    #[display("updating")]
    Updating,
    #[display("updated")]
    Updated,
    #[display("deleting")]
    Deleting,
    #[display("deleted")]
    Deleted,
    #[display("restoring")]
    Restoring,
    #[display("restored")]
    Restored,
    #[display("cache.flushed")]
    CacheFlushed,
}

impl EntityEvent {
    #[must_use]
    pub fn qualified(self, repository_id: &str) -> String {
        format!("{repository_id}.entity.{self}")
    }
}

///
/// RepositoryEvent
///
/// Fire-and-forget notification payload: the qualified name, the
/// repository identity, and the serialized entity when one is in play.
///

#[derive(Clone, Debug)]
pub struct RepositoryEvent {
    pub name: String,
    pub repository_id: String,
    pub entity: Option<Value>,
}

impl RepositoryEvent {
    #[must_use]
    pub fn new(repository_id: &str, event: EntityEvent, entity: Option<Value>) -> Self {
        Self {
            name: event.qualified(repository_id),
            repository_id: repository_id.to_string(),
            entity,
        }
    }
}

///
/// NullEventSink
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn dispatch(&self, _event: &RepositoryEvent) {}
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_follow_the_entity_convention() {
        assert_eq!(
            EntityEvent::Created.qualified("UserRepository"),
            "UserRepository.entity.created"
        );
        assert_eq!(
            EntityEvent::CacheFlushed.qualified("UserRepository"),
            "UserRepository.entity.cache.flushed"
        );
    }
}
