//! Lifecycle events published to external subscribers.

use crate::id::{ObjectId, RealmId};

/// A committed structural change.
///
/// Fired synchronously after the bridge's internal state is already
/// consistent with the change: the body table has been updated (and,
/// for staged mutations, the scene graph has been told).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// An object joined a realm.
    ObjectAdded {
        /// The object.
        object: ObjectId,
        /// The realm it joined.
        realm: RealmId,
    },
    /// An object left a realm.
    ObjectRemoved {
        /// The object.
        object: ObjectId,
        /// The realm it left.
        realm: RealmId,
    },
    /// A realm was registered with the bridge.
    RealmAdded(RealmId),
    /// A realm and its physics context were discarded.
    RealmRemoved(RealmId),
}

impl LifecycleEvent {
    /// The realm this event concerns.
    pub fn realm(&self) -> RealmId {
        match *self {
            Self::ObjectAdded { realm, .. }
            | Self::ObjectRemoved { realm, .. }
            | Self::RealmAdded(realm)
            | Self::RealmRemoved(realm) => realm,
        }
    }

    /// The object this event concerns, if it is an object event.
    pub fn object(&self) -> Option<ObjectId> {
        match *self {
            Self::ObjectAdded { object, .. } | Self::ObjectRemoved { object, .. } => Some(object),
            Self::RealmAdded(_) | Self::RealmRemoved(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let e = LifecycleEvent::ObjectRemoved {
            object: ObjectId(4),
            realm: RealmId(2),
        };
        assert_eq!(e.realm(), RealmId(2));
        assert_eq!(e.object(), Some(ObjectId(4)));
        assert_eq!(LifecycleEvent::RealmAdded(RealmId(8)).object(), None);
    }
}
