//! Capability traits implemented by the host scene graph.
//!
//! The bridge never looks anything up by name on an external object.
//! Each collaborator role is a trait resolved once, when the object is
//! handed to the bridge:
//!
//! - [`SceneGraph`] enumerates live realms.
//! - [`SceneRealm`] enumerates a realm's live objects and accepts
//!   committed additions/removals.
//! - [`SceneObject`] (a [`TransformProvider`]) exposes identity, type
//!   and transform.
//! - [`SceneType`] supplies lazy initialization, collision shape,
//!   gravity flag and the per-tick batch hook.
//!
//! All traits require `Send + Sync`: realms and objects are enumerated
//! on the simulation-loop thread while other threads keep references.

use std::fmt;
use std::sync::Arc;

use crate::error::SceneError;
use crate::id::{ObjectId, RealmId, TypeKey};
use crate::shape::ShapeData;
use crate::transform::Transform;

/// Callback handed to [`SceneType::initialize`].
///
/// The type invokes it (from any thread, at any time) with objects whose
/// physical representation must be rebuilt. The realm context that
/// initialized the type removes and re-adds exactly those objects at
/// the start of its next step.
pub type RebuildCallback = Arc<dyn Fn(Vec<Arc<dyn SceneObject>>) + Send + Sync>;

/// Enumerates the live realms of a world.
pub trait SceneGraph: Send + Sync {
    /// Current realm membership. Called once per tick.
    fn realms(&self) -> Vec<Arc<dyn SceneRealm>>;
}

/// An isolated simulation space owned by the scene graph.
pub trait SceneRealm: Send + Sync {
    /// Stable realm identity.
    fn id(&self) -> RealmId;

    /// The realm's live (committed) objects.
    ///
    /// # Errors
    ///
    /// [`SceneError::Unavailable`] when the list cannot be produced
    /// right now; the bridge retries on the next tick.
    fn objects(&self) -> Result<Vec<Arc<dyn SceneObject>>, SceneError>;

    /// Committed staged additions, forwarded after the bridge applied them.
    fn add_objects(&self, objects: &[Arc<dyn SceneObject>]);

    /// Committed staged removals, forwarded after the bridge applied them.
    fn remove_objects(&self, objects: &[Arc<dyn SceneObject>]);
}

/// Read/replace access to an object's transform.
///
/// Replacement is whole-value so the scene graph never observes a
/// half-written transform.
pub trait TransformProvider: Send + Sync {
    /// Current transform.
    fn transform(&self) -> Transform;

    /// Replace the transform.
    fn set_transform(&self, transform: Transform);
}

/// An entity with a physical representation.
pub trait SceneObject: TransformProvider {
    /// Stable object identity.
    fn id(&self) -> ObjectId;

    /// The object's type descriptor, if it has one.
    ///
    /// Objects without a type are tracked but never get a body and are
    /// not part of any batch update.
    fn scene_type(&self) -> Option<Arc<dyn SceneType>>;
}

/// Shared descriptor providing shape and simulation parameters for all
/// instances of one kind of object.
pub trait SceneType: Send + Sync {
    /// Stable grouping and idempotency key.
    fn key(&self) -> TypeKey;

    /// One-time initialization per realm context.
    ///
    /// Called at most once per (type, realm context) pair, before the
    /// first body of this type is built in that context.
    fn initialize(&self, rebuild: RebuildCallback) {
        let _ = rebuild;
    }

    /// Static collision mesh for instances of this type.
    ///
    /// `None` (or an empty mesh) marks a non-physical type.
    fn shape(&self) -> Option<ShapeData>;

    /// Whether instances are affected by gravity. `None` means yes.
    fn uses_gravity(&self) -> Option<bool> {
        None
    }

    /// Per-tick batch hook over every live instance of this type in a realm.
    ///
    /// Returned changes are staged for the next commit; they never
    /// affect the tick that produced them.
    fn batch_update(&self, instances: &[Arc<dyn SceneObject>]) -> Option<StructuralChanges> {
        let _ = instances;
        None
    }
}

/// Objects a batch hook wants added to or removed from its realm.
#[derive(Clone, Default)]
pub struct StructuralChanges {
    /// Objects to add on the next commit.
    pub additions: Vec<Arc<dyn SceneObject>>,
    /// Objects to remove on the next commit.
    pub removals: Vec<Arc<dyn SceneObject>>,
}

impl StructuralChanges {
    /// Only additions.
    pub fn add(objects: Vec<Arc<dyn SceneObject>>) -> Self {
        Self {
            additions: objects,
            removals: Vec::new(),
        }
    }

    /// Only removals.
    pub fn remove(objects: Vec<Arc<dyn SceneObject>>) -> Self {
        Self {
            additions: Vec::new(),
            removals: objects,
        }
    }

    /// Whether there is nothing to stage.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

impl fmt::Debug for StructuralChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = |objs: &[Arc<dyn SceneObject>]| objs.iter().map(|o| o.id()).collect::<Vec<_>>();
        f.debug_struct("StructuralChanges")
            .field("additions", &ids(&self.additions))
            .field("removals", &ids(&self.removals))
            .finish()
    }
}
