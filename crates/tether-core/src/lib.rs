//! Core types and traits for the Tether physics bridge.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the engine and by scene-graph integrations:
//! realm/object/type identifiers, the transform and shape value types,
//! lifecycle events, error types, and the statically-typed capability
//! traits a host scene graph implements.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod id;
pub mod scene;
pub mod shape;
pub mod transform;

pub use error::{SceneError, ShapeError, StepError};
pub use event::LifecycleEvent;
pub use id::{ObjectId, RealmId, TickId, TypeKey};
pub use scene::{
    RebuildCallback, SceneGraph, SceneObject, SceneRealm, SceneType, StructuralChanges,
    TransformProvider,
};
pub use shape::ShapeData;
pub use transform::Transform;
