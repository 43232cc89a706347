//! Tether: keeps rapier physics worlds synchronized with an
//! externally-owned scene graph.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Tether sub-crates. For most users, adding `tether` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use tether::prelude::*;
//!
//! // `world` implements `SceneGraph`; its realms and objects implement
//! // `SceneRealm` / `SceneObject`.
//! let mut bridge = PhysicsBridge::new(world, BridgeConfig::default())?;
//! bridge.load_world();
//!
//! let (_, events) = bridge.notifier().subscribe_channel();
//! let report = bridge.tick();
//! for (realm, fault) in &report.faults {
//!     eprintln!("realm {realm:?} faulted: {fault}");
//! }
//! for event in events.try_iter() {
//!     println!("{event:?}");
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tether-core` | IDs, transforms, shapes, events, scene traits |
//! | [`engine`] | `tether-engine` | Bridge controller, realm contexts, realtime loop |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`tether-core`).
///
/// Contains the scene capability traits ([`types::SceneGraph`],
/// [`types::SceneRealm`], [`types::SceneObject`], [`types::SceneType`]),
/// value types and error types.
pub use tether_core as types;

/// Bridge engine (`tether-engine`).
///
/// [`engine::PhysicsBridge`] for caller-driven ticking,
/// [`engine::RealtimeBridge`] for a background loop thread.
pub use tether_engine as engine;

/// Common imports for typical Tether usage.
///
/// ```rust
/// use tether::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use tether_core::{
        LifecycleEvent, ObjectId, RealmId, SceneGraph, SceneObject, SceneRealm, SceneType,
        ShapeData, StructuralChanges, TickId, Transform, TransformProvider, TypeKey,
    };

    // Errors
    pub use tether_core::{SceneError, ShapeError, StepError};

    // Engine
    pub use tether_engine::{
        BridgeConfig, BridgeError, BridgeHandle, CommitPolicy, LoopState, MutationKind,
        PhysicsBridge, RealtimeBridge, SubmitError, TickReport,
    };
}
