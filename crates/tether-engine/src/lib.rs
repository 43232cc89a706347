//! Simulation engine for the Tether physics bridge.
//!
//! Provides [`PhysicsBridge`], which keeps one rapier world per scene
//! realm synchronized with the host scene graph, and [`RealtimeBridge`],
//! which drives a bridge from a background loop thread. Structural
//! changes requested during a tick are staged in a [`StagingQueue`] and
//! applied at the commit point.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod controller;
mod loop_thread;
pub mod metrics;
pub mod notifier;
pub mod realtime;
pub mod staging;
pub mod sync;

pub use config::{BridgeConfig, CommitPolicy, ConfigError};
pub use context::{AddReport, ContextCounters, RealmContext};
pub use controller::{BridgeError, CommitReport, PhysicsBridge, TickReport};
pub use metrics::{BridgeCounters, TickMetrics};
pub use notifier::{EventNotifier, SubscriptionId};
pub use realtime::{BridgeHandle, ControlError, LoopState, RealtimeBridge, StopReport, SubmitError};
pub use staging::{MutationKind, StagingQueue};
pub use sync::BodySynchronizer;
