//! Background simulation loop and its run/stop state machine.
//!
//! [`RealtimeBridge`] moves a [`PhysicsBridge`] onto a dedicated loop
//! thread and hands out [`BridgeHandle`]s through which any thread can
//! request realm and object lifecycle changes.
//!
//! # Architecture
//!
//! ```text
//! Host thread(s)                          Loop thread
//!     |                                       |
//!     |--handle.add_realm()/objects_added()-->| control_rx.try_recv()
//!     |   [control_tx: bounded(capacity)]     | bridge.add_realm()/...
//!     |--handle.request_commit()------------->| bridge.commit()
//!     |                                       |
//!     |--handle.stage()----> StagingQueue <---| bridge.tick()
//!     |   (shared lock, no loop round-trip)   |   batch hooks stage
//!     |                                       |   realm steps
//!     |                                       |   commit (every_tick)
//!     |<--faults_rx---------------------------| fault_tx.send()
//!     |<--EventNotifier (sync, on loop)-------|
//!     |                                       | park_timeout(budget - elapsed)
//! ```
//!
//! # States
//!
//! `Idle → Running → Stopping → Stopped`. Requests sent while idle are
//! buffered and applied on the first tick. Once stopped, the bridge is
//! recovered from the loop thread and handles report
//! [`SubmitError::Shutdown`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;
use tracing::{error, info};

use tether_core::{RealmId, SceneObject, SceneRealm, StepError, StructuralChanges};

use crate::controller::PhysicsBridge;
use crate::loop_thread::{ControlMessage, LoopThreadState};
use crate::notifier::EventNotifier;
use crate::staging::{MutationKind, StagingQueue};

// ── Error types ──────────────────────────────────────────────────

/// Error submitting a request to the loop thread.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The loop thread has shut down.
    #[error("loop thread has shut down")]
    Shutdown,
    /// The control channel is full (back-pressure).
    #[error("control channel full")]
    ChannelFull,
}

/// Error driving the run/stop state machine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ControlError {
    /// The requested transition is not legal from the current state.
    #[error("cannot {action} while {from:?}")]
    InvalidTransition {
        /// State at the time of the request.
        from: LoopState,
        /// The attempted action.
        action: &'static str,
    },
    /// The loop thread could not be spawned.
    #[error("loop thread spawn failed: {reason}")]
    SpawnFailed {
        /// OS-provided description.
        reason: String,
    },
    /// The bridge could not be recovered (the loop thread panicked).
    #[error("bridge could not be recovered from the loop thread")]
    BridgeLost,
}

// ── LoopState ────────────────────────────────────────────────────

/// Run state of a [`RealtimeBridge`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, loop thread not yet started.
    Idle,
    /// Loop thread ticking.
    Running,
    /// Shutdown requested, waiting for the loop thread to exit.
    Stopping,
    /// Loop thread joined. Terminal.
    Stopped,
}

// ── StopReport ───────────────────────────────────────────────────

/// Report from [`RealtimeBridge::stop()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopReport {
    /// Time from the stop request to the join, in milliseconds.
    pub total_ms: u64,
    /// Ticks completed by the loop thread.
    pub ticks: u64,
    /// Whether the loop thread exited cleanly and the bridge was recovered.
    pub joined: bool,
}

// ── BridgeHandle ─────────────────────────────────────────────────

/// Cloneable, thread-safe request handle.
///
/// Lifecycle requests go through the bounded control channel and are
/// applied on the loop thread between ticks. Staging goes straight to
/// the shared [`StagingQueue`].
#[derive(Clone)]
pub struct BridgeHandle {
    control_tx: Sender<ControlMessage>,
    staging: StagingQueue,
}

impl BridgeHandle {
    /// Register (or recreate) a realm.
    pub fn add_realm(&self, realm: Arc<dyn SceneRealm>) -> Result<(), SubmitError> {
        self.send(ControlMessage::AddRealm(realm))
    }

    /// Unregister a realm.
    pub fn remove_realm(&self, realm: RealmId) -> Result<(), SubmitError> {
        self.send(ControlMessage::RemoveRealm(realm))
    }

    /// Report objects the host already inserted into a realm.
    pub fn objects_added(
        &self,
        realm: RealmId,
        objects: Vec<Arc<dyn SceneObject>>,
    ) -> Result<(), SubmitError> {
        self.send(ControlMessage::ObjectsAdded { realm, objects })
    }

    /// Report objects the host already removed from a realm.
    pub fn objects_removed(
        &self,
        realm: RealmId,
        objects: Vec<Arc<dyn SceneObject>>,
    ) -> Result<(), SubmitError> {
        self.send(ControlMessage::ObjectsRemoved { realm, objects })
    }

    /// Ask the loop thread to commit before its next tick.
    pub fn request_commit(&self) -> Result<(), SubmitError> {
        self.send(ControlMessage::Commit)
    }

    /// Stage objects for the next commit.
    pub fn stage(
        &self,
        realm: RealmId,
        kind: MutationKind,
        objects: impl IntoIterator<Item = Arc<dyn SceneObject>>,
    ) -> usize {
        self.staging.stage(realm, kind, objects)
    }

    /// Stage a batch of structural changes for the next commit.
    pub fn stage_changes(&self, realm: RealmId, changes: StructuralChanges) -> (usize, usize) {
        self.staging.stage_changes(realm, changes)
    }

    fn send(&self, msg: ControlMessage) -> Result<(), SubmitError> {
        self.control_tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SubmitError::ChannelFull,
            TrySendError::Disconnected(_) => SubmitError::Shutdown,
        })
    }
}

// ── RealtimeBridge ───────────────────────────────────────────────

/// A [`PhysicsBridge`] driven by a background loop thread.
pub struct RealtimeBridge {
    state: LoopState,
    bridge: Option<PhysicsBridge>,
    staging: StagingQueue,
    notifier: Arc<EventNotifier>,
    control_tx: Sender<ControlMessage>,
    control_rx: Option<Receiver<ControlMessage>>,
    fault_tx: Option<Sender<(RealmId, StepError)>>,
    fault_rx: Receiver<(RealmId, StepError)>,
    shutdown_flag: Arc<AtomicBool>,
    loop_stopped: Arc<AtomicBool>,
    tick_count: Arc<AtomicU64>,
    loop_thread: Option<JoinHandle<PhysicsBridge>>,
}

impl RealtimeBridge {
    /// Wrap a bridge. The loop does not run until [`start()`](Self::start).
    pub fn new(bridge: PhysicsBridge) -> Self {
        let (control_tx, control_rx) =
            crossbeam_channel::bounded(bridge.config().control_queue_capacity);
        let (fault_tx, fault_rx) = crossbeam_channel::unbounded();
        Self {
            state: LoopState::Idle,
            staging: bridge.staging().clone(),
            notifier: Arc::clone(bridge.notifier()),
            bridge: Some(bridge),
            control_tx,
            control_rx: Some(control_rx),
            fault_tx: Some(fault_tx),
            fault_rx,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            loop_stopped: Arc::new(AtomicBool::new(false)),
            tick_count: Arc::new(AtomicU64::new(0)),
            loop_thread: None,
        }
    }

    /// `Idle → Running`: spawn the loop thread.
    pub fn start(&mut self) -> Result<(), ControlError> {
        if self.state != LoopState::Idle {
            return Err(ControlError::InvalidTransition {
                from: self.state,
                action: "start",
            });
        }
        let (Some(bridge), Some(control_rx), Some(fault_tx)) = (
            self.bridge.take(),
            self.control_rx.take(),
            self.fault_tx.take(),
        ) else {
            return Err(ControlError::BridgeLost);
        };

        let state = LoopThreadState::new(
            bridge,
            control_rx,
            fault_tx,
            Arc::clone(&self.shutdown_flag),
            Arc::clone(&self.loop_stopped),
            Arc::clone(&self.tick_count),
        );
        let spawned = thread::Builder::new()
            .name("tether-loop".into())
            .spawn(move || state.run());
        match spawned {
            Ok(handle) => {
                self.loop_thread = Some(handle);
                self.state = LoopState::Running;
                info!("realtime bridge started");
                Ok(())
            }
            Err(e) => {
                self.state = LoopState::Stopped;
                Err(ControlError::SpawnFailed {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// `Running → Stopping → Stopped`: signal the loop thread, wake it,
    /// join it, and recover the bridge.
    ///
    /// Stopping an idle bridge goes straight to `Stopped`.
    pub fn stop(&mut self) -> Result<StopReport, ControlError> {
        match self.state {
            LoopState::Running => {}
            LoopState::Idle => {
                self.control_rx = None;
                self.state = LoopState::Stopped;
                return Ok(StopReport {
                    total_ms: 0,
                    ticks: 0,
                    joined: true,
                });
            }
            from @ (LoopState::Stopping | LoopState::Stopped) => {
                return Err(ControlError::InvalidTransition {
                    from,
                    action: "stop",
                });
            }
        }

        let start = Instant::now();
        self.state = LoopState::Stopping;
        self.shutdown_flag.store(true, Ordering::Release);

        let joined = match self.loop_thread.take() {
            Some(handle) => {
                handle.thread().unpark();
                match handle.join() {
                    Ok(bridge) => {
                        self.bridge = Some(bridge);
                        true
                    }
                    Err(_) => {
                        error!("loop thread panicked; bridge lost");
                        false
                    }
                }
            }
            None => false,
        };

        self.state = LoopState::Stopped;
        let report = StopReport {
            total_ms: start.elapsed().as_millis() as u64,
            ticks: self.tick_count(),
            joined,
        };
        info!(ticks = report.ticks, total_ms = report.total_ms, "realtime bridge stopped");
        Ok(report)
    }

    /// Current run state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Whether the loop thread has observed the stop request and exited.
    pub fn loop_stopped(&self) -> bool {
        self.loop_stopped.load(Ordering::Acquire)
    }

    /// A new request handle.
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            control_tx: self.control_tx.clone(),
            staging: self.staging.clone(),
        }
    }

    /// Lifecycle event notifier. Events are delivered on the loop thread.
    pub fn notifier(&self) -> &Arc<EventNotifier> {
        &self.notifier
    }

    /// Realm faults, in the order they happened.
    pub fn faults(&self) -> &Receiver<(RealmId, StepError)> {
        &self.fault_rx
    }

    /// Ticks completed by the loop thread so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Acquire)
    }

    /// The bridge, while it is not on the loop thread.
    pub fn bridge(&self) -> Option<&PhysicsBridge> {
        self.bridge.as_ref()
    }

    /// Mutable access to the bridge, while it is not on the loop thread.
    pub fn bridge_mut(&mut self) -> Option<&mut PhysicsBridge> {
        self.bridge.as_mut()
    }

    /// Stop if running and take the bridge back.
    pub fn into_bridge(mut self) -> Result<PhysicsBridge, ControlError> {
        if self.state == LoopState::Running {
            self.stop()?;
        }
        self.bridge.take().ok_or(ControlError::BridgeLost)
    }
}

impl Drop for RealtimeBridge {
    fn drop(&mut self) {
        if self.state == LoopState::Running {
            let _ = self.stop();
        }
    }
}
