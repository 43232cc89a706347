//! One rapier world per realm, and the object→body table that feeds it.
//!
//! [`RealmContext`] translates scene-object operations into rapier body
//! operations: lazy per-type initialization, trimesh collider
//! construction, body removal, and the synchronized step.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use indexmap::IndexMap;
use rapier3d::prelude::{
    CCDSolver, ColliderBuilder, ColliderSet, DefaultBroadPhase, ImpulseJointSet,
    IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline, Point,
    QueryPipeline, Real, RigidBodyBuilder, RigidBodySet, Vector,
};
use tracing::{debug, error, warn};

use tether_core::{
    ObjectId, RealmId, RebuildCallback, SceneObject, SceneType, ShapeError, StepError, TypeKey,
};

use crate::config::BridgeConfig;
use crate::sync::{to_isometry, BodySynchronizer};

/// Outcome of [`RealmContext::add_objects`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddReport {
    /// Objects newly registered, in input order. Already-registered
    /// objects are skipped and do not appear here.
    pub registered: Vec<ObjectId>,
    /// How many of them got a body.
    pub bodies: usize,
    /// How many have no type or no shape data.
    pub inert: usize,
    /// How many were left inert because their shape data was rejected.
    pub malformed: usize,
}

/// Cumulative per-context counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextCounters {
    /// Completed steps.
    pub steps: u64,
    /// Bodies refused because of malformed shape data.
    pub malformed_shapes: u64,
    /// Type initialization hooks invoked.
    pub type_inits: u64,
    /// Objects rebuilt through a type's rebuild callback.
    pub rebuilds: u64,
}

type RebuildRequest = Vec<Arc<dyn SceneObject>>;

/// The physics world for one realm.
///
/// Owned by the loop thread. The only state reachable from other
/// threads is the rebuild channel handed to each type at initialization.
pub struct RealmContext {
    realm: RealmId,
    gravity: Vector<Real>,
    check_finite: bool,

    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    registered: IndexMap<ObjectId, Arc<dyn SceneObject>>,
    synchronizers: IndexMap<ObjectId, BodySynchronizer>,
    initialized_types: HashSet<TypeKey>,
    rebuild_tx: Sender<RebuildRequest>,
    rebuild_rx: Receiver<RebuildRequest>,

    fault: Option<StepError>,
    counters: ContextCounters,
}

impl RealmContext {
    /// Fresh world with an empty broad phase and no bodies.
    pub fn new(realm: RealmId, config: &BridgeConfig) -> Self {
        let [gx, gy, gz] = config.gravity;
        let (rebuild_tx, rebuild_rx) = crossbeam_channel::unbounded();
        Self {
            realm,
            gravity: Vector::new(gx, gy, gz),
            check_finite: config.check_finite,
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            registered: IndexMap::new(),
            synchronizers: IndexMap::new(),
            initialized_types: HashSet::new(),
            rebuild_tx,
            rebuild_rx,
            fault: None,
            counters: ContextCounters::default(),
        }
    }

    /// The realm this context simulates.
    pub fn realm(&self) -> RealmId {
        self.realm
    }

    /// Register objects and build bodies for those with shape data.
    ///
    /// Per-object faults are isolated: a malformed mesh leaves that one
    /// object registered but inert, and the rest of the batch proceeds.
    pub fn add_objects(&mut self, objects: &[Arc<dyn SceneObject>]) -> AddReport {
        let mut report = AddReport::default();
        for obj in objects {
            let id = obj.id();
            if self.registered.contains_key(&id) {
                continue;
            }
            self.registered.insert(id, Arc::clone(obj));
            report.registered.push(id);

            let Some(ty) = obj.scene_type() else {
                report.inert += 1;
                continue;
            };
            self.ensure_initialized(ty.as_ref());
            match self.build_body(obj, ty.as_ref()) {
                Ok(true) => report.bodies += 1,
                Ok(false) => report.inert += 1,
                Err(e) => {
                    warn!(realm = %self.realm, object = %id, error = %e, "malformed shape, object left inert");
                    self.counters.malformed_shapes += 1;
                    report.malformed += 1;
                }
            }
        }
        report
    }

    /// Unregister objects and remove their bodies.
    ///
    /// Objects that are not registered are ignored. Returns the ids that
    /// were actually removed.
    pub fn remove_objects(&mut self, objects: &[Arc<dyn SceneObject>]) -> Vec<ObjectId> {
        let mut removed = Vec::new();
        for obj in objects {
            let id = obj.id();
            if self.registered.shift_remove(&id).is_none() {
                continue;
            }
            if let Some(sync) = self.synchronizers.shift_remove(&id) {
                self.bodies.remove(
                    sync.body(),
                    &mut self.island_manager,
                    &mut self.colliders,
                    &mut self.impulse_joints,
                    &mut self.multibody_joints,
                    true,
                );
            }
            removed.push(id);
        }
        removed
    }

    /// Apply rebuild requests queued by type callbacks since the last call.
    ///
    /// Each requested object that is still registered is removed and
    /// re-added, picking up whatever shape data its type now reports.
    /// Returns the number of objects rebuilt.
    pub fn apply_rebuilds(&mut self) -> usize {
        let mut seen = HashSet::new();
        let targets: Vec<Arc<dyn SceneObject>> = self
            .rebuild_rx
            .try_iter()
            .flatten()
            .filter(|o| self.registered.contains_key(&o.id()) && seen.insert(o.id()))
            .collect();
        if targets.is_empty() {
            return 0;
        }
        self.remove_objects(&targets);
        self.add_objects(&targets);
        self.counters.rebuilds += targets.len() as u64;
        debug!(realm = %self.realm, count = targets.len(), "rebuilt objects");
        targets.len()
    }

    /// Advance the world by `elapsed` seconds.
    ///
    /// Order: pending rebuilds, pre-step sync, integration, post-step
    /// sync. A non-positive `elapsed` skips integration but still runs
    /// both sync passes. An engine panic or non-finite body state faults
    /// the context; every later call returns [`StepError::RealmFaulted`].
    pub fn step(&mut self, elapsed: f32) -> Result<(), StepError> {
        if self.fault.is_some() {
            return Err(StepError::RealmFaulted);
        }
        self.apply_rebuilds();

        for sync in self.synchronizers.values() {
            sync.pre_step(&mut self.bodies);
        }

        if elapsed > 0.0 {
            self.integration_parameters.dt = elapsed;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                self.physics_pipeline.step(
                    &self.gravity,
                    &self.integration_parameters,
                    &mut self.island_manager,
                    &mut self.broad_phase,
                    &mut self.narrow_phase,
                    &mut self.bodies,
                    &mut self.colliders,
                    &mut self.impulse_joints,
                    &mut self.multibody_joints,
                    &mut self.ccd_solver,
                    Some(&mut self.query_pipeline),
                    &(),
                    &(),
                );
            }));
            if let Err(payload) = result {
                return Err(self.set_fault(StepError::EngineFault {
                    reason: panic_reason(payload.as_ref()),
                }));
            }
        }

        let written = self
            .synchronizers
            .values()
            .try_for_each(|sync| sync.post_step(&self.bodies, self.check_finite));
        if let Err(e) = written {
            return Err(self.set_fault(e));
        }
        self.counters.steps += 1;
        Ok(())
    }

    /// The fault that stopped this context, if any.
    pub fn fault(&self) -> Option<&StepError> {
        self.fault.as_ref()
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.synchronizers.len()
    }

    /// Number of registered objects (with or without a body).
    pub fn object_count(&self) -> usize {
        self.registered.len()
    }

    /// Whether the object is registered in this context.
    pub fn is_registered(&self, id: ObjectId) -> bool {
        self.registered.contains_key(&id)
    }

    /// Whether the object has a body in this context.
    pub fn has_body(&self, id: ObjectId) -> bool {
        self.synchronizers.contains_key(&id)
    }

    /// Registered object ids, in registration order.
    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.registered.keys().copied()
    }

    /// Whether a type has been initialized in this context.
    pub fn is_type_initialized(&self, key: TypeKey) -> bool {
        self.initialized_types.contains(&key)
    }

    /// The body's current translation.
    pub fn body_translation(&self, id: ObjectId) -> Option<[f32; 3]> {
        let sync = self.synchronizers.get(&id)?;
        let t = self.bodies.get(sync.body())?.translation();
        Some([t.x, t.y, t.z])
    }

    /// Cumulative counters.
    pub fn counters(&self) -> &ContextCounters {
        &self.counters
    }

    fn ensure_initialized(&mut self, ty: &dyn SceneType) {
        if !self.initialized_types.insert(ty.key()) {
            return;
        }
        let tx = self.rebuild_tx.clone();
        let rebuild: RebuildCallback = Arc::new(move |objects| {
            // A send error means the context is gone; nothing to rebuild.
            let _ = tx.send(objects);
        });
        ty.initialize(rebuild);
        self.counters.type_inits += 1;
        debug!(realm = %self.realm, ty = %ty.key(), "initialized type");
    }

    /// Build and insert a body. `Ok(false)` means the type has no mesh.
    fn build_body(
        &mut self,
        obj: &Arc<dyn SceneObject>,
        ty: &dyn SceneType,
    ) -> Result<bool, ShapeError> {
        let Some(shape) = ty.shape().filter(|s| !s.is_empty()) else {
            return Ok(false);
        };
        shape.validate()?;

        let vertices: Vec<Point<Real>> = shape
            .vertices()
            .map(|[x, y, z]| Point::new(x, y, z))
            .collect();
        let indices: Vec<[u32; 3]> = shape.triangles().collect();
        let collider = guard_engine(|| ColliderBuilder::trimesh(vertices, indices).build())?;

        let gravity_scale = if ty.uses_gravity().unwrap_or(true) {
            1.0
        } else {
            0.0
        };
        let body = RigidBodyBuilder::dynamic()
            .position(to_isometry(&obj.transform()))
            .gravity_scale(gravity_scale)
            .build();

        let body = self.bodies.insert(body);
        let collider = self
            .colliders
            .insert_with_parent(collider, body, &mut self.bodies);
        self.synchronizers
            .insert(obj.id(), BodySynchronizer::new(Arc::clone(obj), body, collider));
        Ok(true)
    }

    fn set_fault(&mut self, fault: StepError) -> StepError {
        error!(realm = %self.realm, error = %fault, "realm faulted");
        self.fault = Some(fault.clone());
        fault
    }
}

/// Run an engine construction call, turning a panic into a per-object
/// [`ShapeError::Engine`].
fn guard_engine<T>(build: impl FnOnce() -> T) -> Result<T, ShapeError> {
    panic::catch_unwind(AssertUnwindSafe(build)).map_err(|payload| ShapeError::Engine {
        reason: panic_reason(payload.as_ref()),
    })
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "engine panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{ShapeData, Transform, TransformProvider};
    use tether_test_utils::fixtures::unit_box;
    use tether_test_utils::{MockObject, MockType};

    fn ctx() -> RealmContext {
        RealmContext::new(RealmId(1), &BridgeConfig::default())
    }

    fn instance(ty: &Arc<MockType>) -> Arc<dyn SceneObject> {
        MockObject::new(Some(ty.clone() as Arc<dyn SceneType>))
    }

    #[test]
    fn physical_objects_get_bodies_and_others_stay_inert() {
        let a = MockType::physical(unit_box());
        let b = MockType::non_physical();
        let mut c = ctx();
        let objs = vec![instance(&a), instance(&a), instance(&b), MockObject::new(None)];
        let report = c.add_objects(&objs);
        assert_eq!(report.registered.len(), 4);
        assert_eq!(report.bodies, 2);
        assert_eq!(report.inert, 2);
        assert_eq!(c.body_count(), 2);
        assert_eq!(c.object_count(), 4);
        assert!(c.has_body(objs[0].id()));
        assert!(!c.has_body(objs[2].id()));
        assert!(c.is_registered(objs[2].id()));
    }

    #[test]
    fn type_initialized_once_per_context() {
        let a = MockType::physical(unit_box());
        let mut c = ctx();
        c.add_objects(&[instance(&a), instance(&a)]);
        c.add_objects(&[instance(&a)]);
        assert_eq!(a.init_count(), 1);
        assert!(c.is_type_initialized(a.key()));

        let mut other = ctx();
        other.add_objects(&[instance(&a)]);
        assert_eq!(a.init_count(), 2);
    }

    #[test]
    fn re_adding_is_a_no_op() {
        let a = MockType::physical(unit_box());
        let mut c = ctx();
        let o = instance(&a);
        c.add_objects(&[o.clone()]);
        let again = c.add_objects(&[o]);
        assert!(again.registered.is_empty());
        assert_eq!(c.body_count(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let a = MockType::physical(unit_box());
        let mut c = ctx();
        let o = instance(&a);
        c.add_objects(&[o.clone()]);
        assert_eq!(c.remove_objects(&[o.clone()]), vec![o.id()]);
        assert!(c.remove_objects(&[o.clone()]).is_empty());
        assert_eq!(c.body_count(), 0);
        assert_eq!(c.object_count(), 0);
    }

    #[test]
    fn malformed_shape_leaves_object_inert() {
        let bad = MockType::physical(ShapeData::new(vec![0.0; 9], vec![0, 1, 7]));
        let good = MockType::physical(unit_box());
        let mut c = ctx();
        let report = c.add_objects(&[instance(&bad), instance(&good)]);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.bodies, 1);
        assert_eq!(c.object_count(), 2);
        assert_eq!(c.counters().malformed_shapes, 1);
    }

    #[test]
    fn degenerate_meshes_still_get_bodies() {
        let point = MockType::physical(ShapeData::new(vec![0.0; 3], vec![0, 0, 0]));
        let flat = MockType::physical(ShapeData::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            vec![0, 1, 2],
        ));
        let mut c = ctx();
        let report = c.add_objects(&[instance(&point), instance(&flat)]);
        assert_eq!(report.bodies, 2);
        assert_eq!(report.malformed, 0);
        c.step(1.0 / 60.0).unwrap();
        c.step(1.0 / 60.0).unwrap();
    }

    #[test]
    fn engine_panic_during_construction_becomes_shape_error() {
        assert_eq!(guard_engine(|| 7), Ok(7));
        let err = guard_engine(|| -> u32 { panic!("degenerate trimesh") }).unwrap_err();
        assert_eq!(
            err,
            ShapeError::Engine {
                reason: "degenerate trimesh".to_string(),
            }
        );
    }

    #[test]
    fn zero_step_round_trips_transform() {
        let a = MockType::physical(unit_box());
        let t = Transform::from_position([1.0, 5.0, -2.0])
            .with_rotation([[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0]]);
        let obj = MockObject::with_transform(Some(a.clone() as Arc<dyn SceneType>), t);
        let mut c = ctx();
        c.add_objects(&[obj.clone() as Arc<dyn SceneObject>]);
        c.step(0.0).unwrap();

        let out = obj.transform();
        for i in 0..3 {
            assert!((out.position[i] - t.position[i]).abs() < 1e-4);
            for j in 0..3 {
                assert!((out.rotation()[i][j] - t.rotation()[i][j]).abs() < 1e-4);
            }
        }
        assert_eq!(c.counters().steps, 1);
    }

    #[test]
    fn positive_step_integrates() {
        let a = MockType::physical(unit_box());
        let mut c = ctx();
        let o = instance(&a);
        c.add_objects(&[o.clone()]);
        c.step(1.0 / 60.0).unwrap();
        let t = c.body_translation(o.id()).unwrap();
        assert!(t.iter().all(|v| v.is_finite()));
        assert_eq!(c.counters().steps, 1);
    }

    #[test]
    fn rebuild_callback_replaces_body() {
        let a = MockType::physical(unit_box());
        let mut c = ctx();
        let o = instance(&a);
        c.add_objects(&[o.clone()]);
        let before = c.synchronizers[&o.id()].body();

        assert!(a.trigger_rebuild(vec![o.clone(), o.clone()]));
        assert_eq!(c.apply_rebuilds(), 1);
        assert_ne!(c.synchronizers[&o.id()].body(), before);
        assert_eq!(c.body_count(), 1);
        assert_eq!(a.init_count(), 1);
        assert_eq!(c.counters().rebuilds, 1);
    }

    #[test]
    fn rebuild_of_unregistered_object_is_ignored() {
        let a = MockType::physical(unit_box());
        let mut c = ctx();
        c.add_objects(&[instance(&a)]);
        a.trigger_rebuild(vec![instance(&a)]);
        assert_eq!(c.apply_rebuilds(), 0);
        assert_eq!(c.body_count(), 1);
    }

    #[test]
    fn non_finite_state_faults_context() {
        let a = MockType::physical(unit_box());
        let obj = MockObject::new(Some(a.clone() as Arc<dyn SceneType>));
        let mut c = ctx();
        c.add_objects(&[obj.clone() as Arc<dyn SceneObject>]);
        obj.set_transform(Transform::from_position([f32::NAN, 0.0, 0.0]));

        let err = c.step(0.0).unwrap_err();
        assert_eq!(err, StepError::NonFiniteState { object: obj.id() });
        assert_eq!(c.fault(), Some(&err));
        assert_eq!(c.step(0.0), Err(StepError::RealmFaulted));
    }

    #[test]
    fn panic_reason_extracts_messages() {
        assert_eq!(panic_reason(&"boom"), "boom");
        assert_eq!(panic_reason(&String::from("bang")), "bang");
        assert_eq!(panic_reason(&3u8), "engine panicked");
    }
}
