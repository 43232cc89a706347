//! Test utilities and mock scene graphs for Tether development.
//!
//! Provides mock implementations of the scene-graph capability traits
//! ([`SceneGraph`], [`SceneRealm`], [`SceneObject`], [`SceneType`])
//! with counters and scripting hooks for driving the engine in tests.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use tether_core::{
    ObjectId, RealmId, RebuildCallback, SceneError, SceneGraph, SceneObject, SceneRealm,
    SceneType, ShapeData, StructuralChanges, Transform, TransformProvider, TypeKey,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique raw id for mock objects, realms and types.
pub fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

// ── MockObject ───────────────────────────────────────────────────

/// A scene object with an interior-mutable transform.
pub struct MockObject {
    id: ObjectId,
    scene_type: Option<Arc<dyn SceneType>>,
    transform: Mutex<Transform>,
    transform_writes: AtomicUsize,
}

impl MockObject {
    pub fn new(scene_type: Option<Arc<dyn SceneType>>) -> Arc<Self> {
        Self::with_transform(scene_type, Transform::IDENTITY)
    }

    pub fn with_transform(
        scene_type: Option<Arc<dyn SceneType>>,
        transform: Transform,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId(next_id()),
            scene_type,
            transform: Mutex::new(transform),
            transform_writes: AtomicUsize::new(0),
        })
    }

    /// Number of `set_transform` calls received.
    pub fn transform_writes(&self) -> usize {
        self.transform_writes.load(Ordering::Relaxed)
    }
}

impl TransformProvider for MockObject {
    fn transform(&self) -> Transform {
        *self.transform.lock()
    }

    fn set_transform(&self, transform: Transform) {
        *self.transform.lock() = transform;
        self.transform_writes.fetch_add(1, Ordering::Relaxed);
    }
}

impl SceneObject for MockObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn scene_type(&self) -> Option<Arc<dyn SceneType>> {
        self.scene_type.clone()
    }
}

// ── MockType ─────────────────────────────────────────────────────

/// A scene type with call counters and scripted batch results.
pub struct MockType {
    key: TypeKey,
    shape: Option<ShapeData>,
    gravity: Option<bool>,
    init_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    scripted: Mutex<VecDeque<StructuralChanges>>,
    rebuild: Mutex<Option<RebuildCallback>>,
}

impl MockType {
    fn build(shape: Option<ShapeData>) -> Self {
        Self {
            key: TypeKey(next_id()),
            shape,
            gravity: None,
            init_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
            rebuild: Mutex::new(None),
        }
    }

    /// A type whose instances get a body with the given mesh.
    pub fn physical(shape: ShapeData) -> Arc<Self> {
        Arc::new(Self::build(Some(shape)))
    }

    /// A type with no shape data.
    pub fn non_physical() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    /// A physical type with an explicit gravity flag.
    pub fn physical_with_gravity(shape: ShapeData, gravity: bool) -> Arc<Self> {
        let mut t = Self::build(Some(shape));
        t.gravity = Some(gravity);
        Arc::new(t)
    }

    /// Queue a result for a future `batch_update` call (FIFO).
    pub fn push_changes(&self, changes: StructuralChanges) {
        self.scripted.lock().push_back(changes);
    }

    pub fn init_count(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn batch_count(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Instance counts seen by each `batch_update` call, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }

    /// Invoke the rebuild callback received at initialization.
    ///
    /// Returns `false` if the type was never initialized.
    pub fn trigger_rebuild(&self, objects: Vec<Arc<dyn SceneObject>>) -> bool {
        let callback = self.rebuild.lock().clone();
        match callback {
            Some(cb) => {
                cb(objects);
                true
            }
            None => false,
        }
    }
}

impl SceneType for MockType {
    fn key(&self) -> TypeKey {
        self.key
    }

    fn initialize(&self, rebuild: RebuildCallback) {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        *self.rebuild.lock() = Some(rebuild);
    }

    fn shape(&self) -> Option<ShapeData> {
        self.shape.clone()
    }

    fn uses_gravity(&self) -> Option<bool> {
        self.gravity
    }

    fn batch_update(&self, instances: &[Arc<dyn SceneObject>]) -> Option<StructuralChanges> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().push(instances.len());
        self.scripted.lock().pop_front()
    }
}

// ── MockRealm ────────────────────────────────────────────────────

/// A realm backed by an ordered object map.
pub struct MockRealm {
    id: RealmId,
    objects: Mutex<IndexMap<ObjectId, Arc<dyn SceneObject>>>,
    failing_enumerations: AtomicUsize,
    forwarded_additions: AtomicUsize,
    forwarded_removals: AtomicUsize,
}

impl MockRealm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: RealmId(next_id()),
            objects: Mutex::new(IndexMap::new()),
            failing_enumerations: AtomicUsize::new(0),
            forwarded_additions: AtomicUsize::new(0),
            forwarded_removals: AtomicUsize::new(0),
        })
    }

    /// Host-side insertion (no bridge involvement).
    pub fn insert(&self, object: Arc<dyn SceneObject>) {
        self.objects.lock().insert(object.id(), object);
    }

    /// Host-side removal (no bridge involvement).
    pub fn take(&self, id: ObjectId) -> Option<Arc<dyn SceneObject>> {
        self.objects.lock().shift_remove(&id)
    }

    /// Make the next `n` calls to `objects()` fail.
    pub fn fail_enumerations(&self, n: usize) {
        self.failing_enumerations.store(n, Ordering::SeqCst);
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.lock().contains_key(&id)
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Total objects forwarded through `add_objects`.
    pub fn forwarded_additions(&self) -> usize {
        self.forwarded_additions.load(Ordering::SeqCst)
    }

    /// Total objects forwarded through `remove_objects`.
    pub fn forwarded_removals(&self) -> usize {
        self.forwarded_removals.load(Ordering::SeqCst)
    }
}

impl SceneRealm for MockRealm {
    fn id(&self) -> RealmId {
        self.id
    }

    fn objects(&self) -> Result<Vec<Arc<dyn SceneObject>>, SceneError> {
        let failing = self
            .failing_enumerations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(SceneError::Unavailable {
                reason: format!("{} enumeration scripted to fail", self.id),
            });
        }
        Ok(self.objects.lock().values().cloned().collect())
    }

    fn add_objects(&self, objects: &[Arc<dyn SceneObject>]) {
        let mut map = self.objects.lock();
        for obj in objects {
            map.insert(obj.id(), Arc::clone(obj));
        }
        self.forwarded_additions
            .fetch_add(objects.len(), Ordering::SeqCst);
    }

    fn remove_objects(&self, objects: &[Arc<dyn SceneObject>]) {
        let mut map = self.objects.lock();
        for obj in objects {
            map.shift_remove(&obj.id());
        }
        self.forwarded_removals
            .fetch_add(objects.len(), Ordering::SeqCst);
    }
}

// ── MockSceneGraph ───────────────────────────────────────────────

/// A scene graph holding an ordered list of mock realms.
#[derive(Default)]
pub struct MockSceneGraph {
    realms: Mutex<Vec<Arc<MockRealm>>>,
}

impl MockSceneGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Host-side realm insertion (the bridge must still be told).
    pub fn insert_realm(&self, realm: Arc<MockRealm>) {
        self.realms.lock().push(realm);
    }

    /// Host-side realm removal (the bridge must still be told).
    pub fn take_realm(&self, id: RealmId) -> Option<Arc<MockRealm>> {
        let mut realms = self.realms.lock();
        let pos = realms.iter().position(|r| r.id == id)?;
        Some(realms.remove(pos))
    }
}

impl SceneGraph for MockSceneGraph {
    fn realms(&self) -> Vec<Arc<dyn SceneRealm>> {
        self.realms
            .lock()
            .iter()
            .map(|r| Arc::clone(r) as Arc<dyn SceneRealm>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_enumeration_failures_run_out() {
        let realm = MockRealm::new();
        realm.insert(MockObject::new(None));
        realm.fail_enumerations(2);
        assert!(realm.objects().is_err());
        assert!(realm.objects().is_err());
        assert_eq!(realm.objects().unwrap().len(), 1);
    }

    #[test]
    fn batch_script_is_fifo() {
        let ty = MockType::non_physical();
        let a: Arc<dyn SceneObject> = MockObject::new(None);
        ty.push_changes(StructuralChanges::add(vec![Arc::clone(&a)]));
        let first = ty.batch_update(&[]).unwrap();
        assert_eq!(first.additions[0].id(), a.id());
        assert!(ty.batch_update(&[a]).is_none());
        assert_eq!(ty.batch_sizes(), vec![0, 1]);
    }

    #[test]
    fn rebuild_requires_initialization() {
        let ty = MockType::non_physical();
        assert!(!ty.trigger_rebuild(Vec::new()));
        ty.initialize(Arc::new(|_| {}));
        assert!(ty.trigger_rebuild(Vec::new()));
        assert_eq!(ty.init_count(), 1);
    }
}
