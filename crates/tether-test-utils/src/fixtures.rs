//! Reusable scene fixtures.
//!
//! - [`unit_box`]: a 1×1×1 box mesh.
//! - [`populated_realm`]: a realm pre-filled with instances of a type.
//! - [`single_realm_world`]: a scene graph with one realm.

use std::sync::Arc;

use tether_core::{SceneObject, SceneType, ShapeData};

use crate::{MockObject, MockRealm, MockSceneGraph};

/// Box mesh with half-extents of 0.5.
pub fn unit_box() -> ShapeData {
    ShapeData::cuboid([0.5, 0.5, 0.5])
}

/// Insert `count` fresh instances of `ty` into `realm`, returning them.
pub fn populated_realm(
    realm: &MockRealm,
    ty: &Arc<dyn SceneType>,
    count: usize,
) -> Vec<Arc<dyn SceneObject>> {
    (0..count)
        .map(|_| {
            let obj: Arc<dyn SceneObject> = MockObject::new(Some(Arc::clone(ty)));
            realm.insert(Arc::clone(&obj));
            obj
        })
        .collect()
}

/// A scene graph containing one empty realm.
pub fn single_realm_world() -> (Arc<MockSceneGraph>, Arc<MockRealm>) {
    let scene = MockSceneGraph::new();
    let realm = MockRealm::new();
    scene.insert_realm(Arc::clone(&realm));
    (scene, realm)
}
