//! Two-way transform binding between one scene object and its body.
//!
//! Before integration, [`BodySynchronizer::pre_step`] makes the scene
//! object authoritative: the body is teleported to the object's current
//! transform. After integration, [`BodySynchronizer::post_step`] copies
//! the body's translation and the 3×3 rotation block back out. The
//! fourth row and column of the object's basis are never written.

use std::sync::Arc;

use rapier3d::na::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion};
use rapier3d::prelude::{ColliderHandle, RigidBodyHandle, RigidBodySet};
use tether_core::{ObjectId, SceneObject, StepError, Transform};

/// Binding between a scene object and the body built for it.
///
/// Created when the body is inserted and dropped when it is removed.
pub struct BodySynchronizer {
    object: Arc<dyn SceneObject>,
    body: RigidBodyHandle,
    collider: ColliderHandle,
}

impl BodySynchronizer {
    pub(crate) fn new(
        object: Arc<dyn SceneObject>,
        body: RigidBodyHandle,
        collider: ColliderHandle,
    ) -> Self {
        Self {
            object,
            body,
            collider,
        }
    }

    /// The bound object's id.
    pub fn object_id(&self) -> ObjectId {
        self.object.id()
    }

    /// The bound object.
    pub fn object(&self) -> &Arc<dyn SceneObject> {
        &self.object
    }

    /// Handle of the rapier body.
    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    /// Handle of the trimesh collider attached to the body.
    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    /// Overwrite the body's pose from the object's current transform.
    pub fn pre_step(&self, bodies: &mut RigidBodySet) {
        if let Some(body) = bodies.get_mut(self.body) {
            body.set_position(to_isometry(&self.object.transform()), true);
        }
    }

    /// Write the body's resulting pose back into the object's transform.
    ///
    /// With `check_finite`, a NaN or infinite pose is reported instead of
    /// written, so the scene graph never receives poisoned state.
    pub fn post_step(&self, bodies: &RigidBodySet, check_finite: bool) -> Result<(), StepError> {
        let Some(body) = bodies.get(self.body) else {
            return Ok(());
        };
        let mut transform = self.object.transform();
        write_isometry(body.position(), &mut transform);
        if check_finite && !transform.is_finite() {
            return Err(StepError::NonFiniteState {
                object: self.object.id(),
            });
        }
        self.object.set_transform(transform);
        Ok(())
    }
}

/// Rigid pose of a transform. The 3×3 block is re-orthonormalized.
pub(crate) fn to_isometry(transform: &Transform) -> Isometry3<f32> {
    let [x, y, z] = transform.position;
    let r = transform.rotation();
    let m = Matrix3::new(
        r[0][0], r[0][1], r[0][2], //
        r[1][0], r[1][1], r[1][2], //
        r[2][0], r[2][1], r[2][2],
    );
    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(&m));
    Isometry3::from_parts(Translation3::new(x, y, z), rotation)
}

/// Copy translation and rotation into `transform`, leaving the rest.
pub(crate) fn write_isometry(iso: &Isometry3<f32>, transform: &mut Transform) {
    let t = iso.translation.vector;
    transform.position = [t.x, t.y, t.z];
    let m = iso.rotation.to_rotation_matrix();
    let mut rows = [[0.0f32; 3]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    transform.set_rotation(rows);
}
