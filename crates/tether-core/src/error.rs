//! Error types for the Tether physics bridge.
//!
//! Organized by the fault taxonomy of the bridge: transient scene-graph
//! enumeration faults, per-object malformed shape data, and per-realm
//! engine faults during a step.

use thiserror::Error;

use crate::id::ObjectId;

/// Errors reported by a scene-graph collaborator.
///
/// Treated as transient: the loop controller skips the affected realm
/// for the current tick and retries on the next.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SceneError {
    /// The realm's object list could not be produced this tick.
    #[error("object enumeration unavailable: {reason}")]
    Unavailable {
        /// Human-readable description supplied by the scene graph.
        reason: String,
    },
}

/// Malformed shape data supplied by a scene type.
///
/// Rejects construction of the object's body. The object stays
/// registered in its realm context, but inert (non-colliding).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// The flat position buffer is not a sequence of `(x, y, z)` triples.
    #[error("position buffer length {len} is not a multiple of 3")]
    PositionsNotTriples {
        /// Length of the offending buffer.
        len: usize,
    },
    /// The flat index buffer is not a sequence of triangles.
    #[error("index buffer length {len} is not a multiple of 3")]
    IndicesNotTriples {
        /// Length of the offending buffer.
        len: usize,
    },
    /// A triangle references a vertex past the end of the position buffer.
    #[error("triangle index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// The offending vertex index.
        index: u32,
        /// Number of vertices in the position buffer.
        vertex_count: usize,
    },
    /// The physics engine refused to build a collision mesh.
    #[error("engine rejected collision mesh: {reason}")]
    Engine {
        /// Engine-provided description.
        reason: String,
    },
}

/// Errors from stepping a realm's physics world.
///
/// Fatal for the realm: its context is not stepped again until the
/// host recreates it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StepError {
    /// The physics engine panicked during integration.
    #[error("physics engine fault: {reason}")]
    EngineFault {
        /// Panic payload, when it was a string.
        reason: String,
    },
    /// A body's integrated state contains NaN or infinity.
    #[error("non-finite body state for {object}")]
    NonFiniteState {
        /// The object whose body diverged.
        object: ObjectId,
    },
    /// The realm faulted on an earlier tick and has not been recreated.
    #[error("realm is faulted and must be recreated")]
    RealmFaulted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_error_messages() {
        let e = ShapeError::IndexOutOfRange {
            index: 9,
            vertex_count: 4,
        };
        assert_eq!(e.to_string(), "triangle index 9 out of range for 4 vertices");
        assert_eq!(
            ShapeError::PositionsNotTriples { len: 4 }.to_string(),
            "position buffer length 4 is not a multiple of 3"
        );
    }

    #[test]
    fn step_error_names_object() {
        let e = StepError::NonFiniteState {
            object: ObjectId(12),
        };
        assert_eq!(e.to_string(), "non-finite body state for object#12");
    }
}
