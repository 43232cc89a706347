//! Static collision mesh data supplied by a scene type.

use crate::error::ShapeError;

/// Flat vertex and triangle buffers describing a static collision mesh.
///
/// `positions` holds `(x, y, z)` triples; `indices` holds triangles as
/// triples of vertex indices into `positions`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapeData {
    /// Flat vertex positions, three floats per vertex.
    pub positions: Vec<f32>,
    /// Flat triangle indices, three per triangle.
    pub indices: Vec<u32>,
}

impl ShapeData {
    /// Build from flat buffers.
    pub fn new(positions: Vec<f32>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    /// A closed axis-aligned box centred on the origin, wound outward.
    pub fn cuboid(half_extents: [f32; 3]) -> Self {
        let [hx, hy, hz] = half_extents;
        let mut positions = Vec::with_capacity(24);
        // Vertex i has +x when bit 0 is set, +y for bit 1, +z for bit 2.
        for i in 0..8u32 {
            positions.push(if i & 1 != 0 { hx } else { -hx });
            positions.push(if i & 2 != 0 { hy } else { -hy });
            positions.push(if i & 4 != 0 { hz } else { -hz });
        }
        let indices = vec![
            0, 2, 3, 0, 3, 1, // -z
            4, 5, 7, 4, 7, 6, // +z
            0, 1, 5, 0, 5, 4, // -y
            2, 6, 7, 2, 7, 3, // +y
            0, 4, 6, 0, 6, 2, // -x
            1, 3, 7, 1, 7, 5, // +x
        ];
        Self { positions, indices }
    }

    /// Whether either buffer is empty. Empty shapes produce no body.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Number of complete vertices in the position buffer.
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of complete triangles in the index buffer.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check that both buffers are whole triples and every index is in range.
    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.positions.len() % 3 != 0 {
            return Err(ShapeError::PositionsNotTriples {
                len: self.positions.len(),
            });
        }
        if self.indices.len() % 3 != 0 {
            return Err(ShapeError::IndicesNotTriples {
                len: self.indices.len(),
            });
        }
        let vertex_count = self.vertex_count();
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= vertex_count)
        {
            return Err(ShapeError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }
        Ok(())
    }

    /// Vertices as `[x, y, z]` arrays. Trailing partial triples are skipped.
    pub fn vertices(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.positions.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }

    /// Triangles as index triples. Trailing partial triples are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }
}
