use crate::resources::bounds::BoundingBox;

/// Opaque vertex-array handle issued by the mesh provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    Points,
    Patches,
}

/// One draw call worth of geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct SubMesh {
    pub vertex_array: VertexArrayHandle,
    pub vertex_count: u32,
    /// Zero for non-indexed geometry.
    pub index_count: u32,
    pub mode: DrawMode,
    pub material_index: usize,
    /// Object-space bounds.
    pub bounds: BoundingBox,
}

impl SubMesh {
    #[must_use]
    pub fn new(vertex_array: VertexArrayHandle, vertex_count: u32, bounds: BoundingBox) -> Self {
        Self {
            vertex_array,
            vertex_count,
            index_count: 0,
            mode: DrawMode::Triangles,
            material_index: 0,
            bounds,
        }
    }

    #[must_use]
    pub fn indexed(mut self, index_count: u32) -> Self {
        self.index_count = index_count;
        self
    }

    #[must_use]
    pub fn with_material_index(mut self, index: usize) -> Self {
        self.material_index = index;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DrawMode) -> Self {
        self.mode = mode;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.index_count > 0
    }

    /// Number of elements a draw of this sub-mesh submits.
    #[inline]
    #[must_use]
    pub fn element_count(&self) -> u32 {
        if self.is_indexed() {
            self.index_count
        } else {
            self.vertex_count
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub sub_meshes: Vec<SubMesh>,
}

impl Mesh {
    #[must_use]
    pub fn new(name: impl Into<String>, sub_meshes: Vec<SubMesh>) -> Self {
        Self {
            name: name.into(),
            sub_meshes,
        }
    }

    /// Bounds enclosing every sub-mesh, axis-aligned in object space.
    #[must_use]
    pub fn bounds(&self) -> Option<BoundingBox> {
        let corners: Vec<_> = self
            .sub_meshes
            .iter()
            .flat_map(|s| s.bounds.corners())
            .collect();
        BoundingBox::from_points(&corners)
    }
}
