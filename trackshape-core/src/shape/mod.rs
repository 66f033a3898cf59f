/// Shape document: lossless tree plus the typed mesh model
///
/// A [`Document`] keeps the parsed syntax tree untouched and edits a typed
/// model extracted from it. [`Document::serialize`] writes changed sections
/// back into a copy of the tree, so untouched regions reproduce the input
/// exactly.
mod edit;
mod load;
mod model;
mod save;

#[cfg(test)]
pub(crate) mod fixtures;

pub use model::{IndexedTrilist, MatrixRecord, PrimStateRecord, VertexRecord};

use std::fmt;

use crate::config::EditConfig;
use crate::geometry::{Normal, Point, UvPoint};
use crate::syntax::SyntaxTree;
use model::{LodLevel, Pool};

/// Text encoding a document was read with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// A sub-object addressed by LOD distance level and position in that level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubMeshRef {
    pub lod_dlevel: u32,
    pub submesh: usize,
}

impl SubMeshRef {
    pub fn new(lod_dlevel: u32, submesh: usize) -> Self {
        Self {
            lod_dlevel,
            submesh,
        }
    }

    pub fn trilist(self, trilist: usize) -> TrilistRef {
        TrilistRef {
            lod_dlevel: self.lod_dlevel,
            submesh: self.submesh,
            trilist,
        }
    }
}

impl fmt::Display for SubMeshRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dlevel {} sub_object {}", self.lod_dlevel, self.submesh)
    }
}

/// An indexed trilist addressed through its owning sub-object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrilistRef {
    pub lod_dlevel: u32,
    pub submesh: usize,
    pub trilist: usize,
}

impl TrilistRef {
    pub fn submesh(self) -> SubMeshRef {
        SubMeshRef::new(self.lod_dlevel, self.submesh)
    }
}

impl fmt::Display for TrilistRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} trilist {}", self.submesh(), self.trilist)
    }
}

/// An editable MSTS text shape
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) tree: SyntaxTree,
    pub(crate) encoding: Encoding,
    pub(crate) bom: bool,
    pub(crate) config: EditConfig,
    pub(crate) points: Pool<Point>,
    pub(crate) uv_points: Pool<UvPoint>,
    pub(crate) normals: Pool<Normal>,
    pub(crate) matrices: Vec<MatrixRecord>,
    /// Matrix index of each vtx_state
    pub(crate) vtx_state_matrices: Vec<usize>,
    pub(crate) prim_states: Vec<PrimStateRecord>,
    pub(crate) lod_levels: Vec<LodLevel>,
}

impl Document {
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Whether the source started with a byte order mark
    pub fn has_bom(&self) -> bool {
        self.bom
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    /// Settings for vertices and triangles created after this call
    pub fn set_config(&mut self, config: EditConfig) {
        self.config = config;
    }

    /// Has any edit been applied since parsing
    pub fn is_modified(&self) -> bool {
        self.points.is_dirty()
            || self.uv_points.is_dirty()
            || self.normals.is_dirty()
            || self
                .lod_levels
                .iter()
                .flat_map(|level| &level.submeshes)
                .any(|sub| sub.is_dirty())
    }
}
