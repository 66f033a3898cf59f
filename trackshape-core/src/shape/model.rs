/// Typed records extracted from the shape tree
use nalgebra::Matrix4;
use std::collections::BTreeSet;

use crate::geometry::{Normal, Point, UvPoint};

/// A material entry from `prim_states`
#[derive(Debug, Clone, PartialEq)]
pub struct PrimStateRecord {
    pub index: usize,
    pub name: String,
    /// Image file of the first texture, empty when the prim state has none
    pub texture_reference: String,
    pub vtx_state_idx: Option<usize>,
}

/// A named coordinate frame from `matrices`
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixRecord {
    pub name: String,
    /// Local transform relative to `parent`, column-vector convention
    pub transform: Matrix4<f64>,
    pub parent: Option<String>,
}

/// Value copy of a sub-object vertex with its attributes resolved
#[derive(Debug, Clone, PartialEq)]
pub struct VertexRecord {
    pub index: usize,
    pub point: Point,
    pub uv: Vec<UvPoint>,
    pub normal: Normal,
}

/// Triangles of one `indexed_trilist`
///
/// Read-only to callers; all changes go through the document's edit
/// operations so the index invariants hold.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTrilist {
    pub(crate) prim_state_index: usize,
    pub(crate) vertex_idxs: Vec<usize>,
    /// `( normal_idx, flag )` pair per triangle
    pub(crate) normal_idxs: Vec<(usize, usize)>,
    pub(crate) flags: Vec<u32>,
}

impl IndexedTrilist {
    pub fn prim_state_index(&self) -> usize {
        self.prim_state_index
    }

    pub fn vertex_idxs(&self) -> &[usize] {
        &self.vertex_idxs
    }

    pub fn triangle_count(&self) -> usize {
        self.vertex_idxs.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.vertex_idxs
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
    }

    /// Face normal index of each triangle
    pub fn normal_idxs(&self) -> impl Iterator<Item = usize> + '_ {
        self.normal_idxs.iter().map(|&(idx, _)| idx)
    }

    pub fn flags(&self) -> &[u32] {
        &self.flags
    }

    /// Does any triangle reference `vertex`
    pub fn references(&self, vertex: usize) -> bool {
        self.vertex_idxs.contains(&vertex)
    }
}

/// Vertex entry as stored in the file: indices into the shared pools
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Vertex {
    pub flags: u32,
    pub point_idx: usize,
    pub normal_idx: usize,
    pub colour1: u32,
    pub colour2: u32,
    pub uv_idxs: Vec<usize>,
}

/// Contiguous vertex range sharing one vtx_state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VertexSet {
    pub vtx_state: usize,
    pub start: usize,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Trilist {
    /// Path of the `indexed_trilist` block
    pub path: Vec<usize>,
    pub data: IndexedTrilist,
    pub dirty: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SubObject {
    pub vertices_path: Vec<usize>,
    pub vertex_sets_path: Option<Vec<usize>>,
    pub geometry_info_path: Option<Vec<usize>>,
    pub vertices: Vec<Vertex>,
    pub original_vertex_count: usize,
    pub dirty_vertices: BTreeSet<usize>,
    pub vertex_sets: Vec<VertexSet>,
    pub vertex_sets_dirty: bool,
    pub trilists: Vec<Trilist>,
}

impl SubObject {
    pub fn is_dirty(&self) -> bool {
        !self.dirty_vertices.is_empty()
            || self.vertices.len() != self.original_vertex_count
            || self.vertex_sets_dirty
            || self.trilists.iter().any(|t| t.dirty)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LodLevel {
    pub distance_level: u32,
    pub submeshes: Vec<SubObject>,
}

/// Values that live in one of the shape-level pools
pub(crate) trait PoolEntry: Copy + PartialEq {
    /// Keyword of one entry block, e.g. `point`
    const KEYWORD: &'static str;

    fn to_numbers(&self) -> Vec<f64>;

    fn is_finite(&self) -> bool {
        self.to_numbers().iter().all(|n| n.is_finite())
    }
}

impl PoolEntry for Point {
    const KEYWORD: &'static str = "point";

    fn to_numbers(&self) -> Vec<f64> {
        vec![self.x, self.y, self.z]
    }
}

impl PoolEntry for UvPoint {
    const KEYWORD: &'static str = "uv_point";

    fn to_numbers(&self) -> Vec<f64> {
        vec![self.u, self.v]
    }
}

impl PoolEntry for Normal {
    const KEYWORD: &'static str = "vector";

    fn to_numbers(&self) -> Vec<f64> {
        vec![self.x, self.y, self.z]
    }
}

/// A shared attribute pool (`points`, `uv_points`, `normals`) with
/// reference counts and change tracking.
#[derive(Debug, Clone)]
pub(crate) struct Pool<T> {
    /// Path of the list block in the syntax tree
    pub path: Vec<usize>,
    pub values: Vec<T>,
    pub refs: Vec<u32>,
    pub original_len: usize,
    pub dirty: BTreeSet<usize>,
}

impl<T: PoolEntry> Pool<T> {
    pub fn new(path: Vec<usize>, values: Vec<T>) -> Self {
        let len = values.len();
        Self {
            path,
            refs: vec![0; len],
            values,
            original_len: len,
            dirty: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, idx: usize) -> Option<T> {
        self.values.get(idx).copied()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty() || self.values.len() != self.original_len
    }

    /// Overwrite an entry regardless of who references it
    pub fn set(&mut self, idx: usize, value: T) {
        if self.values[idx] != value {
            self.values[idx] = value;
            if idx < self.original_len {
                self.dirty.insert(idx);
            }
        }
    }

    pub fn push(&mut self, value: T) -> usize {
        self.values.push(value);
        self.refs.push(0);
        self.values.len() - 1
    }

    pub fn acquire(&mut self, idx: usize) {
        self.refs[idx] += 1;
    }

    pub fn release(&mut self, idx: usize) {
        self.refs[idx] = self.refs[idx].saturating_sub(1);
    }

    /// Write `value` for a single referrer of `idx`.
    ///
    /// Entries shared with other referrers are copied instead of modified.
    /// Returns the index the referrer should use from now on.
    pub fn write_owned(&mut self, idx: usize, value: T) -> usize {
        if self.values[idx] == value {
            idx
        } else if self.refs[idx] <= 1 {
            self.set(idx, value);
            idx
        } else {
            self.release(idx);
            let new_idx = self.push(value);
            self.acquire(new_idx);
            new_idx
        }
    }
}
