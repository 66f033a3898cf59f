/// Lookups and mesh edits on a [`Document`]
///
/// Records handed out are value copies. Every mutation validates its
/// arguments before touching the model, so a failed call leaves the
/// document as it was.
use std::collections::BTreeSet;
use tracing::{debug, trace};

use super::model::{
    IndexedTrilist, LodLevel, MatrixRecord, Pool, PoolEntry, PrimStateRecord, SubObject, Vertex,
    VertexRecord, VertexSet,
};
use super::{Document, SubMeshRef, TrilistRef};
use crate::error::{Error, Result};
use crate::geometry::{face_normal, Normal, Point, UvPoint};

/// Second value of each `normal_idxs` pair
const FACE_NORMAL_FLAG: usize = 3;

fn find_sub(levels: &[LodLevel], submesh: SubMeshRef) -> Result<&SubObject> {
    levels
        .iter()
        .find(|level| level.distance_level == submesh.lod_dlevel)
        .and_then(|level| level.submeshes.get(submesh.submesh))
        .ok_or_else(|| Error::not_found("sub_object", submesh))
}

fn find_sub_mut(levels: &mut [LodLevel], submesh: SubMeshRef) -> Result<&mut SubObject> {
    levels
        .iter_mut()
        .find(|level| level.distance_level == submesh.lod_dlevel)
        .and_then(|level| level.submeshes.get_mut(submesh.submesh))
        .ok_or_else(|| Error::not_found("sub_object", submesh))
}

fn ensure_finite<T: PoolEntry>(name: &'static str, value: &T) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid_parameter(name, "coordinates must be finite"))
    }
}

fn pool_entry<T: PoolEntry>(pool: &Pool<T>, what: &'static str, idx: usize) -> Result<T> {
    pool.get(idx).ok_or_else(|| Error::not_found(what, idx))
}

fn set_pool_entry<T: PoolEntry>(
    pool: &mut Pool<T>,
    what: &'static str,
    idx: usize,
    value: T,
) -> Result<()> {
    ensure_finite(what, &value)?;
    if idx >= pool.len() {
        return Err(Error::not_found(what, idx));
    }
    pool.set(idx, value);
    Ok(())
}

fn add_pool_entry<T: PoolEntry>(pool: &mut Pool<T>, what: &'static str, value: T) -> Result<usize> {
    ensure_finite(what, &value)?;
    Ok(pool.push(value))
}

/// Remove triangle `pos` and return its face normal index
fn remove_triangle(trilist: &mut IndexedTrilist, pos: usize) -> usize {
    trilist.vertex_idxs.drain(pos * 3..pos * 3 + 3);
    trilist.flags.remove(pos);
    trilist.normal_idxs.remove(pos).0
}

fn sorted(mut triangle: [usize; 3]) -> [usize; 3] {
    triangle.sort_unstable();
    triangle
}

impl Document {
    fn vertex_record(&self, index: usize, vertex: &Vertex) -> VertexRecord {
        VertexRecord {
            index,
            point: self.points.values[vertex.point_idx],
            uv: vertex
                .uv_idxs
                .iter()
                .map(|&uv| self.uv_points.values[uv])
                .collect(),
            normal: self.normals.values[vertex.normal_idx],
        }
    }

    fn trilist_data(&self, trilist: TrilistRef) -> Result<&IndexedTrilist> {
        find_sub(&self.lod_levels, trilist.submesh())?
            .trilists
            .get(trilist.trilist)
            .map(|t| &t.data)
            .ok_or_else(|| Error::not_found("trilist", trilist))
    }

    /// Distinct LOD distance levels, ascending
    pub fn lod_dlevels(&self) -> Vec<u32> {
        let mut dlevels: Vec<u32> = self.lod_levels.iter().map(|l| l.distance_level).collect();
        dlevels.sort_unstable();
        dlevels.dedup();
        dlevels
    }

    /// Sub-object positions within the first LOD level using `dlevel`
    pub fn submesh_indices(&self, dlevel: u32) -> Vec<usize> {
        self.lod_levels
            .iter()
            .find(|level| level.distance_level == dlevel)
            .map(|level| (0..level.submeshes.len()).collect())
            .unwrap_or_default()
    }

    pub fn vertices(&self, submesh: SubMeshRef) -> Vec<VertexRecord> {
        match find_sub(&self.lod_levels, submesh) {
            Ok(sub) => sub
                .vertices
                .iter()
                .enumerate()
                .map(|(i, v)| self.vertex_record(i, v))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn vertex(&self, submesh: SubMeshRef, index: usize) -> Result<VertexRecord> {
        let sub = find_sub(&self.lod_levels, submesh)?;
        sub.vertices
            .get(index)
            .map(|v| self.vertex_record(index, v))
            .ok_or_else(|| Error::not_found("vertex", index))
    }

    pub fn prim_states(&self) -> Vec<PrimStateRecord> {
        self.prim_states.clone()
    }

    pub fn prim_state(&self, index: usize) -> Result<PrimStateRecord> {
        self.prim_states
            .get(index)
            .cloned()
            .ok_or_else(|| Error::not_found("prim_state", index))
    }

    /// All prim states with exactly this name, in file order
    pub fn prim_states_by_name(&self, name: &str) -> Vec<PrimStateRecord> {
        self.prim_states
            .iter()
            .filter(|ps| ps.name == name)
            .cloned()
            .collect()
    }

    /// Trilists of a sub-object, optionally only those using `prim_state`
    pub fn trilists(&self, submesh: SubMeshRef, prim_state: Option<usize>) -> Vec<TrilistRef> {
        let Ok(sub) = find_sub(&self.lod_levels, submesh) else {
            return Vec::new();
        };
        sub.trilists
            .iter()
            .enumerate()
            .filter(|(_, t)| prim_state.map_or(true, |ps| t.data.prim_state_index == ps))
            .map(|(i, _)| submesh.trilist(i))
            .collect()
    }

    pub fn trilist(&self, trilist: TrilistRef) -> Result<IndexedTrilist> {
        self.trilist_data(trilist).cloned()
    }

    /// Name of the matrix a sub-object's geometry is expressed in
    ///
    /// Follows the first trilist's prim state to its vtx_state. `None` when
    /// the sub-object has no trilists or the chain is incomplete.
    pub fn local_matrix_reference(&self, submesh: SubMeshRef) -> Result<Option<String>> {
        let sub = find_sub(&self.lod_levels, submesh)?;
        Ok(sub.trilists.first().and_then(|trilist| {
            let vtx_state = self.prim_states[trilist.data.prim_state_index].vtx_state_idx?;
            let matrix = *self.vtx_state_matrices.get(vtx_state)?;
            self.matrices.get(matrix).map(|m| m.name.clone())
        }))
    }

    pub fn matrices(&self) -> Vec<MatrixRecord> {
        self.matrices.clone()
    }

    /// First matrix with this name
    pub fn matrix(&self, name: &str) -> Result<MatrixRecord> {
        self.matrices
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| Error::not_found("matrix", name))
    }

    /// Vertices sharing a triangle with `vertex`, ascending
    pub fn connected_vertex_indices(&self, trilist: TrilistRef, vertex: usize) -> Result<Vec<usize>> {
        let data = self.trilist_data(trilist)?;
        let connected: BTreeSet<usize> = data
            .triangles()
            .filter(|tri| tri.contains(&vertex))
            .flatten()
            .filter(|&v| v != vertex)
            .collect();
        Ok(connected.into_iter().collect())
    }

    /// Vertices referenced by trilists using `prim_state` in one LOD level
    pub fn vertices_by_prim_state(
        &self,
        dlevel: u32,
        prim_state: usize,
    ) -> Vec<(SubMeshRef, VertexRecord)> {
        let Some(level) = self.lod_levels.iter().find(|l| l.distance_level == dlevel) else {
            return Vec::new();
        };
        let mut records = Vec::new();
        for (i, sub) in level.submeshes.iter().enumerate() {
            let used: BTreeSet<usize> = sub
                .trilists
                .iter()
                .filter(|t| t.data.prim_state_index == prim_state)
                .flat_map(|t| t.data.vertex_idxs.iter().copied())
                .collect();
            records.extend(used.into_iter().map(|v| {
                (
                    SubMeshRef::new(dlevel, i),
                    self.vertex_record(v, &sub.vertices[v]),
                )
            }));
        }
        records
    }

    /// Replace the point, uv and normal of an existing vertex
    ///
    /// Pool entries shared with other vertices or faces are copied rather
    /// than modified.
    pub fn update_vertex(&mut self, submesh: SubMeshRef, record: &VertexRecord) -> Result<()> {
        ensure_finite("point", &record.point)?;
        ensure_finite("normal", &record.normal)?;
        for uv in &record.uv {
            ensure_finite("uv", uv)?;
        }

        let sub = find_sub_mut(&mut self.lod_levels, submesh)?;
        let vertex = sub
            .vertices
            .get_mut(record.index)
            .ok_or_else(|| Error::not_found("vertex", record.index))?;
        let before = vertex.clone();

        vertex.point_idx = self.points.write_owned(vertex.point_idx, record.point);
        vertex.normal_idx = self.normals.write_owned(vertex.normal_idx, record.normal);
        let mut uv_idxs = Vec::with_capacity(record.uv.len());
        for (i, &uv) in record.uv.iter().enumerate() {
            let idx = match before.uv_idxs.get(i) {
                Some(&idx) => self.uv_points.write_owned(idx, uv),
                None => {
                    let idx = self.uv_points.push(uv);
                    self.uv_points.acquire(idx);
                    idx
                }
            };
            uv_idxs.push(idx);
        }
        for &idx in before.uv_idxs.iter().skip(record.uv.len()) {
            self.uv_points.release(idx);
        }
        vertex.uv_idxs = uv_idxs;

        let changed = *vertex != before;
        if changed && record.index < sub.original_vertex_count {
            sub.dirty_vertices.insert(record.index);
        }
        trace!(%submesh, vertex = record.index, "updated vertex");
        Ok(())
    }

    /// Append a vertex for use by `trilist`; creates no triangle
    ///
    /// New pool entries are appended for the point, uv and normal. The
    /// vertex joins the trailing vertex_set when that set belongs to the
    /// trilist's vtx_state, otherwise it opens a new one.
    pub fn add_vertex(
        &mut self,
        submesh: SubMeshRef,
        trilist: TrilistRef,
        point: Point,
        uv: UvPoint,
        normal: Normal,
    ) -> Result<usize> {
        if trilist.submesh() != submesh {
            return Err(Error::InvalidReference {
                what: "trilist",
                index: trilist.trilist,
            });
        }
        ensure_finite("point", &point)?;
        ensure_finite("uv", &uv)?;
        ensure_finite("normal", &normal)?;

        let sub = find_sub_mut(&mut self.lod_levels, submesh)?;
        let prim_state = sub
            .trilists
            .get(trilist.trilist)
            .map(|t| t.data.prim_state_index)
            .ok_or(Error::InvalidReference {
                what: "trilist",
                index: trilist.trilist,
            })?;
        let vtx_state = self.prim_states[prim_state]
            .vtx_state_idx
            .or_else(|| sub.vertex_sets.last().map(|set| set.vtx_state))
            .unwrap_or_default();

        let point_idx = self.points.push(point);
        self.points.acquire(point_idx);
        let uv_idx = self.uv_points.push(uv);
        self.uv_points.acquire(uv_idx);
        let normal_idx = self.normals.push(normal);
        self.normals.acquire(normal_idx);

        let index = sub.vertices.len();
        sub.vertices.push(Vertex {
            flags: self.config.vertex_flags,
            point_idx,
            normal_idx,
            colour1: self.config.diffuse_colour,
            colour2: self.config.specular_colour,
            uv_idxs: vec![uv_idx],
        });

        match sub.vertex_sets.last_mut() {
            Some(set) if set.vtx_state == vtx_state && set.start + set.count == index => {
                set.count += 1;
            }
            _ => sub.vertex_sets.push(VertexSet {
                vtx_state,
                start: index,
                count: 1,
            }),
        }
        sub.vertex_sets_dirty = true;

        debug!(%submesh, vertex = index, "added vertex");
        Ok(index)
    }

    /// Append the triangle `(v1, v2, v3)` in the given winding
    pub fn insert_triangle_between(
        &mut self,
        trilist: TrilistRef,
        v1: usize,
        v2: usize,
        v3: usize,
    ) -> Result<()> {
        let compute_normal = self.config.compute_face_normals || self.normals.len() == 0;
        let sub = find_sub_mut(&mut self.lod_levels, trilist.submesh())?;
        if trilist.trilist >= sub.trilists.len() {
            return Err(Error::not_found("trilist", trilist));
        }
        for v in [v1, v2, v3] {
            if v >= sub.vertices.len() {
                return Err(Error::InvalidReference {
                    what: "vertex",
                    index: v,
                });
            }
        }

        let normal_idx = if compute_normal {
            let [a, b, c] = [v1, v2, v3].map(|v| self.points.values[sub.vertices[v].point_idx]);
            self.normals.push(face_normal(&a, &b, &c))
        } else {
            0
        };
        self.normals.acquire(normal_idx);

        let target = &mut sub.trilists[trilist.trilist];
        target.data.vertex_idxs.extend([v1, v2, v3]);
        target.data.normal_idxs.push((normal_idx, FACE_NORMAL_FLAG));
        target.data.flags.push(0);
        target.dirty = true;

        trace!(%trilist, v1, v2, v3, "inserted triangle");
        Ok(())
    }

    /// Remove the first triangle made of `{v1, v2, v3}` in any order
    ///
    /// Returns whether a triangle was removed. Vertices are kept.
    pub fn remove_triangle_between(
        &mut self,
        trilist: TrilistRef,
        v1: usize,
        v2: usize,
        v3: usize,
    ) -> Result<bool> {
        let sub = find_sub_mut(&mut self.lod_levels, trilist.submesh())?;
        let target = sub
            .trilists
            .get_mut(trilist.trilist)
            .ok_or_else(|| Error::not_found("trilist", trilist))?;

        let wanted = sorted([v1, v2, v3]);
        let Some(pos) = target.data.triangles().position(|tri| sorted(tri) == wanted) else {
            return Ok(false);
        };
        let normal = remove_triangle(&mut target.data, pos);
        self.normals.release(normal);
        target.dirty = true;

        trace!(%trilist, v1, v2, v3, "removed triangle");
        Ok(true)
    }

    /// Remove every triangle that uses `vertex` and return how many went
    pub fn remove_triangles_connected_to_vertex(
        &mut self,
        trilist: TrilistRef,
        vertex: usize,
    ) -> Result<usize> {
        let sub = find_sub_mut(&mut self.lod_levels, trilist.submesh())?;
        let target = sub
            .trilists
            .get_mut(trilist.trilist)
            .ok_or_else(|| Error::not_found("trilist", trilist))?;

        let positions: Vec<usize> = target
            .data
            .triangles()
            .enumerate()
            .filter(|(_, tri)| tri.contains(&vertex))
            .map(|(pos, _)| pos)
            .collect();
        for &pos in positions.iter().rev() {
            let normal = remove_triangle(&mut target.data, pos);
            self.normals.release(normal);
        }
        if !positions.is_empty() {
            target.dirty = true;
            trace!(%trilist, vertex, removed = positions.len(), "removed connected triangles");
        }
        Ok(positions.len())
    }

    pub fn points(&self) -> &[Point] {
        &self.points.values
    }

    pub fn point(&self, idx: usize) -> Result<Point> {
        pool_entry(&self.points, "point", idx)
    }

    /// Overwrite a shared point; every vertex using it moves
    pub fn set_point(&mut self, idx: usize, point: Point) -> Result<()> {
        set_pool_entry(&mut self.points, "point", idx, point)
    }

    pub fn add_point(&mut self, point: Point) -> Result<usize> {
        add_pool_entry(&mut self.points, "point", point)
    }

    pub fn uv_points(&self) -> &[UvPoint] {
        &self.uv_points.values
    }

    pub fn uv_point(&self, idx: usize) -> Result<UvPoint> {
        pool_entry(&self.uv_points, "uv_point", idx)
    }

    pub fn set_uv_point(&mut self, idx: usize, uv: UvPoint) -> Result<()> {
        set_pool_entry(&mut self.uv_points, "uv_point", idx, uv)
    }

    pub fn add_uv_point(&mut self, uv: UvPoint) -> Result<usize> {
        add_pool_entry(&mut self.uv_points, "uv_point", uv)
    }

    pub fn normals(&self) -> &[Normal] {
        &self.normals.values
    }

    pub fn normal(&self, idx: usize) -> Result<Normal> {
        pool_entry(&self.normals, "normal", idx)
    }

    pub fn set_normal(&mut self, idx: usize, normal: Normal) -> Result<()> {
        set_pool_entry(&mut self.normals, "normal", idx, normal)
    }

    pub fn add_normal(&mut self, normal: Normal) -> Result<usize> {
        add_pool_entry(&mut self.normals, "normal", normal)
    }
}
