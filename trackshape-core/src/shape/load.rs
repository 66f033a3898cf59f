/// Reading shape text into a [`Document`]
use nalgebra::Matrix4;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use super::model::{
    IndexedTrilist, LodLevel, MatrixRecord, Pool, PoolEntry, PrimStateRecord, SubObject,
    Trilist, Vertex, VertexSet,
};
use super::{Document, Encoding};
use crate::config::EditConfig;
use crate::error::{Error, Result};
use crate::geometry::{Normal, Point, UvPoint};
use crate::syntax::{self, Block, Item, SyntaxTree, Token};

const UTF8_BOM: &[u8] = &[0xef, 0xbb, 0xbf];
const UTF16LE_BOM: &[u8] = &[0xff, 0xfe];
const UTF16BE_BOM: &[u8] = &[0xfe, 0xff];

impl Document {
    /// Parse shape text with the default edit settings
    pub fn parse(text: &str) -> Result<Document> {
        Self::parse_with_config(text, EditConfig::default())
    }

    pub fn parse_with_config(text: &str, config: EditConfig) -> Result<Document> {
        match text.strip_prefix('\u{feff}') {
            Some(rest) => load(rest, Encoding::Utf8, true, config),
            None => load(text, Encoding::Utf8, false, config),
        }
    }

    /// Detect the encoding of raw file bytes and parse them
    pub fn parse_bytes(data: &[u8]) -> Result<Document> {
        Self::parse_bytes_with_config(data, EditConfig::default())
    }

    pub fn parse_bytes_with_config(data: &[u8], config: EditConfig) -> Result<Document> {
        let (encoding, bom, body) = detect_encoding(data);
        let text = match encoding {
            Encoding::Utf8 => std::str::from_utf8(body)
                .map_err(|e| Error::UnsupportedInput(format!("not valid UTF-8 text: {e}")))?
                .to_string(),
            Encoding::Utf16Le | Encoding::Utf16Be => decode_utf16(body, encoding)?,
        };
        load(&text, encoding, bom, config)
    }
}

fn detect_encoding(data: &[u8]) -> (Encoding, bool, &[u8]) {
    if let Some(body) = data.strip_prefix(UTF16LE_BOM) {
        (Encoding::Utf16Le, true, body)
    } else if let Some(body) = data.strip_prefix(UTF16BE_BOM) {
        (Encoding::Utf16Be, true, body)
    } else if let Some(body) = data.strip_prefix(UTF8_BOM) {
        (Encoding::Utf8, true, body)
    } else {
        match data {
            [first, 0, ..] if *first != 0 => (Encoding::Utf16Le, false, data),
            [0, second, ..] if *second != 0 => (Encoding::Utf16Be, false, data),
            _ => (Encoding::Utf8, false, data),
        }
    }
}

fn decode_utf16(body: &[u8], encoding: Encoding) -> Result<String> {
    if body.len() % 2 != 0 {
        return Err(Error::UnsupportedInput(
            "odd number of bytes in UTF-16 text".to_string(),
        ));
    }
    let units = body.chunks_exact(2).map(|pair| match encoding {
        Encoding::Utf16Be => u16::from_be_bytes([pair[0], pair[1]]),
        _ => u16::from_le_bytes([pair[0], pair[1]]),
    });
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::UnsupportedInput(format!("not valid UTF-16 text: {e}")))
}

/// Reject compressed (`SIMISA@F`) and binary (`JINX0?1b`) shapes
fn check_header(text: &str) -> Result<()> {
    let header = text.split_whitespace().next().unwrap_or_default();
    if header.starts_with("SIMISA@F") {
        return Err(Error::UnsupportedInput(
            "compressed shape, decompress it first".to_string(),
        ));
    }
    if let Some(pos) = header.find("JINX0") {
        if header[pos + 5..].chars().nth(2) == Some('b') {
            return Err(Error::UnsupportedInput("binary shape".to_string()));
        }
    }
    Ok(())
}

fn load(text: &str, encoding: Encoding, bom: bool, config: EditConfig) -> Result<Document> {
    check_header(text)?;
    let tree = syntax::parse(text)?;
    let doc = Loader::default().load(tree, encoding, bom, config)?;
    debug!(
        points = doc.points.len(),
        normals = doc.normals.len(),
        matrices = doc.matrices.len(),
        lod_levels = doc.lod_levels.len(),
        "loaded shape"
    );
    Ok(doc)
}

/// Child block by keyword, or a format error naming the parent
fn require<'a>(parent: &'a Block, keyword: &str) -> Result<(usize, &'a Block)> {
    parent.find(keyword).ok_or_else(|| {
        Error::format(
            parent.line(),
            format!("missing '{keyword}' block in '{}'", parent.name()),
        )
    })
}

fn atom(block: &Block, n: usize) -> Result<&Token> {
    block.atoms().nth(n).ok_or_else(|| {
        Error::format(
            block.line(),
            format!("'{}' is missing value {}", block.name(), n + 1),
        )
    })
}

fn parse_token<T: std::str::FromStr>(token: &Token, what: &str) -> Result<T> {
    token
        .text
        .parse()
        .map_err(|_| Error::format(token.line, format!("invalid {what} '{}'", token.text)))
}

fn number(block: &Block, n: usize) -> Result<f64> {
    parse_token(atom(block, n)?, "number")
}

fn index(block: &Block, n: usize) -> Result<usize> {
    parse_token(atom(block, n)?, "index")
}

fn hex(block: &Block, n: usize) -> Result<u32> {
    parse_hex(atom(block, n)?)
}

fn parse_hex(token: &Token) -> Result<u32> {
    u32::from_str_radix(&token.text, 16)
        .map_err(|_| Error::format(token.line, format!("invalid hex value '{}'", token.text)))
}

/// Entries of a `name ( count entry ( .. ) entry ( .. ) )` list
///
/// The declared count must equal the number of child blocks. With `entry`
/// set, every child block must use that keyword.
fn counted_entries<'a>(list: &'a Block, entry: Option<&str>) -> Result<Vec<(usize, &'a Block)>> {
    let count = index(list, 0)?;
    let mut entries = Vec::new();
    for (pos, item) in list.items.iter().enumerate() {
        if let Item::Block(child) = item {
            if let Some(keyword) = entry {
                if !child.is(keyword) {
                    return Err(Error::format(
                        child.line(),
                        format!(
                            "unexpected '{}' in '{}', expected '{keyword}'",
                            child.name(),
                            list.name()
                        ),
                    ));
                }
            }
            entries.push((pos, child));
        }
    }
    if entries.len() != count {
        return Err(Error::format(
            list.line(),
            format!(
                "'{}' declares {count} entries but contains {}",
                list.name(),
                entries.len()
            ),
        ));
    }
    Ok(entries)
}

/// Values of a flat `name ( count v v v .. )` list with `per_entry` values
/// per counted entry
fn flat_values(list: &Block, per_entry: usize) -> Result<Vec<&Token>> {
    let count = index(list, 0)?;
    let values: Vec<&Token> = list.atoms().skip(1).collect();
    if values.len() != count * per_entry {
        return Err(Error::format(
            list.line(),
            format!(
                "'{}' declares {count} entries but contains {} values",
                list.name(),
                values.len()
            ),
        ));
    }
    Ok(values)
}

fn flat_indices(list: &Block) -> Result<Vec<usize>> {
    flat_values(list, 1)?
        .into_iter()
        .map(|token| parse_token(token, "index"))
        .collect()
}

fn check_range(line: usize, what: &str, idx: usize, len: usize) -> Result<()> {
    if idx < len {
        Ok(())
    } else {
        Err(Error::format(
            line,
            format!("{what} index {idx} out of range (0..{len})"),
        ))
    }
}

fn child_path(path: &[usize], pos: usize) -> Vec<usize> {
    let mut child = path.to_vec();
    child.push(pos);
    child
}

fn read_pool<T, F>(shape: &Block, shape_path: &[usize], keyword: &str, entry: F) -> Result<Pool<T>>
where
    T: PoolEntry,
    F: Fn(&Block) -> Result<T>,
{
    let (pos, list) = require(shape, keyword)?;
    let values = counted_entries(list, Some(T::KEYWORD))?
        .into_iter()
        .map(|(_, block)| entry(block))
        .collect::<Result<Vec<T>>>()?;
    Ok(Pool::new(child_path(shape_path, pos), values))
}

/// Builds the typed model; holds the sizes needed for reference checks
#[derive(Default)]
struct Loader {
    points: usize,
    uv_points: usize,
    normals: usize,
    prim_states: usize,
    vtx_states: Option<usize>,
}

impl Loader {
    fn load(
        mut self,
        tree: SyntaxTree,
        encoding: Encoding,
        bom: bool,
        config: EditConfig,
    ) -> Result<Document> {
        let (shape_pos, shape) = tree
            .items
            .iter()
            .enumerate()
            .find_map(|(i, item)| match item {
                Item::Block(block) if block.is("shape") => Some((i, block)),
                _ => None,
            })
            .ok_or_else(|| Error::format(1, "missing 'shape' block"))?;
        let shape_path = [shape_pos];

        let mut points = read_pool(shape, &shape_path, "points", |b| {
            Ok(Point::new(number(b, 0)?, number(b, 1)?, number(b, 2)?))
        })?;
        let mut uv_points = read_pool(shape, &shape_path, "uv_points", |b| {
            Ok(UvPoint::new(number(b, 0)?, number(b, 1)?))
        })?;
        let mut normals = read_pool(shape, &shape_path, "normals", |b| {
            Ok(Normal::new(number(b, 0)?, number(b, 1)?, number(b, 2)?))
        })?;
        self.points = points.len();
        self.uv_points = uv_points.len();
        self.normals = normals.len();

        let (_, matrices_block) = require(shape, "matrices")?;
        let matrix_entries = counted_entries(matrices_block, Some("matrix"))?;
        let images = match shape.child("images") {
            Some(list) => read_images(list)?,
            None => Vec::new(),
        };
        let textures = match shape.child("textures") {
            Some(list) => read_textures(list, images.len())?,
            None => Vec::new(),
        };
        let vtx_state_matrices = match shape.child("vtx_states") {
            Some(list) => {
                let matrices = read_vtx_states(list, matrix_entries.len())?;
                self.vtx_states = Some(matrices.len());
                matrices
            }
            None => Vec::new(),
        };
        let (_, prim_states_block) = require(shape, "prim_states")?;
        let prim_states = self.read_prim_states(prim_states_block, &textures, &images)?;
        self.prim_states = prim_states.len();

        let (lod_pos, lod_controls) = require(shape, "lod_controls")?;
        let mut hierarchy = None;
        let mut lod_levels = Vec::new();
        let lod_path = child_path(&shape_path, lod_pos);
        for (control_pos, control) in counted_entries(lod_controls, Some("lod_control"))? {
            let control_path = child_path(&lod_path, control_pos);
            let (levels_pos, levels) = require(control, "distance_levels")?;
            let levels_path = child_path(&control_path, levels_pos);
            for (level_pos, level) in counted_entries(levels, Some("distance_level"))? {
                let level_path = child_path(&levels_path, level_pos);
                let (_, header) = require(level, "distance_level_header")?;
                let (_, selection) = require(header, "dlevel_selection")?;
                let distance_level = parse_token(atom(selection, 0)?, "distance level")?;
                if hierarchy.is_none() {
                    hierarchy = header.child("hierarchy");
                }

                let (subs_pos, subs) = require(level, "sub_objects")?;
                let subs_path = child_path(&level_path, subs_pos);
                let submeshes = counted_entries(subs, Some("sub_object"))?
                    .into_iter()
                    .map(|(pos, sub)| self.read_sub_object(sub, &child_path(&subs_path, pos)))
                    .collect::<Result<Vec<_>>>()?;
                lod_levels.push(LodLevel {
                    distance_level,
                    submeshes,
                });
            }
        }

        let matrices = read_matrices(&matrix_entries, hierarchy)?;

        for sub in lod_levels.iter().flat_map(|level| &level.submeshes) {
            for vertex in &sub.vertices {
                points.acquire(vertex.point_idx);
                normals.acquire(vertex.normal_idx);
                for &uv in &vertex.uv_idxs {
                    uv_points.acquire(uv);
                }
            }
            for trilist in &sub.trilists {
                for &(normal, _) in &trilist.data.normal_idxs {
                    normals.acquire(normal);
                }
            }
        }

        Ok(Document {
            tree,
            encoding,
            bom,
            config,
            points,
            uv_points,
            normals,
            matrices,
            vtx_state_matrices,
            prim_states,
            lod_levels,
        })
    }

    fn read_prim_states(
        &self,
        list: &Block,
        textures: &[usize],
        images: &[String],
    ) -> Result<Vec<PrimStateRecord>> {
        counted_entries(list, Some("prim_state"))?
            .into_iter()
            .enumerate()
            .map(|(index, (_, block))| {
                let texture_reference = match block.child("tex_idxs") {
                    Some(tex_idxs) => match flat_indices(tex_idxs)?.first() {
                        Some(&tex) => {
                            check_range(tex_idxs.line(), "texture", tex, textures.len())?;
                            images[textures[tex]].clone()
                        }
                        None => String::new(),
                    },
                    None => String::new(),
                };
                let vtx_state_idx = match block.atoms().nth(3) {
                    Some(token) => {
                        let idx = parse_token(token, "vtx_state index")?;
                        if let Some(len) = self.vtx_states {
                            check_range(token.line, "vtx_state", idx, len)?;
                        }
                        Some(idx)
                    }
                    None => None,
                };
                Ok(PrimStateRecord {
                    index,
                    name: block.label().unwrap_or_default().to_string(),
                    texture_reference,
                    vtx_state_idx,
                })
            })
            .collect()
    }

    fn read_sub_object(&self, sub: &Block, path: &[usize]) -> Result<SubObject> {
        let (vertices_pos, vertices_block) = require(sub, "vertices")?;
        let vertices = counted_entries(vertices_block, Some("vertex"))?
            .into_iter()
            .map(|(_, block)| self.read_vertex(block))
            .collect::<Result<Vec<_>>>()?;

        let (vertex_sets, vertex_sets_path) = match sub.find("vertex_sets") {
            Some((pos, list)) => {
                let sets = counted_entries(list, Some("vertex_set"))?
                    .into_iter()
                    .map(|(_, block)| {
                        let set = VertexSet {
                            vtx_state: index(block, 0)?,
                            start: index(block, 1)?,
                            count: index(block, 2)?,
                        };
                        if set.start + set.count > vertices.len() {
                            return Err(Error::format(
                                block.line(),
                                "vertex_set extends past the last vertex",
                            ));
                        }
                        Ok(set)
                    })
                    .collect::<Result<Vec<_>>>()?;
                (sets, Some(child_path(path, pos)))
            }
            None => (Vec::new(), None),
        };

        let geometry_info_path = sub.find("sub_object_header").and_then(|(header_pos, header)| {
            header
                .find("geometry_info")
                .map(|(info_pos, _)| child_path(&child_path(path, header_pos), info_pos))
        });

        let (primitives_pos, primitives) = require(sub, "primitives")?;
        let primitives_path = child_path(path, primitives_pos);
        let mut trilists = Vec::new();
        let mut prim_state = None;
        for (pos, block) in counted_entries(primitives, None)? {
            if block.is("prim_state_idx") {
                let token = atom(block, 0)?;
                let idx = parse_token(token, "prim_state index")?;
                check_range(token.line, "prim_state", idx, self.prim_states)?;
                prim_state = Some(idx);
            } else if block.is("indexed_trilist") {
                let prim_state_index = prim_state.ok_or_else(|| {
                    Error::format(block.line(), "indexed_trilist before any prim_state_idx")
                })?;
                trilists.push(Trilist {
                    path: child_path(&primitives_path, pos),
                    data: self.read_trilist(block, prim_state_index, vertices.len())?,
                    dirty: false,
                });
            }
        }

        Ok(SubObject {
            vertices_path: child_path(path, vertices_pos),
            vertex_sets_path,
            geometry_info_path,
            original_vertex_count: vertices.len(),
            vertices,
            dirty_vertices: BTreeSet::new(),
            vertex_sets,
            vertex_sets_dirty: false,
            trilists,
        })
    }

    fn read_vertex(&self, block: &Block) -> Result<Vertex> {
        let line = block.line();
        let vertex = Vertex {
            flags: hex(block, 0)?,
            point_idx: index(block, 1)?,
            normal_idx: index(block, 2)?,
            colour1: hex(block, 3)?,
            colour2: hex(block, 4)?,
            uv_idxs: flat_indices(require(block, "vertex_uvs")?.1)?,
        };
        check_range(line, "point", vertex.point_idx, self.points)?;
        check_range(line, "normal", vertex.normal_idx, self.normals)?;
        for &uv in &vertex.uv_idxs {
            check_range(line, "uv_point", uv, self.uv_points)?;
        }
        Ok(vertex)
    }

    fn read_trilist(
        &self,
        block: &Block,
        prim_state_index: usize,
        vertex_count: usize,
    ) -> Result<IndexedTrilist> {
        let (_, vertex_list) = require(block, "vertex_idxs")?;
        let vertex_idxs = flat_indices(vertex_list)?;
        if vertex_idxs.len() % 3 != 0 {
            return Err(Error::format(
                vertex_list.line(),
                format!("{} vertex indices do not form triangles", vertex_idxs.len()),
            ));
        }
        for &idx in &vertex_idxs {
            check_range(vertex_list.line(), "vertex", idx, vertex_count)?;
        }
        let triangles = vertex_idxs.len() / 3;

        let (_, normal_list) = require(block, "normal_idxs")?;
        let normal_values = flat_values(normal_list, 2)?;
        let mut normal_idxs = Vec::with_capacity(triangles);
        for pair in normal_values.chunks_exact(2) {
            let idx = parse_token(pair[0], "normal index")?;
            check_range(pair[0].line, "normal", idx, self.normals)?;
            normal_idxs.push((idx, parse_token(pair[1], "normal flag")?));
        }

        let (_, flag_list) = require(block, "flags")?;
        let flags = flat_values(flag_list, 1)?
            .into_iter()
            .map(parse_hex)
            .collect::<Result<Vec<_>>>()?;

        for (list, len) in [(normal_list, normal_idxs.len()), (flag_list, flags.len())] {
            if len != triangles {
                return Err(Error::format(
                    list.line(),
                    format!("'{}' has {len} entries for {triangles} triangles", list.name()),
                ));
            }
        }

        Ok(IndexedTrilist {
            prim_state_index,
            vertex_idxs,
            normal_idxs,
            flags,
        })
    }
}

fn read_images(list: &Block) -> Result<Vec<String>> {
    counted_entries(list, Some("image"))?
        .into_iter()
        .map(|(_, block)| Ok(atom(block, 0)?.unquoted().to_string()))
        .collect()
}

fn read_textures(list: &Block, images: usize) -> Result<Vec<usize>> {
    counted_entries(list, Some("texture"))?
        .into_iter()
        .map(|(_, block)| {
            let image = index(block, 0)?;
            check_range(block.line(), "image", image, images)?;
            Ok(image)
        })
        .collect()
}

fn read_vtx_states(list: &Block, matrices: usize) -> Result<Vec<usize>> {
    counted_entries(list, Some("vtx_state"))?
        .into_iter()
        .map(|(_, block)| {
            let matrix = index(block, 1)?;
            check_range(block.line(), "matrix", matrix, matrices)?;
            Ok(matrix)
        })
        .collect()
}

/// Column-vector transform from the 4x3 row layout of a `matrix` block
fn read_matrix(block: &Block) -> Result<Matrix4<f64>> {
    let mut m = [0.0; 12];
    for (n, value) in m.iter_mut().enumerate() {
        *value = number(block, n)?;
    }
    Ok(Matrix4::new(
        m[0], m[1], m[2], m[9], //
        m[3], m[4], m[5], m[10], //
        m[6], m[7], m[8], m[11], //
        0.0, 0.0, 0.0, 1.0,
    ))
}

fn read_matrices(entries: &[(usize, &Block)], hierarchy: Option<&Block>) -> Result<Vec<MatrixRecord>> {
    let parents: Vec<i64> = match hierarchy {
        Some(list) => flat_values(list, 1)?
            .into_iter()
            .map(|token| parse_token(token, "hierarchy parent"))
            .collect::<Result<_>>()?,
        None => Vec::new(),
    };

    let mut names: Vec<String> = Vec::with_capacity(entries.len());
    let mut seen = HashMap::new();
    for (_, block) in entries {
        let name = block
            .label()
            .ok_or_else(|| Error::format(block.line(), "matrix without a name"))?
            .to_string();
        if seen.insert(name.clone(), block.line()).is_some() {
            warn!(name = %name, line = block.line(), "duplicate matrix name, lookups use the first");
        }
        names.push(name);
    }

    entries
        .iter()
        .enumerate()
        .map(|(i, (_, block))| {
            let parent = match parents.get(i) {
                Some(&p) if p >= 0 => {
                    let p = p as usize;
                    check_range(block.line(), "hierarchy parent", p, names.len())?;
                    Some(names[p].clone())
                }
                _ => None,
            };
            Ok(MatrixRecord {
                name: names[i].clone(),
                transform: read_matrix(block)?,
                parent,
            })
        })
        .collect()
}
