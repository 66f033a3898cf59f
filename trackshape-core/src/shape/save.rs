/// Writing a [`Document`] back to shape text
///
/// Serialization works on a copy of the parsed tree. Only sections whose
/// model changed are touched, and within those only atoms whose value
/// differs are replaced, so formatting such as `1.000000` survives.
use std::fmt;
use std::iter::once;
use tracing::debug;

use super::model::{Pool, PoolEntry, SubObject, Trilist, Vertex};
use super::{Document, Encoding};
use crate::syntax::{Block, Item, SyntaxTree, Token};

/// A value written into an atom
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Value {
    Num(f64),
    Int(usize),
    Hex(u32),
}

impl Value {
    /// Does the existing atom text already hold this value
    fn matches(&self, text: &str) -> bool {
        match self {
            Value::Num(v) => text.parse::<f64>().map_or(false, |t| t == *v),
            Value::Int(v) => text.parse::<usize>().map_or(false, |t| t == *v),
            Value::Hex(v) => u32::from_str_radix(text, 16).map_or(false, |t| t == *v),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(v) if *v == 0.0 => f.write_str("0"),
            Value::Num(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Hex(v) => write!(f, "{v:08x}"),
        }
    }
}

/// Make the atoms of `block` equal `values`
///
/// Matching atoms keep their text and whitespace, differing ones are
/// replaced in place, extra values are appended after the last atom and
/// surplus atoms are dropped.
pub(crate) fn set_values(block: &mut Block, values: &[Value]) {
    let atoms: Vec<usize> = block
        .items
        .iter()
        .enumerate()
        .filter(|(_, item)| matches!(item, Item::Atom(_)))
        .map(|(pos, _)| pos)
        .collect();

    for (value, &pos) in values.iter().zip(&atoms) {
        if let Item::Atom(token) = &mut block.items[pos] {
            if !value.matches(&token.text) {
                token.text = value.to_string();
            }
        }
    }

    if values.len() > atoms.len() {
        let insert_at = match atoms.last() {
            Some(&pos) => pos + 1,
            None => block
                .items
                .iter()
                .position(|item| matches!(item, Item::Block(_)))
                .unwrap_or(block.items.len()),
        };
        let extra = values[atoms.len()..]
            .iter()
            .map(|value| Item::Atom(Token::new(" ", value.to_string())));
        block.items.splice(insert_at..insert_at, extra);
    } else {
        for &pos in atoms[values.len()..].iter().rev() {
            block.items.remove(pos);
        }
    }
}

/// Replace the `n`th atom if it exists and differs
fn set_atom(block: &mut Block, n: usize, value: Value) {
    let nth = block
        .items
        .iter_mut()
        .filter_map(|item| match item {
            Item::Atom(token) => Some(token),
            Item::Block(_) => None,
        })
        .nth(n);
    if let Some(token) = nth {
        if !value.matches(&token.text) {
            token.text = value.to_string();
        }
    }
}

fn set_count(list: &mut Block, count: usize) {
    set_atom(list, 0, Value::Int(count));
}

/// A new entry shaped like the last one in `list`
fn entry_template(list: &Block, keyword: &str) -> Block {
    match list.blocks().last() {
        Some(last) => last.clone(),
        None => Block::inline(" ", keyword, &[]),
    }
}

/// Append an entry block, laying out a previously empty list over lines
pub(crate) fn append_entry(list: &mut Block, mut entry: Block) {
    if list.blocks().next().is_none() {
        let indent = list.indent().to_string();
        entry.keyword.trivia = format!("\n{indent}\t");
        list.close.trivia = format!("\n{indent}");
    }
    list.items.push(Item::Block(entry));
}

fn numbers<T: PoolEntry>(value: &T) -> Vec<Value> {
    value.to_numbers().into_iter().map(Value::Num).collect()
}

fn counted<I>(count: usize, values: I) -> Vec<Value>
where
    I: IntoIterator<Item = Value>,
{
    once(Value::Int(count)).chain(values).collect()
}

fn write_pool<T: PoolEntry>(tree: &mut SyntaxTree, pool: &Pool<T>) {
    if !pool.is_dirty() {
        return;
    }
    let Some(list) = tree.block_mut(&pool.path) else {
        return;
    };
    for &idx in &pool.dirty {
        if let Some(entry) = list.blocks_mut().nth(idx) {
            set_values(entry, &numbers(&pool.values[idx]));
        }
    }
    for value in &pool.values[pool.original_len..] {
        let mut entry = entry_template(list, T::KEYWORD);
        set_values(&mut entry, &numbers(value));
        append_entry(list, entry);
    }
    set_count(list, pool.values.len());
}

fn write_vertex(block: &mut Block, vertex: &Vertex) {
    set_values(
        block,
        &[
            Value::Hex(vertex.flags),
            Value::Int(vertex.point_idx),
            Value::Int(vertex.normal_idx),
            Value::Hex(vertex.colour1),
            Value::Hex(vertex.colour2),
        ],
    );
    let uvs = counted(
        vertex.uv_idxs.len(),
        vertex.uv_idxs.iter().map(|&uv| Value::Int(uv)),
    );
    match block.child_mut("vertex_uvs") {
        Some(list) => set_values(list, &uvs),
        None => {
            let mut list = Block::inline(" ", "vertex_uvs", &[]);
            set_values(&mut list, &uvs);
            block.items.push(Item::Block(list));
        }
    }
}

fn write_trilist(tree: &mut SyntaxTree, trilist: &Trilist) {
    let Some(block) = tree.block_mut(&trilist.path) else {
        return;
    };
    let data = &trilist.data;
    let triangles = data.triangle_count();
    if let Some(list) = block.child_mut("vertex_idxs") {
        let values = counted(
            data.vertex_idxs.len(),
            data.vertex_idxs.iter().map(|&v| Value::Int(v)),
        );
        set_values(list, &values);
    }
    if let Some(list) = block.child_mut("normal_idxs") {
        let values = counted(
            triangles,
            data.normal_idxs
                .iter()
                .flat_map(|&(idx, flag)| [Value::Int(idx), Value::Int(flag)]),
        );
        set_values(list, &values);
    }
    if let Some(list) = block.child_mut("flags") {
        let values = counted(triangles, data.flags.iter().map(|&f| Value::Hex(f)));
        set_values(list, &values);
    }
}

/// Face and index totals in `geometry_info`, plus the cullable_prims of a
/// single geometry node
fn write_geometry_info(block: &mut Block, triangles: usize, indices: usize) {
    set_atom(block, 0, Value::Int(triangles));
    set_atom(block, 3, Value::Int(indices));
    let Some(nodes) = block.child_mut("geometry_nodes") else {
        return;
    };
    if nodes.blocks().count() != 1 {
        return;
    }
    if let Some(cullable) = nodes
        .blocks_mut()
        .next()
        .and_then(|node| node.child_mut("cullable_prims"))
    {
        set_atom(cullable, 1, Value::Int(triangles));
        set_atom(cullable, 2, Value::Int(indices));
    }
}

fn write_sub_object(tree: &mut SyntaxTree, sub: &SubObject) {
    if !sub.is_dirty() {
        return;
    }

    if let Some(list) = tree.block_mut(&sub.vertices_path) {
        for &idx in &sub.dirty_vertices {
            if let Some(block) = list.blocks_mut().nth(idx) {
                write_vertex(block, &sub.vertices[idx]);
            }
        }
        for vertex in &sub.vertices[sub.original_vertex_count..] {
            let mut block = entry_template(list, "vertex");
            write_vertex(&mut block, vertex);
            append_entry(list, block);
        }
        set_count(list, sub.vertices.len());
    }

    if sub.vertex_sets_dirty {
        if let Some(list) = sub.vertex_sets_path.as_ref().and_then(|p| tree.block_mut(p)) {
            let existing = list.blocks().count();
            for (i, set) in sub.vertex_sets.iter().enumerate() {
                let values = [
                    Value::Int(set.vtx_state),
                    Value::Int(set.start),
                    Value::Int(set.count),
                ];
                if i < existing {
                    if let Some(block) = list.blocks_mut().nth(i) {
                        set_values(block, &values);
                    }
                } else {
                    let mut block = entry_template(list, "vertex_set");
                    set_values(&mut block, &values);
                    append_entry(list, block);
                }
            }
            set_count(list, sub.vertex_sets.len());
        }
    }

    let mut trilists_changed = false;
    for trilist in sub.trilists.iter().filter(|t| t.dirty) {
        write_trilist(tree, trilist);
        trilists_changed = true;
    }
    if trilists_changed {
        let triangles: usize = sub.trilists.iter().map(|t| t.data.triangle_count()).sum();
        let indices: usize = sub.trilists.iter().map(|t| t.data.vertex_idxs.len()).sum();
        if let Some(info) = sub.geometry_info_path.as_ref().and_then(|p| tree.block_mut(p)) {
            write_geometry_info(info, triangles, indices);
        }
    }
}

impl Document {
    /// Shape text with all edits applied
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        if self.bom {
            out.push('\u{feff}');
        }
        if self.is_modified() {
            let mut tree = self.tree.clone();
            write_pool(&mut tree, &self.points);
            write_pool(&mut tree, &self.uv_points);
            write_pool(&mut tree, &self.normals);
            for sub in self.lod_levels.iter().flat_map(|level| &level.submeshes) {
                write_sub_object(&mut tree, sub);
            }
            debug!("serialized modified shape");
            tree.write_to(&mut out);
        } else {
            self.tree.write_to(&mut out);
        }
        out
    }

    /// Serialized text encoded the way the source was
    pub fn to_bytes(&self) -> Vec<u8> {
        let text = self.serialize();
        match self.encoding {
            Encoding::Utf8 => text.into_bytes(),
            Encoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Encoding::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Normal, Point, UvPoint};
    use crate::shape::fixtures::TRACK_SHAPE;
    use crate::shape::SubMeshRef;
    use crate::syntax;
    use proptest::prelude::*;

    const QUAD: SubMeshRef = SubMeshRef {
        lod_dlevel: 200,
        submesh: 0,
    };

    #[test]
    fn test_round_trip_unmodified() {
        let doc = Document::parse(TRACK_SHAPE).unwrap();
        assert_eq!(doc.serialize(), TRACK_SHAPE);

        let crlf = TRACK_SHAPE.replace('\n', "\r\n");
        assert_eq!(Document::parse(&crlf).unwrap().serialize(), crlf);

        let bom = format!("\u{feff}{TRACK_SHAPE}");
        assert_eq!(Document::parse(&bom).unwrap().serialize(), bom);
    }

    #[test]
    fn test_to_bytes_restores_utf16() {
        let mut data = vec![0xff, 0xfe];
        data.extend(TRACK_SHAPE.encode_utf16().flat_map(u16::to_le_bytes));
        let doc = Document::parse_bytes(&data).unwrap();
        assert_eq!(doc.to_bytes(), data);
    }

    #[test]
    fn test_remove_triangle_rewrites_only_affected_lists() {
        let mut doc = Document::parse(TRACK_SHAPE).unwrap();
        doc.remove_triangle_between(QUAD.trilist(0), 0, 1, 2).unwrap();

        let expected = TRACK_SHAPE
            .replacen("vertex_idxs ( 6 0 1 2 1 2 3 )", "vertex_idxs ( 3 1 2 3 )", 1)
            .replacen("normal_idxs ( 2 0 3 0 3 )", "normal_idxs ( 1 0 3 )", 1)
            .replacen("flags ( 2 00000000 00000000 )", "flags ( 1 00000000 )", 1)
            .replacen("geometry_info ( 2 1 0 6 0 0 1", "geometry_info ( 1 1 0 3 0 0 1", 1)
            .replacen("cullable_prims ( 1 2 6 )", "cullable_prims ( 1 1 3 )", 1);
        assert_eq!(doc.serialize(), expected);
    }

    #[test]
    fn test_update_vertex_rewrites_single_point() {
        let mut doc = Document::parse(TRACK_SHAPE).unwrap();
        let mut record = doc.vertex(QUAD, 2).unwrap();
        record.point = Point::new(-1.0, 0.25, 10.0);
        doc.update_vertex(QUAD, &record).unwrap();

        let expected = TRACK_SHAPE.replacen("point ( -1 0 10 )", "point ( -1 0.25 10 )", 1);
        assert_eq!(doc.serialize(), expected);
    }

    #[test]
    fn test_unchanged_atoms_keep_their_formatting() {
        let text = TRACK_SHAPE.replacen("point ( -1 0 0 )", "point ( -1.000000 0.000000 0 )", 1);
        let mut doc = Document::parse(&text).unwrap();
        doc.set_point(0, Point::new(-1.0, 0.0, 5.0)).unwrap();
        let out = doc.serialize();
        assert!(out.contains("point ( -1.000000 0.000000 5 )"));
    }

    #[test]
    fn test_added_geometry_is_written() {
        let mut doc = Document::parse(TRACK_SHAPE).unwrap();
        let trilist = QUAD.trilist(0);
        let v = doc
            .add_vertex(QUAD, trilist, Point::new(0.0, 0.0, 20.0), UvPoint::new(0.5, 1.0), Normal::new(0.0, 1.0, 0.0))
            .unwrap();
        doc.insert_triangle_between(trilist, 2, 3, v).unwrap();
        let out = doc.serialize();

        assert!(out.contains("points ( 6"));
        assert!(out.contains("\t\tpoint ( 0 1 0 )\n\t\tpoint ( 0 0 20 )\n\t)"));
        assert!(out.contains("uv_point ( 0.5 1 )"));
        assert!(out.contains("normals ( 4"));
        assert!(out.contains("vector ( 0 -1 0 )"));
        assert!(out.contains("vertices ( 5"));
        assert!(out.contains("vertex ( 00000000 5 2 ff969696 ff808080"));
        assert!(out.contains("vertex_uvs ( 1 4 )"));
        assert!(out.contains("vertex_set ( 0 0 5 )"));
        assert!(out.contains("vertex_idxs ( 9 0 1 2 1 2 3 2 3 4 )"));
        assert!(out.contains("normal_idxs ( 3 0 3 0 3 3 3 )"));
        assert!(out.contains("flags ( 3 00000000 00000000 00000000 )"));
        assert!(out.contains("geometry_info ( 3 1 0 9"));
        assert!(out.contains("cullable_prims ( 1 3 9 )"));

        let reparsed = Document::parse(&out).unwrap();
        assert_eq!(reparsed.vertices(QUAD), doc.vertices(QUAD));
        assert_eq!(reparsed.trilist(trilist).unwrap(), doc.trilist(trilist).unwrap());
    }

    #[test]
    fn test_append_to_empty_list() {
        let mut tree = syntax::parse("shape (\n\tpoints ( 0 )\n)").unwrap();
        let list = tree.block_mut(&[0, 0]).unwrap();
        let mut entry = entry_template(list, "point");
        set_values(&mut entry, &[Value::Num(1.0), Value::Num(2.0), Value::Num(3.0)]);
        append_entry(list, entry);
        set_count(list, 1);
        assert_eq!(tree.to_string(), "shape (\n\tpoints ( 1\n\t\tpoint ( 1 2 3 )\n\t)\n)");
    }

    #[test]
    fn test_value_formatting() {
        assert_eq!(Value::Num(-0.0).to_string(), "0");
        assert_eq!(Value::Num(2.5).to_string(), "2.5");
        assert_eq!(Value::Hex(0xff969696).to_string(), "ff969696");
        assert!(Value::Num(1.0).matches("1.000000"));
        assert!(Value::Hex(0).matches("00000000"));
        assert!(!Value::Int(3).matches("three"));
    }

    proptest! {
        #[test]
        fn test_round_trip_with_varied_whitespace(
            gaps in prop::collection::vec(prop::sample::select(vec![" ", "  ", "\t", " \t "]), 1..64),
            crlf in any::<bool>(),
        ) {
            let mut text = String::new();
            let mut gap = gaps.iter().cycle();
            for ch in TRACK_SHAPE.chars() {
                match ch {
                    ' ' => text.push_str(gap.next().copied().unwrap_or(" ")),
                    '\n' if crlf => text.push_str("\r\n"),
                    other => text.push(other),
                }
            }
            let doc = Document::parse(&text).unwrap();
            prop_assert_eq!(doc.serialize(), text);
        }
    }
}
