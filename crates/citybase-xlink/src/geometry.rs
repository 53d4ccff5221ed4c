//! Transient geometry trees.
//!
//! A geometry subtree is read back from the database as flat rows (one
//! query per copy) and reassembled here, keyed by parent/child ids. The
//! tree only lives for the duration of one deep-copy; the resolver flattens
//! it straight back into rows.

use std::collections::HashMap;

use citybase_schema::geom::{decode_polygon, Polygon};
use citybase_schema::SqlRow;

use crate::error::XlinkError;

#[derive(Debug, Clone)]
pub struct GeometryNode {
    /// Source row id this node was read from.
    pub id: i64,
    pub gml_id: Option<String>,
    pub is_solid: bool,
    pub is_composite: bool,
    pub is_triangulated: bool,
    pub is_reverse: bool,
    /// `Some` for leaf rows, `None` for aggregates.
    pub payload: Option<Polygon>,
    pub children: Vec<GeometryNode>,
}

impl GeometryNode {
    /// Detach and return the node with row id `id`, consuming the tree.
    pub fn into_subtree(self, id: i64) -> Option<GeometryNode> {
        if self.id == id {
            return Some(self);
        }
        for child in self.children {
            if let Some(found) = child.into_subtree(id) {
                return Some(found);
            }
        }
        None
    }

    /// Flip the orientation of the whole subtree: every node's reversal
    /// flag toggles and every leaf payload's rings invert their point
    /// order.
    pub fn apply_reversal(&mut self) {
        self.is_reverse = !self.is_reverse;
        if let Some(payload) = &self.payload {
            self.payload = Some(payload.reversed());
        }
        for child in &mut self.children {
            child.apply_reversal();
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(GeometryNode::node_count).sum::<usize>()
    }

    /// Leaf payloads in depth-first order.
    pub fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Polygon>) {
        if let Some(payload) = &self.payload {
            out.push(payload);
        }
        for child in &self.children {
            child.collect_leaves(out);
        }
    }
}

struct FlatRow {
    id: i64,
    gml_id: Option<String>,
    parent_id: Option<i64>,
    is_solid: bool,
    is_composite: bool,
    is_triangulated: bool,
    is_reverse: bool,
    payload: Option<Polygon>,
}

fn decode_row(root_id: i64, row: &SqlRow) -> Result<FlatRow, XlinkError> {
    let corrupt = |reason: &str| XlinkError::CorruptSubtree {
        root_id,
        reason: reason.to_string(),
    };

    Ok(FlatRow {
        id: row
            .first()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| corrupt("row without id"))?,
        gml_id: row
            .get(1)
            .and_then(|v| v.as_opt_str())
            .ok_or_else(|| corrupt("bad gmlid column"))?
            .map(str::to_string),
        parent_id: row
            .get(2)
            .and_then(|v| v.as_opt_i64())
            .ok_or_else(|| corrupt("bad parent_id column"))?,
        is_solid: row
            .get(3)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| corrupt("bad is_solid column"))?,
        is_composite: row
            .get(4)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| corrupt("bad is_composite column"))?,
        is_triangulated: row
            .get(5)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| corrupt("bad is_triangulated column"))?,
        is_reverse: row
            .get(6)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| corrupt("bad is_reverse column"))?,
        payload: row
            .get(7)
            .map(decode_polygon)
            .transpose()?
            .flatten(),
    })
}

/// Reassemble the subtree query result (`ORDER BY id`) into a tree rooted
/// at `root_id`. Every row must be reachable from the root; anything else
/// means the hierarchy table is inconsistent.
pub fn build_subtree(root_id: i64, rows: &[SqlRow]) -> Result<GeometryNode, XlinkError> {
    let flats = rows
        .iter()
        .map(|row| decode_row(root_id, row))
        .collect::<Result<Vec<_>, _>>()?;

    let mut children_of: HashMap<i64, Vec<usize>> = HashMap::new();
    let mut root_index = None;
    for (index, flat) in flats.iter().enumerate() {
        if flat.id == root_id {
            root_index = Some(index);
        } else {
            let Some(parent) = flat.parent_id else {
                return Err(XlinkError::CorruptSubtree {
                    root_id,
                    reason: format!("row {} has no parent and is not the root", flat.id),
                });
            };
            children_of.entry(parent).or_default().push(index);
        }
    }

    let Some(root_index) = root_index else {
        return Err(XlinkError::CorruptSubtree {
            root_id,
            reason: "root row missing from its own subtree".to_string(),
        });
    };

    let mut attached = 0;
    let root = assemble(&flats, &children_of, root_index, &mut attached);
    if attached != flats.len() {
        return Err(XlinkError::CorruptSubtree {
            root_id,
            reason: format!(
                "{} of {} rows not reachable from the root",
                flats.len() - attached,
                flats.len()
            ),
        });
    }
    Ok(root)
}

fn assemble(
    flats: &[FlatRow],
    children_of: &HashMap<i64, Vec<usize>>,
    index: usize,
    attached: &mut usize,
) -> GeometryNode {
    *attached += 1;
    let flat = &flats[index];
    let children = children_of
        .get(&flat.id)
        .map(|indices| {
            indices
                .iter()
                .map(|&child| assemble(flats, children_of, child, attached))
                .collect()
        })
        .unwrap_or_default();

    GeometryNode {
        id: flat.id,
        gml_id: flat.gml_id.clone(),
        is_solid: flat.is_solid,
        is_composite: flat.is_composite,
        is_triangulated: flat.is_triangulated,
        is_reverse: flat.is_reverse,
        payload: flat.payload.clone(),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citybase_schema::geom::encode_polygon;
    use citybase_schema::SqlValue;

    fn polygon(x: f64) -> Polygon {
        Polygon {
            srid: 0,
            dim: 3,
            rings: vec![vec![x, 0.0, 0.0, x, 1.0, 0.0, x, 1.0, 1.0]],
        }
    }

    fn row(id: i64, parent: Option<i64>, payload: Option<&Polygon>) -> SqlRow {
        vec![
            SqlValue::Integer(id),
            SqlValue::Null,
            parent.into(),
            SqlValue::Integer(0),
            SqlValue::Integer(0),
            SqlValue::Integer(0),
            SqlValue::Integer(0),
            payload
                .map(|p| encode_polygon(p).unwrap())
                .unwrap_or(SqlValue::Null),
        ]
    }

    #[test]
    fn rows_reassemble_into_the_original_shape() {
        let leaf_a = polygon(1.0);
        let leaf_b = polygon(2.0);
        let rows = vec![
            row(1, None, None),
            row(2, Some(1), Some(&leaf_a)),
            row(3, Some(1), None),
            row(4, Some(3), Some(&leaf_b)),
        ];

        let tree = build_subtree(1, &rows).unwrap();
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.children.len(), 2);

        let mut leaves = Vec::new();
        tree.collect_leaves(&mut leaves);
        assert_eq!(leaves, vec![&leaf_a, &leaf_b]);
    }

    #[test]
    fn interior_nodes_detach_as_subtrees() {
        let leaf = polygon(1.0);
        let rows = vec![
            row(1, None, None),
            row(3, Some(1), None),
            row(4, Some(3), Some(&leaf)),
        ];

        let tree = build_subtree(1, &rows).unwrap();
        let sub = tree.into_subtree(3).unwrap();
        assert_eq!(sub.id, 3);
        assert_eq!(sub.node_count(), 2);
    }

    #[test]
    fn reversal_toggles_flags_and_ring_order() {
        let leaf = polygon(1.0);
        let rows = vec![row(1, None, None), row(2, Some(1), Some(&leaf))];
        let mut tree = build_subtree(1, &rows).unwrap();

        tree.apply_reversal();
        assert!(tree.is_reverse);
        assert_eq!(tree.children[0].payload.as_ref().unwrap(), &leaf.reversed());

        tree.apply_reversal();
        assert!(!tree.is_reverse);
        assert_eq!(tree.children[0].payload.as_ref().unwrap(), &leaf);
    }

    #[test]
    fn unreachable_rows_are_rejected() {
        let rows = vec![row(1, None, None), row(9, Some(8), None)];
        assert!(matches!(
            build_subtree(1, &rows),
            Err(XlinkError::CorruptSubtree { .. })
        ));
    }

    #[test]
    fn missing_root_is_rejected() {
        let rows = vec![row(2, Some(1), None)];
        assert!(matches!(
            build_subtree(1, &rows),
            Err(XlinkError::CorruptSubtree { .. })
        ));
    }
}
