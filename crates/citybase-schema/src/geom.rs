//! Geometry payloads and their column codec.
//!
//! Leaf geometry rows store one polygon as JSON text; solid roots store the
//! composed shell collection the same way. The codec is the only place that
//! knows the column encoding, so swapping it for a binary form later touches
//! nothing in the engine.

use serde::{Deserialize, Serialize};

use crate::db::{DbError, SqlValue};

/// One polygon: a flat coordinate list per ring, `dim` values per point.
///
/// Ring 0 is the exterior; any further rings are interior holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub srid: i32,
    pub dim: usize,
    pub rings: Vec<Vec<f64>>,
}

impl Polygon {
    /// The same polygon with every ring's point order inverted.
    ///
    /// Dimension and SRID carry through unchanged.
    pub fn reversed(&self) -> Polygon {
        Polygon {
            srid: self.srid,
            dim: self.dim,
            rings: self
                .rings
                .iter()
                .map(|ring| reverse_ring(ring, self.dim))
                .collect(),
        }
    }
}

/// A solid composed from its member polygons, one ring list per member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solid {
    pub srid: i32,
    pub dim: usize,
    pub shells: Vec<Vec<Vec<f64>>>,
}

/// Invert a ring's point order, keeping each point's coordinate tuple intact.
///
/// Walks `dim`-sized groups from the end to the start; a trailing partial
/// group (malformed input) is dropped rather than reordered.
pub fn reverse_ring(coords: &[f64], dim: usize) -> Vec<f64> {
    if dim == 0 {
        return Vec::new();
    }
    let points = coords.len() / dim;
    let mut out = Vec::with_capacity(points * dim);
    for i in (0..points).rev() {
        out.extend_from_slice(&coords[i * dim..(i + 1) * dim]);
    }
    out
}

pub fn encode_polygon(polygon: &Polygon) -> Result<SqlValue, DbError> {
    let json = serde_json::to_string(polygon)
        .map_err(|e| DbError::new(format!("polygon encode: {e}")))?;
    Ok(SqlValue::Text(json))
}

/// Decode a geometry column; `NULL` means the row is an aggregate.
pub fn decode_polygon(value: &SqlValue) -> Result<Option<Polygon>, DbError> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Text(json) => serde_json::from_str(json)
            .map(Some)
            .map_err(|e| DbError::new(format!("polygon decode: {e}"))),
        other => Err(DbError::decode(format!("geometry column held {other:?}"))),
    }
}

pub fn encode_solid(solid: &Solid) -> Result<SqlValue, DbError> {
    let json =
        serde_json::to_string(solid).map_err(|e| DbError::new(format!("solid encode: {e}")))?;
    Ok(SqlValue::Text(json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reversal_walks_triples_back_to_front() {
        // Two 3D points: (1,2,3), (4,5,6).
        let ring = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(reverse_ring(&ring, 3), vec![4.0, 5.0, 6.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn reversal_preserves_tuple_grouping_in_2d() {
        let ring = vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0];
        assert_eq!(
            reverse_ring(&ring, 2),
            vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn trailing_partial_point_is_dropped() {
        let ring = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(reverse_ring(&ring, 3), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn polygon_reversal_keeps_srid_and_dim() {
        let p = Polygon {
            srid: 25833,
            dim: 3,
            rings: vec![vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0]],
        };
        let r = p.reversed();
        assert_eq!(r.srid, 25833);
        assert_eq!(r.dim, 3);
        assert_eq!(r.reversed(), p);
    }

    #[test]
    fn null_geometry_column_decodes_to_aggregate() {
        assert_eq!(decode_polygon(&SqlValue::Null).unwrap(), None);
        assert!(decode_polygon(&SqlValue::Integer(1)).is_err());
    }

    proptest! {
        #[test]
        fn reversal_is_an_involution(points in prop::collection::vec(
            (any::<f32>(), any::<f32>(), any::<f32>()), 0..64,
        )) {
            let ring: Vec<f64> = points
                .iter()
                .flat_map(|(x, y, z)| [*x as f64, *y as f64, *z as f64])
                .collect();
            let twice = reverse_ring(&reverse_ring(&ring, 3), 3);
            prop_assert_eq!(twice, ring);
        }
    }
}
