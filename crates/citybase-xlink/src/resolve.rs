//! Identifier resolution.
//!
//! Resolves an external identifier to an internal row id, chasing mapping
//! chains and composing orientation flags hop by hop. Resolution never
//! mutates the cache; the reversal flag on a returned entry is the XOR of
//! every flag seen along the chain, which is the only stateful part of the
//! contract.

use std::sync::Arc;

use citybase_schema::{Schema, SqlDialect, SqlExecutor, SqlValue};

use crate::cache::{IdKind, IdLookup, MappedEntry, ResolvedEntry};
use crate::error::XlinkError;
use crate::events::EventSink;
use crate::item::strip_reference_marker;

/// Mapping chains longer than this are treated as cyclic and abandoned.
/// Well-formed documents produce chains a handful of hops deep at most.
const MAX_MAPPING_HOPS: usize = 64;

/// Outcome of one lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedEntry),
    /// The chain ended in a mapping whose target is not cached yet; the
    /// caller may re-submit its work item and retry on a later pass.
    Deferred(MappedEntry),
    NotFound,
}

pub struct IdResolver {
    cache: Arc<dyn IdLookup>,
    executor: Arc<dyn SqlExecutor>,
    schema: Schema,
    dialect: SqlDialect,
    events: Arc<dyn EventSink>,
}

impl IdResolver {
    pub fn new(
        cache: Arc<dyn IdLookup>,
        executor: Arc<dyn SqlExecutor>,
        schema: Schema,
        dialect: SqlDialect,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            cache,
            executor,
            schema,
            dialect,
            events,
        }
    }

    /// Resolve `external_id` within the `kind` namespace.
    ///
    /// Geometry lookups never fall back to the database: a missing geometry
    /// id is either a legitimate implicit-geometry case or an error, and the
    /// caller decides which. City-object lookups fall back to a direct query
    /// against the committed object table when `force_db_lookup` is set,
    /// which is how references into earlier import runs resolve.
    pub fn resolve(
        &self,
        external_id: &str,
        kind: IdKind,
        force_db_lookup: bool,
    ) -> Result<Resolution, XlinkError> {
        let mut current = strip_reference_marker(external_id).to_string();
        let mut reverse = false;
        let mut last_mapping: Option<MappedEntry> = None;

        for _ in 0..MAX_MAPPING_HOPS {
            match self.cache.get(kind, &current) {
                Some(crate::cache::IdEntry::Resolved(entry)) => {
                    return Ok(Resolution::Resolved(ResolvedEntry {
                        reverse: entry.reverse ^ reverse,
                        ..entry
                    }));
                }
                Some(crate::cache::IdEntry::Mapped(mapping)) => {
                    reverse ^= mapping.reverse;
                    current = strip_reference_marker(&mapping.target).to_string();
                    last_mapping = Some(mapping);
                }
                None => {
                    if let Some(mapping) = last_mapping {
                        return Ok(Resolution::Deferred(mapping));
                    }
                    return self.unresolved(kind, force_db_lookup, &current, reverse);
                }
            }
        }

        self.events.warn(&format!(
            "identifier {external_id} exceeds {MAX_MAPPING_HOPS} mapping hops, giving up"
        ));
        Ok(Resolution::NotFound)
    }

    fn unresolved(
        &self,
        kind: IdKind,
        force_db_lookup: bool,
        external_id: &str,
        reverse: bool,
    ) -> Result<Resolution, XlinkError> {
        if kind != IdKind::CityObject || !force_db_lookup {
            return Ok(Resolution::NotFound);
        }

        let sql = self.dialect.select_city_object_by_gmlid(&self.schema);
        let rows = self
            .executor
            .query(&sql, &[SqlValue::Text(external_id.to_string())])?;
        let Some(row) = rows.first() else {
            return Ok(Resolution::NotFound);
        };

        let id = row
            .first()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| citybase_schema::DbError::decode("city_object.id"))?;
        let class_id = row
            .get(1)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| citybase_schema::DbError::decode("city_object.objectclass_id"))?;

        Ok(Resolution::Resolved(ResolvedEntry {
            id,
            root_id: id,
            class_id: class_id as i32,
            reverse,
        }))
    }
}
