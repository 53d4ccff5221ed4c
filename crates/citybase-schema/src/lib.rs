//! Citybase relational schema vocabulary
//!
//! This crate defines the shared vocabulary the import engine speaks against
//! the relational backend:
//!
//! - table names and schema qualification (`Schema`, [`table`])
//! - dialect-specific statement text and batch limits ([`SqlDialect`])
//! - the executor surface the engine writes through ([`db::SqlExecutor`])
//! - geometry payload types and their (de)serialization ([`geom`])
//! - sequence-value allocation ([`sequence`])
//!
//! It deliberately owns no connection handling and no statement execution;
//! those live behind the `SqlExecutor` trait so the engine can run against
//! any backend (or a test double) without caring about the driver.

pub mod db;
pub mod geom;
pub mod sequence;

use std::collections::BTreeSet;

pub use db::{DbError, SqlExecutor, SqlRow, SqlValue};
pub use geom::{Polygon, Solid};
pub use sequence::{IdAllocator, MemoryIdAllocator, SqlSequenceAllocator};

/// Table names of the import schema, unqualified.
pub mod table {
    pub const CITY_OBJECT: &str = "city_object";
    pub const CITY_OBJECT_GROUP: &str = "city_object_group";
    pub const GROUP_TO_CITY_OBJECT: &str = "group_to_city_object";
    pub const SURFACE_GEOMETRY: &str = "surface_geometry";
    pub const IMPLICIT_GEOMETRY: &str = "implicit_geometry";
    pub const APPEARANCE: &str = "appearance";
    pub const SURFACE_DATA: &str = "surface_data";
    pub const TEXTURE_PARAM: &str = "texture_param";
    pub const TEX_IMAGE: &str = "tex_image";
}

/// A database schema (namespace) tables are qualified with.
///
/// An empty schema leaves table names unqualified, which is what the
/// SQLite-flavored dialect expects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    name: Option<String>,
}

impl Schema {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name: if name.is_empty() { None } else { Some(name) },
        }
    }

    pub fn unqualified() -> Self {
        Self { name: None }
    }

    pub fn qualify(&self, table: &str) -> String {
        match &self.name {
            Some(schema) => format!("{schema}.{table}"),
            None => table.to_string(),
        }
    }
}

/// Database sequences the engine allocates values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SequenceKind {
    SurfaceGeometry,
    TexImage,
}

impl SequenceKind {
    pub fn sequence_name(&self) -> &'static str {
        match self {
            SequenceKind::SurfaceGeometry => "surface_geometry_seq",
            SequenceKind::TexImage => "tex_image_seq",
        }
    }
}

/// Schema-level object-class metadata, resolved once at startup.
///
/// The engine never hard-codes numeric class tags; callers construct the
/// registry from whatever their schema bootstrap reports.
#[derive(Debug, Clone, Default)]
pub struct ObjectTypeRegistry {
    group_classes: BTreeSet<i32>,
}

impl ObjectTypeRegistry {
    pub fn new(group_classes: impl IntoIterator<Item = i32>) -> Self {
        Self {
            group_classes: group_classes.into_iter().collect(),
        }
    }

    /// Whether `class_id` is (a subtype of) the city object group class.
    pub fn is_group(&self, class_id: i32) -> bool {
        self.group_classes.contains(&class_id)
    }
}

// ============================================================================
// Dialect
// ============================================================================

/// Statement text and limits per backend flavor.
///
/// Both flavors currently emit `?` placeholders; drivers that want numbered
/// placeholders rewrite them at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Postgres,
    Sqlite,
}

impl SqlDialect {
    /// Maximum number of buffered rows per batched statement before an
    /// automatic flush.
    pub fn max_batch_size(&self) -> usize {
        match self {
            SqlDialect::Postgres => 10_000,
            SqlDialect::Sqlite => 500,
        }
    }

    /// Statement allocating the next value of `seq`.
    ///
    /// The SQLite flavor relies on a `citybase_seq_next` scalar function the
    /// driver registers at connection time; SQLite has no native sequences.
    pub fn next_sequence_value(&self, schema: &Schema, seq: SequenceKind) -> String {
        match self {
            SqlDialect::Postgres => format!(
                "SELECT nextval('{}')",
                schema.qualify(seq.sequence_name())
            ),
            SqlDialect::Sqlite => {
                format!("SELECT citybase_seq_next('{}')", seq.sequence_name())
            }
        }
    }

    pub fn select_city_object_by_gmlid(&self, schema: &Schema) -> String {
        format!(
            "SELECT id, objectclass_id FROM {} WHERE gmlid = ?",
            schema.qualify(table::CITY_OBJECT)
        )
    }

    /// One query returning a whole geometry hierarchy, root row included.
    pub fn select_geometry_subtree(&self, schema: &Schema) -> String {
        format!(
            "SELECT id, gmlid, parent_id, is_solid, is_composite, is_triangulated, \
             is_reverse, geometry FROM {} WHERE root_id = ? ORDER BY id",
            schema.qualify(table::SURFACE_GEOMETRY)
        )
    }

    pub fn insert_surface_geometry(&self, schema: &Schema) -> String {
        format!(
            "INSERT INTO {} (id, gmlid, parent_id, root_id, is_solid, is_composite, \
             is_triangulated, is_xlink, is_reverse, cityobject_id, geometry) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            schema.qualify(table::SURFACE_GEOMETRY)
        )
    }

    pub fn update_xlink_marker(&self, schema: &Schema) -> String {
        format!(
            "UPDATE {} SET is_xlink = 1 WHERE id = ?",
            schema.qualify(table::SURFACE_GEOMETRY)
        )
    }

    pub fn update_solid_geometry(&self, schema: &Schema) -> String {
        format!(
            "UPDATE {} SET solid_geometry = ? WHERE id = ?",
            schema.qualify(table::SURFACE_GEOMETRY)
        )
    }

    /// Patch a single foreign-key column of an arbitrary origin table.
    pub fn update_reference_column(
        &self,
        schema: &Schema,
        origin_table: &str,
        column: &str,
    ) -> String {
        format!(
            "UPDATE {} SET {column} = ? WHERE id = ?",
            schema.qualify(origin_table)
        )
    }

    pub fn insert_group_member(&self, schema: &Schema) -> String {
        format!(
            "INSERT INTO {} (group_id, cityobject_id, role) VALUES (?, ?, ?)",
            schema.qualify(table::GROUP_TO_CITY_OBJECT)
        )
    }

    pub fn update_group_parent(&self, schema: &Schema) -> String {
        format!(
            "UPDATE {} SET parent_cityobject_id = ? WHERE id = ?",
            schema.qualify(table::CITY_OBJECT_GROUP)
        )
    }

    pub fn insert_texture_param(&self, schema: &Schema) -> String {
        format!(
            "INSERT INTO {} (surface_geometry_id, surface_data_id, \
             is_texture_parametrization, world_to_texture, texture_coordinates) \
             VALUES (?, ?, ?, ?, ?)",
            schema.qualify(table::TEXTURE_PARAM)
        )
    }

    pub fn select_texture_params_by_surface_data(&self, schema: &Schema) -> String {
        format!(
            "SELECT surface_geometry_id, is_texture_parametrization, world_to_texture, \
             texture_coordinates FROM {} WHERE surface_data_id = ?",
            schema.qualify(table::TEXTURE_PARAM)
        )
    }

    pub fn select_surface_data_by_gmlid(&self, schema: &Schema) -> String {
        format!(
            "SELECT id FROM {} WHERE gmlid = ?",
            schema.qualify(table::SURFACE_DATA)
        )
    }

    pub fn insert_tex_image(&self, schema: &Schema) -> String {
        format!(
            "INSERT INTO {} (id, image_uri, image_data) VALUES (?, ?, ?)",
            schema.qualify(table::TEX_IMAGE)
        )
    }

    pub fn update_surface_data_image(&self, schema: &Schema) -> String {
        format!(
            "UPDATE {} SET tex_image_id = ? WHERE id = ?",
            schema.qualify(table::SURFACE_DATA)
        )
    }

    pub fn update_library_object(&self, schema: &Schema) -> String {
        format!(
            "UPDATE {} SET library_object = ? WHERE id = ?",
            schema.qualify(table::IMPLICIT_GEOMETRY)
        )
    }
}
