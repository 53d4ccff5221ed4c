//! Deferred work items.
//!
//! The streaming pass appends one `Xlink` whenever it hits a reference it
//! cannot satisfy on the spot; the splitter replays them after the pass.
//! The union is closed on purpose: the orchestrator and the resolver
//! registry both match it exhaustively, so adding a category is a compile
//! error everywhere it matters.

/// Reference categories, one staging area each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XlinkCategory {
    Basic,
    GroupMember,
    SurfaceGeometry,
    SolidGeometry,
    TextureCoordList,
    TextureParam,
    TextureAssociation,
    TextureImage,
    LibraryObject,
    DeprecatedMaterial,
}

impl XlinkCategory {
    /// Human-readable phase label for progress events.
    pub fn label(&self) -> &'static str {
        match self {
            XlinkCategory::Basic => "resolving feature references",
            XlinkCategory::GroupMember => "resolving group memberships",
            XlinkCategory::SurfaceGeometry => "resolving geometry references",
            XlinkCategory::SolidGeometry => "rebuilding solid geometries",
            XlinkCategory::TextureCoordList => "resolving texture coordinates",
            XlinkCategory::TextureParam => "resolving texture parameterizations",
            XlinkCategory::TextureAssociation => "resolving texture associations",
            XlinkCategory::TextureImage => "importing texture images",
            XlinkCategory::LibraryObject => "importing library objects",
            XlinkCategory::DeprecatedMaterial => "resolving legacy materials",
        }
    }
}

/// The feature-table column a resolved reference patches.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginColumn {
    pub table: String,
    pub column: String,
    pub row_id: i64,
}

/// Plain foreign-key patch: point `table.column` of `row_id` at the
/// referenced city object once it exists.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicXlink {
    pub row_id: i64,
    pub gml_id: String,
    pub table: String,
    pub column: String,
}

/// Group membership or group parent edge.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMemberXlink {
    pub group_id: i64,
    pub gml_id: String,
    pub role: Option<String>,
    pub is_parent: bool,
}

/// Deep-copy request for a shared geometry subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGeometryXlink {
    /// Pre-allocated row id the copy's root will be written under.
    pub id: i64,
    /// Aggregate row the copy hangs beneath; `None` for a standalone root.
    pub parent_id: Option<i64>,
    /// Root of the tree the copy belongs to. Equals `id` when standalone.
    pub root_id: i64,
    pub reverse: bool,
    pub gml_id: String,
    pub cityobject_id: Option<i64>,
    /// Set when the reference came from a feature column rather than from
    /// inside a geometry aggregate.
    pub origin: Option<OriginColumn>,
}

/// Rebuild the composed payload of a solid once its members are complete.
#[derive(Debug, Clone, PartialEq)]
pub struct SolidGeometryXlink {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureCoordListXlink {
    pub surface_data_id: i64,
    pub gml_id: String,
    pub coords: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureParamXlink {
    pub surface_data_id: i64,
    pub gml_id: String,
    pub world_to_texture: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureAssociationXlink {
    pub surface_data_id: i64,
    pub gml_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureImageXlink {
    pub surface_data_id: i64,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryObjectXlink {
    pub row_id: i64,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeprecatedMaterialXlink {
    pub appearance_id: i64,
    pub surface_data_id: i64,
    pub gml_id: String,
}

/// One deferred reference, tagged by category.
#[derive(Debug, Clone, PartialEq)]
pub enum Xlink {
    Basic(BasicXlink),
    GroupMember(GroupMemberXlink),
    SurfaceGeometry(SurfaceGeometryXlink),
    SolidGeometry(SolidGeometryXlink),
    TextureCoordList(TextureCoordListXlink),
    TextureParam(TextureParamXlink),
    TextureAssociation(TextureAssociationXlink),
    TextureImage(TextureImageXlink),
    LibraryObject(LibraryObjectXlink),
    DeprecatedMaterial(DeprecatedMaterialXlink),
}

impl Xlink {
    pub fn category(&self) -> XlinkCategory {
        match self {
            Xlink::Basic(_) => XlinkCategory::Basic,
            Xlink::GroupMember(_) => XlinkCategory::GroupMember,
            Xlink::SurfaceGeometry(_) => XlinkCategory::SurfaceGeometry,
            Xlink::SolidGeometry(_) => XlinkCategory::SolidGeometry,
            Xlink::TextureCoordList(_) => XlinkCategory::TextureCoordList,
            Xlink::TextureParam(_) => XlinkCategory::TextureParam,
            Xlink::TextureAssociation(_) => XlinkCategory::TextureAssociation,
            Xlink::TextureImage(_) => XlinkCategory::TextureImage,
            Xlink::LibraryObject(_) => XlinkCategory::LibraryObject,
            Xlink::DeprecatedMaterial(_) => XlinkCategory::DeprecatedMaterial,
        }
    }
}

/// Strip the leading reference marker (`#`) off an identifier, if present.
pub fn strip_reference_marker(external_id: &str) -> &str {
    external_id.strip_prefix('#').unwrap_or(external_id)
}

/// Whether a reference points outside the current document.
///
/// Local references are `#id` or a bare id; anything that still carries a
/// fragment separator after the leading marker is stripped, or that is an
/// absolute URI, targets another document.
pub fn is_remote_reference(external_id: &str) -> bool {
    let local = strip_reference_marker(external_id);
    local.contains('#') || local.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_marker_is_stripped_once() {
        assert_eq!(strip_reference_marker("#abc"), "abc");
        assert_eq!(strip_reference_marker("abc"), "abc");
        assert_eq!(strip_reference_marker("##abc"), "#abc");
    }

    #[test]
    fn remote_references_are_detected() {
        assert!(!is_remote_reference("#local_id"));
        assert!(!is_remote_reference("local_id"));
        assert!(is_remote_reference("other.gml#id"));
        assert!(is_remote_reference("https://example.org/doc.gml#id"));
        assert!(is_remote_reference("https://example.org/doc.gml"));
    }
}
