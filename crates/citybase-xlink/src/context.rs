//! Shared resolver context.
//!
//! Factory and registry for the category resolvers plus the services they
//! all need: identifier resolution, sequence values, re-submission, event
//! propagation, payload streams, and the per-pass snapshots the two
//! self-referential categories probe. Resolvers are constructed lazily the
//! first time their category shows up and dispatched through one exhaustive
//! match: the work-item union is closed, so there is no open-ended dynamic
//! dispatch to get wrong.

use std::io::{self, Read};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use citybase_schema::{
    IdAllocator, ObjectTypeRegistry, Schema, SequenceKind, SqlDialect, SqlExecutor,
};

use crate::cache::{IdKind, IdLookup};
use crate::error::XlinkError;
use crate::events::EventSink;
use crate::item::{Xlink, XlinkCategory};
use crate::payload::PayloadOpener;
use crate::resolve::{IdResolver, Resolution};
use crate::resolver::{
    BasicResolver, DeprecatedMaterialResolver, GroupResolver, LibraryObjectResolver,
    SolidGeometryResolver, StatementLifecycle, SurfaceGeometryResolver,
    TextureAssociationResolver, TextureCoordResolver, TextureImageResolver, TextureParamResolver,
};
use crate::staging::{StagingMirror, StagingRegistry};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Database schema tables live in; empty means unqualified.
    pub schema: String,
    pub dialect: SqlDialect,
    pub worker_threads: usize,
    /// Overrides the dialect's batch limit when set.
    pub max_batch_size: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema: String::new(),
            dialect: SqlDialect::Postgres,
            worker_threads: 4,
            max_batch_size: None,
        }
    }
}

/// The collaborators a context is assembled from.
pub struct ContextParts {
    pub executor: Arc<dyn SqlExecutor>,
    pub cache: Arc<dyn IdLookup>,
    pub ids: Arc<dyn IdAllocator>,
    pub payloads: Arc<dyn PayloadOpener>,
    pub events: Arc<dyn EventSink>,
    pub types: ObjectTypeRegistry,
}

#[derive(Default)]
struct ResolverSet {
    basic: Option<Arc<BasicResolver>>,
    group: Option<Arc<GroupResolver>>,
    surface: Option<Arc<SurfaceGeometryResolver>>,
    solid: Option<Arc<SolidGeometryResolver>>,
    tex_coords: Option<Arc<TextureCoordResolver>>,
    tex_params: Option<Arc<TextureParamResolver>>,
    tex_assocs: Option<Arc<TextureAssociationResolver>>,
    tex_images: Option<Arc<TextureImageResolver>>,
    library: Option<Arc<LibraryObjectResolver>>,
    materials: Option<Arc<DeprecatedMaterialResolver>>,
}

impl ResolverSet {
    /// The constructed resolvers, in phase order.
    fn constructed(&self) -> Vec<Arc<dyn StatementLifecycle>> {
        let mut out: Vec<Arc<dyn StatementLifecycle>> = Vec::new();
        let mut push = |resolver: Option<Arc<dyn StatementLifecycle>>| {
            if let Some(resolver) = resolver {
                out.push(resolver);
            }
        };
        push(self.basic.clone().map(|r| r as _));
        push(self.group.clone().map(|r| r as _));
        push(self.tex_coords.clone().map(|r| r as _));
        push(self.tex_params.clone().map(|r| r as _));
        push(self.tex_images.clone().map(|r| r as _));
        push(self.tex_assocs.clone().map(|r| r as _));
        push(self.library.clone().map(|r| r as _));
        push(self.materials.clone().map(|r| r as _));
        push(self.surface.clone().map(|r| r as _));
        push(self.solid.clone().map(|r| r as _));
        out
    }
}

pub struct ResolverContext {
    executor: Arc<dyn SqlExecutor>,
    schema: Schema,
    dialect: SqlDialect,
    batch_size: usize,
    types: ObjectTypeRegistry,
    ids: Arc<dyn IdAllocator>,
    resolver: IdResolver,
    staging: Arc<StagingRegistry>,
    events: Arc<dyn EventSink>,
    payloads: Arc<dyn PayloadOpener>,
    set: Mutex<ResolverSet>,
    group_pass: RwLock<Option<Arc<StagingMirror>>>,
    geometry_pass: RwLock<Option<Arc<StagingMirror>>>,
}

impl ResolverContext {
    pub fn new(
        config: &EngineConfig,
        parts: ContextParts,
        staging: Arc<StagingRegistry>,
    ) -> Arc<Self> {
        let schema = Schema::named(config.schema.clone());
        let resolver = IdResolver::new(
            parts.cache,
            parts.executor.clone(),
            schema.clone(),
            config.dialect,
            parts.events.clone(),
        );
        Arc::new(Self {
            executor: parts.executor,
            schema,
            dialect: config.dialect,
            batch_size: config
                .max_batch_size
                .unwrap_or_else(|| config.dialect.max_batch_size()),
            types: parts.types,
            ids: parts.ids,
            resolver,
            staging,
            events: parts.events,
            payloads: parts.payloads,
            set: Mutex::new(ResolverSet::default()),
            group_pass: RwLock::new(None),
            geometry_pass: RwLock::new(None),
        })
    }

    // ------------------------------------------------------------------
    // Shared services
    // ------------------------------------------------------------------

    pub fn executor(&self) -> &dyn SqlExecutor {
        self.executor.as_ref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    pub fn resolve(
        &self,
        external_id: &str,
        kind: IdKind,
        force_db_lookup: bool,
    ) -> Result<Resolution, XlinkError> {
        self.resolver.resolve(external_id, kind, force_db_lookup)
    }

    pub fn next_value(&self, seq: SequenceKind) -> Result<i64, XlinkError> {
        Ok(self.ids.next_value(seq)?)
    }

    /// Queue an item for the next pass of its category.
    pub fn resubmit(&self, item: Xlink) {
        self.staging.defer(item);
    }

    pub fn warn(&self, message: &str) {
        self.events.warn(message);
    }

    pub fn open_payload(&self, uri: &str) -> io::Result<Box<dyn Read + Send>> {
        self.payloads.open(uri)
    }

    pub fn is_group_class(&self, class_id: i32) -> bool {
        self.types.is_group(class_id)
    }

    // ------------------------------------------------------------------
    // Pass snapshots
    // ------------------------------------------------------------------

    /// Install (or clear) the mirror of the pass currently replaying.
    pub fn set_pass_snapshot(&self, category: XlinkCategory, mirror: Option<Arc<StagingMirror>>) {
        match category {
            XlinkCategory::GroupMember => *self.group_pass.write() = mirror,
            XlinkCategory::SurfaceGeometry => *self.geometry_pass.write() = mirror,
            _ => {}
        }
    }

    /// Whether the geometry subtree rooted at `root_id` still has pending
    /// references in the current pass.
    pub fn pending_geometry_root(&self, root_id: i64) -> bool {
        self.geometry_pass
            .read()
            .as_ref()
            .map(|mirror| mirror.has_pending_root(root_id))
            .unwrap_or(false)
    }

    /// Whether `group_id` still owns a pending membership edge of the given
    /// direction in the current pass.
    pub fn pending_group_edge(&self, group_id: i64, is_parent: bool) -> bool {
        self.group_pass
            .read()
            .as_ref()
            .map(|mirror| mirror.has_pending_group_edge(group_id, is_parent))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Apply one work item through its category resolver.
    ///
    /// `Ok(false)` means the item was dropped after a warning; re-submission
    /// happens inside the resolver and reports `Ok(true)`.
    pub fn apply(&self, item: Xlink) -> Result<bool, XlinkError> {
        match item {
            Xlink::Basic(x) => self.basic().apply(self, &x),
            Xlink::GroupMember(x) => self.group().apply(self, &x),
            Xlink::SurfaceGeometry(x) => self.surface().apply(self, &x),
            Xlink::SolidGeometry(x) => self.solid().apply(self, &x),
            Xlink::TextureCoordList(x) => self.tex_coords().apply(self, &x),
            Xlink::TextureParam(x) => self.tex_params().apply(self, &x),
            Xlink::TextureAssociation(x) => self.tex_assocs().apply(self, &x),
            Xlink::TextureImage(x) => self.tex_images().apply(self, &x),
            Xlink::LibraryObject(x) => self.library().apply(self, &x),
            Xlink::DeprecatedMaterial(x) => self.materials().apply(self, &x),
        }
    }

    /// Run the image→surface-data link step, if any images were imported.
    pub fn link_texture_images(&self) -> Result<(), XlinkError> {
        let images = self.set.lock().tex_images.clone();
        match images {
            Some(images) => images.link_surface_data(self),
            None => Ok(()),
        }
    }

    /// Execute every buffered statement of every constructed resolver, in
    /// phase order.
    pub fn flush_all(&self) -> Result<(), XlinkError> {
        let resolvers = self.set.lock().constructed();
        for resolver in resolvers {
            resolver.flush(self)?;
        }
        Ok(())
    }

    /// Discard buffered state across every constructed resolver and drop
    /// the registry.
    pub fn release_all(&self) {
        let mut guard = self.set.lock();
        for resolver in guard.constructed() {
            resolver.release();
        }
        *guard = ResolverSet::default();
    }

    // ------------------------------------------------------------------
    // Lazy construction, one accessor per category
    // ------------------------------------------------------------------

    fn basic(&self) -> Arc<BasicResolver> {
        self.set
            .lock()
            .basic
            .get_or_insert_with(|| Arc::new(BasicResolver::new()))
            .clone()
    }

    fn group(&self) -> Arc<GroupResolver> {
        self.set
            .lock()
            .group
            .get_or_insert_with(|| Arc::new(GroupResolver::new(self)))
            .clone()
    }

    fn surface(&self) -> Arc<SurfaceGeometryResolver> {
        self.set
            .lock()
            .surface
            .get_or_insert_with(|| Arc::new(SurfaceGeometryResolver::new(self)))
            .clone()
    }

    fn solid(&self) -> Arc<SolidGeometryResolver> {
        self.set
            .lock()
            .solid
            .get_or_insert_with(|| Arc::new(SolidGeometryResolver::new(self)))
            .clone()
    }

    fn tex_coords(&self) -> Arc<TextureCoordResolver> {
        self.set
            .lock()
            .tex_coords
            .get_or_insert_with(|| Arc::new(TextureCoordResolver::new(self)))
            .clone()
    }

    fn tex_params(&self) -> Arc<TextureParamResolver> {
        self.set
            .lock()
            .tex_params
            .get_or_insert_with(|| Arc::new(TextureParamResolver::new(self)))
            .clone()
    }

    fn tex_assocs(&self) -> Arc<TextureAssociationResolver> {
        self.set
            .lock()
            .tex_assocs
            .get_or_insert_with(|| Arc::new(TextureAssociationResolver::new(self)))
            .clone()
    }

    fn tex_images(&self) -> Arc<TextureImageResolver> {
        self.set
            .lock()
            .tex_images
            .get_or_insert_with(|| Arc::new(TextureImageResolver::new(self)))
            .clone()
    }

    fn library(&self) -> Arc<LibraryObjectResolver> {
        self.set
            .lock()
            .library
            .get_or_insert_with(|| Arc::new(LibraryObjectResolver::new(self)))
            .clone()
    }

    fn materials(&self) -> Arc<DeprecatedMaterialResolver> {
        self.set
            .lock()
            .materials
            .get_or_insert_with(|| Arc::new(DeprecatedMaterialResolver::new(self)))
            .clone()
    }
}
