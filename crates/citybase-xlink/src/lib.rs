//! Citybase deferred-reference resolution engine
//!
//! A streaming import of a city document cannot resolve every reference the
//! moment it sees one: targets may appear later in the stream, live in rows
//! committed by an earlier run, or sit inside a reference cycle. This crate
//! is the component that records those references during the pass and
//! replays them afterwards:
//!
//! ```text
//! streaming pass ──append──► staging areas (one per category)
//!                                   │
//!                               Splitter ──► worker pool ──► category resolvers
//!                                   ▲                              │
//!                                   └──── re-submission ◄──────────┤
//!                                                                  ▼
//!                                                      batched SQL mutations
//! ```
//!
//! The two self-referential categories (group membership, surface geometry)
//! replay through a fix-point loop with an explicit non-progress cycle
//! detector; surface geometry references resolve into deep copies of whole
//! row trees, with orientation flips composed by XOR along the identifier
//! chain.

pub mod batch;
pub mod cache;
pub mod context;
pub mod error;
pub mod events;
pub mod geometry;
pub mod item;
pub mod payload;
pub mod pool;
pub mod resolve;
mod resolver;
pub mod splitter;
pub mod staging;

pub use cache::{IdEntry, IdKind, IdLookup, MappedEntry, MemoryIdCache, ResolvedEntry};
pub use context::{ContextParts, EngineConfig, ResolverContext};
pub use error::XlinkError;
pub use events::{CancelToken, EventSink, NullSink, TracingSink};
pub use item::{
    BasicXlink, DeprecatedMaterialXlink, GroupMemberXlink, LibraryObjectXlink, OriginColumn,
    SolidGeometryXlink, SurfaceGeometryXlink, TextureAssociationXlink, TextureCoordListXlink,
    TextureImageXlink, TextureParamXlink, Xlink, XlinkCategory,
};
pub use payload::{FilePayloadOpener, PayloadOpener};
pub use resolve::{IdResolver, Resolution};
pub use splitter::Splitter;
pub use staging::{StagingArea, StagingMirror, StagingRegistry};
