//! Per-category resolvers.
//!
//! One resolver per reference category, each owning its batched statements
//! behind a single mutex. The shared contract: `apply` returns whether the
//! item reached a terminal outcome (`false` means "dropped, already
//! warned"), re-submission goes through the context and counts as handled,
//! `flush` executes everything still buffered, and `release` discards
//! buffered state.

mod basic;
mod group;
mod image;
mod library;
mod material;
mod solid;
mod surface;
mod texture;

use crate::context::ResolverContext;
use crate::error::XlinkError;

/// Batched-statement lifecycle every category resolver shares.
pub(crate) trait StatementLifecycle: Send + Sync {
    /// Execute everything still buffered.
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError>;

    /// Discard buffered state without executing it.
    fn release(&self);
}

pub(crate) use basic::BasicResolver;
pub(crate) use group::GroupResolver;
pub(crate) use image::TextureImageResolver;
pub(crate) use library::LibraryObjectResolver;
pub(crate) use material::DeprecatedMaterialResolver;
pub(crate) use solid::SolidGeometryResolver;
pub(crate) use surface::SurfaceGeometryResolver;
pub(crate) use texture::{TextureAssociationResolver, TextureCoordResolver, TextureParamResolver};
