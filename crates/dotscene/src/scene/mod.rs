//! Scene documents and their lifecycle
//!
//! A scene moves through these stages:
//!
//! 1. [`document`] parses the XML text into an [`Element`] tree
//! 2. the materializer walks the tree and creates host objects, recording
//!    them in [`SceneContents`]
//! 3. [`SceneResource`] ties both to a name and drives load and unload
//! 4. [`export`] writes a loaded scene back out as a document
//!
//! [`SceneCatalog`] keeps named resources and the current scene.

pub mod attributes;
pub mod catalog;
pub mod contents;
pub mod document;
pub mod error;
pub mod export;
pub(crate) mod materializer;
pub mod properties;
pub mod resource;
pub mod viewport_backup;

#[cfg(test)]
mod tests;

pub use catalog::SceneCatalog;
pub use contents::{EnvironmentBlocks, OctreeLayout, SceneContents, SceneSettings, UpAxis};
pub use document::{Document, Element};
pub use error::{
    CatalogError, DocumentCorrupt, ExportError, ObjectResolutionFailure, ReentrancyViolation, SceneError,
};
pub use properties::{NodeProperty, PropertyCategory, PropertyRegistry};
pub use resource::{ResourceState, SceneResource};
pub use viewport_backup::ViewportBackup;

use crate::host::{RenderTarget, SceneHost};
use crate::resource::ResourceGroupManager;

/// Everything a load or unload works against
///
/// Borrowed for the duration of one operation; scenes never keep a reference
/// to the host between calls.
pub struct SceneContext<'c> {
    /// Host that owns the created objects
    pub host: &'c mut dyn SceneHost,
    /// Render target whose viewports the scene configures
    pub target: &'c mut dyn RenderTarget,
    /// Where scene files are read from
    pub resources: &'c ResourceGroupManager,
}

impl<'c> SceneContext<'c> {
    /// Bundle a host, render target and resource groups
    pub fn new(
        host: &'c mut dyn SceneHost,
        target: &'c mut dyn RenderTarget,
        resources: &'c ResourceGroupManager,
    ) -> Self {
        Self {
            host,
            target,
            resources,
        }
    }
}

impl std::fmt::Debug for SceneContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneContext")
            .field("host", &self.host.name())
            .field("viewports", &self.target.viewport_count())
            .finish_non_exhaustive()
    }
}
