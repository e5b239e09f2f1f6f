//! # dotscene
//!
//! Loader, materializer and exporter for dotscene XML scene descriptions.
//!
//! ## Features
//!
//! - **Document parsing**: `scene` documents read into an element tree
//! - **Materialization**: nodes, entities, lights, cameras, particle systems,
//!   billboards, planes, animations and environment settings created in a host
//! - **Lifecycle**: named scene resources with load, unload and viewport restore
//! - **Properties**: user data recorded per object and queryable after load
//! - **Export**: loaded scenes written back out as documents
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotscene::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     dotscene::foundation::logging::init();
//!
//!     let mut host = MemoryHost::permissive();
//!     let mut target = MemoryRenderTarget::new();
//!     let resources = ResourceGroupManager::new().with_group(FileSystemGroup::new("General", "media"));
//!     let mut ctx = SceneContext::new(&mut host, &mut target, &resources);
//!
//!     let mut catalog = SceneCatalog::new(LoaderConfig::default());
//!     let scene = catalog.create_scene(&mut ctx, "level", SceneOptions::new().with_prefix("level_"))?;
//!     println!("{} objects loaded", scene.calculate_size());
//!
//!     catalog.destroy_all_scenes(&mut ctx)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod host;
pub mod resource;
pub mod scene;

/// Common imports for loader users
pub mod prelude {
    pub use crate::{
        config::{Config, LoaderConfig, SceneOptions},
        foundation::math::{ColourValue, Quat, Transform, Vec3},
        host::{MemoryHost, MemoryRenderTarget, RenderTarget, SceneHost, Viewport},
        resource::{FileSystemGroup, MemoryGroup, ResourceGroupManager},
        scene::{
            CatalogError, ExportError, PropertyCategory, SceneCatalog, SceneContext, SceneError, SceneResource,
        },
    };
}
