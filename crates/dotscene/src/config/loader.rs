//! # Loader Configuration
//!
//! Settings that govern how documents are located and which fallback values
//! the materializer applies when a document leaves something unspecified.
//!
//! Two layers exist:
//!
//! - [`LoaderConfig`]: policy shared by every resource a catalog creates
//!   (clip defaults, fallback camera, unhandled tag reporting).
//! - [`SceneOptions`]: creation-time settings for one named resource (file,
//!   name prefix, resource group, creation mode).

use serde::{Deserialize, Serialize};

use super::Config;
use crate::foundation::math::Vec3;

/// Group name that asks the resource manager to find the group holding a file
pub const AUTODETECT_RESOURCE_GROUP: &str = "Autodetect";

/// # Loader Configuration
///
/// Shared policy for all scene resources created by one catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Author recorded when the document has no `author` attribute
    pub default_author: String,
    /// Extension appended to a scene name when no file is given
    pub scene_file_extension: String,
    /// Near clip distance used when a clipping block omits `near`
    pub near_clip_distance: f32,
    /// Far clip distance used when a clipping block omits `far`
    pub far_clip_distance: f32,
    /// Near clip of the camera synthesized when no camera is available
    pub fallback_camera_near_clip: f32,
    /// Position of the synthesized camera, before unit conversion
    pub fallback_camera_position: [f32; 3],
    /// Point the synthesized camera looks at
    pub fallback_camera_look_at: [f32; 3],
    /// Default extents of static regions and instanced batches
    pub geometry_dimensions: [f32; 3],
    /// Log child elements no handler recognizes
    pub warn_on_unhandled_tags: bool,
}

impl LoaderConfig {
    /// Create a configuration with the standard defaults
    pub fn new() -> Self {
        Self {
            default_author: "iBIT".to_string(),
            scene_file_extension: ".scene".to_string(),
            near_clip_distance: 5.0,
            far_clip_distance: 5.0,
            fallback_camera_near_clip: 6.0,
            fallback_camera_position: [0.0, 10.0, -10.0],
            fallback_camera_look_at: [0.0, 0.0, 50.0],
            geometry_dimensions: [1_000_000.0; 3],
            warn_on_unhandled_tags: true,
        }
    }

    /// Set the fallback author
    pub fn with_default_author(mut self, author: impl Into<String>) -> Self {
        self.default_author = author.into();
        self
    }

    /// Set the default clip distances
    pub fn with_clip_distances(mut self, near: f32, far: f32) -> Self {
        self.near_clip_distance = near;
        self.far_clip_distance = far;
        self
    }

    /// Set the synthesized camera placement
    pub fn with_fallback_camera(mut self, position: Vec3, look_at: Vec3, near_clip: f32) -> Self {
        self.fallback_camera_position = position.into();
        self.fallback_camera_look_at = look_at.into();
        self.fallback_camera_near_clip = near_clip;
        self
    }

    /// Enable or disable unhandled tag warnings
    pub fn with_unhandled_tag_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_unhandled_tags = enabled;
        self
    }

    /// Synthesized camera position as a vector
    pub fn fallback_camera_position(&self) -> Vec3 {
        Vec3::from(self.fallback_camera_position)
    }

    /// Synthesized camera look-at point as a vector
    pub fn fallback_camera_look_at(&self) -> Vec3 {
        Vec3::from(self.fallback_camera_look_at)
    }

    /// Default geometry extents as a vector
    pub fn geometry_dimensions(&self) -> Vec3 {
        Vec3::from(self.geometry_dimensions)
    }

    /// File name used for a scene created without an explicit file
    pub fn default_file_for(&self, scene_name: &str) -> String {
        format!("{}{}", scene_name, self.scene_file_extension)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for LoaderConfig {}

/// Creation-time settings for a single scene resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneOptions {
    /// Document path inside the resource group; `None` derives it from the name
    pub file: Option<String>,
    /// Prefix applied to every created object's name
    pub prefix: String,
    /// Resource group holding the document
    pub group: String,
    /// Attach the scene root to the host graph once loaded (auto mode)
    pub visible: bool,
}

impl SceneOptions {
    /// Options with auto-detected group, no prefix, and auto visibility
    pub fn new() -> Self {
        Self {
            file: None,
            prefix: String::new(),
            group: AUTODETECT_RESOURCE_GROUP.to_string(),
            visible: true,
        }
    }

    /// Set the document path
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Set the object name prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the resource group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Choose between auto (visible) and manual creation mode
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self::new()
    }
}
