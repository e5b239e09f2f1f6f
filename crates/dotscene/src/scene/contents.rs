//! What a loaded scene owns
//!
//! [`SceneContents`] is the bookkeeping side of a scene resource: the names
//! of every live object the load created (per category), the property
//! registry, scene-wide settings read from the document and the default
//! camera of each viewport. The live objects themselves belong to the host.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::config::LoaderConfig;
use crate::foundation::logging::debug;
use crate::foundation::math::{ColourValue, Vec3};
use crate::host::{HostError, NodeId, RenderTarget, SceneHost, Viewport};

use super::error::ObjectResolutionFailure;
use super::properties::PropertyRegistry;

/// Axis the document treats as up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpAxis {
    /// +X
    X,
    /// +Y
    #[default]
    Y,
    /// +Z
    Z,
}

impl UpAxis {
    /// Axis from the `upAxis` attribute; unknown values select Y
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "x" => Self::X,
            "z" => Self::Z,
            _ => Self::Y,
        }
    }

    /// Attribute spelling
    pub fn name(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }

    /// Unit vector along the axis
    pub fn vector(self) -> Vec3 {
        match self {
            Self::X => Vec3::x(),
            Self::Y => Vec3::y(),
            Self::Z => Vec3::z(),
        }
    }
}

/// Tool that produced the document, where it changes interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationPackage {
    /// Anything without a known quirk
    #[default]
    Generic,
    /// Maya exports light directions along the orientation's Z axis
    Maya,
}

/// Scene-wide values read from the document
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSettings {
    /// Multiplier applied to document positions
    pub unit_factor: f32,
    /// Ambient light colour
    pub ambient: ColourValue,
    /// Viewport background colour
    pub background: ColourValue,
    /// Near clip distance for cameras without their own clipping block
    pub near_clip: f32,
    /// Far clip distance for cameras without their own clipping block
    pub far_clip: f32,
    /// Up axis
    pub up_axis: UpAxis,
    /// Exporting tool quirks
    pub animation_package: AnimationPackage,
    /// Query flags entities get when they declare none
    pub query_flags: u32,
    /// Visibility flags entities get when they declare none
    pub visibility_flags: u32,
}

impl SceneSettings {
    /// Settings before any document value is applied
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            unit_factor: 1.0,
            ambient: ColourValue::WHITE,
            background: ColourValue::BLACK,
            near_clip: config.near_clip_distance,
            far_clip: config.far_clip_distance,
            up_axis: UpAxis::Y,
            animation_package: AnimationPackage::Generic,
            query_flags: 0,
            visibility_flags: 0,
        }
    }
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

bitflags! {
    /// Host-wide settings a document block applied
    ///
    /// Fog, skies, shadows and world geometry live in the shared host
    /// environment; these bits record which of them this scene set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EnvironmentBlocks: u16 {
        /// `fog`
        const FOG = 0x01;
        /// `skyBox`
        const SKY_BOX = 0x02;
        /// `skyDome`
        const SKY_DOME = 0x04;
        /// `skyPlane`
        const SKY_PLANE = 0x08;
        /// `clipping`
        const CLIPPING = 0x10;
        /// `shadows` or `shadow`
        const SHADOWS = 0x20;
        /// `terrain`
        const TERRAIN = 0x40;
    }
}

/// Spatial cell of a precomputed octree
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OctreeCell {
    /// Cell centre
    pub position: Vec3,
    /// Extent along X
    pub width: f32,
    /// Extent along Y
    pub height: f32,
    /// Extent along Z
    pub depth: f32,
    /// Nested cells
    pub children: Vec<OctreeCell>,
}

/// Element counts of one octree mesh in the binary file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OctreeGeometry {
    /// Byte offset of the mesh data
    pub binary_data_offset: u32,
    /// Vertices
    pub vertex_total: u32,
    /// Triangles
    pub triangle_total: u32,
    /// Normals
    pub normal_total: u32,
    /// Vertex colours
    pub colour_total: u32,
    /// Texture coordinate sets
    pub tex_sets: u32,
    /// Texture coordinates
    pub tex_total: u32,
}

/// Mesh stored in the octree binary file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OctreeMesh {
    /// Counts, when the document gives them
    pub geometry: Option<OctreeGeometry>,
    /// Material name
    pub material: String,
    /// Texture used by the material
    pub texture: String,
}

/// Octree section of a document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OctreeLayout {
    /// Binary file holding the mesh data
    pub bin_file: String,
    /// Top level cells
    pub cells: Vec<OctreeCell>,
    /// Meshes
    pub meshes: Vec<OctreeMesh>,
}

/// Names and facts owned by one loaded scene
#[derive(Debug, Clone, Default)]
pub struct SceneContents {
    pub(crate) root: Option<NodeId>,
    pub(crate) root_name: String,
    pub(crate) settings: SceneSettings,
    pub(crate) nodes: Vec<String>,
    pub(crate) static_entities: Vec<String>,
    pub(crate) dynamic_entities: Vec<String>,
    pub(crate) lights: Vec<String>,
    pub(crate) cameras: Vec<String>,
    pub(crate) billboard_sets: Vec<String>,
    pub(crate) particle_systems: Vec<String>,
    pub(crate) meshes: Vec<String>,
    pub(crate) render_textures: Vec<String>,
    pub(crate) static_geometries: Vec<String>,
    pub(crate) instanced_geometries: Vec<String>,
    pub(crate) animations: Vec<String>,
    pub(crate) externals: BTreeMap<String, String>,
    pub(crate) properties: PropertyRegistry,
    pub(crate) default_cameras: BTreeMap<usize, String>,
    pub(crate) octree: Option<OctreeLayout>,
    pub(crate) environment_blocks: EnvironmentBlocks,
    pub(crate) resolution_failures: Vec<ObjectResolutionFailure>,
    pub(crate) unhandled_tags: Vec<String>,
}

impl SceneContents {
    /// Empty contents with settings taken from `config`
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            settings: SceneSettings::new(config),
            ..Self::default()
        }
    }

    /// Forget everything, keeping nothing from the previous load
    pub fn reset(&mut self, config: &LoaderConfig) {
        *self = Self::new(config);
    }

    /// Root node handle while loaded
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Root node name while loaded
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Scene-wide settings
    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    /// Owned scene nodes, in creation order
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Entities created with `static="true"`
    pub fn static_entities(&self) -> &[String] {
        &self.static_entities
    }

    /// Entities created without `static="true"`
    pub fn dynamic_entities(&self) -> &[String] {
        &self.dynamic_entities
    }

    /// Lights
    pub fn lights(&self) -> &[String] {
        &self.lights
    }

    /// Cameras, including a synthesized fallback camera
    pub fn cameras(&self) -> &[String] {
        &self.cameras
    }

    /// Billboard sets
    pub fn billboard_sets(&self) -> &[String] {
        &self.billboard_sets
    }

    /// Particle systems
    pub fn particle_systems(&self) -> &[String] {
        &self.particle_systems
    }

    /// Manual meshes built for planes
    pub fn meshes(&self) -> &[String] {
        &self.meshes
    }

    /// Render textures
    pub fn render_textures(&self) -> &[String] {
        &self.render_textures
    }

    /// Static geometry batches
    pub fn static_geometries(&self) -> &[String] {
        &self.static_geometries
    }

    /// Instanced geometry batches
    pub fn instanced_geometries(&self) -> &[String] {
        &self.instanced_geometries
    }

    /// Node animations
    pub fn animations(&self) -> &[String] {
        &self.animations
    }

    /// External resources loaded for the scene, name to type
    pub fn externals(&self) -> &BTreeMap<String, String> {
        &self.externals
    }

    /// Property registry
    pub fn properties(&self) -> &PropertyRegistry {
        &self.properties
    }

    /// Camera recorded as default for each viewport index
    pub fn default_cameras(&self) -> &BTreeMap<usize, String> {
        &self.default_cameras
    }

    /// Octree layout, if the document had one
    pub fn octree(&self) -> Option<&OctreeLayout> {
        self.octree.as_ref()
    }

    /// Environment blocks the document applied to the host
    pub fn environment_blocks(&self) -> EnvironmentBlocks {
        self.environment_blocks
    }

    /// Objects that were skipped or degraded during the load
    pub fn resolution_failures(&self) -> &[ObjectResolutionFailure] {
        &self.resolution_failures
    }

    /// `parent/child` tag pairs no handler recognized
    pub fn unhandled_tags(&self) -> &[String] {
        &self.unhandled_tags
    }

    /// Whether `name` is one of this scene's entities
    pub fn owns_entity(&self, name: &str) -> bool {
        self.static_entities.iter().chain(&self.dynamic_entities).any(|n| n == name)
    }

    /// Total number of names held across every list
    pub fn size(&self) -> usize {
        self.nodes.len()
            + self.static_entities.len()
            + self.dynamic_entities.len()
            + self.lights.len()
            + self.cameras.len()
            + self.billboard_sets.len()
            + self.particle_systems.len()
            + self.meshes.len()
            + self.render_textures.len()
            + self.static_geometries.len()
            + self.instanced_geometries.len()
            + self.animations.len()
            + self.externals.len()
    }

    /// Make `camera` the default of viewport `viewport`
    ///
    /// An existing viewport is rebound; otherwise a viewport is added with
    /// `z_order` and the scene background, and the mapping is recorded under
    /// the index the target assigned.
    pub fn set_default_camera(
        &mut self,
        host: &dyn SceneHost,
        target: &mut dyn RenderTarget,
        camera: &str,
        viewport: usize,
        z_order: i32,
    ) -> Result<(), HostError> {
        if !host.objects().cameras.contains(camera) {
            return Err(HostError::NotFound {
                category: "camera",
                name: camera.to_string(),
            });
        }
        let index = match target.viewport_mut(viewport) {
            Some(existing) => {
                existing.camera = Some(camera.to_string());
                viewport
            }
            None => target.add_viewport(Viewport::new(camera, z_order).with_background(self.settings.background))?,
        };
        debug!("Camera '{camera}' is the default of viewport {index}");
        self.default_cameras.insert(index, camera.to_string());
        Ok(())
    }
}

/// Append `name` unless the list already holds it
pub(crate) fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|existing| existing == name) {
        list.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Camera, MemoryHost, MemoryRenderTarget};

    #[test]
    fn test_up_axis_names() {
        assert_eq!(UpAxis::from_name("Z"), UpAxis::Z);
        assert_eq!(UpAxis::from_name("x"), UpAxis::X);
        assert_eq!(UpAxis::from_name("w"), UpAxis::Y);
        assert_eq!(UpAxis::Z.vector(), Vec3::z());
    }

    #[test]
    fn test_push_unique() {
        let mut list = Vec::new();
        push_unique(&mut list, "a");
        push_unique(&mut list, "b");
        push_unique(&mut list, "a");
        assert_eq!(list, vec!["a", "b"]);
    }

    #[test]
    fn test_default_camera_adds_viewport_with_background() {
        let mut host = MemoryHost::new();
        host.objects_mut().cameras.create("Cam", Camera::default()).unwrap();
        let mut target = MemoryRenderTarget::new();

        let mut contents = SceneContents::new(&LoaderConfig::default());
        contents.settings.background = ColourValue::rgb(0.2, 0.2, 0.2);
        contents.set_default_camera(&host, &mut target, "Cam", 0, 0).unwrap();

        assert_eq!(target.viewports().len(), 1);
        assert_eq!(target.viewports()[0].camera.as_deref(), Some("Cam"));
        assert_eq!(target.viewports()[0].background, ColourValue::rgb(0.2, 0.2, 0.2));
        assert_eq!(contents.default_cameras().get(&0).map(String::as_str), Some("Cam"));
    }

    #[test]
    fn test_default_camera_rebinds_existing_viewport() {
        let mut host = MemoryHost::new();
        host.objects_mut().cameras.create("Old", Camera::default()).unwrap();
        host.objects_mut().cameras.create("New", Camera::default()).unwrap();
        let mut target = MemoryRenderTarget::new().with_viewport(Viewport::new("Old", 0));

        let mut contents = SceneContents::default();
        contents.set_default_camera(&host, &mut target, "New", 0, 5).unwrap();
        assert_eq!(target.viewports().len(), 1);
        assert_eq!(target.viewports()[0].camera.as_deref(), Some("New"));
        assert_eq!(target.viewports()[0].z_order, 0);
    }

    #[test]
    fn test_default_camera_must_exist() {
        let host = MemoryHost::new();
        let mut target = MemoryRenderTarget::new();
        let mut contents = SceneContents::default();
        let err = contents.set_default_camera(&host, &mut target, "Ghost", 0, 0).unwrap_err();
        assert!(matches!(err, HostError::NotFound { category: "camera", .. }));
        assert!(contents.default_cameras().is_empty());
    }

    #[test]
    fn test_size_counts_every_list() {
        let mut contents = SceneContents::default();
        contents.nodes.push("n".into());
        contents.lights.push("l".into());
        contents.externals.insert("Rock".into(), "material".into());
        assert_eq!(contents.size(), 3);
    }
}
