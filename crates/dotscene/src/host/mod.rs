//! Host engine boundary
//!
//! The loader never owns a renderer. Everything it creates lives in a host:
//! a [`SceneHost`] owning the scene graph and the named live objects, and a
//! [`RenderTarget`] exposing indexed viewports.
//!
//! ## Architecture
//!
//! ```text
//! SceneHost
//!   ├── SceneObjects (graph + one ObjectStore per object category)
//!   ├── resolution hooks (meshes, materials, particle templates)
//!   └── environment setters (ambient, fog, skies, shadows, world geometry)
//!
//! RenderTarget
//!   └── Viewport[i] -> camera name
//! ```
//!
//! [`memory::MemoryHost`] and [`memory::MemoryRenderTarget`] are complete
//! in-memory implementations used by tests and tools.

pub mod environment;
pub mod graph;
pub mod memory;
pub mod objects;
pub mod store;
pub mod viewport;

pub use environment::{
    Environment, Fog, FogMode, ShadowCameraSetup, ShadowSettings, ShadowTechnique,
    ShadowTextureSettings, SkyBox, SkyDome, SkyPlane, WorldGeometry,
};
pub use graph::{LookTarget, NodeGraph, SceneNode, TransformSpace};
pub use memory::{MemoryHost, MemoryRenderTarget};
pub use objects::*;
pub use store::ObjectStore;
pub use viewport::{Viewport, ViewportFeatures};

slotmap::new_key_type! {
    /// Handle of a scene graph node
    pub struct NodeId;
    /// Handle of a light
    pub struct LightId;
    /// Handle of a camera
    pub struct CameraId;
    /// Handle of an entity
    pub struct EntityId;
    /// Handle of a particle system
    pub struct ParticleSystemId;
    /// Handle of a billboard set
    pub struct BillboardSetId;
    /// Handle of a manual mesh
    pub struct MeshId;
    /// Handle of a render texture
    pub struct RenderTextureId;
    /// Handle of a static geometry batch
    pub struct StaticGeometryId;
    /// Handle of an instanced geometry batch
    pub struct InstancedGeometryId;
    /// Handle of a node animation
    pub struct AnimationId;
}

/// Errors reported by a host collaborator
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// A named object or resource does not exist
    #[error("{category} '{name}' not found")]
    NotFound {
        /// Object category
        category: &'static str,
        /// Requested name
        name: String,
    },

    /// An object with the same name already exists
    #[error("{category} '{name}' already exists")]
    Duplicate {
        /// Object category
        category: &'static str,
        /// Conflicting name
        name: String,
    },

    /// The host cannot perform the operation
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Host bookkeeping is inconsistent
    #[error("invalid host state: {0}")]
    InvalidState(String),
}

/// Render system features that change loader behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Far clip distance 0 means an infinite far plane
    pub infinite_far_plane: bool,
    /// Render to texture is done in hardware
    pub hw_render_to_texture: bool,
    /// Textures may have non power of two sizes
    pub non_power_of_two_textures: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            infinite_far_plane: true,
            hw_render_to_texture: true,
            non_power_of_two_textures: true,
        }
    }
}

/// Every live object the host manages
#[derive(Debug, Clone)]
pub struct SceneObjects {
    /// Scene graph
    pub graph: NodeGraph,
    /// Lights
    pub lights: ObjectStore<LightId, Light>,
    /// Cameras
    pub cameras: ObjectStore<CameraId, Camera>,
    /// Entities
    pub entities: ObjectStore<EntityId, Entity>,
    /// Particle systems
    pub particle_systems: ObjectStore<ParticleSystemId, ParticleSystem>,
    /// Billboard sets
    pub billboard_sets: ObjectStore<BillboardSetId, BillboardSet>,
    /// Manual meshes
    pub meshes: ObjectStore<MeshId, ManualMesh>,
    /// Render textures
    pub render_textures: ObjectStore<RenderTextureId, RenderTexture>,
    /// Static geometry batches
    pub static_geometries: ObjectStore<StaticGeometryId, StaticGeometry>,
    /// Instanced geometry batches
    pub instanced_geometries: ObjectStore<InstancedGeometryId, InstancedGeometry>,
    /// Node animations
    pub animations: ObjectStore<AnimationId, Animation>,
    /// Scene-wide rendering state
    pub environment: Environment,
}

impl SceneObjects {
    /// Empty object set with a bare root node
    pub fn new() -> Self {
        Self {
            graph: NodeGraph::new(),
            lights: ObjectStore::new("light"),
            cameras: ObjectStore::new("camera"),
            entities: ObjectStore::new("entity"),
            particle_systems: ObjectStore::new("particle system"),
            billboard_sets: ObjectStore::new("billboard set"),
            meshes: ObjectStore::new("mesh"),
            render_textures: ObjectStore::new("render texture"),
            static_geometries: ObjectStore::new("static geometry"),
            instanced_geometries: ObjectStore::new("instanced geometry"),
            animations: ObjectStore::new("animation"),
            environment: Environment::default(),
        }
    }

    /// Category and name of every movable object attached to `node`
    pub fn attached_to(&self, node: NodeId) -> Vec<(&'static str, String)> {
        let mut attached = Vec::new();
        macro_rules! collect {
            ($store:expr) => {
                for (key, object) in $store.iter() {
                    if object.movable.attached_to == Some(node) {
                        if let Some(name) = $store.name_of(key) {
                            attached.push(($store.category(), name.to_string()));
                        }
                    }
                }
            };
        }
        collect!(self.entities);
        collect!(self.lights);
        collect!(self.cameras);
        collect!(self.particle_systems);
        collect!(self.billboard_sets);
        attached
    }
}

impl Default for SceneObjects {
    fn default() -> Self {
        Self::new()
    }
}

/// Scene manager capability consumed by the materializer
///
/// Object creation and lookup go through [`SceneHost::objects_mut`]; the
/// remaining methods resolve external resources or change scene-wide state.
pub trait SceneHost {
    /// Scene manager name
    fn name(&self) -> &str;

    /// Engine version string
    fn version(&self) -> &str;

    /// Render system capabilities
    fn capabilities(&self) -> HostCapabilities;

    /// Live objects
    fn objects(&self) -> &SceneObjects;

    /// Mutable live objects
    fn objects_mut(&mut self) -> &mut SceneObjects;

    /// Load (or fetch) a mesh resource
    fn load_mesh(&mut self, mesh: &str, group: &str) -> Result<MeshInfo, HostError>;

    /// Whether a material is known
    fn has_material(&self, material: &str) -> bool;

    /// Load a material resource
    fn load_material(&mut self, material: &str, group: &str) -> Result<(), HostError>;

    /// Material used by a particle system template
    fn particle_template(&self, template: &str) -> Result<String, HostError>;

    /// Fail unless `material` is known
    fn resolve_material(&self, material: &str) -> Result<(), HostError> {
        if self.has_material(material) {
            Ok(())
        } else {
            Err(HostError::NotFound {
                category: "material",
                name: material.to_string(),
            })
        }
    }

    /// Set the ambient light colour
    fn set_ambient_light(&mut self, colour: crate::foundation::math::ColourValue) {
        self.objects_mut().environment.ambient_light = colour;
    }

    /// Set fog parameters
    fn set_fog(&mut self, fog: Fog) {
        self.objects_mut().environment.fog = fog;
    }

    /// Enable or disable the sky box
    fn set_sky_box(&mut self, sky: SkyBox) -> Result<(), HostError> {
        if sky.enabled {
            self.resolve_material(&sky.material)?;
        }
        self.objects_mut().environment.sky_box = Some(sky);
        Ok(())
    }

    /// Enable or disable the sky dome
    fn set_sky_dome(&mut self, sky: SkyDome) -> Result<(), HostError> {
        if sky.enabled {
            self.resolve_material(&sky.material)?;
        }
        self.objects_mut().environment.sky_dome = Some(sky);
        Ok(())
    }

    /// Enable or disable the sky plane
    fn set_sky_plane(&mut self, sky: SkyPlane) -> Result<(), HostError> {
        if sky.enabled {
            self.resolve_material(&sky.material)?;
        }
        self.objects_mut().environment.sky_plane = Some(sky);
        Ok(())
    }

    /// Replace the shadow configuration
    fn set_shadows(&mut self, shadows: ShadowSettings) {
        self.objects_mut().environment.shadows = shadows;
    }

    /// Load world geometry (terrain) from a data file
    fn set_world_geometry(&mut self, geometry: WorldGeometry) -> Result<(), HostError> {
        self.objects_mut().environment.world_geometry = Some(geometry);
        Ok(())
    }
}

/// Render target capability: indexed viewports bound to cameras
pub trait RenderTarget {
    /// Number of viewports
    fn viewport_count(&self) -> usize;

    /// Viewport at `index`
    fn viewport(&self, index: usize) -> Option<&Viewport>;

    /// Mutable viewport at `index`
    fn viewport_mut(&mut self, index: usize) -> Option<&mut Viewport>;

    /// Append a viewport, returning its index
    fn add_viewport(&mut self, viewport: Viewport) -> Result<usize, HostError>;

    /// Remove the viewport at `index`; later viewports move down one index
    fn remove_viewport(&mut self, index: usize) -> Option<Viewport>;

    /// Colour depth in bits per pixel
    fn colour_depth(&self) -> u32 {
        32
    }
}
