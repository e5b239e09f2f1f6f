//! In-memory host
//!
//! A complete [`SceneHost`] and [`RenderTarget`] without a renderer behind
//! them. Meshes, materials and particle templates are registered up front
//! with the builder methods; anything not registered fails to resolve unless
//! the host is permissive.

use std::collections::{HashMap, HashSet};

use super::objects::MeshInfo;
use super::viewport::Viewport;
use super::{HostCapabilities, HostError, RenderTarget, SceneHost, SceneObjects};

/// Scene manager kept entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryHost {
    name: String,
    version: String,
    capabilities: HostCapabilities,
    objects: SceneObjects,
    materials: HashSet<String>,
    meshes: HashMap<String, MeshInfo>,
    particle_templates: HashMap<String, String>,
    permissive: bool,
}

impl MemoryHost {
    /// Empty host that resolves nothing
    pub fn new() -> Self {
        Self {
            name: "MemorySceneManager".to_string(),
            version: "1.0.0".to_string(),
            capabilities: HostCapabilities::default(),
            objects: SceneObjects::new(),
            materials: HashSet::new(),
            meshes: HashMap::new(),
            particle_templates: HashMap::new(),
            permissive: false,
        }
    }

    /// Resolve every mesh and material, as if all resources existed
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::new()
        }
    }

    /// Set the scene manager name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the reported engine version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the render system capabilities
    pub fn with_capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Register a material
    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.materials.insert(material.into());
        self
    }

    /// Register a mesh without a skeleton
    pub fn with_mesh(mut self, mesh: impl Into<String>) -> Self {
        self.meshes.insert(mesh.into(), MeshInfo { bones: Vec::new(), sub_mesh_count: 1 });
        self
    }

    /// Register a mesh with a skeleton made of `bones`
    pub fn with_skeletal_mesh(mut self, mesh: impl Into<String>, bones: &[&str]) -> Self {
        let info = MeshInfo {
            bones: bones.iter().map(|bone| (*bone).to_string()).collect(),
            sub_mesh_count: 1,
        };
        self.meshes.insert(mesh.into(), info);
        self
    }

    /// Register a particle template using `material`
    pub fn with_particle_template(mut self, template: impl Into<String>, material: impl Into<String>) -> Self {
        self.particle_templates.insert(template.into(), material.into());
        self
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneHost for MemoryHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn objects(&self) -> &SceneObjects {
        &self.objects
    }

    fn objects_mut(&mut self) -> &mut SceneObjects {
        &mut self.objects
    }

    fn load_mesh(&mut self, mesh: &str, _group: &str) -> Result<MeshInfo, HostError> {
        match self.meshes.get(mesh) {
            Some(info) => Ok(info.clone()),
            None if self.permissive => Ok(MeshInfo { bones: Vec::new(), sub_mesh_count: 1 }),
            None => Err(HostError::NotFound {
                category: "mesh",
                name: mesh.to_string(),
            }),
        }
    }

    fn has_material(&self, material: &str) -> bool {
        self.permissive || self.materials.contains(material)
    }

    fn load_material(&mut self, material: &str, _group: &str) -> Result<(), HostError> {
        self.resolve_material(material)
    }

    fn particle_template(&self, template: &str) -> Result<String, HostError> {
        match self.particle_templates.get(template) {
            Some(material) => Ok(material.clone()),
            None if self.permissive => Ok("BaseWhite".to_string()),
            None => Err(HostError::NotFound {
                category: "particle template",
                name: template.to_string(),
            }),
        }
    }
}

/// Render target kept entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryRenderTarget {
    viewports: Vec<Viewport>,
    colour_depth: u32,
}

impl MemoryRenderTarget {
    /// Target without viewports
    pub fn new() -> Self {
        Self {
            viewports: Vec::new(),
            colour_depth: 32,
        }
    }

    /// Set the colour depth in bits per pixel
    pub fn with_colour_depth(mut self, bits: u32) -> Self {
        self.colour_depth = bits;
        self
    }

    /// Append a viewport
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewports.push(viewport);
        self
    }

    /// All viewports in index order
    pub fn viewports(&self) -> &[Viewport] {
        &self.viewports
    }
}

impl Default for MemoryRenderTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTarget for MemoryRenderTarget {
    fn viewport_count(&self) -> usize {
        self.viewports.len()
    }

    fn viewport(&self, index: usize) -> Option<&Viewport> {
        self.viewports.get(index)
    }

    fn viewport_mut(&mut self, index: usize) -> Option<&mut Viewport> {
        self.viewports.get_mut(index)
    }

    fn add_viewport(&mut self, viewport: Viewport) -> Result<usize, HostError> {
        if self.viewports.iter().any(|existing| existing.z_order == viewport.z_order) {
            return Err(HostError::Duplicate {
                category: "viewport z-order",
                name: viewport.z_order.to_string(),
            });
        }
        self.viewports.push(viewport);
        Ok(self.viewports.len() - 1)
    }

    fn remove_viewport(&mut self, index: usize) -> Option<Viewport> {
        (index < self.viewports.len()).then(|| self.viewports.remove(index))
    }

    fn colour_depth(&self) -> u32 {
        self.colour_depth
    }
}
