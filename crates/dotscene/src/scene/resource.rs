//! # Scene Resource
//!
//! One named, loadable scene. A resource owns the names of everything its
//! document created in the host and can release all of it again.
//!
//! ## Lifecycle
//!
//! ```text
//! Unloaded -> Loading -> Loaded -> Unloading -> Unloaded
//!                |
//!                +-- fatal error: partial objects released -> Unloaded
//! ```
//!
//! Loading snapshots the render target viewports, materializes the document,
//! picks a default camera and optionally attaches the scene root to the host
//! graph. Unloading destroys every owned object and puts the viewports back.

use std::path::Path;

use slotmap::Key;

use crate::config::{LoaderConfig, SceneOptions};
use crate::foundation::logging::{debug, error, info, warn};
use crate::host::{
    BillboardSet, Camera, Entity, HostError, Light, ManualMesh, NodeId, ObjectStore, ParticleSystem,
    RenderTarget, SceneHost, SceneNode,
};

use super::contents::{OctreeLayout, SceneContents};
use super::document::Document;
use super::error::{ExportError, ObjectResolutionFailure, ReentrancyViolation, SceneError};
use super::export;
use super::materializer::SceneMaterializer;
use super::properties::{NodeProperty, PropertyCategory, PropertyRegistry};
use super::viewport_backup::ViewportBackup;
use super::SceneContext;

/// Where a resource is in its load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Nothing is materialized
    Unloaded,
    /// The document is being materialized
    Loading,
    /// Every owned object is live
    Loaded,
    /// Owned objects are being released
    Unloading,
}

/// A named scene document and the host objects it created
#[derive(Debug, Clone)]
pub struct SceneResource {
    name: String,
    options: SceneOptions,
    file: String,
    group: String,
    config: LoaderConfig,
    state: ResourceState,
    contents: SceneContents,
    backup: ViewportBackup,
}

impl SceneResource {
    /// Unloaded resource named `name`
    ///
    /// The document path comes from the options, or from the name plus the
    /// configured scene file extension.
    pub fn new(name: impl Into<String>, options: SceneOptions, config: LoaderConfig) -> Self {
        let name = name.into();
        let file = options
            .file
            .clone()
            .unwrap_or_else(|| config.default_file_for(&name));
        Self {
            group: options.group.clone(),
            contents: SceneContents::new(&config),
            name,
            options,
            file,
            config,
            state: ResourceState::Unloaded,
            backup: ViewportBackup::new(),
        }
    }

    /// Resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Document path inside the resource group
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Resource group, resolved once the resource has been loaded
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Prefix applied to created object names
    pub fn prefix(&self) -> &str {
        &self.options.prefix
    }

    /// Creation-time options
    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    /// Current lifecycle state
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Whether the resource is loaded
    pub fn is_loaded(&self) -> bool {
        self.state == ResourceState::Loaded
    }

    /// Everything the last load recorded
    pub fn contents(&self) -> &SceneContents {
        &self.contents
    }

    /// Read the document and create its objects in the host
    ///
    /// A fatal error releases whatever was already created, restores the
    /// viewports and leaves the resource unloaded.
    pub fn load(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        if self.state == ResourceState::Loaded {
            return Err(ReentrancyViolation {
                root: self.contents.root_name().to_string(),
            }
            .into());
        }

        info!("Loading scene '{}' from '{}'", self.name, self.file);
        self.state = ResourceState::Loading;
        match self.materialize(ctx) {
            Ok(()) => {
                self.state = ResourceState::Loaded;
                info!(
                    "Loaded scene '{}': {} object(s), {} unresolved",
                    self.name,
                    self.contents.size(),
                    self.contents.resolution_failures().len()
                );
                Ok(())
            }
            Err(err) => {
                error!("Failed to load scene '{}': {err}", self.name);
                if let Err(release_err) = self.release(ctx) {
                    warn!("Cleanup after failed load of '{}' was incomplete: {release_err}", self.name);
                }
                self.state = ResourceState::Unloaded;
                Err(err)
            }
        }
    }

    fn materialize(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        self.contents.reset(&self.config);
        self.group = ctx.resources.resolve_group(&self.file, &self.options.group)?;
        let text = ctx.resources.open(&self.file, &self.group)?;
        let document = Document::parse(&text)?;
        let scene = document.scene()?;

        self.backup.capture(&*ctx.host, &*ctx.target)?;
        SceneMaterializer::new(
            &mut *ctx.host,
            &mut *ctx.target,
            &self.config,
            &mut self.contents,
            &self.name,
            &self.options.prefix,
            &self.group,
        )
        .materialize(scene)?;

        self.ensure_default_camera(ctx)?;
        if self.options.visible {
            self.set_visible(&mut *ctx.host, true)?;
        }
        Ok(())
    }

    /// Bind viewport 0 when the document did not name a default camera
    ///
    /// Preference order: the first camera the document created, the first
    /// camera already in the host, then a synthesized camera owned by this
    /// resource.
    fn ensure_default_camera(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), HostError> {
        if !self.contents.default_cameras().is_empty() {
            return Ok(());
        }

        let camera = if let Some(first) = self.contents.cameras().first() {
            first.clone()
        } else if let Some(existing) = first_host_camera(&*ctx.host) {
            debug!("Scene '{}' borrows host camera '{existing}'", self.name);
            existing
        } else {
            self.synthesize_camera(&mut *ctx.host)?
        };
        self.contents
            .set_default_camera(&*ctx.host, &mut *ctx.target, &camera, 0, 0)
    }

    fn synthesize_camera(&mut self, host: &mut dyn SceneHost) -> Result<String, HostError> {
        let name = format!("{}{}Camera", self.options.prefix, self.name);
        let mut camera = Camera {
            near_clip: self.config.fallback_camera_near_clip,
            position: self.config.fallback_camera_position() * self.contents.settings().unit_factor,
            ..Camera::default()
        };
        camera.look_at(self.config.fallback_camera_look_at());
        host.objects_mut().cameras.create(name.as_str(), camera)?;
        self.contents.cameras.push(name.clone());
        debug!("Synthesized camera '{name}'");
        Ok(name)
    }

    /// Destroy every owned object and restore the viewports
    pub fn unload(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        if self.state != ResourceState::Loaded {
            debug!("Scene '{}' is not loaded, nothing to unload", self.name);
            return Ok(());
        }
        info!("Unloading scene '{}'", self.name);
        self.state = ResourceState::Unloading;
        let result = self.release(ctx);
        self.state = ResourceState::Unloaded;
        result.map_err(SceneError::from)
    }

    fn release(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), HostError> {
        let contents = &self.contents;
        let objects = ctx.host.objects_mut();
        destroy_listed(&mut objects.entities, contents.static_entities());
        destroy_listed(&mut objects.entities, contents.dynamic_entities());
        destroy_listed(&mut objects.lights, contents.lights());
        destroy_listed(&mut objects.cameras, contents.cameras());
        destroy_listed(&mut objects.particle_systems, contents.particle_systems());
        destroy_listed(&mut objects.billboard_sets, contents.billboard_sets());
        destroy_listed(&mut objects.meshes, contents.meshes());
        destroy_listed(&mut objects.render_textures, contents.render_textures());
        destroy_listed(&mut objects.static_geometries, contents.static_geometries());
        destroy_listed(&mut objects.instanced_geometries, contents.instanced_geometries());
        destroy_listed(&mut objects.animations, contents.animations());

        for node in contents.nodes().iter().rev() {
            if let Err(err) = objects.graph.destroy(node) {
                debug!("Skipping node: {err}");
            }
        }
        if contents.root().is_some() {
            if let Err(err) = objects.graph.destroy(contents.root_name()) {
                debug!("Skipping scene root: {err}");
            }
        }

        self.contents.reset(&self.config);
        let restored = self.backup.restore(&mut *ctx.host, &mut *ctx.target);
        unbind_missing_cameras(&*ctx.host, &mut *ctx.target);
        restored
    }

    /// Attach or detach the scene root from the host graph
    pub fn set_visible(&self, host: &mut dyn SceneHost, visible: bool) -> Result<(), HostError> {
        let Some(root) = self.contents.root() else {
            return Ok(());
        };
        let graph = &mut host.objects_mut().graph;
        let attached = graph.get(root).and_then(|node| node.parent);
        match (visible, attached) {
            (true, None) => graph.add_child(graph.root(), root),
            (false, Some(parent)) => graph.remove_child(parent, root),
            _ => Ok(()),
        }
    }

    /// Whether the scene root is reachable from the host graph root
    pub fn is_visible(&self, host: &dyn SceneHost) -> bool {
        self.contents
            .root()
            .is_some_and(|root| host.objects().graph.is_in_scene_graph(root))
    }

    /// Scene root handle while loaded
    pub fn root_node(&self) -> Option<NodeId> {
        self.contents.root()
    }

    /// Node owned by this scene, the root included
    pub fn scene_node<'h>(&self, host: &'h dyn SceneHost, name: &str) -> Option<&'h SceneNode> {
        let owned = self.contents.root().is_some() && self.contents.root_name() == name
            || self.contents.nodes().iter().any(|node| node == name);
        if !owned {
            return None;
        }
        let graph = &host.objects().graph;
        graph.id(name).and_then(|id| graph.get(id))
    }

    /// Entity owned by this scene
    pub fn entity<'h>(&self, host: &'h dyn SceneHost, name: &str) -> Option<&'h Entity> {
        if self.contents.owns_entity(name) {
            host.objects().entities.by_name(name)
        } else {
            None
        }
    }

    /// Light owned by this scene
    pub fn light<'h>(&self, host: &'h dyn SceneHost, name: &str) -> Option<&'h Light> {
        owned(self.contents.lights(), &host.objects().lights, name)
    }

    /// Camera owned by this scene
    pub fn camera<'h>(&self, host: &'h dyn SceneHost, name: &str) -> Option<&'h Camera> {
        owned(self.contents.cameras(), &host.objects().cameras, name)
    }

    /// Billboard set owned by this scene
    pub fn billboard_set<'h>(&self, host: &'h dyn SceneHost, name: &str) -> Option<&'h BillboardSet> {
        owned(self.contents.billboard_sets(), &host.objects().billboard_sets, name)
    }

    /// Particle system owned by this scene
    pub fn particle_system<'h>(&self, host: &'h dyn SceneHost, name: &str) -> Option<&'h ParticleSystem> {
        owned(self.contents.particle_systems(), &host.objects().particle_systems, name)
    }

    /// Manual mesh owned by this scene
    pub fn mesh<'h>(&self, host: &'h dyn SceneHost, name: &str) -> Option<&'h ManualMesh> {
        owned(self.contents.meshes(), &host.objects().meshes, name)
    }

    /// External references, keyed by file
    pub fn externals(&self) -> &std::collections::BTreeMap<String, String> {
        self.contents.externals()
    }

    /// Octree layout declared by the document
    pub fn octree(&self) -> Option<&OctreeLayout> {
        self.contents.octree()
    }

    /// Every recorded property
    pub fn properties(&self) -> &PropertyRegistry {
        self.contents.properties()
    }

    /// Properties annotating `owner`
    pub fn properties_of<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a NodeProperty> + 'a {
        self.contents.properties().of_owner(owner)
    }

    /// Value of the latest `name` property of `owner`
    pub fn property(&self, owner: &str, name: &str) -> Option<&str> {
        self.contents.properties().value(owner, name)
    }

    /// Integer property
    pub fn property_int(&self, owner: &str, name: &str) -> Option<i64> {
        self.contents.properties().value_int(owner, name)
    }

    /// Real property
    pub fn property_real(&self, owner: &str, name: &str) -> Option<f32> {
        self.contents.properties().value_real(owner, name)
    }

    /// Boolean property; anything but a case-insensitive `true` is false
    pub fn property_bool(&self, owner: &str, name: &str) -> bool {
        self.contents.properties().value_bool(owner, name)
    }

    /// Properties of `category` called `name`, optionally with an exact value
    pub fn find_objects_by_property<'a>(
        &'a self,
        category: PropertyCategory,
        name: &'a str,
        value: &'a str,
    ) -> Vec<&'a NodeProperty> {
        self.contents.properties().find(category, name, value).collect()
    }

    /// Camera bound to `viewport`: the recorded default, else what the target shows
    pub fn default_camera(&self, target: &dyn RenderTarget, viewport: usize) -> Option<String> {
        self.contents
            .default_cameras()
            .get(&viewport)
            .cloned()
            .or_else(|| target.viewport(viewport).and_then(|v| v.camera.clone()))
    }

    /// Bind `camera` to `viewport`, adding the viewport when missing
    pub fn set_default_camera(
        &mut self,
        ctx: &mut SceneContext<'_>,
        camera: &str,
        viewport: usize,
        z_order: i32,
    ) -> Result<(), HostError> {
        self.contents
            .set_default_camera(&*ctx.host, &mut *ctx.target, camera, viewport, z_order)
    }

    /// Show bounding boxes on every owned node
    pub fn show_bounding_boxes(&self, host: &mut dyn SceneHost) {
        self.set_bounding_boxes(host, true);
    }

    /// Hide bounding boxes on every owned node
    pub fn hide_bounding_boxes(&self, host: &mut dyn SceneHost) {
        self.set_bounding_boxes(host, false);
    }

    fn set_bounding_boxes(&self, host: &mut dyn SceneHost, show: bool) {
        let graph = &mut host.objects_mut().graph;
        let root = self.contents.root().map(|_| self.contents.root_name());
        for name in root.into_iter().chain(self.contents.nodes().iter().map(String::as_str)) {
            if let Some(node) = graph.id(name).and_then(|id| graph.get_mut(id)) {
                node.show_bounding_box = show;
            }
        }
    }

    /// Display the skeleton of every owned skeletal entity
    pub fn show_skeletons(&self, host: &mut dyn SceneHost) {
        self.set_skeletons(host, true);
    }

    /// Hide the skeleton of every owned skeletal entity
    pub fn hide_skeletons(&self, host: &mut dyn SceneHost) {
        self.set_skeletons(host, false);
    }

    fn set_skeletons(&self, host: &mut dyn SceneHost, display: bool) {
        let entities = &mut host.objects_mut().entities;
        for name in self.contents.dynamic_entities() {
            if let Some(entity) = entities.by_name_mut(name) {
                if entity.has_skeleton() {
                    entity.display_skeleton = display;
                }
            }
        }
    }

    /// Number of names the scene holds across all categories
    pub fn calculate_size(&self) -> usize {
        self.contents.size()
    }

    /// Objects that loaded degraded or not at all
    pub fn resolution_failures(&self) -> &[ObjectResolutionFailure] {
        self.contents.resolution_failures()
    }

    /// `parent/child` tag pairs no handler recognized
    pub fn unhandled_tags(&self) -> &[String] {
        self.contents.unhandled_tags()
    }

    /// Serialize the loaded scene back to document text
    pub fn export_document(&self, host: &dyn SceneHost) -> Result<String, ExportError> {
        if !self.is_loaded() {
            return Err(ExportError::NotLoaded(self.name.clone()));
        }
        export::export_document(self, host)
    }

    /// Write the loaded scene to `path`
    pub fn export_to_file(&self, host: &dyn SceneHost, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let text = self.export_document(host)?;
        std::fs::write(path.as_ref(), text)?;
        info!("Exported scene '{}' to {}", self.name, path.as_ref().display());
        Ok(())
    }
}

/// Clear viewport cameras that no longer exist in the host
fn unbind_missing_cameras(host: &dyn SceneHost, target: &mut dyn RenderTarget) {
    let cameras = &host.objects().cameras;
    for index in 0..target.viewport_count() {
        if let Some(viewport) = target.viewport_mut(index) {
            if viewport.camera.as_deref().is_some_and(|camera| !cameras.contains(camera)) {
                debug!("Viewport {index} lost camera '{}'", viewport.camera.as_deref().unwrap_or_default());
                viewport.camera = None;
            }
        }
    }
}

fn first_host_camera(host: &dyn SceneHost) -> Option<String> {
    let cameras = &host.objects().cameras;
    cameras
        .first()
        .and_then(|id| cameras.name_of(id))
        .map(str::to_string)
}

fn owned<'h, K: Key, T>(list: &[String], store: &'h ObjectStore<K, T>, name: &str) -> Option<&'h T> {
    if list.iter().any(|listed| listed == name) {
        store.by_name(name)
    } else {
        None
    }
}

fn destroy_listed<K: Key, T>(store: &mut ObjectStore<K, T>, names: &[String]) {
    for name in names {
        if let Err(err) = store.destroy(name) {
            debug!("Skipping {}: {err}", store.category());
        }
    }
}
