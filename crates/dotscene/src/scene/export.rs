//! Document export
//!
//! Rebuilds a `scene` document from the live objects a loaded
//! [`SceneResource`] owns and writes it as indented XML.
//!
//! Names are written without the resource prefix, so loading the output with
//! the same prefix recreates the same names. Properties the loader records on
//! its own (scene metadata, `isTarget`, `ambientOnly`) are written back as the
//! attributes they came from; everything else goes out as `userData`.
//!
//! Host-wide settings (fog, skies, clipping, shadows and terrain) are written
//! only when this scene's document set them. Octree layouts, render textures,
//! flag declarations and static and instanced geometries go out alongside the
//! node tree.

use std::collections::{HashMap, HashSet};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use slotmap::Key;

use crate::foundation::logging::debug;
use crate::foundation::math::{constants, utils, ColourValue, FloatRect, Plane, Quat, Transform, Vec3};
use crate::host::{
    Animation, BatchedGeometry, BillboardOrigin, BillboardRotation, BillboardSet, BillboardType, BufferPolicy,
    BufferUsage, Camera, Entity, Fog, FogMode, Light, LightKind, LookTarget, MovableSettings, NodeId,
    ObjectStore, ParticleSystem, ProjectionType, RenderTexture, SceneHost, SceneObjects, ShadowCameraSetup,
    ShadowSettings, ShadowTextureSettings, SkeletonBlendMode, SkyBox, SkyDome, SkyPlane, TextureType,
    TransformSpace,
};

use super::attributes;
use super::contents::{EnvironmentBlocks, OctreeCell, OctreeMesh, SceneContents};
use super::document::{Element, SCENE_TAG};
use super::error::ExportError;
use super::properties::{NodeProperty, PropertyCategory};
use super::resource::SceneResource;

/// Scene attributes the loader records as properties
const SCENE_METADATA: [&str; 10] = [
    "formatVersion",
    "id",
    "minOgreVersion",
    "author",
    "sceneManager",
    "upAxis",
    "unitsPerMeter",
    "unitType",
    "ogreMaxVersion",
    "application",
];

/// Serialize a loaded scene to document text
pub(crate) fn export_document(scene: &SceneResource, host: &dyn SceneHost) -> Result<String, ExportError> {
    let root = Exporter::new(scene, host.objects()).scene();
    write_document(&root)
}

/// Write `root` as an indented XML document
pub fn write_document(root: &Element) -> Result<String, ExportError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    write_element(&mut writer, root)?;
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), ExportError> {
    let mut start = BytesStart::new(element.tag());
    for attribute in element.attributes() {
        start.push_attribute(attribute);
    }
    if element.children().is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }
    writer.write_event(Event::Start(start.borrow())).map_err(xml_error)?;
    for child in element.children() {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.tag())))
        .map_err(xml_error)
}

fn xml_error(error: impl std::fmt::Display) -> ExportError {
    ExportError::Xml(error.to_string())
}

struct Exporter<'a> {
    scene: &'a SceneResource,
    contents: &'a SceneContents,
    objects: &'a SceneObjects,
    /// Plane node to the plane mesh it displays
    planes: HashMap<NodeId, &'a str>,
    /// Nodes created for bone attachments
    bone_nodes: HashSet<NodeId>,
}

impl<'a> Exporter<'a> {
    fn new(scene: &'a SceneResource, objects: &'a SceneObjects) -> Self {
        let contents = scene.contents();
        let planes = contents
            .meshes()
            .iter()
            .filter_map(|mesh| {
                objects
                    .graph
                    .id(&format!("{mesh}Node"))
                    .map(|node| (node, mesh.as_str()))
            })
            .collect();
        let bone_nodes = owned_entities(contents)
            .filter_map(|name| objects.entities.by_name(name))
            .flat_map(|entity| entity.bone_attachments.iter().map(|attachment| attachment.node))
            .collect();
        Self {
            scene,
            contents,
            objects,
            planes,
            bone_nodes,
        }
    }

    /// Name as written in the document
    fn local<'n>(&self, name: &'n str) -> &'n str {
        name.strip_prefix(self.scene.prefix()).unwrap_or(name)
    }

    fn scene(&self) -> Element {
        let owner = self.scene.name();
        let mut scene = Element::new(SCENE_TAG);
        for name in SCENE_METADATA {
            let metadata = self
                .contents
                .properties()
                .of_owner(owner)
                .find(|p| p.category == PropertyCategory::Scene && p.name == name);
            if let Some(property) = metadata {
                scene.push_attribute(name, property.value.as_str());
            }
        }

        if let Some(environment) = self.environment() {
            scene.push_child(environment);
        }
        if let Some(terrain) = self.terrain() {
            scene.push_child(terrain);
        }
        if let Some(octree) = self.octree() {
            scene.push_child(octree);
        }
        if let Some(externals) = self.externals() {
            scene.push_child(externals);
        }
        if let Some(nodes) = self.container() {
            scene.push_child(nodes);
        }

        // Only one scene-level light and camera are read back
        if let Some((name, light)) = attached(self.contents.lights(), &self.objects.lights, None, |l| &l.movable)
            .into_iter()
            .next()
        {
            scene.push_child(self.light(name, light));
        }
        let synthesized = format!("{}{}Camera", self.scene.prefix(), owner);
        if let Some((name, camera)) = attached(self.contents.cameras(), &self.objects.cameras, None, |c| &c.movable)
            .into_iter()
            .find(|(name, _)| *name != synthesized)
        {
            scene.push_child(self.camera(name, camera));
        }

        if let Some(textures) = self.render_textures() {
            scene.push_child(textures);
        }
        let settings = self.contents.settings();
        if let Some(flags) = flag_block("queryFlags", "queryFlag", settings.query_flags) {
            scene.push_child(flags);
        }
        if let Some(flags) = flag_block("visibilityFlags", "visibilityFlag", settings.visibility_flags) {
            scene.push_child(flags);
        }
        if let Some(geometries) = self.static_geometries() {
            scene.push_child(geometries);
        }
        if let Some(geometries) = self.instanced_geometries() {
            scene.push_child(geometries);
        }

        self.push_user_data(&mut scene, owner, PropertyCategory::Scene);
        scene
    }

    fn environment(&self) -> Option<Element> {
        let settings = self.contents.settings();
        let blocks = self.contents.environment_blocks();
        let host = &self.objects.environment;
        let mut environment = Element::new("environment");
        if blocks.contains(EnvironmentBlocks::FOG) {
            environment.push_child(self.fog(&host.fog));
        }
        if let Some(sky) = host.sky_box.as_ref().filter(|_| blocks.contains(EnvironmentBlocks::SKY_BOX)) {
            environment.push_child(self.sky_box(sky));
        }
        if let Some(sky) = host.sky_dome.as_ref().filter(|_| blocks.contains(EnvironmentBlocks::SKY_DOME)) {
            environment.push_child(self.sky_dome(sky));
        }
        if let Some(sky) = host.sky_plane.as_ref().filter(|_| blocks.contains(EnvironmentBlocks::SKY_PLANE)) {
            environment.push_child(self.sky_plane(sky));
        }
        if blocks.contains(EnvironmentBlocks::CLIPPING) {
            environment.push_child(
                Element::new("clipping")
                    .with_attribute("near", settings.near_clip.to_string())
                    .with_attribute("far", settings.far_clip.to_string()),
            );
        }
        if settings.ambient != ColourValue::WHITE {
            environment.push_child(colour("colourAmbient", settings.ambient));
        }
        if settings.background != ColourValue::BLACK {
            environment.push_child(colour("colourBackground", settings.background));
        }
        if blocks.contains(EnvironmentBlocks::SHADOWS) {
            environment.push_child(shadows(&host.shadows));
        }
        self.push_user_data(&mut environment, self.scene.name(), PropertyCategory::Environment);
        (!environment.children().is_empty()).then_some(environment)
    }

    fn fog(&self, fog: &Fog) -> Element {
        let mode = match fog.mode {
            FogMode::None => "none",
            FogMode::Exp => "exp",
            FogMode::Exp2 => "exp2",
            FogMode::Linear => "linear",
        };
        let mut element = Element::new("fog")
            .with_attribute("mode", mode)
            .with_attribute("expDensity", fog.density.to_string())
            .with_attribute("linearStart", fog.start.to_string())
            .with_attribute("linearEnd", fog.end.to_string())
            .with_child(colour("colourDiffuse", fog.colour));
        self.push_user_data(&mut element, self.scene.name(), PropertyCategory::Fog);
        element
    }

    fn sky_box(&self, sky: &SkyBox) -> Element {
        let mut element = Element::new("skyBox")
            .with_attribute("enable", sky.enabled.to_string())
            .with_attribute("material", sky.material.as_str())
            .with_attribute("distance", sky.distance.to_string())
            .with_attribute("drawFirst", sky.draw_first.to_string())
            .with_child(rotation("rotation", sky.orientation));
        self.push_user_data(&mut element, self.scene.name(), PropertyCategory::SkyBox);
        element
    }

    fn sky_dome(&self, sky: &SkyDome) -> Element {
        let mut element = Element::new("skyDome")
            .with_attribute("enable", sky.enabled.to_string())
            .with_attribute("material", sky.material.as_str())
            .with_attribute("curvature", sky.curvature.to_string())
            .with_attribute("tiling", sky.tiling.to_string())
            .with_attribute("distance", sky.distance.to_string())
            .with_attribute("drawFirst", sky.draw_first.to_string())
            .with_attribute("xSegments", sky.x_segments.to_string())
            .with_attribute("ySegments", sky.y_segments.to_string())
            .with_child(rotation("rotation", sky.orientation));
        self.push_user_data(&mut element, self.scene.name(), PropertyCategory::SkyDome);
        element
    }

    fn sky_plane(&self, sky: &SkyPlane) -> Element {
        let mut element = Element::new("skyPlane")
            .with_attribute("enable", sky.enabled.to_string())
            .with_attribute("material", sky.material.as_str());
        push_plane_attributes(&mut element, sky.plane);
        element.push_attribute("scale", sky.scale.to_string());
        element.push_attribute("tiling", sky.tiling.to_string());
        element.push_attribute("drawFirst", sky.draw_first.to_string());
        element.push_attribute("bow", sky.bow.to_string());
        element.push_attribute("xSegments", sky.x_segments.to_string());
        element.push_attribute("ySegments", sky.y_segments.to_string());
        self.push_user_data(&mut element, self.scene.name(), PropertyCategory::SkyPlane);
        element
    }

    fn terrain(&self) -> Option<Element> {
        if !self.contents.environment_blocks().contains(EnvironmentBlocks::TERRAIN) {
            return None;
        }
        let world = self.objects.environment.world_geometry.as_ref()?;
        let mut element = Element::new("terrain").with_attribute("dataFile", world.data_file.as_str());
        if let Some(queue) = world.render_queue {
            element.push_attribute("renderQueue", attributes::render_queue_name(queue));
        }
        self.push_user_data(&mut element, self.scene.name(), PropertyCategory::Terrain);
        Some(element)
    }

    fn octree(&self) -> Option<Element> {
        let layout = self.contents.octree()?;
        let owner = self.scene.name();
        let mut element = Element::new("octree").with_attribute("binFile", layout.bin_file.as_str());
        // Cell and mesh properties are all owned by the scene, so each set goes out once
        for (index, cell) in layout.cells.iter().enumerate() {
            let mut child = octree_cell(cell);
            if index == 0 {
                self.push_user_data(&mut child, owner, PropertyCategory::OctreeNode);
            }
            element.push_child(child);
        }
        for (index, mesh) in layout.meshes.iter().enumerate() {
            let mut child = octree_mesh(mesh);
            if index == 0 {
                self.push_user_data(&mut child, owner, PropertyCategory::OctreeMesh);
            }
            element.push_child(child);
        }
        self.push_user_data(&mut element, owner, PropertyCategory::Octree);
        Some(element)
    }

    fn render_textures(&self) -> Option<Element> {
        let mut block = Element::new("renderTextures");
        for name in self.contents.render_textures() {
            if let Some(texture) = self.objects.render_textures.by_name(name) {
                block.push_child(self.render_texture(name, texture));
            }
        }
        (!block.children().is_empty()).then_some(block)
    }

    fn render_texture(&self, name: &str, texture: &RenderTexture) -> Element {
        let texture_type = match texture.texture_type {
            TextureType::OneD => "1d",
            TextureType::TwoD => "2d",
            TextureType::ThreeD => "3d",
            TextureType::CubeMap => "cubic",
        };
        let auto_update = texture.auto_update.first().copied().unwrap_or(false);
        let mut element = Element::new("renderTexture")
            .with_attribute("name", self.local(name))
            .with_attribute("pixelFormat", texture.pixel_format.name())
            .with_attribute("textureType", texture_type)
            .with_attribute("width", texture.width.to_string())
            .with_attribute("height", texture.height.to_string())
            .with_attribute("autoUpdate", auto_update.to_string())
            .with_attribute("clearEveryFrame", texture.clear_every_frame.to_string())
            .with_attribute("hideRenderObject", texture.hide_render_object.to_string());
        if !texture.camera.is_empty() {
            element.push_attribute("camera", self.local(&texture.camera));
        }
        if !texture.scheme.is_empty() {
            element.push_attribute("scheme", texture.scheme.as_str());
        }
        if !texture.render_object.is_empty() {
            element.push_attribute("renderObjectName", self.local(&texture.render_object));
        }
        if let Some(plane) = texture.render_plane {
            element.push_child(
                Element::new("renderPlane")
                    .with_attribute("x", plane.normal.x.to_string())
                    .with_attribute("y", plane.normal.y.to_string())
                    .with_attribute("z", plane.normal.z.to_string())
                    .with_attribute("d", plane.d.to_string()),
            );
        }
        push_names(&mut element, "materials", "material", texture.materials.iter().map(String::as_str));
        push_names(
            &mut element,
            "hiddenObjects",
            "hiddenObject",
            texture.hidden_objects.iter().map(|name| self.local(name)),
        );
        push_names(
            &mut element,
            "exclusiveObjects",
            "exclusiveObject",
            texture.exclusive_objects.iter().map(|name| self.local(name)),
        );
        element
    }

    fn static_geometries(&self) -> Option<Element> {
        let mut block = Element::new("staticGeometries");
        for name in self.contents.static_geometries() {
            if let Some(geometry) = self.objects.static_geometries.by_name(name) {
                block.push_child(self.batched_geometry("staticGeometry", name, &geometry.batch));
            }
        }
        (!block.children().is_empty()).then_some(block)
    }

    fn instanced_geometries(&self) -> Option<Element> {
        let mut block = Element::new("instancedGeometries");
        for name in self.contents.instanced_geometries() {
            if let Some(geometry) = self.objects.instanced_geometries.by_name(name) {
                let mut element = self.batched_geometry("instancedGeometry", name, &geometry.batch);
                element.push_attribute("batchCount", geometry.batch_count.to_string());
                block.push_child(element);
            }
        }
        (!block.children().is_empty()).then_some(block)
    }

    /// Batch settings plus the entities baked into the batch
    fn batched_geometry(&self, tag: &str, name: &str, batch: &BatchedGeometry) -> Element {
        let mut element = Element::new(tag)
            .with_attribute("name", self.local(name))
            .with_attribute("castShadows", batch.cast_shadows.to_string())
            .with_attribute("visible", batch.visible.to_string());
        if let Some(queue) = batch.render_queue {
            element.push_attribute("renderQueue", attributes::render_queue_name(queue));
        }
        if batch.rendering_distance > 0.0 {
            element.push_attribute("renderingDistance", batch.rendering_distance.to_string());
        }
        element.push_child(vector("origin", batch.origin));
        element.push_child(vector("dimensions", batch.dimensions));

        let mut entities = Element::new("entities");
        for placement in &batch.entities {
            if let Some(entity) = self.objects.entities.by_name(&placement.entity) {
                let mut child = self.entity(&placement.entity, entity);
                let transform = Transform::new(placement.position, placement.orientation, placement.scale);
                self.push_transform(&mut child, &transform);
                entities.push_child(child);
            }
        }
        if !entities.children().is_empty() {
            element.push_child(entities);
        }
        element
    }

    fn externals(&self) -> Option<Element> {
        let mut externals = Element::new("externals");
        for (file, kind) in self.contents.externals() {
            externals.push_child(
                Element::new("item")
                    .with_attribute("type", kind.as_str())
                    .with_child(Element::new("file").with_attribute("name", file.as_str())),
            );
        }
        self.push_user_data(&mut externals, self.scene.name(), PropertyCategory::External);
        (!externals.children().is_empty()).then_some(externals)
    }

    /// The `nodes` block: the first node under the scene root
    fn container(&self) -> Option<Element> {
        let graph = &self.objects.graph;
        let root = self.contents.root()?;
        let container = *graph.get(root)?.children.first()?;
        let node = graph.get(container)?;
        let name = graph.name_of(container)?;

        let mut nodes = Element::new("nodes");
        self.push_transform(&mut nodes, &node.transform);
        for child in &node.children {
            if !self.is_generated_node(*child) {
                nodes.push_child(self.node(*child));
            }
        }
        self.push_user_data(&mut nodes, name, PropertyCategory::SceneNode);
        Some(nodes)
    }

    fn is_generated_node(&self, node: NodeId) -> bool {
        self.planes.contains_key(&node) || self.bone_nodes.contains(&node)
    }

    fn node(&self, id: NodeId) -> Element {
        let graph = &self.objects.graph;
        let name = graph.name_of(id).unwrap_or_default();
        let mut element = Element::new("node").with_attribute("name", self.local(name));
        let Some(node) = graph.get(id) else {
            return element;
        };

        element.push_attribute("visible", node.visible.to_string());
        if self.contents.properties().value_bool(name, "isTarget") {
            element.push_attribute("isTarget", "true");
        }
        // The look target turns the node again on reload
        let mut transform = node.transform;
        if let Some(look) = &node.look_target {
            transform.rotation = look.base_rotation;
        }
        self.push_transform(&mut element, &transform);
        if let Some(look) = &node.look_target {
            element.push_child(self.look_target(name, look));
        }
        if let Some(tracking) = &node.auto_tracking {
            let target = graph.name_of(tracking.target).unwrap_or_default();
            let mut track = Element::new("trackTarget")
                .with_attribute("nodeName", self.local(target))
                .with_child(vector("localDirection", tracking.local_direction))
                .with_child(vector("offset", tracking.offset));
            self.push_user_data(&mut track, name, PropertyCategory::TrackTarget);
            element.push_child(track);
        }

        for child in &node.children {
            if !self.is_generated_node(*child) {
                element.push_child(self.node(*child));
            }
        }
        self.push_attached(&mut element, id);

        let animations: Vec<Element> = self
            .contents
            .animations()
            .iter()
            .filter_map(|name| self.objects.animations.by_name(name).map(|a| (name, a)))
            .filter(|(_, animation)| animation.node == id)
            .map(|(name, animation)| self.animation(name, animation))
            .collect();
        if !animations.is_empty() {
            let mut block = Element::new("animations");
            for animation in animations {
                block.push_child(animation);
            }
            element.push_child(block);
        }

        self.push_user_data(&mut element, name, PropertyCategory::SceneNode);
        element
    }

    fn look_target(&self, owner: &str, look: &LookTarget) -> Element {
        let relative_to = match look.relative_to {
            TransformSpace::Local => "local",
            TransformSpace::Parent => "parent",
            TransformSpace::World => "world",
        };
        let mut element = Element::new("lookTarget").with_attribute("relativeTo", relative_to);
        if let Some(target) = &look.node_name {
            element.push_attribute("nodeName", target.as_str());
        }
        element.push_child(vector("position", look.position));
        element.push_child(vector("localDirection", look.local_direction));
        self.push_user_data(&mut element, owner, PropertyCategory::LookTarget);
        element
    }

    /// Objects hanging off `node`, in the order the loader reads them back
    fn push_attached(&self, element: &mut Element, node: NodeId) {
        let objects = self.objects;
        let contents = self.contents;
        for (name, entity) in attached(owned_entities(contents), &objects.entities, Some(node), |e| &e.movable) {
            element.push_child(self.entity(name, entity));
        }
        for (name, light) in attached(contents.lights(), &objects.lights, Some(node), |l| &l.movable) {
            element.push_child(self.light(name, light));
        }
        for (name, camera) in attached(contents.cameras(), &objects.cameras, Some(node), |c| &c.movable) {
            element.push_child(self.camera(name, camera));
        }
        for (name, system) in attached(
            contents.particle_systems(),
            &objects.particle_systems,
            Some(node),
            |s| &s.movable,
        ) {
            element.push_child(self.particle_system(name, system));
        }
        for (name, set) in attached(contents.billboard_sets(), &objects.billboard_sets, Some(node), |s| &s.movable) {
            element.push_child(self.billboard_set(name, set));
        }
        if let Some(scene_node) = objects.graph.get(node) {
            for child in &scene_node.children {
                if let Some(mesh) = self.planes.get(child) {
                    if let Some(plane) = self.plane(mesh) {
                        element.push_child(plane);
                    }
                }
            }
        }
    }

    fn entity(&self, name: &str, entity: &Entity) -> Element {
        let is_static = self.contents.static_entities().iter().any(|n| n == name);
        let mut element = Element::new("entity")
            .with_attribute("name", self.local(name))
            .with_attribute("meshFile", entity.mesh.as_str());
        if let Some(material) = &entity.material {
            element.push_attribute("material", material.as_str());
        }
        element.push_attribute("static", is_static.to_string());
        element.push_attribute("castShadows", entity.movable.cast_shadows.to_string());
        element.push_attribute("receiveShadows", entity.receive_shadows.to_string());
        if entity.skeleton_blend_mode == SkeletonBlendMode::Cumulative {
            element.push_attribute("skeletonAnimationBlendMode", "cumulative");
        }
        push_movable(&mut element, &entity.movable);
        push_buffer(&mut element, "vertexBuffer", entity.vertex_buffer);
        push_buffer(&mut element, "indexBuffer", entity.index_buffer);

        if !entity.sub_materials.is_empty() {
            let mut block = Element::new("subentities");
            for (index, material) in &entity.sub_materials {
                block.push_child(
                    Element::new("subentity")
                        .with_attribute("index", index.to_string())
                        .with_attribute("materialName", material.as_str()),
                );
            }
            element.push_child(block);
        }
        if !entity.custom_parameters.is_empty() {
            let mut block = Element::new("customParameters");
            for (id, value) in &entity.custom_parameters {
                block.push_child(
                    Element::new("customParameter")
                        .with_attribute("id", id.to_string())
                        .with_attribute("x", value.x.to_string())
                        .with_attribute("y", value.y.to_string())
                        .with_attribute("z", value.z.to_string())
                        .with_attribute("w", value.w.to_string()),
                );
            }
            element.push_child(block);
        }
        if !entity.bone_attachments.is_empty() {
            let mut block = Element::new("boneAttachments");
            let mut bones = HashSet::new();
            for attachment in &entity.bone_attachments {
                let mut child = Element::new("boneAttachment")
                    .with_attribute("name", attachment.name.as_str())
                    .with_attribute("bone", attachment.bone.as_str());
                let transform = Transform::new(attachment.position, attachment.orientation, attachment.scale);
                self.push_transform(&mut child, &transform);
                self.push_attached(&mut child, attachment.node);
                // Bone properties are keyed by bone, so they go out once
                if bones.insert(attachment.bone.as_str()) {
                    self.push_user_data(&mut child, &attachment.bone, PropertyCategory::Bone);
                }
                block.push_child(child);
            }
            element.push_child(block);
        }

        self.push_user_data(&mut element, name, PropertyCategory::Entity);
        element
    }

    fn light(&self, name: &str, light: &Light) -> Element {
        let kind = match light.kind {
            LightKind::Point => "point",
            LightKind::Directional => "directional",
            LightKind::Spotlight => "spot",
        };
        let mut element = Element::new("light")
            .with_attribute("name", self.local(name))
            .with_attribute("type", kind)
            .with_attribute("castShadows", light.movable.cast_shadows.to_string())
            .with_attribute("power", light.power.to_string());
        if self.contents.properties().value_bool(name, "ambientOnly") {
            element.push_attribute("ambientOnly", "true");
        }
        push_movable(&mut element, &light.movable);

        if light.kind != LightKind::Directional {
            element.push_child(vector("position", light.position / self.unit_factor()));
        }
        if light.kind != LightKind::Point {
            element.push_child(vector("normal", light.direction));
        }
        element.push_child(colour("colourDiffuse", light.diffuse));
        element.push_child(colour("colourSpecular", light.specular));
        if light.kind == LightKind::Spotlight {
            element.push_child(
                Element::new("lightRange")
                    .with_attribute("inner", angle_text(light.spotlight.inner))
                    .with_attribute("outer", angle_text(light.spotlight.outer))
                    .with_attribute("falloff", light.spotlight.falloff.to_string()),
            );
        }
        if light.kind != LightKind::Directional {
            let attenuation = &light.attenuation;
            element.push_child(
                Element::new("lightAttenuation")
                    .with_attribute("range", attenuation.range.to_string())
                    .with_attribute("constant", attenuation.constant.to_string())
                    .with_attribute("linear", attenuation.linear.to_string())
                    .with_attribute("quadratic", attenuation.quadratic.to_string()),
            );
        }

        self.push_user_data(&mut element, name, PropertyCategory::Light);
        element
    }

    fn camera(&self, name: &str, camera: &Camera) -> Element {
        let projection = match camera.projection {
            ProjectionType::Perspective => "perspective",
            ProjectionType::Orthographic => "orthographic",
        };
        let mut element = Element::new("camera")
            .with_attribute("name", self.local(name))
            .with_attribute("projectionType", projection)
            .with_attribute("fov", angle_text(camera.fov_y))
            .with_attribute("aspectRatio", camera.aspect_ratio.to_string())
            .with_attribute("orthoWidth", camera.ortho_width.to_string())
            .with_attribute("orthoHeight", camera.ortho_height.to_string());
        push_movable(&mut element, &camera.movable);
        // A far plane at or before near only comes from the scene defaults
        if camera.far_clip == 0.0 || camera.far_clip > camera.near_clip {
            element.push_child(
                Element::new("clipping")
                    .with_attribute("near", camera.near_clip.to_string())
                    .with_attribute("far", camera.far_clip.to_string()),
            );
        }
        element.push_child(vector("position", camera.position / self.unit_factor()));
        element.push_child(rotation("rotation", camera.orientation));

        self.push_user_data(&mut element, name, PropertyCategory::Camera);
        element
    }

    fn particle_system(&self, name: &str, system: &ParticleSystem) -> Element {
        let mut element = Element::new("particleSystem")
            .with_attribute("name", self.local(name))
            .with_attribute("file", system.template.as_str())
            .with_attribute("receiveShadows", system.receive_shadows.to_string());
        push_movable(&mut element, &system.movable);
        self.push_user_data(&mut element, name, PropertyCategory::ParticleSystem);
        element
    }

    fn billboard_set(&self, name: &str, set: &BillboardSet) -> Element {
        let billboard_type = match set.billboard_type {
            BillboardType::Point => "a",
            BillboardType::OrientedCommon => "b",
            BillboardType::OrientedSelf => "c",
            BillboardType::PerpendicularCommon => "d",
            BillboardType::PerpendicularSelf => "e",
        };
        let origin = match set.origin {
            BillboardOrigin::TopLeft => "a",
            BillboardOrigin::TopCenter => "b",
            BillboardOrigin::TopRight => "c",
            BillboardOrigin::CenterLeft => "d",
            BillboardOrigin::Center => "e",
            BillboardOrigin::CenterRight => "f",
            BillboardOrigin::BottomLeft => "g",
            BillboardOrigin::BottomCenter => "h",
            BillboardOrigin::BottomRight => "i",
        };
        let rotation_type = match set.rotation_type {
            BillboardRotation::Vertex => "vertex",
            BillboardRotation::TexCoord => "texcoord",
        };
        let mut element = Element::new("billboardSet")
            .with_attribute("name", self.local(name))
            .with_attribute("type", billboard_type)
            .with_attribute("origin", origin)
            .with_attribute("rotationType", rotation_type)
            .with_attribute("width", set.default_width.to_string())
            .with_attribute("height", set.default_height.to_string())
            .with_attribute("poolSize", set.pool_size.to_string())
            .with_attribute("autoExtendPool", set.auto_extend.to_string())
            .with_attribute("cullIndividual", set.cull_individually.to_string())
            .with_attribute("sort", set.sort.to_string())
            .with_attribute("accurateFacing", set.accurate_facing.to_string())
            .with_attribute("receiveShadows", set.receive_shadows.to_string());
        if !set.material.is_empty() {
            element.push_attribute("material", set.material.as_str());
        }
        push_movable(&mut element, &set.movable);

        for billboard in &set.billboards {
            let mut child = Element::new("billboard").with_attribute("rotation", angle_text(billboard.rotation));
            if let Some((width, height)) = billboard.dimensions {
                child.push_attribute("width", width.to_string());
                child.push_attribute("height", height.to_string());
            }
            child.push_child(vector("position", billboard.position));
            child.push_child(rotation("rotation", billboard.orientation));
            child.push_child(colour("colourDiffuse", billboard.colour));
            child.push_child(rect("texCoordRectangle", billboard.tex_coords));
            element.push_child(child);
        }

        self.push_user_data(&mut element, name, PropertyCategory::BillboardSet);
        element
    }

    fn plane(&self, mesh_name: &str) -> Option<Element> {
        let mesh = self.objects.meshes.by_name(mesh_name)?;
        let entity = self.objects.entities.by_name(&format!("{mesh_name}Entity"))?;
        let mut element = Element::new("plane")
            .with_attribute("name", self.local(mesh_name))
            .with_attribute("distance", mesh.plane.d.to_string())
            .with_attribute("width", mesh.width.to_string())
            .with_attribute("height", mesh.height.to_string())
            .with_attribute("xSegments", mesh.x_segments.to_string())
            .with_attribute("ySegments", mesh.y_segments.to_string())
            .with_attribute("numTexCoordSets", mesh.tex_coord_sets.to_string())
            .with_attribute("uTile", mesh.u_tile.to_string())
            .with_attribute("vTile", mesh.v_tile.to_string())
            .with_attribute("normals", mesh.normals.to_string())
            .with_attribute("movablePlane", mesh.movable_plane.is_some().to_string())
            .with_attribute("receiveShadows", entity.receive_shadows.to_string());
        if let Some(material) = &entity.material {
            element.push_attribute("material", material.as_str());
        }
        push_movable(&mut element, &entity.movable);
        element.push_child(vector("normal", mesh.plane.normal));
        element.push_child(vector("upVector", mesh.up));
        push_buffer(&mut element, "vertexBuffer", mesh.vertex_buffer);
        push_buffer(&mut element, "indexBuffer", mesh.index_buffer);

        self.push_user_data(&mut element, mesh_name, PropertyCategory::Plane);
        Some(element)
    }

    fn animation(&self, name: &str, animation: &Animation) -> Element {
        let interpolation = match animation.interpolation {
            crate::host::InterpolationMode::Linear => "linear",
            crate::host::InterpolationMode::Spline => "spline",
        };
        let rotation_interpolation = match animation.rotation_interpolation {
            crate::host::RotationInterpolationMode::Linear => "linear",
            crate::host::RotationInterpolationMode::Spherical => "spherical",
        };
        let mut element = Element::new("animation")
            .with_attribute("name", self.local(name))
            .with_attribute("length", animation.length.to_string())
            .with_attribute("interpolationMode", interpolation)
            .with_attribute("rotationInterpolationMode", rotation_interpolation)
            .with_attribute("enable", animation.enabled.to_string())
            .with_attribute("loop", animation.looping.to_string());
        for keyframe in &animation.keyframes {
            element.push_child(
                Element::new("keyframe")
                    .with_attribute("time", keyframe.time.to_string())
                    .with_child(vector("translation", keyframe.translation))
                    .with_child(rotation("rotation", keyframe.rotation))
                    .with_child(vector("scale", keyframe.scale)),
            );
        }
        element
    }

    fn unit_factor(&self) -> f32 {
        let factor = self.contents.settings().unit_factor;
        if factor == 0.0 {
            1.0
        } else {
            factor
        }
    }

    /// Non-identity parts of `transform` as position, rotation and scale children
    fn push_transform(&self, element: &mut Element, transform: &Transform) {
        if transform.position != Vec3::zeros() {
            element.push_child(vector("position", transform.position / self.unit_factor()));
        }
        if transform.rotation != Quat::identity() {
            element.push_child(rotation("rotation", transform.rotation));
        }
        if transform.scale != Vec3::new(1.0, 1.0, 1.0) {
            element.push_child(vector("scale", transform.scale));
        }
    }

    /// `userData` block for the properties of `owner` in `category`
    fn push_user_data(&self, element: &mut Element, owner: &str, category: PropertyCategory) {
        let mut metadata_seen = HashSet::new();
        let mut data = Element::new("userData");
        for property in self.contents.properties().of_owner(owner) {
            if property.category != category {
                continue;
            }
            // Metadata is recorded before any scene user data
            if category == PropertyCategory::Scene
                && SCENE_METADATA.contains(&property.name.as_str())
                && metadata_seen.insert(property.name.as_str())
            {
                continue;
            }
            if is_attribute_property(property) {
                continue;
            }
            data.push_child(
                Element::new("property")
                    .with_attribute("name", property.name.as_str())
                    .with_attribute("data", property.value.as_str()),
            );
        }
        if !data.children().is_empty() {
            debug!("Exporting {} propert(ies) of '{owner}'", data.children().len());
            element.push_child(data);
        }
    }
}

/// Properties the loader derives from element attributes
fn is_attribute_property(property: &NodeProperty) -> bool {
    match property.category {
        PropertyCategory::SceneNode => property.name == "isTarget",
        PropertyCategory::Light => property.name == "ambientOnly" && property.value == "true",
        _ => false,
    }
}

fn owned_entities(contents: &SceneContents) -> impl Iterator<Item = &String> + '_ {
    contents
        .static_entities()
        .iter()
        .chain(contents.dynamic_entities())
}

/// Listed objects whose attachment is `node`, in list order
fn attached<'s, K: Key, T>(
    names: impl IntoIterator<Item = &'s String>,
    store: &'s ObjectStore<K, T>,
    node: Option<NodeId>,
    movable: fn(&T) -> &MovableSettings,
) -> Vec<(&'s str, &'s T)> {
    names
        .into_iter()
        .filter_map(|name| store.by_name(name).map(|object| (name.as_str(), object)))
        .filter(|(_, object)| movable(object).attached_to == node)
        .collect()
}

fn push_movable(element: &mut Element, movable: &MovableSettings) {
    element.push_attribute("visible", movable.visible.to_string());
    if movable.query_flags != u32::MAX {
        element.push_attribute("queryFlags", movable.query_flags.to_string());
    }
    if movable.visibility_flags != u32::MAX {
        element.push_attribute("visibilityFlags", movable.visibility_flags.to_string());
    }
    if movable.rendering_distance > 0.0 {
        element.push_attribute("renderingDistance", movable.rendering_distance.to_string());
    }
    if let Some(queue) = movable.render_queue {
        element.push_attribute("renderQueue", attributes::render_queue_name(queue));
    }
}

fn shadows(shadows: &ShadowSettings) -> Element {
    let mut element = Element::new("shadows")
        .with_attribute("technique", shadows.technique.name().unwrap_or("none"))
        .with_attribute("selfShadow", shadows.self_shadow.to_string())
        .with_attribute("farDistance", shadows.far_distance.unwrap_or(0.0).to_string())
        .with_child(colour("colourShadow", shadows.colour));
    if let Some(setup) = &shadows.camera_setup {
        element.push_child(shadow_camera_setup(setup));
    }
    if let Some(textures) = &shadows.textures {
        element.push_child(shadow_textures(textures));
    }
    element
}

fn shadow_camera_setup(setup: &ShadowCameraSetup) -> Element {
    let element = Element::new("shadowCameraSetup");
    match *setup {
        ShadowCameraSetup::Uniform => element.with_attribute("type", "uniform"),
        ShadowCameraSetup::UniformFocused {
            aggressive_focus_region,
        } => element
            .with_attribute("type", "uniformfocused")
            .with_attribute("useAggressiveFocusRegion", aggressive_focus_region.to_string()),
        ShadowCameraSetup::LiSpSm {
            aggressive_focus_region,
            simple_optimal_adjust,
            optimal_adjust_factor,
            light_direction_threshold,
        } => element
            .with_attribute("type", "lispsm")
            .with_attribute("useAggressiveFocusRegion", aggressive_focus_region.to_string())
            .with_attribute("useSimpleOptimalAdjust", simple_optimal_adjust.to_string())
            .with_attribute("optimalAdjustFactor", optimal_adjust_factor.to_string())
            .with_attribute("lightDirectionThreshold", light_direction_threshold.to_string()),
        ShadowCameraSetup::Pssm {
            aggressive_focus_region,
            split_count,
            near_distance,
            far_distance,
            reduction,
            padding,
        } => element
            .with_attribute("type", "pssm")
            .with_attribute("useAggressiveFocusRegion", aggressive_focus_region.to_string())
            .with_attribute("splitCount", split_count.to_string())
            .with_attribute("splitNearDistance", near_distance.to_string())
            .with_attribute("splitFarDistance", far_distance.to_string())
            .with_attribute("splitReduction", reduction.to_string())
            .with_attribute("splitPadding", padding.to_string()),
        ShadowCameraSetup::PlaneOptimal { plane } => {
            let mut element = element.with_attribute("type", "planeoptimal");
            push_plane_attributes(&mut element, plane);
            element
        }
    }
}

fn shadow_textures(textures: &ShadowTextureSettings) -> Element {
    let mut element = Element::new("shadowTextures")
        .with_attribute("useDepthTexture", textures.use_depth_texture.to_string())
        .with_attribute("size", textures.size.to_string())
        .with_attribute("count", textures.count.to_string())
        .with_attribute("offset", textures.offset.to_string())
        .with_attribute("fadeStart", textures.fade_start.to_string())
        .with_attribute("fadeEnd", textures.fade_end.to_string());
    if let Some(material) = &textures.caster_material {
        element.push_attribute("shadowCasterMaterial", material.as_str());
    }
    if let Some(material) = &textures.receiver_material {
        element.push_attribute("shadowReceiverMaterial", material.as_str());
    }
    element
}

/// `planeX`, `planeY`, `planeZ` and `planeD` attributes
fn push_plane_attributes(element: &mut Element, plane: Plane) {
    element.push_attribute("planeX", plane.normal.x.to_string());
    element.push_attribute("planeY", plane.normal.y.to_string());
    element.push_attribute("planeZ", plane.normal.z.to_string());
    element.push_attribute("planeD", plane.d.to_string());
}

fn octree_cell(cell: &OctreeCell) -> Element {
    let mut element = Element::new("octNode")
        .with_attribute("px", cell.position.x.to_string())
        .with_attribute("py", cell.position.y.to_string())
        .with_attribute("pz", cell.position.z.to_string())
        .with_attribute("width", cell.width.to_string())
        .with_attribute("height", cell.height.to_string())
        .with_attribute("depth", cell.depth.to_string());
    for child in &cell.children {
        element.push_child(octree_cell(child));
    }
    element
}

fn octree_mesh(mesh: &OctreeMesh) -> Element {
    let mut element = Element::new("octMesh");
    if let Some(counts) = &mesh.geometry {
        element.push_child(
            Element::new("octGeometry")
                .with_attribute("binaryDataOffset", counts.binary_data_offset.to_string())
                .with_attribute("vertTotal", counts.vertex_total.to_string())
                .with_attribute("triTotal", counts.triangle_total.to_string())
                .with_attribute("normalTotal", counts.normal_total.to_string())
                .with_attribute("colorTotal", counts.colour_total.to_string())
                .with_attribute("texSets", counts.tex_sets.to_string())
                .with_attribute("texTotal", counts.tex_total.to_string()),
        );
    }
    if !mesh.material.is_empty() || !mesh.texture.is_empty() {
        element.push_child(
            Element::new("octMaterial")
                .with_attribute("name", mesh.material.as_str())
                .with_attribute("texture", mesh.texture.as_str()),
        );
    }
    element
}

/// One `entry` child per set bit
fn flag_block(tag: &str, entry: &str, mask: u32) -> Option<Element> {
    if mask == 0 {
        return None;
    }
    let mut block = Element::new(tag);
    for bit in (0..u32::BITS).map(|shift| 1u32 << shift).filter(|bit| mask & bit != 0) {
        block.push_child(Element::new(entry).with_attribute("bit", bit.to_string()));
    }
    Some(block)
}

/// `block` with one `entry` child per name, skipped when there are none
fn push_names<'n>(element: &mut Element, block: &str, entry: &str, names: impl IntoIterator<Item = &'n str>) {
    let mut list = Element::new(block);
    for name in names {
        list.push_child(Element::new(entry).with_attribute("name", name));
    }
    if !list.children().is_empty() {
        element.push_child(list);
    }
}

fn push_buffer(element: &mut Element, tag: &str, policy: BufferPolicy) {
    if policy == BufferPolicy::default() {
        return;
    }
    let usage = match policy.usage {
        BufferUsage::Static => "static",
        BufferUsage::Dynamic => "dynamic",
        BufferUsage::WriteOnly => "writeonly",
        BufferUsage::StaticWriteOnly => "staticwriteonly",
        BufferUsage::DynamicWriteOnly => "dynamicwriteonly",
    };
    element.push_child(
        Element::new(tag)
            .with_attribute("usage", usage)
            .with_attribute("useShadow", policy.shadow_buffer.to_string()),
    );
}

fn vector(tag: &str, value: Vec3) -> Element {
    Element::new(tag)
        .with_attribute("x", value.x.to_string())
        .with_attribute("y", value.y.to_string())
        .with_attribute("z", value.z.to_string())
}

fn rotation(tag: &str, value: Quat) -> Element {
    Element::new(tag)
        .with_attribute("qw", value.w.to_string())
        .with_attribute("qx", value.i.to_string())
        .with_attribute("qy", value.j.to_string())
        .with_attribute("qz", value.k.to_string())
}

fn colour(tag: &str, value: ColourValue) -> Element {
    Element::new(tag)
        .with_attribute("r", value.r.to_string())
        .with_attribute("g", value.g.to_string())
        .with_attribute("b", value.b.to_string())
        .with_attribute("a", value.a.to_string())
}

fn rect(tag: &str, value: FloatRect) -> Element {
    Element::new(tag)
        .with_attribute("left", value.left.to_string())
        .with_attribute("top", value.top.to_string())
        .with_attribute("right", value.right.to_string())
        .with_attribute("bottom", value.bottom.to_string())
}

/// Angle text that reads back to the same radians
///
/// Values above pi are read as degrees, so large angles are written in
/// degrees.
fn angle_text(radians: f32) -> String {
    if radians > constants::PI {
        utils::rad_to_deg(radians).to_string()
    } else {
        radians.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoaderConfig, SceneOptions};
    use crate::host::{MemoryHost, MemoryRenderTarget};
    use crate::resource::{MemoryGroup, ResourceGroupManager};
    use crate::scene::document::Document;
    use crate::scene::SceneContext;
    use approx::assert_relative_eq;

    fn exported(xml: &str, prefix: &str) -> Document {
        let mut host = MemoryHost::permissive().with_skeletal_mesh("knight.mesh", &["Hand"]);
        let mut target = MemoryRenderTarget::new();
        let resources = ResourceGroupManager::new().with_group(MemoryGroup::new("General").with_file("level.scene", xml));
        let mut ctx = SceneContext::new(&mut host, &mut target, &resources);
        let mut scene = SceneResource::new("level", SceneOptions::new().with_prefix(prefix), LoaderConfig::default());
        scene.load(&mut ctx).unwrap();
        let text = scene.export_document(&*ctx.host).unwrap();
        Document::parse(&text).unwrap()
    }

    fn node<'d>(document: &'d Document, name: &str) -> &'d Element {
        fn find<'e>(element: &'e Element, name: &str) -> Option<&'e Element> {
            if element.tag() == "node" && element.attribute("name") == Some(name) {
                return Some(element);
            }
            element.children().iter().find_map(|child| find(child, name))
        }
        find(document.root(), name).unwrap()
    }

    #[test]
    fn test_names_lose_the_prefix() {
        let document = exported(
            r#"<scene author="Ann">
                <nodes>
                    <node name="Crate">
                        <position x="1" y="2" z="3"/>
                        <entity name="Box" meshFile="box.mesh" material="Wood" static="true"/>
                    </node>
                </nodes>
            </scene>"#,
            "lvl_",
        );
        let scene = document.scene().unwrap();
        assert_eq!(scene.attribute("author"), Some("Ann"));

        let crate_node = node(&document, "Crate");
        let position = attributes::vector3(crate_node.first_child("position").unwrap()).unwrap();
        assert_relative_eq!(position.y, 2.0);
        let entity = crate_node.first_child("entity").unwrap();
        assert_eq!(entity.attribute("name"), Some("Box"));
        assert_eq!(entity.attribute("meshFile"), Some("box.mesh"));
        assert_eq!(entity.attribute("material"), Some("Wood"));
        assert_eq!(entity.attribute("static"), Some("true"));
    }

    #[test]
    fn test_loader_properties_return_as_attributes() {
        let document = exported(
            r#"<scene>
                <nodes>
                    <node name="Goal" isTarget="true">
                        <light name="Glow" ambientOnly="true"/>
                        <userData><property name="team" data="red"/></userData>
                    </node>
                </nodes>
            </scene>"#,
            "",
        );
        let goal = node(&document, "Goal");
        assert_eq!(goal.attribute("isTarget"), Some("true"));
        let data = goal.first_child("userData").unwrap();
        let names: Vec<_> = data.children().iter().filter_map(|p| p.attribute("name")).collect();
        assert_eq!(names, vec!["team"]);

        let light = goal.first_child("light").unwrap();
        assert_eq!(light.attribute("ambientOnly"), Some("true"));
        assert!(light.first_child("userData").is_none());

        // Metadata is not repeated as scene user data
        assert!(document.scene().unwrap().first_child("userData").is_none());
    }

    #[test]
    fn test_planes_and_bone_nodes_are_not_plain_nodes() {
        let document = exported(
            r#"<scene>
                <nodes>
                    <node name="Yard">
                        <plane name="Ground" width="20" height="30" material="Grass"/>
                        <entity name="Knight" meshFile="knight.mesh">
                            <boneAttachments>
                                <boneAttachment name="Sword" bone="Hand">
                                    <entity name="Blade" meshFile="sword.mesh"/>
                                </boneAttachment>
                            </boneAttachments>
                        </entity>
                    </node>
                </nodes>
            </scene>"#,
            "",
        );
        let yard = node(&document, "Yard");
        assert!(yard.children_named("node").next().is_none());

        let plane = yard.first_child("plane").unwrap();
        assert_eq!(plane.attribute("name"), Some("Ground"));
        assert_eq!(plane.attribute("width"), Some("20"));
        assert_eq!(plane.attribute("material"), Some("Grass"));

        let attachment = yard
            .first_child("entity")
            .and_then(|e| e.first_child("boneAttachments"))
            .and_then(|b| b.first_child("boneAttachment"))
            .unwrap();
        assert_eq!(attachment.attribute("bone"), Some("Hand"));
        assert_eq!(
            attachment.first_child("entity").and_then(|e| e.attribute("name")),
            Some("Blade")
        );
    }

    #[test]
    fn test_look_target_node_keeps_its_own_rotation() {
        let document = exported(
            r#"<scene>
                <nodes>
                    <node name="Turret">
                        <rotation qw="0" qx="0" qy="1" qz="0"/>
                        <lookTarget relativeTo="world">
                            <position x="10" y="0" z="0"/>
                        </lookTarget>
                    </node>
                </nodes>
            </scene>"#,
            "",
        );
        let turret = node(&document, "Turret");
        let rotation = attributes::quaternion(turret.first_child("rotation").unwrap()).unwrap();
        assert_relative_eq!(rotation.j.abs(), 1.0, epsilon = 1e-6);

        let look = turret.first_child("lookTarget").unwrap();
        assert_eq!(look.attribute("relativeTo"), Some("world"));
        assert!(look.attribute("nodeName").is_none());
        let position = attributes::vector3(look.first_child("position").unwrap()).unwrap();
        assert_relative_eq!(position.x, 10.0);
    }

    #[test]
    fn test_geometry_entities_stay_inside_their_batch() {
        let document = exported(
            r#"<scene>
                <nodes><node name="Field"/></nodes>
                <staticGeometries>
                    <staticGeometry name="Fence" renderQueue="queue3">
                        <entities>
                            <entity name="Post1" meshFile="post.mesh">
                                <position x="4" y="0" z="0"/>
                            </entity>
                        </entities>
                    </staticGeometry>
                </staticGeometries>
            </scene>"#,
            "f_",
        );
        assert!(node(&document, "Field").first_child("entity").is_none());

        let scene = document.scene().unwrap();
        let fence = scene
            .first_child("staticGeometries")
            .and_then(|block| block.first_child("staticGeometry"))
            .unwrap();
        assert_eq!(fence.attribute("name"), Some("Fence"));
        assert_eq!(fence.attribute("renderQueue"), Some("queue3"));
        let post = fence.first_child("entities").and_then(|e| e.first_child("entity")).unwrap();
        assert_eq!(post.attribute("name"), Some("Post1"));
        let position = attributes::vector3(post.first_child("position").unwrap()).unwrap();
        assert_relative_eq!(position.x, 4.0);
    }

    #[test]
    fn test_flag_block_lists_each_bit() {
        assert!(flag_block("queryFlags", "queryFlag", 0).is_none());
        let block = flag_block("queryFlags", "queryFlag", 0x8000_0005).unwrap();
        let bits: Vec<_> = block.children().iter().filter_map(|flag| flag.attribute("bit")).collect();
        assert_eq!(bits, vec!["1", "4", "2147483648"]);
        assert_eq!(attributes::flag_list(&block, "queryFlag").unwrap(), 0x8000_0005);
    }

    #[test]
    fn test_write_document_escapes_and_indents() {
        let root = Element::new("scene").with_child(
            Element::new("nodes").with_child(Element::new("node").with_attribute("name", "a<b & \"c\"")),
        );
        let text = write_document(&root).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("&lt;"));
        assert!(text.contains("\n    <nodes>"));
        assert_eq!(Document::parse(&text).unwrap().root(), &root);
    }

    #[test]
    fn test_angle_text_reads_back() {
        for radians in [0.5, constants::PI, 4.0, 6.0] {
            let text = angle_text(radians);
            let value: f32 = text.parse().unwrap();
            assert_relative_eq!(attributes::angle(value), radians, epsilon = 1e-4);
        }
    }
}
