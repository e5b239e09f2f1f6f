//! Movable object handlers: lights, cameras, entities, particle systems,
//! billboard sets, planes and node animations

use crate::foundation::logging::{debug, warn};
use crate::foundation::math::{constants, utils, ColourValue, FloatRect, Plane, Quat, Vec3, Vec4};
use crate::host::{
    Animation, Billboard, BillboardOrigin, BillboardRotation, BillboardSet, BillboardType, BoneAttachment,
    BufferPolicy, BufferUsage, Camera, Entity, EntityId, InterpolationMode, Keyframe, Light, LightKind,
    ManualMesh, MeshInfo, MovableSettings, NodeId, ParticleSystem, ProjectionType, RotationInterpolationMode,
    SkeletonBlendMode, SpotlightRange,
};
use crate::scene::attributes;
use crate::scene::contents::{push_unique, AnimationPackage};
use crate::scene::document::Element;
use crate::scene::error::{DocumentCorrupt, LeafError, ObjectResolutionFailure};
use crate::scene::properties::{NodeProperty, PropertyCategory};

use super::{get_or_create, orientation, upsert, SceneMaterializer, NODE_INLINE_TAGS};

/// Attributes shared by every movable object
#[derive(Debug, Clone, Copy)]
pub(super) struct MovableAttributes {
    visible: bool,
    query_flags: u32,
    visibility_flags: u32,
    render_queue: Option<u8>,
    rendering_distance: f32,
}

impl MovableAttributes {
    /// Read the shared attributes; `defaults` are the (query, visibility) flags
    pub(super) fn read(element: &Element, defaults: (u32, u32)) -> Result<Self, DocumentCorrupt> {
        Ok(Self {
            visible: attributes::boolean(element, "visible", true),
            query_flags: attributes::flags(element, "queryFlags", defaults.0)?,
            visibility_flags: attributes::flags(element, "visibilityFlags", defaults.1)?,
            render_queue: attributes::render_queue_attribute(element, "renderQueue"),
            rendering_distance: attributes::real(element, "renderingDistance", 0.0)?,
        })
    }

    /// Flags of 0 and distances of 0 leave the object's values alone
    pub(super) fn apply(&self, movable: &mut MovableSettings) {
        movable.visible = self.visible;
        if self.query_flags != 0 {
            movable.query_flags = self.query_flags;
        }
        if self.visibility_flags != 0 {
            movable.visibility_flags = self.visibility_flags;
        }
        if self.render_queue.is_some() {
            movable.render_queue = self.render_queue;
        }
        if self.rendering_distance > 0.0 {
            movable.rendering_distance = self.rendering_distance;
        }
    }
}

fn buffer_policy(element: Option<&Element>) -> BufferPolicy {
    let Some(element) = element else {
        return BufferPolicy::default();
    };
    let usage = match attributes::string(element, "usage", "static").to_lowercase().as_str() {
        "dynamic" => BufferUsage::Dynamic,
        "writeonly" => BufferUsage::WriteOnly,
        "staticwriteonly" => BufferUsage::StaticWriteOnly,
        "dynamicwriteonly" => BufferUsage::DynamicWriteOnly,
        _ => BufferUsage::Static,
    };
    BufferPolicy {
        usage,
        shadow_buffer: attributes::boolean(element, "useShadow", false),
    }
}

fn child_vector(element: &Element, tag: &str) -> Result<Option<Vec3>, DocumentCorrupt> {
    element.first_child(tag).map(attributes::vector3).transpose()
}

/// First non-empty attribute among `names`
fn first_attribute(element: &Element, names: &[&str]) -> String {
    names
        .iter()
        .map(|name| attributes::string_or_empty(element, name))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

impl<'h> SceneMaterializer<'h> {
    pub(super) fn process_light(&mut self, element: &Element, parent: Option<NodeId>) -> Result<(), LeafError> {
        let name = self.object_name(element, "Light");
        let kind = match attributes::string_or_empty(element, "type").as_str() {
            "directional" => LightKind::Directional,
            "spot" => LightKind::Spotlight,
            "" | "point" | "radPoint" => LightKind::Point,
            other => {
                warn!("Light '{name}': unknown type '{other}', using point");
                LightKind::Point
            }
        };
        let movable = MovableAttributes::read(element, (0, 0))?;
        let cast_shadows = attributes::boolean(element, "castShadows", true);
        let power = attributes::real(element, "power", 1.0)?;
        let ambient_only = attributes::boolean(element, "ambientOnly", false);
        let affect_diffuse = attributes::boolean(element, "affectDiffuse", true);
        let affect_specular = attributes::boolean(element, "affectSpecular", true);

        let factor = self.contents.settings.unit_factor;
        let position = if kind == LightKind::Directional {
            None
        } else {
            child_vector(element, "position")?.map(|p| p * factor)
        };
        let direction = if kind == LightKind::Point {
            None
        } else {
            self.light_direction(element)?
        };
        let diffuse = if affect_diffuse {
            element.first_child("colourDiffuse").map(attributes::colour).transpose()?
        } else {
            None
        };
        let specular = if affect_specular {
            element.first_child("colourSpecular").map(attributes::colour).transpose()?
        } else {
            None
        };
        let range = match element.first_child("lightRange") {
            Some(range) if kind == LightKind::Spotlight => {
                let defaults = SpotlightRange::default();
                Some(SpotlightRange {
                    inner: attributes::angle_attribute(range, "inner", defaults.inner)?,
                    outer: attributes::angle_attribute(range, "outer", defaults.outer)?,
                    falloff: attributes::real(range, "falloff", 1.0)?,
                })
            }
            _ => None,
        };
        let attenuation = match element.first_child("lightAttenuation") {
            Some(attenuation) if kind != LightKind::Directional => Some(crate::host::Attenuation {
                range: attributes::real(attenuation, "range", 0.0)?,
                constant: attributes::real(attenuation, "constant", 0.0)?,
                linear: attributes::real(attenuation, "linear", 0.0)?,
                quadratic: attributes::real(attenuation, "quadratic", 0.0)?,
            }),
            _ => None,
        };

        let lights = &mut self.host.objects_mut().lights;
        let id = get_or_create(lights, &name, Light::default)?;
        if let Some(light) = lights.get_mut(id) {
            light.kind = kind;
            light.power = power;
            light.movable.cast_shadows = cast_shadows;
            movable.apply(&mut light.movable);
            if parent.is_some() {
                light.movable.attached_to = parent;
            }
            if let Some(position) = position {
                light.position = position;
            }
            if let Some(direction) = direction {
                light.direction = direction;
            }
            if let Some(diffuse) = diffuse {
                light.diffuse = diffuse;
            }
            if let Some(specular) = specular {
                light.specular = specular;
            }
            if let Some(range) = range {
                light.spotlight = range;
            }
            if let Some(attenuation) = attenuation {
                light.attenuation = attenuation;
            }
        }
        push_unique(&mut self.contents.lights, &name);
        if ambient_only {
            self.contents
                .properties
                .insert(NodeProperty::new(&name, "ambientOnly", "true", PropertyCategory::Light));
        }
        debug!("Configured light '{name}'");

        self.user_data(element, &name, PropertyCategory::Light);
        Ok(())
    }

    /// Direction from `normal`, overridden by an orientation child
    fn light_direction(&self, element: &Element) -> Result<Option<Vec3>, DocumentCorrupt> {
        let mut direction = child_vector(element, "normal")?;
        if let Some(orientation) = orientation(element)? {
            direction = Some(match self.contents.settings.animation_package {
                AnimationPackage::Maya => orientation * Vec3::z(),
                AnimationPackage::Generic => utils::local_x_axis(&orientation),
            });
        }
        Ok(direction)
    }

    pub(super) fn process_camera(&mut self, element: &Element, parent: Option<NodeId>) -> Result<(), LeafError> {
        let name = self.object_name(element, "Camera");
        let projection = attributes::string(element, "projectionType", "perspective");
        let fov = attributes::angle_attribute(element, "fov", constants::HALF_PI)?;
        let aspect_ratio = attributes::real(element, "aspectRatio", 4.0 / 3.0)?;
        let ortho_width = attributes::real(element, "orthoWidth", 50.0)?;
        let ortho_height = attributes::real(element, "orthoHeight", 50.0)?;
        let movable = MovableAttributes::read(element, (0, 0))?;
        let (near_clip, far_clip) = match element.first_child("clipping") {
            Some(clipping) => self.clip_distances(clipping)?,
            None => (self.contents.settings.near_clip, self.contents.settings.far_clip),
        };
        let factor = self.contents.settings.unit_factor;
        let position = child_vector(element, "position")?.map(|p| p * factor);
        let rotation = orientation(element)?;
        let normal = child_vector(element, "normal")?;

        let cameras = &mut self.host.objects_mut().cameras;
        let id = get_or_create(cameras, &name, Camera::default)?;
        if let Some(camera) = cameras.get_mut(id) {
            match projection.to_lowercase().as_str() {
                "perspective" => {
                    camera.projection = ProjectionType::Perspective;
                    camera.fov_y = fov;
                    camera.aspect_ratio = aspect_ratio;
                }
                "orthographic" => {
                    camera.projection = ProjectionType::Orthographic;
                    camera.ortho_width = ortho_width;
                    camera.ortho_height = ortho_height;
                }
                other => warn!("Camera '{name}': unknown projection '{other}', keeping {:?}", camera.projection),
            }
            movable.apply(&mut camera.movable);
            camera.near_clip = near_clip;
            camera.far_clip = far_clip;
            if parent.is_some() {
                camera.movable.attached_to = parent;
            }
            if let Some(position) = position {
                camera.position = position;
            }
            if let Some(rotation) = rotation {
                camera.orientation = rotation;
            }
            if let Some(normal) = normal {
                camera.set_direction(normal);
            }
        }
        push_unique(&mut self.contents.cameras, &name);
        debug!("Configured camera '{name}'");

        if let Some(parent) = parent {
            if let Some(look) = element.first_child("lookTarget") {
                self.isolate(Self::process_look_target, look, parent)?;
            }
            if let Some(track) = element.first_child("trackTarget") {
                self.isolate(Self::process_track_target, track, parent)?;
            }
        }
        self.user_data(element, &name, PropertyCategory::Camera);

        if name.ends_with("default") || self.contents.properties.value_bool(&name, "default") {
            self.contents
                .set_default_camera(&*self.host, &mut *self.target, &name, 0, 0)
                .map_err(|error| ObjectResolutionFailure::new("camera", &name, "viewport 0", error))?;
        }
        Ok(())
    }

    /// Near and far distances of a `clipping` element
    ///
    /// A missing far distance means an infinite far plane when the host
    /// supports one.
    pub(super) fn clip_distances(&self, element: &Element) -> Result<(f32, f32), DocumentCorrupt> {
        let infinite = self.host.capabilities().infinite_far_plane;
        let near = attributes::real(element, "near", self.config.near_clip_distance)?;
        let far_default = if infinite { 0.0 } else { self.config.far_clip_distance };
        let far = attributes::real(element, "far", far_default)?;
        if !infinite && far <= near {
            return Err(DocumentCorrupt::InvalidValue {
                element: element.tag().to_string(),
                attribute: "far".to_string(),
                value: format!("{far} (near is {near})"),
            });
        }
        Ok((near, far))
    }

    pub(super) fn process_entity(&mut self, element: &Element, parent: NodeId) -> Result<(), LeafError> {
        let (id, name) = self.create_entity(element)?;
        if let Some(entity) = self.host.objects_mut().entities.get_mut(id) {
            entity.movable.attached_to = Some(parent);
        }
        if let Some(block) = element.first_child("boneAttachments") {
            for attachment in block.children_named("boneAttachment") {
                self.isolate(Self::process_bone_attachment, attachment, (id, parent))?;
            }
        }
        self.user_data(element, &name, PropertyCategory::Entity);
        Ok(())
    }

    /// Create and configure an entity without attaching it anywhere
    pub(super) fn create_entity(&mut self, element: &Element) -> Result<(EntityId, String), LeafError> {
        let name = self.object_name(element, "Entity");
        let mesh = attributes::required_string(element, "meshFile")?.to_string();
        let material = first_attribute(element, &["materialFile", "material"]);
        let is_static = attributes::boolean(element, "static", false);
        let cast_shadows = attributes::boolean(element, "castShadows", true);
        let receive_shadows = attributes::boolean(element, "receiveShadows", true);
        let blend_mode = match attributes::string(element, "skeletonAnimationBlendMode", "average")
            .to_lowercase()
            .as_str()
        {
            "cumulative" => SkeletonBlendMode::Cumulative,
            _ => SkeletonBlendMode::Average,
        };
        let settings = &self.contents.settings;
        let movable = MovableAttributes::read(element, (settings.query_flags, settings.visibility_flags))?;
        let vertex_buffer = buffer_policy(element.first_child("vertexBuffer"));
        let index_buffer = buffer_policy(element.first_child("indexBuffer"));
        let custom_parameters = custom_parameters(element)?;
        let sub_materials = sub_materials(element)?;

        let mesh_info = self
            .host
            .load_mesh(&mesh, self.group)
            .map_err(|error| ObjectResolutionFailure::new("entity", &name, &mesh, error))?;
        let sub_mesh_count = mesh_info.sub_mesh_count;

        let entities = &mut self.host.objects_mut().entities;
        let id = get_or_create(entities, &name, || Entity::new(mesh.clone(), mesh_info))?;
        if let Some(entity) = entities.get_mut(id) {
            entity.movable.cast_shadows = cast_shadows;
            entity.receive_shadows = receive_shadows;
            movable.apply(&mut entity.movable);
            if entity.has_skeleton() {
                entity.skeleton_blend_mode = blend_mode;
            }
            entity.vertex_buffer = vertex_buffer;
            entity.index_buffer = index_buffer;
            entity.custom_parameters.extend(custom_parameters);
        }
        let contents = &mut *self.contents;
        let (list, other) = if is_static {
            (&mut contents.static_entities, &mut contents.dynamic_entities)
        } else {
            (&mut contents.dynamic_entities, &mut contents.static_entities)
        };
        other.retain(|listed| *listed != name);
        push_unique(list, &name);
        debug!("Created entity '{name}' from '{mesh}'");

        for (index, sub_material) in sub_materials {
            if index >= sub_mesh_count {
                self.report(ObjectResolutionFailure::new(
                    "entity",
                    &name,
                    &sub_material,
                    format!("no sub-entity {index}"),
                ));
                continue;
            }
            match self.host.resolve_material(&sub_material) {
                Ok(()) => {
                    if let Some(entity) = self.host.objects_mut().entities.get_mut(id) {
                        entity.sub_materials.insert(index, sub_material);
                    }
                }
                Err(error) => self.report(ObjectResolutionFailure::new("entity", &name, &sub_material, error)),
            }
        }
        if !material.is_empty() {
            self.apply_entity_material(id, &name, &material);
        }
        Ok((id, name))
    }

    /// Set the entity material, keeping the default when it cannot resolve
    fn apply_entity_material(&mut self, id: EntityId, owner: &str, material: &str) {
        match self.host.resolve_material(material) {
            Ok(()) => {
                if let Some(entity) = self.host.objects_mut().entities.get_mut(id) {
                    entity.material = Some(material.to_string());
                }
            }
            Err(error) => self.report(ObjectResolutionFailure::new("entity", owner, material, error)),
        }
    }

    fn process_bone_attachment(
        &mut self,
        element: &Element,
        (entity, parent): (EntityId, NodeId),
    ) -> Result<(), LeafError> {
        let name = attributes::string_or_empty(element, "name");
        let bone = attributes::string_or_empty(element, "bone");
        let (entity_name, has_bone) = {
            let entities = &self.host.objects().entities;
            (
                entities.name_of(entity).unwrap_or_default().to_string(),
                entities
                    .get(entity)
                    .is_some_and(|e| e.mesh_info.bones.iter().any(|b| *b == bone)),
            )
        };
        if !has_bone {
            return Err(ObjectResolutionFailure::new(
                "bone attachment",
                &entity_name,
                &bone,
                format!("entity has no bone '{bone}'"),
            )
            .into());
        }

        let factor = self.contents.settings.unit_factor;
        let position = child_vector(element, "position")?.map_or_else(Vec3::zeros, |p| p * factor);
        let rotation = orientation(element)?.unwrap_or_else(Quat::identity);
        let scale = child_vector(element, "scale")?.unwrap_or_else(|| Vec3::new(1.0, 1.0, 1.0));

        let node_name = format!("{}{}_{}", self.prefix, bone, name);
        let objects = self.host.objects_mut();
        let node = match objects.graph.id(&node_name) {
            Some(node) => node,
            None => objects.graph.create_child(parent, Some(&node_name))?,
        };
        if let Some(scene_node) = objects.graph.get_mut(node) {
            scene_node.transform.position = position;
            scene_node.transform.rotation = rotation;
            scene_node.transform.scale = scale;
        }
        objects.graph.set_initial_state(node);
        if let Some(entity) = objects.entities.get_mut(entity) {
            entity.bone_attachments.retain(|attachment| attachment.name != name);
            entity.bone_attachments.push(BoneAttachment {
                name: name.clone(),
                bone: bone.clone(),
                node,
                position,
                orientation: rotation,
                scale,
            });
        }
        push_unique(&mut self.contents.nodes, &node_name);
        debug!("Attached '{node_name}' to bone '{bone}' of '{entity_name}'");

        self.dispatch(element, &Self::attachment_rules(), NODE_INLINE_TAGS, node)?;
        self.user_data(element, &bone, PropertyCategory::Bone);
        Ok(())
    }

    pub(super) fn process_particle_system(&mut self, element: &Element, parent: NodeId) -> Result<(), LeafError> {
        let name = self.object_name(element, "ParticleSystem");
        let template = attributes::string_or_empty(element, "file");
        let receive_shadows = attributes::boolean(element, "receiveShadows", true);
        let movable = MovableAttributes::read(element, (0, 0))?;
        let material = self
            .host
            .particle_template(&template)
            .map_err(|error| ObjectResolutionFailure::new("particle system", &name, &template, error))?;

        let systems = &mut self.host.objects_mut().particle_systems;
        let id = get_or_create(systems, &name, || ParticleSystem {
            template: template.clone(),
            material: material.clone(),
            receive_shadows,
            movable: MovableSettings::default(),
        })?;
        if let Some(system) = systems.get_mut(id) {
            system.template = template;
            system.material = material;
            system.receive_shadows = receive_shadows;
            movable.apply(&mut system.movable);
            system.movable.attached_to = Some(parent);
        }
        push_unique(&mut self.contents.particle_systems, &name);
        debug!("Created particle system '{name}'");

        self.user_data(element, &name, PropertyCategory::ParticleSystem);
        Ok(())
    }

    pub(super) fn process_billboard_set(&mut self, element: &Element, parent: NodeId) -> Result<(), LeafError> {
        let name = self.object_name(element, "BillboardSet");
        let billboard_type = match attributes::string_or_empty(element, "type").as_str() {
            "b" => BillboardType::OrientedCommon,
            "c" => BillboardType::OrientedSelf,
            "d" => BillboardType::PerpendicularCommon,
            "e" => BillboardType::PerpendicularSelf,
            _ => BillboardType::Point,
        };
        let origin = match attributes::string_or_empty(element, "origin").as_str() {
            "a" => BillboardOrigin::TopLeft,
            "b" => BillboardOrigin::TopCenter,
            "c" => BillboardOrigin::TopRight,
            "d" => BillboardOrigin::CenterLeft,
            "f" => BillboardOrigin::CenterRight,
            "g" => BillboardOrigin::BottomLeft,
            "h" => BillboardOrigin::BottomCenter,
            "i" => BillboardOrigin::BottomRight,
            _ => BillboardOrigin::Center,
        };
        let rotation_type = match attributes::string(element, "rotationType", "vertex").to_lowercase().as_str() {
            "texcoord" => BillboardRotation::TexCoord,
            _ => BillboardRotation::Vertex,
        };
        let material = attributes::string_or_empty(element, "material");
        let width = attributes::real(element, "width", 10.0)?;
        let height = attributes::real(element, "height", 10.0)?;
        let pool_size = attributes::unsigned(element, "poolSize", 20)?;
        let movable = MovableAttributes::read(element, (0, 0))?;
        let billboards = element
            .children_named("billboard")
            .map(billboard)
            .collect::<Result<Vec<_>, _>>()?;

        let sets = &mut self.host.objects_mut().billboard_sets;
        let id = get_or_create(sets, &name, BillboardSet::default)?;
        if let Some(set) = sets.get_mut(id) {
            set.billboard_type = billboard_type;
            set.origin = origin;
            set.rotation_type = rotation_type;
            set.default_width = width;
            set.default_height = height;
            if pool_size > 0 {
                set.pool_size = pool_size as usize;
            }
            set.auto_extend = attributes::boolean(element, "autoExtendPool", false);
            set.cull_individually = attributes::boolean(element, "cullIndividual", false);
            set.sort = attributes::boolean(element, "sort", false);
            set.accurate_facing = attributes::boolean(element, "accurateFacing", false);
            set.receive_shadows = attributes::boolean(element, "receiveShadows", false);
            movable.apply(&mut set.movable);
            set.movable.attached_to = Some(parent);
            set.billboards = billboards;
        }
        push_unique(&mut self.contents.billboard_sets, &name);

        if !material.is_empty() {
            match self.host.resolve_material(&material) {
                Ok(()) => {
                    if let Some(set) = self.host.objects_mut().billboard_sets.get_mut(id) {
                        set.material = material;
                    }
                }
                Err(error) => self.report(ObjectResolutionFailure::new("billboard set", &name, &material, error)),
            }
        }
        debug!("Created billboard set '{name}'");

        self.user_data(element, &name, PropertyCategory::BillboardSet);
        Ok(())
    }

    /// Plane mesh, its entity and the node holding it
    pub(super) fn process_plane(&mut self, element: &Element, parent: NodeId) -> Result<(), LeafError> {
        let name = self.object_name(element, "Plane");
        let distance = attributes::real(element, "distance", 500.0)?;
        let width = attributes::real(element, "width", 1500.0)?;
        let height = attributes::real(element, "height", 1500.0)?;
        let x_segments = attributes::unsigned(element, "xSegments", 1)?;
        let y_segments = attributes::unsigned(element, "ySegments", 1)?;
        let tex_coord_sets = attributes::unsigned(element, "numTexCoordSets", 1)?;
        let u_tile = attributes::real(element, "uTile", 1.0)?;
        let v_tile = attributes::real(element, "vTile", 1.0)?;
        let material = attributes::string_or_empty(element, "material");
        let normals = attributes::boolean(element, "normals", true);
        let receive_shadows = attributes::boolean(element, "receiveShadows", false);
        let movable_plane = attributes::boolean(element, "movablePlane", false);
        let movable = MovableAttributes::read(element, (0, 0))?;
        let up = child_vector(element, "upVector")?.unwrap_or_else(Vec3::z);
        let normal = child_vector(element, "normal")?.unwrap_or_else(Vec3::y);

        let entity_name = format!("{name}Entity");
        let node_name = format!("{name}Node");
        if !self.host.objects().meshes.contains(&name) {
            if self.host.objects().entities.contains(&entity_name) {
                return Err(ObjectResolutionFailure::new(
                    "plane",
                    &name,
                    &entity_name,
                    "an entity with this name already exists",
                )
                .into());
            }
            let plane = Plane::new(normal, distance);
            let mesh = ManualMesh {
                group: self.group.to_string(),
                plane,
                width,
                height,
                x_segments,
                y_segments,
                normals,
                tex_coord_sets,
                u_tile,
                v_tile,
                up,
                vertex_buffer: buffer_policy(element.first_child("vertexBuffer")),
                index_buffer: buffer_policy(element.first_child("indexBuffer")),
                movable_plane: movable_plane.then_some(plane),
            };
            let objects = self.host.objects_mut();
            objects.meshes.create(name.clone(), mesh)?;
            let node = match objects.graph.id(&node_name) {
                Some(node) => node,
                None => objects.graph.create_child(parent, Some(&node_name))?,
            };

            let mut entity = Entity::new(name.clone(), MeshInfo { bones: Vec::new(), sub_mesh_count: 1 });
            movable.apply(&mut entity.movable);
            entity.movable.cast_shadows = false;
            entity.movable.attached_to = Some(node);
            entity.receive_shadows = receive_shadows;
            objects.entities.create(entity_name.clone(), entity)?;

            push_unique(&mut self.contents.meshes, &name);
            push_unique(&mut self.contents.static_entities, &entity_name);
            push_unique(&mut self.contents.nodes, &node_name);
            debug!("Created plane '{name}'");
        }

        if !material.is_empty() {
            if let Some(id) = self.host.objects().entities.id(&entity_name) {
                self.apply_entity_material(id, &entity_name, &material);
            }
        }
        self.user_data(element, &name, PropertyCategory::Plane);
        Ok(())
    }

    pub(super) fn process_animations(&mut self, element: &Element, node: NodeId) -> Result<(), LeafError> {
        for animation in element.children_named("animation") {
            self.isolate(Self::process_animation, animation, node)?;
        }
        Ok(())
    }

    fn process_animation(&mut self, element: &Element, node: NodeId) -> Result<(), LeafError> {
        let name = self.object_name(element, "Animation");
        let interpolation = match attributes::string(element, "interpolationMode", "linear").to_lowercase().as_str() {
            "spline" => InterpolationMode::Spline,
            _ => InterpolationMode::Linear,
        };
        let rotation_interpolation = match attributes::string(element, "rotationInterpolationMode", "linear")
            .to_lowercase()
            .as_str()
        {
            "spherical" => RotationInterpolationMode::Spherical,
            _ => RotationInterpolationMode::Linear,
        };
        let keyframes = element
            .children_named("keyframe")
            .map(keyframe)
            .collect::<Result<Vec<_>, _>>()?;
        let animation = Animation {
            length: attributes::real(element, "length", 0.0)?,
            interpolation,
            rotation_interpolation,
            node,
            keyframes,
            enabled: attributes::boolean(element, "enable", true),
            looping: attributes::boolean(element, "loop", true),
            time_position: 0.0,
        };

        upsert(&mut self.host.objects_mut().animations, &name, animation)?;
        push_unique(&mut self.contents.animations, &name);
        debug!("Created animation '{name}'");
        Ok(())
    }
}

fn custom_parameters(element: &Element) -> Result<Vec<(usize, Vec4)>, DocumentCorrupt> {
    let Some(block) = element.first_child("customParameters") else {
        return Ok(Vec::new());
    };
    block
        .children_named("customParameter")
        .map(|parameter| {
            Ok((
                attributes::unsigned(parameter, "id", 0)? as usize,
                Vec4::new(
                    attributes::real(parameter, "x", 0.0)?,
                    attributes::real(parameter, "y", 0.0)?,
                    attributes::real(parameter, "z", 0.0)?,
                    attributes::real(parameter, "w", 0.0)?,
                ),
            ))
        })
        .collect()
}

fn sub_materials(element: &Element) -> Result<Vec<(usize, String)>, DocumentCorrupt> {
    let Some(block) = element.first_child("subentities") else {
        return Ok(Vec::new());
    };
    block
        .children_named("subentity")
        .map(|sub| {
            Ok((
                attributes::unsigned(sub, "index", 0)? as usize,
                first_attribute(sub, &["materialName", "materialFile", "material"]),
            ))
        })
        .filter(|entry| !matches!(entry, Ok((_, material)) if material.is_empty()))
        .collect()
}

fn billboard(element: &Element) -> Result<Billboard, DocumentCorrupt> {
    let width = attributes::real(element, "width", 0.0)?;
    let height = attributes::real(element, "height", 0.0)?;
    Ok(Billboard {
        position: child_vector(element, "position")?.unwrap_or_else(Vec3::zeros),
        dimensions: (width > 0.0 && height > 0.0).then_some((width, height)),
        rotation: attributes::angle_attribute(element, "rotation", 0.0)?,
        orientation: element
            .first_child("rotation")
            .map(attributes::quaternion)
            .transpose()?
            .unwrap_or_else(Quat::identity),
        colour: element
            .first_child("colourDiffuse")
            .map(attributes::colour)
            .transpose()?
            .unwrap_or(ColourValue::WHITE),
        tex_coords: element
            .first_child("texCoordRectangle")
            .map(attributes::float_rect)
            .transpose()?
            .unwrap_or_else(FloatRect::default),
    })
}

fn keyframe(element: &Element) -> Result<Keyframe, DocumentCorrupt> {
    Ok(Keyframe {
        time: attributes::real(element, "time", 0.0)?,
        translation: child_vector(element, "translation")?.unwrap_or_else(Vec3::zeros),
        rotation: element
            .first_child("rotation")
            .map(attributes::quaternion)
            .transpose()?
            .unwrap_or_else(Quat::identity),
        scale: child_vector(element, "scale")?.unwrap_or_else(|| Vec3::new(1.0, 1.0, 1.0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::host::{HostCapabilities, MemoryHost, MemoryRenderTarget, SceneHost};
    use crate::scene::contents::SceneContents;
    use crate::scene::document::Document;
    use crate::scene::error::SceneError;
    use approx::assert_relative_eq;

    fn run_with(
        host: &mut MemoryHost,
        target: &mut MemoryRenderTarget,
        nodes: &str,
    ) -> Result<SceneContents, SceneError> {
        let config = LoaderConfig::default();
        let mut contents = SceneContents::new(&config);
        let xml = format!("<scene><nodes><node name=\"Holder\">{nodes}</node></nodes></scene>");
        let document = Document::parse(&xml)?;
        SceneMaterializer::new(host, target, &config, &mut contents, "Test", "", "General")
            .materialize(document.scene()?)?;
        Ok(contents)
    }

    fn run(host: &mut MemoryHost, nodes: &str) -> SceneContents {
        run_with(host, &mut MemoryRenderTarget::new(), nodes).unwrap()
    }

    /// Materialize `nodes` under `<scene>Holder` as scene `scene`
    fn materialize_as(host: &mut MemoryHost, scene: &str, nodes: &str) -> SceneContents {
        let config = LoaderConfig::default();
        let mut contents = SceneContents::new(&config);
        let xml = format!("<scene><nodes><node name=\"{scene}Holder\">{nodes}</node></nodes></scene>");
        let document = Document::parse(&xml).unwrap();
        SceneMaterializer::new(host, &mut MemoryRenderTarget::new(), &config, &mut contents, scene, "", "General")
            .materialize(document.scene().unwrap())
            .unwrap();
        contents
    }

    #[test]
    fn test_light_kinds_and_children() {
        let mut host = MemoryHost::new();
        let contents = run(
            &mut host,
            r#"
            <light name="Sun" type="directional" power="2" castShadows="false">
                <position x="9" y="9" z="9"/>
                <normal x="0" y="-1" z="0"/>
                <colourDiffuse r="1" g="0.5" b="0"/>
            </light>
            <light name="Lamp" type="point" affectSpecular="false" ambientOnly="true">
                <position x="1" y="2" z="3"/>
                <colourSpecular r="1" g="1" b="1"/>
                <lightAttenuation range="50" constant="1"/>
            </light>
            <light name="Spot" type="spot">
                <lightRange inner="30" outer="0.5"/>
            </light>
            "#,
        );
        assert_eq!(contents.lights().len(), 3);

        let lights = &host.objects().lights;
        let sun = lights.by_name("Sun").unwrap();
        assert_eq!(sun.kind, LightKind::Directional);
        assert_relative_eq!(sun.power, 2.0);
        assert!(!sun.movable.cast_shadows);
        assert_eq!(sun.position, Vec3::zeros());
        assert_eq!(sun.direction, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(sun.diffuse, ColourValue::rgb(1.0, 0.5, 0.0));
        assert_eq!(sun.movable.attached_to, host.objects().graph.id("Holder"));

        let lamp = lights.by_name("Lamp").unwrap();
        assert_eq!(lamp.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(lamp.specular, Light::default().specular);
        assert_relative_eq!(lamp.attenuation.range, 50.0);
        assert_relative_eq!(lamp.attenuation.linear, 0.0);
        assert!(contents.properties().value_bool("Lamp", "ambientOnly"));

        let spot = lights.by_name("Spot").unwrap();
        assert_relative_eq!(spot.spotlight.inner, utils::deg_to_rad(30.0), epsilon = 1e-6);
        assert_relative_eq!(spot.spotlight.outer, 0.5);
    }

    #[test]
    fn test_light_reprocessing_keeps_identity() {
        let mut host = MemoryHost::new();
        let contents = run(&mut host, r#"<light name="L" power="1"/><light name="L" power="3"/>"#);
        assert_eq!(contents.lights(), &["L".to_string()]);
        assert_eq!(host.objects().lights.len(), 1);
        assert_relative_eq!(host.objects().lights.by_name("L").unwrap().power, 3.0);
    }

    #[test]
    fn test_second_materialization_keeps_handles() {
        let mut host = MemoryHost::new().with_mesh("box.mesh");
        let handles = |host: &MemoryHost| {
            let objects = host.objects();
            (objects.lights.id("L"), objects.cameras.id("C"), objects.entities.id("E"))
        };
        materialize_as(
            &mut host,
            "First",
            r#"<light name="L" power="1"/><camera name="C" fov="0.5"/><entity name="E" meshFile="box.mesh"/>"#,
        );
        let before = handles(&host);
        assert!(before.0.is_some() && before.1.is_some() && before.2.is_some());

        let contents = materialize_as(
            &mut host,
            "Second",
            r#"<light name="L" power="3"/><camera name="C" fov="0.25"/>
               <entity name="E" meshFile="box.mesh" castShadows="false"/>"#,
        );
        assert_eq!(handles(&host), before);
        assert_eq!(contents.lights(), &["L".to_string()]);

        let objects = host.objects();
        assert_eq!(objects.lights.len(), 1);
        assert_eq!(objects.cameras.len(), 1);
        assert_eq!(objects.entities.len(), 1);
        assert_relative_eq!(objects.lights.by_name("L").unwrap().power, 3.0);
        assert_relative_eq!(objects.cameras.by_name("C").unwrap().fov_y, 0.25);
        let entity = objects.entities.by_name("E").unwrap();
        assert!(!entity.movable.cast_shadows);
        assert_eq!(entity.movable.attached_to, objects.graph.id("SecondHolder"));
    }

    #[test]
    fn test_light_direction_from_rotation() {
        let mut host = MemoryHost::new();
        run(
            &mut host,
            r#"<light name="Dir" type="directional"><rotation qw="1" qx="0" qy="0" qz="0"/></light>"#,
        );
        assert_relative_eq!(host.objects().lights.by_name("Dir").unwrap().direction, Vec3::x());
    }

    #[test]
    fn test_camera_projection_and_clipping() {
        let mut host = MemoryHost::new();
        let contents = run(
            &mut host,
            r#"
            <camera name="Persp" fov="90" aspectRatio="1.5">
                <clipping near="1" far="500"/>
                <position x="0" y="5" z="0"/>
            </camera>
            <camera name="Ortho" projectionType="orthographic" orthoWidth="20" orthoHeight="10"/>
            "#,
        );
        assert_eq!(contents.cameras().len(), 2);
        let cameras = &host.objects().cameras;
        let persp = cameras.by_name("Persp").unwrap();
        assert_relative_eq!(persp.fov_y, constants::HALF_PI, epsilon = 1e-6);
        assert_relative_eq!(persp.aspect_ratio, 1.5);
        assert_relative_eq!(persp.near_clip, 1.0);
        assert_relative_eq!(persp.far_clip, 500.0);
        assert_eq!(persp.position, Vec3::new(0.0, 5.0, 0.0));

        let ortho = cameras.by_name("Ortho").unwrap();
        assert_eq!(ortho.projection, ProjectionType::Orthographic);
        assert_relative_eq!(ortho.ortho_width, 20.0);
        assert!(contents.default_cameras().is_empty());
    }

    #[test]
    fn test_clipping_far_before_near_is_corrupt() {
        let mut host = MemoryHost::new().with_capabilities(HostCapabilities {
            infinite_far_plane: false,
            ..HostCapabilities::default()
        });
        let result = run_with(
            &mut host,
            &mut MemoryRenderTarget::new(),
            r#"<camera name="C"><clipping near="10" far="2"/></camera>"#,
        );
        assert!(matches!(result, Err(SceneError::Corrupt(DocumentCorrupt::InvalidValue { .. }))));
    }

    #[test]
    fn test_default_camera_by_name_and_property() {
        let mut host = MemoryHost::new();
        let mut target = MemoryRenderTarget::new();
        let contents = run_with(
            &mut host,
            &mut target,
            r#"<camera name="Main"><userData><property name="isDefault" data=""/></userData></camera>"#,
        )
        .unwrap();
        assert_eq!(contents.default_cameras().get(&0).map(String::as_str), Some("Main"));
        assert_eq!(target.viewports()[0].camera.as_deref(), Some("Main"));

        let mut host = MemoryHost::new();
        let mut target = MemoryRenderTarget::new();
        let contents = run_with(&mut host, &mut target, r#"<camera name="Overviewdefault"/>"#).unwrap();
        assert_eq!(contents.default_cameras().get(&0).map(String::as_str), Some("Overviewdefault"));
    }

    #[test]
    fn test_entity_full_configuration() {
        let mut host = MemoryHost::new()
            .with_mesh("box.mesh")
            .with_material("Crate")
            .with_material("Crate/Lid");
        let contents = run(
            &mut host,
            r#"
            <entity name="Box" meshFile="box.mesh" materialFile="Crate" static="true" receiveShadows="false"
                    queryFlags="4" renderingDistance="300">
                <vertexBuffer usage="dynamicwriteonly" useShadow="true"/>
                <subentities><subentity index="0" materialName="Crate/Lid"/></subentities>
                <customParameters><customParameter id="2" x="1" y="2" z="3" w="4"/></customParameters>
                <userData><property name="weight" data="10"/></userData>
            </entity>
            "#,
        );
        assert_eq!(contents.static_entities(), &["Box".to_string()]);
        assert!(contents.dynamic_entities().is_empty());
        assert!(contents.resolution_failures().is_empty());

        let entity = host.objects().entities.by_name("Box").unwrap();
        assert_eq!(entity.material.as_deref(), Some("Crate"));
        assert_eq!(entity.sub_materials.get(&0).map(String::as_str), Some("Crate/Lid"));
        assert!(!entity.receive_shadows);
        assert_eq!(entity.movable.query_flags, 4);
        assert_eq!(entity.movable.visibility_flags, u32::MAX);
        assert_relative_eq!(entity.movable.rendering_distance, 300.0);
        assert_eq!(entity.vertex_buffer.usage, BufferUsage::DynamicWriteOnly);
        assert!(entity.vertex_buffer.shadow_buffer);
        assert_eq!(entity.custom_parameters.get(&2), Some(&Vec4::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(contents.properties().value("Box", "weight"), Some("10"));
    }

    #[test]
    fn test_entity_static_flag_switch_moves_lists() {
        let mut host = MemoryHost::new().with_mesh("box.mesh");
        let contents = run(
            &mut host,
            r#"<entity name="E" meshFile="box.mesh" static="true"/><entity name="E" meshFile="box.mesh"/>"#,
        );
        assert!(contents.static_entities().is_empty());
        assert_eq!(contents.dynamic_entities(), &["E".to_string()]);

        let contents = run(
            &mut MemoryHost::new().with_mesh("box.mesh"),
            r#"<entity name="E" meshFile="box.mesh"/><entity name="E" meshFile="box.mesh" static="true"/>"#,
        );
        assert_eq!(contents.static_entities(), &["E".to_string()]);
        assert!(contents.dynamic_entities().is_empty());
    }

    #[test]
    fn test_entity_failures_are_isolated() {
        let mut host = MemoryHost::new().with_mesh("box.mesh");
        let contents = run(
            &mut host,
            r#"
            <entity name="Ghost" meshFile="missing.mesh"/>
            <entity name="Plain" meshFile="box.mesh" material="Missing"/>
            <light name="After"/>
            "#,
        );
        assert_eq!(contents.dynamic_entities(), &["Plain".to_string()]);
        assert_eq!(contents.lights(), &["After".to_string()]);
        assert!(host.objects().entities.by_name("Plain").unwrap().material.is_none());

        let references: Vec<&str> = contents.resolution_failures().iter().map(|f| f.reference.as_str()).collect();
        assert_eq!(references, vec!["missing.mesh", "Missing"]);
    }

    #[test]
    fn test_entity_without_mesh_file_is_corrupt() {
        let mut host = MemoryHost::permissive();
        let result = run_with(&mut host, &mut MemoryRenderTarget::new(), r#"<entity name="E"/>"#);
        assert!(matches!(
            result,
            Err(SceneError::Corrupt(DocumentCorrupt::MissingAttribute { attribute, .. })) if attribute == "meshFile"
        ));
    }

    #[test]
    fn test_bone_attachments() {
        let mut host = MemoryHost::permissive().with_skeletal_mesh("robot.mesh", &["Hand"]);
        let contents = run(
            &mut host,
            r#"
            <entity name="Robot" meshFile="robot.mesh">
                <boneAttachments>
                    <boneAttachment name="Torch" bone="Hand">
                        <position x="0" y="1" z="0"/>
                        <light name="TorchLight"/>
                    </boneAttachment>
                    <boneAttachment name="Hat" bone="Head"/>
                </boneAttachments>
            </entity>
            "#,
        );
        let robot = host.objects().entities.by_name("Robot").unwrap();
        assert_eq!(robot.bone_attachments.len(), 1);
        assert_eq!(robot.bone_attachments[0].bone, "Hand");

        let graph = &host.objects().graph;
        let node = graph.id("Hand_Torch").unwrap();
        assert_eq!(graph.get(node).unwrap().parent, graph.id("Holder"));
        assert!(contents.nodes().iter().any(|n| n == "Hand_Torch"));
        assert_eq!(host.objects().lights.by_name("TorchLight").unwrap().movable.attached_to, Some(node));

        assert_eq!(contents.resolution_failures().len(), 1);
        assert_eq!(contents.resolution_failures()[0].reference, "Head");
    }

    #[test]
    fn test_particle_system_template() {
        let mut host = MemoryHost::new().with_particle_template("Smoke", "Smoke/Material");
        let contents = run(
            &mut host,
            r#"<particleSystem name="Chimney" file="Smoke"/><particleSystem name="Nope" file="Fire"/>"#,
        );
        assert_eq!(contents.particle_systems(), &["Chimney".to_string()]);
        assert_eq!(host.objects().particle_systems.by_name("Chimney").unwrap().material, "Smoke/Material");
        assert_eq!(contents.resolution_failures().len(), 1);
    }

    #[test]
    fn test_billboard_set() {
        let mut host = MemoryHost::permissive();
        let contents = run(
            &mut host,
            r#"
            <billboardSet name="Trees" type="c" origin="h" width="4" height="8" poolSize="0" material="Leaves">
                <billboard width="2" height="3" rotation="90">
                    <position x="1" y="0" z="0"/>
                    <colourDiffuse r="0" g="1" b="0"/>
                    <texCoordRectangle left="0" top="0" right="0.5" bottom="0.5"/>
                </billboard>
                <billboard/>
            </billboardSet>
            "#,
        );
        assert_eq!(contents.billboard_sets().len(), 1);
        let set = host.objects().billboard_sets.by_name("Trees").unwrap();
        assert_eq!(set.billboard_type, BillboardType::OrientedSelf);
        assert_eq!(set.origin, BillboardOrigin::BottomCenter);
        assert_relative_eq!(set.default_width, 4.0);
        assert_eq!(set.pool_size, 20);
        assert_eq!(set.material, "Leaves");
        assert_eq!(set.billboards.len(), 2);
        assert_eq!(set.billboards[0].dimensions, Some((2.0, 3.0)));
        assert_relative_eq!(set.billboards[0].rotation, constants::HALF_PI, epsilon = 1e-6);
        assert_eq!(set.billboards[0].tex_coords, FloatRect::new(0.0, 0.0, 0.5, 0.5));
        assert_eq!(set.billboards[1].dimensions, None);
        assert_eq!(set.billboards[1].colour, ColourValue::WHITE);
    }

    #[test]
    fn test_plane_creates_mesh_entity_and_node() {
        let mut host = MemoryHost::permissive();
        let contents = run(
            &mut host,
            r#"<plane name="Floor" distance="0" width="100" height="50" material="Grass" movablePlane="true">
                <normal x="0" y="1" z="0"/>
            </plane>"#,
        );
        assert_eq!(contents.meshes(), &["Floor".to_string()]);
        assert_eq!(contents.static_entities(), &["FloorEntity".to_string()]);
        assert!(contents.nodes().iter().any(|n| n == "FloorNode"));

        let objects = host.objects();
        let mesh = objects.meshes.by_name("Floor").unwrap();
        assert_relative_eq!(mesh.width, 100.0);
        assert_eq!(mesh.movable_plane, Some(Plane::new(Vec3::y(), 0.0)));
        let entity = objects.entities.by_name("FloorEntity").unwrap();
        assert!(!entity.movable.cast_shadows);
        assert_eq!(entity.material.as_deref(), Some("Grass"));
        assert_eq!(entity.movable.attached_to, objects.graph.id("FloorNode"));
    }

    #[test]
    fn test_plane_keeps_foreign_entity() {
        let mut host = MemoryHost::permissive();
        let statue = Entity::new("statue.mesh", MeshInfo { bones: Vec::new(), sub_mesh_count: 1 });
        let foreign = host.objects_mut().entities.create("FloorEntity", statue).unwrap();
        let contents = run(&mut host, r#"<plane name="Floor" material="Grass"/>"#);

        let objects = host.objects();
        assert_eq!(objects.entities.id("FloorEntity"), Some(foreign));
        assert_eq!(objects.entities.by_name("FloorEntity").unwrap().mesh, "statue.mesh");
        assert!(objects.entities.by_name("FloorEntity").unwrap().material.is_none());
        assert!(!objects.meshes.contains("Floor"));
        assert!(contents.meshes().is_empty());
        assert!(contents.static_entities().is_empty());
        assert_eq!(contents.resolution_failures().len(), 1);
        assert_eq!(contents.resolution_failures()[0].reference, "FloorEntity");
    }

    #[test]
    fn test_animations() {
        let mut host = MemoryHost::new();
        let contents = run(
            &mut host,
            r#"<animations>
                <animation name="Bob" length="2" interpolationMode="spline" loop="false">
                    <keyframe time="0"><translation x="0" y="0" z="0"/></keyframe>
                    <keyframe time="1"><translation x="0" y="1" z="0"/><scale x="2" y="2" z="2"/></keyframe>
                </animation>
            </animations>"#,
        );
        assert_eq!(contents.animations(), &["Bob".to_string()]);
        let animation = host.objects().animations.by_name("Bob").unwrap();
        assert_eq!(animation.interpolation, InterpolationMode::Spline);
        assert!(!animation.looping);
        assert_eq!(animation.node, host.objects().graph.id("Holder").unwrap());
        assert_eq!(animation.keyframes.len(), 2);
        assert_eq!(animation.keyframes[1].translation, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(animation.keyframes[1].scale, Vec3::new(2.0, 2.0, 2.0));
    }
}
