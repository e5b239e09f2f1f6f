//! Scene-level resources: externals, terrain, octree layout, render
//! textures, flag declarations and batched geometry

use crate::foundation::logging::{debug, info};
use crate::foundation::math::{Quat, Vec3};
use crate::host::{
    BatchedGeometry, GeometryEntity, InstancedGeometry, InstancedGeometryId, PixelFormat, RenderTexture,
    StaticGeometry, StaticGeometryId, WorldGeometry,
};
use crate::scene::attributes;
use crate::scene::contents::{push_unique, EnvironmentBlocks, OctreeCell, OctreeGeometry, OctreeLayout, OctreeMesh};
use crate::scene::document::Element;
use crate::scene::error::{DocumentCorrupt, LeafError, ObjectResolutionFailure};
use crate::scene::properties::PropertyCategory;

use super::{log_skipped, orientation, upsert, SceneMaterializer};

/// Batch an entity is baked into
#[derive(Debug, Clone, Copy)]
enum GeometryRef {
    Static(StaticGeometryId),
    Instanced(InstancedGeometryId),
}

impl<'h> SceneMaterializer<'h> {
    pub(super) fn process_externals(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        for item in element.children_named("item") {
            let kind = attributes::string_or_empty(item, "type");
            let file = item
                .first_child("file")
                .map(|file| attributes::string_or_empty(file, "name"))
                .unwrap_or_default();
            if kind != "material" {
                info!("Ignoring external {kind} item '{file}'");
                continue;
            }
            match self.host.load_material(&file, self.group) {
                Ok(()) => {
                    debug!("Loaded external material '{file}'");
                    self.contents.externals.insert(file, kind);
                }
                Err(error) => self.report(ObjectResolutionFailure::new("external", self.scene_name, file, error)),
            }
        }
        let owner = self.scene_name;
        self.user_data(element, owner, PropertyCategory::External);
        Ok(())
    }

    pub(super) fn process_terrain(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let data_file = attributes::required_string(element, "dataFile")?.to_string();
        let geometry = WorldGeometry {
            data_file: data_file.clone(),
            render_queue: attributes::render_queue_attribute(element, "renderQueue"),
        };
        let owner = self.scene_name;
        self.user_data(element, owner, PropertyCategory::Terrain);
        self.host
            .set_world_geometry(geometry)
            .map_err(|error| ObjectResolutionFailure::new("terrain", owner, data_file, error))?;
        self.contents.environment_blocks |= EnvironmentBlocks::TERRAIN;
        Ok(())
    }

    pub(super) fn process_octree(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let mut layout = OctreeLayout {
            bin_file: attributes::string_or_empty(element, "binFile"),
            ..OctreeLayout::default()
        };
        for cell in element.children_named("octNode") {
            layout.cells.push(self.octree_cell(cell)?);
        }
        for mesh in element.children_named("octMesh") {
            layout.meshes.push(self.octree_mesh(mesh)?);
        }
        debug!(
            "Octree '{}' has {} top level cell(s) and {} mesh(es)",
            layout.bin_file,
            layout.cells.len(),
            layout.meshes.len()
        );
        self.contents.octree = Some(layout);

        let owner = self.scene_name;
        self.user_data(element, owner, PropertyCategory::Octree);
        Ok(())
    }

    fn octree_cell(&mut self, element: &Element) -> Result<OctreeCell, DocumentCorrupt> {
        let mut cell = OctreeCell {
            position: Vec3::new(
                attributes::real(element, "px", 0.0)?,
                attributes::real(element, "py", 0.0)?,
                attributes::real(element, "pz", 0.0)?,
            ),
            width: attributes::real(element, "width", 0.0)?,
            height: attributes::real(element, "height", 0.0)?,
            depth: attributes::real(element, "depth", 0.0)?,
            children: Vec::new(),
        };
        for child in element.children_named("octNode") {
            cell.children.push(self.octree_cell(child)?);
        }
        let owner = self.scene_name;
        self.user_data(element, owner, PropertyCategory::OctreeNode);
        Ok(cell)
    }

    fn octree_mesh(&mut self, element: &Element) -> Result<OctreeMesh, DocumentCorrupt> {
        let geometry = match element.first_child("octGeometry") {
            Some(counts) => Some(OctreeGeometry {
                binary_data_offset: attributes::unsigned(counts, "binaryDataOffset", 0)?,
                vertex_total: attributes::unsigned(counts, "vertTotal", 0)?,
                triangle_total: attributes::unsigned(counts, "triTotal", 0)?,
                normal_total: attributes::unsigned(counts, "normalTotal", 0)?,
                colour_total: attributes::unsigned(counts, "colorTotal", 0)?,
                tex_sets: attributes::unsigned(counts, "texSets", 0)?,
                tex_total: attributes::unsigned(counts, "texTotal", 0)?,
            }),
            None => None,
        };
        let (material, texture) = element
            .first_child("octMaterial")
            .map(|material| {
                (
                    attributes::string_or_empty(material, "name"),
                    attributes::string_or_empty(material, "texture"),
                )
            })
            .unwrap_or_default();
        let owner = self.scene_name;
        self.user_data(element, owner, PropertyCategory::OctreeMesh);
        Ok(OctreeMesh {
            geometry,
            material,
            texture,
        })
    }

    pub(super) fn process_render_textures(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        for texture in element.children_named("renderTexture") {
            self.isolate(Self::process_render_texture, texture, ())?;
        }
        Ok(())
    }

    fn process_render_texture(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let name = self.object_name(element, "RenderTexture");
        let pixel_format = match attributes::string_or_empty(element, "pixelFormat").as_str() {
            "" if self.target.colour_depth() == 16 => PixelFormat::A4R4G4B4,
            "" => PixelFormat::A8R8G8B8,
            format => attributes::pixel_format(format),
        };
        let texture_type = attributes::texture_type(&attributes::string_or_empty(element, "textureType"));
        let auto_update = attributes::boolean(element, "autoUpdate", false);
        let texture = RenderTexture {
            group: self.group.to_string(),
            width: attributes::unsigned(element, "width", 512)?,
            height: attributes::unsigned(element, "height", 512)?,
            pixel_format,
            texture_type,
            camera: self.optional_prefixed(&attributes::string_or_empty(element, "camera")),
            scheme: attributes::string_or_empty(element, "scheme"),
            clear_every_frame: attributes::boolean(element, "clearEveryFrame", false),
            auto_update: vec![auto_update; texture_type.face_count()],
            hide_render_object: attributes::boolean(element, "hideRenderObject", false),
            render_object: self.optional_prefixed(&attributes::string_or_empty(element, "renderObjectName")),
            render_plane: element.first_child("renderPlane").map(attributes::plane).transpose()?,
            materials: self.name_list(element, "materials", "material", false),
            hidden_objects: self.name_list(element, "hiddenObjects", "hiddenObject", true),
            exclusive_objects: self.name_list(element, "exclusiveObjects", "exclusiveObject", true),
        };
        upsert(&mut self.host.objects_mut().render_textures, &name, texture)?;
        push_unique(&mut self.contents.render_textures, &name);
        debug!("Created render texture '{name}' ({})", pixel_format.name());
        Ok(())
    }

    fn optional_prefixed(&self, name: &str) -> String {
        if name.is_empty() {
            String::new()
        } else {
            self.prefixed(name)
        }
    }

    /// `name` attributes of `block/entry` children
    fn name_list(&self, element: &Element, block: &str, entry: &str, prefixed: bool) -> Vec<String> {
        element
            .first_child(block)
            .into_iter()
            .flat_map(|block| block.children_named(entry))
            .map(|entry| attributes::string_or_empty(entry, "name"))
            .filter(|name| !name.is_empty())
            .map(|name| if prefixed { self.prefixed(&name) } else { name })
            .collect()
    }

    pub(super) fn process_query_flags(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        self.contents.settings.query_flags = attributes::flag_list(element, "queryFlag")?;
        Ok(())
    }

    pub(super) fn process_visibility_flags(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        self.contents.settings.visibility_flags = attributes::flag_list(element, "visibilityFlag")?;
        Ok(())
    }

    pub(super) fn process_static_geometries(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        for geometry in element.children_named("staticGeometry") {
            self.isolate(Self::process_static_geometry, geometry, ())?;
        }
        Ok(())
    }

    fn process_static_geometry(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let name = self.object_name(element, "StaticGeometry");
        let batch = self.batch_attributes(element)?;
        let id = upsert(&mut self.host.objects_mut().static_geometries, &name, StaticGeometry { batch })?;
        push_unique(&mut self.contents.static_geometries, &name);

        self.geometry_entities(element, GeometryRef::Static(id))?;
        if let Some(geometry) = self.host.objects_mut().static_geometries.get_mut(id) {
            geometry.batch.build();
        }
        debug!("Built static geometry '{name}'");
        Ok(())
    }

    pub(super) fn process_instanced_geometries(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        for geometry in element.children_named("instancedGeometry") {
            self.isolate(Self::process_instanced_geometry, geometry, ())?;
        }
        Ok(())
    }

    fn process_instanced_geometry(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let name = self.object_name(element, "InstancedGeometry");
        let geometry = InstancedGeometry {
            batch: self.batch_attributes(element)?,
            batch_count: attributes::unsigned(element, "batchCount", 0)?,
        };
        let id = upsert(&mut self.host.objects_mut().instanced_geometries, &name, geometry)?;
        push_unique(&mut self.contents.instanced_geometries, &name);

        self.geometry_entities(element, GeometryRef::Instanced(id))?;
        if let Some(geometry) = self.host.objects_mut().instanced_geometries.get_mut(id) {
            geometry.batch.build();
        }
        debug!("Built instanced geometry '{name}'");
        Ok(())
    }

    fn batch_attributes(&self, element: &Element) -> Result<BatchedGeometry, DocumentCorrupt> {
        let vector = |tag: &str| element.first_child(tag).map(attributes::vector3).transpose();
        Ok(BatchedGeometry {
            cast_shadows: attributes::boolean(element, "castShadows", true),
            visible: attributes::boolean(element, "visible", true),
            render_queue: attributes::render_queue_attribute(element, "renderQueue"),
            rendering_distance: attributes::real(element, "renderingDistance", 0.0)?,
            origin: vector("origin")?.unwrap_or_else(Vec3::zeros),
            dimensions: vector("dimensions")?.unwrap_or_else(|| self.config.geometry_dimensions()),
            entities: Vec::new(),
            built: false,
        })
    }

    fn geometry_entities(&mut self, element: &Element, geometry: GeometryRef) -> Result<(), LeafError> {
        if let Some(entities) = element.first_child("entities") {
            for entity in entities.children_named("entity") {
                self.isolate(Self::process_geometry_entity, entity, geometry)?;
            }
        }
        Ok(())
    }

    /// Entity baked into a batch instead of hanging off a node
    fn process_geometry_entity(&mut self, element: &Element, geometry: GeometryRef) -> Result<(), LeafError> {
        let (_, name) = self.create_entity(element)?;
        let factor = self.contents.settings.unit_factor;
        let placement = GeometryEntity {
            entity: name.clone(),
            position: element
                .first_child("position")
                .map(attributes::vector3)
                .transpose()?
                .map_or_else(Vec3::zeros, |p| p * factor),
            orientation: orientation(element)?.unwrap_or_else(Quat::identity),
            scale: element
                .first_child("scale")
                .map(attributes::vector3)
                .transpose()?
                .unwrap_or_else(|| Vec3::new(1.0, 1.0, 1.0)),
        };
        let objects = self.host.objects_mut();
        let batch = match geometry {
            GeometryRef::Static(id) => objects.static_geometries.get_mut(id).map(|g| &mut g.batch),
            GeometryRef::Instanced(id) => objects.instanced_geometries.get_mut(id).map(|g| &mut g.batch),
        };
        if let Some(batch) = batch {
            batch.add_entity(placement);
        }
        self.user_data(element, &name, PropertyCategory::Entity);
        Ok(())
    }

    pub(super) fn process_portal_zones(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        log_skipped("portal zone", element.children().len());
        Ok(())
    }
}
