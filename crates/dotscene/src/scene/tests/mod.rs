//! End-to-end scene scenarios: load, inspect, export, reload and unload

use std::collections::BTreeSet;

use approx::assert_relative_eq;

use crate::config::{LoaderConfig, SceneOptions};
use crate::foundation::math::ColourValue;
use crate::host::{Camera, MemoryHost, MemoryRenderTarget, RenderTarget, SceneHost, Viewport};
use crate::resource::{MemoryGroup, ResourceGroupManager};

use super::{CatalogError, DocumentCorrupt, PropertyCategory, SceneCatalog, SceneContext, SceneError, SceneResource};

const YARD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<scene formatVersion="1.0" author="Level Team" upAxis="y">
    <environment>
        <colourAmbient r="0.25" g="0.25" b="0.25"/>
        <colourBackground r="0.1" g="0.2" b="0.3"/>
        <userData><property name="weather" data="rain"/></userData>
    </environment>
    <nodes>
        <node name="Gate" isTarget="true">
            <position x="4" y="0" z="-2"/>
            <entity name="GateEntity" meshFile="gate.mesh" material="Iron" static="true"/>
            <userData><property name="isLocked"/></userData>
        </node>
        <node>
            <position x="1" y="0" z="1"/>
        </node>
        <node name="Tower">
            <position x="0" y="12" z="0"/>
            <scale x="2" y="2" z="2"/>
            <entity name="Bell" meshFile="bell.mesh" castShadows="false">
                <userData><property name="tone" data="C"/></userData>
            </entity>
            <light name="Beacon" type="spot" power="2">
                <normal x="0" y="-1" z="0"/>
                <colourDiffuse r="1" g="0.5" b="0"/>
                <lightRange inner="0.3" outer="0.6" falloff="1"/>
            </light>
            <node name="Lookout">
                <camera name="Watch" fov="0.8">
                    <clipping near="0.5" far="900"/>
                </camera>
            </node>
        </node>
    </nodes>
    <userData><property name="difficulty" data="3"/></userData>
</scene>"#;

fn resources(files: &[(&str, &str)]) -> ResourceGroupManager {
    crate::foundation::logging::try_init();
    let mut group = MemoryGroup::new("General");
    for (file, text) in files {
        group.insert(*file, *text);
    }
    ResourceGroupManager::new().with_group(group)
}

fn property_set(scene: &SceneResource) -> BTreeSet<(String, String, String, &'static str)> {
    scene
        .properties()
        .iter()
        .map(|p| (p.owner.clone(), p.name.clone(), p.value.clone(), p.category.name()))
        .collect()
}

/// Load `text` as scene "level" into a fresh permissive host
fn load_level(text: &str, prefix: &str) -> (MemoryHost, SceneResource) {
    let mut host = MemoryHost::permissive();
    let mut target = MemoryRenderTarget::new();
    let resources = resources(&[("level.scene", text)]);
    let mut ctx = SceneContext::new(&mut host, &mut target, &resources);
    let mut scene = SceneResource::new("level", SceneOptions::new().with_prefix(prefix), LoaderConfig::default());
    scene.load(&mut ctx).unwrap();
    (host, scene)
}

/// Export a loaded level and load the output into a second host
fn reload_export(host: &MemoryHost, scene: &SceneResource) -> (MemoryHost, SceneResource) {
    let exported = scene.export_document(host).unwrap();
    load_level(&exported, scene.prefix())
}

fn assert_viewport_cameras_exist(host: &dyn SceneHost, target: &dyn RenderTarget) {
    for index in 0..target.viewport_count() {
        if let Some(camera) = target.viewport(index).and_then(|v| v.camera.as_deref()) {
            assert!(
                host.objects().cameras.contains(camera),
                "viewport {index} shows missing camera '{camera}'"
            );
        }
    }
}

fn sorted(names: &[String]) -> Vec<String> {
    let mut names = names.to_vec();
    names.sort();
    names
}

#[test]
fn test_single_node_with_entity_and_light() {
    let text = r#"
        <scene>
            <nodes>
                <node name="Box">
                    <entity name="BoxEntity" meshFile="box.mesh"/>
                    <light name="Sun" type="point"/>
                </node>
            </nodes>
        </scene>"#;
    let mut host = MemoryHost::new().with_mesh("box.mesh");
    let mut target = MemoryRenderTarget::new();
    let resources = resources(&[("box.scene", text)]);
    let mut ctx = SceneContext::new(&mut host, &mut target, &resources);

    let mut scene = SceneResource::new("box", SceneOptions::new(), LoaderConfig::default());
    scene.load(&mut ctx).unwrap();

    let contents = scene.contents();
    assert_eq!(contents.dynamic_entities(), ["BoxEntity".to_string()]);
    assert!(contents.static_entities().is_empty());
    assert_eq!(contents.lights(), ["Sun".to_string()]);
    assert!(contents.resolution_failures().is_empty());

    let node = ctx.host.objects().graph.id("Box").unwrap();
    let entity = scene.entity(&*ctx.host, "BoxEntity").unwrap();
    assert_eq!(entity.movable.attached_to, Some(node));
    assert!(scene.light(&*ctx.host, "Sun").is_some());
    assert!(scene.scene_node(&*ctx.host, "Box").is_some());
}

#[test]
fn test_properties_and_queries_after_load() {
    let mut host = MemoryHost::permissive();
    let mut target = MemoryRenderTarget::new();
    let resources = resources(&[("yard.scene", YARD)]);
    let mut ctx = SceneContext::new(&mut host, &mut target, &resources);

    let mut scene = SceneResource::new("yard", SceneOptions::new().with_prefix("y_"), LoaderConfig::default());
    scene.load(&mut ctx).unwrap();

    assert_eq!(scene.property("yard", "author"), Some("Level Team"));
    assert_eq!(scene.property_int("yard", "difficulty"), Some(3));
    assert_eq!(scene.property("yard", "weather"), Some("rain"));
    assert!(scene.property_bool("y_Gate", "isTarget"));
    assert!(scene.property_bool("y_Gate", "locked"));
    assert_eq!(scene.property("y_Bell", "tone"), Some("C"));
    let owners: Vec<_> = scene
        .find_objects_by_property(PropertyCategory::Entity, "tone", "C")
        .into_iter()
        .map(|p| p.owner.as_str())
        .collect();
    assert_eq!(owners, vec!["y_Bell"]);

    assert_eq!(scene.contents().static_entities(), ["y_GateEntity".to_string()]);
    assert_eq!(scene.default_camera(&*ctx.target, 0).as_deref(), Some("y_Watch"));
    let watch = scene.camera(&*ctx.host, "y_Watch").unwrap();
    assert_relative_eq!(watch.fov_y, 0.8);
    assert_relative_eq!(watch.near_clip, 0.5);
    assert_eq!(ctx.target.viewport(0).map(|v| v.background), Some(ColourValue::rgb(0.1, 0.2, 0.3)));
}

#[test]
fn test_unload_restores_existing_viewports() {
    let original = ColourValue::rgb(0.5, 0.5, 0.5);
    let mut host = MemoryHost::permissive();
    host.objects_mut().cameras.create("Player", Camera::default()).unwrap();
    let mut target = MemoryRenderTarget::new().with_viewport(Viewport::new("Player", 0).with_background(original));
    let resources = resources(&[("yard.scene", YARD)]);
    let mut ctx = SceneContext::new(&mut host, &mut target, &resources);

    let mut scene = SceneResource::new("yard", SceneOptions::new(), LoaderConfig::default());
    scene.load(&mut ctx).unwrap();
    assert_eq!(ctx.target.viewport(0).and_then(|v| v.camera.as_deref()), Some("Watch"));

    scene.unload(&mut ctx).unwrap();
    let viewport = ctx.target.viewport(0).unwrap();
    assert_eq!(viewport.camera.as_deref(), Some("Player"));
    assert_eq!(viewport.background, original);
    assert_eq!(ctx.target.viewport_count(), 1);

    let objects = ctx.host.objects();
    assert!(objects.cameras.contains("Player"));
    assert!(!objects.cameras.contains("Watch"));
    assert!(objects.entities.is_empty());
    assert!(!objects.graph.contains("Tower"));
}

#[test]
fn test_missing_root_is_corrupt() {
    let mut host = MemoryHost::permissive();
    let mut target = MemoryRenderTarget::new();
    let resources = resources(&[("flat.scene", r#"<nodes><node name="Lost"/></nodes>"#)]);
    let mut ctx = SceneContext::new(&mut host, &mut target, &resources);

    let mut scene = SceneResource::new("flat", SceneOptions::new(), LoaderConfig::default());
    let err = scene.load(&mut ctx).unwrap_err();
    assert!(matches!(err, SceneError::Corrupt(DocumentCorrupt::MissingRoot(_))));
    assert!(!scene.is_loaded());
    assert!(!ctx.host.objects().graph.contains("Lost"));
    assert!(!ctx.host.objects().graph.contains("flatRootNode"));
}

#[test]
fn test_exported_document_reloads_identically() {
    let mut host = MemoryHost::permissive();
    let mut target = MemoryRenderTarget::new();
    let first = resources(&[("yard.scene", YARD)]);
    let options = SceneOptions::new().with_prefix("a_");

    let (exported, nodes, entities, lights, cameras, properties) = {
        let mut ctx = SceneContext::new(&mut host, &mut target, &first);
        let mut scene = SceneResource::new("yard", options.clone(), LoaderConfig::default());
        scene.load(&mut ctx).unwrap();
        let exported = scene.export_document(&*ctx.host).unwrap();
        let contents = scene.contents();
        let snapshot = (
            exported,
            sorted(contents.nodes()),
            sorted(&[contents.static_entities(), contents.dynamic_entities()].concat()),
            sorted(contents.lights()),
            sorted(contents.cameras()),
            property_set(&scene),
        );
        scene.unload(&mut ctx).unwrap();
        snapshot
    };
    assert!(!exported.contains("a_Gate"));
    assert!(nodes.contains(&"a_Node1".to_string()));

    let second = resources(&[("yard.scene", exported.as_str())]);
    let mut ctx = SceneContext::new(&mut host, &mut target, &second);
    let mut reloaded = SceneResource::new("yard", options, LoaderConfig::default());
    reloaded.load(&mut ctx).unwrap();

    let contents = reloaded.contents();
    assert_eq!(sorted(contents.nodes()), nodes);
    assert_eq!(
        sorted(&[contents.static_entities(), contents.dynamic_entities()].concat()),
        entities
    );
    assert_eq!(sorted(contents.lights()), lights);
    assert_eq!(sorted(contents.cameras()), cameras);
    assert_eq!(property_set(&reloaded), properties);

    let beacon = reloaded.light(&*ctx.host, "a_Beacon").unwrap();
    assert_relative_eq!(beacon.spotlight.outer, 0.6, epsilon = 1e-5);
    assert_relative_eq!(beacon.power, 2.0);
    let tower = reloaded.scene_node(&*ctx.host, "a_Tower").unwrap();
    assert_relative_eq!(tower.transform.position.y, 12.0);
    assert_relative_eq!(tower.transform.scale.x, 2.0);
    let unnamed = reloaded.scene_node(&*ctx.host, "a_Node1").unwrap();
    assert_relative_eq!(unnamed.transform.position.z, 1.0);
}

#[test]
fn test_environment_blocks_survive_export() {
    let text = r#"
        <scene>
            <environment>
                <fog mode="linear" linearStart="20" linearEnd="400">
                    <colourDiffuse r="0.6" g="0.6" b="0.7"/>
                    <userData><property name="season" data="autumn"/></userData>
                </fog>
                <skyBox material="Stars" distance="3000" drawFirst="false">
                    <userData><property name="layer" data="far"/></userData>
                </skyBox>
                <skyDome material="Clouds" curvature="12" tiling="4" xSegments="8" ySegments="12">
                    <userData><property name="speed" data="2"/></userData>
                </skyDome>
                <skyPlane material="Haze" planeD="200" bow="1.5" scale="500">
                    <userData><property name="tint" data="grey"/></userData>
                </skyPlane>
                <clipping near="2" far="5000"/>
                <shadows technique="textureAdditive" selfShadow="true" farDistance="800">
                    <colourShadow r="0.2" g="0.2" b="0.2"/>
                    <shadowCameraSetup type="pssm" splitCount="4" splitPadding="2"/>
                    <shadowTextures size="1024" count="2" shadowCasterMaterial="Caster"/>
                </shadows>
            </environment>
        </scene>"#;
    let (host, scene) = load_level(text, "");
    let (reloaded_host, reloaded) = reload_export(&host, &scene);

    let environment = &reloaded_host.objects().environment;
    assert_eq!(environment, &host.objects().environment);
    assert_eq!(environment.sky_plane.as_ref().map(|sky| sky.bow), Some(1.5));
    assert_eq!(
        environment.shadows.textures.as_ref().and_then(|t| t.caster_material.as_deref()),
        Some("Caster")
    );
    assert_eq!(reloaded.contents().environment_blocks(), scene.contents().environment_blocks());
    assert_relative_eq!(reloaded.contents().settings().near_clip, 2.0);
    assert_relative_eq!(reloaded.contents().settings().far_clip, 5000.0);
    assert_eq!(property_set(&reloaded), property_set(&scene));
}

#[test]
fn test_foreign_environment_is_not_exported() {
    let mut host = MemoryHost::permissive();
    host.objects_mut().environment.fog.density = 0.5;
    let mut target = MemoryRenderTarget::new();
    let resources = resources(&[("level.scene", "<scene/>")]);
    let mut ctx = SceneContext::new(&mut host, &mut target, &resources);
    let mut scene = SceneResource::new("level", SceneOptions::new(), LoaderConfig::default());
    scene.load(&mut ctx).unwrap();

    let exported = scene.export_document(&*ctx.host).unwrap();
    assert!(!exported.contains("<fog"));
    assert!(!exported.contains("<shadows"));
}

#[test]
fn test_terrain_and_octree_survive_export() {
    let text = r#"
        <scene>
            <terrain dataFile="hills.cfg" renderQueue="worldGeometry1">
                <userData><property name="biome" data="grass"/></userData>
            </terrain>
            <octree binFile="level.oct">
                <octNode px="0" py="0" pz="0" width="100" height="50" depth="100">
                    <octNode px="25" py="0" pz="25" width="50" height="50" depth="50"/>
                    <userData><property name="cells" data="2"/></userData>
                </octNode>
                <octMesh>
                    <octGeometry binaryDataOffset="64" vertTotal="300" triTotal="100" texSets="1"/>
                    <octMaterial name="Stone" texture="stone.png"/>
                    <userData><property name="lod" data="0"/></userData>
                </octMesh>
                <userData><property name="built" data="yes"/></userData>
            </octree>
        </scene>"#;
    let (host, scene) = load_level(text, "t_");
    let (reloaded_host, reloaded) = reload_export(&host, &scene);

    assert_eq!(
        reloaded_host.objects().environment.world_geometry,
        host.objects().environment.world_geometry
    );
    assert_eq!(reloaded.octree(), scene.octree());
    assert_eq!(reloaded.octree().map(|o| o.cells[0].children.len()), Some(1));
    assert_eq!(property_set(&reloaded), property_set(&scene));
}

#[test]
fn test_render_textures_and_geometries_survive_export() {
    let text = r#"
        <scene>
            <nodes>
                <node name="Pool">
                    <camera name="MirrorCam"/>
                </node>
            </nodes>
            <renderTextures>
                <renderTexture name="Reflection" pixelFormat="R8G8B8" textureType="cubic" width="256"
                    height="128" autoUpdate="true" camera="MirrorCam" scheme="water" clearEveryFrame="true"
                    hideRenderObject="true" renderObjectName="Pool">
                    <renderPlane x="0" y="1" z="0" d="2"/>
                    <materials><material name="Water"/></materials>
                    <hiddenObjects><hiddenObject name="Pool"/></hiddenObjects>
                </renderTexture>
            </renderTextures>
            <queryFlags><queryFlag bit="1"/><queryFlag bit="4"/></queryFlags>
            <visibilityFlags><visibilityFlag bit="2"/></visibilityFlags>
            <staticGeometries>
                <staticGeometry name="Rocks" castShadows="false" renderQueue="overlay" renderingDistance="300">
                    <origin x="1" y="2" z="3"/>
                    <dimensions x="100" y="100" z="100"/>
                    <entities>
                        <entity name="Rock1" meshFile="rock.mesh">
                            <position x="5" y="0" z="-5"/>
                            <rotation qw="0" qx="0" qy="1" qz="0"/>
                            <scale x="2" y="2" z="2"/>
                            <userData><property name="kind" data="granite"/></userData>
                        </entity>
                    </entities>
                </staticGeometry>
            </staticGeometries>
            <instancedGeometries>
                <instancedGeometry name="Grass" batchCount="4">
                    <entities>
                        <entity name="Blade1" meshFile="blade.mesh"/>
                    </entities>
                </instancedGeometry>
            </instancedGeometries>
        </scene>"#;
    let (host, scene) = load_level(text, "g_");
    let (reloaded_host, reloaded) = reload_export(&host, &scene);
    let (before, after) = (host.objects(), reloaded_host.objects());

    let contents = reloaded.contents();
    assert_eq!(contents.render_textures(), scene.contents().render_textures());
    let texture = after.render_textures.by_name("g_Reflection").unwrap();
    assert_eq!(Some(texture), before.render_textures.by_name("g_Reflection"));
    assert_eq!(texture.camera, "g_MirrorCam");
    assert_eq!(texture.hidden_objects, vec!["g_Pool".to_string()]);

    assert_eq!(contents.settings().query_flags, 5);
    assert_eq!(contents.settings().visibility_flags, 2);

    assert_eq!(contents.static_geometries(), ["g_Rocks".to_string()]);
    assert_eq!(contents.instanced_geometries(), ["g_Grass".to_string()]);
    assert_eq!(
        sorted(&[contents.static_entities(), contents.dynamic_entities()].concat()),
        sorted(&[scene.contents().static_entities(), scene.contents().dynamic_entities()].concat())
    );
    let rocks = &after.static_geometries.by_name("g_Rocks").unwrap().batch;
    let original = &before.static_geometries.by_name("g_Rocks").unwrap().batch;
    assert_eq!(rocks.render_queue, original.render_queue);
    assert!(!rocks.cast_shadows);
    assert_eq!(rocks.origin, original.origin);
    assert_eq!(rocks.entities.len(), 1);
    let (placed, expected) = (&rocks.entities[0], &original.entities[0]);
    assert_eq!(placed.entity, "g_Rock1");
    assert_eq!(placed.position, expected.position);
    assert_eq!(placed.scale, expected.scale);
    assert_relative_eq!(placed.orientation.angle_to(&expected.orientation), 0.0, epsilon = 1e-5);
    let grass = after.instanced_geometries.by_name("g_Grass").unwrap();
    assert_eq!(grass.batch_count, 4);
    assert_eq!(grass.batch.entities[0].entity, "g_Blade1");

    assert_eq!(property_set(&reloaded), property_set(&scene));
}

#[test]
fn test_look_targets_survive_export() {
    let text = r#"
        <scene>
            <nodes>
                <node name="Post">
                    <position x="10" y="0" z="0"/>
                </node>
                <node name="Eye">
                    <position x="0" y="2" z="0"/>
                    <rotation qw="0.7071068" qx="0.7071068" qy="0" qz="0"/>
                    <lookTarget nodeName="Post" relativeTo="world">
                        <localDirection x="0" y="0" z="-1"/>
                        <userData><property name="focus" data="near"/></userData>
                    </lookTarget>
                </node>
                <node name="Watcher">
                    <lookTarget relativeTo="parent">
                        <position x="0" y="5" z="-5"/>
                    </lookTarget>
                </node>
            </nodes>
        </scene>"#;
    let (host, scene) = load_level(text, "l_");
    let (reloaded_host, reloaded) = reload_export(&host, &scene);

    for name in ["l_Eye", "l_Watcher"] {
        let before = scene.scene_node(&host, name).unwrap();
        let after = reloaded.scene_node(&reloaded_host, name).unwrap();
        assert_relative_eq!(
            after.transform.rotation.angle_to(&before.transform.rotation),
            0.0,
            epsilon = 1e-4
        );
        let (look, expected) = (after.look_target.as_ref().unwrap(), before.look_target.as_ref().unwrap());
        assert_eq!(look.node_name, expected.node_name);
        assert_eq!(look.position, expected.position);
        assert_eq!(look.relative_to, expected.relative_to);
        assert_relative_eq!(look.base_rotation.angle_to(&expected.base_rotation), 0.0, epsilon = 1e-4);
    }
    assert!(reloaded.contents().resolution_failures().is_empty());
    assert_eq!(property_set(&reloaded), property_set(&scene));
}

#[test]
fn test_empty_scene_unload_leaves_no_viewport() {
    let mut host = MemoryHost::permissive();
    let mut target = MemoryRenderTarget::new();
    let resources = resources(&[("bare.scene", "<scene/>")]);
    let mut ctx = SceneContext::new(&mut host, &mut target, &resources);

    let mut scene = SceneResource::new("bare", SceneOptions::new(), LoaderConfig::default());
    scene.load(&mut ctx).unwrap();
    assert_eq!(ctx.target.viewport_count(), 1);
    assert_eq!(scene.default_camera(&*ctx.target, 0).as_deref(), Some("bareCamera"));

    scene.unload(&mut ctx).unwrap();
    assert_eq!(ctx.target.viewport_count(), 0);
    assert!(!ctx.host.objects().cameras.contains("bareCamera"));
    assert_viewport_cameras_exist(&*ctx.host, &*ctx.target);
}

#[test]
fn test_catalog_unload_never_leaves_dangling_cameras() {
    let mut host = MemoryHost::permissive();
    let mut target = MemoryRenderTarget::new();
    let resources = resources(&[("first.scene", "<scene/>"), ("second.scene", "<scene/>")]);
    let mut ctx = SceneContext::new(&mut host, &mut target, &resources);
    let mut catalog = SceneCatalog::new(LoaderConfig::default());

    catalog.create_scene(&mut ctx, "first", SceneOptions::new()).unwrap();
    catalog.create_scene(&mut ctx, "second", SceneOptions::new()).unwrap();
    assert_viewport_cameras_exist(&*ctx.host, &*ctx.target);

    catalog.destroy_scene(&mut ctx, "first").unwrap();
    assert_viewport_cameras_exist(&*ctx.host, &*ctx.target);

    catalog.destroy_scene(&mut ctx, "second").unwrap();
    assert_viewport_cameras_exist(&*ctx.host, &*ctx.target);
}

#[test]
fn test_catalog_scenes_share_one_host() {
    let mut host = MemoryHost::permissive();
    let mut target = MemoryRenderTarget::new();
    let resources = resources(&[
        ("yard.scene", YARD),
        ("cellar.scene", r#"<scene><nodes><node name="Barrel"/></nodes></scene>"#),
    ]);
    let mut ctx = SceneContext::new(&mut host, &mut target, &resources);
    let mut catalog = SceneCatalog::new(LoaderConfig::default());

    catalog
        .create_scene(&mut ctx, "yard", SceneOptions::new().with_prefix("yard_"))
        .unwrap();
    catalog
        .create_scene(&mut ctx, "cellar", SceneOptions::new().with_prefix("cellar_"))
        .unwrap();
    assert!(ctx.host.objects().graph.contains("yard_Gate"));
    assert!(ctx.host.objects().graph.contains("cellar_Barrel"));

    catalog.destroy_scene(&mut ctx, "yard").unwrap();
    assert!(!ctx.host.objects().graph.contains("yard_Gate"));
    assert!(ctx.host.objects().graph.contains("cellar_Barrel"));
    assert!(matches!(
        catalog.destroy_scene(&mut ctx, "yard"),
        Err(CatalogError::UnknownScene(_))
    ));

    catalog.destroy_all_scenes(&mut ctx).unwrap();
    assert!(catalog.is_empty());
    assert!(ctx.host.objects().entities.is_empty());
    assert!(!ctx.host.objects().graph.contains("cellar_Barrel"));
}
