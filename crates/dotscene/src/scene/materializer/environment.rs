//! Environment handlers: fog, skies, clip defaults, scene colours and shadows

use crate::foundation::logging::{debug, warn};
use crate::foundation::math::{utils, ColourValue, Plane, Quat, Vec3};
use crate::host::{
    Fog, FogMode, PixelFormat, ShadowCameraSetup, ShadowSettings, ShadowTechnique, ShadowTextureSettings, SkyBox,
    SkyDome, SkyPlane,
};
use crate::scene::attributes;
use crate::scene::contents::EnvironmentBlocks;
use crate::scene::document::Element;
use crate::scene::error::{DocumentCorrupt, LeafError, ObjectResolutionFailure};
use crate::scene::properties::PropertyCategory;

use super::{orientation, ChildRule, SceneMaterializer, USER_DATA_TAGS};

impl<'h> SceneMaterializer<'h> {
    fn environment_rules() -> [ChildRule<'h, ()>; 8] {
        [
            ChildRule::optional("fog", Self::process_fog),
            ChildRule::optional("skyBox", Self::process_sky_box),
            ChildRule::optional("skyDome", Self::process_sky_dome),
            ChildRule::optional("skyPlane", Self::process_sky_plane),
            ChildRule::optional("clipping", Self::process_clipping),
            ChildRule::optional("colourAmbient", Self::process_ambient),
            ChildRule::optional("colourBackground", Self::process_background),
            ChildRule::optional("shadows", Self::process_shadows).with_aliases(&["shadow"]),
        ]
    }

    pub(super) fn process_environment(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        self.dispatch(element, &Self::environment_rules(), USER_DATA_TAGS, ())?;
        let owner = self.scene_name;
        self.user_data(element, owner, PropertyCategory::Environment);
        Ok(())
    }

    fn process_fog(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let mode = match attributes::string_or_empty(element, "mode").as_str() {
            "exp" => FogMode::Exp,
            "exp2" => FogMode::Exp2,
            "linear" => FogMode::Linear,
            _ => FogMode::None,
        };
        let fog = Fog {
            mode,
            colour: element
                .first_child("colourDiffuse")
                .map(attributes::colour)
                .transpose()?
                .unwrap_or(ColourValue::WHITE),
            density: attributes::real(element, "expDensity", 0.001)?,
            start: attributes::real(element, "linearStart", 0.0)?,
            end: attributes::real(element, "linearEnd", 1.0)?,
        };
        self.host.set_fog(fog);
        self.contents.environment_blocks |= EnvironmentBlocks::FOG;
        debug!("Fog set to {mode:?}");

        let owner = self.scene_name;
        self.user_data(element, owner, PropertyCategory::Fog);
        Ok(())
    }

    fn process_sky_box(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let sky = SkyBox {
            enabled: attributes::boolean(element, "enable", true),
            material: attributes::string_or_empty(element, "material"),
            distance: attributes::real(element, "distance", 5000.0)?,
            draw_first: attributes::boolean(element, "drawFirst", true),
            orientation: orientation(element)?.unwrap_or_else(Quat::identity),
        };
        let material = sky.material.clone();
        let owner = self.scene_name;
        self.user_data(element, owner, PropertyCategory::SkyBox);

        self.host
            .set_sky_box(sky)
            .map_err(|error| ObjectResolutionFailure::new("sky box", owner, material, error))?;
        self.contents.environment_blocks |= EnvironmentBlocks::SKY_BOX;
        Ok(())
    }

    fn process_sky_dome(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let sky = SkyDome {
            enabled: attributes::boolean(element, "enable", true),
            material: attributes::string_or_empty(element, "material"),
            curvature: attributes::real(element, "curvature", 10.0)?,
            tiling: attributes::real(element, "tiling", 8.0)?,
            distance: attributes::real(element, "distance", 4000.0)?,
            draw_first: attributes::boolean(element, "drawFirst", true),
            orientation: orientation(element)?.unwrap_or_else(Quat::identity),
            x_segments: attributes::unsigned(element, "xSegments", 16)?,
            y_segments: attributes::unsigned(element, "ySegments", 16)?,
        };
        let material = sky.material.clone();
        let owner = self.scene_name;
        self.user_data(element, owner, PropertyCategory::SkyDome);

        self.host
            .set_sky_dome(sky)
            .map_err(|error| ObjectResolutionFailure::new("sky dome", owner, material, error))?;
        self.contents.environment_blocks |= EnvironmentBlocks::SKY_DOME;
        Ok(())
    }

    fn process_sky_plane(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let normal = Vec3::new(
            attributes::real(element, "planeX", 0.0)?,
            attributes::real(element, "planeY", -1.0)?,
            attributes::real(element, "planeZ", 0.0)?,
        );
        let sky = SkyPlane {
            enabled: attributes::boolean(element, "enable", true),
            material: attributes::string_or_empty(element, "material"),
            plane: Plane::new(normal, attributes::real(element, "planeD", 5000.0)?),
            scale: attributes::real(element, "scale", 1000.0)?,
            tiling: attributes::real(element, "tiling", 10.0)?,
            draw_first: attributes::boolean(element, "drawFirst", true),
            bow: attributes::real(element, "bow", 0.0)?,
            x_segments: attributes::unsigned(element, "xSegments", 1)?,
            y_segments: attributes::unsigned(element, "ySegments", 1)?,
        };
        let material = sky.material.clone();
        let owner = self.scene_name;
        self.user_data(element, owner, PropertyCategory::SkyPlane);

        self.host
            .set_sky_plane(sky)
            .map_err(|error| ObjectResolutionFailure::new("sky plane", owner, material, error))?;
        self.contents.environment_blocks |= EnvironmentBlocks::SKY_PLANE;
        Ok(())
    }

    fn process_clipping(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let (near, far) = self.clip_distances(element)?;
        self.contents.settings.near_clip = near;
        self.contents.settings.far_clip = far;
        self.contents.environment_blocks |= EnvironmentBlocks::CLIPPING;
        Ok(())
    }

    fn process_ambient(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let colour = attributes::colour(element)?;
        self.contents.settings.ambient = colour;
        self.host.set_ambient_light(colour);
        Ok(())
    }

    /// Store the background colour and repaint every existing viewport
    fn process_background(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let colour = attributes::colour(element)?;
        self.contents.settings.background = colour;
        for index in 0..self.target.viewport_count() {
            if let Some(viewport) = self.target.viewport_mut(index) {
                viewport.background = colour;
            }
        }
        Ok(())
    }

    fn process_shadows(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        self.contents.environment_blocks |= EnvironmentBlocks::SHADOWS;
        let token = attributes::string(element, "technique", "textureModulative");
        let Some(technique) = ShadowTechnique::from_name(&token) else {
            warn!("Unknown shadow technique '{token}', shadows disabled");
            self.host.set_shadows(ShadowSettings::default());
            return Ok(());
        };

        let far_distance = attributes::real(element, "farDistance", 0.0)?;
        let camera_setup = element
            .first_child("shadowCameraSetup")
            .map(|setup| self.shadow_camera_setup(setup))
            .transpose()?;
        let textures = match element.first_child("shadowTextures") {
            Some(textures) if technique.is_texture_based() => Some(self.shadow_textures(textures)?),
            _ => None,
        };
        let settings = ShadowSettings {
            technique,
            self_shadow: attributes::boolean(element, "selfShadow", false),
            far_distance: (far_distance > 0.0).then_some(far_distance),
            colour: element
                .first_child("colourShadow")
                .map(attributes::colour)
                .transpose()?
                .unwrap_or(ColourValue::BLACK),
            camera_setup,
            textures,
        };
        self.host.set_shadows(settings);
        debug!("Shadow technique set to '{token}'");
        Ok(())
    }

    fn shadow_camera_setup(&self, element: &Element) -> Result<ShadowCameraSetup, DocumentCorrupt> {
        let kind = attributes::string(element, "type", "lispsm");
        let aggressive = attributes::boolean(element, "useAggressiveFocusRegion", true);
        let setup = match kind.as_str() {
            "uniform" => ShadowCameraSetup::Uniform,
            "uniformfocused" => ShadowCameraSetup::UniformFocused {
                aggressive_focus_region: aggressive,
            },
            "lispsm" => {
                let simple_optimal_adjust = attributes::boolean(element, "useSimpleOptimalAdjust", true);
                let optimal_adjust_factor = if simple_optimal_adjust {
                    0.0
                } else {
                    attributes::real(element, "optimalAdjustFactor", 0.1)?
                };
                ShadowCameraSetup::LiSpSm {
                    aggressive_focus_region: aggressive,
                    simple_optimal_adjust,
                    optimal_adjust_factor,
                    light_direction_threshold: attributes::real(element, "lightDirectionThreshold", 0.451_026_24)?,
                }
            }
            "pssm" => ShadowCameraSetup::Pssm {
                aggressive_focus_region: aggressive,
                split_count: attributes::unsigned(element, "splitCount", 3)?,
                near_distance: attributes::real(element, "splitNearDistance", 100.0)?,
                far_distance: attributes::real(element, "splitFarDistance", 100_000.0)?,
                reduction: attributes::real(element, "splitReduction", 0.95)?,
                padding: attributes::real(element, "splitPadding", 1.0)?,
            },
            "planeoptimal" => {
                let up = self.contents.settings.up_axis.vector();
                let normal = Vec3::new(
                    attributes::real(element, "planeX", up.x)?,
                    attributes::real(element, "planeY", up.y)?,
                    attributes::real(element, "planeZ", up.z)?,
                );
                ShadowCameraSetup::PlaneOptimal {
                    plane: Plane::new(normal, attributes::real(element, "planeD", 0.0)?),
                }
            }
            _ => {
                return Err(DocumentCorrupt::InvalidValue {
                    element: element.tag().to_string(),
                    attribute: "type".to_string(),
                    value: kind,
                })
            }
        };
        Ok(setup)
    }

    /// Texture shadow tuning, shrinking sizes the render system cannot use
    fn shadow_textures(&self, element: &Element) -> Result<ShadowTextureSettings, DocumentCorrupt> {
        let mut size = attributes::unsigned(element, "size", 512)?;
        let capabilities = self.host.capabilities();
        if !capabilities.hw_render_to_texture
            && !capabilities.non_power_of_two_textures
            && !utils::is_power_of_two(size)
        {
            let reduced = utils::next_smaller_power_of_two(size);
            debug!("Shadow texture size {size} reduced to {reduced}");
            size = reduced;
        }
        let material = |name: &str| Some(attributes::string_or_empty(element, name)).filter(|m| !m.is_empty());
        Ok(ShadowTextureSettings {
            use_depth_texture: attributes::boolean(element, "useDepthTexture", false),
            size,
            count: attributes::unsigned(element, "count", 1)?,
            offset: attributes::real(element, "offset", 0.6)?,
            fade_start: attributes::real(element, "fadeStart", 0.7)?,
            fade_end: attributes::real(element, "fadeEnd", 0.9)?,
            pixel_format: PixelFormat::FLOAT16_R,
            caster_material: material("shadowCasterMaterial"),
            receiver_material: material("shadowReceiverMaterial"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::host::{HostCapabilities, MemoryHost, MemoryRenderTarget, SceneHost, Viewport};
    use crate::scene::contents::SceneContents;
    use crate::scene::document::Document;
    use crate::scene::error::SceneError;
    use approx::assert_relative_eq;

    fn run_with(
        host: &mut MemoryHost,
        target: &mut MemoryRenderTarget,
        scene: &str,
    ) -> Result<SceneContents, SceneError> {
        let config = LoaderConfig::default();
        let mut contents = SceneContents::new(&config);
        let document = Document::parse(scene)?;
        SceneMaterializer::new(host, target, &config, &mut contents, "Test", "", "General")
            .materialize(document.scene()?)?;
        Ok(contents)
    }

    fn run(host: &mut MemoryHost, environment: &str) -> SceneContents {
        let scene = format!("<scene><environment>{environment}</environment></scene>");
        run_with(host, &mut MemoryRenderTarget::new(), &scene).unwrap()
    }

    #[test]
    fn test_fog_and_colours() {
        let mut host = MemoryHost::new();
        let mut target = MemoryRenderTarget::new().with_viewport(Viewport::new("Existing", 0));
        let contents = run_with(
            &mut host,
            &mut target,
            r#"<scene><environment>
                <fog mode="exp2" expDensity="0.02"><colourDiffuse r="0.5" g="0.5" b="0.5"/></fog>
                <colourAmbient r="0.2" g="0.2" b="0.2"/>
                <colourBackground r="0" g="0" b="1"/>
                <clipping near="2" far="800"/>
            </environment></scene>"#,
        )
        .unwrap();

        let environment = &host.objects().environment;
        assert_eq!(environment.fog.mode, FogMode::Exp2);
        assert_relative_eq!(environment.fog.density, 0.02);
        assert_eq!(environment.fog.colour, ColourValue::rgb(0.5, 0.5, 0.5));
        assert_eq!(environment.ambient_light, ColourValue::rgb(0.2, 0.2, 0.2));
        assert_eq!(target.viewports()[0].background, ColourValue::rgb(0.0, 0.0, 1.0));
        assert_eq!(contents.settings().background, ColourValue::rgb(0.0, 0.0, 1.0));
        assert_relative_eq!(contents.settings().near_clip, 2.0);
        assert_relative_eq!(contents.settings().far_clip, 800.0);
    }

    #[test]
    fn test_skies() {
        let mut host = MemoryHost::new().with_material("Sky/Box").with_material("Sky/Plane");
        let contents = run(
            &mut host,
            r#"
            <skyBox material="Sky/Box" distance="300" drawFirst="false">
                <userData><property name="mood" data="stormy"/></userData>
            </skyBox>
            <skyDome material="Sky/Missing"/>
            <skyPlane material="Sky/Plane" planeZ="2" bow="1.5"/>
            "#,
        );
        let environment = &host.objects().environment;
        let sky_box = environment.sky_box.as_ref().unwrap();
        assert_relative_eq!(sky_box.distance, 300.0);
        assert!(!sky_box.draw_first);
        assert!(environment.sky_dome.is_none());
        let sky_plane = environment.sky_plane.as_ref().unwrap();
        assert_eq!(sky_plane.plane.normal, Vec3::new(0.0, -1.0, 2.0));
        assert_relative_eq!(sky_plane.bow, 1.5);

        assert_eq!(contents.resolution_failures().len(), 1);
        assert_eq!(contents.resolution_failures()[0].reference, "Sky/Missing");
        let mood = contents.properties().find(PropertyCategory::SkyBox, "mood", "").count();
        assert_eq!(mood, 1);
    }

    #[test]
    fn test_texture_shadows() {
        let mut host = MemoryHost::new();
        run(
            &mut host,
            r#"<shadows technique="textureAdditive" selfShadow="true" farDistance="250">
                <colourShadow r="0.1" g="0.1" b="0.1"/>
                <shadowCameraSetup type="pssm" splitCount="4"/>
                <shadowTextures size="1024" count="2" shadowCasterMaterial="Caster"/>
            </shadows>"#,
        );
        let shadows = &host.objects().environment.shadows;
        assert_eq!(shadows.technique, ShadowTechnique::TEXTURE_ADDITIVE);
        assert!(shadows.self_shadow);
        assert_eq!(shadows.far_distance, Some(250.0));
        assert_eq!(shadows.colour, ColourValue::rgb(0.1, 0.1, 0.1));
        assert!(matches!(shadows.camera_setup, Some(ShadowCameraSetup::Pssm { split_count: 4, .. })));

        let textures = shadows.textures.as_ref().unwrap();
        assert_eq!(textures.size, 1024);
        assert_eq!(textures.count, 2);
        assert_eq!(textures.caster_material.as_deref(), Some("Caster"));
        assert_eq!(textures.receiver_material, None);
    }

    #[test]
    fn test_stencil_shadows_skip_textures() {
        let mut host = MemoryHost::new();
        run(
            &mut host,
            r#"<shadow technique="stencilAdditive"><shadowTextures size="2048"/></shadow>"#,
        );
        let shadows = &host.objects().environment.shadows;
        assert_eq!(shadows.technique, ShadowTechnique::STENCIL_ADDITIVE);
        assert_eq!(shadows.colour, ColourValue::BLACK);
        assert_eq!(shadows.far_distance, None);
        assert!(shadows.textures.is_none());
        assert!(shadows.camera_setup.is_none());
    }

    #[test]
    fn test_unknown_technique_disables_shadows() {
        let mut host = MemoryHost::new();
        run(&mut host, r#"<shadows technique="raytraced"><shadowCameraSetup type="bogus"/></shadows>"#);
        assert!(host.objects().environment.shadows.technique.is_empty());
    }

    #[test]
    fn test_unknown_camera_setup_is_corrupt() {
        let mut host = MemoryHost::new();
        let result = run_with(
            &mut host,
            &mut MemoryRenderTarget::new(),
            r#"<scene><environment><shadows><shadowCameraSetup type="bogus"/></shadows></environment></scene>"#,
        );
        assert!(matches!(result, Err(SceneError::Corrupt(DocumentCorrupt::InvalidValue { .. }))));
    }

    #[test]
    fn test_lispsm_defaults_and_plane_optimal_up_axis() {
        let mut host = MemoryHost::new();
        run(&mut host, r#"<shadows><shadowCameraSetup/></shadows>"#);
        match host.objects().environment.shadows.camera_setup {
            Some(ShadowCameraSetup::LiSpSm { simple_optimal_adjust, optimal_adjust_factor, .. }) => {
                assert!(simple_optimal_adjust);
                assert_relative_eq!(optimal_adjust_factor, 0.0);
            }
            other => panic!("unexpected setup {other:?}"),
        }

        let mut host = MemoryHost::new();
        run_with(
            &mut host,
            &mut MemoryRenderTarget::new(),
            r#"<scene upAxis="z"><environment>
                <shadows><shadowCameraSetup type="planeoptimal" planeD="3"/></shadows>
            </environment></scene>"#,
        )
        .unwrap();
        let expected = Plane::new(Vec3::z(), 3.0);
        assert!(matches!(
            host.objects().environment.shadows.camera_setup,
            Some(ShadowCameraSetup::PlaneOptimal { plane }) if plane == expected
        ));
    }

    #[test]
    fn test_shadow_texture_size_rounds_down_without_support() {
        let mut host = MemoryHost::new().with_capabilities(HostCapabilities {
            hw_render_to_texture: false,
            non_power_of_two_textures: false,
            ..HostCapabilities::default()
        });
        run(
            &mut host,
            r#"<shadows technique="textureModulative"><shadowTextures size="1000"/></shadows>"#,
        );
        let textures = host.objects().environment.shadows.textures.clone().unwrap();
        assert_eq!(textures.size, 512);
    }

    #[test]
    fn test_shadow_alias_only_first_block_applies() {
        let mut host = MemoryHost::new();
        let contents = run(
            &mut host,
            r#"<shadow technique="stencilAdditive"/><shadows technique="textureModulative"/>"#,
        );
        assert_eq!(host.objects().environment.shadows.technique, ShadowTechnique::STENCIL_ADDITIVE);
        assert!(contents.unhandled_tags().is_empty());

        let mut host = MemoryHost::new();
        run(
            &mut host,
            r#"<shadows technique="textureAdditive"/><shadow technique="stencilModulative"/>"#,
        );
        assert_eq!(host.objects().environment.shadows.technique, ShadowTechnique::TEXTURE_ADDITIVE);
    }
}
