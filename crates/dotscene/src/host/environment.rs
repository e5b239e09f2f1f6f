//! Scene-wide rendering state: ambient light, fog, skies, shadows and world geometry

use bitflags::bitflags;

use crate::foundation::math::{ColourValue, Plane, Quat};

use super::objects::PixelFormat;

/// Fog falloff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FogMode {
    /// No fog
    #[default]
    None,
    /// Exponential
    Exp,
    /// Squared exponential
    Exp2,
    /// Linear between start and end
    Linear,
}

/// Fog parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    /// Falloff mode
    pub mode: FogMode,
    /// Fog colour
    pub colour: ColourValue,
    /// Density for the exponential modes
    pub density: f32,
    /// Linear start distance
    pub start: f32,
    /// Linear end distance
    pub end: f32,
}

impl Default for Fog {
    fn default() -> Self {
        Self {
            mode: FogMode::None,
            colour: ColourValue::WHITE,
            density: 0.001,
            start: 0.0,
            end: 1.0,
        }
    }
}

/// Cube of six textured faces around the camera
#[derive(Debug, Clone, PartialEq)]
pub struct SkyBox {
    /// Enabled flag
    pub enabled: bool,
    /// Material
    pub material: String,
    /// Distance from the camera
    pub distance: f32,
    /// Render before everything else
    pub draw_first: bool,
    /// Box orientation
    pub orientation: Quat,
}

impl Default for SkyBox {
    fn default() -> Self {
        Self {
            enabled: true,
            material: String::new(),
            distance: 5000.0,
            draw_first: true,
            orientation: Quat::identity(),
        }
    }
}

/// Curved dome over the camera
#[derive(Debug, Clone, PartialEq)]
pub struct SkyDome {
    /// Enabled flag
    pub enabled: bool,
    /// Material
    pub material: String,
    /// Dome curvature
    pub curvature: f32,
    /// Texture tiling
    pub tiling: f32,
    /// Distance from the camera
    pub distance: f32,
    /// Render before everything else
    pub draw_first: bool,
    /// Dome orientation
    pub orientation: Quat,
    /// Segments along X
    pub x_segments: u32,
    /// Segments along Y
    pub y_segments: u32,
}

impl Default for SkyDome {
    fn default() -> Self {
        Self {
            enabled: true,
            material: String::new(),
            curvature: 10.0,
            tiling: 8.0,
            distance: 4000.0,
            draw_first: true,
            orientation: Quat::identity(),
            x_segments: 16,
            y_segments: 16,
        }
    }
}

/// Flat plane above the camera
#[derive(Debug, Clone, PartialEq)]
pub struct SkyPlane {
    /// Enabled flag
    pub enabled: bool,
    /// Material
    pub material: String,
    /// Plane
    pub plane: Plane,
    /// Texture scale
    pub scale: f32,
    /// Texture tiling
    pub tiling: f32,
    /// Render before everything else
    pub draw_first: bool,
    /// Curvature of the plane
    pub bow: f32,
    /// Segments along X
    pub x_segments: u32,
    /// Segments along Y
    pub y_segments: u32,
}

impl Default for SkyPlane {
    fn default() -> Self {
        Self {
            enabled: true,
            material: String::new(),
            plane: Plane::new(crate::foundation::math::Vec3::new(0.0, -1.0, 0.0), 5000.0),
            scale: 1000.0,
            tiling: 10.0,
            draw_first: true,
            bow: 0.0,
            x_segments: 1,
            y_segments: 1,
        }
    }
}

bitflags! {
    /// Shadow technique as a combination of detail flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ShadowTechnique: u32 {
        /// Lights add up
        const ADDITIVE = 0x01;
        /// Shadows darken the lit scene
        const MODULATIVE = 0x02;
        /// Shadow receivers handle shadows in their own materials
        const INTEGRATED = 0x04;
        /// Stencil volumes
        const STENCIL = 0x10;
        /// Shadow textures
        const TEXTURE = 0x20;

        /// Modulative stencil shadows
        const STENCIL_MODULATIVE = Self::STENCIL.bits() | Self::MODULATIVE.bits();
        /// Additive stencil shadows
        const STENCIL_ADDITIVE = Self::STENCIL.bits() | Self::ADDITIVE.bits();
        /// Modulative texture shadows
        const TEXTURE_MODULATIVE = Self::TEXTURE.bits() | Self::MODULATIVE.bits();
        /// Additive texture shadows
        const TEXTURE_ADDITIVE = Self::TEXTURE.bits() | Self::ADDITIVE.bits();
        /// Additive texture shadows handled by receiver materials
        const TEXTURE_ADDITIVE_INTEGRATED = Self::TEXTURE_ADDITIVE.bits() | Self::INTEGRATED.bits();
        /// Modulative texture shadows handled by receiver materials
        const TEXTURE_MODULATIVE_INTEGRATED = Self::TEXTURE_MODULATIVE.bits() | Self::INTEGRATED.bits();
    }
}

impl ShadowTechnique {
    /// Techniques with their document names
    pub const NAMED: [(&'static str, ShadowTechnique); 11] = [
        ("detailAdditive", Self::ADDITIVE),
        ("detailModulative", Self::MODULATIVE),
        ("detailIntegrated", Self::INTEGRATED),
        ("detailStencil", Self::STENCIL),
        ("detailTexture", Self::TEXTURE),
        ("stencilModulative", Self::STENCIL_MODULATIVE),
        ("stencilAdditive", Self::STENCIL_ADDITIVE),
        ("textureModulative", Self::TEXTURE_MODULATIVE),
        ("textureAdditive", Self::TEXTURE_ADDITIVE),
        ("textureAdditiveIntegrated", Self::TEXTURE_ADDITIVE_INTEGRATED),
        ("textureModulativeIntegrated", Self::TEXTURE_MODULATIVE_INTEGRATED),
    ];

    /// Technique named `name`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find_map(|(candidate, technique)| (*candidate == name).then_some(*technique))
    }

    /// Document name, `None` for combinations without one
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find_map(|(name, technique)| (*technique == self).then_some(*name))
    }

    /// Whether shadows come from shadow textures
    pub fn is_texture_based(self) -> bool {
        self.contains(Self::TEXTURE)
    }

    /// Whether shadows come from stencil volumes
    pub fn is_stencil_based(self) -> bool {
        self.contains(Self::STENCIL)
    }
}

/// Projection used for shadow texture cameras
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadowCameraSetup {
    /// Plain light frustum
    Uniform,
    /// Frustum focused on the visible area
    UniformFocused {
        /// Tighten the focus region
        aggressive_focus_region: bool,
    },
    /// Light space perspective shadow maps
    LiSpSm {
        /// Tighten the focus region
        aggressive_focus_region: bool,
        /// Use the simple optimal adjust heuristic
        simple_optimal_adjust: bool,
        /// Manual adjust factor, 0 when the simple heuristic is on
        optimal_adjust_factor: f32,
        /// Angle below which the camera and light are considered aligned
        light_direction_threshold: f32,
    },
    /// Parallel split shadow maps
    Pssm {
        /// Tighten the focus region
        aggressive_focus_region: bool,
        /// Number of splits
        split_count: u32,
        /// First split distance
        near_distance: f32,
        /// Last split distance
        far_distance: f32,
        /// Logarithmic versus linear split blend
        reduction: f32,
        /// Overlap between splits
        padding: f32,
    },
    /// Optimal projection for one receiving plane
    PlaneOptimal {
        /// Receiving plane
        plane: Plane,
    },
}

/// Shadow texture tuning
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowTextureSettings {
    /// Render depth into the shadow texture
    pub use_depth_texture: bool,
    /// Texture size in texels
    pub size: u32,
    /// Number of shadow textures
    pub count: u32,
    /// Directional light texture offset
    pub offset: f32,
    /// Fade start fraction
    pub fade_start: f32,
    /// Fade end fraction
    pub fade_end: f32,
    /// Texel format
    pub pixel_format: PixelFormat,
    /// Custom caster material
    pub caster_material: Option<String>,
    /// Custom receiver material
    pub receiver_material: Option<String>,
}

impl Default for ShadowTextureSettings {
    fn default() -> Self {
        Self {
            use_depth_texture: false,
            size: 512,
            count: 1,
            offset: 0.6,
            fade_start: 0.7,
            fade_end: 0.9,
            pixel_format: PixelFormat::FLOAT16_R,
            caster_material: None,
            receiver_material: None,
        }
    }
}

/// Complete shadow configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowSettings {
    /// Technique, empty for no shadows
    pub technique: ShadowTechnique,
    /// Texture shadows cast onto their casters
    pub self_shadow: bool,
    /// Maximum shadow distance, `None` for the host default
    pub far_distance: Option<f32>,
    /// Modulative shadow colour
    pub colour: ColourValue,
    /// Shadow camera projection
    pub camera_setup: Option<ShadowCameraSetup>,
    /// Shadow texture tuning
    pub textures: Option<ShadowTextureSettings>,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            technique: ShadowTechnique::empty(),
            self_shadow: false,
            far_distance: None,
            colour: ColourValue::new(0.25, 0.25, 0.25, 1.0),
            camera_setup: None,
            textures: None,
        }
    }
}

/// Terrain or other world geometry loaded from a data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldGeometry {
    /// Data file
    pub data_file: String,
    /// Render queue override
    pub render_queue: Option<u8>,
}

/// Scene-wide rendering state held by the host
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Ambient light colour
    pub ambient_light: ColourValue,
    /// Fog
    pub fog: Fog,
    /// Sky box
    pub sky_box: Option<SkyBox>,
    /// Sky dome
    pub sky_dome: Option<SkyDome>,
    /// Sky plane
    pub sky_plane: Option<SkyPlane>,
    /// Shadows
    pub shadows: ShadowSettings,
    /// World geometry
    pub world_geometry: Option<WorldGeometry>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            ambient_light: ColourValue::BLACK,
            fog: Fog::default(),
            sky_box: None,
            sky_dome: None,
            sky_plane: None,
            shadows: ShadowSettings::default(),
            world_geometry: None,
        }
    }
}
