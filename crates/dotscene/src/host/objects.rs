//! Live object model
//!
//! Plain data for every object category a host manages. The materializer
//! creates and configures these; a host backed by a real renderer mirrors
//! them into its own engine objects.

use std::collections::BTreeMap;

use crate::foundation::math::{constants, utils, ColourValue, FloatRect, Plane, Quat, Vec3, Vec4};

use super::NodeId;

/// Render queue group ids
pub mod render_queue {
    /// Background queue
    pub const BACKGROUND: u8 = 0;
    /// Early skies
    pub const SKIES_EARLY: u8 = 5;
    /// Queue 1
    pub const QUEUE_1: u8 = 10;
    /// Queue 2
    pub const QUEUE_2: u8 = 20;
    /// First world geometry queue
    pub const WORLD_GEOMETRY_1: u8 = 25;
    /// Queue 3
    pub const QUEUE_3: u8 = 30;
    /// Queue 4
    pub const QUEUE_4: u8 = 40;
    /// Default queue
    pub const MAIN: u8 = 50;
    /// Queue 6
    pub const QUEUE_6: u8 = 60;
    /// Queue 7
    pub const QUEUE_7: u8 = 70;
    /// Second world geometry queue
    pub const WORLD_GEOMETRY_2: u8 = 75;
    /// Queue 8
    pub const QUEUE_8: u8 = 80;
    /// Queue 9
    pub const QUEUE_9: u8 = 90;
    /// Late skies
    pub const SKIES_LATE: u8 = 95;
    /// Overlays
    pub const OVERLAY: u8 = 100;
    /// Highest queue id
    pub const MAX: u8 = 105;
}

/// Settings shared by everything that can be attached to a node
#[derive(Debug, Clone, PartialEq)]
pub struct MovableSettings {
    /// Node the object is attached to
    pub attached_to: Option<NodeId>,
    /// Visibility flag of the object itself
    pub visible: bool,
    /// Whether the object casts shadows
    pub cast_shadows: bool,
    /// Query mask
    pub query_flags: u32,
    /// Visibility mask
    pub visibility_flags: u32,
    /// Render queue group override
    pub render_queue: Option<u8>,
    /// Maximum rendering distance, 0 for unlimited
    pub rendering_distance: f32,
}

impl Default for MovableSettings {
    fn default() -> Self {
        Self {
            attached_to: None,
            visible: true,
            cast_shadows: true,
            query_flags: u32::MAX,
            visibility_flags: u32::MAX,
            render_queue: None,
            rendering_distance: 0.0,
        }
    }
}

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightKind {
    /// Omnidirectional light
    #[default]
    Point,
    /// Light at infinity with a direction only
    Directional,
    /// Cone light
    Spotlight,
}

/// Spotlight cone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotlightRange {
    /// Inner cone angle (radians)
    pub inner: f32,
    /// Outer cone angle (radians)
    pub outer: f32,
    /// Falloff between the cones
    pub falloff: f32,
}

impl Default for SpotlightRange {
    fn default() -> Self {
        Self {
            inner: utils::deg_to_rad(30.0),
            outer: utils::deg_to_rad(40.0),
            falloff: 1.0,
        }
    }
}

/// Distance attenuation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    /// Range beyond which the light has no effect
    pub range: f32,
    /// Constant factor
    pub constant: f32,
    /// Linear factor
    pub linear: f32,
    /// Quadratic factor
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            range: 100_000.0,
            constant: 1.0,
            linear: 0.0,
            quadratic: 0.0,
        }
    }
}

/// Light source
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Kind of light
    pub kind: LightKind,
    /// Shared movable settings
    pub movable: MovableSettings,
    /// Power scale
    pub power: f32,
    /// Position relative to the attached node
    pub position: Vec3,
    /// Direction relative to the attached node
    pub direction: Vec3,
    /// Diffuse colour
    pub diffuse: ColourValue,
    /// Specular colour
    pub specular: ColourValue,
    /// Spotlight cone (spotlights only)
    pub spotlight: SpotlightRange,
    /// Attenuation (not used by directional lights)
    pub attenuation: Attenuation,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            movable: MovableSettings::default(),
            power: 1.0,
            position: Vec3::zeros(),
            direction: Vec3::z(),
            diffuse: ColourValue::WHITE,
            specular: ColourValue::new(0.0, 0.0, 0.0, 0.0),
            spotlight: SpotlightRange::default(),
            attenuation: Attenuation::default(),
        }
    }
}

/// Camera projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionType {
    /// Perspective projection
    #[default]
    Perspective,
    /// Orthographic projection
    Orthographic,
}

/// Polygon rasterization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolygonMode {
    /// Vertices only
    Points,
    /// Edges only
    Wireframe,
    /// Filled
    #[default]
    Solid,
}

/// Node tracking configured on a camera or node
#[derive(Debug, Clone, PartialEq)]
pub struct AutoTracking {
    /// Node being tracked
    pub target: NodeId,
    /// Local axis pointed at the target
    pub local_direction: Vec3,
    /// Offset from the target origin
    pub offset: Vec3,
}

/// Camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Shared movable settings
    pub movable: MovableSettings,
    /// Projection type
    pub projection: ProjectionType,
    /// Vertical field of view (radians)
    pub fov_y: f32,
    /// Width / height
    pub aspect_ratio: f32,
    /// Orthographic window width
    pub ortho_width: f32,
    /// Orthographic window height
    pub ortho_height: f32,
    /// Near clip distance
    pub near_clip: f32,
    /// Far clip distance, 0 for infinite
    pub far_clip: f32,
    /// Position relative to the attached node
    pub position: Vec3,
    /// Orientation relative to the attached node
    pub orientation: Quat,
    /// Rasterization mode
    pub polygon_mode: PolygonMode,
    /// Focal length for stereo setups
    pub focal_length: f32,
    /// Light mask
    pub light_mask: u32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            movable: MovableSettings::default(),
            projection: ProjectionType::Perspective,
            fov_y: constants::PI / 4.0,
            aspect_ratio: 4.0 / 3.0,
            ortho_width: 50.0,
            ortho_height: 50.0,
            near_clip: 100.0,
            far_clip: 100_000.0,
            position: Vec3::zeros(),
            orientation: Quat::identity(),
            polygon_mode: PolygonMode::Solid,
            focal_length: 1.0,
            light_mask: u32::MAX,
        }
    }
}

impl Camera {
    /// Direction the camera looks along
    pub fn direction(&self) -> Vec3 {
        self.orientation * -Vec3::z()
    }

    /// Camera up vector
    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::y()
    }

    /// Point the camera along `direction`
    pub fn set_direction(&mut self, direction: Vec3) {
        self.orientation = utils::orientation_facing(direction);
    }

    /// Point the camera at `target` from its current position
    pub fn look_at(&mut self, target: Vec3) {
        self.set_direction(target - self.position);
    }
}

/// Skeleton animation blending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkeletonBlendMode {
    /// Weighted average of animations
    #[default]
    Average,
    /// Animations add up
    Cumulative,
}

/// Hardware buffer usage hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    /// Written once, read often
    #[default]
    Static,
    /// Updated frequently
    Dynamic,
    /// Never read back
    WriteOnly,
    /// Static and never read back
    StaticWriteOnly,
    /// Dynamic and never read back
    DynamicWriteOnly,
}

/// Buffer usage plus shadow-copy request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferPolicy {
    /// Usage hint
    pub usage: BufferUsage,
    /// Keep a system memory shadow copy
    pub shadow_buffer: bool,
}

/// What a mesh provides to entities built from it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeshInfo {
    /// Bones of the mesh skeleton, empty when the mesh has none
    pub bones: Vec<String>,
    /// Number of sub-meshes
    pub sub_mesh_count: usize,
}

/// Object hung off a skeleton bone
#[derive(Debug, Clone, PartialEq)]
pub struct BoneAttachment {
    /// Attachment name
    pub name: String,
    /// Bone name
    pub bone: String,
    /// Node carrying the attached objects
    pub node: NodeId,
    /// Offset from the bone
    pub position: Vec3,
    /// Rotation relative to the bone
    pub orientation: Quat,
    /// Scale relative to the bone
    pub scale: Vec3,
}

/// Mesh instance
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Mesh the entity instantiates
    pub mesh: String,
    /// What the mesh provides
    pub mesh_info: MeshInfo,
    /// Shared movable settings
    pub movable: MovableSettings,
    /// Whole-entity material, `None` keeps the mesh default
    pub material: Option<String>,
    /// Per sub-entity material overrides
    pub sub_materials: BTreeMap<usize, String>,
    /// Receive shadows on the entity material
    pub receive_shadows: bool,
    /// Skeleton blending
    pub skeleton_blend_mode: SkeletonBlendMode,
    /// Shader custom parameters by index
    pub custom_parameters: BTreeMap<usize, Vec4>,
    /// Vertex buffer policy
    pub vertex_buffer: BufferPolicy,
    /// Index buffer policy
    pub index_buffer: BufferPolicy,
    /// Bone attachments
    pub bone_attachments: Vec<BoneAttachment>,
    /// Debug skeleton display
    pub display_skeleton: bool,
}

impl Entity {
    /// New entity of `mesh`
    pub fn new(mesh: impl Into<String>, mesh_info: MeshInfo) -> Self {
        Self {
            mesh: mesh.into(),
            mesh_info,
            movable: MovableSettings::default(),
            material: None,
            sub_materials: BTreeMap::new(),
            receive_shadows: true,
            skeleton_blend_mode: SkeletonBlendMode::Average,
            custom_parameters: BTreeMap::new(),
            vertex_buffer: BufferPolicy::default(),
            index_buffer: BufferPolicy::default(),
            bone_attachments: Vec::new(),
            display_skeleton: false,
        }
    }

    /// Whether the mesh carries a skeleton
    pub fn has_skeleton(&self) -> bool {
        !self.mesh_info.bones.is_empty()
    }
}

/// Particle system instance
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSystem {
    /// Template the system was created from
    pub template: String,
    /// Material of the template
    pub material: String,
    /// Receive shadows on the template material
    pub receive_shadows: bool,
    /// Shared movable settings
    pub movable: MovableSettings,
}

/// Billboard orientation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillboardType {
    /// Always faces the camera
    #[default]
    Point,
    /// Rotates around a shared direction
    OrientedCommon,
    /// Rotates around its own direction
    OrientedSelf,
    /// Perpendicular to a shared direction
    PerpendicularCommon,
    /// Perpendicular to its own direction
    PerpendicularSelf,
}

/// Billboard anchor point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillboardOrigin {
    /// Top left corner
    TopLeft,
    /// Top edge centre
    TopCenter,
    /// Top right corner
    TopRight,
    /// Left edge centre
    CenterLeft,
    /// Centre
    #[default]
    Center,
    /// Right edge centre
    CenterRight,
    /// Bottom left corner
    BottomLeft,
    /// Bottom edge centre
    BottomCenter,
    /// Bottom right corner
    BottomRight,
}

/// How billboard rotation is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillboardRotation {
    /// Rotate vertices
    #[default]
    Vertex,
    /// Rotate texture coordinates
    TexCoord,
}

/// Single billboard in a set
#[derive(Debug, Clone, PartialEq)]
pub struct Billboard {
    /// Position relative to the set
    pub position: Vec3,
    /// Own dimensions, `None` uses the set default
    pub dimensions: Option<(f32, f32)>,
    /// Rotation angle (radians)
    pub rotation: f32,
    /// Orientation for oriented types
    pub orientation: Quat,
    /// Colour
    pub colour: ColourValue,
    /// Texture coordinate rectangle
    pub tex_coords: FloatRect,
}

/// Set of camera facing quads
#[derive(Debug, Clone, PartialEq)]
pub struct BillboardSet {
    /// Material name
    pub material: String,
    /// Orientation model
    pub billboard_type: BillboardType,
    /// Anchor point
    pub origin: BillboardOrigin,
    /// Rotation model
    pub rotation_type: BillboardRotation,
    /// Default billboard width
    pub default_width: f32,
    /// Default billboard height
    pub default_height: f32,
    /// Preallocated billboards
    pub pool_size: usize,
    /// Grow the pool when exhausted
    pub auto_extend: bool,
    /// Cull billboards one by one
    pub cull_individually: bool,
    /// Sort back to front
    pub sort: bool,
    /// Face the camera position rather than its direction
    pub accurate_facing: bool,
    /// Receive shadows on the material
    pub receive_shadows: bool,
    /// Shared movable settings
    pub movable: MovableSettings,
    /// Billboards of the set
    pub billboards: Vec<Billboard>,
}

impl Default for BillboardSet {
    fn default() -> Self {
        Self {
            material: String::new(),
            billboard_type: BillboardType::Point,
            origin: BillboardOrigin::Center,
            rotation_type: BillboardRotation::Vertex,
            default_width: 100.0,
            default_height: 100.0,
            pool_size: 20,
            auto_extend: true,
            cull_individually: false,
            sort: false,
            accurate_facing: false,
            receive_shadows: false,
            movable: MovableSettings::default(),
            billboards: Vec::new(),
        }
    }
}

/// Procedurally built plane mesh
#[derive(Debug, Clone, PartialEq)]
pub struct ManualMesh {
    /// Resource group the mesh belongs to
    pub group: String,
    /// Source plane
    pub plane: Plane,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
    /// Segments along X
    pub x_segments: u32,
    /// Segments along Y
    pub y_segments: u32,
    /// Generate normals
    pub normals: bool,
    /// Texture coordinate sets
    pub tex_coord_sets: u32,
    /// Texture repeat along U
    pub u_tile: f32,
    /// Texture repeat along V
    pub v_tile: f32,
    /// Up vector of the plane
    pub up: Vec3,
    /// Vertex buffer policy
    pub vertex_buffer: BufferPolicy,
    /// Index buffer policy
    pub index_buffer: BufferPolicy,
    /// Plane exposed as a movable object for mirrors and clipping
    pub movable_plane: Option<Plane>,
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureType {
    /// One dimensional
    OneD,
    /// Two dimensional
    #[default]
    TwoD,
    /// Volume
    ThreeD,
    /// Cube map
    CubeMap,
}

impl TextureType {
    /// Faces a render target of this type has
    pub fn face_count(self) -> usize {
        if self == Self::CubeMap {
            6
        } else {
            1
        }
    }
}

/// Texel formats a render texture may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs, non_camel_case_types, clippy::upper_case_acronyms)]
pub enum PixelFormat {
    L8,
    L16,
    A8,
    A4L4,
    BYTE_LA,
    R5G6B5,
    B5G6R5,
    R3G3B2,
    A4R4G4B4,
    A1R5G5B5,
    R8G8B8,
    B8G8R8,
    A8R8G8B8,
    A8B8G8R8,
    B8G8R8A8,
    R8G8B8A8,
    X8R8G8B8,
    X8B8G8R8,
    A2R10G10B10,
    A2B10G10R10,
    FLOAT16_R,
    FLOAT16_RGB,
    FLOAT16_RGBA,
    FLOAT32_R,
    FLOAT32_RGB,
    FLOAT32_RGBA,
    FLOAT16_GR,
    FLOAT32_GR,
    DEPTH,
    SHORT_RGBA,
    SHORT_GR,
    SHORT_RGB,
}

impl PixelFormat {
    /// Every format with its document name
    pub const ALL: [(&'static str, PixelFormat); 32] = [
        ("L8", Self::L8),
        ("L16", Self::L16),
        ("A8", Self::A8),
        ("A4L4", Self::A4L4),
        ("BYTE_LA", Self::BYTE_LA),
        ("R5G6B5", Self::R5G6B5),
        ("B5G6R5", Self::B5G6R5),
        ("R3G3B2", Self::R3G3B2),
        ("A4R4G4B4", Self::A4R4G4B4),
        ("A1R5G5B5", Self::A1R5G5B5),
        ("R8G8B8", Self::R8G8B8),
        ("B8G8R8", Self::B8G8R8),
        ("A8R8G8B8", Self::A8R8G8B8),
        ("A8B8G8R8", Self::A8B8G8R8),
        ("B8G8R8A8", Self::B8G8R8A8),
        ("R8G8B8A8", Self::R8G8B8A8),
        ("X8R8G8B8", Self::X8R8G8B8),
        ("X8B8G8R8", Self::X8B8G8R8),
        ("A2R10G10B10", Self::A2R10G10B10),
        ("A2B10G10R10", Self::A2B10G10R10),
        ("FLOAT16_R", Self::FLOAT16_R),
        ("FLOAT16_RGB", Self::FLOAT16_RGB),
        ("FLOAT16_RGBA", Self::FLOAT16_RGBA),
        ("FLOAT32_R", Self::FLOAT32_R),
        ("FLOAT32_RGB", Self::FLOAT32_RGB),
        ("FLOAT32_RGBA", Self::FLOAT32_RGBA),
        ("FLOAT16_GR", Self::FLOAT16_GR),
        ("FLOAT32_GR", Self::FLOAT32_GR),
        ("DEPTH", Self::DEPTH),
        ("SHORT_RGBA", Self::SHORT_RGBA),
        ("SHORT_GR", Self::SHORT_GR),
        ("SHORT_RGB", Self::SHORT_RGB),
    ];

    /// Document name of the format
    pub fn name(self) -> &'static str {
        Self::ALL
            .iter()
            .find_map(|(name, format)| (*format == self).then_some(*name))
            .unwrap_or("FLOAT16_R")
    }
}

/// Texture rendered into by a camera
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTexture {
    /// Resource group
    pub group: String,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub pixel_format: PixelFormat,
    /// Dimensionality
    pub texture_type: TextureType,
    /// Camera rendering into the texture
    pub camera: String,
    /// Material scheme used while rendering
    pub scheme: String,
    /// Clear before every update
    pub clear_every_frame: bool,
    /// Update automatically every frame, per face
    pub auto_update: Vec<bool>,
    /// Hide the object carrying the texture while rendering
    pub hide_render_object: bool,
    /// Object carrying the texture
    pub render_object: String,
    /// Reflection or refraction plane
    pub render_plane: Option<Plane>,
    /// Materials using the texture
    pub materials: Vec<String>,
    /// Objects hidden while rendering
    pub hidden_objects: Vec<String>,
    /// Only these objects are rendered
    pub exclusive_objects: Vec<String>,
}

/// Entity baked into a static or instanced geometry batch
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryEntity {
    /// Source entity name
    pub entity: String,
    /// Placement in the batch
    pub position: Vec3,
    /// Orientation in the batch
    pub orientation: Quat,
    /// Scale in the batch
    pub scale: Vec3,
}

/// Shared settings of static and instanced geometry
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedGeometry {
    /// Cast shadows
    pub cast_shadows: bool,
    /// Visible
    pub visible: bool,
    /// Render queue override
    pub render_queue: Option<u8>,
    /// Maximum rendering distance
    pub rendering_distance: f32,
    /// Batch origin
    pub origin: Vec3,
    /// Region or batch-instance dimensions
    pub dimensions: Vec3,
    /// Entities added before the build
    pub entities: Vec<GeometryEntity>,
    /// Whether the batch has been built
    pub built: bool,
}

impl BatchedGeometry {
    /// Add an entity to the batch
    pub fn add_entity(&mut self, entity: GeometryEntity) {
        self.entities.push(entity);
    }

    /// Finish the batch
    pub fn build(&mut self) {
        self.built = true;
    }
}

/// Region-partitioned static geometry
#[derive(Debug, Clone, PartialEq)]
pub struct StaticGeometry {
    /// Batch settings
    pub batch: BatchedGeometry,
}

/// Hardware instanced geometry
#[derive(Debug, Clone, PartialEq)]
pub struct InstancedGeometry {
    /// Batch settings
    pub batch: BatchedGeometry,
    /// Number of instanced batches
    pub batch_count: u32,
}

/// Position interpolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    /// Linear
    #[default]
    Linear,
    /// Spline
    Spline,
}

/// Rotation interpolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationInterpolationMode {
    /// Normalized linear
    #[default]
    Linear,
    /// Spherical
    Spherical,
}

/// Node transform at one point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Time in seconds
    pub time: f32,
    /// Translation
    pub translation: Vec3,
    /// Rotation
    pub rotation: Quat,
    /// Scale
    pub scale: Vec3,
}

/// Node animation plus its playback state
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    /// Length in seconds
    pub length: f32,
    /// Position interpolation
    pub interpolation: InterpolationMode,
    /// Rotation interpolation
    pub rotation_interpolation: RotationInterpolationMode,
    /// Animated node
    pub node: NodeId,
    /// Keyframes in document order
    pub keyframes: Vec<Keyframe>,
    /// Playback enabled
    pub enabled: bool,
    /// Playback loops
    pub looping: bool,
    /// Current playback position
    pub time_position: f32,
}

impl Animation {
    /// Advance playback by `delta` seconds
    pub fn add_time(&mut self, delta: f32) {
        if !self.enabled || self.length <= 0.0 {
            return;
        }
        let advanced = self.time_position + delta;
        self.time_position = if self.looping {
            advanced.rem_euclid(self.length)
        } else {
            advanced.clamp(0.0, self.length)
        };
    }
}
