//! Render target viewports

use bitflags::bitflags;

use crate::foundation::math::ColourValue;

bitflags! {
    /// Per-viewport rendering switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ViewportFeatures: u8 {
        /// Clear colour and depth before every frame
        const CLEAR_EVERY_FRAME = 0x01;
        /// Render overlays
        const OVERLAYS = 0x02;
        /// Render shadows
        const SHADOWS = 0x04;
        /// Render skies
        const SKIES = 0x08;
    }
}

impl Default for ViewportFeatures {
    fn default() -> Self {
        Self::all()
    }
}

/// Rectangular region of a render target drawn by one camera
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    /// Camera name, `None` while unbound
    pub camera: Option<String>,
    /// Left edge (fraction of the target)
    pub left: f32,
    /// Top edge (fraction of the target)
    pub top: f32,
    /// Width (fraction of the target)
    pub width: f32,
    /// Height (fraction of the target)
    pub height: f32,
    /// Stacking order
    pub z_order: i32,
    /// Clear colour
    pub background: ColourValue,
    /// Rendering switches
    pub features: ViewportFeatures,
    /// Material scheme
    pub material_scheme: String,
    /// Named render queue invocation sequence
    pub render_queue_sequence: String,
    /// Visibility mask
    pub visibility_mask: u32,
}

impl Viewport {
    /// Full-target viewport for `camera`
    pub fn new(camera: impl Into<String>, z_order: i32) -> Self {
        Self {
            camera: Some(camera.into()),
            left: 0.0,
            top: 0.0,
            width: 1.0,
            height: 1.0,
            z_order,
            background: ColourValue::BLACK,
            features: ViewportFeatures::default(),
            material_scheme: "Default".to_string(),
            render_queue_sequence: String::new(),
            visibility_mask: u32::MAX,
        }
    }

    /// Set the dimensions
    pub fn with_dimensions(mut self, left: f32, top: f32, width: f32, height: f32) -> Self {
        self.left = left;
        self.top = top;
        self.width = width;
        self.height = height;
        self
    }

    /// Set the clear colour
    pub fn with_background(mut self, background: ColourValue) -> Self {
        self.background = background;
        self
    }
}
