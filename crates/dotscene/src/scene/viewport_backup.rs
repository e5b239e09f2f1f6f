//! Viewport state backup
//!
//! Loading a scene rebinds viewports to the scene's cameras. The backup keeps
//! what the render target looked like before the load so unloading can put
//! it back.
//!
//! Slots are keyed by viewport index and restored in increasing order. A
//! slot whose index is past the live viewport count is re-added; since every
//! add grows the count, restoring out of order would send later slots down
//! the wrong branch.

use std::collections::BTreeMap;

use crate::foundation::logging::debug;
use crate::foundation::math::{ColourValue, Quat, Vec3};
use crate::host::{
    Camera, HostError, PolygonMode, ProjectionType, RenderTarget, SceneHost, Viewport, ViewportFeatures,
};

/// Camera state captured with a viewport
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSnapshot {
    /// Camera name
    pub name: String,
    /// Position
    pub position: Vec3,
    /// Orientation
    pub orientation: Quat,
    /// Polygon mode
    pub polygon_mode: PolygonMode,
    /// Near clip distance
    pub near_clip: f32,
    /// Far clip distance
    pub far_clip: f32,
    /// Projection type
    pub projection: ProjectionType,
    /// Vertical field of view (radians)
    pub fov_y: f32,
    /// Aspect ratio
    pub aspect_ratio: f32,
    /// Orthographic window width
    pub ortho_width: f32,
    /// Orthographic window height
    pub ortho_height: f32,
    /// Shadow casting
    pub cast_shadows: bool,
    /// Focal length
    pub focal_length: f32,
    /// Visibility flags
    pub visibility_flags: u32,
    /// Query flags
    pub query_flags: u32,
    /// Light mask
    pub light_mask: u32,
}

impl CameraSnapshot {
    fn capture(name: &str, camera: &Camera) -> Self {
        Self {
            name: name.to_string(),
            position: camera.position,
            orientation: camera.orientation,
            polygon_mode: camera.polygon_mode,
            near_clip: camera.near_clip,
            far_clip: camera.far_clip,
            projection: camera.projection,
            fov_y: camera.fov_y,
            aspect_ratio: camera.aspect_ratio,
            ortho_width: camera.ortho_width,
            ortho_height: camera.ortho_height,
            cast_shadows: camera.movable.cast_shadows,
            focal_length: camera.focal_length,
            visibility_flags: camera.movable.visibility_flags,
            query_flags: camera.movable.query_flags,
            light_mask: camera.light_mask,
        }
    }

    fn apply(&self, camera: &mut Camera) {
        camera.position = self.position;
        camera.orientation = self.orientation;
        camera.polygon_mode = self.polygon_mode;
        camera.near_clip = self.near_clip;
        camera.far_clip = self.far_clip;
        camera.projection = self.projection;
        camera.fov_y = self.fov_y;
        camera.aspect_ratio = self.aspect_ratio;
        camera.ortho_width = self.ortho_width;
        camera.ortho_height = self.ortho_height;
        camera.movable.cast_shadows = self.cast_shadows;
        camera.focal_length = self.focal_length;
        camera.movable.visibility_flags = self.visibility_flags;
        camera.movable.query_flags = self.query_flags;
        camera.light_mask = self.light_mask;
    }

    /// Direction the camera looks along
    pub fn direction(&self) -> Vec3 {
        self.orientation * -Vec3::z()
    }
}

/// Viewport state captured before a load
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSnapshot {
    /// Bound camera, if the viewport had one
    pub camera: Option<CameraSnapshot>,
    /// Left edge
    pub left: f32,
    /// Top edge
    pub top: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
    /// Stacking order
    pub z_order: i32,
    /// Clear colour
    pub background: ColourValue,
    /// Rendering switches
    pub features: ViewportFeatures,
    /// Material scheme
    pub material_scheme: String,
    /// Render queue invocation sequence
    pub render_queue_sequence: String,
    /// Visibility mask
    pub visibility_mask: u32,
}

impl ViewportSnapshot {
    fn capture(viewport: &Viewport, host: &dyn SceneHost) -> Self {
        let camera = viewport.camera.as_deref().and_then(|name| {
            host.objects()
                .cameras
                .by_name(name)
                .map(|camera| CameraSnapshot::capture(name, camera))
        });
        Self {
            camera,
            left: viewport.left,
            top: viewport.top,
            width: viewport.width,
            height: viewport.height,
            z_order: viewport.z_order,
            background: viewport.background,
            features: viewport.features,
            material_scheme: viewport.material_scheme.clone(),
            render_queue_sequence: viewport.render_queue_sequence.clone(),
            visibility_mask: viewport.visibility_mask,
        }
    }

    fn apply(&self, viewport: &mut Viewport) {
        viewport.camera = self.camera.as_ref().map(|camera| camera.name.clone());
        viewport.left = self.left;
        viewport.top = self.top;
        viewport.width = self.width;
        viewport.height = self.height;
        viewport.background = self.background;
        viewport.features = self.features;
        viewport.material_scheme.clone_from(&self.material_scheme);
        viewport.render_queue_sequence.clone_from(&self.render_queue_sequence);
        viewport.visibility_mask = self.visibility_mask;
    }
}

/// Sparse map from viewport index to the snapshot taken there
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewportBackup {
    slots: BTreeMap<usize, ViewportSnapshot>,
    /// Viewport count at capture time, `None` when nothing is captured
    captured_count: Option<usize>,
}

impl ViewportBackup {
    /// Backup with no occupied slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every viewport of `target`
    ///
    /// Fails when a slot is still occupied, which means the previous capture
    /// was never restored.
    pub fn capture(&mut self, host: &dyn SceneHost, target: &dyn RenderTarget) -> Result<(), HostError> {
        if let Some(index) = self.slots.keys().next() {
            return Err(HostError::InvalidState(format!(
                "viewport backup slot {index} is still occupied"
            )));
        }
        if self.captured_count.is_some() {
            return Err(HostError::InvalidState(
                "viewport backup has not been restored".to_string(),
            ));
        }
        self.captured_count = Some(target.viewport_count());
        for index in 0..target.viewport_count() {
            if let Some(viewport) = target.viewport(index) {
                self.slots.insert(index, ViewportSnapshot::capture(viewport, host));
            }
        }
        debug!("Captured {} viewport(s)", self.slots.len());
        Ok(())
    }

    /// Put every captured viewport back, in increasing index order
    ///
    /// Viewports added since the capture are removed first. Cameras that no
    /// longer exist are recreated. All slots are empty afterwards, even when
    /// the target rejects a viewport.
    pub fn restore(&mut self, host: &mut dyn SceneHost, target: &mut dyn RenderTarget) -> Result<(), HostError> {
        if let Some(count) = self.captured_count.take() {
            while target.viewport_count() > count {
                if target.remove_viewport(target.viewport_count() - 1).is_none() {
                    break;
                }
            }
        }
        let slots = std::mem::take(&mut self.slots);
        for (index, snapshot) in slots {
            if let Some(camera) = &snapshot.camera {
                restore_camera(host, camera)?;
            }

            if index < target.viewport_count() {
                if let Some(viewport) = target.viewport_mut(index) {
                    snapshot.apply(viewport);
                }
            } else {
                let camera = snapshot.camera.as_ref().map_or("", |camera| camera.name.as_str());
                let mut viewport = Viewport::new(camera, snapshot.z_order);
                snapshot.apply(&mut viewport);
                target.add_viewport(viewport)?;
            }
            debug!("Restored viewport {index}");
        }
        Ok(())
    }

    /// Snapshot held for a viewport index
    pub fn snapshot(&self, index: usize) -> Option<&ViewportSnapshot> {
        self.slots.get(&index)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether a capture is waiting to be restored
    pub fn is_captured(&self) -> bool {
        self.captured_count.is_some()
    }
}

fn restore_camera(host: &mut dyn SceneHost, snapshot: &CameraSnapshot) -> Result<(), HostError> {
    let cameras = &mut host.objects_mut().cameras;
    if !cameras.contains(&snapshot.name) {
        cameras.create(snapshot.name.clone(), Camera::default())?;
    }
    if let Some(camera) = cameras.by_name_mut(&snapshot.name) {
        snapshot.apply(camera);
    }
    Ok(())
}
