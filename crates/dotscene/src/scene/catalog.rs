//! Scene catalog
//!
//! Owns every [`SceneResource`] created through it, at most one per name.
//! The catalog is an ordinary value: applications construct one and pass it
//! where scenes are managed.

use std::collections::HashMap;

use crate::config::{LoaderConfig, SceneOptions};
use crate::foundation::logging::{info, warn};

use super::error::CatalogError;
use super::resource::SceneResource;
use super::SceneContext;

/// Named scene resources and the current scene
#[derive(Debug, Default)]
pub struct SceneCatalog {
    config: LoaderConfig,
    scenes: HashMap<String, SceneResource>,
    order: Vec<String>,
    current: Option<String>,
}

impl SceneCatalog {
    /// Empty catalog using `config` for every scene it creates
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            scenes: HashMap::new(),
            order: Vec::new(),
            current: None,
        }
    }

    /// Shared loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Get or create the scene `name`, loading it if needed
    ///
    /// An existing entry is returned as is; `options` only apply to a new
    /// entry. A failed load removes the entry again. On success the scene
    /// becomes current.
    pub fn create_scene(
        &mut self,
        ctx: &mut SceneContext<'_>,
        name: &str,
        options: SceneOptions,
    ) -> Result<&mut SceneResource, CatalogError> {
        if !self.scenes.contains_key(name) {
            let scene = SceneResource::new(name, options, self.config.clone());
            self.scenes.insert(name.to_string(), scene);
            self.order.push(name.to_string());
            info!("Created scene '{name}'");
        }

        let loaded = self.scenes.get(name).is_some_and(SceneResource::is_loaded);
        if !loaded {
            let result = match self.scenes.get_mut(name) {
                Some(scene) => scene.load(ctx),
                None => return Err(CatalogError::UnknownScene(name.to_string())),
            };
            if let Err(source) = result {
                self.forget(name);
                return Err(CatalogError::Load {
                    name: name.to_string(),
                    source,
                });
            }
        }

        self.current = Some(name.to_string());
        self.scenes
            .get_mut(name)
            .ok_or_else(|| CatalogError::UnknownScene(name.to_string()))
    }

    /// Unload and remove the scene `name`
    pub fn destroy_scene(&mut self, ctx: &mut SceneContext<'_>, name: &str) -> Result<(), CatalogError> {
        let mut scene = self
            .forget(name)
            .ok_or_else(|| CatalogError::UnknownScene(name.to_string()))?;
        info!("Destroying scene '{name}'");
        scene.unload(ctx).map_err(|source| CatalogError::Unload {
            name: name.to_string(),
            source,
        })
    }

    /// Destroy every scene, newest first
    ///
    /// All scenes are removed even when one fails to unload; the first
    /// failure is returned.
    pub fn destroy_all_scenes(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), CatalogError> {
        let mut first_error = None;
        for name in std::mem::take(&mut self.order).into_iter().rev() {
            if let Err(err) = self.destroy_scene(ctx, &name) {
                warn!("{err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn forget(&mut self, name: &str) -> Option<SceneResource> {
        self.order.retain(|existing| existing != name);
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        self.scenes.remove(name)
    }

    /// Scene named `name`
    pub fn scene(&self, name: &str) -> Option<&SceneResource> {
        self.scenes.get(name)
    }

    /// Mutable scene named `name`
    pub fn scene_mut(&mut self, name: &str) -> Option<&mut SceneResource> {
        self.scenes.get_mut(name)
    }

    /// Scene most recently created or fetched through [`SceneCatalog::create_scene`]
    pub fn current_scene(&self) -> Option<&SceneResource> {
        self.current.as_deref().and_then(|name| self.scenes.get(name))
    }

    /// Scene names in creation order
    pub fn scene_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    /// Number of scenes
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether the catalog holds no scene
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
