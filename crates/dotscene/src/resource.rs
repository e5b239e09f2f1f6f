//! Resource groups
//!
//! A resource group maps file names to byte content. Scene documents are read
//! whole through a [`ResourceGroupManager`], which can also locate the group
//! holding a file when the caller asks for auto-detection.
//!
//! ## Usage
//!
//! ```no_run
//! use dotscene::resource::{FileSystemGroup, ResourceGroupManager};
//! use dotscene::config::AUTODETECT_RESOURCE_GROUP;
//!
//! let mut resources = ResourceGroupManager::new();
//! resources.add_group(FileSystemGroup::new("General", "media/scenes"));
//! let text = resources.open("level1.scene", AUTODETECT_RESOURCE_GROUP)?;
//! # Ok::<(), dotscene::resource::ResourceError>(())
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::AUTODETECT_RESOURCE_GROUP;

/// Resource lookup errors
#[derive(Debug, Error)]
pub enum ResourceError {
    /// No group holds the file
    #[error("resource '{file}' not found in group '{group}'")]
    NotFound {
        /// Requested file
        file: String,
        /// Group searched
        group: String,
    },

    /// The named group is not registered
    #[error("unknown resource group '{0}'")]
    UnknownGroup(String),

    /// Reading the file failed
    #[error("failed to read resource '{file}': {source}")]
    Io {
        /// File being read
        file: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Named source of resource files
pub trait ResourceGroup {
    /// Group name
    fn name(&self) -> &str;

    /// Whether the group holds `file`
    fn exists(&self, file: &str) -> bool;

    /// Read `file` fully as text
    fn open(&self, file: &str) -> Result<String, ResourceError>;
}

/// Group backed by a directory
#[derive(Debug, Clone)]
pub struct FileSystemGroup {
    name: String,
    root: PathBuf,
}

impl FileSystemGroup {
    /// Group `name` reading files below `root`
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the group's files
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceGroup for FileSystemGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, file: &str) -> bool {
        self.root.join(file).is_file()
    }

    fn open(&self, file: &str) -> Result<String, ResourceError> {
        let path = self.root.join(file);
        if !path.is_file() {
            return Err(ResourceError::NotFound {
                file: file.to_string(),
                group: self.name.clone(),
            });
        }
        std::fs::read_to_string(&path).map_err(|source| ResourceError::Io {
            file: file.to_string(),
            source,
        })
    }
}

/// Group backed by in-memory strings
#[derive(Debug, Clone, Default)]
pub struct MemoryGroup {
    name: String,
    files: BTreeMap<String, String>,
}

impl MemoryGroup {
    /// Empty group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: BTreeMap::new(),
        }
    }

    /// Add or replace a file
    pub fn with_file(mut self, file: impl Into<String>, contents: impl Into<String>) -> Self {
        self.insert(file, contents);
        self
    }

    /// Add or replace a file in place
    pub fn insert(&mut self, file: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(file.into(), contents.into());
    }
}

impl ResourceGroup for MemoryGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, file: &str) -> bool {
        self.files.contains_key(file)
    }

    fn open(&self, file: &str) -> Result<String, ResourceError> {
        self.files.get(file).cloned().ok_or_else(|| ResourceError::NotFound {
            file: file.to_string(),
            group: self.name.clone(),
        })
    }
}

/// Registry of resource groups, searched in registration order
#[derive(Default)]
pub struct ResourceGroupManager {
    groups: Vec<Box<dyn ResourceGroup>>,
}

impl ResourceGroupManager {
    /// Manager without groups
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Register a group, replacing any group of the same name
    pub fn add_group(&mut self, group: impl ResourceGroup + 'static) {
        self.groups.retain(|existing| existing.name() != group.name());
        self.groups.push(Box::new(group));
    }

    /// Builder form of [`ResourceGroupManager::add_group`]
    pub fn with_group(mut self, group: impl ResourceGroup + 'static) -> Self {
        self.add_group(group);
        self
    }

    /// Registered group names in search order
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|group| group.name()).collect()
    }

    fn group(&self, name: &str) -> Result<&dyn ResourceGroup, ResourceError> {
        self.groups
            .iter()
            .find(|group| group.name() == name)
            .map(|group| &**group)
            .ok_or_else(|| ResourceError::UnknownGroup(name.to_string()))
    }

    /// First group holding `file`
    pub fn find_group_for(&self, file: &str) -> Result<&str, ResourceError> {
        self.groups
            .iter()
            .find(|group| group.exists(file))
            .map(|group| group.name())
            .ok_or_else(|| ResourceError::NotFound {
                file: file.to_string(),
                group: AUTODETECT_RESOURCE_GROUP.to_string(),
            })
    }

    /// Concrete group name for `file`, resolving the auto-detect sentinel
    pub fn resolve_group(&self, file: &str, group: &str) -> Result<String, ResourceError> {
        if group == AUTODETECT_RESOURCE_GROUP {
            return self.find_group_for(file).map(str::to_string);
        }
        self.group(group).map(|group| group.name().to_string())
    }

    /// Read `file` from `group` (or from the detected group)
    pub fn open(&self, file: &str, group: &str) -> Result<String, ResourceError> {
        let group = self.resolve_group(file, group)?;
        self.group(&group)?.open(file)
    }
}

impl std::fmt::Debug for ResourceGroupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGroupManager")
            .field("groups", &self.group_names())
            .finish()
    }
}
