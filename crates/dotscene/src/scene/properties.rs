//! Property registry
//!
//! Flat, insertion-ordered list of `(owner, name, value, category)` facts
//! collected from `userData` annotations and scene metadata. Properties are
//! never removed one at a time; the registry is cleared as a whole when its
//! scene unloads.
//!
//! Several properties may share an owner and name. Single-value lookups
//! ([`PropertyRegistry::value`]) return the most recently recorded one.

use std::fmt;

/// Kind of object a property annotates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyCategory {
    /// Billboard set
    BillboardSet,
    /// Skeleton bone attachment
    Bone,
    /// Camera
    Camera,
    /// Entity
    Entity,
    /// Environment block
    Environment,
    /// External resource
    External,
    /// Fog
    Fog,
    /// Light
    Light,
    /// Look target
    LookTarget,
    /// Mesh
    Mesh,
    /// Octree
    Octree,
    /// Octree node
    OctreeNode,
    /// Octree mesh
    OctreeMesh,
    /// Particle system
    ParticleSystem,
    /// Plane
    Plane,
    /// The scene itself
    Scene,
    /// Scene node
    SceneNode,
    /// Sky box
    SkyBox,
    /// Sky dome
    SkyDome,
    /// Sky plane
    SkyPlane,
    /// Terrain
    Terrain,
    /// Track target
    TrackTarget,
    /// Anything else
    Unknown,
}

impl PropertyCategory {
    /// Every category
    pub const ALL: [PropertyCategory; 23] = [
        Self::BillboardSet,
        Self::Bone,
        Self::Camera,
        Self::Entity,
        Self::Environment,
        Self::External,
        Self::Fog,
        Self::Light,
        Self::LookTarget,
        Self::Mesh,
        Self::Octree,
        Self::OctreeNode,
        Self::OctreeMesh,
        Self::ParticleSystem,
        Self::Plane,
        Self::Scene,
        Self::SceneNode,
        Self::SkyBox,
        Self::SkyDome,
        Self::SkyPlane,
        Self::Terrain,
        Self::TrackTarget,
        Self::Unknown,
    ];

    /// Stable lower camel case name
    pub fn name(self) -> &'static str {
        match self {
            Self::BillboardSet => "billboardSet",
            Self::Bone => "bone",
            Self::Camera => "camera",
            Self::Entity => "entity",
            Self::Environment => "environment",
            Self::External => "external",
            Self::Fog => "fog",
            Self::Light => "light",
            Self::LookTarget => "lookTarget",
            Self::Mesh => "mesh",
            Self::Octree => "octree",
            Self::OctreeNode => "octreeNode",
            Self::OctreeMesh => "octreeMesh",
            Self::ParticleSystem => "particleSystem",
            Self::Plane => "plane",
            Self::Scene => "scene",
            Self::SceneNode => "sceneNode",
            Self::SkyBox => "skyBox",
            Self::SkyDome => "skyDome",
            Self::SkyPlane => "skyPlane",
            Self::Terrain => "terrain",
            Self::TrackTarget => "trackTarget",
            Self::Unknown => "unknown",
        }
    }

    /// Category from its name, `Unknown` when unrecognized
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.name() == name)
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for PropertyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One recorded fact about a named object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeProperty {
    /// Name of the annotated object
    pub owner: String,
    /// Property name
    pub name: String,
    /// Property value
    pub value: String,
    /// Kind of the annotated object
    pub category: PropertyCategory,
}

impl NodeProperty {
    /// Build a property without normalization
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
        category: PropertyCategory,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            value: value.into(),
            category,
        }
    }

    /// Value, or the name itself when the value is empty
    pub fn effective_value(&self) -> &str {
        if self.value.is_empty() {
            &self.name
        } else {
            &self.value
        }
    }
}

/// Normalize boolean-shaped property names
///
/// `isnotX` becomes `x = "false"` and `isX` becomes `x = "true"` (names are
/// lower-cased for the check and the result); other names pass unchanged.
pub fn normalize(name: &str, value: &str) -> (String, String) {
    let lowered = name.to_lowercase();
    if let Some(rest) = lowered.strip_prefix("isnot") {
        (rest.to_string(), "false".to_string())
    } else if let Some(rest) = lowered.strip_prefix("is") {
        (rest.to_string(), "true".to_string())
    } else {
        (name.to_string(), value.to_string())
    }
}

/// Append-only property list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyRegistry {
    properties: Vec<NodeProperty>,
}

impl PropertyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user property, normalizing `is`/`isnot` names
    pub fn record(
        &mut self,
        owner: impl Into<String>,
        name: &str,
        value: &str,
        category: PropertyCategory,
    ) -> &NodeProperty {
        let (name, value) = normalize(name, value);
        self.insert(NodeProperty::new(owner, name, value, category))
    }

    /// Append a property exactly as given
    pub fn insert(&mut self, property: NodeProperty) -> &NodeProperty {
        self.properties.push(property);
        // Just pushed, so the list is not empty
        &self.properties[self.properties.len() - 1]
    }

    /// Properties owned by `owner`, in insertion order
    pub fn of_owner<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a NodeProperty> + 'a {
        self.properties.iter().filter(move |p| p.owner == owner)
    }

    /// Properties with `category` and `name`; an empty `value` matches any value
    pub fn find<'a>(
        &'a self,
        category: PropertyCategory,
        name: &'a str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a NodeProperty> + 'a {
        self.properties
            .iter()
            .filter(move |p| p.category == category && p.name == name && (value.is_empty() || p.value == value))
    }

    /// Most recent property of `owner` called `name`
    pub fn get(&self, owner: &str, name: &str) -> Option<&NodeProperty> {
        self.properties
            .iter()
            .rev()
            .find(|p| p.owner == owner && p.name == name)
    }

    /// Effective value of the most recent matching property
    pub fn value(&self, owner: &str, name: &str) -> Option<&str> {
        self.get(owner, name).map(NodeProperty::effective_value)
    }

    /// Boolean value: case-insensitive `true`, anything else is false
    pub fn value_bool(&self, owner: &str, name: &str) -> bool {
        self.value(owner, name)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }

    /// Integer value, `None` when absent or not an integer
    pub fn value_int(&self, owner: &str, name: &str) -> Option<i64> {
        self.value(owner, name).and_then(|value| value.trim().parse().ok())
    }

    /// Real value, `None` when absent or not a number
    pub fn value_real(&self, owner: &str, name: &str) -> Option<f32> {
        self.value(owner, name).and_then(|value| value.trim().parse().ok())
    }

    /// All properties in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, NodeProperty> {
        self.properties.iter()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether no property is recorded
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.properties.clear();
    }
}

impl<'a> IntoIterator for &'a PropertyRegistry {
    type Item = &'a NodeProperty;
    type IntoIter = std::slice::Iter<'a, NodeProperty>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
