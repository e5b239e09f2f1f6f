//! Scene node hierarchy
//!
//! A tree of named transform nodes under a single root. Nodes may also exist
//! detached from the tree (created but not yet added as a child); only nodes
//! reachable from the root are "in the scene graph" and get rendered.

use crate::foundation::math::{utils, Quat, Transform, Vec3};

use super::objects::AutoTracking;
use super::store::ObjectStore;
use super::{HostError, NodeId};

/// Name of the host graph root node
pub const ROOT_NODE_NAME: &str = "SceneRoot";

/// Frame a transform operation is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformSpace {
    /// The node's own frame
    Local,
    /// The parent node's frame
    #[default]
    Parent,
    /// World frame
    World,
}

/// Look-at request a node was turned by
#[derive(Debug, Clone, PartialEq)]
pub struct LookTarget {
    /// Node looked at, as the document names it
    pub node_name: Option<String>,
    /// Point looked at when no node is named
    pub position: Vec3,
    /// Frame of `position`
    pub relative_to: TransformSpace,
    /// Axis of the node that ends up pointing at the target
    pub local_direction: Vec3,
    /// Rotation the node had before it was turned
    pub base_rotation: Quat,
}

/// Positionable node in the scene graph
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Parent node, `None` for the root and for detached nodes
    pub parent: Option<NodeId>,
    /// Child nodes in insertion order
    pub children: Vec<NodeId>,
    /// Transform relative to the parent
    pub transform: Transform,
    /// Transform captured by the last initial state checkpoint
    pub initial: Transform,
    /// Node visibility
    pub visible: bool,
    /// Debug bounding box display
    pub show_bounding_box: bool,
    /// Automatic tracking of another node
    pub auto_tracking: Option<AutoTracking>,
    /// Look-at applied while the node was set up
    pub look_target: Option<LookTarget>,
}

impl SceneNode {
    fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            transform: Transform::identity(),
            initial: Transform::identity(),
            visible: true,
            show_bounding_box: false,
            auto_tracking: None,
            look_target: None,
        }
    }
}

/// Named node tree
#[derive(Debug, Clone)]
pub struct NodeGraph {
    nodes: ObjectStore<NodeId, SceneNode>,
    root: NodeId,
    next_auto_name: u64,
}

impl NodeGraph {
    /// Graph holding only the root node
    pub fn new() -> Self {
        let mut nodes = ObjectStore::new("scene node");
        // Empty store, the root name cannot collide
        let root = nodes.create(ROOT_NODE_NAME, SceneNode::new()).unwrap_or_default();
        Self {
            nodes,
            root,
            next_auto_name: 0,
        }
    }

    /// Root node handle
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached node; `None` generates a unique name
    pub fn create_node(&mut self, name: Option<&str>) -> Result<NodeId, HostError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.generate_name(),
        };
        self.nodes.create(name, SceneNode::new())
    }

    /// Create a node and add it under `parent`
    pub fn create_child(&mut self, parent: NodeId, name: Option<&str>) -> Result<NodeId, HostError> {
        if self.nodes.get(parent).is_none() {
            return Err(HostError::InvalidState("parent node does not exist".to_string()));
        }
        let child = self.create_node(name)?;
        self.add_child(parent, child)?;
        Ok(child)
    }

    fn generate_name(&mut self) -> String {
        loop {
            self.next_auto_name += 1;
            let candidate = format!("Unnamed_{}", self.next_auto_name);
            if !self.nodes.contains(&candidate) {
                return candidate;
            }
        }
    }

    /// Attach a detached node under `parent`
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        let child_node = self
            .nodes
            .get(child)
            .ok_or_else(|| HostError::InvalidState("child node does not exist".to_string()))?;
        if child_node.parent.is_some() || child == self.root {
            return Err(HostError::InvalidState(format!(
                "node '{}' already has a parent",
                self.name_of(child).unwrap_or_default()
            )));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(HostError::InvalidState("node cannot be its own ancestor".to_string()));
        }
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| HostError::InvalidState("parent node does not exist".to_string()))?;
        parent_node.children.push(child);
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = Some(parent);
        }
        Ok(())
    }

    /// Detach `child` from `parent`, keeping the child alive
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| HostError::InvalidState("parent node does not exist".to_string()))?;
        let before = parent_node.children.len();
        parent_node.children.retain(|c| *c != child);
        if parent_node.children.len() == before {
            return Err(HostError::InvalidState("node is not a child of the given parent".to_string()));
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = None;
        }
        Ok(())
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    /// Destroy a node by name; its children become detached
    pub fn destroy(&mut self, name: &str) -> Result<SceneNode, HostError> {
        let id = self.nodes.id(name).ok_or_else(|| HostError::NotFound {
            category: "scene node",
            name: name.to_string(),
        })?;
        if id == self.root {
            return Err(HostError::InvalidState("the root node cannot be destroyed".to_string()));
        }
        if let Some(parent) = self.nodes.get(id).and_then(|n| n.parent) {
            self.remove_child(parent, id)?;
        }
        let node = self.nodes.destroy(name)?;
        for child in &node.children {
            if let Some(child_node) = self.nodes.get_mut(*child) {
                child_node.parent = None;
            }
        }
        Ok(node)
    }

    /// Whether the node is reachable from the root
    pub fn is_in_scene_graph(&self, id: NodeId) -> bool {
        id == self.root || self.is_ancestor(self.root, id)
    }

    /// Handle of the node named `name`
    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.nodes.id(name)
    }

    /// Whether a node named `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains(name)
    }

    /// Node by handle
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Mutable node by handle
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Node name
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.nodes.name_of(id)
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root node exists for the graph lifetime
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in creation order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> + '_ {
        self.nodes.iter()
    }

    /// World transform of a node
    pub fn derived_transform(&self, id: NodeId) -> Transform {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.nodes.get(node_id) {
                Some(node) => {
                    chain.push(node.transform);
                    current = node.parent;
                }
                None => break,
            }
        }
        chain
            .iter()
            .rev()
            .fold(Transform::identity(), |world, local| world.combine(local))
    }

    /// World position of a node
    pub fn derived_position(&self, id: NodeId) -> Vec3 {
        self.derived_transform(id).position
    }

    /// Record the current transform as the initial state
    pub fn set_initial_state(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.initial = node.transform;
        }
    }

    /// Restore the transform recorded by the last checkpoint
    pub fn reset_to_initial_state(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.transform = node.initial;
        }
    }

    /// Rotate the node so `local_direction` points along `direction`
    pub fn set_direction(
        &mut self,
        id: NodeId,
        direction: Vec3,
        relative_to: TransformSpace,
        local_direction: Vec3,
    ) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let parent_direction = match relative_to {
            TransformSpace::Parent => direction,
            TransformSpace::Local => node.transform.rotation * direction,
            TransformSpace::World => {
                let parent_rotation = node
                    .parent
                    .map(|parent| self.derived_transform(parent).rotation)
                    .unwrap_or_else(Quat::identity);
                parent_rotation.inverse() * direction
            }
        };
        if parent_direction.norm_squared() <= f32::EPSILON || local_direction.norm_squared() <= f32::EPSILON {
            return;
        }
        let rotation = Quat::rotation_between(&local_direction.normalize(), &parent_direction.normalize())
            .unwrap_or_else(|| utils::orientation_facing(parent_direction) * utils::orientation_facing(local_direction).inverse());
        if let Some(node) = self.nodes.get_mut(id) {
            node.transform.rotation = rotation;
        }
    }

    /// Rotate the node so `local_direction` points at `target`
    pub fn look_at(&mut self, id: NodeId, target: Vec3, relative_to: TransformSpace, local_direction: Vec3) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let origin = match relative_to {
            TransformSpace::Local => Vec3::zeros(),
            TransformSpace::Parent => node.transform.position,
            TransformSpace::World => self.derived_position(id),
        };
        self.set_direction(id, target - origin, relative_to, local_direction);
    }
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}
