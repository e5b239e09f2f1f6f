//! Scene materializer
//!
//! Walks a parsed document and turns it into live host objects, recording
//! what it created in [`SceneContents`].
//!
//! ## Dispatch
//!
//! Every element with structured children declares an ordered table of
//! [`ChildRule`]s: `(tag, arity, handler)`. The walker runs the rules in table
//! order, so the processing order is fixed by the table rather than by the
//! document. A rule may also answer to alias tags; an optional rule then
//! handles whichever of its tags appears first. Children named by neither a
//! rule nor the element's inline list are recorded as unhandled.
//!
//! ## Failure isolation
//!
//! Handlers return [`LeafError`]. An `Unresolved` failure is logged, stored
//! and swallowed at the handler's scope so siblings keep loading; a `Fatal`
//! error propagates and aborts the whole load.

mod environment;
mod geometry;
mod objects;

use slotmap::Key;

use crate::config::LoaderConfig;
use crate::foundation::logging::{debug, info, warn};
use crate::foundation::math::{Quat, Vec3};
use crate::host::{HostError, LookTarget, NodeGraph, NodeId, ObjectStore, RenderTarget, SceneHost, TransformSpace};

use super::attributes;
use super::contents::{push_unique, AnimationPackage, SceneContents, UpAxis};
use super::document::Element;
use super::error::{DocumentCorrupt, LeafError, ObjectResolutionFailure, ReentrancyViolation, SceneError};
use super::properties::{NodeProperty, PropertyCategory};

/// Tags read directly by elements that only carry user data
pub(crate) const USER_DATA_TAGS: &[&str] = &["userData", "userDataReference"];

/// Tags read directly by node-like elements
pub(crate) const NODE_INLINE_TAGS: &[&str] = &[
    "position",
    "rotation",
    "quaternion",
    "scale",
    "userData",
    "userDataReference",
];

/// Processing function for one child element
pub(crate) type Handler<'h, C> = fn(&mut SceneMaterializer<'h>, &Element, C) -> Result<(), LeafError>;

/// How many children a rule consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    /// The first matching child only
    Optional,
    /// Every matching child, in document order
    Repeated,
}

/// One entry of a dispatch table
pub(crate) struct ChildRule<'h, C> {
    pub(crate) tag: &'static str,
    pub(crate) aliases: &'static [&'static str],
    pub(crate) arity: Arity,
    pub(crate) handler: Handler<'h, C>,
}

impl<'h, C> ChildRule<'h, C> {
    pub(crate) const fn optional(tag: &'static str, handler: Handler<'h, C>) -> Self {
        Self {
            tag,
            aliases: &[],
            arity: Arity::Optional,
            handler,
        }
    }

    pub(crate) const fn repeated(tag: &'static str, handler: Handler<'h, C>) -> Self {
        Self {
            tag,
            aliases: &[],
            arity: Arity::Repeated,
            handler,
        }
    }

    /// Also match children tagged with any of `aliases`
    pub(crate) fn with_aliases(self, aliases: &'static [&'static str]) -> Self {
        Self {
            tag: self.tag,
            aliases,
            arity: self.arity,
            handler: self.handler,
        }
    }

    fn matches(&self, tag: &str) -> bool {
        self.tag == tag || self.aliases.contains(&tag)
    }
}

/// Recursive walker for one load
pub(crate) struct SceneMaterializer<'h> {
    host: &'h mut dyn SceneHost,
    target: &'h mut dyn RenderTarget,
    config: &'h LoaderConfig,
    contents: &'h mut SceneContents,
    scene_name: &'h str,
    prefix: &'h str,
    group: &'h str,
    next_container: usize,
    next_node: usize,
    next_object: usize,
}

impl<'h> SceneMaterializer<'h> {
    pub(crate) fn new(
        host: &'h mut dyn SceneHost,
        target: &'h mut dyn RenderTarget,
        config: &'h LoaderConfig,
        contents: &'h mut SceneContents,
        scene_name: &'h str,
        prefix: &'h str,
        group: &'h str,
    ) -> Self {
        Self {
            host,
            target,
            config,
            contents,
            scene_name,
            prefix,
            group,
            next_container: 0,
            next_node: 0,
            next_object: 0,
        }
    }

    /// Materialize the `scene` element
    pub(crate) fn materialize(&mut self, scene: &Element) -> Result<(), SceneError> {
        self.record_metadata(scene);

        let root_name = format!("{}{}RootNode", self.prefix, self.scene_name);
        if self.host.objects().graph.contains(&root_name) {
            return Err(ReentrancyViolation { root: root_name }.into());
        }
        self.host.set_ambient_light(self.contents.settings.ambient);
        let root = self.host.objects_mut().graph.create_node(Some(&root_name))?;
        self.contents.root = Some(root);
        self.contents.root_name.clone_from(&root_name);
        debug!("Created scene root '{root_name}'");

        self.dispatch(scene, &Self::scene_rules(), USER_DATA_TAGS, ())?;
        let owner = self.scene_name;
        self.user_data(scene, owner, PropertyCategory::Scene);
        Ok(())
    }

    fn scene_rules() -> [ChildRule<'h, ()>; 13] {
        [
            ChildRule::optional("nodes", Self::process_nodes),
            ChildRule::optional("externals", Self::process_externals),
            ChildRule::optional("environment", Self::process_environment),
            ChildRule::optional("terrain", Self::process_terrain),
            ChildRule::optional("octree", Self::process_octree),
            ChildRule::optional("light", |m, element, ()| m.process_light(element, None)),
            ChildRule::optional("camera", |m, element, ()| m.process_camera(element, None)),
            ChildRule::optional("renderTextures", Self::process_render_textures),
            ChildRule::optional("queryFlags", Self::process_query_flags),
            ChildRule::optional("visibilityFlags", Self::process_visibility_flags),
            ChildRule::optional("instancedGeometries", Self::process_instanced_geometries),
            ChildRule::optional("staticGeometries", Self::process_static_geometries),
            ChildRule::optional("portalConnectedZones", Self::process_portal_zones),
        ]
    }

    fn node_rules() -> Vec<ChildRule<'h, NodeId>> {
        let mut rules = vec![
            ChildRule::optional("lookTarget", Self::process_look_target),
            ChildRule::optional("trackTarget", Self::process_track_target),
            ChildRule::repeated("node", Self::process_node),
        ];
        rules.extend(Self::attachment_rules());
        rules.push(ChildRule::optional("animations", Self::process_animations));
        rules
    }

    /// Objects that can hang off a node or a bone attachment
    fn attachment_rules() -> [ChildRule<'h, NodeId>; 6] {
        [
            ChildRule::repeated("entity", Self::process_entity),
            ChildRule::repeated("light", |m, element, parent| m.process_light(element, Some(parent))),
            ChildRule::repeated("camera", |m, element, parent| m.process_camera(element, Some(parent))),
            ChildRule::repeated("particleSystem", Self::process_particle_system),
            ChildRule::repeated("billboardSet", Self::process_billboard_set),
            ChildRule::repeated("plane", Self::process_plane),
        ]
    }

    /// Run `rules` over the children of `element`
    fn dispatch<C: Copy>(
        &mut self,
        element: &Element,
        rules: &[ChildRule<'h, C>],
        inline: &[&str],
        context: C,
    ) -> Result<(), SceneError> {
        for rule in rules {
            let mut matching = element.children().iter().filter(|child| rule.matches(child.tag()));
            match rule.arity {
                Arity::Optional => {
                    if let Some(child) = matching.next() {
                        self.isolate(rule.handler, child, context)?;
                    }
                }
                Arity::Repeated => {
                    for child in matching {
                        self.isolate(rule.handler, child, context)?;
                    }
                }
            }
        }
        self.note_unhandled(element, rules, inline);
        Ok(())
    }

    /// Run one handler, absorbing resolution failures
    fn isolate<C>(&mut self, handler: Handler<'h, C>, element: &Element, context: C) -> Result<(), SceneError> {
        match handler(self, element, context) {
            Ok(()) => Ok(()),
            Err(LeafError::Unresolved(failure)) => {
                self.report(failure);
                Ok(())
            }
            Err(LeafError::Fatal(error)) => Err(error),
        }
    }

    fn note_unhandled<C>(&mut self, element: &Element, rules: &[ChildRule<'h, C>], inline: &[&str]) {
        for child in element.children() {
            let tag = child.tag();
            if rules.iter().any(|rule| rule.matches(tag)) || inline.contains(&tag) {
                continue;
            }
            let key = format!("{}/{}", element.tag(), tag);
            if self.contents.unhandled_tags.contains(&key) {
                continue;
            }
            if self.config.warn_on_unhandled_tags {
                warn!("Unhandled element <{tag}> inside <{}>", element.tag());
            }
            self.contents.unhandled_tags.push(key);
        }
    }

    /// Log and keep a resolution failure without stopping the load
    fn report(&mut self, failure: ObjectResolutionFailure) {
        warn!("{failure}");
        self.contents.resolution_failures.push(failure);
    }

    fn record_metadata(&mut self, scene: &Element) {
        let owner = self.scene_name;
        let host_version = self.host.version().to_string();
        let host_name = self.host.name().to_string();
        let metadata = [
            ("formatVersion", "unknown"),
            ("id", "unknown"),
            ("minOgreVersion", host_version.as_str()),
            ("author", self.config.default_author.as_str()),
            ("sceneManager", host_name.as_str()),
            ("upAxis", "y"),
            ("unitsPerMeter", "100"),
            ("unitType", "centimeters"),
            ("ogreMaxVersion", "unknown"),
            ("application", "unknown"),
        ];
        for (name, default) in metadata {
            let value = attributes::string(scene, name, default);
            self.contents
                .properties
                .insert(NodeProperty::new(owner, name, value, PropertyCategory::Scene));
        }

        let settings = &mut self.contents.settings;
        settings.up_axis = UpAxis::from_name(&attributes::string(scene, "upAxis", "y"));
        settings.unit_factor = 1.0;
        if attributes::string(scene, "application", "unknown").to_lowercase() == "maya" {
            settings.animation_package = AnimationPackage::Maya;
        }
    }

    fn root(&self) -> Result<NodeId, HostError> {
        self.contents
            .root
            .ok_or_else(|| HostError::InvalidState("scene root has not been created".to_string()))
    }

    fn prefixed(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Prefixed `name` attribute, or a generated name for unnamed objects
    fn object_name(&mut self, element: &Element, kind: &str) -> String {
        let name = attributes::string_or_empty(element, "name");
        if name.is_empty() {
            self.next_object += 1;
            format!("{}{}{}", self.prefix, kind, self.next_object)
        } else {
            self.prefixed(&name)
        }
    }

    /// Node referenced by the document: prefixed name first, then as written
    fn resolve_node(&self, name: &str) -> Option<NodeId> {
        let graph = &self.host.objects().graph;
        graph.id(&self.prefixed(name)).or_else(|| graph.id(name))
    }

    fn node_name(&self, node: NodeId) -> String {
        self.host
            .objects()
            .graph
            .name_of(node)
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Apply position, rotation and scale children, then checkpoint
    fn apply_transform(&mut self, node: NodeId, element: &Element) -> Result<(), DocumentCorrupt> {
        let factor = self.contents.settings.unit_factor;
        let position = element.first_child("position").map(attributes::vector3).transpose()?;
        let rotation = orientation(element)?;
        let scale = element.first_child("scale").map(attributes::vector3).transpose()?;

        let graph = &mut self.host.objects_mut().graph;
        if let Some(scene_node) = graph.get_mut(node) {
            if let Some(position) = position {
                scene_node.transform.position = position * factor;
            }
            if let Some(rotation) = rotation {
                scene_node.transform.rotation = rotation;
            }
            if let Some(scale) = scale {
                scene_node.transform.scale = scale;
            }
        }
        graph.set_initial_state(node);
        Ok(())
    }

    fn process_nodes(&mut self, element: &Element, (): ()) -> Result<(), LeafError> {
        let root = self.root()?;
        let name = unused_node_name(&self.host.objects().graph, self.prefix, "Nodes", &mut self.next_container);
        let container = self.host.objects_mut().graph.create_child(root, Some(&name))?;
        push_unique(&mut self.contents.nodes, &name);
        self.apply_transform(container, element)?;

        let rules = [ChildRule::repeated("node", Self::process_node)];
        self.dispatch(element, &rules, NODE_INLINE_TAGS, container)?;
        self.user_data(element, &name, PropertyCategory::SceneNode);
        Ok(())
    }

    fn process_node(&mut self, element: &Element, parent: NodeId) -> Result<(), LeafError> {
        let declared = attributes::string_or_empty(element, "name");
        let node = if declared.is_empty() {
            let name = unused_node_name(&self.host.objects().graph, self.prefix, "Node", &mut self.next_node);
            self.host.objects_mut().graph.create_child(parent, Some(&name))?
        } else {
            let name = self.prefixed(&declared);
            if self.host.objects().graph.contains(&name) {
                return Err(ObjectResolutionFailure::new("scene node", &name, &name, "a node with this name already exists").into());
            }
            self.host.objects_mut().graph.create_child(parent, Some(&name))?
        };
        let name = self.node_name(node);
        push_unique(&mut self.contents.nodes, &name);

        let visible = attributes::boolean(element, "visible", true);
        if let Some(scene_node) = self.host.objects_mut().graph.get_mut(node) {
            scene_node.visible = visible;
        }
        let is_target = attributes::boolean(element, "isTarget", false);
        self.contents.properties.insert(NodeProperty::new(
            &name,
            "isTarget",
            is_target.to_string(),
            PropertyCategory::SceneNode,
        ));
        self.apply_transform(node, element)?;
        debug!("Created node '{name}'");

        self.dispatch(element, &Self::node_rules(), NODE_INLINE_TAGS, node)?;
        self.user_data(element, &name, PropertyCategory::SceneNode);
        Ok(())
    }

    /// Orient `node` towards a point or another node
    fn process_look_target(&mut self, element: &Element, node: NodeId) -> Result<(), LeafError> {
        let target_name = attributes::string_or_empty(element, "nodeName");
        let relative_to = match attributes::string(element, "relativeTo", "parent").to_lowercase().as_str() {
            "local" => TransformSpace::Local,
            "world" => TransformSpace::World,
            _ => TransformSpace::Parent,
        };
        let requested = element
            .first_child("position")
            .map(attributes::vector3)
            .transpose()?
            .unwrap_or_else(Vec3::zeros);
        let mut position = requested;
        let local_direction = element
            .first_child("localDirection")
            .map(attributes::vector3)
            .transpose()?
            .unwrap_or_else(|| -Vec3::z());

        let owner = self.node_name(node);
        let mut result: Result<(), LeafError> = Ok(());
        if !target_name.is_empty() {
            match self.resolve_node(&target_name) {
                Some(target) => position = self.host.objects().graph.derived_position(target),
                None => {
                    result = Err(ObjectResolutionFailure::new("look target", &owner, &target_name, "scene node not found").into());
                }
            }
        }
        let graph = &mut self.host.objects_mut().graph;
        let base_rotation = graph.get(node).map_or_else(Quat::identity, |n| n.transform.rotation);
        if result.is_ok() {
            graph.look_at(node, position, relative_to, local_direction);
        }
        if let Some(scene_node) = graph.get_mut(node) {
            scene_node.look_target = Some(LookTarget {
                node_name: (!target_name.is_empty()).then_some(target_name),
                position: requested,
                relative_to,
                local_direction,
                base_rotation,
            });
        }
        self.user_data(element, &owner, PropertyCategory::LookTarget);
        result
    }

    /// Make `node` keep facing another node
    fn process_track_target(&mut self, element: &Element, node: NodeId) -> Result<(), LeafError> {
        let target_name = attributes::string_or_empty(element, "nodeName");
        let local_direction = element
            .first_child("localDirection")
            .map(attributes::vector3)
            .transpose()?
            .unwrap_or_else(|| -Vec3::z());
        let offset = element
            .first_child("offset")
            .map(attributes::vector3)
            .transpose()?
            .unwrap_or_else(Vec3::zeros);

        let owner = self.node_name(node);
        let result: Result<(), LeafError> = match self.resolve_node(&target_name) {
            Some(target) => {
                if let Some(scene_node) = self.host.objects_mut().graph.get_mut(node) {
                    scene_node.auto_tracking = Some(crate::host::AutoTracking {
                        target,
                        local_direction,
                        offset,
                    });
                }
                Ok(())
            }
            None => Err(ObjectResolutionFailure::new("track target", &owner, &target_name, "scene node not found").into()),
        };
        self.user_data(element, &owner, PropertyCategory::TrackTarget);
        result
    }

    /// Record `userData` and `userDataReference` children of `element`
    fn user_data(&mut self, element: &Element, owner: &str, category: PropertyCategory) {
        for data in element.children_named("userData") {
            let mut properties = data.children_named("property").peekable();
            if properties.peek().is_some() {
                for property in properties {
                    let name = attributes::string_or_empty(property, "name");
                    let mut value = attributes::string_or_empty(property, "data");
                    if value.is_empty() {
                        value.clone_from(&name);
                    }
                    self.contents.properties.record(owner, &name, &value, category);
                }
            } else {
                self.record_reference(data, owner, category);
            }
        }
        for reference in element.children_named("userDataReference") {
            self.record_reference(reference, owner, category);
        }
    }

    fn record_reference(&mut self, element: &Element, owner: &str, category: PropertyCategory) {
        let id = attributes::string(element, "id", "id");
        let mut value = attributes::string_or_empty(element, "value");
        if value.is_empty() {
            value.clone_from(&id);
        }
        self.contents.properties.record(owner, &id, &value, category);
    }
}

/// `prefix + kind + counter`, skipping names the graph already holds
fn unused_node_name(graph: &NodeGraph, prefix: &str, kind: &str, counter: &mut usize) -> String {
    loop {
        *counter += 1;
        let candidate = format!("{prefix}{kind}{counter}");
        if !graph.contains(&candidate) {
            return candidate;
        }
    }
}

/// Orientation from a `rotation` child, overridden by a `quaternion` child
fn orientation(element: &Element) -> Result<Option<Quat>, DocumentCorrupt> {
    let mut orientation = None;
    for tag in ["rotation", "quaternion"] {
        if let Some(child) = element.first_child(tag) {
            orientation = Some(attributes::quaternion(child)?);
        }
    }
    Ok(orientation)
}

/// Handle of `name`, creating it with `make` when missing
fn get_or_create<K: Key, T>(
    store: &mut ObjectStore<K, T>,
    name: &str,
    make: impl FnOnce() -> T,
) -> Result<K, HostError> {
    match store.id(name) {
        Some(id) => Ok(id),
        None => store.create(name, make()),
    }
}

/// Store `value` under `name`, replacing an existing object
fn upsert<K: Key, T>(store: &mut ObjectStore<K, T>, name: &str, value: T) -> Result<K, HostError> {
    match store.id(name) {
        Some(id) => {
            if let Some(existing) = store.get_mut(id) {
                *existing = value;
            }
            Ok(id)
        }
        None => store.create(name, value),
    }
}

fn log_skipped(kind: &str, count: usize) {
    info!("Skipping {count} {kind} element(s)");
}
