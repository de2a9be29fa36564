// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node runtime.
//!
//! Every node in a graph is the same concrete [`Node`] type: the data every
//! node has lives in [`NodeCore`], and the type-specific logic is a boxed
//! [`NodeBehavior`] produced by the node's [`NodeClass`].
//!
//! ## Lifecycle
//!
//! `Unattached -> Attached -> Live`. A node becomes attached when a graph
//! adds it and fires `on_add_to_graph`. It becomes live, exactly once, the
//! first time every declared input port has an incoming connection.

use crate::connection::{Connection, EdgeId};
use crate::error::NodeError;
use crate::schema::NodeClass;
use crate::value::{values_equal, Attributes, Payload};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token returned by [`NodeCore::register_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// External observer of a node (inspector panes and the like)
pub type Listener = Rc<dyn Fn(&NodeCore)>;

/// Type-specific node logic.
///
/// Every hook has a default; a usable node type overrides at least
/// [`NodeBehavior::process`].
pub trait NodeBehavior {
    /// The node was inserted into a graph
    fn on_add_to_graph(&mut self, _node: &mut NodeCore) {}

    /// Every input port is connected for the first time
    fn will_become_live(&mut self, _node: &mut NodeCore) {}

    /// The node is about to leave its graph; release owned resources here
    fn will_be_removed(&mut self, _node: &mut NodeCore) {}

    /// An incoming edge is about to attach
    fn before_connect_in(&mut self, _node: &mut NodeCore, _edge: &Connection) {}

    /// An incoming edge attached and delivered its first value
    fn after_connect_in(&mut self, _node: &mut NodeCore, _edge: &Connection) {}

    /// An outgoing edge is about to attach
    fn before_connect_out(&mut self, _node: &mut NodeCore, _edge: &Connection) {}

    /// An outgoing edge attached
    fn after_connect_out(&mut self, _node: &mut NodeCore, _edge: &Connection) {}

    /// An incoming edge was removed
    fn on_disconnect_in(&mut self, _node: &mut NodeCore, _edge: &Connection) {}

    /// An outgoing edge was removed
    fn on_disconnect_out(&mut self, _node: &mut NodeCore, _edge: &Connection) {}

    /// Props changed. `manual` is true for direct edits, false for edge deliveries.
    fn will_receive_props(&mut self, _node: &mut NodeCore, _old_props: &Attributes, _manual: bool) {}

    /// An edge delivered data; returns the output keys worth re-evaluating
    fn on_input_change(&mut self, node: &mut NodeCore, _edge: &Connection, _change: &Payload) -> Vec<String> {
        node.out_keys()
    }

    /// Compute the requested outputs from current props and state
    fn process(&mut self, node: &NodeCore, _keys: &[String]) -> Result<Payload, NodeError> {
        Err(NodeError::NotImplemented(node.class().registry_name().to_string()))
    }

    /// Capability query for nodes that collect render passes from their inputs
    fn render_target(&mut self) -> Option<&mut dyn AcceptsRenderPass> {
        None
    }
}

/// Capability for nodes that treat incoming connections as render passes
pub trait AcceptsRenderPass {
    /// A connection into this node was made
    fn attach_render_pass(&mut self, node: &mut NodeCore, edge: &Connection);

    /// A connection into this node was removed
    fn detach_render_pass(&mut self, node: &mut NodeCore, edge: &Connection);
}

/// Optional construction parameters
#[derive(Debug, Clone, Default)]
pub struct NodeOptions {
    /// Fixed id (a fresh one is generated otherwise)
    pub id: Option<NodeId>,
    /// User label
    pub title: Option<String>,
    /// Initial state, applied over the class defaults
    pub state: Payload,
    /// Initial props, applied over the class defaults
    pub props: Payload,
}

/// Data shared by every node regardless of type
pub struct NodeCore {
    id: NodeId,
    title: Option<String>,
    class: Arc<NodeClass>,
    pub(crate) props: Attributes,
    pub(crate) state: Attributes,
    pub(crate) output_cache: Attributes,
    pub(crate) inputs: Vec<Connection>,
    pub(crate) outputs: Vec<Connection>,
    attached: bool,
    live: bool,
    listeners: IndexMap<ListenerId, Listener>,
    next_listener: u64,
}

impl NodeCore {
    /// Node id
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// User label, if any
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Set or clear the user label
    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    /// Label shown to users: the title, falling back to the class display name
    pub fn label(&self) -> &str {
        self.title().unwrap_or_else(|| self.class.display_name())
    }

    /// Node class
    pub fn class(&self) -> &Arc<NodeClass> {
        &self.class
    }

    /// Current props (externally driven inputs)
    pub fn props(&self) -> &Attributes {
        &self.props
    }

    /// Current internal state
    pub fn state(&self) -> &Attributes {
        &self.state
    }

    /// Merge a patch into state; returns whether anything changed
    pub fn set_state(&mut self, patch: &Payload) -> bool {
        self.state.merge(patch)
    }

    /// Last computed value per output key
    pub fn output_cache(&self) -> &Attributes {
        &self.output_cache
    }

    /// Incoming connections in attach order
    pub fn inputs(&self) -> &[Connection] {
        &self.inputs
    }

    /// Outgoing connections in attach order
    pub fn outputs(&self) -> &[Connection] {
        &self.outputs
    }

    /// Whether the node has been added to a graph
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Whether the node has become live
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Declared input keys
    pub fn in_keys(&self) -> Vec<String> {
        self.class.schema().input.keys().cloned().collect()
    }

    /// Declared output keys
    pub fn out_keys(&self) -> Vec<String> {
        self.class.schema().output.keys().cloned().collect()
    }

    /// Declared state keys
    pub fn state_keys(&self) -> Vec<String> {
        self.class.schema().state.keys().cloned().collect()
    }

    /// Input keys that must be connected before the node goes live.
    ///
    /// Every declared input is required; there is no optional-input marker.
    pub fn required_input_keys(&self) -> Vec<String> {
        self.in_keys()
    }

    /// Input port keys with at least one incoming connection
    pub fn connected_input_keys(&self) -> Vec<String> {
        let keys: IndexSet<&String> = self.inputs.iter().map(|c| &c.to_port).collect();
        keys.into_iter().cloned().collect()
    }

    /// Output port keys with at least one outgoing connection
    pub fn connected_output_keys(&self) -> Vec<String> {
        let keys: IndexSet<&String> = self.outputs.iter().map(|c| &c.from_port).collect();
        keys.into_iter().cloned().collect()
    }

    /// Register an observer, called on every output notification
    pub fn register_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&NodeCore) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id, Rc::new(listener));
        id
    }

    /// Remove an observer; returns whether it was registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.shift_remove(&id).is_some()
    }

    /// Number of registered observers
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn is_fully_connected(&self) -> bool {
        let connected = self.connected_input_keys();
        self.required_input_keys().iter().all(|key| connected.contains(key))
    }
}

impl fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCore")
            .field("id", &self.id)
            .field("class", &self.class.registry_name())
            .field("title", &self.title)
            .field("props", &self.props)
            .field("state", &self.state)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

/// A node instance
pub struct Node {
    core: NodeCore,
    behavior: Box<dyn NodeBehavior>,
}

impl Node {
    /// Create a node of the given class with default options
    pub fn new(class: &Arc<NodeClass>) -> Self {
        Self::with_options(class, NodeOptions::default())
    }

    /// Create a node of the given class.
    ///
    /// State is seeded from the schema defaults, then the class defaults,
    /// then `options.state`.
    pub fn with_options(class: &Arc<NodeClass>, options: NodeOptions) -> Self {
        let mut state: Payload = class
            .schema()
            .state
            .iter()
            .map(|(key, ty)| (key.clone(), ty.default_value().clone()))
            .collect();
        state.extend(class.default_state().clone());
        state.extend(options.state);

        let mut props = class.default_props().clone();
        props.extend(options.props);

        Self {
            core: NodeCore {
                id: options.id.unwrap_or_default(),
                title: options.title,
                class: Arc::clone(class),
                props: Attributes::from_payload(props),
                state: Attributes::from_payload(state),
                output_cache: Attributes::new(),
                inputs: Vec::new(),
                outputs: Vec::new(),
                attached: false,
                live: false,
                listeners: IndexMap::new(),
                next_listener: 0,
            },
            behavior: class.instantiate(),
        }
    }

    /// Node id
    pub fn id(&self) -> &NodeId {
        self.core.id()
    }

    /// Shared node data
    pub fn core(&self) -> &NodeCore {
        &self.core
    }

    /// Shared node data, mutably
    pub fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    /// Run the behavior's `process` without touching the output cache.
    ///
    /// The result is restricted to the requested keys; keys the schema does
    /// not declare as outputs are dropped with a warning.
    pub fn process(&mut self, keys: &[String]) -> Result<Payload, NodeError> {
        let mut result = self.behavior.process(&self.core, keys)?;
        let declared = &self.core.class.schema().output;
        result.retain(|key, _| {
            if !declared.contains_key(key) {
                tracing::warn!(node = %self.core.id, key = %key, "process returned undeclared output");
                return false;
            }
            keys.contains(key)
        });
        Ok(result)
    }

    /// Process, diff against the output cache, and update the cache.
    ///
    /// Returns every computed key when `force` is set, otherwise only the
    /// keys whose value differs (deep equality) from the cached one. The
    /// cache always ends up holding the full result.
    pub fn process_outputs(&mut self, keys: &[String], force: bool) -> Result<Payload, NodeError> {
        let full = self.process(keys)?;
        let forward = if force {
            full.clone()
        } else {
            full.iter()
                .filter(|(key, value)| {
                    !self.core.output_cache.get(key).is_some_and(|cached| values_equal(cached, value))
                })
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        };
        self.core.output_cache.merge(&full);
        Ok(forward)
    }

    /// Invoke every registered listener
    pub(crate) fn notify_listeners(&self) {
        let listeners: Vec<Listener> = self.core.listeners.values().cloned().collect();
        for listener in listeners {
            listener(&self.core);
        }
    }

    /// Mark as attached and fire `on_add_to_graph`
    pub(crate) fn attach(&mut self) {
        self.core.attached = true;
        self.behavior.on_add_to_graph(&mut self.core);
        self.check_live();
    }

    /// Flip to live if every required input is connected; returns the live flag
    pub(crate) fn check_live(&mut self) -> bool {
        if !self.core.live && self.core.attached && self.core.is_fully_connected() {
            self.behavior.will_become_live(&mut self.core);
            self.core.live = true;
            tracing::debug!(node = %self.core.id, "node became live");
        }
        self.core.live
    }

    pub(crate) fn add_output(&mut self, edge: &Connection) {
        self.behavior.before_connect_out(&mut self.core, edge);
        self.core.outputs.push(edge.clone());
        self.behavior.after_connect_out(&mut self.core, edge);
    }

    /// First half of attaching an input: hook, then record the connection
    pub(crate) fn begin_input(&mut self, edge: &Connection) {
        self.behavior.before_connect_in(&mut self.core, edge);
        self.core.inputs.push(edge.clone());
        if let Some(target) = self.behavior.render_target() {
            target.attach_render_pass(&mut self.core, edge);
        }
    }

    /// Second half of attaching an input: liveness check, then hook
    pub(crate) fn finish_input(&mut self, edge: &Connection) {
        self.check_live();
        self.behavior.after_connect_in(&mut self.core, edge);
    }

    pub(crate) fn remove_input(&mut self, id: &EdgeId) -> bool {
        let Some(index) = self.core.inputs.iter().position(|c| c.id == *id) else {
            return false;
        };
        let edge = self.core.inputs.remove(index);
        if let Some(target) = self.behavior.render_target() {
            target.detach_render_pass(&mut self.core, &edge);
        }
        self.behavior.on_disconnect_in(&mut self.core, &edge);
        true
    }

    pub(crate) fn remove_output(&mut self, id: &EdgeId) -> bool {
        let Some(index) = self.core.outputs.iter().position(|c| c.id == *id) else {
            return false;
        };
        let edge = self.core.outputs.remove(index);
        self.behavior.on_disconnect_out(&mut self.core, &edge);
        true
    }

    /// Merge delivered data into props and ask the behavior which outputs to re-evaluate
    pub(crate) fn receive(&mut self, edge: &Connection, change: &Payload) -> Vec<String> {
        let old_props = self.core.props.snapshot();
        self.core.props.merge(change);
        self.behavior.will_receive_props(&mut self.core, &old_props, false);
        self.behavior.on_input_change(&mut self.core, edge, change)
    }

    /// Merge a direct edit into props
    pub(crate) fn receive_manual(&mut self, change: &Payload) {
        let old_props = self.core.props.snapshot();
        self.core.props.merge(change);
        self.behavior.will_receive_props(&mut self.core, &old_props, true);
    }

    pub(crate) fn teardown(&mut self) {
        self.behavior.will_be_removed(&mut self.core);
        self.core.attached = false;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.fmt(f)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::NodeSchema;
    use crate::types::TypeRegistry;
    use crate::value::{payload, Value};
    use serde_json::json;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Emits `state.value` on `out`
    pub(crate) struct Source;

    impl NodeBehavior for Source {
        fn process(&mut self, node: &NodeCore, _keys: &[String]) -> Result<Payload, NodeError> {
            let value = node.state().get("value").cloned().unwrap_or(Value::Null);
            Ok(payload([("out", value)]))
        }
    }

    /// Emits `props.in * 2` on `doubled`, counting process calls
    #[derive(Default)]
    pub(crate) struct Doubler {
        pub(crate) calls: Arc<AtomicU32>,
    }

    impl NodeBehavior for Doubler {
        fn process(&mut self, node: &NodeCore, _keys: &[String]) -> Result<Payload, NodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match node.props().get_f64("in") {
                Some(n) => Ok(payload([("doubled", json!(n * 2.0))])),
                None => Ok(Payload::new()),
            }
        }
    }

    pub(crate) fn source_class(types: &TypeRegistry) -> Arc<NodeClass> {
        let number = types.require("number").unwrap();
        Arc::new(
            NodeClass::new("Source", || Box::new(Source))
                .with_schema(NodeSchema::new().output("out", Arc::clone(&number)).state("value", number))
                .with_default_state("value", json!(5)),
        )
    }

    pub(crate) fn doubler_class(types: &TypeRegistry, calls: Arc<AtomicU32>) -> Arc<NodeClass> {
        let number = types.require("number").unwrap();
        let class = NodeClass::new("Doubler", move || {
            Box::new(Doubler {
                calls: Arc::clone(&calls),
            })
        });
        Arc::new(class.with_schema(NodeSchema::new().input("in", Arc::clone(&number)).output("doubled", number)))
    }

    #[test]
    fn test_state_seeding_order() {
        let types = TypeRegistry::with_builtins().unwrap();
        let class = source_class(&types);

        let node = Node::new(&class);
        assert_eq!(node.core().state().get("value"), Some(&json!(5)));

        let node = Node::with_options(
            &class,
            NodeOptions {
                id: Some(NodeId::from("fixed")),
                state: payload([("value", json!(9))]),
                ..Default::default()
            },
        );
        assert_eq!(node.id(), &NodeId::from("fixed"));
        assert_eq!(node.core().state().get("value"), Some(&json!(9)));
    }

    #[test]
    fn test_cache_absorbs_repeat_process() {
        let types = TypeRegistry::with_builtins().unwrap();
        let mut node = Node::new(&source_class(&types));
        let keys = node.core().out_keys();

        let first = node.process_outputs(&keys, false).unwrap();
        assert_eq!(first, payload([("out", json!(5))]));
        assert!(node.process_outputs(&keys, false).unwrap().is_empty());
        assert_eq!(node.core().output_cache().get("out"), Some(&json!(5)));
    }

    #[test]
    fn test_forced_process_returns_everything() {
        let types = TypeRegistry::with_builtins().unwrap();
        let mut node = Node::new(&source_class(&types));
        let keys = node.core().out_keys();

        node.process_outputs(&keys, false).unwrap();
        let forced = node.process_outputs(&keys, true).unwrap();
        assert_eq!(forced, payload([("out", json!(5))]));
    }

    #[test]
    fn test_default_process_is_not_implemented() {
        struct Inert;
        impl NodeBehavior for Inert {}

        let class = Arc::new(NodeClass::new("Inert", || Box::new(Inert)));
        let mut node = Node::new(&class);
        let err = node.process(&[]).unwrap_err();
        assert_eq!(err, NodeError::NotImplemented("Inert".to_string()));
    }

    #[test]
    fn test_listeners() {
        let types = TypeRegistry::with_builtins().unwrap();
        let mut node = Node::new(&source_class(&types));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let token = node
            .core_mut()
            .register_listener(move |core| sink.borrow_mut().push(core.id().clone()));
        node.notify_listeners();
        assert_eq!(seen.borrow().len(), 1);

        assert!(node.core_mut().remove_listener(token));
        assert!(!node.core_mut().remove_listener(token));
        node.notify_listeners();
        assert_eq!(seen.borrow().len(), 1);
    }
}
