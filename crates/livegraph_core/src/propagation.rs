// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change propagation.
//!
//! Propagation is a plain synchronous call chain: a node notifies its
//! outputs, every edge whose source port changed delivers a one-key packet
//! to its target, and the target repeats the cycle. There is no scheduler
//! and no topological ordering; fan-out follows edge insertion order, so a
//! diamond can evaluate its join node more than once. A cyclic graph
//! recurses until the stack runs out.

use crate::connection::Connection;
use crate::error::GraphError;
use crate::graph::Graph;
use crate::inspector::ChangeTarget;
use crate::node::NodeId;
use crate::schema::SchemaSection;
use crate::types::Fields;
use crate::value::{Payload, Value};

impl Graph {
    /// Attach an incoming edge to its target and pull the source's current value.
    ///
    /// The pull calls the source's raw `process`, bypassing its output
    /// cache, and is delivered with `force` set.
    pub(crate) fn connect_input(&mut self, connection: &Connection) {
        if let Some(target) = self.nodes.get_mut(&connection.to) {
            target.node.begin_input(connection);
        }

        let pulled = match self.nodes.get_mut(&connection.from) {
            Some(source) => match source.node.process(&[connection.from_port.clone()]) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(node = %connection.from, "initial pull failed: {}", e);
                    Payload::new()
                }
            },
            None => Payload::new(),
        };
        let packet = self
            .edges
            .get(&connection.id)
            .map(|edge| edge.out_data_for(&pulled))
            .unwrap_or_default();
        if packet.is_empty() {
            tracing::debug!(edge = %connection.id, "source has no value for '{}' yet", connection.from_port);
        } else {
            self.deliver(connection, &packet, true);
        }

        if let Some(target) = self.nodes.get_mut(&connection.to) {
            target.node.finish_input(connection);
        }
    }

    /// Re-evaluate some outputs of a node and forward what changed.
    ///
    /// Listeners registered on the node run on every call, whether or not
    /// any output changed.
    pub fn notify_outputs<I, S>(&mut self, node_id: &NodeId, keys: I, force: bool) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if self.propagate(node_id, &keys, force) {
            Ok(())
        } else {
            Err(GraphError::NodeNotFound(node_id.clone()))
        }
    }

    /// Re-evaluate every declared output of a node
    pub fn notify_all_outputs(&mut self, node_id: &NodeId, force: bool) -> Result<(), GraphError> {
        let keys = self
            .node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?
            .core()
            .out_keys();
        self.notify_outputs(node_id, keys, force)
    }

    /// Directly edit a node's props (the `manual` path), then re-evaluate its outputs
    pub fn set_props(&mut self, node_id: &NodeId, patch: &Payload) -> Result<(), GraphError> {
        let node = self
            .node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        check_keys(node_id, &node.core().class().schema().input, patch, SchemaSection::Input)?;
        node.receive_manual(patch);
        let keys = node.core().out_keys();
        self.propagate(node_id, &keys, false);
        Ok(())
    }

    /// Merge a patch into a node's state, then re-evaluate its outputs
    pub fn set_state(&mut self, node_id: &NodeId, patch: &Payload) -> Result<(), GraphError> {
        let node = self
            .node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        check_keys(node_id, &node.core().class().schema().state, patch, SchemaSection::State)?;
        node.core_mut().set_state(patch);
        let keys = node.core().out_keys();
        self.propagate(node_id, &keys, false);
        Ok(())
    }

    /// Apply an edit coming from an attribute inspector.
    ///
    /// The raw value is parsed by the field's type before it is applied.
    pub fn apply_change(&mut self, node_id: &NodeId, target: &ChangeTarget, raw: &Value) -> Result<(), GraphError> {
        let node = self
            .node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        let schema = node.core().class().schema();
        let (section, key) = match target {
            ChangeTarget::Prop(key) => (SchemaSection::Input, key),
            ChangeTarget::State(key) => (SchemaSection::State, key),
            ChangeTarget::Output(key) => return Err(GraphError::ReadOnly(key.clone())),
        };
        let ty = schema.section(section).get(key).ok_or_else(|| GraphError::PortNotFound {
            node: node_id.clone(),
            port: key.clone(),
            direction: section.label(),
        })?;
        let value = ty.parse(raw)?;
        let mut patch = Payload::new();
        patch.insert(key.clone(), value);
        match section {
            SchemaSection::Input => self.set_props(node_id, &patch),
            _ => self.set_state(node_id, &patch),
        }
    }

    /// `notify_outputs` body; returns false if the node is unknown
    fn propagate(&mut self, node_id: &NodeId, keys: &[String], force: bool) -> bool {
        let Some(entry) = self.nodes.get_mut(node_id) else {
            return false;
        };
        let changes = match entry.node.process_outputs(keys, force) {
            Ok(changes) => changes,
            Err(e) => {
                tracing::error!(node = %node_id, "node failed to process: {}", e);
                Payload::new()
            }
        };
        entry.node.notify_listeners();

        let targets: Vec<Connection> = entry
            .node
            .core()
            .outputs()
            .iter()
            .filter(|c| changes.contains_key(&c.from_port))
            .cloned()
            .collect();
        for connection in targets {
            let Some(edge) = self.edges.get(&connection.id) else {
                continue;
            };
            let packet = edge.out_data_for(&changes);
            self.deliver(&connection, &packet, force);
            if let Some(edge) = self.edges.get_mut(&connection.id) {
                edge.notify();
            }
        }
        true
    }

    /// Hand a packet to the target of `connection` and continue from there
    fn deliver(&mut self, connection: &Connection, packet: &Payload, force: bool) {
        let Some(target) = self.nodes.get_mut(&connection.to) else {
            tracing::warn!(edge = %connection.id, "edge target {} is gone", connection.to);
            return;
        };
        let keys = target.node.receive(connection, packet);
        self.propagate(&connection.to, &keys, force);
    }
}

fn check_keys(node_id: &NodeId, declared: &Fields, patch: &Payload, section: SchemaSection) -> Result<(), GraphError> {
    match patch.keys().find(|key| !declared.contains_key(*key)) {
        Some(key) => Err(GraphError::PortNotFound {
            node: node_id.clone(),
            port: key.clone(),
            direction: section.label(),
        }),
        None => Ok(()),
    }
}
