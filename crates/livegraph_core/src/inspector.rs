// SPDX-License-Identifier: MIT OR Apache-2.0
//! Attribute inspector model.
//!
//! A node describes its editable surface as [`ChangeableGroup`]s built from
//! its schema. Input and state fields are editable; outputs are shown
//! read-only. Edits are routed back through [`Graph::apply_change`].

use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::{ListenerId, NodeCore, NodeId};
use crate::schema::SchemaSection;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// What an edit applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeTarget {
    /// A prop (input port value)
    Prop(String),
    /// A state field
    State(String),
    /// An output value (never editable)
    Output(String),
}

impl ChangeTarget {
    /// The attribute key
    pub fn key(&self) -> &str {
        match self {
            Self::Prop(key) | Self::State(key) | Self::Output(key) => key,
        }
    }

    /// Schema section the key lives in
    pub fn section(&self) -> SchemaSection {
        match self {
            Self::Prop(_) => SchemaSection::Input,
            Self::State(_) => SchemaSection::State,
            Self::Output(_) => SchemaSection::Output,
        }
    }
}

/// One row in the inspector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changeable {
    /// Row label
    pub title: String,
    /// Registered type name
    pub type_name: String,
    /// Current value, `Null` when unset
    pub value: Value,
    /// Where edits go
    pub target: ChangeTarget,
    /// Whether edits are accepted
    pub read_only: bool,
    /// Whether the type is structured (rendered as a nested editor)
    pub complex: bool,
    /// Attribute specific help, shown only when it differs from the type docs
    pub help: Option<String>,
}

/// Rows of one schema section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeableGroup {
    /// Section title ("Inputs", "State", "Outputs")
    pub title: String,
    /// Section
    pub section: SchemaSection,
    /// Rows in schema order
    pub items: Vec<Changeable>,
}

impl NodeCore {
    /// Inspector rows for every schema section that has fields
    pub fn changeables(&self) -> Vec<ChangeableGroup> {
        let schema = self.class().schema();
        [
            ("Inputs", SchemaSection::Input),
            ("State", SchemaSection::State),
            ("Outputs", SchemaSection::Output),
        ]
        .into_iter()
        .filter(|(_, section)| !schema.section(*section).is_empty())
        .map(|(title, section)| ChangeableGroup {
            title: title.to_string(),
            section,
            items: schema
                .section(section)
                .iter()
                .map(|(key, ty)| {
                    let (target, value) = match section {
                        SchemaSection::Input => (ChangeTarget::Prop(key.clone()), self.props().get(key)),
                        SchemaSection::State => (ChangeTarget::State(key.clone()), self.state().get(key)),
                        SchemaSection::Output => {
                            (ChangeTarget::Output(key.clone()), self.output_cache().get(key))
                        }
                    };
                    Changeable {
                        title: key.clone(),
                        type_name: ty.name().to_string(),
                        value: value.cloned().unwrap_or(Value::Null),
                        target,
                        read_only: section == SchemaSection::Output,
                        complex: ty.is_complex(),
                        help: ty
                            .has_extra_help()
                            .then(|| ty.description().map(str::to_string))
                            .flatten(),
                    }
                })
                .collect(),
        })
        .collect()
    }
}

#[derive(Debug, Default)]
struct PaneView {
    groups: Vec<ChangeableGroup>,
    refreshes: u64,
}

/// Inspector pane bound to at most one node at a time
#[derive(Debug, Default)]
pub struct AttributePane {
    subject: Option<(NodeId, ListenerId)>,
    view: Rc<RefCell<PaneView>>,
}

impl AttributePane {
    /// Create an unbound pane
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a node, releasing the previous one
    pub fn inspect(&mut self, graph: &mut Graph, node_id: &NodeId) -> Result<(), GraphError> {
        self.release(graph);
        let node = graph
            .node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;

        {
            let mut view = self.view.borrow_mut();
            view.groups = node.core().changeables();
            view.refreshes = 0;
        }
        let view = Rc::clone(&self.view);
        let token = node.core_mut().register_listener(move |core| {
            let mut view = view.borrow_mut();
            view.groups = core.changeables();
            view.refreshes += 1;
        });
        self.subject = Some((node_id.clone(), token));
        Ok(())
    }

    /// Unsubscribe from the current node, if any
    pub fn release(&mut self, graph: &mut Graph) {
        if let Some((node_id, token)) = self.subject.take() {
            if let Some(node) = graph.node_mut(&node_id) {
                node.core_mut().remove_listener(token);
            }
            self.view.borrow_mut().groups.clear();
        }
    }

    /// Node currently shown
    pub fn subject(&self) -> Option<&NodeId> {
        self.subject.as_ref().map(|(id, _)| id)
    }

    /// Current rows
    pub fn groups(&self) -> Vec<ChangeableGroup> {
        self.view.borrow().groups.clone()
    }

    /// How many times the node has notified the pane since binding
    pub fn refresh_count(&self) -> u64 {
        self.view.borrow().refreshes
    }

    /// Apply an edit to the bound node
    pub fn edit(&self, graph: &mut Graph, target: &ChangeTarget, raw: &Value) -> Result<(), GraphError> {
        let (node_id, _) = self
            .subject
            .as_ref()
            .ok_or(GraphError::NotInspecting)?;
        graph.apply_change(node_id, target, raw)
    }
}
