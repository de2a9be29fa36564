// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node classes: the shared, per-type description of a node.

use crate::node::NodeBehavior;
use crate::types::{AttributeType, Fields};
use crate::value::{Payload, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Sources (constants, parameters, devices)
    Input,
    /// Sinks (renderers, probes)
    Output,
    /// Math operations
    Math,
    /// Logic/flow control
    Logic,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    #[default]
    Custom,
}

/// Which part of a schema a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaSection {
    /// Input port
    Input,
    /// Output port
    Output,
    /// Internal state field
    State,
}

impl SchemaSection {
    /// Lowercase label used in messages
    pub fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::State => "state",
        }
    }
}

/// The input, output and state type mappings of a node class
#[derive(Debug, Clone, Default)]
pub struct NodeSchema {
    /// Input ports
    pub input: Fields,
    /// Output ports
    pub output: Fields,
    /// Internal, persisted state
    pub state: Fields,
}

impl NodeSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input port
    pub fn input(mut self, key: impl Into<String>, ty: Arc<AttributeType>) -> Self {
        self.input.insert(key.into(), ty);
        self
    }

    /// Add an output port
    pub fn output(mut self, key: impl Into<String>, ty: Arc<AttributeType>) -> Self {
        self.output.insert(key.into(), ty);
        self
    }

    /// Add a state field
    pub fn state(mut self, key: impl Into<String>, ty: Arc<AttributeType>) -> Self {
        self.state.insert(key.into(), ty);
        self
    }

    /// The mapping for one section
    pub fn section(&self, section: SchemaSection) -> &Fields {
        match section {
            SchemaSection::Input => &self.input,
            SchemaSection::Output => &self.output,
            SchemaSection::State => &self.state,
        }
    }

    /// Every field, tagged with its section
    pub fn fields(&self) -> impl Iterator<Item = (SchemaSection, &String, &Arc<AttributeType>)> {
        fn tag(
            section: SchemaSection,
            fields: &Fields,
        ) -> impl Iterator<Item = (SchemaSection, &String, &Arc<AttributeType>)> {
            fields.iter().map(move |(key, ty)| (section, key, ty))
        }
        tag(SchemaSection::Input, &self.input)
            .chain(tag(SchemaSection::Output, &self.output))
            .chain(tag(SchemaSection::State, &self.state))
    }
}

/// Constructs a fresh behavior for a new node instance
pub type BehaviorFactory = Arc<dyn Fn() -> Box<dyn NodeBehavior> + Send + Sync>;

/// Class-level description shared by every node of one type
#[derive(Clone)]
pub struct NodeClass {
    registry_name: String,
    display_name: String,
    description: String,
    category: NodeCategory,
    schema: NodeSchema,
    default_props: Payload,
    default_state: Payload,
    factory: BehaviorFactory,
}

impl NodeClass {
    /// Create a class; the display name starts out equal to the registry name
    pub fn new<F>(registry_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn NodeBehavior> + Send + Sync + 'static,
    {
        let registry_name = registry_name.into();
        Self {
            display_name: registry_name.clone(),
            registry_name,
            description: String::new(),
            category: NodeCategory::default(),
            schema: NodeSchema::default(),
            default_props: Payload::new(),
            default_state: Payload::new(),
            factory: Arc::new(factory),
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: NodeCategory) -> Self {
        self.category = category;
        self
    }

    /// Set the schema
    pub fn with_schema(mut self, schema: NodeSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Add a default prop value
    pub fn with_default_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.default_props.insert(key.into(), value);
        self
    }

    /// Add a default state value, overriding the schema default
    pub fn with_default_state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.default_state.insert(key.into(), value);
        self
    }

    /// Stable serialization key
    pub fn registry_name(&self) -> &str {
        &self.registry_name
    }

    /// Name shown to users
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Category
    pub fn category(&self) -> NodeCategory {
        self.category
    }

    /// Schema
    pub fn schema(&self) -> &NodeSchema {
        &self.schema
    }

    /// Default props
    pub fn default_props(&self) -> &Payload {
        &self.default_props
    }

    /// Default state overrides
    pub fn default_state(&self) -> &Payload {
        &self.default_state
    }

    /// Build a fresh behavior instance
    pub fn instantiate(&self) -> Box<dyn NodeBehavior> {
        (self.factory)()
    }
}

impl fmt::Debug for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeClass")
            .field("registry_name", &self.registry_name)
            .field("display_name", &self.display_name)
            .field("category", &self.category)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
