//! Attribute data owned by the attribute collaborator.
//!
//! The core never persists these itself; it reads them to build views and
//! copies them when instantiating templates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of an attribute type.
pub type TypeId = String;

/// Free-form attribute values keyed by attribute name.
pub type AttrMap = Map<String, Value>;

/// Type id of the holder type every deployment is expected to register.
///
/// Template roots created at startup use this type.
pub const DEFAULT_TYPE_ID: &str = "default";

/// Attribute record attached to one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub type_id: TypeId,
    #[serde(default)]
    pub attrs: AttrMap,
}

impl NodeAttributes {
    /// Creates an attribute record with no values.
    pub fn new(type_id: impl Into<TypeId>) -> Self {
        Self {
            type_id: type_id.into(),
            attrs: AttrMap::new(),
        }
    }

    /// Adds one attribute value.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

/// Attribute type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeType {
    pub id: TypeId,
    /// Whether nodes of this type may have children.
    pub holder: bool,
}
