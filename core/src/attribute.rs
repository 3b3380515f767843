//! Generic attributes, attachable to the network, its entities, or to a
//! relation between two entities.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// What kind of object an [`AttributeDefinition`] applies to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeObjectType {
    Network,
    Node,
    Message,
    Signal,
    EnvironmentVariable,
    /// Node ↔ environment variable relation (`BU_EV_REL_`).
    NodeEnvironmentVariable,
    /// Node transmits message relation (`BU_BO_REL_`).
    NodeTxMessage,
    /// Node receives mapped signal relation (`BU_SG_REL_`).
    NodeMappedRxSignal,
}

impl AttributeObjectType {
    pub(crate) fn from_dbc(token: &str) -> Option<Self> {
        Some(match token {
            "BU_" => Self::Node,
            "BO_" => Self::Message,
            "SG_" => Self::Signal,
            "EV_" => Self::EnvironmentVariable,
            "BU_EV_REL_" => Self::NodeEnvironmentVariable,
            "BU_BO_REL_" => Self::NodeTxMessage,
            "BU_SG_REL_" => Self::NodeMappedRxSignal,
            _ => return None,
        })
    }

    /// Object token; empty for [`Network`](Self::Network).
    pub(crate) const fn dbc_token(self) -> &'static str {
        match self {
            Self::Network => "",
            Self::Node => "BU_",
            Self::Message => "BO_",
            Self::Signal => "SG_",
            Self::EnvironmentVariable => "EV_",
            Self::NodeEnvironmentVariable => "BU_EV_REL_",
            Self::NodeTxMessage => "BU_BO_REL_",
            Self::NodeMappedRxSignal => "BU_SG_REL_",
        }
    }

    /// Relation object types are declared with `BA_DEF_REL_` instead of `BA_DEF_`.
    pub const fn is_relation(self) -> bool {
        matches!(
            self,
            Self::NodeEnvironmentVariable | Self::NodeTxMessage | Self::NodeMappedRxSignal
        )
    }
}

/// Value type of an attribute definition.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum AttributeValueType {
    Integer { minimum: i64, maximum: i64 },
    /// Written in decimal, like [`Integer`](Self::Integer).
    Hex { minimum: i64, maximum: i64 },
    Float { minimum: f64, maximum: f64 },
    String,
    /// Enumerated labels; values refer to them by ordinal.
    Enum(Vec<String>),
}

impl AttributeValueType {
    /// Ordinal of an enumeration label.
    pub fn enum_index(&self, label: &str) -> Option<u32> {
        let Self::Enum(labels) = self else {
            return None;
        };

        labels
            .iter()
            .position(|l| l == label)
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Label of an enumeration ordinal.
    pub fn enum_label(&self, index: u32) -> Option<&str> {
        let Self::Enum(labels) = self else {
            return None;
        };

        labels.get(index as usize).map(String::as_str)
    }

    /// Check that a value has the kind this type declares and lies in its range.
    pub fn accepts(&self, value: &AttributeValue) -> bool {
        match (self, value) {
            (Self::Integer { minimum, maximum }, AttributeValue::Integer(v))
            | (Self::Hex { minimum, maximum }, AttributeValue::Hex(v)) => {
                // a 0..0 range means unbounded
                (*minimum == 0 && *maximum == 0) || (*minimum..=*maximum).contains(v)
            }
            (Self::Float { minimum, maximum }, AttributeValue::Float(v)) => {
                (*minimum == 0.0 && *maximum == 0.0) || (*minimum..=*maximum).contains(v)
            }
            (Self::String, AttributeValue::String(_)) => true,
            (Self::Enum(labels), AttributeValue::Enum(i)) => (*i as usize) < labels.len(),
            _ => false,
        }
    }
}

/// One concrete attribute value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Integer(i64),
    Hex(i64),
    Float(f64),
    String(String),
    /// Ordinal into the definition's enumeration labels.
    Enum(u32),
}

impl AttributeValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_hex(&self) -> Option<i64> {
        match self {
            Self::Hex(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_enum_index(&self) -> Option<u32> {
        match self {
            Self::Enum(i) => Some(*i),
            _ => None,
        }
    }
}

/// Declaration of an attribute (`BA_DEF_` / `BA_DEF_REL_`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AttributeDefinition {
    pub name: String,
    pub object_type: AttributeObjectType,
    pub value_type: AttributeValueType,
}

/// A named attribute value (`BA_` / `BA_DEF_DEF_`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Entities an [`AttributeRelation`] applies to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RelationKey {
    NodeEnvironmentVariable { node: String, env_var: String },
    NodeTxMessage { node: String, message: u32 },
    NodeMappedRxSignal { node: String, message: u32, signal: String },
}

impl RelationKey {
    pub const fn object_type(&self) -> AttributeObjectType {
        match self {
            Self::NodeEnvironmentVariable { .. } => AttributeObjectType::NodeEnvironmentVariable,
            Self::NodeTxMessage { .. } => AttributeObjectType::NodeTxMessage,
            Self::NodeMappedRxSignal { .. } => AttributeObjectType::NodeMappedRxSignal,
        }
    }

    pub fn node(&self) -> &str {
        match self {
            Self::NodeEnvironmentVariable { node, .. }
            | Self::NodeTxMessage { node, .. }
            | Self::NodeMappedRxSignal { node, .. } => node,
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::NodeEnvironmentVariable { .. } => 0,
            Self::NodeTxMessage { .. } => 1,
            Self::NodeMappedRxSignal { .. } => 2,
        }
    }
}

impl Ord for RelationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        use RelationKey::*;

        match (self, other) {
            (
                NodeEnvironmentVariable { node, env_var },
                NodeEnvironmentVariable {
                    node: o_node,
                    env_var: o_env_var,
                },
            ) => (node, env_var).cmp(&(o_node, o_env_var)),
            (
                NodeTxMessage { node, message },
                NodeTxMessage {
                    node: o_node,
                    message: o_message,
                },
            ) => (node, message).cmp(&(o_node, o_message)),
            (
                NodeMappedRxSignal {
                    node,
                    message,
                    signal,
                },
                NodeMappedRxSignal {
                    node: o_node,
                    message: o_message,
                    signal: o_signal,
                },
            ) => (node, message, signal).cmp(&(o_node, o_message, o_signal)),
            // different relation kinds
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for RelationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute value attached to a relation between entities (`BA_REL_`).
///
/// Identity (equality and ordering) is the attribute name followed by the
/// relation key; the value is payload and does not take part.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AttributeRelation {
    pub name: String,
    pub key: RelationKey,
    pub value: AttributeValue,
}

impl AttributeRelation {
    pub fn new(name: impl Into<String>, key: RelationKey, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            key,
            value,
        }
    }
}

impl PartialEq for AttributeRelation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.key == other.key
    }
}

impl Eq for AttributeRelation {}

impl Ord for AttributeRelation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for AttributeRelation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
