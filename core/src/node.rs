use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;

/// A CAN node (ECU) declared in `BU_`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Node {
    /// Name of this node.
    pub name: String,

    pub comment: String,

    pub attribute_values: BTreeMap<String, Attribute>,
}

impl Node {
    /// Get a new `Self`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
