use serde::{Deserialize, Serialize};

use crate::value::*;

/// Legacy reusable signal layout (`SGTYPE_`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SignalType {
    pub name: String,
    pub size: u32,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    pub factor: f64,
    pub offset: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub unit: String,
    pub default_value: f64,
    /// Name of a [`ValueTable`](crate::ValueTable); may be empty.
    pub value_table: String,
}
