use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named, shareable raw value to label table (`VAL_TABLE_`).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueTable {
    pub name: String,

    pub value_descriptions: BTreeMap<i64, String>,
}
