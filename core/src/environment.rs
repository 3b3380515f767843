use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;

/// Flag in the `DUMMY_NODE_VECTOR` access code marking a string variable.
pub(crate) const STRING_ACCESS_FLAG: u32 = 0x8000;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EnvironmentVariableType {
    #[default]
    Integer,
    Float,
    String,
    /// Opaque bytes, sized by `ENVVAR_DATA_`.
    Data,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AccessType {
    #[default]
    Unrestricted,
    Read,
    Write,
    ReadWrite,
}

impl AccessType {
    const fn code(self) -> u32 {
        match self {
            Self::Unrestricted => 0,
            Self::Read => 1,
            Self::Write => 2,
            Self::ReadWrite => 3,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Unrestricted,
            1 => Self::Read,
            2 => Self::Write,
            3 => Self::ReadWrite,
            _ => return None,
        })
    }
}

/// An environment variable (`EV_`).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct EnvironmentVariable {
    pub name: String,
    pub var_type: EnvironmentVariableType,
    pub minimum: f64,
    pub maximum: f64,
    pub unit: String,
    pub initial_value: f64,
    pub id: u32,
    pub access_type: AccessType,
    pub access_nodes: BTreeSet<String>,
    pub value_descriptions: BTreeMap<i64, String>,
    /// Size in bytes of a [`Data`](EnvironmentVariableType::Data) variable.
    pub data_size: u32,
    pub comment: String,
    pub attribute_values: BTreeMap<String, Attribute>,
}

impl EnvironmentVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Access code written after `DUMMY_NODE_VECTOR`.
    pub(crate) fn access_code(&self) -> u32 {
        let flag = match self.var_type {
            EnvironmentVariableType::String => STRING_ACCESS_FLAG,
            _ => 0,
        };

        self.access_type.code() | flag
    }

    /// Numeric type written in the `EV_` record. Strings are marked through
    /// the access code and data variables through `ENVVAR_DATA_`, so a string
    /// read with type `2` is written back as `0`.
    pub(crate) const fn type_code(&self) -> u32 {
        match self.var_type {
            EnvironmentVariableType::Float => 1,
            _ => 0,
        }
    }

    /// Apply the `EV_` type code and access code.
    pub(crate) fn set_dbc_types(&mut self, type_code: u32, access_code: u32) -> Option<()> {
        self.access_type = AccessType::from_code(access_code & !STRING_ACCESS_FLAG)?;
        self.var_type = match (type_code, access_code & STRING_ACCESS_FLAG != 0) {
            (_, true) | (2, _) => EnvironmentVariableType::String,
            (0, false) => EnvironmentVariableType::Integer,
            (1, false) => EnvironmentVariableType::Float,
            _ => return None,
        };

        Some(())
    }
}
