use std::fmt::Display;

use derive_builder::UninitializedFieldError;
use thiserror::Error;

fn maybe_space_name<T: Display>(opt: &Option<T>) -> String {
    match opt {
        Some(s) => format!(" `{s}`"),
        None => "".into(),
    }
}

#[derive(Debug, Error)]
pub enum CANConstructionError {
    #[error("Signal with name `{0}` already exists in this message.")]
    SignalNameAlreadyExists(String),

    /// Signals cannot have zero width.
    #[error("Signal with name `{0}` cannot have zero width")]
    SignalHasZeroWidth(String),

    #[error("Signal `{0}` is {1} bits wide; at most 64 bits are supported")]
    SignalTooWide(String, u32),

    #[error("Signal `{0}` does not fit in message and would address bit {1}; message is {2} bytes")]
    SignalWillNotFitInMessage(String, u32, u32),

    #[error("Value `{1}` already described as `{0}` for signal{}", maybe_space_name(.2))]
    ValueAlreadyDescribed(String, i64, Option<String>),

    #[error("Message with id 0x{0:x} already exists in network.")]
    MessageIdAlreadyExists(u32),

    #[error("Message with id 0x{0:x} does not exist in network.")]
    MessageDoesNotExist(u32),

    #[error("Message name `{0}` includes invalid character `{1}`.")]
    MessageNameInvalidChar(String, char),

    #[error("Message name is empty.")]
    MessageNameEmpty,

    #[error("Node with name `{0}` already exists in network.")]
    NodeAlreadyExists(String),

    #[error("Missing required field `{0}`")]
    UninitializedFieldError(String),
}

// For getting CANConstructionError from builder .build() methods
impl From<UninitializedFieldError> for CANConstructionError {
    fn from(uf: UninitializedFieldError) -> Self {
        Self::UninitializedFieldError(uf.field_name().into())
    }
}

/// Fatal errors while reading DBC text. Anything recoverable is reported as a
/// [`ParseWarning`](crate::translation::ParseWarning) instead.
#[derive(Debug, Error)]
pub enum DbcError {
    #[error("Failed to read DBC input")]
    Io(#[from] std::io::Error),
}

/// A broken reference or layout invariant found by
/// [`Network::validate()`](crate::Network::validate).
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ModelViolation {
    #[error("Message stored under id 0x{key:x} claims id 0x{id:x}")]
    MessageKeyMismatch { key: u32, id: u32 },

    #[error("Signal stored as `{key}` in message 0x{message:x} is named `{name}`")]
    SignalKeyMismatch {
        message: u32,
        key: String,
        name: String,
    },

    #[error("Signal `{signal}` of message 0x{message:x} has an invalid layout: {reason}")]
    InvalidSignalLayout {
        message: u32,
        signal: String,
        reason: String,
    },

    #[error("Attribute `{attribute}` references unknown node `{node}`")]
    DanglingNode { attribute: String, node: String },

    #[error("Attribute `{attribute}` references unknown message 0x{message:x}")]
    DanglingMessage { attribute: String, message: u32 },

    #[error("Attribute `{attribute}` references unknown signal `{signal}` in message 0x{message:x}")]
    DanglingSignal {
        attribute: String,
        message: u32,
        signal: String,
    },

    #[error("Attribute `{attribute}` references unknown environment variable `{env_var}`")]
    DanglingEnvironmentVariable { attribute: String, env_var: String },

    #[error("Signal group `{group}` of message 0x{message:x} lists unknown signal `{signal}`")]
    DanglingSignalGroupMember {
        message: u32,
        group: String,
        signal: String,
    },

    #[error("Signal `{signal}` of message 0x{message:x} is multiplexed by unknown switch `{switch}`")]
    DanglingMultiplexorSwitch {
        message: u32,
        signal: String,
        switch: String,
    },
}
