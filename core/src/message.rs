use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::attribute::*;
use crate::error::*;
use crate::signal::*;
use crate::value::Multiplexor;

/// Set in a message id to mark an extended (29 bit) frame.
pub const EXTENDED_FRAME_FLAG: u32 = 0x8000_0000;

/// A named set of signals within one message (`SIG_GROUP_`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SignalGroup {
    pub name: String,
    pub repetitions: u32,
    pub signals: BTreeSet<String>,
}

/// A CAN message and the signals laid out in its payload.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Builder)]
#[builder(build_fn(name = "__build", error = "CANConstructionError", private))]
#[builder(pattern = "owned")]
pub struct Message {
    /// Message ID, including [`EXTENDED_FRAME_FLAG`] for extended frames.
    pub id: u32,

    /// Message name.
    #[builder(setter(into))]
    pub name: String,

    /// Payload length in bytes.
    pub size: u32,

    /// Sole transmitting node; empty when there is none or several.
    #[builder(setter(into), default)]
    pub transmitter: String,

    /// Signals by name.
    #[builder(setter(custom), field(type = "BTreeMap<String, Signal>"))]
    pub signals: BTreeMap<String, Signal>,

    /// All transmitting nodes, from `BO_TX_BU_`.
    #[builder(setter(custom), field(type = "BTreeSet<String>"))]
    pub transmitters: BTreeSet<String>,

    #[builder(setter(custom), field(type = "BTreeMap<String, SignalGroup>"))]
    pub signal_groups: BTreeMap<String, SignalGroup>,

    #[builder(setter(into), default)]
    pub comment: String,

    #[builder(setter(custom), field(type = "BTreeMap<String, Attribute>"))]
    pub attribute_values: BTreeMap<String, Attribute>,
}

impl MessageBuilder {
    /// Make a [`Message`] from this builder.
    ///
    /// Notes:
    ///     - Message names must be at least one character long and must contain
    ///       only ASCII letters, numbers, and underscores.
    ///     - Every signal must fit in the message payload.
    pub fn build(self) -> Result<Message, CANConstructionError> {
        let msg = self.__build()?;

        Self::check_name_validity(&msg.name)?;

        for sig in msg.signals.values() {
            sig.check_layout(msg.size)?;
        }

        Ok(msg)
    }

    /// Add a single signal. Signal names must be unique within a message.
    pub fn add_signal(mut self, sig: Signal) -> Result<Self, CANConstructionError> {
        if self.signals.contains_key(&sig.name) {
            return Err(CANConstructionError::SignalNameAlreadyExists(sig.name));
        }

        self.signals.insert(sig.name.clone(), sig);

        Ok(self)
    }

    /// Add multiple signals.
    ///
    /// Convenience wrapper for [`add_signal()`][Self::add_signal].
    pub fn add_signals(
        mut self,
        sigs: impl IntoIterator<Item = Signal>,
    ) -> Result<Self, CANConstructionError> {
        for sig in sigs {
            self = self.add_signal(sig)?;
        }

        Ok(self)
    }

    /// Add a transmitting node.
    pub fn tx_node(mut self, name: &str) -> Self {
        self.transmitters.insert(name.into());

        self
    }

    pub fn signal_group(mut self, group: SignalGroup) -> Self {
        self.signal_groups.insert(group.name.clone(), group);

        self
    }

    pub fn attribute_value(mut self, attr: Attribute) -> Self {
        self.attribute_values.insert(attr.name.clone(), attr);

        self
    }

    /// Check validity of message name - it should not be empty and should
    /// contain a limited set of characters - `[a-zA-Z0-9_]`.
    fn check_name_validity(name: &str) -> Result<(), CANConstructionError> {
        if name.is_empty() {
            return Err(CANConstructionError::MessageNameEmpty);
        }

        if let Some(c) = name
            .chars()
            .find(|c| (!c.is_ascii_alphanumeric()) && c != &'_')
        {
            return Err(CANConstructionError::MessageNameInvalidChar(name.into(), c));
        }

        Ok(())
    }
}

impl Message {
    /// Get a [builder](MessageBuilder).
    ///
    /// Call [.build()](MessageBuilder::build) to build into a [`Message`].
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Get a signal from this message by name.
    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.get(name)
    }

    pub fn signal_mut(&mut self, name: &str) -> Option<&mut Signal> {
        self.signals.get_mut(name)
    }

    /// Insert or replace a signal, returning the one it replaced.
    ///
    /// The signal must be a normal signal that fits in this message.
    pub fn insert_signal(&mut self, sig: Signal) -> Result<Option<Signal>, CANConstructionError> {
        sig.check_layout(self.size)?;

        Ok(self.signals.insert(sig.name.clone(), sig))
    }

    /// Remove a signal. Signal groups and attribute relations naming it are
    /// left alone; [`Network::validate`](crate::Network::validate) reports them.
    pub fn remove_signal(&mut self, name: &str) -> Option<Signal> {
        self.signals.remove(name)
    }

    /// Is this an extended (29 bit) frame?
    pub const fn is_extended(&self) -> bool {
        self.id & EXTENDED_FRAME_FLAG != 0
    }

    /// Identifier as sent on the bus, without the extended frame flag.
    pub const fn raw_id(&self) -> u32 {
        self.id & !EXTENDED_FRAME_FLAG
    }

    /// The multiplexor switch signal of this message, if any. A plain `M`
    /// switch wins over one that is itself multiplexed (`m<n>M`).
    pub fn multiplexor_switch(&self) -> Option<&Signal> {
        self.signals
            .values()
            .find(|s| s.multiplexor == Multiplexor::Switch)
            .or_else(|| self.signals.values().find(|s| s.multiplexor.is_switch()))
    }

    /// Get the sole transmitting node.
    pub fn tx_node(&self) -> Option<&str> {
        (!self.transmitter.is_empty()).then_some(self.transmitter.as_str())
    }

    /// Is `node` one of this message's transmitters?
    pub fn is_transmitted_by(&self, node: &str) -> bool {
        self.transmitter == node || self.transmitters.contains(node)
    }
}

// Easy indexing of msg["signal"]. Panics if signal absent.
// (no, this can't be an Option, the Index trait doesn't allow it)
impl Index<&str> for Message {
    type Output = Signal;

    fn index(&self, index: &str) -> &Self::Output {
        self.signal(index)
            .unwrap_or_else(|| panic!("No signal `{index}` in message `{}`", self.name))
    }
}
