use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::attribute::*;
use crate::environment::*;
use crate::error::*;
use crate::message::*;
use crate::node::*;
use crate::signal::*;
use crate::signal_type::*;
use crate::value_table::*;

/// Bus configuration (`BS_`). All zero when the record is empty.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitTiming {
    pub baudrate: u32,
    pub btr1: u32,
    pub btr2: u32,
}

impl BitTiming {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The entities an [`AttributeRelation`] points at.
#[derive(Clone, Copy, Debug)]
pub enum RelationTarget<'n> {
    NodeEnvironmentVariable(&'n Node, &'n EnvironmentVariable),
    NodeTxMessage(&'n Node, &'n Message),
    NodeMappedRxSignal(&'n Node, &'n Message, &'n Signal),
}

/// A CAN network database.
///
/// Every mapping is public and keyed by the record's natural key (id for
/// messages, name otherwise), so inserting, replacing and removing records is
/// plain map access. Nothing cascades: removing a node leaves relations that
/// name it in place, and [`validate()`](Self::validate) reports them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Network {
    /// Did the last parse into this network complete without warnings?
    pub successfully_parsed: bool,

    pub version: String,

    /// Keywords declared in `NS_`, in declaration order.
    pub new_symbols: Vec<String>,

    pub bit_timing: BitTiming,

    pub nodes: BTreeMap<String, Node>,

    pub value_tables: BTreeMap<String, ValueTable>,

    pub messages: BTreeMap<u32, Message>,

    pub environment_variables: BTreeMap<String, EnvironmentVariable>,

    pub signal_types: BTreeMap<String, SignalType>,

    pub comment: String,

    /// Plain and relation attribute definitions.
    pub attribute_definitions: BTreeMap<String, AttributeDefinition>,

    /// Plain and relation attribute defaults.
    pub attribute_defaults: BTreeMap<String, Attribute>,

    /// Network-level attribute values.
    pub attribute_values: BTreeMap<String, Attribute>,

    pub attribute_relation_values: BTreeSet<AttributeRelation>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// Create a new (empty) network.
    pub fn new() -> Self {
        Self {
            successfully_parsed: false,
            version: String::new(),
            new_symbols: Vec::new(),
            bit_timing: BitTiming::default(),
            nodes: BTreeMap::new(),
            value_tables: BTreeMap::new(),
            messages: BTreeMap::new(),
            environment_variables: BTreeMap::new(),
            signal_types: BTreeMap::new(),
            comment: String::new(),
            attribute_definitions: BTreeMap::new(),
            attribute_defaults: BTreeMap::new(),
            attribute_values: BTreeMap::new(),
            attribute_relation_values: BTreeSet::new(),
        }
    }

    /// Get message in this network by ID.
    pub fn message(&self, id: u32) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub fn message_mut(&mut self, id: u32) -> Option<&mut Message> {
        self.messages.get_mut(&id)
    }

    /// Get message in this network by name. Names are not keys, so the
    /// message with the lowest id wins.
    pub fn message_by_name(&self, name: &str) -> Option<&Message> {
        self.messages.values().find(|m| m.name == name)
    }

    /// Insert a message, replacing any message with the same ID.
    ///
    /// Notes:
    ///     - Every signal must fit in the message.
    pub fn insert_message(&mut self, msg: Message) -> Result<Option<Message>, CANConstructionError> {
        for sig in msg.signals.values() {
            sig.check_layout(msg.size)?;
        }

        Ok(self.messages.insert(msg.id, msg))
    }

    /// Insert a new message.
    ///
    /// Notes:
    ///     - Checks for message ID uniqueness.
    ///     - Every signal must fit in the message.
    pub fn add_message(&mut self, msg: Message) -> Result<(), CANConstructionError> {
        if self.messages.contains_key(&msg.id) {
            return Err(CANConstructionError::MessageIdAlreadyExists(msg.id));
        }

        self.insert_message(msg).map(|_| ())
    }

    pub fn remove_message(&mut self, id: u32) -> Option<Message> {
        self.messages.remove(&id)
    }

    /// Get a signal by message ID and signal name.
    pub fn signal(&self, message: u32, name: &str) -> Option<&Signal> {
        self.message(message)?.signal(name)
    }

    pub fn signal_mut(&mut self, message: u32, name: &str) -> Option<&mut Signal> {
        self.message_mut(message)?.signal_mut(name)
    }

    /// Add a new node to the network.
    ///
    /// Notes:
    ///     - Checks for node name uniqueness.
    pub fn add_node(&mut self, name: &str) -> Result<(), CANConstructionError> {
        if self.nodes.contains_key(name) {
            return Err(CANConstructionError::NodeAlreadyExists(name.into()));
        }

        self.nodes.insert(name.into(), Node::new(name));
        Ok(())
    }

    /// Get a node in this network by name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn environment_variable(&self, name: &str) -> Option<&EnvironmentVariable> {
        self.environment_variables.get(name)
    }

    pub fn attribute_definition(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attribute_definitions.get(name)
    }

    /// Insert or replace a relation attribute value.
    pub fn insert_attribute_relation(&mut self, rel: AttributeRelation) -> Option<AttributeRelation> {
        self.attribute_relation_values.replace(rel)
    }

    /// Iterate over messages in this network, by ID.
    pub fn iter_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    /// Iterate over nodes in this network, by name.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get messages transmitted by given node. Returns `None` if node does not exist.
    pub fn tx_messages_by_node(&self, name: &str) -> Option<Vec<&Message>> {
        self.node(name)?;

        Some(
            self.iter_messages()
                .filter(|m| m.is_transmitted_by(name))
                .collect(),
        )
    }

    /// Get `(message, signal)` pairs received by given node. Returns `None` if
    /// node does not exist.
    pub fn rx_signals_by_node(&self, name: &str) -> Option<Vec<(&Message, &Signal)>> {
        self.node(name)?;

        Some(
            self.iter_messages()
                .flat_map(|m| m.signals.values().map(move |s| (m, s)))
                .filter(|(_, s)| s.receivers.contains(name))
                .collect(),
        )
    }

    /// Look up the entities a relation attribute points at.
    pub fn resolve_relation<'n>(
        &'n self,
        rel: &AttributeRelation,
    ) -> Result<RelationTarget<'n>, ModelViolation> {
        let node = self
            .node(rel.key.node())
            .ok_or_else(|| ModelViolation::DanglingNode {
                attribute: rel.name.clone(),
                node: rel.key.node().into(),
            })?;

        let message = move |id: u32| {
            self.message(id).ok_or_else(|| ModelViolation::DanglingMessage {
                attribute: rel.name.clone(),
                message: id,
            })
        };

        match &rel.key {
            RelationKey::NodeEnvironmentVariable { env_var, .. } => {
                let ev = self.environment_variable(env_var).ok_or_else(|| {
                    ModelViolation::DanglingEnvironmentVariable {
                        attribute: rel.name.clone(),
                        env_var: env_var.clone(),
                    }
                })?;

                Ok(RelationTarget::NodeEnvironmentVariable(node, ev))
            }
            RelationKey::NodeTxMessage { message: id, .. } => {
                Ok(RelationTarget::NodeTxMessage(node, message(*id)?))
            }
            RelationKey::NodeMappedRxSignal {
                message: id,
                signal,
                ..
            } => {
                let msg = message(*id)?;
                let sig = msg
                    .signal(signal)
                    .ok_or_else(|| ModelViolation::DanglingSignal {
                        attribute: rel.name.clone(),
                        message: *id,
                        signal: signal.clone(),
                    })?;

                Ok(RelationTarget::NodeMappedRxSignal(node, msg, sig))
            }
        }
    }

    /// Check keys, signal layouts and cross references. Nothing is repaired.
    pub fn validate(&self) -> Vec<ModelViolation> {
        let mut violations = Vec::new();

        for (&key, msg) in &self.messages {
            if key != msg.id {
                violations.push(ModelViolation::MessageKeyMismatch { key, id: msg.id });
            }

            for (name, sig) in &msg.signals {
                if name != &sig.name {
                    violations.push(ModelViolation::SignalKeyMismatch {
                        message: key,
                        key: name.clone(),
                        name: sig.name.clone(),
                    });
                }

                if let Err(e) = sig.check_layout(msg.size) {
                    violations.push(ModelViolation::InvalidSignalLayout {
                        message: key,
                        signal: sig.name.clone(),
                        reason: e.to_string(),
                    });
                }

                for switch in sig.extended_multiplexors.keys() {
                    if !msg.signals.contains_key(switch) {
                        violations.push(ModelViolation::DanglingMultiplexorSwitch {
                            message: key,
                            signal: sig.name.clone(),
                            switch: switch.clone(),
                        });
                    }
                }
            }

            for group in msg.signal_groups.values() {
                for member in &group.signals {
                    if !msg.signals.contains_key(member) {
                        violations.push(ModelViolation::DanglingSignalGroupMember {
                            message: key,
                            group: group.name.clone(),
                            signal: member.clone(),
                        });
                    }
                }
            }
        }

        violations.extend(
            self.attribute_relation_values
                .iter()
                .filter_map(|rel| self.resolve_relation(rel).err()),
        );

        violations
    }
}
