//! DBC text into a [`Network`].
//!
//! Parsing is record by record and never gives up on a bad record: anything
//! that cannot be understood becomes a [`ParseWarning`] and is skipped. Only
//! a failing reader aborts the import.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use tracing::{debug, info, warn};

use super::tokens::*;
use super::{DbcTranslator, TranslationToOpencan, NO_NODE};
use crate::*;

/// Record types the parser understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Version,
    NewSymbols,
    BitTiming,
    Nodes,
    ValueTable,
    Message,
    Signal,
    MessageTransmitters,
    EnvironmentVariable,
    EnvironmentVariableData,
    SignalType,
    Comment,
    AttributeDefinition,
    AttributeDefinitionRelation,
    AttributeDefault,
    AttributeDefaultRelation,
    AttributeValue,
    AttributeRelationValue,
    ValueDescription,
    SignalGroup,
    SignalExtendedValueType,
    ExtendedMultiplexor,
}

impl RecordKind {
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Version => "VERSION",
            Self::NewSymbols => "NS_",
            Self::BitTiming => "BS_",
            Self::Nodes => "BU_",
            Self::ValueTable => "VAL_TABLE_",
            Self::Message => "BO_",
            Self::Signal => "SG_",
            Self::MessageTransmitters => "BO_TX_BU_",
            Self::EnvironmentVariable => "EV_",
            Self::EnvironmentVariableData => "ENVVAR_DATA_",
            Self::SignalType => "SGTYPE_",
            Self::Comment => "CM_",
            Self::AttributeDefinition => "BA_DEF_",
            Self::AttributeDefinitionRelation => "BA_DEF_REL_",
            Self::AttributeDefault => "BA_DEF_DEF_",
            Self::AttributeDefaultRelation => "BA_DEF_DEF_REL_",
            Self::AttributeValue => "BA_",
            Self::AttributeRelationValue => "BA_REL_",
            Self::ValueDescription => "VAL_",
            Self::SignalGroup => "SIG_GROUP_",
            Self::SignalExtendedValueType => "SIG_VALTYPE_",
            Self::ExtendedMultiplexor => "SG_MUL_VAL_",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Keyword not part of the format.
    Unknown,
    /// Known keyword that is not modelled.
    Unsupported,
    /// A recognised record that could not be parsed or applied.
    Malformed(RecordKind),
    /// A signal record with no message before it.
    SignalWithoutMessage,
    /// A parsed entity refers to something that does not exist.
    DanglingReference,
    /// An attribute value outside the range its definition declares. The
    /// value is kept.
    OutOfRange,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown record"),
            Self::Unsupported => write!(f, "unsupported record"),
            Self::Malformed(kind) => write!(f, "malformed `{kind}` record"),
            Self::SignalWithoutMessage => write!(f, "signal without message"),
            Self::DanglingReference => write!(f, "dangling reference"),
            Self::OutOfRange => write!(f, "value out of range"),
        }
    }
}

/// One recoverable problem found while parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseWarning {
    /// Line the offending record starts on; `0` for problems found after the
    /// last record.
    pub line: usize,
    pub kind: WarningKind,
    pub detail: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}: {}", self.kind, self.detail)
        } else {
            write!(f, "line {}: {}: {}", self.line, self.kind, self.detail)
        }
    }
}

/// Everything a parse had to skip or could not resolve.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub warnings: Vec<ParseWarning>,
}

impl ParseReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Number of warnings of a kind.
    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

/// Keywords of the format that are not modelled.
const UNSUPPORTED: &[&str] = &[
    "BA_DEF_SGTYPE_",
    "BA_SGTYPE_",
    "SIG_TYPE_REF_",
    "SGTYPE_VAL_",
    "SIGTYPE_VALTYPE_",
    "CAT_DEF_",
    "CAT_",
    "FILTER",
    "EV_DATA_",
    "BU_SG_REL_",
    "BU_EV_REL_",
    "BU_BO_REL_",
];

enum State {
    Start,
    /// Inside the `NS_` block; indented lines are symbols.
    NewSymbols,
    /// After a `BO_` record; `SG_` records belong to this message.
    Message(u32),
}

/// Where a `BA_` value is attached.
enum AttributeTarget {
    Network,
    Node(String),
    Message(u32),
    Signal(u32, String),
    EnvironmentVariable(String),
}

impl TranslationToOpencan for DbcTranslator {
    type Error = DbcError;

    fn import_network<R: BufRead>(input: R, net: &mut Network) -> Result<ParseReport, DbcError> {
        let mut reader = RecordReader::new(input);
        let mut parser = DbcParser::new(net);

        while let Some(record) = reader.next_record()? {
            parser.record(&record);
        }

        Ok(parser.finish())
    }
}

struct DbcParser<'n> {
    net: &'n mut Network,
    state: State,
    line: usize,
    report: ParseReport,
}

impl<'n> DbcParser<'n> {
    fn new(net: &'n mut Network) -> Self {
        Self {
            net,
            state: State::Start,
            line: 0,
            report: ParseReport::default(),
        }
    }

    fn record(&mut self, record: &Record) {
        self.line = record.line;
        let text = record.text.trim();

        if text.is_empty() {
            if let State::NewSymbols = self.state {
                debug!(line = self.line, "end of new symbols");
                self.state = State::Start;
            }
            return;
        }

        if matches!(self.state, State::NewSymbols) && record.is_indented() {
            self.net.new_symbols.push(text.into());
            return;
        }

        let keyword = text
            .split(|c: char| c.is_whitespace() || c == ':')
            .next()
            .unwrap_or_default();

        if keyword == "SG_" {
            match self.state {
                State::Message(id) => {
                    self.run(RecordKind::Signal, text, |p, t| p.signal(id, t));
                }
                _ => self.warn(
                    WarningKind::SignalWithoutMessage,
                    "signal record outside of a message".into(),
                ),
            }
            return;
        }

        self.state = State::Start;

        match keyword {
            "VERSION" => self.run(RecordKind::Version, text, Self::version),
            "NS_" => self.run(RecordKind::NewSymbols, text, Self::new_symbols),
            "BS_" => self.run(RecordKind::BitTiming, text, Self::bit_timing),
            "BU_" => self.run(RecordKind::Nodes, text, Self::nodes),
            "VAL_TABLE_" => self.run(RecordKind::ValueTable, text, Self::value_table),
            "BO_" => self.run(RecordKind::Message, text, Self::message),
            "BO_TX_BU_" => self.run(RecordKind::MessageTransmitters, text, Self::transmitters),
            "EV_" => self.run(RecordKind::EnvironmentVariable, text, Self::environment_variable),
            "ENVVAR_DATA_" => self.run(
                RecordKind::EnvironmentVariableData,
                text,
                Self::environment_variable_data,
            ),
            "SGTYPE_" => self.run(RecordKind::SignalType, text, Self::signal_type),
            "CM_" => self.run(RecordKind::Comment, text, Self::comment),
            "BA_DEF_" => self.run(RecordKind::AttributeDefinition, text, Self::attribute_definition),
            "BA_DEF_REL_" => self.run(
                RecordKind::AttributeDefinitionRelation,
                text,
                Self::attribute_definition_relation,
            ),
            "BA_DEF_DEF_" => self.run(RecordKind::AttributeDefault, text, |p, t| {
                p.attribute_default("BA_DEF_DEF_", t)
            }),
            "BA_DEF_DEF_REL_" => self.run(RecordKind::AttributeDefaultRelation, text, |p, t| {
                p.attribute_default("BA_DEF_DEF_REL_", t)
            }),
            "BA_" => self.run(RecordKind::AttributeValue, text, Self::attribute_value),
            "BA_REL_" => self.run(RecordKind::AttributeRelationValue, text, Self::attribute_relation),
            "VAL_" => self.run(RecordKind::ValueDescription, text, Self::value_description),
            "SIG_GROUP_" => self.run(RecordKind::SignalGroup, text, Self::signal_group),
            "SIG_VALTYPE_" => self.run(
                RecordKind::SignalExtendedValueType,
                text,
                Self::extended_value_type,
            ),
            "SG_MUL_VAL_" => self.run(
                RecordKind::ExtendedMultiplexor,
                text,
                Self::extended_multiplexor,
            ),
            _ if UNSUPPORTED.contains(&keyword) => self.warn(
                WarningKind::Unsupported,
                format!("`{keyword}` records are not supported"),
            ),
            _ => self.warn(WarningKind::Unknown, format!("unknown keyword `{keyword}`")),
        }
    }

    fn finish(mut self) -> ParseReport {
        self.line = 0;
        for violation in self.net.validate() {
            self.warn(WarningKind::DanglingReference, violation.to_string());
        }

        self.net.successfully_parsed = self.report.is_clean();

        info!(
            messages = self.net.messages.len(),
            nodes = self.net.nodes.len(),
            warnings = self.report.warnings.len(),
            "parsed DBC network"
        );

        self.report
    }

    /// Parse one record, turning any failure into a warning.
    fn run<F>(&mut self, kind: RecordKind, text: &str, parse: F)
    where
        F: FnOnce(&mut Self, &mut Tokens) -> Result<(), RecordError>,
    {
        let result = match Tokens::new(text) {
            Ok(mut tokens) => parse(self, &mut tokens),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            self.warn(WarningKind::Malformed(kind), e.to_string());
        }
    }

    fn warn(&mut self, kind: WarningKind, detail: String) {
        warn!(line = self.line, %kind, "{detail}");

        self.report.warnings.push(ParseWarning {
            line: self.line,
            kind,
            detail,
        });
    }

    fn node_mut(&mut self, name: String) -> Result<&mut Node, RecordError> {
        self.net
            .nodes
            .get_mut(&name)
            .ok_or(RecordError::UnknownNode(name))
    }

    fn message_mut(&mut self, id: u32) -> Result<&mut Message, RecordError> {
        self.net
            .message_mut(id)
            .ok_or(RecordError::Construction(
                CANConstructionError::MessageDoesNotExist(id),
            ))
    }

    fn signal_mut(&mut self, id: u32, name: String) -> Result<&mut Signal, RecordError> {
        self.message_mut(id)?
            .signal_mut(&name)
            .ok_or(RecordError::UnknownSignal(id, name))
    }

    fn env_var_mut(&mut self, name: String) -> Result<&mut EnvironmentVariable, RecordError> {
        self.net
            .environment_variables
            .get_mut(&name)
            .ok_or(RecordError::UnknownEnvironmentVariable(name))
    }

    fn version(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("VERSION")?;
        let version = t.string()?;
        t.finish()?;

        self.net.version = version;
        Ok(())
    }

    fn new_symbols(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("NS_")?;
        t.punct(':')?;
        while let Some(Token::Word(_)) = t.peek() {
            let symbol = t.word()?;
            self.net.new_symbols.push(symbol);
        }
        t.finish()?;

        debug!(line = self.line, "new symbols");
        self.state = State::NewSymbols;
        Ok(())
    }

    fn bit_timing(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("BS_")?;
        t.punct(':')?;

        let mut timing = BitTiming::default();
        if t.next_is::<u32>() {
            timing.baudrate = t.number()?;
            if t.eat_punct(':') {
                timing.btr1 = t.number()?;
                t.punct(',')?;
                timing.btr2 = t.number()?;
            }
        }
        t.finish()?;

        self.net.bit_timing = timing;
        Ok(())
    }

    fn nodes(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("BU_")?;
        t.punct(':')?;
        let names = node_list(t)?;
        t.finish()?;

        for name in names {
            if self.net.node(&name).is_none() {
                self.net.add_node(&name)?;
            }
        }
        Ok(())
    }

    fn value_table(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("VAL_TABLE_")?;
        let name = t.word()?;
        let value_descriptions = value_descriptions(t)?;

        self.net.value_tables.insert(
            name.clone(),
            ValueTable {
                name,
                value_descriptions,
            },
        );
        Ok(())
    }

    fn message(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("BO_")?;
        let id = t.number()?;
        let name = t.word()?;
        t.punct(':')?;
        let size = t.number()?;
        let transmitter = match t.peek() {
            Some(Token::Word(_)) => node_name(t.word()?).unwrap_or_default(),
            _ => String::new(),
        };
        t.finish()?;

        let msg = Message::builder()
            .id(id)
            .name(name)
            .size(size)
            .transmitter(transmitter)
            .build()?;
        self.net.add_message(msg)?;

        debug!(line = self.line, "message 0x{id:x}");
        self.state = State::Message(id);
        Ok(())
    }

    fn signal(&mut self, id: u32, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("SG_")?;
        let name = t.word()?;
        let multiplexor = match t.peek() {
            Some(Token::Word(_)) => {
                let w = t.word()?;
                Multiplexor::from_dbc(&w)
                    .ok_or(RecordError::Unexpected("a multiplexor indicator", w))?
            }
            _ => Multiplexor::None,
        };
        t.punct(':')?;
        let start_bit = t.number()?;
        t.punct('|')?;
        let bit_size = t.number()?;
        t.punct('@')?;
        let (byte_order, value_type) = byte_order_and_sign(t.word()?)?;
        let (factor, offset) = scale(t)?;
        let (minimum, maximum) = range(t)?;
        let unit = t.string()?;
        let receivers = node_list(t)?;
        t.finish()?;

        let mut builder = Signal::builder()
            .name(name)
            .multiplexor(multiplexor)
            .start_bit(start_bit)
            .bit_size(bit_size)
            .byte_order(byte_order)
            .value_type(value_type)
            .factor(factor)
            .offset(offset)
            .minimum(minimum)
            .maximum(maximum)
            .unit(unit);
        for node in receivers {
            builder = builder.receiver(node);
        }
        let sig = builder.build()?;

        let msg = self.message_mut(id)?;
        if msg.signal(&sig.name).is_some() {
            return Err(CANConstructionError::SignalNameAlreadyExists(sig.name).into());
        }
        msg.insert_signal(sig)?;

        Ok(())
    }

    fn transmitters(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("BO_TX_BU_")?;
        let id = t.number()?;
        t.punct(':')?;
        let nodes = node_list(t)?;
        t.finish()?;

        self.message_mut(id)?.transmitters.extend(nodes);
        Ok(())
    }

    fn environment_variable(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("EV_")?;
        let name = t.word()?;
        t.punct(':')?;
        let type_code = t.number()?;
        let (minimum, maximum) = range(t)?;
        let unit = t.string()?;
        let initial_value = t.number()?;
        let id = t.number()?;
        let access = t.word()?;
        let access_code = access
            .strip_prefix("DUMMY_NODE_VECTOR")
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .ok_or_else(|| RecordError::Unexpected("an access type", access.clone()))?;
        let access_nodes = node_list(t)?;
        t.finish()?;

        let mut ev = EnvironmentVariable {
            minimum,
            maximum,
            unit,
            initial_value,
            id,
            access_nodes,
            ..EnvironmentVariable::new(name)
        };
        ev.set_dbc_types(type_code, access_code).ok_or_else(|| {
            RecordError::Invalid(format!(
                "invalid type {type_code} or access code 0x{access_code:X}"
            ))
        })?;

        self.net.environment_variables.insert(ev.name.clone(), ev);
        Ok(())
    }

    fn environment_variable_data(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("ENVVAR_DATA_")?;
        let name = t.word()?;
        t.punct(':')?;
        let size = t.number()?;
        t.finish()?;

        let ev = self.env_var_mut(name)?;
        ev.var_type = EnvironmentVariableType::Data;
        ev.data_size = size;
        Ok(())
    }

    /// Either a type definition (`SGTYPE_ <name> : ...`) or a legacy
    /// reference from a signal to a type (`SGTYPE_ <id> <signal> : <type>`).
    fn signal_type(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("SGTYPE_")?;

        if t.peek_nth(1) != Some(&Token::Punct(':')) {
            let id = t.number()?;
            let signal = t.word()?;
            t.punct(':')?;
            let type_name = t.word()?;
            t.finish()?;

            self.signal_mut(id, signal)?.type_name = type_name;
            return Ok(());
        }

        let name = t.word()?;
        t.punct(':')?;
        let size = t.number()?;
        t.punct('@')?;
        let (byte_order, value_type) = byte_order_and_sign(t.word()?)?;
        let (factor, offset) = scale(t)?;
        let (minimum, maximum) = range(t)?;
        let unit = t.string()?;
        let default_value = t.number()?;
        let value_table = if t.eat_punct(',') {
            t.word()?
        } else {
            String::new()
        };
        t.finish()?;

        self.net.signal_types.insert(
            name.clone(),
            SignalType {
                name,
                size,
                byte_order,
                value_type,
                factor,
                offset,
                minimum,
                maximum,
                unit,
                default_value,
                value_table,
            },
        );
        Ok(())
    }

    fn comment(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("CM_")?;

        if let Some(Token::Str(_)) = t.peek() {
            let comment = t.string()?;
            t.finish()?;

            self.net.comment = comment;
            return Ok(());
        }

        let target = t.word()?;
        match target.as_str() {
            "BU_" => {
                let name = t.word()?;
                let comment = t.string()?;
                t.finish()?;
                self.node_mut(name)?.comment = comment;
            }
            "BO_" => {
                let id = t.number()?;
                let comment = t.string()?;
                t.finish()?;
                self.message_mut(id)?.comment = comment;
            }
            "SG_" => {
                let id = t.number()?;
                let signal = t.word()?;
                let comment = t.string()?;
                t.finish()?;
                self.signal_mut(id, signal)?.comment = comment;
            }
            "EV_" => {
                let name = t.word()?;
                let comment = t.string()?;
                t.finish()?;
                self.env_var_mut(name)?.comment = comment;
            }
            _ => return Err(RecordError::Unexpected("a comment target", target)),
        }

        Ok(())
    }

    fn attribute_definition(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("BA_DEF_")?;
        let object_type = match t.peek() {
            Some(Token::Word(_)) => {
                let w = t.word()?;
                AttributeObjectType::from_dbc(&w)
                    .filter(|o| !o.is_relation())
                    .ok_or(RecordError::Unexpected("an object type", w))?
            }
            _ => AttributeObjectType::Network,
        };

        self.define_attribute(object_type, t)
    }

    fn attribute_definition_relation(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("BA_DEF_REL_")?;
        let w = t.word()?;
        let object_type = AttributeObjectType::from_dbc(&w)
            .filter(|o| o.is_relation())
            .ok_or(RecordError::Unexpected("a relation type", w))?;

        self.define_attribute(object_type, t)
    }

    fn define_attribute(
        &mut self,
        object_type: AttributeObjectType,
        t: &mut Tokens,
    ) -> Result<(), RecordError> {
        let name = t.string()?;
        let kind = t.word()?;
        let value_type = match kind.as_str() {
            "INT" => AttributeValueType::Integer {
                minimum: t.integer()?,
                maximum: t.integer()?,
            },
            "HEX" => AttributeValueType::Hex {
                minimum: t.integer()?,
                maximum: t.integer()?,
            },
            "FLOAT" => AttributeValueType::Float {
                minimum: t.number()?,
                maximum: t.number()?,
            },
            "STRING" => AttributeValueType::String,
            "ENUM" => {
                let mut labels = Vec::new();
                while let Some(Token::Str(_)) = t.peek() {
                    labels.push(t.string()?);
                    t.eat_punct(',');
                }
                AttributeValueType::Enum(labels)
            }
            _ => return Err(RecordError::Unexpected("an attribute value type", kind)),
        };
        t.finish()?;

        self.net.attribute_definitions.insert(
            name.clone(),
            AttributeDefinition {
                name,
                object_type,
                value_type,
            },
        );
        Ok(())
    }

    fn attribute_default(&mut self, keyword: &'static str, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword(keyword)?;
        let name = t.string()?;
        let value = self.typed_value(&name, t)?;
        t.finish()?;

        self.net
            .attribute_defaults
            .insert(name.clone(), Attribute::new(name, value));
        Ok(())
    }

    fn attribute_value(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("BA_")?;
        let name = t.string()?;

        let object = match t.peek() {
            Some(Token::Word(w)) => w.clone(),
            _ => String::new(),
        };
        let target = match object.as_str() {
            "BU_" => {
                t.word()?;
                AttributeTarget::Node(t.word()?)
            }
            "BO_" => {
                t.word()?;
                AttributeTarget::Message(t.number()?)
            }
            "SG_" => {
                t.word()?;
                AttributeTarget::Signal(t.number()?, t.word()?)
            }
            "EV_" => {
                t.word()?;
                AttributeTarget::EnvironmentVariable(t.word()?)
            }
            _ => AttributeTarget::Network,
        };
        let value = self.typed_value(&name, t)?;
        t.finish()?;

        let values = match target {
            AttributeTarget::Network => &mut self.net.attribute_values,
            AttributeTarget::Node(node) => &mut self.node_mut(node)?.attribute_values,
            AttributeTarget::Message(id) => &mut self.message_mut(id)?.attribute_values,
            AttributeTarget::Signal(id, signal) => &mut self.signal_mut(id, signal)?.attribute_values,
            AttributeTarget::EnvironmentVariable(ev) => &mut self.env_var_mut(ev)?.attribute_values,
        };
        values.insert(name.clone(), Attribute::new(name, value));

        Ok(())
    }

    fn attribute_relation(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("BA_REL_")?;
        let name = t.string()?;
        let kind = t.word()?;
        let key = match kind.as_str() {
            "BU_EV_REL_" => RelationKey::NodeEnvironmentVariable {
                node: t.word()?,
                env_var: t.word()?,
            },
            "BU_BO_REL_" => RelationKey::NodeTxMessage {
                node: t.word()?,
                message: t.number()?,
            },
            "BU_SG_REL_" => {
                let node = t.word()?;
                t.keyword("SG_")?;
                RelationKey::NodeMappedRxSignal {
                    node,
                    message: t.number()?,
                    signal: t.word()?,
                }
            }
            _ => return Err(RecordError::Unexpected("a relation type", kind)),
        };
        let value = self.typed_value(&name, t)?;
        t.finish()?;

        self.net
            .insert_attribute_relation(AttributeRelation::new(name, key, value));
        Ok(())
    }

    /// Read an attribute value with the type its definition declares.
    /// Values of undefined attributes are kept with a guessed type.
    fn typed_value(&mut self, name: &str, t: &mut Tokens) -> Result<AttributeValue, RecordError> {
        let value_type = self
            .net
            .attribute_definition(name)
            .map(|d| d.value_type.clone());

        let value = match &value_type {
            Some(AttributeValueType::Integer { .. }) => AttributeValue::Integer(t.integer()?),
            Some(AttributeValueType::Hex { .. }) => AttributeValue::Hex(t.integer()?),
            Some(AttributeValueType::Float { .. }) => AttributeValue::Float(t.number()?),
            Some(AttributeValueType::String) => AttributeValue::String(t.string()?),
            Some(ty @ AttributeValueType::Enum(_)) => match t.peek() {
                // defaults usually name the label, values use the ordinal
                Some(Token::Str(_)) => {
                    let label = t.string()?;
                    let index = ty.enum_index(&label).ok_or_else(|| {
                        RecordError::Invalid(format!("`{label}` is not a value of `{name}`"))
                    })?;
                    AttributeValue::Enum(index)
                }
                _ => AttributeValue::Enum(t.number()?),
            },
            None => {
                self.warn(
                    WarningKind::DanglingReference,
                    format!("attribute `{name}` is not defined"),
                );

                match t.peek() {
                    Some(Token::Str(_)) => AttributeValue::String(t.string()?),
                    _ if t.next_is::<i64>() => AttributeValue::Integer(t.integer()?),
                    _ => AttributeValue::Float(t.number()?),
                }
            }
        };

        if let Some(ty) = value_type.filter(|ty| !ty.accepts(&value)) {
            self.warn(
                WarningKind::OutOfRange,
                format!("value {value:?} of attribute `{name}` does not fit {ty:?}"),
            );
        }

        Ok(value)
    }

    /// `VAL_` for a signal (`VAL_ <id> <signal> ...`) or an environment
    /// variable (`VAL_ <name> ...`).
    fn value_description(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("VAL_")?;

        if t.next_is::<u32>() {
            let id = t.number()?;
            let signal = t.word()?;
            let descriptions = value_descriptions(t)?;
            self.signal_mut(id, signal)?.value_descriptions = descriptions;
        } else {
            let name = t.word()?;
            let descriptions = value_descriptions(t)?;
            self.env_var_mut(name)?.value_descriptions = descriptions;
        }

        Ok(())
    }

    fn signal_group(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("SIG_GROUP_")?;
        let id = t.number()?;
        let name = t.word()?;
        let repetitions = t.number()?;
        t.punct(':')?;
        let mut signals = BTreeSet::new();
        while let Some(Token::Word(_)) = t.peek() {
            signals.insert(t.word()?);
            t.eat_punct(',');
        }
        t.finish()?;

        self.message_mut(id)?.signal_groups.insert(
            name.clone(),
            SignalGroup {
                name,
                repetitions,
                signals,
            },
        );
        Ok(())
    }

    fn extended_value_type(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("SIG_VALTYPE_")?;
        let id = t.number()?;
        let signal = t.word()?;
        t.eat_punct(':');
        let code = t.number()?;
        t.finish()?;

        let value_type = ExtendedValueType::from_dbc(code)
            .ok_or_else(|| RecordError::Invalid(format!("unknown extended value type {code}")))?;
        self.signal_mut(id, signal)?.extended_value_type = value_type;
        Ok(())
    }

    fn extended_multiplexor(&mut self, t: &mut Tokens) -> Result<(), RecordError> {
        t.keyword("SG_MUL_VAL_")?;
        let id = t.number()?;
        let signal = t.word()?;
        let switch = t.word()?;
        let mut value_ranges = Vec::new();
        while let Some(Token::Word(_)) = t.peek() {
            value_ranges.push(value_range(t.word()?)?);
            t.eat_punct(',');
        }
        t.finish()?;

        self.signal_mut(id, signal)?.extended_multiplexors.insert(
            switch.clone(),
            ExtendedMultiplexor {
                switch,
                value_ranges,
            },
        );
        Ok(())
    }
}

/// `Vector__XXX` stands for "no node".
fn node_name(name: String) -> Option<String> {
    (name != NO_NODE).then_some(name)
}

/// Node names separated by commas or whitespace.
fn node_list(t: &mut Tokens) -> Result<BTreeSet<String>, RecordError> {
    let mut nodes = BTreeSet::new();

    while let Some(Token::Word(_)) = t.peek() {
        nodes.extend(node_name(t.word()?));
        t.eat_punct(',');
    }

    Ok(nodes)
}

/// `1+`, `0-` and so on.
fn byte_order_and_sign(w: String) -> Result<(ByteOrder, ValueType), RecordError> {
    let mut chars = w.chars();

    match (
        chars.next().and_then(ByteOrder::from_dbc),
        chars.next().and_then(ValueType::from_dbc),
        chars.next(),
    ) {
        (Some(order), Some(sign), None) => Ok((order, sign)),
        _ => Err(RecordError::Unexpected("byte order and sign", w)),
    }
}

/// `(factor,offset)`
fn scale(t: &mut Tokens) -> Result<(f64, f64), RecordError> {
    t.punct('(')?;
    let factor = t.number()?;
    t.punct(',')?;
    let offset = t.number()?;
    t.punct(')')?;

    Ok((factor, offset))
}

/// `[minimum|maximum]`
fn range<T: FromStr>(t: &mut Tokens) -> Result<(T, T), RecordError> {
    t.punct('[')?;
    let minimum = t.number()?;
    t.punct('|')?;
    let maximum = t.number()?;
    t.punct(']')?;

    Ok((minimum, maximum))
}

/// `<raw> "<label>"` pairs up to the end of the record.
fn value_descriptions(t: &mut Tokens) -> Result<BTreeMap<i64, String>, RecordError> {
    let mut descriptions = BTreeMap::new();

    while let Some(Token::Word(_)) = t.peek() {
        let raw = t.integer()?;
        descriptions.insert(raw, t.string()?);
    }
    t.finish()?;

    Ok(descriptions)
}

/// `low-high`
fn value_range(w: String) -> Result<(u32, u32), RecordError> {
    w.split_once('-')
        .and_then(|(low, high)| Some((low.parse().ok()?, high.parse().ok()?)))
        .ok_or(RecordError::Unexpected("a value range", w))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn parse(text: &str) -> (Network, ParseReport) {
        DbcTranslator::parse_str(text).unwrap()
    }

    fn kinds(report: &ParseReport) -> Vec<WarningKind> {
        report.warnings.iter().map(|w| w.kind).collect()
    }

    #[test]
    fn message_and_signals() {
        let (net, report) = parse(indoc! {r#"
            VERSION "1.0"

            BU_: ECU GW

            BO_ 256 Status: 8 ECU
             SG_ Speed : 7|16@0+ (0.01,0) [0|655.35] "km/h" GW
             SG_ Mode M : 16|2@1+ (1,0) [0|3] "" Vector__XXX
             SG_ Temp m1 : 24|8@1- (0.5,-40) [-40|87.5] "degC" ECU,GW

            BO_ 2566844926 Ext: 4 Vector__XXX
        "#});

        assert!(report.is_clean(), "{report:?}");
        assert!(net.successfully_parsed);
        assert_eq!(net.version, "1.0");
        assert_eq!(net.nodes.keys().collect::<Vec<_>>(), ["ECU", "GW"]);

        let status = net.message(256).unwrap();
        assert_eq!(status.name, "Status");
        assert_eq!(status.tx_node(), Some("ECU"));
        assert_eq!(status.signals.len(), 3);

        let speed = &status["Speed"];
        assert_eq!(speed.byte_order, ByteOrder::BigEndian);
        assert_eq!(speed.value_type, ValueType::Unsigned);
        assert_eq!(speed.factor, 0.01);
        assert_eq!(speed.maximum, 655.35);
        assert_eq!(speed.unit, "km/h");

        assert_eq!(status["Mode"].multiplexor, Multiplexor::Switch);
        assert!(status["Mode"].receivers.is_empty());

        let temp = &status["Temp"];
        assert_eq!(temp.multiplexor, Multiplexor::Multiplexed(1));
        assert_eq!(temp.value_type, ValueType::Signed);
        assert_eq!(temp.offset, -40.0);
        assert_eq!(temp.receivers.len(), 2);

        let ext = net.message(2566844926).unwrap();
        assert!(ext.is_extended());
        assert_eq!(ext.tx_node(), None);
    }

    #[test]
    fn new_symbols_end_at_blank_line() {
        let (net, report) = parse("NS_ :\n\tNS_DESC_\n\tCM_\n\n BU_: A\n");

        assert!(report.is_clean());
        assert_eq!(net.new_symbols, ["NS_DESC_", "CM_"]);
        assert!(net.node("A").is_some());
    }

    #[test]
    fn new_symbols_end_at_unindented_record() {
        let (net, report) = parse("NS_ :\n\tCM_\nBS_: 500:12,34\n");

        assert!(report.is_clean());
        assert_eq!(net.new_symbols, ["CM_"]);
        assert_eq!(
            net.bit_timing,
            BitTiming {
                baudrate: 500,
                btr1: 12,
                btr2: 34
            }
        );
    }

    #[test]
    fn signal_without_message() {
        let (net, report) = parse(" SG_ Lost : 0|8@1+ (1,0) [0|0] \"\" Vector__XXX\nBU_: A\n");

        assert_eq!(kinds(&report), [WarningKind::SignalWithoutMessage]);
        assert_eq!(report.warnings[0].line, 1);
        assert!(!net.successfully_parsed);
        assert!(net.node("A").is_some());
    }

    #[test]
    fn signal_after_other_record_has_no_message() {
        let (_, report) = parse(indoc! {r#"
            BO_ 1 M: 8 Vector__XXX
            CM_ "between";
             SG_ S : 0|8@1+ (1,0) [0|0] "" Vector__XXX
        "#});

        assert_eq!(kinds(&report), [WarningKind::SignalWithoutMessage]);
    }

    #[test]
    fn unknown_and_unsupported() {
        let (_, report) = parse("FOO_ bar;\nCAT_DEF_ 1 x 0;\nBU_SG_REL_ x;\n");

        assert_eq!(
            kinds(&report),
            [
                WarningKind::Unknown,
                WarningKind::Unsupported,
                WarningKind::Unsupported
            ]
        );
        assert_eq!(report.warnings[2].line, 3);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let (net, report) = parse(indoc! {r#"
            BU_: ECU
            BO_ 16 Short: 1 ECU
             SG_ TooWide : 4|8@1+ (1,0) [0|0] "" ECU
             SG_ Fits : 0|8@1+ (1,0) [0|0] "" ECU
             SG_ Fits : 0|4@1+ (1,0) [0|0] "" ECU
             SG_ Broken : 0|x@1+ (1,0) [0|0] "" ECU
             SG_ Zero : 0|0@1+ (1,0) [0|0] "" ECU
             SG_ FarIntel : 4294967295|2@1+ (1,0) [0|0] "" ECU
             SG_ FarMotorola : 4294967288|2@0+ (1,0) [0|0] "" ECU
            BO_ 16 Again: 1 ECU
            VERSION 12
        "#});

        assert_eq!(
            kinds(&report),
            [
                WarningKind::Malformed(RecordKind::Signal),
                WarningKind::Malformed(RecordKind::Signal),
                WarningKind::Malformed(RecordKind::Signal),
                WarningKind::Malformed(RecordKind::Signal),
                WarningKind::Malformed(RecordKind::Signal),
                WarningKind::Malformed(RecordKind::Signal),
                WarningKind::Malformed(RecordKind::Message),
                WarningKind::Malformed(RecordKind::Version),
            ]
        );

        let msg = net.message(16).unwrap();
        assert_eq!(msg.name, "Short");
        assert_eq!(msg.signals.keys().collect::<Vec<_>>(), ["Fits"]);
        assert_eq!(msg["Fits"].bit_size, 8);
    }

    #[test]
    fn multi_line_comments() {
        let (net, report) = parse(indoc! {r#"
            BU_: ECU
            BO_ 5 M: 8 ECU
             SG_ S : 0|8@1+ (1,0) [0|0] "" ECU

            CM_ "Network
            comment";
            CM_ BU_ ECU "Engine \"main\" unit";
            CM_ BO_ 5 "Line one

            Line three";
            CM_ SG_ 5 S "sig";
            CM_ BU_ Nope "x";
        "#});

        assert_eq!(net.comment, "Network\ncomment");
        assert_eq!(net.node("ECU").unwrap().comment, "Engine \"main\" unit");
        assert_eq!(net.message(5).unwrap().comment, "Line one\n\nLine three");
        assert_eq!(net.signal(5, "S").unwrap().comment, "sig");

        assert_eq!(kinds(&report), [WarningKind::Malformed(RecordKind::Comment)]);
        assert_eq!(report.warnings[0].line, 12);
    }

    #[test]
    fn attributes() {
        let (net, report) = parse(indoc! {r#"
            BU_: ECU GW
            BO_ 100 M: 8 ECU
             SG_ S : 0|8@1+ (1,0) [0|0] "" GW

            BA_DEF_  "BusType" STRING ;
            BA_DEF_ BO_  "GenMsgSendType" ENUM  "Cyclic","Spontaneous";
            BA_DEF_ BO_  "GenMsgCycleTime" INT 0 65535;
            BA_DEF_ SG_  "GenSigStartValue" FLOAT 0 1e+06;
            BA_DEF_ BU_  "NodeAddress" HEX 0 255;
            BA_DEF_REL_ BU_BO_REL_  "GenMsgTimeout" INT 0 1000;
            BA_DEF_DEF_  "GenMsgSendType" "Spontaneous";
            BA_DEF_DEF_REL_ "GenMsgTimeout" 100;
            BA_ "BusType" "CAN";
            BA_ "GenMsgSendType" BO_ 100 0;
            BA_ "GenMsgCycleTime" BO_ 100 20;
            BA_ "GenSigStartValue" SG_ 100 S 2.5;
            BA_ "NodeAddress" BU_ GW 42;
            BA_REL_ "GenMsgTimeout" BU_BO_REL_ GW 100 250;
        "#});

        assert!(report.is_clean(), "{report:?}");

        let send_type = net.attribute_definition("GenMsgSendType").unwrap();
        assert_eq!(send_type.object_type, AttributeObjectType::Message);
        assert_eq!(
            net.attribute_defaults["GenMsgSendType"].value,
            AttributeValue::Enum(1)
        );
        assert_eq!(
            net.attribute_values["BusType"].value,
            AttributeValue::String("CAN".into())
        );

        let msg = net.message(100).unwrap();
        assert_eq!(msg.attribute_values["GenMsgSendType"].value, AttributeValue::Enum(0));
        assert_eq!(msg.attribute_values["GenMsgCycleTime"].value.as_integer(), Some(20));
        assert_eq!(
            msg["S"].attribute_values["GenSigStartValue"].value.as_float(),
            Some(2.5)
        );
        assert_eq!(
            net.node("GW").unwrap().attribute_values["NodeAddress"].value,
            AttributeValue::Hex(42)
        );

        let rel = net.attribute_relation_values.first().unwrap();
        assert_eq!(
            rel.key,
            RelationKey::NodeTxMessage {
                node: "GW".into(),
                message: 100
            }
        );
        assert_eq!(rel.value, AttributeValue::Integer(250));
        assert_eq!(
            net.attribute_definition("GenMsgTimeout").unwrap().object_type,
            AttributeObjectType::NodeTxMessage
        );
    }

    #[test]
    fn undefined_attribute_is_kept() {
        let (net, report) = parse("BA_ \"Mystery\" 3;\nBA_ \"Other\" 2.5;\n");

        assert_eq!(report.count(WarningKind::DanglingReference), 2);
        assert_eq!(net.attribute_values["Mystery"].value, AttributeValue::Integer(3));
        assert_eq!(net.attribute_values["Other"].value, AttributeValue::Float(2.5));
    }

    #[test]
    fn out_of_range_attribute_values() {
        let (net, report) = parse(indoc! {r#"
            BU_: ECU
            BO_ 1 M: 8 ECU
            BA_DEF_ BO_  "Cycle" INT 0 100;
            BA_DEF_ BO_  "Kind" ENUM  "A","B";
            BA_DEF_  "Anything" INT 0 0;
            BA_DEF_DEF_  "Cycle" 500;
            BA_ "Cycle" BO_ 1 50;
            BA_ "Kind" BO_ 1 2;
            BA_ "Anything" -7;
        "#});

        assert_eq!(kinds(&report), [WarningKind::OutOfRange, WarningKind::OutOfRange]);
        assert_eq!(report.warnings[0].line, 6);
        assert!(report.warnings[1].detail.contains("`Kind`"));
        assert!(!net.successfully_parsed);

        // kept as written
        assert_eq!(net.attribute_defaults["Cycle"].value, AttributeValue::Integer(500));
        assert_eq!(
            net.message(1).unwrap().attribute_values["Kind"].value,
            AttributeValue::Enum(2)
        );
        assert_eq!(net.attribute_values["Anything"].value, AttributeValue::Integer(-7));
    }

    #[test]
    fn dangling_relation() {
        let (net, report) = parse(indoc! {r#"
            BU_: ECU
            BA_DEF_REL_ BU_SG_REL_  "R" INT 0 0;
            BA_REL_ "R" BU_SG_REL_ ECU SG_ 7 Missing 1;
        "#});

        assert_eq!(kinds(&report), [WarningKind::DanglingReference]);
        assert_eq!(report.warnings[0].line, 0);
        assert_eq!(net.attribute_relation_values.len(), 1);
    }

    #[test]
    fn environment_variables() {
        let (net, report) = parse(indoc! {r#"
            BU_: ECU
            EV_ EvSpeed: 1 [0|300] "km/h" 0 1 DUMMY_NODE_VECTOR3 ECU;
            EV_ EvName: 0 [0|0] "" 0 2 DUMMY_NODE_VECTOR8000 Vector__XXX;
            EV_ EvBlob: 0 [0|0] "" 0 3 DUMMY_NODE_VECTOR0 Vector__XXX;
            ENVVAR_DATA_ EvBlob: 16;
            EV_ EvBad: 0 [0|0] "" 0 4 NODE_VECTOR0 Vector__XXX;
            VAL_ EvSpeed 0 "Stop" 300 "Max" ;
        "#});

        assert_eq!(
            kinds(&report),
            [WarningKind::Malformed(RecordKind::EnvironmentVariable)]
        );

        let speed = net.environment_variable("EvSpeed").unwrap();
        assert_eq!(speed.var_type, EnvironmentVariableType::Float);
        assert_eq!(speed.access_type, AccessType::ReadWrite);
        assert!(speed.access_nodes.contains("ECU"));
        assert_eq!(speed.maximum, 300.0);
        assert_eq!(speed.value_descriptions[&300], "Max");

        let name = net.environment_variable("EvName").unwrap();
        assert_eq!(name.var_type, EnvironmentVariableType::String);
        assert!(name.access_nodes.is_empty());

        let blob = net.environment_variable("EvBlob").unwrap();
        assert_eq!(blob.var_type, EnvironmentVariableType::Data);
        assert_eq!(blob.data_size, 16);
    }

    #[test]
    fn signal_extras() {
        let (net, report) = parse(indoc! {r#"
            BO_ 9 M: 8 Vector__XXX
             SG_ Mux M : 0|4@1+ (1,0) [0|0] "" Vector__XXX
             SG_ A m1 : 8|32@1+ (1,0) [0|0] "" Vector__XXX
             SG_ B m2 : 8|8@1- (1,0) [0|0] "" Vector__XXX

            VAL_TABLE_ Onoff 1 "On" 0 "Off" ;
            SGTYPE_ Temp : 8@1- (0.5,-40) [-40|87.5] "degC" 0, Onoff;
            SGTYPE_ 9 B : Temp;
            VAL_ 9 Mux 1 "A" 2 "B" ;
            SIG_GROUP_ 9 Group 1 : A B;
            SIG_VALTYPE_ 9 A : 1;
            SG_MUL_VAL_ 9 A Mux 1-1, 3-5;
        "#});

        assert!(report.is_clean(), "{report:?}");

        let msg = net.message(9).unwrap();
        assert_eq!(msg.multiplexor_switch().unwrap().name, "Mux");
        assert_eq!(msg["Mux"].value_description(2), Some("B"));
        assert_eq!(msg["B"].type_name, "Temp");
        assert_eq!(msg["A"].extended_value_type, ExtendedValueType::Float);

        let ext = &msg["A"].extended_multiplexors["Mux"];
        assert_eq!(ext.value_ranges, [(1, 1), (3, 5)]);
        assert!(ext.contains(4));
        assert!(!ext.contains(2));

        assert_eq!(msg.signal_groups["Group"].signals.len(), 2);
        assert_eq!(net.value_tables["Onoff"].value_descriptions[&1], "On");

        let ty = &net.signal_types["Temp"];
        assert_eq!(ty.value_table, "Onoff");
        assert_eq!(ty.byte_order, ByteOrder::LittleEndian);
        assert_eq!(ty.value_type, ValueType::Signed);
    }

    #[test]
    fn references_to_missing_entities() {
        let (_, report) = parse(indoc! {r#"
            BO_TX_BU_ 1 : A,B;
            VAL_ 1 S 0 "x" ;
            SIG_VALTYPE_ 1 S : 1;
            SIG_GROUP_ 1 G 1 : S;
        "#});

        assert_eq!(
            kinds(&report),
            [
                WarningKind::Malformed(RecordKind::MessageTransmitters),
                WarningKind::Malformed(RecordKind::ValueDescription),
                WarningKind::Malformed(RecordKind::SignalExtendedValueType),
                WarningKind::Malformed(RecordKind::SignalGroup),
            ]
        );
        assert!(report.warnings[0].detail.contains("does not exist"));
    }
}
