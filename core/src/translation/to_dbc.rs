//! A [`Network`] as canonical DBC text.

use std::collections::BTreeMap;
use std::io;

use super::tokens::quote;
use super::{DbcTranslator, TranslationFromOpencan, NO_NODE};
use crate::*;

impl TranslationFromOpencan for DbcTranslator {
    fn dump_network(net: &Network) -> String {
        let mut out = String::new();

        out += &format!("VERSION {}\n\n\n", quote(&net.version));

        out += "NS_ : \n";
        for symbol in &net.new_symbols {
            out += &format!("\t{symbol}\n");
        }
        out += "\n";

        out += "BS_:";
        if !net.bit_timing.is_empty() {
            let BitTiming {
                baudrate,
                btr1,
                btr2,
            } = net.bit_timing;
            out += &format!(" {baudrate}:{btr1},{btr2}");
        }
        out += "\n\n";

        out += "BU_:";
        for node in net.nodes.keys() {
            out += &format!(" {node}");
        }
        out += "\n";
        for table in net.value_tables.values() {
            out += &format!(
                "VAL_TABLE_ {}{} ;\n",
                table.name,
                descriptions(&table.value_descriptions)
            );
        }
        out += "\n\n";

        for msg in net.messages.values() {
            out += &Self::dump_message(msg);
            out += "\n";
        }

        for msg in net.messages.values().filter(|m| !m.transmitters.is_empty()) {
            out += &format!("BO_TX_BU_ {} : {};\n", msg.id, join(&msg.transmitters, ","));
        }
        out += "\n\n";

        for ev in net.environment_variables.values() {
            out += &format!(
                "EV_ {}: {} [{}|{}] {} {} {} DUMMY_NODE_VECTOR{:X} {};\n\n",
                ev.name,
                ev.type_code(),
                ev.minimum,
                ev.maximum,
                quote(&ev.unit),
                ev.initial_value,
                ev.id,
                ev.access_code(),
                nodes_or_none(&ev.access_nodes),
            );
        }
        for ev in net
            .environment_variables
            .values()
            .filter(|ev| ev.var_type == EnvironmentVariableType::Data)
        {
            out += &format!("ENVVAR_DATA_ {}: {};\n", ev.name, ev.data_size);
        }
        out += "\n";

        for ty in net.signal_types.values() {
            out += &format!(
                "SGTYPE_ {} : {}@{}{} ({},{}) [{}|{}] {} {}",
                ty.name,
                ty.size,
                ty.byte_order.dbc_char(),
                ty.value_type.dbc_char(),
                ty.factor,
                ty.offset,
                ty.minimum,
                ty.maximum,
                quote(&ty.unit),
                ty.default_value,
            );
            if !ty.value_table.is_empty() {
                out += &format!(", {}", ty.value_table);
            }
            out += ";\n";
        }
        for (msg, sig) in signals(net).filter(|(_, s)| !s.type_name.is_empty()) {
            out += &format!("SGTYPE_ {} {} : {};\n", msg.id, sig.name, sig.type_name);
        }
        out += "\n";

        out += &comments(net);
        out += &attributes(net);
        out += &trailer(net);

        out
    }

    fn dump_message(msg: &Message) -> String {
        let mut out = format!(
            "BO_ {} {}: {} {}\n",
            msg.id,
            msg.name,
            msg.size,
            msg.tx_node().unwrap_or(NO_NODE)
        );

        for sig in msg.signals.values() {
            out += &Self::dump_signal(sig);
        }

        out
    }

    fn dump_signal(sig: &Signal) -> String {
        let mux = match sig.multiplexor.dbc_token() {
            t if t.is_empty() => t,
            t => t + " ",
        };

        format!(
            " SG_ {} {}: {}|{}@{}{} ({},{}) [{}|{}] {} {}\n",
            sig.name,
            mux,
            sig.start_bit,
            sig.bit_size,
            sig.byte_order.dbc_char(),
            sig.value_type.dbc_char(),
            sig.factor,
            sig.offset,
            sig.minimum,
            sig.maximum,
            quote(&sig.unit),
            nodes_or_none(&sig.receivers),
        )
    }
}

impl DbcTranslator {
    /// Write canonical DBC text for `net`.
    pub fn write_network<W: io::Write>(net: &Network, mut out: W) -> io::Result<()> {
        out.write_all(Self::dump_network(net).as_bytes())
    }
}

fn signals(net: &Network) -> impl Iterator<Item = (&Message, &Signal)> {
    net.messages
        .values()
        .flat_map(|m| m.signals.values().map(move |s| (m, s)))
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>, sep: &str) -> String {
    items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(sep)
}

fn nodes_or_none<'a>(nodes: impl IntoIterator<Item = &'a String>) -> String {
    match join(nodes, ",") {
        s if s.is_empty() => NO_NODE.into(),
        s => s,
    }
}

/// ` <raw> "<label>"` for every entry.
fn descriptions(map: &BTreeMap<i64, String>) -> String {
    map.iter()
        .map(|(raw, label)| format!(" {raw} {}", quote(label)))
        .collect()
}

fn comments(net: &Network) -> String {
    let mut out = String::new();

    if !net.comment.is_empty() {
        out += &format!("CM_ {};\n", quote(&net.comment));
    }
    for node in net.nodes.values().filter(|n| !n.comment.is_empty()) {
        out += &format!("CM_ BU_ {} {};\n", node.name, quote(&node.comment));
    }
    for msg in net.messages.values().filter(|m| !m.comment.is_empty()) {
        out += &format!("CM_ BO_ {} {};\n", msg.id, quote(&msg.comment));
    }
    for (msg, sig) in signals(net).filter(|(_, s)| !s.comment.is_empty()) {
        out += &format!("CM_ SG_ {} {} {};\n", msg.id, sig.name, quote(&sig.comment));
    }
    for ev in net.environment_variables.values().filter(|e| !e.comment.is_empty()) {
        out += &format!("CM_ EV_ {} {};\n", ev.name, quote(&ev.comment));
    }

    out
}

fn value_type(ty: &AttributeValueType) -> String {
    match ty {
        AttributeValueType::Integer { minimum, maximum } => format!("INT {minimum} {maximum}"),
        AttributeValueType::Hex { minimum, maximum } => format!("HEX {minimum} {maximum}"),
        AttributeValueType::Float { minimum, maximum } => format!("FLOAT {minimum} {maximum}"),
        AttributeValueType::String => "STRING ".into(),
        AttributeValueType::Enum(labels) => format!(
            "ENUM  {}",
            labels.iter().map(|l| quote(l)).collect::<Vec<_>>().join(",")
        ),
    }
}

/// Attribute values; HEX values are written in decimal and enumerations by
/// ordinal.
fn value(v: &AttributeValue) -> String {
    match v {
        AttributeValue::Integer(i) | AttributeValue::Hex(i) => i.to_string(),
        AttributeValue::Float(f) => f.to_string(),
        AttributeValue::String(s) => quote(s),
        AttributeValue::Enum(i) => i.to_string(),
    }
}

/// Defaults name enumeration labels where the definition has them.
fn default_value(net: &Network, attr: &Attribute) -> String {
    match (&attr.value, net.attribute_definition(&attr.name)) {
        (AttributeValue::Enum(i), Some(def)) => def
            .value_type
            .enum_label(*i)
            .map_or_else(|| i.to_string(), quote),
        (v, _) => value(v),
    }
}

fn attributes(net: &Network) -> String {
    let mut out = String::new();

    let (relations, plain): (Vec<_>, Vec<_>) = net
        .attribute_definitions
        .values()
        .partition(|d| d.object_type.is_relation());

    for def in plain {
        let object = match def.object_type.dbc_token() {
            "" => String::new(),
            t => format!("{t} "),
        };
        out += &format!(
            "BA_DEF_ {object} {} {};\n",
            quote(&def.name),
            value_type(&def.value_type)
        );
    }
    for def in relations {
        out += &format!(
            "BA_DEF_REL_ {}  {} {};\n",
            def.object_type.dbc_token(),
            quote(&def.name),
            value_type(&def.value_type)
        );
    }

    let is_relation = |name: &str| {
        net.attribute_definition(name)
            .map_or(false, |d| d.object_type.is_relation())
    };
    let (relations, plain): (Vec<_>, Vec<_>) = net
        .attribute_defaults
        .values()
        .partition(|a| is_relation(&a.name));

    for attr in plain {
        out += &format!(
            "BA_DEF_DEF_  {} {};\n",
            quote(&attr.name),
            default_value(net, attr)
        );
    }
    for attr in relations {
        out += &format!(
            "BA_DEF_DEF_REL_ {} {};\n",
            quote(&attr.name),
            default_value(net, attr)
        );
    }

    for attr in net.attribute_values.values() {
        out += &format!("BA_ {} {};\n", quote(&attr.name), value(&attr.value));
    }
    for node in net.nodes.values() {
        for attr in node.attribute_values.values() {
            out += &format!(
                "BA_ {} BU_ {} {};\n",
                quote(&attr.name),
                node.name,
                value(&attr.value)
            );
        }
    }
    for msg in net.messages.values() {
        for attr in msg.attribute_values.values() {
            out += &format!(
                "BA_ {} BO_ {} {};\n",
                quote(&attr.name),
                msg.id,
                value(&attr.value)
            );
        }
    }
    for (msg, sig) in signals(net) {
        for attr in sig.attribute_values.values() {
            out += &format!(
                "BA_ {} SG_ {} {} {};\n",
                quote(&attr.name),
                msg.id,
                sig.name,
                value(&attr.value)
            );
        }
    }
    for ev in net.environment_variables.values() {
        for attr in ev.attribute_values.values() {
            out += &format!(
                "BA_ {} EV_ {} {};\n",
                quote(&attr.name),
                ev.name,
                value(&attr.value)
            );
        }
    }

    for rel in &net.attribute_relation_values {
        let key = match &rel.key {
            RelationKey::NodeEnvironmentVariable { node, env_var } => {
                format!("BU_EV_REL_ {node} {env_var}")
            }
            RelationKey::NodeTxMessage { node, message } => format!("BU_BO_REL_ {node} {message}"),
            RelationKey::NodeMappedRxSignal {
                node,
                message,
                signal,
            } => format!("BU_SG_REL_ {node} SG_ {message} {signal}"),
        };
        out += &format!("BA_REL_ {} {key} {};\n", quote(&rel.name), value(&rel.value));
    }

    out
}

/// Value descriptions, signal groups and extended signal information.
fn trailer(net: &Network) -> String {
    let mut out = String::new();

    for (msg, sig) in signals(net).filter(|(_, s)| !s.value_descriptions.is_empty()) {
        out += &format!(
            "VAL_ {} {}{} ;\n",
            msg.id,
            sig.name,
            descriptions(&sig.value_descriptions)
        );
    }
    for ev in net
        .environment_variables
        .values()
        .filter(|e| !e.value_descriptions.is_empty())
    {
        out += &format!("VAL_ {}{} ;\n", ev.name, descriptions(&ev.value_descriptions));
    }

    for msg in net.messages.values() {
        for group in msg.signal_groups.values() {
            out += &format!(
                "SIG_GROUP_ {} {} {} : {};\n",
                msg.id,
                group.name,
                group.repetitions,
                join(&group.signals, " ")
            );
        }
    }

    for (msg, sig) in signals(net) {
        if let Some(code) = sig.extended_value_type.dbc_code() {
            out += &format!("SIG_VALTYPE_ {} {} : {code};\n", msg.id, sig.name);
        }
    }

    for (msg, sig) in signals(net) {
        for ext in sig.extended_multiplexors.values() {
            let ranges = ext
                .value_ranges
                .iter()
                .map(|(low, high)| format!("{low}-{high}"))
                .collect::<Vec<_>>()
                .join(", ");
            out += &format!(
                "SG_MUL_VAL_ {} {} {} {ranges};\n",
                msg.id, sig.name, ext.switch
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn status() -> Message {
        Message::builder()
            .id(256)
            .name("Status")
            .size(8)
            .transmitter("ECU")
            .add_signal(
                Signal::builder()
                    .name("Temp")
                    .multiplexor(Multiplexor::Multiplexed(2))
                    .start_bit(8)
                    .bit_size(8)
                    .value_type(ValueType::Signed)
                    .factor(0.5)
                    .offset(-40.0)
                    .minimum(-40.0)
                    .maximum(87.5)
                    .unit("degC")
                    .receiver("GW")
                    .receiver("ABS")
                    .build()
                    .unwrap(),
            )
            .unwrap()
            .add_signal(
                Signal::builder()
                    .name("Mux")
                    .multiplexor(Multiplexor::Switch)
                    .start_bit(7)
                    .bit_size(4)
                    .byte_order(ByteOrder::BigEndian)
                    .build()
                    .unwrap(),
            )
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn message_lines() {
        assert_eq!(
            DbcTranslator::dump_message(&status()),
            indoc! {r#"
                BO_ 256 Status: 8 ECU
                 SG_ Mux M : 7|4@0+ (1,0) [0|0] "" Vector__XXX
                 SG_ Temp m2 : 8|8@1- (0.5,-40) [-40|87.5] "degC" ABS,GW
            "#}
        );
    }

    #[test]
    fn empty_network() {
        assert_eq!(
            DbcTranslator::dump_network(&Network::new()),
            "VERSION \"\"\n\n\nNS_ : \n\nBS_:\n\nBU_:\n\n\n\n\n\n\n"
        );
    }

    #[test]
    fn attribute_records() {
        let mut net = Network::new();
        net.add_node("ECU").unwrap();
        net.add_message(status()).unwrap();
        net.attribute_definitions.insert(
            "SendType".into(),
            AttributeDefinition {
                name: "SendType".into(),
                object_type: AttributeObjectType::Message,
                value_type: AttributeValueType::Enum(vec!["Cyclic".into(), "Event".into()]),
            },
        );
        net.attribute_definitions.insert(
            "Address".into(),
            AttributeDefinition {
                name: "Address".into(),
                object_type: AttributeObjectType::Node,
                value_type: AttributeValueType::Hex {
                    minimum: 0,
                    maximum: 255,
                },
            },
        );
        net.attribute_definitions.insert(
            "Timeout".into(),
            AttributeDefinition {
                name: "Timeout".into(),
                object_type: AttributeObjectType::NodeTxMessage,
                value_type: AttributeValueType::Integer {
                    minimum: 0,
                    maximum: 0,
                },
            },
        );
        net.attribute_defaults.insert(
            "SendType".into(),
            Attribute::new("SendType", AttributeValue::Enum(1)),
        );
        net.attribute_defaults.insert(
            "Timeout".into(),
            Attribute::new("Timeout", AttributeValue::Integer(10)),
        );
        net.nodes.get_mut("ECU").unwrap().attribute_values.insert(
            "Address".into(),
            Attribute::new("Address", AttributeValue::Hex(0x20)),
        );
        net.message_mut(256).unwrap().attribute_values.insert(
            "SendType".into(),
            Attribute::new("SendType", AttributeValue::Enum(0)),
        );
        net.insert_attribute_relation(AttributeRelation::new(
            "Timeout",
            RelationKey::NodeTxMessage {
                node: "ECU".into(),
                message: 256,
            },
            AttributeValue::Integer(50),
        ));

        assert_eq!(
            attributes(&net),
            indoc! {r#"
                BA_DEF_ BU_  "Address" HEX 0 255;
                BA_DEF_ BO_  "SendType" ENUM  "Cyclic","Event";
                BA_DEF_REL_ BU_BO_REL_  "Timeout" INT 0 0;
                BA_DEF_DEF_  "SendType" "Event";
                BA_DEF_DEF_REL_ "Timeout" 10;
                BA_ "Address" BU_ ECU 32;
                BA_ "SendType" BO_ 256 0;
                BA_REL_ "Timeout" BU_BO_REL_ ECU 256 50;
            "#}
        );
    }

    #[test]
    fn string_environment_variables_use_the_access_flag() {
        let (net, _) = DbcTranslator::parse_str(indoc! {r#"
            EV_ Text: 2 [0|0] "" 0 7 DUMMY_NODE_VECTOR1 Vector__XXX;
        "#})
        .unwrap();
        assert_eq!(
            net.environment_variable("Text").unwrap().var_type,
            EnvironmentVariableType::String
        );

        let text = DbcTranslator::dump_network(&net);
        assert!(text.contains("EV_ Text: 0 [0|0] \"\" 0 7 DUMMY_NODE_VECTOR8001 Vector__XXX;\n"));

        // the canonical form is stable from here on
        let (again, report) = DbcTranslator::parse_str(&text).unwrap();
        assert!(report.is_clean());
        assert_eq!(DbcTranslator::dump_network(&again), text);
    }

    #[test]
    fn write_matches_dump() {
        let mut net = Network::new();
        net.version = "v \"2\"".into();
        net.add_message(status()).unwrap();

        let mut buf = Vec::new();
        DbcTranslator::write_network(&net, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, DbcTranslator::dump_network(&net));
        assert!(text.starts_with("VERSION \"v \\\"2\\\"\"\n"));
    }
}
