use indoc::indoc;
use opencan_dbc::*;
use pretty_assertions::assert_eq;

const CANONICAL: &str = include_str!("data/canonical.dbc");

fn parse(text: &str) -> Network {
    let (net, report) = DbcTranslator::parse_str(text).unwrap();
    assert!(report.is_clean(), "unexpected warnings: {:#?}", report.warnings);
    assert!(net.successfully_parsed);

    net
}

#[test]
fn canonical_text_is_reproduced_byte_for_byte() {
    let net = parse(CANONICAL);

    assert_eq!(DbcTranslator::dump_network(&net), CANONICAL);
}

#[test]
fn reparsed_network_is_equal() {
    let net = parse(CANONICAL);
    let again = parse(&DbcTranslator::dump_network(&net));

    assert_eq!(net, again);
}

#[test]
fn canonical_content() {
    let net = parse(CANONICAL);

    assert_eq!(net.version, "2.1");
    assert_eq!(net.new_symbols.len(), 8);
    assert_eq!(net.bit_timing.baudrate, 500);
    assert_eq!(net.comment, "Demo network\nwith a two line comment");

    let engine = net.message_by_name("EngineStatus").unwrap();
    assert_eq!(engine.transmitters.len(), 2);
    assert_eq!(engine["Torque"].multiplexor, Multiplexor::MultiplexedSwitch(2));
    assert_eq!(engine["Temp"].type_name, "TempType");
    assert_eq!(engine.signal_groups["Engine"].repetitions, 1);

    let diag = net.message(2566844926).unwrap();
    assert!(diag.is_extended());
    assert_eq!(diag["Value"].extended_value_type, ExtendedValueType::Float);

    let blob = net.environment_variable("EvBlob").unwrap();
    assert_eq!(blob.var_type, EnvironmentVariableType::Data);
    let name = net.environment_variable("EvName").unwrap();
    assert_eq!(name.var_type, EnvironmentVariableType::String);
    assert_eq!(name.access_type, AccessType::Read);

    assert_eq!(net.attribute_relation_values.len(), 4);
    assert_eq!(
        net.attribute_defaults["GenMsgSendType"].value,
        AttributeValue::Enum(0)
    );
    assert_eq!(
        net.node("ECU").unwrap().attribute_values["NodeAddress"].value,
        AttributeValue::Hex(16)
    );
}

#[test]
fn messy_input_settles_on_canonical_form() {
    let messy = indoc!(
        r#"
        VERSION ""
        NS_ :
            CM_
            BA_
        BS_:
        BU_: GW ECU

        BO_ 1 Second: 2 ECU
         SG_ B : 8|8@1+ (1,0) [0|0] "" GW,Vector__XXX
         SG_ A : 0|8@1+ (1,0) [0|0] "" GW
        BO_ 0 First: 1 GW
         SG_ X : 0|1@1+ (1,0) [0|1] "" ECU
        VAL_ 1 A 3 "three" 1 "one" 2 "two";
        CM_ SG_ 1 A "multi
        line";
        BA_DEF_ BO_ "Cycle" INT 0 100;
        BA_ "Cycle" BO_ 1 10;
    "#
    )
    .replace('\n', "\r\n");

    let net = parse(&messy);
    let first = DbcTranslator::dump_network(&net);
    let second = DbcTranslator::dump_network(&parse(&first));

    assert_eq!(first, second);
    assert!(first.contains("BU_: ECU GW\n"));
    assert!(first.contains("VAL_ 1 A 1 \"one\" 2 \"two\" 3 \"three\" ;\n"));
    assert!(first.contains("BO_ 0 First: 1 GW\n SG_ X : 0|1@1+ (1,0) [0|1] \"\" ECU\n\nBO_ 1 Second"));
    assert!(first.contains("CM_ SG_ 1 A \"multi\nline\";\n"));
    assert_eq!(net.new_symbols, ["CM_", "BA_"]);
}
