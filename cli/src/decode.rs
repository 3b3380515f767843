use opencan_dbc::{Message, Signal};

/// Is `sig` present in this payload, given the multiplexor switches?
fn is_active(msg: &Message, sig: &Signal, payload: &[u8]) -> bool {
    let Some(value) = sig.multiplexor.switch_value() else {
        return true;
    };

    if sig.extended_multiplexors.is_empty() {
        return match msg.multiplexor_switch() {
            // a nested switch with no switch above it
            Some(switch) if switch.name == sig.name => true,
            Some(switch) => switch.decode(payload) == value as u64,
            None => false,
        };
    }

    sig.extended_multiplexors.values().all(|ext| {
        msg.signal(&ext.switch)
            .map(|switch| switch.decode(payload))
            .and_then(|raw| u32::try_from(raw).ok())
            .is_some_and(|raw| ext.contains(raw))
    })
}

/// Value description label, or the physical value with its unit.
pub fn decode_signal(sig: &Signal, payload: &[u8]) -> String {
    let raw = sig.decode(payload);

    if let Some(label) = sig.value_description(raw as i64) {
        return label.to_owned();
    }

    let physical = sig.decode_physical(payload);
    if sig.unit.is_empty() {
        format!("{physical}")
    } else {
        format!("{physical} {}", sig.unit)
    }
}

/// One line per active signal, values lined up after the longest name.
pub fn decode_message(msg: &Message, payload: &[u8]) -> String {
    let pairs: Vec<_> = msg
        .signals
        .values()
        .filter(|sig| is_active(msg, sig, payload))
        .map(|sig| (format!("{}:", sig.name), decode_signal(sig, payload)))
        .collect();

    // how much space between widest signal name and decoded value?
    let width = pairs.iter().map(|(name, _)| name.len()).max().unwrap_or(0) + 4;

    pairs
        .into_iter()
        .map(|(name, val)| format!("{name: <width$}{val}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use opencan_dbc::DbcTranslator;

    use super::*;

    fn network() -> opencan_dbc::Network {
        let (net, report) = DbcTranslator::parse_str(indoc! {r#"
            BU_: ECU

            BO_ 256 Status: 3 ECU
             SG_ Mode M : 0|2@1+ (1,0) [0|3] "" ECU
             SG_ Temp m1 : 8|8@1- (0.5,-40) [-40|87.5] "degC" ECU
             SG_ Gear m2 : 8|3@1+ (1,0) [0|7] "" ECU
             SG_ Level : 16|8@1+ (1,0) [0|255] "" ECU

            VAL_ 256 Gear 0 "Park" 3 "Drive" ;
        "#})
        .unwrap();
        assert!(report.is_clean());

        net
    }

    #[test]
    fn physical_values_with_units() {
        let net = network();
        let msg = net.message(256).unwrap();

        assert_eq!(
            decode_message(msg, &[0x01, 0x54, 0x07]),
            "Level:    7\nMode:     1\nTemp:     2 degC\n"
        );
    }

    #[test]
    fn labels_replace_values() {
        let net = network();
        let msg = net.message(256).unwrap();

        assert_eq!(decode_signal(&msg["Gear"], &[0x02, 0x03, 0x00]), "Drive");
        assert_eq!(decode_signal(&msg["Gear"], &[0x02, 0x01, 0x00]), "1");
    }

    #[test]
    fn nested_switch_without_extended_multiplexing() {
        let (net, report) = DbcTranslator::parse_str(indoc! {r#"
            BO_ 1 Nested: 2 Vector__XXX
             SG_ Inner m0M : 0|4@1+ (1,0) [0|0] "" Vector__XXX
             SG_ A m1 : 8|8@1+ (1,0) [0|0] "" Vector__XXX
             SG_ B m2 : 8|8@1+ (1,0) [0|0] "" Vector__XXX
        "#})
        .unwrap();
        assert!(report.is_clean());

        let msg = net.message(1).unwrap();
        assert_eq!(
            decode_message(msg, &[0x02, 0x2A]),
            "B:        42\nInner:    2\n"
        );
    }

    #[test]
    fn inactive_multiplexed_signals_are_hidden() {
        let net = network();
        let msg = net.message(256).unwrap();
        let out = decode_message(msg, &[0x02, 0x00, 0x00]);

        assert!(out.contains("Park"));
        assert!(!out.contains("Temp"));
    }
}
