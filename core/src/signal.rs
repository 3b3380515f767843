use std::collections::{BTreeMap, BTreeSet};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::attribute::*;
use crate::error::*;
use crate::value::*;

/// Widest raw value the codec can hold.
pub const MAX_SIGNAL_WIDTH: u32 = u64::BITS;

/// A named bit field in a message payload with a linear physical mapping.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
#[builder(build_fn(name = "__build", error = "CANConstructionError", private))]
#[builder(pattern = "owned")]
pub struct Signal {
    #[builder(setter(into))]
    pub name: String,

    #[builder(default)]
    pub multiplexor: Multiplexor,

    /// Start bit; the least significant bit for little-endian signals, the
    /// most significant bit for big-endian ones.
    #[builder(default)]
    pub start_bit: u32,

    pub bit_size: u32,

    #[builder(default)]
    pub byte_order: ByteOrder,

    #[builder(default)]
    pub value_type: ValueType,

    #[builder(default = "1.0")]
    pub factor: f64,

    #[builder(default)]
    pub offset: f64,

    /// Physical minimum; `0` together with a `0` maximum means "derive from
    /// the raw range".
    #[builder(default)]
    pub minimum: f64,

    #[builder(default)]
    pub maximum: f64,

    #[builder(setter(into), default)]
    pub unit: String,

    #[builder(setter(custom), field(type = "BTreeSet<String>"))]
    pub receivers: BTreeSet<String>,

    #[builder(default)]
    pub extended_value_type: ExtendedValueType,

    /// Raw value to label (`VAL_`).
    #[builder(setter(custom), field(type = "BTreeMap<i64, String>"))]
    pub value_descriptions: BTreeMap<i64, String>,

    /// Legacy signal type reference (`SGTYPE_ <id> <signal> : <type>;`).
    #[builder(setter(into), default)]
    pub type_name: String,

    #[builder(setter(into), default)]
    pub comment: String,

    #[builder(setter(custom), field(type = "BTreeMap<String, Attribute>"))]
    pub attribute_values: BTreeMap<String, Attribute>,

    /// Extended multiplexing ranges keyed by switch signal name (`SG_MUL_VAL_`).
    #[builder(setter(custom), field(type = "BTreeMap<String, ExtendedMultiplexor>"))]
    pub extended_multiplexors: BTreeMap<String, ExtendedMultiplexor>,
}

impl Default for Signal {
    fn default() -> Self {
        Self {
            name: String::new(),
            multiplexor: Multiplexor::None,
            start_bit: 0,
            bit_size: 0,
            byte_order: ByteOrder::default(),
            value_type: ValueType::default(),
            factor: 1.0,
            offset: 0.0,
            minimum: 0.0,
            maximum: 0.0,
            unit: String::new(),
            receivers: BTreeSet::new(),
            extended_value_type: ExtendedValueType::default(),
            value_descriptions: BTreeMap::new(),
            type_name: String::new(),
            comment: String::new(),
            attribute_values: BTreeMap::new(),
            extended_multiplexors: BTreeMap::new(),
        }
    }
}

/// Switch value ranges under which a signal is active (`SG_MUL_VAL_`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ExtendedMultiplexor {
    /// Name of the switch signal.
    pub switch: String,

    /// Inclusive `(low, high)` ranges, in declaration order.
    pub value_ranges: Vec<(u32, u32)>,
}

impl ExtendedMultiplexor {
    pub fn contains(&self, switch_value: u32) -> bool {
        self.value_ranges
            .iter()
            .any(|&(low, high)| (low..=high).contains(&switch_value))
    }
}

impl SignalBuilder {
    pub fn build(self) -> Result<Signal, CANConstructionError> {
        let s = self.__build()?;
        s.check_width()?;

        Ok(s)
    }

    /// Add a receiving node.
    pub fn receiver(mut self, node: impl Into<String>) -> Self {
        self.receivers.insert(node.into());

        self
    }

    /// Describe a raw value. Each raw value can only be described once.
    pub fn value_description(
        mut self,
        raw: i64,
        label: impl Into<String>,
    ) -> Result<Self, CANConstructionError> {
        if let Some(existing) = self.value_descriptions.get(&raw) {
            return Err(CANConstructionError::ValueAlreadyDescribed(
                existing.clone(),
                raw,
                self.name,
            ));
        }

        self.value_descriptions.insert(raw, label.into());

        Ok(self)
    }

    pub fn attribute_value(mut self, attr: Attribute) -> Self {
        self.attribute_values.insert(attr.name.clone(), attr);

        self
    }

    pub fn extended_multiplexor(mut self, ext: ExtendedMultiplexor) -> Self {
        self.extended_multiplexors.insert(ext.switch.clone(), ext);

        self
    }
}

impl Signal {
    pub fn builder() -> SignalBuilder {
        SignalBuilder::default()
    }

    /// Reject widths the codec cannot represent.
    pub fn check_width(&self) -> Result<(), CANConstructionError> {
        match self.bit_size {
            0 => Err(CANConstructionError::SignalHasZeroWidth(self.name.clone())),
            w if w > MAX_SIGNAL_WIDTH => Err(CANConstructionError::SignalTooWide(
                self.name.clone(),
                w,
            )),
            _ => Ok(()),
        }
    }

    /// Label for a raw value, if described.
    pub fn value_description(&self, raw: i64) -> Option<&str> {
        self.value_descriptions.get(&raw).map(String::as_str)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn new_sig() -> SignalBuilder {
        Signal::builder()
    }

    pub fn basic_sig(name: &str) -> Signal {
        new_sig().name(name).bit_size(1).build().unwrap()
    }

    #[test]
    fn signal_width_zero() {
        let try_sig = |width| -> Result<_, CANConstructionError> {
            new_sig().name("testSignal").bit_size(width).build()
        };

        assert!(matches!(
            try_sig(0),
            Err(CANConstructionError::SignalHasZeroWidth(..))
        ));
        assert!(matches!(
            try_sig(65),
            Err(CANConstructionError::SignalTooWide(_, 65))
        ));

        assert!(matches!(try_sig(1), Ok(..)));
        assert!(matches!(try_sig(64), Ok(..)));
    }

    #[test]
    fn signal_width_nonexistent() {
        assert!(matches!(
            new_sig().name("testSignal").build(),
            Err(CANConstructionError::UninitializedFieldError(s)) if s == "bit_size"
        ));
    }

    #[test]
    fn builder_defaults() {
        let sig = basic_sig("s");

        assert_eq!(sig.factor, 1.0);
        assert_eq!(sig.offset, 0.0);
        assert_eq!(sig.byte_order, ByteOrder::LittleEndian);
        assert_eq!(sig.value_type, ValueType::Unsigned);
        assert_eq!(sig.multiplexor, Multiplexor::None);
        assert!(sig.receivers.is_empty());
    }

    #[test]
    fn value_described_once() {
        let sig = new_sig()
            .name("Gear")
            .bit_size(3)
            .value_description(0, "Park")
            .unwrap()
            .value_description(1, "Reverse")
            .unwrap();

        assert!(matches!(
            sig.value_description(1, "Drive"),
            Err(CANConstructionError::ValueAlreadyDescribed(label, 1, Some(name)))
                if label == "Reverse" && name == "Gear"
        ));
    }

    #[test]
    fn extended_multiplexor_ranges() {
        let ext = ExtendedMultiplexor {
            switch: "Mux".into(),
            value_ranges: vec![(1, 1), (4, 6)],
        };

        assert!(ext.contains(1));
        assert!(ext.contains(5));
        assert!(!ext.contains(3));
        assert!(!ext.contains(7));
    }
}
