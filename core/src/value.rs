use serde::{Deserialize, Serialize};

/// Bit ordering of a signal within its message payload.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Motorola ordering, `@0` in DBC.
    BigEndian,
    /// Intel ordering, `@1` in DBC.
    #[default]
    LittleEndian,
}

impl ByteOrder {
    pub(crate) fn from_dbc(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::BigEndian),
            '1' => Some(Self::LittleEndian),
            _ => None,
        }
    }

    pub(crate) const fn dbc_char(self) -> char {
        match self {
            Self::BigEndian => '0',
            Self::LittleEndian => '1',
        }
    }
}

/// Signedness of a signal's raw value.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ValueType {
    #[default]
    Unsigned,
    /// Two's complement.
    Signed,
}

impl ValueType {
    pub(crate) fn from_dbc(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Unsigned),
            '-' => Some(Self::Signed),
            _ => None,
        }
    }

    pub(crate) const fn dbc_char(self) -> char {
        match self {
            Self::Unsigned => '+',
            Self::Signed => '-',
        }
    }
}

/// Extended value type of a signal, declared by `SIG_VALTYPE_`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExtendedValueType {
    /// No `SIG_VALTYPE_` record; the signal is a plain integer.
    #[default]
    Undefined,
    Integer,
    /// IEEE 754 single precision, 32 bits.
    Float,
    /// IEEE 754 double precision, 64 bits.
    Double,
}

impl ExtendedValueType {
    pub(crate) fn from_dbc(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Integer),
            1 => Some(Self::Float),
            2 => Some(Self::Double),
            _ => None,
        }
    }

    /// Code written after `SIG_VALTYPE_`, `None` for [`Undefined`](Self::Undefined).
    pub(crate) const fn dbc_code(self) -> Option<u32> {
        match self {
            Self::Undefined => None,
            Self::Integer => Some(0),
            Self::Float => Some(1),
            Self::Double => Some(2),
        }
    }
}

/// Multiplexing role of a signal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Multiplexor {
    #[default]
    None,
    /// The multiplexor switch of its message (`M`).
    Switch,
    /// Valid only when the switch carries the given value (`m<n>`).
    Multiplexed(u32),
    /// Multiplexed by the given value and itself a switch for other signals
    /// (`m<n>M`, extended multiplexing).
    MultiplexedSwitch(u32),
}

impl Multiplexor {
    /// Parse the multiplexor indicator token of a `SG_` record.
    pub(crate) fn from_dbc(token: &str) -> Option<Self> {
        if token == "M" {
            return Some(Self::Switch);
        }

        let rest = token.strip_prefix('m')?;
        match rest.strip_suffix('M') {
            Some(value) => value.parse().ok().map(Self::MultiplexedSwitch),
            None => rest.parse().ok().map(Self::Multiplexed),
        }
    }

    /// Indicator token, empty for [`None`](Self::None).
    pub(crate) fn dbc_token(self) -> String {
        match self {
            Self::None => String::new(),
            Self::Switch => "M".into(),
            Self::Multiplexed(v) => format!("m{v}"),
            Self::MultiplexedSwitch(v) => format!("m{v}M"),
        }
    }

    /// Switch value this signal is multiplexed on, if any.
    pub const fn switch_value(self) -> Option<u32> {
        match self {
            Self::Multiplexed(v) | Self::MultiplexedSwitch(v) => Some(v),
            Self::None | Self::Switch => None,
        }
    }

    pub const fn is_switch(self) -> bool {
        matches!(self, Self::Switch | Self::MultiplexedSwitch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplexor_tokens() {
        assert_eq!(Multiplexor::from_dbc("M"), Some(Multiplexor::Switch));
        assert_eq!(Multiplexor::from_dbc("m3"), Some(Multiplexor::Multiplexed(3)));
        assert_eq!(
            Multiplexor::from_dbc("m12M"),
            Some(Multiplexor::MultiplexedSwitch(12))
        );
        assert_eq!(Multiplexor::from_dbc("m"), None);
        assert_eq!(Multiplexor::from_dbc("x1"), None);

        for mux in [
            Multiplexor::Switch,
            Multiplexor::Multiplexed(7),
            Multiplexor::MultiplexedSwitch(2),
        ] {
            assert_eq!(Multiplexor::from_dbc(&mux.dbc_token()), Some(mux));
        }
        assert_eq!(Multiplexor::None.dbc_token(), "");
    }

    #[test]
    fn extended_value_type_codes() {
        assert_eq!(ExtendedValueType::from_dbc(1), Some(ExtendedValueType::Float));
        assert_eq!(ExtendedValueType::from_dbc(3), None);
        assert_eq!(ExtendedValueType::Undefined.dbc_code(), None);
        assert_eq!(ExtendedValueType::Double.dbc_code(), Some(2));
    }
}
