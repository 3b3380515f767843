use std::io::BufRead;

use crate::{Message, Network, Signal};

mod tokens;

pub mod from_dbc;
pub use from_dbc::{ParseReport, ParseWarning, RecordKind, WarningKind};

pub mod to_dbc;

/// Node name standing in for "no node" in DBC files.
pub const NO_NODE: &str = "Vector__XXX";

/// Translation from `OpenCAN` to other formats (e.g. `dbc`).
pub trait TranslationFromOpencan {
    fn dump_network(net: &Network) -> String;
    fn dump_message(msg: &Message) -> String;
    fn dump_signal(sig: &Signal) -> String;
}

/// Translation from other formats (e.g. `dbc`) to OpenCAN.
pub trait TranslationToOpencan {
    type Error;

    /// Read `input` into `net`, reporting everything that had to be skipped.
    fn import_network<R: BufRead>(input: R, net: &mut Network) -> Result<ParseReport, Self::Error>;
}

/// Reads and writes the DBC text format.
///
/// Parsing is lenient: problems with individual records are collected in a
/// [`ParseReport`] and leave [`Network::successfully_parsed`] unset. Writing
/// always produces the canonical layout, so text written by
/// [`dump_network`](TranslationFromOpencan::dump_network) parses back to an
/// equal network and writes out byte for byte the same.
///
/// Canonical text is not always the text that was read. Besides layout and
/// ordering, a string environment variable declared with type `2` is written
/// as type `0` with the `0x8000` access flag, which is how the format marks
/// strings.
pub struct DbcTranslator;

impl DbcTranslator {
    /// Parse DBC text into a new network.
    pub fn parse_str(text: &str) -> Result<(Network, ParseReport), crate::DbcError> {
        let mut net = Network::new();
        let report = Self::import_network(text.as_bytes(), &mut net)?;

        Ok((net, report))
    }
}
