//! OpenCAN DBC network model, DBC text translation and signal codec.

#![forbid(unsafe_code)]

mod value;
pub use value::*;

mod attribute;
pub use attribute::*;

mod signal;
pub use signal::*;

mod codec;
pub use codec::*;

mod message;
pub use message::*;

mod node;
pub use node::*;

mod value_table;
pub use value_table::*;

mod signal_type;
pub use signal_type::*;

mod environment;
pub use environment::*;

mod network;
pub use network::*;

mod error;
pub use error::*;

mod display;

pub mod translation;
pub use translation::DbcTranslator;
pub use translation::TranslationFromOpencan;
pub use translation::TranslationToOpencan;
pub use translation::{ParseReport, ParseWarning, RecordKind, WarningKind};
