use std::fmt;
use std::fmt::{Display, Formatter};

use indoc::writedoc;

use crate::message::*;
use crate::signal::*;
use crate::value::*;

impl Display for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let order = match self.byte_order {
            ByteOrder::BigEndian => "big-endian",
            ByteOrder::LittleEndian => "little-endian",
        };

        writedoc!(
            f,
            "
            Signal `{}`:
              -> bits: {}..+{} ({order}, {:?})
              -> scale: x{} {:+}
              -> range: [{}, {}] {}",
            self.name,
            self.start_bit,
            self.bit_size,
            self.value_type,
            self.factor,
            self.offset,
            self.physical_minimum(),
            self.physical_maximum(),
            self.unit,
        )
    }
}

impl Message {
    pub fn print_human(&self) {
        println!("{}\n", self);
        println!("**** Signals: ****\n");
        self.print_signals_human();
        println!("******************");
    }

    pub fn print_signals_human(&self) {
        for sig in self.signals.values() {
            println!("{}\n", sig);
        }
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writedoc!(
            f,
            "
            Message `{}`:
              -> id: 0x{:x}{}
              -> size: {} bytes
              -> tx: {}",
            self.name,
            self.raw_id(),
            if self.is_extended() { " (extended)" } else { "" },
            self.size,
            self.tx_node().unwrap_or("-"),
        )
    }
}
