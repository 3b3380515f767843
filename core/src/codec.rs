//! Bit-level packing of signal values into message payloads, and the linear
//! raw ↔ physical conversion.
//!
//! All functions here take the signal layout as a precondition: every bit the
//! layout addresses must exist in the payload (see [`Signal::check_layout`]),
//! and `bit_size` must not exceed 64. Violating that panics on the bit index.

use bitvec::prelude::*;

use crate::error::*;
use crate::signal::*;
use crate::value::*;

/// Iterator over `(payload_bit, value_bit)` pairs of a signal layout.
///
/// Payload bits are numbered `byte * 8 + bit`, bit 0 being the least
/// significant bit of its byte. Value bits are numbered from the least
/// significant bit of the raw value.
#[derive(Clone, Debug)]
pub struct BitPositions {
    byte_order: ByteOrder,
    src: u32,
    dst: u32,
    remaining: u32,
}

impl Iterator for BitPositions {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let item = (self.src, self.dst);
        self.remaining -= 1;

        match self.byte_order {
            ByteOrder::BigEndian => {
                // MSB-first within a byte: after bit 0 continue at bit 7 of the next byte
                if self.src % 8 == 0 {
                    self.src = self.src.saturating_add(15);
                } else {
                    self.src -= 1;
                }
                self.dst = self.dst.saturating_sub(1);
            }
            ByteOrder::LittleEndian => {
                self.src = self.src.saturating_add(1);
                self.dst += 1;
            }
        }

        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl ExactSizeIterator for BitPositions {}

impl Signal {
    /// Walk this signal's bits, starting at [`start_bit`](Signal::start_bit).
    pub fn bit_positions(&self) -> BitPositions {
        BitPositions {
            byte_order: self.byte_order,
            src: self.start_bit,
            dst: match self.byte_order {
                ByteOrder::BigEndian => self.bit_size.saturating_sub(1),
                ByteOrder::LittleEndian => 0,
            },
            remaining: self.bit_size,
        }
    }

    /// Check that this signal is a normal signal whose bits all lie within a
    /// message of `message_size` bytes.
    pub fn check_layout(&self, message_size: u32) -> Result<(), CANConstructionError> {
        self.check_width()?;

        let payload_bits = message_size.saturating_mul(8);
        if self.start_bit >= payload_bits {
            return Err(CANConstructionError::SignalWillNotFitInMessage(
                self.name.clone(),
                self.start_bit,
                message_size,
            ));
        }
        if let Some((bit, _)) = self.bit_positions().find(|&(bit, _)| bit >= payload_bits) {
            return Err(CANConstructionError::SignalWillNotFitInMessage(
                self.name.clone(),
                bit,
                message_size,
            ));
        }

        Ok(())
    }

    /// Read this signal's raw value out of `payload`.
    ///
    /// Signed values are sign-extended to 64 bits; a zero `bit_size` yields 0
    /// without touching the payload.
    ///
    /// # Panics
    ///
    /// If the layout addresses a byte past the end of `payload`.
    pub fn decode(&self, payload: &[u8]) -> u64 {
        let bits = payload.view_bits::<Lsb0>();
        let mut raw = 0u64;

        for (src, dst) in self.bit_positions() {
            if bits[src as usize] {
                raw |= 1 << dst;
            }
        }

        if self.value_type == ValueType::Signed
            && (1..MAX_SIGNAL_WIDTH).contains(&self.bit_size)
            && raw & (1 << (self.bit_size - 1)) != 0
        {
            raw |= u64::MAX << self.bit_size;
        }

        raw
    }

    /// Write the low [`bit_size`](Signal::bit_size) bits of `raw` into
    /// `payload`, leaving all other payload bits untouched.
    ///
    /// # Panics
    ///
    /// If the layout addresses a byte past the end of `payload`.
    pub fn encode(&self, payload: &mut [u8], raw: u64) {
        let bits = payload.view_bits_mut::<Lsb0>();

        for (src, dst) in self.bit_positions() {
            bits.set(src as usize, raw & (1 << dst) != 0);
        }
    }

    pub fn raw_to_physical_value(&self, raw: f64) -> f64 {
        raw * self.factor + self.offset
    }

    /// Inverse of [`raw_to_physical_value`](Self::raw_to_physical_value).
    /// The result is undefined for a zero `factor`.
    pub fn physical_to_raw_value(&self, physical: f64) -> f64 {
        (physical - self.offset) / self.factor
    }

    /// Smallest raw value representable by this signal.
    ///
    /// For float and double signals this is the smallest positive normal
    /// number of the type, not the most negative one. Attribute defaults
    /// written by existing tools rely on that.
    pub fn minimum_raw_value(&self) -> f64 {
        match self.extended_value_type {
            ExtendedValueType::Undefined | ExtendedValueType::Integer => {
                match (self.value_type, self.bit_size) {
                    (_, 0) | (ValueType::Unsigned, _) => 0.0,
                    (ValueType::Signed, n) => -(2f64.powi(n as i32 - 1)),
                }
            }
            ExtendedValueType::Float => f32::MIN_POSITIVE as f64,
            ExtendedValueType::Double => f64::MIN_POSITIVE,
        }
    }

    /// Largest raw value representable by this signal.
    pub fn maximum_raw_value(&self) -> f64 {
        match self.extended_value_type {
            ExtendedValueType::Undefined | ExtendedValueType::Integer => {
                match (self.value_type, self.bit_size) {
                    (_, 0) => 0.0,
                    (ValueType::Signed, n) => 2f64.powi(n as i32 - 1) - 1.0,
                    (ValueType::Unsigned, n) => 2f64.powi(n as i32) - 1.0,
                }
            }
            ExtendedValueType::Float => f32::MAX as f64,
            ExtendedValueType::Double => f64::MAX,
        }
    }

    /// Interpret a decoded raw word as a number, honoring signedness and the
    /// extended value type.
    pub fn raw_to_number(&self, raw: u64) -> f64 {
        match self.extended_value_type {
            ExtendedValueType::Float => f32::from_bits(raw as u32) as f64,
            ExtendedValueType::Double => f64::from_bits(raw),
            ExtendedValueType::Undefined | ExtendedValueType::Integer => match self.value_type {
                ValueType::Signed => raw as i64 as f64,
                ValueType::Unsigned => raw as f64,
            },
        }
    }

    /// Inverse of [`raw_to_number`](Self::raw_to_number). Integer signals
    /// round to the nearest value.
    pub fn number_to_raw(&self, number: f64) -> u64 {
        match self.extended_value_type {
            ExtendedValueType::Float => (number as f32).to_bits() as u64,
            ExtendedValueType::Double => number.to_bits(),
            ExtendedValueType::Undefined | ExtendedValueType::Integer => match self.value_type {
                ValueType::Signed => number.round() as i64 as u64,
                ValueType::Unsigned => number.round() as u64,
            },
        }
    }

    /// Decode straight to the physical value.
    pub fn decode_physical(&self, payload: &[u8]) -> f64 {
        self.raw_to_physical_value(self.raw_to_number(self.decode(payload)))
    }

    /// Encode a physical value.
    pub fn encode_physical(&self, payload: &mut [u8], physical: f64) {
        let raw = self.number_to_raw(self.physical_to_raw_value(physical));
        self.encode(payload, raw);
    }

    /// Declared physical minimum, or the one implied by the raw range when
    /// neither bound is declared.
    pub fn physical_minimum(&self) -> f64 {
        if self.has_declared_range() {
            return self.minimum;
        }

        let (a, b) = self.implied_physical_range();
        a.min(b)
    }

    /// Declared physical maximum, or the one implied by the raw range when
    /// neither bound is declared.
    pub fn physical_maximum(&self) -> f64 {
        if self.has_declared_range() {
            return self.maximum;
        }

        let (a, b) = self.implied_physical_range();
        a.max(b)
    }

    fn has_declared_range(&self) -> bool {
        self.minimum != 0.0 || self.maximum != 0.0
    }

    // a negative factor flips the bounds, callers sort
    fn implied_physical_range(&self) -> (f64, f64) {
        (
            self.raw_to_physical_value(self.minimum_raw_value()),
            self.raw_to_physical_value(self.maximum_raw_value()),
        )
    }
}
