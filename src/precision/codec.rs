//! Fixed-point split of floating values
//!
//! A value is stored as its whole part plus a fractional residue scaled by
//! `10^level`. Residues live in a [`ResidueTable`] owned by the caller and
//! are referenced by index; values whose fraction is zero at the chosen
//! level never occupy a slot.

use crate::config::MAX_PRECISION_LEVEL;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Largest magnitude that encodes faithfully
///
/// Chosen so `integer_part * 10^4 + residue` still fits an `i64`; larger
/// finite values are clamped to it.
pub const MAX_ENCODABLE_MAGNITUDE: f64 = 9.0e14;

/// Largest whole part an encoding may carry
pub const MAX_INTEGER_PART: i64 = 900_000_000_000_000;

/// Names for each precision level, index = level
pub const PRECISION_NAMES: [&str; 5] = ["INT", "DEC1", "DEC2", "DEC3", "DEC4"];

/// Display name of a precision level
pub fn precision_name(level: u8) -> &'static str {
    PRECISION_NAMES[level.min(MAX_PRECISION_LEVEL) as usize]
}

/// `10^level`, with the level clamped to the supported range
pub fn scale_for(level: u8) -> i64 {
    10_i64.pow(level.min(MAX_PRECISION_LEVEL) as u32)
}

/// Index of a residue slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidueRef(u32);

impl ResidueRef {
    /// Slot index
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// Arena of scaled fractional residues
///
/// Released slots go on a free list and are handed out again before the
/// arena grows.
#[derive(Debug, Clone, Default)]
pub struct ResidueTable {
    slots: Vec<Option<i64>>,
    free: Vec<u32>,
}

impl ResidueTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a residue and return its slot
    pub fn alloc(&mut self, residue: i64) -> ResidueRef {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(residue);
            return ResidueRef(index);
        }
        self.slots.push(Some(residue));
        ResidueRef((self.slots.len() - 1) as u32)
    }

    /// Residue in a live slot
    pub fn get(&self, slot: ResidueRef) -> Option<i64> {
        self.slots.get(slot.0 as usize).copied().flatten()
    }

    /// Overwrite a live slot; returns false if the slot is not live
    pub fn set(&mut self, slot: ResidueRef, residue: i64) -> bool {
        match self.slots.get_mut(slot.0 as usize) {
            Some(entry @ Some(_)) => {
                *entry = Some(residue);
                true
            }
            _ => false,
        }
    }

    /// Free a slot, returning what it held
    pub fn release(&mut self, slot: ResidueRef) -> Option<i64> {
        let previous = self.slots.get_mut(slot.0 as usize)?.take();
        if previous.is_some() {
            self.free.push(slot.0);
        }
        previous
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether no slot is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every slot
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

/// A quantized value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedValue {
    /// Whole part, truncated toward zero
    pub integer_part: i64,
    /// Residue slot, present only for a non-zero fraction
    pub residue: Option<ResidueRef>,
    /// Precision level 0-4
    pub precision_level: u8,
    /// Logical layer the level was chosen from
    pub layer: u32,
    /// Always `10^precision_level`
    pub scale: i64,
}

impl EncodedValue {
    /// Integer-only reconstruction: `integer_part * scale + residue`
    ///
    /// A missing residue slot contributes zero. `None` if the result does
    /// not fit an `i64`, which only happens for hand-built encodings.
    pub fn scaled(&self, residues: &ResidueTable) -> Option<i64> {
        let residue = self.residue.and_then(|r| residues.get(r)).unwrap_or(0);
        self.integer_part
            .checked_mul(self.scale)?
            .checked_add(residue)
    }
}

/// Split `value` into whole part and residue at `level`
///
/// An `existing` slot is reused when the new residue is non-zero and
/// released when it is zero. Non-finite input encodes as zero, and
/// magnitudes above [`MAX_ENCODABLE_MAGNITUDE`] are clamped to it.
pub fn encode_at_level(
    value: f64,
    level: u8,
    layer: u32,
    residues: &mut ResidueTable,
    existing: Option<ResidueRef>,
) -> EncodedValue {
    let level = level.min(MAX_PRECISION_LEVEL);
    let scale = scale_for(level);
    let value = if !value.is_finite() {
        warn!("Encoding non-finite value {} as 0", value);
        0.0
    } else if value.abs() > MAX_ENCODABLE_MAGNITUDE {
        warn!(
            "Value {} outside encodable range, clamped to {:e}",
            value, MAX_ENCODABLE_MAGNITUDE
        );
        value.clamp(-MAX_ENCODABLE_MAGNITUDE, MAX_ENCODABLE_MAGNITUDE)
    } else {
        value
    };

    let whole = value.trunc();
    let residue = ((value - whole) * scale as f64).round() as i64;
    let (integer_part, residue) = carry(whole as i64, residue, scale);

    EncodedValue {
        integer_part,
        residue: store_residue(residues, existing, residue),
        precision_level: level,
        layer,
        scale,
    }
}

/// Rescale an encoded value to another level, rounding the residue
pub fn requantize(
    encoded: &EncodedValue,
    level: u8,
    residues: &mut ResidueTable,
) -> EncodedValue {
    let level = level.min(MAX_PRECISION_LEVEL);
    let scale = scale_for(level);
    let old = encoded.residue.and_then(|r| residues.get(r)).unwrap_or(0);

    let residue = (old as f64 * scale as f64 / encoded.scale as f64).round() as i64;
    let (integer_part, residue) = carry(encoded.integer_part, residue, scale);

    EncodedValue {
        integer_part,
        residue: store_residue(residues, encoded.residue, residue),
        precision_level: level,
        layer: encoded.layer,
        scale,
    }
}

/// Reconstruct the value: `integer_part + residue / scale`
///
/// A missing residue slot contributes zero.
pub fn decode(encoded: &EncodedValue, residues: &ResidueTable) -> f64 {
    let residue = encoded.residue.and_then(|r| residues.get(r)).unwrap_or(0);
    encoded.integer_part as f64 + residue as f64 / encoded.scale as f64
}

// Rounding can push the residue to a full unit
fn carry(integer_part: i64, residue: i64, scale: i64) -> (i64, i64) {
    if residue.abs() >= scale {
        let sign = residue.signum();
        (integer_part.saturating_add(sign), residue - sign * scale)
    } else {
        (integer_part, residue)
    }
}

fn store_residue(
    residues: &mut ResidueTable,
    existing: Option<ResidueRef>,
    residue: i64,
) -> Option<ResidueRef> {
    match (existing, residue) {
        (Some(slot), 0) => {
            residues.release(slot);
            None
        }
        (Some(slot), r) if residues.set(slot, r) => Some(slot),
        (_, 0) => None,
        (_, r) => Some(residues.alloc(r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_precision_names() {
        assert_eq!(precision_name(0), "INT");
        assert_eq!(precision_name(4), "DEC4");
        assert_eq!(precision_name(9), "DEC4");
    }

    #[test]
    fn test_exact_value_uses_no_slot() {
        let mut table = ResidueTable::new();
        let encoded = encode_at_level(42.0, 4, 1, &mut table, None);
        assert_eq!(encoded.integer_part, 42);
        assert_eq!(encoded.residue, None);
        assert!(table.is_empty());
        assert_eq!(decode(&encoded, &table), 42.0);
    }

    #[test]
    fn test_fraction_allocates_slot() {
        let mut table = ResidueTable::new();
        let encoded = encode_at_level(3.14159, 2, 7, &mut table, None);
        assert_eq!(encoded.integer_part, 3);
        assert_eq!(encoded.scale, 100);
        assert_eq!(encoded.layer, 7);
        assert_eq!(table.get(encoded.residue.unwrap()), Some(14));
        assert_eq!(encoded.scaled(&table), Some(314));
        assert!((decode(&encoded, &table) - 3.14).abs() < 1e-12);
    }

    #[test]
    fn test_negative_values() {
        let mut table = ResidueTable::new();
        let encoded = encode_at_level(-2.75, 2, 1, &mut table, None);
        assert_eq!(encoded.integer_part, -2);
        assert_eq!(encoded.scaled(&table), Some(-275));
        assert!((decode(&encoded, &table) + 2.75).abs() < 1e-12);
    }

    #[test]
    fn test_rounding_carries_into_integer_part() {
        let mut table = ResidueTable::new();
        let encoded = encode_at_level(1.99999, 2, 1, &mut table, None);
        assert_eq!(encoded.integer_part, 2);
        assert_eq!(encoded.residue, None);
    }

    #[test]
    fn test_missing_residue_decodes_as_zero() {
        let mut table = ResidueTable::new();
        let encoded = encode_at_level(5.5, 1, 1, &mut table, None);
        table.clear();
        assert_eq!(decode(&encoded, &table), 5.0);
    }

    #[test]
    fn test_reencode_reuses_slot() {
        let mut table = ResidueTable::new();
        let first = encode_at_level(1.25, 2, 1, &mut table, None);
        let second = encode_at_level(7.5, 2, 1, &mut table, first.residue);
        assert_eq!(first.residue, second.residue);
        assert_eq!(table.len(), 1);

        let third = encode_at_level(8.0, 2, 1, &mut table, second.residue);
        assert_eq!(third.residue, None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_free_list_reuse() {
        let mut table = ResidueTable::new();
        let a = table.alloc(1);
        let b = table.alloc(2);
        assert_eq!(table.release(a), Some(1));
        assert_eq!(table.release(a), None);
        let c = table.alloc(3);
        assert_eq!(c, a);
        assert_eq!(table.get(b), Some(2));
        assert!(!table.set(ResidueRef(99), 5));
    }

    #[test]
    fn test_requantize_down_and_up() {
        let mut table = ResidueTable::new();
        let fine = encode_at_level(2.4567, 4, 1, &mut table, None);
        let coarse = requantize(&fine, 2, &mut table);
        assert_eq!(coarse.scaled(&table), Some(246));
        assert_eq!(coarse.residue, fine.residue);

        let back = requantize(&coarse, 4, &mut table);
        assert_eq!(back.scaled(&table), Some(24600));

        let whole = requantize(&back, 0, &mut table);
        assert_eq!(whole.integer_part, 2);
        assert_eq!(whole.residue, None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_non_finite_encodes_as_zero() {
        let mut table = ResidueTable::new();
        let encoded = encode_at_level(f64::NAN, 3, 1, &mut table, None);
        assert_eq!(encoded.integer_part, 0);
        assert_eq!(encoded.residue, None);
    }

    #[test]
    fn test_range_edge_keeps_fixed_point_exact() {
        let mut table = ResidueTable::new();
        let encoded = encode_at_level(899_999_999_999_999.5, 4, 1, &mut table, None);
        assert_eq!(encoded.integer_part, 899_999_999_999_999);
        assert_eq!(encoded.scaled(&table), Some(8_999_999_999_999_995_000));

        let encoded = encode_at_level(-MAX_ENCODABLE_MAGNITUDE, 4, 1, &mut table, None);
        assert_eq!(encoded.integer_part, -MAX_INTEGER_PART);
        assert_eq!(encoded.scaled(&table), Some(-MAX_INTEGER_PART * 10_000));
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let mut table = ResidueTable::new();
        let encoded = encode_at_level(1.0e20, 0, 1, &mut table, None);
        assert_eq!(encoded.integer_part, MAX_INTEGER_PART);
        assert_eq!(decode(&encoded, &table), MAX_ENCODABLE_MAGNITUDE);

        let encoded = encode_at_level(-1.0e15 - 0.5, 4, 1, &mut table, None);
        assert_eq!(encoded.integer_part, -MAX_INTEGER_PART);
        assert_eq!(encoded.residue, None);
        assert_eq!(encoded.scaled(&table), Some(-9_000_000_000_000_000_000));
    }

    #[test]
    fn test_scaled_reports_overflow() {
        let table = ResidueTable::new();
        let encoded = EncodedValue {
            integer_part: i64::MAX / 10,
            residue: None,
            precision_level: 4,
            layer: 1,
            scale: 10_000,
        };
        assert_eq!(encoded.scaled(&table), None);
    }

    proptest! {
        #[test]
        fn prop_large_values_round_trip(
            v in -MAX_ENCODABLE_MAGNITUDE..MAX_ENCODABLE_MAGNITUDE,
            level in 0u8..=4,
        ) {
            let mut table = ResidueTable::new();
            let encoded = encode_at_level(v, level, 1, &mut table, None);
            prop_assert!(encoded.scaled(&table).is_some());
            // f64 spacing at 9e14 is 0.125, so allow that on top of one step
            let bound = 1.0 / scale_for(level) as f64 + 0.125;
            prop_assert!((decode(&encoded, &table) - v).abs() <= bound);
        }

        #[test]
        fn prop_round_trip_within_one_step(v in -1.0e6f64..1.0e6, level in 0u8..=4) {
            let mut table = ResidueTable::new();
            let encoded = encode_at_level(v, level, 1, &mut table, None);
            let decoded = decode(&encoded, &table);
            let bound = 1.0 / scale_for(level) as f64;
            prop_assert!((decoded - v).abs() <= bound, "{} -> {}", v, decoded);
            prop_assert_eq!(encoded.scale, scale_for(level));
        }

        #[test]
        fn prop_representable_values_are_exact(k in -100_000_000i64..100_000_000, level in 0u8..=4) {
            let scale = scale_for(level);
            let v = k as f64 / scale as f64;
            let mut table = ResidueTable::new();
            let encoded = encode_at_level(v, level, 1, &mut table, None);
            prop_assert_eq!(encoded.scaled(&table), Some(k));
        }
    }
}
