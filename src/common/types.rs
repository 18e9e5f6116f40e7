//! Value types shared by the index and the base relation.

use std::fmt;

/// Indexed attribute value.
///
/// Slots are tracked with explicit counts rather than sentinel keys, so
/// every `i32`, including `-1`, is a valid key.
pub type Key = i32;

/// Location of a tuple in the base relation.
///
/// # Example
/// ```
/// use bplus_index::RecordId;
///
/// let rid = RecordId::new(3, 7);
/// assert_eq!(rid.to_string(), "(3, 7)");
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    /// Heap page holding the tuple.
    pub page_number: u32,
    /// Slot within that page.
    pub slot_number: u16,
}

impl RecordId {
    /// Encoded size in bytes.
    pub const SIZE: usize = 6;

    pub fn new(page_number: u32, slot_number: u16) -> Self {
        Self {
            page_number,
            slot_number,
        }
    }

    pub(crate) fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_number.to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot_number.to_le_bytes());
    }

    pub(crate) fn from_bytes(buf: &[u8]) -> Self {
        Self {
            page_number: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            slot_number: u16::from_le_bytes([buf[4], buf[5]]),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_number, self.slot_number)
    }
}

/// Type tag of the indexed attribute.
///
/// Only `Integer` keys are implemented; the other tags are accepted in
/// metadata so that files stay comparable but cannot be used to build an
/// index.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Integer = 0,
    Double = 1,
    String = 2,
}

impl AttrType {
    /// Convert from the stored tag, `None` for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(AttrType::Integer),
            1 => Some(AttrType::Double),
            2 => Some(AttrType::String),
            _ => None,
        }
    }

    /// Number of tuple bytes the attribute occupies.
    pub fn width(&self) -> usize {
        match self {
            AttrType::Integer => 4,
            AttrType::Double => 8,
            AttrType::String => 10,
        }
    }
}

/// Comparison operator for a scan bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Greater than or equal to.
    Gte,
    /// Greater than.
    Gt,
}

impl Operator {
    /// Whether `key` satisfies `key <op> bound`.
    #[inline]
    pub fn admits(&self, key: Key, bound: Key) -> bool {
        match self {
            Operator::Lt => key < bound,
            Operator::Lte => key <= bound,
            Operator::Gte => key >= bound,
            Operator::Gt => key > bound,
        }
    }

    /// Whether the operator can bound a range from below.
    pub fn is_lower(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte)
    }

    /// Whether the operator can bound a range from above.
    pub fn is_upper(&self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte)
    }
}
