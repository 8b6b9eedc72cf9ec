//! Compact producer identifiers.
//!
//! Pending operands link to their eventual producer through a small
//! `Copy` enum rather than an allocated label like `"A0"`/`"L1"`: equality
//! (the thing the broadcast step actually needs) is a field comparison,
//! not a string compare, and no allocation happens on the per-cycle hot
//! path.

use std::fmt;

/// Which reservation-station category a `Tag::Station` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// Integer ALU station (`I` prefix).
    IntAlu,
    /// Floating-point add/subtract station (`A` prefix).
    FpAdd,
    /// Floating-point multiply/divide station (`M` prefix).
    FpMul,
}

impl Category {
    const fn prefix(self) -> char {
        match self {
            Category::IntAlu => 'I',
            Category::FpAdd => 'A',
            Category::FpMul => 'M',
        }
    }
}

/// The stable identifier of a reservation station, load buffer, or store
/// buffer. Used both as the destination tag a register's status table
/// holds, and as the pending tag an operand slot waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tag {
    /// A reservation station of the given category and index.
    Station(Category, u8),
    /// A load buffer index.
    Load(u8),
    /// A store buffer index.
    Store(u8),
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Station(category, index) => write!(f, "{}{}", category.prefix(), index),
            Tag::Load(index) => write!(f, "L{index}"),
            Tag::Store(index) => write!(f, "S{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_source_convention() {
        assert_eq!(Tag::Station(Category::FpAdd, 0).to_string(), "A0");
        assert_eq!(Tag::Station(Category::FpMul, 1).to_string(), "M1");
        assert_eq!(Tag::Station(Category::IntAlu, 2).to_string(), "I2");
        assert_eq!(Tag::Load(0).to_string(), "L0");
        assert_eq!(Tag::Store(3).to_string(), "S3");
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Tag::Station(Category::IntAlu, 1), Tag::Station(Category::IntAlu, 1));
        assert_ne!(Tag::Station(Category::IntAlu, 1), Tag::Station(Category::IntAlu, 2));
        assert_ne!(Tag::Load(1), Tag::Store(1));
    }
}
