//! Sort orders over rows.

use crate::row::Row;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;

/// Sort direction of one ordering part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Applies the direction to an ascending comparison result.
    #[inline]
    pub fn apply(self, ord: Ordering) -> Ordering {
        match self {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

/// One `(column, direction)` part of a [`SortOrder`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderPart {
    pub column: String,
    pub direction: Direction,
}

/// A sequence of `(column, direction)` pairs.
///
/// Every order used to drive a stream must be total, which in practice means
/// it ends with the table's primary key. [`SortOrder::with_primary_key`]
/// appends whichever key columns the order does not mention yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SortOrder {
    parts: Vec<OrderPart>,
}

impl SortOrder {
    /// Creates an empty order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a part.
    pub fn then(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.parts.push(OrderPart {
            column: column.into(),
            direction,
        });
        self
    }

    /// Ascending order over the given columns.
    pub fn ascending<S: AsRef<str>>(columns: &[S]) -> Self {
        columns
            .iter()
            .fold(Self::new(), |o, c| o.then(c.as_ref(), Direction::Asc))
    }

    /// Returns the parts of this order.
    #[inline]
    pub fn parts(&self) -> &[OrderPart] {
        &self.parts
    }

    /// Returns the number of parts.
    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if there are no parts.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns the column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.column.as_str())
    }

    /// Returns true if the order mentions `column`.
    pub fn mentions(&self, column: &str) -> bool {
        self.parts.iter().any(|p| p.column == column)
    }

    /// Appends ascending parts for every primary-key column not already present.
    pub fn with_primary_key<S: AsRef<str>>(mut self, primary_key: &[S]) -> Self {
        for pk in primary_key {
            if !self.mentions(pk.as_ref()) {
                self = self.then(pk.as_ref(), Direction::Asc);
            }
        }
        self
    }

    /// Returns the same columns with every direction flipped.
    pub fn reversed(&self) -> Self {
        SortOrder {
            parts: self
                .parts
                .iter()
                .map(|p| OrderPart {
                    column: p.column.clone(),
                    direction: match p.direction {
                        Direction::Asc => Direction::Desc,
                        Direction::Desc => Direction::Asc,
                    },
                })
                .collect(),
        }
    }

    /// Compares two rows under this order.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for part in &self.parts {
            let ord = part
                .direction
                .apply(a.get(&part.column).cmp(b.get(&part.column)));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}
