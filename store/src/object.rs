//! Object identity and the table-row contract.

use std::fmt;

/// Monotonic identifier a table assigns to each created object.
///
/// Ids are never reused within a table (undo restores the counter, so a
/// reverted creation gives its id back). They double as the tie-break
/// component of ordered index keys.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Upper bound for ordered range scans.
    pub const MAX: Self = Self(u64::MAX);
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An object storable in a [`crate::Table`].
///
/// `Key` is the unique lookup key (a name, a pair of names, a request
/// id); `OrderKey` drives the table's ordered scans and need not be
/// unique, the object id breaks ties.
pub trait StateObject: Clone {
    type Key: Ord + Clone;
    type OrderKey: Ord + Clone;

    fn id(&self) -> ObjectId;
    fn key(&self) -> Self::Key;
    fn order_key(&self) -> Self::OrderKey;
}
