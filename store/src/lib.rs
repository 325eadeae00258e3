//! In-memory object tables for the Amalgam chain state.
//!
//! A [`Table`] is a typed collection with a unique key index, an ordered
//! scan index and an undo stack; a [`Singleton`] is one always-present
//! value with the same undo discipline. The chain crate assembles its
//! state from these and drives their undo frames in lockstep, one frame
//! per transaction and one per block.

pub mod error;
pub mod object;
pub mod singleton;
pub mod table;

pub use error::StoreError;
pub use object::{ObjectId, StateObject};
pub use singleton::Singleton;
pub use table::Table;
