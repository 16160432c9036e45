//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod identity;
mod item;
pub mod round;
mod transaction;
pub mod result;

pub use account::Account;
pub use identity::Identity;
pub use item::{OwnedItem, StoreItem};
pub use round::{Multiplier, RoundPhase, TapRound};
pub use transaction::{EntryKind, Transaction, AMOUNT_SCALE};
