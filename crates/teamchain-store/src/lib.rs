//! Transactional, append-only store for accepted chain blocks.
//!
//! A [`ChainStore`] holds one identity's view of its team: the accepted
//! main-chain blocks in order, the member's own audit log chain, the
//! derived [`TeamState`](teamchain_verify::TeamState), and the queue of
//! audit records waiting to be shipped.
//!
//! All writes go through a [`ChainTransaction`]. A transaction works on a
//! snapshot of the committed head and is checked against the live head at
//! commit: if another handle moved a tip the transaction touched, the
//! commit fails with [`StoreError::Conflict`] and nothing is written.
//! Dropping a transaction without committing discards it.
//!
//! Blocks are written before the single head record that makes them
//! visible, so a crash mid-commit leaves the previous head intact.

mod error;
mod record;
mod store;
mod transaction;

#[cfg(test)]
mod tests;

pub use error::StoreError;
pub use record::AuditRecord;
pub use store::ChainStore;
pub use transaction::ChainTransaction;
