//! Pure verification of the team chain and the per-member audit log chains.
//!
//! [`verify_genesis`] and [`verify_block`] fold one signed block into the
//! [`TeamState`] derived from every block before it, or return a
//! [`Rejection`]. Nothing here touches storage or the network: the caller
//! decides whether to commit the returned state.
//!
//! Each non-genesis block is checked in a fixed order: already applied,
//! decoding, protocol version, body kind, signer authorization, chain link,
//! signature, then the operation's own rules.

mod error;
mod log_chain;
mod main_chain;
mod state;

#[cfg(test)]
mod tests;

pub use error::Rejection;
pub use log_chain::{LogChainState, verify_log_block};
pub use main_chain::{Applied, verify_block, verify_chain, verify_genesis};
pub use state::TeamState;
