//! Client-side sync engine for the team hash chain.
//!
//! [`TeamService`] is the context object a caller builds once per identity:
//! it owns the [`TeamIdentity`], a [`ChainStore`](teamchain_store::ChainStore)
//! handle and a [`TeamServer`] transport, and exposes the chain operations
//! (pull, push, invite acceptance, audit-log shipping) as blocking calls.
//!
//! Chain-mutating calls are serialized per identity by a lock taken once at
//! the public entry point. Fork resolution is optimistic: build on the local
//! tip, post, and on a lost race pull the winner and retry, up to
//! [`SyncConfig::retries`] times.
//!
//! The server is only a relay. Every block it returns is verified before it
//! is committed, and a pull that ends without reaching the identity's
//! checkpoint fails instead of reporting a shortened history.

mod config;
mod error;
mod http;
mod identity;
mod logs;
mod memory;
mod operation;
mod requests;
mod server;
mod service;

#[cfg(test)]
mod tests;

pub use config::{SyncConfig, SyncLocks};
pub use error::SyncError;
pub use http::HttpTeamServer;
pub use identity::{MemberProfile, TeamIdentity};
pub use memory::MemoryTeamServer;
pub use operation::{OperationResponse, RequestableOperation, ResponseData};
pub use requests::fetch_full_invite;
pub use server::{Endpoint, KnownServerError, ServerError, ServerResponse};
pub use service::TeamService;

/// Transport to the team server.
///
/// A single blocking round trip: `body` is sent to `endpoint` and the
/// `success` payload of the reply is returned. Implementations enforce
/// their own fixed timeout. This trait allows substituting an in-process
/// relay in tests.
pub trait TeamServer: Send + Sync {
    fn send_sync(
        &self,
        endpoint: Endpoint,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ServerError>;
}
