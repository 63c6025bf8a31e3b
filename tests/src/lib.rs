//! Shared test harness for teamchain integration tests.
//!
//! Provides [`IntegrationTeam`]: a team founded on an in-memory relay, with
//! helpers to add devices and members the way real clients would (through
//! the sync engine, never by writing to a store directly).

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use teamchain_store::ChainStore;
use teamchain_sync::{
    MemberProfile, MemoryTeamServer, RequestableOperation, ResponseData, SyncError, TeamIdentity,
    TeamService, fetch_full_invite,
};
use teamchain_types::{DirectInvitation, JoinTeamInvite, PublicKey, Restriction, public_key};

/// Deterministic signing key.
pub fn test_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

/// Install a test-friendly subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A copy of the identity `service` acts as.
pub fn same_identity(service: &TeamService) -> TeamIdentity {
    let identity = service.identity();
    TeamIdentity::new_member(
        identity.signing_key.clone(),
        identity.profile.clone(),
        identity.initial_team_public_key,
        identity.checkpoint,
    )
}

/// One team on a relay, seen through its founding admin.
pub struct IntegrationTeam {
    pub server: Arc<MemoryTeamServer>,
    pub admin: TeamService,
}

impl IntegrationTeam {
    /// Found a team on a fresh relay; the admin's key seed is 1.
    pub fn new(name: &str) -> Self {
        Self::on_server(Arc::new(MemoryTeamServer::new()), 1, "alice@example.com", name)
    }

    /// Found another team on an existing relay.
    pub fn on_server(server: Arc<MemoryTeamServer>, seed: u8, email: &str, name: &str) -> Self {
        init_tracing();
        let (identity, genesis) =
            TeamIdentity::new_admin(test_key(seed), MemberProfile::new(email), name)
                .expect("build genesis");
        let admin = TeamService::new(identity, ChainStore::in_memory(), server.clone());
        admin.create_team(&genesis).expect("create team");
        Self { server, admin }
    }

    pub fn team_key(&self) -> PublicKey {
        self.admin.identity().initial_team_public_key
    }

    /// Another device of `of`'s identity with an empty store.
    pub fn device(&self, of: &TeamService) -> TeamService {
        TeamService::new(same_identity(of), ChainStore::in_memory(), self.server.clone())
    }

    /// Same identity and store as `of`, as if a second process opened it.
    pub fn process(&self, of: &TeamService) -> TeamService {
        TeamService::new(same_identity(of), of.store().clone(), self.server.clone())
            .with_config(of.config().clone())
    }

    /// Directly invite key `seed` and accept with it.
    pub fn join_direct(&self, seed: u8, email: &str) -> TeamService {
        let key = test_key(seed);
        let posted = self
            .admin
            .append_to_main_chain(RequestableOperation::DirectInvite(DirectInvitation {
                public_key: public_key(&key),
                email: email.to_string(),
            }))
            .expect("post direct invitation");
        let identity = TeamIdentity::new_member(
            key,
            MemberProfile::new(email),
            self.team_key(),
            posted.posted_block_hash,
        );
        let member = TeamService::new(identity, ChainStore::in_memory(), self.server.clone());
        member.accept_direct_invite().expect("accept direct invitation");
        member
    }

    /// Post an indirect invitation and return its link.
    pub fn invite_link(&self, restriction: Restriction) -> String {
        let posted = self
            .admin
            .append_to_main_chain(RequestableOperation::IndirectInvite(restriction))
            .expect("post indirect invitation");
        match posted.data {
            Some(ResponseData::InviteLink(link)) => link,
            None => panic!("indirect invitation returned no link"),
        }
    }

    /// Resolve `link` and join with key `seed`, as a brand new client would.
    pub fn join_by_link(&self, link: &str, seed: u8, email: &str) -> Result<TeamService, SyncError> {
        let invite = JoinTeamInvite::parse(link)?;
        let secret = fetch_full_invite(&*self.server, &invite)?;
        let identity = TeamIdentity::new_member(
            test_key(seed),
            MemberProfile::new(email),
            secret.initial_team_public_key,
            secret.last_block_hash,
        );
        let member = TeamService::new(identity, ChainStore::in_memory(), self.server.clone());
        member.accept_invite(&secret)?;
        Ok(member)
    }
}
