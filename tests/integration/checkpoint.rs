//! Integration test: checkpoint guard.
//!
//! A pull only succeeds once the local chain contains the identity's trusted
//! checkpoint, so a server that omits history is detected.

use teamchain_integration_tests::{IntegrationTeam, same_identity, test_key};
use teamchain_store::ChainStore;
use teamchain_sync::{MemberProfile, RequestableOperation, SyncError, TeamIdentity, TeamService};
use teamchain_types::{BlockHash, DirectInvitation, TeamInfo, public_key};

fn rename(service: &TeamService, name: &str) -> BlockHash {
    service
        .append_to_main_chain(RequestableOperation::SetTeamInfo(TeamInfo {
            name: name.to_string(),
        }))
        .unwrap()
        .posted_block_hash
}

/// Nothing new on the server and the checkpoint is already local: the pull
/// succeeds without changing anything.
#[test]
fn test_checkpoint_reached_returns_unchanged_state() {
    let team = IntegrationTeam::new("acme");
    rename(&team.admin, "acme-2");
    let before = team.admin.team_state().unwrap().unwrap();

    let after = team.admin.get_verified_team_updates().unwrap();
    assert_eq!(after, before);
}

/// A checkpoint the server never served fails every pull, even one that
/// returns the full chain.
#[test]
fn test_unknown_checkpoint_is_not_reached() {
    let team = IntegrationTeam::new("acme");
    rename(&team.admin, "acme-2");

    let mut identity = same_identity(&team.admin);
    identity.checkpoint = BlockHash::from([9; 32]);
    let laptop = TeamService::new(identity, ChainStore::in_memory(), team.server.clone());

    let err = laptop.get_verified_team_updates().unwrap_err();
    assert!(matches!(err, SyncError::CheckpointNotReached(hash) if hash == BlockHash::from([9; 32])));
}

/// An invitee trusts the invitation block. A server hiding it cannot make
/// the invitee join on a shorter history.
#[test]
fn test_invitee_waits_for_invitation_block() {
    let team = IntegrationTeam::new("acme");
    let key = test_key(2);
    let invite = team
        .admin
        .append_to_main_chain(RequestableOperation::DirectInvite(DirectInvitation {
            public_key: public_key(&key),
            email: "bob@example.com".to_string(),
        }))
        .unwrap();
    let identity = TeamIdentity::new_member(
        key,
        MemberProfile::new("bob@example.com"),
        team.team_key(),
        invite.posted_block_hash,
    );
    let bob = TeamService::new(identity, ChainStore::in_memory(), team.server.clone());

    team.server.withhold_blocks_after(Some(1));
    let err = bob.accept_direct_invite().unwrap_err();
    assert!(matches!(err, SyncError::CheckpointNotReached(hash) if hash == invite.posted_block_hash));
    assert_eq!(team.server.main_chain(&team.team_key()).len(), 2);

    team.server.withhold_blocks_after(None);
    let state = bob.accept_direct_invite().unwrap();
    assert!(state.is_member(&bob.identity().public_key()));
}

/// The checkpoint is found in a persistent store after a restart.
#[test]
fn test_checkpoint_survives_restart() {
    let team = IntegrationTeam::new("acme");
    let tip = rename(&team.admin, "acme-2");
    let dir = tempfile::tempdir().unwrap();

    let mut identity = same_identity(&team.admin);
    identity.checkpoint = tip;
    {
        let store = ChainStore::open(dir.path()).unwrap();
        let laptop = TeamService::new(identity, store, team.server.clone());
        laptop.get_verified_team_updates().unwrap();
    }

    let mut identity = same_identity(&team.admin);
    identity.checkpoint = tip;
    let store = ChainStore::open(dir.path()).unwrap();
    assert_eq!(store.last_block_hash().unwrap(), Some(tip));
    let laptop = TeamService::new(identity, store, team.server.clone());
    let state = laptop.get_verified_team_updates().unwrap();
    assert_eq!(state, team.admin.team_state().unwrap().unwrap());
}
