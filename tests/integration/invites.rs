//! Integration test: invitations.
//!
//! Direct and link-based invitations driven through the sync engine, and
//! forged invitations that no party may accept.

use std::sync::Arc;

use teamchain_integration_tests::{IntegrationTeam, test_key};
use teamchain_sync::{Endpoint, RequestableOperation, SyncError, TeamServer};
use teamchain_types::{
    Block, Body, DirectInvitation, Invitation, MainChain, Operation, Restriction, public_key,
    sign_body,
};
use teamchain_verify::{Rejection, verify_block, verify_chain};

/// A direct invitation is consumed by its acceptance and every member ends
/// up with the same state.
#[test]
fn test_direct_invite_end_to_end() {
    let team = IntegrationTeam::new("acme");
    let bob = team.join_direct(2, "bob@example.com");

    let state = team.admin.get_verified_team_updates().unwrap();
    let bob_key = bob.identity().public_key();
    assert!(state.is_member(&bob_key));
    assert!(!state.is_admin(&bob_key));
    assert_eq!(state.members[&bob_key].email, "bob@example.com");
    assert!(state.invitations.is_empty());
    assert_eq!(bob.team_state().unwrap().unwrap(), state);
}

/// A domain-restricted link admits every address at that domain and stays
/// open after use.
#[test]
fn test_invite_link_admits_domain() {
    let team = IntegrationTeam::new("acme");
    let link = team.invite_link(Restriction::Domain("example.com".to_string()));
    assert!(link.starts_with("teamchain://"));

    let carol = team.join_by_link(&link, 3, "carol@example.com").unwrap();
    let dan = team.join_by_link(&link, 4, "dan@example.com").unwrap();

    let state = team.admin.get_verified_team_updates().unwrap();
    assert!(state.is_member(&carol.identity().public_key()));
    assert!(state.is_member(&dan.identity().public_key()));
    assert_eq!(state.invitations.len(), 1);
    assert_eq!(dan.team_state().unwrap().unwrap(), state);
}

/// An address outside the restriction is refused before anything is posted.
#[test]
fn test_invite_link_refuses_other_domain() {
    let team = IntegrationTeam::new("acme");
    let link = team.invite_link(Restriction::Domain("example.com".to_string()));
    let before = team.server.main_chain(&team.team_key()).len();

    let err = team.join_by_link(&link, 5, "eve@evil.com").err().unwrap();
    assert!(matches!(
        err,
        SyncError::Rejected(Rejection::UnknownAcceptBlockPublicKey)
    ));
    assert_eq!(team.server.main_chain(&team.team_key()).len(), before);
}

/// Closing invitations makes an issued link useless.
#[test]
fn test_closed_invitations_refuse_links() {
    let team = IntegrationTeam::new("acme");
    let link = team.invite_link(Restriction::Emails(vec!["carol@example.com".to_string()]));
    team.admin
        .append_to_main_chain(RequestableOperation::CloseInvitations)
        .unwrap();
    let before = team.server.main_chain(&team.team_key()).len();

    assert!(team.join_by_link(&link, 3, "carol@example.com").is_err());
    assert_eq!(team.server.main_chain(&team.team_key()).len(), before);
}

/// Alice, admin of team A, forges a direct invitation for eve on top of
/// team B's tip. B's admin, eve and A's admin all reject it, and the relay
/// refuses to host it.
#[test]
fn test_invite_hijack_rejected_by_every_party() {
    let team_a = IntegrationTeam::new("acme");
    let team_b = IntegrationTeam::on_server(Arc::clone(&team_a.server), 2, "carol@globex.com", "globex");

    let b_tip = team_b.admin.store().last_block_hash().unwrap().unwrap();
    let forged = sign_body(
        Body::Main(MainChain::Append(Block {
            last_block_hash: b_tip,
            operation: Operation::Invite(Invitation::Direct(DirectInvitation {
                public_key: public_key(&test_key(7)),
                email: "eve@evil.com".to_string(),
            })),
        })),
        &test_key(1),
    )
    .unwrap();

    // The relay verifies against B and refuses.
    let body = serde_json::to_value(&forged).unwrap();
    assert!(team_a.server.send_sync(Endpoint::SigChain, &body).is_err());

    // A compromised relay serves it anyway; B's admin rejects the pull and
    // keeps its tip.
    team_a.server.inject_block(&team_b.team_key(), forged.clone());
    let err = team_b.admin.get_verified_team_updates().unwrap_err();
    assert!(matches!(err, SyncError::Rejected(Rejection::SignerNotAdmin)));
    assert_eq!(team_b.admin.store().last_block_hash().unwrap(), Some(b_tip));

    // eve replaying the history she was shown.
    let presented = team_a.server.main_chain(&team_b.team_key());
    let (index, reason) = verify_chain(&team_b.team_key(), &presented).unwrap_err();
    assert_eq!(index, presented.len() - 1);
    assert_eq!(reason, Rejection::SignerNotAdmin);

    // A's admin: alice may invite in A, but the block links into B.
    let a_state = team_a.admin.team_state().unwrap().unwrap();
    assert!(matches!(
        verify_block(&forged, &a_state),
        Err(Rejection::BadBlockHash { .. })
    ));
}

/// An acceptance made for one team cannot be posted into another.
#[test]
fn test_acceptance_cannot_cross_teams() {
    let team_a = IntegrationTeam::new("acme");
    let team_b = IntegrationTeam::on_server(Arc::clone(&team_a.server), 2, "carol@globex.com", "globex");
    let eve = team_b.join_direct(7, "eve@evil.com");

    let a_state = team_a.admin.team_state().unwrap().unwrap();
    let b_blocks = team_b.server.main_chain(&team_b.team_key());
    let acceptance = b_blocks.last().unwrap();
    assert!(verify_block(acceptance, &a_state).is_err());
    assert!(!a_state.is_member(&eve.identity().public_key()));
}
