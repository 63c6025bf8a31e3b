//! Integration test: fork convergence.
//!
//! Writers building on the same tip race for the server. Losers pull, rebuild
//! on the winner's block and retry; every writer ends on one chain.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use teamchain_integration_tests::IntegrationTeam;
use teamchain_sync::{RequestableOperation, SyncConfig, SyncLocks, TeamService};
use teamchain_types::SshHostKey;

fn pin(host: &str) -> RequestableOperation {
    RequestableOperation::PinHostKey(SshHostKey {
        host: host.to_string(),
        public_key: vec![3; 32],
    })
}

fn pinned(service: &TeamService) -> BTreeSet<String> {
    service
        .team_state()
        .unwrap()
        .unwrap()
        .pinned_hosts
        .into_iter()
        .map(|key| key.host)
        .collect()
}

/// Two admins post on the same tip. The second one to reach the server is
/// told it is not appending to the main chain, rebuilds, and lands after
/// the first.
#[test]
fn test_two_admins_race_and_converge() {
    let team = IntegrationTeam::new("acme");
    let bob = team.join_direct(2, "bob@example.com");
    team.admin
        .append_to_main_chain(RequestableOperation::Promote(bob.identity().public_key()))
        .unwrap();
    bob.get_verified_team_updates().unwrap();

    // Both now share a tip; alice wins the race.
    let alice_post = team.admin.append_to_main_chain(pin("a.example.com")).unwrap();
    let bob_post = bob.append_to_main_chain(pin("b.example.com")).unwrap();

    let hosted = team.server.main_chain(&team.team_key());
    let positions: Vec<_> = hosted.iter().map(|block| block.hash()).collect();
    let alice_at = positions.iter().position(|h| *h == alice_post.posted_block_hash);
    let bob_at = positions.iter().position(|h| *h == bob_post.posted_block_hash);
    assert!(alice_at.unwrap() < bob_at.unwrap());

    let alice_state = team.admin.get_verified_team_updates().unwrap();
    let bob_state = bob.team_state().unwrap().unwrap();
    assert_eq!(alice_state, bob_state);
    assert_eq!(alice_state.block_count as usize, hosted.len());
    assert_eq!(
        pinned(&bob),
        BTreeSet::from(["a.example.com".to_string(), "b.example.com".to_string()])
    );
}

/// Four devices of one admin, each with its own store, append concurrently.
/// Every operation lands exactly once and every device converges.
#[test]
fn test_concurrent_devices_all_land() {
    let team = IntegrationTeam::new("acme");
    let config = SyncConfig {
        retries: 16,
        ..SyncConfig::default()
    };

    let handles: Vec<_> = (0..4)
        .map(|device| {
            let service = team.device(&team.admin).with_config(config.clone());
            thread::spawn(move || {
                for op in 0..3 {
                    service
                        .append_to_main_chain(pin(&format!("host-{device}-{op}")))
                        .unwrap();
                }
                service
            })
        })
        .collect();
    let devices: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let expected = team.admin.get_verified_team_updates().unwrap();
    assert_eq!(expected.block_count, 13);
    assert_eq!(expected.pinned_hosts.len(), 12);
    for device in &devices {
        assert_eq!(device.get_verified_team_updates().unwrap(), expected);
    }
}

/// Two processes on one store, sharing a lock registry, never race each
/// other locally.
#[test]
fn test_shared_store_writers_serialize_on_identity_lock() {
    let team = IntegrationTeam::new("acme");
    let locks = SyncLocks::new();
    let writers: Vec<_> = (0..2)
        .map(|_| Arc::new(team.process(&team.admin).with_locks(&locks)))
        .collect();

    let handles: Vec<_> = writers
        .iter()
        .enumerate()
        .map(|(writer, service)| {
            let service = Arc::clone(service);
            thread::spawn(move || {
                for op in 0..3 {
                    service
                        .append_to_main_chain(pin(&format!("host-{writer}-{op}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let state = team.admin.team_state().unwrap().unwrap();
    assert_eq!(state.block_count, 7);
    assert_eq!(state.pinned_hosts.len(), 6);
    assert_eq!(team.server.main_chain(&team.team_key()).len(), 7);
}

/// The server accepts a block, but another process commits a newer tip to
/// the shared store first. The writer picks its block up through a pull
/// instead of posting it again.
#[test]
fn test_local_commit_race_after_post_converges() {
    let team = IntegrationTeam::new("acme");
    let other = Arc::new(team.process(&team.admin));

    let racer = Arc::clone(&other);
    team.server.on_next_append(move || {
        racer.get_verified_team_updates().unwrap();
    });
    let posted = team.admin.append_to_main_chain(pin("a.example.com")).unwrap();

    let state = team.admin.team_state().unwrap().unwrap();
    assert_eq!(state.last_block_hash, posted.posted_block_hash);
    assert_eq!(state.block_count, 2);
    assert_eq!(team.server.main_chain(&team.team_key()).len(), 2);
}
