//! Integration test: audit log chain.
//!
//! Each member's log chain advances independently of the main chain, and
//! queued records are shipped exactly once.

use teamchain_integration_tests::{IntegrationTeam, same_identity};
use teamchain_store::ChainStore;
use teamchain_sync::{RequestableOperation, TeamService};
use teamchain_types::{LoggingEndpoint, TeamInfo};

fn enable_logging(team: &IntegrationTeam) {
    team.admin
        .append_to_main_chain(RequestableOperation::AddLoggingEndpoint(
            LoggingEndpoint::CommandEncrypted {},
        ))
        .unwrap();
}

fn log(service: &TeamService, command: &str) {
    service.queue_audit_log(command.as_bytes().to_vec()).unwrap();
}

/// Main-chain appends never move the log tip, and shipping logs never
/// moves the main tip.
#[test]
fn test_main_and_log_tips_are_independent() {
    let team = IntegrationTeam::new("acme");
    enable_logging(&team);
    log(&team.admin, "ssh db1");
    team.admin.send_unsent_log_blocks().unwrap();

    let store = team.admin.store();
    let log_tip = store.last_log_block_hash().unwrap();
    assert!(log_tip.is_some());

    team.admin
        .append_to_main_chain(RequestableOperation::SetTeamInfo(TeamInfo {
            name: "acme-2".to_string(),
        }))
        .unwrap();
    assert_eq!(store.last_log_block_hash().unwrap(), log_tip);

    let main_tip = store.last_block_hash().unwrap();
    log(&team.admin, "ssh db2");
    team.admin.send_unsent_log_blocks().unwrap();
    assert_eq!(store.last_block_hash().unwrap(), main_tip);
    assert_ne!(store.last_log_block_hash().unwrap(), log_tip);
}

/// Marking a shipped record as sent again changes nothing and a second
/// send posts nothing.
#[test]
fn test_resending_marked_record_is_noop() {
    let team = IntegrationTeam::new("acme");
    enable_logging(&team);
    let record = team.admin.queue_audit_log(b"ssh db1".to_vec()).unwrap();
    assert_eq!(team.admin.send_unsent_log_blocks().unwrap(), 1);

    let me = team.admin.identity().public_key();
    let hosted = team.server.log_chain(&team.team_key(), &me).len();

    let mut tx = team.admin.store().begin().unwrap();
    tx.mark_audit_log_sent(record.seq);
    assert!(tx.is_empty());
    tx.commit().unwrap();

    assert_eq!(team.admin.send_unsent_log_blocks().unwrap(), 0);
    assert_eq!(team.server.log_chain(&team.team_key(), &me).len(), hosted);
    assert!(team.admin.store().unsent_audit_logs().unwrap().is_empty());
}

/// Records queued before a restart are shipped after it.
#[test]
fn test_queued_records_survive_restart() {
    let team = IntegrationTeam::new("acme");
    enable_logging(&team);
    let dir = tempfile::tempdir().unwrap();

    {
        let store = ChainStore::open(dir.path()).unwrap();
        let device = TeamService::new(same_identity(&team.admin), store, team.server.clone());
        device.get_verified_team_updates().unwrap();
        log(&device, "ssh db1");
        log(&device, "ssh db2");
    }

    let store = ChainStore::open(dir.path()).unwrap();
    assert_eq!(store.unsent_audit_logs().unwrap().len(), 2);
    let device = TeamService::new(same_identity(&team.admin), store, team.server.clone());
    assert_eq!(device.send_unsent_log_blocks().unwrap(), 2);

    let me = team.admin.identity().public_key();
    assert_eq!(team.server.log_chain(&team.team_key(), &me).len(), 3);
}

/// Two devices of one member extend the same log chain; the second picks
/// up the first's blocks before appending.
#[test]
fn test_devices_share_one_log_chain() {
    let team = IntegrationTeam::new("acme");
    enable_logging(&team);
    let laptop = team.device(&team.admin);
    laptop.get_verified_team_updates().unwrap();

    log(&team.admin, "ssh db1");
    log(&team.admin, "ssh db2");
    assert_eq!(team.admin.send_unsent_log_blocks().unwrap(), 2);

    log(&laptop, "ssh db3");
    assert_eq!(laptop.send_unsent_log_blocks().unwrap(), 1);

    let me = team.admin.identity().public_key();
    let hosted = team.server.log_chain(&team.team_key(), &me);
    assert_eq!(hosted.len(), 4);
    assert_eq!(laptop.store().last_log_block_hash().unwrap(), Some(hosted[3].hash()));

    let admin_view = team.admin.get_new_audit_logs().unwrap().unwrap();
    let laptop_view = laptop.store().log_state().unwrap().unwrap();
    assert_eq!(admin_view, laptop_view);
}
