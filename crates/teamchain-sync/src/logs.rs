//! Audit log shipping on the member's own log chain.

use teamchain_store::{AuditRecord, ChainTransaction};
use teamchain_types::{
    BlockHash, Body, EncryptedLog, GenesisLogBlock, LogBlock, LogChain, LogChainGenesisPointer,
    LogChainPointer, LogOperation, LogsFilter, ReadBlocksResponse, ReadLogBlocksRequest,
    SignedMessage, TeamPointer, random_bytes, seal,
};
use teamchain_verify::{LogChainState, Rejection, TeamState, verify_log_block};
use tracing::{debug, info};

use crate::error::SyncError;
use crate::server::{Endpoint, send};
use crate::service::TeamService;

impl TeamService {
    /// Queue `data` for the log chain. Fails when the team has no logging
    /// endpoint.
    pub fn queue_audit_log(&self, data: Vec<u8>) -> Result<AuditRecord, SyncError> {
        let state = self.team_state()?.ok_or(SyncError::NoTeam)?;
        if !state.logging_enabled() {
            return Err(SyncError::LoggingDisabled);
        }
        Ok(self.store().queue_audit_log(data)?)
    }

    /// Fetch and verify this member's log chain past the local log tip.
    pub fn get_new_audit_logs(&self) -> Result<Option<LogChainState>, SyncError> {
        let _guard = self.exclusive();
        self.pull_logs()
    }

    /// Ship queued audit records, oldest first, one block each. Creates the
    /// log chain first if this member has none. Returns how many records
    /// were sent.
    pub fn send_unsent_log_blocks(&self) -> Result<usize, SyncError> {
        let _guard = self.exclusive();
        self.pull_logs()?;

        let mut sent = 0;
        loop {
            let mut tx = self.store().begin()?;
            let team = tx.team_state().cloned().ok_or(SyncError::NoTeam)?;
            let Some(record) = tx.next_unsent_audit_log()? else {
                return Ok(sent);
            };

            let (block, record) = match tx.last_log_block_hash() {
                None => (self.log_genesis()?, None),
                Some(tip) => {
                    let key = self.log_key()?;
                    (self.log_append(tip, &key, &record)?, Some(record))
                }
            };
            send::<_, serde_json::Value>(self.server(), Endpoint::SigChain, &block)?;

            self.apply_log_block(&mut tx, &team, &block)?;
            if let Some(record) = &record {
                tx.mark_audit_log_sent(record.seq);
            }
            match tx.commit() {
                Ok(()) => {}
                Err(e) if e.is_conflict() => {
                    // The server has the block; pick it up, then mark.
                    debug!("log commit raced after post; pulling");
                    self.pull_logs()?;
                    let mut tx = self.store().begin()?;
                    if let Some(record) = &record {
                        tx.mark_audit_log_sent(record.seq);
                    }
                    tx.commit()?;
                }
                Err(e) => return Err(e.into()),
            }
            if let Some(record) = record {
                debug!(seq = record.seq, "sent audit record");
                sent += 1;
            }
        }
    }

    fn log_genesis(&self) -> Result<SignedMessage, SyncError> {
        info!("creating audit log chain");
        self.identity().sign(Body::Log(LogChain::Create(GenesisLogBlock {
            team_pointer: TeamPointer::PublicKey(self.identity().initial_team_public_key),
        })))
    }

    /// The key records are sealed with. A new key is committed on its own
    /// before anything is sealed with it; if another handle stored one
    /// first, that one wins.
    fn log_key(&self) -> Result<[u8; 32], SyncError> {
        let mut tx = self.store().begin()?;
        if let Some(key) = tx.log_key() {
            return Ok(key);
        }
        let key = random_bytes::<32>();
        tx.set_log_key(key);
        match tx.commit() {
            Ok(()) => {
                debug!("stored new audit log key");
                Ok(key)
            }
            Err(e) if e.is_conflict() => self.store().begin()?.log_key().ok_or_else(|| e.into()),
            Err(e) => Err(e.into()),
        }
    }

    fn log_append(
        &self,
        tip: BlockHash,
        key: &[u8; 32],
        record: &AuditRecord,
    ) -> Result<SignedMessage, SyncError> {
        let ciphertext = seal(key, &record.data)?;
        self.identity().sign(Body::Log(LogChain::Append(LogBlock {
            last_block_hash: tip,
            operation: LogOperation::EncryptLog(EncryptedLog { ciphertext }),
        })))
    }

    /// Caller holds the identity lock.
    fn pull_logs(&self) -> Result<Option<LogChainState>, SyncError> {
        let member = self.identity().public_key();
        let mut conflicts = 0;
        for _ in 0..self.config().max_pull_rounds {
            let mut tx = self.store().begin()?;
            let team = tx.team_state().cloned().ok_or(SyncError::NoTeam)?;

            let pointer = match tx.last_log_block_hash() {
                Some(hash) => LogChainPointer::LastBlockHash(hash),
                None => LogChainPointer::GenesisBlock(LogChainGenesisPointer {
                    team_public_key: self.identity().initial_team_public_key,
                    member_public_key: member,
                }),
            };
            let request = self.identity().sign(Body::Log(LogChain::Read(ReadLogBlocksRequest {
                nonce: random_bytes::<32>().to_vec(),
                filter: LogsFilter::Member(pointer),
            })))?;
            let page: ReadBlocksResponse = send(self.server(), Endpoint::SigChain, &request)?;
            if page.blocks.is_empty() {
                return Ok(tx.log_state().cloned());
            }

            for block in &page.blocks {
                if tx.has_log_block(&block.hash())? {
                    continue;
                }
                self.apply_log_block(&mut tx, &team, block)?;
            }
            match tx.commit() {
                Ok(()) => {}
                Err(e) if e.is_conflict() && conflicts < self.config().retries => {
                    conflicts += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            if !page.has_more {
                return Ok(self.store().log_state()?);
            }
        }
        Err(SyncError::TooManyPullRounds(self.config().max_pull_rounds))
    }

    fn apply_log_block(
        &self,
        tx: &mut ChainTransaction,
        team: &TeamState,
        block: &SignedMessage,
    ) -> Result<(), SyncError> {
        let owner = self.identity().public_key();
        let current = tx.log_state().cloned();
        let mut lookup = Ok(false);
        let verified = verify_log_block(block, current.as_ref(), &owner, team, |hash| {
            lookup = tx.has_block(hash);
            lookup.as_ref().is_ok_and(|found| *found)
        });
        lookup?;

        let state = match verified {
            Ok(state) => state,
            Err(Rejection::AlreadyApplied) => return Ok(()),
            Err(rejection) => return Err(rejection.into()),
        };
        let tip = tx.last_log_block_hash();
        tx.append_log_block(tip, block)?;
        tx.set_log_state(state);
        Ok(())
    }
}
