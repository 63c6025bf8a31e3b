//! [`TeamService`]: pull, push and invite acceptance on the main chain.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ed25519_dalek::SigningKey;
use teamchain_store::{ChainStore, ChainTransaction};
use teamchain_types::{
    Block, BlockHash, Body, IndirectInvitationSecret, MainChain, Operation, ReadBlocksRequest,
    ReadBlocksResponse, SignedMessage, TeamPointer, nonce_signing_key, random_bytes, sign_body,
};
use teamchain_verify::{Applied, TeamState, verify_block, verify_genesis};
use tracing::{debug, info, warn};

use crate::TeamServer;
use crate::config::{SyncConfig, SyncLocks};
use crate::error::SyncError;
use crate::identity::TeamIdentity;
use crate::operation::{OperationResponse, RequestableOperation, ResponseData};
use crate::server::{Endpoint, send};

/// Everything one identity needs to keep its team chain in sync.
pub struct TeamService {
    identity: TeamIdentity,
    store: ChainStore,
    server: Arc<dyn TeamServer>,
    config: SyncConfig,
    lock: Arc<Mutex<()>>,
}

impl TeamService {
    pub fn new(identity: TeamIdentity, store: ChainStore, server: Arc<dyn TeamServer>) -> Self {
        Self {
            identity,
            store,
            server,
            config: SyncConfig::default(),
            lock: Arc::default(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Serialize this service with every other one in the process that
    /// acts for the same identity.
    pub fn with_locks(mut self, locks: &SyncLocks) -> Self {
        self.lock = locks.for_identity(&self.identity.public_key());
        self
    }

    pub fn identity(&self) -> &TeamIdentity {
        &self.identity
    }

    pub fn store(&self) -> &ChainStore {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub(crate) fn server(&self) -> &dyn TeamServer {
        self.server.as_ref()
    }

    /// The locally committed team state, without contacting the server.
    pub fn team_state(&self) -> Result<Option<TeamState>, SyncError> {
        Ok(self.store.team_state()?)
    }

    pub(crate) fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_state(&self) -> Result<TeamState, SyncError> {
        self.store.team_state()?.ok_or(SyncError::NoTeam)
    }

    // ----- Public operations -----

    /// Post a genesis block built by [`TeamIdentity::new_admin`] and
    /// commit it locally.
    pub fn create_team(&self, genesis: &SignedMessage) -> Result<TeamState, SyncError> {
        let _guard = self.exclusive();
        let applied = verify_genesis(genesis, &self.identity.initial_team_public_key)?;
        if self.store.last_block_hash()?.is_some() {
            return Err(SyncError::TeamAlreadyExists);
        }

        send::<_, serde_json::Value>(self.server(), Endpoint::SigChain, genesis)?;

        let mut tx = self.store.begin()?;
        let state = applied.state.clone();
        self.stage(&mut tx, genesis, applied)?;
        tx.commit()?;
        info!(team = %self.identity.initial_team_public_key, "created team");
        Ok(state)
    }

    /// Fetch, verify and commit every block past the local tip.
    pub fn get_verified_team_updates(&self) -> Result<TeamState, SyncError> {
        let _guard = self.exclusive();
        self.pull(&self.identity.signing_key)
    }

    /// Build, post and commit one operation signed by this identity.
    pub fn append_to_main_chain(
        &self,
        operation: RequestableOperation,
    ) -> Result<OperationResponse, SyncError> {
        let _guard = self.exclusive();
        let key = &self.identity.signing_key;
        if self.store.team_state()?.is_none() {
            self.pull(key)?;
        }
        self.push(key, key, |state| {
            operation.prepare(state, &self.config.link_scheme)
        })
    }

    /// Join through an indirect invitation, using the secret resolved by
    /// [`fetch_full_invite`](crate::fetch_full_invite).
    ///
    /// Until the acceptance lands this identity is not a member, so reads and
    /// the acceptance itself are signed by the invitation's nonce key.
    pub fn accept_invite(&self, secret: &IndirectInvitationSecret) -> Result<TeamState, SyncError> {
        if secret.initial_team_public_key != self.identity.initial_team_public_key {
            return Err(SyncError::InviteTeamMismatch);
        }
        let nonce_key = nonce_signing_key(&secret.nonce_keypair_seed)?;

        let _guard = self.exclusive();
        self.pull(&nonce_key)?;
        let identity = self.identity.identity();
        self.push(&nonce_key, &nonce_key, |_| {
            Ok((Operation::AcceptInvite(identity.clone()), None))
        })?;
        info!(member = %identity.public_key, "joined team through invite link");
        self.current_state()
    }

    /// Join through a direct invitation naming this identity's key.
    pub fn accept_direct_invite(&self) -> Result<TeamState, SyncError> {
        let _guard = self.exclusive();
        let key = &self.identity.signing_key;
        self.pull(key)?;
        let identity = self.identity.identity();
        self.push(key, key, |_| Ok((Operation::AcceptInvite(identity.clone()), None)))?;
        info!(member = %identity.public_key, "accepted direct invitation");
        self.current_state()
    }

    // ----- Pull -----

    /// Read pages past the local tip until the server has nothing more.
    ///
    /// Caller holds the identity lock.
    pub(crate) fn pull(&self, reader: &SigningKey) -> Result<TeamState, SyncError> {
        let mut conflicts = 0;
        for _ in 0..self.config.max_pull_rounds {
            let mut tx = self.store.begin()?;
            let page = self.read_after(&tx, reader)?;
            if page.blocks.is_empty() {
                return self.checkpointed(&tx);
            }

            for block in &page.blocks {
                if tx.has_block(&block.hash())? {
                    continue;
                }
                let applied = match tx.team_state() {
                    None => verify_genesis(block, &self.identity.initial_team_public_key)?,
                    Some(state) => verify_block(block, state)?,
                };
                self.stage(&mut tx, block, applied)?;
            }

            match tx.commit() {
                Ok(()) => {}
                Err(e) if e.is_conflict() && conflicts < self.config.retries => {
                    conflicts += 1;
                    debug!(conflicts, "pull lost local commit race; re-reading");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            if !page.has_more {
                return self.checkpointed(&self.store.begin()?);
            }
        }
        Err(SyncError::TooManyPullRounds(self.config.max_pull_rounds))
    }

    fn read_after(
        &self,
        tx: &ChainTransaction,
        reader: &SigningKey,
    ) -> Result<ReadBlocksResponse, SyncError> {
        let team_pointer = match tx.last_block_hash() {
            Some(hash) => TeamPointer::LastBlockHash(hash),
            None => TeamPointer::PublicKey(self.identity.initial_team_public_key),
        };
        let request = sign_body(
            Body::Main(MainChain::Read(ReadBlocksRequest {
                team_pointer,
                nonce: random_bytes::<32>().to_vec(),
                token: None,
            })),
            reader,
        )?;
        send(self.server(), Endpoint::SigChain, &request)
    }

    /// The state at the end of a pull, provided the history reached this
    /// identity's checkpoint.
    fn checkpointed(&self, tx: &ChainTransaction) -> Result<TeamState, SyncError> {
        let checkpoint = self.identity.checkpoint;
        if !tx.has_block(&checkpoint)? {
            warn!(%checkpoint, "server history ends before checkpoint");
            return Err(SyncError::CheckpointNotReached(checkpoint));
        }
        tx.team_state().cloned().ok_or(SyncError::NoTeam)
    }

    /// Append a verified block to `tx` along with the state it produced.
    fn stage(
        &self,
        tx: &mut ChainTransaction,
        block: &SignedMessage,
        applied: Applied,
    ) -> Result<BlockHash, SyncError> {
        let tip = tx.last_block_hash();
        tx.append_block(tip, block)?;
        if let Some(operation) = &applied.operation {
            if matches!(operation, Operation::RemoveLoggingEndpoint(_))
                && !applied.state.logging_enabled()
            {
                debug!("logging disabled; discarding unsent audit records");
                tx.clear_unsent_audit_logs();
            }
            debug!(hash = %applied.hash, operation = operation.kind(), "applied block");
        }
        tx.set_team_state(applied.state);
        Ok(applied.hash)
    }

    // ----- Push -----

    /// Post a block built by `build` on the local tip, re-pulling and
    /// rebuilding whenever the server reports a lost race.
    ///
    /// Caller holds the identity lock.
    fn push(
        &self,
        signer: &SigningKey,
        reader: &SigningKey,
        mut build: impl FnMut(&TeamState) -> Result<(Operation, Option<ResponseData>), SyncError>,
    ) -> Result<OperationResponse, SyncError> {
        let mut attempts = 0;
        loop {
            let mut tx = self.store.begin()?;
            let state = tx.team_state().cloned().ok_or(SyncError::NoTeam)?;
            let (operation, data) = build(&state)?;
            let kind = operation.kind();
            let block = sign_body(
                Body::Main(MainChain::Append(Block {
                    last_block_hash: state.last_block_hash,
                    operation,
                })),
                signer,
            )?;
            // The server would refuse it too; fail before posting.
            let applied = verify_block(&block, &state)?;

            match send::<_, serde_json::Value>(self.server(), Endpoint::SigChain, &block) {
                Ok(_) => {}
                Err(SyncError::Server(e)) if e.is_lost_race() && attempts < self.config.retries => {
                    attempts += 1;
                    warn!(attempts, error = %e, operation = kind, "lost race for chain tip; pulling");
                    drop(tx);
                    self.pull(reader)?;
                    continue;
                }
                Err(e) => return Err(e),
            }

            let hash = self.stage(&mut tx, &block, applied)?;
            match tx.commit() {
                Ok(()) => {}
                Err(e) if e.is_conflict() => {
                    // Another local writer moved the tip after the server
                    // accepted this block; the pull brings it in.
                    debug!(%hash, "local commit raced after post; pulling");
                    self.pull(reader)?;
                    if !self.store.has_block(&hash)? {
                        return Err(e.into());
                    }
                }
                Err(e) => return Err(e.into()),
            }

            info!(%hash, operation = kind, "appended block");
            return Ok(OperationResponse {
                posted_block_hash: hash,
                data,
            });
        }
    }
}
