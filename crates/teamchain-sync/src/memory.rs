//! In-process team server.
//!
//! Hosts chains the way the real relay does: appends must extend the tip
//! and pass verification, reads are paged and restricted to members and
//! invitees. Tests can inject failures, withhold history, forge blocks and
//! run a hook between accepting an append and replying to it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use teamchain_types::{
    BillingInfo, BlockHash, Body, GenesisLogBlock, Invitation, LogBlock, LogChain,
    LogChainPointer, LogsFilter, MainChain, Operation, PaymentTier, PublicKey,
    PushDevice, PushSubscriptionAction, ReadBlocksRequest, ReadBlocksResponse,
    ReadLogBlocksRequest, SignedMessage, TeamPointer, Usage, random_bytes,
};
use teamchain_verify::{
    LogChainState, Rejection, TeamState, verify_block, verify_genesis, verify_log_block,
};
use tracing::debug;

use crate::TeamServer;
use crate::requests::{EmailChallengeRequest, InviteCiphertextRequest, InviteCiphertextResponse};
use crate::server::{Endpoint, KnownServerError, ServerError};

/// Blocks served per read when no page size is set.
pub const DEFAULT_PAGE_SIZE: usize = 100;

type Hook = Box<dyn FnOnce() + Send>;

/// One hosted chain and the state folded from it.
struct Hosted<S> {
    blocks: Vec<SignedMessage>,
    positions: HashMap<BlockHash, usize>,
    state: S,
}

impl<S> Hosted<S> {
    fn new(state: S) -> Self {
        Self {
            blocks: Vec::new(),
            positions: HashMap::new(),
            state,
        }
    }

    fn push(&mut self, block: SignedMessage) -> BlockHash {
        let hash = block.hash();
        self.positions.insert(hash, self.blocks.len());
        self.blocks.push(block);
        hash
    }

    fn page(&self, start: usize, visible: usize, page_size: usize) -> ReadBlocksResponse {
        let visible = visible.min(self.blocks.len());
        let start = start.min(visible);
        let end = visible.min(start.saturating_add(page_size));
        ReadBlocksResponse {
            blocks: self.blocks[start..end].to_vec(),
            has_more: end < visible,
        }
    }
}

impl Hosted<TeamState> {
    fn may_read(&self, reader: &PublicKey) -> bool {
        self.state.is_member(reader)
            || self
                .state
                .invitations
                .iter()
                .any(|invitation| invitation.signer_key() == reader)
    }
}

struct Relay {
    teams: HashMap<PublicKey, Hosted<TeamState>>,
    /// Main-chain block hash -> team.
    block_index: HashMap<BlockHash, PublicKey>,
    /// (team, member) -> log chain.
    log_chains: HashMap<(PublicKey, PublicKey), Hosted<LogChainState>>,
    log_index: HashMap<BlockHash, (PublicKey, PublicKey)>,
    invite_ciphertexts: HashMap<Vec<u8>, Vec<u8>>,
    push_devices: HashMap<PublicKey, PushDevice>,
    email_challenges: HashMap<String, Vec<u8>>,
    verified_emails: HashSet<String>,
    tier: PaymentTier,
    page_size: usize,
    /// Serve at most this many blocks of any main chain.
    withhold_after: Option<usize>,
    /// Already-known blocks repeated at the start of every page read past
    /// a tip.
    overlap: usize,
    requests: HashMap<Endpoint, usize>,
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            teams: HashMap::new(),
            block_index: HashMap::new(),
            log_chains: HashMap::new(),
            log_index: HashMap::new(),
            invite_ciphertexts: HashMap::new(),
            push_devices: HashMap::new(),
            email_challenges: HashMap::new(),
            verified_emails: HashSet::new(),
            tier: PaymentTier {
                name: "unlimited".to_string(),
                price: 0,
                limit: None,
                unit_description: "per member per month".to_string(),
            },
            page_size: DEFAULT_PAGE_SIZE,
            withhold_after: None,
            overlap: 0,
            requests: HashMap::new(),
        }
    }
}

fn unspecified() -> ServerError {
    KnownServerError::Unspecified.into()
}

fn rejected(rejection: Rejection) -> ServerError {
    ServerError::Unknown(rejection.to_string())
}

fn parse<T: DeserializeOwned>(body: &Value) -> Result<T, ServerError> {
    serde_json::from_value(body.clone()).map_err(|_| unspecified())
}

/// Decode a signed request and check its signature.
fn signed_request(body: &Value) -> Result<(SignedMessage, PublicKey, Body), ServerError> {
    let signed: SignedMessage = parse(body)?;
    let signer = signed.signer().map_err(|_| unspecified())?;
    if !signed.verify_signature(&signer) {
        return Err(unspecified());
    }
    let message = signed.decode_message().map_err(|_| unspecified())?;
    Ok((signed, signer, message.body))
}

impl Relay {
    fn handle(&mut self, endpoint: Endpoint, body: &Value) -> Result<Value, ServerError> {
        *self.requests.entry(endpoint).or_default() += 1;
        match endpoint {
            Endpoint::SigChain => self.sig_chain(body),
            Endpoint::SendEmailChallenge => {
                let request: EmailChallengeRequest = parse(body)?;
                self.email_challenges
                    .insert(request.email, random_bytes::<32>().to_vec());
                Ok(json!({}))
            }
            Endpoint::VerifyEmail => {
                let (_, _, body) = signed_request(body)?;
                let Body::EmailChallenge(challenge) = body else {
                    return Err(unspecified());
                };
                let email = self
                    .email_challenges
                    .iter()
                    .find(|(_, nonce)| **nonce == challenge.nonce)
                    .map(|(email, _)| email.clone())
                    .ok_or_else(|| ServerError::Unknown("invalid email challenge".to_string()))?;
                self.email_challenges.remove(&email);
                self.verified_emails.insert(email);
                Ok(json!({}))
            }
            Endpoint::InviteLinkCiphertext => {
                let request: InviteCiphertextRequest = parse(body)?;
                let hash = STANDARD
                    .decode(&request.symmetric_key_hash)
                    .map_err(|_| unspecified())?;
                let ciphertext = self
                    .invite_ciphertexts
                    .get(&hash)
                    .ok_or_else(|| ServerError::Unknown("unknown invite".to_string()))?;
                let response = InviteCiphertextResponse {
                    ciphertext: STANDARD.encode(ciphertext),
                };
                serde_json::to_value(response).map_err(|_| unspecified())
            }
            Endpoint::PushSubscription => {
                let (_, signer, body) = signed_request(body)?;
                let Body::PushSubscription(subscription) = body else {
                    return Err(unspecified());
                };
                let team = self.team_at(&subscription.team_pointer)?;
                if !team.state.is_member(&signer) {
                    return Err(unspecified());
                }
                match subscription.action {
                    PushSubscriptionAction::Subscribe(device) => {
                        self.push_devices.insert(signer, device);
                    }
                    PushSubscriptionAction::Unsubscribe {} => {
                        self.push_devices.remove(&signer);
                    }
                }
                Ok(json!({}))
            }
            Endpoint::BillingInfo => {
                let (_, signer, body) = signed_request(body)?;
                let Body::ReadBillingInfo(read) = body else {
                    return Err(unspecified());
                };
                let team = self
                    .teams
                    .get(&read.team_public_key)
                    .ok_or_else(unspecified)?;
                if !team.state.is_member(&signer) {
                    return Err(unspecified());
                }
                let logs = self
                    .log_chains
                    .iter()
                    .filter(|((team_key, _), _)| *team_key == read.team_public_key)
                    .map(|(_, chain)| chain.blocks.len() as u64)
                    .sum();
                let info = BillingInfo {
                    current_tier: self.tier.clone(),
                    usage: Usage {
                        members: team.state.members.len() as u64,
                        hosts: team.state.pinned_hosts.len() as u64,
                        logs_last_30_days: logs,
                    },
                };
                serde_json::to_value(info).map_err(|_| unspecified())
            }
        }
    }

    fn sig_chain(&mut self, body: &Value) -> Result<Value, ServerError> {
        let (signed, signer, body) = signed_request(body)?;
        match body {
            Body::Main(MainChain::Create(_)) => self.create_team(signed, signer),
            Body::Main(MainChain::Append(block)) => self.append(signed, block.last_block_hash, &block.operation),
            Body::Main(MainChain::Read(read)) => self.read(&signer, &read),
            Body::Log(LogChain::Create(genesis)) => self.create_log(signed, signer, &genesis),
            Body::Log(LogChain::Append(block)) => self.append_log(signed, signer, &block),
            Body::Log(LogChain::Read(read)) => self.read_log(&signer, &read),
            _ => Err(unspecified()),
        }
    }

    fn team_at(&self, pointer: &TeamPointer) -> Result<&Hosted<TeamState>, ServerError> {
        let key = match pointer {
            TeamPointer::PublicKey(key) => *key,
            TeamPointer::LastBlockHash(hash) => *self.block_index.get(hash).ok_or_else(unspecified)?,
        };
        self.teams.get(&key).ok_or_else(unspecified)
    }

    // ----- Main chain -----

    fn create_team(&mut self, signed: SignedMessage, signer: PublicKey) -> Result<Value, ServerError> {
        if self.teams.contains_key(&signer) {
            return Err(ServerError::Unknown("team already exists".to_string()));
        }
        let applied = verify_genesis(&signed, &signer).map_err(rejected)?;
        let mut team = Hosted::new(applied.state);
        let hash = team.push(signed);
        self.block_index.insert(hash, signer);
        self.teams.insert(signer, team);
        debug!(team = %signer, "relay created team");
        Ok(json!({}))
    }

    fn append(
        &mut self,
        signed: SignedMessage,
        last_block_hash: BlockHash,
        operation: &Operation,
    ) -> Result<Value, ServerError> {
        let team_key = *self
            .block_index
            .get(&last_block_hash)
            .ok_or(ServerError::Known(KnownServerError::NotAppendingToMainChain))?;
        let team = self.teams.get_mut(&team_key).ok_or_else(unspecified)?;
        if team.state.last_block_hash != last_block_hash {
            return Err(KnownServerError::NotAppendingToMainChain.into());
        }
        if let (Operation::AcceptInvite(_), Some(limit)) = (operation, &self.tier.limit)
            && team.state.members.len() as u64 >= limit.members
        {
            return Err(KnownServerError::FreeTierLimitReached.into());
        }

        let applied = verify_block(&signed, &team.state).map_err(rejected)?;
        if let Operation::Invite(Invitation::Indirect(indirect)) = operation {
            self.invite_ciphertexts.insert(
                indirect.invite_symmetric_key_hash.clone(),
                indirect.invite_ciphertext.clone(),
            );
        }
        let hash = team.push(signed);
        team.state = applied.state;
        self.block_index.insert(hash, team_key);
        debug!(team = %team_key, %hash, "relay appended block");
        Ok(json!({}))
    }

    fn read(&self, reader: &PublicKey, read: &ReadBlocksRequest) -> Result<Value, ServerError> {
        let team = self.team_at(&read.team_pointer)?;
        if !team.may_read(reader) {
            return Err(ServerError::Unknown("reader is not authorized".to_string()));
        }
        let start = match read.team_pointer {
            TeamPointer::PublicKey(_) => 0,
            TeamPointer::LastBlockHash(hash) => {
                (team.positions[&hash] + 1).saturating_sub(self.overlap)
            }
        };
        let visible = self.withhold_after.unwrap_or(usize::MAX);
        let page = team.page(start, visible, self.page_size);
        serde_json::to_value(page).map_err(|_| unspecified())
    }

    // ----- Log chains -----

    fn create_log(
        &mut self,
        signed: SignedMessage,
        signer: PublicKey,
        genesis: &GenesisLogBlock,
    ) -> Result<Value, ServerError> {
        let team = self.team_at(&genesis.team_pointer)?;
        let key = (team.state.team_public_key, signer);
        if self.log_chains.contains_key(&key) {
            return Err(ServerError::Unknown("log chain already exists".to_string()));
        }
        let state = verify_log_block(&signed, None, &signer, &team.state, |hash| {
            team.positions.contains_key(hash)
        })
        .map_err(rejected)?;
        let mut chain = Hosted::new(state);
        let hash = chain.push(signed);
        self.log_index.insert(hash, key);
        self.log_chains.insert(key, chain);
        Ok(json!({}))
    }

    fn append_log(&mut self, signed: SignedMessage, signer: PublicKey, block: &LogBlock) -> Result<Value, ServerError> {
        let key = *self
            .log_index
            .get(&block.last_block_hash)
            .ok_or(ServerError::Known(KnownServerError::NotAppendingToMainChain))?;
        let team = self.teams.get(&key.0).ok_or_else(unspecified)?;
        let chain = self.log_chains.get_mut(&key).ok_or_else(unspecified)?;
        if chain.state.last_block_hash != block.last_block_hash {
            return Err(KnownServerError::NotAppendingToMainChain.into());
        }
        let state = verify_log_block(&signed, Some(&chain.state), &signer, &team.state, |_| false)
            .map_err(rejected)?;
        let hash = chain.push(signed);
        chain.state = state;
        self.log_index.insert(hash, key);
        Ok(json!({}))
    }

    fn read_log(&self, reader: &PublicKey, read: &ReadLogBlocksRequest) -> Result<Value, ServerError> {
        let LogsFilter::Member(pointer) = read.filter;
        let (key, start) = match pointer {
            LogChainPointer::GenesisBlock(genesis) => {
                ((genesis.team_public_key, genesis.member_public_key), 0)
            }
            LogChainPointer::LastBlockHash(hash) => {
                let key = *self.log_index.get(&hash).ok_or_else(unspecified)?;
                let start = self.log_chains[&key].positions[&hash] + 1;
                (key, start.saturating_sub(self.overlap))
            }
        };
        let team = self.teams.get(&key.0).ok_or_else(unspecified)?;
        if *reader != key.1 && !team.state.is_admin(reader) {
            return Err(ServerError::Unknown("reader is not authorized".to_string()));
        }
        let page = match self.log_chains.get(&key) {
            Some(chain) => chain.page(start, usize::MAX, self.page_size),
            None => ReadBlocksResponse::default(),
        };
        serde_json::to_value(page).map_err(|_| unspecified())
    }
}

/// [`TeamServer`] that keeps every team in memory.
#[derive(Default)]
pub struct MemoryTeamServer {
    relay: Mutex<Relay>,
    failures: Mutex<VecDeque<ServerError>>,
    after_append: Mutex<Option<Hook>>,
}

impl MemoryTeamServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks served per read page.
    pub fn set_page_size(&self, page_size: usize) {
        self.relay.lock().unwrap().page_size = page_size.max(1);
    }

    pub fn set_tier(&self, tier: PaymentTier) {
        self.relay.lock().unwrap().tier = tier;
    }

    /// Fail the next request with `error` before it reaches the relay.
    pub fn fail_next(&self, error: ServerError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Serve only the first `count` blocks of every main chain, as if the
    /// rest did not exist. `None` serves everything again.
    pub fn withhold_blocks_after(&self, count: Option<usize>) {
        self.relay.lock().unwrap().withhold_after = count;
    }

    /// Repeat the last `count` already-known blocks on every read that
    /// starts after a tip, as a relay with stale paging would.
    pub fn overlap_reads(&self, count: usize) {
        self.relay.lock().unwrap().overlap = count;
    }

    /// Run `hook` after the next accepted append on any chain, before the
    /// appender sees the reply.
    pub fn on_next_append(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_append.lock().unwrap() = Some(Box::new(hook));
    }

    /// Append `block` to a team's chain without any checks.
    pub fn inject_block(&self, team: &PublicKey, block: SignedMessage) {
        let mut relay = self.relay.lock().unwrap();
        if let Some(hosted) = relay.teams.get_mut(team) {
            let hash = hosted.push(block);
            relay.block_index.insert(hash, *team);
        }
    }

    pub fn main_chain(&self, team: &PublicKey) -> Vec<SignedMessage> {
        let relay = self.relay.lock().unwrap();
        relay
            .teams
            .get(team)
            .map(|hosted| hosted.blocks.clone())
            .unwrap_or_default()
    }

    pub fn log_chain(&self, team: &PublicKey, member: &PublicKey) -> Vec<SignedMessage> {
        let relay = self.relay.lock().unwrap();
        relay
            .log_chains
            .get(&(*team, *member))
            .map(|hosted| hosted.blocks.clone())
            .unwrap_or_default()
    }

    /// The nonce most recently mailed to `email`.
    pub fn email_challenge(&self, email: &str) -> Option<Vec<u8>> {
        self.relay.lock().unwrap().email_challenges.get(email).cloned()
    }

    pub fn is_email_verified(&self, email: &str) -> bool {
        self.relay.lock().unwrap().verified_emails.contains(email)
    }

    pub fn push_device(&self, member: &PublicKey) -> Option<PushDevice> {
        self.relay.lock().unwrap().push_devices.get(member).cloned()
    }

    /// Requests that reached the relay on `endpoint`.
    pub fn request_count(&self, endpoint: Endpoint) -> usize {
        self.relay
            .lock()
            .unwrap()
            .requests
            .get(&endpoint)
            .copied()
            .unwrap_or_default()
    }
}

impl TeamServer for MemoryTeamServer {
    fn send_sync(&self, endpoint: Endpoint, body: &Value) -> Result<Value, ServerError> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            debug!(%endpoint, %error, "injected failure");
            return Err(error);
        }

        let (reply, appended) = {
            let mut relay = self.relay.lock().unwrap();
            let before = (relay.block_index.len(), relay.log_index.len());
            let reply = relay.handle(endpoint, body);
            let grew = relay.block_index.len() > before.0 || relay.log_index.len() > before.1;
            (reply, grew)
        };

        // Outside every lock so the hook can issue its own requests.
        if appended {
            let hook = self.after_append.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
        }
        reply
    }
}
