//! Tests for the verifier crate.


use ed25519_dalek::SigningKey;
use teamchain_types::{
    Block, BlockHash, Body, GenesisBlock, Identity, MainChain, Operation, PublicKey,
    SignedMessage, TeamInfo, public_key, sign_body,
};

use crate::{Rejection, TeamState, verify_block, verify_genesis};

fn test_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

fn test_pk(seed: u8) -> PublicKey {
    public_key(&test_key(seed))
}

fn test_identity(seed: u8, email: &str) -> Identity {
    Identity {
        public_key: test_pk(seed),
        encryption_public_key: vec![seed; 32],
        email: email.to_string(),
        ssh_public_key: vec![seed; 8],
        pgp_public_key: vec![],
    }
}

fn genesis_block(seed: u8, email: &str, team: &str) -> SignedMessage {
    let body = Body::Main(MainChain::Create(GenesisBlock {
        creator: test_identity(seed, email),
        team_info: TeamInfo {
            name: team.to_string(),
        },
    }));
    sign_body(body, &test_key(seed)).unwrap()
}

fn append_block(signer: &SigningKey, last_block_hash: BlockHash, operation: Operation) -> SignedMessage {
    let body = Body::Main(MainChain::Append(Block {
        last_block_hash,
        operation,
    }));
    sign_body(body, signer).unwrap()
}

/// A team chain under construction, tracking its verified state.
struct TestChain {
    blocks: Vec<SignedMessage>,
    state: TeamState,
}

impl TestChain {
    /// Found a team whose creator uses key `seed`.
    fn new(seed: u8, email: &str, team: &str) -> Self {
        let genesis = genesis_block(seed, email, team);
        let applied = verify_genesis(&genesis, &test_pk(seed)).unwrap();
        Self {
            blocks: vec![genesis],
            state: applied.state,
        }
    }

    fn tip(&self) -> BlockHash {
        self.state.last_block_hash
    }

    /// Sign `operation` on the tip and fold it in if it verifies.
    fn push(&mut self, signer: &SigningKey, operation: Operation) -> Result<SignedMessage, Rejection> {
        let block = append_block(signer, self.tip(), operation);
        self.state = verify_block(&block, &self.state)?.state;
        self.blocks.push(block.clone());
        Ok(block)
    }
}

fn direct_invite(seed: u8, email: &str) -> Operation {
    Operation::Invite(teamchain_types::Invitation::Direct(
        teamchain_types::DirectInvitation {
            public_key: test_pk(seed),
            email: email.to_string(),
        },
    ))
}

/// Admin invites `seed` directly, then `seed` accepts.
fn join_direct(chain: &mut TestChain, admin: &SigningKey, seed: u8, email: &str) {
    chain.push(admin, direct_invite(seed, email)).unwrap();
    chain
        .push(
            &test_key(seed),
            Operation::AcceptInvite(test_identity(seed, email)),
        )
        .unwrap();
}
