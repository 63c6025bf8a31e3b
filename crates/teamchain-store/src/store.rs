//! Storage backend for the chain store (Fjall disk or pure in-memory).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use tempfile::TempDir;
use teamchain_types::{BlockHash, SignedMessage, sha256};
use teamchain_verify::{LogChainState, TeamState};
use tracing::debug;

use crate::error::StoreError;
use crate::record::{AuditRecord, Head, StoredBlock};
use crate::transaction::ChainTransaction;

pub(crate) type Result<T> = std::result::Result<T, StoreError>;

const HEAD_KEY: &[u8] = b"head";

/// Logical tables shared by both backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Table {
    /// hash -> StoredBlock (main chain).
    Blocks,
    /// seq -> hash (main chain).
    Chain,
    /// hash -> StoredBlock (log chain).
    LogBlocks,
    /// seq -> hash (log chain).
    LogChain,
    /// seq -> AuditRecord.
    Audit,
    /// "head" -> Head.
    Head,
}

/// Which of the two chains an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainKind {
    Main,
    Log,
}

impl ChainKind {
    fn tables(self) -> (Table, Table) {
        match self {
            Self::Main => (Table::Blocks, Table::Chain),
            Self::Log => (Table::LogBlocks, Table::LogChain),
        }
    }

    pub(crate) fn len(self, head: &Head) -> u64 {
        match self {
            Self::Main => head.main_len,
            Self::Log => head.log_len,
        }
    }
}

/// Inner backend: either Fjall-backed (disk) or pure in-memory.
enum Backend {
    Fjall(Box<FjallTables>),
    Memory(RwLock<BTreeMap<(Table, Vec<u8>), Vec<u8>>>),
}

struct FjallTables {
    #[allow(dead_code)]
    db: Database,
    /// Keeps the directory of a temporary store alive.
    #[allow(dead_code)]
    tmp: Option<TempDir>,
    blocks: Keyspace,
    chain: Keyspace,
    log_blocks: Keyspace,
    log_chain: Keyspace,
    audit: Keyspace,
    head: Keyspace,
}

impl FjallTables {
    fn keyspace(&self, table: Table) -> &Keyspace {
        match table {
            Table::Blocks => &self.blocks,
            Table::Chain => &self.chain,
            Table::LogBlocks => &self.log_blocks,
            Table::LogChain => &self.log_chain,
            Table::Audit => &self.audit,
            Table::Head => &self.head,
        }
    }
}

struct Inner {
    backend: Backend,
    /// Serializes commits across every handle of this store.
    commit_lock: Mutex<()>,
}

/// Handle to one identity's chain store.
///
/// Clones share the same database and commit lock; each clone behaves like
/// an independent process attached to the same store.
#[derive(Clone)]
pub struct ChainStore {
    inner: Arc<Inner>,
}

fn storage_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(e.to_string())
}

pub(crate) fn seq_key(seq: u64) -> [u8; 8] {
    seq.to_be_bytes()
}

impl ChainStore {
    /// Open a persistent store at the given path (Fjall backend).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::builder(path).open().map_err(storage_err)?;
        Ok(Self::from_backend(Self::init_fjall(db, None)?))
    }

    /// Open a temporary store backed by Fjall (cleaned up on drop).
    pub fn open_temporary() -> Result<Self> {
        let tmp = tempfile::tempdir().map_err(storage_err)?;
        let db = Database::builder(tmp.path())
            .temporary(true)
            .open()
            .map_err(storage_err)?;
        Ok(Self::from_backend(Self::init_fjall(db, Some(tmp))?))
    }

    /// Create a pure in-memory store.
    pub fn in_memory() -> Self {
        Self::from_backend(Backend::Memory(RwLock::new(BTreeMap::new())))
    }

    fn from_backend(backend: Backend) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                commit_lock: Mutex::new(()),
            }),
        }
    }

    fn init_fjall(db: Database, tmp: Option<TempDir>) -> Result<Backend> {
        let open = |name: &str| {
            db.keyspace(name, KeyspaceCreateOptions::default)
                .map_err(storage_err)
        };
        let blocks = open("tc_blocks")?;
        let chain = open("tc_chain")?;
        let log_blocks = open("tc_log_blocks")?;
        let log_chain = open("tc_log_chain")?;
        let audit = open("tc_audit")?;
        let head = open("tc_head")?;
        Ok(Backend::Fjall(Box::new(FjallTables {
            db,
            tmp,
            blocks,
            chain,
            log_blocks,
            log_chain,
            audit,
            head,
        })))
    }

    /// Start a transaction on the current committed head.
    pub fn begin(&self) -> Result<ChainTransaction> {
        Ok(ChainTransaction::new(self.clone(), self.read_head()?))
    }

    // ----- Raw tables -----

    pub(crate) fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match &self.inner.backend {
            Backend::Fjall(tables) => Ok(tables
                .keyspace(table)
                .get(key)
                .map_err(storage_err)?
                .map(|v| v.to_vec())),
            Backend::Memory(m) => Ok(m.read().unwrap().get(&(table, key.to_vec())).cloned()),
        }
    }

    pub(crate) fn insert(&self, table: Table, key: &[u8], value: Vec<u8>) -> Result<()> {
        match &self.inner.backend {
            Backend::Fjall(tables) => {
                tables
                    .keyspace(table)
                    .insert(key, value.as_slice())
                    .map_err(storage_err)?;
            }
            Backend::Memory(m) => {
                m.write().unwrap().insert((table, key.to_vec()), value);
            }
        }
        Ok(())
    }

    // ----- Head -----

    pub(crate) fn lock_commits(&self) -> MutexGuard<'_, ()> {
        self.inner.commit_lock.lock().unwrap()
    }

    pub(crate) fn read_head(&self) -> Result<Head> {
        match self.get(Table::Head, HEAD_KEY)? {
            Some(bytes) => Ok(postcard::from_bytes(&bytes)?),
            None => Ok(Head::default()),
        }
    }

    pub(crate) fn write_head(&self, head: &Head) -> Result<()> {
        self.insert(Table::Head, HEAD_KEY, postcard::to_allocvec(head)?)
    }

    // ----- Blocks -----

    pub(crate) fn put_block(&self, kind: ChainKind, seq: u64, block: &SignedMessage) -> Result<()> {
        let (blocks, chain) = kind.tables();
        let hash = block.hash();
        let stored = StoredBlock {
            seq,
            block: block.clone(),
        };
        self.insert(blocks, hash.as_bytes(), postcard::to_allocvec(&stored)?)?;
        self.insert(chain, &seq_key(seq), hash.as_bytes().to_vec())
    }

    /// Position of an accepted block, if it is visible under `head`.
    pub(crate) fn block_seq(&self, kind: ChainKind, head: &Head, hash: &BlockHash) -> Result<Option<u64>> {
        let (blocks, chain) = kind.tables();
        let Some(bytes) = self.get(blocks, hash.as_bytes())? else {
            return Ok(None);
        };
        let stored: StoredBlock = postcard::from_bytes(&bytes)?;
        // Blocks past the head, or displaced from their index, belong to a
        // commit that never completed.
        if stored.seq >= kind.len(head) {
            return Ok(None);
        }
        let indexed = self.get(chain, &seq_key(stored.seq))?;
        Ok((indexed.as_deref() == Some(hash.as_bytes().as_slice())).then_some(stored.seq))
    }

    fn block_at(&self, kind: ChainKind, seq: u64) -> Result<SignedMessage> {
        let (blocks, chain) = kind.tables();
        let hash = self
            .get(chain, &seq_key(seq))?
            .ok_or_else(|| StoreError::Storage(format!("missing chain index {seq}")))?;
        let bytes = self
            .get(blocks, &hash)?
            .ok_or_else(|| StoreError::Storage(format!("missing block at index {seq}")))?;
        let stored: StoredBlock = postcard::from_bytes(&bytes)?;
        Ok(stored.block)
    }

    fn fetch(&self, kind: ChainKind, after: Option<&BlockHash>, limit: usize) -> Result<Vec<SignedMessage>> {
        let head = self.read_head()?;
        let start = match after {
            None => 0,
            Some(hash) => {
                self.block_seq(kind, &head, hash)?
                    .ok_or(StoreError::UnknownBlock(*hash))?
                    + 1
            }
        };
        let end = kind.len(&head).min(start.saturating_add(limit as u64));
        (start..end).map(|seq| self.block_at(kind, seq)).collect()
    }

    /// Accepted main-chain blocks strictly after `after` (or from genesis),
    /// oldest first, at most `limit` of them.
    pub fn fetch_blocks(&self, after: Option<&BlockHash>, limit: usize) -> Result<Vec<SignedMessage>> {
        self.fetch(ChainKind::Main, after, limit)
    }

    /// Same as [`fetch_blocks`](Self::fetch_blocks) for the audit log chain.
    pub fn fetch_log_blocks(&self, after: Option<&BlockHash>, limit: usize) -> Result<Vec<SignedMessage>> {
        self.fetch(ChainKind::Log, after, limit)
    }

    /// Whether `hash` is the main-chain tip or one of its ancestors.
    pub fn has_block(&self, hash: &BlockHash) -> Result<bool> {
        let head = self.read_head()?;
        Ok(self.block_seq(ChainKind::Main, &head, hash)?.is_some())
    }

    pub fn last_block_hash(&self) -> Result<Option<BlockHash>> {
        Ok(self.read_head()?.main_tip)
    }

    pub fn last_log_block_hash(&self) -> Result<Option<BlockHash>> {
        Ok(self.read_head()?.log_tip)
    }

    pub fn team_state(&self) -> Result<Option<TeamState>> {
        Ok(self.read_head()?.team_state)
    }

    pub fn log_state(&self) -> Result<Option<LogChainState>> {
        Ok(self.read_head()?.log_state)
    }

    // ----- Audit queue -----

    /// Queue an audit record for shipping on the log chain.
    pub fn queue_audit_log(&self, data: Vec<u8>) -> Result<AuditRecord> {
        let _guard = self.lock_commits();
        let mut head = self.read_head()?;
        let record = AuditRecord {
            seq: head.audit_len,
            data_hash: sha256(&data),
            data,
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        };
        self.insert(Table::Audit, &seq_key(record.seq), postcard::to_allocvec(&record)?)?;
        head.audit_len += 1;
        self.write_head(&head)?;
        debug!(seq = record.seq, "queued audit record");
        Ok(record)
    }

    pub(crate) fn audit_record(&self, seq: u64) -> Result<Option<AuditRecord>> {
        match self.get(Table::Audit, &seq_key(seq))? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Records queued but neither sent nor discarded.
    pub fn unsent_audit_logs(&self) -> Result<Vec<AuditRecord>> {
        let head = self.read_head()?;
        let mut records = Vec::new();
        for seq in head.audit_sent..head.audit_len {
            if let Some(record) = self.audit_record(seq)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}
