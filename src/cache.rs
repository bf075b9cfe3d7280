//! Persistent verdict cache.
//!
//! Uses LMDB (via heed). A verdict is keyed by the SHA-256 of the class bytes
//! plus the fingerprint of the configured annotations, so a cached entry is
//! only reused for identical bytes scanned against the same annotation set.
//! Malformed records are never stored.

use anyhow::{Context, Result};
use heed::types::Str;
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::filter::Verdict;

pub const VERDICTS_DB: &str = "verdicts";
pub const META_DB: &str = "meta";

const SCANS_KEY: &str = "scans";
const DEFAULT_MAP_SIZE: usize = 256 * 1024 * 1024;
const DEFAULT_MAX_DBS: u32 = 4;

type StrDb = Database<Str, Str>;

#[derive(Debug)]
pub struct VerdictCache {
    env: Arc<Env>,
    db_path: PathBuf,
    verdicts: StrDb,
    meta: StrDb,
}

impl VerdictCache {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let env = Arc::new(open_env(&db_path)?);
        let mut wtxn = env.write_txn()?;
        let verdicts = env.create_database::<Str, Str>(&mut wtxn, Some(VERDICTS_DB))?;
        let meta = env.create_database::<Str, Str>(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            db_path,
            verdicts,
            meta,
        })
    }

    pub fn key(bytes: &[u8], fingerprint: &str) -> String {
        let digest = Sha256::digest(bytes);
        format!("{}:{fingerprint}", hex::encode(digest))
    }

    pub fn get(&self, key: &str) -> Result<Option<Verdict>> {
        let rtxn = self.env.read_txn()?;
        let Some(raw) = self.verdicts.get(&rtxn, key)? else {
            return Ok(None);
        };
        // an unreadable row is treated as a miss and overwritten later
        Ok(serde_json::from_str(raw).ok())
    }

    pub fn put_many(&self, entries: &[(String, Verdict)]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self.env.write_txn()?;
        for (key, verdict) in entries {
            let json = serde_json::to_string(verdict)?;
            self.verdicts.put(&mut wtxn, key.as_str(), json.as_str())?;
        }
        wtxn.commit()?;
        Ok(entries.len())
    }

    pub fn record_scan(&self) -> Result<u64> {
        let mut wtxn = self.env.write_txn()?;
        let scans = self
            .meta
            .get(&wtxn, SCANS_KEY)?
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            .saturating_add(1);
        let value = scans.to_string();
        self.meta.put(&mut wtxn, SCANS_KEY, value.as_str())?;
        wtxn.commit()?;
        Ok(scans)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let rtxn = self.env.read_txn()?;
        let mut verdict_entries = 0u64;
        let mut matched_entries = 0u64;
        for item in self.verdicts.iter(&rtxn)? {
            let (_, v) = item?;
            verdict_entries += 1;
            if serde_json::from_str::<Verdict>(v).is_ok_and(|v| v.is_match()) {
                matched_entries += 1;
            }
        }
        let scans = meta_u64(&self.meta, &rtxn, SCANS_KEY)?;

        Ok(CacheStats {
            db_path: self.db_path.to_string_lossy().to_string(),
            verdict_entries,
            matched_entries,
            scans,
        })
    }
}

fn open_env(db_path: &Path) -> Result<Env> {
    let mut options = EnvOpenOptions::new();
    options.map_size(DEFAULT_MAP_SIZE);
    options.max_dbs(DEFAULT_MAX_DBS);
    // SAFETY: We do not use NO_LOCK and keep default LMDB locking guarantees.
    // NO_SUB_DIR keeps the cache a single file at the --db path.
    unsafe {
        options.flags(EnvFlags::NO_SUB_DIR);
        options
            .open(db_path)
            .with_context(|| format!("Failed to create/open db env: {}", db_path.display()))
    }
}

fn meta_u64(db: &StrDb, rtxn: &RoTxn<'_>, key: &str) -> Result<u64> {
    Ok(db
        .get(rtxn, key)?
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0))
}

/// Remove the cache file and its LMDB lock file.
pub fn clear_db(db_path: &Path) -> Result<()> {
    remove_file_if_exists(db_path, "db")?;
    remove_file_if_exists(&lmdb_lock_path(db_path), "db lock")?;
    Ok(())
}

fn lmdb_lock_path(db_path: &Path) -> PathBuf {
    let mut os = db_path.as_os_str().to_os_string();
    os.push("-lock");
    PathBuf::from(os)
}

fn remove_file_if_exists(path: &Path, kind: &str) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {kind} file: {}", path.display()))?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub db_path: String,
    pub verdict_entries: u64,
    pub matched_entries: u64,
    pub scans: u64,
}
