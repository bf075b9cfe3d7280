use anyhow::Result;
use std::env;
use std::path::PathBuf;

use crate::cli::Cli;

pub const DB_ENV: &str = "ANNOTATION_SCANNER_DB";

pub fn resolve_db_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.db.clone() {
        return Ok(p);
    }

    if let Ok(p) = env::var(DB_ENV)
        && !p.is_empty()
    {
        return Ok(PathBuf::from(p));
    }

    Ok(scanner_home()?.join("verdicts.lmdb"))
}

fn scanner_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("annotation-scanner"))
}
