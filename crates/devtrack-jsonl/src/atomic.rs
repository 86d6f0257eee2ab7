//! Crash-safe replacement of a whole JSONL file.
//!
//! Records go to `<name>.tmp` next to the target, which is flushed and
//! synced before being renamed over the target. A reader (or a restart after
//! a crash) sees the previous contents or the new ones, never a mix.

use crate::{JsonlWriter, Result};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Replace `path` with one line per record in `records`.
///
/// # Errors
///
/// Fails if the sibling temp file cannot be created or synced, a record does
/// not serialize, or the rename fails. The target is untouched on failure
/// and the temp file is removed when possible.
pub async fn write_jsonl_atomic<T, P>(path: P, records: &[T]) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let target = path.as_ref();
    let scratch = scratch_path(target);

    let written = match write_and_sync(&scratch, records).await {
        Ok(()) => tokio::fs::rename(&scratch, target).await.map_err(Into::into),
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        discard(&scratch).await;
        return Err(e);
    }

    tracing::trace!(path = %target.display(), records = records.len(), "Replaced JSONL file");
    Ok(())
}

async fn discard(scratch: &Path) {
    if tokio::fs::remove_file(scratch).await.is_err() {
        tracing::debug!(path = %scratch.display(), "No temp file to clean up");
    }
}

/// `deps.jsonl` -> `deps.jsonl.tmp`, in the same directory so the rename
/// never crosses filesystems.
fn scratch_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map_or_else(OsString::new, ToOwned::to_owned);
    name.push(".tmp");
    target.with_file_name(name)
}

async fn write_and_sync<T: Serialize>(scratch: &Path, records: &[T]) -> Result<()> {
    let file = tokio::fs::File::create(scratch).await?;
    let mut writer = JsonlWriter::new(file);
    for record in records {
        writer.write(record).await?;
    }
    writer.flush().await?;
    writer.into_inner().into_inner().sync_all().await?;
    Ok(())
}
