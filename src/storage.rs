//! File-backed snapshots for the index state.
//!
//! Each logical write is framed as a transaction: the snapshot is encoded
//! into a temporary file in the target directory and atomically renamed
//! over the previous one, so a crash or I/O failure never exposes a partial
//! snapshot. Contended opens are retried with bounded backoff before they
//! escalate.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::warn;

use crate::error::{EngineError, Result};

const RETRY_ATTEMPTS: u32 = 20;
const RETRY_SPACING: Duration = Duration::from_millis(100);

/// Load a snapshot. A missing file is `None`, not an error; anything else
/// unreadable is a backend failure.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match with_retry(|| fs::read(path)) {
        Ok(bytes) => bytes,
        Err(EngineError::Backend(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Persist a snapshot atomically: write a sibling temp file, flush it, then
/// rename it over the target.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| EngineError::invalid(format!("bad store path {path:?}")))?;
    with_retry(|| fs::create_dir_all(parent))?;

    let bytes = serde_json::to_vec(value)?;
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    let write_result = with_retry(|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    });
    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = with_retry(|| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

/// Run a store operation, retrying transient contention with fixed spacing
/// before escalating. Non-transient failures propagate immediately.
fn with_retry<T>(mut op: impl FnMut() -> io::Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if transient(e.kind()) => {
                attempt += 1;
                if attempt >= RETRY_ATTEMPTS {
                    return Err(EngineError::Transient {
                        attempts: attempt,
                        source: e,
                    });
                }
                warn!(attempt, error = %e, "store contended, backing off");
                thread::sleep(RETRY_SPACING);
            }
            Err(e) => return Err(EngineError::Backend(e)),
        }
    }
}
