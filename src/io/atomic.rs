//! Atomic file replacement.
//!
//! The codec itself never touches the filesystem. Callers that write a
//! rewritten file back to disk go through [`write_atomic`], which stages the
//! bytes in a temporary file next to the destination and renames it over the
//! target, so a failed write leaves the original untouched.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

/// Write `bytes` to `path`, replacing any existing file atomically.
///
/// The temporary file is created in the destination's directory so the final
/// rename never crosses a filesystem boundary.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;

    // Keep the original permissions when replacing an existing file
    if let Ok(metadata) = std::fs::metadata(path) {
        staged.as_file().set_permissions(metadata.permissions())?;
    }

    staged.persist(path).map_err(|e| e.error)?;
    debug!("replaced {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
