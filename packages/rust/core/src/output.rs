//! Output directory handling and per-record file naming.
//!
//! A run owns its output directory exclusively. Each record writes at most
//! two files, both named after its identifier:
//! ```text
//! <output_dir>/
//! ├── <id>.txt
//! ├── <id>_GRANULES.json
//! └── <collection>_RECORDS_<start>-<end>.csv
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use govharvest_shared::{HarvestError, RecordId, Result};

/// Create `dir` if needed and, when `clear` is set, remove the regular files
/// directly inside it. Subdirectories are left untouched.
///
/// Returns the number of files removed.
pub fn prepare_output_dir(dir: &Path, clear: bool) -> Result<usize> {
    std::fs::create_dir_all(dir).map_err(|e| HarvestError::io(dir, e))?;

    if !clear {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(dir).map_err(|e| HarvestError::io(dir, e))? {
        let entry = entry.map_err(|e| HarvestError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| HarvestError::io(&path, e))?;
        if file_type.is_dir() {
            continue;
        }
        std::fs::remove_file(&path).map_err(|e| HarvestError::io(&path, e))?;
        removed += 1;
    }

    if removed > 0 {
        info!(path = %dir.display(), removed, "cleared output directory");
    }
    Ok(removed)
}

/// File-name stem for a record.
///
/// Everything outside `[A-Za-z0-9-_.~]` is percent-encoded, so separators
/// never leave the output directory and distinct identifiers never share a
/// file.
pub fn file_stem(id: &RecordId) -> String {
    urlencoding::encode(id.as_str()).into_owned()
}

/// `<dir>/<id>.txt`
pub fn transcript_path(dir: &Path, id: &RecordId) -> PathBuf {
    dir.join(format!("{}.txt", file_stem(id)))
}

/// `<dir>/<id>_GRANULES.json`
pub fn granules_path(dir: &Path, id: &RecordId) -> PathBuf {
    dir.join(format!("{}_GRANULES.json", file_stem(id)))
}

/// Write `contents` to `path`, replacing any previous file.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| HarvestError::io(path, e))?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}
