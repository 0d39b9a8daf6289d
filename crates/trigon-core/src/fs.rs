// SPDX-License-Identifier: CEPL-1.0
//! Whole-file binary reads (compiled shader blobs and the like).
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads the whole file at `path` into memory.
pub fn read_binary_file(path: impl AsRef<Path>) -> Result<Vec<u8>, FileError> {
    use std::io::Read;

    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|source| FileError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|source| FileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!("read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}
