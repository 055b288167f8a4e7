use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ast::Program;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON tree in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid binary tree in {path}: {source}")]
    Bincode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("unknown tree format for {path} (expected .json or .bin)")]
    UnknownFormat { path: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeFormat {
    Json,
    Bincode,
}

impl TreeFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(TreeFormat::Json),
            Some("bin") => Some(TreeFormat::Bincode),
            _ => None,
        }
    }
}

pub fn parse_program(bytes: &[u8], format: TreeFormat, path: &Path) -> Result<Program, LoadError> {
    match format {
        TreeFormat::Json => serde_json::from_slice(bytes).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        }),
        TreeFormat::Bincode => bincode::deserialize(bytes).map_err(|source| LoadError::Bincode {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn load_program(path: &Path) -> Result<Program, LoadError> {
    let format = TreeFormat::from_path(path).ok_or_else(|| LoadError::UnknownFormat {
        path: path.to_path_buf(),
    })?;
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let program = parse_program(&bytes, format, path)?;
    tracing::debug!(path = %path.display(), files = program.files.len(), "loaded tree");
    Ok(program)
}

/// Loads every path and concatenates their files into one program.
pub fn load_programs<P: AsRef<Path>>(paths: &[P]) -> Result<Program, LoadError> {
    let mut program = Program::default();
    for path in paths {
        let loaded = load_program(path.as_ref())?;
        program.files.extend(loaded.files);
    }
    Ok(program)
}
