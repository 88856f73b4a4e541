use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the modpack engine.
/// Every module returns `Result<T, ModpackError>`.
#[derive(Debug, Error)]
pub enum ModpackError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Manifest ────────────────────────────────────────
    #[error("Manifest parse error: {0}")]
    ManifestParse(String),

    #[error("Invalid mod reference '{reference}': {reason}")]
    InvalidModReference { reference: String, reason: String },

    #[error("Mod '{identifier}' is declared more than once for the {target} target")]
    DuplicateMod { identifier: String, target: String },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Registry ────────────────────────────────────────
    #[error("Mod not found in registry: {0}")]
    ModNotFound(String),

    #[error("No compatible file for '{identifier}'")]
    NoCompatibleFile { identifier: String },

    #[error("File {file_id} not found for '{identifier}'")]
    FileNotFound { identifier: String, file_id: u64 },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request failed for {url}: HTTP {status}")]
    RequestFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("Refusing file name '{file_name}' for '{identifier}': not a plain file name")]
    UnsafeFileName {
        identifier: String,
        file_name: String,
    },

    #[error("Size mismatch for {path:?}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    // ── Profile ─────────────────────────────────────────
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Profile already exists: {0}")]
    ProfileAlreadyExists(String),

    // ── Archive / patterns ──────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid resource pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    // ── Run control ─────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type ModpackResult<T> = Result<T, ModpackError>;

/// Coarse failure classes reported to callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    NotFound,
    Transport,
    Integrity,
    ProfileExists,
    Cancelled,
    Io,
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorCategory::Parse => "parse",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Transport => "transport",
            ErrorCategory::Integrity => "integrity",
            ErrorCategory::ProfileExists => "profile_exists",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Io => "io",
            ErrorCategory::Other => "other",
        };
        f.write_str(label)
    }
}

impl ModpackError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ModpackError::ManifestParse(_)
            | ModpackError::InvalidModReference { .. }
            | ModpackError::DuplicateMod { .. }
            | ModpackError::Json(_)
            | ModpackError::Pattern(_) => ErrorCategory::Parse,
            ModpackError::ModNotFound(_)
            | ModpackError::NoCompatibleFile { .. }
            | ModpackError::FileNotFound { .. }
            | ModpackError::ProfileNotFound(_) => ErrorCategory::NotFound,
            ModpackError::Http(_) | ModpackError::RequestFailed { .. } => ErrorCategory::Transport,
            ModpackError::SizeMismatch { .. } | ModpackError::UnsafeFileName { .. } => {
                ErrorCategory::Integrity
            }
            ModpackError::ProfileAlreadyExists(_) => ErrorCategory::ProfileExists,
            ModpackError::Cancelled => ErrorCategory::Cancelled,
            ModpackError::Io { .. } | ModpackError::Zip(_) => ErrorCategory::Io,
            ModpackError::Other(_) => ErrorCategory::Other,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModpackError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for ModpackError {
    fn from(source: std::io::Error) -> Self {
        ModpackError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
