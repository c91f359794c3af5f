//! # Kestrel Core
//!
//! Buffer lifecycle and persistence: opening files, tracking whether they
//! changed, writing them back (directly or through a privilege helper), and
//! carrying undo history and cursor position across sessions.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          Buffer                           │
//! │  ┌────────────┐ ┌────────────┐ ┌──────────────────────┐  │
//! │  │ LineArray  │ │  EventLog  │ │ Def + Highlighter    │  │
//! │  └────────────┘ └────────────┘ └──────────────────────┘  │
//! │        │  dirty tracker  │  save pipeline  │  resolver   │
//! │        └─────────────────┼─────────────────┘             │
//! │                   session store                          │
//! └──────────────────────────┬───────────────────────────────┘
//!                            │ Arc<Context>
//!                ┌───────────┴───────────┐
//!                │  Config  RuntimeFiles │
//!                └───────────────────────┘
//! ```
//!
//! ## Learning: Shared immutable context
//!
//! Configuration and the runtime file registry are loaded once and shared
//! by every buffer through an `Arc<Context>`. Each buffer copies the
//! settings it needs into its own `Settings` value, so changing one buffer's
//! settings never leaks into another.

pub mod buffer;
pub mod config;
pub mod context;
pub mod privileged;
pub mod runtime;
pub mod save;
pub mod session;
pub mod syntax;
pub mod util;

pub use buffer::{BufKind, BufType, Buffer, LARGE_FILE_THRESHOLD};
pub use config::{Config, ConfigError, FileFormat, Settings};
pub use context::Context;
pub use runtime::{MemoryFile, RealFile, RuntimeFile, RuntimeFiles};
pub use session::SerializedBuffer;

use std::path::PathBuf;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{} is a directory", .0.display())]
    IsDirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start {command}: {source}")]
    PrivilegedSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    PrivilegedSaveFailed {
        command: String,
        status: std::process::ExitStatus,
    },

    #[error("Save interrupted")]
    PrivilegedSaveInterrupted,

    #[error(
        "Cannot read session {}: {source}\nYou may want to remove the files in the buffers \
         directory of your config dir (they store the savecursor and saveundo state) \
         if this problem persists.",
        .path.display()
    )]
    SessionCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Error loading syntax file {name}: {source}")]
    SyntaxLoad {
        name: String,
        #[source]
        source: SyntaxLoadError,
    },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] kestrel_buffer::BufferError),
}

/// Why a syntax file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxLoadError {
    #[error("{0}")]
    Read(#[from] std::io::Error),

    #[error("{0}")]
    Syntax(#[from] kestrel_syntax::SyntaxError),
}
