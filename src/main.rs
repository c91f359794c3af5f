//! # Kestrel
//!
//! Command-line front end for the Kestrel buffer engine: open a file, report
//! what the engine knows about it, and optionally write it back.
//!
//! ## Quick Start
//!
//! ```bash
//! # Inspect a file
//! cargo run -- src/main.rs
//!
//! # Open at line 3, column 2 and save with CRLF endings
//! cargo run -- notes.txt:3:2 --fileformat dos --save
//!
//! # Save a root-owned file through sudo (Ctrl-C aborts the helper)
//! cargo run -- /etc/hosts --sudo
//! ```

use anyhow::Context as _;
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kestrel_core::{Buffer, Context, FileFormat};

/// Kestrel - buffer lifecycle and persistence for a text editor
#[derive(Parser, Debug)]
#[command(name = "kestrel")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to open, optionally followed by :LINE[:COL]
    #[arg(value_name = "FILE")]
    file: String,

    /// Configuration directory (default: $KESTREL_CONFIG_HOME or the platform config dir)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Save the buffer back to its path
    #[arg(long)]
    save: bool,

    /// Save the buffer to another path
    #[arg(long, value_name = "PATH")]
    save_as: Option<String>,

    /// Save through the privilege helper (`sucmd`)
    #[arg(long)]
    sudo: bool,

    /// Line endings to save with
    #[arg(long, value_name = "unix|dos")]
    fileformat: Option<FileFormat>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Where to save, if saving was requested at all.
    fn save_target(&self, current: &str) -> Option<String> {
        match &self.save_as {
            Some(path) => Some(path.clone()),
            None if self.save || self.sudo => Some(current.to_string()),
            None => None,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Kestrel v{}", env!("CARGO_PKG_VERSION"));

    let ctx = Context::load(args.config_dir.as_deref()).context("Failed to load configuration")?;
    let mut buffer =
        Buffer::from_file(&args.file, ctx).with_context(|| format!("Failed to open {}", args.file))?;

    if let Some(format) = args.fileformat {
        buffer.settings_mut().fileformat = format;
    }

    if let Some(target) = args.save_target(buffer.path()) {
        if args.sudo {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime
                .block_on(buffer.save_as_with_sudo(&target, interrupted(tokio::signal::ctrl_c())))
                .with_context(|| format!("Failed to save {target}"))?;
        } else {
            buffer
                .save_as(&target)
                .with_context(|| format!("Failed to save {target}"))?;
        }
    }

    print_summary(&buffer);

    for warning in buffer.take_warnings() {
        eprintln!("warning: {warning}");
    }

    Ok(())
}

/// Resolves when `signal` reports an interrupt. If the signal cannot be
/// listened for, never resolves.
async fn interrupted(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::warn!("Cannot listen for Ctrl-C, the save cannot be interrupted: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_summary(buffer: &Buffer) {
    println!("name:       {}", buffer.name());
    println!("path:       {}", buffer.abs_path().display());
    println!("filetype:   {}", buffer.file_type());
    println!("lines:      {}", buffer.lines_num());
    println!("fileformat: {}", buffer.settings().fileformat);
    println!("modified:   {}", buffer.modified());
    println!("cursor:     {}", buffer.start_cursor());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["kestrel", "test.rs"]);
        assert_eq!(args.file, "test.rs");
        assert!(!args.save);
        assert!(args.save_target("test.rs").is_none());
    }

    #[test]
    fn test_args_with_save_options() {
        let args = Args::parse_from(["kestrel", "a.txt:3", "--save-as", "b.txt", "--fileformat", "dos"]);
        assert_eq!(args.fileformat, Some(FileFormat::Dos));
        assert_eq!(args.save_target("a.txt").as_deref(), Some("b.txt"));
    }

    #[test]
    fn test_sudo_implies_save() {
        let args = Args::parse_from(["kestrel", "/etc/hosts", "--sudo", "-vv"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.save_target("/etc/hosts").as_deref(), Some("/etc/hosts"));
    }

    #[tokio::test]
    async fn test_signal_error_does_not_interrupt() {
        let failed = std::future::ready(Err(std::io::Error::other("no handler")));
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), interrupted(failed)).await;
        assert!(waited.is_err());

        let fired = interrupted(std::future::ready(Ok(())));
        assert!(tokio::time::timeout(std::time::Duration::from_millis(50), fired).await.is_ok());
    }

    #[test]
    fn test_bad_fileformat_rejected() {
        assert!(Args::try_parse_from(["kestrel", "a", "--fileformat", "mac"]).is_err());
    }
}
