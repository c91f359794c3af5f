//! Saving through a privilege helper.
//!
//! When the editor cannot write a file itself, the content is piped into
//! `<sucmd> tee <path>` so the helper (normally `sudo`) does the writing.
//!
//! ## Learning: Racing futures with `tokio::select!`
//!
//! The helper can wait on a password prompt forever, so the save takes a
//! cancellation future from the caller. `select!` polls the helper and the
//! cancellation together and runs the branch of whichever finishes first.
//! The losing future is dropped before the branch body runs, which is why
//! the cancel branch can still use `child` to kill the helper.

use std::ffi::OsStr;
use std::future::Future;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::buffer::Buffer;
use crate::util::{mod_time, replace_home};
use crate::{CoreError, CoreResult};

impl Buffer {
    /// Saves to the current path through the privilege helper.
    pub async fn save_with_sudo<C: Future>(&mut self, cancel: C) -> CoreResult<()> {
        let path = self.path.clone();
        self.save_as_with_sudo(&path, cancel).await
    }

    /// Saves to `filename` through the privilege helper.
    ///
    /// The path is updated before the helper runs. The save is abandoned
    /// with `PrivilegedSaveInterrupted` if `cancel` completes first.
    pub async fn save_as_with_sudo<C: Future>(
        &mut self,
        filename: &str,
        cancel: C,
    ) -> CoreResult<()> {
        self.update_rules();
        let target = replace_home(filename);
        self.set_path(&target);

        let data = self.bytes();
        let sucmd = self.settings.sucmd.clone();
        let args = [OsStr::new("tee"), OsStr::new(&target)];
        run_helper(&sucmd, &args, &data, cancel).await?;

        self.update_dirty_baseline(data.len() as u64);
        self.is_modified = false;
        self.mod_time = mod_time(&target);
        info!("Saved {} with {} ({} bytes)", target, sucmd, data.len());

        self.serialize_or_warn();
        Ok(())
    }
}

/// Runs `command args...` with `input` on stdin and stdout discarded.
///
/// A non-zero exit is reported in preference to a failed write to stdin,
/// since a helper that exits early also breaks the pipe.
pub async fn run_helper<C: Future>(
    command: &str,
    args: &[&OsStr],
    input: &[u8],
    cancel: C,
) -> CoreResult<()> {
    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CoreError::PrivilegedSpawn {
            command: command.to_string(),
            source,
        })?;
    debug!("Started {} {:?}", command, args);

    tokio::select! {
        (fed, status) = async {
            let fed = match child.stdin.take() {
                Some(mut stdin) => stdin.write_all(input).await,
                None => Ok(()),
            };
            (fed, child.wait().await)
        } => {
            let status = status?;
            if !status.success() {
                return Err(CoreError::PrivilegedSaveFailed {
                    command: command.to_string(),
                    status,
                });
            }
            fed?;
            Ok(())
        }
        _ = cancel => {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop {}: {}", command, e);
            }
            Err(CoreError::PrivilegedSaveInterrupted)
        }
    }
}
