//! Per-type verification strategies.
//!
//! Every checker takes exclusive ownership of one record for the duration of
//! the call and shares nothing else with its siblings except the progress
//! counters, the broken-asset output and the finding sink.

pub mod audio;
pub mod block;
pub mod generic;
pub mod video;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::checksum::digest_file;
use crate::config::Config;
use crate::error::{Result, VerifyError};
use crate::findings::FindingSink;
use crate::progress::ProgressState;
use crate::types::{AssetFinding, AssetRecord, FileType};
use crate::utils::normalize_separators;
use crate::verify::BrokenAssets;

/// Everything a checker needs besides the record it owns.
pub struct CheckContext<'a> {
    pub config: &'a Config,
    pub block_dir: PathBuf,
    pub progress: &'a ProgressState,
    pub sink: &'a dyn FindingSink,
    pub output: &'a BrokenAssets,
    pub cancel: &'a CancelToken,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        config: &'a Config,
        progress: &'a ProgressState,
        sink: &'a dyn FindingSink,
        output: &'a BrokenAssets,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            config,
            block_dir: config.block_dir(),
            progress,
            sink,
            output,
            cancel,
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.config
            .install_path
            .join(normalize_separators(name).trim_start_matches('/'))
    }

    /// Hash a record's own file, feeding the run-wide byte counters.
    pub fn hash(&self, path: &Path) -> Result<Vec<u8>> {
        digest_file(path, self.config.digest_algorithm, self.cancel, |n| {
            self.progress.add_hashed(n)
        })
    }

    /// Hash a companion file without counting it toward the run total.
    pub fn hash_companion(&self, path: &Path) -> Result<Vec<u8>> {
        digest_file(path, self.config.digest_algorithm, self.cancel, |n| {
            self.progress.add_per_file(n)
        })
    }

    /// Record a finding: output entry, found counters, then the UI handoff.
    pub fn report(&self, record: &AssetRecord, finding: AssetFinding, found_size: u64) {
        self.output.push(record.clone());
        self.progress.record_found(found_size);
        self.sink.publish(finding);
    }
}

/// Length of the regular file at `path`, or `None` when nothing is there.
///
/// A path whose parent is a regular file is absent too. Any other failure is
/// a fault.
pub fn local_length(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Ok(None),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => Ok(None),
        Err(e) => Err(VerifyError::io(path, e)),
    }
}

/// Route one record to the checker for its type.
pub fn check_asset(record: &mut AssetRecord, ctx: &CheckContext<'_>) -> Result<()> {
    ctx.cancel.check()?;
    match record.file_type {
        FileType::Block => block::check(record, ctx),
        FileType::Audio => audio::check(record, ctx),
        FileType::Video => video::check(record, ctx),
        FileType::Generic | FileType::Unused => generic::check(record, ctx),
    }
}
