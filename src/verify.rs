use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::checkers::{CheckContext, check_asset};
use crate::config::Config;
use crate::error::{Result, VerifyError};
use crate::findings::FindingSink;
use crate::orphans::scan_unused;
use crate::progress::ProgressState;
use crate::skip::remove_skippable;
use crate::types::{AssetFinding, AssetRecord, RepairAssetType, RunSummary};
use crate::utils::relative_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    CatalogBuilt,
    Filtered,
    Dispatching,
    Aggregated,
    Done,
    Failed,
    Cancelled,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Append-only output shared by every worker of one run.
#[derive(Debug, Default)]
pub struct BrokenAssets {
    records: Mutex<Vec<AssetRecord>>,
}

impl BrokenAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: AssetRecord) {
        match self.records.lock() {
            Ok(mut guard) => guard.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }

    pub fn len(&self) -> usize {
        match self.records.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<AssetRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn into_inner(self) -> Vec<AssetRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drives one verification run over a manifest.
///
/// The manifest is rewritten in place: on success it holds only the broken,
/// patchable and unused records. Checks run on a working copy, so on failure
/// the manifest keeps its filtered pre-dispatch records with their flags
/// unchanged.
pub struct Verifier<S: FindingSink> {
    config: Config,
    sink: S,
    progress: Arc<ProgressState>,
    cancel: CancelToken,
    phase: Mutex<RunPhase>,
}

impl<S: FindingSink> Verifier<S> {
    pub fn new(config: Config, sink: S) -> Self {
        Self {
            config,
            sink,
            progress: Arc::new(ProgressState::new()),
            cancel: CancelToken::new(),
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressState>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn progress(&self) -> Arc<ProgressState> {
        Arc::clone(&self.progress)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> RunPhase {
        match self.phase.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn enter(&self, phase: RunPhase) {
        debug!("verification phase: {phase}");
        match self.phase.lock() {
            Ok(mut guard) => *guard = phase,
            Err(poisoned) => *poisoned.into_inner() = phase,
        }
    }

    pub fn run(&self, manifest: &mut Vec<AssetRecord>) -> Result<RunSummary> {
        self.enter(RunPhase::Idle);
        let result = self.run_phases(manifest);
        match &result {
            Ok(summary) => {
                self.enter(RunPhase::Done);
                info!(
                    "Verification done: {} checked, {} broken, {} unused",
                    summary.checked, summary.broken, summary.unused
                );
            }
            Err(e) if e.is_cancelled() => {
                self.enter(RunPhase::Cancelled);
                info!("Verification cancelled");
            }
            Err(e) => {
                self.enter(RunPhase::Failed);
                warn!("Verification failed: {e}");
            }
        }
        result
    }

    fn run_phases(&self, manifest: &mut Vec<AssetRecord>) -> Result<RunSummary> {
        self.config
            .validate()
            .map_err(|e| VerifyError::Config(format!("{e:#}")))?;
        self.cancel.check()?;
        self.progress.reset();
        let output = BrokenAssets::new();
        let mut summary = RunSummary::default();

        let catalog = Catalog::build(manifest, &self.config);
        info!("Catalog built with {} expected paths", catalog.len());
        if self.config.main_package_only {
            info!("Main package only, unused file scan skipped");
        } else {
            for record in scan_unused(&catalog, &self.config, &self.cancel)? {
                warn!("Unused file has been found: {}", record.name);
                let finding = AssetFinding::for_record(&record, RepairAssetType::Unused, record.size);
                self.progress.record_found_count_only();
                output.push(record);
                self.sink.publish(finding);
                summary.unused += 1;
            }
        }
        self.enter(RunPhase::CatalogBuilt);

        if !self.config.main_package_only {
            summary.skipped = remove_skippable(manifest, &self.config.skippable_assets);
        }
        self.enter(RunPhase::Filtered);

        let mut working = manifest.clone();
        let duplicates = claim_duplicates(&mut working);
        if duplicates > 0 {
            info!("Ignoring {duplicates} duplicate manifest entries");
        }
        let pending = working.iter().filter(|r| !r.used);
        let (count, size) = pending.fold((0u64, 0u64), |(c, s), r| (c + 1, s + r.size));
        self.progress.set_totals(count, size);
        summary.checked = count as usize;
        info!("Checking {count} assets with {} workers", self.config.concurrency);

        self.enter(RunPhase::Dispatching);
        self.dispatch(&mut working, &output)?;

        let broken = output.into_inner();
        summary.broken = broken.len() - summary.unused;
        summary.patch_applicable = broken.iter().filter(|r| r.patch_applicable).count();
        summary.bytes_found = self.progress.snapshot().size_found;
        *manifest = broken;
        self.enter(RunPhase::Aggregated);
        Ok(summary)
    }

    fn dispatch(&self, records: &mut [AssetRecord], output: &BrokenAssets) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency)
            .thread_name(|idx| format!("assetcheck-worker-{idx}"))
            .build()
            .map_err(|e| VerifyError::WorkerPool(e.to_string()))?;
        let abort = self.cancel.child();
        let ctx = CheckContext::new(&self.config, &self.progress, &self.sink, output, &abort);

        let faults: Vec<(usize, VerifyError)> = pool.install(|| {
            records
                .par_iter_mut()
                .enumerate()
                .filter(|(_, record)| !record.used)
                .filter_map(|(idx, record)| {
                    record.used = true;
                    match check_asset(record, &ctx) {
                        Ok(()) => None,
                        Err(e) => {
                            if !e.is_cancelled() {
                                abort.cancel();
                            }
                            Some((idx, e))
                        }
                    }
                })
                .collect()
        });

        match first_fault(faults) {
            None => Ok(()),
            Some((idx, err)) => {
                if !err.is_cancelled() {
                    warn!("Asset #{idx} aborted the run: {err}");
                }
                Err(err)
            }
        }
    }
}

/// Mark every repeated `(path, type)` entry as already processed so each
/// asset is checked and reported once. Returns how many were claimed.
fn claim_duplicates(records: &mut [AssetRecord]) -> usize {
    let mut seen = HashSet::with_capacity(records.len());
    let mut claimed = 0;
    for record in records.iter_mut().filter(|r| !r.used) {
        if !seen.insert((relative_key(&record.name), record.file_type)) {
            record.used = true;
            claimed += 1;
        }
    }
    claimed
}

/// The lowest-index real fault, or the lowest-index cancellation when every
/// worker was only cancelled.
fn first_fault(mut faults: Vec<(usize, VerifyError)>) -> Option<(usize, VerifyError)> {
    faults.sort_by_key(|(idx, _)| *idx);
    let pos = faults
        .iter()
        .position(|(_, e)| !e.is_cancelled())
        .unwrap_or(0);
    (pos < faults.len()).then(|| faults.swap_remove(pos))
}

/// One-shot convenience: verify `manifest` in place and return the summary.
pub fn verify<S: FindingSink>(config: Config, sink: S, manifest: &mut Vec<AssetRecord>) -> Result<RunSummary> {
    Verifier::new(config, sink).run(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::digest_bytes;
    use crate::findings::FindingCollector;
    use crate::types::{DigestAlgorithm, FileType};

    fn md5(bytes: &[u8]) -> Vec<u8> {
        digest_bytes(bytes, DigestAlgorithm::Md5)
    }

    fn install() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn broken_assets_accepts_concurrent_pushes() {
        let output = BrokenAssets::new();
        std::thread::scope(|s| {
            for i in 0..4 {
                let output = &output;
                s.spawn(move || output.push(AssetRecord::unused(format!("{i}.bin"), 1)));
            }
        });
        assert_eq!(output.len(), 4);
        assert_eq!(output.into_inner().len(), 4);
    }

    #[test]
    fn clean_run_empties_manifest_and_reaches_done() {
        let dir = install();
        std::fs::write(dir.path().join("a.bin"), b"abc").unwrap();
        let verifier = Verifier::new(Config::for_install(dir.path()), FindingCollector::new());
        let mut manifest = vec![AssetRecord::new("a.bin", 3, FileType::Generic, md5(b"abc"))];

        let summary = verifier.run(&mut manifest).unwrap();
        assert!(manifest.is_empty());
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.broken, 0);
        assert_eq!(verifier.phase(), RunPhase::Done);
        let snap = verifier.progress().snapshot();
        assert_eq!(snap.count_total, 1);
        assert_eq!(snap.count_current, 1);
    }

    #[test]
    fn records_already_used_are_not_dispatched() {
        let dir = install();
        let mut used = AssetRecord::new("gone.bin", 3, FileType::Generic, md5(b"abc"));
        used.used = true;
        let mut manifest = vec![used];
        let summary = verify(
            Config::for_install(dir.path()),
            FindingCollector::new(),
            &mut manifest,
        )
        .unwrap();
        assert_eq!(summary.checked, 0);
        assert!(manifest.is_empty());
    }

    #[test]
    fn invalid_config_fails_before_touching_the_manifest() {
        let dir = install();
        let config = Config {
            concurrency: 0,
            ..Config::for_install(dir.path())
        };
        let verifier = Verifier::new(config, FindingCollector::new());
        let mut manifest = vec![AssetRecord::new("a.bin", 3, FileType::Generic, md5(b"abc"))];
        let err = verifier.run(&mut manifest).unwrap_err();
        assert!(matches!(err, VerifyError::Config(_)));
        assert_eq!(manifest.len(), 1);
        assert!(!manifest[0].used);
        assert_eq!(verifier.phase(), RunPhase::Failed);
    }

    #[test]
    fn cancelled_token_yields_cancelled_phase() {
        let dir = install();
        let token = CancelToken::new();
        token.cancel();
        let verifier =
            Verifier::new(Config::for_install(dir.path()), FindingCollector::new()).with_cancel_token(token);
        let mut manifest = vec![AssetRecord::new("a.bin", 3, FileType::Generic, md5(b"abc"))];
        let err = verifier.run(&mut manifest).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(verifier.phase(), RunPhase::Cancelled);
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn duplicate_entries_are_checked_once() {
        let dir = install();
        let mut manifest = vec![
            AssetRecord::new("gone.bin", 3, FileType::Generic, md5(b"abc")),
            AssetRecord::new("GONE.bin", 3, FileType::Generic, md5(b"abc")),
            AssetRecord::new("gone.bin", 3, FileType::Video, md5(b"abc")),
        ];
        let summary = verify(
            Config::for_install(dir.path()),
            FindingCollector::new(),
            &mut manifest,
        )
        .unwrap();
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.broken, 2);
        assert_eq!(summary.bytes_found, 6);
    }

    #[test]
    fn claim_keeps_the_first_of_each_path_and_type() {
        let mut records = vec![
            AssetRecord::new("Data\\a.bin", 1, FileType::Generic, vec![]),
            AssetRecord::new("data/A.BIN", 1, FileType::Generic, vec![]),
            AssetRecord::new("data/b.bin", 1, FileType::Generic, vec![]),
        ];
        assert_eq!(claim_duplicates(&mut records), 1);
        let used: Vec<bool> = records.iter().map(|r| r.used).collect();
        assert_eq!(used, [false, true, false]);
    }

    #[test]
    fn lowest_real_fault_wins_over_cancelled_siblings() {
        let io = |name: &str| VerifyError::io(name, std::io::Error::other("boom"));
        let faults = vec![
            (7, io("late.bin")),
            (1, VerifyError::Cancelled),
            (4, io("early.bin")),
        ];
        let (idx, err) = first_fault(faults).unwrap();
        assert_eq!(idx, 4);
        assert!(matches!(err, VerifyError::Io { ref path, .. } if path.ends_with("early.bin")));

        let (idx, err) = first_fault(vec![(3, VerifyError::Cancelled), (2, VerifyError::Cancelled)]).unwrap();
        assert_eq!(idx, 2);
        assert!(err.is_cancelled());

        assert!(first_fault(Vec::new()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn fault_leaves_manifest_retryable() {
        let dir = install();
        let looped = dir.path().join("loop.bin");
        std::os::unix::fs::symlink(&looped, &looped).unwrap();
        let config = Config {
            concurrency: 1,
            ..Config::for_install(dir.path())
        };
        let verifier = Verifier::new(config.clone(), FindingCollector::new());
        let mut manifest = vec![
            AssetRecord::new("gone.bin", 3, FileType::Generic, md5(b"abc")),
            AssetRecord::new("loop.bin", 3, FileType::Generic, md5(b"abc")),
        ];
        let before = manifest.clone();

        let err = verifier.run(&mut manifest).unwrap_err();
        assert!(matches!(err, VerifyError::Io { .. }));
        assert_eq!(verifier.phase(), RunPhase::Failed);
        assert_eq!(manifest, before);

        std::fs::remove_file(&looped).unwrap();
        let summary = verify(config, FindingCollector::new(), &mut manifest).unwrap();
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.broken, 2);
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn skip_filter_runs_before_dispatch() {
        let dir = install();
        let config = Config {
            skippable_assets: vec!["b.bin$Generic".into()],
            ..Config::for_install(dir.path())
        };
        let mut manifest = vec![
            AssetRecord::new("a.bin", 1, FileType::Generic, md5(b"a")),
            AssetRecord::new("b.bin", 1, FileType::Generic, md5(b"b")),
        ];
        let summary = verify(config, FindingCollector::new(), &mut manifest).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.checked, 1);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest[0].name, "a.bin");
    }
}
