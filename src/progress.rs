use std::cell::Cell;
use std::io::{IsTerminal, stderr};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;

use crate::config::Config;
use crate::types::AssetFinding;

const CHECK_BAR_TEMPLATE: &str =
    "{prefix} [{bar:40}] {pos:>5}/{len:<5} | {percent:>3}% | {elapsed_precise}<{eta_precise} | {msg}";

fn ellipsize(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut shortened: String = input.chars().take(keep).collect();
    shortened.push_str("...");
    shortened
}

fn format_byte_progress(done: u64, total: u64) -> String {
    if total > 0 {
        format!("{} / {}", HumanBytes(done), HumanBytes(total))
    } else {
        HumanBytes(done).to_string()
    }
}

/// Shared counters for one verification run.
///
/// Every field is updated independently; readers may observe a mix of old and
/// new values across counters.
#[derive(Debug, Default)]
pub struct ProgressState {
    count_total: AtomicU64,
    size_total: AtomicU64,
    count_current: AtomicU64,
    size_current: AtomicU64,
    count_found: AtomicU64,
    size_found: AtomicU64,
    per_file_current: AtomicU64,
    per_file_total: AtomicU64,
    activity: RwLock<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub count_total: u64,
    pub size_total: u64,
    pub count_current: u64,
    pub size_current: u64,
    pub count_found: u64,
    pub size_found: u64,
    pub per_file_current: u64,
    pub per_file_total: u64,
    pub activity: String,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        for counter in [
            &self.count_total,
            &self.size_total,
            &self.count_current,
            &self.size_current,
            &self.count_found,
            &self.size_found,
            &self.per_file_current,
            &self.per_file_total,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.set_activity(String::new());
    }

    pub fn set_totals(&self, count: u64, size: u64) {
        self.count_total.store(count, Ordering::Relaxed);
        self.size_total.store(size, Ordering::Relaxed);
    }

    /// Marks the start of one asset check.
    pub fn begin_file(&self, name: &str, size: u64) {
        self.count_current.fetch_add(1, Ordering::Relaxed);
        self.per_file_total.store(size, Ordering::Relaxed);
        self.per_file_current.store(0, Ordering::Relaxed);
        self.set_activity(name.to_string());
    }

    /// Bytes consumed while hashing the current file.
    pub fn add_hashed(&self, bytes: u64) {
        self.per_file_current.fetch_add(bytes, Ordering::Relaxed);
        self.size_current.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Bytes read from a companion file; moves only the per-file cursor.
    pub fn add_per_file(&self, bytes: u64) {
        self.per_file_current.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Counts a file that is settled without hashing it.
    pub fn complete_unhashed(&self, size: u64) {
        self.per_file_current.store(size, Ordering::Relaxed);
        self.size_current.fetch_add(size, Ordering::Relaxed);
    }

    /// Reconciles `size_current` when the hashed length differs from the
    /// expected length.
    pub fn adjust_size_current(&self, delta: i64) {
        if delta >= 0 {
            self.size_current.fetch_add(delta as u64, Ordering::Relaxed);
        } else {
            let sub = delta.unsigned_abs();
            let _ = self
                .size_current
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                    Some(v.saturating_sub(sub))
                });
        }
    }

    pub fn record_found(&self, size: u64) {
        self.count_found.fetch_add(1, Ordering::Relaxed);
        self.size_found.fetch_add(size, Ordering::Relaxed);
    }

    /// Orphans count toward the found total but carry no size.
    pub fn record_found_count_only(&self) {
        self.count_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_activity(&self, activity: String) {
        if let Ok(mut guard) = self.activity.write() {
            *guard = activity;
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            count_total: self.count_total.load(Ordering::Relaxed),
            size_total: self.size_total.load(Ordering::Relaxed),
            count_current: self.count_current.load(Ordering::Relaxed),
            size_current: self.size_current.load(Ordering::Relaxed),
            count_found: self.count_found.load(Ordering::Relaxed),
            size_found: self.size_found.load(Ordering::Relaxed),
            per_file_current: self.per_file_current.load(Ordering::Relaxed),
            per_file_total: self.per_file_total.load(Ordering::Relaxed),
            activity: self
                .activity
                .read()
                .map(|a| a.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
thread_local! {
    static FORCE_PROGRESS_TTY: Cell<Option<bool>> = const { Cell::new(None) };
}

fn stderr_supports_progress() -> bool {
    #[cfg(test)]
    {
        if let Some(flag) = FORCE_PROGRESS_TTY.with(|cell| cell.get()) {
            return flag;
        }
    }
    stderr().is_terminal()
}

/// Terminal rendering of a [`ProgressState`]; the caller polls `refresh`.
pub struct ProgressReporter {
    bar: ProgressBar,
    verbosity: u8,
    finalized: Cell<bool>,
}

impl ProgressReporter {
    pub fn maybe_new(config: &Config) -> Option<Self> {
        if config.quiet > 0 {
            return None;
        }
        if !stderr_supports_progress() {
            return None;
        }

        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr_with_hz(15));
        bar.set_style(
            ProgressStyle::with_template(CHECK_BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.set_prefix("[CHECK]");
        bar.set_message("Building catalog...");
        bar.enable_steady_tick(Duration::from_millis(120));

        Some(Self {
            bar,
            verbosity: config.verbose,
            finalized: Cell::new(false),
        })
    }

    /// A handle that can print findings from the consumer thread.
    pub fn printer(&self) -> ProgressBar {
        self.bar.clone()
    }

    pub fn refresh(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_length(snapshot.count_total);
        self.bar
            .set_position(snapshot.count_current.min(snapshot.count_total));
        let mut message = format!(
            "{} | found {} ({})",
            format_byte_progress(snapshot.size_current, snapshot.size_total),
            snapshot.count_found,
            HumanBytes(snapshot.size_found)
        );
        if self.verbosity > 0 && !snapshot.activity.is_empty() {
            message.push_str(&format!(" | {}", ellipsize(&snapshot.activity, 48)));
        }
        self.bar.set_message(message);
    }

    pub fn finalize(&self) {
        if self.finalized.replace(true) {
            return;
        }
        self.bar.finish_and_clear();
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finalize();
    }
}

pub fn format_finding(finding: &AssetFinding) -> String {
    let location = if finding.directory.is_empty() {
        finding.name.clone()
    } else {
        format!("{}/{}", finding.directory, finding.name)
    };
    format!(
        "[{}] {} ({})",
        finding.category,
        location,
        HumanBytes(finding.size)
    )
}

#[cfg(test)]
pub(crate) fn force_progress_tty_for_tests(flag: Option<bool>) {
    FORCE_PROGRESS_TTY.with(|cell| cell.set(flag));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepairAssetType;

    #[test]
    fn quiet_mode_disables_progress_even_when_tty_exists() {
        force_progress_tty_for_tests(Some(true));
        let cfg = Config {
            quiet: 1,
            ..Config::default()
        };
        assert!(ProgressReporter::maybe_new(&cfg).is_none());
        force_progress_tty_for_tests(None);
    }

    #[test]
    fn progress_initializes_when_tty_is_forced() {
        force_progress_tty_for_tests(Some(true));
        let cfg = Config::default();
        let reporter = ProgressReporter::maybe_new(&cfg).expect("should create reporter");
        reporter.refresh(&ProgressSnapshot {
            count_total: 3,
            count_current: 1,
            ..ProgressSnapshot::default()
        });
        drop(reporter);
        force_progress_tty_for_tests(None);
    }

    #[test]
    fn counters_accumulate_and_reset() {
        let state = ProgressState::new();
        state.set_totals(2, 300);
        state.begin_file("a.bin", 100);
        state.add_hashed(60);
        state.add_hashed(40);
        state.record_found(100);
        state.begin_file("b.bin", 200);
        state.complete_unhashed(200);
        state.adjust_size_current(-50);
        state.record_found_count_only();

        let snap = state.snapshot();
        assert_eq!(snap.count_current, 2);
        assert_eq!(snap.size_current, 250);
        assert_eq!(snap.count_found, 2);
        assert_eq!(snap.size_found, 100);
        assert_eq!(snap.per_file_total, 200);
        assert_eq!(snap.activity, "b.bin");

        state.reset();
        assert_eq!(state.snapshot(), ProgressSnapshot::default());
    }

    #[test]
    fn finding_line_includes_directory_and_category() {
        let finding = AssetFinding {
            name: "a.bin".into(),
            category: RepairAssetType::Generic,
            directory: "Data".into(),
            size: 10,
            local_digest: None,
            expected_digest: None,
        };
        assert_eq!(format_finding(&finding), "[Generic] Data/a.bin (10 B)");
    }
}
