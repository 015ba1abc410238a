//! Progress reporting and display
//!
//! Drivers report through [`ProgressReporter`] and never print directly, so the same
//! run can be shown as a live display, as plain stderr lines, or not at all.

use std::sync::{Arc, RwLock};

/// Status of a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Being built and archived (or decoded)
    Processing,
    /// Successfully completed
    Done,
    /// Failed with error
    Failed(String),
}

/// Phase of the overall run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    /// Loading the field mapping
    LoadingMapping,
    /// Loading the tag dictionary
    PrimingDictionary,
    /// Creating or clearing the destination table
    PreparingArchive,
    /// Paging through the source
    Archiving,
    /// Reading archived entries back
    Rehydrating,
    /// Completed successfully
    Completed,
    /// Failed with error
    Failed(String),
}

impl RunPhase {
    fn describe(&self) -> (&'static str, &'static str) {
        match self {
            RunPhase::LoadingMapping => ("📋", "Loading mapping..."),
            RunPhase::PrimingDictionary => ("📖", "Loading tag dictionary..."),
            RunPhase::PreparingArchive => ("🗄️ ", "Preparing archive..."),
            RunPhase::Archiving => ("📦", "Archiving records..."),
            RunPhase::Rehydrating => ("💧", "Rehydrating records..."),
            RunPhase::Completed => ("✅", "Completed!"),
            RunPhase::Failed(_) => ("❌", "Failed"),
        }
    }
}

/// Progress reporter trait - implement this for different display backends.
pub trait ProgressReporter: Send + Sync {
    /// Set the overall run phase.
    fn set_phase(&self, phase: RunPhase);

    /// A page of `rows` rows has been fully processed.
    fn page_done(&self, page: usize, rows: usize);

    /// Update the status of a specific record.
    fn update_entry(&self, entry: &str, status: EntryStatus);

    fn log_info(&self, message: &str);

    fn log_warn(&self, message: &str);

    /// Finish and clean up the display.
    fn finish(&self);
}

/// A no-op reporter for when progress display is disabled.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: RunPhase) {}
    fn page_done(&self, _page: usize, _rows: usize) {}
    fn update_entry(&self, _entry: &str, _status: EntryStatus) {}
    fn log_info(&self, _message: &str) {}
    fn log_warn(&self, _message: &str) {}
    fn finish(&self) {}
}

/// Statistics collected during a run.
#[derive(Debug, Default)]
struct Stats {
    pages: usize,
    rows: usize,
    successful_entries: usize,
    failed_entries: usize,
    start_time: Option<std::time::Instant>,
}

impl Stats {
    fn started() -> RwLock<Self> {
        RwLock::new(Self {
            start_time: Some(std::time::Instant::now()),
            ..Default::default()
        })
    }

    fn record(&mut self, status: &EntryStatus) {
        match status {
            EntryStatus::Done => self.successful_entries += 1,
            EntryStatus::Failed(_) => self.failed_entries += 1,
            EntryStatus::Processing => {}
        }
    }

    fn print_summary(&self) {
        let duration = self.start_time.map(|t| t.elapsed()).unwrap_or_default();

        eprintln!();
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("📊 Summary");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("   📄 Pages:      {} ({} rows)", self.pages, self.rows);
        eprintln!("   ✅ Successful: {}", self.successful_entries);
        if self.failed_entries > 0 {
            eprintln!("   ❌ Failed:     {}", self.failed_entries);
        }
        eprintln!("   ⏱️  Duration:   {:.2}s", duration.as_secs_f64());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

/// A simple reporter that just prints to stderr (for non-TTY).
pub struct SimpleReporter {
    stats: RwLock<Stats>,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self {
            stats: Stats::started(),
        }
    }
}

impl Default for SimpleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: RunPhase) {
        if let RunPhase::Failed(ref e) = phase {
            eprintln!("❌ Failed: {e}");
            return;
        }
        let (emoji, msg) = phase.describe();
        eprintln!("{emoji} {msg}");
    }

    fn page_done(&self, page: usize, rows: usize) {
        let mut stats = self.stats.write().unwrap();
        stats.pages = page;
        stats.rows += rows;
        eprintln!("   page {page}: {rows} rows ({} total)", stats.rows);
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        self.stats.write().unwrap().record(&status);
        if let EntryStatus::Failed(ref e) = status {
            eprintln!("   ✗ {entry}: {e}");
        }
    }

    fn log_info(&self, message: &str) {
        eprintln!("ℹ️  {message}");
    }

    fn log_warn(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn finish(&self) {
        self.stats.read().unwrap().print_summary();
    }
}

/// Live reporter with spinners (for TTY).
pub struct FancyReporter {
    multi: indicatif::MultiProgress,
    phase_bar: indicatif::ProgressBar,
    rows_bar: indicatif::ProgressBar,
    stats: RwLock<Stats>,
}

impl FancyReporter {
    pub fn new() -> Self {
        let multi = indicatif::MultiProgress::new();
        let phase_bar = multi.add(indicatif::ProgressBar::new_spinner());
        phase_bar.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        phase_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        // Row count is open-ended: pagination only learns the total at the end.
        let rows_bar = multi.add(indicatif::ProgressBar::new_spinner());
        rows_bar.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("   {pos} rows, {msg}")
                .unwrap(),
        );

        Self {
            multi,
            phase_bar,
            rows_bar,
            stats: Stats::started(),
        }
    }
}

impl Default for FancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for FancyReporter {
    fn set_phase(&self, phase: RunPhase) {
        if let RunPhase::Failed(ref e) = phase {
            self.phase_bar
                .finish_with_message(format!("❌ Failed: {e}"));
            return;
        }
        let (emoji, msg) = phase.describe();
        let msg = format!("{emoji} {msg}");
        if matches!(phase, RunPhase::Completed) {
            self.phase_bar.finish_with_message(msg);
        } else {
            self.phase_bar.set_message(msg);
        }
    }

    fn page_done(&self, page: usize, rows: usize) {
        let mut stats = self.stats.write().unwrap();
        stats.pages = page;
        stats.rows += rows;
        self.rows_bar.set_position(stats.rows as u64);
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        let mut stats = self.stats.write().unwrap();
        stats.record(&status);
        match status {
            EntryStatus::Processing => self.rows_bar.set_message(format!("⚙️  {entry}")),
            EntryStatus::Done => self.rows_bar.set_message(format!(
                "{} archived, {} failed",
                stats.successful_entries, stats.failed_entries
            )),
            EntryStatus::Failed(ref e) => {
                self.multi.println(format!("   ✗ {entry}: {e}")).ok();
            }
        }
    }

    fn log_info(&self, message: &str) {
        self.multi.println(format!("ℹ️  {message}")).ok();
    }

    fn log_warn(&self, message: &str) {
        self.multi.println(format!("⚠️  {message}")).ok();
    }

    fn finish(&self) {
        self.rows_bar.finish_and_clear();
        self.phase_bar.finish_and_clear();
        self.stats.read().unwrap().print_summary();
    }
}

/// Create an appropriate reporter based on terminal capabilities.
pub fn create_reporter() -> Arc<dyn ProgressReporter> {
    if console::Term::stderr().is_term() {
        Arc::new(FancyReporter::new())
    } else {
        Arc::new(SimpleReporter::new())
    }
}
