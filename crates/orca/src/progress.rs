// AI
//! 📊 progress.rs: "Are we there yet?" asks every bus passenger and every loader, forever.
//!
//! 🚀 One bar over trips, one comfy-table panel underneath with rows/s,
//! batches and elapsed time. The log gets the facts; the terminal gets the show.
//!
//! ⚠️  Watching this progress bar will not make Postgres go faster.
//! We've tried. Science says no.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS when the depot has been at it a while.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📈 Rows and batches per second over the sliding window.
struct Rates {
    rows_per_sec: f64,
    batches_per_sec: f64,
}

/// 📊 Tracks trips, committed rows and committed batches for one run.
///
/// Rates use a sliding 5-second window so one slow COPY doesn't make the
/// panel look like a seismograph.
pub(crate) struct IngestProgress {
    total_trips: u64,
    trips_done: u64,
    current_trip: String,
    current_trip_batches: usize,
    current_trip_done: usize,
    total_rows: u64,
    total_batches: u64,
    progress_bar: ProgressBar,
    /// 🔄 (when, rows so far, batches so far)
    rate_samples: VecDeque<(Instant, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for IngestProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("IngestProgress")
            .field("total_trips", &self.total_trips)
            .field("trips_done", &self.trips_done)
            .field("total_rows", &self.total_rows)
            .field("total_batches", &self.total_batches)
            .finish()
    }
}

impl IngestProgress {
    /// 🚀 `visible = false` gives a hidden bar: same bookkeeping, no terminal output.
    pub(crate) fn new(total_trips: u64, visible: bool) -> Self {
        let progress_bar = if visible {
            ProgressBar::new(total_trips)
        } else {
            ProgressBar::hidden()
        };
        let template = "{msg}\n| [{bar:40.cyan/blue}] {pos}/{len} trips";
        match ProgressStyle::default_bar().template(template) {
            Ok(style) => progress_bar.set_style(style.progress_chars("=>-")),
            Err(err) => {
                debug!(error = %err, "progress template rejected; keeping the default style")
            }
        }

        let start_time = Instant::now();
        // -- 🔄 seed the window with t=0 so we don't divide by zero like animals
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64));

        Self {
            total_trips,
            trips_done: 0,
            current_trip: String::new(),
            current_trip_batches: 0,
            current_trip_done: 0,
            total_rows: 0,
            total_batches: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    pub(crate) fn start_trip(&mut self, name: &str, batches: usize) {
        self.current_trip = name.to_string();
        self.current_trip_batches = batches;
        self.current_trip_done = 0;
        self.refresh();
    }

    /// 📦 One batch committed with `rows` rows.
    pub(crate) fn record_batch(&mut self, rows: u64) {
        self.total_rows += rows;
        self.total_batches += 1;
        self.current_trip_done += 1;
        self.refresh();
    }

    /// ✅ The trip is behind us, loaded, skipped or failed.
    pub(crate) fn finish_trip(&mut self) {
        self.trips_done += 1;
        self.progress_bar.set_position(self.trips_done);
        self.refresh();
    }

    #[cfg(test)]
    pub(crate) fn rows(&self) -> u64 {
        self.total_rows
    }

    #[cfg(test)]
    pub(crate) fn batches(&self) -> u64 {
        self.total_batches
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 🏁 Ring the bell.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    /// 💀 Leave the bar where it stopped, so the last frame shows where things went wrong.
    pub(crate) fn abandon(&self) {
        self.progress_bar.abandon();
    }

    fn refresh(&mut self) {
        let rates = self.calculate_rates();
        self.render(rates);
    }

    fn calculate_rates(&mut self) -> Rates {
        let now = Instant::now();
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples
            .push_back((now, self.total_rows, self.total_batches));

        if let Some(&(oldest_time, oldest_rows, oldest_batches)) = self.rate_samples.front() {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                return Rates {
                    rows_per_sec: self.total_rows.saturating_sub(oldest_rows) as f64 / elapsed,
                    batches_per_sec: self.total_batches.saturating_sub(oldest_batches) as f64
                        / elapsed,
                };
            }
        }

        // -- 💤 not enough elapsed time yet; zeros and composure
        Rates {
            rows_per_sec: 0.0,
            batches_per_sec: 0.0,
        }
    }

    /// 🎨 Layout:
    /// ```text
    /// trip: <name> (batch 3/12)
    ///   <rows/s>       <total rows>
    ///   <batches/s>    <total batches>
    ///   <elapsed>      <trips done/total>
    /// | [=====>----------] 4/20 trips
    /// ```
    fn render(&self, rates: Rates) {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        table.add_row(vec![
            Cell::new(format!("{} rows/s", format_number(rates.rows_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} rows", format_number(self.total_rows)))
                .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{:.2} batches/s", rates.batches_per_sec))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} batches", format_number(self.total_batches)))
                .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(self.elapsed())))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{}/{} trips", self.trips_done, self.total_trips))
                .set_alignment(CellAlignment::Right),
        ]);

        self.progress_bar.set_message(format!(
            "trip: {} (batch {}/{})\n{}",
            self.current_trip, self.current_trip_done, self.current_trip_batches, table
        ));
    }
}
