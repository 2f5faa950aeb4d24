//! Progress of submitted jobs and their simulations.
//!
//! [`ProgressTracker`] only holds data. [`ProgressBars`] draws it on the terminal.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use onscale_core::job::{JobProgress, JobStatus};
use std::collections::HashMap;

/// Status shown for entries marked complete locally.
pub const COMPLETE: &str = "COMPLETE";

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    pub id: String,
    /// Position in the display, in order of first observation.
    pub index: usize,
    pub status: String,
    pub percent: u8,
    pub complete: bool,
}

/// Per-simulation status and percentage, keyed by simulation or job id.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    entries: Vec<ProgressEntry>,
    index: HashMap<String, usize>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the entry if it doesn't exist yet.
    pub fn add_simulation(&mut self, id: &str) -> &mut ProgressEntry {
        let idx = match self.index.get(id) {
            Some(idx) => *idx,
            None => {
                let idx = self.entries.len();
                self.entries.push(ProgressEntry {
                    id: id.to_string(),
                    index: idx,
                    status: JobStatus::Created.to_string(),
                    percent: 0,
                    complete: false,
                });
                self.index.insert(id.to_string(), idx);
                idx
            }
        };
        &mut self.entries[idx]
    }

    pub fn set_status(&mut self, id: &str, status: impl Into<String>) {
        self.add_simulation(id).status = status.into();
    }

    /// Clamped to `0..=100`. NaN counts as zero.
    pub fn set_progress(&mut self, id: &str, percent: f64) {
        let percent = if percent.is_nan() {
            0
        } else {
            percent.clamp(0.0, 100.0).round() as u8
        };
        self.add_simulation(id).percent = percent;
    }

    pub fn complete(&mut self, id: &str) {
        let entry = self.add_simulation(id);
        entry.status = COMPLETE.to_string();
        entry.percent = 100;
        entry.complete = true;
    }

    /// Marks every entry complete.
    pub fn finish(&mut self) {
        for entry in &mut self.entries {
            entry.status = COMPLETE.to_string();
            entry.percent = 100;
            entry.complete = true;
        }
    }

    pub fn is_complete(&self, id: &str) -> bool {
        self.get(id).is_some_and(|e| e.complete)
    }

    /// False while nothing has been observed.
    pub fn all_complete(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.complete)
    }

    pub fn get(&self, id: &str) -> Option<&ProgressEntry> {
        self.index.get(id).map(|idx| &self.entries[*idx])
    }

    pub fn entries(&self) -> &[ProgressEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Folds a progress response in. Simulations in a terminal state are marked complete.
    ///
    /// A negative marker sets the status and leaves the percentage alone. An empty status
    /// keeps the previous one.
    pub fn observe(&mut self, progress: &JobProgress) {
        for sim in &progress.simulation_progress_list {
            let entry = self.add_simulation(&sim.simulation_id);
            let status = match sim.marker_status() {
                Some(status) => status,
                None => {
                    entry.percent = sim.progress.clamp(0, 100) as u8;
                    if sim.status.is_empty() {
                        continue;
                    }
                    JobStatus::from(sim.status.clone())
                }
            };
            entry.status = status.to_string();
            if status.is_terminal() {
                entry.complete = true;
                entry.percent = 100;
            }
        }
    }
}

/// Terminal progress bars, one per tracker entry.
pub struct ProgressBars {
    multi: MultiProgress,
    bars: Vec<ProgressBar>,
    style: ProgressStyle,
}

impl Default for ProgressBars {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBars {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Draws nothing. For non-interactive runs and tests.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template("{prefix:>24} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Vec::new(),
            style,
        }
    }

    /// Brings the bars in line with the tracker, adding bars for new entries.
    pub fn render(&mut self, tracker: &ProgressTracker) {
        for entry in tracker.entries() {
            if entry.index >= self.bars.len() {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(self.style.clone());
                bar.set_prefix(entry.id.clone());
                self.bars.push(bar);
            }
            let bar = &self.bars[entry.index];
            bar.set_position(entry.percent as u64);
            bar.set_message(entry.status.clone());
            if entry.complete && !bar.is_finished() {
                bar.finish();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onscale_core::job::SimulationProgress;

    #[test]
    fn add_is_idempotent_and_ordered() {
        let mut tracker = ProgressTracker::new();
        tracker.add_simulation("b");
        tracker.add_simulation("a");
        tracker.set_progress("b", 40.0);
        tracker.add_simulation("b");

        let ids: Vec<&str> = tracker.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(tracker.get("b").unwrap().percent, 40);
        assert_eq!(tracker.get("a").unwrap().index, 1);
    }

    #[test]
    fn progress_is_clamped() {
        let mut tracker = ProgressTracker::new();
        tracker.set_progress("s", 140.0);
        assert_eq!(tracker.get("s").unwrap().percent, 100);
        tracker.set_progress("s", -3.0);
        assert_eq!(tracker.get("s").unwrap().percent, 0);
        tracker.set_progress("s", f64::NAN);
        assert_eq!(tracker.get("s").unwrap().percent, 0);
    }

    #[test]
    fn complete_and_finish() {
        let mut tracker = ProgressTracker::new();
        assert!(!tracker.all_complete());

        tracker.set_status("s1", "RUNNING");
        tracker.set_status("s2", "QUEUED");
        tracker.complete("s1");
        assert!(tracker.is_complete("s1"));
        assert_eq!(tracker.get("s1").unwrap().status, COMPLETE);
        assert!(!tracker.all_complete());

        tracker.finish();
        assert!(tracker.all_complete());
        assert_eq!(tracker.get("s2").unwrap().percent, 100);
        assert!(!tracker.is_complete("missing"));
    }

    #[test]
    fn observe_marks_terminal_simulations() {
        let mut tracker = ProgressTracker::new();
        tracker.observe(&JobProgress {
            job_id: Some("j".into()),
            simulation_progress_list: vec![
                SimulationProgress {
                    simulation_id: "s1".into(),
                    simulation_index: Some(0),
                    status: "running".into(),
                    progress: 35,
                },
                SimulationProgress {
                    simulation_id: "s2".into(),
                    simulation_index: Some(1),
                    status: "FINISHED".into(),
                    progress: 90,
                },
            ],
        });

        let s1 = tracker.get("s1").unwrap();
        assert_eq!((s1.status.as_str(), s1.percent, s1.complete), ("RUNNING", 35, false));
        let s2 = tracker.get("s2").unwrap();
        assert_eq!((s2.percent, s2.complete), (100, true));
    }

    fn sim(id: &str, status: &str, progress: i32) -> SimulationProgress {
        SimulationProgress {
            simulation_id: id.into(),
            simulation_index: None,
            status: status.into(),
            progress,
        }
    }

    #[test]
    fn observe_maps_negative_markers() {
        let mut tracker = ProgressTracker::new();
        tracker.observe(&JobProgress {
            job_id: None,
            simulation_progress_list: vec![sim("s1", "", 40), sim("s2", "", 20), sim("s3", "", 10)],
        });
        tracker.observe(&JobProgress {
            job_id: None,
            simulation_progress_list: vec![sim("s1", "", -1), sim("s2", "", -2), sim("s3", "", -3)],
        });

        let cancelled = tracker.get("s1").unwrap();
        assert_eq!((cancelled.status.as_str(), cancelled.complete), ("CANCELLED", true));
        let failed = tracker.get("s2").unwrap();
        assert_eq!((failed.status.as_str(), failed.complete), ("FAILED", true));
        let delayed = tracker.get("s3").unwrap();
        assert_eq!(
            (delayed.status.as_str(), delayed.percent, delayed.complete),
            ("DELAYED", 10, false)
        );
        assert!(!tracker.all_complete());
    }

    #[test]
    fn observe_without_status_keeps_the_previous_one() {
        let mut tracker = ProgressTracker::new();
        tracker.set_status("s1", "RUNNING");
        tracker.observe(&JobProgress {
            job_id: None,
            simulation_progress_list: vec![sim("s1", "", 130)],
        });
        let entry = tracker.get("s1").unwrap();
        assert_eq!((entry.status.as_str(), entry.percent), ("RUNNING", 100));
        assert!(!entry.complete);
    }

    #[test]
    fn bars_follow_the_tracker() {
        let mut tracker = ProgressTracker::new();
        let mut bars = ProgressBars::hidden();
        tracker.set_progress("s1", 10.0);
        bars.render(&tracker);
        tracker.complete("s2");
        bars.render(&tracker);
        assert_eq!(bars.len(), 2);
    }
}
