use std::time::Duration;

use crate::vision::{roi::region::Region, uncertainty::{mode::Mode, UncertaintyReport}};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTimings {
    /// Fetching the next frame, measured inside the parallel section.
    pub capture: Duration,
    /// ROI selection and tensor packing, measured inside the parallel section.
    pub preprocessing: Duration,
    /// Wall time of the whole parallel section.
    pub parallel: Duration,
    pub classification: Duration,
    pub uncertainty: Duration,
    pub smoothing: Duration,
}

impl FrameTimings {
    /// Wall time of the iteration; capture and preprocessing are already inside `parallel`.
    pub fn total(&self) -> Duration {
        self.parallel + self.classification + self.uncertainty + self.smoothing
    }
}

/// Everything the loop knows about one frame once it has been handled.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub index: usize,
    pub processed: bool,
    /// The displayed label was refreshed on this frame.
    pub displayed: bool,
    /// Classification or uncertainty estimation failed, the frame counts as dropped.
    pub failed: bool,
    /// Smoothed label after this frame.
    pub label: usize,
    /// Arg-max of this frame's own scores.
    pub raw_label: Option<usize>,
    pub expected: Option<usize>,
    pub roi: Option<Region>,
    pub report: Option<UncertaintyReport>,
    pub mode: Mode,
    pub timings: FrameTimings,
}

impl FrameRecord {
    pub fn is_correct(&self) -> Option<bool> {
        match (self.displayed, self.expected) {
            (true, Some(expected)) => Some(self.label == expected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub frames: usize,
    pub processed: usize,
    pub displayed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub judged: usize,
    pub correct: usize,
    pub total_time: Duration,
    pub classification_time: Duration,
    pub uncertainty_time: Duration,
    pub smoothing_time: Duration,
}

impl RunSummary {
    pub fn record(&mut self, record: &FrameRecord) {
        self.frames += 1;
        if record.processed {
            self.processed += 1;
        } else {
            self.skipped += 1;
        }
        if record.displayed {
            self.displayed += 1;
        }
        if record.failed {
            self.failed += 1;
        }
        if let Some(correct) = record.is_correct() {
            self.judged += 1;
            if correct {
                self.correct += 1;
            }
        }
        self.total_time += record.timings.total();
        self.classification_time += record.timings.classification;
        self.uncertainty_time += record.timings.uncertainty;
        self.smoothing_time += record.timings.smoothing;
    }

    /// Percentage of displayed labels matching the expected one.
    pub fn accuracy(&self) -> Option<f32> {
        (self.judged > 0).then(|| 100.0 * self.correct as f32 / self.judged as f32)
    }

    pub fn frame_rate(&self) -> f32 {
        rate(self.frames, self.total_time)
    }

    pub fn processing_rate(&self) -> f32 {
        rate(self.processed, self.total_time)
    }

    pub fn classification_rate(&self) -> f32 {
        rate(self.displayed, self.total_time)
    }

    pub fn mean_classification_latency(&self) -> Duration {
        mean(self.classification_time, self.processed)
    }

    /// Uncertainty estimation time averaged over every handled frame.
    pub fn mean_uncertainty_time(&self) -> Duration {
        mean(self.uncertainty_time, self.frames)
    }

    pub fn mean_uncertainty_latency(&self) -> Duration {
        mean(self.uncertainty_time, self.processed)
    }

    /// Smoothing window time averaged over every handled frame.
    pub fn mean_smoothing_time(&self) -> Duration {
        mean(self.smoothing_time, self.frames)
    }

    pub fn mean_smoothing_latency(&self) -> Duration {
        mean(self.smoothing_time, self.processed)
    }
}

fn mean(total: Duration, count: usize) -> Duration {
    match u32::try_from(count) {
        Ok(n) if n > 0 => total / n,
        _ => Duration::ZERO,
    }
}

fn rate(count: usize, time: Duration) -> f32 {
    let secs = time.as_secs_f32();
    if secs > 0.0 {
        count as f32 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(processed: bool, displayed: bool, label: usize, expected: Option<usize>) -> FrameRecord {
        FrameRecord {
            index: 0,
            processed,
            displayed,
            failed: false,
            label,
            raw_label: processed.then_some(label),
            expected,
            roi: None,
            report: None,
            mode: Mode::VeryCertain,
            timings: FrameTimings {
                parallel: Duration::from_millis(10),
                classification: if processed { Duration::from_millis(5) } else { Duration::ZERO },
                uncertainty: if processed { Duration::from_millis(2) } else { Duration::ZERO },
                smoothing: Duration::from_millis(1),
                ..FrameTimings::default()
            },
        }
    }

    #[test]
    fn accuracy_counts_displayed_frames_only() {
        let mut summary = RunSummary::default();
        summary.record(&record(true, true, 3, Some(3)));
        summary.record(&record(true, false, 1, Some(3)));
        summary.record(&record(false, false, 3, Some(3)));
        summary.record(&record(true, true, 2, Some(3)));

        assert_eq!((summary.frames, summary.processed, summary.displayed, summary.skipped), (4, 3, 2, 1));
        assert_eq!(summary.accuracy(), Some(50.0));
        assert_eq!(summary.mean_classification_latency(), Duration::from_millis(5));
        assert!((summary.frame_rate() - 4.0 / 0.065).abs() < 0.1);
    }

    #[test]
    fn window_and_uncertainty_times_are_averaged() {
        let mut summary = RunSummary::default();
        summary.record(&record(true, true, 3, None));
        summary.record(&record(false, false, 3, None));
        summary.record(&record(false, false, 3, None));
        summary.record(&record(true, true, 3, None));

        assert_eq!(summary.mean_uncertainty_time(), Duration::from_millis(1));
        assert_eq!(summary.mean_uncertainty_latency(), Duration::from_millis(2));
        assert_eq!(summary.mean_smoothing_time(), Duration::from_millis(1));
        assert_eq!(summary.mean_smoothing_latency(), Duration::from_millis(2));

        let empty = RunSummary::default();
        assert_eq!(empty.mean_uncertainty_latency(), Duration::ZERO);
    }

    #[test]
    fn unlabelled_runs_have_no_accuracy() {
        let mut summary = RunSummary::default();
        summary.record(&record(true, true, 3, None));
        assert_eq!(summary.accuracy(), None);
    }
}
