use std::time::Instant;

use opencv::core::Mat;

use crate::{
    config::{AdmissionPolicy, RoiPolicy, VisionConfig},
    error::Result,
    report::{FrameRecord, FrameTimings, RunSummary},
    source::{Frame, FrameSource},
    utils::argmax,
    vision::{
        classifier::{check_capacity, utils::pack_tensor, Classifier, TensorConfig},
        roi::{region::Region, RoiTracker},
        uncertainty::{mode::Mode, UncertaintyEstimator},
        window::TemporalSmoother,
    },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub mode: Mode,
    /// Frames skipped since the last processed one, checked against the admission quota.
    pub consecutive_skips: u32,
    /// Frames dropped since the last processed one.
    pub frames_dropped: usize,
    /// Frames dropped over the whole run.
    pub total_dropped: usize,
}

pub struct FrameOutcome {
    pub record: FrameRecord,
    /// The frame fetched while this one was being prepared.
    pub next: Option<Frame>,
}

/// Closed loop deciding per frame whether to classify, where to look and what label to show.
pub struct FrameController<C: Classifier> {
    config: VisionConfig,
    classifier: C,
    tracker: RoiTracker,
    estimator: UncertaintyEstimator,
    smoother: TemporalSmoother,
    state: ControllerState,
    frame_index: usize,
}

impl<C: Classifier> FrameController<C> {
    pub fn new(config: VisionConfig, classifier: C) -> Result<Self> {
        config.validate()?;
        check_capacity(classifier.capacity(), &config.tensor, config.class_count())?;

        let tracker = RoiTracker::new(
            config.roi.clone(),
            opencv::core::Size::new(config.frame_width, config.frame_height),
        );
        let estimator = UncertaintyEstimator::new(config.uncertainty.clone(), config.class_count());
        let smoother = TemporalSmoother::from_config(config.class_count(), &config.window);
        log::info!(
            "Frame controller ready: {} classes, {} uncertainty, {:?} admission",
            config.class_count(),
            config.uncertainty.scheme,
            config.admission
        );

        Ok(Self {
            config,
            classifier,
            tracker,
            estimator,
            smoother,
            state: ControllerState::default(),
            frame_index: 0,
        })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn tracker(&self) -> &RoiTracker {
        &self.tracker
    }

    pub fn smoother(&self) -> &TemporalSmoother {
        &self.smoother
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Starts a stream at `frame`: seeds the ROI tracker and forgets the uncertainty history.
    pub fn prime(&mut self, frame: &Frame) -> Result<()> {
        self.estimator.reset();
        self.tracker.init(&frame.image)
    }

    /// Whether the next frame gets classified.
    pub fn admits(&self) -> bool {
        if self.smoother.dropf() {
            return false;
        }

        match &self.config.admission {
            AdmissionPolicy::AlwaysProcess => true,
            AdmissionPolicy::DropFrames { skip_quota } => {
                let quota = skip_quota[self.state.mode.index()];
                quota == 0 || self.state.consecutive_skips >= quota
            }
        }
    }

    /// Handles `frame` while `fetch_next` acquires the following one on another worker.
    ///
    /// Only a failing `fetch_next` is an error; problems with `frame` itself are logged and
    /// recorded as a failed frame.
    pub fn step<F>(&mut self, frame: Frame, fetch_next: F) -> anyhow::Result<FrameOutcome>
    where
        F: FnOnce() -> anyhow::Result<Option<Frame>> + Send,
    {
        let start = Instant::now();
        let index = self.frame_index;
        self.frame_index += 1;
        let expected = frame.label.or(self.config.expected_label);
        let process = self.admits();
        let mode = self.state.mode;

        let Self { tracker, config, .. } = self;
        let ((next, capture), (prepared, preprocessing)) = rayon::join(
            || {
                let t = Instant::now();
                let next = fetch_next();
                (next, t.elapsed())
            },
            move || {
                let t = Instant::now();
                let prepared = process.then(|| prepare(tracker, &config.roi_policy, &config.tensor, mode, &frame.image));
                (prepared, t.elapsed())
            },
        );
        let timings = FrameTimings {
            capture,
            preprocessing,
            parallel: start.elapsed(),
            ..FrameTimings::default()
        };
        let next = next?;

        let record = self.finish(index, expected, prepared, timings);
        Ok(FrameOutcome { record, next })
    }

    /// One iteration without prefetching.
    pub fn process_frame(&mut self, frame: Frame) -> anyhow::Result<FrameRecord> {
        Ok(self.step(frame, || Ok(None))?.record)
    }

    /// Pulls frames from `source` until it ends or `limit` frames have been handled.
    pub fn run<S, F>(&mut self, source: &mut S, limit: Option<usize>, mut sink: F) -> anyhow::Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&FrameRecord) -> anyhow::Result<()>,
    {
        let mut summary = RunSummary::default();
        let Some(mut current) = source.next_frame()? else {
            log::warn!("Frame source is empty");
            return Ok(summary);
        };
        self.prime(&current)?;

        let mut handled = 0;
        while limit.map_or(true, |limit| handled < limit) {
            handled += 1;
            let fetch_more = limit.map_or(true, |limit| handled < limit);
            let outcome = self.step(current, || if fetch_more { source.next_frame() } else { Ok(None) })?;

            summary.record(&outcome.record);
            sink(&outcome.record)?;

            match outcome.next {
                Some(next) => current = next,
                None => break,
            }
        }

        log::info!(
            "Handled {} frames: {} processed, {} displayed, {} failed",
            summary.frames,
            summary.processed,
            summary.displayed,
            summary.failed
        );

        Ok(summary)
    }

    fn finish(
        &mut self,
        index: usize,
        expected: Option<usize>,
        prepared: Option<Result<(Region, Vec<f32>)>>,
        mut timings: FrameTimings,
    ) -> FrameRecord {
        let mut record = FrameRecord {
            index,
            processed: false,
            displayed: false,
            failed: false,
            label: self.smoother.label(),
            raw_label: None,
            expected,
            roi: None,
            report: None,
            mode: self.state.mode,
            timings,
        };

        let scores = prepared.and_then(|prepared| match self.classify(prepared, &mut record, &mut timings) {
            Ok(scores) => Some(scores),
            Err(e) => {
                log::error!("Frame {index} failed: {e:#}");
                record.failed = true;
                None
            }
        });

        if scores.is_some() {
            self.state.consecutive_skips = 0;
            self.state.frames_dropped = 0;
        } else {
            self.state.consecutive_skips = self.state.consecutive_skips.saturating_add(1);
            self.state.frames_dropped += 1;
            self.state.total_dropped += 1;
        }

        let t = Instant::now();
        let label = self
            .smoother
            .analysis(scores.as_deref(), self.state.mode, self.config.window.tuning());
        timings.smoothing = t.elapsed();

        record.processed = scores.is_some();
        record.displayed = self.smoother.get_display_f();
        record.label = label;
        record.mode = self.state.mode;
        record.timings = timings;
        log::debug!(
            "Frame {index}: processed {}, label {label}, mode {:?}",
            record.processed,
            record.mode
        );

        record
    }

    fn classify(
        &mut self,
        prepared: Result<(Region, Vec<f32>)>,
        record: &mut FrameRecord,
        timings: &mut FrameTimings,
    ) -> anyhow::Result<Vec<f32>> {
        let (roi, tensor) = prepared?;
        record.roi = Some(roi);

        let t = Instant::now();
        let scores = self.classifier.classify(&tensor)?;
        timings.classification = t.elapsed();

        let t = Instant::now();
        let raw_label = argmax(&scores);
        let report = self.estimator.evaluate(&scores, self.config.uncertainty.scheme, raw_label)?;
        timings.uncertainty = t.elapsed();

        self.state.mode = report.mode;
        record.raw_label = Some(raw_label);
        record.report = Some(report);

        Ok(scores)
    }
}

fn prepare(
    tracker: &mut RoiTracker,
    policy: &RoiPolicy,
    tensor: &TensorConfig,
    mode: Mode,
    image: &Mat,
) -> Result<(Region, Vec<f32>)> {
    let roi = match policy {
        RoiPolicy::Fixed { strategy } => tracker.select_roi(*strategy, image)?,
        RoiPolicy::ModeDriven { table } => tracker.select_roi_for_mode(image, mode, table)?,
    };
    let tensor = pack_tensor(image, &roi, tensor)?;

    Ok((roi, tensor))
}
