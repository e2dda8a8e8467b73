pub mod contour;
pub mod motion;
pub mod plausibility;
pub mod region;

use opencv::{
    core::{Mat, Size},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    preprocess::{resize_to, to_grey},
    utils::{colored_mat_to_dmatrix, expand_r},
    vision::uncertainty::mode::{Mode, PerMode},
};
use contour::ContourParams;
use motion::{FlowParams, MotionField};
use plausibility::{Plausibility, PlausibilityConfig};
use region::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoiStrategy {
    #[default]
    FullFrame,
    ContourOnly,
    FlowWithFallback,
    FlowAlways,
}

/// What the mode driven strategy does for one confidence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoiChoice {
    Full,
    Flow,
    Past,
    Contour,
}

impl RoiChoice {
    pub fn default_table() -> PerMode<RoiChoice> {
        [RoiChoice::Full, RoiChoice::Flow, RoiChoice::Past, RoiChoice::Contour, RoiChoice::Past]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    /// Size of the reduced frame every cue is computed on.
    pub analysis_width: i32,
    pub analysis_height: i32,
    /// Fraction each corner is pushed outwards by.
    pub margin: f32,
    pub contour: ContourParams,
    pub flow: FlowParams,
    pub plausibility: PlausibilityConfig,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            analysis_width: 80,
            analysis_height: 60,
            margin: 0.1,
            contour: ContourParams::default(),
            flow: FlowParams::default(),
            plausibility: PlausibilityConfig::default(),
        }
    }
}

impl RoiConfig {
    pub fn analysis_size(&self) -> Size {
        Size::new(self.analysis_width, self.analysis_height)
    }
}

/// Tracks the region of a frame worth classifying, from edge contours and dense motion.
pub struct RoiTracker {
    config: RoiConfig,
    frame_size: Size,
    prev_grey: Option<Mat>,
    past_roi: Region,
    /// Last contour box in analysis coordinates, used by the plausibility check.
    small_roi: Region,
    plausibility: Plausibility,
    /// Cleared by `init`, set by the first selection of a stream.
    selected: bool,
}

impl RoiTracker {
    pub fn new(config: RoiConfig, frame_size: Size) -> Self {
        let small_roi = Region::full(config.analysis_width, config.analysis_height);
        Self {
            config,
            frame_size,
            prev_grey: None,
            past_roi: Region::full(frame_size.width, frame_size.height),
            small_roi,
            plausibility: Plausibility::NotCertain,
            selected: false,
        }
    }

    pub fn config(&self) -> &RoiConfig {
        &self.config
    }

    pub fn frame_size(&self) -> Size {
        self.frame_size
    }

    pub fn is_initialised(&self) -> bool {
        self.prev_grey.is_some()
    }

    /// Starts a stream at `frame`: stores it as the reference for the next flow estimate
    /// and resets the past region. The next selection returns the full frame.
    pub fn init(&mut self, frame: &Mat) -> Result<()> {
        self.reseed(frame)?;
        self.past_roi = self.full_region();
        self.plausibility = Plausibility::NotCertain;
        self.selected = false;

        Ok(())
    }

    pub fn get_past_roi(&self) -> Region {
        self.past_roi
    }

    pub fn get_full_roi(&mut self) -> Region {
        self.past_roi = self.full_region();
        self.past_roi
    }

    pub fn plausibility(&self) -> Plausibility {
        self.plausibility
    }

    pub fn flow_trusted(&self) -> bool {
        self.plausibility != Plausibility::NotCertain
    }

    /// Centred square of side `size`, clipped to the frame.
    pub fn naive_roi(&self, size: i32) -> Region {
        let (cx, cy) = (self.frame_size.width / 2, self.frame_size.height / 2);
        let half = size.max(0) / 2;
        Region::from_corners(cx - half, cy - half, cx + half, cy + half)
            .clamped_or_full(self.frame_size.width, self.frame_size.height)
    }

    pub fn contour_roi(&mut self, frame: &Mat) -> Result<Region> {
        let small = self.observe(frame)?;
        self.contour_roi_small(&small)
    }

    /// Region of the object moving between the stored reference frame and `frame`.
    ///
    /// When the motion map does not look like one coherent object, the past region is kept
    /// along with the reference frame, so slow motion can accumulate over several frames.
    pub fn flow_roi(&mut self, frame: &Mat) -> Result<Region> {
        let small = self.observe(frame)?;
        let cur_grey = to_grey(&small)?;
        let Some(prev_grey) = self.prev_grey.as_ref() else {
            log::debug!("No reference frame for flow yet, seeding");
            self.prev_grey = Some(cur_grey);
            self.plausibility = Plausibility::NotCertain;
            return Ok(self.get_full_roi());
        };

        let past = self.past_roi;
        let motion = MotionField::compute(prev_grey, &cur_grey, &self.config.flow)?;
        let hsv = motion.render_hsv()?;
        let bgr = MotionField::render_bgr(&hsv)?;
        let roi = self.contour_roi_small(&bgr)?;

        self.plausibility = plausibility::check(&colored_mat_to_dmatrix(&hsv)?, &self.small_roi, &self.config.plausibility);
        if self.plausibility == Plausibility::NotCertain {
            log::debug!("Flow region {roi:?} not plausible, keeping {past:?}");
            self.past_roi = past;
            return Ok(past);
        }

        self.prev_grey = Some(cur_grey);
        Ok(roi)
    }

    pub fn select_roi(&mut self, strategy: RoiStrategy, frame: &Mat) -> Result<Region> {
        if let Some(full) = self.first_selection(frame)? {
            return Ok(full);
        }

        match strategy {
            RoiStrategy::FullFrame => {
                self.observe(frame)?;
                Ok(self.get_full_roi())
            }
            RoiStrategy::ContourOnly => self.contour_roi(frame),
            RoiStrategy::FlowAlways => self.flow_roi(frame),
            RoiStrategy::FlowWithFallback => {
                let roi = self.flow_roi(frame)?;
                if self.flow_trusted() {
                    Ok(roi)
                } else {
                    self.contour_roi(frame)
                }
            }
        }
    }

    /// Picks the cue per confidence level. Everything but flow re-seeds the reference
    /// frame, so flow always compares against the latest frame seen.
    pub fn select_roi_for_mode(&mut self, frame: &Mat, mode: Mode, table: &PerMode<RoiChoice>) -> Result<Region> {
        if let Some(full) = self.first_selection(frame)? {
            return Ok(full);
        }

        match table[mode.index()] {
            RoiChoice::Flow => self.flow_roi(frame),
            RoiChoice::Full => {
                self.reseed(frame)?;
                Ok(self.get_full_roi())
            }
            RoiChoice::Past => {
                let past = self.past_roi;
                self.reseed(frame)?;
                Ok(past)
            }
            RoiChoice::Contour => {
                self.reseed(frame)?;
                self.contour_roi(frame)
            }
        }
    }

    /// Full frame for the first selection of a stream, when there is no motion history yet.
    fn first_selection(&mut self, frame: &Mat) -> Result<Option<Region>> {
        if self.selected {
            return Ok(None);
        }
        if !self.is_initialised() {
            self.init(frame)?;
        }
        self.selected = true;

        Ok(Some(self.get_full_roi()))
    }

    fn reseed(&mut self, frame: &Mat) -> Result<()> {
        let small = self.observe(frame)?;
        self.prev_grey = Some(to_grey(&small)?);

        Ok(())
    }

    fn full_region(&self) -> Region {
        Region::full(self.frame_size.width, self.frame_size.height)
    }

    /// Records the frame size and returns the analysis sized copy of `frame`.
    fn observe(&mut self, frame: &Mat) -> Result<Mat> {
        let size = frame.size()?;
        if size != self.frame_size {
            log::debug!("Frame size changed from {:?} to {size:?}", self.frame_size);
            self.frame_size = size;
            self.past_roi = self.past_roi.clamped_or_full(size.width, size.height);
        }

        resize_to(frame, self.config.analysis_size())
    }

    fn contour_roi_small(&mut self, small: &Mat) -> Result<Region> {
        let Some(bounds) = contour::find_bounds(small, &self.config.contour)? else {
            self.small_roi = Region::full(self.config.analysis_width, self.config.analysis_height);
            return Ok(self.get_full_roi());
        };

        let (aw, ah) = (self.config.analysis_width, self.config.analysis_height);
        let (fw, fh) = (self.frame_size.width, self.frame_size.height);
        let margin = self.config.margin;

        self.small_roi = expand_r(bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y, margin, aw, ah);
        let scaled = bounds.scaled(fw as f32 / aw as f32, fh as f32 / ah as f32);
        self.past_roi = expand_r(scaled.min.x, scaled.min.y, scaled.max.x, scaled.max.y, margin, fw, fh);

        Ok(self.past_roi)
    }
}

#[cfg(test)]
mod tests {
    use opencv::{
        core::{Rect, Scalar, CV_8UC3},
        imgproc::{rectangle, LINE_8},
    };

    use super::*;

    fn black_frame() -> Mat {
        Mat::new_rows_cols_with_default(240, 320, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn frame_with_block(x: i32, y: i32) -> Mat {
        let mut frame = black_frame();
        rectangle(&mut frame, Rect::new(x, y, 100, 80), Scalar::all(255.0), -1, LINE_8, 0).unwrap();
        frame
    }

    fn tracker() -> RoiTracker {
        RoiTracker::new(RoiConfig::default(), Size::new(320, 240))
    }

    #[test]
    fn first_selection_is_the_full_frame() {
        for strategy in [RoiStrategy::ContourOnly, RoiStrategy::FlowWithFallback, RoiStrategy::FlowAlways] {
            let mut tracker = tracker();
            let roi = tracker.select_roi(strategy, &frame_with_block(100, 80)).unwrap();
            assert_eq!(roi, Region::full(320, 240));
            assert!(tracker.is_initialised());
        }
    }

    #[test]
    fn first_selection_after_init_is_the_full_frame() {
        let frame = frame_with_block(100, 80);
        for strategy in [RoiStrategy::ContourOnly, RoiStrategy::FlowAlways] {
            let mut tracker = tracker();
            tracker.init(&frame).unwrap();
            assert_eq!(tracker.select_roi(strategy, &frame).unwrap(), Region::full(320, 240));
        }

        let mut tracker = tracker();
        tracker.init(&frame).unwrap();
        assert_eq!(tracker.select_roi(RoiStrategy::ContourOnly, &frame).unwrap(), Region::full(320, 240));
        assert_ne!(tracker.select_roi(RoiStrategy::ContourOnly, &frame).unwrap(), Region::full(320, 240));

        tracker.init(&frame).unwrap();
        assert_eq!(tracker.select_roi(RoiStrategy::ContourOnly, &frame).unwrap(), Region::full(320, 240));
    }

    #[test]
    fn black_frame_gives_the_full_frame() {
        let mut tracker = tracker();
        assert_eq!(tracker.contour_roi(&black_frame()).unwrap(), Region::full(320, 240));
    }

    #[test]
    fn contour_region_surrounds_a_bright_block() {
        let mut tracker = tracker();
        let roi = tracker.contour_roi(&frame_with_block(100, 80)).unwrap();

        assert!(roi.min.x <= 100 && roi.min.y <= 80, "{roi:?}");
        assert!(roi.max.x >= 200 && roi.max.y >= 160, "{roi:?}");
        assert!(roi.width() < 320 || roi.height() < 240, "{roi:?}");
        assert_eq!(tracker.get_past_roi(), roi);
    }

    #[test]
    fn still_scene_has_no_moving_region() {
        let mut tracker = tracker();
        let frame = frame_with_block(100, 80);
        tracker.init(&frame).unwrap();
        tracker.contour_roi(&frame).unwrap();

        assert_eq!(tracker.flow_roi(&frame).unwrap(), Region::full(320, 240));
    }

    #[test]
    fn full_roi_resets_the_past_region() {
        let mut tracker = tracker();
        tracker.contour_roi(&frame_with_block(100, 80)).unwrap();
        assert_eq!(tracker.get_full_roi(), Region::full(320, 240));
        assert_eq!(tracker.get_past_roi(), Region::full(320, 240));
    }

    #[test]
    fn mode_table_picks_the_cue() {
        let mut tracker = tracker();
        let frame = frame_with_block(100, 80);
        let table = RoiChoice::default_table();

        assert_eq!(tracker.select_roi_for_mode(&frame, Mode::Uncertain, &table).unwrap(), Region::full(320, 240));
        let contour = tracker.select_roi_for_mode(&frame, Mode::Uncertain, &table).unwrap();
        assert_ne!(contour, Region::full(320, 240));
        assert_eq!(tracker.select_roi_for_mode(&frame, Mode::VeryUncertain, &table).unwrap(), contour);
        assert_eq!(tracker.select_roi_for_mode(&frame, Mode::VeryCertain, &table).unwrap(), Region::full(320, 240));
    }

    #[test]
    fn naive_region_is_centred() {
        let tracker = tracker();
        assert_eq!(tracker.naive_roi(64), Region::from_corners(128, 88, 192, 152));
    }
}
