pub mod config;
pub mod controller;
pub mod error;
pub mod preprocess;
pub mod report;
pub mod source;
pub mod utils;
pub mod vision;

pub use config::{AdmissionPolicy, RoiPolicy, VisionConfig, CIFAR10_CLASSES};
pub use controller::{ControllerState, FrameController, FrameOutcome};
pub use error::{Error, Result};
pub use report::{FrameRecord, FrameTimings, RunSummary};
pub use source::{Frame, FrameSource};
pub use vision::{
    classifier::{CandleClassifier, Classifier, ClassifierCapacity, TensorConfig},
    roi::{region::Region, RoiChoice, RoiConfig, RoiStrategy, RoiTracker},
    uncertainty::{mode::Mode, UncertaintyConfig, UncertaintyReport, UncertaintyScheme},
    window::{SmoothingScheme, TemporalSmoother, WindowConfig, WindowShape},
};
