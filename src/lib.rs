pub mod calibration;
pub mod config;
pub mod filter;
pub mod gesture;
pub mod homography;
pub mod pipeline;
pub mod predictor;
pub mod session;
pub mod store;
pub mod templates;
pub mod types;

pub use calibration::{CalibrationError, Calibrator};
pub use config::TrackingConfig;
pub use session::HandTrackingSession;
pub use templates::TemplateSet;
pub use types::{CursorState, DetectionEvent, Landmark, LandmarkFrame, Point2};
