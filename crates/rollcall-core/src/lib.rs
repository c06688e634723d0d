//! rollcall-core — Face matching and attendance decision pipeline.
//!
//! Detection (SCRFD) and embedding (ArcFace) run via ONNX Runtime; on top of
//! them sit the reference catalog, the tolerance-gated matcher, the
//! write-once attendance ledger and the timed status-display state machine.

pub mod catalog;
pub mod category;
pub mod detector;
pub mod display;
pub mod embedder;
pub mod engine;
pub mod ledger;
pub mod matcher;
pub mod overlay;
pub mod session;
pub mod types;

pub use catalog::FaceCatalog;
pub use category::{Category, CategorySelector};
pub use display::{DisplayState, DisplayStateMachine, PanelText, PANEL_COLUMNS};
pub use engine::{FaceEngine, FeatureExtractor};
pub use ledger::AttendanceLedger;
pub use matcher::{FaceMatcher, MatchOutcome};
pub use session::Session;
pub use types::{BoundingBox, Detection, FeatureVector};
