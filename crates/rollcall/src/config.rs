use std::path::PathBuf;

/// Kiosk configuration, loaded from environment variables.
///
/// Decision constants (categories, confirmation window, panel width, button
/// geometry) are compiled in; only deployment concerns live here.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Directory of per-identity enrollment image folders.
    pub dataset_dir: PathBuf,
    /// Maximum match distance; lower is stricter.
    pub tolerance: f32,
    /// Whether to drive the HD44780 panel at all.
    pub panel_enabled: bool,
    /// Optional alternate panel wiring file.
    pub panel_pins: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            camera_device: std::env::var("ROLLCALL_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir: std::env::var("ROLLCALL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            dataset_dir: std::env::var("ROLLCALL_DATASET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("dataset")),
            tolerance: env_f32("ROLLCALL_TOLERANCE", rollcall_core::matcher::DEFAULT_TOLERANCE),
            panel_enabled: std::env::var("ROLLCALL_PANEL")
                .map(|v| v != "0")
                .unwrap_or(true),
            panel_pins: std::env::var("ROLLCALL_PANEL_PINS").map(PathBuf::from).ok(),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
