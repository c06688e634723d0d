//! rollcall-hw — Hardware abstraction for camera capture and the 16×2
//! character status panel.
//!
//! Provides V4L2-based color capture and a sysfs-GPIO HD44780 driver.

pub mod camera;
pub mod frame;
pub mod panel;

pub use camera::{Camera, CameraError, CameraStream};
pub use frame::RgbFrame;
pub use panel::{Hd44780, LogPanel, PanelConfig, PanelError, StatusPanel};
