//! The frame loop: one iteration per captured frame, with category
//! selections merged in between frames.

use anyhow::{Context, Result};
use chrono::Local;
use rollcall_core::{Category, FaceCatalog, FaceEngine, FaceMatcher, FeatureExtractor, Session};
use rollcall_hw::{Camera, Hd44780, LogPanel, PanelConfig, StatusPanel};
use rollcall_ui::PreviewWindow;
use std::time::Instant;

use crate::config::Config;

const WINDOW_TITLE: &str = "Attendance System";

/// Start everything fail-fast, then loop until the camera dies or the
/// operator quits. The panel is cleared and the window torn down on every
/// exit path past startup.
pub fn run(config: &Config) -> Result<()> {
    let mut engine = FaceEngine::load(&config.model_dir).context("loading face models")?;
    let catalog = FaceCatalog::load_from_dir(&config.dataset_dir, &mut engine)
        .context("loading enrollment dataset")?;
    if catalog.is_empty() {
        tracing::warn!("reference catalog is empty; every face will be unknown");
    }

    let camera = Camera::open(&config.camera_device).context("opening camera")?;
    let mut panel = open_panel(config);
    let (window, clicks) = PreviewWindow::open(WINDOW_TITLE).context("creating preview window")?;

    let (mut session, banner) = Session::new(
        catalog,
        FaceMatcher::new(config.tolerance),
        Category::default(),
    );
    show(panel.as_mut(), &banner.line1, &banner.line2);

    let mut stream = camera.stream().context("starting capture stream")?;

    loop {
        // Apply pending selections before the frame's decisions, never
        // mid-frame.
        while let Ok(category) = clicks.try_recv() {
            let banner = session.select_category(category);
            show(panel.as_mut(), &banner.line1, &banner.line2);
        }

        let frame = match stream.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "camera read failed; stopping");
                break;
            }
        };

        let image = frame.to_image();
        let detections = match engine.extract(&image) {
            Ok(detections) => detections,
            Err(e) => {
                tracing::warn!(error = %e, "face analysis failed; treating frame as empty");
                Vec::new()
            }
        };

        let decision = session.process_frame(&detections, Instant::now(), Local::now());
        if let Some(text) = decision.panel {
            show(panel.as_mut(), &text.line1, &text.line2);
        }

        match window.render(&frame, &session.overlay()) {
            Ok(false) => {}
            Ok(true) => {
                tracing::info!("quit requested");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "preview window failed; stopping");
                break;
            }
        }
    }

    if let Err(e) = panel.clear() {
        tracing::warn!(error = %e, "panel clear failed");
    }
    if let Err(e) = window.close() {
        tracing::warn!(error = %e, "window close failed");
    }
    tracing::info!(marked = session.ledger().len(), "session ended");
    Ok(())
}

/// Bring up the HD44780, or fall back to logging the status lines when the
/// panel is disabled or unreachable.
fn open_panel(config: &Config) -> Box<dyn StatusPanel> {
    if !config.panel_enabled {
        tracing::info!("status panel disabled via ROLLCALL_PANEL=0");
        return Box::new(LogPanel);
    }

    let panel_config = match &config.panel_pins {
        Some(path) => match PanelConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "bad pin map; using embedded wiring");
                PanelConfig::embedded()
            }
        },
        None => PanelConfig::embedded(),
    };

    match Hd44780::open(&panel_config) {
        Ok(panel) => Box::new(panel),
        Err(e) => {
            tracing::warn!(error = %e, "no panel hardware; status lines go to the log");
            Box::new(LogPanel)
        }
    }
}

/// Panel writes never stop the loop; a flaky panel is logged and ignored.
fn show(panel: &mut dyn StatusPanel, line1: &str, line2: &str) {
    if let Err(e) = panel.show(line1, line2) {
        tracing::warn!(error = %e, "panel write failed");
    }
}
