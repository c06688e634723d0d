//! rollcall-ui — Operator preview window.
//!
//! Renders the live frame with subject buttons and status lines, resolves
//! mouse clicks to a [`Category`] and hands them to the frame loop over a
//! channel, and polls the quit key. Rendering is a pure projection of the
//! [`OverlayPlan`]; no attendance state lives here.

use opencv::core::{self, Mat, Point, Rect, Scalar};
use opencv::prelude::*;
use opencv::{highgui, imgproc};
use rollcall_core::overlay::OverlayPlan;
use rollcall_core::Category;
use rollcall_hw::RgbFrame;
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;

const QUIT_KEY: i32 = 'q' as i32;

// BGR colors, matching the kiosk's established look.
const SELECTED_FILL: (f64, f64, f64) = (0.0, 255.0, 0.0);
const UNSELECTED_FILL: (f64, f64, f64) = (100.0, 100.0, 255.0);
const BORDER: (f64, f64, f64) = (255.0, 255.0, 255.0);
const SELECTED_TEXT: (f64, f64, f64) = (0.0, 255.0, 0.0);
const TOTAL_TEXT: (f64, f64, f64) = (0.0, 200.0, 255.0);

#[derive(Error, Debug)]
pub enum UiError {
    #[error("button layout does not cover every category")]
    IncompleteLayout,
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Screen rectangle owned by one category's button.
#[derive(Debug, Clone, Copy)]
struct ButtonArea {
    category: Category,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

const BUTTON_AREAS: [ButtonArea; 3] = [
    ButtonArea { category: Category::Biology, x1: 10, y1: 10, x2: 170, y2: 60 },
    ButtonArea { category: Category::Chemistry, x1: 180, y1: 10, x2: 340, y2: 60 },
    ButtonArea { category: Category::Physics, x1: 350, y1: 10, x2: 510, y2: 60 },
];

/// Resolve a click to the category whose button contains it.
pub fn hit_test(x: i32, y: i32) -> Option<Category> {
    BUTTON_AREAS
        .iter()
        .find(|b| x >= b.x1 && x <= b.x2 && y >= b.y1 && y <= b.y2)
        .map(|b| b.category)
}

fn area_for(category: Category) -> Option<&'static ButtonArea> {
    BUTTON_AREAS.iter().find(|b| b.category == category)
}

fn layout_is_exhaustive() -> bool {
    Category::ALL.iter().all(|&c| area_for(c).is_some())
}

/// The preview window plus the click channel feeding the frame loop.
pub struct PreviewWindow {
    name: String,
}

impl PreviewWindow {
    /// Create the window, validate the button layout, and wire the mouse
    /// callback. Resolved categories arrive on the returned receiver.
    pub fn open(title: &str) -> Result<(Self, Receiver<Category>), UiError> {
        if !layout_is_exhaustive() {
            return Err(UiError::IncompleteLayout);
        }

        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;

        let (tx, rx): (Sender<Category>, Receiver<Category>) = mpsc::channel();
        highgui::set_mouse_callback(
            title,
            Some(Box::new(move |event, x, y, _flags| {
                if event == highgui::EVENT_LBUTTONDOWN {
                    if let Some(category) = hit_test(x, y) {
                        tracing::debug!(%category, x, y, "button click");
                        // The loop may have exited already; a dead receiver
                        // just means the click is dropped.
                        let _ = tx.send(category);
                    }
                }
            })),
        )?;

        Ok((
            Self {
                name: title.to_string(),
            },
            rx,
        ))
    }

    /// Draw one frame with its overlay and poll input for ~1 ms.
    /// Returns true when the quit key was pressed.
    pub fn render(&self, frame: &RgbFrame, plan: &OverlayPlan) -> Result<bool, UiError> {
        let mut mat = frame_to_bgr_mat(frame)?;

        for button in &plan.buttons {
            let Some(area) = area_for(button.category) else {
                continue;
            };
            let rect = Rect::new(area.x1, area.y1, area.x2 - area.x1, area.y2 - area.y1);
            let fill = if button.selected {
                SELECTED_FILL
            } else {
                UNSELECTED_FILL
            };
            imgproc::rectangle(&mut mat, rect, bgr(fill), imgproc::FILLED, imgproc::LINE_8, 0)?;
            imgproc::rectangle(&mut mat, rect, bgr(BORDER), 2, imgproc::LINE_8, 0)?;
            put_label(
                &mut mat,
                button.label,
                Point::new(area.x1 + 15, area.y1 + 35),
                imgproc::FONT_HERSHEY_SIMPLEX,
                bgr(BORDER),
            )?;
        }

        put_label(
            &mut mat,
            &plan.selected_line,
            Point::new(10, 80),
            imgproc::FONT_HERSHEY_DUPLEX,
            bgr(SELECTED_TEXT),
        )?;
        put_label(
            &mut mat,
            &plan.total_line,
            Point::new(10, 110),
            imgproc::FONT_HERSHEY_DUPLEX,
            bgr(TOTAL_TEXT),
        )?;

        highgui::imshow(&self.name, &mat)?;
        let key = highgui::wait_key(1)?;
        Ok(key == QUIT_KEY)
    }

    /// Tear the window down at shutdown.
    pub fn close(&self) -> Result<(), UiError> {
        highgui::destroy_all_windows()?;
        Ok(())
    }
}

fn bgr((b, g, r): (f64, f64, f64)) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

fn put_label(
    mat: &mut Mat,
    text: &str,
    origin: Point,
    font: i32,
    color: Scalar,
) -> Result<(), UiError> {
    imgproc::put_text(mat, text, origin, font, 0.7, color, 2, imgproc::LINE_8, false)?;
    Ok(())
}

/// Copy an RGB frame into a BGR Mat for drawing and display.
fn frame_to_bgr_mat(frame: &RgbFrame) -> Result<Mat, UiError> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height as i32,
        frame.width as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;

    let bytes = mat.data_bytes_mut()?;
    for (dst, src) in bytes.chunks_exact_mut(3).zip(frame.data.chunks_exact(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }

    Ok(mat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_covers_every_category() {
        assert!(layout_is_exhaustive());
    }

    #[test]
    fn test_hit_test_inside_each_button() {
        assert_eq!(hit_test(90, 35), Some(Category::Biology));
        assert_eq!(hit_test(260, 35), Some(Category::Chemistry));
        assert_eq!(hit_test(430, 35), Some(Category::Physics));
    }

    #[test]
    fn test_hit_test_edges_inclusive() {
        assert_eq!(hit_test(10, 10), Some(Category::Biology));
        assert_eq!(hit_test(170, 60), Some(Category::Biology));
    }

    #[test]
    fn test_hit_test_misses_between_and_below() {
        assert_eq!(hit_test(175, 35), None);
        assert_eq!(hit_test(90, 200), None);
    }
}
