//! Status-display state machine.
//!
//! Decides what the 16×2 character panel shows and for how long. Text is
//! emitted only on state transitions, never per frame, so the panel hardware
//! is written exactly once per change.
//!
//! The idle banner has two renderings, matching the transition that entered
//! it: the instructor line after startup or a category switch, the running
//! total after a confirmation expires.

use crate::category::Category;
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// Column width of the status panel; every emitted line is truncated to fit.
pub const PANEL_COLUMNS: usize = 16;

/// How long a just-recorded mark stays on the panel before reverting to idle.
pub const CONFIRMATION_WINDOW: Duration = Duration::from_secs(2);

/// Two lines of panel text, each at most [`PANEL_COLUMNS`] characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelText {
    pub line1: String,
    pub line2: String,
}

impl PanelText {
    fn new(line1: impl Into<String>, line2: impl Into<String>) -> Self {
        Self {
            line1: fit(line1.into()),
            line2: fit(line2.into()),
        }
    }
}

fn fit(line: String) -> String {
    line.chars().take(PANEL_COLUMNS).collect()
}

/// Exactly one state is active at any instant; every event maps to exactly
/// one next state.
#[derive(Debug, Clone)]
pub enum DisplayState {
    /// Static banner for the selected category. No expiry.
    Idle { category: Category },
    /// A just-recorded mark, shown until `expires_at`.
    Confirmation { identity: String, expires_at: Instant },
}

pub struct DisplayStateMachine {
    state: DisplayState,
}

impl DisplayStateMachine {
    /// Start in `Idle(category)` and return the startup banner.
    pub fn new(category: Category) -> (Self, PanelText) {
        let machine = Self {
            state: DisplayState::Idle { category },
        };
        let banner = instructor_banner(category);
        (machine, banner)
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// A new attendance event at monotonic time `now`: preempts any
    /// in-progress confirmation unconditionally.
    pub fn confirm_mark(
        &mut self,
        identity: &str,
        at: DateTime<Local>,
        now: Instant,
    ) -> PanelText {
        self.state = DisplayState::Confirmation {
            identity: identity.to_string(),
            expires_at: now + CONFIRMATION_WINDOW,
        };
        PanelText::new(
            format!("{identity}-Present"),
            at.format("%H:%M:%S").to_string(),
        )
    }

    /// The user picked a category: go idle for it immediately, discarding
    /// any pending confirmation expiry.
    pub fn category_selected(&mut self, category: Category) -> PanelText {
        self.state = DisplayState::Idle { category };
        instructor_banner(category)
    }

    /// Per-frame tick. Reverts an expired confirmation to `Idle(category)`
    /// with the running total, freshly computed by the caller at this
    /// moment. Emits nothing otherwise.
    pub fn tick(&mut self, now: Instant, category: Category, present: usize) -> Option<PanelText> {
        match &self.state {
            DisplayState::Confirmation { expires_at, .. } if now >= *expires_at => {
                self.state = DisplayState::Idle { category };
                Some(PanelText::new(
                    format!("{} -", category.label()),
                    format!("Total: {present}"),
                ))
            }
            _ => None,
        }
    }
}

fn instructor_banner(category: Category) -> PanelText {
    PanelText::new(format!("{} -", category.label()), category.instructor())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn wall() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 4, 10, 15, 42).unwrap()
    }

    #[test]
    fn test_startup_banner_and_no_expiry() {
        let (mut machine, banner) = DisplayStateMachine::new(Category::Biology);
        assert_eq!(banner.line1, "Biology -");
        assert_eq!(banner.line2, "Maithili mam");

        // Idle never auto-reverts, however long the clock runs.
        let later = Instant::now() + Duration::from_secs(3600);
        assert_eq!(machine.tick(later, Category::Biology, 0), None);
        assert!(matches!(machine.state(), DisplayState::Idle { .. }));
    }

    #[test]
    fn test_mark_shows_confirmation_until_window_elapses() {
        let (mut machine, _) = DisplayStateMachine::new(Category::Biology);
        let t0 = Instant::now();

        let text = machine.confirm_mark("Alice", wall(), t0);
        assert_eq!(text.line1, "Alice-Present");
        assert_eq!(text.line2, "10:15:42");

        // Just before expiry: no transition, no emission.
        let almost = t0 + CONFIRMATION_WINDOW - Duration::from_millis(1);
        assert_eq!(machine.tick(almost, Category::Biology, 1), None);
        assert!(matches!(machine.state(), DisplayState::Confirmation { .. }));

        // At expiry: revert with the fresh count.
        let expired = t0 + CONFIRMATION_WINDOW;
        let banner = machine.tick(expired, Category::Biology, 3).unwrap();
        assert_eq!(banner.line1, "Biology -");
        assert_eq!(banner.line2, "Total: 3");
        assert!(matches!(machine.state(), DisplayState::Idle { .. }));

        // Subsequent ticks are silent.
        assert_eq!(machine.tick(expired + Duration::from_secs(5), Category::Biology, 3), None);
    }

    #[test]
    fn test_new_mark_preempts_active_confirmation() {
        let (mut machine, _) = DisplayStateMachine::new(Category::Biology);
        let t0 = Instant::now();

        machine.confirm_mark("Alice", wall(), t0);
        let t1 = t0 + Duration::from_secs(1);
        let text = machine.confirm_mark("Bob", wall(), t1);
        assert_eq!(text.line1, "Bob-Present");

        // Alice's window ending does not end Bob's.
        assert_eq!(machine.tick(t0 + CONFIRMATION_WINDOW, Category::Biology, 2), None);
        // Bob's does.
        assert!(machine
            .tick(t1 + CONFIRMATION_WINDOW, Category::Biology, 2)
            .is_some());
    }

    #[test]
    fn test_category_switch_cancels_confirmation() {
        let (mut machine, _) = DisplayStateMachine::new(Category::Biology);
        let t0 = Instant::now();
        machine.confirm_mark("Alice", wall(), t0);

        let banner = machine.category_selected(Category::Physics);
        assert_eq!(banner.line1, "Physics -");
        assert_eq!(banner.line2, "Kishor sir");
        assert!(matches!(machine.state(), DisplayState::Idle { .. }));

        // The discarded expiry must not fire later.
        assert_eq!(machine.tick(t0 + CONFIRMATION_WINDOW, Category::Physics, 1), None);
    }

    #[test]
    fn test_lines_truncate_to_panel_width() {
        let (mut machine, _) = DisplayStateMachine::new(Category::Biology);
        let text = machine.confirm_mark("Maximilian Oberholzer", wall(), Instant::now());
        assert_eq!(text.line1.chars().count(), PANEL_COLUMNS);
        assert_eq!(text.line1, "Maximilian Oberh");
    }
}
