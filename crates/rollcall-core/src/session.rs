//! One attendance session: every piece of state the frame loop mutates,
//! owned in a single place rather than as free-standing globals.

use crate::catalog::FaceCatalog;
use crate::category::{Category, CategorySelector};
use crate::display::{DisplayStateMachine, PanelText};
use crate::ledger::AttendanceLedger;
use crate::matcher::{FaceMatcher, MatchOutcome};
use crate::overlay::{self, OverlayPlan};
use crate::types::Detection;
use chrono::{DateTime, Local};
use std::time::Instant;

/// A newly recorded attendance event.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkEvent {
    pub identity: String,
    pub category: Category,
    pub at: DateTime<Local>,
}

/// What one frame decided.
#[derive(Debug, Clone)]
pub struct FrameDecision {
    /// Panel text to write; present only when the display state changed.
    pub panel: Option<PanelText>,
    /// The successful mark of this frame, if any.
    pub marked: Option<MarkEvent>,
}

pub struct Session {
    catalog: FaceCatalog,
    matcher: FaceMatcher,
    ledger: AttendanceLedger,
    selector: CategorySelector,
    display: DisplayStateMachine,
}

impl Session {
    /// Build a session around an immutable catalog. Returns the startup
    /// banner for the status panel alongside it.
    pub fn new(catalog: FaceCatalog, matcher: FaceMatcher, initial: Category) -> (Self, PanelText) {
        let (display, banner) = DisplayStateMachine::new(initial);
        let session = Self {
            catalog,
            matcher,
            ledger: AttendanceLedger::new(),
            selector: CategorySelector::new(initial),
            display,
        };
        (session, banner)
    }

    pub fn current_category(&self) -> Category {
        self.selector.current()
    }

    /// Attendance count for the currently selected category.
    pub fn present_count(&self) -> usize {
        self.ledger.count_for(self.selector.current())
    }

    pub fn ledger(&self) -> &AttendanceLedger {
        &self.ledger
    }

    /// Apply a category selection from the UI. Takes effect for the next
    /// frame's decisions; the returned banner goes to the status panel.
    pub fn select_category(&mut self, category: Category) -> PanelText {
        self.selector.select(category);
        tracing::info!(category = %category, "switched category");
        self.display.category_selected(category)
    }

    /// Decide one frame: identify each detection in order, mark the first
    /// identified-and-unmarked face, then drive the display.
    ///
    /// First-match-wins: the walk stops at the first successful mark.
    /// `Unknown` results and already-marked faces do not stop it — anyone
    /// skipped here is marked on a following frame while still in view.
    pub fn process_frame(
        &mut self,
        detections: &[Detection],
        now: Instant,
        at: DateTime<Local>,
    ) -> FrameDecision {
        let outcomes = self.matcher.identify(&self.catalog, detections);

        let mut marked = None;
        for outcome in outcomes {
            let MatchOutcome::Identified { name, distance } = outcome else {
                continue;
            };
            let category = self.selector.current();
            if self.ledger.try_mark(&name, category, at) {
                tracing::info!(
                    identity = %name,
                    category = %category,
                    distance,
                    time = %at.format("%H:%M:%S"),
                    "marked present"
                );
                marked = Some(MarkEvent {
                    identity: name,
                    category,
                    at,
                });
                break;
            }
        }

        let panel = match &marked {
            Some(event) => Some(self.display.confirm_mark(&event.identity, event.at, now)),
            None => self.display.tick(now, self.selector.current(), self.present_count()),
        };

        FrameDecision { panel, marked }
    }

    /// Overlay instructions for the preview window, recomputed per frame.
    pub fn overlay(&self) -> OverlayPlan {
        overlay::plan(self.selector.current(), self.present_count())
    }
}
