//! Subject categories and the current-selection state.
//!
//! The category catalog is fixed at compile time; attendance for each subject
//! is tracked independently.

use std::fmt;

/// A selectable subject. Closed set, immutable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Category {
    #[default]
    Biology,
    Chemistry,
    Physics,
}

impl Category {
    /// Every category, in button/display order.
    pub const ALL: [Category; 3] = [Category::Biology, Category::Chemistry, Category::Physics];

    /// Display label shown on buttons and banners.
    pub fn label(self) -> &'static str {
        match self {
            Category::Biology => "Biology",
            Category::Chemistry => "Chemistry",
            Category::Physics => "Physics",
        }
    }

    /// Instructor responsible for the subject, shown on the idle banner.
    pub fn instructor(self) -> &'static str {
        match self {
            Category::Biology => "Maithili mam",
            Category::Chemistry => "Kiran sir",
            Category::Physics => "Kishor sir",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The currently selected category.
///
/// Mutations arrive from the UI between frames; the enum keeps values outside
/// the catalog unrepresentable, so `select` never needs to reject anything.
#[derive(Debug, Clone, Copy)]
pub struct CategorySelector {
    current: Category,
}

impl CategorySelector {
    pub fn new(initial: Category) -> Self {
        Self { current: initial }
    }

    pub fn current(&self) -> Category {
        self.current
    }

    pub fn select(&mut self, category: Category) {
        self.current = category;
    }
}
