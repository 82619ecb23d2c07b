use chrono::NaiveDate;

use crate::domain::availability::CalendarSnapshot;
use crate::domain::calendar_view::{CalendarMonth, MonthView, WeekStart};
use crate::domain::selection::{RangeSelectionController, SelectionPolicy};

/// UI state of one open calendar: displayed month plus pending selection.
///
/// Owned by whoever drives the calendar. Dropping it discards any pending anchor.
#[derive(Debug, Clone)]
pub struct CalendarSession {
    apartment_id: String,
    month: CalendarMonth,
    week_start: WeekStart,
    controller: RangeSelectionController,
}

impl CalendarSession {
    pub fn new(
        apartment_id: impl Into<String>,
        month: CalendarMonth,
        week_start: WeekStart,
        read_only: bool,
        policy: SelectionPolicy,
    ) -> Self {
        Self {
            apartment_id: apartment_id.into(),
            month,
            week_start,
            controller: RangeSelectionController::new(read_only, policy),
        }
    }

    pub fn apartment_id(&self) -> &str {
        &self.apartment_id
    }

    pub fn month(&self) -> CalendarMonth {
        self.month
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    /// Move the displayed month by `delta`. The pending selection survives navigation.
    pub fn navigate(&mut self, delta: i32) -> CalendarMonth {
        self.month = self.month.offset(delta);
        self.month
    }

    pub fn controller(&self) -> &RangeSelectionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut RangeSelectionController {
        &mut self.controller
    }

    pub fn anchor(&self) -> Option<NaiveDate> {
        self.controller.anchor()
    }

    pub fn reset_selection(&mut self) {
        self.controller.reset();
    }

    pub fn view(&self, snapshot: &CalendarSnapshot<'_>) -> MonthView {
        MonthView::project(self.month, self.week_start, snapshot, &self.controller)
    }
}
