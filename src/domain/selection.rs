use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::availability::{AvailabilityRecord, CalendarSnapshot, DateStatus};

/// Progress of a two-click range selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Idle,
    PendingEnd(NaiveDate),
}

/// Which resolved statuses may be clicked to start or finish a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    #[default]
    AvailableOnly,
    /// Also allow clicks on manually blocked days. Past and booked days stay off-limits.
    AvailableOrBlocked,
}

impl SelectionPolicy {
    pub fn is_selectable(self, status: &DateStatus) -> bool {
        match status {
            DateStatus::Available => true,
            DateStatus::Blocked => self == Self::AvailableOrBlocked,
            DateStatus::Past | DateStatus::Booked { .. } => false,
        }
    }
}

/// Result of evaluating one click, before it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Date not selectable; nothing changes.
    Ignored,
    /// Calendar is read-only; any pending anchor is dropped.
    Suppressed,
    /// First click of a range.
    Anchored(NaiveDate),
    /// Second click; the new blocked range to persist.
    RangeCompleted(AvailabilityRecord),
}

impl ClickOutcome {
    pub fn record(&self) -> Option<&AvailabilityRecord> {
        match self {
            Self::RangeCompleted(record) => Some(record),
            _ => None,
        }
    }
}

/// Turns two qualifying date clicks into one blocked [`AvailabilityRecord`].
///
/// The controller never fails. Clicks on dates that are not selectable leave
/// the state untouched. Callers that must persist the emitted record before
/// committing can split a click into [`evaluate_click`](Self::evaluate_click)
/// and [`apply`](Self::apply).
#[derive(Debug, Clone, Default)]
pub struct RangeSelectionController {
    state: SelectionState,
    read_only: bool,
    policy: SelectionPolicy,
}

impl RangeSelectionController {
    pub fn new(read_only: bool, policy: SelectionPolicy) -> Self {
        Self {
            state: SelectionState::Idle,
            read_only,
            policy,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn anchor(&self) -> Option<NaiveDate> {
        match self.state {
            SelectionState::PendingEnd(anchor) => Some(anchor),
            SelectionState::Idle => None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
        if read_only {
            self.state = SelectionState::Idle;
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Whether a click on a day resolved to `status` would be acted on.
    pub fn accepts(&self, status: &DateStatus, is_listing_active: bool) -> bool {
        !self.read_only && is_listing_active && self.policy.is_selectable(status)
    }

    pub fn evaluate_click(&self, date: NaiveDate, snapshot: &CalendarSnapshot<'_>) -> ClickOutcome {
        if self.read_only {
            return ClickOutcome::Suppressed;
        }
        if !self.accepts(&snapshot.resolve(date), snapshot.is_listing_active) {
            return ClickOutcome::Ignored;
        }
        match self.state {
            SelectionState::Idle => ClickOutcome::Anchored(date),
            SelectionState::PendingEnd(anchor) => {
                ClickOutcome::RangeCompleted(AvailabilityRecord::blocked(anchor, date))
            }
        }
    }

    pub fn apply(&mut self, outcome: &ClickOutcome) {
        match outcome {
            ClickOutcome::Ignored => {}
            ClickOutcome::Anchored(date) => self.state = SelectionState::PendingEnd(*date),
            ClickOutcome::Suppressed | ClickOutcome::RangeCompleted(_) => {
                self.state = SelectionState::Idle;
            }
        }
    }

    /// Evaluate and apply a click in one step, returning the emitted range if any.
    pub fn handle_date_click(
        &mut self,
        date: NaiveDate,
        snapshot: &CalendarSnapshot<'_>,
    ) -> Option<AvailabilityRecord> {
        let outcome = self.evaluate_click(date, snapshot);
        self.apply(&outcome);
        match outcome {
            ClickOutcome::RangeCompleted(record) => Some(record),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = SelectionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::availability::{BookingSource, BookingStatus};
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn records() -> Vec<AvailabilityRecord> {
        vec![
            AvailabilityRecord::booked(d(2024, 6, 15), d(2024, 6, 18), BookingSource::Airbnb),
            AvailabilityRecord::blocked(d(2024, 6, 25), d(2024, 6, 26)),
        ]
    }

    #[test]
    fn two_clicks_emit_ordered_blocked_range() {
        let records = records();
        let snapshot = CalendarSnapshot::new(&records, true, d(2024, 6, 10));
        let mut controller = RangeSelectionController::default();

        assert!(controller.handle_date_click(d(2024, 6, 22), &snapshot).is_none());
        assert_eq!(controller.state(), SelectionState::PendingEnd(d(2024, 6, 22)));

        let record = controller.handle_date_click(d(2024, 6, 20), &snapshot).unwrap();
        assert_eq!(record.date_start, d(2024, 6, 20));
        assert_eq!(record.date_end, d(2024, 6, 22));
        assert_eq!(record.status, BookingStatus::Blocked);
        assert_eq!(controller.state(), SelectionState::Idle);
    }

    #[test]
    fn same_date_twice_gives_single_day_range() {
        let snapshot = CalendarSnapshot::new(&[], true, d(2024, 6, 10));
        let mut controller = RangeSelectionController::default();
        controller.handle_date_click(d(2024, 6, 12), &snapshot);
        let record = controller.handle_date_click(d(2024, 6, 12), &snapshot).unwrap();
        assert_eq!(record.date_start, record.date_end);
        assert_eq!(record.day_count(), 1);
    }

    #[test]
    fn non_selectable_clicks_are_no_ops() {
        let records = records();
        let snapshot = CalendarSnapshot::new(&records, true, d(2024, 6, 10));
        let mut controller = RangeSelectionController::default();

        // past, booked, blocked while idle
        for date in [d(2024, 6, 1), d(2024, 6, 16), d(2024, 6, 25)] {
            assert!(controller.handle_date_click(date, &snapshot).is_none());
            assert_eq!(controller.state(), SelectionState::Idle);
        }

        controller.handle_date_click(d(2024, 6, 20), &snapshot);
        assert!(controller.handle_date_click(d(2024, 6, 16), &snapshot).is_none());
        assert_eq!(controller.state(), SelectionState::PendingEnd(d(2024, 6, 20)));
    }

    #[test]
    fn inactive_listing_ignores_clicks() {
        let snapshot = CalendarSnapshot::new(&[], false, d(2024, 6, 10));
        let controller = RangeSelectionController::new(false, SelectionPolicy::AvailableOrBlocked);
        assert_eq!(
            controller.evaluate_click(d(2024, 6, 20), &snapshot),
            ClickOutcome::Ignored
        );
    }

    #[test]
    fn read_only_suppresses_and_resets() {
        let snapshot = CalendarSnapshot::new(&[], true, d(2024, 6, 10));
        let mut controller = RangeSelectionController::default();
        controller.handle_date_click(d(2024, 6, 20), &snapshot);
        controller.set_read_only(true);
        assert_eq!(controller.state(), SelectionState::Idle);
        assert_eq!(
            controller.evaluate_click(d(2024, 6, 21), &snapshot),
            ClickOutcome::Suppressed
        );
        assert!(controller.handle_date_click(d(2024, 6, 21), &snapshot).is_none());
        assert_eq!(controller.state(), SelectionState::Idle);
    }

    #[test]
    fn blocked_days_selectable_under_permissive_policy() {
        let records = records();
        let snapshot = CalendarSnapshot::new(&records, true, d(2024, 6, 10));
        let mut controller =
            RangeSelectionController::new(false, SelectionPolicy::AvailableOrBlocked);
        controller.handle_date_click(d(2024, 6, 25), &snapshot);
        let record = controller.handle_date_click(d(2024, 6, 27), &snapshot).unwrap();
        assert_eq!(record.date_start, d(2024, 6, 25));
        // booked still rejected
        assert_eq!(
            controller.evaluate_click(d(2024, 6, 16), &snapshot),
            ClickOutcome::Ignored
        );
    }

    #[test]
    fn evaluate_does_not_mutate() {
        let snapshot = CalendarSnapshot::new(&[], true, d(2024, 6, 10));
        let mut controller = RangeSelectionController::default();
        controller.handle_date_click(d(2024, 6, 20), &snapshot);
        let outcome = controller.evaluate_click(d(2024, 6, 23), &snapshot);
        assert!(outcome.record().is_some());
        // not applied yet: a failed save keeps the anchor
        assert_eq!(controller.anchor(), Some(d(2024, 6, 20)));
        controller.apply(&outcome);
        assert_eq!(controller.anchor(), None);
    }

    #[test]
    fn reset_clears_pending_anchor() {
        let snapshot = CalendarSnapshot::new(&[], true, d(2024, 6, 10));
        let mut controller = RangeSelectionController::default();
        controller.handle_date_click(d(2024, 6, 20), &snapshot);
        controller.reset();
        assert_eq!(controller.state(), SelectionState::Idle);
    }

    #[test]
    fn policy_never_selects_past_or_booked() {
        for policy in [SelectionPolicy::AvailableOnly, SelectionPolicy::AvailableOrBlocked] {
            assert!(!policy.is_selectable(&DateStatus::Past));
            assert!(!policy.is_selectable(&DateStatus::Booked {
                source: BookingSource::Internal,
                guest_name: None,
            }));
            assert!(policy.is_selectable(&DateStatus::Available));
        }
    }

    #[test]
    fn accepts_combines_mode_activity_and_policy() {
        let permissive = RangeSelectionController::new(false, SelectionPolicy::AvailableOrBlocked);
        assert!(permissive.accepts(&DateStatus::Blocked, true));
        assert!(!permissive.accepts(&DateStatus::Blocked, false));
        assert!(!permissive.accepts(&DateStatus::Past, true));

        let strict = RangeSelectionController::default();
        assert!(strict.accepts(&DateStatus::Available, true));
        assert!(!strict.accepts(&DateStatus::Blocked, true));

        let read_only = RangeSelectionController::new(true, SelectionPolicy::AvailableOrBlocked);
        assert!(!read_only.accepts(&DateStatus::Available, true));
    }
}
