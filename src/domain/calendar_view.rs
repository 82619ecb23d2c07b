#![allow(clippy::cast_precision_loss)]

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::availability::{CalendarSnapshot, DateStatus, DayAppearance};
use crate::domain::selection::RangeSelectionController;
use crate::error::CalendarError;

/// First column of the weekly grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    /// Column index (0-6) of `weekday` in a grid starting on this day.
    pub fn column(self, weekday: Weekday) -> u32 {
        match self {
            Self::Monday => weekday.num_days_from_monday(),
            Self::Sunday => weekday.num_days_from_sunday(),
        }
    }

    pub fn headers(self) -> [&'static str; 7] {
        match self {
            Self::Monday => ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"],
            Self::Sunday => ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"],
        }
    }
}

/// A calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarMonth {
    first: NaiveDate,
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(self) -> i32 {
        self.first.year()
    }

    pub fn month(self) -> u32 {
        self.first.month()
    }

    pub fn first_day(self) -> NaiveDate {
        self.first
    }

    pub fn last_day(self) -> NaiveDate {
        self.first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn num_days(self) -> u32 {
        self.last_day().day()
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last_day()
    }

    /// Shift by `delta` months. Saturates at the edges of the supported date range.
    #[must_use]
    pub fn offset(self, delta: i32) -> Self {
        let months = Months::new(delta.unsigned_abs());
        let shifted = if delta >= 0 {
            self.first.checked_add_months(months)
        } else {
            self.first.checked_sub_months(months)
        };
        shifted.map_or(self, |first| Self { first })
    }

    #[must_use]
    pub fn next(self) -> Self {
        self.offset(1)
    }

    #[must_use]
    pub fn prev(self) -> Self {
        self.offset(-1)
    }

    /// Human label such as `June 2024`.
    pub fn label(self) -> String {
        self.first.format("%B %Y").to_string()
    }
}

impl std::fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for CalendarMonth {
    type Err = CalendarError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CalendarError::InvalidParams {
            reason: format!("invalid month '{s}', expected YYYY-MM"),
        };
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

/// Every day shown for `month`: leading days of the previous month, the month
/// itself, and trailing days of the next month, so the result fills whole weeks.
pub fn enumerate_visible_days(month: CalendarMonth, week_start: WeekStart) -> Vec<NaiveDate> {
    let first = month.first_day();
    let last = month.last_day();
    let lead = week_start.column(first.weekday());
    let trail = 6 - week_start.column(last.weekday());
    let start = first
        .checked_sub_days(Days::new(u64::from(lead)))
        .unwrap_or(first);
    let total = (lead + month.num_days() + trail) as usize;
    start.iter_days().take(total).collect()
}

/// The legend, in display order.
pub fn legend() -> [DayAppearance; 6] {
    DayAppearance::ALL
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_month: bool,
    pub status: DateStatus,
    pub appearance: DayAppearance,
    pub is_anchor: bool,
    pub interactive: bool,
}

/// Status counts over the days that belong to the month itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthSummary {
    pub available: u32,
    pub booked: u32,
    pub blocked: u32,
    pub past: u32,
    /// Booked or blocked share of the month's non-past days, in percent.
    pub occupancy_rate: Option<f64>,
}

impl MonthSummary {
    fn from_cells(cells: &[DayCell]) -> Self {
        let mut summary = Self::default();
        for cell in cells.iter().filter(|c| c.in_month) {
            match cell.status {
                DateStatus::Available => summary.available += 1,
                DateStatus::Booked { .. } => summary.booked += 1,
                DateStatus::Blocked => summary.blocked += 1,
                DateStatus::Past => summary.past += 1,
            }
        }
        let open_days = summary.available + summary.booked + summary.blocked;
        if open_days > 0 {
            let occupied = summary.booked + summary.blocked;
            summary.occupancy_rate = Some(f64::from(occupied) / f64::from(open_days) * 100.0);
        }
        summary
    }
}

/// Read-only projection of one month for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthView {
    #[serde(serialize_with = "serialize_month")]
    pub month: CalendarMonth,
    pub week_start: WeekStart,
    pub read_only: bool,
    pub anchor: Option<NaiveDate>,
    pub cells: Vec<DayCell>,
    pub summary: MonthSummary,
}

fn serialize_month<S: serde::Serializer>(month: &CalendarMonth, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(month)
}

impl MonthView {
    /// Resolve every visible day independently against `snapshot`.
    pub fn project(
        month: CalendarMonth,
        week_start: WeekStart,
        snapshot: &CalendarSnapshot<'_>,
        controller: &RangeSelectionController,
    ) -> Self {
        let anchor = controller.anchor();
        let read_only = controller.is_read_only();
        let cells: Vec<DayCell> = enumerate_visible_days(month, week_start)
            .into_iter()
            .map(|date| {
                let status = snapshot.resolve(date);
                let appearance = DayAppearance::from_status(&status);
                DayCell {
                    date,
                    in_month: month.contains(date),
                    interactive: controller.accepts(&status, snapshot.is_listing_active),
                    is_anchor: anchor == Some(date),
                    status,
                    appearance,
                }
            })
            .collect();
        let summary = MonthSummary::from_cells(&cells);
        Self {
            month,
            week_start,
            read_only,
            anchor,
            cells,
            summary,
        }
    }

    pub fn weeks(&self) -> std::slice::Chunks<'_, DayCell> {
        self.cells.chunks(7)
    }

    pub fn cell(&self, date: NaiveDate) -> Option<&DayCell> {
        self.cells.iter().find(|c| c.date == date)
    }
}

/// Text grid. Each cell is a prefix (`*` anchor, `~` adjacent month), the day
/// number, and the appearance marker from the legend.
impl std::fmt::Display for MonthView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Availability calendar: {}", self.month.label())?;
        if self.read_only {
            writeln!(f, "(read-only)")?;
        }
        let mut header = String::new();
        for name in self.week_start.headers() {
            let _ = write!(header, " {name} ");
        }
        writeln!(f, "{}", header.trim_end())?;
        for week in self.weeks() {
            let mut line = String::new();
            for cell in week {
                let prefix = if cell.is_anchor {
                    '*'
                } else if cell.in_month {
                    ' '
                } else {
                    '~'
                };
                let _ = write!(
                    line,
                    "{prefix}{:>2}{}",
                    cell.date.day(),
                    cell.appearance.marker()
                );
            }
            writeln!(f, "{}", line.trim_end())?;
        }
        writeln!(f)?;
        writeln!(f, "Legend:")?;
        for appearance in legend() {
            writeln!(f, "  {}  {}", appearance.marker(), appearance.label())?;
        }
        writeln!(f)?;
        let s = &self.summary;
        write!(
            f,
            "Available: {} | Booked: {} | Blocked: {} | Past: {}",
            s.available, s.booked, s.blocked, s.past
        )?;
        if let Some(rate) = s.occupancy_rate {
            write!(f, " | Occupancy: {rate:.1}%")?;
        }
        writeln!(f)?;
        if let Some(anchor) = self.anchor {
            writeln!(f, "Range start selected: {anchor} (click an end date)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::availability::{AvailabilityRecord, BookingSource};
    use crate::domain::selection::{ClickOutcome, SelectionPolicy};
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn june() -> CalendarMonth {
        CalendarMonth::new(2024, 6).unwrap()
    }

    #[test]
    fn month_lengths_and_leap_years() {
        assert_eq!(CalendarMonth::new(2024, 2).unwrap().num_days(), 29);
        assert_eq!(CalendarMonth::new(2023, 2).unwrap().num_days(), 28);
        assert_eq!(CalendarMonth::new(1900, 2).unwrap().num_days(), 28);
        assert_eq!(CalendarMonth::new(2000, 2).unwrap().num_days(), 29);
        assert_eq!(CalendarMonth::new(2024, 4).unwrap().num_days(), 30);
        assert_eq!(CalendarMonth::new(2024, 12).unwrap().num_days(), 31);
        assert!(CalendarMonth::new(2024, 13).is_none());
        assert!(CalendarMonth::new(2024, 0).is_none());
    }

    #[test]
    fn navigation_crosses_year_boundaries() {
        let december = CalendarMonth::new(2024, 12).unwrap();
        assert_eq!(december.next(), CalendarMonth::new(2025, 1).unwrap());
        assert_eq!(december.next().prev(), december);
        assert_eq!(
            CalendarMonth::new(2024, 1).unwrap().prev(),
            CalendarMonth::new(2023, 12).unwrap()
        );
        assert_eq!(june().offset(-18), CalendarMonth::new(2022, 12).unwrap());
        assert_eq!(june().offset(0), june());
    }

    #[test]
    fn containing_normalizes_to_first_day() {
        let month = CalendarMonth::containing(d(2024, 6, 17));
        assert_eq!(month.first_day(), d(2024, 6, 1));
        assert_eq!(month.last_day(), d(2024, 6, 30));
        assert!(month.contains(d(2024, 6, 30)));
        assert!(!month.contains(d(2024, 7, 1)));
    }

    #[test]
    fn parse_and_display_month() {
        let month: CalendarMonth = "2024-06".parse().unwrap();
        assert_eq!(month, june());
        assert_eq!(month.to_string(), "2024-06");
        assert_eq!(month.label(), "June 2024");
        assert!("2024-6".parse::<CalendarMonth>().is_err());
        assert!("2024-13".parse::<CalendarMonth>().is_err());
        assert!("June".parse::<CalendarMonth>().is_err());
    }

    #[test]
    fn june_2024_grid_monday_start() {
        // 1 June 2024 is a Saturday, 30 June a Sunday.
        let days = enumerate_visible_days(june(), WeekStart::Monday);
        assert_eq!(days.len(), 35);
        assert_eq!(days[0], d(2024, 5, 27));
        assert_eq!(days[5], d(2024, 6, 1));
        assert_eq!(*days.last().unwrap(), d(2024, 6, 30));
    }

    #[test]
    fn june_2024_grid_sunday_start() {
        let days = enumerate_visible_days(june(), WeekStart::Sunday);
        assert_eq!(days.len(), 42);
        assert_eq!(days[0], d(2024, 5, 26));
        assert_eq!(days[0].weekday(), Weekday::Sun);
        assert_eq!(*days.last().unwrap(), d(2024, 7, 6));
    }

    #[test]
    fn february_2021_fits_four_weeks() {
        // 1 Feb 2021 is a Monday and the month has 28 days.
        let days = enumerate_visible_days(CalendarMonth::new(2021, 2).unwrap(), WeekStart::Monday);
        assert_eq!(days.len(), 28);
        assert_eq!(days[0], d(2021, 2, 1));
    }

    #[test]
    fn visible_days_are_consecutive() {
        let days = enumerate_visible_days(CalendarMonth::new(2024, 3).unwrap(), WeekStart::Monday);
        for pair in days.windows(2) {
            assert_eq!(pair[0].succ_opt().unwrap(), pair[1]);
        }
        assert_eq!(days.len() % 7, 0);
    }

    #[test]
    fn project_marks_statuses_anchor_and_summary() {
        let records = vec![AvailabilityRecord::booked(
            d(2024, 6, 15),
            d(2024, 6, 18),
            BookingSource::Airbnb,
        )];
        let snapshot = CalendarSnapshot::new(&records, true, d(2024, 6, 10));
        let mut controller = RangeSelectionController::new(false, SelectionPolicy::AvailableOnly);
        controller.handle_date_click(d(2024, 6, 20), &snapshot);

        let view = MonthView::project(june(), WeekStart::Monday, &snapshot, &controller);
        let booked = view.cell(d(2024, 6, 16)).unwrap();
        assert_eq!(booked.appearance, DayAppearance::BookedAirbnb);
        assert!(!booked.interactive);
        let anchor = view.cell(d(2024, 6, 20)).unwrap();
        assert!(anchor.is_anchor);
        assert!(anchor.interactive);
        let leading = view.cell(d(2024, 5, 27)).unwrap();
        assert!(!leading.in_month);
        assert_eq!(leading.status, DateStatus::Past);

        assert_eq!(view.summary.past, 9);
        assert_eq!(view.summary.booked, 4);
        assert_eq!(view.summary.blocked, 0);
        assert_eq!(view.summary.available, 17);
        let rate = view.summary.occupancy_rate.unwrap();
        assert!((rate - 4.0 / 21.0 * 100.0).abs() < 0.01);
    }

    #[test]
    fn read_only_view_has_no_interactive_cells() {
        let snapshot = CalendarSnapshot::new(&[], true, d(2024, 6, 1));
        let controller = RangeSelectionController::new(true, SelectionPolicy::AvailableOnly);
        let view = MonthView::project(june(), WeekStart::Monday, &snapshot, &controller);
        assert!(view.cells.iter().all(|c| !c.interactive));
        assert!(view.to_string().contains("(read-only)"));
    }

    #[test]
    fn inactive_listing_view_is_fully_blocked() {
        let snapshot = CalendarSnapshot::new(&[], false, d(2024, 6, 10));
        let controller = RangeSelectionController::default();
        let view = MonthView::project(june(), WeekStart::Monday, &snapshot, &controller);
        assert!(view.cells.iter().all(|c| c.status == DateStatus::Blocked));
        assert!(view.cells.iter().all(|c| !c.interactive));
        assert_eq!(view.summary.blocked, 30);
        assert_eq!(view.summary.occupancy_rate, Some(100.0));
    }

    #[test]
    fn permissive_policy_opens_blocked_cells() {
        let records = vec![
            AvailabilityRecord::blocked(d(2024, 6, 25), d(2024, 6, 26)),
            AvailabilityRecord::booked(d(2024, 6, 15), d(2024, 6, 18), BookingSource::Airbnb),
        ];
        let snapshot = CalendarSnapshot::new(&records, true, d(2024, 6, 10));
        let controller =
            RangeSelectionController::new(false, SelectionPolicy::AvailableOrBlocked);
        let view = MonthView::project(june(), WeekStart::Monday, &snapshot, &controller);

        let blocked = view.cell(d(2024, 6, 25)).unwrap();
        assert_eq!(blocked.status, DateStatus::Blocked);
        assert!(blocked.interactive);
        assert!(!view.cell(d(2024, 6, 16)).unwrap().interactive);
        assert!(!view.cell(d(2024, 6, 5)).unwrap().interactive);

        // Every cell agrees with what a click on it would do
        for cell in &view.cells {
            let anchors = matches!(
                controller.evaluate_click(cell.date, &snapshot),
                ClickOutcome::Anchored(_)
            );
            assert_eq!(cell.interactive, anchors, "mismatch on {}", cell.date);
        }
    }

    #[test]
    fn default_policy_keeps_blocked_cells_closed() {
        let records = vec![AvailabilityRecord::blocked(d(2024, 6, 25), d(2024, 6, 26))];
        let snapshot = CalendarSnapshot::new(&records, true, d(2024, 6, 10));
        let controller = RangeSelectionController::default();
        let view = MonthView::project(june(), WeekStart::Monday, &snapshot, &controller);
        assert!(!view.cell(d(2024, 6, 25)).unwrap().interactive);
        assert!(view.cell(d(2024, 6, 27)).unwrap().interactive);
    }

    #[test]
    fn display_renders_grid_and_legend() {
        let records = vec![AvailabilityRecord::blocked(d(2024, 6, 20), d(2024, 6, 22))];
        let snapshot = CalendarSnapshot::new(&records, true, d(2024, 6, 10));
        let controller = RangeSelectionController::default();
        let text =
            MonthView::project(june(), WeekStart::Monday, &snapshot, &controller).to_string();
        assert!(text.contains("June 2024"));
        assert!(text.starts_with("Availability calendar"));
        assert!(text.contains("Mo  Tu  We  Th  Fr  Sa  Su"));
        assert!(text.contains(" 20x"));
        assert!(text.contains("~27-"));
        assert!(text.contains("Booked on Booking.com"));
        assert!(text.contains("Blocked: 3"));
    }
}
