use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Occupancy status stored on an availability record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Available,
    Booked,
    Blocked,
}

impl BookingStatus {
    /// Rank used by [`OverlapPolicy::BookedFirst`]; lower sorts first.
    fn precedence(self) -> u8 {
        match self {
            Self::Booked => 0,
            Self::Blocked => 1,
            Self::Available => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Booked => "booked",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel a booking came from.
///
/// The backend stores the source as a free-form string. Anything other than
/// `airbnb` or `booking` is a reservation made on the platform itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BookingSource {
    #[default]
    Internal,
    Airbnb,
    Booking,
}

impl BookingSource {
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "airbnb" => Self::Airbnb,
            "booking" | "booking.com" => Self::Booking,
            _ => Self::Internal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Airbnb => "airbnb",
            Self::Booking => "booking",
        }
    }

    /// Human-facing channel name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Internal => "Uilet.kz",
            Self::Airbnb => "Airbnb",
            Self::Booking => "Booking.com",
        }
    }
}

impl std::fmt::Display for BookingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for BookingSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BookingSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// Parse a calendar day from either `YYYY-MM-DD` or an RFC 3339 timestamp.
///
/// Only the date part is kept; any time or offset suffix is ignored.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let day_part = trimmed.get(..10)?;
    let rest = &trimmed[10..];
    if !rest.is_empty() && !rest.starts_with(['T', 't', ' ']) {
        return None;
    }
    NaiveDate::parse_from_str(day_part, DATE_FORMAT).ok()
}

mod calendar_day {
    use super::{DATE_FORMAT, parse_calendar_date};
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(DATE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_calendar_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid calendar date '{raw}'")))
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// A date range with an occupancy status. Both ends are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(with = "calendar_day")]
    pub date_start: NaiveDate,
    #[serde(with = "calendar_day")]
    pub date_end: NaiveDate,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<BookingSource>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub booking_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub guest_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub guest_phone: Option<String>,
}

impl AvailabilityRecord {
    /// A manual block covering both dates, in whichever order they were given.
    pub fn blocked(a: NaiveDate, b: NaiveDate) -> Self {
        Self {
            id: None,
            date_start: a.min(b),
            date_end: a.max(b),
            status: BookingStatus::Blocked,
            source: None,
            booking_id: None,
            guest_name: None,
            guest_phone: None,
        }
    }

    pub fn booked(start: NaiveDate, end: NaiveDate, source: BookingSource) -> Self {
        Self {
            id: None,
            date_start: start,
            date_end: end,
            status: BookingStatus::Booked,
            source: Some(source),
            booking_id: None,
            guest_name: None,
            guest_phone: None,
        }
    }

    #[must_use]
    pub fn with_guest(mut self, name: impl Into<String>) -> Self {
        self.guest_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn is_well_formed(&self) -> bool {
        self.date_start <= self.date_end
    }

    /// Inclusive containment. A malformed record contains nothing.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.date_start <= date && date <= self.date_end
    }

    /// Number of calendar days covered.
    pub fn day_count(&self) -> i64 {
        if self.is_well_formed() {
            (self.date_end - self.date_start).num_days() + 1
        } else {
            0
        }
    }
}

/// Display status of a single calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DateStatus {
    Available,
    Past,
    Blocked,
    Booked {
        source: BookingSource,
        guest_name: Option<String>,
    },
}

impl DateStatus {
    fn from_record(record: &AvailabilityRecord) -> Self {
        match record.status {
            BookingStatus::Available => Self::Available,
            BookingStatus::Blocked => Self::Blocked,
            BookingStatus::Booked => Self::Booked {
                source: record.source.unwrap_or_default(),
                guest_name: record.guest_name.clone(),
            },
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl std::fmt::Display for DateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Past => write!(f, "past"),
            Self::Blocked => write!(f, "blocked"),
            Self::Booked {
                source,
                guest_name: Some(guest),
            } => write!(f, "booked ({source}, guest: {guest})"),
            Self::Booked {
                source,
                guest_name: None,
            } => write!(f, "booked ({source})"),
        }
    }
}

/// First record, in supplied order, whose inclusive range covers `date`.
pub fn matching_record(date: NaiveDate, records: &[AvailabilityRecord]) -> Option<&AvailabilityRecord> {
    records.iter().find(|r| r.contains(date))
}

/// Resolve the display status of `date`.
///
/// Rules, first match wins:
/// 1. inactive listing: `Blocked`
/// 2. `date < today`: `Past`
/// 3. first covering record in `records` order
/// 4. otherwise `Available`
pub fn resolve(
    date: NaiveDate,
    records: &[AvailabilityRecord],
    is_listing_active: bool,
    today: NaiveDate,
) -> DateStatus {
    if !is_listing_active {
        return DateStatus::Blocked;
    }
    if date < today {
        return DateStatus::Past;
    }
    matching_record(date, records).map_or(DateStatus::Available, DateStatus::from_record)
}

/// Explicit precedence between overlapping records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Keep the caller's order; the first covering record wins.
    #[default]
    FirstMatch,
    /// Booked ranges win over manual blocks, which win over explicit `available` records.
    BookedFirst,
}

impl OverlapPolicy {
    /// Reorder a snapshot so first-match resolution follows this policy.
    /// The sort is stable: records of the same status keep their relative order.
    pub fn apply(self, records: &mut [AvailabilityRecord]) {
        if self == Self::BookedFirst {
            records.sort_by_key(|r| r.status.precedence());
        }
    }
}

/// Read-only inputs for one render pass.
#[derive(Debug, Clone, Copy)]
pub struct CalendarSnapshot<'a> {
    pub records: &'a [AvailabilityRecord],
    pub is_listing_active: bool,
    pub today: NaiveDate,
}

impl<'a> CalendarSnapshot<'a> {
    pub fn new(records: &'a [AvailabilityRecord], is_listing_active: bool, today: NaiveDate) -> Self {
        Self {
            records,
            is_listing_active,
            today,
        }
    }

    pub fn resolve(&self, date: NaiveDate) -> DateStatus {
        resolve(date, self.records, self.is_listing_active, self.today)
    }

    /// Hover details for a day whose status came from a record.
    pub fn hover(&self, date: NaiveDate) -> Option<HoverInfo> {
        if !self.is_listing_active || date < self.today {
            return None;
        }
        matching_record(date, self.records).map(HoverInfo::from_record)
    }
}

/// Visual class of a day cell. Total over every status/source pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayAppearance {
    Available,
    BookedInternal,
    BookedAirbnb,
    BookedBooking,
    Blocked,
    Past,
}

impl DayAppearance {
    pub const ALL: [Self; 6] = [
        Self::Available,
        Self::BookedInternal,
        Self::BookedAirbnb,
        Self::BookedBooking,
        Self::Blocked,
        Self::Past,
    ];

    pub fn from_status(status: &DateStatus) -> Self {
        match status {
            DateStatus::Available => Self::Available,
            DateStatus::Past => Self::Past,
            DateStatus::Blocked => Self::Blocked,
            DateStatus::Booked { source, .. } => match source {
                BookingSource::Internal => Self::BookedInternal,
                BookingSource::Airbnb => Self::BookedAirbnb,
                BookingSource::Booking => Self::BookedBooking,
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::BookedInternal => "Booked on Uilet.kz",
            Self::BookedAirbnb => "Booked on Airbnb",
            Self::BookedBooking => "Booked on Booking.com",
            Self::Blocked => "Blocked",
            Self::Past => "Past date",
        }
    }

    /// Color token for the presentation layer.
    pub fn color(self) -> &'static str {
        match self {
            Self::Available => "green",
            Self::BookedInternal => "red",
            Self::BookedAirbnb => "orange",
            Self::BookedBooking => "yellow",
            Self::Blocked => "gray",
            Self::Past => "light-gray",
        }
    }

    /// Single-character marker used in the text grid.
    pub fn marker(self) -> char {
        match self {
            Self::Available => '.',
            Self::BookedInternal => 'U',
            Self::BookedAirbnb => 'A',
            Self::BookedBooking => 'B',
            Self::Blocked => 'x',
            Self::Past => '-',
        }
    }
}

/// Details shown when hovering a day covered by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoverInfo {
    pub title: String,
    pub source: Option<BookingSource>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
}

impl HoverInfo {
    pub fn from_record(record: &AvailabilityRecord) -> Self {
        Self {
            title: record
                .guest_name
                .clone()
                .unwrap_or_else(|| "Booked".to_string()),
            source: record.source,
            date_start: record.date_start,
            date_end: record.date_end,
        }
    }
}

impl std::fmt::Display for HoverInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title)?;
        if let Some(source) = self.source {
            write!(f, " [{source}]")?;
        }
        write!(
            f,
            " {} - {}",
            self.date_start.format("%-d %b"),
            self.date_end.format("%-d %b")
        )
    }
}
