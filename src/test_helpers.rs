use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::availability::{AvailabilityRecord, BookingSource};
use crate::error::Result;
use crate::ports::availability_store::AvailabilityStore;

type FetchFn = Box<dyn Fn(&str) -> Result<Vec<AvailabilityRecord>> + Send + Sync>;
type ActiveFn = Box<dyn Fn(&str) -> Result<bool> + Send + Sync>;
type SaveFn = Box<dyn Fn(&str, &AvailabilityRecord) -> Result<AvailabilityRecord> + Send + Sync>;
type RemoveFn = Box<dyn Fn(&str, u64) -> Result<()> + Send + Sync>;

pub struct MockAvailabilityStore {
    fetch_fn: Mutex<FetchFn>,
    active_fn: Mutex<ActiveFn>,
    save_fn: Mutex<SaveFn>,
    remove_fn: Mutex<RemoveFn>,
    saved: Mutex<Vec<(String, AvailabilityRecord)>>,
}

impl Default for MockAvailabilityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAvailabilityStore {
    pub fn new() -> Self {
        Self {
            fetch_fn: Mutex::new(Box::new(|_| Ok(vec![]))),
            active_fn: Mutex::new(Box::new(|_| Ok(true))),
            save_fn: Mutex::new(Box::new(|_, record| Ok(record.clone().with_id(100)))),
            remove_fn: Mutex::new(Box::new(|_, _| Ok(()))),
            saved: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_records(self, records: Vec<AvailabilityRecord>) -> Self {
        self.with_fetch(move |_| Ok(records.clone()))
    }

    #[must_use]
    pub fn with_fetch(
        self,
        f: impl Fn(&str) -> Result<Vec<AvailabilityRecord>> + Send + Sync + 'static,
    ) -> Self {
        *self.fetch_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_active(self, f: impl Fn(&str) -> Result<bool> + Send + Sync + 'static) -> Self {
        *self.active_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_save(
        self,
        f: impl Fn(&str, &AvailabilityRecord) -> Result<AvailabilityRecord> + Send + Sync + 'static,
    ) -> Self {
        *self.save_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_remove(self, f: impl Fn(&str, u64) -> Result<()> + Send + Sync + 'static) -> Self {
        *self.remove_fn.lock().unwrap() = Box::new(f);
        self
    }

    /// Every `(apartment_id, record)` successfully saved so far.
    pub fn saved(&self) -> Vec<(String, AvailabilityRecord)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl AvailabilityStore for MockAvailabilityStore {
    async fn fetch_availabilities(&self, apartment_id: &str) -> Result<Vec<AvailabilityRecord>> {
        (self.fetch_fn.lock().unwrap())(apartment_id)
    }

    async fn is_listing_active(&self, apartment_id: &str) -> Result<bool> {
        (self.active_fn.lock().unwrap())(apartment_id)
    }

    async fn save_blocked_range(
        &self,
        apartment_id: &str,
        record: &AvailabilityRecord,
    ) -> Result<AvailabilityRecord> {
        let saved = (self.save_fn.lock().unwrap())(apartment_id, record)?;
        self.saved
            .lock()
            .unwrap()
            .push((apartment_id.to_string(), saved.clone()));
        Ok(saved)
    }

    async fn remove_blocked_range(&self, apartment_id: &str, record_id: u64) -> Result<()> {
        (self.remove_fn.lock().unwrap())(apartment_id, record_id)
    }
}

// ---------- Factory helpers ----------

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// June 2024 fixture: an Airbnb stay and a manual block.
pub fn june_records() -> Vec<AvailabilityRecord> {
    vec![
        AvailabilityRecord::booked(d(2024, 6, 15), d(2024, 6, 18), BookingSource::Airbnb)
            .with_guest("Dana")
            .with_id(1),
        AvailabilityRecord::blocked(d(2024, 6, 25), d(2024, 6, 26)).with_id(2),
    ]
}
