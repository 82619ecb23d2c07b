use async_trait::async_trait;

use crate::domain::availability::AvailabilityRecord;
use crate::error::{CalendarError, Result};

/// Storage of an apartment's availability records, owned by the listing backend.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn fetch_availabilities(&self, apartment_id: &str) -> Result<Vec<AvailabilityRecord>>;

    /// Persist a new blocked range and return the stored record.
    async fn save_blocked_range(
        &self,
        apartment_id: &str,
        record: &AvailabilityRecord,
    ) -> Result<AvailabilityRecord>;

    async fn is_listing_active(&self, _apartment_id: &str) -> Result<bool> {
        Ok(true)
    }

    async fn remove_blocked_range(&self, apartment_id: &str, record_id: u64) -> Result<()> {
        Err(CalendarError::InvalidParams {
            reason: format!(
                "removing record {record_id} of apartment {apartment_id} is not supported by this store"
            ),
        })
    }
}
