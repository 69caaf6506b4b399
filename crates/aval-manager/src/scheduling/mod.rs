//! Availability containment and double-booking checks for guarantor signings.
//!
//! [`evaluate`] is the pure decision over already-fetched blocks and bookings. The
//! [`ConflictEngine`] fetches that data through narrow repositories and hands out per-guarantor
//! locks so a check and the insert that follows it run as one serialized unit.

mod locks;

pub use locks::{BookingGuard, BookingLocks};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AvailabilityBlock, Signing};
use crate::error::ApiError;
use crate::store::repositories::{AvailabilityRepository, SigningRepository};

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// A missing end collapses the window onto its start.
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Self, ApiError> {
        let end = end.unwrap_or(start);
        if end < start {
            return Err(ApiError::invalid("fecha_fin must not precede fecha_inicio"));
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        !(self.end <= other.start || self.start >= other.end)
    }

    pub fn within(&self, outer: &TimeWindow) -> bool {
        outer.start <= self.start && self.end <= outer.end
    }
}

impl From<&AvailabilityBlock> for TimeWindow {
    fn from(block: &AvailabilityBlock) -> Self {
        Self {
            start: block.starts_at,
            end: block.ends_at,
        }
    }
}

impl From<&Signing> for TimeWindow {
    fn from(signing: &Signing) -> Self {
        Self {
            start: signing.starts_at,
            end: signing.ends_at,
        }
    }
}

/// Why a window cannot be booked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingRejection {
    #[error("outside availability")]
    OutsideAvailability,
    #[error("double-booked")]
    DoubleBooked { with: Uuid },
}

impl From<BookingRejection> for ApiError {
    fn from(value: BookingRejection) -> Self {
        match value {
            BookingRejection::OutsideAvailability => ApiError::RejectedByPolicy(value.to_string()),
            BookingRejection::DoubleBooked { .. } => ApiError::Conflict(value.to_string()),
        }
    }
}

/// Recurring blocks are matched as the literal interval they store.
pub fn evaluate(
    window: &TimeWindow,
    blocks: &[AvailabilityBlock],
    active: &[Signing],
) -> Result<(), BookingRejection> {
    if !blocks
        .iter()
        .any(|block| window.within(&TimeWindow::from(block)))
    {
        return Err(BookingRejection::OutsideAvailability);
    }
    match active
        .iter()
        .find(|signing| signing.state.is_active() && window.overlaps(&TimeWindow::from(*signing)))
    {
        Some(clash) => Err(BookingRejection::DoubleBooked { with: clash.id }),
        None => Ok(()),
    }
}

#[derive(Clone)]
pub struct ConflictEngine {
    availability: Arc<dyn AvailabilityRepository>,
    signings: Arc<dyn SigningRepository>,
    locks: BookingLocks,
}

impl ConflictEngine {
    pub fn new(
        availability: Arc<dyn AvailabilityRepository>,
        signings: Arc<dyn SigningRepository>,
    ) -> Self {
        Self {
            availability,
            signings,
            locks: BookingLocks::default(),
        }
    }

    /// Hold the returned guard until the booking is persisted.
    pub async fn lock(&self, guarantor_id: Uuid) -> BookingGuard {
        self.locks.acquire(guarantor_id).await
    }

    /// `exclude` leaves the signing being edited out of the overlap check.
    pub async fn can_book(
        &self,
        guarantor_id: Uuid,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<(), ApiError> {
        let blocks = self.availability.blocks_for(guarantor_id).await?;
        let active = self.signings.active_for(guarantor_id, exclude).await?;
        evaluate(window, &blocks, &active).map_err(|rejection| {
            tracing::info!(%guarantor_id, reason = %rejection, "booking rejected");
            ApiError::from(rejection)
        })
    }
}
