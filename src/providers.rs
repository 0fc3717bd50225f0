//! External collaborators the engine consumes through narrow traits.
//! The catalog owns vehicles, pricing owns money — the engine only asks.

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::{DateRange, PriceCents};

/// Read-only view of the vehicle catalog. Retired vehicles stay known but
/// reject new bookings.
#[async_trait]
pub trait VehicleCatalog: Send + Sync {
    async fn vehicle_exists(&self, vehicle_id: Ulid) -> bool;
    async fn is_retired(&self, vehicle_id: Ulid) -> bool;
}

/// Quotes a price for a vehicle over a range. Called once at booking
/// creation; the result is frozen into the reservation.
#[async_trait]
pub trait Pricing: Send + Sync {
    async fn quote(&self, vehicle_id: Ulid, range: &DateRange) -> PriceCents;
}

/// In-memory catalog for tests and single-process embedders. Value is the
/// retired flag.
#[derive(Default)]
pub struct StaticCatalog {
    vehicles: DashMap<Ulid, bool>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, vehicle_id: Ulid) {
        self.vehicles.insert(vehicle_id, false);
    }

    pub fn retire(&self, vehicle_id: Ulid) {
        if let Some(mut retired) = self.vehicles.get_mut(&vehicle_id) {
            *retired = true;
        }
    }
}

#[async_trait]
impl VehicleCatalog for StaticCatalog {
    async fn vehicle_exists(&self, vehicle_id: Ulid) -> bool {
        self.vehicles.contains_key(&vehicle_id)
    }

    async fn is_retired(&self, vehicle_id: Ulid) -> bool {
        self.vehicles
            .get(&vehicle_id)
            .is_some_and(|retired| *retired)
    }
}

/// Flat per-day rate.
pub struct FlatRate {
    pub per_day: PriceCents,
}

#[async_trait]
impl Pricing for FlatRate {
    async fn quote(&self, _vehicle_id: Ulid, range: &DateRange) -> PriceCents {
        self.per_day * range.days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(
            start.parse::<NaiveDate>().unwrap(),
            end.parse::<NaiveDate>().unwrap(),
        )
    }

    #[tokio::test]
    async fn static_catalog_register_and_retire() {
        let catalog = StaticCatalog::new();
        let id = Ulid::new();
        assert!(!catalog.vehicle_exists(id).await);

        catalog.register(id);
        assert!(catalog.vehicle_exists(id).await);
        assert!(!catalog.is_retired(id).await);

        catalog.retire(id);
        assert!(catalog.vehicle_exists(id).await);
        assert!(catalog.is_retired(id).await);
    }

    #[tokio::test]
    async fn flat_rate_scales_with_days() {
        let pricing = FlatRate { per_day: 4_500 };
        let quote = pricing
            .quote(Ulid::new(), &range("2030-06-01", "2030-06-05"))
            .await;
        assert_eq!(quote, 4_500 * 5);
    }
}
