use ulid::Ulid;

use crate::model::*;

use super::Engine;

/// Read-only surface. No exclusion taken beyond a brief read lock per
/// vehicle, so results are a point-in-time snapshot that may trail an
/// in-flight mutation.
impl Engine {
    pub async fn get_reservation(&self, id: Ulid) -> Option<Reservation> {
        let vehicle_id = *self.reservation_to_vehicle.get(&id)?.value();
        let vs = self.get_vehicle(&vehicle_id)?;
        let guard = vs.read().await;
        guard.reservations.get(&id).cloned()
    }

    pub async fn reservations_for_vehicle(
        &self,
        vehicle_id: Ulid,
        status_filter: Option<ReservationStatus>,
    ) -> Vec<Reservation> {
        let Some(vs) = self.get_vehicle(&vehicle_id) else {
            return Vec::new();
        };
        let guard = vs.read().await;
        let mut out: Vec<Reservation> = guard
            .reservations
            .values()
            .filter(|r| status_filter.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.range.start, r.id));
        out
    }

    pub async fn reservations_for_renter(
        &self,
        renter_id: Ulid,
        status_filter: Option<ReservationStatus>,
    ) -> Vec<Reservation> {
        let vehicles: Vec<_> = self.vehicles.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for vs in vehicles {
            let guard = vs.read().await;
            out.extend(
                guard
                    .reservations
                    .values()
                    .filter(|r| r.renter_id == renter_id)
                    .filter(|r| status_filter.is_none_or(|s| r.status == s))
                    .cloned(),
            );
        }
        out.sort_by_key(|r| (r.range.start, r.id));
        out
    }

    /// Current occupancy of a vehicle's calendar, sorted by start — what a
    /// calendar UI renders as taken.
    pub async fn booked_ranges(&self, vehicle_id: Ulid) -> Vec<Slot> {
        let Some(vs) = self.get_vehicle(&vehicle_id) else {
            return Vec::new();
        };
        let guard = vs.read().await;
        guard.slots.clone()
    }
}
