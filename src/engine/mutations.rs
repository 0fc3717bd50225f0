use chrono::Utc;
use tokio::sync::oneshot;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, today, validate_range};
use super::{BookingError, Engine, WalCommand};

impl Engine {
    /// Book `vehicle_id` for `range` on behalf of `renter_id`.
    ///
    /// Catalog and pricing are resolved before the vehicle's exclusive
    /// section is entered; the availability check and the commit happen under
    /// one write-guard span, so a concurrent request for an overlapping range
    /// serializes behind this one and sees the committed slot.
    pub async fn request_booking(
        &self,
        vehicle_id: Ulid,
        renter_id: Ulid,
        range: DateRange,
    ) -> Result<Reservation, BookingError> {
        validate_range(&range, today())?;

        if !self.catalog.vehicle_exists(vehicle_id).await
            || self.catalog.is_retired(vehicle_id).await
        {
            return Err(BookingError::VehicleUnavailable(vehicle_id));
        }
        let price_snapshot = self.pricing.quote(vehicle_id, &range).await;

        let vs = self.vehicle_entry(vehicle_id)?;
        let mut guard = self.lock_vehicle(vehicle_id, &vs).await?;

        if guard.slots.len() >= MAX_ACTIVE_PER_VEHICLE {
            return Err(BookingError::LimitExceeded(
                "too many active reservations on vehicle",
            ));
        }
        if let Err(e) = check_no_conflict(&guard, &range) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let id = Ulid::new();
        let record = LedgerRecord::ReservationCreated {
            id,
            vehicle_id,
            renter_id,
            range,
            price_snapshot,
            created_at: Utc::now(),
        };
        self.persist_and_apply(&mut guard, &record).await?;
        metrics::counter!(observability::BOOKINGS_TOTAL).increment(1);
        tracing::debug!(%id, %vehicle_id, %range, "reservation created");

        Ok(guard
            .reservations
            .get(&id)
            .cloned()
            .expect("created reservation present"))
    }

    /// Drive a reservation to `target` on behalf of `actor`.
    ///
    /// Replaying an already-applied transition is not an error: it returns
    /// the current record and emits nothing, so retried calls stay quiet.
    pub async fn transition(
        &self,
        reservation_id: Ulid,
        actor: Role,
        target: ReservationStatus,
    ) -> Result<Reservation, BookingError> {
        if !actor.may_set(target) {
            return Err(BookingError::Unauthorized {
                role: actor,
                target,
            });
        }

        let (vehicle_id, mut guard) = self.resolve_reservation_write(&reservation_id).await?;
        let current = guard
            .reservations
            .get(&reservation_id)
            .ok_or(BookingError::NotFound(reservation_id))?;

        if current.status == target {
            return Ok(current.clone());
        }
        if !current.status.may_transition_to(target) {
            return Err(BookingError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }

        let record = LedgerRecord::StatusChanged {
            id: reservation_id,
            vehicle_id,
            from: current.status,
            to: target,
            at: Utc::now(),
        };
        self.persist_and_apply(&mut guard, &record).await?;
        metrics::counter!(observability::TRANSITIONS_TOTAL, "to" => target.as_str()).increment(1);
        tracing::debug!(%reservation_id, %target, "reservation transitioned");

        Ok(guard
            .reservations
            .get(&reservation_id)
            .cloned()
            .expect("transitioned reservation present"))
    }

    /// Rewrite the WAL with the minimal record set recreating current state:
    /// one creation per reservation, plus one status record when it has left
    /// `Pending`. `from` in that record is relative to the compacted log;
    /// replay applies only `to`.
    pub async fn compact_wal(&self) -> Result<(), BookingError> {
        let mut records = Vec::new();

        let mut vehicle_ids: Vec<Ulid> = self.vehicles.iter().map(|e| *e.key()).collect();
        vehicle_ids.sort();

        for vehicle_id in vehicle_ids {
            let Some(vs) = self.get_vehicle(&vehicle_id) else {
                continue;
            };
            let guard = vs.read().await;

            let mut reservations: Vec<&Reservation> = guard.reservations.values().collect();
            reservations.sort_by_key(|r| r.id);
            for r in reservations {
                records.push(LedgerRecord::ReservationCreated {
                    id: r.id,
                    vehicle_id,
                    renter_id: r.renter_id,
                    range: r.range,
                    price_snapshot: r.price_snapshot,
                    created_at: r.created_at,
                });
                if r.status != ReservationStatus::Pending {
                    records.push(LedgerRecord::StatusChanged {
                        id: r.id,
                        vehicle_id,
                        from: ReservationStatus::Pending,
                        to: r.status,
                        at: r.updated_at,
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                records,
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
