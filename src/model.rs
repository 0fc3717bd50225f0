use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Price captured at booking time, in the smallest currency unit.
pub type PriceCents = i64;

/// Inclusive day range `[start, end]` — a rental that starts and ends on the
/// same day is one day long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    /// Number of rental days covered, counting both endpoints.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    #[allow(dead_code)]
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}]", self.start, self.end)
    }
}

/// Lifecycle status of a reservation. `Pending` and `Accepted` occupy the
/// vehicle's calendar; every other status is kept for history only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Accepted,
    Refused,
    Cancelled,
    Completed,
    Failed,
    Refunded,
}

impl ReservationStatus {
    /// Whether a reservation in this status blocks other bookings.
    pub fn occupies(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Accepted)
    }

    /// The closed transition table. Everything not listed is illegal.
    pub fn may_transition_to(&self, to: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, to),
            (Pending, Accepted)
                | (Pending, Refused)
                | (Pending, Cancelled)
                | (Accepted, Cancelled)
                | (Accepted, Completed)
                | (Accepted, Failed)
                | (Completed, Refunded)
        )
    }

    /// No legal outgoing edge at all. `Completed` is not terminal — it still
    /// admits the refund edge.
    pub fn is_terminal(&self) -> bool {
        use ReservationStatus::*;
        matches!(self, Refused | Cancelled | Failed | Refunded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Accepted => "accepted",
            ReservationStatus::Refused => "refused",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Failed => "failed",
            ReservationStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking for a transition. Identity itself is authenticated upstream;
/// the engine only checks the role against the target status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Renter,
    Operator,
    Payment,
}

impl Role {
    /// Role authorization table: which role may drive a reservation into
    /// which status. `Pending` is creation-only and never a transition target.
    pub fn may_set(&self, target: ReservationStatus) -> bool {
        use ReservationStatus::*;
        match target {
            Accepted | Refused | Completed | Failed => matches!(self, Role::Operator),
            Cancelled => matches!(self, Role::Renter | Role::Operator),
            Refunded => matches!(self, Role::Operator | Role::Payment),
            Pending => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Renter => "renter",
            Role::Operator => "operator",
            Role::Payment => "payment",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reservation record. Everything except `status` and `updated_at` is fixed
/// at creation; date changes are cancel + re-book, not mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub renter_id: Ulid,
    pub range: DateRange,
    pub status: ReservationStatus,
    pub price_snapshot: PriceCents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One occupying reservation's claim on a vehicle's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub reservation_id: Ulid,
    pub range: DateRange,
}

/// Per-vehicle state: the primary reservation records plus the occupancy
/// index derived from them. All mutation happens under the vehicle's write
/// lock; the slot list is rebuildable from `reservations` alone.
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub id: Ulid,
    /// Occupying slots sorted by `range.start`.
    pub slots: Vec<Slot>,
    /// Every reservation ever made on this vehicle. Never removed — records
    /// in non-occupying statuses remain as audit history.
    pub reservations: HashMap<Ulid, Reservation>,
}

impl VehicleState {
    pub fn new(id: Ulid) -> Self {
        Self {
            id,
            slots: Vec::new(),
            reservations: HashMap::new(),
        }
    }

    /// First occupying slot overlapping `range`, if any. Slots are sorted by
    /// start, so everything starting after `range.end` is skipped outright.
    pub fn find_conflict(&self, range: &DateRange) -> Option<Ulid> {
        let right_bound = self.slots.partition_point(|s| s.range.start <= range.end);
        self.slots[..right_bound]
            .iter()
            .find(|s| s.range.end >= range.start)
            .map(|s| s.reservation_id)
    }

    /// Insert a slot maintaining sort order by range.start.
    pub fn commit_slot(&mut self, reservation_id: Ulid, range: DateRange) {
        let pos = self
            .slots
            .binary_search_by_key(&range.start, |s| s.range.start)
            .unwrap_or_else(|e| e);
        self.slots.insert(pos, Slot { reservation_id, range });
    }

    /// Remove a reservation's slot. No-op if it does not occupy one.
    pub fn release_slot(&mut self, reservation_id: Ulid) -> Option<Slot> {
        let pos = self
            .slots
            .iter()
            .position(|s| s.reservation_id == reservation_id)?;
        Some(self.slots.remove(pos))
    }
}

/// Durable ledger records — the WAL entry format. Replaying these rebuilds
/// both the reservation store and the occupancy index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerRecord {
    ReservationCreated {
        id: Ulid,
        vehicle_id: Ulid,
        renter_id: Ulid,
        range: DateRange,
        price_snapshot: PriceCents,
        created_at: DateTime<Utc>,
    },
    StatusChanged {
        id: Ulid,
        vehicle_id: Ulid,
        from: ReservationStatus,
        to: ReservationStatus,
        at: DateTime<Utc>,
    },
}

impl LedgerRecord {
    pub fn vehicle_id(&self) -> Ulid {
        match self {
            LedgerRecord::ReservationCreated { vehicle_id, .. }
            | LedgerRecord::StatusChanged { vehicle_id, .. } => *vehicle_id,
        }
    }
}

/// What downstream consumers (notification, payment) see — one per successful
/// creation or transition, delivered at-least-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    pub reservation_id: Ulid,
    pub vehicle_id: Ulid,
    pub renter_id: Ulid,
    /// `None` for the creation event.
    pub from: Option<ReservationStatus>,
    pub to: ReservationStatus,
    pub at: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Consumers de-duplicate redelivered events by this key.
    pub fn dedup_key(&self) -> (Ulid, ReservationStatus) {
        (self.reservation_id, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn r(start: &str, end: &str) -> DateRange {
        DateRange::new(d(start), d(end))
    }

    #[test]
    fn range_days_counts_both_endpoints() {
        assert_eq!(r("2030-06-01", "2030-06-01").days(), 1);
        assert_eq!(r("2030-06-01", "2030-06-05").days(), 5);
    }

    #[test]
    fn range_overlap_inclusive() {
        let a = r("2030-06-01", "2030-06-05");
        let b = r("2030-06-05", "2030-06-08");
        let c = r("2030-06-06", "2030-06-10");
        // Shared end day counts as overlap
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        // Adjacent days do not
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn range_overlap_reflexive() {
        let a = r("2030-06-01", "2030-06-05");
        assert!(a.overlaps(&a));
    }

    #[test]
    fn range_contains_day() {
        let a = r("2030-06-01", "2030-06-05");
        assert!(a.contains_day(d("2030-06-01")));
        assert!(a.contains_day(d("2030-06-05")));
        assert!(!a.contains_day(d("2030-06-06")));
    }

    #[test]
    fn transition_table_legal_edges() {
        use ReservationStatus::*;
        assert!(Pending.may_transition_to(Accepted));
        assert!(Pending.may_transition_to(Refused));
        assert!(Pending.may_transition_to(Cancelled));
        assert!(Accepted.may_transition_to(Cancelled));
        assert!(Accepted.may_transition_to(Completed));
        assert!(Accepted.may_transition_to(Failed));
        assert!(Completed.may_transition_to(Refunded));
    }

    #[test]
    fn transition_table_illegal_edges() {
        use ReservationStatus::*;
        assert!(!Pending.may_transition_to(Completed));
        assert!(!Pending.may_transition_to(Failed));
        assert!(!Pending.may_transition_to(Refunded));
        assert!(!Accepted.may_transition_to(Refused));
        assert!(!Accepted.may_transition_to(Refunded));
        assert!(!Completed.may_transition_to(Accepted));
        assert!(!Completed.may_transition_to(Cancelled));
        // Terminal states have no outgoing edges
        for terminal in [Refused, Cancelled, Failed, Refunded] {
            for target in [Pending, Accepted, Refused, Cancelled, Completed, Failed, Refunded] {
                assert!(!terminal.may_transition_to(target), "{terminal} -> {target}");
            }
        }
    }

    #[test]
    fn occupying_set() {
        use ReservationStatus::*;
        assert!(Pending.occupies());
        assert!(Accepted.occupies());
        for s in [Refused, Cancelled, Completed, Failed, Refunded] {
            assert!(!s.occupies(), "{s} must not occupy");
        }
    }

    #[test]
    fn role_table() {
        use ReservationStatus::*;
        assert!(Role::Operator.may_set(Accepted));
        assert!(Role::Operator.may_set(Refused));
        assert!(!Role::Renter.may_set(Accepted));
        assert!(Role::Renter.may_set(Cancelled));
        assert!(Role::Operator.may_set(Cancelled));
        assert!(!Role::Payment.may_set(Cancelled));
        assert!(Role::Payment.may_set(Refunded));
        assert!(Role::Operator.may_set(Refunded));
        assert!(!Role::Renter.may_set(Refunded));
        // Nobody transitions anything back to pending
        for role in [Role::Renter, Role::Operator, Role::Payment] {
            assert!(!role.may_set(Pending));
        }
    }

    #[test]
    fn slot_ordering_maintained() {
        let mut vs = VehicleState::new(Ulid::new());
        vs.commit_slot(Ulid::new(), r("2030-06-10", "2030-06-12"));
        vs.commit_slot(Ulid::new(), r("2030-06-01", "2030-06-03"));
        vs.commit_slot(Ulid::new(), r("2030-06-05", "2030-06-08"));
        let starts: Vec<NaiveDate> = vs.slots.iter().map(|s| s.range.start).collect();
        assert_eq!(starts, vec![d("2030-06-01"), d("2030-06-05"), d("2030-06-10")]);
    }

    #[test]
    fn find_conflict_hits_overlap() {
        let mut vs = VehicleState::new(Ulid::new());
        let held = Ulid::new();
        vs.commit_slot(held, r("2030-06-01", "2030-06-05"));
        assert_eq!(vs.find_conflict(&r("2030-06-04", "2030-06-07")), Some(held));
        assert_eq!(vs.find_conflict(&r("2030-06-05", "2030-06-05")), Some(held));
        assert_eq!(vs.find_conflict(&r("2030-06-06", "2030-06-10")), None);
        assert_eq!(vs.find_conflict(&r("2030-05-01", "2030-05-31")), None);
    }

    #[test]
    fn find_conflict_spanning_slot() {
        let mut vs = VehicleState::new(Ulid::new());
        let held = Ulid::new();
        vs.commit_slot(held, r("2030-06-01", "2030-06-30"));
        assert_eq!(vs.find_conflict(&r("2030-06-10", "2030-06-12")), Some(held));
    }

    #[test]
    fn release_slot_removes_and_tolerates_absence() {
        let mut vs = VehicleState::new(Ulid::new());
        let id = Ulid::new();
        vs.commit_slot(id, r("2030-06-01", "2030-06-05"));
        assert!(vs.release_slot(id).is_some());
        assert!(vs.slots.is_empty());
        assert!(vs.release_slot(id).is_none());
    }

    #[test]
    fn ledger_record_serialization_roundtrip() {
        let record = LedgerRecord::ReservationCreated {
            id: Ulid::new(),
            vehicle_id: Ulid::new(),
            renter_id: Ulid::new(),
            range: r("2030-06-01", "2030-06-05"),
            price_snapshot: 12_500,
            created_at: Utc::now(),
        };
        let bytes = bincode::serialize(&record).unwrap();
        let decoded: LedgerRecord = bincode::deserialize(&bytes).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn dedup_key_is_id_and_target() {
        let event = LifecycleEvent {
            reservation_id: Ulid::new(),
            vehicle_id: Ulid::new(),
            renter_id: Ulid::new(),
            from: Some(ReservationStatus::Pending),
            to: ReservationStatus::Accepted,
            at: Utc::now(),
        };
        assert_eq!(
            event.dedup_key(),
            (event.reservation_id, ReservationStatus::Accepted)
        );
    }
}
