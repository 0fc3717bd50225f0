//! Hard caps enforced at validation time. Generous for any real fleet;
//! they exist so one misbehaving caller cannot grow state without bound.

/// Longest rental a single reservation may cover, in days.
pub const MAX_RESERVATION_DAYS: i64 = 90;

/// How far ahead of today a reservation may start, in days.
pub const MAX_ADVANCE_DAYS: i64 = 365;

/// Occupying reservations allowed on one vehicle at a time.
pub const MAX_ACTIVE_PER_VEHICLE: usize = 512;

/// Vehicles the engine will track state for.
pub const MAX_VEHICLES: usize = 100_000;
