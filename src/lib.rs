//! fleetres — a reservation engine for vehicle rental fleets.
//!
//! The engine validates requested date ranges against a vehicle's existing
//! commitments, walks reservations through their lifecycle, and guarantees a
//! vehicle is never double-booked: per vehicle, the date ranges of
//! reservations in an occupying status (`Pending`, `Accepted`) are pairwise
//! non-overlapping. Check-then-commit sequences run under a per-vehicle
//! exclusive section, so bookings on different vehicles proceed in parallel
//! while bookings on one vehicle serialize.
//!
//! State is durable through an append-only ledger ([`wal`]) replayed on
//! startup; every successful creation or transition is published to the
//! [`events::EventHub`] for notification and payment consumers. Vehicle
//! existence, identity, and pricing are external concerns consumed through
//! the traits in [`providers`].

pub mod config;
pub mod engine;
pub mod events;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod observability;
pub mod providers;
pub mod wal;

pub use config::EngineConfig;
pub use engine::{BookingError, Engine};
pub use events::EventHub;
pub use model::{DateRange, LifecycleEvent, Reservation, ReservationStatus, Role};
pub use providers::{Pricing, VehicleCatalog};
