mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::BookingError;

use std::io;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::events::EventHub;
use crate::limits;
use crate::model::*;
use crate::providers::{Pricing, VehicleCatalog};
use crate::wal::Wal;

pub type SharedVehicleState = Arc<RwLock<VehicleState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        record: LedgerRecord,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        records: Vec<LedgerRecord>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { record, response } => {
                let mut batch = vec![(record, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { record, response }) => {
                            batch.push((record, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(LedgerRecord, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(LedgerRecord, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut buffer_err: Option<io::Error> = None;
    for (record, _) in batch.iter() {
        if let Err(e) = wal.buffer(record) {
            buffer_err = Some(e);
            break;
        }
    }
    // Always sync — even on a buffer error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let sync_err = wal.sync().err();
    if let Some(e) = buffer_err {
        return Err(e);
    }
    if let Some(e) = sync_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { records, response } => {
            let result = Wal::write_compact_file(wal.path(), &records)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// Apply a ledger record to a VehicleState (no locking — caller holds the
/// write guard). Status writes and slot release happen together here, so no
/// other actor can observe a non-occupying reservation still holding a slot.
fn apply_record(vs: &mut VehicleState, record: &LedgerRecord, reverse: &DashMap<Ulid, Ulid>) {
    match record {
        LedgerRecord::ReservationCreated {
            id,
            vehicle_id,
            renter_id,
            range,
            price_snapshot,
            created_at,
        } => {
            vs.reservations.insert(
                *id,
                Reservation {
                    id: *id,
                    vehicle_id: *vehicle_id,
                    renter_id: *renter_id,
                    range: *range,
                    status: ReservationStatus::Pending,
                    price_snapshot: *price_snapshot,
                    created_at: *created_at,
                    updated_at: *created_at,
                },
            );
            vs.commit_slot(*id, *range);
            reverse.insert(*id, *vehicle_id);
        }
        LedgerRecord::StatusChanged { id, to, at, .. } => {
            if let Some(res) = vs.reservations.get_mut(id) {
                res.status = *to;
                res.updated_at = *at;
            }
            if !to.occupies() {
                vs.release_slot(*id);
            }
        }
    }
}

/// The lifecycle event a just-applied record produces, for the sink.
fn lifecycle_event(vs: &VehicleState, record: &LedgerRecord) -> Option<LifecycleEvent> {
    match record {
        LedgerRecord::ReservationCreated {
            id,
            vehicle_id,
            renter_id,
            created_at,
            ..
        } => Some(LifecycleEvent {
            reservation_id: *id,
            vehicle_id: *vehicle_id,
            renter_id: *renter_id,
            from: None,
            to: ReservationStatus::Pending,
            at: *created_at,
        }),
        LedgerRecord::StatusChanged {
            id,
            vehicle_id,
            from,
            to,
            at,
        } => {
            let renter_id = vs.reservations.get(id)?.renter_id;
            Some(LifecycleEvent {
                reservation_id: *id,
                vehicle_id: *vehicle_id,
                renter_id,
                from: Some(*from),
                to: *to,
                at: *at,
            })
        }
    }
}

/// The booking coordinator. Owns per-vehicle state behind a keyed exclusive
/// section, the reservation ledger, and the lifecycle event hub.
pub struct Engine {
    pub(super) vehicles: DashMap<Ulid, SharedVehicleState>,
    /// Reverse lookup: reservation id → vehicle id.
    pub(super) reservation_to_vehicle: DashMap<Ulid, Ulid>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub events: Arc<EventHub>,
    pub(super) config: EngineConfig,
    pub(super) catalog: Arc<dyn VehicleCatalog>,
    pub(super) pricing: Arc<dyn Pricing>,
}

impl Engine {
    /// Open the ledger at `config.wal_path`, replay it into memory and start
    /// the group-commit writer. Must run inside a tokio runtime.
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn VehicleCatalog>,
        pricing: Arc<dyn Pricing>,
        events: Arc<EventHub>,
    ) -> io::Result<Self> {
        let records = Wal::replay(&config.wal_path)?;
        let wal = Wal::open(&config.wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            vehicles: DashMap::new(),
            reservation_to_vehicle: DashMap::new(),
            wal_tx,
            events,
            config,
            catalog,
            pricing,
        };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never block here: this may run inside an async
        // context.
        for record in &records {
            let vehicle_id = record.vehicle_id();
            let vs = engine
                .vehicles
                .entry(vehicle_id)
                .or_insert_with(|| Arc::new(RwLock::new(VehicleState::new(vehicle_id))))
                .value()
                .clone();
            let mut guard = vs.try_write().expect("replay: uncontended write");
            apply_record(&mut guard, record, &engine.reservation_to_vehicle);
        }
        metrics::gauge!(crate::observability::VEHICLES_TRACKED).set(engine.vehicles.len() as f64);

        Ok(engine)
    }

    /// Write a record to the WAL via the background group-commit writer.
    async fn wal_append(&self, record: &LedgerRecord) -> Result<(), BookingError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                record: record.clone(),
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::Wal(e.to_string()))
    }

    /// WAL-append + apply + publish in one call, under the caller's write
    /// guard. Event publication comes after durability and never fails the
    /// operation.
    pub(super) async fn persist_and_apply(
        &self,
        vs: &mut VehicleState,
        record: &LedgerRecord,
    ) -> Result<(), BookingError> {
        self.wal_append(record).await?;
        apply_record(vs, record, &self.reservation_to_vehicle);
        if let Some(event) = lifecycle_event(vs, record) {
            self.events.publish(&event);
        }
        Ok(())
    }

    pub(super) fn get_vehicle(&self, id: &Ulid) -> Option<SharedVehicleState> {
        self.vehicles.get(id).map(|e| e.value().clone())
    }

    /// Get or lazily create the state entry for a vehicle the catalog vouched
    /// for.
    pub(super) fn vehicle_entry(&self, id: Ulid) -> Result<SharedVehicleState, BookingError> {
        if let Some(vs) = self.vehicles.get(&id) {
            return Ok(vs.value().clone());
        }
        if self.vehicles.len() >= limits::MAX_VEHICLES {
            return Err(BookingError::LimitExceeded("too many vehicles tracked"));
        }
        let vs = self
            .vehicles
            .entry(id)
            .or_insert_with(|| Arc::new(RwLock::new(VehicleState::new(id))))
            .value()
            .clone();
        metrics::gauge!(crate::observability::VEHICLES_TRACKED).set(self.vehicles.len() as f64);
        Ok(vs)
    }

    /// Acquire the vehicle's exclusive section, waiting at most
    /// `config.lock_wait`. Timing out is the retryable `Busy` failure.
    pub(super) async fn lock_vehicle(
        &self,
        vehicle_id: Ulid,
        vs: &SharedVehicleState,
    ) -> Result<OwnedRwLockWriteGuard<VehicleState>, BookingError> {
        match tokio::time::timeout(self.config.lock_wait, vs.clone().write_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                metrics::counter!(crate::observability::LOCK_TIMEOUTS_TOTAL).increment(1);
                Err(BookingError::Busy(vehicle_id))
            }
        }
    }

    /// Reservation id → its vehicle's write guard, bounded wait.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<(Ulid, OwnedRwLockWriteGuard<VehicleState>), BookingError> {
        let vehicle_id = self
            .reservation_to_vehicle
            .get(reservation_id)
            .map(|e| *e.value())
            .ok_or(BookingError::NotFound(*reservation_id))?;
        let vs = self
            .get_vehicle(&vehicle_id)
            .ok_or(BookingError::NotFound(vehicle_id))?;
        let guard = self.lock_vehicle(vehicle_id, &vs).await?;
        Ok((vehicle_id, guard))
    }
}
