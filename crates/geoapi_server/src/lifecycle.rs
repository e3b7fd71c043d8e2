//! # Resource Lifecycle
//!
//! Owns the shared terrain engine and one store per worker. Both are built
//! lazily on first use and released after an idle period.
//!
//! ## State Machine
//!
//! ```text
//!            acquire (first)            load ok
//! Unloaded ─────────────────► Loading ───────────► Loaded
//!    ▲                           │                    │
//!    │         load failed       │                    │ housekeeping:
//!    ├───────────────────────────┘                    │ idle > timeout and
//!    └────────────────────────────────────────────────┘ nobody active
//! ```
//!
//! ## Design
//!
//! - The terrain slot is a mutex around `Option<Arc<T>>`. Construction and
//!   unload happen under the mutex, so concurrent first acquires perform
//!   exactly one construction and the rest wait for it. Steady-state
//!   readers only hold the mutex long enough to clone the `Arc`.
//! - Activity flags are set under the slot mutex, which lets the
//!   housekeeper's "nobody active" check under the same mutex be exact.
//! - Store slots are per worker. Each lease is a mapped guard, so one store
//!   is never used by two threads at once.
//! - `last_activity` is milliseconds since the manager epoch, advanced with
//!   `fetch_max`; a stale read only delays an unload by one tick.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use geoapi_store::PointStore;
use geoapi_terrain::TerrainSynthesizer;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::LifecycleError;

/// Index of a worker thread in the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Observable state of a managed resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ResourceState {
    /// Not built.
    Unloaded = 0,
    /// Construction in progress.
    Loading = 1,
    /// Ready for use.
    Loaded = 2,
}

impl ResourceState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Loading,
            2 => Self::Loaded,
            _ => Self::Unloaded,
        }
    }
}

/// Releases a managed resource.
pub trait Teardown: Sized {
    /// Consumes and releases the resource.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Release`] if the release fails; the
    /// manager logs it and moves on.
    fn teardown(self) -> Result<(), LifecycleError>;
}

impl Teardown for TerrainSynthesizer {
    fn teardown(self) -> Result<(), LifecycleError> {
        self.shutdown();
        Ok(())
    }
}

impl Teardown for PointStore {
    fn teardown(self) -> Result<(), LifecycleError> {
        self.close().map_err(|e| LifecycleError::Release(e.to_string()))
    }
}

/// Builds the terrain engine.
pub type TerrainLoader<T> = Box<dyn Fn() -> Result<T, LifecycleError> + Send + Sync>;

/// Opens the store for a worker.
pub type StoreLoader<S> = Box<dyn Fn(WorkerId) -> Result<S, LifecycleError> + Send + Sync>;

/// What one housekeeping pass did or wants done.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    /// The terrain engine was released.
    pub terrain_unloaded: bool,
    /// Idle stores that should be closed; each id is reported once until
    /// [`LifecycleManager::close_store`] handles it.
    pub stores_to_close: Vec<WorkerId>,
    /// A reclamation pass is due (once per idle episode).
    pub reclaim: bool,
}

struct StoreSlot<S> {
    store: Mutex<Option<S>>,
    state: AtomicU8,
    active: AtomicBool,
    close_requested: AtomicBool,
}

impl<S> StoreSlot<S> {
    fn new() -> Self {
        Self {
            store: Mutex::new(None),
            state: AtomicU8::new(ResourceState::Unloaded as u8),
            active: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
        }
    }
}

/// Lazy loader and idle unloader for the terrain engine and worker stores.
pub struct LifecycleManager<T, S> {
    terrain_loader: TerrainLoader<T>,
    store_loader: StoreLoader<S>,

    terrain: Mutex<Option<Arc<T>>>,
    terrain_state: AtomicU8,
    terrain_active: Box<[AtomicBool]>,
    constructions: AtomicU64,

    stores: Box<[StoreSlot<S>]>,

    epoch: Instant,
    last_activity_ms: AtomicU64,
    idle_timeout: Duration,
    reclaimed: AtomicBool,
}

impl<T: Teardown, S: Teardown> LifecycleManager<T, S> {
    /// Creates a manager for `workers` workers. Nothing is loaded yet.
    #[must_use]
    pub fn new(
        workers: usize,
        idle_timeout: Duration,
        terrain_loader: TerrainLoader<T>,
        store_loader: StoreLoader<S>,
    ) -> Self {
        Self {
            terrain_loader,
            store_loader,
            terrain: Mutex::new(None),
            terrain_state: AtomicU8::new(ResourceState::Unloaded as u8),
            terrain_active: (0..workers).map(|_| AtomicBool::new(false)).collect(),
            constructions: AtomicU64::new(0),
            stores: (0..workers).map(|_| StoreSlot::new()).collect(),
            epoch: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            idle_timeout,
            reclaimed: AtomicBool::new(false),
        }
    }

    /// Number of worker slots.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.stores.len()
    }

    /// Idle period before release.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Acquires the shared terrain engine for a worker, building it first if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if construction fails; the engine stays
    /// unloaded and the next acquire retries.
    pub fn acquire_terrain(&self, worker: WorkerId) -> Result<TerrainLease<'_, T>, LifecycleError> {
        let active = self
            .terrain_active
            .get(worker.0)
            .ok_or(LifecycleError::UnknownWorker(worker))?;

        let mut slot = self.terrain.lock();
        let engine = if let Some(engine) = slot.as_ref() {
            Arc::clone(engine)
        } else {
            self.terrain_state.store(ResourceState::Loading as u8, Ordering::Release);
            let attempt = self.constructions.fetch_add(1, Ordering::AcqRel) + 1;
            let started = Instant::now();
            match (self.terrain_loader)() {
                Ok(engine) => {
                    let engine = Arc::new(engine);
                    *slot = Some(Arc::clone(&engine));
                    self.terrain_state.store(ResourceState::Loaded as u8, Ordering::Release);
                    tracing::info!(
                        target: "geoapi::system",
                        client = "-",
                        %worker,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "terrain engine loaded"
                    );
                    engine
                }
                Err(e) => {
                    self.terrain_state.store(ResourceState::Unloaded as u8, Ordering::Release);
                    tracing::error!(target: "geoapi::system", client = "-", %worker, error = %e, "terrain engine init failed");
                    return Err(e);
                }
            }
        };
        active.store(true, Ordering::Release);
        self.touch();
        drop(slot);

        Ok(TerrainLease {
            engine,
            _active: ActiveFlag(active),
        })
    }

    /// Acquires the worker's own store, opening it first if needed.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if the store cannot be opened.
    pub fn acquire_store(&self, worker: WorkerId) -> Result<StoreLease<'_, S>, LifecycleError> {
        let slot = self
            .stores
            .get(worker.0)
            .ok_or(LifecycleError::UnknownWorker(worker))?;

        let mut guard = slot.store.lock();
        if guard.is_none() {
            slot.state.store(ResourceState::Loading as u8, Ordering::Release);
            match (self.store_loader)(worker) {
                Ok(store) => {
                    *guard = Some(store);
                    slot.state.store(ResourceState::Loaded as u8, Ordering::Release);
                    tracing::info!(target: "geoapi::system", client = "-", %worker, "store opened");
                }
                Err(e) => {
                    slot.state.store(ResourceState::Unloaded as u8, Ordering::Release);
                    tracing::error!(target: "geoapi::system", client = "-", %worker, error = %e, "store open failed");
                    return Err(e);
                }
            }
        }
        slot.active.store(true, Ordering::Release);
        self.touch();

        let store = MutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| LifecycleError::Release(format!("store slot of {worker} emptied while held")))?;
        Ok(StoreLease {
            store,
            _active: ActiveFlag(&slot.active),
        })
    }

    /// Observable terrain state.
    #[must_use]
    pub fn terrain_state(&self) -> ResourceState {
        ResourceState::from_u8(self.terrain_state.load(Ordering::Acquire))
    }

    /// Observable state of a worker's store.
    #[must_use]
    pub fn store_state(&self, worker: WorkerId) -> ResourceState {
        self.stores
            .get(worker.0)
            .map_or(ResourceState::Unloaded, |slot| {
                ResourceState::from_u8(slot.state.load(Ordering::Acquire))
            })
    }

    /// Number of terrain construction attempts so far.
    #[must_use]
    pub fn terrain_constructions(&self) -> u64 {
        self.constructions.load(Ordering::Acquire)
    }

    /// Time of the most recent acquire.
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.epoch + Duration::from_millis(self.last_activity_ms.load(Ordering::Acquire))
    }

    fn touch(&self) {
        let now = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_activity_ms.fetch_max(now, Ordering::AcqRel);
        self.reclaimed.store(false, Ordering::Release);
    }

    fn idle_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }

    fn any_terrain_active(&self) -> bool {
        self.terrain_active.iter().any(|a| a.load(Ordering::Acquire))
    }

    /// Runs one housekeeping pass as of `now`.
    ///
    /// Releases the terrain engine when idle and unused, collects idle stores
    /// for closing and flags a reclamation pass after twice the timeout.
    pub fn housekeep_at(&self, now: Instant) -> HousekeepingReport {
        let mut report = HousekeepingReport::default();
        if self.idle_at(now) <= self.idle_timeout {
            return report;
        }

        if !self.any_terrain_active() {
            let mut slot = self.terrain.lock();
            // Re-check under the lock: acquires set their flag while holding it
            if !self.any_terrain_active() && self.idle_at(now) > self.idle_timeout {
                if let Some(engine) = slot.take() {
                    self.terrain_state.store(ResourceState::Unloaded as u8, Ordering::Release);
                    drop(slot);
                    release_shared(engine);
                    report.terrain_unloaded = true;
                    tracing::info!(target: "geoapi::system", client = "-", "terrain engine unloaded after idle timeout");
                }
            }
        }

        for (index, slot) in self.stores.iter().enumerate() {
            let loaded = ResourceState::from_u8(slot.state.load(Ordering::Acquire)) == ResourceState::Loaded;
            if loaded
                && !slot.active.load(Ordering::Acquire)
                && !slot.close_requested.swap(true, Ordering::AcqRel)
            {
                report.stores_to_close.push(WorkerId(index));
            }
        }

        if self.idle_at(now) > self.idle_timeout * 2 && !self.reclaimed.swap(true, Ordering::AcqRel) {
            report.reclaim = true;
            tracing::info!(target: "geoapi::system", client = "-", "memory reclamation pass");
        }

        report
    }

    /// Closes a worker's store if it is still idle.
    ///
    /// Returns `true` if a store was closed.
    pub fn close_store(&self, worker: WorkerId) -> bool {
        let Some(slot) = self.stores.get(worker.0) else {
            return false;
        };
        slot.close_requested.store(false, Ordering::Release);

        let mut guard = slot.store.lock();
        if slot.active.load(Ordering::Acquire) || self.idle_at(Instant::now()) <= self.idle_timeout {
            return false;
        }
        let Some(store) = guard.take() else {
            return false;
        };
        slot.state.store(ResourceState::Unloaded as u8, Ordering::Release);
        drop(guard);

        if let Err(e) = store.teardown() {
            tracing::warn!(target: "geoapi::system", client = "-", %worker, error = %e, "store close failed");
        } else {
            tracing::info!(target: "geoapi::system", client = "-", %worker, "store closed after idle timeout");
        }
        true
    }

    /// Releases everything regardless of activity. Used at shutdown, after
    /// the workers have stopped.
    pub fn shutdown_all(&self) {
        if let Some(engine) = self.terrain.lock().take() {
            self.terrain_state.store(ResourceState::Unloaded as u8, Ordering::Release);
            release_shared(engine);
        }
        for (index, slot) in self.stores.iter().enumerate() {
            if let Some(store) = slot.store.lock().take() {
                slot.state.store(ResourceState::Unloaded as u8, Ordering::Release);
                if let Err(e) = store.teardown() {
                    tracing::warn!(target: "geoapi::system", client = "-", worker = %WorkerId(index), error = %e, "store close failed");
                }
            }
        }
    }
}

fn release_shared<T: Teardown>(engine: Arc<T>) {
    match Arc::try_unwrap(engine) {
        Ok(engine) => {
            if let Err(e) = engine.teardown() {
                tracing::warn!(target: "geoapi::system", client = "-", error = %e, "terrain release failed");
            }
        }
        // A straggling reader still holds it; the last clone frees it
        Err(_) => {
            tracing::warn!(target: "geoapi::system", client = "-", "terrain engine still referenced at unload");
        }
    }
}

/// Clears an activity flag when dropped.
struct ActiveFlag<'a>(&'a AtomicBool);

impl Drop for ActiveFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Shared access to the terrain engine for the duration of one request.
pub struct TerrainLease<'a, T> {
    // Fields drop in order: the reference goes before the flag clears, so an
    // unload that sees the flag cleared also sees the last reference gone
    engine: Arc<T>,
    _active: ActiveFlag<'a>,
}

impl<T> Deref for TerrainLease<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.engine
    }
}

/// Exclusive access to a worker's store for the duration of one request.
pub struct StoreLease<'a, S> {
    store: MappedMutexGuard<'a, S>,
    _active: ActiveFlag<'a>,
}

impl<S> Deref for StoreLease<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.store
    }
}

impl<S> DerefMut for StoreLease<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
