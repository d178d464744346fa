use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{BufferPool, Error, RingError, sync};
use crate::generic::{InjectHandler, SoftShim};
use crate::hw::{Dir, HardwareShim};
use crate::kring::{Kring, KringState, idx_ring_to_hw};
use crate::ring::Slot;

/// The interface's original transmit routine, saved across a register and
/// restored on unregister. Stored as a trait object on the adapter, never
/// as process-wide mutable state.
pub trait NativeTransmit: Send + Sync {
    fn transmit(&self, payload: &[u8]);
}

/// Which lock a dispatch call targets. The core lock is taken strictly
/// outside any per-queue lock; a tx lock never takes its sibling rx lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockClass {
    Core,
    Tx,
    Rx,
}

/// RAII guard handed out by the lock dispatcher
pub enum LockGuard<'a> {
    Core(MutexGuard<'a, AdapterCore>),
    Queue(MutexGuard<'a, KringState>),
}

/// State protected by the adapter's core lock
pub struct AdapterCore {
    registered: bool,
    native_tx: Option<Arc<dyn NativeTransmit>>,
    saved_tx: Option<Arc<dyn NativeTransmit>>,
}

/// One network interface placed (or placeable) in zero-copy mode: its
/// krings, its buffer pool, the shim that drives its hardware, and the
/// interception state for the generic path.
pub struct Adapter {
    name: String,
    pool: Arc<BufferPool>,
    shim: Arc<dyn HardwareShim>,
    /// Present only on generic adapters, for the frame entry points
    soft: Option<Arc<SoftShim>>,
    tx_rings: Box<[Kring]>,
    rx_rings: Box<[Kring]>,
    core: Mutex<AdapterCore>,
    catch_tx: AtomicBool,
    catch_rx: AtomicBool,
}
impl Adapter {
    //
    // construction
    //

    /// Adapter for an interface whose NIC family has a hardware shim.
    ///
    /// Every ring slot is assigned its own pool buffer up front (index 0
    /// stays reserved as the invalid buffer).
    pub fn new(
        name: impl Into<String>,
        shim: Arc<dyn HardwareShim>,
        pool: Arc<BufferPool>,
        num_queues: usize,
        num_slots: u32,
        native_tx: Arc<dyn NativeTransmit>,
    ) -> Result<Self, Error> {
        let tx_rings: Box<[Kring]> = (0..num_queues).map(|_| Kring::new(num_slots, Dir::Tx)).collect();
        let rx_rings: Box<[Kring]> = (0..num_queues).map(|_| Kring::new(num_slots, Dir::Rx)).collect();

        // hand out distinct buffers to every slot of every ring
        let needed = 1 + 2 * num_queues * num_slots as usize;
        if pool.num_bufs() < needed {
            return Err(Error::PoolTooSmall { needed });
        }
        let mut next_buf = 1_u32;
        for kring in tx_rings.iter().chain(rx_rings.iter()) {
            for i in 0..num_slots {
                kring.ring().set_slot(i, Slot { buf_idx: next_buf, len: 0, flags: 0 });
                next_buf += 1;
            }
        }

        Ok(Self {
            name: name.into(),
            pool,
            shim,
            soft: None,
            tx_rings,
            rx_rings,
            core: Mutex::new(AdapterCore {
                registered: false,
                native_tx: Some(native_tx),
                saved_tx: None,
            }),
            catch_tx: AtomicBool::new(false),
            catch_rx: AtomicBool::new(false),
        })
    }

    /// Adapter for an interface with no hardware shim of its own: traffic
    /// is caught and rerouted through a [`SoftShim`] plus the registered
    /// inject callback. A single queue per direction.
    pub fn new_generic(
        name: impl Into<String>,
        pool: Arc<BufferPool>,
        inject: Arc<dyn InjectHandler>,
        num_slots: u32,
        native_tx: Arc<dyn NativeTransmit>,
    ) -> Result<Self, Error> {
        let soft = Arc::new(SoftShim::new(pool.clone(), inject, 1, num_slots));
        let mut adapter = Self::new(name, soft.clone(), pool, 1, num_slots, native_tx)?;
        adapter.soft = Some(soft);
        Ok(adapter)
    }

    //
    // access
    //

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn num_queues(&self) -> usize {
        self.tx_rings.len()
    }

    pub fn tx_ring(&self, queue: usize) -> &Kring {
        &self.tx_rings[queue]
    }

    pub fn rx_ring(&self, queue: usize) -> &Kring {
        &self.rx_rings[queue]
    }

    //
    // lock dispatch
    //

    /// Acquire `class` for `queue` (ignored for the core lock). Hardware
    /// shims needing coarser granularity simply share one queue.
    pub fn lock(&self, class: LockClass, queue: usize) -> LockGuard<'_> {
        match class {
            LockClass::Core => LockGuard::Core(self.core.lock().unwrap_or_else(|e| e.into_inner())),
            LockClass::Tx => LockGuard::Queue(self.tx_rings[queue].lock_state()),
            LockClass::Rx => LockGuard::Queue(self.rx_rings[queue].lock_state()),
        }
    }

    /// Non-blocking acquire, for interrupt context
    pub fn try_lock(&self, class: LockClass, queue: usize) -> Option<LockGuard<'_>> {
        match class {
            LockClass::Core => self.core.try_lock().ok().map(LockGuard::Core),
            LockClass::Tx => self.tx_rings[queue].try_lock_state().map(LockGuard::Queue),
            LockClass::Rx => self.rx_rings[queue].try_lock_state().map(LockGuard::Queue),
        }
    }

    //
    // registration
    //

    /// Switch the interface into or out of zero-copy mode.
    ///
    /// On enable the native transmit entry point is saved and replaced by
    /// the engine's; on disable it is restored. Both edges force every
    /// kring through reinitialization, resyncing hardware pointers.
    pub fn register(&self, enable: bool) -> Result<(), Error> {
        let mut core = self.core.lock().unwrap_or_else(|e| e.into_inner());
        if enable {
            if core.registered {
                return Err(Error::AlreadyRegistered);
            }
            core.saved_tx = core.native_tx.take();
            core.registered = true;
        } else {
            if !core.registered {
                return Err(Error::NotRegistered);
            }
            core.native_tx = core.saved_tx.take();
            core.registered = false;
        }
        // core lock held across the per-queue locks below, in order
        self.reinit_all_krings();
        tracing::debug!(name = %self.name, enable, "zero-copy mode switched");
        Ok(())
    }

    fn reinit_all_krings(&self) {
        for (queue, kring) in self.tx_rings.iter().enumerate() {
            let mut st = kring.lock_state();
            let next_hw = self.shim.tx_completion_index(queue).unwrap_or(0) % st.num_slots;
            st.reinit(next_hw);
            kring.ring().set_cur(0);
            kring.ring().set_avail(st.nr_hwavail);
            kring.ring().set_reserved(0);
        }
        for (queue, kring) in self.rx_rings.iter().enumerate() {
            let mut st = kring.lock_state();
            let next_hw = self.shim.current_rx_index(queue).unwrap_or(0) % st.num_slots;
            st.reinit(next_hw);
            kring.ring().set_cur(0);
            kring.ring().set_avail(0);
            kring.ring().set_reserved(0);
            self.refill_rx(queue, kring, &st);
        }
    }

    // arm the hardware rx ring with the slots' buffers, leaving the last
    // one unreturned as the head rule requires
    fn refill_rx(&self, queue: usize, kring: &Kring, st: &KringState) {
        let num_slots = st.num_slots;
        let mut l = 0;
        for j in 0..num_slots - 1 {
            let slot = kring.ring().slot(j);
            if !self.pool.validate_index(slot.buf_idx) {
                continue;
            }
            l = idx_ring_to_hw(j, st.nkr_hwofs, num_slots);
            let _ = self.shim.write_rx_descriptor(queue, l, self.pool.dma_addr(slot.buf_idx));
        }
        let _ = self.shim.advance_rx_head(queue, l);
    }

    fn ensure_registered(&self) -> Result<(), RingError> {
        let core = self.core.lock().unwrap_or_else(|e| e.into_inner());
        if core.registered { Ok(()) } else { Err(RingError::NotRegistered) }
    }

    //
    // sync entry points
    //

    /// Reconcile tx queue `queue`; `exclusive` marks a control-path call
    /// (unconditional reclaim). Holds the per-queue lock for the whole
    /// call.
    pub fn txsync(&self, queue: usize, exclusive: bool) -> Result<(), RingError> {
        self.ensure_registered()?;
        let kring = &self.tx_rings[queue];
        let result = {
            let mut st = kring.lock_state();
            sync::txsync(&mut st, kring.ring(), &*self.shim, &self.pool, queue, exclusive)
        };
        // reclaimed slots may unblock a waiter
        kring.notifier().notify();
        result
    }

    /// Reconcile rx queue `queue`; the import phase runs when the call is
    /// exclusive or an interrupt was pending on this kring.
    pub fn rxsync(&self, queue: usize, exclusive: bool) -> Result<(), RingError> {
        self.ensure_registered()?;
        let kring = &self.rx_rings[queue];
        // consume the pending bit unconditionally: the import below answers
        // it whether or not the call was already exclusive
        let pending = kring.take_pending_intr();
        let force_update = exclusive || pending;
        let result = {
            let mut st = kring.lock_state();
            sync::rxsync(&mut st, kring.ring(), &*self.shim, &self.pool, queue, force_update)
        };
        kring.notifier().notify();
        result
    }

    //
    // interrupt context entry points
    //

    /// Opportunistic reclaim from a tx interrupt: try-lock and skip if a
    /// sync is already running (it will pick the work up itself). Returns
    /// whether the reclaim ran.
    pub fn intr_txsync(&self, queue: usize) -> bool {
        let kring = &self.tx_rings[queue];
        let ran = match kring.try_lock_state() {
            Some(mut st) => {
                let _ = sync::txsync(&mut st, kring.ring(), &*self.shim, &self.pool, queue, false);
                true
            }
            None => false,
        };
        kring.notifier().notify();
        ran
    }

    /// Record an rx interrupt: mark the kring pending and wake waiters;
    /// the import itself happens on the next rxsync.
    pub fn intr_rx(&self, queue: usize) {
        let kring = &self.rx_rings[queue];
        kring.set_pending_intr();
        kring.notifier().notify();
    }

    //
    // intercept path
    //

    /// Toggle interception of inbound traffic. Read-modified under the
    /// core lock so it cannot race a sync in progress.
    pub fn catch_rx(&self, enable: bool) -> Result<(), Error> {
        let _core = self.core.lock().unwrap_or_else(|e| e.into_inner());
        if self.soft.is_none() {
            return Err(Error::InterceptUnavailable);
        }
        self.catch_rx.store(enable, Ordering::Release);
        Ok(())
    }

    /// Toggle interception of outbound (host stack) traffic
    pub fn catch_tx(&self, enable: bool) -> Result<(), Error> {
        let _core = self.core.lock().unwrap_or_else(|e| e.into_inner());
        if self.soft.is_none() {
            return Err(Error::InterceptUnavailable);
        }
        self.catch_tx.store(enable, Ordering::Release);
        Ok(())
    }

    /// Inbound frame from the native driver. Accepted (copied once and
    /// staged for the rx ring) only while rx interception is on; returns
    /// whether the caller should consider the frame consumed.
    pub fn accept_frame(&self, queue: usize, payload: &[u8]) -> bool {
        if !self.catch_rx.load(Ordering::Acquire) {
            return false;
        }
        let Some(soft) = &self.soft else {
            return false;
        };
        let accepted = soft.accept_frame(queue, payload);
        if accepted {
            self.intr_rx(queue);
        }
        accepted
    }

    /// Transmit entry point the host stack calls. While registered with tx
    /// interception on, outbound frames are captured and surfaced to the
    /// zero-copy user through the first rx ring; otherwise the native
    /// routine sends them.
    pub fn transmit(&self, payload: &[u8]) {
        let native = {
            let core = self.core.lock().unwrap_or_else(|e| e.into_inner());
            if core.registered && self.catch_tx.load(Ordering::Acquire) {
                None
            } else {
                // registered with tx interception off keeps sending through
                // the saved entry point
                core.native_tx.clone().or_else(|| core.saved_tx.clone())
            }
        };
        match native {
            Some(native) => native.transmit(payload),
            None => {
                if let Some(soft) = &self.soft {
                    if soft.accept_frame(0, payload) {
                        self.intr_rx(0);
                    }
                }
            }
        }
    }
}
