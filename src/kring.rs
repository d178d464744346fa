use std::sync::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::Ring;
use crate::hw::Dir;

/// Translate a ring-space index into hardware descriptor space.
///
/// The two index spaces differ by the constant signed offset `hwofs`
/// (`ring == (hw + hwofs) mod num_slots`), which can become non-zero when
/// the hardware ring is reinitialized underneath an untouched shared ring.
pub const fn idx_ring_to_hw(idx: u32, hwofs: i32, num_slots: u32) -> u32 {
    let n = num_slots as i64;
    let hw = (idx as i64 - hwofs as i64) % n;
    (if hw < 0 { hw + n } else { hw }) as u32
}

/// Translate a hardware descriptor index into ring space (inverse of
/// [`idx_ring_to_hw`]).
pub const fn idx_hw_to_ring(idx: u32, hwofs: i32, num_slots: u32) -> u32 {
    let n = num_slots as i64;
    let k = (idx as i64 + hwofs as i64) % n;
    (if k < 0 { k + n } else { k }) as u32
}

/// Kernel-private bookkeeping for one hardware queue.
///
/// Indices in `nr_hwcur` live in ring space; `next_hw` lives in hardware
/// descriptor space (the next descriptor to clean on transmit, the next to
/// check on receive). Never visible to userspace.
#[derive(Debug)]
pub struct KringState {
    /// Kernel's last-known ring-consumer position
    pub nr_hwcur: u32,
    /// Slots currently available to the user (mirrored into `ring.avail`
    /// at the end of each sync)
    pub nr_hwavail: u32,
    /// Signed offset between ring space and hardware descriptor space
    pub nkr_hwofs: i32,
    /// Transmit: the hardware slot armed for a completion report;
    /// `num_slots` means none armed
    pub nkr_kflags: u32,
    /// Hardware-side cursor (tx: next to clean, rx: next to check)
    pub next_hw: u32,
    /// Fixed ring size, duplicated here so the state is self-contained
    pub num_slots: u32,
    /// Which direction this queue serves; decides what "available" resets
    /// to (tx: the whole ring minus one, rx: nothing received yet)
    pub dir: Dir,
}
impl KringState {
    pub fn new(num_slots: u32, dir: Dir) -> Self {
        Self {
            nr_hwcur: 0,
            nr_hwavail: match dir {
                Dir::Tx => num_slots - 1,
                Dir::Rx => 0,
            },
            nkr_hwofs: 0,
            nkr_kflags: num_slots,
            next_hw: 0,
            num_slots,
            dir,
        }
    }

    /// Highest valid ring index
    pub const fn lim(&self) -> u32 {
        self.num_slots - 1
    }

    /// Reset to the known-good post-corruption state: consumer at 0, the
    /// whole ring minus one slot available, hardware cursor resynced to
    /// `next_hw` as queried from the shim. Not sticky, the next sync starts
    /// fresh.
    pub fn reinit(&mut self, next_hw: u32) {
        self.nr_hwcur = 0;
        self.nr_hwavail = match self.dir {
            Dir::Tx => self.num_slots - 1,
            Dir::Rx => 0,
        };
        // ring index 0 must land on hardware index next_hw again
        self.nkr_hwofs = -(next_hw as i32);
        self.nkr_kflags = self.num_slots;
        self.next_hw = next_hw;
    }
}

/// Wait/notify primitive a data-waiter blocks on between syncs.
///
/// The engine holds no state on behalf of a waiter: a wait can be abandoned
/// at any time, and missed wakeups are impossible because the sequence
/// number is compared, not the event itself.
pub struct Notifier {
    seq: Mutex<u64>,
    cv: Condvar,
}
impl Notifier {
    pub fn new() -> Self {
        Self { seq: Mutex::new(0), cv: Condvar::new() }
    }

    /// Current sequence number, to be passed to a later [`Self::wait_beyond`]
    pub fn sequence(&self) -> u64 {
        *self.seq.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Signal all waiters that ring state changed
    pub fn notify(&self) {
        let mut seq = self.seq.lock().unwrap_or_else(|e| e.into_inner());
        *seq += 1;
        self.cv.notify_all();
    }

    /// Block until the sequence number moves past `seen` or `timeout`
    /// elapses; returns whether a notification arrived.
    pub fn wait_beyond(&self, seen: u64, timeout: Duration) -> bool {
        let mut seq = self.seq.lock().unwrap_or_else(|e| e.into_inner());
        let deadline = std::time::Instant::now() + timeout;
        while *seq <= seen {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.cv
                .wait_timeout(seq, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            seq = guard;
        }
        true
    }
}
impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// One kernel-side ring: the shared [`Ring`] plus the lock-protected
/// [`KringState`] layered on top of it, one per hardware queue.
pub struct Kring {
    ring: Ring,
    state: Mutex<KringState>,
    pending_intr: AtomicBool,
    notify: Notifier,
}
impl Kring {
    pub fn new(num_slots: u32, dir: Dir) -> Self {
        Self {
            ring: Ring::new(num_slots),
            state: Mutex::new(KringState::new(num_slots, dir)),
            pending_intr: AtomicBool::new(false),
            notify: Notifier::new(),
        }
    }

    // access

    pub const fn ring(&self) -> &Ring {
        &self.ring
    }

    pub const fn notifier(&self) -> &Notifier {
        &self.notify
    }

    /// Take the per-queue lock (blocking path)
    pub fn lock_state(&self) -> MutexGuard<'_, KringState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the per-queue lock without blocking (interrupt path prefers
    /// try-lock-and-skip over waiting)
    pub fn try_lock_state(&self) -> Option<MutexGuard<'_, KringState>> {
        self.state.try_lock().ok()
    }

    // pending-interrupt bit

    pub fn set_pending_intr(&self) {
        self.pending_intr.store(true, Ordering::Release);
    }

    pub fn take_pending_intr(&self) -> bool {
        self.pending_intr.swap(false, Ordering::AcqRel)
    }
}
