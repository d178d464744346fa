use crate::{BufferPool, Ring, RingError};
use crate::hw::{Dir, HardwareShim, TxDescriptor};
use crate::kring::{KringState, idx_hw_to_ring, idx_ring_to_hw};
use crate::ring::{SLOT_BUF_CHANGED, SLOT_REPORT};

/// Forward distance from `from` to `to` on a ring of `num_slots` slots
/// (wrapping, always non-negative)
const fn forward_distance(from: u32, to: u32, num_slots: u32) -> u32 {
    if to >= from { to - from } else { to + num_slots - from }
}

/// Reset kring and ring to the known-good state after detected corruption,
/// resyncing the hardware cursor from the shim. The interrupted walk is not
/// completed; the caller returns the triggering error.
fn ring_reinit(st: &mut KringState, ring: &Ring, shim: &dyn HardwareShim, queue: usize) {
    let next_hw = match st.dir {
        Dir::Tx => shim.tx_completion_index(queue).unwrap_or(0),
        Dir::Rx => shim.current_rx_index(queue).unwrap_or(0),
    } % st.num_slots;
    st.reinit(next_hw);
    ring.set_cur(st.nr_hwcur);
    ring.set_avail(st.nr_hwavail);
    ring.set_reserved(0);
    tracing::error!(queue, dir = ?st.dir, "ring reinitialized after detected corruption");
}

/// Reconcile kernel and user view of a transmit ring.
///
/// Userspace has filled slots up to `ring.cur` (excluded); the walk pushes
/// them into the hardware ring through the shim, then transmitted slots are
/// reclaimed. `exclusive` marks a call from the control path: reclaim runs
/// unconditionally instead of waiting for the mitigation probe.
///
/// Every value read from `ring` comes from an untrusted peer and is read
/// once and validated before use.
#[tracing::instrument(skip(st, ring, shim, pool), level = tracing::Level::TRACE, ret)]
pub fn txsync(
    st: &mut KringState,
    ring: &Ring,
    shim: &dyn HardwareShim,
    pool: &BufferPool,
    queue: usize,
    exclusive: bool,
) -> Result<(), RingError> {
    let lim = st.lim();
    let report_frequency = st.num_slots >> 1;

    // read cur once, validate before any use
    let k = ring.cur();
    if k > lim {
        ring_reinit(st, ring, shim, queue);
        return Err(RingError::Corrupt { queue, value: k, limit: lim });
    }

    // process newly released slots, translating ring index j into hardware
    // index l as we go
    let mut j = st.nr_hwcur;
    if j != k {
        let mut l = idx_ring_to_hw(j, st.nkr_hwofs, st.num_slots);
        let mut n = 0_u32;
        while j != k {
            let mut slot = ring.slot(j);
            if !pool.validate(slot.buf_idx, slot.len) {
                ring_reinit(st, ring, shim, queue);
                return Err(RingError::InvalidBuffer { queue, slot: j, buf_idx: slot.buf_idx });
            }
            let addr = pool.dma_addr(slot.buf_idx);

            // completion reports are interrupt mitigation: first slot of the
            // batch, last slot, every half ring, or on explicit request
            let report = slot.flags & SLOT_REPORT != 0
                || n == 0
                || ring.next_index(j) == k
                || j == report_frequency;

            if slot.flags & SLOT_BUF_CHANGED != 0 {
                shim.remap_buffer(Dir::Tx, queue, l, addr)?;
                slot.flags &= !SLOT_BUF_CHANGED;
            }
            slot.flags &= !SLOT_REPORT;
            ring.set_slot(j, slot);

            shim.write_tx_descriptor(queue, l, TxDescriptor { addr, len: slot.len as u32, report })?;

            j = ring.next_index(j);
            l = if l == lim { 0 } else { l + 1 };
            n += 1;
        }
        st.nr_hwcur = k;
        st.nr_hwavail = st.nr_hwavail.wrapping_sub(n);
        if st.nr_hwavail > lim {
            // user released more slots than it owned
            ring_reinit(st, ring, shim, queue);
            return Err(RingError::Corrupt { queue, value: n, limit: lim });
        }
        // release everything written so far to the NIC
        shim.advance_tx_tail(queue, l)?;
    }

    // reclaim completed transmissions; reading a register is expensive so
    // the opportunistic path only does it when the probe slot reports done
    let do_reclaim = if exclusive {
        st.nkr_kflags = st.num_slots;
        true
    } else if st.nr_hwavail > 0 {
        st.nkr_kflags = st.num_slots;
        false
    } else {
        // arm a probe roughly half a ring past the last clean point
        let mut probe = st.next_hw + st.num_slots / 2;
        if probe >= st.num_slots {
            probe -= st.num_slots;
        }
        st.nkr_kflags = probe;
        shim.tx_descriptor_done(queue, probe)
    };
    if do_reclaim {
        let hw = shim.tx_completion_index(queue)? % st.num_slots;
        let delta = forward_distance(st.next_hw, hw, st.num_slots);
        if delta != 0 {
            st.next_hw = hw;
            st.nr_hwavail += delta;
            if st.nr_hwavail > lim {
                let value = st.nr_hwavail;
                ring_reinit(st, ring, shim, queue);
                return Err(RingError::Corrupt { queue, value, limit: lim });
            }
        }
    }

    // publish to userspace
    ring.set_avail(st.nr_hwavail);
    Ok(())
}

/// Reconcile kernel and user view of a receive ring.
///
/// The import phase moves completed hardware descriptors into the shared
/// ring; the release phase returns the slots userspace consumed (minus its
/// `reserved` look-ahead window) to the NIC for refill. `force_update` is
/// `exclusive || pending-interrupt`, computed by the caller.
#[tracing::instrument(skip(st, ring, shim, pool), level = tracing::Level::TRACE, ret)]
pub fn rxsync(
    st: &mut KringState,
    ring: &Ring,
    shim: &dyn HardwareShim,
    pool: &BufferPool,
    queue: usize,
    force_update: bool,
) -> Result<(), RingError> {
    let lim = st.lim();

    let mut k = ring.cur();
    let mut resvd = ring.reserved();
    if k > lim {
        ring_reinit(st, ring, shim, queue);
        return Err(RingError::Corrupt { queue, value: k, limit: lim });
    }

    // import newly received packets into the shared ring, stopping at the
    // first descriptor the hardware has not completed yet
    if force_update {
        let mut l = st.next_hw;
        let mut j = idx_hw_to_ring(l, st.nkr_hwofs, st.num_slots);
        let mut n = 0_u32;
        while n < st.num_slots && shim.rx_descriptor_done(queue, l) {
            let mut slot = ring.slot(j);
            slot.len = shim.rx_frame_len(queue, l) as u16;
            ring.set_slot(j, slot);
            j = ring.next_index(j);
            l = if l == lim { 0 } else { l + 1 };
            n += 1;
        }
        if n > 0 {
            st.next_hw = l;
            st.nr_hwavail += n;
            if st.nr_hwavail > lim {
                let value = st.nr_hwavail;
                ring_reinit(st, ring, shim, queue);
                return Err(RingError::Corrupt { queue, value, limit: lim });
            }
        }
    }

    // skip past the packets userspace has released, honoring its reserved
    // look-ahead window; reserved and avail are both untrusted
    if resvd > 0 {
        if resvd > lim || resvd > ring.avail() {
            tracing::error!(queue, resvd, avail = ring.avail(), "invalid reserve, clamping to zero");
            ring.set_reserved(0);
            resvd = 0;
        } else {
            k = if k >= resvd { k - resvd } else { k + st.num_slots - resvd };
        }
    }
    if k > lim {
        ring_reinit(st, ring, shim, queue);
        return Err(RingError::Corrupt { queue, value: k, limit: lim });
    }

    let mut j = st.nr_hwcur;
    if j != k {
        let mut l = idx_ring_to_hw(j, st.nkr_hwofs, st.num_slots);
        let mut n = 0_u32;
        while j != k {
            let mut slot = ring.slot(j);
            // address-only check: a released rx slot's len field is stale
            // output, the next fill rewrites it
            if !pool.validate_index(slot.buf_idx) {
                ring_reinit(st, ring, shim, queue);
                return Err(RingError::InvalidBuffer { queue, slot: j, buf_idx: slot.buf_idx });
            }
            let addr = pool.dma_addr(slot.buf_idx);
            if slot.flags & SLOT_BUF_CHANGED != 0 {
                shim.remap_buffer(Dir::Rx, queue, l, addr)?;
                slot.flags &= !SLOT_BUF_CHANGED;
                ring.set_slot(j, slot);
            }
            // hand the buffer back to the NIC for refill
            shim.write_rx_descriptor(queue, l, addr)?;
            j = ring.next_index(j);
            l = if l == lim { 0 } else { l + 1 };
            n += 1;
        }
        st.nr_hwavail = st.nr_hwavail.wrapping_sub(n);
        if st.nr_hwavail > lim {
            ring_reinit(st, ring, shim, queue);
            return Err(RingError::Corrupt { queue, value: n, limit: lim });
        }
        st.nr_hwcur = k;
        // the hardware must always see at least one slot as not yet
        // returned, so the head stays one position behind
        let l = if l == 0 { lim } else { l - 1 };
        shim.advance_rx_head(queue, l)?;
    }

    // tell userspace how many slots it owns beyond its reserve
    ring.set_avail(st.nr_hwavail.saturating_sub(resvd));
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::ring::Slot;

    /// A recording shim: descriptor state lives in plain vectors, every
    /// engine call is logged so tests can pin down exact call counts.
    pub(crate) struct MockShim {
        pub tx_completion: AtomicU32,
        pub tx_done: Mutex<Vec<bool>>,
        /// (done, frame length) per rx descriptor
        pub rx_done: Mutex<Vec<(bool, u32)>>,
        pub remaps: Mutex<Vec<(Dir, u32)>>,
        pub tx_written: Mutex<Vec<(u32, TxDescriptor)>>,
        pub rx_written: Mutex<Vec<(u32, u64)>>,
        pub tx_tail: AtomicU32,
        pub rx_head: AtomicU32,
    }
    impl MockShim {
        pub fn new(num_slots: u32) -> Self {
            Self {
                tx_completion: AtomicU32::new(0),
                tx_done: Mutex::new(vec![false; num_slots as usize]),
                rx_done: Mutex::new(vec![(false, 0); num_slots as usize]),
                remaps: Mutex::new(Vec::new()),
                tx_written: Mutex::new(Vec::new()),
                rx_written: Mutex::new(Vec::new()),
                tx_tail: AtomicU32::new(0),
                rx_head: AtomicU32::new(0),
            }
        }

        pub fn complete_rx(&self, hw_idx: u32, len: u32) {
            self.rx_done.lock().unwrap()[hw_idx as usize] = (true, len);
        }
    }
    impl HardwareShim for MockShim {
        fn tx_completion_index(&self, _queue: usize) -> Result<u32, RingError> {
            Ok(self.tx_completion.load(Ordering::Relaxed))
        }
        fn tx_descriptor_done(&self, _queue: usize, hw_idx: u32) -> bool {
            self.tx_done.lock().unwrap()[hw_idx as usize]
        }
        fn write_tx_descriptor(&self, _queue: usize, hw_idx: u32, desc: TxDescriptor) -> Result<(), RingError> {
            self.tx_written.lock().unwrap().push((hw_idx, desc));
            Ok(())
        }
        fn advance_tx_tail(&self, _queue: usize, hw_idx: u32) -> Result<(), RingError> {
            self.tx_tail.store(hw_idx, Ordering::Relaxed);
            Ok(())
        }
        fn current_rx_index(&self, _queue: usize) -> Result<u32, RingError> {
            Ok(0)
        }
        fn rx_descriptor_done(&self, _queue: usize, hw_idx: u32) -> bool {
            self.rx_done.lock().unwrap()[hw_idx as usize].0
        }
        fn rx_frame_len(&self, _queue: usize, hw_idx: u32) -> u32 {
            self.rx_done.lock().unwrap()[hw_idx as usize].1
        }
        fn write_rx_descriptor(&self, _queue: usize, hw_idx: u32, addr: u64) -> Result<(), RingError> {
            self.rx_done.lock().unwrap()[hw_idx as usize] = (false, 0);
            self.rx_written.lock().unwrap().push((hw_idx, addr));
            Ok(())
        }
        fn advance_rx_head(&self, _queue: usize, hw_idx: u32) -> Result<(), RingError> {
            self.rx_head.store(hw_idx, Ordering::Relaxed);
            Ok(())
        }
        fn remap_buffer(&self, dir: Dir, _queue: usize, hw_idx: u32, _addr: u64) -> Result<(), RingError> {
            self.remaps.lock().unwrap().push((dir, hw_idx));
            Ok(())
        }
    }

    fn tx_setup(num_slots: u32) -> (KringState, Ring, MockShim, BufferPool) {
        let st = KringState::new(num_slots, Dir::Tx);
        let ring = Ring::new(num_slots);
        let shim = MockShim::new(num_slots);
        let pool = BufferPool::new_2k(64).unwrap();
        (st, ring, shim, pool)
    }

    fn rx_setup(num_slots: u32) -> (KringState, Ring, MockShim, BufferPool) {
        let st = KringState::new(num_slots, Dir::Rx);
        let ring = Ring::new(num_slots);
        let shim = MockShim::new(num_slots);
        let pool = BufferPool::new_2k(64).unwrap();
        // every rx slot starts out owning a distinct valid buffer
        for i in 0..num_slots {
            ring.set_slot(i, Slot { buf_idx: i + 1, len: 0, flags: 0 });
        }
        (st, ring, shim, pool)
    }

    fn fill_tx_slots(ring: &Ring, count: u32) {
        for i in 0..count {
            ring.set_slot(i, Slot { buf_idx: i + 1, len: 60, flags: 0 });
        }
    }

    #[test]
    fn test_txsync_pushes_released_slots() {
        // 16-slot tx ring, user releases 4 slots
        let (mut st, ring, shim, pool) = tx_setup(16);
        fill_tx_slots(&ring, 4);
        ring.set_cur(4);

        txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap();

        assert_eq!(st.nr_hwcur, 4);
        assert_eq!(st.nr_hwavail, 11);
        assert_eq!(ring.avail(), 11);
        let written = shim.tx_written.lock().unwrap();
        assert_eq!(written.len(), 4);
        assert_eq!(written[0].1.addr, pool.dma_addr(1));
        assert_eq!(written[0].1.len, 60);
        assert_eq!(shim.tx_tail.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_txsync_rejects_cur_past_limit() {
        // cur == num_slots is one past the last valid index, not a wrap
        let (mut st, ring, shim, pool) = tx_setup(16);
        ring.set_cur(16);
        let err = txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap_err();
        assert_eq!(err, RingError::Corrupt { queue: 0, value: 16, limit: 15 });
        assert_eq!(st.nr_hwcur, 0);
        assert_eq!(st.nr_hwavail, 15);
    }

    #[test]
    fn test_txsync_corrupt_cur_reinitializes() {
        let (mut st, ring, shim, pool) = tx_setup(16);
        ring.set_cur(16 + 5);
        let err = txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap_err();
        assert!(matches!(err, RingError::Corrupt { .. }));
        assert_eq!(st.nr_hwcur, 0);
        assert_eq!(st.nr_hwavail, 15);
        // the shared ring was reset too, so userspace can re-read and retry
        assert_eq!(ring.cur(), 0);
        assert_eq!(ring.avail(), 15);
    }

    #[test]
    fn test_txsync_invalid_buffer_reinitializes() {
        let (mut st, ring, shim, pool) = tx_setup(16);
        ring.set_slot(0, Slot { buf_idx: 0, len: 60, flags: 0 });
        ring.set_cur(1);
        let err = txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap_err();
        assert_eq!(err, RingError::InvalidBuffer { queue: 0, slot: 0, buf_idx: 0 });
        assert_eq!(st.nr_hwavail, 15);
        assert!(shim.tx_written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_txsync_oversize_len_reinitializes() {
        let (mut st, ring, shim, pool) = tx_setup(16);
        ring.set_slot(0, Slot { buf_idx: 1, len: 2049, flags: 0 });
        ring.set_cur(1);
        let err = txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap_err();
        assert!(matches!(err, RingError::InvalidBuffer { .. }));
    }

    #[test]
    fn test_txsync_remaps_changed_buffer_exactly_once() {
        let (mut st, ring, shim, pool) = tx_setup(16);
        ring.set_slot(0, Slot { buf_idx: 5, len: 60, flags: SLOT_BUF_CHANGED });
        ring.set_cur(1);
        txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap();
        assert_eq!(shim.remaps.lock().unwrap().len(), 1);
        assert_eq!(ring.slot(0).flags & SLOT_BUF_CHANGED, 0);

        // nothing new released: no further remap
        txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap();
        assert_eq!(shim.remaps.lock().unwrap().len(), 1);

        // the user swaps the buffer of the next slot: exactly one more
        ring.set_slot(1, Slot { buf_idx: 9, len: 60, flags: SLOT_BUF_CHANGED });
        ring.set_cur(2);
        txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap();
        assert_eq!(shim.remaps.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_txsync_exclusive_reclaims_completions() {
        let (mut st, ring, shim, pool) = tx_setup(16);
        fill_tx_slots(&ring, 8);
        ring.set_cur(8);
        // hardware has transmitted everything it was given
        shim.tx_completion.store(8, Ordering::Relaxed);

        txsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();

        assert_eq!(st.nr_hwcur, 8);
        // 15 - 8 released + 8 reclaimed
        assert_eq!(st.nr_hwavail, 15);
        assert_eq!(ring.avail(), 15);
        assert_eq!(st.next_hw, 8);
    }

    #[test]
    fn test_txsync_opportunistic_skips_reclaim_while_available() {
        let (mut st, ring, shim, pool) = tx_setup(16);
        shim.tx_completion.store(5, Ordering::Relaxed);
        txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap();
        // slots were still available, the register was never consulted
        assert_eq!(st.next_hw, 0);
        assert_eq!(st.nkr_kflags, 16);
        assert_eq!(st.nr_hwavail, 15);
    }

    #[test]
    fn test_txsync_probe_reclaims_when_ring_full() {
        let num_slots = 8;
        let (mut st, ring, shim, pool) = tx_setup(num_slots);
        // fill the whole ring: 7 slots released
        fill_tx_slots(&ring, 7);
        ring.set_cur(7);
        txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap();
        assert_eq!(st.nr_hwavail, 0);

        // probe slot (next_hw + 4 = 4) not done yet: no reclaim
        txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap();
        assert_eq!(st.nr_hwavail, 0);
        assert_eq!(st.nkr_kflags, 4);

        // probe reports done, register says 6 descriptors cleaned
        shim.tx_done.lock().unwrap()[4] = true;
        shim.tx_completion.store(6, Ordering::Relaxed);
        txsync(&mut st, &ring, &shim, &pool, 0, false).unwrap();
        assert_eq!(st.nr_hwavail, 6);
        assert_eq!(st.next_hw, 6);
    }

    #[test]
    fn test_txsync_hwavail_overflow_is_corruption() {
        let (mut st, ring, shim, pool) = tx_setup(16);
        // nothing released, but the register claims 5 fresh completions on
        // an already fully-available ring
        shim.tx_completion.store(5, Ordering::Relaxed);
        let err = txsync(&mut st, &ring, &shim, &pool, 0, true).unwrap_err();
        assert!(matches!(err, RingError::Corrupt { .. }));
        assert_eq!(st.nr_hwavail, 15);
        assert!(st.nr_hwavail <= st.lim());
    }

    #[test]
    fn test_txsync_hwavail_never_exceeds_limit() {
        // a longer valid sequence of syncs keeps the invariant
        let (mut st, ring, shim, pool) = tx_setup(16);
        let mut cur = 0_u32;
        for round in 0..100_u32 {
            let batch = 1 + round % 5;
            for _ in 0..batch {
                ring.set_slot(cur, Slot { buf_idx: 1 + cur % 60, len: 60, flags: 0 });
                cur = ring.next_index(cur);
            }
            ring.set_cur(cur);
            // hardware keeps up completely
            shim.tx_completion.store(idx_ring_to_hw(cur, st.nkr_hwofs, 16), Ordering::Relaxed);
            txsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();
            assert!(st.nr_hwavail <= st.lim());
        }
    }

    #[test]
    fn test_rxsync_imports_completions() {
        // Scenario: 3 hardware completions pending, reserved = 0
        let (mut st, ring, shim, pool) = rx_setup(16);
        shim.complete_rx(0, 100);
        shim.complete_rx(1, 101);
        shim.complete_rx(2, 102);

        rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();
        assert_eq!(st.nr_hwavail, 3);
        assert_eq!(ring.avail(), 3);
        assert_eq!(ring.slot(0).len, 100);
        assert_eq!(ring.slot(2).len, 102);

        // user consumes 2 of them
        ring.set_cur(2);
        rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();
        assert_eq!(st.nr_hwcur, 2);
        assert_eq!(st.nr_hwavail, 1);
        assert_eq!(ring.avail(), 1);
        // two buffers went back to the NIC, head one position behind the
        // last refilled slot
        assert_eq!(shim.rx_written.lock().unwrap().len(), 2);
        assert_eq!(shim.rx_head.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_rxsync_idempotent_without_progress() {
        let (mut st, ring, shim, pool) = rx_setup(16);
        shim.complete_rx(0, 64);
        rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();
        let (hwcur, hwavail, avail) = (st.nr_hwcur, st.nr_hwavail, ring.avail());

        // no new completions, no user update: state must not move
        rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();
        assert_eq!(st.nr_hwcur, hwcur);
        assert_eq!(st.nr_hwavail, hwavail);
        assert_eq!(ring.avail(), avail);
    }

    #[test]
    fn test_rxsync_skips_import_without_force() {
        let (mut st, ring, shim, pool) = rx_setup(16);
        shim.complete_rx(0, 64);
        rxsync(&mut st, &ring, &shim, &pool, 0, false).unwrap();
        assert_eq!(st.nr_hwavail, 0);
    }

    #[test]
    fn test_rxsync_reserved_window_held_back() {
        let (mut st, ring, shim, pool) = rx_setup(16);
        for i in 0..5 {
            shim.complete_rx(i, 64);
        }
        rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();
        assert_eq!(ring.avail(), 5);

        // user read 4 but wants the last 2 kept for look-ahead
        ring.set_cur(4);
        ring.set_reserved(2);
        rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();
        // only cur - reserved = 2 slots actually released
        assert_eq!(st.nr_hwcur, 2);
        assert_eq!(st.nr_hwavail, 3);
        assert_eq!(ring.avail(), 1);
    }

    #[test]
    fn test_rxsync_oversized_reserved_clamped() {
        // Scenario: reserved larger than avail clamps to 0 for the call
        let (mut st, ring, shim, pool) = rx_setup(16);
        shim.complete_rx(0, 64);
        rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();
        assert_eq!(ring.avail(), 1);

        ring.set_cur(1);
        ring.set_reserved(7);
        rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();
        assert_eq!(ring.reserved(), 0);
        // with the clamp the full release window applied
        assert_eq!(st.nr_hwcur, 1);
        assert_eq!(st.nr_hwavail, 0);
    }

    #[test]
    fn test_rxsync_corrupt_cur_reinitializes() {
        let (mut st, ring, shim, pool) = rx_setup(16);
        ring.set_cur(40);
        let err = rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap_err();
        assert!(matches!(err, RingError::Corrupt { .. }));
        assert_eq!(st.nr_hwcur, 0);
        assert_eq!(st.nr_hwavail, 0);
    }

    #[test]
    fn test_rxsync_invalid_buffer_on_release() {
        let (mut st, ring, shim, pool) = rx_setup(16);
        shim.complete_rx(0, 64);
        shim.complete_rx(1, 64);
        rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();

        // user hands back a slot pointing at the null buffer
        ring.set_slot(0, Slot { buf_idx: 0, len: 0, flags: 0 });
        ring.set_cur(2);
        let err = rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap_err();
        assert!(matches!(err, RingError::InvalidBuffer { .. }));
        assert_eq!(st.nr_hwavail, 0);
    }

    #[test]
    fn test_rxsync_respects_hw_offset() {
        // after a reinit the hardware cursor sits at 6 while the ring
        // restarts at 0; imports must land starting at ring index 0
        let (mut st, ring, shim, pool) = rx_setup(16);
        st.reinit(6);
        shim.complete_rx(6, 77);
        shim.complete_rx(7, 78);
        rxsync(&mut st, &ring, &shim, &pool, 0, true).unwrap();
        assert_eq!(st.nr_hwavail, 2);
        assert_eq!(ring.slot(0).len, 77);
        assert_eq!(ring.slot(1).len, 78);
    }

    #[test]
    fn test_forward_distance_wraps() {
        assert_eq!(forward_distance(0, 0, 16), 0);
        assert_eq!(forward_distance(3, 9, 16), 6);
        assert_eq!(forward_distance(14, 2, 16), 4);
    }
}
