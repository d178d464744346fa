use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Slot flag: the buffer index differs from the previous sync, the DMA
/// mapping must be reloaded before the slot is handed to hardware.
pub const SLOT_BUF_CHANGED: u16 = 0x0001;
/// Slot flag: request a hardware completion report for this slot.
pub const SLOT_REPORT: u16 = 0x0002;

/// One buffer descriptor of a shared ring.
///
/// Jointly owned: the user side writes `buf_idx`/`len`/`flags` for slots it
/// releases, the kernel side writes `len` for slots it fills on receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Slot {
    pub buf_idx: u32,
    pub len: u16,
    pub flags: u16,
}
impl Slot {
    // slots are packed into a single word so that both sides can read and
    // write them whole, never observing a torn buf_idx/len pair
    pub(crate) const fn to_raw(self) -> u64 {
        (self.buf_idx as u64) << 32 | (self.len as u64) << 16 | self.flags as u64
    }
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self {
            buf_idx: (raw >> 32) as u32,
            len: (raw >> 16) as u16,
            flags: raw as u16,
        }
    }
}

/// The shared ring: a fixed circular array of [`Slot`]s plus the three
/// scalars both sides steer each other with.
///
/// This structure is mapped into an untrusted peer's address space, so every
/// value read out of it is adversarial input: nothing here is validated, the
/// sync engine revalidates on every use.
pub struct Ring {
    num_slots: u32,

    // scalars
    cur: AtomicU32,
    avail: AtomicU32,
    reserved: AtomicU32,

    // slot array
    slots: Box<[AtomicU64]>,
}
impl Ring {
    //
    // construction
    //

    /// Create a ring of `num_slots` slots, all zeroed.
    ///
    /// Ring sizes are arbitrary (not required to be powers of two); wrapping
    /// is done by comparison, never by masking.
    pub fn new(num_slots: u32) -> Self {
        assert!(num_slots >= 2, "a ring needs at least two slots");
        let slots = (0..num_slots).map(|_| AtomicU64::new(0)).collect();
        Self {
            num_slots,
            cur: AtomicU32::new(0),
            avail: AtomicU32::new(0),
            reserved: AtomicU32::new(0),
            slots,
        }
    }

    //
    // access
    //

    /// The fixed number of slots in this ring
    pub const fn num_slots(&self) -> u32 {
        self.num_slots
    }

    /// First slot not yet released to the kernel (user-written, untrusted)
    pub fn cur(&self) -> u32 {
        self.cur.load(Ordering::Acquire)
    }

    pub fn set_cur(&self, cur: u32) {
        self.cur.store(cur, Ordering::Release);
    }

    /// Count of slots currently owned by the user (kernel-written)
    pub fn avail(&self) -> u32 {
        self.avail.load(Ordering::Acquire)
    }

    pub fn set_avail(&self, avail: u32) {
        self.avail.store(avail, Ordering::Release);
    }

    /// Trailing slots the user wants left untouched for receive look-ahead
    /// (user-written, untrusted)
    pub fn reserved(&self) -> u32 {
        self.reserved.load(Ordering::Acquire)
    }

    pub fn set_reserved(&self, reserved: u32) {
        self.reserved.store(reserved, Ordering::Release);
    }

    // slots

    /// Read slot `index` whole
    pub fn slot(&self, index: u32) -> Slot {
        Slot::from_raw(self.slots[index as usize].load(Ordering::Acquire))
    }

    /// Write slot `index` whole
    pub fn set_slot(&self, index: u32, slot: Slot) {
        self.slots[index as usize].store(slot.to_raw(), Ordering::Release);
    }

    //
    // utilities
    //

    /// The next ring index after `index`
    pub const fn next_index(&self, index: u32) -> u32 {
        if index + 1 == self.num_slots { 0 } else { index + 1 }
    }
}
