use crate::RingError;

/// Which side of a queue an operation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Tx,
    Rx,
}

/// One transmit descriptor as the engine hands it to the shim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxDescriptor {
    /// DMA address of the payload (pool offset)
    pub addr: u64,
    pub len: u32,
    /// Ask the hardware for a completion report on this descriptor
    pub report: bool,
}

/// The narrow contract a NIC family implements to drive its descriptor
/// rings and head/tail registers.
///
/// The sync engine never touches device registers directly, it only calls
/// these primitives. Implementations may return
/// [`RingError::HardwareBusy`] for transient register-level conditions;
/// the engine propagates it to the caller without retrying.
pub trait HardwareShim: Send + Sync {
    //
    // transmit side
    //

    /// Current hardware consumer pointer of tx queue `queue` (how far the
    /// NIC has transmitted)
    fn tx_completion_index(&self, queue: usize) -> Result<u32, RingError>;

    /// Whether the tx descriptor at `hw_idx` has its completion bit set
    fn tx_descriptor_done(&self, queue: usize, hw_idx: u32) -> bool;

    /// Write one translated descriptor into the hardware tx ring
    fn write_tx_descriptor(&self, queue: usize, hw_idx: u32, desc: TxDescriptor) -> Result<(), RingError>;

    /// Advance the tx tail/doorbell register to `hw_idx` (exclusive),
    /// releasing all descriptors written so far to the NIC
    fn advance_tx_tail(&self, queue: usize, hw_idx: u32) -> Result<(), RingError>;

    //
    // receive side
    //

    /// The next rx descriptor index the hardware will complete (used to
    /// resync after a reinitialization)
    fn current_rx_index(&self, queue: usize) -> Result<u32, RingError>;

    /// Whether the rx descriptor at `hw_idx` holds a completed frame
    fn rx_descriptor_done(&self, queue: usize, hw_idx: u32) -> bool;

    /// Hardware-reported frame length of the completed rx descriptor at
    /// `hw_idx`
    fn rx_frame_len(&self, queue: usize, hw_idx: u32) -> u32;

    /// Point the rx descriptor at `hw_idx` at a fresh buffer and clear its
    /// status so the NIC may refill it
    fn write_rx_descriptor(&self, queue: usize, hw_idx: u32, addr: u64) -> Result<(), RingError>;

    /// Advance the rx head register to `hw_idx`; the engine always keeps
    /// this one position behind the last refilled slot
    fn advance_rx_head(&self, queue: usize, hw_idx: u32) -> Result<(), RingError>;

    //
    // both sides
    //

    /// Reload the DMA mapping of descriptor `hw_idx` after the slot's
    /// buffer address changed (`SLOT_BUF_CHANGED`)
    fn remap_buffer(&self, dir: Dir, queue: usize, hw_idx: u32, addr: u64) -> Result<(), RingError>;
}
