use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{BufferPool, RingError};
use crate::hw::{Dir, HardwareShim, TxDescriptor};

/// One intercepted frame: a single persistent copy of the packet data,
/// backed by a buffer recycled through a [`FramePool`].
pub struct Frame {
    bytes: Vec<u8>,
}
impl Frame {
    pub fn payload(&self) -> &[u8] {
        &self.bytes
    }
}

/// Fixed-capacity recycling pool for [`Frame`] buffers (the lookaside-list
/// of the intercept path). Allocation failures drop the frame and are
/// counted, never blocked on.
pub struct FramePool {
    free: crossbeam::queue::ArrayQueue<Vec<u8>>,
    frame_size: usize,
    dropped: AtomicU64,
}
impl FramePool {
    pub fn new(capacity: usize, frame_size: usize) -> Self {
        let free = crossbeam::queue::ArrayQueue::new(capacity);
        for _ in 0..capacity {
            free.push(Vec::with_capacity(frame_size)).unwrap_or_else(|_| unreachable!());
        }
        Self { free, frame_size, dropped: AtomicU64::new(0) }
    }

    /// Copy `payload` into a pooled frame; `None` (counted) when the pool
    /// is exhausted or the payload oversized.
    pub fn copy_in(&self, payload: &[u8]) -> Option<Frame> {
        if payload.len() > self.frame_size {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        match self.free.pop() {
            Some(mut bytes) => {
                bytes.clear();
                bytes.extend_from_slice(payload);
                Some(Frame { bytes })
            }
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Return a frame's buffer to the pool
    pub fn release(&self, frame: Frame) {
        let _ = self.free.push(frame.bytes);
    }

    /// Frames dropped so far for lack of a pool buffer
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// The single registered callback that moves an intercepted frame across
/// the boundary: toward the NIC driver (`toward_nic = true`, frames leaving
/// the zero-copy tx ring) or up into the host stack (`toward_nic = false`).
pub trait InjectHandler: Send + Sync {
    fn inject(&self, payload: &[u8], toward_nic: bool);
}

struct SoftTxDesc {
    addr: u64,
    len: u32,
    written: bool,
    done: bool,
}
struct SoftRxDesc {
    addr: u64,
    len: u32,
    armed: bool,
    done: bool,
}
struct SoftTxQueue {
    descs: Box<[SoftTxDesc]>,
    /// Next descriptor to drain on a tail advance
    next: u32,
    /// Consumer pointer reported back to the engine
    completion: u32,
}
struct SoftRxQueue {
    descs: Box<[SoftRxDesc]>,
    /// Next descriptor the "hardware" will fill
    next: u32,
}

/// A software stand-in for a NIC, used when an interface's native driver
/// cannot be synced directly: descriptor rings live in memory, transmit
/// drains through the inject callback, receive fills from queued frames.
///
/// Because it implements [`HardwareShim`], the exact same txsync/rxsync
/// engine drives caught interfaces and real hardware alike.
pub struct SoftShim {
    pool: Arc<BufferPool>,
    inject: Arc<dyn InjectHandler>,
    frames: FramePool,
    tx: Box<[Mutex<SoftTxQueue>]>,
    rx: Box<[Mutex<SoftRxQueue>]>,
    pending_rx: Box<[crossbeam::queue::ArrayQueue<Frame>]>,
}
impl SoftShim {
    pub fn new(
        pool: Arc<BufferPool>,
        inject: Arc<dyn InjectHandler>,
        num_queues: usize,
        num_slots: u32,
    ) -> Self {
        let tx = (0..num_queues)
            .map(|_| Mutex::new(SoftTxQueue {
                descs: (0..num_slots).map(|_| SoftTxDesc { addr: 0, len: 0, written: false, done: false }).collect(),
                next: 0,
                completion: 0,
            }))
            .collect();
        let rx = (0..num_queues)
            .map(|_| Mutex::new(SoftRxQueue {
                descs: (0..num_slots).map(|_| SoftRxDesc { addr: 0, len: 0, armed: false, done: false }).collect(),
                next: 0,
            }))
            .collect();
        let pending_rx = (0..num_queues)
            .map(|_| crossbeam::queue::ArrayQueue::new(num_slots as usize))
            .collect();
        Self {
            pool,
            inject,
            frames: FramePool::new(num_slots as usize * num_queues * 2, 4096),
            tx,
            rx,
            pending_rx,
        }
    }

    pub fn frame_pool(&self) -> &FramePool {
        &self.frames
    }

    /// Hand an intercepted inbound frame to this queue. The payload is
    /// copied once into a pooled frame; it lands in a ring buffer as soon
    /// as an armed descriptor is available. Returns whether the frame was
    /// accepted (dropped frames are counted in the pool).
    #[tracing::instrument(skip(self, payload), level = tracing::Level::TRACE, fields(len = payload.len()), ret)]
    pub fn accept_frame(&self, queue: usize, payload: &[u8]) -> bool {
        let Some(frame) = self.frames.copy_in(payload) else {
            return false;
        };
        if let Err(frame) = self.pending_rx[queue].push(frame) {
            self.frames.release(frame);
            self.frames.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.pump_rx(queue);
        true
    }

    // move queued frames into armed descriptors, the software analog of
    // the NIC's DMA engine filling buffers
    fn pump_rx(&self, queue: usize) {
        let mut q = self.rx[queue].lock().unwrap_or_else(|e| e.into_inner());
        loop {
            let next = q.next as usize;
            if !q.descs[next].armed || q.descs[next].done {
                break;
            }
            let Some(frame) = self.pending_rx[queue].pop() else {
                break;
            };
            let len = frame.payload().len().min(self.pool.buf_size());
            self.pool.write(q.descs[next].addr, &frame.payload()[..len]);
            q.descs[next].len = len as u32;
            q.descs[next].done = true;
            q.descs[next].armed = false;
            let num = q.descs.len() as u32;
            q.next = if q.next + 1 == num { 0 } else { q.next + 1 };
            self.frames.release(frame);
        }
    }
}
impl HardwareShim for SoftShim {
    fn tx_completion_index(&self, queue: usize) -> Result<u32, RingError> {
        Ok(self.tx[queue].lock().unwrap_or_else(|e| e.into_inner()).completion)
    }

    fn tx_descriptor_done(&self, queue: usize, hw_idx: u32) -> bool {
        self.tx[queue].lock().unwrap_or_else(|e| e.into_inner()).descs[hw_idx as usize].done
    }

    fn write_tx_descriptor(&self, queue: usize, hw_idx: u32, desc: TxDescriptor) -> Result<(), RingError> {
        let mut q = self.tx[queue].lock().unwrap_or_else(|e| e.into_inner());
        q.descs[hw_idx as usize] = SoftTxDesc { addr: desc.addr, len: desc.len, written: true, done: false };
        Ok(())
    }

    fn advance_tx_tail(&self, queue: usize, hw_idx: u32) -> Result<(), RingError> {
        // drain every descriptor released by the doorbell: copy the payload
        // out of the shared buffer once and hand it to the inject callback
        let mut q = self.tx[queue].lock().unwrap_or_else(|e| e.into_inner());
        while q.next != hw_idx {
            let i = q.next as usize;
            if q.descs[i].written {
                let payload = self.pool.read(q.descs[i].addr, q.descs[i].len as usize);
                self.inject.inject(&payload, true);
                q.descs[i].written = false;
                q.descs[i].done = true;
            }
            let num = q.descs.len() as u32;
            q.next = if q.next + 1 == num { 0 } else { q.next + 1 };
        }
        // a software path completes transmissions as soon as they leave
        q.completion = hw_idx;
        Ok(())
    }

    fn current_rx_index(&self, queue: usize) -> Result<u32, RingError> {
        Ok(self.rx[queue].lock().unwrap_or_else(|e| e.into_inner()).next)
    }

    fn rx_descriptor_done(&self, queue: usize, hw_idx: u32) -> bool {
        self.rx[queue].lock().unwrap_or_else(|e| e.into_inner()).descs[hw_idx as usize].done
    }

    fn rx_frame_len(&self, queue: usize, hw_idx: u32) -> u32 {
        self.rx[queue].lock().unwrap_or_else(|e| e.into_inner()).descs[hw_idx as usize].len
    }

    fn write_rx_descriptor(&self, queue: usize, hw_idx: u32, addr: u64) -> Result<(), RingError> {
        {
            let mut q = self.rx[queue].lock().unwrap_or_else(|e| e.into_inner());
            q.descs[hw_idx as usize] = SoftRxDesc { addr, len: 0, armed: true, done: false };
        }
        // a fresh buffer may unblock queued frames
        self.pump_rx(queue);
        Ok(())
    }

    fn advance_rx_head(&self, _queue: usize, _hw_idx: u32) -> Result<(), RingError> {
        // the software path tracks ownership through armed bits, the head
        // register has no analog
        Ok(())
    }

    fn remap_buffer(&self, _dir: Dir, _queue: usize, _hw_idx: u32, _addr: u64) -> Result<(), RingError> {
        // no IOMMU in front of plain memory
        Ok(())
    }
}
