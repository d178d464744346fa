mod adapter; pub use adapter::{Adapter, AdapterCore, LockClass, LockGuard, NativeTransmit};
mod buffers; pub use buffers::BufferPool;
mod error; pub use error::{Error, RingError};
mod generic; pub use generic::{Frame, FramePool, InjectHandler, SoftShim};
mod hw; pub use hw::{Dir, HardwareShim, TxDescriptor};
mod kring; pub use kring::{Kring, KringState, Notifier, idx_hw_to_ring, idx_ring_to_hw};
mod registry; pub use registry::Registry;
mod ring; pub use ring::{Ring, SLOT_BUF_CHANGED, SLOT_REPORT, Slot};
mod sync; pub use sync::{rxsync, txsync};
