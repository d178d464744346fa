/// Failures of a single txsync/rxsync round.
///
/// `Corrupt` and `InvalidBuffer` are always preceded by a reinitialization of
/// the affected kring: the caller sees zero progress for the round, re-reads
/// the (now reset) ring state and retries.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RingError {
    #[error("Ring index out of range (queue = {queue}, value = {value}, limit = {limit})")] Corrupt { queue: usize, value: u32, limit: u32 },
    #[error("Slot names an invalid buffer (queue = {queue}, slot = {slot}, buf_idx = {buf_idx})")] InvalidBuffer { queue: usize, slot: u32, buf_idx: u32 },
    #[error("Hardware transiently busy (queue = {queue})")] HardwareBusy { queue: usize },
    #[error("Adapter is not in zero-copy mode")] NotRegistered,
}

/// Failures outside the sync path: pool construction and registration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Memory allocation failure")] MemoryAllocationFailure,
    #[error("Memory map failure")] MemoryMapFailure,
    #[error("Adapter is already in zero-copy mode")] AlreadyRegistered,
    #[error("Adapter is not in zero-copy mode")] NotRegistered,
    #[error("Adapter has no intercept path")] InterceptUnavailable,
    #[error("Not enough pool buffers for {needed} ring slots")] PoolTooSmall { needed: usize },
    #[error("Interface {name} is already attached")] InterfaceExists { name: String },
    #[error("Unknown interface {name}")] UnknownInterface { name: String },
}
