use std::sync::Arc;

use ringmap::{Adapter, InjectHandler, BufferPool, NativeTransmit};

struct LogInject;
impl InjectHandler for LogInject {
    fn inject(&self, payload: &[u8], toward_nic: bool) {
        tracing::info!(len = payload.len(), toward_nic, "frame left the ring");
    }
}

struct LogNative;
impl NativeTransmit for LogNative {
    fn transmit(&self, payload: &[u8]) {
        tracing::info!(len = payload.len(), "native transmit");
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let pool = Arc::new(BufferPool::new_2k(64).unwrap());
    let adapter =
        Adapter::new_generic("demo0", pool, Arc::new(LogInject), 16, Arc::new(LogNative)).unwrap();
    adapter.register(true).unwrap();
    adapter.catch_rx(true).unwrap();

    // an inbound frame arrives from the driver side
    adapter.accept_frame(0, b"hello ring");
    adapter.rxsync(0, true).unwrap();

    // read it off the rx ring
    let rx = adapter.rx_ring(0).ring();
    let slot = rx.slot(0);
    let payload = adapter.pool().read(adapter.pool().dma_addr(slot.buf_idx), slot.len as usize);
    println!("Received: {:?}", String::from_utf8_lossy(&payload));

    // echo it back out through the tx ring
    let tx = adapter.tx_ring(0).ring();
    let mut out = tx.slot(0);
    adapter.pool().write(adapter.pool().dma_addr(out.buf_idx), &payload);
    out.len = slot.len;
    tx.set_slot(0, out);
    tx.set_cur(1);
    adapter.txsync(0, true).unwrap();

    adapter.register(false).unwrap();
}
