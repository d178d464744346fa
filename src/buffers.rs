/// The shared packet-buffer pool: a memory area visible to both the kernel
/// side and userspace, carved into fixed-size buffers that ring slots name
/// by index.
///
/// Buffer index 0 is reserved as the null buffer: a slot naming it (or any
/// out-of-range index) fails validation and the owning kring is
/// reinitialized.
pub struct BufferPool {
    // metadata
    buf_size: usize,
    num_bufs: usize,

    // memory allocation
    allocation: std::ptr::NonNull<libc::c_void>,
}
impl BufferPool {
    // constants
    const BUF_SIZE_2K: usize = 2048;
    const BUF_SIZE_4K: usize = 4096;

    // constructors

    /// Create a pool of `num_bufs` buffers of 2048 bytes each
    pub fn new_2k(num_bufs: usize) -> Result<Self, crate::Error> {
        Self::new(Self::BUF_SIZE_2K, num_bufs)
    }

    /// Create a pool of `num_bufs` buffers of 4096 bytes each
    pub fn new_4k(num_bufs: usize) -> Result<Self, crate::Error> {
        Self::new(Self::BUF_SIZE_4K, num_bufs)
    }

    fn new(buf_size: usize, num_bufs: usize) -> Result<Self, crate::Error> {
        // check buffer size
        match buf_size {
            Self::BUF_SIZE_2K | Self::BUF_SIZE_4K => {},
            other => panic!("Buffer size {other} is not supported"),
        };
        assert!(num_bufs >= 2, "buffer 0 is reserved, the pool needs at least one more");

        // page size
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;

        // allocate memory
        let allocation = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                buf_size * num_bufs,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0
            )
        };
        if allocation == libc::MAP_FAILED || allocation.is_null() {
            return Err(crate::Error::MemoryAllocationFailure);
        }

        // check aligned
        assert_eq!(allocation as usize & (page_size - 1), 0);

        // zero out memory
        unsafe { libc::memset(allocation, 0, buf_size * num_bufs); }

        Ok(Self {
            buf_size,
            num_bufs,
            allocation: unsafe { std::ptr::NonNull::new_unchecked(allocation) },
        })
    }

    // metadata

    /// How big in bytes an individual buffer is
    pub const fn buf_size(&self) -> usize {
        self.buf_size
    }

    /// How big the whole pool area is
    pub const fn memory_size(&self) -> usize {
        self.buf_size * self.num_bufs
    }

    /// How many buffers the pool holds (index 0 included)
    pub const fn num_bufs(&self) -> usize {
        self.num_bufs
    }

    // validation and translation

    /// Check that `buf_idx` names a usable buffer: not the reserved null
    /// buffer and in range
    pub const fn validate_index(&self, buf_idx: u32) -> bool {
        buf_idx != 0 && (buf_idx as usize) < self.num_bufs
    }

    /// [`Self::validate_index`] plus a length check against the buffer size
    pub const fn validate(&self, buf_idx: u32, len: u16) -> bool {
        self.validate_index(buf_idx) && len as usize <= self.buf_size
    }

    /// The DMA address of buffer `buf_idx`: its byte offset from the start
    /// of the pool area. This is the address handed to the hardware shim.
    pub const fn dma_addr(&self, buf_idx: u32) -> u64 {
        (self.buf_size * buf_idx as usize) as u64
    }

    /// The buffer index containing DMA address `addr`
    pub const fn buf_index_for_addr(&self, addr: u64) -> u32 {
        (addr as usize / self.buf_size) as u32
    }

    // memory

    /// Copy `data` into the pool at DMA address `addr`.
    ///
    /// Used by software shims standing in for a DMA engine. The caller must
    /// pass an `addr` previously obtained from [`Self::dma_addr`] and data
    /// no longer than [`Self::buf_size`].
    pub fn write(&self, addr: u64, data: &[u8]) {
        assert!(addr as usize + data.len() <= self.memory_size());
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.allocation.as_ptr().byte_add(addr as usize).cast(),
                data.len(),
            );
        }
    }

    /// Copy `len` bytes out of the pool at DMA address `addr`
    pub fn read(&self, addr: u64, len: usize) -> Vec<u8> {
        assert!(addr as usize + len <= self.memory_size());
        let mut out = vec![0_u8; len];
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.allocation.as_ptr().byte_add(addr as usize).cast(),
                out.as_mut_ptr(),
                len,
            );
        }
        out
    }

    /// Obtain a pointer to the pool area, for the OS glue that maps the
    /// region into a user process
    ///
    /// # Safety
    /// This function is __unsafe__ because it's always possible to cast a *const pointer into a *mut pointer
    pub const unsafe fn memory_ptr(&self) -> *const u8 {
        self.allocation.as_ptr().cast()
    }
}
impl Drop for BufferPool {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.allocation.as_ptr(), self.memory_size()) };
    }
}
unsafe impl Send for BufferPool {}
unsafe impl Sync for BufferPool {}
