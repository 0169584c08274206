//! Process memory port.

/// Port for sampling the resident memory of the current process.
pub trait MemoryProbe: Send + Sync {
    /// Resident set size in bytes, if it can be determined.
    fn resident_bytes(&self) -> Option<u64>;
}
