use sysinfo::System;

/// Memory currently available to new allocations, in bytes.
pub fn available_memory_bytes() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    system.available_memory()
}

/// Estimated peak memory for holding one batch of `max_records` records.
pub fn estimated_batch_bytes(max_records: usize, bytes_per_record: usize) -> u64 {
    (max_records as u64).saturating_mul(bytes_per_record as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_batch_bytes() {
        assert_eq!(estimated_batch_bytes(1000, 400), 400_000);
        assert_eq!(estimated_batch_bytes(usize::MAX, usize::MAX), u64::MAX);
    }
}
