use crate::size::{GB, MB};

/// Pick a cache capacity in bytes from the machine's total memory.
///
/// Machines with 1 GiB or less get no directory cache at all; every
/// `put` is then declined.
pub fn capacity_for_memory(total_memory: u64) -> u64 {
    match total_memory {
        m if m <= GB => 0,
        m if m <= 4 * GB => MB,
        m if m <= 8 * GB => 2 * MB,
        m if m <= 16 * GB => 5 * MB,
        _ => 8 * MB,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_tiers() {
        assert_eq!(capacity_for_memory(512 * MB), 0);
        assert_eq!(capacity_for_memory(GB), 0);
        assert_eq!(capacity_for_memory(2 * GB), MB);
        assert_eq!(capacity_for_memory(4 * GB), MB);
        assert_eq!(capacity_for_memory(6 * GB), 2 * MB);
        assert_eq!(capacity_for_memory(16 * GB), 5 * MB);
        assert_eq!(capacity_for_memory(64 * GB), 8 * MB);
    }
}
