//! Workload identifier derivation.

/// Maps a client index into the fixed `tb1..tbN` user pool.
///
/// Client indexes grow without bound over a run; the modulo mapping keeps
/// the identifier space bounded and reproducible, so the same client index
/// always lands on the same pool user.
#[must_use]
pub fn reviewer_pool_slot(client_index: u64, pool_size: u32) -> String {
    let pool = u64::from(pool_size.max(1));
    format!("tb{}", client_index % pool + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_is_bounded() {
        for index in 0..100 {
            let slot = reviewer_pool_slot(index, 18);
            let n: u64 = slot.trim_start_matches("tb").parse().unwrap();
            assert!((1..=18).contains(&n));
        }
    }

    #[test]
    fn test_mapping_is_reproducible() {
        assert_eq!(reviewer_pool_slot(0, 18), "tb1");
        assert_eq!(reviewer_pool_slot(17, 18), "tb18");
        assert_eq!(reviewer_pool_slot(18, 18), "tb1");
        assert_eq!(reviewer_pool_slot(40, 18), "tb5");
    }

    #[test]
    fn test_zero_pool_size_clamps() {
        // Degenerate configuration still yields a valid identifier.
        assert_eq!(reviewer_pool_slot(7, 0), "tb1");
    }
}
