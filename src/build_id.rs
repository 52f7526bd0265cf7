//! Build identifier generation.
//!
//! Ids are random UUIDv4 values in their 32-character lowercase hex form, so
//! they embed directly in a URL path and need no coordination between
//! concurrent requests.

use crate::types::BuildId;
use uuid::Uuid;

/// Mint a fresh build id. Never fails and never blocks.
pub fn new_build_id() -> BuildId {
    BuildId::from_generated(Uuid::new_v4().simple().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_build_id_is_url_safe_hex() {
        let id = new_build_id();
        assert_eq!(id.as_str().len(), 32);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_build_ids_do_not_repeat_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..500).map(|_| new_build_id()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate build id generated");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
