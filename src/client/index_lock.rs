//! In-process claims on resources being indexed
//!
//! Two overlapping `index` calls (a folder and one of its files, or the same folder twice)
//! can reach the same `(user, resource)` pair at once. Only the first task to claim the pair
//! does the work; the other reports it as in flight instead of inserting duplicate chunks.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

type ClaimKey = (i64, String);

#[derive(Clone, Default)]
pub(crate) struct ResourceClaims {
    claimed: Arc<Mutex<HashSet<ClaimKey>>>,
}

impl ResourceClaims {
    /// Claim a resource for this task; `None` if another task holds it
    pub(crate) fn try_claim(&self, user_id: i64, external_id: &str) -> Option<ClaimGuard> {
        let key = (user_id, external_id.to_string());
        let mut claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !claimed.insert(key.clone()) {
            return None;
        }
        Some(ClaimGuard {
            key,
            claimed: self.claimed.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Releases the claim when dropped, including on early return or panic
pub(crate) struct ClaimGuard {
    key: ClaimKey,
    claimed: Arc<Mutex<HashSet<ClaimKey>>>,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let mut claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        claimed.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_rejected_until_release() {
        let claims = ResourceClaims::default();
        let guard = claims.try_claim(1, "id:a").expect("first claim");
        assert!(claims.try_claim(1, "id:a").is_none());

        drop(guard);
        assert_eq!(claims.len(), 0);
        assert!(claims.try_claim(1, "id:a").is_some());
    }

    #[test]
    fn test_claims_are_per_user_and_resource() {
        let claims = ResourceClaims::default();
        let _a = claims.try_claim(1, "id:a").unwrap();
        let _b = claims.try_claim(2, "id:a").unwrap();
        let _c = claims.try_claim(1, "id:b").unwrap();
        assert_eq!(claims.len(), 3);
    }
}
