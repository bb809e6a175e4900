use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::grist::Member;

/// Last known org access list.
///
/// The list is never edited in place: [`MembershipSnapshot::replace`] swaps
/// in a whole new list, and readers get an `Arc` to whichever list was
/// current when they looked.
#[derive(Debug, Default)]
pub struct MembershipSnapshot {
    members: Mutex<Arc<Vec<Member>>>,
}

impl MembershipSnapshot {
    pub fn current(&self) -> Arc<Vec<Member>> {
        let guard = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn replace(&self, members: Vec<Member>) -> Arc<Vec<Member>> {
        let fresh = Arc::new(members);
        let mut guard = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&fresh);
        trace!(members = fresh.len(), "membership snapshot replaced");
        fresh
    }

    pub fn contains(&self, email: &str) -> bool {
        contains_email(&self.current(), email)
    }
}

pub fn contains_email(members: &[Member], email: &str) -> bool {
    members.iter().any(|m| m.email == email)
}
