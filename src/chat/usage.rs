//! Server-side count of chat turns per chatbot and user.
//!
//! The free-message allowance is charged here rather than derived from the
//! history a client sends back.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chatbot_abi::Address;

/// Key for a turn: the chatbot and the account it is charged to (`None`
/// when no wallet is connected; all such turns share one allowance).
type UsageKey = (Address, Option<Address>);

#[derive(Default)]
pub struct ChatUsage {
    turns: Mutex<HashMap<UsageKey, u32>>,
}

impl ChatUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge one turn and return how many were charged before it.
    ///
    /// Reserving up front keeps concurrent requests from all seeing the
    /// same count; call [`refund`](Self::refund) if the turn does not happen.
    pub fn reserve(&self, chatbot: Address, user: Option<Address>) -> u32 {
        let mut turns = self.lock();
        let used = turns.entry((chatbot, user)).or_insert(0);
        let before = *used;
        *used = used.saturating_add(1);
        before
    }

    pub fn refund(&self, chatbot: Address, user: Option<Address>) {
        let mut turns = self.lock();
        if let Some(used) = turns.get_mut(&(chatbot, user)) {
            *used = used.saturating_sub(1);
        }
    }

    pub fn used(&self, chatbot: Address, user: Option<Address>) -> u32 {
        self.lock().get(&(chatbot, user)).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UsageKey, u32>> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_counts_per_chatbot_and_user() {
        let usage = ChatUsage::new();
        assert_eq!(usage.reserve([1; 20], Some([9; 20])), 0);
        assert_eq!(usage.reserve([1; 20], Some([9; 20])), 1);
        assert_eq!(usage.reserve([1; 20], None), 0);
        assert_eq!(usage.reserve([2; 20], Some([9; 20])), 0);
        assert_eq!(usage.used([1; 20], Some([9; 20])), 2);
    }

    #[test]
    fn refund_gives_the_turn_back() {
        let usage = ChatUsage::new();
        usage.reserve([1; 20], None);
        usage.refund([1; 20], None);
        assert_eq!(usage.used([1; 20], None), 0);
        usage.refund([3; 20], None);
        assert_eq!(usage.used([3; 20], None), 0);
    }
}
