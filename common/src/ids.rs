//! Explicit identifier allocators.
//!
//! Rows minted for the new chain need stable sequential ids spread across
//! many writer calls. Rather than process-wide counters, each identifier
//! namespace gets its own allocator instance, passed by reference into
//! whichever component mints ids.

/// Sequential id allocator for one namespace
#[derive(Debug)]
pub struct IdAllocator {
    namespace: &'static str,
    next: u64,
}

impl IdAllocator {
    /// Construct, starting at the given first id
    pub fn new(namespace: &'static str, first: u64) -> Self {
        Self {
            namespace,
            next: first,
        }
    }

    /// Mint the next id
    pub fn assign(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids minted so far is derivable from the next value
    pub fn next_id(&self) -> u64 {
        self.next
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_per_namespace() {
        let mut accounts = IdAllocator::new("accounts", 1);
        let mut messages = IdAllocator::new("messages", 100);

        assert_eq!(accounts.assign(), 1);
        assert_eq!(accounts.assign(), 2);
        assert_eq!(messages.assign(), 100);
        assert_eq!(accounts.assign(), 3);
        assert_eq!(messages.assign(), 101);
    }
}
