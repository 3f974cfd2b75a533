use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter of issued refreshes.
///
/// A response is current only while its ticket is the latest one issued.
#[derive(Debug, Default)]
pub struct RefreshSequence {
    latest: AtomicU64,
}

/// Proof of issue for one refresh. Tickets start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

impl RefreshTicket {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl RefreshSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ticket, superseding every earlier one.
    pub fn issue(&self) -> RefreshTicket {
        RefreshTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: RefreshTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_increase_from_one() {
        let sequence = RefreshSequence::new();
        assert_eq!(sequence.latest(), 0);
        let first = sequence.issue();
        let second = sequence.issue();
        assert_eq!(first.value(), 1);
        assert_eq!(second.value(), 2);
        assert!(first < second);
    }

    #[test]
    fn only_the_latest_ticket_is_current() {
        let sequence = RefreshSequence::new();
        let first = sequence.issue();
        assert!(sequence.is_current(first));
        let second = sequence.issue();
        assert!(!sequence.is_current(first));
        assert!(sequence.is_current(second));
    }

    #[test]
    fn concurrent_issue_never_repeats() {
        let sequence = RefreshSequence::new();
        let mut values: Vec<u64> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| (0..100).map(|_| sequence.issue().value()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), 800);
        assert_eq!(sequence.latest(), 800);
    }
}
