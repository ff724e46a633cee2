//! Notification of write-pattern changes.

use migrator_core::WritePattern;
use tokio::sync::watch;

/// Told about every pattern change, e.g. the dual-write proxy deciding which
/// store to write first.
pub trait PatternListener: Send + Sync {
    fn change_pattern(&self, pattern: WritePattern);
}

impl PatternListener for watch::Sender<WritePattern> {
    fn change_pattern(&self, pattern: WritePattern) {
        self.send_replace(pattern);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_sender_publishes_pattern() {
        let (tx, rx) = watch::channel(WritePattern::SrcOnly);

        tx.change_pattern(WritePattern::DstFirst);

        assert_eq!(*rx.borrow(), WritePattern::DstFirst);
    }

    #[test]
    fn test_watch_sender_without_receivers() {
        let (tx, rx) = watch::channel(WritePattern::SrcOnly);
        drop(rx);

        tx.change_pattern(WritePattern::DstOnly);

        assert_eq!(*tx.borrow(), WritePattern::DstOnly);
    }
}
