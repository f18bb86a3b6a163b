//! Fire-and-forget notification channel.
//!
//! Delivery failures are logged, never retried. A real deployment plugs an
//! SMTP-backed implementation in behind the same trait.

/// An outbound notification sink.
pub trait Notifier: Send + Sync {
    /// Deliver a message. Best-effort.
    fn send(&self, to: &str, subject: &str, body: &str);
}

/// A notifier that writes messages to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) {
        tracing::info!(to, subject, body, "notification dispatched");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_notifier_does_not_panic() {
        LogNotifier.send("user@example.com", "Password reset", "Follow the link.");
    }
}
