use std::time::{Duration, Instant};

/// How long a toast stays on screen
pub const TOAST_LIFETIME: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub severity: Severity,
    pub created: Instant,
}

impl Toast {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= TOAST_LIFETIME
    }
}

/// Transient notifications, oldest first
#[derive(Debug, Default)]
pub struct Toasts {
    items: Vec<Toast>,
}

impl Toasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) {
        self.notify_at(message, severity, Instant::now());
    }

    pub fn notify_at(&mut self, message: impl Into<String>, severity: Severity, now: Instant) {
        self.items.push(Toast {
            message: message.into(),
            severity,
            created: now,
        });
    }

    /// Drop every toast older than [`TOAST_LIFETIME`]
    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|toast| !toast.is_expired(now));
    }

    pub fn active(&self) -> &[Toast] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toast_survives_until_lifetime_elapses() {
        let start = Instant::now();
        let mut toasts = Toasts::new();
        toasts.notify_at("saved", Severity::Success, start);

        toasts.prune(start + Duration::from_millis(3999));
        assert_eq!(toasts.len(), 1);

        toasts.prune(start + TOAST_LIFETIME);
        assert!(toasts.is_empty());
    }

    #[test]
    fn prune_only_removes_expired_toasts() {
        let start = Instant::now();
        let mut toasts = Toasts::new();
        toasts.notify_at("first", Severity::Info, start);
        toasts.notify_at("second", Severity::Error, start + Duration::from_secs(2));

        toasts.prune(start + Duration::from_secs(5));

        let remaining: Vec<&str> = toasts.active().iter().map(|t| t.message.as_str()).collect();
        assert_eq!(remaining, vec!["second"]);
    }

    #[test]
    fn no_stacking_limit() {
        let mut toasts = Toasts::new();
        for i in 0..20 {
            toasts.notify(format!("toast {}", i), Severity::Info);
        }
        assert_eq!(toasts.len(), 20);
    }
}
