//! Bounded audit event delivery. Enqueue never blocks the request path;
//! a single cooperative task drains the queue and calls the caller's hook,
//! the way `devolutions-gateway`'s subscriber task drains its own event
//! channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use peac_task::{ShutdownSignal, Task};

pub const MAX_PENDING_AUDIT_EVENTS: usize = 1000;
pub const SCHEMA_VERSION: &str = "peac-safe-fetch-event/0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    DnsStart,
    DnsResult,
    ConnectStart,
    ResponseHeaders,
    Redirect,
    PolicyBlock,
    AuditOverflow,
    AuditHookError,
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub timestamp: i64,
    pub url: String,
    pub meta: Option<Value>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, url: impl Into<String>, meta: Option<Value>) -> Self {
        Self { event_type, timestamp: time::OffsetDateTime::now_utc().unix_timestamp(), url: url.into(), meta }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "schema_version": SCHEMA_VERSION,
            "type": self.event_type,
            "timestamp": self.timestamp,
            "url": self.url,
            "meta": self.meta,
        })
    }
}

/// Caller-supplied delivery sink. Errors are swallowed by the queue per the
/// spec's "internal errors never propagate to the request path" rule, but
/// trigger exactly one `audit_hook_error` event.
#[async_trait]
pub trait AuditHook: Send + Sync {
    async fn on_event(&self, event: AuditEvent) -> Result<(), String>;
}

/// No-op hook, useful when the caller doesn't care about audit delivery.
pub struct NullHook;

#[async_trait]
impl AuditHook for NullHook {
    async fn on_event(&self, _event: AuditEvent) -> Result<(), String> {
        Ok(())
    }
}

const MAX_ERROR_MESSAGE_LEN: usize = 200;

fn sanitize_error_message(msg: &str) -> String {
    let mut sanitized = msg.to_owned();
    for pattern in ["Bearer ", "bearer ", "key=", "password="] {
        if let Some(idx) = sanitized.find(pattern) {
            let end = sanitized[idx..]
                .find(|c: char| c.is_whitespace() || c == '&')
                .map_or(sanitized.len(), |rel| idx + rel);
            sanitized.replace_range(idx..end, "[REDACTED]");
        }
    }
    if sanitized.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = sanitized.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        return format!("{truncated}...");
    }
    sanitized
}

#[derive(Debug, Default)]
pub struct AuditStats {
    pending: AtomicU64,
    dropped: AtomicU64,
    hook_error_emitted: std::sync::atomic::AtomicBool,
}

impl AuditStats {
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Bounded FIFO handle shared between request tasks (producers) and the
/// single drain task (consumer).
pub struct AuditQueue {
    sender: mpsc::Sender<AuditEvent>,
    stats: Arc<AuditStats>,
}

impl AuditQueue {
    /// Creates the queue plus the drain task body. The caller is
    /// responsible for spawning the returned [`AuditDrain`] under a
    /// [`peac_task::ShutdownSignal`].
    pub fn new(hook: Arc<dyn AuditHook>) -> (Self, AuditDrain) {
        let (sender, receiver) = mpsc::channel(MAX_PENDING_AUDIT_EVENTS);
        let stats = Arc::new(AuditStats::default());
        let queue = Self { sender, stats: Arc::clone(&stats) };
        let drain = AuditDrain { receiver, hook, stats };
        (queue, drain)
    }

    pub fn stats(&self) -> Arc<AuditStats> {
        Arc::clone(&self.stats)
    }

    /// Enqueues `event`, or on overflow emits a synthetic `audit_overflow`
    /// event that bypasses the queue entirely and increments `dropped`.
    /// Never blocks the request path.
    pub fn emit(&self, event: AuditEvent) {
        self.stats.pending.fetch_add(1, Ordering::SeqCst);
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(_) => {
                self.stats.pending.fetch_sub(1, Ordering::SeqCst);
                self.stats.dropped.fetch_add(1, Ordering::SeqCst);
                let overflow = AuditEvent::new(AuditEventType::AuditOverflow, "", None);
                // Best-effort direct delivery; if the channel is also full for this one,
                // it's simply dropped too — there is no further fallback to recurse into.
                let _ = self.sender.try_send(overflow);
            }
        }
    }
}

/// The consumer half: drains events and calls the hook, one at a time, in
/// enqueue order.
pub struct AuditDrain {
    receiver: mpsc::Receiver<AuditEvent>,
    hook: Arc<dyn AuditHook>,
    stats: Arc<AuditStats>,
}

#[async_trait]
impl Task for AuditDrain {
    type Output = ();
    const NAME: &'static str = "audit-drain";

    async fn run(mut self, mut shutdown_signal: ShutdownSignal) {
        loop {
            tokio::select! {
                _ = shutdown_signal.wait() => break,
                event = self.receiver.recv() => {
                    let Some(event) = event else { break };
                    self.deliver(event).await;
                }
            }
        }
    }
}

impl AuditDrain {
    async fn deliver(&mut self, event: AuditEvent) {
        let is_overflow = matches!(event.event_type, AuditEventType::AuditOverflow);
        let url = event.url.clone();
        let result = self.hook.on_event(event).await;
        self.stats.pending.fetch_sub(1, Ordering::SeqCst);

        if let Err(err) = result {
            // At most one audit_hook_error is ever emitted per failing delivery;
            // if delivering *that* event also fails we just count the
            // suppression and stop, never recursing into another attempt.
            let already_emitted = self.stats.hook_error_emitted.swap(true, Ordering::SeqCst);
            if already_emitted || is_overflow {
                return;
            }
            let sanitized = sanitize_error_message(&err);
            let hook_error = AuditEvent::new(
                AuditEventType::AuditHookError,
                url,
                Some(json!({ "error": sanitized })),
            );
            if self.hook.on_event(hook_error).await.is_err() {
                self.stats.dropped.fetch_add(1, Ordering::SeqCst);
            }
            self.stats.hook_error_emitted.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingHook {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditHook for RecordingHook {
        async fn on_event(&self, event: AuditEvent) -> Result<(), String> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct FailingHook;

    #[async_trait]
    impl AuditHook for FailingHook {
        async fn on_event(&self, _event: AuditEvent) -> Result<(), String> {
            Err("Bearer secret-token-abc leaked here".to_owned())
        }
    }

    #[tokio::test]
    async fn delivers_events_in_enqueue_order() {
        let hook = Arc::new(RecordingHook { events: Mutex::new(Vec::new()) });
        let (queue, drain) = AuditQueue::new(hook.clone());
        let (shutdown_handle, shutdown_signal) = peac_task::ShutdownHandle::new();

        queue.emit(AuditEvent::new(AuditEventType::DnsStart, "https://a/", None));
        queue.emit(AuditEvent::new(AuditEventType::DnsResult, "https://a/", None));

        let task = tokio::spawn(drain.run(shutdown_signal));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown_handle.signal();
        let _ = task.await;

        let events = hook.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::DnsStart);
        assert_eq!(events[1].event_type, AuditEventType::DnsResult);
    }

    #[test]
    fn sanitizes_bearer_token_and_truncates() {
        let long_tail = "x".repeat(400);
        let msg = format!("Bearer abc123 failed: {long_tail}");
        let sanitized = sanitize_error_message(&msg);
        assert!(!sanitized.contains("abc123"));
        assert!(sanitized.ends_with("..."));
        assert!(sanitized.chars().count() <= MAX_ERROR_MESSAGE_LEN + 3);
    }

    #[tokio::test]
    async fn hook_error_emits_exactly_one_followup_event_without_recursion() {
        let hook = Arc::new(FailingHook);
        let (queue, drain) = AuditQueue::new(hook);
        let (shutdown_handle, shutdown_signal) = peac_task::ShutdownHandle::new();

        queue.emit(AuditEvent::new(AuditEventType::DnsStart, "https://a/", None));

        let task = tokio::spawn(drain.run(shutdown_signal));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown_handle.signal();
        let _ = task.await;
        // No panic, no infinite loop: reaching this line is the assertion.
    }

    #[test]
    fn overflow_increments_dropped_without_blocking() {
        let hook = Arc::new(NullHook);
        let (queue, _drain) = AuditQueue::new(hook);
        let stats = queue.stats();
        for _ in 0..(MAX_PENDING_AUDIT_EVENTS + 5) {
            queue.emit(AuditEvent::new(AuditEventType::DnsStart, "https://a/", None));
        }
        assert!(stats.dropped() > 0);
    }
}
