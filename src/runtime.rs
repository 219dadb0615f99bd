//! Shared runtime context.
//!
//! Event-loop registration is a process-wide resource of the transport.
//! [`RuntimeContext`] counts the clients that have announced interest in it
//! and touches the registration only on the transitions:
//!
//! - `acquire` on `0 -> 1` calls `register_event_loop`
//! - `release` on `1 -> 0` calls `deregister_event_loop`
//!
//! Every other acquire/release is bookkeeping only. The context also holds
//! the default [`CallbackHandler`] for clients that do not override it.
//!
//! Clients use [`RuntimeContext::global`] unless given their own context.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::callback::CallbackHandler;
use crate::transport::Transport;

static GLOBAL: OnceLock<Arc<RuntimeContext>> = OnceLock::new();

const HANDLER_DEFAULT: u8 = 0;
const HANDLER_LEGACY: u8 = 1;

/// Active-client count and default callback convention.
#[derive(Debug, Default)]
pub struct RuntimeContext {
    /// Clients that acquired and have not released.
    active: AtomicUsize,
    /// Serializes transitions so the hooks run once per crossing.
    transitions: Mutex<()>,
    /// Default callback handler.
    handler: AtomicU8,
}

impl RuntimeContext {
    /// Create an independent context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide context.
    pub fn global() -> Arc<RuntimeContext> {
        GLOBAL.get_or_init(|| Arc::new(RuntimeContext::new())).clone()
    }

    /// Count one more active client; register the event loop on `0 -> 1`.
    pub fn acquire(&self, transport: &dyn Transport) {
        let _guard = self.transitions.lock().unwrap_or_else(|e| e.into_inner());
        let previous = self.active.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
            tracing::debug!("registering event loop");
            transport.register_event_loop();
        }
    }

    /// Count one less active client; deregister the event loop on `1 -> 0`.
    ///
    /// Each release must pair with an earlier acquire. An unpaired release
    /// is ignored; the count never goes negative.
    pub fn release(&self, transport: &dyn Transport) {
        let _guard = self.transitions.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.active.load(Ordering::Acquire);
        if current == 0 {
            tracing::warn!("release without matching acquire");
            return;
        }
        self.active.store(current - 1, Ordering::Release);
        if current == 1 {
            tracing::debug!("deregistering event loop");
            transport.deregister_event_loop();
        }
    }

    /// Number of active clients.
    #[inline]
    pub fn active_clients(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Default callback handler.
    pub fn callback_handler(&self) -> CallbackHandler {
        match self.handler.load(Ordering::Acquire) {
            HANDLER_LEGACY => CallbackHandler::Legacy,
            _ => CallbackHandler::Default,
        }
    }

    /// Replace the default callback handler.
    ///
    /// Commands read the handler when they are issued; commands already in
    /// flight keep the one they started with.
    pub fn set_callback_handler(&self, handler: CallbackHandler) {
        let raw = match handler {
            CallbackHandler::Default => HANDLER_DEFAULT,
            CallbackHandler::Legacy => HANDLER_LEGACY,
        };
        self.handler.store(raw, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_registers_only_on_first_acquire() {
        let ctx = RuntimeContext::new();
        let transport = MemoryTransport::new();

        ctx.acquire(&transport);
        ctx.acquire(&transport);
        ctx.acquire(&transport);
        assert_eq!(ctx.active_clients(), 3);
        assert_eq!(transport.registrations(), 1);
        assert!(transport.event_loop_registered());
    }

    #[test]
    fn test_deregisters_only_on_last_release() {
        let ctx = RuntimeContext::new();
        let transport = MemoryTransport::new();

        ctx.acquire(&transport);
        ctx.acquire(&transport);
        ctx.release(&transport);
        assert_eq!(transport.deregistrations(), 0);
        assert!(transport.event_loop_registered());

        ctx.release(&transport);
        assert_eq!(transport.deregistrations(), 1);
        assert!(!transport.event_loop_registered());
        assert_eq!(ctx.active_clients(), 0);
    }

    #[test]
    fn test_unpaired_release_never_goes_negative() {
        let ctx = RuntimeContext::new();
        let transport = MemoryTransport::new();

        ctx.release(&transport);
        assert_eq!(ctx.active_clients(), 0);
        assert_eq!(transport.deregistrations(), 0);
    }

    #[test]
    fn test_reregisters_after_full_release() {
        let ctx = RuntimeContext::new();
        let transport = MemoryTransport::new();

        ctx.acquire(&transport);
        ctx.release(&transport);
        ctx.acquire(&transport);
        assert_eq!(transport.registrations(), 2);
        assert_eq!(transport.deregistrations(), 1);
    }

    #[test]
    fn test_callback_handler_swap() {
        let ctx = RuntimeContext::new();
        assert_eq!(ctx.callback_handler(), CallbackHandler::Default);
        ctx.set_callback_handler(CallbackHandler::Legacy);
        assert_eq!(ctx.callback_handler(), CallbackHandler::Legacy);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&RuntimeContext::global(), &RuntimeContext::global()));
    }
}
