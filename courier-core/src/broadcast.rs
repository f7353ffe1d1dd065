//! Download Broadcast
//!
//! Multi-audience notification that an inbound message finished
//! downloading. The broadcast goes to every currently-active user context
//! except secondary contexts that are restricted from messaging or are
//! managed profiles; it fires regardless of whether persistence is enabled,
//! because listeners other than the store need to know a download
//! completed.

use tracing::debug;

/// Event tag dispatched to each eligible audience context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastEvent {
    MessageDownloaded,
}

/// One active user context that may receive broadcasts.
#[derive(Debug, Clone)]
pub struct AudienceContext {
    pub user_id: i32,
    /// The primary context always receives messaging broadcasts.
    pub primary: bool,
    /// User policy forbids messaging for this context.
    pub restricted_from_messaging: bool,
    /// Managed work profiles do not receive messaging broadcasts.
    pub managed_profile: bool,
}

/// Host directory of active user contexts.
pub trait AudienceDirectory: Send + Sync {
    /// Enumerates the currently-active user contexts.
    fn active_contexts(&self) -> Vec<AudienceContext>;

    /// Dispatches an event to one context.
    fn dispatch(&self, context: &AudienceContext, event: BroadcastEvent);
}

/// Dispatches an event to every eligible active context.
pub fn notify_all_eligible(directory: &dyn AudienceDirectory, event: BroadcastEvent) {
    for context in directory.active_contexts() {
        if !context.primary && (context.restricted_from_messaging || context.managed_profile) {
            debug!(user = context.user_id, "skipping restricted audience context");
            continue;
        }
        directory.dispatch(&context, event);
    }
}
