//! Messaging Policy Seams
//!
//! Number rewriting and classification, persistence permission, and the
//! scoped caller-identity elevation used around store writes. All of these
//! are host services; the engine only consumes them.

/// Carrier-specific phone number policy.
pub trait NumberPolicy: Send + Sync {
    /// Applies assisted-dialing normalization to a destination address.
    ///
    /// Returns `Some(rewritten)` when the address must change for the
    /// current network, `None` when it is already in the right form.
    fn rewrite(&self, subscription_id: i32, address: &str) -> Option<String>;

    /// Whether the address is classified as an emergency number.
    fn is_emergency(&self, subscription_id: i32, address: &str) -> bool;
}

/// Contact-restriction subsystem notified when an emergency number is
/// messaged. Runs off the critical path; the engine discards any failure.
pub trait EmergencyContactNotifier: Send + Sync {
    fn notify_emergency_contact(&self);
}

/// Persistence gating decided by the host.
pub trait PersistPolicy: Send + Sync {
    /// Whether the caller opted into automatic persistence.
    fn auto_persist(&self) -> bool;

    /// Whether the creator may write messages on behalf of the calling
    /// user.
    fn can_write_messages(&self, creator: &str, calling_user: i32) -> bool;
}

/// Caller-identity elevation for writes to the shared store.
///
/// `clear_calling_identity` returns a token that must be passed back to
/// `restore_calling_identity` exactly once. Use [`ElevatedIdentity`] rather
/// than calling these directly.
pub trait IdentityScope: Send + Sync {
    fn clear_calling_identity(&self) -> u64;
    fn restore_calling_identity(&self, token: u64);
}

/// Scoped identity elevation. Restores the caller identity on drop, on
/// every exit path.
pub struct ElevatedIdentity<'a> {
    scope: &'a dyn IdentityScope,
    token: u64,
}

impl<'a> ElevatedIdentity<'a> {
    /// Clears the calling identity for the lifetime of the guard.
    pub fn enter(scope: &'a dyn IdentityScope) -> Self {
        let token = scope.clear_calling_identity();
        ElevatedIdentity { scope, token }
    }
}

impl Drop for ElevatedIdentity<'_> {
    fn drop(&mut self) {
        self.scope.restore_calling_identity(self.token);
    }
}
