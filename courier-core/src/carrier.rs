//! Carrier Delivery Channel
//!
//! A bound, asynchronous external service that can carry out a transaction
//! on the engine's behalf. Binding and job submission return immediately;
//! completion arrives later, off the calling thread, through a one-shot
//! callback. The engine depends only on these traits, never on the host's
//! service discovery or IPC mechanism.

use std::mem;
use std::sync::Mutex;

use tracing::error;

/// Status reported by the carrier channel for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierStatus {
    /// The carrier performed the transfer.
    Ok,
    /// The carrier declined or could not attempt the transfer; the direct
    /// path should be tried over the carrier network instead.
    RetryOnCarrierNetwork,
    /// The carrier attempted the transfer and it failed.
    Error,
}

/// Job handed to a bound carrier service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarrierJob {
    /// Deliver an outbound message.
    Send {
        /// Locator of the staged payload bytes.
        payload_locator: String,
        subscription_id: i32,
        /// Explicit destination, when the transaction carries one.
        destination_url: Option<String>,
    },
    /// Retrieve a pending inbound message.
    Download {
        /// Locator the retrieved bytes must be written to.
        target_locator: String,
        subscription_id: i32,
        /// Source of the pending message.
        location_url: String,
    },
}

/// Completion reported by the carrier service, exactly once per job.
///
/// The variant mirrors the job kind; a completion of the wrong kind is a
/// carrier-side programming error and is logged and ignored by the engine.
#[derive(Debug, Clone)]
pub enum CarrierOutcome {
    SendComplete {
        status: CarrierStatus,
        /// Raw send-confirmation bytes, when the carrier produced them.
        confirmation: Option<Vec<u8>>,
    },
    DownloadComplete {
        status: CarrierStatus,
    },
}

/// One-shot completion callback. Invoked exactly once per submitted job,
/// possibly from an arbitrary thread.
pub type CarrierCallback = Box<dyn FnOnce(CarrierOutcome) + Send + 'static>;

/// Factory for carrier service bindings.
pub trait CarrierChannel: Send + Sync {
    /// Creates a fresh, unbound binding handle.
    fn connect(&self) -> Box<dyn CarrierBinding>;
}

/// A single binding to a carrier delivery service.
pub trait CarrierBinding: Send {
    /// Binds to the named carrier delivery package.
    ///
    /// Returns `false` when binding cannot even be initiated; no job may be
    /// submitted in that case.
    fn bind(&mut self, package: &str) -> bool;

    /// Submits a job. The callback is invoked exactly once, possibly from
    /// another thread, with the job's outcome.
    fn submit(&mut self, job: CarrierJob, on_complete: CarrierCallback);

    /// Releases the binding. Safe to call even if `bind` failed.
    fn release(&mut self);
}

enum BindingSlot {
    /// Binding held and idle.
    Active(Box<dyn CarrierBinding>),
    /// Binding temporarily handed out to `submit`.
    InFlight,
    /// Release requested or performed.
    Released,
}

/// Transient per-execution wrapper around a live carrier binding.
///
/// The completion callback and the submitting context share this handle
/// across threads. Whichever exit path runs — success, failure, or bind
/// failure — calls [`ChannelAttempt::release`], and the underlying binding
/// is released exactly once. The carrier service may invoke the completion
/// callback synchronously from inside `submit`; the slot state keeps that
/// reentrant release from deadlocking or double-releasing.
pub struct ChannelAttempt {
    slot: Mutex<BindingSlot>,
}

impl ChannelAttempt {
    /// Wraps a fresh binding handle.
    pub fn new(binding: Box<dyn CarrierBinding>) -> Self {
        ChannelAttempt {
            slot: Mutex::new(BindingSlot::Active(binding)),
        }
    }

    /// Binds to the named carrier package.
    pub fn bind(&self, package: &str) -> bool {
        let mut slot = self.lock();
        match &mut *slot {
            BindingSlot::Active(binding) => binding.bind(package),
            _ => false,
        }
    }

    /// Submits a job on the bound service.
    pub fn submit(&self, job: CarrierJob, on_complete: CarrierCallback) {
        let mut binding = {
            let mut slot = self.lock();
            match mem::replace(&mut *slot, BindingSlot::InFlight) {
                BindingSlot::Active(binding) => binding,
                other => {
                    *slot = other;
                    error!("carrier job submitted without an active binding");
                    return;
                }
            }
        };

        // The callback may run before submit returns and request release;
        // the slot is re-checked afterwards so that request is honored here.
        binding.submit(job, on_complete);

        let mut slot = self.lock();
        if matches!(*slot, BindingSlot::Released) {
            binding.release();
        } else {
            *slot = BindingSlot::Active(binding);
        }
    }

    /// Releases the binding. Idempotent: later calls are no-ops.
    pub fn release(&self) {
        let taken = {
            let mut slot = self.lock();
            mem::replace(&mut *slot, BindingSlot::Released)
        };
        if let BindingSlot::Active(mut binding) = taken {
            binding.release();
        }
        // InFlight: the submitting context observes the Released slot and
        // performs the release itself.
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BindingSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}
