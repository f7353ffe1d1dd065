//! Carrier Messaging Configuration
//!
//! Per-transaction snapshots of the effective carrier messaging parameters
//! and the APN used for the direct delivery path. A snapshot is taken by the
//! queue layer when the transaction is created and stays immutable for the
//! transaction's lifetime.

use crate::transport::ProxyConfig;

/// Default maximum payload size for an outbound message, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 300 * 1024;

/// Carrier messaging parameters, snapshotted per transaction.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    /// Maximum payload size in bytes accepted for an outbound message.
    pub max_message_size: usize,
    /// Package name of a registered carrier delivery service, if any.
    ///
    /// When set and a carrier channel is available, the engine offers the
    /// transaction to the carrier service before trying the direct path.
    pub carrier_app: Option<String>,
    /// User agent reported by the direct transport.
    pub user_agent: String,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        CarrierConfig {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            carrier_app: None,
            user_agent: format!(
                "Courier/{}",
                option_env!("CARGO_PKG_VERSION").unwrap_or("0.1.0")
            ),
        }
    }
}

impl CarrierConfig {
    /// Creates a config that routes through the named carrier delivery
    /// service before falling back to the direct path.
    pub fn with_carrier_app(package: &str) -> Self {
        CarrierConfig {
            carrier_app: Some(package.to_string()),
            ..Default::default()
        }
    }
}

/// APN connection parameters for the direct delivery path.
#[derive(Debug, Clone)]
pub struct ApnSettings {
    /// MMSC URL used when the transaction carries no explicit destination.
    pub mmsc_url: String,
    /// Proxy the transport must go through, if the APN defines one.
    pub proxy: ProxyConfig,
}

impl ApnSettings {
    /// Creates APN settings with a direct (proxyless) connection.
    pub fn new(mmsc_url: &str) -> Self {
        ApnSettings {
            mmsc_url: mmsc_url.to_string(),
            proxy: ProxyConfig::None,
        }
    }

    /// Creates APN settings with a proxy.
    pub fn with_proxy(mmsc_url: &str, proxy: ProxyConfig) -> Self {
        ApnSettings {
            mmsc_url: mmsc_url.to_string(),
            proxy,
        }
    }

    /// Returns true if the APN defines a proxy.
    pub fn is_proxy_set(&self) -> bool {
        self.proxy != ProxyConfig::None
    }
}
