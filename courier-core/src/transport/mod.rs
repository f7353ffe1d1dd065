//! Direct Delivery Transport
//!
//! Platform-agnostic abstraction for the direct network exchange with the
//! carrier MMSC. The engine hands the transport a destination, an optional
//! payload, and the APN connection parameters; the transport returns raw
//! response bytes or fails with a status code.

#[cfg(feature = "transport-http")]
mod http;

#[cfg(feature = "transport-http")]
pub use http::HttpTransport;

use thiserror::Error;

use crate::config::{ApnSettings, CarrierConfig};
use crate::transaction::TransactionId;

/// HTTP method used for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Retrieval of a pending message, no request body.
    Get,
    /// Submission of an outbound payload.
    Post,
}

impl Method {
    /// Wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Proxy configuration for transport connections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProxyConfig {
    /// No proxy (direct connection).
    #[default]
    None,
    /// HTTP proxy, as defined by the APN.
    Http {
        /// Proxy host address.
        host: String,
        /// Proxy port.
        port: u16,
    },
}

impl ProxyConfig {
    /// Creates an HTTP proxy config.
    pub fn http(host: &str, port: u16) -> Self {
        ProxyConfig::Http {
            host: host.to_string(),
            port,
        }
    }
}

/// Transfer failure reported by the transport.
///
/// A status code of zero means the channel itself was unavailable and no
/// exchange was attempted; any other value is the status the network
/// returned for an attempted exchange.
#[derive(Error, Debug, Clone)]
#[error("Transfer failed with status {status_code}: {message}")]
pub struct TransportError {
    pub status_code: u16,
    pub message: String,
}

impl TransportError {
    /// Creates a transfer failure with the status the network returned.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        TransportError {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a zero-status failure: the channel was not available.
    pub fn unavailable(message: impl Into<String>) -> Self {
        TransportError {
            status_code: 0,
            message: message.into(),
        }
    }
}

/// Transport client for the direct delivery path.
///
/// Implementations perform one blocking exchange per call. The engine never
/// retries a failed transfer; retry is the outer queue's concern.
pub trait TransportClient: Send + Sync {
    /// Performs one exchange with the carrier network.
    ///
    /// `body` is `Some` for an outbound submission and `None` for a
    /// retrieval. Returns the raw response bytes on success.
    #[allow(clippy::too_many_arguments)]
    fn transfer(
        &self,
        url: &str,
        body: Option<&[u8]>,
        method: Method,
        apn: &ApnSettings,
        config: &CarrierConfig,
        subscription_id: i32,
        transaction_id: &TransactionId,
    ) -> Result<Vec<u8>, TransportError>;
}
