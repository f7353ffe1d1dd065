//! HTTP Transport
//!
//! reqwest-backed implementation of the direct delivery path. A client is
//! built per transfer because the proxy comes from the transaction's APN
//! snapshot and can differ between transactions.

use tracing::debug;

use super::{Method, ProxyConfig, TransportClient, TransportError};
use crate::config::{ApnSettings, CarrierConfig};
use crate::transaction::TransactionId;

const CONTENT_TYPE_MMS: &str = "application/vnd.wap.mms-message";

/// Blocking HTTP transport for the direct delivery path.
#[derive(Debug, Default)]
pub struct HttpTransport;

impl HttpTransport {
    /// Creates a new HTTP transport.
    pub fn new() -> Self {
        HttpTransport
    }

    fn build_client(
        &self,
        apn: &ApnSettings,
        config: &CarrierConfig,
    ) -> Result<reqwest::blocking::Client, TransportError> {
        let mut builder =
            reqwest::blocking::Client::builder().user_agent(config.user_agent.clone());

        if let ProxyConfig::Http { host, port } = &apn.proxy {
            let proxy = reqwest::Proxy::all(format!("http://{host}:{port}"))
                .map_err(|e| TransportError::unavailable(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| TransportError::unavailable(e.to_string()))
    }
}

impl TransportClient for HttpTransport {
    fn transfer(
        &self,
        url: &str,
        body: Option<&[u8]>,
        method: Method,
        apn: &ApnSettings,
        config: &CarrierConfig,
        _subscription_id: i32,
        transaction_id: &TransactionId,
    ) -> Result<Vec<u8>, TransportError> {
        let client = self.build_client(apn, config)?;

        debug!(
            id = %transaction_id,
            method = method.as_str(),
            proxy = apn.is_proxy_set(),
            "starting direct transfer"
        );

        let request = match method {
            Method::Get => client.get(url),
            Method::Post => client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_MMS)
                .body(body.unwrap_or_default().to_vec()),
        };

        // A send error means the exchange never produced a status: DNS,
        // connect, or proxy failure. Reported as channel-unavailable.
        let response = request
            .send()
            .map_err(|e| TransportError::unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                status.as_u16(),
                format!("carrier network returned {status}"),
            ));
        }

        let data = response
            .bytes()
            .map_err(|e| TransportError::new(status.as_u16(), e.to_string()))?
            .to_vec();

        debug!(id = %transaction_id, bytes = data.len(), "direct transfer complete");
        Ok(data)
    }
}
