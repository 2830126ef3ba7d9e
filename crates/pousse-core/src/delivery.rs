//! Callback delivery over HTTP

use crate::task::DeliveryEnvelope;

/// Header carrying the shared secret so the callback application can
/// authenticate requests from the dispatcher.
pub const AUTH_HEADER: &str = "Poussetaches-Auth-Key";

/// Synthetic status recorded when the transport itself failed (DNS,
/// connect, TLS, body read) and no HTTP response was obtained.
pub const TRANSPORT_FAILURE_STATUS: i32 = -1;

/// How a single delivery attempt settled.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The callback answered with the task's expected status.
    Delivered,
    /// Anything else: the actual status plus the full response body, or
    /// [`TRANSPORT_FAILURE_STATUS`] with the error text.
    Rejected { status: i32, body: Vec<u8> },
}

/// HTTP client used by the workers. One instance (and one connection pool)
/// is shared by the whole pool.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    http: reqwest::Client,
    auth_key: String,
}

impl DeliveryClient {
    pub fn new(auth_key: String) -> Self {
        Self { http: reqwest::Client::new(), auth_key }
    }

    /// POST the envelope to the callback and classify the outcome against
    /// the expected status. The body is read fully before classification.
    pub async fn post(
        &self,
        url: &str,
        expected: i32,
        envelope: &DeliveryEnvelope,
    ) -> DeliveryOutcome {
        let response = self
            .http
            .post(url)
            .header(AUTH_HEADER, &self.auth_key)
            .json(envelope)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                return DeliveryOutcome::Rejected {
                    status: TRANSPORT_FAILURE_STATUS,
                    body: e.to_string().into_bytes(),
                }
            }
        };

        let status = response.status().as_u16() as i32;
        let body = match response.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => {
                return DeliveryOutcome::Rejected {
                    status: TRANSPORT_FAILURE_STATUS,
                    body: e.to_string().into_bytes(),
                }
            }
        };

        if status == expected {
            DeliveryOutcome::Delivered
        } else {
            DeliveryOutcome::Rejected { status, body }
        }
    }
}
