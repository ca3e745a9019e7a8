//! HTTP webhook transport

use std::time::Duration;

use async_trait::async_trait;
use domain_claims::{DeliveryError, WebhookRequest, WebhookTransport};
use reqwest::header::AUTHORIZATION;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers webhooks over HTTPS with a bounded request timeout.
pub struct HttpWebhookTransport {
    client: reqwest::Client,
}

impl HttpWebhookTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn deliver(&self, request: &WebhookRequest) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&request.url)
            .header(AUTHORIZATION, &request.authorization)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| DeliveryError { retryable: true, message: e.to_string() })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            // The endpoint answered: 5xx is worth another try, 4xx is not.
            Err(DeliveryError {
                retryable: status.is_server_error(),
                message: format!("endpoint answered {status}"),
            })
        }
    }
}
