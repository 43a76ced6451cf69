//! Client side of the center relay

use async_trait::async_trait;
use std::fmt;

use crate::address::{Enable, ResolvedAddress};
use crate::error::{Error, Result};
use crate::relay::{CenterRequest, GeneralResponse};

/// Submits a resolved address pair to a center
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Send one report and return the center's summary lines
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Non-empty lines of the returned message
    /// - `Err(Error)`: Transport failure or a non-200 status
    async fn submit(&self, enable: Enable, address: &ResolvedAddress) -> Result<Vec<String>>;
}

/// HTTP [`RelayClient`] posting JSON to `center.api_url`
pub struct CenterClient {
    api_url: String,
    token: String,
    client: reqwest::Client,
}

impl fmt::Debug for CenterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CenterClient")
            .field("api_url", &self.api_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl CenterClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_url: api_url.into(),
            token: token.into(),
            client,
        }
    }
}

#[async_trait]
impl RelayClient for CenterClient {
    async fn submit(&self, enable: Enable, address: &ResolvedAddress) -> Result<Vec<String>> {
        let body = CenterRequest {
            token: self.token.clone(),
            enable,
            ip: address.clone(),
        };

        let response = self.client.post(&self.api_url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(format!(
                "The status code returned by the center is {}",
                status.as_u16()
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        let reply: GeneralResponse = serde_json::from_slice(&bytes)?;

        Ok(split_message(&reply.message))
    }
}

fn split_message(message: &str) -> Vec<String> {
    message
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
