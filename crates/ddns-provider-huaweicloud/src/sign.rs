//! SDK-HMAC-SHA256 request signing
//!
//! Reference: <https://support.huaweicloud.com/intl/en-us/devg-apisign/api-sign-algorithm-005.html>

use ddns_core::http::percent_encode;
use ddns_core::{Error, Result};
use std::fmt::Write;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

pub(crate) const ALGORITHM: &str = "SDK-HMAC-SHA256";

/// A request as it enters the signature
#[derive(Debug, Clone)]
pub(crate) struct CanonicalRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a [(&'a str, String)],
    pub headers: &'a [(&'a str, String)],
    pub payload: &'a str,
}

/// Query string with parameters sorted by name
pub(crate) fn canonical_query(query: &[(&str, String)]) -> String {
    let mut pairs: Vec<String> = query
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect();
    pairs.sort_unstable();
    pairs.join("&")
}

impl CanonicalRequest<'_> {
    fn signed_headers(&self) -> String {
        let mut names: Vec<String> = self.headers.iter().map(|(k, _)| k.to_lowercase()).collect();
        names.sort_unstable();
        names.join(";")
    }

    fn render(&self) -> String {
        let uri = if self.path.ends_with('/') {
            self.path.to_string()
        } else {
            format!("{}/", self.path)
        };

        let mut headers: Vec<(String, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.trim()))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));
        let canonical_headers = headers.iter().fold(String::new(), |mut acc, (k, v)| {
            let _ = writeln!(acc, "{}:{}", k, v);
            acc
        });

        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            uri,
            canonical_query(self.query),
            canonical_headers,
            self.signed_headers(),
            hex::encode(Sha256::digest(self.payload.as_bytes()))
        )
    }
}

/// Build the `Authorization` header; `timestamp` must equal the `X-Sdk-Date` header
pub(crate) fn authorization(
    access_key_id: &str,
    secret_access_key: &str,
    request: &CanonicalRequest<'_>,
    timestamp: &str,
) -> Result<String> {
    let canonical_request = request.render();
    tracing::trace!("Huawei Cloud canonical request:\n{}", canonical_request);

    let string_to_sign = format!(
        "{}\n{}\n{}",
        ALGORITHM,
        timestamp,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(secret_access_key.as_bytes())
        .map_err(|e| Error::provider("HuaweiCloud", format!("invalid signing key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(format!(
        "{} Access={}, SignedHeaders={}, Signature={}",
        ALGORITHM,
        access_key_id,
        request.signed_headers(),
        signature
    ))
}
