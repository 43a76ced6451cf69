//! ACS3-HMAC-SHA256 request signing
//!
//! Reference: <https://www.alibabacloud.com/help/en/sdk/product-overview/v3-request-structure-and-signature>

use std::collections::BTreeMap;

use ddns_core::http::percent_encode;
use ddns_core::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

pub(crate) const ALGORITHM: &str = "ACS3-HMAC-SHA256";

/// SHA256 of an empty body
pub(crate) const EMPTY_BODY_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const SIGNED_HEADERS: &str =
    "host;x-acs-action;x-acs-content-sha256;x-acs-date;x-acs-signature-nonce;x-acs-version";

/// Per-request values that enter the signature
#[derive(Debug, Clone, Copy)]
pub(crate) struct SigningInput<'a> {
    pub host: &'a str,
    pub action: &'a str,
    pub version: &'a str,
    pub timestamp: &'a str,
    pub nonce: &'a str,
}

/// Canonical query string: keys sorted, both sides encoded
pub(crate) fn canonical_query(params: &BTreeMap<&str, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| Error::provider("AliDNS", format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Build the `Authorization` header for an RPC-style POST with an empty body
pub(crate) fn authorization(
    access_key_id: &str,
    access_key_secret: &str,
    query: &str,
    input: &SigningInput<'_>,
) -> Result<String> {
    let canonical_headers = format!(
        "host:{}\nx-acs-action:{}\nx-acs-content-sha256:{}\nx-acs-date:{}\nx-acs-signature-nonce:{}\nx-acs-version:{}\n",
        input.host, input.action, EMPTY_BODY_SHA256, input.timestamp, input.nonce, input.version
    );

    let canonical_request = format!(
        "POST\n/\n{}\n{}\n{}\n{}",
        query, canonical_headers, SIGNED_HEADERS, EMPTY_BODY_SHA256
    );
    tracing::trace!("AliDNS canonical request:\n{}", canonical_request);

    let hashed = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    let string_to_sign = format!("{}\n{}", ALGORITHM, hashed);

    let signature = hex::encode(hmac_sha256(
        access_key_secret.as_bytes(),
        string_to_sign.as_bytes(),
    )?);

    Ok(format!(
        "{} Credential={},SignedHeaders={},Signature={}",
        ALGORITHM, access_key_id, SIGNED_HEADERS, signature
    ))
}
