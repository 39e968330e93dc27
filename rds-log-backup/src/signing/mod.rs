//! Query-string request signing (AWS Signature Version 4).
//!
//! The RDS SDKs cannot stream a complete log file, so the download URL for
//! `downloadCompleteLogFile` is presigned here directly from HMAC-SHA256.
//! Every step is byte-exact: the remote verifier recomputes the same
//! canonical request and any difference produces a signature mismatch.
//!
//! Everything in this module is a pure function of its inputs.

pub mod credentials;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};

use crate::utils::{Result, SyncError};
pub use credentials::{AwsCredentialSource, CredentialSource, Credentials};

type HmacSha256 = Hmac<Sha256>;

/// Signing algorithm identifier.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Lifetime of a presigned download URL.
pub const EXPIRES_IN_SECONDS: u64 = 30;

/// Only the `host` header is signed for query-string authentication.
const SIGNED_HEADERS: &str = "host";

const SCOPE_TERMINATOR: &str = "aws4_request";

/// Everything except the RFC 3986 unreserved characters is escaped,
/// so a space becomes `%20` and never `+`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A presigned URL for a single GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub url: String,
    pub expires_in_seconds: u64,
}

/// Where signed requests are sent and how they are scoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub scheme: String,
    /// Host as sent in the `host` header, including a non-default port.
    pub host: String,
    pub region: String,
    pub service: String,
}

impl ServiceEndpoint {
    /// The public regional endpoint, e.g. `https://rds.eu-west-1.amazonaws.com`.
    pub fn for_region(region: &str, service: &str) -> Self {
        Self {
            scheme: "https".to_string(),
            host: format!("{}.{}.amazonaws.com", service, region),
            region: region.to_string(),
            service: service.to_string(),
        }
    }

    /// An explicit endpoint such as `http://localhost:4566`.
    pub fn from_url(url: &str, region: &str, service: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| SyncError::Config(format!("invalid endpoint '{}': {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| SyncError::Config(format!("endpoint '{}' has no host", url)))?;
        let host = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            scheme: parsed.scheme().to_string(),
            host,
            region: region.to_string(),
            service: service.to_string(),
        })
    }
}

/// Resource path of the complete-log-file download API, as sent on the wire.
///
/// Each segment is percent-encoded once; the `/` separators inside log file
/// names (`error/postgresql.log`) are kept.
pub fn download_path(instance_id: &str, filename: &str) -> String {
    format!(
        "/v13/downloadCompleteLogFile/{}/{}",
        encode_segments(instance_id),
        encode_segments(filename)
    )
}

/// Canonical URI of an already-encoded request path. Services other than
/// S3 sign the path encoded a second time, so `%20` becomes `%2520`.
pub fn canonical_uri(path: &str) -> String {
    encode_segments(path)
}

fn encode_segments(path: &str) -> String {
    path.split('/').map(encode_value).collect::<Vec<_>>().join("/")
}

/// Sign a GET of `canonical_path` on `host` and return the full query string,
/// ending in `&X-Amz-Signature=...`.
pub fn sign(
    credentials: &Credentials,
    region: &str,
    service: &str,
    host: &str,
    canonical_path: &str,
    timestamp: DateTime<Utc>,
) -> Result<String> {
    credentials.validate()?;

    let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();
    let date = timestamp.format("%Y%m%d").to_string();
    let scope = credential_scope(&date, region, service);

    let query = canonical_query_string(credentials, &scope, &amz_date);
    let request = canonical_request("GET", canonical_path, &query, host);
    let to_sign = string_to_sign(&amz_date, &scope, &request);

    let key = signing_key(credentials.secret_access_key(), &date, region, service);
    let signature = hex::encode(hmac_sha256(&key, to_sign.as_bytes()));

    Ok(format!("{}&X-Amz-Signature={}", query, signature))
}

/// Presign the download URL for one log file.
pub fn presign_download(
    credentials: &Credentials,
    endpoint: &ServiceEndpoint,
    instance_id: &str,
    filename: &str,
    timestamp: DateTime<Utc>,
) -> Result<SignedRequest> {
    let path = download_path(instance_id, filename);
    let query = sign(
        credentials,
        &endpoint.region,
        &endpoint.service,
        &endpoint.host,
        &canonical_uri(&path),
        timestamp,
    )?;

    Ok(SignedRequest {
        url: format!("{}://{}{}?{}", endpoint.scheme, endpoint.host, path, query),
        expires_in_seconds: EXPIRES_IN_SECONDS,
    })
}

pub(crate) fn credential_scope(date: &str, region: &str, service: &str) -> String {
    format!("{}/{}/{}/{}", date, region, service, SCOPE_TERMINATOR)
}

fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Parameters in ASCII name order. The security token sorts last.
pub(crate) fn canonical_query_string(
    credentials: &Credentials,
    scope: &str,
    amz_date: &str,
) -> String {
    let credential = format!("{}/{}", credentials.access_key_id(), scope);
    let mut query = format!(
        "X-Amz-Algorithm={}&X-Amz-Credential={}&X-Amz-Date={}&X-Amz-Expires={}&X-Amz-SignedHeaders={}",
        ALGORITHM,
        encode_value(&credential),
        amz_date,
        EXPIRES_IN_SECONDS,
        SIGNED_HEADERS,
    );
    if let Some(token) = credentials.session_token() {
        query.push_str("&X-Amz-Security-Token=");
        query.push_str(&encode_value(token));
    }
    query
}

/// The canonical headers block ends in `\n`, so a blank line precedes the
/// signed headers list.
pub(crate) fn canonical_request(method: &str, path: &str, query: &str, host: &str) -> String {
    let canonical_headers = format!("host:{}\n", host.trim());
    let payload_hash = hex::encode(Sha256::digest(b""));
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method, path, query, canonical_headers, SIGNED_HEADERS, payload_hash
    )
}

pub(crate) fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    let hashed = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    format!("{}\n{}\n{}\n{}", ALGORITHM, amz_date, scope, hashed)
}

/// Derive the date/region/service scoped key. Never cached: the date
/// component changes at midnight UTC.
pub(crate) fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, SCOPE_TERMINATOR.as_bytes())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
