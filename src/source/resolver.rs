//! Loading PDF bytes from files, inline base64, and URLs

use crate::error::{Error, Result};
use crate::pdf::validate_pdf_header;
use base64::Engine;
use futures_util::StreamExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Where a PDF comes from
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// Local file path
    Path { path: String },
    /// Base64 encoded PDF, optionally as a `data:` URL
    Base64 { base64: String },
    /// HTTP(S) URL to download
    Url { url: String },
}

const SOURCE_KEYS: &str = "\"path\", \"base64\", or \"url\"";

// Errors name the accepted keys
impl<'de> Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of {}",
                SOURCE_KEYS
            )));
        };

        let string_field = |key: &str| -> std::result::Result<Option<String>, D::Error> {
            match obj.get(key) {
                None => Ok(None),
                Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(serde::de::Error::custom(format!(
                    "\"{}\" must be a string",
                    key
                ))),
            }
        };

        if let Some(path) = string_field("path")? {
            return Ok(PdfSource::Path { path });
        }
        if let Some(base64) = string_field("base64")? {
            return Ok(PdfSource::Base64 { base64 });
        }
        if let Some(url) = string_field("url")? {
            return Ok(PdfSource::Url { url });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected one of {}, got keys: {:?}",
            SOURCE_KEYS, keys
        )))
    }
}

/// Rules for fetching remote documents
#[derive(Debug, Clone, Copy)]
pub struct UrlPolicy {
    pub allow_private_urls: bool,
    pub max_download_bytes: u64,
    pub timeout: Duration,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            allow_private_urls: false,
            max_download_bytes: 100 * 1024 * 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

/// PDF bytes plus a display name for logs and results
#[derive(Debug)]
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    pub source_name: String,
}

impl PdfSource {
    /// Name used in results without touching the source
    pub fn name(&self) -> String {
        match self {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
            PdfSource::Url { url } => url.clone(),
        }
    }
}

/// Read a PDF from disk
pub fn resolve_path<P: AsRef<Path>>(path: P) -> Result<ResolvedPdf> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path)?;
    validate_pdf_header(&data)?;

    Ok(ResolvedPdf {
        data,
        source_name: path.display().to_string(),
    })
}

/// Decode an inline PDF, with or without a `data:` URL prefix
pub fn resolve_base64(encoded: &str) -> Result<ResolvedPdf> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    let data = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    validate_pdf_header(&data)?;

    Ok(ResolvedPdf {
        data,
        source_name: "<base64>".to_string(),
    })
}

/// Loopback, private, link-local, CGNAT, and unspecified addresses
fn is_internal_address(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (a == 100 && (b & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFE00) == 0xFC00
                || (first & 0xFFC0) == 0xFE80
        }
    }
}

/// Every address the host resolves to must be public
async fn ensure_public_host(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| Error::SourceResolution {
        reason: format!("Invalid URL: {}", e),
    })?;
    let host = parsed.host_str().ok_or_else(|| Error::SourceResolution {
        reason: "URL has no host".to_string(),
    })?;
    let port = parsed.port_or_known_default().unwrap_or(443);

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::SourceResolution {
            reason: format!("DNS resolution failed for {}: {}", host, e),
        })?;

    for addr in addrs {
        if is_internal_address(&addr.ip()) {
            return Err(Error::SsrfBlocked {
                url: url.to_string(),
            });
        }
    }
    Ok(())
}

/// Download a PDF, enforcing the policy's host and size limits
pub async fn resolve_url(url: &str, policy: &UrlPolicy) -> Result<ResolvedPdf> {
    if !policy.allow_private_urls {
        ensure_public_host(url).await?;
    }

    let client = reqwest::Client::builder().timeout(policy.timeout).build()?;
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(Error::SourceResolution {
            reason: format!("HTTP request failed with status: {}", response.status()),
        });
    }

    let too_large = |size: u64| Error::DownloadTooLarge {
        size,
        max_size: policy.max_download_bytes,
    };

    if let Some(length) = response.content_length() {
        if length > policy.max_download_bytes {
            return Err(too_large(length));
        }
    }

    // Content-Length may be absent or wrong; count while streaming
    let mut data = Vec::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        data.extend_from_slice(&chunk?);
        if data.len() as u64 > policy.max_download_bytes {
            return Err(too_large(data.len() as u64));
        }
    }

    validate_pdf_header(&data)?;
    tracing::debug!(url, bytes = data.len(), "downloaded PDF");

    Ok(ResolvedPdf {
        data,
        source_name: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TINY_PDF_B64: &str = "JVBERi0xLjQK"; // "%PDF-1.4\n"

    #[test]
    fn test_base64_not_a_pdf() {
        let result = resolve_base64("SGVsbG8gV29ybGQ="); // "Hello World"
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_base64_malformed() {
        let result = resolve_base64("not valid base64!!!");
        assert!(matches!(result, Err(Error::Base64Decode(_))));
    }

    #[test]
    fn test_base64_plain_and_data_url() {
        let plain = resolve_base64(TINY_PDF_B64).unwrap();
        assert_eq!(plain.data, b"%PDF-1.4\n");

        let data_url = resolve_base64(&format!("data:application/pdf;base64,{}", TINY_PDF_B64))
            .unwrap();
        assert_eq!(data_url.data, plain.data);
        assert_eq!(data_url.source_name, "<base64>");
    }

    #[test]
    fn test_path_not_found() {
        let result = resolve_path("/nonexistent/path/file.pdf");
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }

    #[test]
    fn test_path_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_path(dir.path());
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }

    #[test]
    fn test_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.7\n%%EOF").unwrap();
        let resolved = resolve_path(&path).unwrap();
        assert_eq!(resolved.data, b"%PDF-1.7\n%%EOF");
    }

    #[test]
    fn test_source_deserializes_by_key() {
        let source: PdfSource = serde_json::from_str(r#"{"url": "https://a/b.pdf"}"#).unwrap();
        assert_eq!(source.name(), "https://a/b.pdf");
        let source: PdfSource = serde_json::from_str(r#"{"base64": "AAAA"}"#).unwrap();
        assert_eq!(source.name(), "<base64>");
    }

    #[test]
    fn test_source_rejects_unknown_shapes() {
        let err = serde_json::from_str::<PdfSource>(r#"{"cache_key": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("cache_key"));
        assert!(serde_json::from_str::<PdfSource>(r#"{"path": 3}"#).is_err());
        assert!(serde_json::from_str::<PdfSource>(r#""/a.pdf""#).is_err());
    }

    #[rstest]
    #[case("127.0.0.1")]
    #[case("10.0.0.1")]
    #[case("172.31.255.255")]
    #[case("192.168.1.1")]
    #[case("169.254.169.254")]
    #[case("100.64.0.1")]
    #[case("0.0.0.0")]
    #[case("255.255.255.255")]
    #[case("::1")]
    #[case("::")]
    #[case("fd00::1")]
    #[case("fe80::1")]
    fn test_internal_addresses(#[case] ip: &str) {
        assert!(is_internal_address(&ip.parse().unwrap()));
    }

    #[rstest]
    #[case("8.8.8.8")]
    #[case("203.0.113.1")]
    #[case("100.128.0.1")]
    #[case("2607:f8b0:4004:800::200e")]
    fn test_public_addresses(#[case] ip: &str) {
        assert!(!is_internal_address(&ip.parse().unwrap()));
    }

    #[tokio::test]
    async fn test_private_url_blocked() {
        let result = resolve_url("http://127.0.0.1:1/doc.pdf", &UrlPolicy::default()).await;
        assert!(matches!(result, Err(Error::SsrfBlocked { .. })));
    }
}
