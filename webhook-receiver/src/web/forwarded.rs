//! Origin metadata for requests arriving through a reverse proxy or tunnel.
//!
//! Proxy-supplied `X-Forwarded-*` headers take precedence over the direct
//! connection. `HeaderMap` lookups are case-insensitive, so `X-Forwarded-For`
//! and `x-forwarded-for` resolve to the same entry.

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, Uri};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Where a request came from and the URL the sender targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedInfo {
    pub origin: String,
    pub protocol: String,
    pub host: String,
    pub url: String,
}

impl ForwardedInfo {
    /// Resolve origin metadata from headers, the peer address and the
    /// original request URI.
    pub fn from_request(headers: &HeaderMap, peer: Option<SocketAddr>, uri: &Uri) -> Self {
        let origin = header_str(headers, X_FORWARDED_FOR)
            .or_else(|| header_str(headers, header::ORIGIN.as_str()))
            .map(str::to_string)
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        let protocol = header_str(headers, X_FORWARDED_PROTO)
            .unwrap_or("http")
            .to_string();

        let host = header_str(headers, X_FORWARDED_HOST)
            .or_else(|| header_str(headers, header::HOST.as_str()))
            .unwrap_or("unknown")
            .to_string();

        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let url = format!("{}://{}{}", protocol, host, path);

        ForwardedInfo {
            origin,
            protocol,
            host,
            url,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
