//! Client address of a request, used as the login rate-limit key.
//!
//! Forwarding headers are honoured only when `TRUSTED_PROXY_COUNT` says a proxy sits in
//! front of the server.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};

const UNKNOWN: &str = "unknown";

/// Client address as a string, `"unknown"` when it can't be determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

fn trusted_proxy_count() -> usize {
    std::env::var("TRUSTED_PROXY_COUNT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(0)
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let socket = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(extract_client_ip(
            &parts.headers,
            socket,
            trusted_proxy_count(),
        )))
    }
}

/// With `trusted_proxies` > 0 the address left of the trusted hops in `X-Forwarded-For`
/// (or `X-Real-IP`) wins; the socket address is the fallback.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket: Option<SocketAddr>,
    trusted_proxies: usize,
) -> String {
    if trusted_proxies > 0 {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| from_forwarded_for(v, trusted_proxies));
        if let Some(ip) = forwarded {
            return ip;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| v.parse::<IpAddr>().is_ok());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    socket
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn from_forwarded_for(value: &str, trusted_proxies: usize) -> Option<String> {
    let chain: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let last = chain.len().checked_sub(1)?;
    // Short chains fall back to the hop closest to us
    let pos = last.checked_sub(trusted_proxies).unwrap_or(last);
    chain
        .get(pos)
        .filter(|ip| ip.parse::<IpAddr>().is_ok())
        .map(|ip| ip.to_string())
}
