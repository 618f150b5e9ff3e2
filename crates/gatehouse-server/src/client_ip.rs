use std::net::IpAddr;

use axum::http::HeaderMap;
use thiserror::Error;

/// Value attached when no usable client address can be derived.
pub const UNKNOWN_CLIENT_IP: &str = "unknown";

pub const FORWARDED_FOR: &str = "X-Forwarded-For";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientIpError {
    #[error("malformed remote address: {0:?} is not host:port")]
    NotHostPort(String),
    #[error("malformed remote address: {0:?} is not IP:port")]
    NotIp(String),
}

/// Best-effort client address for a request.
///
/// The remote socket address must be a literal `ip:port`. A non-empty
/// `X-Forwarded-For` header overrides it verbatim; the proxy in front of
/// us is trusted and no hop parsing is done.
pub fn resolve(remote_addr: &str, headers: &HeaderMap) -> Result<String, ClientIpError> {
    let (host, _port) = split_host_port(remote_addr)
        .ok_or_else(|| ClientIpError::NotHostPort(remote_addr.to_owned()))?;

    if host.parse::<IpAddr>().is_err() {
        return Err(ClientIpError::NotIp(remote_addr.to_owned()));
    }

    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let ip = forwarded.unwrap_or(host);
    if ip.is_empty() {
        return Ok(UNKNOWN_CLIENT_IP.to_owned());
    }
    Ok(ip.to_owned())
}

/// Permissive second attempt: any host part of `host:port`, IP or not.
pub fn fallback(remote_addr: &str) -> String {
    match split_host_port(remote_addr) {
        Some((host, _)) if !host.is_empty() => host.to_owned(),
        _ => UNKNOWN_CLIENT_IP.to_owned(),
    }
}

/// Splits `host:port`, `[v6]:port` or `[v6%zone]:port`.
///
/// A bare IPv6 literal without brackets is rejected because its last
/// colon is ambiguous.
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        if host.contains('[') || host.contains(']') || port.contains(':') {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return None;
    }
    Some((host, port))
}
