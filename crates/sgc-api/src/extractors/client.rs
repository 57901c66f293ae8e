//! Caller metadata for audit events and rate-limit keys
//!
//! The socket peer is the client unless it is one of the configured trusted
//! proxies. Only then is `X-Forwarded-For` read, right to left, skipping
//! further trusted hops.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use sgc_service::ClientInfo;

use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Right-most `X-Forwarded-For` hop that is not itself a trusted proxy
fn forwarded_client(headers: &HeaderMap, trusted: &[IpAddr]) -> Option<IpAddr> {
    let mut hops: Vec<IpAddr> = Vec::new();
    for value in headers.get_all(FORWARDED_FOR) {
        let value = value.to_str().ok()?;
        for hop in value.split(',').map(str::trim).filter(|h| !h.is_empty()) {
            hops.push(hop.parse().ok()?);
        }
    }
    hops.into_iter().rev().find(|ip| !trusted.contains(ip))
}

/// Client address of a request
///
/// Forwarded headers are ignored unless the peer is a trusted proxy; a
/// malformed header then falls back to the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted: &[IpAddr]) -> Option<String> {
    let peer = peer.map(|addr| addr.ip());
    let via_proxy = peer.is_some_and(|ip| trusted.contains(&ip));
    let client = if via_proxy {
        forwarded_client(headers, trusted).or(peer)
    } else {
        peer
    };
    client.map(|ip| ip.to_string())
}

/// Socket peer recorded by `into_make_service_with_connect_info`
pub fn peer_addr(parts: &Parts) -> Option<SocketAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// [`client_ip`] of a request under the configured proxy list
pub fn request_ip(parts: &Parts, state: &AppState) -> Option<String> {
    client_ip(&parts.headers, peer_addr(parts), state.trusted_proxies())
}

/// Client IP and user agent of the current request
#[derive(Debug, Clone, Default)]
pub struct ClientMeta(pub ClientInfo);

#[async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ip = request_ip(parts, &AppState::from_ref(state));
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(256).collect());
        Ok(Self(ClientInfo::new(ip, user_agent)))
    }
}
