//! Client IP resolution.
//!
//! Precedence: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer
//! socket address, then the literal "unknown". Forwarded headers are
//! attacker-controlled; everything keyed on the result (limits, bans,
//! incident counters) treats it as an identity hint, not a fact.

use std::net::SocketAddr;

use axum::http::HeaderMap;

pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

/// Number of hops in the forwarded chain, zero when absent.
pub fn forwarded_hops(headers: &HeaderMap) -> usize {
    header_str(headers, "x-forwarded-for")
        .map(|v| v.split(',').filter(|hop| !hop.trim().is_empty()).count())
        .unwrap_or(0)
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("192.168.1.50:4242".parse().unwrap())
    }

    #[test]
    fn forwarded_for_first_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers, peer()), "203.0.113.7");
        assert_eq!(forwarded_hops(&headers), 2);
    }

    #[test]
    fn real_ip_beats_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers, peer()), "198.51.100.2");
    }

    #[test]
    fn peer_then_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer()), "192.168.1.50");
        assert_eq!(client_ip(&headers, None), "unknown");
    }

    #[test]
    fn empty_forwarded_header_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", " ".parse().unwrap());
        assert_eq!(client_ip(&headers, peer()), "192.168.1.50");
        assert_eq!(forwarded_hops(&headers), 0);
    }
}
