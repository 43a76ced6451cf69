//! Caller address extraction for the lookup endpoint

use crate::address::expand_ipv6;

/// Derive the caller's address from proxy headers or the peer address
///
/// Precedence: the first entry of `X-Forwarded-For`, then `X-Real-IP`, then
/// the transport peer (`host:port` or `[v6]:port`). The result is trimmed and
/// IPv6 values are expanded to 8 groups.
pub fn client_ip(forwarded_for: Option<&str>, real_ip: Option<&str>, remote_addr: &str) -> String {
    let mut ip = forwarded_for
        .map(|value| value.split(',').next().unwrap_or_default())
        .unwrap_or_default();

    if ip.is_empty() {
        ip = real_ip.unwrap_or_default();
    }

    if ip.is_empty() && !remote_addr.is_empty() {
        ip = if let Some(rest) = remote_addr.strip_prefix('[') {
            rest.rfind(']').map(|end| &rest[..end]).unwrap_or_default()
        } else {
            remote_addr
                .rfind(':')
                .map(|end| &remote_addr[..end])
                .unwrap_or_default()
        };
    }

    let ip = ip.trim();
    if ip.contains(':') {
        expand_ipv6(ip)
    } else {
        ip.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_ip() {
        assert_eq!(client_ip(None, Some("192.168.1.1"), ""), "192.168.1.1");
        assert_eq!(client_ip(None, Some("2001:db8::1"), ""), "2001:db8:0:0:0:0:0:1");
        assert_eq!(client_ip(None, Some("::1"), ""), "0:0:0:0:0:0:0:1");
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        assert_eq!(
            client_ip(Some("203.0.113.1, 192.168.1.1"), None, ""),
            "203.0.113.1"
        );
        assert_eq!(
            client_ip(Some("2001:db8::1, 192.168.1.1"), None, ""),
            "2001:db8:0:0:0:0:0:1"
        );
        assert_eq!(
            client_ip(Some("::1, 192.168.1.1"), Some("10.0.0.1"), "10.0.0.2:1"),
            "0:0:0:0:0:0:0:1"
        );
    }

    #[test]
    fn test_remote_addr() {
        assert_eq!(client_ip(None, None, "192.168.1.1:8080"), "192.168.1.1");
        assert_eq!(client_ip(None, None, "[2001:db8::1]:8080"), "2001:db8:0:0:0:0:0:1");
        assert_eq!(client_ip(None, None, "[::1]:8080"), "0:0:0:0:0:0:0:1");
    }

    #[test]
    fn test_empty_headers_fall_through() {
        assert_eq!(client_ip(Some(""), Some(""), "198.51.100.4:443"), "198.51.100.4");
        assert_eq!(client_ip(None, None, ""), "");
    }
}
