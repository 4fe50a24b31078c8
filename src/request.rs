//! Request-line tokenization and target resolution
//!
//! The request line is split on ASCII whitespace into method, target and
//! version. CONNECT targets are bare `host[:port]` authorities; plain-HTTP
//! targets are absolute URIs whose host and port are extracted.

use url::Url;

use crate::connection_error::ProxyError;
use crate::constants::port;

/// The three tokens of an HTTP request line.
///
/// A missing version token is accepted and recorded as empty; fewer than
/// two tokens is a parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

impl RequestLine {
    /// Tokenize a request line. The line may carry surrounding whitespace
    /// or its trailing CRLF; both are ignored.
    pub fn parse(line: &str) -> Result<Self, ProxyError> {
        let trimmed = line.trim();
        let mut tokens = trimmed.split_ascii_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some(method), Some(target)) => Ok(Self {
                method: method.to_string(),
                target: target.to_string(),
                version: tokens.next().unwrap_or_default().to_string(),
            }),
            _ => Err(ProxyError::Parse {
                line: trimmed.to_string(),
            }),
        }
    }

    /// True for CONNECT requests (exact match, methods are case-sensitive).
    #[must_use]
    pub fn is_connect(&self) -> bool {
        self.method == "CONNECT"
    }
}

/// Resolved outbound destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddr {
    pub host: String,
    pub port: u16,
}

impl TargetAddr {
    /// Resolve a CONNECT target of the form `host` or `host:port`.
    /// The port defaults to 443 when omitted.
    pub fn from_connect(target: &str) -> Result<Self, ProxyError> {
        let (host, port) = match target.split_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| ProxyError::Parse {
                    line: target.to_string(),
                })?;
                (host, port)
            }
            None => (target, port::DEFAULT_TLS),
        };
        if host.is_empty() {
            return Err(ProxyError::Parse {
                line: target.to_string(),
            });
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Resolve a plain-HTTP target given as an absolute URI.
    /// The port defaults to 80 when the URI carries none.
    pub fn from_uri(target: &str) -> Result<Self, ProxyError> {
        let parse_err = || ProxyError::Parse {
            line: target.to_string(),
        };
        let url = Url::parse(target).map_err(|_| parse_err())?;
        let host = url.host_str().ok_or_else(parse_err)?;
        let port = url.port_or_known_default().unwrap_or(port::DEFAULT_HTTP);
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl std::fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_request_line() {
        let line = RequestLine::parse("GET http://example.com/ HTTP/1.1\r\n").unwrap();
        assert_eq!(line.method, "GET");
        assert_eq!(line.target, "http://example.com/");
        assert_eq!(line.version, "HTTP/1.1");
        assert!(!line.is_connect());
    }

    #[test]
    fn test_parse_connect_request_line() {
        let line = RequestLine::parse("CONNECT example.com:443 HTTP/1.1").unwrap();
        assert!(line.is_connect());
        assert_eq!(line.target, "example.com:443");
    }

    #[test]
    fn test_two_tokens_accepted_empty_version() {
        let line = RequestLine::parse("GET /index.html").unwrap();
        assert_eq!(line.version, "");
    }

    #[test]
    fn test_fewer_than_two_tokens_rejected() {
        assert!(matches!(
            RequestLine::parse("GET"),
            Err(ProxyError::Parse { .. })
        ));
        assert!(matches!(
            RequestLine::parse("   "),
            Err(ProxyError::Parse { .. })
        ));
        assert!(matches!(
            RequestLine::parse(""),
            Err(ProxyError::Parse { .. })
        ));
    }

    #[test]
    fn test_connect_method_is_case_sensitive() {
        let line = RequestLine::parse("connect example.com:443 HTTP/1.1").unwrap();
        assert!(!line.is_connect());
    }

    #[test]
    fn test_connect_target_with_port() {
        let addr = TargetAddr::from_connect("example.com:8443").unwrap();
        assert_eq!(addr.host, "example.com");
        assert_eq!(addr.port, 8443);
    }

    #[test]
    fn test_connect_target_default_port_443() {
        let addr = TargetAddr::from_connect("example.com").unwrap();
        assert_eq!(addr.host, "example.com");
        assert_eq!(addr.port, 443);
    }

    #[test]
    fn test_connect_target_bad_port_rejected() {
        assert!(TargetAddr::from_connect("example.com:notaport").is_err());
        assert!(TargetAddr::from_connect("example.com:99999").is_err());
    }

    #[test]
    fn test_connect_target_empty_host_rejected() {
        assert!(TargetAddr::from_connect(":443").is_err());
        assert!(TargetAddr::from_connect("").is_err());
    }

    #[test]
    fn test_uri_target_default_port_80() {
        let addr = TargetAddr::from_uri("http://example.com/").unwrap();
        assert_eq!(addr.host, "example.com");
        assert_eq!(addr.port, 80);
    }

    #[test]
    fn test_uri_target_explicit_port() {
        let addr = TargetAddr::from_uri("http://example.com:8080/path?q=1").unwrap();
        assert_eq!(addr.host, "example.com");
        assert_eq!(addr.port, 8080);
    }

    #[test]
    fn test_uri_target_unparsable_rejected() {
        assert!(matches!(
            TargetAddr::from_uri("not a uri"),
            Err(ProxyError::Parse { .. })
        ));
        assert!(TargetAddr::from_uri("/relative/path").is_err());
    }

    #[test]
    fn test_target_addr_display() {
        let addr = TargetAddr {
            host: "example.com".to_string(),
            port: 80,
        };
        assert_eq!(addr.to_string(), "example.com:80");
    }
}
