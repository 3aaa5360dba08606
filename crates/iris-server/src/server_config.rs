//! Static configuration for the bridge HTTP server.

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address, e.g. `127.0.0.1:3400`.
    pub bind: String,
    /// Public base URL under which this server is reachable, used for the
    /// self links in the descriptor document. No trailing slash.
    pub base_url: String,
    /// Base URL of the monitoring host whose event links should be
    /// unfurled from room messages. No trailing slash.
    pub host_base_url: String,
}

impl ServerConfig {
    pub fn new(
        bind: impl Into<String>,
        base_url: impl Into<String>,
        host_base_url: impl Into<String>,
    ) -> Self {
        Self {
            bind: bind.into(),
            base_url: normalize_base_url(base_url.into()),
            host_base_url: normalize_base_url(host_base_url.into()),
        }
    }
}

fn normalize_base_url(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_normalized() {
        let config = ServerConfig::new(
            "127.0.0.1:0",
            "https://bridge.example.com/",
            "https://monitor.example.com//",
        );
        assert_eq!(config.base_url, "https://bridge.example.com");
        assert_eq!(config.host_base_url, "https://monitor.example.com");
    }
}
