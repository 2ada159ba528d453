use crate::s11n::{FCGI_MAX_CONNS, FCGI_MAX_REQS, FCGI_MPXS_CONNS};

/// Limits advertised through FCGI_GET_VALUES, and enforced by the TCP server where they apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastcgiConfig {
    /// Maximum number of concurrent transport connections.
    pub max_conns: u32,
    /// Maximum number of concurrent requests, across all connections.
    pub max_reqs: u32,
    /// Whether requests may be multiplexed over one connection.
    pub multiplex: bool,
}

impl Default for FastcgiConfig {
    fn default() -> FastcgiConfig {
        FastcgiConfig {
            max_conns: 64,
            max_reqs: 64,
            multiplex: true,
        }
    }
}

impl FastcgiConfig {
    pub fn max_conns(mut self, max_conns: u32) -> FastcgiConfig {
        self.max_conns = max_conns;
        self
    }

    pub fn max_reqs(mut self, max_reqs: u32) -> FastcgiConfig {
        self.max_reqs = max_reqs;
        self
    }

    pub fn multiplex(mut self, multiplex: bool) -> FastcgiConfig {
        self.multiplex = multiplex;
        self
    }

    /// The value of a FCGI_GET_VALUES variable, or `None` if we don't know that name.
    pub fn get_value(&self, name: &[u8]) -> Option<String> {
        if name == FCGI_MAX_CONNS.as_bytes() {
            Some(self.max_conns.to_string())
        } else if name == FCGI_MAX_REQS.as_bytes() {
            Some(self.max_reqs.to_string())
        } else if name == FCGI_MPXS_CONNS.as_bytes() {
            Some(if self.multiplex { "1" } else { "0" }.to_owned())
        } else {
            None
        }
    }
}
