use crate::error::FastcgiError;
use crate::s11n::FCGI_KEEP_CONN;

/// What the transport should do with the connection next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    KeepOpen,
    Close,
}

/// Only bit 0 matters; other flag bits are reserved.
pub fn is_keep_connection(flags: u8) -> bool {
    (flags & FCGI_KEEP_CONN) == FCGI_KEEP_CONN
}

/// Decides when a connection is finished. Once closing, it stays closing.
#[derive(Debug, Default)]
pub struct ConnectionPolicy {
    closing: bool,
}

impl ConnectionPolicy {
    pub fn new() -> ConnectionPolicy {
        ConnectionPolicy::default()
    }

    /// Called after END_REQUEST went out for a request with the given flags.
    pub fn request_ended(&mut self, request_id: u16, flags: u8) -> Disposition {
        if !is_keep_connection(flags) {
            debug!("request {} did not ask to keep the connection", request_id);
            self.closing = true;
        }
        self.disposition()
    }

    /// Called when processing stopped with an error.
    pub fn violation(&mut self, error: &FastcgiError) -> Disposition {
        if error.is_fatal() {
            debug!("closing connection: {}", error);
            self.closing = true;
        }
        self.disposition()
    }

    pub fn disposition(&self) -> Disposition {
        if self.closing {
            Disposition::Close
        } else {
            Disposition::KeepOpen
        }
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_connection_is_bit_zero() {
        assert!(is_keep_connection(1));
        assert!(is_keep_connection(0xff));
        assert!(!is_keep_connection(0));
        assert!(!is_keep_connection(2));
        assert!(!is_keep_connection(0xfe));
    }

    #[test]
    fn close_is_sticky() {
        let mut policy = ConnectionPolicy::new();
        assert_eq!(policy.request_ended(1, 1), Disposition::KeepOpen);
        assert_eq!(policy.request_ended(2, 0), Disposition::Close);
        assert_eq!(policy.request_ended(3, 1), Disposition::Close);
    }

    #[test]
    fn only_fatal_errors_close() {
        let mut policy = ConnectionPolicy::new();
        let answered = FastcgiError::UnknownRole { request_id: 1, role: 7 };
        assert_eq!(policy.violation(&answered), Disposition::KeepOpen);
        let fatal = FastcgiError::UnknownRecordType { request_id: 1, record_type: 99 };
        assert_eq!(policy.violation(&fatal), Disposition::Close);
        assert!(policy.is_closing());
    }
}
