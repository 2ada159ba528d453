//! Error type shared by the record layer and the request layer.

use crate::s11n::RecordType;

use thiserror::Error;

use std::io;

pub type FastcgiResult<T> = Result<T, FastcgiError>;

#[derive(Debug, Error)]
pub enum FastcgiError {
    /// Header carried a version other than 1.
    #[error("unexpected FCGI version {0}")]
    UnsupportedVersion(u8),

    /// Record type this side of the connection does not accept.
    #[error("unknown record type {record_type} (request {request_id})")]
    UnknownRecordType { request_id: u16, record_type: u8 },

    /// A name-value length ran past the end of the stream.
    #[error("malformed name-value stream: {0}")]
    MalformedNameValue(&'static str),

    /// A fixed-size record body was too short.
    #[error("malformed {0:?} record: {1} bytes of content")]
    MalformedRecord(RecordType, usize),

    /// BeginRequest named a role we don't know. Answered, not fatal.
    #[error("unknown role {role} (request {request_id})")]
    UnknownRole { request_id: u16, role: u16 },

    #[error("record of type {0} is too long: {1}")]
    RecordTooLong(u8, usize),

    #[error("un-encodable name-value pair length: {0:#x}")]
    NameValueTooLong(usize),

    /// The peer hung up in the middle of a record.
    #[error("connection closed with {0} bytes of an incomplete record")]
    Truncated(usize),

    /// Bytes arrived after the connection had already failed.
    #[error("connection already closed after a protocol error")]
    ConnectionClosed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FastcgiError {
    /// Whether the connection must be torn down.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FastcgiError::UnknownRole { .. })
    }
}

impl From<FastcgiError> for io::Error {
    fn from(e: FastcgiError) -> io::Error {
        match e {
            FastcgiError::Io(e) => e,
            FastcgiError::Truncated(_) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
