//! s11n == serialization. Structs that match the bytes that make up FastCGI messages.

use super::endian::*;

use bytes::{BufMut, BytesMut};

pub const FASTCGI_VERSION: u8 = 1;

/// Size of every record header, and of the BeginRequest, EndRequest and UnknownType bodies.
pub const HEADER_LEN: usize = 8;

/// Largest content a single record can carry; the length field is 16 bits.
pub const MAX_CONTENT_LENGTH: usize = 0xFFFF;

/// Request ID used by management records.
pub const FCGI_NULL_REQUEST_ID: u16 = 0;

/// Bit 0 of the BeginRequest flags.
pub const FCGI_KEEP_CONN: u8 = 1;

// Variables for the RecordType::GetValues and GetValuesResult records.
pub const FCGI_MAX_CONNS: &str = "FCGI_MAX_CONNS";
pub const FCGI_MAX_REQS: &str = "FCGI_MAX_REQS";
pub const FCGI_MPXS_CONNS: &str = "FCGI_MPXS_CONNS";

enum_from_primitive! {
    #[repr(u8)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum RecordType {
        BeginRequest = 1,
        AbortRequest = 2,
        EndRequest = 3,
        Params = 4,
        Stdin = 5,
        Stdout = 6,
        Stderr = 7,
        Data = 8,
        GetValues = 9,
        GetValuesResult = 10,
        UnknownType = 11,
    }
}

enum_from_primitive! {
    #[repr(u16)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum Role {
        Responder = 1,
        Authorizer = 2,
        Filter = 3,
    }
}

enum_from_primitive! {
    #[repr(u8)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum ProtocolStatus {
        RequestComplete = 0,
        CantMultiplexConnections = 1,
        Overloaded = 2,
        UnknownRole = 3,
    }
}

/// Number of zero bytes that bring `content_len` up to a multiple of 8.
pub fn padding_for(content_len: usize) -> u8 {
    (content_len.wrapping_neg() & 7) as u8
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FastcgiRecordHeader {
    pub version: u8,
    pub record_type: u8,
    pub request_id: NetworkU16,
    pub content_length: NetworkU16,
    pub padding_length: u8,
    pub reserved: u8,
}

impl FastcgiRecordHeader {
    /// Build an outbound header. Padding is chosen so content + padding is 8-byte aligned.
    pub fn new(record_type: u8, request_id: u16, content_length: u16) -> FastcgiRecordHeader {
        FastcgiRecordHeader {
            version: FASTCGI_VERSION,
            record_type,
            request_id: NetworkU16::new(request_id),
            content_length: NetworkU16::new(content_length),
            padding_length: padding_for(content_length as usize),
            reserved: 0,
        }
    }

    /// `bytes` must hold at least `HEADER_LEN` bytes.
    pub fn parse(bytes: &[u8]) -> FastcgiRecordHeader {
        FastcgiRecordHeader {
            version: bytes[0],
            record_type: bytes[1],
            request_id: NetworkU16::from_wire(&bytes[2..4]),
            content_length: NetworkU16::from_wire(&bytes[4..6]),
            padding_length: bytes[6],
            reserved: bytes[7],
        }
    }

    /// Content plus padding: the bytes that follow the header on the wire.
    pub fn body_len(&self) -> usize {
        self.content_length.get() as usize + self.padding_length as usize
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.reserve(HEADER_LEN);
        buf.put_u8(self.version);
        buf.put_u8(self.record_type);
        buf.put_slice(self.request_id.as_bytes());
        buf.put_slice(self.content_length.as_bytes());
        buf.put_u8(self.padding_length);
        buf.put_u8(self.reserved);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BeginRequestBody {
    pub role: NetworkU16,
    pub flags: u8,
    pub reserved: [u8; 5],
}

impl BeginRequestBody {
    /// `bytes` must hold at least `HEADER_LEN` bytes.
    pub fn parse(bytes: &[u8]) -> BeginRequestBody {
        let mut reserved = [0u8; 5];
        reserved.copy_from_slice(&bytes[3..8]);
        BeginRequestBody {
            role: NetworkU16::from_wire(&bytes[0..2]),
            flags: bytes[2],
            reserved,
        }
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_slice(self.role.as_bytes());
        buf.put_u8(self.flags);
        buf.put_slice(&self.reserved);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EndRequestBody {
    pub app_status: NetworkU32,
    pub protocol_status: u8,
    pub reserved: [u8; 3],
}

impl EndRequestBody {
    pub fn parse(bytes: &[u8]) -> EndRequestBody {
        EndRequestBody {
            app_status: NetworkU32::from_wire(&bytes[0..4]),
            protocol_status: bytes[4],
            reserved: [bytes[5], bytes[6], bytes[7]],
        }
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_slice(self.app_status.as_bytes());
        buf.put_u8(self.protocol_status);
        buf.put_slice(&self.reserved);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct UnknownTypeBody {
    pub record_type: u8,
    pub reserved: [u8; 7],
}

impl UnknownTypeBody {
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.record_type);
        buf.put_slice(&self.reserved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enum_primitive::FromPrimitive;

    #[test]
    fn padding_rounds_up_to_eight() {
        assert_eq!(padding_for(0), 0);
        assert_eq!(padding_for(1), 7);
        assert_eq!(padding_for(5), 3);
        assert_eq!(padding_for(8), 0);
        assert_eq!(padding_for(65535), 1);
        assert_eq!(padding_for(4465), 7);
    }

    #[test]
    fn header_wire_layout() {
        let header = FastcgiRecordHeader::new(RecordType::Stdout as u8, 0x0102, 5);
        let mut buf = BytesMut::new();
        header.write_to(&mut buf);
        assert_eq!(&buf[..], &[1, 6, 1, 2, 0, 5, 3, 0]);

        let parsed = FastcgiRecordHeader::parse(&buf);
        assert_eq!(parsed, header);
        assert_eq!(parsed.request_id.get(), 0x0102);
        assert_eq!(parsed.body_len(), 8);
    }

    #[test]
    fn begin_request_body() {
        let body = BeginRequestBody::parse(&[0, 3, 1, 0, 0, 0, 0, 0]);
        assert_eq!(Role::from_u16(body.role.get()), Some(Role::Filter));
        assert_eq!(body.flags & FCGI_KEEP_CONN, FCGI_KEEP_CONN);
    }

    #[test]
    fn enumerations() {
        assert_eq!(RecordType::from_u8(11), Some(RecordType::UnknownType));
        assert_eq!(RecordType::from_u8(99), None);
        assert_eq!(RecordType::from_u8(0), None);
        assert_eq!(ProtocolStatus::from_u8(2), Some(ProtocolStatus::Overloaded));
        assert_eq!(Role::from_u16(4), None);
    }
}
