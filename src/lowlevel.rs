use super::error::{FastcgiError, FastcgiResult};
use super::endian::*;
use super::params::{read_params, write_params};
use super::s11n::*;

use bytes::{Buf, BufMut, BytesMut};
use enum_primitive::FromPrimitive;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug)]
pub struct FastcgiRecord {
    pub request_id: u16,
    pub body: FastcgiRecordBody,
}

#[derive(Debug)]
pub enum FastcgiRecordBody {
    BeginRequest(BeginRequest),
    AbortRequest,
    EndRequest(EndRequest),
    Params(BytesMut),
    Stdin(BytesMut),
    Stdout(BytesMut),
    Stderr(BytesMut),
    Data(BytesMut),
    GetValues(Vec<Vec<u8>>),
    GetValuesResult(Vec<(Vec<u8>, Vec<u8>)>),
    UnknownTypeResponse(u8),
    UnknownType(u8, BytesMut), // this one is the the incoming record
}

impl FastcgiRecordBody {
    /// The type byte this body is sent with.
    pub fn type_byte(&self) -> u8 {
        let record_type = match *self {
            FastcgiRecordBody::BeginRequest(_) => RecordType::BeginRequest,
            FastcgiRecordBody::AbortRequest => RecordType::AbortRequest,
            FastcgiRecordBody::EndRequest(_) => RecordType::EndRequest,
            FastcgiRecordBody::Params(_) => RecordType::Params,
            FastcgiRecordBody::Stdin(_) => RecordType::Stdin,
            FastcgiRecordBody::Stdout(_) => RecordType::Stdout,
            FastcgiRecordBody::Stderr(_) => RecordType::Stderr,
            FastcgiRecordBody::Data(_) => RecordType::Data,
            FastcgiRecordBody::GetValues(_) => RecordType::GetValues,
            FastcgiRecordBody::GetValuesResult(_) => RecordType::GetValuesResult,
            FastcgiRecordBody::UnknownTypeResponse(_) => RecordType::UnknownType,
            FastcgiRecordBody::UnknownType(typ, _) => return typ,
        };
        record_type as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginRequest {
    pub role: Role,
    pub flags: u8,
}

impl BeginRequest {
    pub fn keep_connection(&self) -> bool {
        (self.flags & FCGI_KEEP_CONN) == FCGI_KEEP_CONN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndRequest {
    pub app_status: u32,
    pub protocol_status: ProtocolStatus,
}

/// Reads and writes single FastCGI records.
///
/// Decoding never consumes anything until the header, content and padding of a record are all
/// in the buffer, so it can be called again with the same buffer once more bytes arrive.
#[derive(Debug, Default)]
pub struct FastcgiLowlevelCodec;

fn read_header(buf: &BytesMut) -> Option<FastcgiRecordHeader> {
    if buf.len() < HEADER_LEN {
        trace!("insufficient buffer for header");
        None
    } else {
        Some(FastcgiRecordHeader::parse(&buf[..HEADER_LEN]))
    }
}

fn fixed_body(record_type: RecordType, content: &[u8]) -> FastcgiResult<&[u8]> {
    if content.len() < HEADER_LEN {
        let e = FastcgiError::MalformedRecord(record_type, content.len());
        error!("{}", e);
        Err(e)
    } else {
        Ok(&content[..HEADER_LEN])
    }
}

fn read_begin_request_body(request_id: u16, content: &[u8]) -> FastcgiResult<BeginRequest> {
    let raw = BeginRequestBody::parse(fixed_body(RecordType::BeginRequest, content)?);
    let role = match Role::from_u16(raw.role.get()) {
        Some(role) => role,
        None => {
            warn!("unknown role {} for request {}", raw.role.get(), request_id);
            return Err(FastcgiError::UnknownRole { request_id, role: raw.role.get() });
        }
    };
    Ok(BeginRequest {
        role,
        flags: raw.flags,
    })
}

fn read_end_request_body(content: &[u8]) -> FastcgiResult<EndRequest> {
    let raw = EndRequestBody::parse(fixed_body(RecordType::EndRequest, content)?);
    let protocol_status = ProtocolStatus::from_u8(raw.protocol_status).ok_or_else(|| {
        error!("unknown protocol status {}", raw.protocol_status);
        FastcgiError::MalformedRecord(RecordType::EndRequest, content.len())
    })?;
    Ok(EndRequest {
        app_status: raw.app_status.get(),
        protocol_status,
    })
}

fn read_body(type_byte: u8, request_id: u16, content: BytesMut) -> FastcgiResult<FastcgiRecordBody> {
    let record_type = match RecordType::from_u8(type_byte) {
        Some(record_type) => record_type,
        None => {
            warn!("unknown record type {}", type_byte);
            return Ok(FastcgiRecordBody::UnknownType(type_byte, content));
        }
    };

    let body = match record_type {
        RecordType::BeginRequest => {
            FastcgiRecordBody::BeginRequest(read_begin_request_body(request_id, &content)?)
        },
        RecordType::AbortRequest => FastcgiRecordBody::AbortRequest,
        RecordType::EndRequest => {
            FastcgiRecordBody::EndRequest(read_end_request_body(&content)?)
        },
        RecordType::Params => FastcgiRecordBody::Params(content),
        RecordType::Stdin => FastcgiRecordBody::Stdin(content),
        RecordType::Stdout => FastcgiRecordBody::Stdout(content),
        RecordType::Stderr => FastcgiRecordBody::Stderr(content),
        RecordType::Data => FastcgiRecordBody::Data(content),
        RecordType::GetValues => {
            let names = read_params(&content)?
                .into_iter()
                .map(|(name, _value)| name.to_vec())
                .collect();
            FastcgiRecordBody::GetValues(names)
        },
        RecordType::GetValuesResult => {
            let values = read_params(&content)?
                .into_iter()
                .map(|(name, value)| (name.to_vec(), value.to_vec()))
                .collect();
            FastcgiRecordBody::GetValuesResult(values)
        },
        RecordType::UnknownType => {
            let typ = fixed_body(RecordType::UnknownType, &content)?[0];
            FastcgiRecordBody::UnknownTypeResponse(typ)
        },
    };
    Ok(body)
}

/// Append one record: header, `content`, and the zero padding that makes the record a multiple
/// of 8 bytes long. `content` must fit in the 16-bit length field.
pub fn write_record(buf: &mut BytesMut, type_byte: u8, request_id: u16, content: &[u8]) {
    debug_assert!(content.len() <= MAX_CONTENT_LENGTH);
    let header = FastcgiRecordHeader::new(type_byte, request_id, content.len() as u16);
    trace!("writing record type {} for request {}: content {} padding {}",
           type_byte, request_id, content.len(), header.padding_length);
    buf.reserve(HEADER_LEN + header.body_len());
    header.write_to(buf);
    buf.put_slice(content);
    buf.put_bytes(0, header.padding_length as usize);
}

impl Decoder for FastcgiLowlevelCodec {
    type Item = FastcgiRecord;
    type Error = FastcgiError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        trace!("buffer: {} bytes", buf.len());

        let header = match read_header(buf) {
            Some(header) => header,
            None => return Ok(None),
        };

        if header.version != FASTCGI_VERSION {
            error!("unexpected FCGI version {}", header.version);
            return Err(FastcgiError::UnsupportedVersion(header.version));
        }

        let request_id = header.request_id.get();
        let content_len = header.content_length.get() as usize;

        if buf.len() < HEADER_LEN + header.body_len() {
            trace!("insufficient buffer for record body: have {}, need {}",
                   buf.len() - HEADER_LEN, header.body_len());
            return Ok(None);
        }

        trace!("request id: {}; record type: {}; content length: {}; padding length: {}",
               request_id, header.record_type, content_len, header.padding_length);

        buf.advance(HEADER_LEN);
        let content = buf.split_to(content_len);
        buf.advance(header.padding_length as usize);

        let body = read_body(header.record_type, request_id, content)?;
        Ok(Some(FastcgiRecord {
            request_id,
            body,
        }))
    }
}

impl Encoder<FastcgiRecord> for FastcgiLowlevelCodec {
    type Error = FastcgiError;

    fn encode(&mut self, msg: FastcgiRecord, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let type_byte = msg.body.type_byte();
        let data: BytesMut = match msg.body {
            FastcgiRecordBody::BeginRequest(begin) => {
                let mut out = BytesMut::with_capacity(HEADER_LEN);
                BeginRequestBody {
                    role: NetworkU16::new(begin.role as u16),
                    flags: begin.flags,
                    reserved: [0u8; 5],
                }.write_to(&mut out);
                out
            },
            FastcgiRecordBody::AbortRequest => BytesMut::new(),
            FastcgiRecordBody::EndRequest(end_body) => {
                let mut out = BytesMut::with_capacity(HEADER_LEN);
                EndRequestBody {
                    app_status: NetworkU32::new(end_body.app_status),
                    protocol_status: end_body.protocol_status as u8,
                    reserved: [0u8; 3],
                }.write_to(&mut out);
                out
            },
            FastcgiRecordBody::Params(data)
                | FastcgiRecordBody::Stdin(data)
                | FastcgiRecordBody::Stdout(data)
                | FastcgiRecordBody::Stderr(data)
                | FastcgiRecordBody::Data(data)
                | FastcgiRecordBody::UnknownType(_, data) => data,
            FastcgiRecordBody::GetValues(names) => {
                let mut out = BytesMut::new();
                write_params(&mut out, names.iter().map(|name| (name, "")))?;
                out
            },
            FastcgiRecordBody::GetValuesResult(values) => {
                let mut out = BytesMut::new();
                write_params(&mut out, values)?;
                out
            },
            FastcgiRecordBody::UnknownTypeResponse(typ) => {
                let mut out = BytesMut::with_capacity(HEADER_LEN);
                UnknownTypeBody {
                    record_type: typ,
                    reserved: [0u8; 7],
                }.write_to(&mut out);
                out
            },
        };

        if data.len() > MAX_CONTENT_LENGTH {
            let e = FastcgiError::RecordTooLong(type_byte, data.len());
            error!("{}", e);
            return Err(e);
        }

        write_record(buf, type_byte, msg.request_id, &data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(record: FastcgiRecord) -> BytesMut {
        let mut buf = BytesMut::new();
        FastcgiLowlevelCodec.encode(record, &mut buf).unwrap();
        buf
    }

    #[test]
    fn short_header_consumes_nothing() {
        let mut buf = BytesMut::from(&[1u8, 5, 0, 1][..]);
        assert!(FastcgiLowlevelCodec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn waits_for_content_and_padding() {
        let mut full = encode(FastcgiRecord {
            request_id: 1,
            body: FastcgiRecordBody::Stdin(BytesMut::from(&b"hello"[..])),
        });
        assert_eq!(full.len(), 16);

        // Everything but the last padding byte.
        let mut partial = BytesMut::from(&full[..15]);
        assert!(FastcgiLowlevelCodec.decode(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), 15);

        let record = FastcgiLowlevelCodec.decode(&mut full).unwrap().unwrap();
        assert_eq!(record.request_id, 1);
        match record.body {
            FastcgiRecordBody::Stdin(data) => assert_eq!(&data[..], b"hello"),
            other => panic!("unexpected body {:?}", other),
        }
        assert!(full.is_empty());
    }

    #[test]
    fn decodes_begin_request() {
        let mut buf = BytesMut::from(&[1u8, 1, 0, 7, 0, 8, 0, 0,
                                       0, 1, 1, 0, 0, 0, 0, 0][..]);
        let record = FastcgiLowlevelCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(record.request_id, 7);
        match record.body {
            FastcgiRecordBody::BeginRequest(begin) => {
                assert_eq!(begin.role, Role::Responder);
                assert!(begin.keep_connection());
            },
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn unknown_role_still_consumes_record() {
        let mut buf = BytesMut::from(&[1u8, 1, 0, 7, 0, 8, 0, 0,
                                       0, 9, 0, 0, 0, 0, 0, 0][..]);
        match FastcgiLowlevelCodec.decode(&mut buf) {
            Err(FastcgiError::UnknownRole { request_id: 7, role: 9 }) => (),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn short_begin_request_is_malformed() {
        let mut buf = BytesMut::from(&[1u8, 1, 0, 7, 0, 2, 6, 0,
                                       0, 1, 0, 0, 0, 0, 0, 0][..]);
        assert!(matches!(FastcgiLowlevelCodec.decode(&mut buf),
                         Err(FastcgiError::MalformedRecord(RecordType::BeginRequest, 2))));
    }

    #[test]
    fn bad_version() {
        let mut buf = BytesMut::from(&[2u8, 5, 0, 1, 0, 0, 0, 0][..]);
        assert!(matches!(FastcgiLowlevelCodec.decode(&mut buf),
                         Err(FastcgiError::UnsupportedVersion(2))));
    }

    #[test]
    fn unrecognised_type_is_surfaced() {
        let mut buf = BytesMut::from(&[1u8, 99, 0, 3, 0, 0, 0, 0][..]);
        let record = FastcgiLowlevelCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(record.request_id, 3);
        assert!(matches!(record.body, FastcgiRecordBody::UnknownType(99, _)));
    }

    #[test]
    fn end_request_wire_format() {
        let buf = encode(FastcgiRecord {
            request_id: 0x0203,
            body: FastcgiRecordBody::EndRequest(EndRequest {
                app_status: 0x01020304,
                protocol_status: ProtocolStatus::Overloaded,
            }),
        });
        assert_eq!(&buf[..], &[1u8, 3, 2, 3, 0, 8, 0, 0,
                               1, 2, 3, 4, 2, 0, 0, 0][..]);
    }

    #[test]
    fn unknown_type_response_wire_format() {
        let buf = encode(FastcgiRecord {
            request_id: 0,
            body: FastcgiRecordBody::UnknownTypeResponse(99),
        });
        assert_eq!(&buf[..], &[1u8, 11, 0, 0, 0, 8, 0, 0,
                               99, 0, 0, 0, 0, 0, 0, 0][..]);
    }

    #[test]
    fn get_values_round_trip() {
        let mut buf = encode(FastcgiRecord {
            request_id: 0,
            body: FastcgiRecordBody::GetValues(vec![FCGI_MAX_CONNS.into(), FCGI_MPXS_CONNS.into()]),
        });
        assert_eq!(buf.len() % 8, 0);
        let record = FastcgiLowlevelCodec.decode(&mut buf).unwrap().unwrap();
        match record.body {
            FastcgiRecordBody::GetValues(names) => {
                assert_eq!(names, vec![b"FCGI_MAX_CONNS".to_vec(), b"FCGI_MPXS_CONNS".to_vec()]);
            },
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn oversized_content_is_refused() {
        let mut buf = BytesMut::new();
        let result = FastcgiLowlevelCodec.encode(FastcgiRecord {
            request_id: 1,
            body: FastcgiRecordBody::Stdout(BytesMut::from(&vec![0u8; 0x10000][..])),
        }, &mut buf);
        assert!(matches!(result, Err(FastcgiError::RecordTooLong(6, 0x10000))));
        assert!(buf.is_empty());
    }
}
