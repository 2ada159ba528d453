use bytes::BytesMut;
use crate::config::FastcgiConfig;
use crate::error::{FastcgiError, FastcgiResult};
use crate::hi::assembler::{FastcgiRequest, RequestAssembler};
use crate::hi::response::write_end_request;
use crate::lowlevel::{FastcgiLowlevelCodec, FastcgiRecord, FastcgiRecordBody};
use crate::s11n::{ProtocolStatus, FCGI_NULL_REQUEST_ID};
use tokio_util::codec::{Decoder, Encoder};

use std::collections::HashSet;

/// Outcome of reading one record.
#[derive(Debug)]
pub enum ReadStatus {
    /// Not enough bytes for a whole record; nothing was consumed.
    Short,
    /// A record was consumed but no request finished.
    Partial,
    /// A record was consumed and it finished this request.
    Complete(FastcgiRequest),
}

/// Server side of a FastCGI connection: turns records into complete requests.
///
/// Replies the protocol requires of the codec itself (END_REQUEST after an abort or for an
/// unknown role, GET_VALUES_RESULT, UNKNOWN_TYPE) are appended to an outbound buffer that the
/// transport drains with `take_outbound`.
#[derive(Debug, Default)]
pub struct FastcgiServerCodec {
    inner: FastcgiLowlevelCodec,
    requests: RequestAssembler,
    /// Request ids refused for an unknown role; their remaining records are dropped.
    rejected: HashSet<u16>,
    /// (request id, flags) of requests ended here without reaching the application.
    ended: Vec<(u16, u8)>,
    config: FastcgiConfig,
    outbound: BytesMut,
    failed: bool,
}

impl FastcgiServerCodec {
    pub fn new(config: FastcgiConfig) -> FastcgiServerCodec {
        FastcgiServerCodec {
            config,
            ..FastcgiServerCodec::default()
        }
    }

    pub fn requests(&self) -> &RequestAssembler {
        &self.requests
    }

    pub fn outbound_mut(&mut self) -> &mut BytesMut {
        &mut self.outbound
    }

    pub fn take_outbound(&mut self) -> BytesMut {
        self.outbound.split()
    }

    /// Requests this codec answered with END_REQUEST itself (aborts), as (request id, flags).
    pub fn take_ended(&mut self) -> Vec<(u16, u8)> {
        std::mem::take(&mut self.ended)
    }

    /// Whether a fatal error has stopped this codec.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Read at most one record from `buf` and apply it.
    pub fn read_record(&mut self, buf: &mut BytesMut) -> FastcgiResult<ReadStatus> {
        if self.failed {
            return Err(FastcgiError::ConnectionClosed);
        }

        let result = match self.inner.decode(buf) {
            Ok(Some(record)) => self.dispatch(record),
            Ok(None) => Ok(ReadStatus::Short),
            Err(FastcgiError::UnknownRole { request_id, role }) => {
                debug!("rejecting request {} with role {}", request_id, role);
                self.requests.discard(request_id);
                self.rejected.insert(request_id);
                write_end_request(&mut self.outbound, request_id, 0, ProtocolStatus::UnknownRole);
                Ok(ReadStatus::Partial)
            },
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            if e.is_fatal() {
                error!("protocol error: {}", e);
                self.failed = true;
            }
        }
        result
    }

    fn dispatch(&mut self, record: FastcgiRecord) -> FastcgiResult<ReadStatus> {
        let request_id = record.request_id;
        let record_type = record.body.type_byte();
        if self.rejected.contains(&request_id) && self.drop_rejected(request_id, &record.body) {
            return Ok(ReadStatus::Partial);
        }

        match record.body {
            FastcgiRecordBody::BeginRequest(begin) => {
                self.requests.begin(request_id, begin);
            },
            FastcgiRecordBody::AbortRequest => {
                match self.requests.abort(request_id) {
                    Some(flags) => self.ended.push((request_id, flags)),
                    None => debug!("abort for request {} that isn't pending", request_id),
                }
                write_end_request(&mut self.outbound, request_id, 0, ProtocolStatus::RequestComplete);
            },
            FastcgiRecordBody::Params(content) => {
                self.requests.params(request_id, content)?;
            },
            FastcgiRecordBody::Stdin(content) => {
                if let Some(request) = self.requests.stdin(request_id, content)? {
                    return Ok(ReadStatus::Complete(request));
                }
            },
            FastcgiRecordBody::Data(content) => {
                self.requests.data(request_id, content);
            },
            FastcgiRecordBody::GetValues(names) => {
                self.get_values(request_id, names)?;
            },
            FastcgiRecordBody::EndRequest(_)
                | FastcgiRecordBody::Stdout(_)
                | FastcgiRecordBody::Stderr(_)
                | FastcgiRecordBody::GetValuesResult(_)
                | FastcgiRecordBody::UnknownTypeResponse(_)
                | FastcgiRecordBody::UnknownType(..) => {
                warn!("unsupported record type {} for request {}", record_type, request_id);
                self.requests.discard(request_id);
                self.inner.encode(FastcgiRecord {
                    request_id: FCGI_NULL_REQUEST_ID,
                    body: FastcgiRecordBody::UnknownTypeResponse(record_type),
                }, &mut self.outbound)?;
                return Err(FastcgiError::UnknownRecordType { request_id, record_type });
            },
        }
        Ok(ReadStatus::Partial)
    }

    /// Whether `body`, addressed to a refused request, should be swallowed. The refused id is
    /// forgotten once its stdin ends, it is aborted, or it begins again.
    fn drop_rejected(&mut self, request_id: u16, body: &FastcgiRecordBody) -> bool {
        match *body {
            FastcgiRecordBody::BeginRequest(_) => {
                self.rejected.remove(&request_id);
                false
            },
            FastcgiRecordBody::Params(_) | FastcgiRecordBody::Data(_) => {
                trace!("dropping record for refused request {}", request_id);
                true
            },
            FastcgiRecordBody::Stdin(ref content) => {
                if content.is_empty() {
                    debug!("refused request {} finished sending", request_id);
                    self.rejected.remove(&request_id);
                }
                true
            },
            FastcgiRecordBody::AbortRequest => {
                debug!("abort for refused request {}", request_id);
                self.rejected.remove(&request_id);
                true
            },
            _ => false,
        }
    }

    fn get_values(&mut self, request_id: u16, names: Vec<Vec<u8>>) -> FastcgiResult<()> {
        let values: Vec<(Vec<u8>, Vec<u8>)> = names
            .into_iter()
            .filter_map(|name| {
                let value = self.config.get_value(&name)?;
                Some((name, value.into_bytes()))
            })
            .collect();
        debug!("answering GetValues with {} values", values.len());
        self.inner.encode(FastcgiRecord {
            request_id,
            body: FastcgiRecordBody::GetValuesResult(values),
        }, &mut self.outbound)
    }
}

impl Decoder for FastcgiServerCodec {
    type Item = FastcgiRequest;
    type Error = FastcgiError;

    /// Consume records until one completes a request or the buffer runs short. Anything after
    /// the completing record stays in `buf` for the next call.
    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<FastcgiRequest>, Self::Error> {
        loop {
            match self.read_record(buf)? {
                ReadStatus::Short => return Ok(None),
                ReadStatus::Partial => (),
                ReadStatus::Complete(request) => return Ok(Some(request)),
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<FastcgiRequest>, Self::Error> {
        match self.decode(buf)? {
            Some(request) => Ok(Some(request)),
            None if buf.is_empty() => Ok(None),
            None => {
                let e = FastcgiError::Truncated(buf.len());
                error!("{}", e);
                self.failed = true;
                Err(e)
            }
        }
    }
}

impl Encoder<FastcgiRecord> for FastcgiServerCodec {
    type Error = FastcgiError;

    fn encode(&mut self, msg: FastcgiRecord, buf: &mut BytesMut) -> Result<(), Self::Error> {
        self.inner.encode(msg, buf)
    }
}
