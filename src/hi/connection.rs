use bytes::BytesMut;
use crate::config::FastcgiConfig;
use crate::error::{FastcgiError, FastcgiResult};
use crate::hi::assembler::FastcgiRequest;
use crate::hi::codec::FastcgiServerCodec;
use crate::hi::handler::FastcgiRequestHandler;
use crate::hi::policy::{ConnectionPolicy, Disposition};
use crate::hi::response::Response;
use tokio_util::codec::Decoder;

/// Result of one pass of `FastcgiConnection::process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Everything usable was consumed; more bytes are needed.
    Short,
    /// A request completed and was handed to the handler.
    Dispatched { request_id: u16 },
}

/// One FastCGI connection, independent of any transport.
///
/// The transport appends received bytes to an inbound buffer, calls `process` until it returns
/// `Progress::Short`, and sends whatever `take_outbound` returns. After `process` fails, or once
/// `disposition` is `Close` and the outbound bytes are written, the transport should be closed.
#[derive(Debug, Default)]
pub struct FastcgiConnection {
    codec: FastcgiServerCodec,
    policy: ConnectionPolicy,
}

impl FastcgiConnection {
    pub fn new(config: FastcgiConfig) -> FastcgiConnection {
        FastcgiConnection {
            codec: FastcgiServerCodec::new(config),
            policy: ConnectionPolicy::new(),
        }
    }

    /// Number of requests with partial state on this connection.
    pub fn active_requests(&self) -> usize {
        self.codec.requests().len()
    }

    /// Parse records from `inbound` until a request completes or more bytes are needed.
    ///
    /// At most one request is dispatched per call; bytes after it stay in `inbound`.
    pub fn process<H>(&mut self, inbound: &mut BytesMut, handler: &H) -> FastcgiResult<Progress>
        where H: FastcgiRequestHandler + ?Sized
    {
        if self.policy.is_closing() {
            return Err(FastcgiError::ConnectionClosed);
        }
        let decoded = self.codec.decode(inbound);
        self.settle_aborted();
        match decoded {
            Ok(Some(request)) => Ok(self.dispatch(request, handler)),
            Ok(None) => Ok(Progress::Short),
            Err(e) => {
                self.policy.violation(&e);
                Err(e)
            }
        }
    }

    /// The peer will send nothing more. Fails if `inbound` holds part of a record.
    pub fn finish<H>(&mut self, inbound: &mut BytesMut, handler: &H) -> FastcgiResult<Progress>
        where H: FastcgiRequestHandler + ?Sized
    {
        if self.policy.is_closing() {
            return Ok(Progress::Short);
        }
        let decoded = self.codec.decode_eof(inbound);
        self.settle_aborted();
        match decoded {
            Ok(Some(request)) => Ok(self.dispatch(request, handler)),
            Ok(None) => Ok(Progress::Short),
            Err(e) => {
                self.policy.violation(&e);
                Err(e)
            }
        }
    }

    /// Aborted requests got their END_REQUEST from the codec; they close the connection the
    /// same way a finished request does.
    fn settle_aborted(&mut self) {
        for (request_id, flags) in self.codec.take_ended() {
            self.policy.request_ended(request_id, flags);
        }
    }

    fn dispatch<H>(&mut self, request: FastcgiRequest, handler: &H) -> Progress
        where H: FastcgiRequestHandler + ?Sized
    {
        let request_id = request.request_id;
        let flags = request.flags;
        info!("request {}: {:?} {:?}", request_id,
              request.param_lossy("REQUEST_METHOD").unwrap_or_default(),
              request.param_lossy("REQUEST_URI").unwrap_or_default());

        let mut response = Response::new(request_id, self.codec.outbound_mut());
        handler.call(request, &mut response);
        if !response.is_ended() {
            warn!("handler returned without ending request {}", request_id);
            response.finish();
        }

        self.policy.request_ended(request_id, flags);
        Progress::Dispatched { request_id }
    }

    /// Bytes waiting to be sent, leaving the internal buffer empty.
    pub fn take_outbound(&mut self) -> BytesMut {
        self.codec.take_outbound()
    }

    pub fn disposition(&self) -> Disposition {
        self.policy.disposition()
    }

    pub fn is_closing(&self) -> bool {
        self.policy.is_closing()
    }
}
