use crate::error::FastcgiResult;
use crate::lowlevel::BeginRequest;
use crate::params::{decode_params, ParamMap};
use crate::s11n::{Role, FCGI_KEEP_CONN};

use bytes::{Bytes, BytesMut};

use std::borrow::Cow;
use std::collections::HashMap;

/// A fully received request, handed by value to the application.
#[derive(Debug)]
pub struct FastcgiRequest {
    pub request_id: u16,
    pub role: Role,
    pub flags: u8,
    pub params: ParamMap,
    pub stdin: Bytes,
    /// FCGI_DATA stream; only the Filter role sends one.
    pub data: Bytes,
}

impl FastcgiRequest {
    pub fn keep_connection(&self) -> bool {
        (self.flags & FCGI_KEEP_CONN) == FCGI_KEEP_CONN
    }

    pub fn param(&self, name: &str) -> Option<&[u8]> {
        self.params.get(name.as_bytes()).map(|value| value.as_slice())
    }

    /// Param value as a string, with invalid UTF-8 replaced.
    pub fn param_lossy(&self, name: &str) -> Option<Cow<'_, str>> {
        self.param(name).map(String::from_utf8_lossy)
    }
}

#[derive(Debug)]
struct RequestState {
    role: Role,
    flags: u8,
    params_buf: BytesMut,
    params: ParamMap,
    params_done: bool,
    stdin: BytesMut,
    data: BytesMut,
}

impl RequestState {
    fn new(role: Role, flags: u8) -> RequestState {
        RequestState {
            role,
            flags,
            params_buf: BytesMut::new(),
            params: ParamMap::new(),
            params_done: false,
            stdin: BytesMut::new(),
            data: BytesMut::new(),
        }
    }

    fn finish_params(&mut self) -> FastcgiResult<()> {
        let params_buf = self.params_buf.split();
        self.params = decode_params(&params_buf)?;
        self.params_done = true;
        Ok(())
    }
}

/// Table of in-flight requests on one connection, keyed by request ID.
///
/// The table owns a request's state until its stdin stream ends; the finished request is then
/// removed and returned to the caller.
#[derive(Debug, Default)]
pub struct RequestAssembler {
    requests: HashMap<u16, RequestState>,
}

impl RequestAssembler {
    pub fn new() -> RequestAssembler {
        RequestAssembler::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn contains(&self, request_id: u16) -> bool {
        self.requests.contains_key(&request_id)
    }

    fn state(&mut self, request_id: u16) -> &mut RequestState {
        self.requests.entry(request_id).or_insert_with(|| {
            warn!("record for request {} before BeginRequest", request_id);
            RequestState::new(Role::Responder, 0)
        })
    }

    pub fn begin(&mut self, request_id: u16, begin: BeginRequest) {
        debug!("request {}: begin, role {:?}, keep connection {}",
               request_id, begin.role, begin.keep_connection());
        let state = RequestState::new(begin.role, begin.flags);
        if self.requests.insert(request_id, state).is_some() {
            warn!("request {} was already active; replacing it", request_id);
        }
    }

    /// Drop a request that hasn't been dispatched yet. Returns its flags if it was present.
    pub fn abort(&mut self, request_id: u16) -> Option<u8> {
        debug!("request {}: abort", request_id);
        self.requests.remove(&request_id).map(|state| state.flags)
    }

    /// Forget whatever was accumulated for `request_id`.
    pub fn discard(&mut self, request_id: u16) {
        if self.requests.remove(&request_id).is_some() {
            debug!("request {}: discarded partial state", request_id);
        }
    }

    /// Accumulate a Params record; the empty one ends the stream and decodes it.
    pub fn params(&mut self, request_id: u16, content: BytesMut) -> FastcgiResult<()> {
        let state = self.state(request_id);
        if content.is_empty() {
            debug!("request {}: end of params, {} bytes", request_id, state.params_buf.len());
            state.finish_params()
        } else {
            trace!("request {}: {} bytes of params", request_id, content.len());
            state.params_buf.extend_from_slice(&content);
            Ok(())
        }
    }

    /// Accumulate a Stdin record. The empty one completes the request, which is removed from
    /// the table and returned.
    pub fn stdin(&mut self, request_id: u16, content: BytesMut) -> FastcgiResult<Option<FastcgiRequest>> {
        if !content.is_empty() {
            let state = self.state(request_id);
            trace!("request {}: {} bytes of stdin", request_id, content.len());
            state.stdin.extend_from_slice(&content);
            return Ok(None);
        }

        let mut state = match self.requests.remove(&request_id) {
            Some(state) => state,
            None => {
                warn!("end of stdin for unknown request {}", request_id);
                RequestState::new(Role::Responder, 0)
            }
        };
        if !state.params_done {
            warn!("request {}: stdin ended before params", request_id);
            state.finish_params()?;
        }

        debug!("request {}: complete, {} params, {} bytes of stdin",
               request_id, state.params.len(), state.stdin.len());
        Ok(Some(FastcgiRequest {
            request_id,
            role: state.role,
            flags: state.flags,
            params: state.params,
            stdin: state.stdin.freeze(),
            data: state.data.freeze(),
        }))
    }

    pub fn data(&mut self, request_id: u16, content: BytesMut) {
        let state = self.state(request_id);
        trace!("request {}: {} bytes of data", request_id, content.len());
        state.data.extend_from_slice(&content);
    }
}
