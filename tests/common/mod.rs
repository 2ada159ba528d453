#![allow(dead_code)]

use bytes::BytesMut;
use fastcgi_codec::*;
use tokio_util::codec::{Decoder, Encoder};

use std::cell::RefCell;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn record(buf: &mut BytesMut, request_id: u16, body: FastcgiRecordBody) {
    FastcgiLowlevelCodec.encode(FastcgiRecord { request_id, body }, buf).unwrap();
}

pub fn begin(buf: &mut BytesMut, request_id: u16, flags: u8) {
    record(buf, request_id, FastcgiRecordBody::BeginRequest(BeginRequest {
        role: Role::Responder,
        flags,
    }));
}

/// One Params record holding all of `pairs`, if any, then the terminator.
pub fn params(buf: &mut BytesMut, request_id: u16, pairs: &[(&str, &str)]) {
    if !pairs.is_empty() {
        let mut content = BytesMut::new();
        write_params(&mut content, pairs.iter().cloned()).unwrap();
        record(buf, request_id, FastcgiRecordBody::Params(content));
    }
    record(buf, request_id, FastcgiRecordBody::Params(BytesMut::new()));
}

/// Stdin content, if any, then the terminator.
pub fn stdin(buf: &mut BytesMut, request_id: u16, data: &[u8]) {
    if !data.is_empty() {
        record(buf, request_id, FastcgiRecordBody::Stdin(BytesMut::from(data)));
    }
    record(buf, request_id, FastcgiRecordBody::Stdin(BytesMut::new()));
}

pub fn request(request_id: u16, flags: u8, pairs: &[(&str, &str)], data: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    begin(&mut buf, request_id, flags);
    params(&mut buf, request_id, pairs);
    stdin(&mut buf, request_id, data);
    buf
}

pub fn decode_all(mut bytes: BytesMut) -> Vec<FastcgiRecord> {
    let mut records = vec![];
    while let Some(record) = FastcgiLowlevelCodec.decode(&mut bytes).unwrap() {
        records.push(record);
    }
    assert!(bytes.is_empty(), "{} trailing bytes", bytes.len());
    records
}

/// Echoes stdin to stdout and keeps every request it was given.
#[derive(Default)]
pub struct Recorder {
    pub seen: RefCell<Vec<FastcgiRequest>>,
}

impl FastcgiRequestHandler for Recorder {
    fn call(&self, request: FastcgiRequest, response: &mut Response<'_>) {
        response.send_stdout(b"Content-Type: text/plain\r\n\r\n");
        response.send_stdout(&request.stdin);
        response.end_stdout();
        response.end_request(0, ProtocolStatus::RequestComplete);
        self.seen.borrow_mut().push(request);
    }
}

/// Run `process` until it reports `Short` or the connection is done, collecting dispatched ids.
pub fn drain<H>(connection: &mut FastcgiConnection, inbound: &mut BytesMut, handler: &H)
    -> FastcgiResult<Vec<u16>>
    where H: FastcgiRequestHandler
{
    let mut ids = vec![];
    loop {
        match connection.process(inbound, handler)? {
            Progress::Short => return Ok(ids),
            Progress::Dispatched { request_id } => ids.push(request_id),
        }
        if connection.is_closing() {
            return Ok(ids);
        }
    }
}
