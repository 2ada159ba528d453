use crate::endian::NetworkU32;
use crate::lowlevel::write_record;
use crate::s11n::*;

use bytes::BytesMut;

use std::io;

/// Append `bytes` as a series of stream records of at most 0xFFFF bytes each.
/// An empty `bytes` writes nothing; use `write_stream_end` for the terminator.
pub fn write_stream(buf: &mut BytesMut, record_type: RecordType, request_id: u16, bytes: &[u8]) {
    for chunk in bytes.chunks(MAX_CONTENT_LENGTH) {
        write_record(buf, record_type as u8, request_id, chunk);
    }
}

/// Append the empty record that closes a stream.
pub fn write_stream_end(buf: &mut BytesMut, record_type: RecordType, request_id: u16) {
    write_record(buf, record_type as u8, request_id, &[]);
}

pub fn write_end_request(
    buf: &mut BytesMut,
    request_id: u16,
    app_status: u32,
    protocol_status: ProtocolStatus,
    )
{
    let mut body = BytesMut::with_capacity(HEADER_LEN);
    EndRequestBody {
        app_status: NetworkU32::new(app_status),
        protocol_status: protocol_status as u8,
        reserved: [0u8; 3],
    }.write_to(&mut body);
    write_record(buf, RecordType::EndRequest as u8, request_id, &body);
}

/// The output side of one request.
///
/// Every call appends complete records to the connection's send buffer. Writing through
/// `std::io::Write` goes to the stdout stream.
pub struct Response<'a> {
    request_id: u16,
    out: &'a mut BytesMut,
    ended: bool,
}

impl<'a> Response<'a> {
    pub fn new(request_id: u16, out: &'a mut BytesMut) -> Response<'a> {
        Response {
            request_id,
            out,
            ended: false,
        }
    }

    pub fn request_id(&self) -> u16 {
        self.request_id
    }

    /// Whether `end_request` has been called.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn send_stdout(&mut self, bytes: &[u8]) {
        trace!("request {}: {} bytes of stdout", self.request_id, bytes.len());
        write_stream(self.out, RecordType::Stdout, self.request_id, bytes);
    }

    pub fn send_stderr(&mut self, bytes: &[u8]) {
        trace!("request {}: {} bytes of stderr", self.request_id, bytes.len());
        write_stream(self.out, RecordType::Stderr, self.request_id, bytes);
    }

    pub fn end_stdout(&mut self) {
        write_stream_end(self.out, RecordType::Stdout, self.request_id);
    }

    pub fn end_stderr(&mut self) {
        write_stream_end(self.out, RecordType::Stderr, self.request_id);
    }

    pub fn end_request(&mut self, app_status: u32, protocol_status: ProtocolStatus) {
        debug!("request {}: end, app status {}, {:?}",
               self.request_id, app_status, protocol_status);
        if self.ended {
            warn!("request {} ended twice", self.request_id);
        }
        write_end_request(self.out, self.request_id, app_status, protocol_status);
        self.ended = true;
    }

    /// Close stdout and report the request complete with status 0.
    pub fn finish(&mut self) {
        self.end_stdout();
        self.end_request(0, ProtocolStatus::RequestComplete);
    }
}

impl io::Write for Response<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send_stdout(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// (type, request id, content length, padding length) of each record in `buf`.
    fn headers(buf: &[u8]) -> Vec<(u8, u16, usize, usize)> {
        let mut out = vec![];
        let mut rest = buf;
        while !rest.is_empty() {
            let header = FastcgiRecordHeader::parse(rest);
            let content = header.content_length.get() as usize;
            let padding = header.padding_length as usize;
            out.push((header.record_type, header.request_id.get(), content, padding));
            rest = &rest[HEADER_LEN + content + padding..];
        }
        out
    }

    #[test]
    fn long_stdout_is_chunked() {
        let mut buf = BytesMut::new();
        Response::new(5, &mut buf).send_stdout(&vec![b'x'; 70000]);
        assert_eq!(headers(&buf), vec![(6, 5, 65535, 1), (6, 5, 4465, 7)]);
        assert_eq!(buf.len(), 8 + 65536 + 8 + 4472);
    }

    #[test]
    fn padding_law_holds() {
        for len in 0..40usize {
            let mut buf = BytesMut::new();
            Response::new(1, &mut buf).send_stderr(&vec![1u8; len]);
            for (typ, _, content, padding) in headers(&buf) {
                assert_eq!(typ, RecordType::Stderr as u8);
                assert_eq!((content + padding) % 8, 0);
                assert!(padding <= 7);
            }
            // padding bytes are zero
            if len > 0 {
                assert!(buf[HEADER_LEN + len..].iter().all(|&b| b == 0));
            }
        }
    }

    #[test]
    fn empty_send_writes_nothing() {
        let mut buf = BytesMut::new();
        let mut response = Response::new(1, &mut buf);
        response.send_stdout(b"");
        response.send_stderr(b"");
        assert!(buf.is_empty());
    }

    #[test]
    fn terminators_and_end_request() {
        let mut buf = BytesMut::new();
        {
            let mut response = Response::new(0x0102, &mut buf);
            response.end_stdout();
            response.end_stderr();
            response.end_request(7, ProtocolStatus::RequestComplete);
            assert!(response.is_ended());
        }
        assert_eq!(&buf[..], &[
            1u8, 6, 1, 2, 0, 0, 0, 0,
            1, 7, 1, 2, 0, 0, 0, 0,
            1, 3, 1, 2, 0, 8, 0, 0,
            0, 0, 0, 7, 0, 0, 0, 0,
        ][..]);
    }

    #[test]
    fn write_goes_to_stdout() {
        let mut buf = BytesMut::new();
        {
            let mut response = Response::new(3, &mut buf);
            response.write_all(b"Status: 200\r\n\r\n").unwrap();
            response.finish();
        }
        assert_eq!(headers(&buf), vec![(6, 3, 15, 1), (6, 3, 0, 0), (3, 3, 8, 0)]);
        assert_eq!(&buf[8..23], b"Status: 200\r\n\r\n");
    }
}
