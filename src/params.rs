//! The name-value pair encoding used by Params, GetValues and GetValuesResult content.
//!
//! Each length is one byte when it fits in 7 bits, otherwise four bytes, big-endian, with the
//! high bit of the first byte set.

use crate::error::{FastcgiError, FastcgiResult};

use byteorder::{ByteOrder, NetworkEndian};
use bytes::{Buf, BufMut, BytesMut};

use std::collections::HashMap;

const LONG_LENGTH_FLAG: u32 = 0x8000_0000;

pub type ParamMap = HashMap<Vec<u8>, Vec<u8>>;

fn read_len(buf: &mut &[u8]) -> FastcgiResult<usize> {
    if !buf.has_remaining() {
        return Err(FastcgiError::MalformedNameValue("missing length"));
    }
    let first_byte = buf[0];
    if first_byte < 0x80 {
        buf.advance(1);
        Ok(first_byte as usize)
    } else {
        if buf.remaining() < 4 {
            return Err(FastcgiError::MalformedNameValue("truncated 4-byte length"));
        }
        let len = NetworkEndian::read_u32(&buf[..4]) & !LONG_LENGTH_FLAG;
        buf.advance(4);
        Ok(len as usize)
    }
}

fn take<'a>(buf: &mut &'a [u8], len: usize) -> FastcgiResult<&'a [u8]> {
    if buf.len() < len {
        return Err(FastcgiError::MalformedNameValue("length runs past end of stream"));
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

/// Split a complete name-value stream into pairs, in wire order.
///
/// The whole span must be consumed: a pair whose declared lengths run past the end is an error.
pub fn read_params(mut buf: &[u8]) -> FastcgiResult<Vec<(&[u8], &[u8])>> {
    let mut params = vec![];
    while !buf.is_empty() {
        let name_len = read_len(&mut buf)?;
        let value_len = read_len(&mut buf)?;
        trace!("name_len = {}, value_len = {}", name_len, value_len);
        let name = take(&mut buf, name_len)?;
        let value = take(&mut buf, value_len)?;
        trace!("param ({}, {})",
               String::from_utf8_lossy(name),
               String::from_utf8_lossy(value));
        params.push((name, value));
    }
    Ok(params)
}

/// Decode a name-value stream into a map. Later duplicates replace earlier ones.
pub fn decode_params(buf: &[u8]) -> FastcgiResult<ParamMap> {
    let mut map = HashMap::new();
    for (name, value) in read_params(buf)? {
        map.insert(name.to_vec(), value.to_vec());
    }
    Ok(map)
}

fn write_len(buf: &mut BytesMut, len: usize) -> FastcgiResult<()> {
    if len < 0x80 {
        buf.put_u8(len as u8);
    } else if len < LONG_LENGTH_FLAG as usize {
        let mut bytes = [0u8; 4];
        NetworkEndian::write_u32(&mut bytes, len as u32 | LONG_LENGTH_FLAG);
        buf.put_slice(&bytes);
    } else {
        return Err(FastcgiError::NameValueTooLong(len));
    }
    Ok(())
}

/// Append the encoding of `params` to `out`.
pub fn write_params<I, N, V>(out: &mut BytesMut, params: I) -> FastcgiResult<()>
    where I: IntoIterator<Item = (N, V)>,
          N: AsRef<[u8]>,
          V: AsRef<[u8]>,
{
    for (name, value) in params {
        let (name, value) = (name.as_ref(), value.as_ref());
        write_len(out, name.len())?;
        write_len(out, value.len())?;
        out.extend_from_slice(name);
        out.extend_from_slice(value);
    }
    Ok(())
}
