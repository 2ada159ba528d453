//! These types prevent accidentally interpreting a network byte order integer as host byte order.

use byteorder::{ByteOrder, NetworkEndian};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkU16 {
    data: [u8; 2],
}

impl NetworkU16 {
    pub fn new(input: u16) -> NetworkU16 {
        let mut data = [0u8; 2];
        NetworkEndian::write_u16(&mut data, input);
        NetworkU16 { data }
    }

    /// Take two bytes exactly as they appeared on the wire.
    pub fn from_wire(bytes: &[u8]) -> NetworkU16 {
        NetworkU16 { data: [bytes[0], bytes[1]] }
    }

    pub fn get(&self) -> u16 {
        NetworkEndian::read_u16(&self.data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkU32 {
    data: [u8; 4],
}

impl NetworkU32 {
    pub fn new(input: u32) -> NetworkU32 {
        let mut data = [0u8; 4];
        NetworkEndian::write_u32(&mut data, input);
        NetworkU32 { data }
    }

    pub fn from_wire(bytes: &[u8]) -> NetworkU32 {
        NetworkU32 { data: [bytes[0], bytes[1], bytes[2], bytes[3]] }
    }

    pub fn get(&self) -> u32 {
        NetworkEndian::read_u32(&self.data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_big_endian() {
        let x = NetworkU16::new(0x1234);
        assert_eq!(x.as_bytes(), &[0x12, 0x34]);
        assert_eq!(x.get(), 0x1234);

        let y = NetworkU32::from_wire(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(y.get(), 0xdead_beef);
        assert_eq!(NetworkU32::new(0xdead_beef), y);
    }
}
