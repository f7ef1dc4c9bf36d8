use std::io::{Error, ErrorKind, Read};
use std::result::Result;

use bgp_rs::{Capabilities, Message, Reader};
use byteorder::{NetworkEndian, ReadBytesExt};
use bytes::{Buf, BufMut, BytesMut};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder, Framed};
use twoway::find_bytes;

pub type MessageProtocol = Framed<TcpStream, MessageCodec>;

// Marker + length + type
const HEADER_LENGTH: usize = 19;
const MAX_MESSAGE_LENGTH: usize = 4096;

/// Frames BGP messages on a byte stream
///
/// Decoding depends on the negotiated capabilities (E.g. ADD-PATH NLRI
/// carry a path identifier), so these are updated once OPEN is received.
#[derive(Debug, Default)]
pub struct MessageCodec {
    capabilities: Capabilities,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    fn get_reader<T>(&self, stream: T) -> Reader<T, Capabilities>
    where
        T: Read,
    {
        Reader::<T, Capabilities> {
            stream,
            capabilities: self.capabilities.clone(),
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = Error;

    // Look for a BGP message (preamble + length), using bgp-rs to decode each message
    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Error> {
        match find_msg_range(buf)? {
            Some(range) => {
                let mut reader = self.get_reader(&buf[range.start..range.stop]);
                let (_header, message) = reader.read()?;
                buf.advance(range.stop);
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, message: Message, buf: &mut BytesMut) -> Result<(), Error> {
        message.encode(&mut buf.writer())
    }
}

#[derive(Debug)]
struct MsgRange {
    start: usize,
    stop: usize,
}

/// Given a stream of bytes, find the start and end of a complete BGP message
/// Returns None until enough bytes have arrived
fn find_msg_range(data: &[u8]) -> Result<Option<MsgRange>, Error> {
    let start = match find_bytes(data, &[255; 16]) {
        Some(start) => start,
        None => return Ok(None),
    };
    let mut buf = &data[start..];
    if buf.len() < HEADER_LENGTH {
        return Ok(None);
    }
    let mut _preamble: [u8; 16] = [0; 16];
    buf.read_exact(&mut _preamble)?;
    let length = buf.read_u16::<NetworkEndian>()? as usize;
    if !(HEADER_LENGTH..=MAX_MESSAGE_LENGTH).contains(&length) {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("Invalid BGP message length {}", length),
        ));
    }
    if data.len() - start < length {
        return Ok(None);
    }
    Ok(Some(MsgRange {
        start,
        stop: start + length,
    }))
}

#[cfg(test)]
mod tests {
    use bgp_rs::{NLRIEncoding, Prefix, Update, AFI};

    use super::*;

    fn keepalive_bytes() -> Vec<u8> {
        let mut data = vec![255; 16];
        data.extend_from_slice(&[0, 19, 4]);
        data
    }

    #[test]
    fn test_find_msg_range() {
        let mut data = [0u8; 64];
        data[..16].copy_from_slice(&[255; 16]);
        data[17] = 45;
        let range = find_msg_range(&data).unwrap().unwrap();
        assert_eq!(range.start, 0);
        assert_eq!(range.stop, 45);
    }

    #[test]
    fn test_find_msg_range_incomplete() {
        let data: [u8; 32] = [
            0, 45, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0,
        ];
        assert!(find_msg_range(&data).unwrap().is_none());

        // Header says 45 bytes, only 30 have arrived
        let mut data = [0u8; 30];
        data[..16].copy_from_slice(&[255; 16]);
        data[17] = 45;
        assert!(find_msg_range(&data).unwrap().is_none());
    }

    #[test]
    fn test_find_msg_range_invalid_length() {
        let mut data = [0u8; 32];
        data[..16].copy_from_slice(&[255; 16]);
        data[17] = 3;
        assert!(find_msg_range(&data).is_err());
    }

    #[test]
    fn test_decode_keepalives() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&keepalive_bytes());
        buf.extend_from_slice(&keepalive_bytes()[..10]);
        match codec.decode(&mut buf).unwrap() {
            Some(Message::KeepAlive) => (),
            other => panic!("Expected KEEPALIVE, got {:?}", other),
        }
        // Partial second message stays buffered
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 10);
        buf.extend_from_slice(&keepalive_bytes()[10..]);
        assert!(matches!(
            codec.decode(&mut buf).unwrap(),
            Some(Message::KeepAlive)
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_with_capabilities() {
        let withdrawal = Update {
            withdrawn_routes: vec![NLRIEncoding::IP_WITH_PATH_ID((
                Prefix {
                    protocol: AFI::IPV4,
                    length: 24,
                    prefix: vec![198, 51, 100, 0],
                },
                5,
            ))],
            attributes: vec![],
            announced_routes: vec![],
        };
        let mut codec = MessageCodec::new();
        let mut capabilities = Capabilities::default();
        capabilities.EXTENDED_PATH_NLRI_SUPPORT = true;
        codec.set_capabilities(capabilities);

        let mut buf = BytesMut::new();
        codec.encode(Message::Update(withdrawal), &mut buf).unwrap();
        match codec.decode(&mut buf).unwrap() {
            Some(Message::Update(update)) => match &update.withdrawn_routes[..] {
                [NLRIEncoding::IP_WITH_PATH_ID((prefix, path_id))] => {
                    assert_eq!(prefix.length, 24);
                    assert_eq!(*path_id, 5);
                }
                other => panic!("Unexpected NLRI {:?}", other),
            },
            other => panic!("Expected UPDATE, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_keepalive() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Message::KeepAlive, &mut buf).unwrap();
        assert_eq!(&buf[..], &keepalive_bytes()[..]);
    }
}
