//! Binary wire frames for one peer session.
//!
//! Every application datagram begins with a 1-byte tag (`0x00` request,
//! `0x01` response) followed by a self-describing body. Digests are raw
//! 32-byte values; lengths and counts are LEB128 varints. CIDs never cross
//! the wire — only digests — so keys stay local to the identity that owns
//! them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use tree_core::{Digest, Error, Result};

const TAG_REQUEST: u8 = 0x00;
const TAG_RESPONSE: u8 = 0x01;

/// One application-layer datagram exchanged between two peer sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A request for a block by digest, carrying the hops-to-live budget
    /// the sender allows for further forwarding.
    Request {
        /// Digest of the requested block.
        hash: Digest,
        /// Hops-to-live remaining.
        htl: u8,
    },
    /// A block (or a fragment of one), sent in answer to a prior request.
    Response {
        /// Digest the response claims to satisfy.
        hash: Digest,
        /// Payload bytes: the whole block, or this fragment's slice of it.
        data: Vec<u8>,
        /// `Some((index, total))` when this response is one fragment of a
        /// larger payload split at the sender's `fragment_size`.
        fragment: Option<(u32, u32)>,
    },
}

fn write_varint(out: &mut Vec<u8>, value: u64) {
    leb128::write::unsigned(out, value).expect("writing to a Vec<u8> cannot fail");
}

fn read_varint(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let mut slice = &buf[*pos..];
    let start_len = slice.len();
    let value = leb128::read::unsigned(&mut slice)
        .map_err(|e| Error::BadEncoding(format!("truncated varint: {e}")))?;
    *pos += start_len - slice.len();
    Ok(value)
}

fn read_bytes<'a>(buf: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8]> {
    if buf.len() < *pos + n {
        return Err(Error::BadEncoding("truncated frame".into()));
    }
    let out = &buf[*pos..*pos + n];
    *pos += n;
    Ok(out)
}

fn read_digest(buf: &[u8], pos: &mut usize) -> Result<Digest> {
    let bytes = read_bytes(buf, pos, 32)?;
    let mut d = [0u8; 32];
    d.copy_from_slice(bytes);
    Ok(Digest(d))
}

/// Encode a frame for transmission. Never fails.
#[must_use]
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut out = Vec::new();
    match frame {
        Frame::Request { hash, htl } => {
            out.push(TAG_REQUEST);
            out.extend_from_slice(&hash.0);
            out.push(*htl);
        }
        Frame::Response { hash, data, fragment } => {
            out.push(TAG_RESPONSE);
            out.extend_from_slice(&hash.0);
            match fragment {
                Some((index, total)) => {
                    out.push(1);
                    write_varint(&mut out, u64::from(*index));
                    write_varint(&mut out, u64::from(*total));
                }
                None => out.push(0),
            }
            out.extend_from_slice(data);
        }
    }
    out
}

/// Decode a frame received from the wire.
pub fn decode(buf: &[u8]) -> Result<Frame> {
    if buf.is_empty() {
        return Err(Error::BadEncoding("empty frame".into()));
    }
    let tag = buf[0];
    let mut pos = 1usize;
    match tag {
        TAG_REQUEST => {
            let hash = read_digest(buf, &mut pos)?;
            let htl = *read_bytes(buf, &mut pos, 1)?.first().expect("checked length 1");
            Ok(Frame::Request { hash, htl })
        }
        TAG_RESPONSE => {
            let hash = read_digest(buf, &mut pos)?;
            let has_fragment = *read_bytes(buf, &mut pos, 1)?.first().expect("checked length 1");
            let fragment = match has_fragment {
                0 => None,
                1 => {
                    let index = read_varint(buf, &mut pos)? as u32;
                    let total = read_varint(buf, &mut pos)? as u32;
                    Some((index, total))
                }
                other => return Err(Error::BadEncoding(format!("unknown fragment flag {other:#x}"))),
            };
            let data = buf[pos..].to_vec();
            Ok(Frame::Response { hash, data, fragment })
        }
        other => Err(Error::BadEncoding(format!("unknown frame tag {other:#x}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn request_roundtrips() {
        let frame = Frame::Request { hash: Digest::of(b"x"), htl: 7 };
        assert_eq!(decode(&encode(&frame)).unwrap(), frame);
    }

    #[test]
    fn unfragmented_response_roundtrips() {
        let frame = Frame::Response { hash: Digest::of(b"x"), data: b"hello".to_vec(), fragment: None };
        assert_eq!(decode(&encode(&frame)).unwrap(), frame);
    }

    #[test]
    fn fragmented_response_roundtrips() {
        let frame = Frame::Response { hash: Digest::of(b"x"), data: b"part".to_vec(), fragment: Some((2, 4)) };
        assert_eq!(decode(&encode(&frame)).unwrap(), frame);
    }

    #[test]
    fn empty_frame_rejected() {
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(decode(&[0xFF, 0, 0, 0]).is_err());
    }

    #[test]
    fn truncated_request_rejected() {
        let frame = Frame::Request { hash: Digest::of(b"x"), htl: 3 };
        let mut bytes = encode(&frame);
        bytes.truncate(bytes.len() - 1);
        assert!(decode(&bytes).is_err());
    }

    proptest! {
        #[test]
        fn response_roundtrip_is_identity(
            seed in any::<[u8; 32]>(),
            data in prop::collection::vec(any::<u8>(), 0..64),
            fragment in prop::option::of((0u32..10, 1u32..10)),
        ) {
            let frame = Frame::Response { hash: Digest(seed), data, fragment };
            prop_assert_eq!(decode(&encode(&frame)).unwrap(), frame);
        }
    }
}
