//! Deterministic, total encoders and pure decoders for directory nodes and
//! chunked-file indices.
//!
//! Encoders never fail. Decoders fail with [`tree_core::Error::BadEncoding`]
//! on truncated input, an unknown link type, a name length that overflows
//! the buffer, a non-UTF-8 name, or a duplicate name within a directory.
//! Whether a node carries per-entry keys is a property of the node (whether
//! its *parent* CID was encrypted), not of the individual entry — so every
//! encode/decode call takes an explicit `encrypted` flag.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use tree_core::{Cid, Digest, Error, Key, LinkType, Result};

/// One named entry in a directory node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name, unique within its directory.
    pub name: String,
    /// Whether the target is a blob (file) or a nested directory.
    pub link_type: LinkType,
    /// CID of the target node.
    pub cid: Cid,
    /// Plaintext file size for a blob link, `0` for a dir link.
    pub size: u64,
}

/// One entry in a chunked-file index: a chunk's CID and its plaintext size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkEntry {
    /// CID of the stored chunk.
    pub cid: Cid,
    /// Plaintext size of this chunk.
    pub size: u64,
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

fn take(buf: &[u8], pos: &mut usize, n: usize) -> Result<&[u8]> {
    if buf.len() < *pos + n {
        return Err(Error::BadEncoding("truncated input".into()));
    }
    let out = &buf[*pos..*pos + n];
    *pos += n;
    Ok(out)
}

fn write_cid(out: &mut Vec<u8>, cid: &Cid, encrypted: bool) {
    out.extend_from_slice(&cid.digest.0);
    if encrypted {
        let key = cid.key.map(|k| k.0).unwrap_or([0u8; 32]);
        out.extend_from_slice(&key);
    }
}

fn read_cid(buf: &[u8], pos: &mut usize, encrypted: bool) -> Result<Cid> {
    let digest_bytes = take(buf, pos, 32)?;
    let mut d = [0u8; 32];
    d.copy_from_slice(digest_bytes);
    let digest = Digest(d);
    if encrypted {
        let key_bytes = take(buf, pos, 32)?;
        let mut k = [0u8; 32];
        k.copy_from_slice(key_bytes);
        Ok(Cid::encrypted(digest, Key(k)))
    } else {
        Ok(Cid::plain(digest))
    }
}

/// Encode a directory node. `encrypted` must match the encryption state of
/// the CID that will reference this node.
#[must_use]
pub fn encode_directory(entries: &[DirEntry], encrypted: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for e in entries {
        write_varint(&mut out, e.name.len() as u64);
        out.extend_from_slice(e.name.as_bytes());
        out.push(e.link_type.tag());
        write_cid(&mut out, &e.cid, encrypted);
        write_varint(&mut out, e.size);
    }
    out
}

/// Decode a directory node previously produced by [`encode_directory`].
pub fn decode_directory(buf: &[u8], encrypted: bool) -> Result<Vec<DirEntry>> {
    let mut pos = 0usize;
    let mut entries = Vec::new();
    let mut seen = std::collections::HashSet::new();
    while pos < buf.len() {
        let name_len = read_varint(buf, &mut pos)? as usize;
        let name_bytes = take(buf, &mut pos, name_len)?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| Error::BadEncoding("non-UTF-8 entry name".into()))?
            .to_string();
        let tag = *take(buf, &mut pos, 1)?.first().unwrap();
        let link_type = LinkType::from_tag(tag)
            .ok_or_else(|| Error::BadEncoding(format!("unknown link type tag {tag:#x}")))?;
        let cid = read_cid(buf, &mut pos, encrypted)?;
        let size = read_varint(buf, &mut pos)?;
        if !seen.insert(name.clone()) {
            return Err(Error::BadEncoding(format!("duplicate name: {name}")));
        }
        entries.push(DirEntry { name, link_type, cid, size });
    }
    Ok(entries)
}

/// Encode a chunked-file index.
#[must_use]
pub fn encode_chunk_index(chunks: &[ChunkEntry], encrypted: bool) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint(&mut out, chunks.len() as u64);
    for c in chunks {
        write_cid(&mut out, &c.cid, encrypted);
        write_varint(&mut out, c.size);
    }
    out
}

/// Decode a chunked-file index previously produced by [`encode_chunk_index`].
pub fn decode_chunk_index(buf: &[u8], encrypted: bool) -> Result<Vec<ChunkEntry>> {
    let mut pos = 0usize;
    let count = read_varint(buf, &mut pos)? as usize;
    let mut out = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let cid = read_cid(buf, &mut pos, encrypted)?;
        let size = read_varint(buf, &mut pos)?;
        out.push(ChunkEntry { cid, size });
    }
    if pos != buf.len() {
        return Err(Error::BadEncoding("trailing bytes after chunk index".into()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tree_core::Digest;

    fn entry(name: &str, size: u64) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            link_type: LinkType::Blob,
            cid: Cid::plain(Digest::of(name.as_bytes())),
            size,
        }
    }

    #[test]
    fn directory_roundtrip() {
        let entries = vec![entry("a", 5), entry("b", 7)];
        let bytes = encode_directory(&entries, false);
        let decoded = decode_directory(&bytes, false).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn directory_encrypted_roundtrip_carries_keys() {
        let e = DirEntry {
            name: "secret".into(),
            link_type: LinkType::Dir,
            cid: Cid::encrypted(Digest::of(b"x"), Key([7u8; 32])),
            size: 0,
        };
        let bytes = encode_directory(&[e.clone()], true);
        let decoded = decode_directory(&bytes, true).unwrap();
        assert_eq!(decoded, vec![e]);
    }

    #[test]
    fn duplicate_name_rejected() {
        let entries = vec![entry("a", 1), entry("a", 2)];
        let bytes = encode_directory(&entries, false);
        let err = decode_directory(&bytes, false).unwrap_err();
        assert!(matches!(err, Error::BadEncoding(_)));
    }

    #[test]
    fn truncated_input_rejected() {
        let entries = vec![entry("a", 1)];
        let mut bytes = encode_directory(&entries, false);
        bytes.truncate(bytes.len() - 5);
        assert!(decode_directory(&bytes, false).is_err());
    }

    #[test]
    fn unknown_link_type_rejected() {
        let entries = vec![entry("a", 1)];
        let mut bytes = encode_directory(&entries, false);
        // The link-type byte sits right after the name length + name bytes.
        let tag_pos = 1 + "a".len();
        bytes[tag_pos] = 0xEE;
        let err = decode_directory(&bytes, false).unwrap_err();
        assert!(matches!(err, Error::BadEncoding(_)));
    }

    #[test]
    fn non_utf8_name_rejected() {
        let mut bytes = Vec::new();
        write_varint(&mut bytes, 2);
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.push(LinkType::Blob.tag());
        bytes.extend_from_slice(&[0u8; 32]);
        write_varint(&mut bytes, 0);
        assert!(decode_directory(&bytes, false).is_err());
    }

    #[test]
    fn chunk_index_roundtrip() {
        let chunks = vec![
            ChunkEntry { cid: Cid::plain(Digest::of(b"c0")), size: 4 },
            ChunkEntry { cid: Cid::plain(Digest::of(b"c1")), size: 4 },
            ChunkEntry { cid: Cid::plain(Digest::of(b"c2")), size: 2 },
        ];
        let bytes = encode_chunk_index(&chunks, false);
        let decoded = decode_chunk_index(&bytes, false).unwrap();
        assert_eq!(decoded, chunks);
    }

    #[test]
    fn empty_directory_roundtrips() {
        let bytes = encode_directory(&[], false);
        assert!(bytes.is_empty());
        assert_eq!(decode_directory(&bytes, false).unwrap(), vec![]);
    }

    proptest! {
        #[test]
        fn directory_roundtrip_is_identity(
            names in prop::collection::vec("[a-zA-Z0-9_]{1,12}", 0..8),
            sizes in prop::collection::vec(0u64..1_000_000, 0..8),
        ) {
            // Dedup names: the codec itself enforces uniqueness, which the
            // construction layer (put_directory/set_entry) is responsible for
            // upholding before encoding.
            let mut unique = std::collections::HashSet::new();
            let mut entries = Vec::new();
            for (n, s) in names.iter().zip(sizes.iter()) {
                if unique.insert(n.clone()) {
                    entries.push(entry(n, *s));
                }
            }
            let bytes = encode_directory(&entries, false);
            let decoded = decode_directory(&bytes, false).unwrap();
            prop_assert_eq!(decoded, entries);
        }
    }
}
