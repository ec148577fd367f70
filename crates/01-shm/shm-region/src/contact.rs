//! Contact tokens: the bytes a peer needs to locate and size a region.
//!
//! The wire formats are fixed and backend-specific:
//!
//! ```text
//! file-mapping:  [path bytes][0x00][usize length, native endian]
//! POSIX-named:   [name bytes][0x00][usize length, native endian]
//! SysV:          [key widened to usize width, native endian]
//! ```
//!
//! A token produced by one backend can only be consumed by the same backend;
//! handing it to another yields a decode error (or, for byte-compatible
//! shapes, a nonsense identity the OS will refuse). Tokens travel over an
//! out-of-band channel this crate does not provide.

use crate::error::{RegionError, RegionResult};
use std::mem::size_of;

/// Opaque, caller-owned byte string identifying a region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactToken(Vec<u8>);

impl ContactToken {
    /// Wraps bytes received from a peer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The serialized token bytes, ready for the out-of-band channel.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the token, yielding its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Serialized length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the token is empty (never true for a produced token).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for ContactToken {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Encodes a NUL-terminated name followed by the region length.
pub(crate) fn encode_named(name: &[u8], len: usize) -> RegionResult<ContactToken> {
    if name.contains(&0) {
        return Err(RegionError::InvalidName);
    }
    let mut bytes = Vec::with_capacity(name.len() + 1 + size_of::<usize>());
    bytes.extend_from_slice(name);
    bytes.push(0);
    bytes.extend_from_slice(&len.to_ne_bytes());
    Ok(ContactToken(bytes))
}

/// Decodes a name-shaped token into its name bytes and region length.
pub(crate) fn decode_named(token: &ContactToken) -> RegionResult<(&[u8], usize)> {
    let bytes = token.as_bytes();
    let nul = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or(RegionError::BadContact("missing name terminator"))?;
    if nul == 0 {
        return Err(RegionError::BadContact("empty name"));
    }
    let rest = &bytes[nul + 1..];
    if rest.len() != size_of::<usize>() {
        return Err(RegionError::BadContact("bad length field"));
    }
    let mut buf = [0u8; size_of::<usize>()];
    buf.copy_from_slice(rest);
    Ok((&bytes[..nul], usize::from_ne_bytes(buf)))
}

/// Encodes a SysV key, widened to pointer width so the token length does not
/// depend on the platform's `key_t`.
pub(crate) fn encode_key(key: libc::key_t) -> ContactToken {
    ContactToken((key as isize).to_ne_bytes().to_vec())
}

/// Decodes a key-shaped token.
pub(crate) fn decode_key(token: &ContactToken) -> RegionResult<libc::key_t> {
    let bytes = token.as_bytes();
    if bytes.len() != size_of::<isize>() {
        return Err(RegionError::BadContact("bad key width"));
    }
    let mut buf = [0u8; size_of::<isize>()];
    buf.copy_from_slice(bytes);
    Ok(isize::from_ne_bytes(buf) as libc::key_t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_round_trip() {
        let token = encode_named(b"/tmp/df_shm_mmap.42.abc123", 8192).expect("encode");
        let (name, len) = decode_named(&token).expect("decode");
        assert_eq!(name, b"/tmp/df_shm_mmap.42.abc123");
        assert_eq!(len, 8192);
        assert_eq!(
            token.len(),
            b"/tmp/df_shm_mmap.42.abc123".len() + 1 + size_of::<usize>()
        );
    }

    #[test]
    fn key_round_trip() {
        for key in [0, 1, 0x7FFF_FFFF, -1, -42] {
            let token = encode_key(key);
            assert_eq!(token.len(), size_of::<isize>());
            assert_eq!(decode_key(&token).expect("decode"), key);
        }
    }

    #[test]
    fn nul_in_name_is_rejected() {
        assert!(matches!(
            encode_named(b"bad\0name", 4096),
            Err(RegionError::InvalidName)
        ));
    }

    /// A key token is not a valid named token and vice versa.
    #[test]
    fn cross_shape_decoding_fails() {
        let key_token = encode_key(7);
        assert!(decode_named(&key_token).is_err());

        let named = encode_named(b"/name", 4096).expect("encode");
        assert!(decode_key(&named).is_err());
    }

    #[test]
    fn truncated_tokens_fail() {
        let token = encode_named(b"/name", 4096).expect("encode");
        let cut = ContactToken::from_bytes(&token.as_bytes()[..token.len() - 1]);
        assert!(matches!(
            decode_named(&cut),
            Err(RegionError::BadContact(_))
        ));

        assert!(decode_named(&ContactToken::from_bytes(b"no-terminator".as_slice())).is_err());
        assert!(decode_key(&ContactToken::from_bytes(b"short".as_slice())).is_err());
    }
}
