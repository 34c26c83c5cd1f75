//! Content hashing using SHA-256.
//!
//! Every object id in twig is the digest of an ordered list of fragments,
//! hex-encoded to 64 lowercase characters.

use sha2::{Digest, Sha256};

/// Length of a full object id in hex characters.
pub const ID_LEN: usize = 64;

/// Digest an ordered sequence of fragments into a hex id.
///
/// Each fragment is preceded by its length as a big-endian u64, so two
/// different fragment lists never feed the hasher the same bytes.
pub fn digest<I, T>(fragments: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for fragment in fragments {
        let bytes = fragment.as_ref();
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

/// Id of a blob: the file name followed by its raw bytes.
pub fn blob_id(name: &str, content: &[u8]) -> String {
    digest([name.as_bytes(), content])
}

/// True if `s` looks like a full object id.
pub fn is_full_id(s: &str) -> bool {
    s.len() == ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}
