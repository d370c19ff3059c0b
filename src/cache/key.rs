//! Cache key derivation.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::args::{ArgValue, QueryArgs};

/// Domain separator mixed into every digest so keys from a future format
/// never collide with this one.
const KEY_VERSION: &[u8] = b"eutils-cache-v1";

/// A fixed-size SHA-256 digest identifying one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, used as the primary key in persistent stores.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Encodes `(url, defining args)` into a [`CacheKey`].
///
/// The byte stream fed to the digest is the URL followed by every argument
/// in ascending key order. Strings are length-prefixed and values carry a
/// type tag, so the encoding is unambiguous and `7157` and `"7157"` yield
/// different keys. Client identity never reaches this function.
///
/// # Examples
///
/// ```
/// use eutils::args::QueryArgs;
/// use eutils::cache::CacheKeyCodec;
///
/// let url = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";
/// let a = QueryArgs::new().with("db", "gene").with("id", 7157);
/// let b = QueryArgs::new().with("id", 7157).with("db", "gene");
/// assert_eq!(CacheKeyCodec::encode(url, &a), CacheKeyCodec::encode(url, &b));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheKeyCodec;

impl CacheKeyCodec {
    pub fn encode(url: &str, defining_args: &QueryArgs) -> CacheKey {
        let mut hasher = Sha256::new();
        hasher.update(KEY_VERSION);
        write_str(&mut hasher, url);
        hasher.update((defining_args.len() as u64).to_le_bytes());

        for (key, value) in defining_args.iter() {
            write_str(&mut hasher, key);
            match value {
                ArgValue::Bool(b) => {
                    hasher.update([b'b', u8::from(*b)]);
                }
                ArgValue::Int(n) => {
                    hasher.update([b'i']);
                    hasher.update(n.to_le_bytes());
                }
                ArgValue::Str(s) => {
                    hasher.update([b's']);
                    write_str(&mut hasher, s);
                }
            }
        }

        CacheKey(hasher.finalize().into())
    }
}

fn write_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";

    #[test]
    fn stable_across_calls() {
        let args = QueryArgs::new().with("db", "gene").with("term", "VEGF");
        let first = CacheKeyCodec::encode(URL, &args);
        for _ in 0..10 {
            assert_eq!(CacheKeyCodec::encode(URL, &args), first);
        }
        assert_eq!(first.to_hex().len(), 64);
    }

    #[test]
    fn url_is_part_of_identity() {
        let args = QueryArgs::new().with("db", "gene");
        let other = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";
        assert_ne!(
            CacheKeyCodec::encode(URL, &args),
            CacheKeyCodec::encode(other, &args)
        );
    }

    #[test]
    fn value_type_matters() {
        let int = QueryArgs::new().with("id", 7157);
        let string = QueryArgs::new().with("id", "7157");
        assert_ne!(
            CacheKeyCodec::encode(URL, &int),
            CacheKeyCodec::encode(URL, &string)
        );
    }

    #[test]
    fn boundaries_are_unambiguous() {
        let a = QueryArgs::new().with("ab", "c");
        let b = QueryArgs::new().with("a", "bc");
        assert_ne!(CacheKeyCodec::encode(URL, &a), CacheKeyCodec::encode(URL, &b));
    }

    #[test]
    fn display_is_hex() {
        let key = CacheKeyCodec::encode(URL, &QueryArgs::new());
        assert_eq!(key.to_string(), key.to_hex());
        assert!(key.to_hex().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
