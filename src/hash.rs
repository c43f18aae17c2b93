//! 32-bit non-cryptographic hashing shared by the response cache and the
//! connection table.
//!
//! Both callers need a stable, fast hash over a small byte key (a URL, or
//! the 4-byte little-endian encoding of a socket token) and nothing more —
//! MurmurHash3 x86/32 is the teacher's choice of non-cryptographic hash
//! elsewhere in the pack's caching code, and it's what the original source
//! used, so we keep it rather than reach for a cryptographic hasher the
//! cache/table don't need.

const SEED: u32 = 42;

const C1: u32 = 0xcc9e2d51;
const C2: u32 = 0x1b873593;

/// MurmurHash3 (x86, 32-bit) over `key`, seeded with 42.
pub fn murmur3_32(key: &[u8]) -> u32 {
    let mut h1: u32 = SEED;
    let chunks = key.chunks_exact(4);
    let tail = chunks.remainder();

    for chunk in chunks {
        let mut k1 = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);

        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let mut k1: u32 = 0;
    match tail.len() {
        3 => {
            k1 ^= (tail[2] as u32) << 16;
            k1 ^= (tail[1] as u32) << 8;
            k1 ^= tail[0] as u32;
            k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
            h1 ^= k1;
        }
        2 => {
            k1 ^= (tail[1] as u32) << 8;
            k1 ^= tail[0] as u32;
            k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
            h1 ^= k1;
        }
        1 => {
            k1 ^= tail[0] as u32;
            k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
            h1 ^= k1;
        }
        _ => {}
    }

    h1 ^= key.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85ebca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2ae35);
    h1 ^= h1 >> 16;
    h1
}

/// Hash a `mio::Token`-sized socket handle the way the connection table keys
/// its buckets: as its 4-byte little-endian representation.
pub fn hash_socket_handle(handle: usize) -> u32 {
    let bytes = (handle as u32).to_le_bytes();
    murmur3_32(&bytes)
}

/// Hash a cache key's URL bytes.
pub fn hash_url(url: &str) -> u32 {
    murmur3_32(url.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_hashes_to_seed_derived_constant() {
        // MurmurHash3 x86_32 with seed 42 over an empty buffer.
        assert_eq!(murmur3_32(&[]), finalize_seed());
    }

    fn finalize_seed() -> u32 {
        let mut h1 = SEED;
        h1 ^= 0;
        h1 ^= h1 >> 16;
        h1 = h1.wrapping_mul(0x85ebca6b);
        h1 ^= h1 >> 13;
        h1 = h1.wrapping_mul(0xc2b2ae35);
        h1 ^= h1 >> 16;
        h1
    }

    #[test]
    fn hash_is_deterministic() {
        let a = hash_url("https://www.nytimes.com/games/connections");
        let b = hash_url("https://www.nytimes.com/games/connections");
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_usually_differ() {
        let a = hash_url("https://example.com/one");
        let b = hash_url("https://example.com/two");
        assert_ne!(a, b);
    }

    #[test]
    fn socket_handle_hash_matches_le_bytes() {
        let handle = 0x1234_5678usize;
        let expected = murmur3_32(&(handle as u32).to_le_bytes());
        assert_eq!(hash_socket_handle(handle), expected);
    }
}
