//! Hash-bucketed response cache keyed by `(url, origin_port)` (§3, §4.B).
//!
//! Grounded on the teacher's bucketed-table style (`router-core`'s
//! connection table in `proxy.h`'s C ancestor / `net::conn_table` in this
//! crate) and on `examples/original_source/cache.c`'s `getMaxAge` /
//! `evictRequest` for exact eviction and max-age semantics. The "default
//! max-age defect" the original has (§9) is not reproduced: the default
//! (3600s) only applies when no `Cache-Control: max-age=` line is found at
//! all.

pub mod entry;

use crate::byteutil::{parse_leading_decimal, split_lines, strip_prefix_ci};
use crate::clock::Clock;
use crate::error::CacheError;
use crate::hash::hash_url;
use entry::CacheEntry;

const DEFAULT_MAX_AGE_NS: u64 = 3600 * 1_000_000_000;
/// Growth hard cap shared with the connection table (§9 "Cache table
/// growth").
const GROWTH_CAP: usize = 3000;

#[derive(Debug, PartialEq)]
pub enum CacheLookup {
    Hit { bytes: Vec<u8>, age_seconds: u64 },
    Miss,
    Stale,
}

pub struct CacheTable {
    buckets: Vec<Vec<CacheEntry>>,
    size: usize,
    count: usize,
    count_limit: usize,
    clock: Clock,
}

impl CacheTable {
    pub fn new(initial_size: usize) -> Self {
        let size = initial_size.max(1);
        CacheTable {
            buckets: (0..size).map(|_| Vec::new()).collect(),
            size,
            count: 0,
            count_limit: Self::limit_for(size),
            clock: Clock::new(),
        }
    }

    fn limit_for(size: usize) -> usize {
        ((size as f64) * 0.75) as usize
    }

    fn bucket_index_for_size(url: &str, size: usize) -> usize {
        (hash_url(url) as usize) % size
    }

    fn bucket_index(&self, url: &str) -> usize {
        Self::bucket_index_for_size(url, self.size)
    }

    pub fn get(&mut self, url: &str, origin_port: u16) -> CacheLookup {
        let idx = self.bucket_index(url);
        let now = self.clock.now_ns();
        if let Some(entry) = self.buckets[idx]
            .iter_mut()
            .find(|e| e.matches(url, origin_port))
        {
            if now < entry.stale_at {
                entry.retrieved_at = now;
                let age_seconds = (now - entry.stored_at) / 1_000_000_000;
                return CacheLookup::Hit {
                    bytes: entry.response_bytes.clone(),
                    age_seconds,
                };
            }
            // Present but stale: caller treats as a miss, but eviction of a
            // stale entry only happens lazily on the next insert (§4.B).
            return CacheLookup::Stale;
        }
        CacheLookup::Miss
    }

    pub fn put(
        &mut self,
        url: String,
        origin_port: u16,
        bytes: Vec<u8>,
        header_len: usize,
    ) -> Result<(), CacheError> {
        let max_age_ns = extract_max_age_ns(&bytes[..header_len.min(bytes.len())]);
        let now = self.clock.now_ns();

        let idx = self.bucket_index(&url);
        if let Some(pos) = self.buckets[idx]
            .iter()
            .position(|e| e.matches(&url, origin_port))
        {
            self.buckets[idx][pos] = CacheEntry::new(url, origin_port, bytes, now, max_age_ns);
            return Ok(());
        }

        if self.count >= self.count_limit {
            if self.size < GROWTH_CAP {
                self.grow();
            } else {
                self.evict_one();
            }
        }

        let idx = self.bucket_index(&url);
        self.buckets[idx].push(CacheEntry::new(url, origin_port, bytes, now, max_age_ns));
        self.count += 1;
        Ok(())
    }

    /// Double-plus-two growth identical to the connection table's, capped
    /// at 3000 buckets (§9 supplement — see SPEC_FULL.md).
    fn grow(&mut self) {
        let new_size = (2 * self.size + 2).min(GROWTH_CAP);
        if new_size <= self.size {
            return;
        }
        let mut new_buckets: Vec<Vec<CacheEntry>> = (0..new_size).map(|_| Vec::new()).collect();
        for bucket in self.buckets.drain(..) {
            for entry in bucket {
                let idx = Self::bucket_index_for_size(&entry.url, new_size);
                new_buckets[idx].push(entry);
            }
        }
        self.buckets = new_buckets;
        self.size = new_size;
        self.count_limit = Self::limit_for(new_size);
    }

    /// Single sweep over all buckets: first stale entry wins; otherwise the
    /// entry with the smallest `retrieved_at`. Ties broken by lowest bucket
    /// index, then lowest position (§4.B).
    fn evict_one(&mut self) {
        let now = self.clock.now_ns();
        let mut stale_found: Option<(usize, usize)> = None;
        let mut lru_found: Option<(usize, usize, u64)> = None;

        'buckets: for (b_idx, bucket) in self.buckets.iter().enumerate() {
            for (pos, entry) in bucket.iter().enumerate() {
                if entry.is_stale(now) {
                    stale_found = Some((b_idx, pos));
                    break 'buckets;
                }
                match lru_found {
                    None => lru_found = Some((b_idx, pos, entry.retrieved_at)),
                    Some((_, _, best)) if entry.retrieved_at < best => {
                        lru_found = Some((b_idx, pos, entry.retrieved_at))
                    }
                    _ => {}
                }
            }
        }

        if let Some((b, p)) = stale_found.or_else(|| lru_found.map(|(b, p, _)| (b, p))) {
            self.buckets[b].remove(p);
            self.count -= 1;
        }
    }

    #[cfg(test)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[cfg(test)]
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Walk the response header line by line and extract `Cache-Control:
/// max-age=<seconds>`, converted to nanoseconds. Defaults to 3600s when
/// absent or malformed — deliberately NOT the original's defect where the
/// default gets overwritten by the loop's sentinel on non-matching lines
/// (§9 "Default max-age defect").
fn extract_max_age_ns(header_bytes: &[u8]) -> u64 {
    for line in split_lines(header_bytes) {
        if let Some(rest) = strip_prefix_ci(line, b"Cache-Control: max-age=") {
            if let Some(secs) = parse_leading_decimal(rest) {
                return secs * 1_000_000_000;
            }
        }
    }
    DEFAULT_MAX_AGE_NS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(max_age_line: &str) -> (Vec<u8>, usize) {
        let header = format!("HTTP/1.1 200 OK\r\n{max_age_line}\r\n\r\n");
        let body = b"<html></html>";
        let mut bytes = header.clone().into_bytes();
        bytes.extend_from_slice(body);
        (bytes, header.len())
    }

    #[test]
    fn put_then_get_hits_before_stale_at() {
        let mut table = CacheTable::new(16);
        let (bytes, header_len) = response("Cache-Control: max-age=120\r\n");
        table
            .put("https://x/a".into(), 443, bytes, header_len)
            .unwrap();
        match table.get("https://x/a", 443) {
            CacheLookup::Hit { age_seconds, .. } => assert_eq!(age_seconds, 0),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn missing_max_age_defaults_to_one_hour() {
        let mut table = CacheTable::new(16);
        let (bytes, header_len) = response("Foo: bar\r\n");
        table
            .put("https://x/a".into(), 443, bytes, header_len)
            .unwrap();
        // There is no public accessor for max_age_ns; verify indirectly:
        // a get() right away must still hit.
        assert!(matches!(table.get("https://x/a", 443), CacheLookup::Hit { .. }));
    }

    #[test]
    fn miss_for_unknown_key() {
        let mut table = CacheTable::new(16);
        assert_eq!(table.get("https://nope", 80), CacheLookup::Miss);
    }

    #[test]
    fn replace_in_place_keeps_count() {
        let mut table = CacheTable::new(16);
        let (bytes1, hl1) = response("Cache-Control: max-age=60\r\n");
        let (bytes2, hl2) = response("Cache-Control: max-age=90\r\n");
        table.put("https://x/a".into(), 80, bytes1, hl1).unwrap();
        assert_eq!(table.count(), 1);
        table.put("https://x/a".into(), 80, bytes2, hl2).unwrap();
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn table_grows_before_cap() {
        let mut table = CacheTable::new(4); // limit = 3
        for i in 0..4 {
            let (bytes, hl) = response("Cache-Control: max-age=60\r\n");
            table.put(format!("https://x/{i}"), 80, bytes, hl).unwrap();
        }
        assert!(table.size() > 4);
        assert_eq!(table.count(), 4);
    }
}
