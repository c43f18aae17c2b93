//! Hash-indexed connection table, resized on load (§3 "Connection table",
//! §4.C).
//!
//! Keyed by socket handle (the OS file descriptor, doubling as the `mio`
//! registration token — see `event_loop`), bucketed the same shape as the
//! response cache: a flat array of small ordered `Vec`s. Growth never
//! moves a record's handle, only its bucket slot, so partner lookups by
//! handle stay valid across a resize (§8 property 4).

use super::record::ConnectionRecord;
use crate::hash::hash_socket_handle;

const INITIAL_SIZE: usize = 200;
const GROWTH_CAP: usize = 3000;

pub struct ConnTable {
    buckets: Vec<Vec<ConnectionRecord>>,
    size: usize,
    count: usize,
}

impl ConnTable {
    pub fn new() -> Self {
        ConnTable {
            buckets: (0..INITIAL_SIZE).map(|_| Vec::with_capacity(10)).collect(),
            size: INITIAL_SIZE,
            count: 0,
        }
    }

    fn index_for(handle: i32, size: usize) -> usize {
        (hash_socket_handle(handle as usize) as usize) % size
    }

    fn load_factor(&self) -> f64 {
        self.count as f64 / self.size as f64
    }

    /// Grow to `2*size + 2`, capped at 3000 buckets, rehashing every
    /// existing record under its primary handle (§3, §4.C, §8 property 4).
    fn grow(&mut self) {
        let new_size = (2 * self.size + 2).min(GROWTH_CAP);
        if new_size <= self.size {
            return;
        }
        let mut new_buckets: Vec<Vec<ConnectionRecord>> =
            (0..new_size).map(|_| Vec::with_capacity(10)).collect();
        for bucket in self.buckets.drain(..) {
            for record in bucket {
                let idx = Self::index_for(record.primary_handle(), new_size);
                new_buckets[idx].push(record);
            }
        }
        self.buckets = new_buckets;
        self.size = new_size;
    }

    /// Check load and grow if at/above 0.75, capped at 3000 buckets
    /// (§3 invariant). A no-op once the cap is reached.
    pub fn grow_if_needed(&mut self) {
        if self.load_factor() >= 0.75 && self.size < GROWTH_CAP {
            self.grow();
        }
    }

    pub fn insert(&mut self, record: ConnectionRecord) {
        let idx = Self::index_for(record.primary_handle(), self.size);
        self.buckets[idx].push(record);
        self.count += 1;
    }

    pub fn get(&self, handle: i32) -> Option<&ConnectionRecord> {
        let idx = Self::index_for(handle, self.size);
        self.buckets[idx]
            .iter()
            .find(|r| r.primary_handle() == handle)
    }

    pub fn get_mut(&mut self, handle: i32) -> Option<&mut ConnectionRecord> {
        let idx = Self::index_for(handle, self.size);
        self.buckets[idx]
            .iter_mut()
            .find(|r| r.primary_handle() == handle)
    }

    /// Look up an `origin_side` record whose primary handle is `handle`.
    /// `process()` (§4.D) uses this to decide whether readiness on `handle`
    /// is an origin-to-proxy event.
    pub fn get_origin_side(&self, handle: i32) -> Option<&ConnectionRecord> {
        self.get(handle)
            .filter(|r| r.role == super::record::Role::OriginSide)
    }

    pub fn remove(&mut self, handle: i32) -> Option<ConnectionRecord> {
        let idx = Self::index_for(handle, self.size);
        let bucket = &mut self.buckets[idx];
        let pos = bucket.iter().position(|r| r.primary_handle() == handle)?;
        self.count -= 1;
        Some(bucket.remove(pos))
    }

    pub fn contains(&self, handle: i32) -> bool {
        self.get(handle).is_some()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    #[cfg(test)]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for ConnTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::record::{ConnMode, ConnectionRecord, Transport};
    use mio::net::TcpStream;
    use std::net::TcpListener;

    fn dummy_stream() -> TcpStream {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let std_stream = std::net::TcpStream::connect(addr).unwrap();
        TcpStream::from_std(std_stream)
    }

    fn client_record(handle: i32) -> ConnectionRecord {
        ConnectionRecord::new_client_side(
            handle,
            "example.com".into(),
            443,
            ConnMode::Tunnel,
            Transport::Plain(dummy_stream()),
            0,
        )
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let mut table = ConnTable::new();
        table.insert(client_record(42));
        assert!(table.get(42).is_some());
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn remove_drops_record() {
        let mut table = ConnTable::new();
        table.insert(client_record(7));
        assert!(table.remove(7).is_some());
        assert!(table.get(7).is_none());
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn grows_past_load_factor_and_keeps_all_records() {
        let mut table = ConnTable::new();
        let initial_size = table.size();
        let threshold = (initial_size as f64 * 0.75) as i32 + 1;
        for handle in 0..threshold {
            table.insert(client_record(handle));
            table.grow_if_needed();
        }
        assert!(table.size() > initial_size);
        for handle in 0..threshold {
            assert!(table.get(handle).is_some(), "handle {handle} missing after grow");
        }
    }
}
