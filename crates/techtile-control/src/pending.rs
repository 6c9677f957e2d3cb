//! Pending request table.
//!
//! Shared between the dispatcher, the acknowledgment reconciler and the
//! expiry sweeper. Every terminal operation (ack-remove or expire-remove) is
//! a single atomic map operation, so an entry can leave the table only once.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::command::{PendingRequest, RequestId};

/// Concurrent table of dispatched, unacknowledged, unexpired requests.
#[derive(Debug, Default)]
pub struct PendingRequestTable {
    entries: DashMap<RequestId, PendingRequest>,
}

impl PendingRequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly dispatched request.
    pub fn insert(&self, request: PendingRequest) {
        self.entries.insert(request.request_id.clone(), request);
    }

    /// Atomically remove and return an entry.
    ///
    /// Returns `None` when the entry was never present or was already taken
    /// by another terminal operation.
    pub fn take(&self, request_id: &RequestId) -> Option<PendingRequest> {
        self.entries.remove(request_id).map(|(_, request)| request)
    }

    /// Remove every entry strictly older than `bound` at `now`.
    ///
    /// The age check is re-evaluated under the shard lock of each candidate,
    /// so an entry taken concurrently is skipped rather than removed twice.
    pub fn remove_expired(&self, now: DateTime<Utc>, bound: Duration) -> Vec<PendingRequest> {
        let candidates: Vec<RequestId> = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired(now, bound))
            .map(|entry| entry.key().clone())
            .collect();

        candidates
            .into_iter()
            .filter_map(|id| {
                self.entries
                    .remove_if(&id, |_, request| request.is_expired(now, bound))
                    .map(|(_, request)| request)
            })
            .collect()
    }

    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.entries.contains_key(request_id)
    }

    pub fn get(&self, request_id: &RequestId) -> Option<PendingRequest> {
        self.entries.get(request_id).map(|entry| entry.clone())
    }

    /// Snapshot of all in-flight requests, oldest first.
    pub fn list(&self) -> Vec<PendingRequest> {
        let mut requests: Vec<PendingRequest> =
            self.entries.iter().map(|entry| entry.clone()).collect();
        requests.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        requests
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ControlCommand, DeviceId};
    use std::sync::Arc;

    fn request(device: &str, age_secs: i64) -> PendingRequest {
        let mut request = PendingRequest::new(
            RequestId::generate(),
            DeviceId::parse(device).unwrap(),
            ControlCommand::Reboot,
        );
        request.submitted_at = Utc::now() - Duration::seconds(age_secs);
        request
    }

    #[test]
    fn test_insert_and_take() {
        let table = PendingRequestTable::new();
        let req = request("rpi-1", 0);
        let id = req.request_id.clone();

        table.insert(req);
        assert!(table.contains(&id));
        assert_eq!(table.len(), 1);

        let taken = table.take(&id).expect("entry present");
        assert_eq!(taken.request_id, id);
        assert!(table.take(&id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_expired_only_old_entries() {
        let table = PendingRequestTable::new();
        let old = request("rpi-1", 61);
        let fresh = request("rpi-2", 5);
        let old_id = old.request_id.clone();
        let fresh_id = fresh.request_id.clone();
        table.insert(old);
        table.insert(fresh);

        let removed = table.remove_expired(Utc::now(), Duration::seconds(60));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].request_id, old_id);
        assert!(table.contains(&fresh_id));
        assert!(!table.contains(&old_id));
    }

    #[test]
    fn test_list_is_oldest_first() {
        let table = PendingRequestTable::new();
        table.insert(request("rpi-1", 10));
        table.insert(request("rpi-2", 30));
        table.insert(request("rpi-1", 20));

        let all = table.list();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].submitted_at <= w[1].submitted_at));
        assert_eq!(all[0].device_id.as_str(), "rpi-2");
    }

    #[test]
    fn test_take_and_expire_race_is_single_terminal() {
        let table = Arc::new(PendingRequestTable::new());
        let ids: Vec<RequestId> = (0..200)
            .map(|_| {
                let req = request("rpi-1", 120);
                let id = req.request_id.clone();
                table.insert(req);
                id
            })
            .collect();

        let taker = {
            let table = table.clone();
            let ids = ids.clone();
            std::thread::spawn(move || ids.iter().filter(|id| table.take(id).is_some()).count())
        };
        let swept = table.remove_expired(Utc::now(), Duration::seconds(60)).len();
        let taken = taker.join().unwrap();

        assert_eq!(taken + swept, ids.len());
        assert!(table.is_empty());
    }
}
