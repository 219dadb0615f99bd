//! Batch results.
//!
//! Batch commands answer with exactly one [`BatchRecord`] per requested key,
//! in the order the keys were given. The transport may complete sub-requests
//! in any order; [`align`] restores request order and fills in a
//! not-found entry for every key the transport did not answer.

use serde::{Deserialize, Serialize};

use crate::key::{Key, Metadata, Record};
use crate::status::Status;
use crate::value::Bins;

/// Result for one key of a batch command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Per-key status: `OK`, `ERR_RECORD_NOT_FOUND` or a failure code.
    pub status: Status,
    /// Key as requested.
    pub key: Key,
    /// Bins, for found records of `batch_get` / `batch_select`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bins: Option<Bins>,
    /// Metadata, for found records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Metadata>,
}

impl BatchRecord {
    /// A found record.
    pub fn found(key: Key, bins: Option<Bins>, meta: Metadata) -> Self {
        Self {
            status: Status::OK,
            key,
            bins,
            meta: Some(meta),
        }
    }

    /// The not-found marker.
    pub fn not_found(key: Key) -> Self {
        Self {
            status: Status::ERR_RECORD_NOT_FOUND,
            key,
            bins: None,
            meta: None,
        }
    }

    /// Whether the record exists.
    pub fn is_found(&self) -> bool {
        self.status.is_ok()
    }

    /// The record, if found and bins were read.
    pub fn record(&self) -> Option<Record> {
        match (&self.bins, self.is_found()) {
            (Some(bins), true) => Some(Record::new(
                self.key.clone(),
                bins.clone(),
                self.meta.unwrap_or_default(),
            )),
            _ => None,
        }
    }
}

/// Put transport results into request order.
///
/// Result `i` corresponds to `keys[i]` and carries that key object. Keys the
/// transport did not answer get [`BatchRecord::not_found`]; answers that match
/// no requested key are dropped. Duplicate keys each consume one answer.
pub fn align(keys: &[Key], answers: Vec<BatchRecord>) -> Vec<BatchRecord> {
    let mut answers: Vec<Option<BatchRecord>> = answers.into_iter().map(Some).collect();
    let mut aligned = Vec::with_capacity(keys.len());

    for (i, key) in keys.iter().enumerate() {
        let matches =
            |a: &Option<BatchRecord>| a.as_ref().map_or(false, |a| a.key.same_record(key));

        // Fast path: the transport kept request order.
        let pos = if answers.get(i).map_or(false, |a| matches(a)) {
            Some(i)
        } else {
            answers.iter().position(|a| matches(a))
        };

        let entry = match pos.and_then(|pos| answers[pos].take()) {
            Some(mut answer) => {
                answer.key = key.clone();
                answer
            }
            None => BatchRecord::not_found(key.clone()),
        };
        aligned.push(entry);
    }

    aligned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bins;

    fn key(k: i64) -> Key {
        Key::new("test", "demo", k)
    }

    fn found(k: i64) -> BatchRecord {
        BatchRecord::found(key(k), Some(bins! { "k" => k }), Metadata::default())
    }

    #[test]
    fn test_order_is_restored() {
        let keys = vec![key(1), key(2), key(3)];
        let aligned = align(&keys, vec![found(3), found(1), found(2)]);

        let ids: Vec<_> = aligned
            .iter()
            .map(|r| r.record().unwrap().bins["k"].as_int().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_answers_become_not_found() {
        let keys = vec![key(1), key(2), key(3)];
        let aligned = align(&keys, vec![found(3), found(1)]);

        assert_eq!(aligned.len(), 3);
        assert!(aligned[0].is_found());
        assert!(!aligned[1].is_found());
        assert_eq!(aligned[1].status, Status::ERR_RECORD_NOT_FOUND);
        assert_eq!(aligned[1].key, key(2));
        assert!(aligned[2].is_found());
    }

    #[test]
    fn test_duplicate_keys_consume_one_answer_each() {
        let keys = vec![key(1), key(1)];
        let aligned = align(&keys, vec![found(1)]);
        assert!(aligned[0].is_found());
        assert!(!aligned[1].is_found());
    }

    #[test]
    fn test_results_carry_requested_key() {
        let requested = key(7);
        let answered = BatchRecord::found(
            requested.with_digest(vec![9; 20]),
            None,
            Metadata::default(),
        );
        let aligned = align(&[requested.clone()], vec![answered]);
        assert_eq!(aligned[0].key, requested);
        assert!(aligned[0].is_found());
        assert!(aligned[0].record().is_none(), "exists results carry no bins");
    }
}
