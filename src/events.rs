//! Synthetic event records written by the producer.
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::conf::{ProducerConfig, MAX_TIMESTAMP_JITTER_SECS};

/// One synthetic record. A batch of records, one JSON document per line,
/// forms the value of a single message.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub id: u64,
    pub message: String,
}

/// A newline-joined batch of records, ready to be written as one message.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub records: usize,
    pub payload: String,
}

impl Batch {
    /// Parse the payload back into its records. Empty batches yield no records.
    #[cfg(test)]
    pub(crate) fn parse(payload: &str) -> Result<Vec<EventRecord>, serde_json::Error> {
        payload
            .lines()
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str)
            .collect()
    }
}

/// Produces batches of records with a random size in `0..max_records`.
///
/// Record ids come from a counter that increments once per record and is
/// never reset, so ids are unique and increasing across batches.
pub struct EventGenerator<R: Rng> {
    rng: R,
    counter: u64,
    max_records: usize,
    timestamp_jitter_secs: i64,
}

impl<R: Rng> EventGenerator<R> {
    pub fn new(rng: R, max_records: usize, timestamp_jitter_secs: i64) -> Self {
        Self {
            rng,
            counter: 0,
            max_records: max_records.max(1),
            timestamp_jitter_secs: timestamp_jitter_secs.clamp(0, MAX_TIMESTAMP_JITTER_SECS),
        }
    }

    pub fn from_config(rng: R, config: &ProducerConfig) -> Self {
        Self::new(rng, config.max_records_per_batch, config.timestamp_jitter_secs)
    }

    /// Number of records generated so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    fn next_timestamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.timestamp_jitter_secs == 0 {
            return now;
        }
        let shift = self.rng.random_range(0..self.timestamp_jitter_secs);
        TimeDelta::try_seconds(shift)
            .and_then(|shift| now.checked_sub_signed(shift))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Generate the next record, tagged with its position in the batch.
    pub fn next_record(&mut self, index: usize) -> EventRecord {
        self.counter += 1;
        let timestamp = self.next_timestamp(Utc::now());
        EventRecord {
            timestamp,
            id: self.counter,
            message: format!("message-{}", index),
        }
    }

    pub fn next_batch(&mut self) -> Result<Batch, serde_json::Error> {
        let records = self.rng.random_range(0..self.max_records);
        let lines = (0..records)
            .map(|index| serde_json::to_string(&self.next_record(index)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Batch {
            records,
            payload: lines.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{rngs::StdRng, SeedableRng};

    fn generator(seed: u64) -> EventGenerator<StdRng> {
        EventGenerator::new(StdRng::seed_from_u64(seed), 100, 3600)
    }

    #[test]
    fn batch_size_stays_below_bound() {
        let mut generator = generator(7);
        for _ in 0..500 {
            let batch = generator.next_batch().unwrap();
            assert!(batch.records <= 99);
            let lines = if batch.payload.is_empty() {
                0
            } else {
                batch.payload.split('\n').count()
            };
            assert_eq!(lines, batch.records);
        }
    }

    #[test]
    fn batch_sizes_vary() {
        let mut generator = generator(11);
        let sizes: std::collections::HashSet<usize> = (0..200)
            .map(|_| generator.next_batch().unwrap().records)
            .collect();
        assert!(sizes.len() > 10);
    }

    #[test]
    fn ids_are_monotonic_across_batches() {
        let mut generator = generator(3);
        let mut last_id = 0;
        for _ in 0..50 {
            let batch = generator.next_batch().unwrap();
            for record in Batch::parse(&batch.payload).unwrap() {
                assert_eq!(record.id, last_id + 1);
                last_id = record.id;
            }
        }
        assert_eq!(generator.counter(), last_id);
    }

    #[test]
    fn records_are_index_tagged() {
        let mut generator = generator(5);
        let batch = loop {
            let batch = generator.next_batch().unwrap();
            if batch.records > 2 {
                break batch;
            }
        };
        let records = Batch::parse(&batch.payload).unwrap();
        for (index, record) in records.iter().enumerate() {
            assert_eq!(record.message, format!("message-{}", index));
        }
    }

    #[test]
    fn timestamps_are_shifted_into_the_past() {
        let mut generator = generator(13);
        let before = Utc::now();
        for index in 0..100 {
            let record = generator.next_record(index);
            assert!(record.timestamp <= Utc::now());
            assert!(record.timestamp > before - TimeDelta::seconds(3600));
        }
    }

    #[test]
    fn zero_jitter_keeps_current_time() {
        let mut generator = EventGenerator::new(StdRng::seed_from_u64(1), 10, 0);
        let before = Utc::now();
        let record = generator.next_record(0);
        assert!(record.timestamp >= before);
    }

    #[test]
    fn oversized_jitter_is_capped() {
        let mut generator =
            EventGenerator::new(StdRng::seed_from_u64(2), 10, 9_000_000_000_000_000);
        let before = Utc::now();
        for index in 0..100 {
            let record = generator.next_record(index);
            assert!(record.timestamp <= Utc::now());
            assert!(record.timestamp > before - TimeDelta::seconds(MAX_TIMESTAMP_JITTER_SECS));
        }
    }

    #[test]
    fn single_record_bound_only_yields_empty_batches() {
        let mut generator = EventGenerator::new(StdRng::seed_from_u64(1), 1, 0);
        for _ in 0..20 {
            let batch = generator.next_batch().unwrap();
            assert_eq!(batch.records, 0);
            assert!(batch.payload.is_empty());
        }
    }

    #[test]
    fn record_serializes_as_one_line_json() {
        let record = EventRecord {
            timestamp: DateTime::from_timestamp(1_316_926_800, 0).unwrap(),
            id: 42,
            message: "message-3".to_string(),
        };
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(
            line,
            r#"{"timestamp":"2011-09-25T05:00:00Z","id":42,"message":"message-3"}"#
        );
    }
}
