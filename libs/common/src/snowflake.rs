use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

/// Custom epoch: 2025-01-01T00:00:00Z in milliseconds since Unix epoch.
const FLOWDESK_EPOCH_MS: u64 = 1_735_689_600_000;

const WORKER_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

struct State {
    last_ms: u64,
    sequence: u64,
}

/// 64-bit snowflake ID generator.
///
/// Layout (MSB → LSB):
/// - Bits 63–22: Timestamp (42 bits), ms since the Flowdesk epoch
/// - Bits 21–12: Worker ID (10 bits)
/// - Bits 11–0:  Sequence (12 bits), per-ms counter
///
/// IDs from one generator are strictly increasing. If the wall clock steps
/// backwards the generator keeps issuing IDs against the last seen
/// millisecond, so the embedded timestamp never decreases either.
pub struct SnowflakeGenerator {
    worker_id: u64,
    state: Mutex<State>,
}

impl SnowflakeGenerator {
    pub fn new(worker_id: u16) -> Self {
        assert!(
            (worker_id as u64) < (1 << WORKER_BITS),
            "worker_id must fit in {WORKER_BITS} bits"
        );
        Self {
            worker_id: worker_id as u64,
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        }
    }

    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock();

        let mut now_ms = current_ms().max(state.last_ms);

        if now_ms == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond; borrow the next one.
                now_ms = state.last_ms + 1;
            }
        } else {
            state.sequence = 0;
        }

        state.last_ms = now_ms;

        let ts = now_ms - FLOWDESK_EPOCH_MS;
        let id = (ts << (WORKER_BITS + SEQUENCE_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | state.sequence;

        id as i64
    }
}

fn current_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(FLOWDESK_EPOCH_MS)
        .max(FLOWDESK_EPOCH_MS)
}

/// Extract the creation timestamp (ms since Unix epoch) from a snowflake ID.
pub fn snowflake_timestamp_ms(id: i64) -> u64 {
    let ts = (id as u64) >> (WORKER_BITS + SEQUENCE_BITS);
    ts + FLOWDESK_EPOCH_MS
}

/// Creation time of a snowflake ID as a UTC timestamp.
pub fn snowflake_created_at(id: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(snowflake_timestamp_ms(id) as i64)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_unique_ids() {
        let gen = SnowflakeGenerator::new(0);
        let mut ids = HashSet::new();
        for _ in 0..10_000 {
            let id = gen.generate();
            assert!(ids.insert(id), "duplicate snowflake: {id}");
        }
    }

    #[test]
    fn ids_and_timestamps_never_go_backwards() {
        let gen = SnowflakeGenerator::new(3);
        let mut prev = 0i64;
        for _ in 0..5_000 {
            let id = gen.generate();
            assert!(id > prev, "not monotonic: {prev} >= {id}");
            assert!(snowflake_timestamp_ms(id) >= snowflake_timestamp_ms(prev.max(1)));
            prev = id;
        }
    }

    #[test]
    fn created_at_matches_generation_time() {
        let gen = SnowflakeGenerator::new(0);
        let before = Utc::now().timestamp_millis();
        let id = gen.generate();
        let after = Utc::now().timestamp_millis();

        let created = snowflake_created_at(id).timestamp_millis();
        assert!(created >= before - 1 && created <= after + 1);
    }
}
