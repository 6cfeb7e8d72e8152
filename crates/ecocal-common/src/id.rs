//! Snowflake identifiers for every stored row.

use snowflake::SnowflakeIdBucket;
use std::sync::{Mutex, PoisonError};

const DEFAULT_MACHINE: i32 = 1;
const DEFAULT_NODE: i32 = 1;

static BUCKET: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Sets the machine and node ids (each `0..32`) baked into new ids.
///
/// Without a call, ids are generated for machine 1, node 1.
pub fn init(machine_id: i32, node_id: i32) {
    let mut slot = BUCKET.lock().unwrap_or_else(PoisonError::into_inner);
    *slot = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Returns a fresh id as a decimal string.
pub fn next_id() -> String {
    let mut slot = BUCKET.lock().unwrap_or_else(PoisonError::into_inner);
    slot.get_or_insert_with(|| SnowflakeIdBucket::new(DEFAULT_MACHINE, DEFAULT_NODE))
        .get_id()
        .to_string()
}
