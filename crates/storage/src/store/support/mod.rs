#![forbid(unsafe_code)]

mod counters;
mod json;
mod schema;
mod time;
mod versions;

pub(super) use counters::next_counter_tx;
pub(super) use json::*;
pub(super) use schema::migrate_sqlite_schema;
pub(super) use time::now_ms;
pub(super) use versions::*;

/// `?, ?, ?` for an `IN (...)` list of `count` anonymous parameters.
pub(super) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
