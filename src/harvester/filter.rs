//! Result shaping for harvested repositories

use tracing::debug;

use crate::ResourceRecord;

/// Pure post-processing of a merged repository listing
///
/// Steps, in order:
/// 1. drop forks
/// 2. most recently updated first
/// 3. keep the first `max_count` (0 keeps everything)
/// 4. smallest first, so downstream consumers get quick wins early
///
/// Both sorts are stable: equal keys keep their previous relative order.
pub struct ResourceFilter;

impl ResourceFilter {
    /// Shape a merged listing
    pub fn shape(records: Vec<ResourceRecord>, max_count: usize) -> Vec<ResourceRecord> {
        let mut shaped: Vec<ResourceRecord> = records.into_iter().filter(|r| !r.is_fork).collect();

        shaped.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        if max_count > 0 {
            shaped.truncate(max_count);
        }

        shaped.sort_by_key(|r| r.size);

        for record in &shaped {
            debug!("{} {} {}", record.updated_at.to_rfc3339(), record.size, record.name);
        }

        shaped
    }
}
