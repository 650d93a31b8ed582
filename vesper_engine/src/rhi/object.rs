/// Object id generation shared by every RHI resource
///
/// Ids are unique per process and never reused; caches and the binding
/// deduplication tables rely on that.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate the next RHI object id
pub fn next_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}
