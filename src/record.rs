// Storable record trait

use serde::{Deserialize, Serialize};

/// Anything the store can persist as one JSONL line per version
pub trait Record: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync + 'static {
    /// Unique identifier for this record
    fn id(&self) -> &str;

    /// Milliseconds since epoch of the last write; the highest value wins on load
    fn updated_at(&self) -> i64;

    /// Collection name, which is also the JSONL file stem: {collection}.jsonl
    fn collection_name() -> &'static str
    where
        Self: Sized;
}
