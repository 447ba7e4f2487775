mod actor;
mod backend;
mod redis;

pub use actor::{DocumentStoreActor, DocumentStoreHandle};
pub use backend::{DocumentBackend, MemoryBackend};
pub use self::redis::RedisBackend;

/// Collection name constants
pub mod collections {
    pub const USERS: &str = "users";
    pub const EVENTS: &str = "events";
    pub const TASK_HISTORY: &str = "task_history";
}
