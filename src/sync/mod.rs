pub mod events;
pub mod store;
pub mod retry;
pub mod scheduler;
pub mod synchronizer;

pub use events::{ConnectionStatus, EventBus, Notice, NoticeLevel, PlannerEvent};
pub use store::{JsonFileStore, MemoryStore, PlanRecord, PlanStore, StudentId};
pub use retry::{with_reconnect, RetryPolicy};
pub use scheduler::{PendingWrite, WriteScheduler, DEFAULT_QUIET_WINDOW};
pub use synchronizer::{Generation, LoadOutcome, PlanSynchronizer};
