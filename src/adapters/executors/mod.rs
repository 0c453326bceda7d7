//! Session executor adapters and decorators.

pub mod mock;
pub mod retrying;
pub mod throttled;

pub use mock::MockSessionExecutor;
pub use retrying::RetryingExecutor;
pub use throttled::ThrottledExecutor;
