pub mod identity;
pub mod message;
pub mod stats;
pub mod task;
pub mod wire;

pub use identity::*;
pub use message::*;
pub use stats::*;
pub use task::*;
pub use taskfarm_errors::{WorkerError, WorkerResult};
