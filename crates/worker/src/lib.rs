pub mod connection;
pub mod executors;
pub mod identity;
pub mod listener;
pub mod node;
pub mod pool;
pub mod reporter;
pub mod stats;
pub mod sync;

pub use connection::{TcpTransport, Transport};
pub use executors::{EchoExecutor, ExecutorRegistry, SleepExecutor, SumExecutor, TaskExecutor};
pub use identity::WorkerState;
pub use listener::TaskListener;
pub use node::WorkerNode;
pub use pool::{ActiveTaskCount, CompletionChannel, TaskPool};
pub use reporter::Reporter;
pub use stats::StatsCollector;
pub use sync::{SyncProtocol, SyncState};
