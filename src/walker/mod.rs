//! Wave-based share walker
//!
//! Each namespace is traversed breadth-first by its own scheduler, ten
//! directories per wave. Leaf results are folded in dispatch order, full
//! batches are delivered as soon as they exist, and the scheduler state is
//! checkpointed after every wave.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │      Coordinator        │
//!                     │  - discovery / manifest │
//!                     │  - namespace semaphore  │
//!                     └───────────┬─────────────┘
//!                                 │
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼──────┐            ┌─────▼──────┐            ┌─────▼──────┐
//! │ Scheduler  │            │ Scheduler  │            │ Scheduler  │
//! │ share A    │            │ share B    │            │ share N    │
//! │ frontier   │            │ frontier   │            │ frontier   │
//! │ batches    │            │ batches    │            │ batches    │
//! └─────┬──────┘            └────────────┘            └────────────┘
//!       │ wave: up to 10 leaf tasks, joined in dispatch order
//!       ▼
//! ┌────────────┐   full batches   ┌────────┐   after each wave   ┌────────────┐
//! │ Accumulator├─────────────────►│  Sink  │                     │ Checkpoint │
//! └────────────┘                  └────────┘                     │    log     │
//!                                                                └────────────┘
//! ```

pub mod accumulator;
pub mod coordinator;
pub mod exclude;
pub mod frontier;
pub mod leaf;
pub mod scheduler;
pub mod types;

pub use accumulator::BatchAccumulator;
pub use coordinator::Coordinator;
pub use exclude::ExcludeSet;
pub use frontier::Frontier;
pub use leaf::{scan_directory, LeafContext};
pub use scheduler::{NamespaceScheduler, SchedulerEnv};
pub use types::{
    ErrorLog, FileHash, FileRecord, NamespaceCounters, NamespaceOutcome, NamespaceResult,
    RunOutcome, RunReport, WaveResult,
};
