//! The orchestration core: operation contract, batch composition, result
//! aggregation, and remote task polling.

pub mod batch;
pub mod merge;
pub mod operation;
pub mod poller;

pub use batch::{default_workers, BatchComposer, Node};
pub use merge::{merge_result, RESULTS_LIST_KEY};
pub use operation::{Check, OpState, Operation};
pub use poller::{
    PollCadence, PollReport, TaskPoller, TaskState, TaskStatus, TaskStatusSource, POLL_CHUNK_SIZE,
};
