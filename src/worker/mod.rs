//! Worker pool subsystem.
//!
//! # Data Flow
//! ```text
//! Listener accepts a connection
//!     → pool.rs submit(task)  (push to queue, wake one worker)
//!     → idle worker claims exactly one task under the queue lock
//!     → task runs outside the lock
//!     → Ok / Err / panic is recorded; worker goes back to waiting
//! ```
//!
//! # Design Decisions
//! - Fixed number of OS threads per pool, no resizing
//! - Unbounded FIFO queue; submit never blocks or rejects
//! - A failing or panicking task never takes its worker down

pub mod pool;

pub use pool::{PoolError, Task, TaskError, WorkerPool};
