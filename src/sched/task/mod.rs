//! Task Control Block e tipos associados.

pub mod entity;
pub mod state;

pub use entity::{KernelStack, Task, TaskInfo, UserHeap};
pub use state::TaskState;
