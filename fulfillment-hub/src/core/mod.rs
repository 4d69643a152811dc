pub mod locks;
pub mod tasks;

pub use locks::KeyedLocks;
pub use tasks::BackgroundTasks;
