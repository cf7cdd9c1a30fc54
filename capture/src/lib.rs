pub mod scheduler;
pub mod sink;
