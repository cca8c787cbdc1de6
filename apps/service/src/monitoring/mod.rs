/// Monitoring core: schedule heap, worker pool and the scheduler loops
/// that tie them to the store.
pub mod heap;
pub mod scheduler;
pub mod sync_heap;
pub mod types;
pub mod worker;


pub use scheduler::Scheduler;
