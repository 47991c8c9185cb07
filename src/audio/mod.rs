pub mod reaper;
pub mod registry;
pub mod scheduler;
pub mod session;

pub use reaper::IdleReaper;
pub use registry::SessionRegistry;
pub use scheduler::Scheduler;
pub use session::SessionState;
