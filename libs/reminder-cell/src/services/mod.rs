pub mod channels;
pub mod integrations;
pub mod planner;
pub mod scheduler;
pub mod settings;

pub use channels::*;
pub use integrations::*;
pub use planner::*;
pub use scheduler::*;
pub use settings::*;
