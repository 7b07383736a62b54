pub mod context;
pub mod draft;
pub mod gate;
pub mod policy;
pub mod post;
pub mod router;
pub mod runner;
pub mod state;
pub mod types;

pub use runner::{ReviewRequest, ReviewWorkflow};
pub use types::ReviewOutcome;
