mod clips;
mod context;
mod direct;
mod output;
mod recover;
mod tracker;
mod validate;

pub use clips::cmd_clips;
pub use context::Context;
pub use direct::cmd_direct;
pub use recover::cmd_recover;
pub use tracker::cmd_tracker;
pub use validate::cmd_validate;
