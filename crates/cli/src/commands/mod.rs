//! CLI command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::{run_client, run_leader};
pub use validate::run_validate;
