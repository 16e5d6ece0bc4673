//! CLI command implementations.

mod ask;
mod class;
mod doctor;
mod serve;
mod session;
mod settings;
mod summarize;

pub use ask::{run_ask, run_ask_all, run_ask_classes};
pub use class::run_class;
pub use doctor::run_doctor;
pub use serve::run_serve;
pub use session::run_session;
pub use settings::run_settings;
pub use summarize::run_summarize;
