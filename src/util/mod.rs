//! Process-level utilities: shutdown signals and telemetry bootstrap.

mod sig_down;
mod telemetry;

pub use sig_down::SigDown;
pub use telemetry::Telemetry;
