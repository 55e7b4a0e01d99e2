pub mod file_changed_webhook;
mod health_check;

pub use health_check::*;
