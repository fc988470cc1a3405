pub mod background;
pub mod execution;
pub mod plan;
pub mod profile;
pub mod request_log;
