pub mod audit_log;
pub mod command;

pub use audit_log::AuditLog;
pub use command::{CommandRunner, ExternalCommand, SystemRunner};
