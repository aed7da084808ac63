//! Process control over an external process manager

pub mod description;
pub mod pm2;
pub mod supervisor;

pub use description::parse_process_list;
pub use pm2::Pm2ProcessManager;
pub use supervisor::ProcessSupervisor;
