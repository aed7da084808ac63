//! deploy-manager: publish projects from git and control them through pm2

pub mod core;
pub mod orchestration;
pub mod process;
pub mod publishing;
pub mod security;

#[cfg(test)]
mod testing;

pub use crate::core::*;
pub use crate::orchestration::{ProjectPublisher, PublishReport, PublishRequest};
pub use crate::process::{Pm2ProcessManager, ProcessSupervisor};
pub use crate::publishing::{
    ChannelObserver, DependencyInstaller, GitCli, LoggingObserver, ProgressEvent, ProgressKind,
    ProgressObserver, ProjectKind, RepositoryCloner, TokioFileSystem,
};
pub use crate::security::{CommandError, SafeCommandExecutor};
