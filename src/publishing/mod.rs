//! Building blocks of the publish pipeline

pub mod cloner;
pub mod fs_safe;
pub mod installer;
pub mod progress;

pub use cloner::{GitCli, RepositoryCloner};
pub use fs_safe::{file_exists, safe_create_dir, safe_remove_dir, TokioFileSystem};
pub use installer::{DependencyInstaller, ProjectKind};
pub use progress::{
    report, report_raw, ChannelObserver, LoggingObserver, ObserverError, ProgressEvent,
    ProgressKind, ProgressObserver,
};
