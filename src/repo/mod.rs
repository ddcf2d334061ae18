pub mod apply;
pub mod isolate;
pub mod provision;
pub mod vcs;

pub use apply::{ApplyOutcome, ApplyStrategy};
pub use isolate::IsolationBranch;
pub use provision::LocalRepository;
pub use vcs::{CmdOutput, GitCli, Vcs, VcsError};
