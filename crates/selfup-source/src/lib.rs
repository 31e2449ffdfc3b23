mod fetch;
mod git_ops;
mod probe;
mod revisions;

pub use fetch::{stage_source, GitSourceFetcher, SourceFetcher};
pub use probe::{probe_host, ProbeOutcome};
pub use revisions::{parse_last_page, GitHubRevisionCounter, RevisionCounter};

pub(crate) use git_ops::run_git_clone;
