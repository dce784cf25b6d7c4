pub mod crawl;
pub mod job_runner;
pub mod recovery;
pub mod relevance;
pub mod scheduler;

pub use crawl::{CrawlEngine, CrawlOutcome};
pub use job_runner::JobRunner;
pub use recovery::{RecoveryConfig, RecoveryEngine};
pub use scheduler::{Scheduler, SchedulerConfig};
