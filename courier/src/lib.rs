pub mod bounce;
pub mod config;
mod credentials;
pub mod dispatch;
pub mod imap;
pub mod loader;
pub mod net;
pub mod report;
pub mod smtp;
pub mod workflow;

pub use bounce::{scan_bounces, BounceSet, ScanError};
pub use config::{Config, Endpoint, Security};
pub use credentials::{Credentials, CredentialsError};
pub use dispatch::{dispatch, DispatchError, DispatchResult, Progress};
pub use loader::{load_recipients, load_template, LoadError, Template};
pub use report::{read_report, write_report, Report, ReportError};
pub use workflow::{Mailer, Provider, Stage, Workflow, WorkflowError};
