// Services module
// Archive normalization, GitHub access, publishing, run monitoring and the upload proxy

pub mod archive;
pub mod github;
pub mod proxy_client;
pub mod proxy_server;
pub mod publisher;
pub mod run_monitor;
pub mod session;

pub use github::{GithubApi, GithubClient};
pub use proxy_client::ProxyClient;
pub use proxy_server::{build_router, ProxyOptions, ProxyServerManager};
pub use publisher::{ReleasePublisher, TaskUploader};
pub use run_monitor::{MonitorConfig, MonitorState, RunMonitor, TickOutcome};
pub use session::{default_task_name, Session, SubmitOutcome, TaskSubmission};
