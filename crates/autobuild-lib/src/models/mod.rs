// Data models
// Wire and domain types shared by services and the CLI

pub mod release;
pub mod repo;
pub mod upload;
pub mod workflow;

pub use release::*;
pub use repo::*;
pub use upload::*;
pub use workflow::*;
