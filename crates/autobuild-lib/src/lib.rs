// Autobuild shared library
// Publishes task archives as GitHub release assets, drives the autobuild
// workflow and serves the upload proxy. Used by the `autobuild` CLI.

pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{AutobuildError, AutobuildErrorCode, AutobuildResult};
