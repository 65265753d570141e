pub mod account;
pub mod aws;
pub mod bedrock;
pub mod check;
pub mod cli;
pub mod logging;
pub mod s3;

pub use cli::{run, Cli, Commands};
