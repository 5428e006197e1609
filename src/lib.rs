// ssocred - temporary AWS credentials from AWS IAM Identity Center

pub mod arn;
pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod env;
pub mod error;
pub mod expiry;
pub mod gateway;
pub mod models;
pub mod session;
pub mod storage;
pub mod url;
pub mod wait;

#[cfg(test)]
mod testing;

pub use error::{Result, SsoError};
