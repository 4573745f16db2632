#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod error_log;
pub mod i18n;
pub mod output;
pub mod prefs;
pub mod store;
pub mod task;
