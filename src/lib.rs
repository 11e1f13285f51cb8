pub mod app;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod events;
pub mod fs_util;
pub mod output;
pub mod rewriter;
pub mod transport;
