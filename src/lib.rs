pub mod cache;
pub mod cli;
pub mod commands;
pub mod error;
pub mod git;
pub mod identity;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod remote;
pub mod report;
pub mod run;
pub mod sources;
pub mod stats;
