//! Response consistency benchmark library
//!
//! Scores how complete, uniform and semantically consistent the responses of a
//! generative text service are when the same prompts are replayed under load.

pub mod anomaly;
pub mod config;
pub mod embedders;
pub mod judge;
pub mod records;
pub mod report;
pub mod scoring;
pub mod semantic;
pub mod stats;
