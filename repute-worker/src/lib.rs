//! # Repute Worker Library
//!
//! Background recomputation of reputation scores.
//!
//! ## Modules
//!
//! - `config`: layered worker configuration
//! - `queue`: claiming and settling `reputation_jobs` rows
//! - `orchestrator`: the worker loop

pub mod config;
pub mod orchestrator;
pub mod queue;
