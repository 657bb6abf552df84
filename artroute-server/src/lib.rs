//! # artroute server
//!
//! Ingestion adapters and process wiring around the artroute dispatcher.
//!
//! - [`http`]: axum router accepting analysis requests over HTTP(S)
//! - [`listeners`]: SQS long-poll listener
//! - [`tls`]: rustls configuration for HTTPS
//! - [`startup`]: builds the registry and Kubernetes adapters from config

pub mod http;
pub mod listeners;
pub mod startup;
pub mod tls;
