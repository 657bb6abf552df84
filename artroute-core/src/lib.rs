//! # artroute core
//!
//! Routes notifications about newly available artifacts to downstream
//! pipelines by matching the artifact's media type against namespace-scoped
//! routing rules.
//!
//! ## Architecture
//!
//! - [`bus`]: rendezvous channel between ingestion adapters and the dispatcher
//! - [`dispatcher`]: the single, sequential consumer of the bus
//! - [`matcher`], [`builder`], [`submitter`]: per-request routing stages
//! - [`ports`]: traits for the registry, rule store and orchestration API
//! - [`registry`], [`kube`]: HTTP implementations of those traits

pub mod builder;
pub mod bus;
pub mod dispatcher;
pub mod error;
pub mod kube;
pub mod matcher;
pub mod ports;
pub mod reference;
pub mod registry;
pub mod submitter;

pub use artroute_model as model;

pub use bus::{AnalysisClient, AnalysisInbox, analysis_bus};
pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherPorts, StopReason};
pub use error::{Result, RouteError, SubmissionErrors};
pub use kube::{KubeClient, KubeOptions};
pub use registry::{RegistryOptions, RegistryResolver};
