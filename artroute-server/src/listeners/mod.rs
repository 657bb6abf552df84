//! Ingestion adapters other than HTTP.

pub mod sqs;

pub use sqs::{MessageQueue, QueueError, QueueListener, QueueMessage, SqsQueue};
