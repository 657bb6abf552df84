//! SQS ingestion.
//!
//! Messages carry the target namespace and the artifact reference as the
//! `namespace` and `image_uri` message attributes; the body is ignored. A
//! message is deleted only after the dispatcher has accepted its request, so
//! anything that fails to schedule becomes visible again once its visibility
//! timeout lapses.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use artroute_config::SqsConfig;
use artroute_core::AnalysisClient;
use artroute_model::api::{IMAGE_URI_ATTRIBUTE, NAMESPACE_ATTRIBUTE};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::{Client, error::DisplayErrorContext};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Most messages one `ReceiveMessage` call may return.
pub const MAX_MESSAGES_PER_RECEIVE: i32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("unable to receive messages: {0}")]
    Receive(String),
    #[error("unable to delete message: {0}")]
    Delete(String),
}

/// One received message, reduced to what the listener needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: Option<String>,
    pub receipt_handle: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl QueueMessage {
    /// String attribute value, or an empty string when absent.
    pub fn attribute(&self, name: &str) -> &str {
        self.attributes.get(name).map(String::as_str).unwrap_or_default()
    }
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-polls for the next batch. An empty batch is not an error.
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError>;

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

/// [`MessageQueue`] backed by an SQS queue.
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    wait_time_seconds: i32,
    visibility_timeout_seconds: i32,
}

impl fmt::Debug for SqsQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsQueue")
            .field("queue_url", &self.queue_url)
            .field("wait_time_seconds", &self.wait_time_seconds)
            .field("visibility_timeout_seconds", &self.visibility_timeout_seconds)
            .finish()
    }
}

impl SqsQueue {
    /// Builds a client from the ambient AWS configuration, applying the
    /// configured region and endpoint overrides.
    pub async fn connect(config: &SqsConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;

        Self {
            client: Client::new(&shared_config),
            queue_url: config.queue_url.clone(),
            wait_time_seconds: whole_seconds(config.wait_time),
            visibility_timeout_seconds: whole_seconds(config.visibility_timeout),
        }
    }
}

fn whole_seconds(duration: Duration) -> i32 {
    i32::try_from(duration.as_secs()).unwrap_or(i32::MAX)
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(MAX_MESSAGES_PER_RECEIVE)
            .message_attribute_names(NAMESPACE_ATTRIBUTE)
            .message_attribute_names(IMAGE_URI_ATTRIBUTE)
            .wait_time_seconds(self.wait_time_seconds)
            .visibility_timeout(self.visibility_timeout_seconds)
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        let messages = output
            .messages()
            .iter()
            .map(|message| QueueMessage {
                message_id: message.message_id().map(str::to_string),
                receipt_handle: message.receipt_handle().map(str::to_string),
                attributes: message
                    .message_attributes()
                    .map(|attributes| {
                        attributes
                            .iter()
                            .filter_map(|(name, value)| {
                                value
                                    .string_value()
                                    .map(|value| (name.clone(), value.to_string()))
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Delete(DisplayErrorContext(&e).to_string()))
    }
}

/// Polls a [`MessageQueue`] and forwards each message to the dispatcher.
pub struct QueueListener {
    queue: Arc<dyn MessageQueue>,
    client: AnalysisClient,
    error_backoff: Duration,
}

impl fmt::Debug for QueueListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueListener")
            .field("client", &self.client)
            .field("error_backoff", &self.error_backoff)
            .finish()
    }
}

impl QueueListener {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        client: AnalysisClient,
        error_backoff: Duration,
    ) -> Self {
        Self {
            queue,
            client,
            error_backoff,
        }
    }

    /// Polls until `shutdown` fires. Receive failures back off and retry;
    /// they never end the loop.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(target: "artroute::sqs", "queue listener started");
        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = self.queue.receive() => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(err) => {
                    error!(
                        target: "artroute::sqs",
                        error = %err,
                        backoff = ?self.error_backoff,
                        "couldn't receive messages from queue"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => continue,
                    }
                }
            };

            if messages.is_empty() {
                debug!(target: "artroute::sqs", "no messages received, polling again");
                continue;
            }

            for message in messages {
                self.forward(message).await;
            }
        }
        info!(target: "artroute::sqs", "queue listener stopped");
    }

    async fn forward(&self, message: QueueMessage) {
        let namespace = message.attribute(NAMESPACE_ATTRIBUTE);
        let image_reference = message.attribute(IMAGE_URI_ATTRIBUTE);
        info!(
            target: "artroute::sqs",
            message_id = message.message_id.as_deref().unwrap_or_default(),
            namespace = %namespace,
            image_reference = %image_reference,
            "received analysis request"
        );

        if namespace.is_empty() || image_reference.is_empty() {
            warn!(
                target: "artroute::sqs",
                message_id = message.message_id.as_deref().unwrap_or_default(),
                namespace = %namespace,
                image_reference = %image_reference,
                "message is missing the namespace or image_uri attribute; leaving it on the queue"
            );
            return;
        }

        if let Err(err) = self.client.analyze(image_reference, namespace).await {
            error!(
                target: "artroute::sqs",
                error = %err,
                namespace = %namespace,
                image_reference = %image_reference,
                "unable to schedule analysis request"
            );
            return;
        }

        let Some(receipt_handle) = message.receipt_handle.as_deref() else {
            warn!(
                target: "artroute::sqs",
                namespace = %namespace,
                image_reference = %image_reference,
                "message has no receipt handle; it will be redelivered"
            );
            return;
        };
        if let Err(err) = self.queue.delete(receipt_handle).await {
            error!(
                target: "artroute::sqs",
                error = %err,
                namespace = %namespace,
                image_reference = %image_reference,
                "unable to remove message from queue"
            );
        }
    }
}
