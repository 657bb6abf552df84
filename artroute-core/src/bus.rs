//! Rendezvous hand-off between ingestion adapters and the dispatcher.
//!
//! Any number of [`AnalysisClient`] clones may submit requests; exactly one
//! [`AnalysisInbox`] receives them. A submission resolves only once the
//! dispatcher has taken the request, so a busy dispatcher throttles every
//! producer instead of letting a queue grow behind it.

use std::fmt;

use artroute_model::AnalysisRequest;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{Result, RouteError};

struct Delivery {
    request: AnalysisRequest,
    accepted: oneshot::Sender<()>,
}

/// Creates a connected client/inbox pair.
pub fn analysis_bus() -> (AnalysisClient, AnalysisInbox) {
    // At most one delivery is parked in the slot while the dispatcher is
    // busy; other producers wait in `send`. Its producer still waits on the
    // ack, so dropping the inbox on shutdown drops the parked oneshot sender
    // and that producer sees `BusClosed` rather than a silent loss.
    let (sender, receiver) = mpsc::channel(1);
    (AnalysisClient { sender }, AnalysisInbox { receiver })
}

/// Producer side of the bus.
#[derive(Clone)]
pub struct AnalysisClient {
    sender: mpsc::Sender<Delivery>,
}

impl fmt::Debug for AnalysisClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisClient")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl AnalysisClient {
    /// Hands `request` to the dispatcher, waiting until it has been taken.
    ///
    /// Fails with [`RouteError::BusClosed`] when the dispatcher is gone or
    /// shuts down before accepting the request.
    pub async fn submit(&self, request: AnalysisRequest) -> Result<()> {
        let (accepted, acknowledged) = oneshot::channel();
        self.sender
            .send(Delivery { request, accepted })
            .await
            .map_err(|_| RouteError::BusClosed)?;
        acknowledged.await.map_err(|_| RouteError::BusClosed)
    }

    pub async fn analyze(
        &self,
        image_reference: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<()> {
        self.submit(AnalysisRequest::new(image_reference, namespace))
            .await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer side of the bus, owned by the dispatcher.
pub struct AnalysisInbox {
    receiver: mpsc::Receiver<Delivery>,
}

impl fmt::Debug for AnalysisInbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisInbox")
            .field("pending", &self.receiver.len())
            .finish()
    }
}

impl AnalysisInbox {
    /// Takes the next request, acknowledging it to its producer.
    ///
    /// Returns `None` once every client has been dropped. Deliveries whose
    /// producer stopped waiting are discarded, since the producer never
    /// observed them as accepted.
    pub async fn recv(&mut self) -> Option<AnalysisRequest> {
        loop {
            let Delivery { request, accepted } = self.receiver.recv().await?;
            if accepted.send(()).is_ok() {
                return Some(request);
            }
            debug!(
                target: "artroute::dispatch",
                image_reference = %request.image_reference,
                namespace = %request.namespace,
                "producer abandoned hand-off; discarding request"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn submit_waits_for_the_consumer() {
        let (client, mut inbox) = analysis_bus();

        let producer = tokio::spawn(async move {
            client.analyze("alpine", "ns1").await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished(), "hand-off completed without a consumer");

        let request = inbox.recv().await.expect("request delivered");
        assert_eq!(request, AnalysisRequest::new("alpine", "ns1"));

        let result = timeout(Duration::from_secs(1), producer)
            .await
            .expect("producer released")
            .expect("producer task");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn closed_inbox_rejects_submissions() {
        let (client, inbox) = analysis_bus();
        drop(inbox);

        let result = client.analyze("alpine", "ns1").await;
        assert!(matches!(result, Err(RouteError::BusClosed)));
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn inbox_dropped_mid_hand_off_rejects_producer() {
        let (client, inbox) = analysis_bus();

        let producer = tokio::spawn(async move {
            client.analyze("alpine", "ns1").await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(inbox);

        let result = timeout(Duration::from_secs(1), producer)
            .await
            .expect("producer released")
            .expect("producer task");
        assert!(matches!(result, Err(RouteError::BusClosed)));
    }

    #[tokio::test]
    async fn inbox_ends_when_all_clients_are_gone() {
        let (client, mut inbox) = analysis_bus();
        drop(client);
        assert!(inbox.recv().await.is_none());
    }
}
