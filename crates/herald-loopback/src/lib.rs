// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process loopback wire connector.
//!
//! Stands in for the external messaging client so `herald serve` is runnable
//! end to end without a real transport: fresh opens issue a pairing QR and
//! self-pair after a short delay, resumes succeed immediately, and every
//! send is accepted and logged instead of leaving the process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use herald_core::{
    HeraldError, SendReceipt, WireConnection, WireConnector, WireEvent, WireLink,
};

/// How long a fresh pairing stays in `qr_pairing` before the loopback
/// self-scans. Long enough for an operator to see the QR in `herald status`.
const SELF_PAIR_DELAY: Duration = Duration::from_secs(2);

/// Loopback connector: pairs with itself and swallows sends.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackConnector;

impl LoopbackConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WireConnector for LoopbackConnector {
    async fn open(
        &self,
        session_id: &str,
        credentials: Option<Vec<u8>>,
    ) -> Result<WireLink, HeraldError> {
        let (tx, rx) = mpsc::channel(8);

        match credentials {
            Some(blob) => {
                // Resume: the loopback always accepts stored credentials.
                let _ = tx
                    .send(WireEvent::PairingComplete {
                        phone: "00000000000".to_string(),
                        display_name: Some("Loopback".to_string()),
                        credentials: blob,
                    })
                    .await;
            }
            None => {
                let token = uuid::Uuid::new_v4().to_string();
                let _ = tx
                    .send(WireEvent::QrIssued {
                        payload: format!("loopback://{session_id}/{token}"),
                    })
                    .await;

                // Self-scan after a delay so the pairing flow is observable.
                let pair_tx = tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(SELF_PAIR_DELAY).await;
                    let _ = pair_tx
                        .send(WireEvent::PairingComplete {
                            phone: "00000000000".to_string(),
                            display_name: Some("Loopback".to_string()),
                            credentials: token.into_bytes(),
                        })
                        .await;
                });
            }
        }

        Ok(WireLink {
            connection: Arc::new(LoopbackConnection {
                session_id: session_id.to_string(),
            }),
            events: rx,
        })
    }
}

struct LoopbackConnection {
    session_id: String,
}

#[async_trait]
impl WireConnection for LoopbackConnection {
    async fn send(&self, recipient: &str, content: &str) -> Result<SendReceipt, HeraldError> {
        info!(
            session_id = %self.session_id,
            recipient,
            bytes = content.len(),
            "loopback accepted message"
        );
        Ok(SendReceipt {
            message_id: uuid::Uuid::new_v4().to_string(),
            accepted_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn close(&self) -> Result<(), HeraldError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_open_issues_qr_then_self_pairs() {
        let connector = LoopbackConnector::new();
        let mut link = connector.open("s-1", None).await.unwrap();

        let first = link.events.recv().await.unwrap();
        let payload = match first {
            WireEvent::QrIssued { payload } => payload,
            other => panic!("expected QrIssued, got {other:?}"),
        };
        assert!(payload.starts_with("loopback://s-1/"));

        let second = tokio::time::timeout(Duration::from_secs(5), link.events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(second, WireEvent::PairingComplete { .. }));
    }

    #[tokio::test]
    async fn resume_pairs_immediately_with_same_credentials() {
        let connector = LoopbackConnector::new();
        let creds = b"stored".to_vec();
        let mut link = connector.open("s-1", Some(creds.clone())).await.unwrap();

        match link.events.recv().await.unwrap() {
            WireEvent::PairingComplete { credentials, .. } => assert_eq!(credentials, creds),
            other => panic!("expected PairingComplete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sends_are_accepted() {
        let connector = LoopbackConnector::new();
        let link = connector.open("s-1", Some(vec![1])).await.unwrap();
        let receipt = link.connection.send("111", "hello").await.unwrap();
        assert!(!receipt.message_id.is_empty());
        link.connection.close().await.unwrap();
    }
}
