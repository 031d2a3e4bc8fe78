// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock wire connector for deterministic testing.
//!
//! `MockWire` implements [`WireConnector`] with scriptable behavior:
//! auto-pairing on open, per-recipient send failures, injectable send delay,
//! manual event injection, and counters for opens, sends, and closes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use herald_core::{
    HeraldError, SendReceipt, WireConnection, WireConnector, WireEvent, WireLink,
};

/// A message captured by the mock: (session_id, recipient, content).
pub type SentRecord = (String, String, String);

#[derive(Default)]
struct MockWireInner {
    /// Emit QrIssued then PairingComplete on fresh opens. When false, tests
    /// drive pairing by injecting events.
    auto_pair: AtomicBool,
    /// Every open fails with a Connection error.
    fail_open: AtomicBool,
    send_delay_ms: AtomicUsize,
    failing_recipients: StdMutex<HashSet<String>>,
    /// Close calls park forever (simulates a wedged connection).
    wedge_close: AtomicBool,
    open_count: AtomicUsize,
    close_count: AtomicUsize,
    sent: Mutex<Vec<SentRecord>>,
    /// Event injector for the latest link of each session.
    links: StdMutex<HashMap<String, mpsc::Sender<WireEvent>>>,
}

/// Scriptable in-memory wire connector.
#[derive(Clone, Default)]
pub struct MockWire {
    inner: Arc<MockWireInner>,
}

impl MockWire {
    /// A connector that pairs immediately on every fresh open.
    pub fn new() -> Self {
        let wire = Self::default();
        wire.inner.auto_pair.store(true, Ordering::SeqCst);
        wire
    }

    /// A connector that only issues a QR on fresh opens; tests complete
    /// pairing via [`MockWire::emit`].
    pub fn with_manual_pairing() -> Self {
        Self::default()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.inner.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_send_delay(&self, delay: Duration) {
        self.inner
            .send_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn set_wedge_close(&self, wedge: bool) {
        self.inner.wedge_close.store(wedge, Ordering::SeqCst);
    }

    /// Every send to `recipient` fails with a `Send` error.
    pub fn fail_recipient(&self, recipient: &str) {
        self.inner
            .failing_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string());
    }

    pub fn open_count(&self) -> usize {
        self.inner.open_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.inner.close_count.load(Ordering::SeqCst)
    }

    pub async fn sent_messages(&self) -> Vec<SentRecord> {
        self.inner.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.inner.sent.lock().await.len()
    }

    /// Count of sends for one recipient across all sessions.
    pub async fn sent_count_for(&self, recipient: &str) -> usize {
        self.inner
            .sent
            .lock()
            .await
            .iter()
            .filter(|(_, r, _)| r == recipient)
            .count()
    }

    /// Inject an event into the latest link of `session_id`. Returns false
    /// if the session has no live link.
    pub async fn emit(&self, session_id: &str, event: WireEvent) -> bool {
        let sender = {
            let links = self.inner.links.lock().unwrap();
            links.get(session_id).cloned()
        };
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Credentials the mock hands out when pairing `session_id`.
    pub fn credentials_for(session_id: &str) -> Vec<u8> {
        format!("{session_id}-creds").into_bytes()
    }
}

#[async_trait]
impl WireConnector for MockWire {
    async fn open(
        &self,
        session_id: &str,
        credentials: Option<Vec<u8>>,
    ) -> Result<WireLink, HeraldError> {
        if self.inner.fail_open.load(Ordering::SeqCst) {
            return Err(HeraldError::Connection {
                message: "mock connector refused to open".to_string(),
                source: None,
            });
        }

        self.inner.open_count.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(32);
        self.inner
            .links
            .lock()
            .unwrap()
            .insert(session_id.to_string(), tx.clone());

        match credentials {
            Some(blob) => {
                // Resumed pairing re-asserts the authenticated state.
                let _ = tx
                    .send(WireEvent::PairingComplete {
                        phone: "15550001".to_string(),
                        display_name: Some("Mock Device".to_string()),
                        credentials: blob,
                    })
                    .await;
            }
            None => {
                let _ = tx
                    .send(WireEvent::QrIssued {
                        payload: format!("pair:{session_id}"),
                    })
                    .await;
                if self.inner.auto_pair.load(Ordering::SeqCst) {
                    let _ = tx
                        .send(WireEvent::PairingComplete {
                            phone: "15550001".to_string(),
                            display_name: Some("Mock Device".to_string()),
                            credentials: Self::credentials_for(session_id),
                        })
                        .await;
                }
            }
        }

        Ok(WireLink {
            connection: Arc::new(MockConnection {
                session_id: session_id.to_string(),
                inner: Arc::clone(&self.inner),
            }),
            events: rx,
        })
    }
}

struct MockConnection {
    session_id: String,
    inner: Arc<MockWireInner>,
}

#[async_trait]
impl WireConnection for MockConnection {
    async fn send(&self, recipient: &str, content: &str) -> Result<SendReceipt, HeraldError> {
        let delay = self.inner.send_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }

        let failing = {
            let set = self.inner.failing_recipients.lock().unwrap();
            set.contains(recipient)
        };
        if failing {
            return Err(HeraldError::Send {
                message: format!("mock delivery refused for {recipient}"),
                source: None,
            });
        }

        self.inner.sent.lock().await.push((
            self.session_id.clone(),
            recipient.to_string(),
            content.to_string(),
        ));

        Ok(SendReceipt {
            message_id: uuid::Uuid::new_v4().to_string(),
            accepted_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn close(&self) -> Result<(), HeraldError> {
        if self.inner.wedge_close.load(Ordering::SeqCst) {
            // Park well past any teardown timeout.
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.inner.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
