//! # In-process duplex channel
//!
//! The reference [`Channel`] binding: JSON frames over a pair of tokio
//! mpsc queues. Each side runs a pump task that demultiplexes incoming
//! frames, spawning inbound calls as tasks (handlers may issue nested
//! outbound calls) and correlating replies with pending requests via
//! sequence numbers.
//!
//! Real deployments bind the same contract over their own transport;
//! this one exists for same-process graphs and for the test suite.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as Json;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::Notify;

use telewire::Fault;

use crate::transport;
use crate::transport::CallError;
use crate::transport::Channel;
use crate::transport::Handler;

/// The framing envelope. Correlation is by `seq`, scoped to the sender.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "camelCase")]
enum Frame {
    Call { seq: u64, method: String, payload: Json },
    Reply { seq: u64, payload: Json },
    Fail { seq: u64, fault: Fault },
    Bye,
}

type Pending = Arc<DashMap<u64, oneshot::Sender<Result<Json, CallError>>>>;

/// One endpoint of an in-process duplex channel.
pub struct LocalChannel {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    pending: Pending,
    handlers: Arc<DashMap<String, Handler>>,
    seq: AtomicU64,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl LocalChannel {
    /// Creates a connected pair of endpoints and spawns their pumps.
    pub fn pair() -> (Arc<LocalChannel>, Arc<LocalChannel>) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let a = Arc::new(Self::endpoint(tx_a));
        let b = Arc::new(Self::endpoint(tx_b));

        a.spawn_pump(rx_b);
        b.spawn_pump(rx_a);

        (a, b)
    }

    fn endpoint(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            tx,
            pending: Arc::new(DashMap::new()),
            handlers: Arc::new(DashMap::new()),
            seq: AtomicU64::new(1),
            closed: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Closes this endpoint: rejects everything outstanding on both
    /// sides and makes subsequent calls fail immediately.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    fn spawn_pump(&self, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
        let tx = self.tx.clone();
        let pending = self.pending.clone();
        let handlers = self.handlers.clone();
        let closed = self.closed.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let bytes = tokio::select! {
                    _ = shutdown.notified() => {
                        let _ = tx.send(encode_frame(&Frame::Bye));
                        break;
                    }
                    received = rx.recv() => match received {
                        Some(bytes) => bytes,
                        None => break,
                    },
                };

                let frame: Frame = match serde_json::from_slice(&bytes) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping malformed frame");
                        continue;
                    }
                };

                match frame {
                    Frame::Call { seq, method, payload } => {
                        let handler = handlers.get(&method).map(|entry| entry.value().clone());
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            let outcome = match handler {
                                Some(handler) => handler(payload).await,
                                None => Err(Fault::protocol(format!("no handler for verb '{}'", method))),
                            };
                            let reply = match outcome {
                                Ok(payload) => Frame::Reply { seq, payload },
                                Err(fault) => Frame::Fail { seq, fault },
                            };
                            let _ = tx.send(encode_frame(&reply));
                        });
                    }
                    Frame::Reply { seq, payload } => {
                        if let Some((_, waiter)) = pending.remove(&seq) {
                            let _ = waiter.send(Ok(payload));
                        }
                    }
                    Frame::Fail { seq, fault } => {
                        if let Some((_, waiter)) = pending.remove(&seq) {
                            let _ = waiter.send(Err(CallError::Remote(fault)));
                        }
                    }
                    Frame::Bye => break,
                }
            }

            closed.store(true, Ordering::SeqCst);
            reject_all(&pending);
        });
    }
}

fn encode_frame(frame: &Frame) -> Vec<u8> {
    // Frames are built from values this crate produced; encoding them
    // cannot fail short of an OOM.
    serde_json::to_vec(frame).unwrap_or_default()
}

fn reject_all(pending: &Pending) {
    let keys: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for key in keys {
        if let Some((_, waiter)) = pending.remove(&key) {
            let _ = waiter.send(Err(CallError::Transport(transport::Error::ConnectionLost(
                "channel closed".to_string(),
            ))));
        }
    }
}

#[async_trait::async_trait]
impl Channel for LocalChannel {
    async fn call_remote(&self, method: &str, payload: Json) -> Result<Json, CallError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CallError::Transport(transport::Error::Closed));
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let (waiter_tx, waiter_rx) = oneshot::channel();
        self.pending.insert(seq, waiter_tx);

        let frame = Frame::Call {
            seq,
            method: method.to_string(),
            payload,
        };
        if self.tx.send(encode_frame(&frame)).is_err() {
            self.pending.remove(&seq);
            return Err(CallError::Transport(transport::Error::ConnectionLost(
                "peer hung up".to_string(),
            )));
        }

        match waiter_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(CallError::Transport(transport::Error::ConnectionLost(
                "channel closed".to_string(),
            ))),
        }
    }

    fn register_incoming_call(&self, method: &str, handler: Handler) {
        self.handlers.insert(method.to_string(), handler);
    }
}
