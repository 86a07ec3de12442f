//! Bounded message relay
//!
//! The transport delivers messages on its own task and must never block, so
//! it hands each message to `MessageRelay::put`, which only attempts a
//! non-blocking enqueue. A single worker task drains the queue and runs the
//! processing function for one message at a time, in enqueue order.
//!
//! Lifecycle:
//! - `new`: allocates the queue; nothing runs yet, but `put` already works.
//! - `start`: spawns the worker on the current tokio runtime.
//! - `stop`: closes the queue to new messages, then waits until the worker
//!   has processed everything already queued and exited. Concurrent or
//!   repeated calls all wait on the same drain.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::transport::InboundMessage;
use crate::utils::RelayError;

type Handler = Box<dyn Fn(InboundMessage) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

enum Worker {
    Idle {
        receiver: mpsc::Receiver<InboundMessage>,
        handler: Handler,
    },
    Running {
        stop: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
    Draining(Shared<BoxFuture<'static, ()>>),
    // only seen while the worker mutex is held
    Taken,
}

pub struct MessageRelay {
    sender: mpsc::Sender<InboundMessage>,
    worker: Mutex<Worker>,
}

impl MessageRelay {
    /// Creates a relay holding at most `buffer` queued messages (at least one).
    ///
    /// `handle_fn` is invoked for every dequeued message. An `Err` is logged
    /// and the worker moves on to the next message.
    pub fn new<F, Fut, E>(buffer: usize, handle_fn: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let handler: Handler = Box::new(move |message| {
            handle_fn(message)
                .map(|res| res.map_err(|err| err.to_string()))
                .boxed()
        });
        Self {
            sender,
            worker: Mutex::new(Worker::Idle { receiver, handler }),
        }
    }

    /// Enqueues `message` without waiting.
    ///
    /// Returns `RelayError::BufferFull` when the queue is at capacity; the
    /// message is dropped and the caller should only log.
    pub fn put(&self, message: InboundMessage) -> Result<(), RelayError> {
        self.sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => RelayError::BufferFull,
            TrySendError::Closed(_) => RelayError::Closed,
        })
    }

    /// Number of messages waiting to be processed.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns the worker. Calling it again has no effect.
    pub fn start(&self) {
        let mut worker = self.lock_worker();
        match std::mem::replace(&mut *worker, Worker::Taken) {
            Worker::Idle { receiver, handler } => {
                let (stop, stop_rx) = oneshot::channel();
                let handle = tokio::spawn(run(receiver, handler, stop_rx));
                *worker = Worker::Running { stop, handle };
            }
            other => *worker = other,
        }
    }

    /// Stops accepting messages and waits for the worker to drain the queue.
    ///
    /// A relay that was never started is started first so queued messages are
    /// still processed.
    pub async fn stop(&self) {
        self.start();
        let drained = {
            let mut worker = self.lock_worker();
            match std::mem::replace(&mut *worker, Worker::Taken) {
                Worker::Running { stop, handle } => {
                    let _ = stop.send(());
                    let drained = async move {
                        if let Err(err) = handle.await {
                            error!("message relay worker: {err}");
                        }
                    }
                    .boxed()
                    .shared();
                    *worker = Worker::Draining(drained.clone());
                    drained
                }
                Worker::Draining(drained) => {
                    *worker = Worker::Draining(drained.clone());
                    drained
                }
                other => {
                    *worker = other;
                    return;
                }
            }
        };
        drained.await;
    }

    fn lock_worker(&self) -> MutexGuard<'_, Worker> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MessageRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRelay")
            .field("queued", &self.len())
            .field("capacity", &self.sender.max_capacity())
            .finish()
    }
}

async fn run(
    mut receiver: mpsc::Receiver<InboundMessage>,
    handler: Handler,
    mut stop: oneshot::Receiver<()>,
) {
    let mut stopping = false;
    loop {
        let message = tokio::select! {
            _ = &mut stop, if !stopping => {
                // Already-queued messages are still yielded by recv().
                receiver.close();
                stopping = true;
                continue;
            }
            message = receiver.recv() => message,
        };
        let Some(message) = message else {
            break;
        };

        let topic = message.topic.clone();
        match AssertUnwindSafe(handler(message)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(%topic, "handle message: {err}"),
            Err(_) => error!(%topic, "handle message: handler panicked"),
        }
    }
    debug!("message relay drained");
}
