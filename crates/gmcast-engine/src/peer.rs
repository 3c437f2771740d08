//! A single process within a partition: the protocol engine.
//!
//! The peer multiplexes three sources on one poll loop (cancellation,
//! messages needing re-processing, and the transport inbox) and drives
//! every message through the state transitions until it is final and
//! the received queue releases it for commit.
//!
//! Messages are processed serially by the poll loop; combined with a
//! transport that delivers one total order per partition, every member
//! of a partition runs the same deterministic transition sequence and
//! assigns the same timestamps.

use crate::deliver::Deliver;
use crate::invoker::Invoker;
use crate::queue::{DeliveryFn, ReceivedQueue};
use crate::timing;
use crate::transport::{Transport, TransportError};
use gmcast_core::{
    ConflictRelation, LogicalClock, Memo, Message, MessageState, MessageType, Partition,
    PreviousSet, ProtocolError, Response, Uid,
};
use gmcast_store::{InMemoryStateMachine, Log, Storage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Capacity of the re-processing channel.
const UPDATED_CAPACITY: usize = 64;

/// Configuration for a single peer.
#[derive(Clone)]
pub struct PeerConfig {
    /// Process name, used for logging.
    pub name: String,

    /// The partition this peer belongs to.
    pub partition: Partition,

    /// Protocol version; incoming messages on any other version are
    /// dropped.
    pub version: u32,

    /// Conflict relation shared by every peer of every partition.
    pub conflict: Arc<dyn ConflictRelation>,

    /// Storage backend; may be shared by peers of one partition.
    pub storage: Arc<dyn Storage>,
}

/// Which destinations a protocol send addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    /// Only the local partition; used while a message is still in S0
    /// or S2 and needs another pass at every local member.
    Inner,

    /// Every destination partition; used for the timestamp exchange.
    Outer,
}

/// Everything the peer's tasks share. The received-queue callback
/// closes over [`DeliveryHandle`], a subset of this state, so the queue
/// never holds the peer itself.
struct PeerShared {
    config: PeerConfig,
    transport: Arc<dyn Transport>,
    clock: LogicalClock,
    previous_set: PreviousSet,
    memo: Arc<Memo>,
    rqueue: ReceivedQueue,
    observers: Arc<Mutex<HashMap<Uid, mpsc::Sender<Response>>>>,
    log: Log,
    updated_tx: mpsc::Sender<Message>,
    shutdown_rx: watch::Receiver<bool>,
    invoker: Invoker,
}

/// The value closure handed to the received queue for delivery.
struct DeliveryHandle {
    memo: Arc<Memo>,
    observers: Arc<Mutex<HashMap<Uid, mpsc::Sender<Response>>>>,
    deliver: Deliver,
    invoker: Invoker,
}

impl DeliveryHandle {
    /// Commit a queue-released message and notify the local observer,
    /// if this peer originated the request.
    fn complete(&self, message: Message, generic_delivered: bool) {
        self.memo.remove(&message.id);
        let response = self.deliver.commit(&message, generic_delivered);

        let observer = self.observers.lock().remove(&message.id);
        if let Some(notify) = observer {
            self.invoker.spawn(async move {
                if tokio::time::timeout(timing::OBSERVER_NOTIFY, notify.send(response))
                    .await
                    .is_err()
                {
                    tracing::warn!("observer notification timed out");
                }
            });
        }
    }
}

/// One protocol process. Created by the partition façade; owns its
/// transport, clock, queue and background tasks, all released on
/// [`Peer::stop`].
pub struct Peer {
    shared: Arc<PeerShared>,
    invoker: Invoker,
}

impl Peer {
    /// Build the peer and start its background tasks. Must be called
    /// from within a tokio runtime.
    pub fn new(config: PeerConfig, transport: Arc<dyn Transport>) -> Result<Self, ProtocolError> {
        let log = Log::new(config.storage.clone());
        let state_machine = Arc::new(InMemoryStateMachine::new(log.clone()));
        let deliver = Deliver::new(state_machine)?;

        let invoker = Invoker::new();
        let memo = Arc::new(Memo::new());
        let observers = Arc::new(Mutex::new(HashMap::new()));

        let handle = DeliveryHandle {
            memo: memo.clone(),
            observers: observers.clone(),
            deliver,
            invoker: invoker.clone(),
        };
        let on_deliver: DeliveryFn =
            Box::new(move |message, generic| handle.complete(message, generic));
        let rqueue = ReceivedQueue::new(config.conflict.clone(), on_deliver);

        let (updated_tx, updated_rx) = mpsc::channel(UPDATED_CAPACITY);
        let inbox = transport.listen();

        let shared = Arc::new(PeerShared {
            config,
            transport,
            clock: LogicalClock::new(),
            previous_set: PreviousSet::new(),
            memo,
            rqueue,
            observers,
            log,
            updated_tx,
            shutdown_rx: invoker.subscribe(),
            invoker: invoker.clone(),
        });

        invoker.spawn(PeerShared::poll(shared.clone(), inbox, updated_rx));
        invoker.spawn(PeerShared::sweep(shared.clone()));

        Ok(Self { shared, invoker })
    }

    /// Issue a request to the protocol.
    ///
    /// Not request-response: the returned channel yields exactly one
    /// response once the message commits on this peer, or a failure
    /// response if the broadcast fails. After [`Peer::stop`] the
    /// channel resolves immediately with a failure.
    pub fn command(&self, mut message: Message) -> mpsc::Receiver<Response> {
        let (notify, receiver) = mpsc::channel(1);

        if self.invoker.is_shutdown() {
            let _ = notify.try_send(Response::failed(message.id.clone(), ProtocolError::Stopped));
            return receiver;
        }

        message.mtype = MessageType::Initial;
        message.from = self.shared.config.partition.clone();

        // Register before broadcasting so a fast local commit cannot
        // outrun the observer.
        self.shared
            .observers
            .lock()
            .insert(message.id.clone(), notify.clone());

        let shared = self.shared.clone();
        self.invoker.spawn(async move {
            if let Err(err) = shared.transport.broadcast(message.clone()).await {
                tracing::error!(id = %message.id, error = %err, "broadcast failed");
                shared.observers.lock().remove(&message.id);
                let response = Response::failed(
                    message.id.clone(),
                    ProtocolError::Transport(err.to_string()),
                );
                let _ = tokio::time::timeout(timing::OBSERVER_NOTIFY, notify.send(response)).await;
            }
        });

        receiver
    }

    /// Snapshot of the committed log, without protocol participation.
    ///
    /// Stale-tolerant: not linearized with concurrent commands.
    pub fn fast_read(&self) -> Response {
        match self.shared.log.dump() {
            Ok(messages) => {
                let identifier = messages
                    .last()
                    .map(|message| message.id.clone())
                    .unwrap_or_default();
                let data = messages.into_iter().map(|message| message.payload).collect();
                Response::ok(identifier, data)
            }
            Err(err) => Response::failed(Uid::default(), ProtocolError::Commit(err.to_string())),
        }
    }

    /// Every committed message at this peer, in commit order.
    pub fn history(&self) -> Result<Vec<Message>, ProtocolError> {
        self.shared
            .log
            .dump()
            .map_err(|err| ProtocolError::Commit(err.to_string()))
    }

    /// The partition this peer belongs to.
    pub fn partition(&self) -> &Partition {
        &self.shared.config.partition
    }

    /// Cancel the engine, close the transport and wait for every
    /// background task to drain.
    pub async fn stop(&self) {
        self.invoker.signal();
        self.shared.transport.close();
        self.invoker.join().await;
        tracing::debug!(peer = %self.shared.config.name, "peer stopped");
    }
}

impl PeerShared {
    /// The message routing loop: one logical poller over cancellation,
    /// the re-processing channel and the transport inbox.
    async fn poll(
        shared: Arc<Self>,
        mut inbox: mpsc::Receiver<Message>,
        mut updated_rx: mpsc::Receiver<Message>,
    ) {
        let mut shutdown = shared.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                maybe = updated_rx.recv() => match maybe {
                    Some(message) => shared.send(message, MessageType::Initial, Scope::Inner).await,
                    None => break,
                },
                maybe = inbox.recv() => match maybe {
                    Some(message) => shared.clone().process(message).await,
                    None => break,
                },
            }
        }
        tracing::debug!(peer = %shared.config.name, "closing the peer poll loop");
    }

    /// Process one message from the transport.
    async fn process(self: Arc<Self>, mut message: Message) {
        if message.protocol_version != self.config.version {
            tracing::warn!(
                id = %message.id,
                version = message.protocol_version,
                "dropping message on unsupported protocol version"
            );
            return;
        }
        if !self.rqueue.is_eligible(&message) {
            return;
        }

        let enqueue = match message.mtype {
            MessageType::Initial => {
                tracing::debug!(id = %message.id, state = ?message.state, "processing initial message");
                self.process_initial(&mut message).await;
                true
            }
            MessageType::External => {
                tracing::debug!(id = %message.id, from = %message.from, "processing external message");
                self.exchange_timestamps(&mut message)
            }
        };

        if enqueue && self.rqueue.enqueue(message.clone()) {
            let shared = self.clone();
            let id = message.id.clone();
            self.invoker.spawn(async move { shared.reprocess(id).await });
        }
    }

    /// The compute round. A message in S0 that conflicts with the
    /// previous set forces a clock tick (and clears the set) so it
    /// receives a strictly higher local timestamp. A single-destination
    /// message then jumps straight to S3; a multi-destination message
    /// enters S1 and its timestamp is exchanged with every destination
    /// partition. A message returning in S2 carries its final
    /// timestamp: the clock leaps if that timestamp is ahead, and the
    /// message becomes final.
    async fn process_initial(&self, message: &mut Message) {
        if message.state == MessageState::S0 {
            if self
                .previous_set
                .conflicts(self.config.conflict.as_ref(), message)
            {
                self.clock.tick();
                self.previous_set.clear();
            }
            message.timestamp = self.clock.tock();
            self.previous_set.append(message.clone());
        }

        if message.destination.len() > 1 {
            if message.state == MessageState::S0 {
                message.state = MessageState::S1;
                message.timestamp = self.clock.tock();
                self.memo.insert(
                    message.id.clone(),
                    self.config.partition.clone(),
                    message.timestamp,
                );
                self.send(message.clone(), MessageType::External, Scope::Outer)
                    .await;
            } else if message.state == MessageState::S2 {
                message.state = MessageState::S3;
                if message.timestamp > self.clock.tock() {
                    self.clock.leap(message.timestamp);
                    self.previous_set.clear();
                }
            }
        } else {
            message.timestamp = self.clock.tock();
            message.state = MessageState::S3;
        }
    }

    /// The gather round. Each destination partition contributes one
    /// timestamp; once all have, the final timestamp is their maximum
    /// (`tsm`). A partition whose own timestamp already equals the
    /// maximum jumps to S3; otherwise the message adopts `tsm` in S2
    /// and takes one more inner pass to lift the local clock.
    ///
    /// Returns whether the queue entry should be updated.
    fn exchange_timestamps(&self, message: &mut Message) -> bool {
        self.memo
            .insert(message.id.clone(), message.from.clone(), message.timestamp);
        let values = self.memo.read(&message.id);
        if values.len() < message.destination.len() {
            return false;
        }

        let tsm = values.into_iter().max().unwrap_or(0);
        if message.timestamp >= tsm {
            message.state = MessageState::S3;
        } else {
            message.timestamp = tsm;
            message.state = MessageState::S2;
        }
        true
    }

    /// Send through the transport, retrying with a bounded backoff and
    /// aborting on cancellation.
    async fn send(&self, mut message: Message, mtype: MessageType, scope: Scope) {
        message.mtype = mtype;
        message.from = self.config.partition.clone();

        let destinations = match scope {
            Scope::Inner => vec![self.config.partition.clone()],
            Scope::Outer => message.destination.clone(),
        };

        for partition in destinations {
            loop {
                if *self.shutdown_rx.borrow() {
                    return;
                }
                match self.transport.unicast(message.clone(), partition.clone()).await {
                    Ok(()) => break,
                    Err(TransportError::Closed) => return,
                    Err(err) => {
                        tracing::error!(
                            id = %message.id,
                            partition = %partition,
                            error = %err,
                            "unicast failed; retrying"
                        );
                        tokio::time::sleep(timing::UNICAST_RETRY_BACKOFF).await;
                    }
                }
            }
        }
    }

    /// Keep re-feeding a message to the protocol while it is stuck in
    /// S0 or S2; attempt generic delivery once it is final off-head.
    async fn reprocess(self: Arc<Self>, id: Uid) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            let Some(message) = self.rqueue.get(&id) else {
                return;
            };
            match message.state {
                MessageState::S0 | MessageState::S2 => {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        _ = tokio::time::sleep(timing::REPROCESS_DELAY) => {}
                        _ = self.updated_tx.send(message.clone()) => return,
                    }
                }
                MessageState::S1 => return,
                MessageState::S3 => {
                    self.rqueue.generic_deliver(&message);
                    return;
                }
            }
        }
    }

    /// Expire timestamp exchanges that stopped making progress and fail
    /// the stalled messages locally instead of waiting forever.
    async fn sweep(self: Arc<Self>) {
        let mut shutdown = self.shutdown_rx.clone();
        let mut ticker = tokio::time::interval(timing::MEMO_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = ticker.tick() => {
                    for id in self.memo.evict_older_than(timing::GATHER_DEADLINE) {
                        let Some(message) = self.rqueue.get(&id) else { continue };
                        if message.state == MessageState::S1 {
                            tracing::warn!(id = %id, "timestamp exchange expired");
                            self.rqueue.discard(&id);
                            self.fail_observer(&id, ProtocolError::Timeout);
                        }
                    }
                }
            }
        }
    }

    fn fail_observer(&self, id: &Uid, failure: ProtocolError) {
        let observer = self.observers.lock().remove(id);
        if let Some(notify) = observer {
            let response = Response::failed(id.clone(), failure);
            self.invoker.spawn(async move {
                let _ = tokio::time::timeout(timing::OBSERVER_NOTIFY, notify.send(response)).await;
            });
        }
    }
}
