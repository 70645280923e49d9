//! LiveSession: per-view state container
//!
//! One session per open view (kitchen display, admin dashboard, customer
//! tracking page). It owns the REST client, the event channel, the
//! reconciler, the alert trigger and the connectivity tracker, and drives
//! them from one select loop:
//!
//! 1. Poll a full snapshot every `poll_interval` (at most one in flight)
//! 2. Merge channel events as they arrive
//! 3. Run status actions for the owner, applying them only once the backend
//!    accepted them
//! 4. Publish the reconciled [`Board`] and transient [`Notice`]s
//!
//! The session stops when a handle closes it or when every handle is
//! dropped; either way the channel and the poll timer go with it.

use crate::alert::{self, AlertSink, AlertTrigger, NewOrderAlert};
use crate::channel::{ChannelState, EventChannel, channel_url};
use crate::health::ConnectivityTracker;
use crate::reconcile::{OrderView, SnapshotReconciler, StatusCounts, StatusFilter};
use crate::{ClientConfig, ClientError, ClientResult, HttpClient, PathForm};
use shared::order::{self, KitchenStats, OrderPatch};
use shared::util::now_millis;
use shared::{ChannelEvent, ClientMessage, Order, OrderStatus, Role};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Command queue depth
const COMMAND_BUFFER: usize = 32;
/// Notice broadcast capacity
const NOTICE_CAPACITY: usize = 64;

/// What a session looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewScope {
    /// Kitchen queue, alerts on new orders
    Kitchen,
    /// Every order
    Admin,
    /// One order, as its customer sees it
    Customer { order_id: i64 },
}

impl ViewScope {
    pub fn role(&self) -> Role {
        match self {
            ViewScope::Kitchen => Role::Kitchen,
            ViewScope::Admin => Role::Admin,
            ViewScope::Customer { .. } => Role::Customer,
        }
    }

    fn scoped_order(&self) -> Option<i64> {
        match self {
            ViewScope::Customer { order_id } => Some(*order_id),
            _ => None,
        }
    }
}

/// Status action on one order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    /// Next forward status
    Advance,
    Cancel,
    /// Decline a pending order
    Reject,
}

impl OrderAction {
    fn target(&self, order: &Order) -> Result<OrderStatus, order::TransitionError> {
        match self {
            OrderAction::Advance => order::advance(order),
            OrderAction::Cancel => order::cancel(order),
            OrderAction::Reject => order::reject(order),
        }
    }
}

/// Transient, dismissable notice for the view
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// New pending orders appeared
    NewOrders(NewOrderAlert),
    /// Snapshot pull failed; retried on the next tick
    PollFailed { message: String },
    /// A status action was refused by the backend
    ActionFailed { order_id: i64, message: String },
    /// Scoped order changed status (customer view)
    StatusChanged { order_id: i64, status: OrderStatus },
    /// Online flag flipped
    Connectivity { online: bool },
    /// Push channel gave up; polling only
    ChannelLost,
}

/// Reconciled, display-ready state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    pub orders: Vec<OrderView>,
    pub counts: StatusCounts,
    /// Last fetched aggregate stats (kitchen/admin)
    pub stats: Option<KitchenStats>,
    pub filter: StatusFilter,
    pub online: bool,
    pub channel: ChannelState,
    /// When the last snapshot landed (epoch millis)
    pub refreshed_at: Option<i64>,
}

enum Command {
    Act {
        order_id: i64,
        action: OrderAction,
        reply: oneshot::Sender<ClientResult<OrderStatus>>,
    },
    SetFilter(StatusFilter),
    Refresh,
}

struct Snapshot {
    orders: Vec<Order>,
    stats: Option<KitchenStats>,
}

enum Completion {
    Snapshot(ClientResult<Snapshot>),
    Action {
        order_id: i64,
        target: OrderStatus,
        result: ClientResult<Option<Order>>,
        reply: oneshot::Sender<ClientResult<OrderStatus>>,
    },
}

/// Cheap handle to a running [`LiveSession`]
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    board: watch::Receiver<Board>,
    notices: broadcast::Sender<Notice>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    /// Current board
    pub fn board(&self) -> Board {
        self.board.borrow().clone()
    }

    /// Watch board updates
    pub fn watch_board(&self) -> watch::Receiver<Board> {
        self.board.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Move the order to its next status
    pub async fn advance(&self, order_id: i64) -> ClientResult<OrderStatus> {
        self.act(order_id, OrderAction::Advance).await
    }

    pub async fn cancel(&self, order_id: i64) -> ClientResult<OrderStatus> {
        self.act(order_id, OrderAction::Cancel).await
    }

    pub async fn reject(&self, order_id: i64) -> ClientResult<OrderStatus> {
        self.act(order_id, OrderAction::Reject).await
    }

    /// Run a status action; resolves once the backend answered.
    ///
    /// Illegal transitions fail with [`ClientError::Transition`] without any
    /// request being made.
    pub async fn act(&self, order_id: i64, action: OrderAction) -> ClientResult<OrderStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Act {
            order_id,
            action,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| ClientError::Channel("session stopped".into()))?
    }

    pub async fn set_filter(&self, filter: StatusFilter) -> ClientResult<()> {
        self.send(Command::SetFilter(filter)).await
    }

    /// Pull a snapshot now
    pub async fn refresh(&self) -> ClientResult<()> {
        self.send(Command::Refresh).await
    }

    /// Stop the session
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn send(&self, command: Command) -> ClientResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Channel("session stopped".into()))
    }
}

/// Per-view live state container
pub struct LiveSession {
    scope: ViewScope,
    config: ClientConfig,
    http: HttpClient,
    channel: EventChannel,
    reconciler: SnapshotReconciler,
    alerts: Option<AlertTrigger>,
    sink: Option<Arc<dyn AlertSink>>,
    health: ConnectivityTracker,
    filter: StatusFilter,
    stats: Option<KitchenStats>,
    refreshed_at: Option<i64>,

    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    board_tx: watch::Sender<Board>,
    notices: broadcast::Sender<Notice>,
    shutdown: CancellationToken,

    fetch_in_flight: bool,
    refresh_queued: bool,
}

impl LiveSession {
    /// Kitchen display: active filter, new-order alerts to `sink`
    pub fn kitchen(
        config: ClientConfig,
        sink: Arc<dyn AlertSink>,
    ) -> ClientResult<(Self, SessionHandle)> {
        Self::new(config, ViewScope::Kitchen, Some(sink))
    }

    pub fn admin(config: ClientConfig) -> ClientResult<(Self, SessionHandle)> {
        Self::new(config, ViewScope::Admin, None)
    }

    /// Customer tracking page for one order
    pub fn customer(config: ClientConfig, order_id: i64) -> ClientResult<(Self, SessionHandle)> {
        Self::new(config, ViewScope::Customer { order_id }, None)
    }

    pub fn new(
        config: ClientConfig,
        scope: ViewScope,
        sink: Option<Arc<dyn AlertSink>>,
    ) -> ClientResult<(Self, SessionHandle)> {
        let http = HttpClient::new(&config)?;
        let health = ConnectivityTracker::new(Arc::new(http.clone()));

        let role = scope.role();
        let channel = match scope {
            ViewScope::Customer { order_id } => {
                // Per-page connection id, as the tracking page does
                let connection_id = format!("customer_{}", uuid::Uuid::new_v4().simple());
                let identifier = match config.channel.path_form {
                    PathForm::Path => connection_id,
                    PathForm::Query => order_id.to_string(),
                };
                EventChannel::new(
                    channel_url(&config, role, Some(&identifier))?,
                    config.channel.clone(),
                )
                .with_subscription(ClientMessage::SubscribeOrder { order_id })
            }
            _ => EventChannel::new(channel_url(&config, role, None)?, config.channel.clone()),
        };

        let filter = StatusFilter::for_role(role);
        let alerts = (scope == ViewScope::Kitchen).then(AlertTrigger::new);

        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (board_tx, board_rx) = watch::channel(Board {
            filter: filter.clone(),
            online: true,
            ..Default::default()
        });
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let shutdown = CancellationToken::new();

        let handle = SessionHandle {
            commands: commands_tx,
            board: board_rx,
            notices: notices.clone(),
            shutdown: shutdown.clone(),
        };

        let session = Self {
            reconciler: SnapshotReconciler::new(config.urgent_after_minutes),
            scope,
            config,
            http,
            channel,
            alerts,
            sink,
            health,
            filter,
            stats: None,
            refreshed_at: None,
            commands,
            completions_tx,
            completions,
            board_tx,
            notices,
            shutdown,
            fetch_in_flight: false,
            refresh_queued: false,
        };
        Ok((session, handle))
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// Run until the handle closes the session
    pub async fn run(mut self) {
        let role = self.scope.role();
        tracing::info!(%role, "Live session started");

        let (events_tx, mut events) = mpsc::unbounded_channel();
        self.channel.open(events_tx);
        let mut channel_state = self.channel.subscribe_state();
        let mut online = self.health.subscribe();

        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                // First tick fires immediately: initial load
                _ = poll.tick() => self.request_refresh(),

                Some(event) = events.recv() => self.handle_event(event),

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    // Every handle is gone: nobody can see this view anymore
                    None => break,
                },

                Some(completion) = self.completions.recv() => self.handle_completion(completion),

                Ok(()) = channel_state.changed() => {
                    let state = *channel_state.borrow_and_update();
                    self.handle_channel_state(state);
                }

                Ok(()) = online.changed() => {
                    let online = *online.borrow_and_update();
                    tracing::info!(online, "Connectivity changed");
                    self.notify(Notice::Connectivity { online });
                    self.publish();
                }
            }
        }

        self.channel.close();
        tracing::info!(%role, "Live session stopped");
    }

    /// Spawn [`run`](Self::run) on the runtime
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    // ========== Snapshot path ==========

    fn request_refresh(&mut self) {
        if self.fetch_in_flight {
            self.refresh_queued = true;
            return;
        }
        self.fetch_in_flight = true;

        let http = self.http.clone();
        let scope = self.scope.clone();
        let done = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = fetch_snapshot(&http, &scope).await;
            let _ = done.send(Completion::Snapshot(result));
        });
    }

    fn on_snapshot(&mut self, result: ClientResult<Snapshot>) {
        self.fetch_in_flight = false;

        match result {
            Ok(snapshot) => {
                self.health.record_success();
                let before = self.scoped_status();
                let kept = self.reconciler.apply_snapshot(snapshot.orders);
                if snapshot.stats.is_some() {
                    self.stats = snapshot.stats;
                }
                self.refreshed_at = Some(now_millis());
                tracing::debug!(orders = kept, "Snapshot applied");
                self.check_status_change(before);
                self.check_alerts();
                self.publish();
            }
            Err(e) => {
                tracing::warn!("Snapshot pull failed: {e}");
                self.notify(Notice::PollFailed {
                    message: e.to_string(),
                });
            }
        }

        if std::mem::take(&mut self.refresh_queued) {
            self.request_refresh();
        }
    }

    // ========== Event path ==========

    fn handle_event(&mut self, event: ChannelEvent) {
        if let Some(scoped) = self.scope.scoped_order() {
            match event.order_id() {
                Some(id) if id == scoped => {}
                // Bare refresh hint: the next pull only fetches the scoped order
                None if event.wants_refresh() => {}
                _ => {
                    tracing::trace!(kind = event.kind(), "Ignoring event for another order");
                    return;
                }
            }
        }

        let before = self.scoped_status();
        if let Some(merge) = self.reconciler.apply_event(&event, now_millis()) {
            tracing::debug!(kind = event.kind(), order_id = ?event.order_id(), ?merge, "Event merged");
        }
        self.check_status_change(before);

        // Until the first snapshot lands the trigger stays unprimed, so that
        // snapshot is the silent first pass
        if matches!(event, ChannelEvent::NewOrder { .. }) && self.refreshed_at.is_some() {
            self.check_alerts();
        }
        if event.wants_refresh() {
            self.request_refresh();
        }
        self.publish();
    }

    fn handle_channel_state(&mut self, state: ChannelState) {
        tracing::debug!(state = state.as_str(), "Channel state");
        match state {
            ChannelState::Open => self.health.signal_online(),
            ChannelState::Backoff { attempt: 1, .. } => {
                // Connection just dropped: check whether the backend is still there
                let health = self.health.clone();
                tokio::spawn(async move {
                    health.signal_offline().await;
                });
            }
            ChannelState::GaveUp => self.notify(Notice::ChannelLost),
            _ => {}
        }
        self.publish();
    }

    // ========== Action path ==========

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Act {
                order_id,
                action,
                reply,
            } => self.start_action(order_id, action, reply),
            Command::SetFilter(filter) => {
                self.filter = filter;
                self.publish();
            }
            Command::Refresh => self.request_refresh(),
        }
    }

    fn start_action(
        &mut self,
        order_id: i64,
        action: OrderAction,
        reply: oneshot::Sender<ClientResult<OrderStatus>>,
    ) {
        let Some(order) = self.reconciler.get(order_id) else {
            let _ = reply.send(Err(ClientError::OrderNotFound(order_id)));
            return;
        };

        let target = match action.target(order) {
            Ok(target) => target,
            Err(e) => {
                tracing::info!(order_id, ?action, "Rejected locally: {e}");
                let _ = reply.send(Err(e.into()));
                return;
            }
        };

        tracing::info!(order_id, from = %order.status, to = %target, "Updating order status");
        let http = self.http.clone();
        let done = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = http.update_order_status(order_id, target).await;
            let _ = done.send(Completion::Action {
                order_id,
                target,
                result,
                reply,
            });
        });
    }

    fn on_action(
        &mut self,
        order_id: i64,
        target: OrderStatus,
        result: ClientResult<Option<Order>>,
        reply: oneshot::Sender<ClientResult<OrderStatus>>,
    ) {
        match result {
            Ok(echo) => {
                self.health.record_success();
                match echo {
                    Some(order) => {
                        self.reconciler.upsert(order);
                    }
                    None => {
                        let patch = OrderPatch {
                            updated_at: Some(now_millis()),
                            ..OrderPatch::status_only(order_id, target)
                        };
                        self.reconciler.apply_patch(&patch, now_millis());
                    }
                }
                let _ = reply.send(Ok(target));
                self.request_refresh();
                self.publish();
            }
            Err(e) => {
                tracing::warn!(order_id, to = %target, "Status update failed: {e}");
                self.notify(Notice::ActionFailed {
                    order_id,
                    message: e.to_string(),
                });
                let _ = reply.send(Err(e));
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Snapshot(result) => self.on_snapshot(result),
            Completion::Action {
                order_id,
                target,
                result,
                reply,
            } => self.on_action(order_id, target, result, reply),
        }
    }

    // ========== Output ==========

    fn scoped_status(&self) -> Option<OrderStatus> {
        let order_id = self.scope.scoped_order()?;
        self.reconciler.get(order_id).map(|order| order.status)
    }

    /// Customer view: tell the page when its order moved, from either source
    fn check_status_change(&self, before: Option<OrderStatus>) {
        let (Some(order_id), Some(before)) = (self.scope.scoped_order(), before) else {
            return;
        };
        if let Some(status) = self.scoped_status()
            && status != before
        {
            tracing::info!(order_id, from = %before, to = %status, "Order status changed");
            self.notify(Notice::StatusChanged { order_id, status });
        }
    }

    fn check_alerts(&mut self) {
        let Some(trigger) = self.alerts.as_mut() else {
            return;
        };
        let Some(alert) = trigger.observe(self.reconciler.orders()) else {
            return;
        };

        tracing::info!(orders = ?alert.order_ids, "New orders");
        if let Some(sink) = self.sink.clone() {
            let alert = alert.clone();
            tokio::spawn(async move {
                alert::deliver(sink.as_ref(), &alert).await;
            });
        }
        self.notify(Notice::NewOrders(alert));
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine
        let _ = self.notices.send(notice);
    }

    fn publish(&self) {
        let board = Board {
            orders: self.reconciler.view(&self.filter, now_millis()),
            counts: self.reconciler.status_counts(),
            stats: self.stats.clone(),
            filter: self.filter.clone(),
            online: self.health.is_online(),
            channel: self.channel.state(),
            refreshed_at: self.refreshed_at,
        };
        self.board_tx.send_replace(board);
    }
}

async fn fetch_snapshot(http: &HttpClient, scope: &ViewScope) -> ClientResult<Snapshot> {
    match scope {
        ViewScope::Kitchen => {
            let (orders, stats) =
                futures::try_join!(http.kitchen_orders(None), http.kitchen_stats())?;
            Ok(Snapshot {
                orders,
                stats: Some(stats),
            })
        }
        ViewScope::Admin => {
            let (orders, stats) =
                futures::try_join!(http.list_orders(None), http.kitchen_stats())?;
            Ok(Snapshot {
                orders,
                stats: Some(stats),
            })
        }
        ViewScope::Customer { order_id } => Ok(Snapshot {
            orders: vec![http.get_order(*order_id).await?],
            stats: None,
        }),
    }
}
