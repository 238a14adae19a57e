//! Supabase Realtime websocket client.
//!
//! One background task owns the socket. It connects, joins a channel per
//! registered subscription, keeps the socket alive with heartbeats and, when
//! the connection drops, reconnects with backoff and re-joins every
//! subscription that is still registered.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use market_core::config::{BackendConfig, RealtimeConfig};
use market_core::error::{AppError, ErrorKind};
use market_core::traits::{
    ChangeFeed, ChangeHandler, FeedFilter, SubscriptionHandle, SubscriptionStatus,
};
use market_core::types::SubscriptionId;

use super::backoff::ReconnectPolicy;
use super::protocol::{self, HEARTBEAT_TOPIC, Inbound, PROTOCOL_VERSION, PhoenixMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How often pending joins are checked against their deadline.
const JOIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Build the realtime websocket URL from the project URL.
pub fn realtime_endpoint(base_url: &str, api_key: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(base_url).map_err(|e| {
        AppError::configuration(format!("Invalid backend URL '{base_url}': {e}"))
    })?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(AppError::configuration(format!(
                "Unsupported backend URL scheme '{other}'"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| AppError::configuration("Cannot derive realtime URL scheme"))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", api_key)
        .append_pair("vsn", PROTOCOL_VERSION);
    Ok(url)
}

/// A registered subscription.
#[derive(Clone)]
struct Registration {
    /// Subscription ID
    id: SubscriptionId,
    /// Filter
    filter: FeedFilter,
    /// Receiver
    handler: Arc<dyn ChangeHandler>,
}

/// Requests from the feed handle to the connection task.
#[derive(Debug)]
enum Command {
    /// Join the channel for this topic
    Join(String),
    /// Leave the channel for this topic
    Leave(String),
}

/// State shared between the feed handle and the connection task.
struct Shared {
    /// Websocket URL (carries the API key)
    endpoint: Url,
    /// Token sent with every join
    access_token: String,
    /// Heartbeat period
    heartbeat_interval: Duration,
    /// Deadline for a join acknowledgement
    join_timeout: Duration,
    /// Reconnect delays
    reconnect: ReconnectPolicy,
    /// Topic → registration
    registrations: DashMap<String, Registration>,
}

impl Shared {
    fn registration(&self, topic: &str) -> Option<Registration> {
        self.registrations.get(topic).map(|r| r.value().clone())
    }

    async fn notify(&self, topic: &str, status: SubscriptionStatus) {
        if let Some(registration) = self.registration(topic) {
            registration.handler.on_status(status).await;
        }
    }

    async fn notify_all(&self, status: SubscriptionStatus) {
        let handlers: Vec<Arc<dyn ChangeHandler>> = self
            .registrations
            .iter()
            .map(|r| r.value().handler.clone())
            .collect();
        for handler in handlers {
            handler.on_status(status.clone()).await;
        }
    }
}

/// How a socket session ended.
enum SessionEnd {
    /// The feed is shutting down
    Shutdown,
    /// The connection was lost
    Lost {
        /// Cause
        reason: String,
        /// Whether any join succeeded during the session
        was_live: bool,
    },
}

/// Per-connection protocol state.
struct Session<'a> {
    shared: &'a Shared,
    sink: SplitSink<WsStream, Message>,
    next_ref: u64,
    /// Join ref → (topic, deadline)
    pending_joins: HashMap<String, (String, Instant)>,
    /// Topics with an acknowledged join
    joined: HashSet<String>,
    /// Ref of the unanswered heartbeat, if any
    pending_heartbeat: Option<String>,
    went_live: bool,
}

impl<'a> Session<'a> {
    fn new(shared: &'a Shared, sink: SplitSink<WsStream, Message>) -> Self {
        Self {
            shared,
            sink,
            next_ref: 0,
            pending_joins: HashMap::new(),
            joined: HashSet::new(),
            pending_heartbeat: None,
            went_live: false,
        }
    }

    fn make_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    fn lost(&self, reason: impl fmt::Display) -> SessionEnd {
        SessionEnd::Lost {
            reason: reason.to_string(),
            was_live: self.went_live,
        }
    }

    async fn send(&mut self, msg: PhoenixMessage) -> Result<(), AppError> {
        let text = msg.encode()?;
        self.sink.send(Message::text(text)).await.map_err(|e| {
            AppError::with_source(ErrorKind::Subscription, "Realtime socket write failed", e)
        })
    }

    async fn join(&mut self, topic: &str) -> Result<(), AppError> {
        if self.joined.contains(topic) || self.pending_joins.values().any(|(t, _)| t == topic) {
            return Ok(());
        }
        let Some(registration) = self.shared.registration(topic) else {
            return Ok(());
        };
        let reference = self.make_ref();
        let msg = PhoenixMessage::join(
            topic,
            &registration.filter,
            &self.shared.access_token,
            &reference,
        );
        self.send(msg).await?;
        debug!(topic, reference = %reference, "Joining realtime channel");
        self.pending_joins.insert(
            reference,
            (topic.to_string(), Instant::now() + self.shared.join_timeout),
        );
        Ok(())
    }

    async fn leave(&mut self, topic: &str) -> Result<(), AppError> {
        let was_pending = {
            let before = self.pending_joins.len();
            self.pending_joins.retain(|_, (t, _)| t != topic);
            before != self.pending_joins.len()
        };
        if !self.joined.remove(topic) && !was_pending {
            return Ok(());
        }
        let reference = self.make_ref();
        self.send(PhoenixMessage::leave(topic, &reference)).await?;
        debug!(topic, "Left realtime channel");
        Ok(())
    }

    async fn heartbeat(&mut self) -> Result<(), AppError> {
        if self.pending_heartbeat.is_some() {
            return Err(AppError::subscription("Heartbeat not acknowledged"));
        }
        let reference = self.make_ref();
        self.send(PhoenixMessage::heartbeat(&reference)).await?;
        trace!(reference = %reference, "Sent heartbeat");
        self.pending_heartbeat = Some(reference);
        Ok(())
    }

    /// Report timed-out joins and retry them.
    async fn expire_joins(&mut self) -> Result<(), AppError> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .pending_joins
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(reference, _)| reference.clone())
            .collect();
        for reference in expired {
            if let Some((topic, _)) = self.pending_joins.remove(&reference) {
                warn!(topic = %topic, "Realtime channel join timed out");
                self.shared.notify(&topic, SubscriptionStatus::TimedOut).await;
                self.join(&topic).await?;
            }
        }
        Ok(())
    }

    async fn handle_frame(&mut self, text: &str) -> Result<(), AppError> {
        let inbound = match protocol::decode(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable realtime frame");
                return Ok(());
            }
        };

        match inbound {
            Inbound::Reply {
                topic,
                reference,
                error,
            } => {
                if topic == HEARTBEAT_TOPIC {
                    if reference.is_some() && reference == self.pending_heartbeat {
                        self.pending_heartbeat = None;
                    }
                    return Ok(());
                }
                let Some((topic, _)) = reference.and_then(|r| self.pending_joins.remove(&r)) else {
                    return Ok(());
                };
                match error {
                    None => {
                        self.joined.insert(topic.clone());
                        self.went_live = true;
                        self.shared.notify(&topic, SubscriptionStatus::Subscribed).await;
                    }
                    Some(reason) => {
                        warn!(topic = %topic, reason = %reason, "Realtime channel join rejected");
                        self.shared
                            .notify(&topic, SubscriptionStatus::ChannelError(reason))
                            .await;
                    }
                }
            }
            Inbound::Change { topic, event } => match self.shared.registration(&topic) {
                Some(registration) if registration.filter.matches(&event) => {
                    registration.handler.on_change(event).await;
                }
                Some(_) => trace!(topic = %topic, "Change outside subscription filter"),
                None => trace!(topic = %topic, "Change for unknown channel"),
            },
            Inbound::System {
                topic,
                error: Some(reason),
            } => {
                self.shared
                    .notify(&topic, SubscriptionStatus::ChannelError(reason))
                    .await;
            }
            Inbound::System { .. } | Inbound::Ignored => {}
            Inbound::ChannelError { topic } => {
                self.joined.remove(&topic);
                if self.shared.registrations.contains_key(&topic) {
                    return Err(AppError::subscription(format!("Channel {topic} crashed")));
                }
            }
            Inbound::ChannelClosed { topic } => {
                self.joined.remove(&topic);
                if self.shared.registrations.contains_key(&topic) {
                    return Err(AppError::subscription(format!(
                        "Channel {topic} closed by server"
                    )));
                }
            }
        }
        Ok(())
    }

    async fn close(mut self) {
        let _ = self.sink.close().await;
    }
}

/// Drive one connected socket until it fails or the feed shuts down.
async fn run_session(
    shared: &Shared,
    stream: WsStream,
    commands: &mut mpsc::Receiver<Command>,
    shutdown: &CancellationToken,
) -> SessionEnd {
    let (sink, mut source) = stream.split();
    let mut session = Session::new(shared, sink);

    let topics: Vec<String> = shared.registrations.iter().map(|r| r.key().clone()).collect();
    for topic in topics {
        if let Err(e) = session.join(&topic).await {
            return session.lost(e);
        }
    }

    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + shared.heartbeat_interval,
        shared.heartbeat_interval,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut join_check = tokio::time::interval(JOIN_CHECK_INTERVAL);
    join_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                session.close().await;
                return SessionEnd::Shutdown;
            }
            _ = heartbeat.tick() => {
                if let Err(e) = session.heartbeat().await {
                    return session.lost(e);
                }
            }
            _ = join_check.tick() => {
                if let Err(e) = session.expire_joins().await {
                    return session.lost(e);
                }
            }
            command = commands.recv() => {
                let result = match command {
                    Some(Command::Join(topic)) => session.join(&topic).await,
                    Some(Command::Leave(topic)) => session.leave(&topic).await,
                    None => {
                        session.close().await;
                        return SessionEnd::Shutdown;
                    }
                };
                if let Err(e) = result {
                    return session.lost(e);
                }
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = session.handle_frame(text.as_str()).await {
                        return session.lost(e);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return session.lost(format!("socket closed by server ({frame:?})"));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return session.lost(format!("socket error: {e}")),
                None => return session.lost("socket stream ended"),
            }
        }
    }
}

/// Connection task: connect, run a session, back off, repeat.
async fn run(
    shared: Arc<Shared>,
    mut commands: mpsc::Receiver<Command>,
    shutdown: CancellationToken,
) {
    let host = shared.endpoint.host_str().unwrap_or_default().to_string();
    let mut attempt: u32 = 0;

    loop {
        let connected = tokio::select! {
            result = connect_async(shared.endpoint.as_str()) => result,
            _ = shutdown.cancelled() => break,
        };

        match connected {
            Ok((stream, _)) => {
                info!(host = %host, "Connected to realtime endpoint");
                match run_session(&shared, stream, &mut commands, &shutdown).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Lost { reason, was_live } => {
                        warn!(host = %host, reason = %reason, "Realtime connection lost");
                        if was_live {
                            attempt = 0;
                        }
                        shared
                            .notify_all(SubscriptionStatus::ChannelError(reason))
                            .await;
                    }
                }
            }
            Err(e) => {
                warn!(host = %host, attempt, error = %e, "Realtime connection failed");
                if attempt == 0 {
                    shared
                        .notify_all(SubscriptionStatus::ChannelError(format!(
                            "connection failed: {e}"
                        )))
                        .await;
                }
            }
        }

        let delay = shared.reconnect.delay_for_attempt(attempt);
        attempt = attempt.saturating_add(1);
        debug!(delay_ms = delay.as_millis() as u64, attempt, "Waiting before reconnect");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    debug!(host = %host, "Realtime connection task stopped");
}

/// [`ChangeFeed`] backed by a Supabase Realtime websocket.
pub struct SupabaseRealtimeFeed {
    /// State shared with the connection task
    shared: Arc<Shared>,
    /// Requests to the connection task
    commands: mpsc::Sender<Command>,
    /// Stops the connection task
    shutdown: CancellationToken,
    /// Connection task
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for SupabaseRealtimeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseRealtimeFeed")
            .field("host", &self.shared.endpoint.host_str())
            .field("subscriptions", &self.shared.registrations.len())
            .finish()
    }
}

impl SupabaseRealtimeFeed {
    /// Start the connection task. Must be called inside a tokio runtime.
    pub fn connect(backend: &BackendConfig, realtime: &RealtimeConfig) -> Result<Self, AppError> {
        if backend.anon_key.is_empty() {
            return Err(AppError::configuration("backend.anon_key is required"));
        }
        let endpoint = realtime_endpoint(&backend.url, &backend.anon_key)?;

        let shared = Arc::new(Shared {
            endpoint,
            access_token: backend.anon_key.clone(),
            heartbeat_interval: Duration::from_secs(realtime.heartbeat_interval_seconds.max(1)),
            join_timeout: Duration::from_secs(realtime.join_timeout_seconds.max(1)),
            reconnect: ReconnectPolicy::from_config(&realtime.reconnect),
            registrations: DashMap::new(),
        });

        let (commands, rx) = mpsc::channel(realtime.event_buffer.max(1));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(shared.clone(), rx, shutdown.clone()));

        info!(
            host = shared.endpoint.host_str().unwrap_or_default(),
            heartbeat_secs = realtime.heartbeat_interval_seconds,
            "Realtime feed started"
        );

        Ok(Self {
            shared,
            commands,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Stop the connection task and close every remaining subscription.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Realtime connection task ended abnormally");
            }
        }

        let remaining: Vec<String> = self
            .shared
            .registrations
            .iter()
            .map(|r| r.key().clone())
            .collect();
        for topic in remaining {
            if let Some((_, registration)) = self.shared.registrations.remove(&topic) {
                registration.handler.on_status(SubscriptionStatus::Closed).await;
            }
        }
        info!("Realtime feed stopped");
    }
}

impl Drop for SupabaseRealtimeFeed {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl ChangeFeed for SupabaseRealtimeFeed {
    async fn subscribe(
        &self,
        filter: FeedFilter,
        handler: Arc<dyn ChangeHandler>,
    ) -> Result<SubscriptionHandle, AppError> {
        if self.shutdown.is_cancelled() {
            return Err(AppError::subscription("Realtime feed is shut down"));
        }

        let id = SubscriptionId::new();
        let topic = protocol::topic_for(&filter, id);
        self.shared.registrations.insert(
            topic.clone(),
            Registration {
                id,
                filter: filter.clone(),
                handler,
            },
        );

        if self.commands.send(Command::Join(topic.clone())).await.is_err() {
            self.shared.registrations.remove(&topic);
            return Err(AppError::subscription("Realtime connection task has stopped"));
        }

        debug!(subscription_id = %id, topic = %topic, "Realtime subscription registered");
        Ok(SubscriptionHandle { id, filter })
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), AppError> {
        let topic = self
            .shared
            .registrations
            .iter()
            .find(|r| r.value().id == handle.id)
            .map(|r| r.key().clone());
        let Some(topic) = topic else {
            return Ok(());
        };

        if let Some((_, registration)) = self.shared.registrations.remove(&topic) {
            let _ = self.commands.send(Command::Leave(topic.clone())).await;
            debug!(subscription_id = %handle.id, topic = %topic, "Realtime subscription released");
            registration.handler.on_status(SubscriptionStatus::Closed).await;
        }
        Ok(())
    }

    fn active_subscriptions(&self) -> usize {
        self.shared.registrations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::events::{ChangeEvent, ChangeKind};

    struct Noop;

    #[async_trait]
    impl ChangeHandler for Noop {
        async fn on_change(&self, _event: ChangeEvent) {}
        async fn on_status(&self, _status: SubscriptionStatus) {}
    }

    #[test]
    fn test_endpoint_from_https_project_url() {
        let url = realtime_endpoint("https://abc.supabase.co", "key123").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=key123&vsn=1.0.0"
        );
    }

    #[test]
    fn test_endpoint_from_local_http_url() {
        let url = realtime_endpoint("http://localhost:54321/", "k").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.port(), Some(54321));
        assert_eq!(url.path(), "/realtime/v1/websocket");
    }

    #[test]
    fn test_endpoint_rejects_bad_urls() {
        assert!(realtime_endpoint("not a url", "k").is_err());
        assert!(realtime_endpoint("ftp://example.com", "k").is_err());
    }

    #[test]
    fn test_connect_requires_anon_key() {
        let backend = BackendConfig {
            url: "https://abc.supabase.co".to_string(),
            ..BackendConfig::default()
        };
        let err = SupabaseRealtimeFeed::connect(&backend, &RealtimeConfig::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_registrations_survive_unreachable_endpoint() {
        let backend = BackendConfig {
            url: "http://127.0.0.1:9".to_string(),
            anon_key: "k".to_string(),
            ..BackendConfig::default()
        };
        let feed = SupabaseRealtimeFeed::connect(&backend, &RealtimeConfig::default()).unwrap();

        let handle = feed
            .subscribe(FeedFilter::new("orders", ChangeKind::Insert), Arc::new(Noop))
            .await
            .unwrap();
        assert_eq!(feed.active_subscriptions(), 1);

        feed.unsubscribe(&handle).await.unwrap();
        assert_eq!(feed.active_subscriptions(), 0);

        feed.shutdown().await;
        let err = feed
            .subscribe(FeedFilter::new("orders", ChangeKind::Insert), Arc::new(Noop))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Subscription);
    }
}
