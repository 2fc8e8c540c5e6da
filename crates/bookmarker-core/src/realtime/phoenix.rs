//! Supabase Realtime client (Phoenix channels over a websocket).

use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{ChangeEvent, ChangeFilter, Subscription, BOOKMARKS_TABLE};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{Bookmark, BookmarkId};
use crate::state::AccessToken;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const RECONNECT_BACKOFF: [Duration; 4] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(10),
];
const PHOENIX_TOPIC: &str = "phoenix";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, Message>;
type TokenUpdates = watch::Receiver<Option<String>>;

/// Opens change-feed subscriptions, one websocket per subscription.
#[derive(Clone)]
pub struct RealtimeClient {
    endpoint: String,
    access_token: AccessToken,
    heartbeat_interval: Duration,
}

impl RealtimeClient {
    /// Channels join with the token `access_token` holds at that moment and
    /// are re-authorized whenever it changes.
    pub fn new(config: &ClientConfig, access_token: AccessToken) -> Self {
        Self {
            endpoint: config.realtime_url(),
            access_token,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    /// A socket whose previous heartbeat is still unanswered when the next one
    /// is due counts as dead and is reconnected.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Connect and join a channel for `filter`.
    ///
    /// Connection failures are returned; once joined, the socket reconnects
    /// on its own with a fixed backoff and does not backfill missed events.
    /// After the server reports an expired token the channel re-joins as soon
    /// as a fresh token is published.
    pub async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        let socket = connect(&self.endpoint).await?;
        let task = ChannelTask {
            endpoint: self.endpoint.clone(),
            channel: ChannelSpec::new(&filter),
            heartbeat_interval: self.heartbeat_interval,
            access_token: self.access_token.clone(),
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = oneshot::channel();

        tracing::debug!("Joining realtime channel {}", task.channel.topic);
        tokio::spawn(run_channel(task, socket, events_tx, release_rx));

        Ok(Subscription::new(events_rx, Some(release_tx)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_ref: Option<String>,
}

struct ChannelSpec {
    topic: String,
    config: Value,
}

impl ChannelSpec {
    fn new(filter: &ChangeFilter) -> Self {
        let postgres_changes = filter
            .bindings
            .iter()
            .map(|binding| {
                let mut entry = json!({
                    "event": binding.kind,
                    "schema": filter.schema,
                    "table": filter.table,
                });
                if let Some(column_filter) = &binding.filter {
                    entry["filter"] = Value::String(column_filter.to_filter_string());
                }
                entry
            })
            .collect::<Vec<_>>();

        Self {
            topic: format!("realtime:{}:{}", filter.schema, filter.table),
            config: json!({
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": postgres_changes,
                "private": false,
            }),
        }
    }

    fn join_payload(&self, access_token: Option<&str>) -> Value {
        let mut payload = json!({ "config": self.config.clone() });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }
        payload
    }
}

struct ChannelTask {
    endpoint: String,
    channel: ChannelSpec,
    heartbeat_interval: Duration,
    access_token: AccessToken,
}

#[derive(Default)]
struct RefCounter(u64);

impl RefCounter {
    fn next(&mut self) -> String {
        self.0 += 1;
        self.0.to_string()
    }
}

#[derive(Debug, PartialEq)]
enum Inbound {
    Change(ChangeEvent),
    Joined,
    HeartbeatAck(String),
    TokenExpired(String),
    Rejected(String),
    Closed(String),
    Ignored,
}

enum ChannelEnd {
    Released,
    ConsumerGone,
    Rejected(String),
    Disconnected(String),
    TokenExpired { joined_with: Option<String> },
}

async fn run_channel(
    task: ChannelTask,
    socket: Socket,
    events: mpsc::UnboundedSender<ChangeEvent>,
    mut release: oneshot::Receiver<()>,
) {
    let topic = task.channel.topic.as_str();
    let mut socket = Some(socket);
    let mut token_updates = task.access_token.watch();
    let mut attempt = 0_usize;

    loop {
        let current = if let Some(current) = socket.take() {
            current
        } else {
            let delay = RECONNECT_BACKOFF[attempt.min(RECONNECT_BACKOFF.len() - 1)];
            tokio::select! {
                _ = &mut release => break,
                () = events.closed() => break,
                () = tokio::time::sleep(delay) => {}
            }
            match connect(&task.endpoint).await {
                Ok(current) => {
                    tracing::info!("Reconnected realtime channel {}", topic);
                    attempt = 0;
                    current
                }
                Err(error) => {
                    tracing::debug!("Realtime reconnect attempt failed: {}", error);
                    attempt += 1;
                    continue;
                }
            }
        };

        match drive_channel(current, &task, &mut token_updates, &events, &mut release).await {
            ChannelEnd::Released => {
                tracing::debug!("Released realtime channel {}", topic);
                break;
            }
            ChannelEnd::ConsumerGone => break,
            ChannelEnd::Rejected(reason) => {
                tracing::warn!("Realtime channel {} rejected: {}", topic, reason);
                break;
            }
            ChannelEnd::Disconnected(reason) => {
                tracing::info!(
                    "Realtime channel {} disconnected ({}); reconnecting",
                    topic,
                    reason
                );
            }
            ChannelEnd::TokenExpired { joined_with } => {
                tracing::info!("Realtime token expired on {}; waiting for a fresh one", topic);
                let renewed = wait_for_new_token(
                    &mut token_updates,
                    joined_with.as_deref(),
                    &events,
                    &mut release,
                )
                .await;
                if !renewed {
                    break;
                }
            }
        }
    }
}

/// Resolves to `true` once the token differs from `stale`, or `false` when
/// the subscription ends first.
async fn wait_for_new_token(
    token_updates: &mut TokenUpdates,
    stale: Option<&str>,
    events: &mpsc::UnboundedSender<ChangeEvent>,
    release: &mut oneshot::Receiver<()>,
) -> bool {
    loop {
        if token_updates.borrow_and_update().as_deref() != stale {
            return true;
        }
        tokio::select! {
            _ = &mut *release => return false,
            () = events.closed() => return false,
            changed = token_updates.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
        }
    }
}

async fn drive_channel(
    socket: Socket,
    task: &ChannelTask,
    token_updates: &mut TokenUpdates,
    events: &mpsc::UnboundedSender<ChangeEvent>,
    release: &mut oneshot::Receiver<()>,
) -> ChannelEnd {
    let channel = &task.channel;
    let (mut sink, mut stream) = socket.split();
    let mut refs = RefCounter::default();
    let join_ref = refs.next();
    let joined_with = token_updates.borrow_and_update().clone();

    let join = PhoenixMessage {
        topic: channel.topic.clone(),
        event: "phx_join".to_string(),
        payload: channel.join_payload(joined_with.as_deref()),
        reference: Some(join_ref.clone()),
        join_ref: Some(join_ref.clone()),
    };
    if let Err(error) = send(&mut sink, &join).await {
        return ChannelEnd::Disconnected(error.to_string());
    }

    let mut heartbeat = tokio::time::interval(task.heartbeat_interval);
    heartbeat.tick().await;
    let mut pending_heartbeat: Option<String> = None;

    loop {
        tokio::select! {
            _ = &mut *release => {
                leave(&mut sink, channel, &join_ref, &mut refs).await;
                return ChannelEnd::Released;
            }
            () = events.closed() => {
                leave(&mut sink, channel, &join_ref, &mut refs).await;
                return ChannelEnd::ConsumerGone;
            }
            Ok(()) = token_updates.changed() => {
                let refreshed = token_updates.borrow_and_update().clone();
                if let Some(access_token) = refreshed {
                    let message = PhoenixMessage {
                        topic: channel.topic.clone(),
                        event: "access_token".to_string(),
                        payload: json!({ "access_token": access_token }),
                        reference: Some(refs.next()),
                        join_ref: Some(join_ref.clone()),
                    };
                    if let Err(error) = send(&mut sink, &message).await {
                        return ChannelEnd::Disconnected(error.to_string());
                    }
                    tracing::debug!("Re-authorized realtime channel {}", channel.topic);
                }
            }
            _ = heartbeat.tick() => {
                if let Some(reference) = pending_heartbeat.take() {
                    return ChannelEnd::Disconnected(format!("heartbeat {reference} unanswered"));
                }
                let reference = refs.next();
                let beat = PhoenixMessage {
                    topic: PHOENIX_TOPIC.to_string(),
                    event: "heartbeat".to_string(),
                    payload: json!({}),
                    reference: Some(reference.clone()),
                    join_ref: None,
                };
                if let Err(error) = send(&mut sink, &beat).await {
                    return ChannelEnd::Disconnected(error.to_string());
                }
                pending_heartbeat = Some(reference);
            }
            frame = stream.next() => match frame {
                None => return ChannelEnd::Disconnected("socket closed".to_string()),
                Some(Err(error)) => return ChannelEnd::Disconnected(error.to_string()),
                Some(Ok(Message::Close(_))) => {
                    return ChannelEnd::Disconnected("server closed the socket".to_string());
                }
                Some(Ok(Message::Text(text))) => {
                    match classify(text.as_str(), &channel.topic, &join_ref) {
                        Inbound::Change(event) => {
                            if events.send(event).is_err() {
                                return ChannelEnd::ConsumerGone;
                            }
                        }
                        Inbound::Joined => {
                            tracing::debug!("Joined realtime channel {}", channel.topic);
                        }
                        Inbound::HeartbeatAck(reference) => {
                            if pending_heartbeat.as_deref() == Some(reference.as_str()) {
                                pending_heartbeat = None;
                            }
                        }
                        Inbound::TokenExpired(reason) => {
                            tracing::debug!("Realtime channel {}: {}", channel.topic, reason);
                            return ChannelEnd::TokenExpired { joined_with };
                        }
                        Inbound::Rejected(reason) => return ChannelEnd::Rejected(reason),
                        Inbound::Closed(reason) => return ChannelEnd::Disconnected(reason),
                        Inbound::Ignored => {}
                    }
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn leave(
    sink: &mut SocketSink,
    channel: &ChannelSpec,
    join_ref: &str,
    refs: &mut RefCounter,
) {
    let message = PhoenixMessage {
        topic: channel.topic.clone(),
        event: "phx_leave".to_string(),
        payload: json!({}),
        reference: Some(refs.next()),
        join_ref: Some(join_ref.to_string()),
    };
    if let Err(error) = send(sink, &message).await {
        tracing::debug!("Failed to send phx_leave: {}", error);
    }
    let _ = sink.close().await;
}

async fn connect(endpoint: &str) -> Result<Socket> {
    let (socket, _response) = connect_async(endpoint)
        .await
        .map_err(|error| Error::Realtime(format!("failed to connect: {error}")))?;
    Ok(socket)
}

async fn send(sink: &mut SocketSink, message: &PhoenixMessage) -> Result<()> {
    let text = serde_json::to_string(message)?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|error| Error::Realtime(error.to_string()))
}

fn classify(text: &str, topic: &str, join_ref: &str) -> Inbound {
    let Ok(message) = serde_json::from_str::<PhoenixMessage>(text) else {
        return Inbound::Ignored;
    };
    if message.topic == PHOENIX_TOPIC && message.event == "phx_reply" {
        return message
            .reference
            .map_or(Inbound::Ignored, Inbound::HeartbeatAck);
    }
    if message.topic != topic {
        return Inbound::Ignored;
    }

    match message.event.as_str() {
        "postgres_changes" => match decode_postgres_change(message.payload) {
            Ok(Some(event)) => Inbound::Change(event),
            Ok(None) => Inbound::Ignored,
            Err(error) => {
                tracing::warn!("Skipping undecodable change event: {}", error);
                Inbound::Ignored
            }
        },
        "phx_reply" if message.reference.as_deref() == Some(join_ref) => {
            if message.payload["status"] == "ok" {
                Inbound::Joined
            } else {
                refusal(message.payload["response"].to_string())
            }
        }
        "system" if message.payload["status"] == "error" => refusal(
            message.payload["message"]
                .as_str()
                .unwrap_or("system error")
                .to_string(),
        ),
        "phx_error" => Inbound::Closed("channel error".to_string()),
        "phx_close" => Inbound::Closed("channel closed by server".to_string()),
        _ => Inbound::Ignored,
    }
}

fn refusal(reason: String) -> Inbound {
    let lowered = reason.to_ascii_lowercase();
    if lowered.contains("token has expired") || lowered.contains("jwt expired") {
        Inbound::TokenExpired(reason)
    } else {
        Inbound::Rejected(reason)
    }
}

#[derive(Debug, Deserialize)]
struct PostgresChangesPayload {
    data: PostgresChange,
}

#[derive(Debug, Deserialize)]
struct PostgresChange {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

/// Decode the payload of a `postgres_changes` message.
///
/// Returns `Ok(None)` for other tables and for kinds the list does not track.
pub fn decode_postgres_change(payload: Value) -> Result<Option<ChangeEvent>> {
    let PostgresChangesPayload { data } = serde_json::from_value(payload)?;
    if data.table.as_deref().is_some_and(|table| table != BOOKMARKS_TABLE) {
        return Ok(None);
    }

    let record = |value: Option<Value>| -> Result<Bookmark> {
        let value =
            value.ok_or_else(|| Error::Realtime("change event without record".to_string()))?;
        Ok(serde_json::from_value(value)?)
    };

    match data.kind.as_str() {
        "INSERT" => Ok(Some(ChangeEvent::Insert(record(data.record)?))),
        "UPDATE" => Ok(Some(ChangeEvent::Update(record(data.record)?))),
        "DELETE" => {
            let id = data
                .old_record
                .as_ref()
                .and_then(|old| old.get("id"))
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Realtime("delete event without id".to_string()))?;
            Ok(Some(ChangeEvent::Delete {
                id: BookmarkId::new(id),
            }))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    use super::*;
    use crate::realtime::ChangeKind;

    const TOPIC: &str = "realtime:public:bookmarks";

    fn insert_payload() -> Value {
        json!({
            "data": {
                "schema": "public",
                "table": "bookmarks",
                "commit_timestamp": "2025-02-14T09:30:00Z",
                "type": "INSERT",
                "record": {
                    "id": "b1",
                    "title": "Example",
                    "url": "https://example.com",
                    "created_at": "2025-02-14T09:30:00+00:00",
                    "user_id": "alice"
                },
                "old_record": null,
                "errors": null
            },
            "ids": [42]
        })
    }

    #[test]
    fn decodes_insert_record() {
        let event = decode_postgres_change(insert_payload()).unwrap().unwrap();
        assert_eq!(event.kind(), ChangeKind::Insert);
        assert_eq!(event.id().as_str(), "b1");
        assert_eq!(event.record().map(|row| row.title.as_str()), Some("Example"));
    }

    #[test]
    fn decodes_delete_from_old_record_id() {
        let payload = json!({
            "data": {"table": "bookmarks", "type": "DELETE", "old_record": {"id": "b1"}}
        });
        assert_eq!(
            decode_postgres_change(payload).unwrap(),
            Some(ChangeEvent::Delete { id: "b1".into() })
        );
    }

    #[test]
    fn delete_without_id_is_an_error() {
        let payload = json!({"data": {"type": "DELETE", "old_record": {}}});
        assert!(decode_postgres_change(payload).is_err());
    }

    #[test]
    fn other_tables_and_kinds_are_skipped() {
        let other_table = json!({"data": {"table": "notes", "type": "INSERT", "record": {}}});
        assert_eq!(decode_postgres_change(other_table).unwrap(), None);

        let truncate = json!({"data": {"table": "bookmarks", "type": "TRUNCATE"}});
        assert_eq!(decode_postgres_change(truncate).unwrap(), None);
    }

    #[test]
    fn join_payload_lists_one_binding_per_kind() {
        let spec = ChannelSpec::new(&ChangeFilter::bookmarks_for_user("alice"));
        assert_eq!(spec.topic, TOPIC);

        let payload = spec.join_payload(Some("jwt"));
        assert_eq!(payload["access_token"], "jwt");
        assert!(spec.join_payload(None).get("access_token").is_none());

        let bindings = payload["config"]["postgres_changes"].as_array().unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0]["event"], "INSERT");
        assert_eq!(bindings[0]["filter"], "user_id=eq.alice");
        assert_eq!(bindings[1]["event"], "UPDATE");
        assert_eq!(bindings[2]["event"], "DELETE");
        assert!(bindings[2].get("filter").is_none());
    }

    #[test]
    fn classify_handles_join_replies() {
        let ok = json!({"topic": TOPIC, "event": "phx_reply", "ref": "1",
            "payload": {"status": "ok", "response": {}}});
        assert_eq!(classify(&ok.to_string(), TOPIC, "1"), Inbound::Joined);

        let rejected = json!({"topic": TOPIC, "event": "phx_reply", "ref": "1",
            "payload": {"status": "error", "response": {"reason": "unauthorized"}}});
        assert!(matches!(
            classify(&rejected.to_string(), TOPIC, "1"),
            Inbound::Rejected(reason) if reason.contains("unauthorized")
        ));

        let heartbeat_reply = json!({"topic": "phoenix", "event": "phx_reply", "ref": "2",
            "payload": {"status": "ok"}});
        assert_eq!(
            classify(&heartbeat_reply.to_string(), TOPIC, "1"),
            Inbound::HeartbeatAck("2".to_string())
        );
    }

    #[test]
    fn classify_recognizes_expired_tokens() {
        let system = expired_token_notice().to_string();
        assert!(matches!(
            classify(&system, TOPIC, "1"),
            Inbound::TokenExpired(reason) if reason.starts_with("Token has expired")
        ));

        let other = json!({"topic": TOPIC, "event": "system",
            "payload": {"status": "error", "message": "Unable to subscribe to changes"}});
        assert!(matches!(
            classify(&other.to_string(), TOPIC, "1"),
            Inbound::Rejected(_)
        ));
    }

    #[test]
    fn classify_ignores_garbage() {
        assert_eq!(classify("not json", TOPIC, "1"), Inbound::Ignored);
    }

    #[tokio::test]
    async fn subscription_receives_changes_and_leaves_on_release() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, join) = accept_join(&listener).await;
            assert_eq!(join.payload["access_token"], "jwt");
            send_json(&mut socket, &change_notice()).await;

            loop {
                let message = read_message(&mut socket).await;
                if message.event == "phx_leave" {
                    return message.topic;
                }
            }
        });

        let config = ClientConfig::new(format!("http://{address}"), "anon").unwrap();
        let client = RealtimeClient::new(&config, AccessToken::new(Some("jwt".to_string())));
        let mut subscription = client
            .subscribe(ChangeFilter::bookmarks_for_user("alice"))
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(5), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.id().as_str(), "b1");

        subscription.release();
        let left_topic = timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(left_topic, TOPIC);
    }

    #[tokio::test]
    async fn token_change_is_sent_to_the_joined_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let (joined_tx, joined_rx) = oneshot::channel();

        let server = tokio::spawn(async move {
            let (mut socket, join) = accept_join(&listener).await;
            joined_tx.send(()).unwrap();
            loop {
                let message = read_message(&mut socket).await;
                if message.event == "access_token" {
                    assert_eq!(message.join_ref, join.join_ref);
                    return message.payload["access_token"].clone();
                }
            }
        });

        let config = ClientConfig::new(format!("http://{address}"), "anon").unwrap();
        let token = AccessToken::new(Some("jwt-1".to_string()));
        let client = RealtimeClient::new(&config, token.clone());
        let _subscription = client
            .subscribe(ChangeFilter::bookmarks_for_user("alice"))
            .await
            .unwrap();

        joined_rx.await.unwrap();
        token.set(Some("jwt-2".to_string()));
        let sent = timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent, "jwt-2");
    }

    #[tokio::test]
    async fn rejoins_with_fresh_token_after_expiry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let token = AccessToken::new(Some("stale-jwt".to_string()));
        let refresher = token.clone();

        let server = tokio::spawn(async move {
            let (mut first, join) = accept_join(&listener).await;
            assert_eq!(join.payload["access_token"], "stale-jwt");
            send_json(&mut first, &expired_token_notice()).await;
            refresher.set(Some("fresh-jwt".to_string()));
            drop(first);

            let (mut second, rejoin) = accept_join(&listener).await;
            send_json(&mut second, &change_notice()).await;
            (rejoin.payload["access_token"].clone(), second)
        });

        let config = ClientConfig::new(format!("http://{address}"), "anon").unwrap();
        let client = RealtimeClient::new(&config, token);
        let mut subscription = client
            .subscribe(ChangeFilter::bookmarks_for_user("alice"))
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(10), subscription.next())
            .await
            .unwrap()
            .expect("channel stays open after token expiry");
        assert_eq!(event.id().as_str(), "b1");

        let (rejoin_token, _socket) = timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rejoin_token, "fresh-jwt");
    }

    #[tokio::test]
    async fn unanswered_heartbeat_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            // The first socket stays open but never answers a heartbeat.
            let (silent, _) = accept_join(&listener).await;
            let (mut second, _) = accept_join(&listener).await;
            send_json(&mut second, &change_notice()).await;
            (silent, second)
        });

        let config = ClientConfig::new(format!("http://{address}"), "anon").unwrap();
        let client = RealtimeClient::new(&config, AccessToken::new(None))
            .with_heartbeat_interval(Duration::from_millis(100));
        let mut subscription = client
            .subscribe(ChangeFilter::bookmarks_for_user("alice"))
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(10), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.id().as_str(), "b1");
        let _sockets = timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }

    fn change_notice() -> Value {
        json!({"topic": TOPIC, "event": "postgres_changes",
            "payload": insert_payload(), "ref": null})
    }

    fn expired_token_notice() -> Value {
        json!({"topic": TOPIC, "event": "system", "ref": null,
            "payload": {"status": "error", "extension": "system",
                "message": "Token has expired 0 seconds ago"}})
    }

    async fn accept_join(
        listener: &TcpListener,
    ) -> (WebSocketStream<TcpStream>, PhoenixMessage) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        let join = loop {
            let message = read_message(&mut socket).await;
            if message.event == "phx_join" {
                break message;
            }
        };
        let reply = json!({"topic": TOPIC, "event": "phx_reply", "ref": join.reference,
            "payload": {"status": "ok", "response": {}}});
        send_json(&mut socket, &reply).await;
        (socket, join)
    }

    async fn send_json(socket: &mut WebSocketStream<TcpStream>, value: &Value) {
        socket
            .send(Message::Text(value.to_string().into()))
            .await
            .unwrap();
    }

    async fn read_message(socket: &mut WebSocketStream<TcpStream>) -> PhoenixMessage {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).unwrap();
                }
                Some(Ok(_)) => {}
                other => panic!("unexpected socket frame: {other:?}"),
            }
        }
    }
}
