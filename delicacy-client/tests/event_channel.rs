// delicacy-client/tests/event_channel.rs
// 推送通道集成测试: 进程内 WebSocket 服务端

use delicacy_client::channel::channel_url;
use delicacy_client::{ChannelConfig, ChannelState, ClientConfig, EventChannel, PathForm};
use futures::{SinkExt, StreamExt};
use shared::{ChannelEvent, ClientMessage, OrderStatus, Role};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

const WAIT: Duration = Duration::from_secs(5);

fn fast_channel() -> ChannelConfig {
    ChannelConfig::default()
        .with_backoff(Duration::from_millis(10), Duration::from_millis(50), 5)
        .with_keepalive(Duration::ZERO)
}

/// Accept one connection, returning the requested path and query
async fn accept(listener: &TcpListener) -> (String, WebSocketStream<TcpStream>) {
    let (stream, _) = listener.accept().await.unwrap();
    let uri = Arc::new(Mutex::new(String::new()));
    let captured = uri.clone();
    let ws = tokio_tungstenite::accept_hdr_async(stream, move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        *captured.lock().unwrap() = req.uri().to_string();
        Ok(resp)
    })
    .await
    .unwrap();
    let uri = uri.lock().unwrap().clone();
    (uri, ws)
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        match tokio::time::timeout(WAIT, ws.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
            Some(Ok(_)) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_subscribes_and_filters_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ClientConfig::new("127.0.0.1")
        .with_port(port)
        .with_channel(fast_channel());

    let url = channel_url(&config, Role::Customer, Some("42")).unwrap();
    let mut channel = EventChannel::new(url, config.channel.clone())
        .with_subscription(ClientMessage::SubscribeOrder { order_id: 42 });
    let (events_tx, mut events) = mpsc::unbounded_channel();
    channel.open(events_tx);

    let (uri, mut ws) = accept(&listener).await;
    assert_eq!(uri, "/ws/customer?identifier=42");

    let subscribe: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(subscribe["type"], "subscribe_order");
    assert_eq!(subscribe["order_id"], 42);

    ws.send(Message::Text("not json at all".into())).await.unwrap();
    ws.send(Message::Text(r#"{"type":"menu_updated","data":{}}"#.into()))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"type":"pong"}"#.into())).await.unwrap();
    ws.send(Message::Text(
        r#"{"type":"status_change","data":{"id":42,"order_status":"ready"}}"#.into(),
    ))
    .await
    .unwrap();

    let event = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    match event {
        ChannelEvent::StatusChange { data } => {
            assert_eq!(data.id, 42);
            assert_eq!(data.status, Some(OrderStatus::Ready));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(events.try_recv().is_err(), "malformed and unknown frames are dropped");
    assert!(channel.is_open());

    channel.close();
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[tokio::test]
async fn test_reconnects_and_resubscribes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ClientConfig::new("127.0.0.1")
        .with_port(port)
        .with_channel(fast_channel().with_path_form(PathForm::Path));

    let url = channel_url(&config, Role::Customer, Some("customer_abc")).unwrap();
    let mut channel = EventChannel::new(url, config.channel.clone())
        .with_subscription(ClientMessage::SubscribeOrder { order_id: 7 });
    let mut state = channel.subscribe_state();
    let (events_tx, _events) = mpsc::unbounded_channel();
    channel.open(events_tx);

    let (uri, mut first) = accept(&listener).await;
    assert_eq!(uri, "/ws/customer/customer_abc");
    next_text(&mut first).await;
    first.close(None).await.unwrap();
    drop(first);

    let (_, mut second) = accept(&listener).await;
    let subscribe: serde_json::Value = serde_json::from_str(&next_text(&mut second).await).unwrap();
    assert_eq!(subscribe["order_id"], 7);

    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ChannelState::Open))
        .await
        .unwrap()
        .unwrap();

    channel.close();
}

#[tokio::test]
async fn test_send_reaches_server_while_open() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ClientConfig::new("127.0.0.1")
        .with_port(port)
        .with_channel(fast_channel());

    let mut channel = EventChannel::new(
        channel_url(&config, Role::Kitchen, None).unwrap(),
        config.channel.clone(),
    );
    let mut state = channel.subscribe_state();
    let (events_tx, _events) = mpsc::unbounded_channel();
    channel.open(events_tx);

    let (uri, mut ws) = accept(&listener).await;
    assert_eq!(uri, "/ws/kitchen");
    tokio::time::timeout(WAIT, state.wait_for(|s| s.is_open()))
        .await
        .unwrap()
        .unwrap();

    channel.send(ClientMessage::Ping);
    let ping: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(ping["type"], "ping");

    channel.close();
    // Server sees the close frame or the stream end
    let end = tokio::time::timeout(WAIT, ws.next()).await.unwrap();
    assert!(matches!(end, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}

#[tokio::test]
async fn test_stalled_handshake_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ClientConfig::new("127.0.0.1").with_port(port).with_channel(
        fast_channel()
            .with_backoff(Duration::from_millis(10), Duration::from_millis(10), 1)
            .with_connect_timeout(Duration::from_millis(100)),
    );

    let mut channel = EventChannel::new(
        channel_url(&config, Role::Kitchen, None).unwrap(),
        config.channel.clone(),
    );
    let mut state = channel.subscribe_state();
    let (events_tx, _events) = mpsc::unbounded_channel();
    channel.open(events_tx);

    // Accept the TCP connection but never answer the upgrade
    let (_stalled, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .unwrap()
        .unwrap();

    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ChannelState::GaveUp))
        .await
        .expect("handshake timeout should count as a failure")
        .unwrap();
    assert!(!channel.is_open());
}
