//! The five messaging patterns against a scripted endpoint.

mod common;

use assert_matches::assert_matches;
use plexus_client::{ClientConfig, ClientError, StreamCallbacks};
use plexus_core::frame::{ApplicationFrame, ErrorFrame, Frame, MessageType, MessagingPattern};
use plexus_core::logging::capture_logs;
use plexus_core::{Codec, CodecError, CorrelationId, JsonCodec, Payload, ProtobufCodec};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::Level;

use common::{
    TIMEOUT, answer, broadcast_frame, connected, create_service, expect_data, json_payload,
    next_frame, settle, sync_point,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Order {
    symbol: String,
    quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticket {
    order_id: u64,
    is_done: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Quote {
    symbol: String,
    price: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Watch {
    symbol: String,
}

fn order() -> Order {
    Order {
        symbol: "ACME".into(),
        quantity: 100,
    }
}

fn ticket() -> Ticket {
    Ticket {
        order_id: 42,
        is_done: true,
    }
}

fn quote(price: f64) -> Quote {
    Quote {
        symbol: "ACME".into(),
        price,
    }
}

fn watch() -> Watch {
    Watch {
        symbol: "ACME".into(),
    }
}

fn rejection(request: &ApplicationFrame, error_code: i32) -> Frame {
    Frame::Error(ErrorFrame {
        correlation_id: request.correlation_id.clone(),
        service_name: request.service_name.clone(),
        route: request.route.clone(),
        messaging_pattern: request.messaging_pattern,
        error_code,
        error_msg: Some("rejected".into()),
    })
}

async fn next_event<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a callback")
        .expect("callback sender dropped")
}

// ─── Request-response ────────────────────────────────────────────────────────

#[tokio::test]
async fn request_response_resolves_with_decoded_reply() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let trade = create_service(&harness.manager, &mut peer, "trade", JsonCodec).await;

    let reply = trade
        .request_response::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    assert_eq!(&request.correlation_id, reply.correlation_id());
    assert_eq!(request.service_name, "trade");
    assert_eq!(request.route, "trade.submit");
    assert_eq!(request.messaging_pattern, MessagingPattern::RequestResponse);
    let sent: Order = JsonCodec.decode(request.data.as_bytes()).unwrap();
    assert_eq!(sent, order());
    assert_eq!(harness.manager.pending_exchanges(), 1);

    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&ticket())))));
    let received = timeout(TIMEOUT, reply).await.unwrap().unwrap();
    assert_eq!(received, ticket());
    assert_eq!(harness.manager.pending_exchanges(), 0);
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradeResult {
    id: u64,
    is_done: bool,
    rejection_msg: Option<String>,
}

#[tokio::test]
async fn trade_submit_round_trip() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let trade = create_service(&harness.manager, &mut peer, "trading", JsonCodec).await;

    let reply = trade
        .request_response::<_, serde_json::Value>(
            "trade.submit",
            &serde_json::json!({"symbol": "AAPL", "quantity": 10}),
        )
        .unwrap();
    let text = timeout(TIMEOUT, peer.recv_text()).await.unwrap().unwrap();
    let wire: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(wire["messageType"], "DATA");
    assert_eq!(wire["messagingPattern"], "RR");
    assert_eq!(wire["route"], "trade.submit");
    assert_eq!(wire["serviceName"], "trading");
    let request = expect_data(Frame::from_json(&text).unwrap());
    let body: serde_json::Value = JsonCodec.decode(request.data.as_bytes()).unwrap();
    assert_eq!(body, serde_json::json!({"symbol": "AAPL", "quantity": 10}));

    let result = serde_json::json!({"id": 7, "isDone": true, "rejectionMsg": null});
    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&result)))));
    let received = timeout(TIMEOUT, reply).await.unwrap().unwrap();
    let typed: TradeResult = serde_json::from_value(received).unwrap();
    assert_eq!(
        typed,
        TradeResult {
            id: 7,
            is_done: true,
            rejection_msg: None,
        }
    );
}

#[tokio::test]
async fn concurrent_requests_resolve_by_correlation_id() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let trade = create_service(&harness.manager, &mut peer, "trade", JsonCodec).await;

    let first = trade
        .request_response::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let second = trade
        .request_response::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let first_request = expect_data(next_frame(&mut peer).await);
    let second_request = expect_data(next_frame(&mut peer).await);
    assert_ne!(first_request.correlation_id, second_request.correlation_id);

    let second_ticket = Ticket {
        order_id: 2,
        is_done: false,
    };
    assert!(peer.send(&Frame::Data(answer(
        &second_request,
        json_payload(&second_ticket)
    ))));
    assert!(peer.send(&Frame::Data(answer(&first_request, json_payload(&ticket())))));

    assert_eq!(timeout(TIMEOUT, second).await.unwrap().unwrap(), second_ticket);
    assert_eq!(timeout(TIMEOUT, first).await.unwrap().unwrap(), ticket());
}

#[tokio::test]
async fn duplicate_reply_is_dropped_with_warning() {
    let (logs, _guard) = capture_logs();
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let trade = create_service(&harness.manager, &mut peer, "trade", JsonCodec).await;

    let reply = trade
        .request_response::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    let response = Frame::Data(answer(&request, json_payload(&ticket())));
    assert!(peer.send(&response));
    assert!(peer.send(&response));
    assert_eq!(timeout(TIMEOUT, reply).await.unwrap().unwrap(), ticket());

    let _ = sync_point(&mut peer, "trade").await;
    let warnings = logs.matching(Level::WARN, "no pending exchange for correlation id");
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].field("correlation_id"),
        Some(request.correlation_id.as_str())
    );
}

#[tokio::test]
async fn error_reply_fails_with_protocol_error() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let trade = create_service(&harness.manager, &mut peer, "trade", JsonCodec).await;

    let reply = trade
        .request_response::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    assert!(peer.send(&rejection(&request, 409)));

    let result = timeout(TIMEOUT, reply).await.unwrap();
    assert_matches!(result, Err(ClientError::Protocol(frame)) => {
        assert_eq!(frame.error_code, 409);
        assert_eq!(frame.error_msg.as_deref(), Some("rejected"));
        assert_eq!(frame.route, "trade.submit");
    });
    assert_eq!(harness.manager.pending_exchanges(), 0);
}

#[tokio::test]
async fn initial_data_reply_fails_with_unexpected_frame() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let trade = create_service(&harness.manager, &mut peer, "trade", JsonCodec).await;

    let reply = trade
        .request_response::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    assert!(peer.send(&Frame::InitialData(answer(
        &request,
        json_payload(&ticket())
    ))));

    let result = timeout(TIMEOUT, reply).await.unwrap();
    assert_matches!(
        result,
        Err(ClientError::UnexpectedFrame { correlation_id, message_type: MessageType::InitialData })
            if correlation_id == request.correlation_id
    );
}

#[tokio::test]
async fn undecodable_reply_fails_with_codec_error() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let trade = create_service(&harness.manager, &mut peer, "trade", JsonCodec).await;

    let reply = trade
        .request_response::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    assert!(peer.send(&Frame::Data(answer(&request, "not json"))));

    let result = timeout(TIMEOUT, reply).await.unwrap();
    assert_matches!(result, Err(ClientError::Codec(CodecError::Json(_))));
}

#[tokio::test]
async fn empty_reply_payload_decodes_as_empty_bytes() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let blobs = create_service(&harness.manager, &mut peer, "blobs", plexus_core::BytesCodec).await;

    let reply = blobs
        .request_response::<Vec<u8>, Vec<u8>>("blobs.touch", &vec![1, 2, 3])
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    assert_eq!(request.data.as_bytes(), &[1, 2, 3]);
    assert!(peer.send_text(format!(
        r#"{{"messageType":"DATA","correlationId":"{}","serviceName":"blobs","route":"blobs.touch","messagingPattern":"RR","data":null}}"#,
        request.correlation_id
    )));

    assert_eq!(timeout(TIMEOUT, reply).await.unwrap().unwrap(), Vec::<u8>::new());
}

#[tokio::test(start_paused = true)]
async fn request_timeout_fails_and_forgets_the_exchange() {
    let (logs, _guard) = capture_logs();
    let config = ClientConfig {
        request_timeout_ms: Some(1_000),
        ..ClientConfig::default()
    };
    let (harness, mut peer) = connected(config).await;
    let trade = create_service(&harness.manager, &mut peer, "trade", JsonCodec).await;

    let reply = trade
        .request_response::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);

    let result = timeout(TIMEOUT, reply).await.unwrap();
    assert_matches!(
        result,
        Err(ClientError::Timeout { correlation_id, timeout_ms: 1_000 })
            if correlation_id == request.correlation_id
    );
    assert_eq!(harness.manager.pending_exchanges(), 0);

    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&ticket())))));
    let _ = sync_point(&mut peer, "trade").await;
    assert!(logs.has_event(Level::WARN, "request timed out"));
    assert!(logs.has_event(Level::WARN, "no pending exchange for correlation id"));
}

// ─── Request-response-ack ────────────────────────────────────────────────────

#[tokio::test]
async fn ack_echoes_the_request_exactly_once() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let trade = create_service(&harness.manager, &mut peer, "trade", JsonCodec).await;

    let reply = trade
        .request_response_ack::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    assert_eq!(
        request.messaging_pattern,
        MessagingPattern::RequestResponseAck
    );

    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&ticket())))));
    let acknowledgeable = timeout(TIMEOUT, reply).await.unwrap().unwrap();
    assert_eq!(acknowledgeable.response(), &ticket());

    settle().await;
    assert!(peer.try_recv().is_none(), "no ack before ack() is called");

    assert_eq!(acknowledgeable.ack().unwrap(), ticket());
    let ack = match next_frame(&mut peer).await {
        Frame::DataAck(frame) => frame,
        other => panic!("expected DATA_ACK, got {other:?}"),
    };
    assert_eq!(ack, request);

    settle().await;
    assert!(peer.try_recv().is_none());
}

#[tokio::test]
async fn ack_error_reply_fails_without_ack() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let trade = create_service(&harness.manager, &mut peer, "trade", JsonCodec).await;

    let reply = trade
        .request_response_ack::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    assert!(peer.send(&rejection(&request, 7)));

    assert_matches!(
        timeout(TIMEOUT, reply).await.unwrap(),
        Err(ClientError::Protocol(frame)) if frame.error_code == 7
    );
    let sent = sync_point(&mut peer, "trade").await;
    assert!(sent.is_empty());
}

#[tokio::test]
async fn ack_can_be_sent_later_through_the_handle() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let trade = create_service(&harness.manager, &mut peer, "trade", JsonCodec).await;

    let reply = trade
        .request_response_ack::<_, Ticket>("trade.submit", &order())
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&ticket())))));

    let (response, handle) = timeout(TIMEOUT, reply).await.unwrap().unwrap().into_parts();
    assert_eq!(response, ticket());
    assert_eq!(handle.correlation_id(), &request.correlation_id);
    handle.ack().unwrap();
    assert_matches!(next_frame(&mut peer).await, Frame::DataAck(frame) if frame == request);
}

// ─── Streams ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn private_stream_routes_snapshot_and_updates_until_closed() {
    let (logs, _guard) = capture_logs();
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let quotes = create_service(&harness.manager, &mut peer, "quotes", JsonCodec).await;

    let (tx, mut events) = mpsc::unbounded_channel();
    let initial_tx = tx.clone();
    let stream_id = quotes
        .private_stream(
            "quotes.watch",
            &watch(),
            StreamCallbacks::new(
                move |q: Quote| {
                    let _ = initial_tx.send(("initial", q));
                },
                move |q: Quote| {
                    let _ = tx.send(("data", q));
                },
            ),
        )
        .unwrap();

    let request = expect_data(next_frame(&mut peer).await);
    assert_eq!(request.correlation_id, stream_id);
    assert_eq!(request.messaging_pattern, MessagingPattern::PrivateStream);
    assert_eq!(request.route, "quotes.watch");

    assert!(peer.send(&Frame::InitialData(answer(&request, json_payload(&quote(10.0))))));
    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&quote(10.5))))));
    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&quote(11.0))))));
    assert_eq!(next_event(&mut events).await, ("initial", quote(10.0)));
    assert_eq!(next_event(&mut events).await, ("data", quote(10.5)));
    assert_eq!(next_event(&mut events).await, ("data", quote(11.0)));
    assert_eq!(harness.manager.pending_exchanges(), 1);

    quotes
        .private_stream_close("quotes.watch", &stream_id, &watch())
        .unwrap();
    let close = match next_frame(&mut peer).await {
        Frame::DataClose(frame) => frame,
        other => panic!("expected DATA_CLOSE, got {other:?}"),
    };
    assert_eq!(close.correlation_id, stream_id);
    assert_eq!(close.messaging_pattern, MessagingPattern::PrivateStream);
    assert_eq!(close.service_name, "quotes");
    let body: Watch = JsonCodec.decode(close.data.as_bytes()).unwrap();
    assert_eq!(body, watch());
    assert_eq!(harness.manager.pending_exchanges(), 0);

    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&quote(12.0))))));
    let _ = sync_point(&mut peer, "quotes").await;
    assert!(events.try_recv().is_err());
    assert!(logs.has_event(Level::WARN, "no pending exchange for correlation id"));
}

#[tokio::test]
async fn shared_stream_ignores_error_frames() {
    let (logs, _guard) = capture_logs();
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let quotes = create_service(&harness.manager, &mut peer, "quotes", JsonCodec).await;

    let (tx, mut events) = mpsc::unbounded_channel();
    let stream_id = quotes
        .shared_stream(
            "quotes.board",
            &watch(),
            StreamCallbacks::unified(move |q: Quote| {
                let _ = tx.send(q);
            }),
        )
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    assert_eq!(request.messaging_pattern, MessagingPattern::SharedStream);

    assert!(peer.send(&rejection(&request, 500)));
    assert!(peer.send(&Frame::InitialData(answer(&request, json_payload(&quote(1.0))))));
    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&quote(2.0))))));
    assert_eq!(next_event(&mut events).await, quote(1.0));
    assert_eq!(next_event(&mut events).await, quote(2.0));
    assert_eq!(harness.manager.pending_exchanges(), 1);
    assert!(!logs.has_event(Level::WARN, "no pending exchange"));

    quotes
        .shared_stream_close("quotes.board", &stream_id, &watch())
        .unwrap();
    let close = match next_frame(&mut peer).await {
        Frame::DataClose(frame) => frame,
        other => panic!("expected DATA_CLOSE, got {other:?}"),
    };
    assert_eq!(close.correlation_id, stream_id);
    assert_eq!(close.messaging_pattern, MessagingPattern::SharedStream);
    assert_eq!(harness.manager.pending_exchanges(), 0);

    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&quote(3.0))))));
    let _ = sync_point(&mut peer, "quotes").await;
    assert!(events.try_recv().is_err());
    assert!(logs.has_event(Level::WARN, "no pending exchange for correlation id"));
}

#[tokio::test]
async fn undecodable_stream_payload_is_dropped_with_warning() {
    let (logs, _guard) = capture_logs();
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let quotes = create_service(&harness.manager, &mut peer, "quotes", JsonCodec).await;

    let (tx, mut events) = mpsc::unbounded_channel();
    let _stream_id = quotes
        .private_stream(
            "quotes.watch",
            &watch(),
            StreamCallbacks::unified(move |q: Quote| {
                let _ = tx.send(q);
            }),
        )
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);

    assert!(peer.send(&Frame::Data(answer(&request, "garbage"))));
    assert!(peer.send(&Frame::Data(answer(&request, json_payload(&quote(3.0))))));
    assert_eq!(next_event(&mut events).await, quote(3.0));
    assert!(logs.has_event(Level::WARN, "dropping undecodable stream payload"));
}

// ─── Broadcast ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn broadcast_fans_out_in_subscription_order() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let alpha = create_service(&harness.manager, &mut peer, "alpha", JsonCodec).await;
    let beta = create_service(&harness.manager, &mut peer, "beta", JsonCodec).await;

    let (tx, mut events) = mpsc::unbounded_channel();
    let alpha_tx = tx.clone();
    alpha
        .broadcast("news", move |q: Quote| {
            let _ = alpha_tx.send(("alpha", q));
        })
        .unwrap();
    let beta_tx = tx.clone();
    beta.broadcast("news", move |q: Quote| {
        let _ = beta_tx.send(("beta", q));
    })
    .unwrap();
    assert_eq!(harness.manager.broadcast_subscriptions(), 2);

    let sent = sync_point(&mut peer, "alpha").await;
    assert!(sent.is_empty(), "subscribing sends nothing");

    assert!(peer.send(&broadcast_frame("alpha", "news", json_payload(&quote(1.0)))));
    assert_eq!(next_event(&mut events).await, ("alpha", quote(1.0)));
    assert_eq!(next_event(&mut events).await, ("beta", quote(1.0)));

    let replacement_tx = tx;
    alpha
        .broadcast("news", move |q: Quote| {
            let _ = replacement_tx.send(("alpha-2", q));
        })
        .unwrap();
    assert_eq!(harness.manager.broadcast_subscriptions(), 2);

    assert!(peer.send(&broadcast_frame("beta", "news", json_payload(&quote(2.0)))));
    assert_eq!(next_event(&mut events).await, ("alpha-2", quote(2.0)));
    assert_eq!(next_event(&mut events).await, ("beta", quote(2.0)));
}

#[tokio::test]
async fn broadcast_ignores_initial_data_and_other_routes() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let alpha = create_service(&harness.manager, &mut peer, "alpha", JsonCodec).await;

    let (tx, mut events) = mpsc::unbounded_channel();
    alpha
        .broadcast("news", move |q: Quote| {
            let _ = tx.send(q);
        })
        .unwrap();

    assert!(peer.send(&Frame::InitialData(ApplicationFrame::new(
        CorrelationId::new(),
        "alpha",
        "news",
        MessagingPattern::Broadcast,
        json_payload(&quote(1.0)),
    ))));
    assert!(peer.send(&broadcast_frame("alpha", "weather", json_payload(&quote(2.0)))));
    let _ = sync_point(&mut peer, "alpha").await;
    assert!(events.try_recv().is_err());

    assert!(peer.send(&broadcast_frame("alpha", "news", json_payload(&quote(3.0)))));
    assert_eq!(next_event(&mut events).await, quote(3.0));
}

// ─── Codec failures ──────────────────────────────────────────────────────────

/// Refuses to encode anything.
struct RefusingCodec;

impl Codec<String> for RefusingCodec {
    fn encode(&self, _value: &String) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::custom("refusing", "encoding disabled"))
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, CodecError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[tokio::test]
async fn encode_failure_sends_nothing() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let svc = create_service(&harness.manager, &mut peer, "refusing", RefusingCodec).await;

    let result = svc.request_response::<String, String>("echo", &"hello".to_owned());
    assert_matches!(
        result.err(),
        Some(ClientError::Codec(CodecError::Custom { codec, .. })) if codec == "refusing"
    );
    let result = svc.private_stream::<String, String>(
        "echo.stream",
        &"hello".to_owned(),
        StreamCallbacks::unified(|_| {}),
    );
    assert_matches!(result, Err(ClientError::Codec(_)));

    let sent = sync_point(&mut peer, "refusing").await;
    assert!(sent.is_empty(), "encode failures sent {sent:?}");
    assert_eq!(harness.manager.pending_exchanges(), 0);
}

#[tokio::test]
async fn payload_bytes_are_base64_on_the_wire() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let echo = create_service(&harness.manager, &mut peer, "echo", plexus_core::StringCodec).await;

    let _reply = echo
        .request_response::<String, String>("echo.say", &"hi".to_owned())
        .unwrap();
    let text = timeout(TIMEOUT, peer.recv_text()).await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["messageType"], "DATA");
    assert_eq!(value["messagingPattern"], "RR");
    assert_eq!(value["serviceName"], "echo");
    assert_eq!(value["data"], "aGk=");
    assert_eq!(Payload::from(b"hi".to_vec()).as_bytes(), b"hi");
}

#[derive(Clone, PartialEq, prost::Message)]
struct FillRequest {
    #[prost(string, tag = "1")]
    symbol: String,
    #[prost(uint32, tag = "2")]
    quantity: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
struct FillReply {
    #[prost(uint64, tag = "1")]
    fill_id: u64,
}

#[tokio::test]
async fn protobuf_service_round_trip() {
    let (harness, mut peer) = connected(ClientConfig::default()).await;
    let fills = create_service(&harness.manager, &mut peer, "fills", ProtobufCodec).await;

    let fill = FillRequest {
        symbol: "ACME".into(),
        quantity: 5,
    };
    let reply = fills
        .request_response::<FillRequest, FillReply>("fills.submit", &fill)
        .unwrap();
    let request = expect_data(next_frame(&mut peer).await);
    let sent: FillRequest = ProtobufCodec.decode(request.data.as_bytes()).unwrap();
    assert_eq!(sent, fill);

    let body = ProtobufCodec.encode(&FillReply { fill_id: 9 }).unwrap();
    assert!(peer.send(&Frame::Data(answer(&request, body))));
    assert_eq!(
        timeout(TIMEOUT, reply).await.unwrap().unwrap(),
        FillReply { fill_id: 9 }
    );
}
