#![allow(clippy::unwrap_used)]
// Transport tests against a loopback WebSocket server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;
use url::Url;

use maasly_api::websocket::websocket_url;
use maasly_api::{ReconnectConfig, TlsMode, TransportEvent, WebSocketHandle};

// ── Helpers ─────────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = Url::parse(&format!("http://{addr}/MAAS")).unwrap();
    let url = websocket_url(&base, &SecretString::from("abc".to_owned())).unwrap();
    (listener, url)
}

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_retries: None,
    }
}

fn connect(
    url: Url,
    cookie: Option<SecretString>,
) -> (WebSocketHandle, mpsc::UnboundedReceiver<TransportEvent>) {
    WebSocketHandle::connect(
        url,
        fast_reconnect(),
        CancellationToken::new(),
        cookie,
        &TlsMode::System,
    )
    .unwrap()
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("transport stopped")
}

async fn next_observed(rx: &mut broadcast::Receiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_and_receive_frames() {
    let (listener, url) = bind().await;
    let seen: Arc<Mutex<Option<(String, Option<String>)>>> = Arc::new(Mutex::new(None));

    let seen_server = Arc::clone(&seen);
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| {
            let cookie = req
                .headers()
                .get("cookie")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            *seen_server.lock().unwrap() = Some((req.uri().to_string(), cookie));
            Ok::<Response, ErrorResponse>(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        let Some(Ok(Message::Text(text))) = ws.next().await else {
            panic!("expected a text frame");
        };
        assert!(text.as_str().contains("\"request_id\":0"));

        ws.send(Message::text(
            r#"{"request_id": 0, "type": "SUCCESS", "result": []}"#.to_owned(),
        ))
        .await
        .unwrap();
        // Keep the socket open until the client hangs up.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let cookie = Some(SecretString::from("csrftoken=abc; sessionid=s3ss".to_owned()));
    let (handle, mut events) = connect(url, cookie);

    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Open { reconnect: false }
    );

    handle
        .send(r#"{"request_id":0,"type":"zone/fetch","meta":{"model":"zone","method":"list"},"payload":{"params":null}}"#.into())
        .unwrap();

    let TransportEvent::Message(text) = next_event(&mut events).await else {
        panic!("expected a message event");
    };
    assert!(text.contains("SUCCESS"));

    let (uri, cookie) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(uri, "/MAAS/ws?csrftoken=abc");
    assert_eq!(cookie.as_deref(), Some("csrftoken=abc; sessionid=s3ss"));

    handle.shutdown();
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        // First connection: close immediately.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}

        // Second connection: stays up and pushes a notification.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::text(
            r#"{"name": "zone.created", "data": {"id": 2}}"#.to_owned(),
        ))
            .await
            .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (handle, mut events) = connect(url, None);
    // A second listener registered up front sees the same lifecycle.
    let mut other = handle.subscribe();

    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Open { reconnect: false }
    );
    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::Closed { .. }
    ));
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Open { reconnect: true }
    );
    let TransportEvent::Message(text) = next_event(&mut events).await else {
        panic!("expected a message event");
    };
    assert!(text.contains("zone.created"));

    assert_eq!(
        next_observed(&mut other).await,
        TransportEvent::Open { reconnect: false }
    );

    handle.shutdown();
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_frames_queued_before_connect_are_delivered() {
    let (listener, url) = bind().await;

    let (handle, _events) = connect(url, None);
    handle.send("first".into()).unwrap();
    handle.send("second".into()).unwrap();

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    let mut received = Vec::new();
    while received.len() < 2 {
        let frame = tokio::time::timeout(WAIT, ws.next()).await.unwrap();
        if let Some(Ok(Message::Text(text))) = frame {
            received.push(text.as_str().to_owned());
        }
    }
    assert_eq!(received, vec!["first", "second"]);

    handle.shutdown();
}

#[tokio::test]
async fn test_slow_reader_receives_every_frame_of_a_burst() {
    const BURST: usize = 1500;
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for n in 0..BURST {
            ws.send(Message::text(format!(
                r#"{{"name": "machine.update", "data": {{"id": {n}}}}}"#
            )))
            .await
            .unwrap();
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (handle, mut events) = connect(url, None);
    let mut observer = handle.subscribe();

    // Let the whole burst land before reading anything.
    tokio::time::sleep(Duration::from_millis(800)).await;

    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Open { reconnect: false }
    );
    for n in 0..BURST {
        let TransportEvent::Message(text) = next_event(&mut events).await else {
            panic!("expected message {n}");
        };
        assert!(text.contains(&format!(r#""id": {n}}}"#)), "frame {n}: {text}");
    }

    // The bounded observer feed is allowed to skip.
    assert!(matches!(
        observer.recv().await,
        Err(broadcast::error::RecvError::Lagged(_))
    ));

    handle.shutdown();
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unreadable_ca_fails_before_connecting() {
    let (_listener, url) = bind().await;

    let result = WebSocketHandle::connect(
        url,
        fast_reconnect(),
        CancellationToken::new(),
        None,
        &TlsMode::CustomCa("/nonexistent/maasly-ca.pem".into()),
    );
    assert!(matches!(result, Err(maasly_api::Error::Tls(_))));
}
