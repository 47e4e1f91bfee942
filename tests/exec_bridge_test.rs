//! Tests for the exec bridge against a local API server
//!
//! The server speaks the `v4.channel.k8s.io` remote command protocol: every
//! binary frame starts with a channel byte (1 stdout, 2 stderr, 3 status).

use std::net::SocketAddr;
use std::time::Duration;

use futures::SinkExt;
use kube::Client;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use kubechaos::k8s::{ClusterApi, K8sClient};

const STDOUT: u8 = 1;
const STDERR: u8 = 2;
const STATUS: u8 = 3;

const SUCCESS: &[u8] = br#"{"metadata":{},"status":"Success"}"#;

fn frame(channel: u8, payload: &[u8]) -> Message {
    let mut data = vec![channel];
    data.extend_from_slice(payload);
    Message::Binary(data)
}

/// Accept one exec upgrade, wait `delay`, then send `frames` and close.
/// The receiver yields the request URI.
async fn serve_exec(
    frames: Vec<Message>,
    delay: Duration,
) -> (SocketAddr, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (uri_tx, uri_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(req.uri().to_string());
            resp.headers_mut().insert(
                "Sec-WebSocket-Protocol",
                HeaderValue::from_static("v4.channel.k8s.io"),
            );
            Ok(resp)
        };

        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        tokio::time::sleep(delay).await;
        for frame in frames {
            ws.send(frame).await.unwrap();
        }
        let _ = ws.close(None).await;
    });

    (addr, uri_rx)
}

fn client_for(addr: SocketAddr) -> K8sClient {
    let config = kube::Config::new(format!("http://{}", addr).parse().unwrap());
    K8sClient::from_client(Client::try_from(config).unwrap())
}

#[tokio::test]
async fn test_exec_reads_output_sent_after_a_delay() {
    let (addr, uri) = serve_exec(
        vec![
            frame(STDOUT, b"hello from dd\n"),
            frame(STATUS, SUCCESS),
        ],
        Duration::from_millis(300),
    )
    .await;

    let session = client_for(addr)
        .exec_in_pod(
            "web-1",
            "shop",
            vec![
                "/bin/sh".into(),
                "-c".into(),
                "dd if=/dev/zero of=/data/testfile bs=1M count=1".into(),
            ],
            None,
        )
        .await
        .unwrap();
    let transcript = session.drain(Some(Duration::from_secs(5))).await;

    assert_eq!(transcript.stdout(), "hello from dd\n");
    assert!(transcript.completed());

    let uri = uri.await.unwrap();
    assert!(uri.starts_with("/api/v1/namespaces/shop/pods/web-1/exec"));
    assert!(uri.contains("stdout=true"));
    assert!(!uri.contains("stdin=true"));
}

#[tokio::test]
async fn test_exec_separates_stdout_and_stderr() {
    let (addr, uri) = serve_exec(
        vec![
            frame(STDERR, b"64+0 records in\n"),
            frame(STDOUT, b"done\n"),
            frame(STATUS, SUCCESS),
        ],
        Duration::from_millis(50),
    )
    .await;

    let session = client_for(addr)
        .exec_in_pod(
            "web-1",
            "shop",
            vec!["/bin/sh".into(), "-c".into(), "./fill.sh".into()],
            Some("app"),
        )
        .await
        .unwrap();
    let transcript = session.drain(Some(Duration::from_secs(5))).await;

    assert_eq!(transcript.stderr(), "64+0 records in\n");
    assert_eq!(transcript.stdout(), "done\n");
    assert!(uri.await.unwrap().contains("container=app"));
}
