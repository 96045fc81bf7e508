#![cfg(feature = "async")]

use std::time::Duration;

use lenframe::frame::{AsyncFramedChannel, CancellationToken, FrameConfig, FramingError};
use lenframe::transport::TcpConnector;
use tokio::net::TcpListener;

async fn echo_server() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut channel = AsyncFramedChannel::wrap(stream);
        while let Ok(message) = channel.receive().await {
            if channel.send(&message).await.is_err() {
                break;
            }
        }
    });
    (addr, handle)
}

#[tokio::test]
async fn request_over_async_connector() {
    let (addr, server) = echo_server().await;

    let stream = TcpConnector::new().connect_async(&addr).await.unwrap();
    let mut channel = AsyncFramedChannel::wrap(stream);

    assert_eq!(channel.request(b"hi").await.unwrap().as_ref(), b"hi");
    assert!(channel.request(b"").await.unwrap().is_empty());

    channel.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn read_timeout_poisons_async_channel() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        drop(stream);
    });

    let stream = TcpConnector::new().connect_async(&addr).await.unwrap();
    let config = FrameConfig {
        read_timeout: Some(Duration::from_millis(50)),
        ..FrameConfig::default()
    };
    let mut channel = AsyncFramedChannel::with_config(stream, config);

    let err = channel.receive().await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(matches!(
        channel.receive().await.unwrap_err(),
        FramingError::Poisoned
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn cancelled_request_poisons_channel() {
    let (addr, server) = echo_server().await;
    let stream = TcpConnector::new().connect_async(&addr).await.unwrap();
    let mut channel = AsyncFramedChannel::wrap(stream);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = channel.receive_cancellable(&cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(channel.is_poisoned());
    drop(channel);
    server.await.unwrap();
}
