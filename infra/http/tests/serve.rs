use axum::Router;
use axum::routing::get;
use clap::{ArgMatches, Command};
use cmdkit_http::{HttpAdapter, HttpError, HttpOptions};
use cmdkit_kernel::FlagSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

const CERT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/server.crt");
const KEY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/server.key");

fn parse(adapter: &HttpAdapter, args: &[&str]) -> ArgMatches {
    let mut flags = FlagSet::new();
    adapter.register_flags(&mut flags);
    flags
        .apply(Command::new("app"))
        .try_get_matches_from(std::iter::once("app").chain(args.iter().copied()))
        .expect("parse")
}

fn router() -> Router {
    Router::new().route("/healthz", get(|| async { "ok" }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serves_plaintext_until_graceful_shutdown() {
    let adapter = HttpAdapter::new(HttpOptions::default());
    let matches = parse(&adapter, &["--http-addr", "127.0.0.1:0"]);

    let server = adapter.server_from_flags(&matches, router()).await.expect("server");
    let handle = server.handle();
    let running = tokio::spawn(server.serve());

    let addr = handle.listening().await.expect("server bound");
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("write request");
    let mut response = String::new();
    stream.read_to_string(&mut response).await.expect("read response");
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");
    assert!(response.ends_with("ok"));

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
    running.await.expect("join").expect("graceful shutdown is not an error");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serves_tls_from_flags() {
    let adapter = HttpAdapter::new(HttpOptions::default().with_flag_prefix("api"));
    let matches = parse(
        &adapter,
        &["--api-addr", "127.0.0.1:0", "--api-tls-cert-path", CERT, "--api-tls-key-path", KEY],
    );

    let server = adapter.server_from_flags(&matches, router()).await.expect("server");
    assert!(server.is_tls());
    let handle = server.handle();
    let running = tokio::spawn(server.serve());

    assert!(handle.listening().await.is_some());
    handle.shutdown();
    running.await.expect("join").expect("shutdown is not an error");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listen_from_flags_stops_on_signal() {
    let adapter = HttpAdapter::new(HttpOptions::default().with_default_enabled(true));
    let matches = parse(&adapter, &["--http-addr", "127.0.0.1:0"]);

    let (stop, stopped) = oneshot::channel::<()>();
    stop.send(()).expect("receiver alive");
    let result = adapter
        .listen_from_flags(&matches, router(), async {
            let _ = stopped.await;
        })
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn bind_conflict_is_a_serve_error() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = taken.local_addr().expect("addr").to_string();

    let adapter = HttpAdapter::new(HttpOptions::default());
    let matches = parse(&adapter, &["--http-addr", &addr]);
    let server = adapter.server_from_flags(&matches, router()).await.expect("server");

    assert!(matches!(server.serve().await, Err(HttpError::Serve { .. })));
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn listen_failure_releases_the_shutdown_future() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = taken.local_addr().expect("addr").to_string();

    let adapter = HttpAdapter::new(HttpOptions::default().with_default_enabled(true));
    let matches = parse(&adapter, &["--http-addr", &addr]);

    let dropped = Arc::new(AtomicBool::new(false));
    let flag = DropFlag(Arc::clone(&dropped));
    let shutdown = async move {
        let _flag = flag;
        std::future::pending::<()>().await;
    };

    let result = adapter.listen_from_flags(&matches, router(), shutdown).await;
    assert!(matches!(result, Err(HttpError::Serve { .. })));
    assert!(dropped.load(Ordering::SeqCst), "shutdown future outlived the server");
}
