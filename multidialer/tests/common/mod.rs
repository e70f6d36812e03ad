#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    convert::Infallible,
    io,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response, StatusCode, body::Incoming, header, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use multidialer_transport::{DialFn, DialFuture, endpoints::Endpoints};

/// API server stand-in. `/version` reports the server's own address as its
/// platform so tests can tell which server answered. Every response closes
/// its connection, so each request dials again.
pub struct FakeApiServer {
    pub addr: SocketAddr,
    pub endpoint_hits: Arc<AtomicUsize>,
    peers: Arc<Mutex<Vec<SocketAddr>>>,
    broken_endpoints: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl FakeApiServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Self {
            addr,
            endpoint_hits: Arc::new(AtomicUsize::new(0)),
            peers: Arc::new(Mutex::new(Vec::new())),
            broken_endpoints: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        };

        let hits = server.endpoint_hits.clone();
        let peers = server.peers.clone();
        let broken = server.broken_endpoints.clone();
        let shutdown = server.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => stream,
                        Err(_) => break,
                    },
                };

                let hits = hits.clone();
                let peers = peers.clone();
                let broken = broken.clone();
                let service = service_fn(move |req: Request<Incoming>| {
                    let response = respond(&req, addr, &hits, &peers, &broken);
                    async move { Ok::<_, Infallible>(response) }
                });

                tokio::spawn(async move {
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        server
    }

    pub fn set_peers(&self, peers: &[SocketAddr]) {
        *self.peers.lock().unwrap() = peers.to_vec();
    }

    pub fn break_endpoints(&self) {
        self.broken_endpoints.store(true, Ordering::SeqCst);
    }

    pub fn endpoint_hits(&self) -> usize {
        self.endpoint_hits.load(Ordering::SeqCst)
    }

    /// Stops accepting; new connections are refused once the listener is gone.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn respond(
    req: &Request<Incoming>,
    addr: SocketAddr,
    hits: &AtomicUsize,
    peers: &Mutex<Vec<SocketAddr>>,
    broken: &AtomicBool,
) -> Response<Full<Bytes>> {
    let (status, body) = match req.uri().path() {
        "/version" => (
            StatusCode::OK,
            format!(r#"{{"major":"1","minor":"31","gitVersion":"v1.31.0","platform":"{addr}"}}"#),
        ),
        "/api/v1/namespaces/default/endpoints/kubernetes" => {
            hits.fetch_add(1, Ordering::SeqCst);
            if broken.load(Ordering::SeqCst) {
                (StatusCode::INTERNAL_SERVER_ERROR, "{}".to_string())
            } else {
                let endpoints = Endpoints::from_addresses(&peers.lock().unwrap());
                (StatusCode::OK, serde_json::to_string(&endpoints).unwrap())
            }
        }
        _ => (StatusCode::NOT_FOUND, "{}".to_string()),
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONNECTION, header::HeaderValue::from_static("close"));
    response
}

/// Base dial function with a routing table for names that do not resolve,
/// addresses that refuse connections, and a record of every attempt.
#[derive(Default)]
pub struct FakeDial {
    routes: Mutex<HashMap<String, SocketAddr>>,
    down: Mutex<HashSet<String>>,
    fail_once: Mutex<HashSet<String>>,
    attempts: Mutex<Vec<String>>,
}

impl FakeDial {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, name: &str, target: SocketAddr) {
        self.routes.lock().unwrap().insert(name.to_string(), target);
    }

    pub fn set_down(&self, address: &str) {
        self.down.lock().unwrap().insert(address.to_string());
    }

    pub fn fail_once(&self, address: &str) {
        self.fail_once.lock().unwrap().insert(address.to_string());
    }

    pub fn take_attempts(&self) -> Vec<String> {
        std::mem::take(&mut *self.attempts.lock().unwrap())
    }

    pub fn dial_fn(self: &Arc<Self>) -> DialFn {
        let fake = self.clone();
        Arc::new(move |_network: &str, address: &str| -> DialFuture {
            let fake = fake.clone();
            let address = address.to_string();
            Box::pin(async move {
                fake.attempts.lock().unwrap().push(address.clone());

                let failed_once = fake.fail_once.lock().unwrap().remove(&address);
                let down = fake.down.lock().unwrap().contains(&address);
                if failed_once || down {
                    return Err(io::Error::new(io::ErrorKind::ConnectionRefused, address));
                }

                let routed = fake.routes.lock().unwrap().get(&address).copied();
                match routed {
                    Some(target) => TcpStream::connect(target).await,
                    None => TcpStream::connect(address.as_str()).await,
                }
            })
        })
    }
}

pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
