use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::{Request, Response, StatusCode, body::Incoming, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use multidialer_transport::endpoints::{API_SERVER_ENDPOINTS_PATH, Endpoints};

#[derive(Parser)]
#[command(version, about = "Minimal API server that lists a fixed set of peers")]
struct Cli {
    #[arg(long, default_value_t = 6443)]
    port: u16,

    /// Peer API server advertised in the kubernetes Endpoints (repeatable)
    #[arg(long = "peer")]
    peers: Vec<SocketAddr>,
}

async fn handle_request(
    req: Request<Incoming>,
    addr: SocketAddr,
    endpoints: Arc<Bytes>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, body) = match req.uri().path() {
        "/version" => (
            StatusCode::OK,
            Bytes::from(format!(
                r#"{{"major":"1","minor":"0","gitVersion":"fake","platform":"{addr}"}}"#
            )),
        ),
        API_SERVER_ENDPOINTS_PATH => (StatusCode::OK, Bytes::clone(&endpoints)),
        _ => (StatusCode::NOT_FOUND, Bytes::from_static(b"{}")),
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let addr: SocketAddr = format!("127.0.0.1:{}", cli.port).parse()?;

    let mut peers = cli.peers;
    if !peers.contains(&addr) {
        peers.push(addr);
    }
    let endpoints = Arc::new(Bytes::from(serde_json::to_vec(&Endpoints::from_addresses(
        &peers,
    ))?));

    let listener = TcpListener::bind(addr).await?;
    println!("Fake API server listening on http://{}", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let endpoints = endpoints.clone();
        let service = service_fn(move |req| handle_request(req, addr, endpoints.clone()));

        tokio::spawn(async move {
            let _ = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, service)
                .await;
        });
    }
}
