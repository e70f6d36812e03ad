use std::{future::Future, io, pin::Pin, sync::Arc};

use tokio::net::{TcpStream, lookup_host};

pub type DialFuture = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

/// Opens a connection given a network (`tcp`, `tcp4`, `tcp6`) and a
/// `host:port` address.
pub type DialFn = Arc<dyn Fn(&str, &str) -> DialFuture + Send + Sync>;

pub fn default_dial_fn() -> DialFn {
    Arc::new(|network: &str, address: &str| -> DialFuture {
        let network = network.to_string();
        let address = address.to_string();
        Box::pin(async move { dial_tcp(&network, &address).await })
    })
}

pub async fn dial_tcp(network: &str, address: &str) -> io::Result<TcpStream> {
    if !matches!(network, "tcp" | "tcp4" | "tcp6") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported network: {network}"),
        ));
    }

    let mut last_err = None;
    for addr in lookup_host(address).await?.filter(|addr| match network {
        "tcp4" => addr.is_ipv4(),
        "tcp6" => addr.is_ipv6(),
        _ => true,
    }) {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no {network} address found for {address}"),
        )
    }))
}
