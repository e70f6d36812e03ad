//! The subset of the core/v1 `Endpoints` object needed to list API servers.

use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

pub const API_SERVER_ENDPOINTS_PATH: &str = "/api/v1/namespaces/default/endpoints/kubernetes";

const API_SERVER_PORT_NAME: &str = "https";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Endpoints {
    #[serde(default)]
    pub subsets: Vec<EndpointSubset>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSubset {
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,

    // never dialed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_ready_addresses: Vec<EndpointAddress>,

    #[serde(default)]
    pub ports: Vec<EndpointPort>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointAddress {
    pub ip: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointPort {
    #[serde(default)]
    pub name: Option<String>,
    pub port: u16,
}

impl Endpoints {
    /// Ready `host:port` pairs, sorted and de-duplicated. A subset uses its
    /// port named `https`, or its first port when none carries that name.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses = Vec::new();
        for subset in &self.subsets {
            let port = subset
                .ports
                .iter()
                .find(|p| p.name.as_deref() == Some(API_SERVER_PORT_NAME))
                .or_else(|| subset.ports.first());
            let Some(port) = port else {
                continue;
            };

            for address in &subset.addresses {
                addresses.push(join_host_port(&address.ip, port.port));
            }
        }
        addresses.sort();
        addresses.dedup();
        addresses
    }

    pub fn from_addresses(addresses: &[SocketAddr]) -> Self {
        let subsets = addresses
            .iter()
            .map(|addr| EndpointSubset {
                addresses: vec![EndpointAddress {
                    ip: addr.ip().to_string(),
                }],
                not_ready_addresses: Vec::new(),
                ports: vec![EndpointPort {
                    name: Some(API_SERVER_PORT_NAME.to_string()),
                    port: addr.port(),
                }],
            })
            .collect();
        Self { subsets }
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port).to_string(),
        Err(_) => format!("{host}:{port}"),
    }
}
