use std::{future::Future, time::Duration};

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use multidialer_transport::{ClientError, ClusterClient};

use crate::Dialer;

/// Lists the API servers currently registered in the cluster, as `host:port`.
pub trait MembershipSource {
    fn api_server_endpoints(&self)
    -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;
}

impl MembershipSource for ClusterClient {
    fn api_server_endpoints(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, ClientError>> + Send {
        ClusterClient::api_server_endpoints(self)
    }
}

pub(crate) async fn run<S>(dialer: Dialer, token: CancellationToken, source: S)
where
    S: MembershipSource + Send + Sync,
{
    let interval = dialer.options().refresh_interval;
    let query_timeout = dialer.options().query_timeout;
    info!("Starting API server discovery, refreshing every {interval:?}");

    while !token.is_cancelled() {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = query(&source, query_timeout) => apply(&dialer, result),
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("API server discovery stopped");
}

async fn query<S: MembershipSource>(
    source: &S,
    query_timeout: Duration,
) -> Result<Vec<String>, ClientError> {
    tokio::time::timeout(query_timeout, source.api_server_endpoints())
        .await
        .unwrap_or_else(|_| Err(ClientError::Timeout))
}

// Failures and empty answers keep the last-known-good set.
fn apply(dialer: &Dialer, result: Result<Vec<String>, ClientError>) {
    let mut set = dialer.lock();
    match result {
        Ok(addresses) if addresses.is_empty() => {
            warn!(
                "Discovery returned no API servers, keeping {} known backends",
                set.pool().len()
            );
        }
        Ok(addresses) => {
            if set.replace(addresses) {
                info!("API server backends: {:?}", set.pool().addresses());
            }
        }
        Err(err) => {
            warn!(
                "Discovery failed: {err}, keeping {} known backends",
                set.pool().len()
            );
        }
    }
}
