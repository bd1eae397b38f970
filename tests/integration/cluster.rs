//! Connection to the cluster the integration tests run against
//!
//! The cluster comes from the ambient kubeconfig. It is probed once per test
//! binary, and the autoscaler CRD is installed once per test binary.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use kube::{Api, Client, Config};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::CrdError;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("No usable kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::InferConfigError),
}

static CLUSTER: OnceCell<Arc<SharedTestCluster>> = OnceCell::const_new();
static CRD_INSTALLED: OnceCell<()> = OnceCell::const_new();

/// Handle on the cluster shared by every integration test
pub struct SharedTestCluster {
    /// `major.minor` reported by the API server
    pub server_version: String,
}

impl SharedTestCluster {
    /// Probe the cluster on first use and reuse the handle afterwards
    pub async fn get() -> Result<Arc<SharedTestCluster>, ClusterError> {
        CLUSTER
            .get_or_try_init(|| async { Self::probe().await.map(Arc::new) })
            .await
            .map(Arc::clone)
    }

    /// A fresh client; each operator instance gets its own connection pool
    pub async fn new_client(&self) -> Result<Client, ClusterError> {
        Ok(Client::try_from(Config::infer().await?)?)
    }

    async fn probe() -> Result<Self, ClusterError> {
        let client = Client::try_from(Config::infer().await?)?;
        let info = client.apiserver_version().await?;

        // The pause tests pin Deployment replicas through the scale subresource
        let deployments: Api<Deployment> = Api::default_namespaced(client);
        deployments.list_metadata(&Default::default()).await?;

        tracing::info!(
            "Running against {} (Kubernetes {}.{})",
            info.platform,
            info.major,
            info.minor
        );
        Ok(Self {
            server_version: format!("{}.{}", info.major, info.minor),
        })
    }
}

/// Install the CustomPodAutoscaler CRD once per test binary
pub async fn ensure_crd_installed(cluster: &SharedTestCluster) -> Result<(), CrdError> {
    CRD_INSTALLED
        .get_or_try_init(|| async {
            let client = cluster
                .new_client()
                .await
                .map_err(|e| CrdError::Connect(e.to_string()))?;
            crate::install_crd(client).await
        })
        .await
        .map(|_| ())
}
