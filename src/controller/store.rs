use async_trait::async_trait;
use kube::api::{Api, DeleteParams};
use kube::{Client, ResourceExt};
use tracing::info;

use crate::controller::collaborators::AutoscalerStore;
use crate::controller::error::{Error, Result};
use crate::crd::CustomPodAutoscaler;

/// CustomPodAutoscaler access through the API server
#[derive(Clone)]
pub struct KubeAutoscalerStore {
    client: Client,
}

impl KubeAutoscalerStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AutoscalerStore for KubeAutoscalerStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CustomPodAutoscaler>> {
        let api: Api<CustomPodAutoscaler> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn delete(&self, cpa: &CustomPodAutoscaler) -> Result<()> {
        let ns = cpa
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let api: Api<CustomPodAutoscaler> = Api::namespaced(self.client.clone(), &ns);

        api.delete(&cpa.name_any(), &DeleteParams::background())
            .await?;
        info!("Deleted CustomPodAutoscaler {}/{}", ns, cpa.name_any());
        Ok(())
    }
}
