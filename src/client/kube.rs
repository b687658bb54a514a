//! HTTP client for the cluster API server

use super::{ClusterSource, NodePatcher};
use crate::node::{Frequency, Node};
use crate::topology::MERGE_PATCH_CONTENT_TYPE;
use crate::{FreqSyncError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Generic list response (`NodeList`, `VirtualMachineInstanceList`, ...)
#[derive(Debug, Deserialize)]
struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// The slice of a VirtualMachineInstance the controller reads
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VmiObject {
    status: VmiStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VmiStatus {
    topology_hints: Option<TopologyHints>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TopologyHints {
    tsc_frequency: Option<i64>,
}

/// `Status` object returned by the API server on failures
#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    message: String,
}

/// Cluster API client
#[derive(Debug, Clone)]
pub struct KubeClient {
    server: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl KubeClient {
    /// Create a client for the given API server URL
    pub fn new(server: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let server = server.into().trim_end_matches('/').to_string();

        Ok(Self {
            server,
            token,
            client,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.server, path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = response
            .json::<StatusResponse>()
            .await
            .map(|s| s.message)
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(FreqSyncError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// List every node
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        let response = self
            .request(reqwest::Method::GET, "/api/v1/nodes")
            .send()
            .await?;
        let list: ObjectList<Node> = Self::check_status(response).await?.json().await?;
        Ok(list.items)
    }

    /// TSC frequencies pinned by running virtual machine instances
    pub async fn list_frequencies_in_use(&self) -> Result<Vec<Frequency>> {
        let response = self
            .request(
                reqwest::Method::GET,
                "/apis/kubevirt.io/v1/virtualmachineinstances",
            )
            .send()
            .await?;
        let list: ObjectList<VmiObject> = Self::check_status(response).await?.json().await?;

        Ok(frequencies_from_vmis(list.items))
    }

    /// Submit a merge patch for a node
    pub async fn patch_node(&self, name: &str, patch: &Value) -> Result<()> {
        let body = serde_json::to_vec(patch)?;
        let response = self
            .request(reqwest::Method::PATCH, &format!("/api/v1/nodes/{}", name))
            .header("Content-Type", MERGE_PATCH_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }
}

fn frequencies_from_vmis(vmis: Vec<VmiObject>) -> Vec<Frequency> {
    vmis.into_iter()
        .filter_map(|vmi| vmi.status.topology_hints?.tsc_frequency)
        .filter_map(Frequency::new)
        .collect()
}

#[async_trait]
impl ClusterSource for KubeClient {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        KubeClient::list_nodes(self).await
    }

    async fn list_frequencies_in_use(&self) -> Result<Vec<Frequency>> {
        KubeClient::list_frequencies_in_use(self).await
    }
}

#[async_trait]
impl NodePatcher for KubeClient {
    async fn patch_node(&self, name: &str, patch: &Value) -> Result<()> {
        KubeClient::patch_node(self, name, patch)
            .await
            .map_err(|e| FreqSyncError::Patch {
                node: name.to_string(),
                message: e.to_string(),
            })
    }
}
