use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::cluster::{Cluster, ClusterResult, PodInfo};
use crate::error::ClusterError;

/// [`Cluster`] implementation that shells out to `kubectl`.
///
/// Relies on whatever credentials `kubectl` itself resolves (in-cluster
/// service account or kubeconfig).
#[derive(Debug, Clone)]
pub struct KubectlCluster {
    binary: String,
}

impl Default for KubectlCluster {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[derive(Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<PodItem>,
}

#[derive(Deserialize)]
struct PodItem {
    metadata: PodMetadata,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Deserialize)]
struct PodMetadata {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Deserialize, Default)]
struct PodStatus {
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl KubectlCluster {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn list_args(namespace: Option<&str>) -> Vec<String> {
        let mut args = vec!["get".to_string(), "pods".to_string()];
        match namespace {
            Some(ns) => {
                args.push("--namespace".to_string());
                args.push(ns.to_string());
            }
            None => args.push("--all-namespaces".to_string()),
        }
        args.push("--output=json".to_string());
        args
    }

    fn delete_args(name: &str, namespace: &str) -> Vec<String> {
        vec![
            "delete".to_string(),
            "pod".to_string(),
            name.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--wait=false".to_string(),
        ]
    }

    /// Decode `kubectl get pods -o json` output.
    ///
    /// Evicted pods report phase `Failed` with reason `Evicted`; the reason
    /// is surfaced as the phase so it can be told apart.
    fn parse_pod_list(raw: &[u8]) -> ClusterResult<Vec<PodInfo>> {
        let list: PodList =
            serde_json::from_slice(raw).map_err(|e| ClusterError::Decode(e.to_string()))?;

        Ok(list
            .items
            .into_iter()
            .map(|item| {
                let phase = match (item.status.phase, item.status.reason) {
                    (_, Some(reason)) if reason == "Evicted" => reason,
                    (Some(phase), _) => phase,
                    (None, _) => "Unknown".to_string(),
                };
                PodInfo {
                    name: item.metadata.name,
                    namespace: item.metadata.namespace.unwrap_or_default(),
                    phase,
                }
            })
            .collect())
    }

    async fn run(&self, args: &[String]) -> ClusterResult<Vec<u8>> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ClusterError::Api(format!("failed to run {}: {}", self.binary, e)))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ClusterError::Api(if stderr.trim().is_empty() {
                format!("{} exited with {:?}", self.binary, output.status.code())
            } else {
                stderr.trim().to_string()
            }))
        }
    }
}

impl Cluster for KubectlCluster {
    async fn list_pods(&self, namespace: Option<&str>) -> ClusterResult<Vec<PodInfo>> {
        let stdout = self.run(&Self::list_args(namespace)).await?;
        Self::parse_pod_list(&stdout)
    }

    async fn delete_pod(&self, name: &str, namespace: &str) -> ClusterResult<()> {
        self.run(&Self::delete_args(name, namespace)).await?;
        tracing::debug!(pod = name, namespace, "Pod deletion requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_args_namespaced_and_global() {
        assert_eq!(
            KubectlCluster::list_args(Some("deepcell")),
            vec!["get", "pods", "--namespace", "deepcell", "--output=json"]
        );
        assert_eq!(
            KubectlCluster::list_args(None),
            vec!["get", "pods", "--all-namespaces", "--output=json"]
        );
    }

    #[test]
    fn delete_args_do_not_wait() {
        let args = KubectlCluster::delete_args("pod-1", "default");
        assert_eq!(args[..3], ["delete", "pod", "pod-1"]);
        assert!(args.contains(&"--wait=false".to_string()));
    }

    #[test]
    fn parse_pod_list_reads_name_namespace_phase() {
        let raw = br#"{
            "apiVersion": "v1",
            "items": [
                {"metadata": {"name": "consumer-a", "namespace": "deepcell"},
                 "status": {"phase": "Running"}},
                {"metadata": {"name": "consumer-b", "namespace": "deepcell"},
                 "status": {"phase": "Failed", "reason": "Evicted"}},
                {"metadata": {"name": "consumer-c"}, "status": {}}
            ]
        }"#;

        let pods = KubectlCluster::parse_pod_list(raw).unwrap();
        assert_eq!(pods.len(), 3);
        assert_eq!(pods[0], PodInfo::new("consumer-a", "deepcell", "Running"));
        assert_eq!(pods[1].phase, "Evicted");
        assert_eq!(pods[2].phase, "Unknown");
        assert_eq!(pods[2].namespace, "");
    }

    #[test]
    fn parse_pod_list_rejects_garbage() {
        let err = KubectlCluster::parse_pod_list(b"not json").unwrap_err();
        assert!(matches!(err, ClusterError::Decode(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_an_api_error() {
        let cluster = KubectlCluster::new("/nonexistent/kubectl");
        let err = cluster.list_pods(None).await.unwrap_err();
        assert!(matches!(err, ClusterError::Api(_)));
    }
}
