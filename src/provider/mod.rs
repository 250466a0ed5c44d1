//! Cloud-resource gateway (§4.4).
//!
//! Typed, thin wrappers over the IaaS API — no business logic lives here.
//! The `CloudGateway` trait is the seam the Provisioner and Reconciler code
//! against; `ec2` is the only production implementation, backed by the AWS
//! SDK, but tests substitute an in-memory fake behind the same trait.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ Provisioner  │
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │ dyn CloudGateway │  ← common interface
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │  Ec2Gateway  │  ← production implementation
//! └──────────────┘
//! ```

pub mod ec2;
pub mod error;
pub mod ssm;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::{GatewayError, GatewayResult};

use crate::tags::SgIngressRule;

/// Timeout/poll configuration for gateway waiters.
#[derive(Debug, Clone)]
pub struct GatewayTimeouts {
    pub instance_ready: Duration,
    pub instance_stopped: Duration,
    pub snapshot_complete: Duration,
    pub poll_interval: Duration,
}

impl Default for GatewayTimeouts {
    fn default() -> Self {
        Self {
            instance_ready: Duration::from_secs(300),
            instance_stopped: Duration::from_secs(180),
            snapshot_complete: Duration::from_secs(900),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl GatewayTimeouts {
    pub fn max_attempts(&self, budget: Duration) -> usize {
        (budget.as_secs() / self.poll_interval.as_secs().max(1)).max(1) as usize
    }
}

/// A base image resolved for a launch, either the provider's latest
/// published image or one freshly registered from a snapshot.
#[derive(Debug, Clone)]
pub enum ImageSpec {
    /// Use the latest published base image (amd64/HVM/available).
    LatestBase,
    /// A specific, already-registered image id.
    Id(String),
}

/// A request to run a new instance (§4.1 step 13).
#[derive(Debug, Clone)]
pub struct RunInstanceRequest {
    pub region: String,
    pub instance_type: String,
    pub image: ImageSpec,
    pub key_pair_name: String,
    pub security_group_id: String,
    pub subnet_id: String,
    pub disk_gb: u32,
    pub user_data: String,
    /// Tag key/value pairs applied to the instance at creation (already
    /// namespaced, e.g. `"gscp:id" -> "abc123"`).
    pub tags: HashMap<String, String>,
}

/// Cloud instance lifecycle state, as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceLifecycle {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

/// An instance as the cloud reports it, with its tags attached for the
/// reconciler to read back into a server record.
#[derive(Debug, Clone)]
pub struct Instance {
    pub instance_id: String,
    pub region: String,
    pub lifecycle: InstanceLifecycle,
    pub public_ip: Option<String>,
    pub tags: HashMap<String, String>,
    pub launch_time: DateTime<Utc>,
}

/// An elastic IP allocation.
#[derive(Debug, Clone)]
pub struct ElasticIp {
    pub allocation_id: String,
    pub public_ip: String,
    pub association_id: Option<String>,
    pub tags: HashMap<String, String>,
}

/// A block-storage snapshot.
#[derive(Debug, Clone)]
pub struct CloudSnapshot {
    pub snapshot_id: String,
    pub region: String,
    pub state: String,
    pub tags: HashMap<String, String>,
}

/// Security-group specification for `get_or_create` (§4.1 step 11).
#[derive(Debug, Clone)]
pub struct SecurityGroupSpec {
    pub region: String,
    pub name: String,
    pub description: String,
    pub vpc_id: String,
    pub ingress: Vec<SgIngressRule>,
    pub tags: HashMap<String, String>,
}

/// Thin wrapper over the IaaS API. Every operation takes an explicit region
/// (or carries one on the request) since a single control-plane host may
/// operate across several.
#[async_trait]
pub trait CloudGateway: Send + Sync {
    // -- Images --------------------------------------------------------
    async fn get_latest_base_image(&self, region: &str) -> GatewayResult<String>;
    async fn register_image_from_snapshot(
        &self,
        region: &str,
        snapshot_id: &str,
        name: &str,
    ) -> GatewayResult<String>;
    async fn deregister_image(&self, region: &str, image_id: &str) -> GatewayResult<()>;
    async fn find_images_using_snapshot(
        &self,
        region: &str,
        snapshot_id: &str,
    ) -> GatewayResult<Vec<String>>;
    async fn find_tool_images(&self, region: &str, tool_name: &str) -> GatewayResult<Vec<String>>;

    // -- Network ---------------------------------------------------------
    async fn default_vpc_subnet(&self, region: &str) -> GatewayResult<(String, String)>;

    // -- Security groups --------------------------------------------------
    async fn get_or_create_security_group(&self, spec: &SecurityGroupSpec) -> GatewayResult<String>;

    // -- Instances ---------------------------------------------------------
    async fn run_instance(&self, req: &RunInstanceRequest) -> GatewayResult<String>;
    async fn find_tagged_instances(
        &self,
        region: &str,
        tag_key: &str,
    ) -> GatewayResult<Vec<Instance>>;
    async fn get_instance(&self, region: &str, instance_id: &str) -> GatewayResult<Option<Instance>>;
    async fn terminate_instance(&self, region: &str, instance_id: &str) -> GatewayResult<()>;
    async fn stop_instance(&self, region: &str, instance_id: &str) -> GatewayResult<()>;
    async fn start_instance(&self, region: &str, instance_id: &str) -> GatewayResult<()>;
    async fn wait_instance_running(
        &self,
        region: &str,
        instance_id: &str,
        timeouts: &GatewayTimeouts,
    ) -> GatewayResult<()>;
    async fn wait_instance_stopped(
        &self,
        region: &str,
        instance_id: &str,
        timeouts: &GatewayTimeouts,
    ) -> GatewayResult<()>;
    async fn get_instance_public_ip(
        &self,
        region: &str,
        instance_id: &str,
    ) -> GatewayResult<Option<String>>;
    async fn get_instance_root_volume_id(
        &self,
        region: &str,
        instance_id: &str,
    ) -> GatewayResult<String>;
    async fn set_instance_tag(
        &self,
        region: &str,
        instance_id: &str,
        key: &str,
        value: &str,
    ) -> GatewayResult<()>;
    async fn delete_instance_tag(&self, region: &str, instance_id: &str, key: &str) -> GatewayResult<()>;

    // -- Elastic IPs -------------------------------------------------------
    async fn allocate_eip(&self, region: &str, tool_name: &str, server_id: &str) -> GatewayResult<ElasticIp>;
    async fn associate_eip(
        &self,
        region: &str,
        allocation_id: &str,
        instance_id: &str,
    ) -> GatewayResult<()>;
    async fn disassociate_eip(&self, region: &str, allocation_id: &str) -> GatewayResult<()>;
    async fn release_eip(&self, region: &str, allocation_id: &str) -> GatewayResult<()>;
    async fn find_tagged_eips(&self, region: &str, tag_key: &str) -> GatewayResult<Vec<ElasticIp>>;

    // -- Snapshots -----------------------------------------------------------
    async fn create_snapshot(
        &self,
        region: &str,
        volume_id: &str,
        description: &str,
        tags: &HashMap<String, String>,
    ) -> GatewayResult<String>;
    async fn wait_snapshot_completed(
        &self,
        region: &str,
        snapshot_id: &str,
        timeouts: &GatewayTimeouts,
    ) -> GatewayResult<()>;
    async fn delete_snapshot(&self, region: &str, snapshot_id: &str) -> GatewayResult<()>;
    async fn find_tagged_snapshots(
        &self,
        region: &str,
        tag_key: &str,
    ) -> GatewayResult<Vec<CloudSnapshot>>;

    // -- SSH key pairs -------------------------------------------------------
    async fn import_key_pair(
        &self,
        region: &str,
        name: &str,
        public_key_der: &[u8],
    ) -> GatewayResult<()>;
    async fn key_pair_fingerprint(&self, region: &str, name: &str) -> GatewayResult<Option<String>>;
    async fn delete_key_pair(&self, region: &str, name: &str) -> GatewayResult<()>;
}
