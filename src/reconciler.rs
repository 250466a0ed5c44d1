//! Reconciler (§4.2): brings the local state store into agreement with
//! cloud truth across every region this or a peer control-plane host uses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::error::Result;
use crate::provider::{CloudGateway, InstanceLifecycle};
use crate::shared_key;
use crate::state::records::{ServerRecord, ServerStatus, SnapshotRecord};
use crate::state::{ServerState, SnapshotState};
use crate::tags::{self, parse_ports};

const AUTO_RECONCILE_TTL: Duration = Duration::from_secs(30);
const DEFAULT_REGION: &str = "us-east-1";

pub struct Reconciler {
    gateway: Arc<dyn CloudGateway>,
    params: Arc<crate::provider::ssm::ParameterStore>,
    servers: Arc<ServerState>,
    snapshots: Arc<SnapshotState>,
    tool_name: String,
    extra_regions: Vec<String>,
    ttl_path: std::path::PathBuf,
}

impl Reconciler {
    pub fn new(
        gateway: Arc<dyn CloudGateway>,
        params: Arc<crate::provider::ssm::ParameterStore>,
        servers: Arc<ServerState>,
        snapshots: Arc<SnapshotState>,
        tool_name: String,
        extra_regions: Vec<String>,
        state_dir: &std::path::Path,
    ) -> Self {
        Self {
            gateway,
            params,
            servers,
            snapshots,
            tool_name,
            extra_regions,
            ttl_path: state_dir.join(".reconcile_ttl"),
        }
    }

    /// Namespace a bare tag name (e.g. `TAG_SG_ID`) the way it was written
    /// at launch, for looking it up in an `Instance`/`CloudSnapshot` tag map.
    fn tag(&self, key: &str) -> String {
        tags::tag_key(&self.tool_name, key)
    }

    /// Region set (§4.2): local record regions ∪ `extra_regions` ∪ the
    /// shared active-regions set, defaulting to one region if empty.
    pub async fn region_set(&self) -> Vec<String> {
        let mut regions: Vec<String> = self
            .servers
            .list_all()
            .await
            .iter()
            .map(|r| r.region.clone())
            .collect();
        regions.extend(self.extra_regions.clone());
        if let Ok(shared) = shared_key::active_regions(&self.params, &self.tool_name).await {
            regions.extend(shared);
        }
        regions.sort();
        regions.dedup();
        if regions.is_empty() {
            regions.push(DEFAULT_REGION.to_string());
        }
        regions
    }

    /// Full reconcile procedure (§4.2 steps 1-7).
    pub async fn reconcile(&self) -> Result<()> {
        let regions = self.region_set().await;
        let id_tag = tags::tag_key(&self.tool_name, tags::TAG_ID);

        let mut cloud_by_id = HashMap::new();
        let mut eip_by_alloc = HashMap::new();
        for region in &regions {
            for instance in self.gateway.find_tagged_instances(region, &id_tag).await? {
                if matches!(instance.lifecycle, InstanceLifecycle::Terminated | InstanceLifecycle::ShuttingDown) {
                    continue;
                }
                if let Some(id) = instance.tags.get(tags::TAG_ID).or_else(|| instance.tags.get(&id_tag)) {
                    cloud_by_id.insert(id.clone(), instance);
                }
            }
            for eip in self.gateway.find_tagged_eips(region, &id_tag).await? {
                eip_by_alloc.insert(eip.allocation_id.clone(), eip.public_ip.clone());
            }
        }

        let local = self.servers.list_all().await;
        let mut seen_ids = std::collections::HashSet::new();
        for record in local {
            seen_ids.insert(record.id.clone());
            match cloud_by_id.get(&record.id) {
                Some(instance) => {
                    self.sync_record(record, instance, &eip_by_alloc).await?;
                }
                None => {
                    self.servers.delete(&record.id).await?;
                }
            }
        }

        for (id, instance) in &cloud_by_id {
            if seen_ids.contains(id) {
                continue;
            }
            self.adopt(id, instance, &eip_by_alloc).await?;
        }

        self.reconcile_snapshots(&regions).await?;
        self.reconcile_eips(&eip_by_alloc).await?;
        self.touch_ttl()?;
        Ok(())
    }

    async fn sync_record(
        &self,
        mut record: ServerRecord,
        instance: &crate::provider::Instance,
        eip_by_alloc: &HashMap<String, String>,
    ) -> Result<()> {
        let container_stopped = instance
            .tags
            .get(&self.tag(tags::TAG_CONTAINER_STOPPED))
            .map(|v| v == "true")
            .unwrap_or(false);

        let mut new_status = match instance.lifecycle {
            InstanceLifecycle::Pending => ServerStatus::Launching,
            InstanceLifecycle::Running => ServerStatus::Running,
            InstanceLifecycle::Stopping | InstanceLifecycle::Stopped => ServerStatus::Paused,
            InstanceLifecycle::ShuttingDown | InstanceLifecycle::Terminated => record.status,
        };
        if new_status == ServerStatus::Running && (record.status == ServerStatus::Stopped || container_stopped) {
            new_status = ServerStatus::Stopped;
        }
        record.status = new_status;

        if let Some(ip) = &instance.public_ip {
            record.public_ip = ip.clone();
        }
        if let Some(sg) = instance.tags.get(&self.tag(tags::TAG_SG_ID)) {
            record.security_group_id = sg.clone();
        }
        if let Some(ports_tag) = instance.tags.get(&self.tag(tags::TAG_PORTS)) {
            if let Ok(ports) = parse_ports(ports_tag) {
                record.ports = ports.into_iter().collect();
            }
        }
        if let Some(rcon) = instance.tags.get(&self.tag(tags::TAG_RCON_PASSWORD)) {
            record.rcon_password = rcon.clone();
        }
        if let Some(name) = instance.tags.get(&self.tag(tags::TAG_CONTAINER_NAME)) {
            record.container_name = name.clone();
        }
        if let Some(launch_time) = instance.tags.get(&self.tag(tags::TAG_LAUNCH_TIME)) {
            if let Ok(parsed) = launch_time.parse() {
                record.launch_time = parsed;
            }
        }
        match instance.tags.get(&self.tag(tags::TAG_EIP_ALLOC_ID)) {
            Some(alloc) if !alloc.is_empty() => {
                record.eip_allocation_id = alloc.clone();
                if let Some(ip) = eip_by_alloc.get(alloc) {
                    record.eip_public_ip = ip.clone();
                }
            }
            _ => {
                record.eip_allocation_id.clear();
                record.eip_public_ip.clear();
            }
        }

        self.servers.save(record).await
    }

    async fn adopt(
        &self,
        id: &str,
        instance: &crate::provider::Instance,
        eip_by_alloc: &HashMap<String, String>,
    ) -> Result<()> {
        let game = instance.tags.get(&self.tag(tags::TAG_GAME)).cloned().unwrap_or_default();
        let name = instance
            .tags
            .get(&self.tag(tags::TAG_NAME))
            .cloned()
            .unwrap_or_else(|| format!("{game}-{}", &id[..id.len().min(6)]));
        let container_name = instance
            .tags
            .get(&self.tag(tags::TAG_CONTAINER_NAME))
            .cloned()
            .unwrap_or_else(|| format!("{}-{game}-{}", self.tool_name, &id[..id.len().min(8)]));
        let ports = instance
            .tags
            .get(&self.tag(tags::TAG_PORTS))
            .and_then(|p| parse_ports(p).ok())
            .unwrap_or_default();
        let container_stopped = instance
            .tags
            .get(&self.tag(tags::TAG_CONTAINER_STOPPED))
            .map(|v| v == "true")
            .unwrap_or(false);

        let status = match instance.lifecycle {
            InstanceLifecycle::Pending => ServerStatus::Launching,
            InstanceLifecycle::Running if container_stopped => ServerStatus::Stopped,
            InstanceLifecycle::Running => ServerStatus::Running,
            _ => ServerStatus::Paused,
        };

        let eip_allocation_id = instance.tags.get(&self.tag(tags::TAG_EIP_ALLOC_ID)).cloned().unwrap_or_default();
        let eip_public_ip = if eip_allocation_id.is_empty() {
            String::new()
        } else {
            eip_by_alloc.get(&eip_allocation_id).cloned().unwrap_or_default()
        };

        let record = ServerRecord {
            id: id.to_string(),
            name,
            game,
            instance_id: instance.instance_id.clone(),
            region: instance.region.clone(),
            public_ip: instance.public_ip.clone().unwrap_or_default(),
            ports: ports.into_iter().collect(),
            status,
            security_group_id: instance.tags.get(&self.tag(tags::TAG_SG_ID)).cloned().unwrap_or_default(),
            container_name,
            launch_time: instance.launch_time,
            rcon_password: instance.tags.get(&self.tag(tags::TAG_RCON_PASSWORD)).cloned().unwrap_or_default(),
            config: Default::default(),
            eip_allocation_id,
            eip_public_ip,
        };
        self.servers.save(record).await
    }

    async fn reconcile_snapshots(&self, regions: &[String]) -> Result<()> {
        let id_tag = tags::tag_key(&self.tool_name, tags::TAG_ID);
        let mut cloud_ids = std::collections::HashSet::new();
        for region in regions {
            for snap in self.gateway.find_tagged_snapshots(region, &id_tag).await? {
                cloud_ids.insert(snap.snapshot_id.clone());
            }
        }

        let local = self.snapshots.list_all().await;
        for record in &local {
            if !cloud_ids.contains(&record.snapshot_id) {
                self.snapshots.delete(&record.id).await?;
            }
        }

        let local_snapshot_ids: std::collections::HashSet<_> =
            local.iter().map(|r| r.snapshot_id.clone()).collect();
        for region in regions {
            for snap in self.gateway.find_tagged_snapshots(region, &id_tag).await? {
                if local_snapshot_ids.contains(&snap.snapshot_id) {
                    continue;
                }
                let id = snap
                    .tags
                    .get(&self.tag(tags::TAG_SNAPSHOT_ID))
                    .cloned()
                    .unwrap_or_else(|| crate::provisioner::rand_hex(12));
                let record = SnapshotRecord {
                    id,
                    snapshot_id: snap.snapshot_id.clone(),
                    game: snap.tags.get(&self.tag(tags::TAG_GAME)).cloned().unwrap_or_default(),
                    server_name: snap.tags.get(&self.tag(tags::TAG_NAME)).cloned().unwrap_or_default(),
                    server_id: snap.tags.get(tags::TAG_ID).or_else(|| snap.tags.get(&id_tag)).cloned().unwrap_or_default(),
                    region: region.clone(),
                    status: snap.state.clone(),
                    created_at: chrono::Utc::now(),
                    config: Default::default(),
                    rcon_password: String::new(),
                };
                self.snapshots.save(record).await?;
            }
        }
        Ok(())
    }

    async fn reconcile_eips(&self, eip_by_alloc: &HashMap<String, String>) -> Result<()> {
        for mut record in self.servers.list_all().await {
            if record.eip_allocation_id.is_empty() {
                continue;
            }
            if !eip_by_alloc.contains_key(&record.eip_allocation_id) {
                record.eip_allocation_id.clear();
                record.eip_public_ip.clear();
                if let Some(instance) = self.gateway.get_instance(&record.region, &record.instance_id).await? {
                    if let Some(ip) = instance.public_ip {
                        record.public_ip = ip;
                    }
                }
                self.servers.save(record).await?;
            }
        }
        Ok(())
    }

    /// Allocation id → public IP for every elastic IP tagged for this tool
    /// in `region`. Used to populate `eip_public_ip` for a single-record
    /// refresh without the full cross-region reconcile.
    async fn region_eip_map(&self, region: &str) -> HashMap<String, String> {
        let id_tag = tags::tag_key(&self.tool_name, tags::TAG_ID);
        self.gateway
            .find_tagged_eips(region, &id_tag)
            .await
            .map(|eips| eips.into_iter().map(|e| (e.allocation_id, e.public_ip)).collect())
            .unwrap_or_default()
    }

    fn touch_ttl(&self) -> Result<()> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        std::fs::write(&self.ttl_path, now.to_string())?;
        Ok(())
    }

    fn ttl_is_stale(&self) -> bool {
        let Ok(content) = std::fs::read_to_string(&self.ttl_path) else {
            return true;
        };
        let Ok(written) = content.trim().parse::<u64>() else {
            return true;
        };
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        now.saturating_sub(written) > AUTO_RECONCILE_TTL.as_secs()
    }

    /// Run the reconciler if the TTL sentinel is stale or absent. All
    /// errors are swallowed — a stale read is preferable to failing a list
    /// view (§4.2).
    pub async fn auto_reconcile(&self) {
        if !self.ttl_is_stale() {
            return;
        }
        if let Err(e) = self.reconcile().await {
            warn!("auto-reconcile failed: {e}");
        }
    }

    /// Cheaper single-record sync used inside mutating Provisioner
    /// operations. Returns `None` if the VM is gone, having already
    /// deleted the local record.
    pub async fn refresh_record(&self, id: &str) -> Result<Option<ServerRecord>> {
        let Some(record) = self.servers.get(id).await else {
            return Ok(None);
        };
        match self.gateway.get_instance(&record.region, &record.instance_id).await {
            Ok(Some(instance)) => {
                let eip_by_alloc = self.region_eip_map(&record.region).await;
                self.sync_record(record.clone(), &instance, &eip_by_alloc).await?;
                Ok(self.servers.get(id).await)
            }
            Ok(None) => {
                self.servers.delete(id).await?;
                Ok(None)
            }
            Err(e) if e.is_not_found() => {
                self.servers.delete(id).await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
