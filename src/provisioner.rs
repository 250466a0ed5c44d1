//! Provisioner (§4.1): the public operations on servers. Every mutating
//! operation here is sequenced end to end before any other caller touches
//! the same record (see §5).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::config::AppConfig;
use crate::error::{GscpError, Result};
use crate::games::{GameDefinition, GameRegistry};
use crate::provider::ssm::ParameterStore;
use crate::provider::{CloudGateway, ElasticIp, GatewayTimeouts, ImageSpec, RunInstanceRequest, SecurityGroupSpec};
use crate::reconciler::Reconciler;
use crate::remote::RemoteDocker;
use crate::shared_key;
use crate::ssh::{SshClient, SshConfig};
use crate::state::records::{ServerRecord, ServerStatus, SnapshotRecord};
use crate::state::{ServerState, SnapshotState};
use crate::tags::{self, serialize_ports, PortSpec};

/// Observes named progress events during a mutating operation — the §6
/// status-callback contract.
pub type StatusCallback<'a> = dyn Fn(&str) + Send + Sync + 'a;

/// Input to [`Provisioner::launch`].
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub game: String,
    pub region: Option<String>,
    pub instance_type: Option<String>,
    pub name: Option<String>,
    pub config_overrides: HashMap<String, String>,
    pub config_file: Option<PathBuf>,
    pub uploads: Vec<(PathBuf, String)>,
    pub from_snapshot: Option<String>,
    pub pin_ip: bool,
}

/// Generate a short random hex identifier, `len` characters long.
pub fn rand_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len.div_ceil(2)];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    hex[..len].to_string()
}

/// A cryptographically secure, URL-safe token with at least 16 bytes of
/// entropy, used for auto-generated passwords.
fn generate_secret() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub struct Provisioner {
    config: AppConfig,
    gateway: Arc<dyn CloudGateway>,
    params: Arc<ParameterStore>,
    servers: Arc<ServerState>,
    snapshots: Arc<SnapshotState>,
    games: Arc<GameRegistry>,
    reconciler: Arc<Reconciler>,
}

impl Provisioner {
    pub fn new(
        config: AppConfig,
        gateway: Arc<dyn CloudGateway>,
        params: Arc<ParameterStore>,
        servers: Arc<ServerState>,
        snapshots: Arc<SnapshotState>,
        games: Arc<GameRegistry>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            config,
            gateway,
            params,
            servers,
            snapshots,
            games,
            reconciler,
        }
    }

    fn region_of(&self, requested: Option<&str>) -> String {
        requested.map(str::to_string).unwrap_or_else(|| self.config.region.clone())
    }

    fn key_pair_name(&self) -> String {
        format!("{}-shared-key", self.config.tool_name)
    }

    fn key_path(&self) -> Result<PathBuf> {
        Ok(self.config.state_dir()?.join("ssh_key"))
    }

    async fn ssh_config(&self) -> Result<SshConfig> {
        Ok(SshConfig::new(self.config.ssh_user.clone(), self.key_path()?))
    }

    fn emit(on_status: Option<&StatusCallback>, message: impl AsRef<str>) {
        if let Some(cb) = on_status {
            cb(message.as_ref());
        }
    }

    fn user_data_script(&self) -> String {
        format!(
            "#!/bin/bash\nset -e\n(dnf install -y docker || yum install -y docker)\nsystemctl enable --now docker\nusermod -aG docker {}\n",
            self.config.ssh_user
        )
    }

    // ---------------------------------------------------------------
    // launch
    // ---------------------------------------------------------------

    pub async fn launch(&self, opts: LaunchOptions, on_status: Option<&StatusCallback>) -> Result<ServerRecord> {
        // Step 1: best-effort reconcile.
        if let Err(e) = self.reconciler.reconcile().await {
            tracing::debug!("pre-launch reconcile failed (continuing): {e}");
        }

        let game = self
            .games
            .get(&opts.game)
            .ok_or_else(|| GscpError::config(format!("unknown game '{}'", opts.game)))?;

        // Step 2: allocate id and default name.
        let id = rand_hex(12);
        let region = self.region_of(opts.region.as_deref());
        let name = opts.name.clone().unwrap_or_else(|| format!("{}-{}", game.name, &id[..6]));

        // Step 3: local name uniqueness.
        if self.servers.name_exists(&name).await {
            return Err(GscpError::config(format!("a server named '{name}' already exists")));
        }

        // Step 4: best-effort cloud name collision check.
        let name_tag = tags::tag_key(&self.config.tool_name, tags::TAG_NAME);
        for r in self.reconciler.region_set().await {
            if let Ok(instances) = self.gateway.find_tagged_instances(&r, &name_tag).await {
                if instances.iter().any(|i| i.tags.get(tags::TAG_NAME).map(|n| n == &name).unwrap_or(false)) {
                    return Err(GscpError::CloudConflict(format!(
                        "a cloud instance named '{name}' already exists in {r}"
                    )));
                }
            }
        }

        // Step 5: snapshot restore may not be combined with config changes.
        let is_restore = opts.from_snapshot.is_some();
        if is_restore
            && (!opts.config_overrides.is_empty() || opts.config_file.is_some() || !opts.uploads.is_empty())
        {
            return Err(GscpError::config(
                "snapshot restores cannot be combined with config overrides, a config file, or uploads",
            ));
        }

        // Step 6: build effective config, generating secrets as needed. A
        // restore instead recovers the config and RCON password exactly as
        // they were at snapshot time, rather than generating fresh ones.
        let mut restore_snapshot: Option<SnapshotRecord> = None;
        let (config, rcon_password): (HashMap<String, String>, String) = if is_restore {
            let snapshot_id = opts.from_snapshot.as_deref().unwrap();
            let snapshot = self
                .snapshots
                .get(snapshot_id)
                .await
                .ok_or_else(|| GscpError::CloudNotFound(format!("snapshot '{snapshot_id}' not found")))?;
            let config: HashMap<String, String> = snapshot.config.clone().into_iter().collect();
            let rcon_password = snapshot.rcon_password.clone();
            restore_snapshot = Some(snapshot);
            (config, rcon_password)
        } else {
            let mut config = game.defaults.clone();
            if let Some(path) = &opts.config_file {
                let content = std::fs::read_to_string(path)?;
                let file_config: HashMap<String, String> = serde_json::from_str(&content)?;
                config.extend(file_config);
            }
            config.extend(opts.config_overrides.clone());

            for key in &game.password_keys {
                config.entry(key.clone()).or_insert_with(generate_secret);
            }
            let rcon_password = if let Some(rcon_key) = &game.rcon_password_key {
                config.entry(rcon_key.clone()).or_insert_with(generate_secret).clone()
            } else {
                String::new()
            };
            (config, rcon_password)
        };

        // Step 7: required config present, unless restoring.
        if !is_restore && !game.required_config.is_empty() {
            let missing: Vec<_> = game
                .required_config
                .iter()
                .filter(|k| !config.contains_key(k.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(GscpError::config(format!(
                    "missing required config keys for {}: {}. Use --config to set them.",
                    game.name,
                    missing.join(", ")
                )));
            }
        }

        let cleanup = Arc::new(std::sync::Mutex::new(LaunchCleanupState::default()));
        match self
            .launch_inner(&id, &name, &region, &game, config, rcon_password, restore_snapshot, &opts, on_status, &cleanup)
            .await
        {
            Ok(record) => Ok(record),
            Err(e) => {
                self.cleanup_failed_launch(&id, &region, &cleanup, on_status).await;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn launch_inner(
        &self,
        id: &str,
        name: &str,
        region: &str,
        game: &GameDefinition,
        mut config: HashMap<String, String>,
        mut rcon_password: String,
        restore_snapshot: Option<SnapshotRecord>,
        opts: &LaunchOptions,
        on_status: Option<&StatusCallback>,
        cleanup: &Arc<std::sync::Mutex<LaunchCleanupState>>,
    ) -> Result<ServerRecord> {
        Self::emit(on_status, "resolving network");
        let (vpc_id, subnet_id) = self.gateway.default_vpc_subnet(region).await?;

        Self::emit(on_status, "ensuring shared SSH key");
        let key_path = self.key_path()?;
        shared_key::ensure_shared_key(&self.params, &self.config.tool_name, &key_path).await?;
        let key_pair_name = self.key_pair_name();
        shared_key::converge_cloud_key_pair(self.gateway.as_ref(), region, &key_pair_name, &key_path).await?;

        Self::emit(on_status, "resolving base image");
        let mut temp_image_id: Option<String> = None;
        let image = if let Some(snapshot) = &restore_snapshot {
            let image_id = self
                .gateway
                .register_image_from_snapshot(region, &snapshot.snapshot_id, &format!("{}-restore-{id}", self.config.tool_name))
                .await?;
            temp_image_id = Some(image_id.clone());
            cleanup.lock().unwrap().temp_image_id = Some(image_id.clone());
            ImageSpec::Id(image_id)
        } else {
            ImageSpec::Id(self.gateway.get_latest_base_image(region).await?)
        };

        Self::emit(on_status, "ensuring security group");
        let sg_name = format!("{}-{}-sg", self.config.tool_name, game.name);
        let mut ingress: Vec<_> = game.ports.iter().map(PortSpec::sg_rule).collect();
        ingress.push(crate::tags::SgIngressRule {
            from_port: 22,
            to_port: 22,
            protocol: crate::tags::Protocol::Tcp,
            cidr: self.config.ssh_cidr.clone(),
        });
        let sg_id = self
            .gateway
            .get_or_create_security_group(&SecurityGroupSpec {
                region: region.to_string(),
                name: sg_name,
                description: format!("{} ingress for {}", self.config.tool_name, game.name),
                vpc_id,
                ingress,
                tags: HashMap::from([(tags::tag_key(&self.config.tool_name, tags::TAG_ID), game.name.clone())]),
            })
            .await?;

        let container_name = format!("{}-{}-{}", self.config.tool_name, game.name, &id[..8.min(id.len())]);
        let ports_tag_value = serialize_ports(&game.ports);
        let launch_time = chrono::Utc::now();

        let mut instance_tags = HashMap::new();
        let t = &self.config.tool_name;
        instance_tags.insert(tags::tag_key(t, tags::TAG_ID), id.to_string());
        instance_tags.insert(tags::tag_key(t, tags::TAG_GAME), game.name.clone());
        instance_tags.insert(tags::tag_key(t, tags::TAG_NAME), name.to_string());
        instance_tags.insert(tags::tag_key(t, tags::TAG_SG_ID), sg_id.clone());
        instance_tags.insert(tags::tag_key(t, tags::TAG_PORTS), ports_tag_value.clone());
        instance_tags.insert(tags::tag_key(t, tags::TAG_RCON_PASSWORD), rcon_password.clone());
        instance_tags.insert(tags::tag_key(t, tags::TAG_CONTAINER_NAME), container_name.clone());
        instance_tags.insert(tags::tag_key(t, tags::TAG_LAUNCH_TIME), launch_time.to_rfc3339());

        Self::emit(on_status, "launching instance");
        let instance_id = self
            .gateway
            .run_instance(&RunInstanceRequest {
                region: region.to_string(),
                instance_type: opts.instance_type.clone().unwrap_or_else(|| game.default_instance_type.clone()),
                image,
                key_pair_name,
                security_group_id: sg_id.clone(),
                subnet_id,
                disk_gb: game.disk_gb,
                user_data: self.user_data_script(),
                tags: instance_tags,
            })
            .await?;

        shared_key::add_active_region(&self.params, &self.config.tool_name, region).await?;

        let mut record = ServerRecord {
            id: id.to_string(),
            name: name.to_string(),
            game: game.name.clone(),
            instance_id: instance_id.clone(),
            region: region.to_string(),
            public_ip: String::new(),
            ports: crate::tags::ports_to_map(&game.ports),
            status: ServerStatus::Launching,
            security_group_id: sg_id,
            container_name: container_name.clone(),
            launch_time,
            rcon_password: rcon_password.clone(),
            config: config.clone().into_iter().collect(),
            eip_allocation_id: String::new(),
            eip_public_ip: String::new(),
        };
        // Orphan-prevention point: any failure after this leaves a
        // discoverable record.
        self.servers.save(record.clone()).await?;

        Self::emit(on_status, "waiting for instance to start");
        let timeouts = GatewayTimeouts::default();
        self.gateway.wait_instance_running(region, &instance_id, &timeouts).await?;
        let ip = self
            .gateway
            .get_instance_public_ip(region, &instance_id)
            .await?
            .ok_or_else(|| GscpError::remote("instance has no public IP"))?;
        record.public_ip = ip.clone();
        self.servers.save(record.clone()).await?;

        Self::emit(on_status, "connecting over SSH");
        let ssh_config = self.ssh_config().await?;
        let ssh = SshClient::connect(&ip, 22, &ssh_config).await?;
        cleanup.lock().unwrap().ssh = Some(ssh.clone());
        let docker = RemoteDocker::new(&ssh);

        Self::emit(on_status, "waiting for container daemon");
        docker.wait_ready(30, Duration::from_secs(5)).await?;

        let mut effective_container_name = container_name.clone();
        if let Some(snapshot) = &restore_snapshot {
            Self::emit(on_status, "restoring container from snapshot");
            let found = docker
                .find_tool_container(&self.config.tool_name)
                .await?
                .ok_or_else(|| GscpError::remote("no managed container found on restored volume"))?;
            self.gateway
                .set_instance_tag(region, &instance_id, &tags::tag_key(t, tags::TAG_CONTAINER_NAME), &found)
                .await?;
            effective_container_name = found.clone();

            // Snapshots taken before a record carried its own config/RCON
            // password fall back to the legacy on-host recovery anchor.
            if config.is_empty() || rcon_password.is_empty() {
                if let Ok(raw) = ssh.exec(&format!("sudo cat /opt/{t}/metadata.json")).await {
                    if let Ok(metadata) = serde_json::from_str::<serde_json::Value>(&raw) {
                        if config.is_empty() {
                            if let Some(legacy_config) = metadata.get("config").and_then(|v| v.as_object()) {
                                config = legacy_config
                                    .iter()
                                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                                    .collect();
                            }
                        }
                        if rcon_password.is_empty() {
                            if let Some(pw) = metadata.get("rcon_password").and_then(|v| v.as_str()) {
                                rcon_password = pw.to_string();
                            }
                        }
                    }
                } else {
                    tracing::debug!(
                        "no legacy metadata.json found on restored volume for snapshot {}",
                        snapshot.id
                    );
                }
            }

            docker.start(&found).await?;
        } else if opts.uploads.is_empty() && !game.is_catalog_family() {
            Self::emit(on_status, "pulling and starting container");
            docker.pull(&game.image).await?;
            docker
                .run(&container_name, &game.image, &game.ports, &config, &game.volumes, &game.extra_docker_args)
                .await?;
        } else {
            Self::emit(on_status, "creating container");
            docker.pull(&game.image).await?;
            docker
                .create(&container_name, &game.image, &game.ports, &config, &game.volumes, &game.extra_docker_args)
                .await?;

            for (local, remote) in &opts.uploads {
                let staging = format!("/tmp/{}-upload-{}", self.config.tool_name, rand_hex(8));
                ssh.upload(local, &staging).await?;
                docker.cp_to(&container_name, &staging, remote).await?;
            }

            if let Some(catalog_code) = &game.catalog_code {
                Self::emit(on_status, "materializing config");
                let config_path = game
                    .data_paths
                    .get("config")
                    .cloned()
                    .unwrap_or_else(|| "/data/config-lgsm".to_string());
                let body = render_catalog_config(&config);
                let remote_path = format!("{config_path}/{catalog_code}/common.cfg");
                let staging = format!("/tmp/{}-config-{}", self.config.tool_name, rand_hex(8));
                ssh.upload_bytes(body.as_bytes(), &staging).await?;
                docker.cp_to(&container_name, &staging, &remote_path).await?;
            }

            docker.start(&container_name).await?;
        }

        record.status = ServerStatus::Running;
        record.container_name = effective_container_name;
        record.config = config.into_iter().collect();
        record.rcon_password = rcon_password;
        self.servers.save(record.clone()).await?;

        let metadata = serde_json::json!({
            "config": record.config,
            "rcon_password": record.rcon_password,
        });
        ssh.upload_bytes(
            serde_json::to_vec_pretty(&metadata)?.as_slice(),
            &format!("/tmp/{}-metadata.json", self.config.tool_name),
        )
        .await?;
        ssh.exec(&format!(
            "sudo mkdir -p /opt/{t}/ && sudo mv /tmp/{t}-metadata.json /opt/{t}/metadata.json"
        ))
        .await?;
        ssh.close().await.ok();

        if opts.pin_ip {
            Self::emit(on_status, "pinning elastic IP");
            self.pin_ip_inner(&mut record).await?;
        }

        if let Some(image_id) = temp_image_id {
            self.gateway.deregister_image(region, &image_id).await.ok();
        }

        Ok(record)
    }

    /// Launch cleanup contract: on any failure after the SSH session or a
    /// temporary restore image exist, close the session, deregister the
    /// image, and attempt to terminate the instance. The record is only
    /// deleted if termination actually succeeds.
    async fn cleanup_failed_launch(
        &self,
        id: &str,
        region: &str,
        cleanup: &Arc<std::sync::Mutex<LaunchCleanupState>>,
        on_status: Option<&StatusCallback>,
    ) {
        Self::emit(on_status, "launch failed, cleaning up");

        let (ssh, temp_image_id) = {
            let state = cleanup.lock().unwrap();
            (state.ssh.clone(), state.temp_image_id.clone())
        };
        if let Some(ssh) = ssh {
            ssh.close().await.ok();
        }
        if let Some(image_id) = temp_image_id {
            self.gateway.deregister_image(region, &image_id).await.ok();
        }

        let Some(record) = self.servers.get(id).await else {
            return;
        };
        if record.instance_id.is_empty() {
            return;
        }
        match self.gateway.terminate_instance(region, &record.instance_id).await {
            Ok(()) => {
                self.servers.delete(id).await.ok();
            }
            Err(e) => {
                tracing::warn!("failed to terminate instance during launch cleanup: {e}");
            }
        }
    }

    // ---------------------------------------------------------------
    // destroy / destroy_all
    // ---------------------------------------------------------------

    pub async fn destroy(&self, id: &str) -> Result<()> {
        let Some(record) = self.reconciler.refresh_record(id).await? else {
            return Ok(());
        };

        if !record.eip_allocation_id.is_empty() {
            if self.gateway.disassociate_eip(&record.region, &record.eip_allocation_id).await.is_ok() {
                self.gateway.release_eip(&record.region, &record.eip_allocation_id).await.ok();
            }
        }

        match self.gateway.terminate_instance(&record.region, &record.instance_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        self.servers.delete(id).await?;

        let remaining_in_region = self.servers.list_all().await.iter().any(|r| r.region == record.region);
        shared_key::remove_active_region(&self.params, &self.config.tool_name, &record.region, remaining_in_region)
            .await
            .ok();

        Ok(())
    }

    pub async fn destroy_all(&self) -> Result<()> {
        self.reconciler.reconcile().await.ok();
        let records = self.servers.list_all().await;
        let mut errors = Vec::new();
        for record in records {
            if let Err(e) = self.destroy(&record.id).await {
                errors.push(format!("{}: {e}", record.name));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GscpError::remote(format!("failed to destroy some servers: {}", errors.join("; "))))
        }
    }

    // ---------------------------------------------------------------
    // pause / resume / stop_container
    // ---------------------------------------------------------------

    pub async fn pause(&self, id: &str) -> Result<()> {
        let Some(record) = self.reconciler.refresh_record(id).await? else {
            return Err(GscpError::CloudNotFound(id.to_string()));
        };
        if record.status == ServerStatus::Paused {
            return Err(GscpError::config("server is already paused"));
        }

        if let Ok(ssh_config) = self.ssh_config().await {
            if let Ok(ssh) = SshClient::connect(&record.public_ip, 22, &ssh_config).await {
                let docker = RemoteDocker::new(&ssh);
                docker.stop(&record.container_name).await.ok();
                ssh.close().await.ok();
            }
        }

        match self.gateway.stop_instance(&record.region, &record.instance_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                self.servers.delete(id).await?;
                return Err(GscpError::CloudNotFound(id.to_string()));
            }
            Err(e) if e.is_conflict() => {}
            Err(e) => return Err(e.into()),
        }

        self.servers.update_status(id, ServerStatus::Paused).await?;

        let timeouts = GatewayTimeouts::default();
        self.gateway.wait_instance_stopped(&record.region, &record.instance_id, &timeouts).await.ok();
        Ok(())
    }

    pub async fn resume(&self, id: &str) -> Result<()> {
        let Some(mut record) = self.reconciler.refresh_record(id).await? else {
            return Err(GscpError::CloudNotFound(id.to_string()));
        };
        if !matches!(record.status, ServerStatus::Paused | ServerStatus::Stopped) {
            return Err(GscpError::config("server is not paused or stopped"));
        }

        if record.status == ServerStatus::Paused {
            match self.gateway.start_instance(&record.region, &record.instance_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    self.servers.delete(id).await?;
                    return Err(GscpError::CloudNotFound(id.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
            let timeouts = GatewayTimeouts::default();
            self.gateway.wait_instance_running(&record.region, &record.instance_id, &timeouts).await?;

            if !record.eip_allocation_id.is_empty() {
                self.gateway.associate_eip(&record.region, &record.eip_allocation_id, &record.instance_id).await?;
                record.public_ip = record.eip_public_ip.clone();
            } else if let Some(ip) = self.gateway.get_instance_public_ip(&record.region, &record.instance_id).await? {
                record.public_ip = ip;
            }
        }

        record.status = ServerStatus::Running;
        self.servers.save(record.clone()).await?;

        let ssh_config = self.ssh_config().await?;
        let ssh = SshClient::connect(&record.public_ip, 22, &ssh_config).await?;
        let docker = RemoteDocker::new(&ssh);
        let container = docker.resolve_container(&self.config.tool_name, &record.container_name).await?;
        if container != record.container_name {
            record.container_name = container.clone();
            self.gateway
                .set_instance_tag(&record.region, &record.instance_id, &tags::tag_key(&self.config.tool_name, tags::TAG_CONTAINER_NAME), &container)
                .await
                .ok();
            self.servers.update_field(id, "container_name", &container).await?;
        }

        docker.start(&container).await.map_err(|e| {
            GscpError::remote(format!(
                "container failed to restart: {e}. Retry with `gscp resume {id}` or inspect with `gscp ssh {id}`."
            ))
        })?;
        self.gateway
            .delete_instance_tag(&record.region, &record.instance_id, &tags::tag_key(&self.config.tool_name, tags::TAG_CONTAINER_STOPPED))
            .await
            .ok();
        ssh.close().await.ok();
        Ok(())
    }

    pub async fn stop_container(&self, id: &str) -> Result<()> {
        let Some(record) = self.reconciler.refresh_record(id).await? else {
            return Err(GscpError::CloudNotFound(id.to_string()));
        };
        if record.status != ServerStatus::Running {
            return Err(GscpError::config("server is not running"));
        }

        let ssh_config = self.ssh_config().await?;
        let ssh = SshClient::connect(&record.public_ip, 22, &ssh_config).await?;
        let docker = RemoteDocker::new(&ssh);
        docker.stop(&record.container_name).await?;
        ssh.close().await.ok();

        self.servers.update_status(id, ServerStatus::Stopped).await?;
        self.gateway
            .set_instance_tag(&record.region, &record.instance_id, &tags::tag_key(&self.config.tool_name, tags::TAG_CONTAINER_STOPPED), "true")
            .await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // elastic IPs
    // ---------------------------------------------------------------

    async fn pin_ip_inner(&self, record: &mut ServerRecord) -> Result<()> {
        let eip = self.gateway.allocate_eip(&record.region, &self.config.tool_name, &record.id).await?;
        match self.gateway.associate_eip(&record.region, &eip.allocation_id, &record.instance_id).await {
            Ok(()) => {}
            Err(e) => {
                self.gateway.release_eip(&record.region, &eip.allocation_id).await.ok();
                return Err(e.into());
            }
        }
        record.eip_allocation_id = eip.allocation_id.clone();
        record.eip_public_ip = eip.public_ip.clone();
        record.public_ip = eip.public_ip;
        self.servers.save(record.clone()).await?;
        self.gateway
            .set_instance_tag(&record.region, &record.instance_id, &tags::tag_key(&self.config.tool_name, tags::TAG_EIP_ALLOC_ID), &record.eip_allocation_id)
            .await?;
        Ok(())
    }

    pub async fn pin_ip(&self, id: &str) -> Result<()> {
        let Some(mut record) = self.reconciler.refresh_record(id).await? else {
            return Err(GscpError::CloudNotFound(id.to_string()));
        };
        if !record.eip_allocation_id.is_empty() {
            return Err(GscpError::config("server already has a pinned elastic IP"));
        }
        self.pin_ip_inner(&mut record).await
    }

    pub async fn unpin_ip(&self, id: &str) -> Result<()> {
        let Some(mut record) = self.reconciler.refresh_record(id).await? else {
            return Err(GscpError::CloudNotFound(id.to_string()));
        };
        if record.eip_allocation_id.is_empty() {
            return Err(GscpError::config("server has no pinned elastic IP"));
        }

        self.gateway.disassociate_eip(&record.region, &record.eip_allocation_id).await.ok();
        self.gateway.release_eip(&record.region, &record.eip_allocation_id).await?;

        record.eip_allocation_id.clear();
        record.eip_public_ip.clear();
        self.gateway
            .delete_instance_tag(&record.region, &record.instance_id, &tags::tag_key(&self.config.tool_name, tags::TAG_EIP_ALLOC_ID))
            .await
            .ok();

        if matches!(record.status, ServerStatus::Running | ServerStatus::Stopped) {
            if let Some(ip) = self.gateway.get_instance_public_ip(&record.region, &record.instance_id).await? {
                record.public_ip = ip;
            }
        }
        self.servers.save(record).await
    }

    pub async fn list_eips(&self, region: Option<&str>) -> Result<Vec<ElasticIp>> {
        let region = self.region_of(region);
        let tag = tags::tag_key(&self.config.tool_name, tags::TAG_ID);
        Ok(self.gateway.find_tagged_eips(&region, &tag).await?)
    }

    // ---------------------------------------------------------------
    // snapshots
    // ---------------------------------------------------------------

    pub async fn snapshot(&self, id: &str) -> Result<SnapshotRecord> {
        let Some(record) = self.reconciler.refresh_record(id).await? else {
            return Err(GscpError::CloudNotFound(id.to_string()));
        };

        let volume_id = self.gateway.get_instance_root_volume_id(&record.region, &record.instance_id).await?;
        let snapshot_id_short = rand_hex(12);
        let t = &self.config.tool_name;
        let cloud_tags = HashMap::from([
            (tags::tag_key(t, tags::TAG_ID), record.id.clone()),
            (tags::tag_key(t, tags::TAG_GAME), record.game.clone()),
            (tags::tag_key(t, tags::TAG_NAME), record.name.clone()),
            (tags::tag_key(t, tags::TAG_SNAPSHOT_ID), snapshot_id_short.clone()),
        ]);

        let description = format!("{t} snapshot of {}", record.name);
        let snapshot_id = self.gateway.create_snapshot(&record.region, &volume_id, &description, &cloud_tags).await?;
        let timeouts = GatewayTimeouts::default();
        self.gateway.wait_snapshot_completed(&record.region, &snapshot_id, &timeouts).await?;

        let snapshot_record = SnapshotRecord {
            id: snapshot_id_short,
            snapshot_id,
            game: record.game.clone(),
            server_name: record.name.clone(),
            server_id: record.id.clone(),
            region: record.region.clone(),
            status: "completed".to_string(),
            created_at: chrono::Utc::now(),
            config: record.config.clone(),
            rcon_password: record.rcon_password.clone(),
        };
        self.snapshots.save(snapshot_record.clone()).await?;
        Ok(snapshot_record)
    }

    pub async fn delete_snapshot(&self, id: &str) -> Result<()> {
        let record = self
            .snapshots
            .get(id)
            .await
            .ok_or_else(|| GscpError::CloudNotFound(format!("snapshot '{id}' not found")))?;

        for image_id in self.gateway.find_images_using_snapshot(&record.region, &record.snapshot_id).await? {
            self.gateway.deregister_image(&record.region, &image_id).await.ok();
        }
        match self.gateway.delete_snapshot(&record.region, &record.snapshot_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        self.snapshots.delete(id).await
    }
}

/// In-flight state a failed launch needs to clean up: an open SSH session
/// and/or a temporary AMI registered from a snapshot for a restore.
#[derive(Default)]
struct LaunchCleanupState {
    temp_image_id: Option<String>,
    ssh: Option<SshClient>,
}

/// Render a catalog-family config as `key="value"` lines, one per entry.
fn render_catalog_config(config: &HashMap<String, String>) -> String {
    let mut keys: Vec<_> = config.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| format!("{k}=\"{}\"\n", config[k]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand_hex_has_requested_length() {
        assert_eq!(rand_hex(12).len(), 12);
        assert_eq!(rand_hex(8).len(), 8);
    }

    #[test]
    fn rand_hex_is_lowercase_hex() {
        let s = rand_hex(16);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn generate_secret_is_reasonably_long() {
        assert!(generate_secret().len() >= 16);
    }

    #[test]
    fn render_catalog_config_sorts_keys() {
        let mut config = HashMap::new();
        config.insert("b".to_string(), "2".to_string());
        config.insert("a".to_string(), "1".to_string());
        assert_eq!(render_catalog_config(&config), "a=\"1\"\nb=\"2\"\n");
    }
}
