//! EC2-backed `CloudGateway` implementation.
//!
//! One `Ec2Gateway` holds a cache of per-region `aws_sdk_ec2::Client`s built
//! from a shared `aws_config::SdkConfig`; every trait method resolves (or
//! creates) the client for the region the call names.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_ec2::types::{
    BlockDeviceMapping, EbsBlockDevice, Filter, IpPermission, IpRange, ResourceType,
    ShutdownBehavior, Tag, TagSpecification,
};
use aws_sdk_ec2::Client;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::RwLock;

use crate::provider::error::{GatewayError, GatewayResult};
use crate::provider::{
    CloudGateway, CloudSnapshot, ElasticIp, GatewayTimeouts, ImageSpec, Instance,
    InstanceLifecycle, RunInstanceRequest, SecurityGroupSpec,
};
use crate::tags::Protocol;

pub struct Ec2Gateway {
    sdk_config: aws_config::SdkConfig,
    clients: RwLock<HashMap<String, Arc<Client>>>,
}

impl Ec2Gateway {
    pub fn new(sdk_config: aws_config::SdkConfig) -> Self {
        Self {
            sdk_config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    async fn client(&self, region: &str) -> Arc<Client> {
        if let Some(c) = self.clients.read().await.get(region) {
            return c.clone();
        }
        let mut guard = self.clients.write().await;
        if let Some(c) = guard.get(region) {
            return c.clone();
        }
        let region_config = self
            .sdk_config
            .to_builder()
            .region(aws_config::Region::new(region.to_string()))
            .build();
        let client = Arc::new(Client::new(&region_config));
        guard.insert(region.to_string(), client.clone());
        client
    }

    fn map_err(operation: &str, e: impl std::fmt::Display) -> GatewayError {
        let msg = e.to_string();
        if msg.contains("NotFound") || msg.contains("InvalidInstanceID") || msg.contains("InvalidParameterValue")
        {
            GatewayError::not_found(operation, msg)
        } else if msg.contains("IncorrectState") || msg.contains("already") {
            GatewayError::conflict(msg)
        } else {
            GatewayError::Api(format!("{operation}: {msg}"))
        }
    }

    fn tag_specs(resource_type: ResourceType, tags: &HashMap<String, String>) -> Vec<TagSpecification> {
        let tag_list: Vec<Tag> = tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect();
        vec![TagSpecification::builder()
            .resource_type(resource_type)
            .set_tags(Some(tag_list))
            .build()]
    }

    fn tags_from_aws(tags: Option<&[Tag]>) -> HashMap<String, String> {
        tags.unwrap_or_default()
            .iter()
            .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
            .collect()
    }
}

#[async_trait]
impl CloudGateway for Ec2Gateway {
    async fn get_latest_base_image(&self, region: &str) -> GatewayResult<String> {
        let client = self.client(region).await;
        let resp = client
            .describe_images()
            .owners("amazon")
            .filters(Filter::builder().name("name").values("al2023-ami-*-x86_64").build())
            .filters(Filter::builder().name("architecture").values("x86_64").build())
            .filters(Filter::builder().name("virtualization-type").values("hvm").build())
            .filters(Filter::builder().name("state").values("available").build())
            .send()
            .await
            .map_err(|e| Self::map_err("get_latest_base_image", e))?;

        let mut images = resp.images.unwrap_or_default();
        images.sort_by(|a, b| a.creation_date().cmp(&b.creation_date()));
        images
            .pop()
            .and_then(|i| i.image_id().map(str::to_string))
            .ok_or_else(|| GatewayError::not_found("image", "no al2023 base image available"))
    }

    async fn register_image_from_snapshot(
        &self,
        region: &str,
        snapshot_id: &str,
        name: &str,
    ) -> GatewayResult<String> {
        let client = self.client(region).await;
        let resp = client
            .register_image()
            .name(name)
            .architecture(aws_sdk_ec2::types::ArchitectureValues::X8664)
            .root_device_name("/dev/xvda")
            .virtualization_type("hvm")
            .block_device_mappings(
                BlockDeviceMapping::builder()
                    .device_name("/dev/xvda")
                    .ebs(EbsBlockDevice::builder().snapshot_id(snapshot_id).build())
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Self::map_err("register_image_from_snapshot", e))?;

        resp.image_id
            .ok_or_else(|| GatewayError::Api("register_image returned no image id".into()))
    }

    async fn deregister_image(&self, region: &str, image_id: &str) -> GatewayResult<()> {
        let client = self.client(region).await;
        client
            .deregister_image()
            .image_id(image_id)
            .send()
            .await
            .map_err(|e| Self::map_err("deregister_image", e))?;
        Ok(())
    }

    async fn find_images_using_snapshot(
        &self,
        region: &str,
        snapshot_id: &str,
    ) -> GatewayResult<Vec<String>> {
        let client = self.client(region).await;
        let resp = client
            .describe_images()
            .owners("self")
            .filters(
                Filter::builder()
                    .name("block-device-mapping.snapshot-id")
                    .values(snapshot_id)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Self::map_err("find_images_using_snapshot", e))?;

        Ok(resp
            .images
            .unwrap_or_default()
            .into_iter()
            .filter_map(|i| i.image_id)
            .collect())
    }

    async fn find_tool_images(&self, region: &str, tool_name: &str) -> GatewayResult<Vec<String>> {
        let client = self.client(region).await;
        let tag_key = crate::tags::tag_key(tool_name, crate::tags::TAG_ID);
        let resp = client
            .describe_images()
            .owners("self")
            .filters(Filter::builder().name(format!("tag-key")).values(&tag_key).build())
            .send()
            .await
            .map_err(|e| Self::map_err("find_tool_images", e))?;

        Ok(resp
            .images
            .unwrap_or_default()
            .into_iter()
            .filter_map(|i| i.image_id)
            .collect())
    }

    async fn default_vpc_subnet(&self, region: &str) -> GatewayResult<(String, String)> {
        let client = self.client(region).await;
        let vpcs = client
            .describe_vpcs()
            .filters(Filter::builder().name("is-default").values("true").build())
            .send()
            .await
            .map_err(|e| Self::map_err("default_vpc_subnet", e))?;

        let vpc_id = vpcs
            .vpcs
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|v| v.vpc_id)
            .ok_or_else(|| GatewayError::not_found("vpc", "no default VPC"))?;

        let subnets = client
            .describe_subnets()
            .filters(Filter::builder().name("vpc-id").values(&vpc_id).build())
            .send()
            .await
            .map_err(|e| Self::map_err("default_vpc_subnet", e))?;

        let subnet_id = subnets
            .subnets
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|s| s.subnet_id)
            .ok_or_else(|| GatewayError::not_found("subnet", "no subnet in default VPC"))?;

        Ok((vpc_id, subnet_id))
    }

    async fn get_or_create_security_group(&self, spec: &SecurityGroupSpec) -> GatewayResult<String> {
        let client = self.client(&spec.region).await;

        let existing = client
            .describe_security_groups()
            .filters(Filter::builder().name("group-name").values(&spec.name).build())
            .filters(Filter::builder().name("vpc-id").values(&spec.vpc_id).build())
            .send()
            .await
            .map_err(|e| Self::map_err("get_or_create_security_group", e))?;

        if let Some(group) = existing.security_groups.unwrap_or_default().into_iter().next() {
            if let Some(id) = group.group_id {
                return Ok(id);
            }
        }

        let created = client
            .create_security_group()
            .group_name(&spec.name)
            .description(&spec.description)
            .vpc_id(&spec.vpc_id)
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::SecurityGroup)
                    .set_tags(Some(
                        spec.tags
                            .iter()
                            .map(|(k, v)| Tag::builder().key(k).value(v).build())
                            .collect(),
                    ))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Self::map_err("get_or_create_security_group", e))?;

        let group_id = created
            .group_id
            .ok_or_else(|| GatewayError::Api("create_security_group returned no id".into()))?;

        let mut permissions = Vec::new();
        for rule in &spec.ingress {
            let proto = match rule.protocol {
                Protocol::Tcp => "tcp",
                Protocol::Udp => "udp",
            };
            permissions.push(
                IpPermission::builder()
                    .ip_protocol(proto)
                    .from_port(rule.from_port as i32)
                    .to_port(rule.to_port as i32)
                    .ip_ranges(IpRange::builder().cidr_ip(&rule.cidr).build())
                    .build(),
            );
        }
        if !permissions.is_empty() {
            client
                .authorize_security_group_ingress()
                .group_id(&group_id)
                .set_ip_permissions(Some(permissions))
                .send()
                .await
                .map_err(|e| Self::map_err("get_or_create_security_group", e))?;
        }

        Ok(group_id)
    }

    async fn run_instance(&self, req: &RunInstanceRequest) -> GatewayResult<String> {
        let client = self.client(&req.region).await;
        let image_id = match &req.image {
            ImageSpec::Id(id) => id.clone(),
            ImageSpec::LatestBase => self.get_latest_base_image(&req.region).await?,
        };

        let user_data_b64 = BASE64.encode(req.user_data.as_bytes());

        let resp = client
            .run_instances()
            .image_id(image_id)
            .instance_type(req.instance_type.as_str().into())
            .key_name(&req.key_pair_name)
            .security_group_ids(&req.security_group_id)
            .subnet_id(&req.subnet_id)
            .user_data(user_data_b64)
            .min_count(1)
            .max_count(1)
            .instance_initiated_shutdown_behavior(ShutdownBehavior::Stop)
            .block_device_mappings(
                BlockDeviceMapping::builder()
                    .device_name("/dev/xvda")
                    .ebs(
                        EbsBlockDevice::builder()
                            .volume_size(req.disk_gb as i32)
                            .delete_on_termination(true)
                            .build(),
                    )
                    .build(),
            )
            .tag_specifications(Self::tag_specs(ResourceType::Instance, &req.tags).remove(0))
            .send()
            .await
            .map_err(|e| Self::map_err("run_instance", e))?;

        resp.instances
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|i| i.instance_id)
            .ok_or_else(|| GatewayError::Api("run_instances returned no instance".into()))
    }

    async fn find_tagged_instances(
        &self,
        region: &str,
        tag_key: &str,
    ) -> GatewayResult<Vec<Instance>> {
        let client = self.client(region).await;
        let resp = client
            .describe_instances()
            .filters(Filter::builder().name(format!("tag-key")).values(tag_key).build())
            .send()
            .await
            .map_err(|e| Self::map_err("find_tagged_instances", e))?;

        let mut out = Vec::new();
        for reservation in resp.reservations.unwrap_or_default() {
            for i in reservation.instances.unwrap_or_default() {
                if let Some(instance) = instance_from_aws(region, &i) {
                    out.push(instance);
                }
            }
        }
        Ok(out)
    }

    async fn get_instance(&self, region: &str, instance_id: &str) -> GatewayResult<Option<Instance>> {
        let client = self.client(region).await;
        let resp = client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) if e.to_string().contains("InvalidInstanceID.NotFound") => return Ok(None),
            Err(e) => return Err(Self::map_err("get_instance", e)),
        };

        for reservation in resp.reservations.unwrap_or_default() {
            for i in reservation.instances.unwrap_or_default() {
                if let Some(instance) = instance_from_aws(region, &i) {
                    return Ok(Some(instance));
                }
            }
        }
        Ok(None)
    }

    async fn terminate_instance(&self, region: &str, instance_id: &str) -> GatewayResult<()> {
        let client = self.client(region).await;
        match client.terminate_instances().instance_ids(instance_id).send().await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("InvalidInstanceID.NotFound") => Ok(()),
            Err(e) => Err(Self::map_err("terminate_instance", e)),
        }
    }

    async fn stop_instance(&self, region: &str, instance_id: &str) -> GatewayResult<()> {
        let client = self.client(region).await;
        client
            .stop_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| Self::map_err("stop_instance", e))?;
        Ok(())
    }

    async fn start_instance(&self, region: &str, instance_id: &str) -> GatewayResult<()> {
        let client = self.client(region).await;
        client
            .start_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| Self::map_err("start_instance", e))?;
        Ok(())
    }

    async fn wait_instance_running(
        &self,
        region: &str,
        instance_id: &str,
        timeouts: &GatewayTimeouts,
    ) -> GatewayResult<()> {
        self.wait_for_lifecycle(region, instance_id, InstanceLifecycle::Running, timeouts.instance_ready, timeouts)
            .await
    }

    async fn wait_instance_stopped(
        &self,
        region: &str,
        instance_id: &str,
        timeouts: &GatewayTimeouts,
    ) -> GatewayResult<()> {
        self.wait_for_lifecycle(region, instance_id, InstanceLifecycle::Stopped, timeouts.instance_stopped, timeouts)
            .await
    }

    async fn get_instance_public_ip(
        &self,
        region: &str,
        instance_id: &str,
    ) -> GatewayResult<Option<String>> {
        Ok(self
            .get_instance(region, instance_id)
            .await?
            .and_then(|i| i.public_ip))
    }

    async fn get_instance_root_volume_id(
        &self,
        region: &str,
        instance_id: &str,
    ) -> GatewayResult<String> {
        let client = self.client(region).await;
        let resp = client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| Self::map_err("get_instance_root_volume_id", e))?;

        for reservation in resp.reservations.unwrap_or_default() {
            for i in reservation.instances.unwrap_or_default() {
                let root_device = i.root_device_name().unwrap_or("/dev/xvda").to_string();
                for mapping in i.block_device_mappings.unwrap_or_default() {
                    if mapping.device_name() == Some(root_device.as_str()) {
                        if let Some(ebs) = mapping.ebs() {
                            if let Some(vol) = ebs.volume_id() {
                                return Ok(vol.to_string());
                            }
                        }
                    }
                }
            }
        }
        Err(GatewayError::not_found("root volume", instance_id))
    }

    async fn set_instance_tag(
        &self,
        region: &str,
        instance_id: &str,
        key: &str,
        value: &str,
    ) -> GatewayResult<()> {
        let client = self.client(region).await;
        client
            .create_tags()
            .resources(instance_id)
            .tags(Tag::builder().key(key).value(value).build())
            .send()
            .await
            .map_err(|e| Self::map_err("set_instance_tag", e))?;
        Ok(())
    }

    async fn delete_instance_tag(&self, region: &str, instance_id: &str, key: &str) -> GatewayResult<()> {
        let client = self.client(region).await;
        client
            .delete_tags()
            .resources(instance_id)
            .tags(Tag::builder().key(key).build())
            .send()
            .await
            .map_err(|e| Self::map_err("delete_instance_tag", e))?;
        Ok(())
    }

    async fn allocate_eip(&self, region: &str, tool_name: &str, server_id: &str) -> GatewayResult<ElasticIp> {
        let client = self.client(region).await;
        let tag_key = crate::tags::tag_key(tool_name, crate::tags::TAG_ID);
        let tool_tag = Tag::builder().key(&tag_key).value(server_id).build();
        let resp = client
            .allocate_address()
            .domain(aws_sdk_ec2::types::DomainType::Vpc)
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::ElasticIp)
                    .tags(tool_tag)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Self::map_err("allocate_eip", e))?;

        Ok(ElasticIp {
            allocation_id: resp.allocation_id.unwrap_or_default(),
            public_ip: resp.public_ip.unwrap_or_default(),
            association_id: None,
            tags: HashMap::from([(tag_key, server_id.to_string())]),
        })
    }

    async fn associate_eip(
        &self,
        region: &str,
        allocation_id: &str,
        instance_id: &str,
    ) -> GatewayResult<()> {
        let client = self.client(region).await;
        client
            .associate_address()
            .allocation_id(allocation_id)
            .instance_id(instance_id)
            .send()
            .await
            .map_err(|e| Self::map_err("associate_eip", e))?;
        Ok(())
    }

    async fn disassociate_eip(&self, region: &str, allocation_id: &str) -> GatewayResult<()> {
        let client = self.client(region).await;
        let addresses = client
            .describe_addresses()
            .allocation_ids(allocation_id)
            .send()
            .await
            .map_err(|e| Self::map_err("disassociate_eip", e))?;

        let association_id = addresses
            .addresses
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|a| a.association_id);

        // Idempotent: already unassociated is a no-op, not an error (§4.4).
        let Some(association_id) = association_id else {
            return Ok(());
        };

        client
            .disassociate_address()
            .association_id(&association_id)
            .send()
            .await
            .map_err(|e| Self::map_err("disassociate_eip", e))?;
        Ok(())
    }

    async fn release_eip(&self, region: &str, allocation_id: &str) -> GatewayResult<()> {
        let client = self.client(region).await;
        client
            .release_address()
            .allocation_id(allocation_id)
            .send()
            .await
            .map_err(|e| Self::map_err("release_eip", e))?;
        Ok(())
    }

    async fn find_tagged_eips(&self, region: &str, tag_key: &str) -> GatewayResult<Vec<ElasticIp>> {
        let client = self.client(region).await;
        let resp = client
            .describe_addresses()
            .filters(Filter::builder().name(format!("tag-key")).values(tag_key).build())
            .send()
            .await
            .map_err(|e| Self::map_err("find_tagged_eips", e))?;

        Ok(resp
            .addresses
            .unwrap_or_default()
            .into_iter()
            .map(|a| ElasticIp {
                allocation_id: a.allocation_id.unwrap_or_default(),
                public_ip: a.public_ip.unwrap_or_default(),
                association_id: a.association_id,
                tags: Self::tags_from_aws(a.tags.as_deref()),
            })
            .collect())
    }

    async fn create_snapshot(
        &self,
        region: &str,
        volume_id: &str,
        description: &str,
        tags: &HashMap<String, String>,
    ) -> GatewayResult<String> {
        let client = self.client(region).await;
        let resp = client
            .create_snapshot()
            .volume_id(volume_id)
            .description(description)
            .tag_specifications(Self::tag_specs(ResourceType::Snapshot, tags).remove(0))
            .send()
            .await
            .map_err(|e| Self::map_err("create_snapshot", e))?;

        resp.snapshot_id
            .ok_or_else(|| GatewayError::Api("create_snapshot returned no id".into()))
    }

    async fn wait_snapshot_completed(
        &self,
        region: &str,
        snapshot_id: &str,
        timeouts: &GatewayTimeouts,
    ) -> GatewayResult<()> {
        let client = self.client(region).await;
        let attempts = timeouts.max_attempts(timeouts.snapshot_complete);
        for _ in 0..attempts {
            let resp = client
                .describe_snapshots()
                .snapshot_ids(snapshot_id)
                .send()
                .await
                .map_err(|e| Self::map_err("wait_snapshot_completed", e))?;

            if let Some(snap) = resp.snapshots.unwrap_or_default().into_iter().next() {
                if snap.state().map(|s| s.as_str()) == Some("completed") {
                    return Ok(());
                }
            }
            tokio::time::sleep(timeouts.poll_interval).await;
        }
        Err(GatewayError::timeout("wait_snapshot_completed", timeouts.snapshot_complete))
    }

    async fn delete_snapshot(&self, region: &str, snapshot_id: &str) -> GatewayResult<()> {
        let client = self.client(region).await;
        client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .map_err(|e| Self::map_err("delete_snapshot", e))?;
        Ok(())
    }

    async fn find_tagged_snapshots(
        &self,
        region: &str,
        tag_key: &str,
    ) -> GatewayResult<Vec<CloudSnapshot>> {
        let client = self.client(region).await;
        let resp = client
            .describe_snapshots()
            .owner_ids("self")
            .filters(Filter::builder().name(format!("tag-key")).values(tag_key).build())
            .send()
            .await
            .map_err(|e| Self::map_err("find_tagged_snapshots", e))?;

        Ok(resp
            .snapshots
            .unwrap_or_default()
            .into_iter()
            .map(|s| CloudSnapshot {
                snapshot_id: s.snapshot_id.unwrap_or_default(),
                region: region.to_string(),
                state: s.state().map(|st| st.as_str().to_string()).unwrap_or_default(),
                tags: Self::tags_from_aws(s.tags.as_deref()),
            })
            .collect())
    }

    async fn import_key_pair(
        &self,
        region: &str,
        name: &str,
        public_key_der: &[u8],
    ) -> GatewayResult<()> {
        let client = self.client(region).await;
        client
            .import_key_pair()
            .key_name(name)
            .public_key_material(public_key_der.to_vec().into())
            .send()
            .await
            .map_err(|e| Self::map_err("import_key_pair", e))?;
        Ok(())
    }

    async fn key_pair_fingerprint(&self, region: &str, name: &str) -> GatewayResult<Option<String>> {
        let client = self.client(region).await;
        let resp = client.describe_key_pairs().key_names(name).send().await;
        let resp = match resp {
            Ok(r) => r,
            Err(e) if e.to_string().contains("InvalidKeyPair.NotFound") => return Ok(None),
            Err(e) => return Err(Self::map_err("key_pair_fingerprint", e)),
        };
        Ok(resp
            .key_pairs
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|k| k.key_fingerprint))
    }

    async fn delete_key_pair(&self, region: &str, name: &str) -> GatewayResult<()> {
        let client = self.client(region).await;
        client
            .delete_key_pair()
            .key_name(name)
            .send()
            .await
            .map_err(|e| Self::map_err("delete_key_pair", e))?;
        Ok(())
    }
}

impl Ec2Gateway {
    async fn wait_for_lifecycle(
        &self,
        region: &str,
        instance_id: &str,
        target: InstanceLifecycle,
        budget: std::time::Duration,
        timeouts: &GatewayTimeouts,
    ) -> GatewayResult<()> {
        let attempts = timeouts.max_attempts(budget);
        for _ in 0..attempts {
            if let Some(instance) = self.get_instance(region, instance_id).await? {
                if instance.lifecycle == target {
                    return Ok(());
                }
                if instance.lifecycle == InstanceLifecycle::Terminated
                    && target != InstanceLifecycle::Terminated
                {
                    return Err(GatewayError::not_found("instance", instance_id));
                }
            } else {
                return Err(GatewayError::not_found("instance", instance_id));
            }
            tokio::time::sleep(timeouts.poll_interval).await;
        }
        Err(GatewayError::timeout(format!("wait for {target:?}"), budget))
    }
}

fn instance_from_aws(region: &str, i: &aws_sdk_ec2::types::Instance) -> Option<Instance> {
    let instance_id = i.instance_id()?.to_string();
    let lifecycle = match i.state().and_then(|s| s.name()).map(|n| n.as_str()) {
        Some("pending") => InstanceLifecycle::Pending,
        Some("running") => InstanceLifecycle::Running,
        Some("stopping") => InstanceLifecycle::Stopping,
        Some("stopped") => InstanceLifecycle::Stopped,
        Some("shutting-down") => InstanceLifecycle::ShuttingDown,
        _ => InstanceLifecycle::Terminated,
    };
    let public_ip = i.public_ip_address().map(str::to_string);
    let tags = Ec2Gateway::tags_from_aws(i.tags.as_deref());
    let launch_time = i
        .launch_time()
        .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), 0))
        .unwrap_or_else(chrono::Utc::now);

    Some(Instance {
        instance_id,
        region: region.to_string(),
        lifecycle,
        public_ip,
        tags,
        launch_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_err_classifies_not_found() {
        let err = Ec2Gateway::map_err("test", "InvalidInstanceID.NotFound: i-123");
        assert!(err.is_not_found());
    }

    #[test]
    fn map_err_classifies_conflict() {
        let err = Ec2Gateway::map_err("test", "IncorrectInstanceState: instance is running");
        assert!(err.is_conflict());
    }

    #[test]
    fn map_err_defaults_to_api_error() {
        let err = Ec2Gateway::map_err("test", "InternalError: something broke");
        assert!(matches!(err, GatewayError::Api(_)));
    }
}
