//! Shared-key manager and active-regions set (§4.6): both live in the
//! cluster parameter store and let independent control-plane hosts
//! converge on one SSH key and one set of regions to reconcile.

use std::path::Path;

use crate::error::Result;
use crate::provider::ssm::ParameterStore;
use crate::provider::{CloudGateway, GatewayError};
use crate::ssh::keys::{fingerprint_md5, generate_rsa_keypair, load_key_pair, public_key_der, write_key_pair};

fn key_parameter(tool_name: &str) -> String {
    format!("{tool_name}/ssh-private-key")
}

fn regions_parameter(tool_name: &str) -> String {
    format!("{tool_name}/active-regions")
}

/// Run the bootstrap protocol from §4.6 step 1-3, returning the local path
/// of the converged private key.
pub async fn ensure_shared_key(
    params: &ParameterStore,
    tool_name: &str,
    local_key_path: &Path,
) -> Result<()> {
    let param_key = key_parameter(tool_name);

    // 1. Prefer whatever is already in the parameter store.
    if let Some(pem) = params.get_secure(&param_key).await.map_err(adopt_gateway_err)? {
        write_pem(local_key_path, &pem)?;
        return Ok(());
    }

    // 2/3. No shared key yet: use (or generate) a local one, then race to
    // become the first writer.
    let key = if local_key_path.exists() {
        load_key_pair(local_key_path)?
    } else {
        generate_rsa_keypair()?
    };
    write_key_pair(local_key_path, &key)?;

    let pem = std::fs::read_to_string(local_key_path)?;
    match params.put_secure(&param_key, &pem, false).await {
        Ok(()) => Ok(()),
        Err(GatewayError::Conflict(_)) => {
            // A peer raced us — adopt whatever they wrote.
            if let Some(peer_pem) = params.get_secure(&param_key).await.map_err(adopt_gateway_err)? {
                write_pem(local_key_path, &peer_pem)?;
            }
            Ok(())
        }
        Err(e) => Err(adopt_gateway_err(e)),
    }
}

fn write_pem(path: &Path, pem: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, pem)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn adopt_gateway_err(e: GatewayError) -> crate::error::GscpError {
    crate::error::GscpError::CloudTransient(e)
}

/// Ensure the cloud key-pair object in `region` matches the local managed
/// key by fingerprint, re-importing on mismatch (§4.6).
pub async fn converge_cloud_key_pair(
    gateway: &dyn CloudGateway,
    region: &str,
    key_pair_name: &str,
    local_key_path: &Path,
) -> Result<()> {
    let key = load_key_pair(local_key_path)?;
    let local_fingerprint = fingerprint_md5(&key)?;

    let cloud_fingerprint = gateway
        .key_pair_fingerprint(region, key_pair_name)
        .await
        .map_err(adopt_gateway_err)?;

    if cloud_fingerprint.as_deref() == Some(local_fingerprint.as_str()) {
        return Ok(());
    }

    if cloud_fingerprint.is_some() {
        gateway
            .delete_key_pair(region, key_pair_name)
            .await
            .map_err(adopt_gateway_err)?;
    }

    let der = public_key_der(&key)?;
    gateway
        .import_key_pair(region, key_pair_name, &der)
        .await
        .map_err(adopt_gateway_err)?;
    Ok(())
}

/// Add `region` to the shared active-regions set. Idempotent.
pub async fn add_active_region(params: &ParameterStore, tool_name: &str, region: &str) -> Result<()> {
    let key = regions_parameter(tool_name);
    let mut regions = read_regions(params, &key).await?;
    if regions.iter().any(|r| r == region) {
        return Ok(());
    }
    regions.push(region.to_string());
    params
        .put_string(&key, &regions.join(","), true)
        .await
        .map_err(adopt_gateway_err)
}

/// Remove `region` from the shared active-regions set, unless
/// `still_in_use` reports the region still has local records — removal is
/// a no-op in that case (§4.6).
pub async fn remove_active_region(
    params: &ParameterStore,
    tool_name: &str,
    region: &str,
    still_in_use: bool,
) -> Result<()> {
    if still_in_use {
        return Ok(());
    }
    let key = regions_parameter(tool_name);
    let mut regions = read_regions(params, &key).await?;
    regions.retain(|r| r != region);
    if regions.is_empty() {
        params.delete(&key).await.map_err(adopt_gateway_err)
    } else {
        params.put_string(&key, &regions.join(","), true).await.map_err(adopt_gateway_err)
    }
}

/// Read the shared active-regions set.
pub async fn active_regions(params: &ParameterStore, tool_name: &str) -> Result<Vec<String>> {
    read_regions(params, &regions_parameter(tool_name)).await
}

async fn read_regions(params: &ParameterStore, key: &str) -> Result<Vec<String>> {
    match params.get_string(key).await.map_err(adopt_gateway_err)? {
        Some(value) => Ok(value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_parameter_is_namespaced_by_tool_name() {
        assert_eq!(key_parameter("gscp"), "gscp/ssh-private-key");
    }

    #[test]
    fn regions_parameter_is_namespaced_by_tool_name() {
        assert_eq!(regions_parameter("gscp"), "gscp/active-regions");
    }
}
