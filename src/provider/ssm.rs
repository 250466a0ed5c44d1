//! Parameter-store wrapper (§4.6): the cluster-shared key/value service
//! backing the SSH key convergence protocol and the active-regions set.

use aws_sdk_ssm::error::SdkError;
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use aws_sdk_ssm::operation::put_parameter::PutParameterError;
use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client;

use crate::provider::error::{GatewayError, GatewayResult};

/// Thin wrapper over the parameter-store client for a single region. The
/// shared-key manager and active-regions set each hold one of these.
pub struct ParameterStore {
    client: Client,
}

impl ParameterStore {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Read a plain `String` parameter. `None` means the parameter does not
    /// exist — never an error, matching the "ParameterNotFound is not an
    /// error" contract from §4.6.
    pub async fn get_string(&self, key: &str) -> GatewayResult<Option<String>> {
        self.get(key, false).await
    }

    /// Read a `SecureString` parameter with decryption.
    pub async fn get_secure(&self, key: &str) -> GatewayResult<Option<String>> {
        self.get(key, true).await
    }

    async fn get(&self, key: &str, decrypt: bool) -> GatewayResult<Option<String>> {
        match self
            .client
            .get_parameter()
            .name(key)
            .with_decryption(decrypt)
            .send()
            .await
        {
            Ok(output) => Ok(output.parameter.and_then(|p| p.value)),
            Err(SdkError::ServiceError(e)) if matches!(e.err(), GetParameterError::ParameterNotFound(_)) => {
                Ok(None)
            }
            Err(e) => Err(GatewayError::Network(e.to_string())),
        }
    }

    /// Write a `String` parameter. `overwrite = false` fails with a conflict
    /// error if the parameter already exists — used by the race-detection
    /// paths in the shared-key manager and active-regions set.
    pub async fn put_string(&self, key: &str, value: &str, overwrite: bool) -> GatewayResult<()> {
        self.put(key, value, ParameterType::String, overwrite).await
    }

    /// Write a `SecureString` parameter (used for the SSH private key).
    pub async fn put_secure(&self, key: &str, value: &str, overwrite: bool) -> GatewayResult<()> {
        self.put(key, value, ParameterType::SecureString, overwrite).await
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        param_type: ParameterType,
        overwrite: bool,
    ) -> GatewayResult<()> {
        match self
            .client
            .put_parameter()
            .name(key)
            .value(value)
            .r#type(param_type)
            .overwrite(overwrite)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(e))
                if matches!(e.err(), PutParameterError::ParameterAlreadyExists(_)) =>
            {
                Err(GatewayError::conflict(format!(
                    "parameter '{key}' already exists"
                )))
            }
            Err(e) => Err(GatewayError::Network(e.to_string())),
        }
    }

    pub async fn delete(&self, key: &str) -> GatewayResult<()> {
        match self.client.delete_parameter().name(key).send().await {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(e))
                if e.err().is_parameter_not_found() =>
            {
                Ok(())
            }
            Err(e) => Err(GatewayError::Network(e.to_string())),
        }
    }
}
