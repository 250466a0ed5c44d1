//! SSH key generation and fingerprinting for the shared-key manager (§4.6).
//!
//! The tool uses a single RSA-4096 key for every managed instance. The
//! fingerprint is the MD5 hash of the DER-encoded public key formatted as
//! colon-separated hex pairs — the format the cloud's own key-pair import
//! API reports, so mismatch detection can compare directly against it.

use std::path::Path;

use md5::{Digest, Md5};
use rand::rngs::OsRng;
use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::RsaPrivateKey;
use ssh_key::{Algorithm, LineEnding, PrivateKey};

use crate::error::{GscpError, Result};

/// Generate a fresh 4096-bit RSA key pair in OpenSSH format.
pub fn generate_rsa_keypair() -> Result<PrivateKey> {
    let mut rng = OsRng;
    let rsa_key = RsaPrivateKey::new(&mut rng, 4096)
        .map_err(|e| GscpError::remote(format!("failed to generate RSA key: {e}")))?;

    let private_key = PrivateKey::from(
        ssh_key::private::RsaKeypair::try_from(&rsa_key)
            .map_err(|e| GscpError::remote(format!("failed to convert RSA key: {e}")))?,
    );
    Ok(private_key)
}

/// Write a private key (and its `.pub` sibling) to `path`, `chmod 600`.
pub fn write_key_pair(path: &Path, key: &PrivateKey) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let openssh = key
        .to_openssh(LineEnding::LF)
        .map_err(|e| GscpError::remote(format!("failed to encode private key: {e}")))?;
    std::fs::write(path, openssh.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    let public = key
        .public_key()
        .to_openssh()
        .map_err(|e| GscpError::remote(format!("failed to encode public key: {e}")))?;
    std::fs::write(format!("{}.pub", path.display()), format!("{public}\n"))?;

    Ok(())
}

/// Load a private key from disk. Assumes no passphrase — the managed key is
/// always generated without one.
pub fn load_key_pair(path: &Path) -> Result<PrivateKey> {
    let content = std::fs::read_to_string(path)?;
    PrivateKey::from_openssh(&content)
        .map_err(|e| GscpError::remote(format!("failed to parse key at {}: {e}", path.display())))
}

/// DER bytes of the RSA public key, suitable for the cloud gateway's
/// `import_key_pair`.
pub fn public_key_der(key: &PrivateKey) -> Result<Vec<u8>> {
    let Algorithm::Rsa { .. } = key.algorithm() else {
        return Err(GscpError::integrity("managed key is not RSA"));
    };
    let rsa_keypair = key
        .key_data()
        .rsa()
        .ok_or_else(|| GscpError::integrity("managed key has no RSA key data"))?;
    let rsa_public: rsa::RsaPublicKey = rsa_keypair
        .try_into()
        .map_err(|e: ssh_key::Error| GscpError::remote(format!("failed to extract RSA public key: {e}")))?;
    rsa_public
        .to_pkcs1_der()
        .map(|d| d.as_bytes().to_vec())
        .map_err(|e| GscpError::remote(format!("failed to DER-encode public key: {e}")))
}

/// MD5 colon-hex fingerprint of the DER-encoded public key, matching the
/// format EC2 reports for imported key pairs.
pub fn fingerprint_md5(key: &PrivateKey) -> Result<String> {
    let der = public_key_der(key)?;
    let digest = Md5::digest(&der);
    Ok(digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generates_rsa_4096_key() {
        let key = generate_rsa_keypair().unwrap();
        assert!(matches!(key.algorithm(), Algorithm::Rsa { .. }));
    }

    #[test]
    fn fingerprint_is_stable_for_same_key() {
        let key = generate_rsa_keypair().unwrap();
        let fp1 = fingerprint_md5(&key).unwrap();
        let fp2 = fingerprint_md5(&key).unwrap();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.split(':').count(), 16);
    }

    #[test]
    fn different_keys_have_different_fingerprints() {
        let a = generate_rsa_keypair().unwrap();
        let b = generate_rsa_keypair().unwrap();
        assert_ne!(fingerprint_md5(&a).unwrap(), fingerprint_md5(&b).unwrap());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key.pem");
        let key = generate_rsa_keypair().unwrap();
        write_key_pair(&path, &key).unwrap();

        let loaded = load_key_pair(&path).unwrap();
        assert_eq!(fingerprint_md5(&key).unwrap(), fingerprint_md5(&loaded).unwrap());
    }
}
