//! Signing key file handling.

use anyhow::{Context, Result, bail};
use rand::RngCore;
use std::fs;
use std::path::Path;
use tallybook_license::LicenseCodec;
use tracing::info;

/// Size of the Ed25519 seed stored in the key file.
pub const SEED_LEN: usize = 32;

/// Loads the signing seed from `path`, generating one if the file is absent.
pub fn load_or_generate_codec(path: &Path) -> Result<LicenseCodec> {
    if path.exists() {
        info!(path = %path.display(), "Loading signing key");
        let bytes = fs::read(path).context("Failed to read signing key file")?;
        let seed: [u8; SEED_LEN] = match bytes.try_into() {
            Ok(seed) => seed,
            Err(bytes) => bail!(
                "signing key file {} holds {} bytes, expected {SEED_LEN}",
                path.display(),
                bytes.len()
            ),
        };
        Ok(LicenseCodec::from_seed(&seed))
    } else {
        info!(path = %path.display(), "Generating new signing key");
        let mut seed = [0u8; SEED_LEN];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create key directory")?;
        }
        fs::write(path, seed).context("Failed to write signing key file")?;
        restrict_permissions(path)?;
        Ok(LicenseCodec::from_seed(&seed))
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .context("Failed to restrict signing key permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("signing.key");

        let first = load_or_generate_codec(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), SEED_LEN);
        let second = load_or_generate_codec(&path).unwrap();
        assert_eq!(first.key_id(), second.key_id());
        assert!(second.can_sign());
    }

    #[test]
    fn wrong_length_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signing.key");
        fs::write(&path, b"short").unwrap();
        let err = load_or_generate_codec(&path).unwrap_err();
        assert!(err.to_string().contains("expected 32"));
    }

    #[cfg(unix)]
    #[test]
    fn generated_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signing.key");
        load_or_generate_codec(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
