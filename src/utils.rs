// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    io::Read,
    os::unix::fs::MetadataExt,
    path::Path,
};

use anyhow::{Context, Result, bail};
use rand::RngCore;

/// Read the symmetric key from `path`, refusing it if the mode grants
/// any permission to group or other (§4.6 startup step b).
pub fn load_key_file(path: &Path) -> Result<Vec<u8>> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to stat key file {}", path.display()))?;
    if !metadata.is_file() {
        bail!("key file {} is not a regular file", path.display());
    }
    if metadata.mode() & 0o077 != 0 {
        bail!(
            "key file {} must not be group- or world-readable (mode {:o})",
            path.display(),
            metadata.mode() & 0o777
        );
    }
    let mut file =
        fs::File::open(path).with_context(|| format!("failed to open key file {}", path.display()))?;
    let mut key = Vec::new();
    file.read_to_end(&mut key)
        .with_context(|| format!("failed to read key file {}", path.display()))?;
    if key.is_empty() {
        bail!("key file {} is empty", path.display());
    }
    Ok(key)
}

/// Read an existing PRNG seed file, or create one with fresh entropy if
/// it does not exist yet (§4.6 startup step a).
pub fn read_or_create_seed(path: &Path, seed_len: usize) -> Result<Vec<u8>> {
    match fs::File::open(path) {
        Ok(mut file) => {
            let mut seed = Vec::new();
            file.read_to_end(&mut seed)
                .with_context(|| format!("failed to read seed file {}", path.display()))?;
            Ok(seed)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let mut seed = vec![0u8; seed_len];
            rand::rng().fill_bytes(&mut seed);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).ok();
            }
            write_seed_file(path, &seed)?;
            Ok(seed)
        }
        Err(e) => Err(e).with_context(|| format!("failed to open seed file {}", path.display())),
    }
}

fn write_seed_file(path: &Path, seed: &[u8]) -> Result<()> {
    use std::{io::Write, os::unix::fs::OpenOptionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("failed to create seed file {}", path.display()))?;
    file.write_all(seed)
        .with_context(|| format!("failed to write seed file {}", path.display()))?;
    Ok(())
}

/// Write `pid` as ASCII decimal plus newline (§6 pidfile format).
pub fn write_pidfile(path: &Path, pid: u32) -> Result<()> {
    fs::write(path, format!("{pid}\n"))
        .with_context(|| format!("failed to write pidfile {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    #[test]
    fn rejects_group_readable_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("munge.key");
        fs::write(&path, b"0123456789abcdef").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
        assert!(load_key_file(&path).is_err());
    }

    #[test]
    fn accepts_owner_only_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("munge.key");
        fs::write(&path, b"0123456789abcdef").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        let key = load_key_file(&path).unwrap();
        assert_eq!(key, b"0123456789abcdef");
    }

    #[test]
    fn creates_seed_file_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("munge.seed");
        let seed = read_or_create_seed(&path, 32).unwrap();
        assert_eq!(seed.len(), 32);
        let seed_again = read_or_create_seed(&path, 32).unwrap();
        assert_eq!(seed, seed_again);
    }
}
