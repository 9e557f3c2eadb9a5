//! Installer that replaces the installed file in place.
//!
//! The artifact is copied next to the target, made executable and renamed
//! over it, so the target is never observed half-written. If the caller stops
//! waiting (the install timeout drops this future), the copy is abandoned
//! before the rename and the target keeps the previous build.

use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::traits::{InstallerError, PackageInstaller};
use crate::update::{copy_cancellable, CancelFlag};

/// Suffix of the staging file written next to the target.
const STAGING_SUFFIX: &str = ".autopatch-new";

#[derive(Debug, Clone)]
pub struct ReplaceInstaller {
    target: PathBuf,
}

impl ReplaceInstaller {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(STAGING_SUFFIX);
        self.target.with_file_name(name)
    }
}

#[async_trait]
impl PackageInstaller for ReplaceInstaller {
    fn name(&self) -> &str {
        "replace"
    }

    async fn install(&self, artifact: &Path) -> Result<(), InstallerError> {
        if !artifact.is_file() {
            return Err(InstallerError::ArtifactMissing(
                artifact.display().to_string(),
            ));
        }

        let artifact = artifact.to_path_buf();
        let target = self.target.clone();
        let staging = self.staging_path();
        let cancel = CancelFlag::new();
        let _armed = cancel.cancel_on_drop();

        tokio::task::spawn_blocking(move || replace(&artifact, &staging, &target, &cancel))
            .await
            .map_err(|e| InstallerError::Io(e.to_string()))?
            .map_err(|e| InstallerError::Io(e.to_string()))
    }
}

fn replace(artifact: &Path, staging: &Path, target: &Path, cancel: &CancelFlag) -> io::Result<()> {
    let result = (|| {
        {
            let mut reader = fs::File::open(artifact)?;
            let mut writer = fs::File::create(staging)?;
            copy_cancellable(&mut reader, &mut writer, cancel)?;
            writer.sync_all()?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(staging, fs::Permissions::from_mode(0o755))?;
        }
        cancel.check()?;
        fs::rename(staging, target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(staging);
    }
    result
}
