use super::Artifact;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;

/// Log target for the snapshot writer
const LOG_TARGET: &str = "snapshot";

/// Reads and writes snapshot files under the assets directory.
///
/// Every write fully replaces the previous file. The content goes to a uniquely named sibling
/// temp file first and is then renamed over the target, so readers never observe a half-written
/// snapshot. The temp file is removed when the rename fails.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: Utf8PathBuf,
}

impl SnapshotWriter {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    #[must_use]
    pub fn path(&self, artifact: Artifact) -> Utf8PathBuf {
        self.dir.join(artifact.file_name())
    }

    /// Serialize `value` as pretty-printed JSON with a trailing newline.
    pub fn write<T: Serialize + ?Sized>(&self, artifact: Artifact, value: &T) -> Result<Utf8PathBuf> {
        let mut json = serde_json::to_string_pretty(value).with_context(|| format!("serializing {artifact}"))?;
        json.push('\n');

        fs::create_dir_all(&self.dir).with_context(|| format!("creating assets directory '{}'", self.dir))?;

        let path = self.path(artifact);
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", artifact.file_name()))
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .with_context(|| format!("creating a temporary file in '{}'", self.dir))?;

        // snapshots are served as static files, not private temp files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .with_context(|| format!("setting permissions on '{}'", tmp.path().display()))?;
        }

        tmp.write_all(json.as_bytes())
            .with_context(|| format!("writing '{}'", tmp.path().display()))?;
        _ = tmp
            .persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("replacing '{path}'"))?;

        log::info!(target: LOG_TARGET, "Wrote '{path}' ({} bytes)", json.len());
        Ok(path)
    }

    /// Parse a previously written snapshot.
    pub fn read<T: DeserializeOwned>(&self, artifact: Artifact) -> Result<T> {
        let path = self.path(artifact);
        let text = fs::read_to_string(&path).with_context(|| format!("reading '{path}'"))?;
        serde_json::from_str(&text).with_context(|| format!("parsing '{path}'"))
    }
}
