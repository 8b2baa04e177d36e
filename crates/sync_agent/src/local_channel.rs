//! A concrete [`RpcChannel`] that mirrors actions into a second local
//! directory tree instead of a real remote agent.
//!
//! This exists only to exercise the engine end-to-end for local
//! smoke-testing - it is not a model of what a real remote agent's
//! transport or mutation executor looks like (both are explicit non-goals
//! of the core).

use std::collections::HashMap;
use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sync_core::sigcompute;
use sync_proto::{Action, RpcChannel, Signature, SubPath, BLOCK_SIZE};

/// Maps a mapping's `dest` string to the local directory it mirrors into.
pub struct LocalDirChannel {
    roots: HashMap<String, PathBuf>,
}

impl LocalDirChannel {
    pub fn new(roots: HashMap<String, PathBuf>) -> Self {
        Self { roots }
    }

    fn root(&self, dest: &str) -> std::io::Result<&Path> {
        self.roots
            .get(dest)
            .map(PathBuf::as_path)
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "unknown mapping dest"))
    }
}

#[async_trait]
impl RpcChannel for LocalDirChannel {
    type Error = std::io::Error;

    async fn full_scan(&self, dest: &str) -> Result<Vec<(SubPath, Signature)>, Self::Error> {
        let root = self.root(dest)?.to_path_buf();

        tokio::task::spawn_blocking(move || scan_tree(&root))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?
    }

    async fn send_action(&self, action: Action) -> Result<(), Self::Error> {
        let root = self.root(action.dest())?.to_path_buf();

        tokio::task::spawn_blocking(move || apply_action(&root, action))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?
    }

    async fn drain(&self) -> Result<(), Self::Error> {
        // Every action is a synchronous filesystem call above, so there is
        // never an unacknowledged write to wait out.
        Ok(())
    }
}

fn scan_tree(root: &Path) -> std::io::Result<Vec<(SubPath, Signature)>> {
    fs::create_dir_all(root)?;

    let mut out = Vec::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];

    for entry in walkdir::WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        let rel = entry.path().strip_prefix(root).expect("walkdir yields children of root");
        let Ok(sub) = SubPath::from_relative_path(rel) else {
            continue;
        };

        let file_type = entry.file_type();
        if let Some(sig) = sigcompute::compute(entry.path(), &mut buffer, file_type) {
            out.push((sub, sig));
        }
    }

    Ok(out)
}

fn apply_action(root: &Path, action: Action) -> std::io::Result<()> {
    match action {
        Action::Remove { sub, .. } => {
            let abs = sub.to_path(root);
            match fs::symlink_metadata(&abs) {
                Ok(meta) if meta.is_dir() => fs::remove_dir_all(&abs),
                Ok(_) => fs::remove_file(&abs),
                Err(_) => Ok(()),
            }
        }
        Action::PutDir { sub, perms, .. } => {
            let abs = sub.to_path(root);
            fs::create_dir_all(&abs)?;
            set_perms(&abs, perms.bits())
        }
        Action::PutFile { sub, perms, .. } => {
            let abs = sub.to_path(root);
            if let Some(parent) = abs.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::File::create(&abs)?;
            set_perms(&abs, perms.bits())
        }
        Action::PutLink { sub, target, .. } => {
            let abs = sub.to_path(root);
            if let Some(parent) = abs.parent() {
                fs::create_dir_all(parent)?;
            }
            let _ = fs::remove_file(&abs);
            symlink(&target, &abs)
        }
        Action::SetPerms { sub, perms, .. } => set_perms(&sub.to_path(root), perms.bits()),
        Action::WriteChunk {
            sub,
            block_index,
            bytes,
            ..
        } => {
            let abs = sub.to_path(root);
            let mut file = fs::OpenOptions::new().write(true).open(&abs)?;
            file.seek(SeekFrom::Start((block_index as u64) * BLOCK_SIZE as u64))?;
            file.write_all(&bytes)
        }
        Action::SetSize { sub, size, .. } => {
            let abs = sub.to_path(root);
            let file = fs::OpenOptions::new().write(true).open(&abs)?;
            file.set_len(size)
        }
    }
}

#[cfg(unix)]
fn set_perms(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_perms(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &str, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &str, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}
