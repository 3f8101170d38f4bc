use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

pub trait PageSizeStore: Send {
    fn load(&self, key: &str) -> Option<u32>;
    fn save(&mut self, key: &str, size: u32) -> Result<(), String>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryPageSizes {
    sizes: BTreeMap<String, u32>,
}

impl MemoryPageSizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, size: u32) -> Self {
        self.sizes.insert(key.to_string(), size);
        self
    }
}

impl PageSizeStore for MemoryPageSizes {
    fn load(&self, key: &str) -> Option<u32> {
        self.sizes.get(key).copied().filter(|s| *s > 0)
    }

    fn save(&mut self, key: &str, size: u32) -> Result<(), String> {
        self.sizes.insert(key.to_string(), size);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FilePageSizes {
    path: PathBuf,
    sizes: BTreeMap<String, u32>,
}

impl FilePageSizes {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, String> {
        let path = path.into();
        let sizes = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_yaml::from_str::<BTreeMap<String, u32>>(&contents)
                .map_err(|e| format!("failed to parse page sizes '{}': {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(format!(
                    "failed to read page sizes '{}': {e}",
                    path.display()
                ))
            }
        };
        Ok(Self { path, sizes })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageSizeStore for FilePageSizes {
    fn load(&self, key: &str) -> Option<u32> {
        self.sizes.get(key).copied().filter(|s| *s > 0)
    }

    fn save(&mut self, key: &str, size: u32) -> Result<(), String> {
        self.sizes.insert(key.to_string(), size);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                format!("failed to create directory '{}': {e}", parent.display())
            })?;
        }
        let contents = serde_yaml::to_string(&self.sizes)
            .map_err(|e| format!("failed to encode page sizes: {e}"))?;
        std::fs::write(&self.path, contents)
            .map_err(|e| format!("failed to write page sizes '{}': {e}", self.path.display()))?;
        debug!(key, size, path = %self.path.display(), "saved page size");
        Ok(())
    }
}
