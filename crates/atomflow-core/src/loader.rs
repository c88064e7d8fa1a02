//! Loading primitive definitions from a registry source tree.
//!
//! A source tree is a directory holding `_meta/registry.yaml` (the index)
//! and one YAML file per primitive, addressed by relative path. The loader
//! does no caching; [`PrimitiveRegistry`](crate::registry::PrimitiveRegistry)
//! layers that on top.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::{CoreError, CoreResult};
use crate::model::primitive::{
    Category, Primitive, PrimitiveId, PrimitiveKind, PrimitiveStatus, PrimitiveSummary,
    RegistryIndex,
};

const INDEX_FILE: &str = "registry.yaml";
const META_DIR: &str = "_meta";

/// Reads primitive definitions and the registry index from disk.
#[derive(Debug, Clone)]
pub struct PrimitiveLoader {
    root: PathBuf,
}

impl PrimitiveLoader {
    /// Open a loader over the given root, or discover one.
    ///
    /// Candidates are tried in order: the explicit argument, `primitives/`
    /// beside the running executable, `primitives/` under the current
    /// directory, and `~/.atomflow/primitives`. The first candidate holding
    /// a `_meta/` subtree wins; otherwise `RegistryNotFound` lists every
    /// path that was tried.
    pub fn new(root: Option<PathBuf>) -> CoreResult<Self> {
        let mut candidates = Vec::new();
        if let Some(explicit) = root {
            candidates.push(explicit);
        }
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join("primitives"));
            }
        }
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join("primitives"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".atomflow").join("primitives"));
        }

        for candidate in &candidates {
            if candidate.join(META_DIR).is_dir() {
                tracing::debug!(root = %candidate.display(), "primitives root selected");
                return Ok(Self {
                    root: candidate.clone(),
                });
            }
        }
        Err(CoreError::RegistryNotFound {
            searched: candidates,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parse `_meta/registry.yaml`.
    ///
    /// Ids must be unique across all four sections; a duplicate makes the
    /// whole index malformed.
    pub fn load_index(&self) -> CoreResult<RegistryIndex> {
        let path = self.root.join(META_DIR).join(INDEX_FILE);
        let text = fs::read_to_string(&path).map_err(|source| CoreError::FileRead {
            path: path.clone(),
            source,
        })?;
        let index: RegistryIndex =
            serde_yaml::from_str(&text).map_err(|e| CoreError::MalformedIndex {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let mut seen = HashSet::new();
        for entry in index.entries() {
            if !seen.insert(entry.id.clone()) {
                return Err(CoreError::MalformedIndex {
                    path,
                    reason: format!("duplicate primitive id {}", entry.id),
                });
            }
        }
        Ok(index)
    }

    /// Load one primitive by id, resolving its file through the index.
    pub fn load_primitive(&self, id: &PrimitiveId) -> CoreResult<Primitive> {
        let index = self.load_index()?;
        let entry = index
            .section(id.kind())
            .iter()
            .find(|e| e.id == *id)
            .ok_or_else(|| CoreError::PrimitiveNotFound { id: id.to_string() })?;

        let path = self.root.join(&entry.path);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::PrimitiveNotFound { id: id.to_string() });
            }
            Err(source) => return Err(CoreError::FileRead { path, source }),
        };

        let primitive: Primitive =
            serde_yaml::from_str(&text).map_err(|e| CoreError::MalformedPrimitive {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        check_consistency(id, &primitive)?;
        Ok(primitive)
    }

    /// Load every primitive of one kind.
    ///
    /// A file that fails to load is logged and skipped; the batch never
    /// aborts on a single bad definition.
    pub fn load_all(&self, kind: PrimitiveKind) -> CoreResult<Vec<Primitive>> {
        let index = self.load_index()?;
        let mut loaded = Vec::new();
        for entry in index.section(kind) {
            match self.load_primitive(&entry.id) {
                Ok(primitive) => loaded.push(primitive),
                Err(err) => {
                    tracing::warn!(id = %entry.id, error = %err, "skipping primitive that failed to load");
                }
            }
        }
        Ok(loaded)
    }

    /// List index entries with optional kind/category/status filters.
    ///
    /// `status = None` means any status.
    pub fn list(
        &self,
        kind: Option<PrimitiveKind>,
        category: Option<Category>,
        status: Option<PrimitiveStatus>,
    ) -> CoreResult<Vec<PrimitiveSummary>> {
        let index = self.load_index()?;
        let kinds: Vec<PrimitiveKind> = match kind {
            Some(k) => vec![k],
            None => vec![
                PrimitiveKind::Particle,
                PrimitiveKind::Atom,
                PrimitiveKind::Molecule,
                PrimitiveKind::Organism,
            ],
        };
        let mut results = Vec::new();
        for k in kinds {
            for entry in index.section(k) {
                if let Some(category) = category {
                    if entry.category != Some(category) {
                        continue;
                    }
                }
                if let Some(status) = status {
                    if entry.status != status {
                        continue;
                    }
                }
                results.push(entry.clone());
            }
        }
        Ok(results)
    }
}

/// Cross-check a loaded definition against the id it was requested under.
fn check_consistency(id: &PrimitiveId, primitive: &Primitive) -> CoreResult<()> {
    if primitive.metadata.id != *id {
        return Err(CoreError::MalformedPrimitive {
            id: id.to_string(),
            reason: format!("file declares id {}", primitive.metadata.id),
        });
    }
    if primitive.metadata.kind != id.kind() {
        return Err(CoreError::MalformedPrimitive {
            id: id.to_string(),
            reason: format!(
                "declared kind {} does not match id prefix ({})",
                primitive.metadata.kind,
                id.kind()
            ),
        });
    }
    let mut names = HashSet::new();
    for input in &primitive.interface.inputs {
        if !names.insert(input.name.as_str()) {
            return Err(CoreError::MalformedPrimitive {
                id: id.to_string(),
                reason: format!("duplicate input field {}", input.name),
            });
        }
    }
    Ok(())
}
