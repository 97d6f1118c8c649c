use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::fs;

use crate::kernel::constants::MANIFEST_FILE_NAME;
use crate::module_system::error::ModuleSystemError;
use crate::module_system::manifest::ModuleManifest;

/// A module located on disk, with its manifest parsed. Immutable once
/// produced by discovery.
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    pub manifest: ModuleManifest,
    /// The module's own directory
    pub root_dir: PathBuf,
    /// `root_dir` joined with the manifest's main binary
    pub main_binary_path: PathBuf,
}

impl DiscoveredModule {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }
}

/// Outcome of a discovery sweep. Warnings cover malformed manifests,
/// unreadable directories, and duplicate candidates; none of them abort
/// the scan.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub modules: Vec<DiscoveredModule>,
    pub warnings: Vec<String>,
}

/// Walks configured roots looking for module directories.
///
/// A module directory is any directory containing a `manifest.json`. By
/// default only the immediate children of each root are considered;
/// `max_depth` allows deeper trees.
#[derive(Debug, Clone)]
pub struct ModuleDiscovery {
    roots: Vec<PathBuf>,
    max_depth: usize,
}

impl ModuleDiscovery {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots, max_depth: 1 }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn add_root<P: AsRef<Path>>(&mut self, root: P) {
        self.roots.push(root.as_ref().to_path_buf());
    }

    /// Scan every root. Produces one candidate per module directory,
    /// deduplicated by `(id, version)`.
    pub async fn discover(&self) -> Result<DiscoveryReport, ModuleSystemError> {
        let mut report = DiscoveryReport::default();

        for root in &self.roots {
            let exists = fs::try_exists(root).await.unwrap_or(false);
            if !exists {
                report
                    .warnings
                    .push(format!("Module root '{}' does not exist", root.display()));
                continue;
            }
            let metadata = match fs::metadata(root).await {
                Ok(meta) => meta,
                Err(e) => {
                    report.warnings.push(format!(
                        "Failed to read module root '{}': {}",
                        root.display(),
                        e
                    ));
                    continue;
                }
            };
            if !metadata.is_dir() {
                report.warnings.push(format!(
                    "Module root '{}' is not a directory",
                    root.display()
                ));
                continue;
            }
            self.scan_directory_boxed(root.clone(), 1, &mut report).await;
        }

        self.deduplicate(&mut report);
        Ok(report)
    }

    /// Boxed indirection for the recursive async scan.
    fn scan_directory_boxed<'a>(
        &'a self,
        dir: PathBuf,
        depth: usize,
        report: &'a mut DiscoveryReport,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(self.scan_directory(dir, depth, report))
    }

    async fn scan_directory(&self, dir: PathBuf, depth: usize, report: &mut DiscoveryReport) {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                report
                    .warnings
                    .push(format!("Failed to read directory '{}': {}", dir.display(), e));
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    report
                        .warnings
                        .push(format!("Failed to walk '{}': {}", dir.display(), e));
                    break;
                }
            };
            let entry_path = entry.path();
            let is_dir = fs::metadata(&entry_path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let manifest_path = entry_path.join(MANIFEST_FILE_NAME);
            let has_manifest = fs::try_exists(&manifest_path).await.unwrap_or(false);
            if has_manifest {
                match self.read_candidate(&entry_path, &manifest_path).await {
                    Ok(candidate) => report.modules.push(candidate),
                    Err(e) => report.warnings.push(format!(
                        "Skipping '{}': {}",
                        entry_path.display(),
                        e
                    )),
                }
            } else if depth < self.max_depth {
                self.scan_directory_boxed(entry_path, depth + 1, report).await;
            }
        }
    }

    async fn read_candidate(
        &self,
        module_dir: &Path,
        manifest_path: &Path,
    ) -> Result<DiscoveredModule, ModuleSystemError> {
        let content =
            fs::read_to_string(manifest_path)
                .await
                .map_err(|e| ModuleSystemError::ManifestInvalid {
                    path: manifest_path.to_path_buf(),
                    message: format!("unreadable manifest: {}", e),
                    source: Some(Box::new(e)),
                })?;

        let manifest =
            ModuleManifest::from_json(&content).map_err(|e| ModuleSystemError::ManifestInvalid {
                path: manifest_path.to_path_buf(),
                message: format!("manifest does not parse: {}", e),
                source: Some(Box::new(e)),
            })?;

        let structural = manifest.validate();
        if !structural.is_empty() {
            return Err(ModuleSystemError::ManifestInvalid {
                path: manifest_path.to_path_buf(),
                message: structural.join("; "),
                source: None,
            });
        }

        let main_binary_path = module_dir.join(&manifest.main_binary);
        Ok(DiscoveredModule {
            manifest,
            root_dir: module_dir.to_path_buf(),
            main_binary_path,
        })
    }

    /// Keep the first candidate per `(id, version)`; report the rest.
    fn deduplicate(&self, report: &mut DiscoveryReport) {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut deduped = Vec::with_capacity(report.modules.len());
        for module in report.modules.drain(..) {
            let key = (
                module.manifest.id.clone(),
                module.manifest.version.to_string(),
            );
            if seen.insert(key) {
                deduped.push(module);
            } else {
                report.warnings.push(format!(
                    "Duplicate module {}@{} at '{}' ignored",
                    module.manifest.id,
                    module.manifest.version,
                    module.root_dir.display()
                ));
            }
        }
        report.modules = deduped;
    }
}
