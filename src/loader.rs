use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::context::Context;
use crate::layer::Layer;
use crate::manifest::LayerManifest;

const MANIFEST_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Resolves layer names to manifest files and assembles layer stacks.
#[derive(Clone, Debug, Default)]
pub struct LayerLoader {
    search_paths: Vec<PathBuf>,
    manifests: HashMap<String, LayerManifest>,
}

impl LayerLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut loader = Self::new();
        for path in paths {
            loader.add_search_path(path);
        }
        loader
    }

    pub fn add_search_path(&mut self, path: PathBuf) {
        if path.is_dir() {
            self.search_paths.push(path);
        } else {
            tracing::debug!(path = %path.display(), "skipping missing layer directory");
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Loads a manifest by layer name, or by path when the name looks like
    /// one. Results are cached per name.
    pub fn load_manifest(&mut self, name: &str) -> Result<LayerManifest> {
        if let Some(manifest) = self.manifests.get(name) {
            return Ok(manifest.clone());
        }
        let path = self.resolve(name)?;
        tracing::debug!(layer = name, path = %path.display(), "loading layer manifest");
        let manifest = LayerManifest::load(&path)?;
        self.manifests.insert(name.to_string(), manifest.clone());
        Ok(manifest)
    }

    pub fn load_layer(&mut self, name: &str) -> Result<Layer> {
        Ok(self.load_manifest(name)?.to_layer())
    }

    /// Builds layers in the given order, lowest priority first.
    pub fn load_stack<S: AsRef<str>>(&mut self, names: &[S]) -> Result<Vec<Layer>> {
        names
            .iter()
            .map(|name| self.load_layer(name.as_ref()))
            .collect()
    }

    pub fn load_context<S: AsRef<str>>(&mut self, names: &[S]) -> Result<Context> {
        Ok(Context::new(self.load_stack(names)?))
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let direct = Path::new(name);
        if looks_like_path(direct) {
            if direct.is_file() {
                return Ok(direct.to_path_buf());
            }
            return Err(anyhow!("layer file {} does not exist", direct.display()));
        }
        self.search_paths
            .iter()
            .find_map(|base| find_manifest_file(base, name))
            .ok_or_else(|| {
                anyhow!(
                    "unable to resolve layer `{name}` in {} search path(s)",
                    self.search_paths.len()
                )
            })
    }
}

fn looks_like_path(path: &Path) -> bool {
    path.extension().is_some() || path.components().count() > 1
}

fn find_manifest_file(base: &Path, name: &str) -> Option<PathBuf> {
    MANIFEST_EXTENSIONS
        .iter()
        .map(|ext| base.join(name).with_extension(ext))
        .find(|candidate| candidate.is_file())
}
