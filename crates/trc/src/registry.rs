//! Name → collector mappings.
//!
//! Two independent tables: compiled collectors (name → factory) and script
//! collectors (name → source). Tables are filled through a
//! [`RegistryBuilder`] and frozen into an immutable [`CollectorRegistry`],
//! so lookups after startup need no locking.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, info};
use trc_collect::{TraceContext, Tracer, native};
use trc_script::{SCRIPT_SUFFIX, bundled_assets};

/// Constructor of a compiled collector.
pub type Factory = Arc<dyn Fn(&TraceContext) -> Box<dyn Tracer> + Send + Sync>;

/// Registry construction errors. All of them are startup errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("collector '{0}' is already registered")]
    Duplicate(String),

    #[error("failed to read tracer scripts from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Convert a snake-cased name into camel case.
///
/// `four_byte_tracer` becomes `fourByteTracer`; names without underscores
/// are returned unchanged. Empty segments are dropped.
pub fn camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (idx, piece) in name.split('_').enumerate() {
        let mut chars = piece.chars();
        match chars.next() {
            Some(first) if idx > 0 => {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
            _ => out.push_str(piece),
        }
    }
    out
}

/// Canonical registry name for a script asset file name.
///
/// `None` when the file does not carry the script suffix.
pub fn script_name(file_name: &str) -> Option<String> {
    file_name.strip_suffix(SCRIPT_SUFFIX).map(camel)
}

/// Mutable registry used during startup.
///
/// Registering a name twice in the same table is rejected with
/// [`RegistryError::Duplicate`].
#[derive(Default)]
pub struct RegistryBuilder {
    compiled: FxHashMap<String, Factory>,
    scripted: FxHashMap<String, Arc<str>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-filled with compiled collectors and bundled scripts.
    pub fn with_builtins() -> Result<Self> {
        let mut builder = Self::new();
        for (name, factory) in native::builtin() {
            builder.register_compiled(name, factory)?;
        }
        builder.load_bundled_scripts(bundled_assets())?;
        Ok(builder)
    }

    /// Add a compiled collector.
    pub fn register_compiled<F>(&mut self, name: impl Into<String>, factory: F) -> Result<&mut Self>
    where
        F: Fn(&TraceContext) -> Box<dyn Tracer> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.compiled.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(%name, "registered compiled collector");
        self.compiled.insert(name, Arc::new(factory));
        Ok(self)
    }

    /// Add a script collector under an already canonical name.
    pub fn register_script(
        &mut self,
        name: impl Into<String>,
        source: impl Into<Arc<str>>,
    ) -> Result<&mut Self> {
        let name = name.into();
        if self.scripted.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(%name, "registered script collector");
        self.scripted.insert(name, source.into());
        Ok(self)
    }

    /// Register `(file name, source)` assets under their camel-cased names.
    ///
    /// Assets without the script suffix are skipped.
    pub fn load_bundled_scripts<'a>(
        &mut self,
        assets: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<&mut Self> {
        for (file, source) in assets {
            match script_name(file) {
                Some(name) => {
                    self.register_script(name, source)?;
                }
                None => debug!(file, "skipping non-script asset"),
            }
        }
        Ok(self)
    }

    /// Register every script file in `dir`.
    pub fn load_script_dir(&mut self, dir: &Path) -> Result<&mut Self> {
        let io_err = |source| RegistryError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let Some(file) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if path.is_file() && file.ends_with(SCRIPT_SUFFIX) {
                files.push((file.to_string(), path.clone()));
            }
        }
        files.sort();

        for (file, path) in files {
            let source = std::fs::read_to_string(&path).map_err(|source| RegistryError::Io {
                path: path.clone(),
                source,
            })?;
            self.load_bundled_scripts([(file.as_str(), source.as_str())])?;
        }
        info!(dir = %dir.display(), scripts = self.scripted.len(), "loaded tracer scripts");
        Ok(self)
    }

    /// Freeze the tables.
    pub fn build(self) -> CollectorRegistry {
        CollectorRegistry {
            compiled: self.compiled,
            scripted: self.scripted,
        }
    }
}

/// Read-only collector tables shared by all resolutions.
pub struct CollectorRegistry {
    compiled: FxHashMap<String, Factory>,
    scripted: FxHashMap<String, Arc<str>>,
}

static GLOBAL: OnceLock<Arc<CollectorRegistry>> = OnceLock::new();

impl CollectorRegistry {
    /// Process-wide registry with the builtin collectors.
    ///
    /// Built on first use; never mutated afterwards.
    pub fn global() -> Arc<Self> {
        GLOBAL
            .get_or_init(|| {
                let builder = RegistryBuilder::with_builtins()
                    .expect("builtin collector names are unique");
                Arc::new(builder.build())
            })
            .clone()
    }

    /// Source of a script collector.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.scripted.get(name).map(AsRef::as_ref)
    }

    /// Factory of a compiled collector.
    pub fn lookup_compiled(&self, name: &str) -> Option<&Factory> {
        self.compiled.get(name)
    }

    /// Sorted compiled collector names.
    pub fn compiled_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.compiled.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Sorted script collector names.
    pub fn script_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.scripted.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// All script sources, in no particular order.
    pub fn script_sources(&self) -> impl Iterator<Item = &str> {
        self.scripted.values().map(AsRef::as_ref)
    }
}

impl fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("compiled", &self.compiled_names())
            .field("scripted", &self.script_names())
            .finish()
    }
}
