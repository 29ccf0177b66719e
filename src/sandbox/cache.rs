//! Engine sharing and interpreter module caching.
//!
//! Compiling the interpreter is by far the most expensive step of a
//! materialization. A [`SharedEngine`] keeps every module it compiled, keyed
//! by canonical path, so re-running a project only instantiates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use wasmtime::{Engine, Module};

use crate::error::{Result, SandboxError};

/// Thread-safe cache of compiled modules for a single engine.
///
/// Modules are engine-specific, so a cache is never shared between engines.
#[derive(Debug, Default)]
pub struct ModuleCache {
    cache: RwLock<HashMap<PathBuf, Module>>,
}

impl ModuleCache {
    /// Create a new empty module cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached module or compile it if not present.
    pub fn get_or_compile(&self, engine: &Engine, path: impl AsRef<Path>) -> Result<Module> {
        let path = path.as_ref();
        let canonical_path = std::fs::canonicalize(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SandboxError::InterpreterNotFound(path.display().to_string())
            } else {
                SandboxError::Io(e)
            }
        })?;

        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(module) = cache.get(&canonical_path) {
                return Ok(module.clone());
            }
        }

        // Compile outside any lock.
        let wasm_bytes = std::fs::read(&canonical_path)?;
        let module = Module::new(engine, &wasm_bytes).map_err(|e| {
            SandboxError::ModuleLoad(anyhow::anyhow!("failed to compile module: {}", e))
        })?;
        tracing::debug!(path = %canonical_path.display(), "compiled interpreter module");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let module = cache.entry(canonical_path).or_insert(module).clone();
        Ok(module)
    }

    /// Check if a module is cached.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        match std::fs::canonicalize(path) {
            Ok(canonical) => self
                .cache
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&canonical),
            Err(_) => false,
        }
    }

    /// Clear all cached modules.
    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Get the number of cached modules.
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An epoch-interruptible engine together with its module cache.
#[derive(Clone)]
pub struct SharedEngine {
    engine: Engine,
    modules: Arc<ModuleCache>,
    fuel: bool,
}

impl std::fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEngine")
            .field("engine", &"<wasmtime::Engine>")
            .field("modules", &self.modules.len())
            .field("fuel", &self.fuel)
            .finish()
    }
}

impl SharedEngine {
    /// Create an engine with epoch interruption, and fuel metering when
    /// `enable_fuel` is set.
    pub fn new(enable_fuel: bool) -> Result<Self> {
        let mut config = wasmtime::Config::new();
        config.epoch_interruption(true);
        config.consume_fuel(enable_fuel);
        let engine = Engine::new(&config)
            .map_err(|e| SandboxError::RuntimeInit(anyhow::anyhow!("failed to create engine: {}", e)))?;
        Ok(Self {
            engine,
            modules: Arc::new(ModuleCache::new()),
            fuel: enable_fuel,
        })
    }

    /// Whether stores on this engine meter fuel.
    pub fn fuel_enabled(&self) -> bool {
        self.fuel
    }

    /// Get a reference to the underlying engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The engine's module cache.
    pub fn modules(&self) -> &ModuleCache {
        &self.modules
    }

    /// Load a module through the cache.
    pub fn module(&self, path: impl AsRef<Path>) -> Result<Module> {
        self.modules.get_or_compile(&self.engine, path)
    }
}

impl std::ops::Deref for SharedEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}
