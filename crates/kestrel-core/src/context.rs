//! Process-wide state shared by buffers.

use std::path::Path;
use std::sync::Arc;

use crate::CoreResult;
use crate::config::Config;
use crate::runtime::RuntimeFiles;

/// Configuration and runtime files, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub runtime: RuntimeFiles,
}

impl Context {
    pub fn new(config: Config, runtime: RuntimeFiles) -> Self {
        Self { config, runtime }
    }

    /// Loads configuration and runtime files from the resolved config dir.
    pub fn load(config_dir: Option<&Path>) -> CoreResult<Arc<Self>> {
        let config = Config::load(config_dir)?;
        let runtime = RuntimeFiles::load(&config);
        Ok(Arc::new(Self::new(config, runtime)))
    }

    /// Default configuration rooted at `dir` with only built-in syntax.
    pub fn with_defaults(dir: impl AsRef<Path>) -> Arc<Self> {
        let mut runtime = RuntimeFiles::new();
        runtime.add_builtin_syntax();
        Arc::new(Self::new(Config::with_dir(dir.as_ref()), runtime))
    }
}
