pub mod adapter;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod models;
pub mod probe;
pub mod registry;
pub mod router;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::{RouterError, Stage};
pub use models::{CompletionRequest, Message, ProviderConfig, ProviderIdentity, Role};
pub use probe::{probe, ProbeReport, DEFAULT_PROBE_PHRASE};
pub use router::RouterContext;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::config::{EnvSource, Settings};
    pub use crate::error::RouterError;
    pub use crate::evaluate;
    pub use crate::models::{CompletionRequest, Message, ProviderIdentity};
    pub use crate::probe::probe;
    pub use crate::router::RouterContext;
    pub use crate::telemetry;
}
