pub mod config;
pub mod presenter;
pub mod types;

use anyhow::Result;

pub use presenter::Emitter;

use config::OutputConfig;
use types::Envelope;

/// Writes one envelope to stdout in the configured format.
pub fn emit(env: &Envelope) -> Result<()> {
    let emitter = Emitter::from_config(OutputConfig::from_env());
    emitter.emit(env).map_err(anyhow::Error::from)
}
