//! vlf-core: peer identifiers and the on-disk files (config, settings,
//! bootstrap list). All other vlf crates depend on this one.

pub mod bootstrap;
pub mod config;
pub mod identity;
pub mod settings;

pub use bootstrap::{BootstrapList, DEFAULT_BOOTSTRAP_PORT};
pub use config::VlfConfig;
pub use identity::{IdError, PeerId, PEER_ID_LEN};
pub use settings::Settings;
