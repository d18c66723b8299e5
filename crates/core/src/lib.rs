pub mod auth;
pub mod bridge;
pub mod config;
pub mod filestore;
pub mod job;
pub mod measurement;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod sink;
pub mod testing;

pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use measurement::Measurement;
