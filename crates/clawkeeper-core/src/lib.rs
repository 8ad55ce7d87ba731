pub mod channel_sync;
pub mod commands;
pub mod env_store;
pub mod error;
pub mod gateway_config;
pub mod health;
pub mod keeper;
pub mod process_env;
pub mod restart_flag;
pub mod sanitizer;
pub mod settings;
pub mod supervisor;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use channel_sync::*;
pub use commands::*;
pub use env_store::*;
pub use error::*;
pub use gateway_config::*;
pub use health::*;
pub use keeper::*;
pub use process_env::*;
pub use restart_flag::*;
pub use sanitizer::*;
pub use settings::*;
pub use supervisor::*;
