//! Configuration defaults.  Every setting can be overridden by the environmental variable
//! named in its `from_env_var!` block (either by setting the variable at runtime or in the
//! `.env` file).
pub use self::environmental_variables::EnvVar;
pub use self::stream_cfg::Config;
pub use self::stream_cfg_types::*;

use super::err;
use hashbrown::HashMap;
use std::env;

mod environmental_variables;
mod stream_cfg;
mod stream_cfg_types;

pub fn merge_dotenv() -> Result<(), err::FatalErr> {
    let file = match env::var("ENV").ok().as_deref() {
        Some("production") => ".env.production",
        Some("development") | None => ".env",
        Some(unsupported) => Err(err::FatalErr::config(
            "ENV",
            unsupported,
            "`production` or `development`",
        ))?,
    };
    match dotenv::from_filename(file) {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn from_env(env_vars: HashMap<String, String>) -> Result<Config, err::FatalErr> {
    let env_vars = EnvVar::new(env_vars);
    log::info!("Environmental variables received: {}", &env_vars);
    Config::from_env(env_vars)
}
