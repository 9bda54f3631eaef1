//! Provide tracing, tailored to this program.
//!
//! Binaries call [`init`] once at startup to install a subscriber. The
//! rest of the crate includes `crate::tracing::prelude::*` for convenient
//! access to the event macros.

use time::macros::format_description;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::time::LocalTime;

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

/// Initialize logging to stdout.
///
/// Events are filtered according to the `RUST_LOG` environment variable,
/// overriding the default level (ERROR) to INFO, and timestamped in
/// local time to the nearest second.
pub fn init() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(LocalTime::new(format_description!(
            "[hour]:[minute]:[second]"
        )))
        .init();
}
