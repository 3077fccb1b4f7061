use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "info,tower_http=debug";

/// Installs the global subscriber once. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let _ = INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        // Tests may already have installed a subscriber.
        let _ = fmt().with_env_filter(filter).with_target(false).try_init();
    });
}
