pub mod paths;
pub mod persistence;

use std::sync::Once;

pub use paths::{ensure_dir, PathResolver};

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber with sensible defaults.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy()
            .add_directive(
                "quickshare=info"
                    .parse()
                    .unwrap_or_else(|_| LevelFilter::INFO.into()),
            );

        // A subscriber installed by the host wins; ours is only a fallback.
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
