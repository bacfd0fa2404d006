//! Subscriber installation for binaries

use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output flavour, chosen by `[logging] profile` in the board config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Compact text on stderr
    #[default]
    Development,
    /// One JSON object per line on stderr
    Production,
    /// Nothing is written; a capture layer may be installed instead
    Test,
}

impl Profile {
    /// Directive used when `RUST_LOG` is unset
    pub fn default_filter(&self) -> &'static str {
        match self {
            Profile::Development => "stateboard=debug",
            Profile::Production => "stateboard=info",
            Profile::Test => "off",
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_filter()))
    }
}

static INSTALLED: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Later calls are no-ops. A subscriber installed elsewhere first (the test
/// capture layer, for one) is left in place.
///
/// ```
/// use stateboard_core::logging_facility::{init, Profile};
///
/// init(Profile::Production);
/// init(Profile::Development);
/// ```
pub fn init(profile: Profile) {
    INSTALLED.call_once(|| {
        let outcome = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(profile.filter())
                .with_writer(std::io::stderr)
                .finish()
                .try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(profile.filter())
                .with_writer(std::io::stderr)
                .finish()
                .try_init(),
            Profile::Test => tracing_subscriber::registry().try_init(),
        };
        if outcome.is_err() {
            tracing::debug!(?profile, "global subscriber already present");
        }
    });
}
