//! Log output for hosts embedding an [`Injector`](crate::Injector).
//!
//! The engine only emits `tracing` events; nothing is printed until the
//! host installs a subscriber. [`init_tracing`] installs one from the
//! environment:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `INJEX_LOG` | filter directives; `RUST_LOG` is read when unset |
//! | `INJEX_LOG_FORMAT` | `text`, `tree` or `json` |
//! | `INJEX_QUERY_RUN_ID` | tag copied onto every `injex::resolve_json` event |
//!
//! Each public lookup opens a `lookup` span, so the `tree` format indents
//! a chain's compiles and nested lookups under the request that caused
//! them. The `json` format pairs with the `injex::resolve_json` target,
//! whose start and end events carry a query id for offline matching:
//!
//! ```bash
//! INJEX_LOG=injex_engine=trace INJEX_LOG_FORMAT=tree my-host
//! INJEX_LOG=injex::resolve_json=trace INJEX_LOG_FORMAT=json my-host 2> lookups.jsonl
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    /// Indented by span, via `tracing-tree`.
    Tree,
    /// One object per line.
    Json,
}

impl LogFormat {
    /// Unknown names fall back to `Text`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Filter directives, or `None` when the host asked for no logging.
fn filter_from_env() -> Option<EnvFilter> {
    match std::env::var("INJEX_LOG") {
        Ok(directives) => Some(EnvFilter::builder().parse_lossy(directives)),
        Err(_) => std::env::var("RUST_LOG")
            .is_ok()
            .then(EnvFilter::from_default_env),
    }
}

/// Install a stderr subscriber configured from the environment.
///
/// A no-op when no filter variable is set or a global subscriber already
/// exists.
pub fn init_tracing() {
    let Some(filter) = filter_from_env() else {
        return;
    };
    let format = LogFormat::parse(&std::env::var("INJEX_LOG_FORMAT").unwrap_or_default());
    let registry = Registry::default().with(filter);
    let installed = match format {
        LogFormat::Tree => registry
            .with(
                tracing_tree::HierarchicalLayer::default()
                    .with_indent_amount(2)
                    .with_indent_lines(true)
                    .with_deferred_spans(true)
                    .with_targets(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!(?format, "host already installed a subscriber");
    }
}
