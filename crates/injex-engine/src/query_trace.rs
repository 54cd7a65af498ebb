//! Structured resolution tracing for injector entry points.
//!
//! Events use target `injex::resolve_json` and are intended to be consumed with:
//! `INJEX_LOG=injex::resolve_json=trace INJEX_LOG_FORMAT=json`.
//!
//! Environment:
//! - `INJEX_QUERY_RUN_ID`: optional run identifier attached to every event.

use crate::key::Key;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Level, trace};

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);
static QUERY_RUN_ID: OnceLock<String> = OnceLock::new();

#[inline]
pub(crate) fn enabled() -> bool {
    tracing::enabled!(target: "injex::resolve_json", Level::TRACE)
}

#[inline]
pub(crate) fn next_query_id() -> u64 {
    NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed)
}

#[inline]
fn run_id() -> &'static str {
    QUERY_RUN_ID
        .get_or_init(|| {
            std::env::var("INJEX_QUERY_RUN_ID").unwrap_or_else(|_| "default".to_string())
        })
        .as_str()
}

#[inline]
pub(crate) fn resolve_start(query_id: u64, op: &'static str, key: Key, depth: u32) {
    trace!(
        target: "injex::resolve_json",
        event = "resolve",
        phase = "start",
        run_id = run_id(),
        query_id,
        op,
        type_id = key.ty().0,
        name_atom = key.name().0,
        depth
    );
}

#[inline]
pub(crate) fn resolve_end(query_id: u64, op: &'static str, outcome: &'static str, cache_hit: bool) {
    trace!(
        target: "injex::resolve_json",
        event = "resolve",
        phase = "end",
        run_id = run_id(),
        query_id,
        op,
        outcome,
        cache_hit
    );
}

#[inline]
pub(crate) fn compiled(key: Key, binding_id: u32, kind: &'static str) {
    trace!(
        target: "injex::resolve_json",
        event = "compile",
        run_id = run_id(),
        type_id = key.ty().0,
        name_atom = key.name().0,
        binding_id,
        kind
    );
}
