//! Centralized limits and thresholds for the resolution engine.
//!
//! Every bound that protects the engine from runaway recursion lives here so
//! that `InjectorOptions` defaults and `RecursionProfile` presets agree.
//!
//! # Categories
//!
//! - **Recursion Depths**: nested lookups and descriptor nesting
//! - **Capacity Limits**: pre-allocation sizes

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum number of keys on one resolution chain.
///
/// Cycle detection already rejects a key that re-enters its own chain. This
/// limit catches the other failure mode: an acyclic but unbounded chain,
/// e.g. an assisted factory that looks up a freshly named key on every call.
///
/// ```text
/// service -> repository -> pool -> config -> ... (256 distinct keys deep)
/// ```
pub const MAX_RESOLUTION_DEPTH: u32 = 256;

/// Maximum nesting depth of a producer descriptor tree.
///
/// Descriptor trees are compiled recursively, one frame per node. Realistic
/// trees are a handful of nodes deep (`NonCaching(ProducerOfProducer(...))`);
/// anything deeper than this is treated as a malformed binding.
pub const MAX_DESCRIPTOR_DEPTH: u32 = 64;

/// Total enter attempts allowed on one resolution chain.
///
/// Bounds work for a single top-level lookup that fans out into many
/// aggregations (multibindings of multibindings).
pub const MAX_RESOLUTION_STEPS: u32 = 100_000;

/// Maximum links followed when walking the cross-chain wait-for graph.
///
/// A chain about to block on an entry another chain is compiling follows
/// "owner is waiting on entry, entry is owned by ..." links looking for
/// itself. Real wait chains are as long as the number of threads involved.
pub const MAX_WAIT_CHAIN: usize = 1024;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Inline capacity of a resolution stack before it spills to the heap.
///
/// Most chains are a few keys deep; eight covers them without allocation.
pub const RESOLUTION_STACK_INLINE: usize = 8;
