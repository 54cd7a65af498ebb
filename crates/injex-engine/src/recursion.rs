//! Recursion guard for resolution chains.
//!
//! `RecursionGuard` combines three safety mechanisms:
//! 1. **Cycle detection** via a visiting set (`FxHashSet<K>`)
//! 2. **Depth limiting** so runaway delegation fails instead of overflowing
//! 3. **Iteration bounding** across one whole chain
//!
//! Unlike a bare visiting set the guard also keeps the entered keys in
//! order, so a cycle can be reported as the full `a -> b -> a` path.
//!
//! # Safety
//!
//! - **Debug leak detection**: In debug builds, dropping a guard with active
//!   entries triggers a panic, catching forgotten `leave()` calls.
//! - **Debug out-of-order detection**: leaving a key that is not the
//!   innermost entry panics in debug builds.

use injex_common::limits;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// RecursionProfile
// ---------------------------------------------------------------------------

/// Named recursion limit presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionProfile {
    /// One resolution chain: nested lookups through delegation, factories
    /// and multibind contributions.
    ///
    /// depth = 256, iterations = 100,000
    Resolution,

    /// Producer descriptor compilation. Depth only.
    ///
    /// depth = 64
    DescriptorCompile,

    /// Custom limits for one-off or test scenarios.
    Custom { max_depth: u32, max_iterations: u32 },
}

impl RecursionProfile {
    pub const fn max_depth(self) -> u32 {
        match self {
            Self::Resolution => limits::MAX_RESOLUTION_DEPTH,
            Self::DescriptorCompile => limits::MAX_DESCRIPTOR_DEPTH,
            Self::Custom { max_depth, .. } => max_depth,
        }
    }

    pub const fn max_iterations(self) -> u32 {
        match self {
            Self::Resolution | Self::DescriptorCompile => limits::MAX_RESOLUTION_STEPS,
            Self::Custom { max_iterations, .. } => max_iterations,
        }
    }
}

// ---------------------------------------------------------------------------
// RecursionResult
// ---------------------------------------------------------------------------

/// Result of attempting to enter a recursive computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionResult {
    Entered,
    /// This key is already being visited.
    Cycle,
    DepthExceeded,
    IterationExceeded,
}

// ---------------------------------------------------------------------------
// RecursionGuard
// ---------------------------------------------------------------------------

/// Ordered stack of keys being resolved on one chain.
///
/// ```ignore
/// let mut guard = RecursionGuard::with_profile(RecursionProfile::Resolution);
///
/// match guard.enter(key) {
///     RecursionResult::Entered => {
///         let result = resolve(key);
///         guard.leave(key);
///         result
///     }
///     RecursionResult::Cycle => Err(cycle(guard.path(), key)),
///     RecursionResult::DepthExceeded
///     | RecursionResult::IterationExceeded => Err(too_deep(key)),
/// }
/// ```
pub struct RecursionGuard<K: Hash + Eq + Copy> {
    visiting: FxHashSet<K>,
    path: SmallVec<[K; limits::RESOLUTION_STACK_INLINE]>,
    iterations: u32,
    max_depth: u32,
    max_iterations: u32,
}

impl<K: Hash + Eq + Copy> RecursionGuard<K> {
    pub fn new(max_depth: u32, max_iterations: u32) -> Self {
        Self {
            visiting: FxHashSet::default(),
            path: SmallVec::new(),
            iterations: 0,
            max_depth,
            max_iterations,
        }
    }

    pub fn with_profile(profile: RecursionProfile) -> Self {
        Self::new(profile.max_depth(), profile.max_iterations())
    }

    // -----------------------------------------------------------------------
    // Core enter / leave API
    // -----------------------------------------------------------------------

    /// Try to enter `key`. On [`RecursionResult::Entered`] the caller must
    /// [`leave`](Self::leave) with the same key when done.
    pub fn enter(&mut self, key: K) -> RecursionResult {
        self.iterations = self.iterations.saturating_add(1);

        if self.iterations > self.max_iterations {
            return RecursionResult::IterationExceeded;
        }
        if self.visiting.contains(&key) {
            return RecursionResult::Cycle;
        }
        if self.path.len() as u32 >= self.max_depth {
            return RecursionResult::DepthExceeded;
        }

        self.visiting.insert(key);
        self.path.push(key);
        RecursionResult::Entered
    }

    /// Leave the innermost entry, which must be `key`.
    pub fn leave(&mut self, key: K) {
        let was_present = self.visiting.remove(&key);
        debug_assert!(
            was_present,
            "RecursionGuard::leave() called with a key that is not in the visiting set. \
             This indicates a double-leave or a leave without a matching enter()."
        );

        let top = self.path.pop();
        debug_assert!(
            top == Some(key),
            "RecursionGuard::leave() called out of order."
        );
    }

    /// Entered keys, outermost first.
    #[inline]
    pub fn path(&self) -> &[K] {
        &self.path
    }

    /// The path from the first occurrence of `key` to the innermost entry,
    /// with `key` appended to close the loop.
    pub fn cycle_path(&self, key: K) -> Vec<K> {
        let start = self.path.iter().position(|k| *k == key).unwrap_or(0);
        let mut cycle: Vec<K> = self.path[start..].to_vec();
        cycle.push(key);
        cycle
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.path.len() as u32
    }

    #[inline]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    #[inline]
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }
}

#[cfg(debug_assertions)]
impl<K: Hash + Eq + Copy> Drop for RecursionGuard<K> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.visiting.is_empty() {
            panic!(
                "RecursionGuard dropped with {} active entries still in the visiting set. \
                 This indicates leaked enter() calls without matching leave() calls.",
                self.visiting.len(),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// DepthCounter
// ---------------------------------------------------------------------------

/// Depth-only guard, for trees where revisiting the same node is fine.
///
/// ```ignore
/// let mut counter = DepthCounter::with_profile(RecursionProfile::DescriptorCompile);
///
/// if !counter.enter() {
///     return Err(too_deep());
/// }
/// let result = compile_children(&mut counter);
/// counter.leave();
/// result
/// ```
pub struct DepthCounter {
    depth: u32,
    max_depth: u32,
}

impl DepthCounter {
    pub fn new(max_depth: u32) -> Self {
        Self {
            depth: 0,
            max_depth,
        }
    }

    pub fn with_profile(profile: RecursionProfile) -> Self {
        Self::new(profile.max_depth())
    }

    /// Returns `false` once the limit is reached; do not `leave()` then.
    #[inline]
    pub fn enter(&mut self) -> bool {
        if self.depth >= self.max_depth {
            return false;
        }
        self.depth += 1;
        true
    }

    #[inline]
    pub fn leave(&mut self) {
        debug_assert!(
            self.depth > 0,
            "DepthCounter::leave() called at depth 0. \
             This indicates a leave without a matching enter()."
        );
        self.depth = self.depth.saturating_sub(1);
    }

    #[inline]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }
}

#[cfg(debug_assertions)]
impl Drop for DepthCounter {
    fn drop(&mut self) {
        if !std::thread::panicking() && self.depth > 0 {
            panic!(
                "DepthCounter dropped with depth {}. \
                 This indicates leaked enter() calls without matching leave() calls.",
                self.depth,
            );
        }
    }
}

#[cfg(test)]
#[path = "../tests/recursion_tests.rs"]
mod tests;
