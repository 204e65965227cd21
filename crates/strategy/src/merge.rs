//! Strategy merge: child hooks win, parent hooks fill the gaps.

use nebula_core::{Hook, Strategy};

/// Merge `child` over `parent`: for every hook, the result is the child's
/// hook if non-null, else the parent's.
///
/// The result's name is copied from `parent`, matching the design
/// document's "name is copied from parent unless the input has already
/// been merged." Associativity (§8) only constrains hooks, not names, so
/// callers folding with [`merge_chain`] should not depend on the
/// intermediate names this function assigns.
#[must_use]
pub fn merge(child: &Strategy, parent: &Strategy) -> Strategy {
    let mut result = Strategy::empty().with_name(parent.name().map(str::to_string));
    for hook in Hook::ALL {
        let chosen = child.hook(hook).or_else(|| parent.hook(hook)).cloned();
        result = result.with_hook(hook, chosen);
    }
    result
}

/// Left-fold merge over `child` and a sequence of parents: equivalent to
/// `merge(merge(child, parents[0]), parents[1])...` — callers read the
/// parent list left to right, each successive parent only filling hooks
/// still missing after folding in everything to its left.
///
/// Internal folds strip the running name (the design document's "internal
/// merges strip the name"); only the final merge against the last parent
/// keeps a name, copied from that parent.
#[must_use]
pub fn merge_chain(child: &Strategy, parents: &[Strategy]) -> Strategy {
    let mut acc = child.clone();
    let last = parents.len().saturating_sub(1);
    for (i, parent) in parents.iter().enumerate() {
        let merged = merge(&acc, parent);
        acc = if i == last {
            merged
        } else {
            merged.with_name(None)
        };
    }
    acc
}

/// `true` iff every hook of `strategy` is non-null.
#[must_use]
pub fn is_complete(strategy: &Strategy) -> bool {
    strategy.is_complete()
}

/// Require `strategy` to be complete, returning `strategy_incomplete`
/// naming the first missing hook otherwise.
///
/// # Errors
/// Returns [`nebula_error::Error::StrategyIncomplete`] if any hook is
/// `None`.
pub fn require_complete(strategy: &Strategy) -> nebula_error::Result<()> {
    match strategy.first_missing_hook() {
        Some(hook) => Err(nebula_error::Error::strategy_incomplete(hook.as_str())),
        None => Ok(()),
    }
}
