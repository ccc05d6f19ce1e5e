//! Overload resolution for function calls.
//!
//! Selects the best candidate from a set of same-named functions based on
//! the argument types at the call site:
//!
//! 1. Filter candidates by argument count
//! 2. Find an implicit conversion for every argument
//! 3. Rank viable candidates by total conversion cost
//! 4. Report a tie for the lowest cost as ambiguous

use lantern_core::{CompilationError, Span, TypeDesc};

use crate::conversion::{Conversion, find_conversion};
use crate::entities::{MethodId, Registry, TypeId};

/// A candidate that accepts the arguments.
#[derive(Debug, Clone)]
pub struct OverloadMatch {
    pub method: MethodId,
    /// Conversion per argument, in parameter order.
    pub conversions: Vec<Conversion>,
    pub total_cost: u32,
}

/// Resolve an overloaded call.
///
/// Fails with `NoMatchingOverload` when no candidate accepts the arguments
/// and with `AmbiguousOverload` when several accept them at the same cost.
pub fn resolve_overload(
    registry: &Registry,
    candidates: &[MethodId],
    args: &[TypeDesc],
    name: &str,
    span: Span,
) -> Result<OverloadMatch, CompilationError> {
    let mut viable: Vec<OverloadMatch> = candidates
        .iter()
        .filter_map(|id| try_candidate(registry, *id, args))
        .collect();
    viable.sort_by_key(|m| m.total_cost);

    match viable.as_slice() {
        [] => Err(CompilationError::NoMatchingOverload {
            name: name.to_string(),
            args: describe(args),
            span,
        }),
        [best, second, ..] if best.total_cost == second.total_cost => Err(CompilationError::AmbiguousOverload {
            name: name.to_string(),
            args: describe(args),
            span,
        }),
        [best, ..] => Ok(best.clone()),
    }
}

/// Find an operator overload, treating every failure as "no overload".
///
/// Operator methods are static methods of the left operand's type. An
/// exact signature match is the only zero-cost candidate, so it is taken
/// without ranking.
pub fn try_overload(registry: &Registry, owner: TypeId, name: &str, args: &[TypeDesc]) -> Option<OverloadMatch> {
    if let Some(exact) = registry.find_method(owner, name, args) {
        return try_candidate(registry, exact, args);
    }
    let candidates = registry.methods_named(owner, name);
    if candidates.is_empty() {
        return None;
    }
    resolve_overload(registry, &candidates, args, name, Span::default()).ok()
}

fn try_candidate(registry: &Registry, id: MethodId, args: &[TypeDesc]) -> Option<OverloadMatch> {
    let params = registry.method(id).param_types()?;
    if params.len() != args.len() {
        return None;
    }
    let conversions = args
        .iter()
        .zip(&params)
        .map(|(arg, param)| find_conversion(arg, param, registry))
        .collect::<Option<Vec<_>>>()?;
    let total_cost = conversions.iter().map(Conversion::cost).sum();
    Some(OverloadMatch {
        method: id,
        conversions,
        total_cost,
    })
}

fn describe(args: &[TypeDesc]) -> String {
    args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
