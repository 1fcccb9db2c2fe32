//! Stack selection: applies [`SelectionCriteria`] to an assembly's stacks.
//!
//! Patterns are shell globs matched against a stack's display name (e.g.
//! `Prod/*`) and, as a fallback, its artifact id. The relative order of the
//! input stacks is always preserved.

use glob::Pattern;

use crate::assembly;
use crate::error::{AssemblyError, SelectionError};
use crate::types::{CandidateDirectory, SelectionCriteria, SelectionStrategy, Stack};

/// Errors from [`select`]: either the assembly could not be loaded, or the
/// criteria could not be satisfied.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Load the assembly in `directory` and apply `criteria`.
pub fn select(
    directory: &CandidateDirectory,
    criteria: &SelectionCriteria,
) -> Result<Vec<Stack>, SelectError> {
    let stacks = assembly::load_stacks(directory.path())?;
    let selected = apply(stacks, criteria)?;
    tracing::debug!(
        "{}: selected {} stack(s) with strategy {}",
        directory,
        selected.len(),
        criteria.strategy()
    );
    Ok(selected)
}

/// Apply `criteria` to already-loaded stacks.
pub fn apply(stacks: Vec<Stack>, criteria: &SelectionCriteria) -> Result<Vec<Stack>, SelectionError> {
    let strategy = criteria.strategy();
    match strategy {
        SelectionStrategy::AllStacks => Ok(stacks),
        SelectionStrategy::MainAssembly => {
            let top: Vec<Stack> = stacks.into_iter().filter(|s| s.top_level).collect();
            if top.is_empty() {
                return Err(SelectionError::EmptyMainAssembly);
            }
            Ok(top)
        }
        SelectionStrategy::OnlySingle => {
            let top: Vec<Stack> = stacks.into_iter().filter(|s| s.top_level).collect();
            if top.len() != 1 {
                return Err(not_single(strategy, &top));
            }
            Ok(top)
        }
        SelectionStrategy::PatternMatch
        | SelectionStrategy::PatternMustMatch
        | SelectionStrategy::PatternMustMatchSingle => {
            let patterns = compile(criteria.patterns())?;
            let matched: Vec<Stack> = stacks
                .into_iter()
                .filter(|stack| matches_any(&patterns, stack))
                .collect();

            match strategy {
                SelectionStrategy::PatternMustMatch if matched.is_empty() => {
                    Err(SelectionError::NoMatch {
                        patterns: criteria.patterns().to_vec(),
                        strategy,
                    })
                }
                SelectionStrategy::PatternMustMatchSingle if matched.is_empty() => {
                    Err(SelectionError::NoMatch {
                        patterns: criteria.patterns().to_vec(),
                        strategy,
                    })
                }
                SelectionStrategy::PatternMustMatchSingle if matched.len() > 1 => {
                    Err(not_single(strategy, &matched))
                }
                _ => Ok(matched),
            }
        }
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, SelectionError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| SelectionError::InvalidPattern {
                pattern: p.clone(),
                message: e.msg.to_string(),
            })
        })
        .collect()
}

fn matches_any(patterns: &[Pattern], stack: &Stack) -> bool {
    patterns
        .iter()
        .any(|p| p.matches(&stack.display_name) || p.matches(&stack.id.0))
}

fn not_single(strategy: SelectionStrategy, stacks: &[Stack]) -> SelectionError {
    let names: Vec<&str> = stacks.iter().map(|s| s.display_name.as_str()).collect();
    SelectionError::NotSingle {
        strategy,
        found: stacks.len(),
        stacks: names.join(", "),
    }
}
