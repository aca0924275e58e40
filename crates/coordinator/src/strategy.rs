// SPDX-License-Identifier: MIT

//! Coordination strategies and selection (spec §4.E "Coordination
//! strategies" / "Strategy selection").
//!
//! **Open Question resolved here (see `DESIGN.md`):** the source text mixes
//! two complexity scales -- a `> 10` / `<= 5` count-style threshold for
//! Hierarchical/Flat selection, and the `[0,1]` normalized score used for
//! goal decomposition (spec §4.E "Goal decomposition"). No count-style
//! bound is defined anywhere in the spec, so this module reuses the
//! normalized `[0,1]` score for both, picking thresholds (`0.7` / `0.3`)
//! consistent with the decomposition module's own "complex" cutoff.

use swarm_core::Formation;

#[derive(Debug, Clone, Copy)]
pub struct StrategyContext {
    pub team_size: usize,
    /// `[0,1]` normalized goal complexity (see module doc).
    pub complexity: f64,
    pub unique_capabilities: usize,
}

pub trait Strategy: Send + Sync {
    fn formation(&self) -> Formation;
    fn evaluate(&self, ctx: &StrategyContext) -> f64;
}

pub struct HierarchicalStrategy;
impl Strategy for HierarchicalStrategy {
    fn formation(&self) -> Formation {
        Formation::Hierarchical
    }
    fn evaluate(&self, ctx: &StrategyContext) -> f64 {
        if ctx.team_size > 5 && ctx.complexity > 0.7 {
            0.9
        } else {
            -0.1
        }
    }
}

pub struct FlatStrategy;
impl Strategy for FlatStrategy {
    fn formation(&self) -> Formation {
        Formation::Flat
    }
    fn evaluate(&self, ctx: &StrategyContext) -> f64 {
        if ctx.team_size <= 5 && ctx.complexity <= 0.3 {
            0.85
        } else {
            -0.1
        }
    }
}

pub struct MatrixStrategy;
impl Strategy for MatrixStrategy {
    fn formation(&self) -> Formation {
        Formation::Matrix
    }
    fn evaluate(&self, ctx: &StrategyContext) -> f64 {
        if ctx.unique_capabilities > 3 {
            0.8
        } else {
            -0.1
        }
    }
}

/// Constant mid-score baseline, the designated fallback (spec §4.E).
pub struct DynamicStrategy;
impl Strategy for DynamicStrategy {
    fn formation(&self) -> Formation {
        Formation::Dynamic
    }
    fn evaluate(&self, _ctx: &StrategyContext) -> f64 {
        0.5
    }
}

pub fn built_in_strategies() -> Vec<Box<dyn Strategy>> {
    vec![Box::new(HierarchicalStrategy), Box::new(FlatStrategy), Box::new(MatrixStrategy), Box::new(DynamicStrategy)]
}

/// Evaluate all built-ins on `ctx` and pick the highest score, ties broken
/// by declared order. If every score is `<= 0`, fall back to
/// `declared_formation` (the team's own formation field); if that is also
/// absent, fall back to `Dynamic` (spec §4.E "Strategy selection").
pub fn select_strategy(ctx: &StrategyContext, declared_formation: Option<Formation>) -> Formation {
    let strategies = built_in_strategies();
    let mut best: Option<(Formation, f64)> = None;
    for formation in Formation::DECLARED_ORDER {
        let strategy = strategies.iter().find(|s| s.formation() == formation).expect("built-in covers every formation");
        let score = strategy.evaluate(ctx);
        if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
            best = Some((formation, score));
        }
    }
    match best {
        Some((formation, score)) if score > 0.0 => formation,
        _ => declared_formation.unwrap_or(Formation::Dynamic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_complex_team_picks_hierarchical() {
        let ctx = StrategyContext { team_size: 8, complexity: 0.9, unique_capabilities: 2 };
        assert_eq!(select_strategy(&ctx, None), Formation::Hierarchical);
    }

    #[test]
    fn small_simple_team_picks_flat() {
        let ctx = StrategyContext { team_size: 3, complexity: 0.1, unique_capabilities: 1 };
        assert_eq!(select_strategy(&ctx, None), Formation::Flat);
    }

    #[test]
    fn diverse_capabilities_pick_matrix() {
        let ctx = StrategyContext { team_size: 4, complexity: 0.5, unique_capabilities: 5 };
        assert_eq!(select_strategy(&ctx, None), Formation::Matrix);
    }

    #[test]
    fn ambiguous_context_falls_back_to_dynamic() {
        let ctx = StrategyContext { team_size: 4, complexity: 0.5, unique_capabilities: 2 };
        assert_eq!(select_strategy(&ctx, None), Formation::Dynamic);
    }

    #[test]
    fn declared_order_breaks_ties() {
        // Hierarchical and Flat can never both score positively (team_size
        // can't be both >5 and <=5), so construct a tie between Matrix and
        // a manually-boosted Dynamic is not possible with built-ins; this
        // instead verifies Hierarchical wins over Matrix when both qualify.
        let ctx = StrategyContext { team_size: 8, complexity: 0.9, unique_capabilities: 5 };
        assert_eq!(select_strategy(&ctx, None), Formation::Hierarchical);
    }
}
