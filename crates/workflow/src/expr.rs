// SPDX-License-Identifier: MIT

//! Bounded condition evaluator (spec §4.G "Conditions" / §9 redesign note:
//! never `eval` arbitrary source). `Condition::Expression` is restricted to
//! a single chain of `&&`- or `||`-joined comparisons over dotted paths into
//! the workflow context -- never both operators in the same expression, and
//! never arbitrary code.

use crate::handlers::HandlerRegistry;
use regex::Regex;
use std::sync::OnceLock;
use swarm_core::{ComparisonOp, Condition, SwarmError, WorkflowContext};

fn clause_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\S+)\s*(==|!=|>=|<=|>|<|contains|starts_with|ends_with)\s*(.+?)\s*$")
            .expect("static clause pattern is valid")
    })
}

/// Resolve a dotted path (`variables.foo.bar`) against the three context
/// maps, trying `variables`, then `outputs`, then `inputs`, then
/// `node_outputs`. A path with no recognized root is looked up directly in
/// `variables` (so `foo` is shorthand for `variables.foo`).
fn resolve_path<'a>(ctx: &'a WorkflowContext, path: &str) -> Option<&'a serde_json::Value> {
    let mut parts = path.split('.');
    let (root, rest): (&str, Vec<&str>) = match parts.next() {
        Some(first) if matches!(first, "variables" | "outputs" | "inputs" | "node_outputs") => {
            (first, parts.collect())
        }
        Some(first) => ("variables", std::iter::once(first).chain(parts).collect()),
        None => return None,
    };
    let mut current = match root {
        "variables" => ctx.variables.get(*rest.first()?)?,
        "outputs" => ctx.outputs.get(*rest.first()?)?,
        "inputs" => ctx.inputs.get(*rest.first()?)?,
        "node_outputs" => ctx.node_outputs.get(*rest.first()?)?,
        _ => return None,
    };
    for key in rest.iter().skip(1) {
        current = current.get(key)?;
    }
    Some(current)
}

/// A clause's right-hand side is a path if it resolves to something in the
/// context, otherwise it's taken as a JSON literal, falling back to a bare
/// (unquoted) string.
fn resolve_value<'a>(ctx: &'a WorkflowContext, token: &'a str) -> std::borrow::Cow<'a, serde_json::Value> {
    if let Some(v) = resolve_path(ctx, token) {
        return std::borrow::Cow::Borrowed(v);
    }
    match serde_json::from_str::<serde_json::Value>(token) {
        Ok(v) => std::borrow::Cow::Owned(v),
        Err(_) => std::borrow::Cow::Owned(serde_json::Value::String(token.trim_matches('"').to_string())),
    }
}

fn compare(left: &serde_json::Value, op: &str, right: &serde_json::Value) -> bool {
    match op {
        "==" => left == right,
        "!=" => left != right,
        "contains" => match (left.as_str(), right.as_str()) {
            (Some(l), Some(r)) => l.contains(r),
            _ => left.as_array().is_some_and(|a| a.contains(right)),
        },
        "starts_with" => matches!((left.as_str(), right.as_str()), (Some(l), Some(r)) if l.starts_with(r)),
        "ends_with" => matches!((left.as_str(), right.as_str()), (Some(l), Some(r)) if l.ends_with(r)),
        ">" | "<" | ">=" | "<=" => {
            let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) else { return false };
            match op {
                ">" => l > r,
                "<" => l < r,
                ">=" => l >= r,
                "<=" => l <= r,
                _ => unreachable!(),
            }
        }
        _ => false,
    }
}

fn evaluate_clause(ctx: &WorkflowContext, clause: &str) -> Result<bool, SwarmError> {
    if clause.trim() == "true" {
        return Ok(true);
    }
    if clause.trim() == "false" {
        return Ok(false);
    }
    let caps = clause_regex()
        .captures(clause)
        .ok_or_else(|| SwarmError::Validation(format!("unparseable condition clause: {clause}")))?;
    let left = resolve_value(ctx, &caps[1]);
    let right = resolve_value(ctx, &caps[3]);
    Ok(compare(&left, &caps[2], &right))
}

/// Evaluate a bounded `Condition::Expression` string: a single chain of `&&`
/// or `||` joined clauses (mixing both in one expression is rejected as a
/// validation error, keeping precedence unambiguous without a full parser).
pub fn evaluate_expression(expr: &str) -> impl Fn(&WorkflowContext) -> Result<bool, SwarmError> + '_ {
    move |ctx| {
        let has_and = expr.contains("&&");
        let has_or = expr.contains("||");
        if has_and && has_or {
            return Err(SwarmError::Validation(format!(
                "expression mixes && and || in one clause chain, not supported: {expr}"
            )));
        }
        if has_or {
            for clause in expr.split("||") {
                if evaluate_clause(ctx, clause)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }
        for clause in expr.split("&&") {
            if !evaluate_clause(ctx, clause)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Evaluate any of the three `Condition` forms against `ctx`.
pub fn evaluate_condition(condition: &Condition, ctx: &WorkflowContext, handlers: &HandlerRegistry) -> Result<bool, SwarmError> {
    match condition {
        Condition::Expression { expr } => evaluate_expression(expr)(ctx),
        Condition::Comparison { left, op, right } => {
            let lv = resolve_value(ctx, left);
            let rv = resolve_value(ctx, right);
            Ok(compare_op(&lv, *op, &rv))
        }
        Condition::Function { handler_id } => handlers.call_predicate(handler_id, ctx),
    }
}

fn compare_op(left: &serde_json::Value, op: ComparisonOp, right: &serde_json::Value) -> bool {
    let token = match op {
        ComparisonOp::Eq => "==",
        ComparisonOp::Ne => "!=",
        ComparisonOp::Gt => ">",
        ComparisonOp::Lt => "<",
        ComparisonOp::Ge => ">=",
        ComparisonOp::Le => "<=",
        ComparisonOp::Contains => "contains",
        ComparisonOp::StartsWith => "starts_with",
        ComparisonOp::EndsWith => "ends_with",
        ComparisonOp::Matches => {
            return match (left.as_str(), right.as_str()) {
                (Some(l), Some(r)) => Regex::new(r).map(|re| re.is_match(l)).unwrap_or(false),
                _ => false,
            };
        }
    };
    compare(left, token, right)
}
