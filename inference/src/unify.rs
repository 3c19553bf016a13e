/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Robinson-style unification without occurs-check, adapted for two-sided
//! contexts. Both sides are resolved through their binding chains first;
//! unbound variables bind to the other side, literals compare by equality,
//! tuples match element-wise with residual tails binding to rest variables.
//! Failure is an ordinary `false`; callers bracket attempts with
//! `mark(save_all)` and undo on failure so no partial bindings leak.

use std::rc::Rc;

use shared::dictionary::Dictionary;
use shared::error::InferenceError;
use shared::pattern::Pattern;
use shared::value::Value;

use crate::context::{Binding, ContextArena, CtxHandle, DataMemo, Resolved};

/// Resolve a pattern one level: variables chase their binding chain,
/// anything else stays put.
pub fn resolve(arena: &ContextArena, pat: &Rc<Pattern>, ctx: CtxHandle) -> Resolved {
    match &**pat {
        Pattern::Variable(v) | Pattern::Anonymous(v) => arena.lookup_var(ctx, *v),
        _ => Resolved::Pattern(pat.clone(), ctx),
    }
}

/// Unify a pattern (in `pat_ctx`) against ground data, binding variables
/// under the control of `ctrl`.
pub fn match_data(
    arena: &mut ContextArena,
    ctrl: CtxHandle,
    pat: &Rc<Pattern>,
    pat_ctx: CtxHandle,
    data: &Value,
) -> bool {
    match &**pat {
        Pattern::Literal(v) => v == data,
        Pattern::Anonymous(_) => true,
        Pattern::Variable(v) => match arena.lookup_var(pat_ctx, *v) {
            Resolved::Unbound(v2, c2) => {
                arena.bind(ctrl, v2, c2, Binding::Data(data.clone()));
                true
            }
            Resolved::Data(d) => &d == data,
            Resolved::Pattern(p, c) => match_data(arena, ctrl, &p, c, data),
            Resolved::Plan(_) => false,
        },
        Pattern::Tuple { head, rest } => {
            let Value::Tuple(items) = data else {
                return false;
            };
            match rest {
                None => {
                    if items.len() != head.len() {
                        return false;
                    }
                }
                Some(_) => {
                    if items.len() < head.len() {
                        return false;
                    }
                }
            }
            for (p, d) in head.iter().zip(items.iter()) {
                if !match_data(arena, ctrl, p, pat_ctx, d) {
                    return false;
                }
            }
            if let Some(rest) = rest {
                let tail = Value::Tuple(items[head.len()..].to_vec());
                return match_data(arena, ctrl, rest, pat_ctx, &tail);
            }
            true
        }
    }
}

/// Two-sided unification of `a` (in `a_ctx`) with `b` (in `b_ctx`), binding
/// under the control of `ctrl`.
pub fn match_pattern(
    arena: &mut ContextArena,
    ctrl: CtxHandle,
    a: &Rc<Pattern>,
    a_ctx: CtxHandle,
    b: &Rc<Pattern>,
    b_ctx: CtxHandle,
) -> bool {
    match &**a {
        Pattern::Literal(v) => match_data(arena, ctrl, b, b_ctx, v),
        Pattern::Anonymous(_) => true,
        Pattern::Variable(v) => match arena.lookup_var(a_ctx, *v) {
            Resolved::Unbound(v2, c2) => {
                if matches!(&**b, Pattern::Anonymous(_)) {
                    return true;
                }
                arena.bind(ctrl, v2, c2, Binding::Pattern(b.clone(), b_ctx));
                true
            }
            Resolved::Data(d) => match_data(arena, ctrl, b, b_ctx, &d),
            Resolved::Pattern(p, c) => match_pattern(arena, ctrl, &p, c, b, b_ctx),
            Resolved::Plan(_) => false,
        },
        Pattern::Tuple { .. } => match &**b {
            Pattern::Literal(v) => match_data(arena, ctrl, a, a_ctx, v),
            Pattern::Anonymous(_) => true,
            Pattern::Variable(v) => match arena.lookup_var(b_ctx, *v) {
                Resolved::Unbound(v2, c2) => {
                    arena.bind(ctrl, v2, c2, Binding::Pattern(a.clone(), a_ctx));
                    true
                }
                Resolved::Data(d) => match_data(arena, ctrl, a, a_ctx, &d),
                Resolved::Pattern(p, c) => match_pattern(arena, ctrl, a, a_ctx, &p, c),
                Resolved::Plan(_) => false,
            },
            Pattern::Tuple { .. } => match_tuples(arena, ctrl, a, a_ctx, b, b_ctx),
        },
    }
}

fn match_tuples(
    arena: &mut ContextArena,
    ctrl: CtxHandle,
    a: &Rc<Pattern>,
    a_ctx: CtxHandle,
    b: &Rc<Pattern>,
    b_ctx: CtxHandle,
) -> bool {
    let (Pattern::Tuple {
        head: a_head,
        rest: a_rest,
    }, Pattern::Tuple {
        head: b_head,
        rest: b_rest,
    }) = (&**a, &**b)
    else {
        unreachable!("match_tuples called on non-tuples");
    };

    let k = a_head.len().min(b_head.len());
    for (pa, pb) in a_head.iter().take(k).zip(b_head.iter().take(k)) {
        if !match_pattern(arena, ctrl, pa, a_ctx, pb, b_ctx) {
            return false;
        }
    }

    if a_head.len() > k {
        // a is longer; its residue binds to b's rest variable
        let Some(b_rest) = b_rest else {
            return false;
        };
        let residue = Rc::new(Pattern::Tuple {
            head: a_head[k..].to_vec(),
            rest: a_rest.clone(),
        });
        return match_pattern(arena, ctrl, b_rest, b_ctx, &residue, a_ctx);
    }
    if b_head.len() > k {
        let Some(a_rest) = a_rest else {
            return false;
        };
        let residue = Rc::new(Pattern::Tuple {
            head: b_head[k..].to_vec(),
            rest: b_rest.clone(),
        });
        return match_pattern(arena, ctrl, a_rest, a_ctx, &residue, b_ctx);
    }

    match (a_rest, b_rest) {
        (None, None) => true,
        (Some(ra), None) => match_data(arena, ctrl, ra, a_ctx, &Value::Tuple(Vec::new())),
        (None, Some(rb)) => match_data(arena, ctrl, rb, b_ctx, &Value::Tuple(Vec::new())),
        (Some(ra), Some(rb)) => match_pattern(arena, ctrl, ra, a_ctx, rb, b_ctx),
    }
}

/// Fully resolve a pattern to ground data. Unbound variables render as
/// `$name` sentinels when `allow_vars`, otherwise fail.
pub fn as_data(
    arena: &ContextArena,
    pat: &Rc<Pattern>,
    ctx: CtxHandle,
    allow_vars: bool,
    memo: &mut DataMemo,
    vars: &Dictionary,
) -> Result<Value, InferenceError> {
    match &**pat {
        Pattern::Literal(v) => Ok(v.clone()),
        Pattern::Variable(v) => arena.lookup_data(ctx, *v, allow_vars, memo, vars),
        Pattern::Anonymous(v) => {
            if allow_vars {
                Ok(Value::Str(format!(
                    "${}",
                    vars.decode(*v).unwrap_or("?")
                )))
            } else {
                Err(InferenceError::UnboundVariable {
                    var: vars.decode(*v).unwrap_or("?").to_string(),
                })
            }
        }
        Pattern::Tuple { head, rest } => {
            let mut items = Vec::with_capacity(head.len());
            for p in head {
                items.push(as_data(arena, p, ctx, allow_vars, memo, vars)?);
            }
            if let Some(rest) = rest {
                match as_data(arena, rest, ctx, allow_vars, memo, vars)? {
                    Value::Tuple(tail) => items.extend(tail),
                    other => {
                        return Err(InferenceError::InvalidGoal {
                            detail: format!("rest variable bound to non-tuple {}", other),
                        })
                    }
                }
            }
            Ok(Value::Tuple(items))
        }
    }
}

/// True iff no free variables remain anywhere in the pattern.
pub fn is_data(arena: &ContextArena, pat: &Rc<Pattern>, ctx: CtxHandle) -> bool {
    match &**pat {
        Pattern::Literal(_) => true,
        Pattern::Anonymous(_) => false,
        Pattern::Variable(v) => match arena.lookup_var(ctx, *v) {
            Resolved::Unbound(..) => false,
            Resolved::Data(_) | Resolved::Plan(_) => true,
            Resolved::Pattern(p, c) => is_data(arena, &p, c),
        },
        Pattern::Tuple { head, rest } => {
            head.iter().all(|p| is_data(arena, p, ctx))
                && rest.as_ref().map_or(true, |r| is_data(arena, r, ctx))
        }
    }
}
