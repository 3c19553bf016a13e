/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Binding contexts with a shallow-binding undo log.
//!
//! Each rule invocation gets a fresh context for its own variables. A
//! binding made on behalf of another context (the caller's variables bound
//! while proving a subgoal) is recorded in the *controlling* context's undo
//! list, so `done()` on the controlling context restores every other
//! context it touched. Contexts live in an arena and are addressed by
//! integer handle; release is LIFO, slots are reused through a free list,
//! and `reset()` drops the whole arena at once.

use std::rc::Rc;

use log::trace;
use rustc_hash::FxHashMap;
use shared::dictionary::Dictionary;
use shared::error::InferenceError;
use shared::pattern::{Pattern, VarId};
use shared::value::Value;

use crate::plan::{Plan, PlanArg};
use crate::unify;

pub type CtxHandle = u32;

/// Memo for one full data resolution; gives cyclic plan references a stable
/// identity within a single `as_data`/plan-assembly pass.
pub type DataMemo = FxHashMap<(VarId, CtxHandle), Value>;

/// What a variable is bound to. A `Pattern` binding carries the context its
/// pattern must be resolved in; plain data needs none.
#[derive(Debug, Clone)]
pub enum Binding {
    Data(Value),
    Pattern(Rc<Pattern>, CtxHandle),
    Plan(Rc<Plan>),
}

/// Result of chasing a binding chain.
#[derive(Debug, Clone)]
pub enum Resolved {
    Data(Value),
    /// A non-variable pattern, with the context it lives in.
    Pattern(Rc<Pattern>, CtxHandle),
    /// The chain ended at an unbound variable.
    Unbound(VarId, CtxHandle),
    Plan(Rc<Plan>),
}

#[derive(Debug, Default)]
struct Context {
    bindings: FxHashMap<VarId, Binding>,
    undo_list: Vec<(VarId, CtxHandle)>,
    save_all_undo_count: u32,
    live: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Mark {
    ctx: CtxHandle,
    undo_len: usize,
}

#[derive(Debug, Default)]
pub struct ContextArena {
    slots: Vec<Context>,
    free: Vec<CtxHandle>,
}

impl ContextArena {
    pub fn new() -> Self {
        ContextArena::default()
    }

    pub fn alloc(&mut self) -> CtxHandle {
        if let Some(h) = self.free.pop() {
            let slot = &mut self.slots[h as usize];
            slot.live = true;
            slot.save_all_undo_count = 0;
            h
        } else {
            self.slots.push(Context {
                live: true,
                ..Context::default()
            });
            (self.slots.len() - 1) as CtxHandle
        }
    }

    fn slot(&self, h: CtxHandle) -> &Context {
        let slot = &self.slots[h as usize];
        debug_assert!(slot.live);
        slot
    }

    fn slot_mut(&mut self, h: CtxHandle) -> &mut Context {
        let slot = &mut self.slots[h as usize];
        debug_assert!(slot.live);
        slot
    }

    /// Bind `var` (which lives in `var_ctx`) under the control of `ctrl`.
    /// Returns true if a new binding was created. A bind addressed at
    /// another context is delegated there and the undo entry is recorded
    /// here; binding a variable to itself is skipped. Callers never pass
    /// anonymous variables (the unifier discards those requests first).
    pub fn bind(
        &mut self,
        ctrl: CtxHandle,
        var: VarId,
        var_ctx: CtxHandle,
        value: Binding,
    ) -> bool {
        if var_ctx != ctrl {
            let created = self.bind(var_ctx, var, var_ctx, value);
            if created {
                self.slot_mut(ctrl).undo_list.push((var, var_ctx));
            }
            return created;
        }

        debug_assert!(!self.slot(ctrl).bindings.contains_key(&var));
        let stored = match value {
            Binding::Pattern(pat, pat_ctx) => match &*pat {
                Pattern::Variable(_) => match unify::resolve(self, &pat, pat_ctx) {
                    Resolved::Unbound(v2, c2) => {
                        if c2 == var_ctx && v2 == var {
                            // binding $x to $x; no binding necessary
                            return false;
                        }
                        Binding::Pattern(Pattern::variable(v2), c2)
                    }
                    Resolved::Data(d) => Binding::Data(d),
                    Resolved::Pattern(p2, c2) => Binding::Pattern(p2, c2),
                    Resolved::Plan(p) => Binding::Plan(p),
                },
                _ => Binding::Pattern(pat, pat_ctx),
            },
            other => other,
        };
        trace!("binding {} in ctx {} to {:?}", var, ctrl, stored);
        let slot = self.slot_mut(ctrl);
        slot.bindings.insert(var, stored);
        if slot.save_all_undo_count > 0 {
            slot.undo_list.push((var, ctrl));
        }
        true
    }

    /// Chase the binding chain from `var` in `ctx` until hitting data, a
    /// non-variable pattern, or an unbound variable.
    pub fn lookup_var(&self, ctx: CtxHandle, var: VarId) -> Resolved {
        let mut var = var;
        let mut ctx = ctx;
        loop {
            match self.slot(ctx).bindings.get(&var) {
                None => return Resolved::Unbound(var, ctx),
                Some(Binding::Data(v)) => return Resolved::Data(v.clone()),
                Some(Binding::Plan(p)) => return Resolved::Plan(p.clone()),
                Some(Binding::Pattern(p, c)) => match &**p {
                    Pattern::Variable(v2) | Pattern::Anonymous(v2) => {
                        var = *v2;
                        ctx = *c;
                    }
                    _ => return Resolved::Pattern(p.clone(), *c),
                },
            }
        }
    }

    /// Fully resolve a variable to ground data. Unbound variables render as
    /// `$name` sentinels when `allow_vars`, otherwise fail.
    pub fn lookup_data(
        &self,
        ctx: CtxHandle,
        var: VarId,
        allow_vars: bool,
        memo: &mut DataMemo,
        vars: &Dictionary,
    ) -> Result<Value, InferenceError> {
        if let Some(v) = memo.get(&(var, ctx)) {
            return Ok(v.clone());
        }
        let value = match self.slot(ctx).bindings.get(&var) {
            None => {
                if allow_vars {
                    return Ok(Value::Str(format!("${}", var_name(vars, var))));
                }
                return Err(InferenceError::UnboundVariable {
                    var: var_name(vars, var),
                });
            }
            Some(Binding::Data(v)) => v.clone(),
            Some(Binding::Pattern(p, c)) => {
                let p = p.clone();
                let c = *c;
                unify::as_data(self, &p, c, allow_vars, memo, vars)?
            }
            Some(Binding::Plan(_)) => {
                return Err(InferenceError::PlanError {
                    detail: format!("${} holds a plan, not term data", var_name(vars, var)),
                })
            }
        };
        memo.insert((var, ctx), value.clone());
        Ok(value)
    }

    /// Resolve a variable for plan-fragment bindings, where plan values are
    /// legal alongside ordinary data.
    pub fn lookup_plan_arg(
        &self,
        ctx: CtxHandle,
        var: VarId,
        memo: &mut DataMemo,
        vars: &Dictionary,
    ) -> Result<PlanArg, InferenceError> {
        match self.slot(ctx).bindings.get(&var) {
            None => Err(InferenceError::UnboundVariable {
                var: var_name(vars, var),
            }),
            Some(Binding::Plan(p)) => Ok(PlanArg::Plan(p.clone())),
            Some(Binding::Data(v)) => Ok(PlanArg::Value(v.clone())),
            Some(Binding::Pattern(p, c)) => match &**p {
                Pattern::Variable(v2) | Pattern::Anonymous(v2) => {
                    self.lookup_plan_arg(*c, *v2, memo, vars)
                }
                _ => {
                    let p = p.clone();
                    let c = *c;
                    unify::as_data(self, &p, c, false, memo, vars).map(PlanArg::Value)
                }
            },
        }
    }

    /// Transactional bracket for a speculative branch. With `save_all`,
    /// even self-context binds log undo entries until the matching
    /// `end_save_all_undo`.
    pub fn mark(&mut self, ctx: CtxHandle, save_all: bool) -> Mark {
        let slot = self.slot_mut(ctx);
        if save_all {
            slot.save_all_undo_count += 1;
        }
        Mark {
            ctx,
            undo_len: slot.undo_list.len(),
        }
    }

    pub fn end_save_all_undo(&mut self, ctx: CtxHandle) {
        let slot = self.slot_mut(ctx);
        debug_assert!(slot.save_all_undo_count > 0);
        slot.save_all_undo_count = slot.save_all_undo_count.saturating_sub(1);
    }

    pub fn undo_to_mark(&mut self, mark: Mark) {
        let slot = self.slot_mut(mark.ctx);
        if mark.undo_len >= slot.undo_list.len() {
            return;
        }
        let tail = slot.undo_list.split_off(mark.undo_len);
        for (var, var_ctx) in tail {
            self.unbind(var_ctx, var);
        }
    }

    /// Final release: undoes everything this context bound (here or
    /// elsewhere) and returns the slot to the free list.
    pub fn done(&mut self, ctx: CtxHandle) {
        let undo_list = std::mem::take(&mut self.slot_mut(ctx).undo_list);
        for (var, var_ctx) in undo_list {
            if var_ctx != ctx {
                self.unbind(var_ctx, var);
            }
        }
        let slot = self.slot_mut(ctx);
        slot.bindings.clear();
        slot.save_all_undo_count = 0;
        slot.live = false;
        self.free.push(ctx);
    }

    fn unbind(&mut self, ctx: CtxHandle, var: VarId) {
        let removed = self.slot_mut(ctx).bindings.remove(&var);
        debug_assert!(removed.is_some());
    }

    pub fn is_bound(&self, ctx: CtxHandle, var: VarId) -> bool {
        match self.lookup_var(ctx, var) {
            Resolved::Unbound(..) => false,
            Resolved::Pattern(p, c) => unify::is_data(self, &p, c),
            _ => true,
        }
    }

    pub fn reset(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    pub fn num_live(&self) -> usize {
        self.slots.iter().filter(|s| s.live).count()
    }
}

fn var_name(vars: &Dictionary, var: VarId) -> String {
    vars.decode(var).unwrap_or("?").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> (Dictionary, VarId, VarId) {
        let mut vars = Dictionary::new();
        let foo = vars.encode("foo");
        let bar = vars.encode("bar");
        (vars, foo, bar)
    }

    #[test]
    fn test_bind_and_lookup_data() {
        let (vars, foo, _) = names();
        let mut arena = ContextArena::new();
        let c = arena.alloc();
        assert!(arena.bind(c, foo, c, Binding::Data(Value::Int(123))));
        let mut memo = DataMemo::default();
        let v = arena.lookup_data(c, foo, false, &mut memo, &vars).unwrap();
        assert_eq!(v, Value::Int(123));
    }

    #[test]
    fn test_unbound_lookup_fails_unless_allowed() {
        let (vars, foo, _) = names();
        let mut arena = ContextArena::new();
        let c = arena.alloc();
        let mut memo = DataMemo::default();
        let err = arena.lookup_data(c, foo, false, &mut memo, &vars);
        assert_eq!(
            err,
            Err(InferenceError::UnboundVariable {
                var: "foo".to_string()
            })
        );
        let sentinel = arena.lookup_data(c, foo, true, &mut memo, &vars).unwrap();
        assert_eq!(sentinel, Value::str("$foo"));
    }

    #[test]
    fn test_done_unbinds_in_other_contexts() {
        // rule B binds caller A's variable; when B is done, A is restored
        let (_, foo, _) = names();
        let mut arena = ContextArena::new();
        let a = arena.alloc();
        let b = arena.alloc();
        assert!(arena.bind(b, foo, a, Binding::Data(Value::Int(123))));
        assert!(matches!(arena.lookup_var(a, foo), Resolved::Data(_)));
        arena.done(b);
        assert!(matches!(arena.lookup_var(a, foo), Resolved::Unbound(..)));
    }

    #[test]
    fn test_identity_bind_is_skipped() {
        let (_, foo, _) = names();
        let mut arena = ContextArena::new();
        let a = arena.alloc();
        let created = arena.bind(a, foo, a, Binding::Pattern(Pattern::variable(foo), a));
        assert!(!created);
        assert!(matches!(arena.lookup_var(a, foo), Resolved::Unbound(..)));
    }

    #[test]
    fn test_variable_chain_resolves_through_contexts() {
        let (vars, foo, bar) = names();
        let mut arena = ContextArena::new();
        let a = arena.alloc();
        let b = arena.alloc();
        // $bar (in B) -> $foo (in A), then $foo -> data
        assert!(arena.bind(b, bar, b, Binding::Pattern(Pattern::variable(foo), a)));
        match arena.lookup_var(b, bar) {
            Resolved::Unbound(v, c) => {
                assert_eq!(v, foo);
                assert_eq!(c, a);
            }
            other => panic!("expected unbound chain end, got {:?}", other),
        }
        assert!(arena.bind(a, foo, a, Binding::Data(Value::str("x"))));
        let mut memo = DataMemo::default();
        let v = arena.lookup_data(b, bar, false, &mut memo, &vars).unwrap();
        assert_eq!(v, Value::str("x"));
    }

    #[test]
    fn test_save_all_logs_self_binds() {
        let (_, foo, _) = names();
        let mut arena = ContextArena::new();
        let c = arena.alloc();
        let mark = arena.mark(c, true);
        assert!(arena.bind(c, foo, c, Binding::Data(Value::Int(1))));
        arena.end_save_all_undo(c);
        arena.undo_to_mark(mark);
        assert!(matches!(arena.lookup_var(c, foo), Resolved::Unbound(..)));
    }

    #[test]
    fn test_self_binds_not_logged_without_save_all() {
        let (_, foo, _) = names();
        let mut arena = ContextArena::new();
        let c = arena.alloc();
        let mark = arena.mark(c, false);
        assert!(arena.bind(c, foo, c, Binding::Data(Value::Int(1))));
        arena.undo_to_mark(mark);
        // without save-all, the self bind stays; the context is abandoned
        // wholesale by done()
        assert!(matches!(arena.lookup_var(c, foo), Resolved::Data(_)));
    }

    #[test]
    fn test_slots_are_reused() {
        let mut arena = ContextArena::new();
        let a = arena.alloc();
        let b = arena.alloc();
        arena.done(b);
        let c = arena.alloc();
        assert_eq!(b, c);
        arena.done(c);
        arena.done(a);
        assert_eq!(arena.num_live(), 0);
    }
}
