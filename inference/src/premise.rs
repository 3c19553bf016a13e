/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Premise iteration. A rule's `when`/`foreach` list is walked with a stack
//! of open iterators: pressing onto the next premise on each yield,
//! backtracking into the previous one on exhaustion. The combinators
//! (`first`, `notany`, `forall`) wrap nested walkers of the same shape, so
//! forward and backward chaining share one implementation.

use std::rc::Rc;

use shared::dictionary::Dictionary;
use shared::error::InferenceError;
use shared::pattern::Pattern;
use shared::rule::{BindingScope, ExternEval, ExternIter, Premise, PlanSpec};
use shared::value::Value;

use crate::context::{Binding, ContextArena, CtxHandle, DataMemo, Mark, Resolved};
use crate::engine::Engine;
use crate::plan::{PlanBody, PlanStep};
use crate::proof::{Proof, Step};
use crate::unify;

/// Whether goal premises resolve through the full prover or through fact
/// lookup only (forward chaining).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    Prove,
    Lookup,
}

/// Read-only resolved-binding view handed to user-supplied hooks.
pub struct ExternScope<'a> {
    arena: &'a ContextArena,
    ctx: CtxHandle,
    vars: &'a Dictionary,
}

impl<'a> ExternScope<'a> {
    pub fn new(arena: &'a ContextArena, ctx: CtxHandle, vars: &'a Dictionary) -> Self {
        ExternScope { arena, ctx, vars }
    }
}

impl BindingScope for ExternScope<'_> {
    fn get(&self, name: &str) -> Result<Value, InferenceError> {
        let id = self
            .vars
            .resolve(name)
            .ok_or_else(|| InferenceError::UnboundVariable {
                var: name.to_string(),
            })?;
        let mut memo = DataMemo::default();
        self.arena.lookup_data(self.ctx, id, false, &mut memo, self.vars)
    }
}

/// Walks a premise list against a rule-local context.
#[derive(Debug)]
pub struct PremiseListWalker {
    ctx: CtxHandle,
    rule_name: String,
    mode: WalkMode,
    premises: Vec<Premise>,
    stack: Vec<PremiseIter>,
    yielded: bool,
}

enum Advance {
    Ok,
    Exhausted,
    Stopped,
}

impl PremiseListWalker {
    pub fn new(ctx: CtxHandle, rule_name: &str, mode: WalkMode, premises: Vec<Premise>) -> Self {
        PremiseListWalker {
            ctx,
            rule_name: rule_name.to_string(),
            mode,
            premises,
            stack: Vec::new(),
            yielded: false,
        }
    }

    pub fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        if self.yielded {
            self.yielded = false;
            match self.advance_deepest(engine)? {
                Advance::Ok => {}
                Advance::Exhausted => return Ok(Step::Exhausted),
                Advance::Stopped => return Ok(Step::Stop),
            }
        }
        loop {
            if self.stack.len() == self.premises.len() {
                self.yielded = true;
                return Ok(Step::Yield(None));
            }
            let premise = self.premises[self.stack.len()].clone();
            let clause = self.stack.len();
            let mut iter =
                match PremiseIter::open(&premise, self.ctx, &self.rule_name, clause, self.mode, engine)
                {
                    Ok(iter) => iter,
                    Err(e) => {
                        self.close(engine);
                        return Err(e);
                    }
                };
            match iter.step(engine) {
                Ok(Step::Yield(_)) => self.stack.push(iter),
                Ok(Step::Exhausted) => match self.advance_deepest(engine)? {
                    Advance::Ok => {}
                    Advance::Exhausted => return Ok(Step::Exhausted),
                    Advance::Stopped => return Ok(Step::Stop),
                },
                Ok(Step::Stop) => {
                    self.close(engine);
                    return Ok(Step::Stop);
                }
                Err(e) => {
                    self.close(engine);
                    return Err(e);
                }
            }
        }
    }

    fn advance_deepest(&mut self, engine: &mut Engine) -> Result<Advance, InferenceError> {
        loop {
            let Some(top) = self.stack.last_mut() else {
                return Ok(Advance::Exhausted);
            };
            match top.step(engine) {
                Ok(Step::Yield(_)) => return Ok(Advance::Ok),
                Ok(Step::Exhausted) => {
                    self.stack.pop();
                }
                Ok(Step::Stop) => {
                    self.stack.pop();
                    self.close(engine);
                    return Ok(Advance::Stopped);
                }
                Err(e) => {
                    self.stack.pop();
                    self.close(engine);
                    return Err(e);
                }
            }
        }
    }

    /// Abandon the walk: close every open iterator, deepest first.
    pub fn close(&mut self, engine: &mut Engine) {
        while let Some(mut iter) = self.stack.pop() {
            iter.close(engine);
        }
        self.yielded = false;
    }

    /// Step-numbered subplans captured by the currently-yielded premises.
    pub fn subplans(&self) -> Vec<PlanStep> {
        let mut out = Vec::new();
        for iter in &self.stack {
            if let PremiseIter::Goal(goal) = iter {
                if let (Some(PlanSpec::Step(n)), Some(plan)) = (goal.plan_spec, &goal.captured) {
                    out.push(PlanStep {
                        step: Some(n),
                        body: PlanBody::Subplan(plan.clone()),
                    });
                }
            }
        }
        out
    }
}

#[derive(Debug)]
enum PremiseIter {
    Goal(GoalPremise),
    First(FirstIter),
    NotAny(NotAnyIter),
    Forall(ForallIter),
    Bind(BindOnce),
    Member(MemberIter),
    Once { state: u8, succeed: bool },
}

impl PremiseIter {
    fn open(
        premise: &Premise,
        ctx: CtxHandle,
        rule_name: &str,
        clause: usize,
        mode: WalkMode,
        engine: &mut Engine,
    ) -> Result<PremiseIter, InferenceError> {
        match premise {
            Premise::Goal {
                kb,
                entity,
                args,
                plan_spec,
                required,
            } => {
                let proof = match mode {
                    WalkMode::Prove => engine.prove(kb, *entity, ctx, args)?,
                    WalkMode::Lookup => engine.lookup(kb, *entity, ctx, args)?,
                };
                Ok(PremiseIter::Goal(GoalPremise {
                    proof: Box::new(proof),
                    ctx,
                    rule_name: rule_name.to_string(),
                    clause,
                    plan_spec: *plan_spec,
                    required: *required,
                    yields: 0,
                    plan_mark: None,
                    captured: None,
                }))
            }
            Premise::First(inner) => {
                let mark = engine.arena.mark(ctx, true);
                Ok(PremiseIter::First(FirstIter {
                    walker: Box::new(PremiseListWalker::new(ctx, rule_name, mode, inner.clone())),
                    ctx,
                    mark,
                    state: 0,
                }))
            }
            Premise::NotAny(inner) => {
                let mark = engine.arena.mark(ctx, true);
                Ok(PremiseIter::NotAny(NotAnyIter {
                    walker: Box::new(PremiseListWalker::new(ctx, rule_name, mode, inner.clone())),
                    ctx,
                    mark,
                    state: 0,
                }))
            }
            Premise::Forall { gen, require } => {
                let mark = engine.arena.mark(ctx, true);
                Ok(PremiseIter::Forall(ForallIter {
                    gen: Box::new(PremiseListWalker::new(ctx, rule_name, mode, gen.clone())),
                    require: require.clone(),
                    rule_name: rule_name.to_string(),
                    mode,
                    ctx,
                    mark,
                    state: 0,
                }))
            }
            Premise::Bind { pat, eval } => Ok(PremiseIter::Bind(BindOnce {
                pat: pat.clone(),
                eval: eval.clone(),
                ctx,
                state: 0,
                mark: None,
            })),
            Premise::Member { pat, iter } => Ok(PremiseIter::Member(MemberIter {
                pat: pat.clone(),
                iter: iter.clone(),
                ctx,
                values: None,
                next: 0,
                mark: None,
            })),
            Premise::Check { test } => {
                let scope = ExternScope::new(&engine.arena, ctx, &engine.variables);
                let succeed = test.call(&scope)?;
                Ok(PremiseIter::Once { state: 0, succeed })
            }
            Premise::Block { run } => {
                let scope = ExternScope::new(&engine.arena, ctx, &engine.variables);
                run.call(&scope)?;
                Ok(PremiseIter::Once {
                    state: 0,
                    succeed: true,
                })
            }
        }
    }

    fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        match self {
            PremiseIter::Goal(goal) => goal.step(engine),
            PremiseIter::First(first) => first.step(engine),
            PremiseIter::NotAny(notany) => notany.step(engine),
            PremiseIter::Forall(forall) => forall.step(engine),
            PremiseIter::Bind(bind) => bind.step(engine),
            PremiseIter::Member(member) => member.step(engine),
            PremiseIter::Once { state, succeed } => match *state {
                0 => {
                    *state = 1;
                    if *succeed {
                        Ok(Step::Yield(None))
                    } else {
                        Ok(Step::Exhausted)
                    }
                }
                _ => Ok(Step::Exhausted),
            },
        }
    }

    fn close(&mut self, engine: &mut Engine) {
        match self {
            PremiseIter::Goal(goal) => goal.close(engine),
            PremiseIter::First(first) => first.close(engine),
            PremiseIter::NotAny(notany) => notany.close(engine),
            PremiseIter::Forall(forall) => forall.close(engine),
            PremiseIter::Bind(bind) => bind.close(engine),
            PremiseIter::Member(member) => member.close(engine),
            PremiseIter::Once { state, .. } => *state = 1,
        }
    }
}

/// A positive goal call, with optional plan capture.
#[derive(Debug)]
struct GoalPremise {
    proof: Box<Proof>,
    ctx: CtxHandle,
    rule_name: String,
    clause: usize,
    plan_spec: Option<PlanSpec>,
    required: bool,
    yields: usize,
    plan_mark: Option<Mark>,
    captured: Option<Rc<crate::plan::Plan>>,
}

impl GoalPremise {
    fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        if let Some(mark) = self.plan_mark.take() {
            engine.arena.undo_to_mark(mark);
        }
        self.captured = None;
        match self.proof.step(engine)? {
            Step::Yield(plan) => {
                self.yields += 1;
                match (self.plan_spec, plan) {
                    (None, None) => {}
                    (None, Some(_)) => {
                        self.proof.close(engine);
                        return Err(InferenceError::PlanError {
                            detail: format!(
                                "{}: got unexpected plan from when clause {}",
                                self.rule_name, self.clause
                            ),
                        });
                    }
                    (Some(_), None) => {
                        self.proof.close(engine);
                        return Err(InferenceError::PlanError {
                            detail: format!(
                                "{}: expected plan from when clause {}",
                                self.rule_name, self.clause
                            ),
                        });
                    }
                    (Some(PlanSpec::Step(_)), Some(plan)) => {
                        self.captured = Some(plan);
                    }
                    (Some(PlanSpec::AsVar(var)), Some(plan)) => {
                        let mark = engine.arena.mark(self.ctx, true);
                        let bound = match engine.arena.lookup_var(self.ctx, var) {
                            Resolved::Unbound(v2, c2) => {
                                engine
                                    .arena
                                    .bind(self.ctx, v2, c2, Binding::Plan(plan));
                                true
                            }
                            _ => false,
                        };
                        engine.arena.end_save_all_undo(self.ctx);
                        if !bound {
                            engine.arena.undo_to_mark(mark);
                            self.proof.close(engine);
                            return Err(InferenceError::PlanError {
                                detail: format!(
                                    "{}: plan match failed in when clause {}",
                                    self.rule_name, self.clause
                                ),
                            });
                        }
                        self.plan_mark = Some(mark);
                    }
                }
                Ok(Step::Yield(None))
            }
            Step::Exhausted => {
                if self.required && self.yields == 0 {
                    Err(InferenceError::RequiredClauseFailed {
                        rule: self.rule_name.clone(),
                        clause: self.clause,
                    })
                } else {
                    Ok(Step::Exhausted)
                }
            }
            Step::Stop => Ok(Step::Stop),
        }
    }

    fn close(&mut self, engine: &mut Engine) {
        if let Some(mark) = self.plan_mark.take() {
            engine.arena.undo_to_mark(mark);
        }
        self.proof.close(engine);
    }
}

/// Cut: enumerate the inner list to its first solution, then stop.
#[derive(Debug)]
struct FirstIter {
    walker: Box<PremiseListWalker>,
    ctx: CtxHandle,
    mark: Mark,
    state: u8,
}

impl FirstIter {
    fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        match self.state {
            0 => match self.walker.step(engine) {
                Ok(Step::Yield(_)) => {
                    self.state = 1;
                    engine.arena.end_save_all_undo(self.ctx);
                    Ok(Step::Yield(None))
                }
                Ok(Step::Exhausted) => {
                    self.state = 2;
                    engine.arena.end_save_all_undo(self.ctx);
                    engine.arena.undo_to_mark(self.mark);
                    Ok(Step::Exhausted)
                }
                Ok(Step::Stop) => {
                    self.state = 2;
                    engine.arena.end_save_all_undo(self.ctx);
                    engine.arena.undo_to_mark(self.mark);
                    Ok(Step::Stop)
                }
                Err(e) => {
                    self.state = 2;
                    engine.arena.end_save_all_undo(self.ctx);
                    engine.arena.undo_to_mark(self.mark);
                    Err(e)
                }
            },
            1 => {
                self.state = 2;
                self.walker.close(engine);
                engine.arena.undo_to_mark(self.mark);
                Ok(Step::Exhausted)
            }
            _ => Ok(Step::Exhausted),
        }
    }

    fn close(&mut self, engine: &mut Engine) {
        match self.state {
            0 => {
                engine.arena.end_save_all_undo(self.ctx);
                self.walker.close(engine);
                engine.arena.undo_to_mark(self.mark);
            }
            1 => {
                self.walker.close(engine);
                engine.arena.undo_to_mark(self.mark);
            }
            _ => {}
        }
        self.state = 2;
    }
}

/// Negation: succeeds (with no bindings) iff the inner list has no
/// solution.
#[derive(Debug)]
struct NotAnyIter {
    walker: Box<PremiseListWalker>,
    ctx: CtxHandle,
    mark: Mark,
    state: u8,
}

impl NotAnyIter {
    fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        match self.state {
            0 => match self.walker.step(engine) {
                Ok(Step::Yield(_)) => {
                    // the subtree has a solution: notany fails, leaking nothing
                    self.state = 2;
                    self.walker.close(engine);
                    engine.arena.end_save_all_undo(self.ctx);
                    engine.arena.undo_to_mark(self.mark);
                    Ok(Step::Exhausted)
                }
                Ok(Step::Exhausted) => {
                    self.state = 1;
                    engine.arena.end_save_all_undo(self.ctx);
                    engine.arena.undo_to_mark(self.mark);
                    Ok(Step::Yield(None))
                }
                Ok(Step::Stop) => {
                    self.state = 2;
                    engine.arena.end_save_all_undo(self.ctx);
                    engine.arena.undo_to_mark(self.mark);
                    Ok(Step::Stop)
                }
                Err(e) => {
                    self.state = 2;
                    engine.arena.end_save_all_undo(self.ctx);
                    engine.arena.undo_to_mark(self.mark);
                    Err(e)
                }
            },
            1 => {
                self.state = 2;
                Ok(Step::Exhausted)
            }
            _ => Ok(Step::Exhausted),
        }
    }

    fn close(&mut self, engine: &mut Engine) {
        if self.state == 0 {
            engine.arena.end_save_all_undo(self.ctx);
            self.walker.close(engine);
            engine.arena.undo_to_mark(self.mark);
        }
        self.state = 2;
    }
}

/// Succeeds iff every solution of `gen` satisfies `require` at least once.
/// Neither side's bindings escape.
#[derive(Debug)]
struct ForallIter {
    gen: Box<PremiseListWalker>,
    require: Vec<Premise>,
    rule_name: String,
    mode: WalkMode,
    ctx: CtxHandle,
    mark: Mark,
    state: u8,
}

impl ForallIter {
    fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        match self.state {
            0 => loop {
                match self.gen.step(engine) {
                    Ok(Step::Yield(_)) => {
                        let mut require = PremiseListWalker::new(
                            self.ctx,
                            &self.rule_name,
                            self.mode,
                            self.require.clone(),
                        );
                        match require.step(engine) {
                            Ok(Step::Yield(_)) => {
                                require.close(engine);
                            }
                            Ok(Step::Exhausted) => {
                                // one gen solution with no required match
                                self.state = 2;
                                self.gen.close(engine);
                                engine.arena.end_save_all_undo(self.ctx);
                                engine.arena.undo_to_mark(self.mark);
                                return Ok(Step::Exhausted);
                            }
                            Ok(Step::Stop) => {
                                self.state = 2;
                                self.gen.close(engine);
                                engine.arena.end_save_all_undo(self.ctx);
                                engine.arena.undo_to_mark(self.mark);
                                return Ok(Step::Stop);
                            }
                            Err(e) => {
                                self.state = 2;
                                self.gen.close(engine);
                                engine.arena.end_save_all_undo(self.ctx);
                                engine.arena.undo_to_mark(self.mark);
                                return Err(e);
                            }
                        }
                    }
                    Ok(Step::Exhausted) => {
                        self.state = 1;
                        engine.arena.end_save_all_undo(self.ctx);
                        engine.arena.undo_to_mark(self.mark);
                        return Ok(Step::Yield(None));
                    }
                    Ok(Step::Stop) => {
                        self.state = 2;
                        engine.arena.end_save_all_undo(self.ctx);
                        engine.arena.undo_to_mark(self.mark);
                        return Ok(Step::Stop);
                    }
                    Err(e) => {
                        self.state = 2;
                        engine.arena.end_save_all_undo(self.ctx);
                        engine.arena.undo_to_mark(self.mark);
                        return Err(e);
                    }
                }
            },
            1 => {
                self.state = 2;
                Ok(Step::Exhausted)
            }
            _ => Ok(Step::Exhausted),
        }
    }

    fn close(&mut self, engine: &mut Engine) {
        if self.state == 0 {
            engine.arena.end_save_all_undo(self.ctx);
            self.gen.close(engine);
            engine.arena.undo_to_mark(self.mark);
        }
        self.state = 2;
    }
}

/// `$x = f(..)`: evaluate once and unify.
#[derive(Debug)]
struct BindOnce {
    pat: Rc<Pattern>,
    eval: ExternEval,
    ctx: CtxHandle,
    state: u8,
    mark: Option<Mark>,
}

impl BindOnce {
    fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        match self.state {
            0 => {
                self.state = 1;
                let value = {
                    let scope = ExternScope::new(&engine.arena, self.ctx, &engine.variables);
                    self.eval.call(&scope)?
                };
                let mark = engine.arena.mark(self.ctx, true);
                let ok =
                    unify::match_data(&mut engine.arena, self.ctx, &self.pat, self.ctx, &value);
                engine.arena.end_save_all_undo(self.ctx);
                if ok {
                    self.mark = Some(mark);
                    Ok(Step::Yield(None))
                } else {
                    engine.arena.undo_to_mark(mark);
                    self.state = 2;
                    Ok(Step::Exhausted)
                }
            }
            1 => {
                self.state = 2;
                if let Some(mark) = self.mark.take() {
                    engine.arena.undo_to_mark(mark);
                }
                Ok(Step::Exhausted)
            }
            _ => Ok(Step::Exhausted),
        }
    }

    fn close(&mut self, engine: &mut Engine) {
        if let Some(mark) = self.mark.take() {
            engine.arena.undo_to_mark(mark);
        }
        self.state = 2;
    }
}

/// `$x in f(..)`: enumerate the hook's values.
#[derive(Debug)]
struct MemberIter {
    pat: Rc<Pattern>,
    iter: ExternIter,
    ctx: CtxHandle,
    values: Option<Vec<Value>>,
    next: usize,
    mark: Option<Mark>,
}

impl MemberIter {
    fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        if let Some(mark) = self.mark.take() {
            engine.arena.undo_to_mark(mark);
        }
        if self.values.is_none() {
            let scope = ExternScope::new(&engine.arena, self.ctx, &engine.variables);
            self.values = Some(self.iter.call(&scope)?);
        }
        let values = self.values.as_ref().unwrap();
        while self.next < values.len() {
            let value = values[self.next].clone();
            self.next += 1;
            let mark = engine.arena.mark(self.ctx, true);
            let ok = unify::match_data(&mut engine.arena, self.ctx, &self.pat, self.ctx, &value);
            engine.arena.end_save_all_undo(self.ctx);
            if ok {
                self.mark = Some(mark);
                return Ok(Step::Yield(None));
            }
            engine.arena.undo_to_mark(mark);
        }
        Ok(Step::Exhausted)
    }

    fn close(&mut self, engine: &mut Engine) {
        if let Some(mark) = self.mark.take() {
            engine.arena.undo_to_mark(mark);
        }
        self.next = self.values.as_ref().map_or(0, |v| v.len());
    }
}
