/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The backward-chaining prover. A goal tries its candidate rules in
//! registration order; each rule gets a fresh local context, unifies its
//! head with the caller's argument patterns, then walks its `when` premises
//! as resumable iterators. Every exit path releases the rule context, so no
//! binding survives a finished rule.

use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashMap;
use shared::error::InferenceError;
use shared::pattern::Pattern;
use shared::rule::BcRule;

use crate::context::{CtxHandle, DataMemo};
use crate::engine::Engine;
use crate::plan::{Plan, PlanBody, PlanStep};
use crate::premise::{PremiseListWalker, WalkMode};
use crate::proof::Step;
use crate::unify;

/// Enumerates the solutions of one goal over a snapshot of candidate
/// rules. A `Stop` signal from claim_goal inside a rule is swallowed here:
/// the goal ends, suppressing the remaining alternatives.
#[derive(Debug)]
pub struct GoalProof {
    caller_ctx: CtxHandle,
    args: Vec<Rc<Pattern>>,
    rules: Vec<Rc<BcRule>>,
    next_rule: usize,
    active: Option<RuleProof>,
    done: bool,
}

impl GoalProof {
    pub fn new(caller_ctx: CtxHandle, args: Vec<Rc<Pattern>>, rules: Vec<Rc<BcRule>>) -> Self {
        GoalProof {
            caller_ctx,
            args,
            rules,
            next_rule: 0,
            active: None,
            done: false,
        }
    }

    pub fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        if self.done {
            return Ok(Step::Exhausted);
        }
        loop {
            if let Some(rule_proof) = self.active.as_mut() {
                match rule_proof.step(engine) {
                    Ok(Step::Yield(plan)) => return Ok(Step::Yield(plan)),
                    Ok(Step::Exhausted) => {
                        self.active = None;
                    }
                    Ok(Step::Stop) => {
                        self.active = None;
                        self.done = true;
                        return Ok(Step::Exhausted);
                    }
                    Err(e) => {
                        self.active = None;
                        self.done = true;
                        return Err(e);
                    }
                }
            }
            let Some(rule) = self.rules.get(self.next_rule).cloned() else {
                self.done = true;
                return Ok(Step::Exhausted);
            };
            self.next_rule += 1;
            match RuleProof::begin(rule, self.caller_ctx, &self.args, engine) {
                Ok(Some(rule_proof)) => self.active = Some(rule_proof),
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }
    }

    pub fn close(&mut self, engine: &mut Engine) {
        if let Some(mut rule_proof) = self.active.take() {
            rule_proof.close(engine);
        }
        self.done = true;
    }
}

/// One rule invocation: local context, head unification, premise walk.
#[derive(Debug)]
pub struct RuleProof {
    rule: Rc<BcRule>,
    ctx: CtxHandle,
    walker: PremiseListWalker,
    finished: bool,
}

impl RuleProof {
    /// Unify the rule head against the goal arguments. Returns `None` when
    /// the head does not match (the rule is skipped, its context released).
    fn begin(
        rule: Rc<BcRule>,
        caller_ctx: CtxHandle,
        args: &[Rc<Pattern>],
        engine: &mut Engine,
    ) -> Result<Option<RuleProof>, InferenceError> {
        if rule.goal.len() != args.len() {
            return Err(InferenceError::ArityMismatch {
                rule: rule.name.clone(),
                expected: rule.goal.len(),
                got: args.len(),
            });
        }
        let ctx = engine.arena.alloc();
        for (pat, arg) in rule.goal.iter().zip(args.iter()) {
            if !unify::match_pattern(&mut engine.arena, ctx, pat, ctx, arg, caller_ctx) {
                engine.arena.done(ctx);
                return Ok(None);
            }
        }
        engine.stats.num_bc_rules_matched += 1;
        debug!("trying bc rule {}", rule.name);
        let walker = PremiseListWalker::new(ctx, &rule.name, WalkMode::Prove, rule.when.clone());
        Ok(Some(RuleProof {
            rule,
            ctx,
            walker,
            finished: false,
        }))
    }

    fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        if self.finished {
            return Ok(Step::Exhausted);
        }
        match self.walker.step(engine) {
            Ok(Step::Yield(_)) => {
                engine.stats.num_bc_rule_successes += 1;
                match self.compose_plan(engine) {
                    Ok(plan) => Ok(Step::Yield(plan)),
                    Err(e) => {
                        self.walker.close(engine);
                        self.release(engine);
                        Err(e)
                    }
                }
            }
            Ok(Step::Exhausted) => {
                engine.stats.num_bc_rule_failures += 1;
                self.release(engine);
                Ok(Step::Exhausted)
            }
            Ok(Step::Stop) => {
                self.release(engine);
                Ok(Step::Stop)
            }
            Err(e) => {
                self.release(engine);
                Err(e)
            }
        }
    }

    /// Collect the premises' step-numbered subplans plus this rule's own
    /// fragments, resolving referenced variables against the current
    /// bindings through one shared memo.
    fn compose_plan(&mut self, engine: &mut Engine) -> Result<Option<Rc<Plan>>, InferenceError> {
        let mut steps = self.walker.subplans();
        if steps.is_empty() && self.rule.fragments.is_empty() {
            return Ok(None);
        }
        let mut memo = DataMemo::default();
        for fragment in &self.rule.fragments {
            let mut bindings = FxHashMap::default();
            for var in &fragment.vars {
                let name = engine
                    .variables
                    .decode(*var)
                    .unwrap_or("?")
                    .to_string();
                let arg = engine
                    .arena
                    .lookup_plan_arg(self.ctx, *var, &mut memo, &engine.variables)
                    .map_err(|e| match e {
                        InferenceError::UnboundVariable { var } => InferenceError::PlanError {
                            detail: format!(
                                "{}: plan fragment references unbound ${}",
                                self.rule.name, var
                            ),
                        },
                        other => other,
                    })?;
                bindings.insert(name, arg);
            }
            steps.push(PlanStep {
                step: fragment.step,
                body: PlanBody::Fragment {
                    source: fragment.source.clone(),
                    bindings,
                },
            });
        }
        Ok(Some(Rc::new(Plan::compose(&self.rule.name, steps))))
    }

    fn release(&mut self, engine: &mut Engine) {
        if !self.finished {
            engine.arena.done(self.ctx);
            self.finished = true;
        }
    }

    fn close(&mut self, engine: &mut Engine) {
        if !self.finished {
            self.walker.close(engine);
            engine.arena.done(self.ctx);
            self.finished = true;
        }
    }
}
