/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Resumable proof iterators. A proof is stepped by the consumer; each
//! `Yield` leaves its bindings in effect, each resume undoes them before
//! searching on. `close` abandons a proof early and must leave no binding
//! behind. `Stop` is the claim_goal signal travelling up to its enclosing
//! goal.

use std::rc::Rc;

use shared::error::InferenceError;
use shared::fact_set::Fact;
use shared::pattern::Pattern;
use shared::value::Value;

use crate::backward::GoalProof;
use crate::context::{CtxHandle, Mark};
use crate::engine::Engine;
use crate::plan::Plan;
use crate::unify;

#[derive(Debug)]
pub enum Step {
    Yield(Option<Rc<Plan>>),
    Exhausted,
    Stop,
}

#[derive(Debug)]
pub enum Proof {
    /// No solutions.
    Empty,
    /// One empty success.
    Once { yielded: bool },
    Facts(FactLookup),
    Goal(GoalProof),
    /// claim_goal: one empty success, then the Stop signal.
    ClaimGoal { state: u8 },
    /// One success iff a single data match holds (command specials).
    MatchOnce(MatchOnce),
}

impl Proof {
    pub fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        match self {
            Proof::Empty => Ok(Step::Exhausted),
            Proof::Once { yielded } => {
                if *yielded {
                    Ok(Step::Exhausted)
                } else {
                    *yielded = true;
                    Ok(Step::Yield(None))
                }
            }
            Proof::Facts(lookup) => lookup.step(engine),
            Proof::Goal(goal) => goal.step(engine),
            Proof::ClaimGoal { state } => match *state {
                0 => {
                    *state = 1;
                    Ok(Step::Yield(None))
                }
                1 => {
                    *state = 2;
                    Ok(Step::Stop)
                }
                _ => Ok(Step::Exhausted),
            },
            Proof::MatchOnce(m) => m.step(engine),
        }
    }

    pub fn close(&mut self, engine: &mut Engine) {
        match self {
            Proof::Empty | Proof::Once { .. } | Proof::ClaimGoal { .. } => {}
            Proof::Facts(lookup) => lookup.close(engine),
            Proof::Goal(goal) => goal.close(engine),
            Proof::MatchOnce(m) => m.close(engine),
        }
    }
}

/// Steps through a snapshot of candidate facts, trailing the bindings of
/// one match at a time into the caller's context.
#[derive(Debug)]
pub struct FactLookup {
    ctx: CtxHandle,
    patterns: Vec<Rc<Pattern>>,
    facts: Vec<Fact>,
    next: usize,
    mark: Option<Mark>,
}

impl FactLookup {
    pub fn new(ctx: CtxHandle, patterns: Vec<Rc<Pattern>>, facts: Vec<Fact>) -> Self {
        FactLookup {
            ctx,
            patterns,
            facts,
            next: 0,
            mark: None,
        }
    }

    fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        if let Some(mark) = self.mark.take() {
            engine.arena.undo_to_mark(mark);
        }
        while self.next < self.facts.len() {
            let fact = self.facts[self.next].clone();
            self.next += 1;
            let mark = engine.arena.mark(self.ctx, true);
            let mut ok = fact.len() == self.patterns.len();
            if ok {
                for (pat, value) in self.patterns.iter().zip(fact.iter()) {
                    if !unify::match_data(&mut engine.arena, self.ctx, pat, self.ctx, value) {
                        ok = false;
                        break;
                    }
                }
            }
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
        self.next = self.facts.len();
    }
}

/// One-shot data match used by the command specials: the command already
/// ran; its output either unifies with the caller's pattern or it doesn't.
#[derive(Debug)]
pub struct MatchOnce {
    ctx: CtxHandle,
    pattern: Rc<Pattern>,
    data: Value,
    state: u8,
    mark: Option<Mark>,
}

impl MatchOnce {
    pub fn new(ctx: CtxHandle, pattern: Rc<Pattern>, data: Value) -> Self {
        MatchOnce {
            ctx,
            pattern,
            data,
            state: 0,
            mark: None,
        }
    }

    fn step(&mut self, engine: &mut Engine) -> Result<Step, InferenceError> {
        match self.state {
            0 => {
                self.state = 1;
                let mark = engine.arena.mark(self.ctx, true);
                let ok = unify::match_data(
                    &mut engine.arena,
                    self.ctx,
                    &self.pattern,
                    self.ctx,
                    &self.data,
                );
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
