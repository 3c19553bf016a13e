/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The application-facing goal API. A `Goal` names a knowledge base, an
//! entity and a pattern tuple; proving it returns a `Solutions` iterator
//! whose items carry the goal variables' resolved bindings and the plan,
//! if any. Dropping the iterator rewinds every binding the proof made.

use std::rc::Rc;

use inference::context::{CtxHandle, DataMemo};
use inference::engine::Engine;
use inference::plan::Plan;
use inference::proof::{Proof, Step};
use rustc_hash::FxHashMap;
use shared::error::InferenceError;
use shared::pattern::{Pattern, VarId};
use shared::value::Value;

pub type Solution = (FxHashMap<String, Value>, Option<Rc<Plan>>);

#[derive(Debug, Clone)]
pub struct Goal {
    pub kb: String,
    pub entity: u32,
    pub args: Vec<Rc<Pattern>>,
}

impl Goal {
    pub fn new(engine: &mut Engine, kb: &str, entity: &str, args: Vec<Rc<Pattern>>) -> Goal {
        Goal {
            kb: kb.to_string(),
            entity: engine.entity(entity),
            args,
        }
    }

    pub fn prove<'e>(&self, engine: &'e mut Engine) -> Result<Solutions<'e>, InferenceError> {
        self.prove_with(engine, &[])
    }

    /// Prove with ground bindings seeded into the caller context, the
    /// no-parser analog of `prove_goal(.., **bindings)`.
    pub fn prove_with<'e>(
        &self,
        engine: &'e mut Engine,
        bindings: &[(&str, Value)],
    ) -> Result<Solutions<'e>, InferenceError> {
        let ctx = engine.arena.alloc();
        engine.seed_context(ctx, bindings);
        let proof = match engine.prove(&self.kb, self.entity, ctx, &self.args) {
            Ok(proof) => proof,
            Err(e) => {
                engine.arena.done(ctx);
                return Err(e);
            }
        };
        let mut var_ids = Vec::new();
        for arg in &self.args {
            arg.collect_vars(&mut var_ids);
        }
        let goal_vars = var_ids
            .into_iter()
            .map(|id| (engine.variables.decode(id).unwrap_or("?").to_string(), id))
            .collect();
        Ok(Solutions {
            engine,
            proof,
            ctx,
            goal_vars,
            closed: false,
        })
    }

    /// First solution, closing the proof afterwards.
    pub fn prove_first(
        &self,
        engine: &mut Engine,
    ) -> Result<Option<Solution>, InferenceError> {
        let mut solutions = self.prove(engine)?;
        solutions.next().transpose()
    }
}

/// Resumable solution iterator. Each item's bindings were in effect when it
/// was produced; requesting the next item undoes them first. Dropping the
/// iterator (or exhausting it) runs the full trail rewind.
#[derive(Debug)]
pub struct Solutions<'e> {
    engine: &'e mut Engine,
    proof: Proof,
    ctx: CtxHandle,
    goal_vars: Vec<(String, VarId)>,
    closed: bool,
}

impl Solutions<'_> {
    fn finish(&mut self) {
        if !self.closed {
            self.proof.close(self.engine);
            self.engine.arena.done(self.ctx);
            self.closed = true;
        }
    }

    fn snapshot(&self) -> Result<FxHashMap<String, Value>, InferenceError> {
        let mut memo = DataMemo::default();
        let mut out = FxHashMap::default();
        for (name, id) in &self.goal_vars {
            match self.engine.arena.lookup_data(
                self.ctx,
                *id,
                true,
                &mut memo,
                &self.engine.variables,
            ) {
                Ok(value) => {
                    out.insert(name.clone(), value);
                }
                // plan-valued bindings surface through the plan, not here
                Err(InferenceError::PlanError { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

impl Iterator for Solutions<'_> {
    type Item = Result<Solution, InferenceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        match self.proof.step(self.engine) {
            Ok(Step::Yield(plan)) => match self.snapshot() {
                Ok(bindings) => Some(Ok((bindings, plan))),
                Err(e) => {
                    self.finish();
                    Some(Err(e))
                }
            },
            Ok(Step::Exhausted) | Ok(Step::Stop) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl Drop for Solutions<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
