/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The forward-chaining driver. Activation walks every FC rule's `foreach`
//! premises over the current facts and fires its assertions; new facts may
//! enable further firings, so passes repeat until one asserts nothing new.
//! External side-effects fire once per distinct binding combination per
//! activation, so a later pass does not repeat them.

use log::debug;
use rustc_hash::FxHashSet;
use shared::error::InferenceError;
use shared::rule::{Assertion, FcRule};
use shared::value::Value;
use std::rc::Rc;

use crate::context::{CtxHandle, DataMemo};
use crate::engine::Engine;
use crate::knowledge_base::KnowledgeBase;
use crate::premise::{ExternScope, PremiseListWalker, WalkMode};
use crate::proof::Step;
use crate::unify;

type FiredSet = FxHashSet<(String, Vec<Value>)>;

/// Drive the FC rules of the given rule bases (ancestors first) to
/// quiescence.
pub fn run_to_quiescence(engine: &mut Engine, chain: &[String]) -> Result<(), InferenceError> {
    let mut rules: Vec<Rc<FcRule>> = Vec::new();
    for name in chain {
        if let KnowledgeBase::Rules(rb) = engine.get_kb(name)? {
            rules.extend(rb.fc_rules.iter().cloned());
        }
    }

    let mut fired = FiredSet::default();
    let mut passes = 0u32;
    loop {
        passes += 1;
        let mut changed = false;
        for rule in &rules {
            changed |= run_fc_rule(engine, rule, &mut fired)?;
        }
        if !changed {
            break;
        }
    }
    debug!(
        "fc quiescent after {} passes over {} rules",
        passes,
        rules.len()
    );
    Ok(())
}

/// Enumerate every premise combination of one FC rule and fire its
/// assertions. Returns true iff a new fact was asserted.
fn run_fc_rule(
    engine: &mut Engine,
    rule: &Rc<FcRule>,
    fired: &mut FiredSet,
) -> Result<bool, InferenceError> {
    let ctx = engine.arena.alloc();
    let mut walker =
        PremiseListWalker::new(ctx, &rule.name, WalkMode::Lookup, rule.foreach.clone());
    let mut new_facts = false;
    loop {
        match walker.step(engine) {
            Ok(Step::Yield(_)) => match fire_assertions(engine, rule, ctx, fired) {
                Ok((inserted, extern_fired)) => {
                    if inserted {
                        new_facts = true;
                    }
                    if inserted || extern_fired {
                        engine.stats.num_fc_rules_triggered += 1;
                        debug!("fc rule {} fired", rule.name);
                    }
                }
                Err(e) => {
                    walker.close(engine);
                    engine.arena.done(ctx);
                    return Err(e);
                }
            },
            Ok(Step::Exhausted) | Ok(Step::Stop) => break,
            Err(e) => {
                engine.arena.done(ctx);
                return Err(e);
            }
        }
    }
    engine.arena.done(ctx);
    Ok(new_facts)
}

fn fire_assertions(
    engine: &mut Engine,
    rule: &Rc<FcRule>,
    ctx: CtxHandle,
    fired: &mut FiredSet,
) -> Result<(bool, bool), InferenceError> {
    let mut inserted = false;
    let mut extern_fired = false;
    for assertion in &rule.assertions {
        match assertion {
            Assertion::Fact { kb, entity, args } => {
                let mut memo = DataMemo::default();
                let mut values = Vec::with_capacity(args.len());
                for pat in args {
                    values.push(unify::as_data(
                        &engine.arena,
                        pat,
                        ctx,
                        false,
                        &mut memo,
                        &engine.variables,
                    )?);
                }
                if engine.assert_fact(kb, *entity, values)? {
                    inserted = true;
                }
            }
            Assertion::Extern { run, vars } => {
                let mut memo = DataMemo::default();
                let mut signature = Vec::with_capacity(vars.len());
                for var in vars {
                    signature.push(engine.arena.lookup_data(
                        ctx,
                        *var,
                        false,
                        &mut memo,
                        &engine.variables,
                    )?);
                }
                if fired.insert((rule.name.clone(), signature)) {
                    let scope = ExternScope::new(&engine.arena, ctx, &engine.variables);
                    run.call(&scope)?;
                    extern_fired = true;
                }
            }
        }
    }
    Ok((inserted, extern_fired))
}
