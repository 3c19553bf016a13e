/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The engine owns the knowledge bases, the interning dictionaries, the
//! context arena and the statistics counters, and dispatches `prove`,
//! `lookup` and assertions to the right backend.

use std::fmt;
use std::rc::Rc;

use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use shared::dictionary::Dictionary;
use shared::error::InferenceError;
use shared::fact_set::Fact;
use shared::pattern::Pattern;
use shared::rule::{BcRule, FcRule};
use shared::value::Value;

use crate::context::{Binding, ContextArena, CtxHandle, DataMemo};
use crate::backward::GoalProof;
use crate::forward;
use crate::knowledge_base::{FactBase, KnowledgeBase, RuleBase, SpecialBase};
use crate::proof::{FactLookup, Proof};
use crate::special::{self, CommandRunner, ProcessRunner};
use crate::unify;

pub const SPECIAL_KB: &str = "special";

#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub num_prove_calls: u64,
    pub num_bc_rules_matched: u64,
    pub num_bc_rule_successes: u64,
    pub num_bc_rule_failures: u64,
    pub num_fc_rules_triggered: u64,
    pub num_facts_asserted: u64,
}

impl Stats {
    pub fn reset(&mut self) {
        *self = Stats::default();
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "fc: {} rules triggered, {} facts asserted",
            self.num_fc_rules_triggered, self.num_facts_asserted
        )?;
        write!(
            f,
            "bc: {} goals, {} rules matched, {} successes, {} failures",
            self.num_prove_calls,
            self.num_bc_rules_matched,
            self.num_bc_rule_successes,
            self.num_bc_rule_failures
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct SpecialIds {
    claim_goal: u32,
    check_command: u32,
    command: u32,
    general_command: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KbKind {
    Facts,
    Rules,
    Special,
}

#[derive(Debug)]
pub struct Engine {
    pub kbs: FxHashMap<String, KnowledgeBase>,
    /// Entity names and other interned symbols.
    pub dictionary: Dictionary,
    /// Pattern variable names.
    pub variables: Dictionary,
    pub arena: ContextArena,
    pub stats: Stats,
    runner: Rc<dyn CommandRunner>,
    specials: SpecialIds,
}

impl Engine {
    pub fn new() -> Self {
        Engine::with_runner(Rc::new(ProcessRunner))
    }

    pub fn with_runner(runner: Rc<dyn CommandRunner>) -> Self {
        let mut dictionary = Dictionary::new();
        let specials = SpecialIds {
            claim_goal: dictionary.encode("claim_goal"),
            check_command: dictionary.encode("check_command"),
            command: dictionary.encode("command"),
            general_command: dictionary.encode("general_command"),
        };
        let mut kbs = FxHashMap::default();
        kbs.insert(
            SPECIAL_KB.to_string(),
            KnowledgeBase::Special(SpecialBase {
                name: SPECIAL_KB.to_string(),
            }),
        );
        Engine {
            kbs,
            dictionary,
            variables: Dictionary::new(),
            arena: ContextArena::new(),
            stats: Stats::default(),
            runner,
            specials,
        }
    }

    // ---- pattern construction -------------------------------------------

    pub fn entity(&mut self, name: &str) -> u32 {
        self.dictionary.encode(name)
    }

    /// A variable pattern; names starting with '_' are anonymous.
    pub fn var(&mut self, name: &str) -> Rc<Pattern> {
        let id = self.variables.encode(name);
        if name.starts_with('_') {
            Pattern::anonymous(id)
        } else {
            Pattern::variable(id)
        }
    }

    /// A string literal pattern.
    pub fn sym(&mut self, name: &str) -> Rc<Pattern> {
        Pattern::literal(Value::str(name))
    }

    // ---- knowledge base registry ----------------------------------------

    pub fn get_kb(&self, name: &str) -> Result<&KnowledgeBase, InferenceError> {
        self.kbs.get(name).ok_or_else(|| InferenceError::UnknownKb {
            name: name.to_string(),
        })
    }

    /// Idempotent fact-KB registration; redeclaring a non-fact KB fails.
    pub fn get_create_facts(&mut self, name: &str) -> Result<&mut FactBase, InferenceError> {
        if !self.kbs.contains_key(name) {
            self.kbs
                .insert(name.to_string(), KnowledgeBase::Facts(FactBase::new(name)));
        }
        match self.kbs.get_mut(name).unwrap() {
            KnowledgeBase::Facts(fb) => Ok(fb),
            _ => Err(InferenceError::InconsistentKb {
                name: name.to_string(),
            }),
        }
    }

    /// Idempotent rule-base registration. A re-registration must agree with
    /// the prior declaration on parent and exclusions.
    pub fn get_create_rule_base(
        &mut self,
        name: &str,
        parent: Option<&str>,
        excluded: &[&str],
    ) -> Result<&mut RuleBase, InferenceError> {
        let excluded_ids: FxHashSet<u32> =
            excluded.iter().map(|e| self.dictionary.encode(e)).collect();
        if !self.kbs.contains_key(name) {
            self.kbs.insert(
                name.to_string(),
                KnowledgeBase::Rules(RuleBase::new(
                    name,
                    parent.map(|p| p.to_string()),
                    excluded_ids.clone(),
                )),
            );
        }
        match self.kbs.get_mut(name).unwrap() {
            KnowledgeBase::Rules(rb) => {
                if rb.parent.as_deref() != parent || rb.excluded != excluded_ids {
                    return Err(InferenceError::InconsistentKb {
                        name: name.to_string(),
                    });
                }
                Ok(rb)
            }
            _ => Err(InferenceError::InconsistentKb {
                name: name.to_string(),
            }),
        }
    }

    fn rule_base_mut(&mut self, name: &str) -> Result<&mut RuleBase, InferenceError> {
        match self.kbs.get_mut(name) {
            Some(KnowledgeBase::Rules(rb)) => Ok(rb),
            Some(_) => Err(InferenceError::InconsistentKb {
                name: name.to_string(),
            }),
            None => Err(InferenceError::UnknownKb {
                name: name.to_string(),
            }),
        }
    }

    pub fn add_fc_rule(&mut self, rule_base: &str, rule: FcRule) -> Result<(), InferenceError> {
        self.rule_base_mut(rule_base)?.add_fc_rule(rule);
        Ok(())
    }

    pub fn add_bc_rule(&mut self, rule_base: &str, rule: BcRule) -> Result<(), InferenceError> {
        self.rule_base_mut(rule_base)?.add_bc_rule(rule);
        Ok(())
    }

    // ---- facts ----------------------------------------------------------

    /// Loader entry point: universal facts persist across `reset`.
    pub fn add_universal_fact(
        &mut self,
        kb: &str,
        entity: &str,
        args: Vec<Value>,
    ) -> Result<bool, InferenceError> {
        let entity = self.dictionary.encode(entity);
        let added = self.get_create_facts(kb)?.add_universal(entity, args);
        if added {
            self.stats.num_facts_asserted += 1;
        }
        Ok(added)
    }

    /// Bulk loader entry point.
    pub fn add_universal_facts(
        &mut self,
        kb: &str,
        facts: Vec<(String, Fact)>,
    ) -> Result<usize, InferenceError> {
        let encoded: Vec<(u32, Fact)> = facts
            .into_iter()
            .map(|(entity, fact)| (self.dictionary.encode(&entity), fact))
            .collect();
        let added = self.get_create_facts(kb)?.universal.bulk_insert(encoded);
        self.stats.num_facts_asserted += added as u64;
        Ok(added)
    }

    /// Case-specific assertion (cleared by `reset`). Idempotent.
    pub fn assert_fact(
        &mut self,
        kb: &str,
        entity: u32,
        args: Vec<Value>,
    ) -> Result<bool, InferenceError> {
        let added = self.get_create_facts(kb)?.assert_fact(entity, args);
        if added {
            self.stats.num_facts_asserted += 1;
        }
        Ok(added)
    }

    // ---- dispatch -------------------------------------------------------

    fn kb_kind(&self, name: &str) -> Result<KbKind, InferenceError> {
        match self.get_kb(name)? {
            KnowledgeBase::Facts(_) => Ok(KbKind::Facts),
            KnowledgeBase::Rules(_) => Ok(KbKind::Rules),
            KnowledgeBase::Special(_) => Ok(KbKind::Special),
        }
    }

    /// Full prover dispatch: facts, BC rules, or specials.
    pub fn prove(
        &mut self,
        kb: &str,
        entity: u32,
        ctx: CtxHandle,
        args: &[Rc<Pattern>],
    ) -> Result<Proof, InferenceError> {
        self.stats.num_prove_calls += 1;
        match self.kb_kind(kb)? {
            KbKind::Facts => self.fact_lookup(kb, entity, ctx, args),
            KbKind::Rules => {
                let rules = self.collect_bc_rules(kb, entity)?;
                Ok(Proof::Goal(GoalProof::new(ctx, args.to_vec(), rules)))
            }
            KbKind::Special => self.special_proof(entity, ctx, args, true),
        }
    }

    /// Forward-chaining side dispatch: facts and lookup-capable specials
    /// only.
    pub fn lookup(
        &mut self,
        kb: &str,
        entity: u32,
        ctx: CtxHandle,
        args: &[Rc<Pattern>],
    ) -> Result<Proof, InferenceError> {
        match self.kb_kind(kb)? {
            KbKind::Facts => self.fact_lookup(kb, entity, ctx, args),
            KbKind::Rules => Err(InferenceError::ExternalError {
                detail: format!("rule base {} may not be used as a lookup target", kb),
            }),
            KbKind::Special => self.special_proof(entity, ctx, args, false),
        }
    }

    fn fact_lookup(
        &mut self,
        kb: &str,
        entity: u32,
        ctx: CtxHandle,
        args: &[Rc<Pattern>],
    ) -> Result<Proof, InferenceError> {
        let first = match args.first() {
            Some(pat) if unify::is_data(&self.arena, pat, ctx) => {
                let mut memo = DataMemo::default();
                Some(unify::as_data(
                    &self.arena,
                    pat,
                    ctx,
                    false,
                    &mut memo,
                    &self.variables,
                )?)
            }
            _ => None,
        };
        let KnowledgeBase::Facts(fb) = self.get_kb(kb)? else {
            unreachable!("fact_lookup dispatched on a non-fact kb");
        };
        let facts = fb.candidates(entity, args.len(), first.as_ref());
        Ok(Proof::Facts(FactLookup::new(ctx, args.to_vec(), facts)))
    }

    /// Candidate BC rules for an entity: the rule base's own, then its
    /// ancestor chain, in registration order. Entities in a rule base's
    /// excluded set are not inherited.
    fn collect_bc_rules(
        &self,
        kb: &str,
        entity: u32,
    ) -> Result<Vec<Rc<BcRule>>, InferenceError> {
        let mut out = Vec::new();
        let mut current = Some(kb.to_string());
        while let Some(name) = current {
            let kb = self.get_kb(&name)?;
            let KnowledgeBase::Rules(rb) = kb else {
                return Err(InferenceError::InconsistentKb { name });
            };
            out.extend(rb.rules_for(entity).iter().cloned());
            if !rb.inherits(entity) {
                break;
            }
            current = rb.parent.clone();
        }
        Ok(out)
    }

    fn special_proof(
        &mut self,
        entity: u32,
        ctx: CtxHandle,
        args: &[Rc<Pattern>],
        prove: bool,
    ) -> Result<Proof, InferenceError> {
        let runner = self.runner.clone();
        if entity == self.specials.claim_goal {
            if !prove {
                return Err(InferenceError::ExternalError {
                    detail: "special.claim_goal may not be used in forward chaining rules"
                        .to_string(),
                });
            }
            return Ok(Proof::ClaimGoal { state: 0 });
        }
        if entity == self.specials.check_command {
            return special::check_command(&self.arena, &self.variables, &*runner, ctx, args);
        }
        if entity == self.specials.command {
            return special::command(&self.arena, &self.variables, &*runner, ctx, args);
        }
        if entity == self.specials.general_command {
            return special::general_command(&self.arena, &self.variables, &*runner, ctx, args);
        }
        Err(InferenceError::ExternalError {
            detail: format!(
                "special.{} does not exist",
                self.dictionary.decode(entity).unwrap_or("?")
            ),
        })
    }

    // ---- lifecycle ------------------------------------------------------

    /// Run the FC rules of a rule base and its ancestors to quiescence.
    /// Re-activation is a no-op. Resets the statistics counters.
    pub fn activate(&mut self, rule_base: &str) -> Result<(), InferenceError> {
        self.stats.reset();
        let mut chain = Vec::new();
        let mut current = Some(rule_base.to_string());
        while let Some(name) = current {
            let KnowledgeBase::Rules(rb) = self.get_kb(&name)? else {
                return Err(InferenceError::InconsistentKb { name });
            };
            current = rb.parent.clone();
            chain.push(name);
        }
        chain.reverse(); // ancestors first

        let mut fresh = false;
        for name in &chain {
            let rb = self.rule_base_mut(name)?;
            if !rb.activated {
                rb.activated = true;
                fresh = true;
            }
        }
        if !fresh {
            debug!("rule base {} already active", rule_base);
            return Ok(());
        }
        info!("activating rule base {}", rule_base);
        forward::run_to_quiescence(self, &chain)
    }

    /// Clear case-specific facts, deactivate rule bases, reset counters,
    /// and drop every binding context.
    pub fn reset(&mut self) {
        for kb in self.kbs.values_mut() {
            match kb {
                KnowledgeBase::Facts(fb) => fb.reset(),
                KnowledgeBase::Rules(rb) => rb.activated = false,
                KnowledgeBase::Special(_) => {}
            }
        }
        self.stats.reset();
        self.arena.reset();
    }

    /// Seed a caller context with ground bindings (`prove_goal` keyword
    /// arguments). Names starting with '_' are ignored.
    pub fn seed_context(&mut self, ctx: CtxHandle, bindings: &[(&str, Value)]) {
        for (name, value) in bindings {
            if name.starts_with('_') {
                continue;
            }
            let id = self.variables.encode(name);
            self.arena.bind(ctx, id, ctx, Binding::Data(value.clone()));
        }
    }

    pub fn print_stats(&self) {
        println!("{}", self.stats);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
