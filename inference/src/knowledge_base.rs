/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use shared::fact_set::{Fact, FactSet};
use shared::rule::{BcRule, FcRule};
use shared::value::Value;

/// A named knowledge base: facts, FC/BC rules, or built-ins.
#[derive(Debug, Clone)]
pub enum KnowledgeBase {
    Facts(FactBase),
    Rules(RuleBase),
    Special(SpecialBase),
}

impl KnowledgeBase {
    pub fn name(&self) -> &str {
        match self {
            KnowledgeBase::Facts(fb) => &fb.name,
            KnowledgeBase::Rules(rb) => &rb.name,
            KnowledgeBase::Special(sb) => &sb.name,
        }
    }
}

/// Fact storage split into universal facts (persist across `reset`) and
/// case-specific facts (cleared on `reset`).
#[derive(Debug, Clone, Default)]
pub struct FactBase {
    pub name: String,
    pub universal: FactSet,
    pub case_specific: FactSet,
}

impl FactBase {
    pub fn new(name: &str) -> Self {
        FactBase {
            name: name.to_string(),
            ..FactBase::default()
        }
    }

    fn known(&self, entity: u32, fact: &Fact) -> bool {
        self.universal.contains(entity, fact) || self.case_specific.contains(entity, fact)
    }

    /// Idempotent universal insert; returns true if the fact was new.
    pub fn add_universal(&mut self, entity: u32, fact: Fact) -> bool {
        if self.known(entity, &fact) {
            return false;
        }
        self.universal.insert(entity, fact)
    }

    /// Idempotent case-specific insert; returns true if the fact was new.
    pub fn assert_fact(&mut self, entity: u32, fact: Fact) -> bool {
        if self.known(entity, &fact) {
            return false;
        }
        self.case_specific.insert(entity, fact)
    }

    /// Universal facts first, then case-specific, both in insertion order.
    pub fn candidates(&self, entity: u32, arity: usize, first: Option<&Value>) -> Vec<Fact> {
        let mut out = self.universal.candidates(entity, arity, first);
        out.extend(self.case_specific.candidates(entity, arity, first));
        out
    }

    pub fn num_facts(&self) -> usize {
        self.universal.len() + self.case_specific.len()
    }

    pub fn reset(&mut self) {
        self.case_specific.clear();
    }
}

/// FC and BC rules under a common namespace, with optional parent
/// inheritance. Entities listed in `excluded` are not looked up in the
/// parent chain.
#[derive(Debug, Clone, Default)]
pub struct RuleBase {
    pub name: String,
    pub parent: Option<String>,
    pub excluded: FxHashSet<u32>,
    pub fc_rules: Vec<Rc<FcRule>>,
    pub bc_rules: FxHashMap<u32, Vec<Rc<BcRule>>>,
    pub activated: bool,
}

impl RuleBase {
    pub fn new(name: &str, parent: Option<String>, excluded: FxHashSet<u32>) -> Self {
        RuleBase {
            name: name.to_string(),
            parent,
            excluded,
            ..RuleBase::default()
        }
    }

    pub fn add_fc_rule(&mut self, rule: FcRule) {
        self.fc_rules.push(Rc::new(rule));
    }

    pub fn add_bc_rule(&mut self, rule: BcRule) {
        self.bc_rules.entry(rule.entity).or_default().push(Rc::new(rule));
    }

    /// This rule base's own rules for an entity, in registration order.
    pub fn rules_for(&self, entity: u32) -> &[Rc<BcRule>] {
        self.bc_rules.get(&entity).map_or(&[][..], |v| v.as_slice())
    }

    pub fn inherits(&self, entity: u32) -> bool {
        !self.excluded.contains(&entity)
    }
}

/// Marker for the built-in knowledge base; dispatch happens on entity ids
/// held by the engine.
#[derive(Debug, Clone)]
pub struct SpecialBase {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_base_dedups_across_classes() {
        let mut fb = FactBase::new("family");
        let fact = vec![Value::str("abe"), Value::str("homer")];
        assert!(fb.add_universal(0, fact.clone()));
        assert!(!fb.assert_fact(0, fact.clone()));
        assert_eq!(fb.num_facts(), 1);
        fb.reset();
        assert_eq!(fb.num_facts(), 1);
    }

    #[test]
    fn test_reset_clears_case_specific_only() {
        let mut fb = FactBase::new("family");
        fb.add_universal(0, vec![Value::str("u")]);
        fb.assert_fact(0, vec![Value::str("c")]);
        assert_eq!(fb.num_facts(), 2);
        fb.reset();
        assert_eq!(fb.num_facts(), 1);
        // a cleared fact may be asserted again
        assert!(fb.assert_fact(0, vec![Value::str("c")]));
    }

    #[test]
    fn test_candidates_universal_before_case_specific() {
        let mut fb = FactBase::new("family");
        fb.assert_fact(0, vec![Value::str("case")]);
        fb.add_universal(0, vec![Value::str("universal")]);
        let all = fb.candidates(0, 1, None);
        assert_eq!(all[0], vec![Value::str("universal")]);
        assert_eq!(all[1], vec![Value::str("case")]);
    }
}
