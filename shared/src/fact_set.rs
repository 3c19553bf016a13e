/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::value::Value;

pub type Fact = Vec<Value>;

/// Per-entity indexed fact storage. Facts keep insertion order (enumeration
/// order is part of the prover's contract), a duplicate set makes insertion
/// idempotent, and a first-argument index narrows candidate scans when the
/// leading pattern is ground.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FactSet {
    by_entity: FxHashMap<u32, EntityFacts>,
    num_facts: usize,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct EntityFacts {
    facts: Vec<Fact>,
    seen: FxHashSet<Fact>,
    by_first: FxHashMap<Value, Vec<usize>>,
}

impl EntityFacts {
    fn insert(&mut self, fact: Fact) -> bool {
        if self.seen.contains(&fact) {
            return false;
        }
        let idx = self.facts.len();
        if let Some(first) = fact.first() {
            self.by_first.entry(first.clone()).or_default().push(idx);
        }
        self.seen.insert(fact.clone());
        self.facts.push(fact);
        true
    }
}

impl FactSet {
    pub fn new() -> Self {
        FactSet::default()
    }

    /// Insert a fact; returns false if it was already stored.
    pub fn insert(&mut self, entity: u32, fact: Fact) -> bool {
        let inserted = self.by_entity.entry(entity).or_default().insert(fact);
        if inserted {
            self.num_facts += 1;
        }
        inserted
    }

    pub fn contains(&self, entity: u32, fact: &Fact) -> bool {
        self.by_entity
            .get(&entity)
            .map_or(false, |ef| ef.seen.contains(fact))
    }

    /// Snapshot of the facts an entity lookup should try, in insertion
    /// order, narrowed by arity and (when known) by the first argument.
    pub fn candidates(&self, entity: u32, arity: usize, first: Option<&Value>) -> Vec<Fact> {
        let Some(ef) = self.by_entity.get(&entity) else {
            return Vec::new();
        };
        match first {
            Some(value) if arity > 0 => {
                let Some(idxs) = ef.by_first.get(value) else {
                    return Vec::new();
                };
                idxs.iter()
                    .map(|&i| &ef.facts[i])
                    .filter(|f| f.len() == arity)
                    .cloned()
                    .collect()
            }
            _ => ef
                .facts
                .iter()
                .filter(|f| f.len() == arity)
                .cloned()
                .collect(),
        }
    }

    pub fn facts(&self, entity: u32) -> &[Fact] {
        self.by_entity
            .get(&entity)
            .map_or(&[][..], |ef| ef.facts.as_slice())
    }

    pub fn entities(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_entity.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.num_facts
    }

    pub fn is_empty(&self) -> bool {
        self.num_facts == 0
    }

    pub fn clear(&mut self) {
        self.by_entity.clear();
        self.num_facts = 0;
    }

    /// Bulk load, partitioning by entity in parallel before the sequential
    /// index inserts. Meant for large universal-fact loads.
    pub fn bulk_insert(&mut self, facts: Vec<(u32, Fact)>) -> usize {
        use rayon::prelude::*;

        let groups: FxHashMap<u32, Vec<Fact>> = facts
            .into_par_iter()
            .fold(FxHashMap::<u32, Vec<Fact>>::default, |mut acc, (e, f)| {
                acc.entry(e).or_default().push(f);
                acc
            })
            .reduce(FxHashMap::default, |mut left, right| {
                for (e, fs) in right {
                    left.entry(e).or_default().extend(fs);
                }
                left
            });

        let mut inserted = 0;
        for (entity, fs) in groups {
            for fact in fs {
                if self.insert(entity, fact) {
                    inserted += 1;
                }
            }
        }
        inserted
    }
}
