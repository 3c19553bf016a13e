/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Plans are deferred program fragments captured as a by-product of
//! successful backward proofs. A rule's plan composes its premises'
//! step-numbered subplans with its own `with` fragments, unnumbered
//! fragments first, then ascending step number.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use shared::value::Value;

#[derive(Debug, Clone)]
pub enum PlanArg {
    Value(Value),
    Plan(Rc<Plan>),
}

#[derive(Debug, Clone)]
pub enum PlanBody {
    /// A fragment of source text plus the resolved bindings of the
    /// variables it references.
    Fragment {
        source: String,
        bindings: FxHashMap<String, PlanArg>,
    },
    /// A cooperating rule's plan, invoked at this position.
    Subplan(Rc<Plan>),
}

#[derive(Debug, Clone)]
pub struct PlanStep {
    pub step: Option<i64>,
    pub body: PlanBody,
}

#[derive(Debug, Clone)]
pub struct Plan {
    /// Name of the rule that produced this plan.
    pub rule: String,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn compose(rule: &str, mut steps: Vec<PlanStep>) -> Plan {
        // stable: unnumbered fragments keep their relative order up front
        steps.sort_by_key(|s| match s.step {
            None => (0u8, 0i64),
            Some(n) => (1, n),
        });
        Plan {
            rule: rule.to_string(),
            steps,
        }
    }

    /// The fragment sequence in invocation order, subplans inlined.
    pub fn flatten(&self) -> Vec<(&str, &FxHashMap<String, PlanArg>)> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<(&'a str, &'a FxHashMap<String, PlanArg>)>) {
        for step in &self.steps {
            match &step.body {
                PlanBody::Fragment { source, bindings } => out.push((source.as_str(), bindings)),
                PlanBody::Subplan(sub) => sub.collect(out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(source: &str) -> PlanBody {
        PlanBody::Fragment {
            source: source.to_string(),
            bindings: FxHashMap::default(),
        }
    }

    #[test]
    fn test_compose_orders_unnumbered_first() {
        let plan = Plan::compose(
            "r",
            vec![
                PlanStep {
                    step: Some(2),
                    body: fragment("second"),
                },
                PlanStep {
                    step: None,
                    body: fragment("prelude"),
                },
                PlanStep {
                    step: Some(1),
                    body: fragment("first"),
                },
            ],
        );
        let sources: Vec<&str> = plan.flatten().into_iter().map(|(s, _)| s).collect();
        assert_eq!(sources, vec!["prelude", "first", "second"]);
    }

    #[test]
    fn test_flatten_inlines_subplans() {
        let inner = Rc::new(Plan::compose(
            "inner",
            vec![PlanStep {
                step: None,
                body: fragment("inner body"),
            }],
        ));
        let plan = Plan::compose(
            "outer",
            vec![
                PlanStep {
                    step: Some(1),
                    body: PlanBody::Subplan(inner),
                },
                PlanStep {
                    step: Some(2),
                    body: fragment("outer body"),
                },
            ],
        );
        let sources: Vec<&str> = plan.flatten().into_iter().map(|(s, _)| s).collect();
        assert_eq!(sources, vec!["inner body", "outer body"]);
    }
}
