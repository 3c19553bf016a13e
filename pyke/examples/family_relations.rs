/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Family relations, both ways: a forward-chaining rule derives parent
//! facts at activation, a pair of backward-chaining rules proves ancestors
//! on demand.

use pyke::*;

fn main() {
    let mut engine = Engine::new();

    for (f, c) in [
        ("abe", "homer"),
        ("homer", "bart"),
        ("homer", "lisa"),
        ("bart", "rod"),
    ] {
        engine
            .add_universal_fact("family", "father", vec![Value::str(f), Value::str(c)])
            .unwrap();
    }

    engine.get_create_rule_base("relations", None, &[]).unwrap();
    let father = engine.entity("father");
    let parent = engine.entity("parent");
    let ancestor = engine.entity("ancestor");

    let p = engine.var("p");
    let c = engine.var("c");
    engine
        .add_fc_rule(
            "relations",
            FcRule {
                name: "relations.parent".to_string(),
                foreach: vec![Premise::goal("family", father, vec![p.clone(), c.clone()])],
                assertions: vec![Assertion::Fact {
                    kb: "family".to_string(),
                    entity: parent,
                    args: vec![p.clone(), c.clone()],
                }],
            },
        )
        .unwrap();

    let a = engine.var("a");
    let d = engine.var("d");
    let x = engine.var("x");
    engine
        .add_bc_rule(
            "relations",
            BcRule {
                name: "relations.ancestor_direct".to_string(),
                entity: ancestor,
                goal: vec![a.clone(), d.clone()],
                when: vec![Premise::goal("family", parent, vec![a.clone(), d.clone()])],
                fragments: vec![],
            },
        )
        .unwrap();
    engine
        .add_bc_rule(
            "relations",
            BcRule {
                name: "relations.ancestor_step".to_string(),
                entity: ancestor,
                goal: vec![a.clone(), d.clone()],
                when: vec![
                    Premise::goal("family", parent, vec![a.clone(), x.clone()]),
                    Premise::goal("relations", ancestor, vec![x.clone(), d.clone()]),
                ],
                fragments: vec![],
            },
        )
        .unwrap();

    engine.activate("relations").unwrap();

    let who = engine.var("who");
    let rod = engine.sym("rod");
    let goal = Goal::new(&mut engine, "relations", "ancestor", vec![who, rod]);
    println!("ancestors of rod:");
    for solution in goal.prove(&mut engine).unwrap() {
        let (bindings, _) = solution.unwrap();
        println!("  {}", bindings["who"]);
    }

    engine.print_stats();
}
