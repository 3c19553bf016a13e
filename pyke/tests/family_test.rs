extern crate pyke;
use pyke::*;

#[cfg(test)]
mod tests {
    use super::*;

    /// father facts plus the parent/ancestor backward rules.
    fn family_engine() -> Engine {
        let mut engine = Engine::new();
        engine
            .add_universal_fact(
                "family",
                "father",
                vec![Value::str("abe"), Value::str("homer")],
            )
            .unwrap();
        engine
            .add_universal_fact(
                "family",
                "father",
                vec![Value::str("homer"), Value::str("bart")],
            )
            .unwrap();
        engine.get_create_rule_base("relations", None, &[]).unwrap();

        let father = engine.entity("father");
        let parent = engine.entity("parent");
        let ancestor = engine.entity("ancestor");
        let p = engine.var("p");
        let c = engine.var("c");
        engine
            .add_bc_rule(
                "relations",
                BcRule {
                    name: "relations.parent".to_string(),
                    entity: parent,
                    goal: vec![p.clone(), c.clone()],
                    when: vec![Premise::goal("family", father, vec![p.clone(), c.clone()])],
                    fragments: vec![],
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
                    when: vec![Premise::goal("relations", parent, vec![a.clone(), d.clone()])],
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
                        Premise::goal("relations", parent, vec![a.clone(), x.clone()]),
                        Premise::goal("relations", ancestor, vec![x.clone(), d.clone()]),
                    ],
                    fragments: vec![],
                },
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_parent_of_bart() {
        let mut engine = family_engine();
        let p = engine.var("p");
        let bart = engine.sym("bart");
        let goal = Goal::new(&mut engine, "relations", "parent", vec![p, bart]);
        let solutions: Vec<_> = goal
            .prove(&mut engine)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].0["p"], Value::str("homer"));
        assert!(solutions[0].1.is_none());
    }

    #[test]
    fn test_ancestors_of_bart_in_order() {
        let mut engine = family_engine();
        let a = engine.var("a");
        let bart = engine.sym("bart");
        let goal = Goal::new(&mut engine, "relations", "ancestor", vec![a, bart]);
        let names: Vec<Value> = goal
            .prove(&mut engine)
            .unwrap()
            .map(|r| r.unwrap().0["a"].clone())
            .collect();
        assert_eq!(names, vec![Value::str("homer"), Value::str("abe")]);
    }

    #[test]
    fn test_ground_query_round_trip() {
        let mut engine = family_engine();
        let abe = engine.sym("abe");
        let homer = engine.sym("homer");
        let goal = Goal::new(&mut engine, "family", "father", vec![abe, homer]);
        assert!(goal.prove_first(&mut engine).unwrap().is_some());

        // same fact through fully-variable patterns
        let x = engine.var("x");
        let y = engine.var("y");
        let goal = Goal::new(&mut engine, "family", "father", vec![x, y]);
        let all: Vec<_> = goal
            .prove(&mut engine)
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["x"], Value::str("abe"));
        assert_eq!(all[0]["y"], Value::str("homer"));
    }

    #[test]
    fn test_exhausted_proof_unwinds_all_bindings() {
        let mut engine = family_engine();
        let a = engine.var("a");
        let bart = engine.sym("bart");
        let goal = Goal::new(&mut engine, "relations", "ancestor", vec![a, bart]);
        {
            let solutions = goal.prove(&mut engine).unwrap();
            for result in solutions {
                result.unwrap();
            }
        }
        assert_eq!(engine.arena.num_live(), 0);
    }

    #[test]
    fn test_abandoned_proof_unwinds_on_drop() {
        let mut engine = family_engine();
        let a = engine.var("a");
        let bart = engine.sym("bart");
        let goal = Goal::new(&mut engine, "relations", "ancestor", vec![a, bart]);
        {
            let mut solutions = goal.prove(&mut engine).unwrap();
            let first = solutions.next().unwrap().unwrap();
            assert_eq!(first.0["a"], Value::str("homer"));
            // dropped mid-enumeration
        }
        assert_eq!(engine.arena.num_live(), 0);
    }

    #[test]
    fn test_prove_with_seeds_bindings() {
        let mut engine = family_engine();
        let p = engine.var("p");
        let c = engine.var("c");
        let goal = Goal::new(&mut engine, "relations", "parent", vec![p, c]);
        let solutions: Vec<_> = goal
            .prove_with(&mut engine, &[("p", Value::str("homer"))])
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0]["c"], Value::str("bart"));
    }

    #[test]
    fn test_notany_negation() {
        let mut engine = Engine::new();
        engine
            .add_universal_fact(
                "prefs",
                "likes",
                vec![Value::str("alice"), Value::str("tea")],
            )
            .unwrap();
        engine.get_create_rule_base("feelings", None, &[]).unwrap();
        let likes = engine.entity("likes");
        let hates = engine.entity("hates");
        let x = engine.var("x");
        let y = engine.var("y");
        engine
            .add_bc_rule(
                "feelings",
                BcRule {
                    name: "feelings.hates".to_string(),
                    entity: hates,
                    goal: vec![x.clone(), y.clone()],
                    when: vec![Premise::NotAny(vec![Premise::goal(
                        "prefs",
                        likes,
                        vec![x.clone(), y.clone()],
                    )])],
                    fragments: vec![],
                },
            )
            .unwrap();

        let alice = engine.sym("alice");
        let tea = engine.sym("tea");
        let goal = Goal::new(&mut engine, "feelings", "hates", vec![alice, tea]);
        assert!(goal.prove_first(&mut engine).unwrap().is_none());

        let alice = engine.sym("alice");
        let coffee = engine.sym("coffee");
        let goal = Goal::new(&mut engine, "feelings", "hates", vec![alice, coffee]);
        assert!(goal.prove_first(&mut engine).unwrap().is_some());
        assert_eq!(engine.arena.num_live(), 0);
    }

    #[test]
    fn test_forall_requires_every_solution() {
        let mut engine = Engine::new();
        for (p, c) in [("homer", "bart"), ("homer", "lisa"), ("ned", "rod")] {
            engine
                .add_universal_fact("family", "parent", vec![Value::str(p), Value::str(c)])
                .unwrap();
        }
        engine
            .add_universal_fact("family", "male", vec![Value::str("bart")])
            .unwrap();
        engine
            .add_universal_fact("family", "male", vec![Value::str("rod")])
            .unwrap();

        engine.get_create_rule_base("relations", None, &[]).unwrap();
        let parent = engine.entity("parent");
        let male = engine.entity("male");
        let only_sons = engine.entity("only_sons");
        let f = engine.var("f");
        let c = engine.var("c");
        engine
            .add_bc_rule(
                "relations",
                BcRule {
                    name: "relations.only_sons".to_string(),
                    entity: only_sons,
                    goal: vec![f.clone()],
                    when: vec![Premise::Forall {
                        gen: vec![Premise::goal("family", parent, vec![f.clone(), c.clone()])],
                        require: vec![Premise::goal("family", male, vec![c.clone()])],
                    }],
                    fragments: vec![],
                },
            )
            .unwrap();

        // lisa is not male, so homer fails; ned qualifies
        let homer = engine.sym("homer");
        let goal = Goal::new(&mut engine, "relations", "only_sons", vec![homer]);
        assert!(goal.prove_first(&mut engine).unwrap().is_none());

        let ned = engine.sym("ned");
        let goal = Goal::new(&mut engine, "relations", "only_sons", vec![ned]);
        let solution = goal.prove_first(&mut engine).unwrap().unwrap();
        // neither the generator's nor the requirement's bindings escape
        assert!(!solution.0.contains_key("c"));
        assert_eq!(engine.arena.num_live(), 0);
    }

    #[test]
    fn test_tuple_rest_pattern_in_facts() {
        let mut engine = Engine::new();
        engine
            .add_universal_fact(
                "lists",
                "path",
                vec![
                    Value::str("start"),
                    Value::tuple(vec![Value::str("a"), Value::str("b"), Value::str("c")]),
                ],
            )
            .unwrap();
        let head = engine.var("head");
        let tail = engine.var("tail");
        let start = engine.sym("start");
        let steps = Pattern::tuple_with_rest(vec![head], tail);
        let goal = Goal::new(&mut engine, "lists", "path", vec![start, steps]);
        let (bindings, _) = goal.prove_first(&mut engine).unwrap().unwrap();
        assert_eq!(bindings["head"], Value::str("a"));
        assert_eq!(
            bindings["tail"],
            Value::tuple(vec![Value::str("b"), Value::str("c")])
        );
    }
}
