extern crate pyke;
use pyke::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn father_facts(engine: &mut Engine) {
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
    }

    /// foreach father($p, $c) assert parent($p, $c)
    fn parent_fc_rule(engine: &mut Engine) -> FcRule {
        let father = engine.entity("father");
        let parent = engine.entity("parent");
        let p = engine.var("p");
        let c = engine.var("c");
        FcRule {
            name: "fc_family.parent".to_string(),
            foreach: vec![Premise::goal("family", father, vec![p.clone(), c.clone()])],
            assertions: vec![Assertion::Fact {
                kb: "family".to_string(),
                entity: parent,
                args: vec![p, c],
            }],
        }
    }

    #[test]
    fn test_fc_closure_asserts_parents() {
        let mut engine = Engine::new();
        father_facts(&mut engine);
        engine.get_create_rule_base("fc_family", None, &[]).unwrap();
        let rule = parent_fc_rule(&mut engine);
        engine.add_fc_rule("fc_family", rule).unwrap();

        engine.activate("fc_family").unwrap();
        assert_eq!(engine.stats.num_fc_rules_triggered, 2);

        let p = engine.var("p");
        let c = engine.var("c");
        let goal = Goal::new(&mut engine, "family", "parent", vec![p, c]);
        let pairs: Vec<_> = goal
            .prove(&mut engine)
            .unwrap()
            .map(|r| {
                let b = r.unwrap().0;
                (b["p"].clone(), b["c"].clone())
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                (Value::str("abe"), Value::str("homer")),
                (Value::str("homer"), Value::str("bart")),
            ]
        );
    }

    #[test]
    fn test_second_activation_is_noop() {
        let mut engine = Engine::new();
        father_facts(&mut engine);
        engine.get_create_rule_base("fc_family", None, &[]).unwrap();
        let rule = parent_fc_rule(&mut engine);
        engine.add_fc_rule("fc_family", rule).unwrap();

        engine.activate("fc_family").unwrap();
        let facts_after_first = match engine.get_kb("family").unwrap() {
            KnowledgeBase::Facts(fb) => fb.num_facts(),
            _ => unreachable!(),
        };

        engine.activate("fc_family").unwrap();
        let facts_after_second = match engine.get_kb("family").unwrap() {
            KnowledgeBase::Facts(fb) => fb.num_facts(),
            _ => unreachable!(),
        };
        assert_eq!(facts_after_first, facts_after_second);
        assert_eq!(engine.stats.num_fc_rules_triggered, 0);
    }

    #[test]
    fn test_transitive_closure_reaches_quiescence() {
        let mut engine = Engine::new();
        for (p, c) in [("a", "b"), ("b", "c"), ("c", "d")] {
            engine
                .add_universal_fact("graph", "edge", vec![Value::str(p), Value::str(c)])
                .unwrap();
        }
        engine.get_create_rule_base("closure", None, &[]).unwrap();
        let edge = engine.entity("edge");
        let reach = engine.entity("reach");
        let x = engine.var("x");
        let y = engine.var("y");
        let z = engine.var("z");
        engine
            .add_fc_rule(
                "closure",
                FcRule {
                    name: "closure.base".to_string(),
                    foreach: vec![Premise::goal("graph", edge, vec![x.clone(), y.clone()])],
                    assertions: vec![Assertion::Fact {
                        kb: "graph".to_string(),
                        entity: reach,
                        args: vec![x.clone(), y.clone()],
                    }],
                },
            )
            .unwrap();
        engine
            .add_fc_rule(
                "closure",
                FcRule {
                    name: "closure.step".to_string(),
                    foreach: vec![
                        Premise::goal("graph", edge, vec![x.clone(), y.clone()]),
                        Premise::goal("graph", reach, vec![y.clone(), z.clone()]),
                    ],
                    assertions: vec![Assertion::Fact {
                        kb: "graph".to_string(),
                        entity: reach,
                        args: vec![x.clone(), z.clone()],
                    }],
                },
            )
            .unwrap();

        engine.activate("closure").unwrap();
        let u = engine.var("u");
        let v = engine.var("v");
        let goal = Goal::new(&mut engine, "graph", "reach", vec![u, v]);
        let count = goal.prove(&mut engine).unwrap().count();
        // a->b, b->c, c->d, a->c, b->d, a->d
        assert_eq!(count, 6);
    }

    #[test]
    fn test_fc_assertions_are_case_specific() {
        let mut engine = Engine::new();
        father_facts(&mut engine);
        engine.get_create_rule_base("fc_family", None, &[]).unwrap();
        let rule = parent_fc_rule(&mut engine);
        engine.add_fc_rule("fc_family", rule).unwrap();
        engine.activate("fc_family").unwrap();

        engine.reset();
        // universal father facts survive, derived parent facts do not
        let p = engine.var("p");
        let c = engine.var("c");
        let goal = Goal::new(&mut engine, "family", "parent", vec![p, c]);
        assert_eq!(goal.prove(&mut engine).unwrap().count(), 0);
        let p = engine.var("p");
        let c = engine.var("c");
        let goal = Goal::new(&mut engine, "family", "father", vec![p, c]);
        assert_eq!(goal.prove(&mut engine).unwrap().count(), 2);

        // deactivated by reset, so activation fires again
        engine.activate("fc_family").unwrap();
        assert_eq!(engine.stats.num_fc_rules_triggered, 2);
    }

    #[test]
    fn test_extern_assertions_fire_once_per_combination() {
        let mut engine = Engine::new();
        father_facts(&mut engine);
        engine.get_create_rule_base("fc_family", None, &[]).unwrap();
        let father = engine.entity("father");
        let parent = engine.entity("parent");
        let p = engine.var("p");
        let c = engine.var("c");
        let p_id = p.var_id().unwrap();
        let c_id = c.var_id().unwrap();

        let seen: Rc<RefCell<Vec<(Value, Value)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let run = ExternRun::new(move |scope| {
            sink.borrow_mut()
                .push((scope.get("p")?, scope.get("c")?));
            Ok(())
        });
        engine
            .add_fc_rule(
                "fc_family",
                FcRule {
                    name: "fc_family.notify".to_string(),
                    foreach: vec![Premise::goal("family", father, vec![p.clone(), c.clone()])],
                    assertions: vec![
                        Assertion::Fact {
                            kb: "family".to_string(),
                            entity: parent,
                            args: vec![p, c],
                        },
                        Assertion::Extern {
                            run,
                            vars: vec![p_id, c_id],
                        },
                    ],
                },
            )
            .unwrap();

        engine.activate("fc_family").unwrap();
        // the fixpoint loop revisits the combinations, the hook fires once
        // for each
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(
            seen.borrow()[0],
            (Value::str("abe"), Value::str("homer"))
        );
    }

    #[test]
    fn test_parent_rule_base_activates_with_child() {
        let mut engine = Engine::new();
        father_facts(&mut engine);
        engine.get_create_rule_base("base_rb", None, &[]).unwrap();
        let rule = parent_fc_rule(&mut engine);
        engine.add_fc_rule("base_rb", rule).unwrap();
        engine
            .get_create_rule_base("derived_rb", Some("base_rb"), &[])
            .unwrap();

        engine.activate("derived_rb").unwrap();
        let p = engine.var("p");
        let c = engine.var("c");
        let goal = Goal::new(&mut engine, "family", "parent", vec![p, c]);
        assert_eq!(goal.prove(&mut engine).unwrap().count(), 2);
    }
}
