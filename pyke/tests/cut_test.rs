extern crate pyke;
use pyke::*;

#[cfg(test)]
mod tests {
    use super::*;

    /// p has three solutions, q succeeds for each of them.
    fn choices_engine() -> Engine {
        let mut engine = Engine::new();
        for n in 1..=3 {
            engine
                .add_universal_fact("data", "p", vec![Value::Int(n)])
                .unwrap();
            engine
                .add_universal_fact("data", "q", vec![Value::Int(n)])
                .unwrap();
        }
        engine.get_create_rule_base("choices", None, &[]).unwrap();
        engine
    }

    fn claim_goal_premise(engine: &mut Engine) -> Premise {
        let claim_goal = engine.entity("claim_goal");
        Premise::goal(SPECIAL_KB, claim_goal, vec![])
    }

    #[test]
    fn test_first_cuts_inner_alternatives() {
        let mut engine = choices_engine();
        let p = engine.entity("p");
        let pick = engine.entity("pick");
        let x = engine.var("x");
        engine
            .add_bc_rule(
                "choices",
                BcRule {
                    name: "choices.pick".to_string(),
                    entity: pick,
                    goal: vec![x.clone()],
                    when: vec![Premise::First(vec![Premise::goal(
                        "data",
                        p,
                        vec![x.clone()],
                    )])],
                    fragments: vec![],
                },
            )
            .unwrap();

        let x = engine.var("x");
        let goal = Goal::new(&mut engine, "choices", "pick", vec![x]);
        let values: Vec<Value> = goal
            .prove(&mut engine)
            .unwrap()
            .map(|r| r.unwrap().0["x"].clone())
            .collect();
        assert_eq!(values, vec![Value::Int(1)]);
        assert_eq!(engine.arena.num_live(), 0);
    }

    #[test]
    fn test_claim_goal_commits_one_solution() {
        let mut engine = choices_engine();
        let p = engine.entity("p");
        let q = engine.entity("q");
        let pick = engine.entity("pick");
        let x = engine.var("x");
        let claim = claim_goal_premise(&mut engine);
        engine
            .add_bc_rule(
                "choices",
                BcRule {
                    name: "choices.pick".to_string(),
                    entity: pick,
                    goal: vec![x.clone()],
                    when: vec![
                        Premise::First(vec![Premise::goal("data", p, vec![x.clone()])]),
                        Premise::goal("data", q, vec![x.clone()]),
                        claim,
                    ],
                    fragments: vec![],
                },
            )
            .unwrap();

        let x = engine.var("x");
        let goal = Goal::new(&mut engine, "choices", "pick", vec![x]);
        let values: Vec<Value> = goal
            .prove(&mut engine)
            .unwrap()
            .map(|r| r.unwrap().0["x"].clone())
            .collect();
        // one success, not three
        assert_eq!(values, vec![Value::Int(1)]);
        assert_eq!(engine.arena.num_live(), 0);
    }

    #[test]
    fn test_claim_goal_suppresses_remaining_rules() {
        let mut engine = choices_engine();
        let p = engine.entity("p");
        let pick = engine.entity("pick");
        let x = engine.var("x");
        let claim = claim_goal_premise(&mut engine);
        engine
            .add_bc_rule(
                "choices",
                BcRule {
                    name: "choices.pick_first".to_string(),
                    entity: pick,
                    goal: vec![x.clone()],
                    when: vec![Premise::goal("data", p, vec![x.clone()]), claim],
                    fragments: vec![],
                },
            )
            .unwrap();
        // a second rule that would otherwise add a solution
        engine
            .add_bc_rule(
                "choices",
                BcRule {
                    name: "choices.pick_fallback".to_string(),
                    entity: pick,
                    goal: vec![x.clone()],
                    when: vec![],
                    fragments: vec![],
                },
            )
            .unwrap();

        let x = engine.var("x");
        let goal = Goal::new(&mut engine, "choices", "pick", vec![x]);
        let values: Vec<Value> = goal
            .prove(&mut engine)
            .unwrap()
            .map(|r| r.unwrap().0["x"].clone())
            .collect();
        assert_eq!(values, vec![Value::Int(1)]);
    }

    #[test]
    fn test_without_cut_all_solutions_enumerate() {
        let mut engine = choices_engine();
        let p = engine.entity("p");
        let q = engine.entity("q");
        let pick = engine.entity("pick");
        let x = engine.var("x");
        engine
            .add_bc_rule(
                "choices",
                BcRule {
                    name: "choices.pick".to_string(),
                    entity: pick,
                    goal: vec![x.clone()],
                    when: vec![
                        Premise::goal("data", p, vec![x.clone()]),
                        Premise::goal("data", q, vec![x.clone()]),
                    ],
                    fragments: vec![],
                },
            )
            .unwrap();

        let x = engine.var("x");
        let goal = Goal::new(&mut engine, "choices", "pick", vec![x]);
        assert_eq!(goal.prove(&mut engine).unwrap().count(), 3);
    }

    #[test]
    fn test_claim_goal_cut_confined_to_its_goal() {
        // the cut ends the inner goal, the outer goal keeps enumerating
        let mut engine = choices_engine();
        let p = engine.entity("p");
        let pick = engine.entity("pick");
        let outer = engine.entity("outer");
        let x = engine.var("x");
        let y = engine.var("y");
        let claim = claim_goal_premise(&mut engine);
        engine
            .add_bc_rule(
                "choices",
                BcRule {
                    name: "choices.pick".to_string(),
                    entity: pick,
                    goal: vec![x.clone()],
                    when: vec![Premise::goal("data", p, vec![x.clone()]), claim],
                    fragments: vec![],
                },
            )
            .unwrap();
        engine
            .add_bc_rule(
                "choices",
                BcRule {
                    name: "choices.outer".to_string(),
                    entity: outer,
                    goal: vec![x.clone(), y.clone()],
                    when: vec![
                        Premise::goal("choices", pick, vec![x.clone()]),
                        Premise::goal("data", p, vec![y.clone()]),
                    ],
                    fragments: vec![],
                },
            )
            .unwrap();

        let x = engine.var("x");
        let y = engine.var("y");
        let goal = Goal::new(&mut engine, "choices", "outer", vec![x, y]);
        let pairs: Vec<(Value, Value)> = goal
            .prove(&mut engine)
            .unwrap()
            .map(|r| {
                let b = r.unwrap().0;
                (b["x"].clone(), b["y"].clone())
            })
            .collect();
        // pick contributes x=1 only; y still enumerates freely
        assert_eq!(
            pairs,
            vec![
                (Value::Int(1), Value::Int(1)),
                (Value::Int(1), Value::Int(2)),
                (Value::Int(1), Value::Int(3)),
            ]
        );
    }
}
