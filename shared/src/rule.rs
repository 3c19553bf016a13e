/*
 * Copyright © 2024 ladroid
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::rc::Rc;

use crate::error::InferenceError;
use crate::pattern::{Pattern, VarId};
use crate::value::Value;

/// Read-only view of a rule's resolved bindings, handed to user-supplied
/// hooks. Implemented by the engine's binding contexts.
pub trait BindingScope {
    fn get(&self, name: &str) -> Result<Value, InferenceError>;
}

macro_rules! extern_hook {
    ($name:ident, $out:ty, $label:expr) => {
        #[derive(Clone)]
        pub struct $name(pub Rc<dyn Fn(&dyn BindingScope) -> Result<$out, InferenceError>>);

        impl $name {
            pub fn new<F>(f: F) -> Self
            where
                F: Fn(&dyn BindingScope) -> Result<$out, InferenceError> + 'static,
            {
                $name(Rc::new(f))
            }

            pub fn call(&self, scope: &dyn BindingScope) -> Result<$out, InferenceError> {
                (self.0)(scope)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str($label)
            }
        }
    };
}

extern_hook!(ExternEval, Value, "<extern eval>");
extern_hook!(ExternIter, Vec<Value>, "<extern iter>");
extern_hook!(ExternTest, bool, "<extern test>");
extern_hook!(ExternRun, (), "<extern run>");

/// How a goal premise treats the plan its subgoal may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSpec {
    /// `as $name`: the child plan is bound into the rule context.
    AsVar(VarId),
    /// `step N`: the child plan is composed into this rule's plan at step N.
    Step(i64),
}

/// One step of a rule's `when`/`foreach` list.
#[derive(Debug, Clone)]
pub enum Premise {
    Goal {
        kb: String,
        entity: u32,
        args: Vec<Rc<Pattern>>,
        plan_spec: Option<PlanSpec>,
        required: bool,
    },
    /// Cut after the first solution of the inner list.
    First(Vec<Premise>),
    /// Succeeds iff the inner list has no solution; leaks no bindings.
    NotAny(Vec<Premise>),
    /// Succeeds iff every solution of `gen` satisfies `require` at least
    /// once; leaks no bindings.
    Forall {
        gen: Vec<Premise>,
        require: Vec<Premise>,
    },
    /// `$x = f(..)`
    Bind { pat: Rc<Pattern>, eval: ExternEval },
    /// `$x in f(..)`
    Member { pat: Rc<Pattern>, iter: ExternIter },
    /// `check f(..)`
    Check { test: ExternTest },
    /// Side-effecting statement block; succeeds once.
    Block { run: ExternRun },
}

impl Premise {
    pub fn goal(kb: &str, entity: u32, args: Vec<Rc<Pattern>>) -> Premise {
        Premise::Goal {
            kb: kb.to_string(),
            entity,
            args,
            plan_spec: None,
            required: false,
        }
    }

    pub fn with_plan_spec(self, spec: PlanSpec) -> Premise {
        match self {
            Premise::Goal {
                kb,
                entity,
                args,
                required,
                ..
            } => Premise::Goal {
                kb,
                entity,
                args,
                plan_spec: Some(spec),
                required,
            },
            other => other,
        }
    }

    pub fn required(self) -> Premise {
        match self {
            Premise::Goal {
                kb,
                entity,
                args,
                plan_spec,
                ..
            } => Premise::Goal {
                kb,
                entity,
                args,
                plan_spec,
                required: true,
            },
            other => other,
        }
    }
}

/// Deferred plan text declared by a BC rule's `with` block, plus the
/// variables the text references.
#[derive(Debug, Clone)]
pub struct WithFragment {
    pub step: Option<i64>,
    pub source: String,
    pub vars: Vec<VarId>,
}

#[derive(Debug, Clone)]
pub struct BcRule {
    pub name: String,
    pub entity: u32,
    pub goal: Vec<Rc<Pattern>>,
    pub when: Vec<Premise>,
    pub fragments: Vec<WithFragment>,
}

/// An action fired by a forward-chaining rule.
#[derive(Debug, Clone)]
pub enum Assertion {
    Fact {
        kb: String,
        entity: u32,
        args: Vec<Rc<Pattern>>,
    },
    /// External side-effect; `vars` lists the bindings the hook reads so the
    /// driver can avoid re-firing the same combination.
    Extern { run: ExternRun, vars: Vec<VarId> },
}

#[derive(Debug, Clone)]
pub struct FcRule {
    pub name: String,
    pub foreach: Vec<Premise>,
    pub assertions: Vec<Assertion>,
}
