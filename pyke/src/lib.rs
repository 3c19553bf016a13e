/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod goal;

pub use goal::{Goal, Solution, Solutions};
pub use inference::context::{Binding, ContextArena, CtxHandle};
pub use inference::engine::{Engine, Stats, SPECIAL_KB};
pub use inference::knowledge_base::{FactBase, KnowledgeBase, RuleBase};
pub use inference::plan::{Plan, PlanArg, PlanBody, PlanStep};
pub use inference::special::{CommandRunner, ProcessRunner};
pub use shared::dictionary::Dictionary;
pub use shared::error::{InferenceError, InferenceResult};
pub use shared::fact_set::{Fact, FactSet};
pub use shared::pattern::{Pattern, VarId};
pub use shared::rule::{
    Assertion, BcRule, BindingScope, ExternEval, ExternIter, ExternRun, ExternTest, FcRule,
    PlanSpec, Premise, WithFragment,
};
pub use shared::value::Value;
