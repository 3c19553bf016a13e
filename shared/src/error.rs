/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::error::Error;
use std::fmt;

/// Errors raised by the inference core. Unification failure is never an
/// error; it is ordinary backtracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    /// A variable with no binding was materialized as data.
    UnboundVariable { var: String },
    /// A rule head's arity disagrees with the goal it was tried against.
    ArityMismatch {
        rule: String,
        expected: usize,
        got: usize,
    },
    /// `get_create` disagreed with an existing knowledge base declaration.
    InconsistentKb { name: String },
    UnknownKb { name: String },
    /// A mandatory `when` clause produced no solution.
    RequiredClauseFailed { rule: String, clause: usize },
    /// Plan spec and plan presence disagree, or a plan value was used where
    /// term data was expected.
    PlanError { detail: String },
    /// Failure reported by a special predicate or a user-supplied hook.
    ExternalError { detail: String },
    InvalidGoal { detail: String },
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceError::UnboundVariable { var } => {
                write!(f, "${} not bound", var)
            }
            InferenceError::ArityMismatch {
                rule,
                expected,
                got,
            } => write!(
                f,
                "{}: goal of arity {} does not fit rule head of arity {}",
                rule, got, expected
            ),
            InferenceError::InconsistentKb { name } => write!(
                f,
                "knowledge base {} redeclared with a different parent or exclusions",
                name
            ),
            InferenceError::UnknownKb { name } => {
                write!(f, "unknown knowledge base {}", name)
            }
            InferenceError::RequiredClauseFailed { rule, clause } => {
                write!(f, "{}: 'when' clause {} failed", rule, clause)
            }
            InferenceError::PlanError { detail } => write!(f, "plan error: {}", detail),
            InferenceError::ExternalError { detail } => write!(f, "{}", detail),
            InferenceError::InvalidGoal { detail } => write!(f, "invalid goal: {}", detail),
        }
    }
}

impl Error for InferenceError {}

pub type InferenceResult<T> = Result<T, InferenceError>;
