/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Built-in predicates. `claim_goal` commits the enclosing rule's current
//! solution and cuts the remaining alternatives. The command specials run
//! an external process through the `CommandRunner` collaborator and unify
//! its output with the caller's pattern.

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use std::rc::Rc;

use shared::dictionary::Dictionary;
use shared::error::InferenceError;
use shared::pattern::Pattern;
use shared::value::Value;

use crate::context::{ContextArena, CtxHandle, DataMemo};
use crate::proof::{MatchOnce, Proof};
use crate::unify;

/// Opaque process-runner collaborator. The default shells out; tests
/// substitute a scripted implementation.
pub trait CommandRunner: fmt::Debug {
    fn run(
        &self,
        cmd: &[String],
        cwd: Option<&str>,
        stdin: Option<&str>,
    ) -> Result<(i32, String, String), InferenceError>;
}

#[derive(Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        cmd: &[String],
        cwd: Option<&str>,
        stdin: Option<&str>,
    ) -> Result<(i32, String, String), InferenceError> {
        let Some(program) = cmd.first() else {
            return Err(InferenceError::ExternalError {
                detail: "empty command".to_string(),
            });
        };
        let mut command = Command::new(program);
        command
            .args(&cmd[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        let mut child = command.spawn().map_err(|e| InferenceError::ExternalError {
            detail: format!("failed to spawn {}: {}", program, e),
        })?;
        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes())
                    .map_err(|e| InferenceError::ExternalError {
                        detail: format!("failed to write stdin of {}: {}", program, e),
                    })?;
            }
        } else {
            drop(child.stdin.take());
        }
        let output = child
            .wait_with_output()
            .map_err(|e| InferenceError::ExternalError {
                detail: format!("failed to wait for {}: {}", program, e),
            })?;
        Ok((
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

/// Resolve `(cmd [, cwd [, stdin]])` argument patterns to ground data.
fn resolve_invocation(
    arena: &ContextArena,
    vars: &Dictionary,
    ctx: CtxHandle,
    patterns: &[Rc<Pattern>],
) -> Result<(Vec<String>, Option<String>, Option<String>), InferenceError> {
    let mut memo = DataMemo::default();
    let cmd_value = unify::as_data(arena, &patterns[0], ctx, false, &mut memo, vars)?;
    let Value::Tuple(items) = cmd_value else {
        return Err(InferenceError::ExternalError {
            detail: "command must be a tuple of arguments".to_string(),
        });
    };
    let mut cmd = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Str(s) => cmd.push(s),
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => cmd.push(format!("{}", item)),
            other => {
                return Err(InferenceError::ExternalError {
                    detail: format!("command argument {} is not a scalar", other),
                })
            }
        }
    }
    let cwd = match patterns.get(1) {
        None => None,
        Some(p) => match unify::as_data(arena, p, ctx, false, &mut memo, vars)? {
            Value::Null => None,
            Value::Str(s) => Some(s),
            other => {
                return Err(InferenceError::ExternalError {
                    detail: format!("working directory {} is not a string", other),
                })
            }
        },
    };
    let stdin = match patterns.get(2) {
        None => None,
        Some(p) => match unify::as_data(arena, p, ctx, false, &mut memo, vars)? {
            Value::Null => None,
            Value::Str(s) => Some(s),
            other => {
                return Err(InferenceError::ExternalError {
                    detail: format!("stdin {} is not a string", other),
                })
            }
        },
    };
    Ok((cmd, cwd, stdin))
}

/// `check_command(cmd [, cwd [, stdin]])`: succeeds once iff exit status 0.
pub fn check_command(
    arena: &ContextArena,
    vars: &Dictionary,
    runner: &dyn CommandRunner,
    ctx: CtxHandle,
    patterns: &[Rc<Pattern>],
) -> Result<Proof, InferenceError> {
    if patterns.is_empty() {
        return Ok(Proof::Empty);
    }
    let (cmd, cwd, stdin) = resolve_invocation(arena, vars, ctx, patterns)?;
    let (code, _, _) = runner.run(&cmd, cwd.as_deref(), stdin.as_deref())?;
    if code != 0 {
        Ok(Proof::Empty)
    } else {
        Ok(Proof::Once { yielded: false })
    }
}

/// `command($output, cmd [, cwd [, stdin]])`: non-zero exit is an error;
/// `$output` unifies with the tuple of stdout lines.
pub fn command(
    arena: &ContextArena,
    vars: &Dictionary,
    runner: &dyn CommandRunner,
    ctx: CtxHandle,
    patterns: &[Rc<Pattern>],
) -> Result<Proof, InferenceError> {
    if patterns.len() < 2 {
        return Ok(Proof::Empty);
    }
    let (cmd, cwd, stdin) = resolve_invocation(arena, vars, ctx, &patterns[1..])?;
    let (code, out, _) = runner.run(&cmd, cwd.as_deref(), stdin.as_deref())?;
    if code != 0 {
        return Err(InferenceError::ExternalError {
            detail: format!("{} exited with status {}", cmd.join(" "), code),
        });
    }
    let lines = Value::Tuple(
        out.trim_end_matches('\n')
            .split('\n')
            .map(Value::str)
            .collect(),
    );
    Ok(Proof::MatchOnce(MatchOnce::new(
        ctx,
        patterns[0].clone(),
        lines,
    )))
}

/// `general_command($result, cmd [, cwd [, stdin]])`: `$result` unifies
/// with the `(exit, stdout, stderr)` triple whatever the exit status.
pub fn general_command(
    arena: &ContextArena,
    vars: &Dictionary,
    runner: &dyn CommandRunner,
    ctx: CtxHandle,
    patterns: &[Rc<Pattern>],
) -> Result<Proof, InferenceError> {
    if patterns.len() < 2 {
        return Ok(Proof::Empty);
    }
    let (cmd, cwd, stdin) = resolve_invocation(arena, vars, ctx, &patterns[1..])?;
    let (code, out, err) = runner.run(&cmd, cwd.as_deref(), stdin.as_deref())?;
    let triple = Value::Tuple(vec![
        Value::Int(code as i64),
        Value::Str(out),
        Value::Str(err),
    ]);
    Ok(Proof::MatchOnce(MatchOnce::new(
        ctx,
        patterns[0].clone(),
        triple,
    )))
}
