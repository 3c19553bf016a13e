/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod backward;
pub mod context;
pub mod engine;
pub mod forward;
pub mod knowledge_base;
pub mod plan;
pub mod premise;
pub mod proof;
pub mod special;
pub mod unify;
