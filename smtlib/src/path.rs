// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Utilities for finding solver binaries in the filesystem.

use std::{
    env,
    path::{Path, PathBuf},
};

/// The `solvers` directory at the root of the workspace, where solver binaries
/// can be placed for local use.
fn solvers_dir() -> Option<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(|root| root.join("solvers"))
}

/// Get the right invocation of the solver with binary name bin.
///
/// An environment variable named after the solver (eg, Z3_BIN for z3) takes
/// priority. Otherwise a binary in the workspace `solvers` directory is used
/// if present, and finally bin itself, to be looked up in $PATH.
pub fn solver_path(bin: &str) -> String {
    if let Some(val) = env::var_os(format!("{}_BIN", bin.to_uppercase())) {
        return val.to_string_lossy().into();
    }
    let mut file = bin.to_owned();
    if cfg!(windows) && !file.ends_with(".exe") {
        file.push_str(".exe");
    }
    match solvers_dir().map(|dir| dir.join(&file)) {
        Some(local) if local.exists() => local.to_string_lossy().into(),
        _ => file,
    }
}
