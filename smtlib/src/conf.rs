// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Construct launch and option configurations for Z3 and CVC5.

/// The full invocation of a solver binary.
#[derive(Debug, Clone)]
pub struct SolverCmd {
    /// Binary to launch
    pub cmd: String,
    /// Arguments to pass
    pub args: Vec<String>,
    /// SMT options to send on startup, in order
    pub options: Vec<(String, String)>,
    /// SMT-LIB logic to declare on startup
    pub logic: String,
}

impl SolverCmd {
    fn with_args(cmd: &str, args: &[&str]) -> Self {
        Self {
            cmd: cmd.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            options: vec![],
            logic: "ALL".to_string(),
        }
    }

    /// Set an option. Options are sent in the order they are set, so a later
    /// setting of the same option wins.
    pub fn option<S: AsRef<str>>(&mut self, name: &str, val: S) -> &mut Self {
        self.options
            .push((name.to_string(), val.as_ref().to_string()));
        self
    }

    /// Set the logic declared with `set-logic` when the solver starts.
    pub fn logic<S: AsRef<str>>(&mut self, logic: S) -> &mut Self {
        self.logic = logic.as_ref().to_string();
        self
    }

    /// Build the command line string, for printing purposes.
    pub fn cmdline(&self) -> String {
        let mut line = self.cmd.clone();
        for a in &self.args {
            line.push(' ');
            if a.contains(' ') {
                line.push_str(&format!("\"{a}\""));
            } else {
                line.push_str(a);
            }
        }
        line
    }
}

/// Builder for creating a Z3 [`SolverCmd`].
#[derive(Debug, Clone)]
pub struct Z3Conf(SolverCmd);

impl Z3Conf {
    /// Create a Z3Conf with some default options. Uses `cmd` as the path to Z3.
    pub fn new(cmd: &str) -> Self {
        let mut cmd = SolverCmd::with_args(cmd, &["-in", "-smt2"]);
        // get-value must answer with a numeral even for unconstrained constants
        cmd.option("model.completion", "true");
        Self(cmd)
    }

    /// Set a per-query timeout. None leaves Z3 without one.
    pub fn timeout_ms(&mut self, ms: Option<usize>) -> &mut Self {
        if let Some(ms) = ms {
            self.0.option("timeout", ms.to_string());
        }
        self
    }

    /// Set the random seeds used by the SMT core and the SAT core.
    pub fn seed(&mut self, seed: usize) -> &mut Self {
        self.0.option("smt.random_seed", seed.to_string());
        self.0.option("sat.random_seed", seed.to_string());
        self
    }

    /// Get access to the raw options of the solver.
    pub fn options(&mut self) -> &mut SolverCmd {
        &mut self.0
    }

    /// Get the final command to run the solver.
    pub fn done(self) -> SolverCmd {
        self.0
    }
}

/// Builder for a CVC5 [`SolverCmd`].
#[derive(Debug, Clone)]
pub struct CvcConf(SolverCmd);

impl CvcConf {
    /// Create a new CVC5 builder with some default options.
    pub fn new_cvc5(cmd: &str) -> Self {
        // --lang smt2 is needed when reading from stdin
        let mut cmd = SolverCmd::with_args(cmd, &["-q", "--lang", "smt2"]);
        cmd.option("interactive", "false");
        cmd.option("incremental", "true");
        Self(cmd)
    }

    /// Set a per-query time limit. None sets no time limit.
    pub fn timeout_ms(&mut self, ms: Option<usize>) -> &mut Self {
        if let Some(ms) = ms {
            self.0.option("tlimit-per", ms.to_string());
        }
        self
    }

    /// Set the random seed.
    pub fn seed(&mut self, seed: usize) -> &mut Self {
        self.0.option("seed", seed.to_string());
        self
    }

    /// Get access to the raw options of the solver.
    pub fn options(&mut self) -> &mut SolverCmd {
        &mut self.0
    }

    /// Get the final command to run the solver.
    pub fn done(self) -> SolverCmd {
        self.0
    }
}
