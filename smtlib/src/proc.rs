// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Manage a running SMT process.
//!
//! This is a low-level generic API for SMT-LIB solvers; the solver-specific
//! parts are captured by the [`SolverCmd`] passed to launch the solver.

use std::{
    ffi::{OsStr, OsString},
    io::{self, BufRead, BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};
use thiserror::Error;

use crate::{
    conf::SolverCmd,
    sexp::{self, app, atom_i, atom_s, sexp_l, Sexp},
    tee::Tee,
};

/// SmtProc wraps an instance of a solver process.
#[derive(Debug)]
pub struct SmtProc {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    tee: Option<Tee>,
}

/// SatResp is a solver's response to a `(check-sat)` or similar command.
///
/// For unknown it also returns the reason the solver provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResp {
    /// The query is satisfiable.
    Sat,
    /// The query is unsatisfiable.
    Unsat,
    /// Unknown whether the query is sat or unsat. The reason is the one given
    /// by (get-info :reason-unknown).
    ///
    /// This can happen due to a timeout or a resource limit, for example.
    Unknown(String),
}

/// An error from trying to call the solver
#[derive(Error, Debug)]
pub enum SolverError {
    /// I/O went wrong
    #[error("some I/O went wrong: {0}")]
    Io(#[from] io::Error),
    /// The solver process exited or closed its output
    #[error("solver closed its output: {0}")]
    Closed(String),
    /// The solver answered with an `(error ...)` or something unparseable
    #[error("solver returned an error:\n{0}")]
    ErrorResponse(String),
}

type Result<T> = std::result::Result<T, SolverError>;

/// Marks the end of a solver response; requested with `echo` after every
/// command that produces output.
const DONE: &str = "<<DONE>>";

/// The message of the first `(error "msg")` in a response, if any.
fn error_message(resp: &str) -> Option<String> {
    // Z3 reports an error followed by the regular answer, so the response may
    // hold several sexps
    let sexps = sexp::parse_many(resp).ok()?;
    sexps.iter().find_map(|s| match s.app() {
        Some(("error", [msg])) => msg.atom_s().map(str::to_string),
        _ => None,
    })
}

fn error_response(resp: &str) -> SolverError {
    SolverError::ErrorResponse(error_message(resp).unwrap_or_else(|| resp.to_string()))
}

impl Drop for SmtProc {
    fn drop(&mut self) {
        _ = writeln!(self.stdin, "(exit)");
        _ = self.stdin.flush();
        _ = self.child.kill();
        _ = self.child.wait();
    }
}

impl SmtProc {
    /// Create a new SMT process by running a solver.
    ///
    /// The optional `tee` argument is a directory where the SMT input sent to
    /// the solver is saved when a query comes back unknown, for debugging
    /// purposes.
    pub fn new(mut cmd: SolverCmd, tee: Option<&Path>) -> Result<Self> {
        cmd.option("produce-models", "true");
        cmd.option("produce-unsat-assumptions", "true");
        // declarations made inside a push survive the matching pop
        cmd.option("global-declarations", "true");
        let mut child = Command::new(OsStr::new(&cmd.cmd))
            .args(cmd.args.iter().map(OsString::from))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child.stdin.take().expect("solver stdin is piped");
        let stdout = BufReader::new(child.stdout.take().expect("solver stdout is piped"));
        let tee = tee.map(|dir| {
            let mut t = Tee::new(dir);
            t.append(Sexp::Comment(cmd.cmdline()));
            t
        });
        let mut proc = Self {
            child,
            stdin,
            stdout,
            tee,
        };
        log::debug!("launched solver: {}", cmd.cmdline());
        for (option, val) in &cmd.options {
            proc.send(&app(
                "set-option",
                [atom_s(format!(":{option}")), atom_s(val)],
            ))?;
        }
        proc.send(&app("set-logic", [atom_s(&cmd.logic)]))?;
        Ok(proc)
    }

    /// Send the solver a command that produces no output.
    ///
    /// Errors the solver reports for it surface with the next command that
    /// reads a response.
    pub fn send(&mut self, data: &Sexp) -> Result<()> {
        if let Some(t) = &mut self.tee {
            t.append(data.clone());
        }
        self.write_line(&data.to_string())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let written = writeln!(self.stdin, "{line}").and_then(|()| self.stdin.flush());
        match written {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                Err(SolverError::Closed(format!("solver exited before {line}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read everything the solver prints up to the [`DONE`] marker.
    fn read_response(&mut self) -> Result<String> {
        self.write_line(&format!(r#"(echo "{DONE}")"#))?;
        let mut resp = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(match error_message(&resp) {
                    Some(msg) => SolverError::ErrorResponse(msg),
                    None => SolverError::Closed(resp.trim_end().to_string()),
                });
            }
            // Z3 echoes the marker bare and cvc5 quotes it
            let l = line.trim_end();
            if l == DONE || l.strip_prefix('"').and_then(|l| l.strip_suffix('"')) == Some(DONE) {
                return Ok(resp.trim_end().to_string());
            }
            resp.push_str(&line);
        }
    }

    /// Send a command and parse its response as a single sexp.
    fn query(&mut self, data: &Sexp) -> Result<Sexp> {
        self.send(data)?;
        let resp = self.read_response()?;
        match sexp::parse(&resp) {
            Ok(s) if !matches!(s.app(), Some(("error", _))) => Ok(s),
            _ => Err(error_response(&resp)),
        }
    }

    /// Get some attribute using the SMT get-info command.
    pub fn get_info(&mut self, attribute: &str) -> Result<Sexp> {
        let resp = self.query(&app("get-info", [atom_s(attribute)]))?;
        match resp.list() {
            Some([key, value]) if key.atom_s() == Some(attribute) => Ok(value.clone()),
            _ => panic!("unexpected response to get-info {attribute}: {resp}"),
        }
    }

    /// Send the solver `(check-sat-assuming)` with some assumed variables
    /// (which must be atoms, literal symbols or their negations). With no
    /// assumptions this is a plain `(check-sat)`.
    ///
    /// The assumptions do not affect subsequent use of the solver. On unknown
    /// the reason is requested from the solver and the tee file, if any, is
    /// saved.
    pub fn check_sat_assuming(&mut self, assumptions: &[Sexp]) -> Result<SatResp> {
        let cmd = if assumptions.is_empty() {
            app("check-sat", [])
        } else {
            app("check-sat-assuming", [sexp_l(assumptions.to_vec())])
        };
        self.send(&cmd)?;
        let resp = match self.read_response()?.as_str() {
            "sat" => SatResp::Sat,
            "unsat" => SatResp::Unsat,
            "unknown" => {
                let reason = self.get_info(":reason-unknown")?;
                SatResp::Unknown(reason.to_string())
            }
            other => return Err(error_response(other)),
        };
        if let SatResp::Unknown(reason) = &resp {
            match self.save_tee() {
                Some(path) => log::warn!("unknown ({reason}) response to {}", path.display()),
                None => log::warn!("unknown ({reason}) response to check-sat"),
            }
        }
        Ok(resp)
    }

    /// Send the solver `(check-sat)`. For unknown gets a reason.
    pub fn check_sat(&mut self) -> Result<SatResp> {
        self.check_sat_assuming(&[])
    }

    /// Open `n` new assertion scopes.
    pub fn push(&mut self, n: usize) -> Result<()> {
        self.send(&app("push", [atom_i(n)]))
    }

    /// Discard the `n` innermost assertion scopes.
    pub fn pop(&mut self, n: usize) -> Result<()> {
        self.send(&app("pop", [atom_i(n)]))
    }

    /// Run `(get-value (t1 .. tn))` following a sat response, returning each
    /// term paired with its value.
    pub fn get_value(&mut self, terms: &[Sexp]) -> Result<Vec<(Sexp, Sexp)>> {
        let resp = self.query(&app("get-value", [sexp_l(terms.to_vec())]))?;
        let pairs = resp
            .list()
            .unwrap_or_else(|| panic!("malformed get-value response: {resp}"));
        Ok(pairs
            .iter()
            .filter(|s| !matches!(s, Sexp::Comment(_)))
            .map(|pair| match pair.list() {
                Some([term, value]) => (term.clone(), value.clone()),
                _ => panic!("malformed get-value pair {pair} in solver response"),
            })
            .collect())
    }

    /// Run `(get-unsat-assumptions)` following an unsat response to get the
    /// list of assumptions used in the proof.
    pub fn get_unsat_assumptions(&mut self) -> Result<Vec<Sexp>> {
        let resp = self.query(&app("get-unsat-assumptions", []))?;
        match resp {
            Sexp::List(ss) => Ok(ss),
            _ => panic!("malformed get-unsat-assumptions response: {resp}"),
        }
    }

    /// Save the current tee file, if there is one. Returns the path of the
    /// created file (or None if there is no tee'd output setup).
    pub fn save_tee(&self) -> Option<PathBuf> {
        let tee = self.tee.as_ref()?;
        match tee.save() {
            Ok(path) => Some(path),
            Err(err) => {
                log::error!("failed to save tee: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        conf::Z3Conf,
        path::solver_path,
        proc::{SatResp, SmtProc},
        sexp::{app, atom_s, indexed, parse, sexp_l},
    };
    use eyre::Context;

    fn z3() -> Option<SmtProc> {
        let mut conf = Z3Conf::new(&solver_path("z3"));
        conf.options().logic("QF_BV");
        match SmtProc::new(conf.done(), None) {
            Ok(proc) => Some(proc),
            Err(_) => {
                eprintln!("could not find z3, skipping test");
                None
            }
        }
    }

    #[test]
    fn test_check_sat_z3() {
        let Some(mut solver) = z3() else { return };
        let response = solver.check_sat().wrap_err("could not check-sat").unwrap();
        assert_eq!(response, SatResp::Sat);
    }

    #[test]
    fn test_get_value_z3() {
        let Some(mut solver) = z3() else { return };
        solver
            .send(&app("declare-const", [atom_s("x"), indexed("BitVec", [4])]))
            .unwrap();
        solver
            .send(&parse("(assert (= x (_ bv5 4)))").unwrap())
            .unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResp::Sat);
        let values = solver.get_value(&[atom_s("x")]).unwrap();
        assert_eq!(values, vec![(atom_s("x"), atom_s("#b0101"))]);
    }

    #[test]
    fn test_unsat_assumptions_z3() {
        let Some(mut solver) = z3() else { return };
        for s in [
            "(declare-const x (_ BitVec 4))",
            "(declare-const a Bool)",
            "(declare-const b Bool)",
            "(declare-const c Bool)",
            "(assert (=> a (bvule x (_ bv2 4))))",
            "(assert (=> b (bvule (_ bv5 4) x)))",
            "(assert (=> c (= x x)))",
        ] {
            solver.send(&parse(s).unwrap()).unwrap();
        }
        let assumptions = [atom_s("a"), atom_s("b"), atom_s("c")];
        let response = solver.check_sat_assuming(&assumptions).unwrap();
        assert_eq!(response, SatResp::Unsat);
        let mut core = solver.get_unsat_assumptions().unwrap();
        core.sort();
        assert_eq!(sexp_l(core), sexp_l([atom_s("a"), atom_s("b")]));
    }

    #[test]
    fn test_push_pop_z3() {
        let Some(mut solver) = z3() else { return };
        solver
            .send(&parse("(declare-const x (_ BitVec 4))").unwrap())
            .unwrap();
        solver.push(1).unwrap();
        solver
            .send(&parse("(assert (distinct x x))").unwrap())
            .unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResp::Unsat);
        solver.pop(1).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResp::Sat);
    }

    #[test]
    fn test_z3_ill_formed() {
        let Some(mut proc) = z3() else { return };
        // unbound symbol
        proc.send(&parse("(assert p)").unwrap()).unwrap();
        let r = proc.check_sat();
        assert!(r.is_err(), "expected an error, got {r:?}");
    }
}
