// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Record SMT output and save it to a file for debugging purposes.

use std::{
    collections::hash_map::DefaultHasher,
    fs::OpenOptions,
    hash::{Hash, Hasher},
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::sexp::Sexp;

/// Track and save SMT sent to the solver so far.
#[derive(Debug)]
pub struct Tee {
    dir: PathBuf,
    contents: Vec<Sexp>,
}

fn calculate_hash<T: Hash>(v: T) -> String {
    let mut hash_state = DefaultHasher::new();
    v.hash(&mut hash_state);
    let h = hash_state.finish();
    return format!("{h:016x}")[..8].to_string();
}

impl Tee {
    /// Create a new empty `Tee` that saves into the directory `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            contents: vec![],
        }
    }

    /// Append a raw s-expression sent to the solver.
    pub fn append(&mut self, s: Sexp) {
        self.contents.push(s)
    }

    fn script(&self) -> String {
        self.contents
            .iter()
            .map(|s| match s {
                Sexp::Comment(c) if c.is_empty() => "".to_string(),
                Sexp::Comment(c) => format!(";; {c}"),
                _ => s.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Save the SMT2 input sent to the solver so far to a file named after its
    /// content hash. Returns the path of the saved file.
    pub fn save(&self) -> io::Result<PathBuf> {
        let contents = self.script();
        let hash = calculate_hash(&contents);
        let dest = self.dir.join(format!("query-{hash}.smt2"));
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&dest)?;
        writeln!(&mut f, "{contents}")?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::Tee;
    use crate::sexp::{app, atom_s, Sexp};
    use std::fs;

    #[test]
    fn test_save_script() {
        let dir = std::env::temp_dir();
        let mut tee = Tee::new(&dir);
        tee.append(Sexp::Comment("z3 -in -smt2".to_string()));
        tee.append(Sexp::Comment("".to_string()));
        tee.append(app("check-sat", []));
        tee.append(app("get-value", [Sexp::List(vec![atom_s("x")])]));
        let path = tee.save().unwrap();
        assert!(path.starts_with(&dir));
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            ";; z3 -in -smt2\n\n(check-sat)\n(get-value (x))\n"
        );
        // the name only depends on the contents
        assert_eq!(tee.save().unwrap(), path);
        fs::remove_file(path).unwrap();
    }
}
