//! Pretty-printing for IR
//!
//! Human-readable output for debugging lowered method bodies.

use std::fmt::Write;

use crate::stmt::Stmt;

/// Trait for pretty-printing IR constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for Stmt {
    fn pretty_print(&self) -> String {
        match &self.origin {
            Some(origin) => format!("{}  ; {} @ {}", self, origin.text, origin.span),
            None => format!("{}", self),
        }
    }
}

impl PrettyPrint for [Stmt] {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        for (i, stmt) in self.iter().enumerate() {
            writeln!(output, "{:>4}: {}", i, stmt.pretty_print()).unwrap();
        }
        output
    }
}

impl PrettyPrint for Vec<Stmt> {
    fn pretty_print(&self) -> String {
        self.as_slice().pretty_print()
    }
}
