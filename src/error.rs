//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Error taxonomy and per-context diagnostics.

use std::fmt;

/// A convenience wrapper around `Result` for `yang_core::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Abstract error kinds, independent of any particular validation rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Caller passed null or mutually inconsistent inputs.
    InvalidArgument,
    /// Referenced module, feature, identity or typedef is absent.
    NotFound,
    /// Module revision collision, duplicate enum value, duplicate import.
    AlreadyExists,
    /// Malformed if-feature, range, pattern, or regex.
    Syntax,
    /// Status mismatch, narrowing violation, empty enum/bits set, derived
    /// value changed.
    Semantic,
    /// A feature cannot be enabled because of if-feature conflicts.
    Denied,
    /// Invariant violation; always surfaced, never silently recovered.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::NotFound => "not-found",
            ErrorKind::AlreadyExists => "already-exists",
            ErrorKind::Syntax => "syntax",
            ErrorKind::Semantic => "semantic",
            ErrorKind::Denied => "denied",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// An error produced by the core.
///
/// Every validation failure carries a stable `code` identifying the rule
/// that rejected the input, along with an optional schema path
/// (`/mod:container/leaf/type/range`) pinpointing where it was raised.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub msg: String,
    pub path: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: &'static str, msg: impl Into<String>) -> Error {
        Error {
            kind,
            code,
            msg: msg.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Error {
        self.path = Some(path.into());
        self
    }

    pub fn not_found(code: &'static str, msg: impl Into<String>) -> Error {
        Error::new(ErrorKind::NotFound, code, msg)
    }

    pub fn already_exists(code: &'static str, msg: impl Into<String>) -> Error {
        Error::new(ErrorKind::AlreadyExists, code, msg)
    }

    pub fn syntax(code: &'static str, msg: impl Into<String>) -> Error {
        Error::new(ErrorKind::Syntax, code, msg)
    }

    pub fn semantic(code: &'static str, msg: impl Into<String>) -> Error {
        Error::new(ErrorKind::Semantic, code, msg)
    }

    pub fn denied(code: &'static str, msg: impl Into<String>) -> Error {
        Error::new(ErrorKind::Denied, code, msg)
    }

    pub fn internal(code: &'static str, msg: impl Into<String>) -> Error {
        Error::new(ErrorKind::Internal, code, msg)
    }

    pub fn invalid_argument(code: &'static str, msg: impl Into<String>) -> Error {
        Error::new(ErrorKind::InvalidArgument, code, msg)
    }

    pub(crate) fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            kind: self.kind,
            code: self.code,
            message: self.msg.clone(),
            path: self.path.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => {
                write!(f, "{} ({}): {} [{}]", self.msg, self.code, path, self.kind)
            }
            None => write!(f, "{} ({}) [{}]", self.msg, self.code, self.kind),
        }
    }
}

impl std::error::Error for Error {}

/// A single validation failure recorded in the context's diagnostics buffer.
///
/// Unlike [`Error`], which unwinds the failing call, a `Diagnostic` is a
/// passive record that accumulates across an entire `compile()` call so the
/// caller can inspect every rule violation found, not just the first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.path, self.message, self.code)
    }
}
