// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Crate-wide error type.
//!
//! Covers the taxonomy engines need: `not-found`, `invalid-argument`,
//! `corruption`, `io`, `lock-timeout`. Engines never panic on user-reachable
//! paths; every fallible operation returns `Result<T>`.

use std::fmt;

use quick_error::quick_error;

quick_error! {
    #[derive(Debug)]
    pub enum ErrorInner {
        NotFound {
            display("key not found")
        }
        InvalidArgument(msg: String) {
            display("invalid argument: {}", msg)
        }
        Corruption(msg: String) {
            display("corruption: {}", msg)
        }
        LockTimeout(key: Vec<u8>) {
            display("timed out acquiring lock for key {:?}", String::from_utf8_lossy(key))
        }
        Engine(err: rocksdb::Error) {
            from()
            display("underlying engine error: {}", err)
            cause(err)
        }
        Io(err: std::io::Error) {
            from()
            display("io error: {}", err)
            cause(err)
        }
    }
}

/// Public error type. Wraps `ErrorInner` behind a box so `Result<T, Error>`
/// stays small on the stack regardless of which variant is live.
pub struct Error(pub Box<ErrorInner>);

impl Error {
    pub fn not_found() -> Error {
        Error(Box::new(ErrorInner::NotFound))
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Error {
        Error(Box::new(ErrorInner::InvalidArgument(msg.into())))
    }

    pub fn corruption<S: Into<String>>(msg: S) -> Error {
        Error(Box::new(ErrorInner::Corruption(msg.into())))
    }

    pub fn lock_timeout(key: Vec<u8>) -> Error {
        Error(Box::new(ErrorInner::LockTimeout(key)))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(*self.0, ErrorInner::NotFound)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.0 {
            ErrorInner::Engine(e) => Some(e),
            ErrorInner::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ErrorInner> for Error {
    fn from(inner: ErrorInner) -> Error {
        Error(Box::new(inner))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Error {
        Error(Box::new(ErrorInner::Engine(e)))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error(Box::new(ErrorInner::Io(e)))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
