// Copyright 2026 dictcache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    backtrace::Backtrace,
    fmt::{Debug, Display},
    sync::Arc,
};

/// ErrorKind is all kinds of Error of dictcache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller broke the cache protocol, e.g. a `put` whose keys are partially present.
    ///
    /// The cache stays consistent when this is returned; the offending object is discarded.
    Consistency,
    /// Memory for the index, the element store or the free list could not be reserved.
    ResourceExhausted,
    /// Objects are still referenced at shutdown.
    Leaked,
    /// Waiting for another thread to resolve a cache miss took too long.
    Timeout,
    /// Config error.
    Config,
    /// External error, e.g. raised by a loader.
    External,
}

impl ErrorKind {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        self.into()
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

impl From<ErrorKind> for &'static str {
    fn from(v: ErrorKind) -> &'static str {
        match v {
            ErrorKind::Consistency => "Cache consistency error",
            ErrorKind::ResourceExhausted => "Resource exhausted",
            ErrorKind::Leaked => "Leaked references",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Config => "Config error",
            ErrorKind::External => "External error",
        }
    }
}

/// Error is the error struct returned by all dictcache functions.
///
/// ## Display
///
/// - Via `Display`, the error is printed in a single line:
///
/// ```shell
/// Cache consistency error, context: { map: tables, key: Name("t1") } => keys are partially present
/// ```
///
/// - Via `Debug`, the error is printed in multiple lines with context, source and backtrace (if captured).
///
/// - Via `{:#?}`, the conventional struct-style Debug representation is used.
pub struct Error {
    kind: ErrorKind,
    message: String,

    context: Vec<(&'static str, String)>,

    source: Option<Arc<anyhow::Error>>,
    backtrace: Option<Arc<Backtrace>>,
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            de.field("backtrace", &self.backtrace);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "  {}: {}", k, v)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source:")?;
            writeln!(f, "  {source:#}")?;
        }

        if let Some(backtrace) = &self.backtrace {
            writeln!(f)?;
            writeln!(f, "Backtrace:")?;
            writeln!(f, "{backtrace}")?;
        }

        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            let mut iter = self.context.iter().peekable();
            while let Some((k, v)) = iter.next() {
                write!(f, "{}: {}", k, v)?;
                if iter.peek().is_some() {
                    write!(f, ", ")?;
                }
            }
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref().as_ref())
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            context: self.context.clone(),
            source: self.source.clone(),
            backtrace: self.backtrace.clone(),
        }
    }
}

impl Error {
    /// Create a new error.
    ///
    /// If the error needs to carry a source error, please use `with_source` method.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::new(),
            source: None,
            backtrace: Some(Arc::new(Backtrace::capture())),
        }
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Set source for error.
    ///
    /// # Notes
    ///
    /// If the source has been set, we will raise a panic here in debug builds.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(Arc::new(source.into()));
        self
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the error context.
    pub fn context(&self) -> &Vec<(&'static str, String)> {
        &self.context
    }

    /// Get the value of the first context entry with the given key.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    /// Get the error backtrace.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_deref()
    }

    /// Get the error source.
    pub fn source(&self) -> Option<&anyhow::Error> {
        self.source.as_deref()
    }

    /// Downcast the reference of the source error to a specific error type reference.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
    }
}

/// Result type for dictcache.
pub type Result<T> = std::result::Result<T, Error>;

/// Helper methods for Error.
impl Error {
    /// Helper for creating an [`ErrorKind::Consistency`] error.
    pub fn consistency(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Consistency, message)
    }

    /// Helper for creating an [`ErrorKind::ResourceExhausted`] error for a failed reservation.
    pub fn resource_exhausted(target: &'static str, reason: impl Debug) -> Self {
        Error::new(ErrorKind::ResourceExhausted, "memory reservation failed")
            .with_context("target", target)
            .with_context("reason", format!("{reason:?}"))
    }

    /// Helper for creating an [`ErrorKind::Leaked`] error that enumerates the leaked keys.
    pub fn leaked<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Display,
    {
        keys.into_iter().fold(
            Error::new(ErrorKind::Leaked, "objects are still referenced"),
            |e, key| e.with_context("leaked", key),
        )
    }

    /// Helper for creating an [`ErrorKind::External`] error from any error.
    pub fn external(source: impl Into<anyhow::Error>) -> Self {
        Error::new(ErrorKind::External, "external error").with_source(source)
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(e: std::collections::TryReserveError) -> Self {
        Error::new(ErrorKind::ResourceExhausted, "memory reservation failed").with_source(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<Error>();
    }

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("StorageError: {0}")]
    struct StorageError(String);

    #[test]
    fn test_error_display() {
        let err = Error::consistency("keys are partially present")
            .with_context("map", "tables")
            .with_context("key", "Name(\"t1\")");

        assert_eq!(
            "Cache consistency error, context: { map: tables, key: Name(\"t1\") } => keys are partially present",
            err.to_string()
        );
    }

    #[test]
    fn test_error_downcast() {
        let inner = StorageError("tablespace is offline".to_string());
        let err = Error::external(inner.clone());

        assert_eq!(err.kind(), ErrorKind::External);
        let downcasted = err.downcast_ref::<StorageError>().unwrap();
        assert_eq!(downcasted, &inner);
    }

    #[test]
    fn test_leaked_lists_every_key() {
        let err = Error::leaked(["Id(1)", "Name(\"t1\")"]);
        assert_eq!(err.kind(), ErrorKind::Leaked);
        let leaked: Vec<_> = err
            .context()
            .iter()
            .filter(|(k, _)| *k == "leaked")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(leaked, vec!["Id(1)", "Name(\"t1\")"]);
    }

    #[test]
    fn test_try_reserve_error_conversion() {
        let mut v: Vec<u64> = Vec::new();
        let e = v.try_reserve(usize::MAX).unwrap_err();
        let err: Error = e.into();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert!(err.source().is_some());
    }
}
