//! Deciding which kind of background process a descriptor describes

use crate::config::Settings;
use crate::descriptor;
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static URL_DESCRIPTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:curl\s+)?https?://\S+").expect("URL descriptor pattern is valid")
});

/// Kinds of background process the crate knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessType {
    /// A network request, run by the fetch worker
    Url,
    /// A script file, run by its interpreter
    Script,
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessType::Url => write!(f, "url"),
            ProcessType::Script => write!(f, "script"),
        }
    }
}

/// Recognizes descriptors of one process type
pub trait Classifier: Send + Sync {
    /// The type this classifier recognizes
    fn process_type(&self) -> ProcessType;

    /// Whether `descriptor` is of this type. Must not have side effects.
    fn accepts(&self, descriptor: &str) -> bool;
}

/// Accepts `http(s)://…` descriptors, optionally prefixed with `curl`
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlClassifier;

impl Classifier for UrlClassifier {
    fn process_type(&self) -> ProcessType {
        ProcessType::Url
    }

    fn accepts(&self, descriptor: &str) -> bool {
        URL_DESCRIPTOR.is_match(descriptor)
    }
}

/// Accepts descriptors whose first word is a file with a known script extension
#[derive(Debug, Clone, Default)]
pub struct ScriptClassifier {
    extensions: BTreeSet<String>,
}

impl ScriptClassifier {
    /// Accept scripts with any of `extensions` (given without the dot)
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }
}

impl Classifier for ScriptClassifier {
    fn process_type(&self) -> ProcessType {
        ProcessType::Script
    }

    fn accepts(&self, descriptor: &str) -> bool {
        let Ok(words) = descriptor::split(descriptor) else {
            return false;
        };
        words
            .first()
            .and_then(|script| Path::new(script).extension())
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(ext))
    }
}

/// Maps descriptors to process types by asking classifiers in order
#[derive(Default)]
pub struct ProcessTypeRouter {
    classifiers: Vec<Box<dyn Classifier>>,
}

impl ProcessTypeRouter {
    /// A router with no classifiers; it rejects every descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// URL descriptors first, then scripts with the configured extensions
    pub fn with_defaults(settings: &Settings) -> Self {
        let mut router = Self::new();
        router.register(UrlClassifier);
        router.register(ScriptClassifier::new(settings.interpreters.keys().cloned()));
        router
    }

    /// Append a classifier; earlier classifiers win
    pub fn register(&mut self, classifier: impl Classifier + 'static) -> &mut Self {
        self.classifiers.push(Box::new(classifier));
        self
    }

    /// The type of the first classifier accepting `descriptor`
    pub fn classify(&self, descriptor: &str) -> Result<ProcessType> {
        let process_type = self
            .classifiers
            .iter()
            .find(|classifier| classifier.accepts(descriptor))
            .map(|classifier| classifier.process_type())
            .ok_or_else(|| Error::UnsupportedProcess {
                descriptor: descriptor.to_string(),
            })?;
        debug!(descriptor, %process_type, "Classified descriptor");
        Ok(process_type)
    }
}

impl fmt::Debug for ProcessTypeRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<_> = self.classifiers.iter().map(|c| c.process_type()).collect();
        f.debug_struct("ProcessTypeRouter")
            .field("classifiers", &types)
            .finish()
    }
}
