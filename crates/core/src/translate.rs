//! Failure translation registry
//!
//! Adapters hand raw failures from their resource manager to a
//! [`TranslatorChain`]. Translators are consulted in registration order and
//! the first one that returns `Some` wins. When no translator claims the
//! failure it is wrapped unchanged in `TxnError::ResourceFailure`.
//!
//! The chain is built once at startup and injected into the coordinator;
//! there is no runtime discovery.
//!
//! # Example
//!
//! ```
//! use unitwork_core::{BoxError, ResourcePhase, TranslatorChain};
//!
//! let chain = TranslatorChain::new().with(|failure: &(dyn std::error::Error + Send + Sync + 'static)| {
//!     if failure.to_string().contains("duplicate key") {
//!         Some(BoxError::from("entity already exists"))
//!     } else {
//!         None
//!     }
//! });
//!
//! let err = chain.translate(ResourcePhase::Commit, "ambient", "duplicate key value".into());
//! assert!(err.is_translated());
//! ```

use crate::error::{BoxError, TxnError};
use crate::types::ResourcePhase;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Rewrites a raw resource failure into a domain failure
pub trait FailureTranslator: Send + Sync {
    /// Translate `failure`, or return `None` to leave it to the next translator
    fn translate(&self, failure: &(dyn StdError + Send + Sync + 'static)) -> Option<BoxError>;
}

impl<F> FailureTranslator for F
where
    F: Fn(&(dyn StdError + Send + Sync + 'static)) -> Option<BoxError> + Send + Sync,
{
    fn translate(&self, failure: &(dyn StdError + Send + Sync + 'static)) -> Option<BoxError> {
        self(failure)
    }
}

/// Ordered list of failure translators
#[derive(Clone, Default)]
pub struct TranslatorChain {
    translators: Vec<Arc<dyn FailureTranslator>>,
}

impl TranslatorChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a translator, builder style
    pub fn with<T: FailureTranslator + 'static>(mut self, translator: T) -> Self {
        self.register(translator);
        self
    }

    /// Append a translator
    pub fn register<T: FailureTranslator + 'static>(&mut self, translator: T) {
        self.translators.push(Arc::new(translator));
    }

    /// Number of registered translators
    pub fn len(&self) -> usize {
        self.translators.len()
    }

    /// Check if no translator is registered
    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }

    /// Turn a raw failure into the error surfaced to callers
    ///
    /// Returns `TxnError::Translated` when a translator claims the failure,
    /// `TxnError::ResourceFailure` wrapping `cause` otherwise.
    pub fn translate(&self, phase: ResourcePhase, resource: &str, cause: BoxError) -> TxnError {
        for translator in &self.translators {
            if let Some(translated) = translator.translate(&*cause) {
                return TxnError::Translated {
                    phase,
                    resource: resource.to_string(),
                    source: translated,
                };
            }
        }
        TxnError::resource(phase, resource, cause)
    }
}

impl fmt::Debug for TranslatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorChain")
            .field("translators", &self.translators.len())
            .finish()
    }
}
