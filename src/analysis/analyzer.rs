//! The analyzer trait and name-based resolution.

use std::sync::Arc;

use crate::analysis::keyword::{KeywordAnalyzer, LowercaseKeywordAnalyzer};
use crate::analysis::simple::SimpleAnalyzer;
use crate::analysis::standard::StandardAnalyzer;
use crate::analysis::token::TokenStream;
use crate::error::{Result, ShrikeError};

/// Trait for text analyzers.
///
/// An analyzer turns raw field text into a stream of tokens. Implementations
/// must be thread-safe; one analyzer instance is shared across writes.
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    /// Analyze the given text and return a token stream.
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Get the name of this analyzer.
    fn name(&self) -> &'static str;

    /// Get this analyzer as Any for downcasting.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Resolve one of the built-in analyzers by name.
///
/// Index definitions reference analyzers by these names. Unknown names are
/// an analysis error, surfaced when the write-side analyzer is assembled.
pub fn analyzer_by_name(name: &str) -> Result<Arc<dyn Analyzer>> {
    match name {
        "standard" => Ok(Arc::new(StandardAnalyzer::new())),
        "keyword" => Ok(Arc::new(KeywordAnalyzer::new())),
        "lowercase_keyword" => Ok(Arc::new(LowercaseKeywordAnalyzer::new())),
        "simple" => Ok(Arc::new(SimpleAnalyzer::new())),
        _ => Err(ShrikeError::analysis(format!(
            "unknown analyzer name: {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyzer_by_name_resolves_builtins() {
        for name in ["standard", "keyword", "lowercase_keyword", "simple"] {
            let analyzer = analyzer_by_name(name).unwrap();
            assert_eq!(analyzer.name(), name);
        }
    }

    #[test]
    fn test_analyzer_by_name_rejects_unknown() {
        let err = analyzer_by_name("snowball").unwrap_err();
        assert!(err.to_string().contains("unknown analyzer name"));
    }
}
