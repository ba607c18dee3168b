//! Keyword analyzers that treat the entire input as a single token.
//!
//! [`KeywordAnalyzer`] emits the input verbatim; [`LowercaseKeywordAnalyzer`]
//! lowercases it first. The lowercasing variant is the write-side default, so
//! untokenized values and document identifiers match case-insensitively.
//!
//! # Examples
//!
//! ```
//! use shrike::analysis::{Analyzer, LowercaseKeywordAnalyzer};
//!
//! let analyzer = LowercaseKeywordAnalyzer::new();
//! let tokens: Vec<_> = analyzer.analyze("User-123-ABC").unwrap().collect();
//!
//! assert_eq!(tokens.len(), 1);
//! assert_eq!(tokens[0].text, "user-123-abc");
//! ```

use crate::analysis::analyzer::Analyzer;
use crate::analysis::token::{IntoTokenStream, Token, TokenStream};
use crate::error::Result;

/// An analyzer that emits the whole input as one verbatim token.
///
/// Useful for identifiers, codes, and other fields that must match exactly
/// as provided.
#[derive(Debug, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    /// Create a new keyword analyzer.
    pub fn new() -> Self {
        KeywordAnalyzer
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        if text.is_empty() {
            return Ok(Vec::new().into_token_stream());
        }
        Ok(vec![Token::new(text, 0)].into_token_stream())
    }

    fn name(&self) -> &'static str {
        "keyword"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// An analyzer that emits the whole input as one lowercased token.
#[derive(Debug, Default)]
pub struct LowercaseKeywordAnalyzer;

impl LowercaseKeywordAnalyzer {
    /// Create a new lowercasing keyword analyzer.
    pub fn new() -> Self {
        LowercaseKeywordAnalyzer
    }
}

impl Analyzer for LowercaseKeywordAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        if text.is_empty() {
            return Ok(Vec::new().into_token_stream());
        }
        Ok(vec![Token::new(text.to_lowercase(), 0)].into_token_stream())
    }

    fn name(&self) -> &'static str {
        "lowercase_keyword"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
