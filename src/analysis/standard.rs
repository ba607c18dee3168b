//! Standard analyzer: Unicode word segmentation plus lowercasing.

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::analyzer::Analyzer;
use crate::analysis::token::{IntoTokenStream, Token, TokenStream};
use crate::error::Result;

/// The default analyzer for analyzed text fields.
///
/// Splits the input into words along Unicode word boundaries and lowercases
/// each token. Punctuation is dropped; no stop word filtering is applied.
///
/// # Examples
///
/// ```
/// use shrike::analysis::{Analyzer, StandardAnalyzer};
///
/// let analyzer = StandardAnalyzer::new();
/// let tokens: Vec<_> = analyzer.analyze("The Quick-Brown Fox!").unwrap().collect();
/// let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
/// assert_eq!(texts, ["the", "quick", "brown", "fox"]);
/// ```
#[derive(Debug, Default)]
pub struct StandardAnalyzer;

impl StandardAnalyzer {
    /// Create a new standard analyzer.
    pub fn new() -> Self {
        StandardAnalyzer
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        let tokens: Vec<Token> = text
            .unicode_words()
            .enumerate()
            .map(|(position, word)| Token::new(word.to_lowercase(), position))
            .collect();
        Ok(tokens.into_token_stream())
    }

    fn name(&self) -> &'static str {
        "standard"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
