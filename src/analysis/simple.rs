//! Simple whitespace analyzer.

use crate::analysis::analyzer::Analyzer;
use crate::analysis::token::{IntoTokenStream, Token, TokenStream};
use crate::error::Result;

/// An analyzer that splits on whitespace and performs no other processing.
///
/// Tokens keep their original case; matching against them is
/// case-sensitive.
#[derive(Debug, Default)]
pub struct SimpleAnalyzer;

impl SimpleAnalyzer {
    /// Create a new simple analyzer.
    pub fn new() -> Self {
        SimpleAnalyzer
    }
}

impl Analyzer for SimpleAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        let tokens: Vec<Token> = text
            .split_whitespace()
            .enumerate()
            .map(|(position, word)| Token::new(word, position))
            .collect();
        Ok(tokens.into_token_stream())
    }

    fn name(&self) -> &'static str {
        "simple"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
