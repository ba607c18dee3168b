//! Text analysis: turning field text into index terms.
//!
//! Analysis is deliberately small here. Indexes default to the
//! [`LowercaseKeywordAnalyzer`] so identifiers and plain values match
//! case-insensitively; fields configured as analyzed go through the
//! [`StandardAnalyzer`]; custom analyzers are resolved by name from the
//! built-in set via [`analyzer_by_name`].
//!
//! # Examples
//!
//! ```
//! use shrike::analysis::{Analyzer, StandardAnalyzer};
//!
//! let analyzer = StandardAnalyzer::new();
//! let tokens: Vec<_> = analyzer.analyze("Hello, World!").unwrap().collect();
//! assert_eq!(tokens.len(), 2);
//! assert_eq!(tokens[0].text, "hello");
//! ```

pub mod analyzer;
pub mod keyword;
pub mod per_field;
pub mod simple;
pub mod standard;
pub mod token;

pub use analyzer::{Analyzer, analyzer_by_name};
pub use keyword::{KeywordAnalyzer, LowercaseKeywordAnalyzer};
pub use per_field::PerFieldAnalyzer;
pub use simple::SimpleAnalyzer;
pub use standard::StandardAnalyzer;
pub use token::{IntoTokenStream, Token, TokenStream};
