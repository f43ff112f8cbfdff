//! `codetree` is a language-agnostic structural source-code analyzer.
//!
//! It runs a source file through a streaming lexical tokenizer (§4.4), a
//! generic grammar-driven recursive parser (§4.5) whose per-language
//! knowledge is confined to a small [`grammar::LanguageDetector`]
//! implementation, and produces a fixed-shape [AST](ast::AstNode). That tree
//! can then be flattened back into a flat token sequence by the tree
//! tokenizer (§4.8), either faithfully (an exact round trip of the source,
//! annotated with structure) or in a re-indented simplified form.
//!
//! Two languages ship today: [`Language::Python`] and
//! [`Language::TypeScript`]. Adding a third means writing a [`CharLexer`]
//! and a [`grammar::LanguageDetector`] — the lexer, parser, and tree
//! tokenizer are unchanged.
//!
//! # Example
//!
//! ```
//! use codetree::{parse, tokenize, Language};
//!
//! let source = "def greet(name: str) -> str:\n    return name\n";
//! let tokens = tokenize(source, Language::Python).unwrap();
//! let ast = parse(source, &tokens, Language::Python).unwrap();
//! assert_eq!(ast.borrow().children.len(), 1);
//! ```

pub mod ast;
pub mod braces;
pub mod error;
pub mod expression_matcher;
pub mod grammar;
pub mod lex;
pub mod position;
pub mod tokenizer;
pub mod tree_token;

use ast::NodeRef;
use error::ParseError;
use grammar::python_detector::PythonDetector;
use grammar::typescript_detector::TypeScriptDetector;
use grammar::GrammarParser;
use lex::LexToken;
use tokenizer::python::PythonLexer;
use tokenizer::typescript::TypeScriptLexer;
use tokenizer::LexicalTokenizer;

pub use position::SourceMap;
pub use tree_token::{flatten, flatten_faithfully, tokenize_replace_node, tokenize_subtree, tokenize_target_node, FidelityLevel, TreeToken, TreeTokenKind};

/// The languages this crate currently understands (§1, §9). Neither variant
/// carries data; it only selects which lexer and detector a call dispatches
/// to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    TypeScript,
}

/// Run the streaming lexical tokenizer for `language` over `source` (§4.4).
/// The result is the input to [`parse`].
pub fn tokenize(source: &str, language: Language) -> Result<Vec<LexToken>, ParseError> {
    let tokens = match language {
        Language::Python => LexicalTokenizer::new(PythonLexer::new()).tokenize(source)?,
        Language::TypeScript => LexicalTokenizer::new(TypeScriptLexer::new()).tokenize(source)?,
    };
    Ok(tokens)
}

/// Parse an already-tokenized source into the [AST](ast::AstNode) root for
/// `language` (§4.5). `tokens` must be the output of [`tokenize`] called
/// with the same `language` over the same `source`.
pub fn parse(_source: &str, tokens: &[LexToken], language: Language) -> Result<NodeRef, ParseError> {
    match language {
        Language::Python => GrammarParser::new(tokens, PythonDetector::new()).parse(),
        Language::TypeScript => GrammarParser::new(tokens, TypeScriptDetector::new()).parse(),
    }
}

/// Convenience wrapper: tokenize then parse `source` in one call.
pub fn parse_source(source: &str, language: Language) -> Result<NodeRef, ParseError> {
    let tokens = tokenize(source, language)?;
    parse(source, &tokens, language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_source_round_trips_through_tokenize_and_parse() {
        let source = "class A:\n    x: int = 1\n";
        let ast = parse_source(source, Language::Python).unwrap();
        let map = SourceMap::new(source);
        let tokens = flatten_faithfully(&ast, &map, FidelityLevel::Everything, true);
        let joined: String = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn typescript_language_dispatches_to_its_own_lexer_and_detector() {
        let source = "class B {\n  y: string = \"hi\";\n}\n";
        let ast = parse_source(source, Language::TypeScript).unwrap();
        assert_eq!(ast.borrow().children.len(), 1);
    }
}
