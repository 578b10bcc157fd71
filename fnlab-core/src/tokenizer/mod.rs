//! Lexical analysis for the Python subset.
//!
//! [`tokenize`] runs the raw [`token::Tokenizer`] and then the
//! [`layout::apply_layout`] pass, yielding the token stream the analyzer
//! consumes.

pub mod keyword;
pub mod layout;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;

use token::{Tokenizer, TokenizerResult, TokenSpan};

pub fn tokenize(source: &str) -> TokenizerResult<Vec<TokenSpan>> {
    let mut tokenizer = Tokenizer::new();
    let raw = tokenizer.tokenize(source)?;
    layout::apply_layout(raw, tokenizer.position())
}
