//! A C99 lexing and preprocessing front end.
//!
//! The crate turns a set of source files into a fully macro-expanded,
//! token-linearized translation unit: physical source reading (trigraphs,
//! line splicing), scanning into preprocessing tokens, the directive
//! grammar, and the conditional-inclusion / macro-expansion engine with
//! hide sets. Downstream parsing and semantic analysis are the caller's
//! business; tokens are streamed to a [`TokenSink`] in source order.
//!
//! ```no_run
//! use precc::{Options, preprocess_source, tok_src};
//!
//! let opts = Options::default();
//! let mut out = String::new();
//! let result = preprocess_source("demo.c", "#define N 4\nint x[N];\n", &opts, &mut |tok: &precc::Token| {
//!     out.push_str(&tok_src(tok));
//! });
//! ```

pub mod error;
pub mod expr;
pub mod lexer;
pub mod macros;
pub mod model;
pub mod options;
pub mod parser;
pub mod preprocessor;
pub mod source;
pub mod symbols;
pub mod token;
pub mod ucn;

pub use error::{Diagnostic, ErrorKind, PpError, PpResult, Report, Severity, SourceLocation};
pub use lexer::Lexer;
pub use macros::{Builtin, MacroDef, MacroParams, MacroTable};
pub use model::{Kind, Model, ModelItem};
pub use options::{Options, Tweaks};
pub use parser::{GroupPart, PreprocessingFile, parse_source};
pub use preprocessor::{Preprocessed, TokenSink, preprocess, preprocess_source};
pub use symbols::{SymId, intern, register_file, sym_text};
pub use token::{Enc, HideSet, Punct, Token, TokenKind, join_tokens, tok_src};
pub use ucn::{is_ucn_digit, is_ucn_nondigit};
