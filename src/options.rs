use crate::model::Model;
use std::path::PathBuf;

/// Configurable deviations from strict C99; all default to off.
#[derive(Debug, Clone, Default)]
pub struct Tweaks {
    /// Recognize the nine trigraph sequences (translation phase 1).
    pub trigraphs: bool,
    /// `$` is an identifier nondigit.
    pub dollar_in_identifiers: bool,
    /// Accept `#define X` with no replacement list.
    pub empty_define: bool,
    /// Accept GNU `#define f(args...)` and delete a comma sitting before
    /// an empty variadic expansion.
    pub omit_comma_before_ellipsis: bool,
    /// Tolerate `#undef X EXTRA` without a warning.
    pub undef_extra_tokens: bool,
    /// Enable the GNU `#include_next` directive.
    pub include_next: bool,
    /// Consumed by the downstream semantic layer; no effect here.
    pub anonymous_struct_fields: bool,
}

#[derive(Debug, Clone)]
pub struct Options {
    /// Extra macro definitions, preprocessed as a synthetic first source.
    /// Text lines in it are discarded; only directives take effect.
    pub predefined: String,
    pub inputs: Vec<PathBuf>,
    pub quote_include_paths: Vec<PathBuf>,
    pub angle_include_paths: Vec<PathBuf>,
    pub model: Model,
    pub tweaks: Tweaks,
    /// Stop after token emission; never hand off to a downstream parser.
    pub preprocess_only: bool,
    /// Negative means unlimited.
    pub error_limit: i32,
    pub panic_on_error: bool,
    pub disable_warnings: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            predefined: String::new(),
            inputs: Vec::new(),
            quote_include_paths: Vec::new(),
            angle_include_paths: Vec::new(),
            model: Model::lp64(),
            tweaks: Tweaks::default(),
            preprocess_only: true,
            error_limit: 10,
            panic_on_error: false,
            disable_warnings: false,
        }
    }
}
