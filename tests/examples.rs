//! Runs every `testdata/*.h` through the preprocessor and compares the
//! emitted token spellings against the sibling `.expected` file. The
//! cases are the worked macro-expansion examples of C99 6.10.3.

use precc::{Options, Token, TokenKind, Tweaks, preprocess, tok_src};
use std::fs;
use std::path::Path;

fn run_case(path: &Path) -> datatest_stable::Result<()> {
    let opts = Options {
        inputs: vec![path.to_path_buf()],
        tweaks: Tweaks {
            dollar_in_identifiers: true,
            empty_define: true,
            omit_comma_before_ellipsis: true,
            undef_extra_tokens: true,
            ..Tweaks::default()
        },
        ..Options::default()
    };

    let mut out = String::new();
    let mut sink = |tok: &Token| {
        assert!(
            !matches!(
                tok.kind,
                TokenKind::Punct(precc::Punct::Hash) | TokenKind::Punct(precc::Punct::HashHash)
            ),
            "[{}] '#' or '##' leaked into the output",
            path.display()
        );
        out.push_str(&tok_src(tok));
    };
    let result = preprocess(&opts, &mut sink)?;
    assert!(
        !result.report.has_errors(),
        "[{}] diagnostics: {:?}",
        path.display(),
        result.report.diagnostics()
    );

    let expected = fs::read_to_string(path.with_extension("expected"))?;
    assert_eq!(out.trim(), expected.trim(), "[{}]", path.display());
    Ok(())
}

datatest_stable::harness! {
    { test = run_case, root = "./testdata/", pattern = r#"^.*\.h$"# },
}
