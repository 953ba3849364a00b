//! Scanner micro-cases: each input maps to a literal sequence of
//! (kind, logical offset) pairs, once with trigraphs off and once with
//! them on. Digraphs and line splicing are active in both tables.

use precc::error::Report;
use precc::lexer::Lexer;
use precc::options::Tweaks;
use precc::symbols;
use precc::token::{Punct, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum K {
    /// A single-character token: punctuator, newline, or stray char.
    C(char),
    Int,
    Id,
    Paste,
    Neq,
    OrAssign,
    Eof,
}

use K::*;

fn kind_of(tok: &precc::Token) -> K {
    match tok.kind {
        TokenKind::Eof => Eof,
        TokenKind::Newline => C('\n'),
        TokenKind::Whitespace => C(' '),
        TokenKind::IntConst => Int,
        TokenKind::Ident => Id,
        TokenKind::Other => C(symbols::sym_text(tok.val).chars().next().expect("stray char")),
        TokenKind::Punct(Punct::HashHash) => Paste,
        TokenKind::Punct(Punct::NotEq) => Neq,
        TokenKind::Punct(Punct::OrAssign) => OrAssign,
        TokenKind::Punct(p) => {
            let spelling = p.spelling();
            assert_eq!(spelling.chars().count(), 1, "unexpected token {tok:?}");
            C(spelling.chars().next().expect("spelling"))
        }
        _ => panic!("unexpected token {tok:?}"),
    }
}

fn check_table(tweaks: &Tweaks, table: &[(&str, &[(K, usize)])]) {
    for (src, expected) in table {
        let file_no = symbols::register_file("<lexer-test>");
        let mut report = Report::new(-1, false, false);
        let mut lexer = Lexer::new(file_no, src, tweaks);
        let mut got = Vec::new();
        for _ in 0..src.len() + 2 {
            let tok = lexer.next_token(&mut report).expect("scan");
            let kind = kind_of(&tok);
            got.push((kind, tok.location.offset));
            if kind == Eof {
                break;
            }
        }
        assert_eq!(
            got.last().map(|&(kind, _)| kind),
            Some(Eof),
            "scanner stall on {src:?}: {got:?}"
        );
        assert!(
            report.diagnostics().is_empty(),
            "unexpected diagnostics for {src:?}: {:?}",
            report.diagnostics()
        );
        assert_eq!(&got[..], *expected, "token mismatch for {src:?}");
    }
}

fn base_tweaks() -> Tweaks {
    Tweaks {
        dollar_in_identifiers: true,
        empty_define: true,
        omit_comma_before_ellipsis: true,
        undef_extra_tokens: true,
        ..Tweaks::default()
    }
}

#[test]
fn scan_chars() {
    let tweaks = base_tweaks();
    check_table(
        &tweaks,
        &[
            ("", &[(Eof, 1)]),
            ("%0", &[(C('%'), 1), (Int, 2), (Eof, 3)]),
            ("%:%:", &[(Paste, 1), (Eof, 5)]),
            ("%>", &[(C('}'), 1), (Eof, 3)]),
            ("0", &[(Int, 1), (Eof, 2)]),
            ("01", &[(Int, 1), (Eof, 3)]),
            (
                "0??/1\n",
                &[
                    (Int, 1),
                    (C('?'), 2),
                    (C('?'), 3),
                    (C('/'), 4),
                    (Int, 5),
                    (C('\n'), 6),
                    (Eof, 7),
                ],
            ),
            (
                "0??/1\n2",
                &[
                    (Int, 1),
                    (C('?'), 2),
                    (C('?'), 3),
                    (C('/'), 4),
                    (Int, 5),
                    (C('\n'), 6),
                    (Int, 7),
                    (Eof, 8),
                ],
            ),
            (
                "0??/\n",
                &[
                    (Int, 1),
                    (C('?'), 2),
                    (C('?'), 3),
                    (C('/'), 4),
                    (C('\n'), 5),
                    (Eof, 6),
                ],
            ),
            (
                "0??/\n2",
                &[
                    (Int, 1),
                    (C('?'), 2),
                    (C('?'), 3),
                    (C('/'), 4),
                    (C('\n'), 5),
                    (Int, 6),
                    (Eof, 7),
                ],
            ),
            (
                "0\\1\n",
                &[(Int, 1), (C('\\'), 2), (Int, 3), (C('\n'), 4), (Eof, 5)],
            ),
            (
                "0\\1\n2",
                &[
                    (Int, 1),
                    (C('\\'), 2),
                    (Int, 3),
                    (C('\n'), 4),
                    (Int, 5),
                    (Eof, 6),
                ],
            ),
            ("0\\\n", &[(Int, 1), (Eof, 4)]),
            ("0\\\n2", &[(Int, 1), (Eof, 5)]),
            ("0\x00", &[(Int, 1), (C('\0'), 2), (Eof, 3)]),
            ("0\x001", &[(Int, 1), (C('\0'), 2), (Int, 3), (Eof, 4)]),
            (":>", &[(C(']'), 1), (Eof, 3)]),
            ("<%", &[(C('{'), 1), (Eof, 3)]),
            ("<:", &[(C('['), 1), (Eof, 3)]),
            ("??!", &[(C('?'), 1), (C('?'), 2), (C('!'), 3), (Eof, 4)]),
            (
                "??!0",
                &[(C('?'), 1), (C('?'), 2), (C('!'), 3), (Int, 4), (Eof, 5)],
            ),
            (
                "??!01",
                &[(C('?'), 1), (C('?'), 2), (C('!'), 3), (Int, 4), (Eof, 6)],
            ),
            ("??!=", &[(C('?'), 1), (C('?'), 2), (Neq, 3), (Eof, 5)]),
            ("??'", &[(C('?'), 1), (C('?'), 2), (C('\''), 3), (Eof, 4)]),
            ("??(", &[(C('?'), 1), (C('?'), 2), (C('('), 3), (Eof, 4)]),
            ("??)", &[(C('?'), 1), (C('?'), 2), (C(')'), 3), (Eof, 4)]),
            ("??-", &[(C('?'), 1), (C('?'), 2), (C('-'), 3), (Eof, 4)]),
            ("??/", &[(C('?'), 1), (C('?'), 2), (C('/'), 3), (Eof, 4)]),
            (
                "??/1\n",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (C('/'), 3),
                    (Int, 4),
                    (C('\n'), 5),
                    (Eof, 6),
                ],
            ),
            (
                "??/1\n2",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (C('/'), 3),
                    (Int, 4),
                    (C('\n'), 5),
                    (Int, 6),
                    (Eof, 7),
                ],
            ),
            (
                "??/\n",
                &[(C('?'), 1), (C('?'), 2), (C('/'), 3), (C('\n'), 4), (Eof, 5)],
            ),
            (
                "??/\n2",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (C('/'), 3),
                    (C('\n'), 4),
                    (Int, 5),
                    (Eof, 6),
                ],
            ),
            ("??<", &[(C('?'), 1), (C('?'), 2), (C('<'), 3), (Eof, 4)]),
            (
                "??=??=",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (C('='), 3),
                    (C('?'), 4),
                    (C('?'), 5),
                    (C('='), 6),
                    (Eof, 7),
                ],
            ),
            ("??>", &[(C('?'), 1), (C('?'), 2), (C('>'), 3), (Eof, 4)]),
            (
                "???!",
                &[(C('?'), 1), (C('?'), 2), (C('?'), 3), (C('!'), 4), (Eof, 5)],
            ),
            (
                "???!0",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (C('?'), 3),
                    (C('!'), 4),
                    (Int, 5),
                    (Eof, 6),
                ],
            ),
            (
                "???/\n2",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (C('?'), 3),
                    (C('/'), 4),
                    (C('\n'), 5),
                    (Int, 6),
                    (Eof, 7),
                ],
            ),
            (
                "????!0",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (C('?'), 3),
                    (C('?'), 4),
                    (C('!'), 5),
                    (Int, 6),
                    (Eof, 7),
                ],
            ),
            (
                "???x0",
                &[(C('?'), 1), (C('?'), 2), (C('?'), 3), (Id, 4), (Eof, 6)],
            ),
            (
                "???x??!0",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (C('?'), 3),
                    (Id, 4),
                    (C('?'), 5),
                    (C('?'), 6),
                    (C('!'), 7),
                    (Int, 8),
                    (Eof, 9),
                ],
            ),
            ("??x0", &[(C('?'), 1), (C('?'), 2), (Id, 3), (Eof, 5)]),
            (
                "??x??!0",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (Id, 3),
                    (C('?'), 4),
                    (C('?'), 5),
                    (C('!'), 6),
                    (Int, 7),
                    (Eof, 8),
                ],
            ),
            ("?x0", &[(C('?'), 1), (Id, 2), (Eof, 4)]),
            (
                "?x??!0",
                &[
                    (C('?'), 1),
                    (Id, 2),
                    (C('?'), 3),
                    (C('?'), 4),
                    (C('!'), 5),
                    (Int, 6),
                    (Eof, 7),
                ],
            ),
            ("@", &[(C('@'), 1), (Eof, 2)]),
            ("@%", &[(C('@'), 1), (C('%'), 2), (Eof, 3)]),
            ("@%0", &[(C('@'), 1), (C('%'), 2), (Int, 3), (Eof, 4)]),
            ("@%:", &[(C('@'), 1), (C('#'), 2), (Eof, 4)]),
            ("@%:0", &[(C('@'), 1), (C('#'), 2), (Int, 4), (Eof, 5)]),
            ("@%:01", &[(C('@'), 1), (C('#'), 2), (Int, 4), (Eof, 6)]),
            (
                "@??=",
                &[(C('@'), 1), (C('?'), 2), (C('?'), 3), (C('='), 4), (Eof, 5)],
            ),
            (
                "\"(a\\\nz",
                &[(C('"'), 1), (C('('), 2), (Id, 3), (Eof, 7)],
            ),
            (
                "\\1\n",
                &[(C('\\'), 1), (Int, 2), (C('\n'), 3), (Eof, 4)],
            ),
            (
                "\\1\n2",
                &[(C('\\'), 1), (Int, 2), (C('\n'), 3), (Int, 4), (Eof, 5)],
            ),
            ("\\\n", &[(Eof, 3)]),
            ("\\\n2", &[(Int, 3), (Eof, 4)]),
            ("\\\r\n", &[(Eof, 4)]),
            ("\\\r\n2", &[(Int, 4), (Eof, 5)]),
            ("\r", &[(Eof, 2)]),
            ("\r0", &[(Int, 2), (Eof, 3)]),
            ("\r01", &[(Int, 2), (Eof, 4)]),
            ("\x00", &[(C('\0'), 1), (Eof, 2)]),
            ("\x000", &[(C('\0'), 1), (Int, 2), (Eof, 3)]),
        ],
    );
}

#[test]
fn scan_chars_trigraphs() {
    let tweaks = Tweaks {
        trigraphs: true,
        ..base_tweaks()
    };
    check_table(
        &tweaks,
        &[
            ("", &[(Eof, 1)]),
            ("%0", &[(C('%'), 1), (Int, 2), (Eof, 3)]),
            ("%:%:", &[(Paste, 1), (Eof, 5)]),
            ("%>", &[(C('}'), 1), (Eof, 3)]),
            ("0", &[(Int, 1), (Eof, 2)]),
            ("01", &[(Int, 1), (Eof, 3)]),
            (
                "0??/1\n",
                &[(Int, 1), (C('\\'), 2), (Int, 5), (C('\n'), 6), (Eof, 7)],
            ),
            (
                "0??/1\n2",
                &[
                    (Int, 1),
                    (C('\\'), 2),
                    (Int, 5),
                    (C('\n'), 6),
                    (Int, 7),
                    (Eof, 8),
                ],
            ),
            ("0??/\n", &[(Int, 1), (Eof, 6)]),
            ("0??/\n2", &[(Int, 1), (Eof, 7)]),
            (
                "0\\1\n",
                &[(Int, 1), (C('\\'), 2), (Int, 3), (C('\n'), 4), (Eof, 5)],
            ),
            (
                "0\\1\n2",
                &[
                    (Int, 1),
                    (C('\\'), 2),
                    (Int, 3),
                    (C('\n'), 4),
                    (Int, 5),
                    (Eof, 6),
                ],
            ),
            ("0\\\n", &[(Int, 1), (Eof, 4)]),
            ("0\\\n2", &[(Int, 1), (Eof, 5)]),
            ("0\x00", &[(Int, 1), (C('\0'), 2), (Eof, 3)]),
            ("0\x001", &[(Int, 1), (C('\0'), 2), (Int, 3), (Eof, 4)]),
            (":>", &[(C(']'), 1), (Eof, 3)]),
            ("<%", &[(C('{'), 1), (Eof, 3)]),
            ("<:", &[(C('['), 1), (Eof, 3)]),
            ("??!", &[(C('|'), 1), (Eof, 4)]),
            ("??!0", &[(C('|'), 1), (Int, 4), (Eof, 5)]),
            ("??!01", &[(C('|'), 1), (Int, 4), (Eof, 6)]),
            ("??!=", &[(OrAssign, 1), (Eof, 5)]),
            ("??'", &[(C('^'), 1), (Eof, 4)]),
            ("??(", &[(C('['), 1), (Eof, 4)]),
            ("??)", &[(C(']'), 1), (Eof, 4)]),
            ("??-", &[(C('~'), 1), (Eof, 4)]),
            ("??/", &[(C('\\'), 1), (Eof, 4)]),
            (
                "??/1\n",
                &[(C('\\'), 1), (Int, 4), (C('\n'), 5), (Eof, 6)],
            ),
            (
                "??/1\n2",
                &[(C('\\'), 1), (Int, 4), (C('\n'), 5), (Int, 6), (Eof, 7)],
            ),
            ("??/\n", &[(Eof, 5)]),
            ("??/\n2", &[(Int, 5), (Eof, 6)]),
            ("??<", &[(C('{'), 1), (Eof, 4)]),
            ("??=??=", &[(Paste, 1), (Eof, 7)]),
            ("??>", &[(C('}'), 1), (Eof, 4)]),
            ("???!", &[(C('?'), 1), (C('|'), 2), (Eof, 5)]),
            ("???!0", &[(C('?'), 1), (C('|'), 2), (Int, 5), (Eof, 6)]),
            ("???/\n2", &[(C('?'), 1), (Int, 6), (Eof, 7)]),
            (
                "????!0",
                &[(C('?'), 1), (C('?'), 2), (C('|'), 3), (Int, 6), (Eof, 7)],
            ),
            (
                "???x0",
                &[(C('?'), 1), (C('?'), 2), (C('?'), 3), (Id, 4), (Eof, 6)],
            ),
            (
                "???x??!0",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (C('?'), 3),
                    (Id, 4),
                    (C('|'), 5),
                    (Int, 8),
                    (Eof, 9),
                ],
            ),
            ("??x0", &[(C('?'), 1), (C('?'), 2), (Id, 3), (Eof, 5)]),
            (
                "??x??!0",
                &[
                    (C('?'), 1),
                    (C('?'), 2),
                    (Id, 3),
                    (C('|'), 4),
                    (Int, 7),
                    (Eof, 8),
                ],
            ),
            ("?x0", &[(C('?'), 1), (Id, 2), (Eof, 4)]),
            (
                "?x??!0",
                &[(C('?'), 1), (Id, 2), (C('|'), 3), (Int, 6), (Eof, 7)],
            ),
            ("@", &[(C('@'), 1), (Eof, 2)]),
            ("@%", &[(C('@'), 1), (C('%'), 2), (Eof, 3)]),
            ("@%0", &[(C('@'), 1), (C('%'), 2), (Int, 3), (Eof, 4)]),
            ("@%:", &[(C('@'), 1), (C('#'), 2), (Eof, 4)]),
            ("@%:0", &[(C('@'), 1), (C('#'), 2), (Int, 4), (Eof, 5)]),
            ("@%:01", &[(C('@'), 1), (C('#'), 2), (Int, 4), (Eof, 6)]),
            ("@??=", &[(C('@'), 1), (C('#'), 2), (Eof, 5)]),
            (
                "\"(a\\\nz",
                &[(C('"'), 1), (C('('), 2), (Id, 3), (Eof, 7)],
            ),
            (
                "\\1\n",
                &[(C('\\'), 1), (Int, 2), (C('\n'), 3), (Eof, 4)],
            ),
            (
                "\\1\n2",
                &[(C('\\'), 1), (Int, 2), (C('\n'), 3), (Int, 4), (Eof, 5)],
            ),
            ("\\\n", &[(Eof, 3)]),
            ("\\\n2", &[(Int, 3), (Eof, 4)]),
            ("\\\r\n", &[(Eof, 4)]),
            ("\\\r\n2", &[(Int, 4), (Eof, 5)]),
            ("\r", &[(Eof, 2)]),
            ("\r0", &[(Int, 2), (Eof, 3)]),
            ("\r01", &[(Int, 2), (Eof, 4)]),
            ("\x00", &[(C('\0'), 1), (Eof, 2)]),
            ("\x000", &[(C('\0'), 1), (Int, 2), (Eof, 3)]),
        ],
    );
}

#[test]
fn eof_forever() {
    let file_no = symbols::register_file("<lexer-test>");
    let mut report = Report::new(-1, false, false);
    let tweaks = Tweaks::default();
    let mut lexer = Lexer::new(file_no, "x", &tweaks);
    lexer.next_token(&mut report).expect("x");
    for _ in 0..4 {
        let tok = lexer.next_token(&mut report).expect("eof");
        assert_eq!(tok.kind, TokenKind::Eof);
        assert_eq!(tok.location.offset, 2);
    }
}

#[test]
fn dollar_gating() {
    let file_no = symbols::register_file("<lexer-test>");
    let mut report = Report::new(-1, false, false);

    let with = Tweaks {
        dollar_in_identifiers: true,
        ..Tweaks::default()
    };
    let mut lexer = Lexer::new(file_no, "a$b", &with);
    let tok = lexer.next_token(&mut report).expect("ident");
    assert_eq!(tok.kind, TokenKind::Ident);
    assert_eq!(symbols::sym_text(tok.val), "a$b");

    let without = Tweaks::default();
    let mut lexer = Lexer::new(file_no, "a$b", &without);
    let tok = lexer.next_token(&mut report).expect("ident");
    assert_eq!(symbols::sym_text(tok.val), "a");
    let tok = lexer.next_token(&mut report).expect("stray");
    assert_eq!(tok.kind, TokenKind::Other);
    assert!(report.diagnostics().is_empty());
}

#[test]
fn ucn_identifiers() {
    let file_no = symbols::register_file("<lexer-test>");
    let mut report = Report::new(-1, false, false);
    let tweaks = Tweaks::default();

    // 0x00C0 is a UCN nondigit, 0x0660 a UCN digit.
    let mut lexer = Lexer::new(file_no, "a\\u00C0b\\u0660", &tweaks);
    let tok = lexer.next_token(&mut report).expect("ident");
    assert_eq!(tok.kind, TokenKind::Ident);
    assert_eq!(symbols::sym_text(tok.val), "a\\u00C0b\\u0660");
    assert!(report.diagnostics().is_empty());

    // A UCN digit cannot start an identifier.
    let mut lexer = Lexer::new(file_no, "\\u0660", &tweaks);
    let tok = lexer.next_token(&mut report).expect("stray");
    assert_eq!(tok.kind, TokenKind::Other);
}
