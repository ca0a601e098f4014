//! Static validation of a script without running it.
//!
//! Reports what the parser already found (lex errors, lines outside any
//! label, duplicate labels) plus unknown commands and jump targets that do
//! not exist.

use std::ops::Range;

use ku_script::{Diagnostic, LineKind, Script, Severity, Token};

use crate::dispatch::DispatchTable;

/// Every problem found in `script`, in source order.
pub fn check(script: &Script, table: &DispatchTable) -> Vec<Diagnostic> {
    let mut diagnostics = script.diagnostics().to_vec();
    if script.labels().is_empty() {
        diagnostics.push(Diagnostic::error(0..0, "script defines no labels"));
    }

    for line in script.lines() {
        let LineKind::Commands { tokens, spans } = &line.kind else {
            continue;
        };
        let span = |i: usize| -> Range<usize> { spans.get(i).cloned().unwrap_or(line.span.clone()) };

        for start in command_starts(tokens) {
            match &tokens[start] {
                Token::Word(word) if table.contains(word) => {}
                Token::Word(word) => {
                    let mut diagnostic =
                        Diagnostic::error(span(start), format!("unknown command: {word}"))
                            .with_label("not a command");
                    if word.ends_with(|c: char| c.is_ascii_digit()) {
                        diagnostic =
                            diagnostic.with_note("only w, d, s and c take a number suffix");
                    }
                    diagnostics.push(diagnostic);
                }
                other => diagnostics.push(
                    Diagnostic::error(span(start), format!("expected a command, found {other}")),
                ),
            }
        }

        for (i, token) in tokens.iter().enumerate() {
            if let Token::Label(name) = token {
                if script.find_label(name).is_none() {
                    diagnostics.push(
                        Diagnostic::error(span(i), format!("label *{name} does not exist"))
                            .with_label("jump target"),
                    );
                }
            }
        }
    }

    diagnostics.sort_by_key(|d| d.span.start);
    diagnostics
}

/// Whether any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}

/// Token indices where a command word is expected: the start of the line,
/// after every `:`, and after the condition of `if`/`notif`.
fn command_starts(tokens: &[Token]) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut expect_command = true;
    let mut condition_at = None;
    for (i, token) in tokens.iter().enumerate() {
        if *token == Token::Colon {
            expect_command = true;
            condition_at = None;
            continue;
        }
        let begins = expect_command
            || condition_at.is_some_and(|at| i > at + 1 && ends_condition(&tokens[i - 1], token));
        if begins {
            starts.push(i);
            expect_command = false;
            condition_at = is_conditional(token).then_some(i);
        }
    }
    starts
}

fn is_conditional(token: &Token) -> bool {
    matches!(token, Token::Word(w) if w == "if" || w == "notif")
}

/// A word right after an operand, with no operator between them, begins
/// the guarded command.
fn ends_condition(previous: &Token, token: &Token) -> bool {
    let operand = matches!(
        previous,
        Token::Int(_)
            | Token::NumVar(_)
            | Token::NumAlias(_)
            | Token::StrVar(_)
            | Token::StrAlias(_)
            | Token::Str(_)
            | Token::RParen
            | Token::Word(_)
    );
    operand && matches!(token, Token::Word(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(source: &str) -> Vec<String> {
        check(&Script::parse(source), &DispatchTable::new())
            .into_iter()
            .map(|d| d.to_string())
            .collect()
    }

    #[test]
    fn clean_script() {
        let source = "*start\nmov %0, 1 : goto *next\n*next\nif %0 == 1 gosub *start\n`Hello@\n";
        assert!(messages(source).is_empty());
    }

    #[test]
    fn unknown_commands_and_labels() {
        let source = "*start\nclik : mov %0, 1\nif %0 > 2 jmup *start\ngoto *nowhere\n";
        assert_eq!(
            messages(source),
            vec![
                "error: unknown command: clik",
                "error: unknown command: jmup",
                "error: label *nowhere does not exist",
            ]
        );
    }

    #[test]
    fn variants_are_commands() {
        assert!(messages("*start\nw500 : d20 : s0 : c3\n").is_empty());

        let diagnostics = check(&Script::parse("*start\nx500\n"), &DispatchTable::new());
        assert_eq!(
            diagnostics[0].note.as_deref(),
            Some("only w, d, s and c take a number suffix")
        );
    }

    #[test]
    fn parser_diagnostics_are_included() {
        let diagnostics = check(&Script::parse("mov %0, 1\n*start\n"), &DispatchTable::new());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert!(!has_errors(&diagnostics));
    }

    #[test]
    fn no_labels_is_an_error() {
        let diagnostics = check(&Script::parse("; empty\n"), &DispatchTable::new());
        assert!(has_errors(&diagnostics));
    }

    #[test]
    fn nested_conditions() {
        let line = "if %0 == 1 notif %1 < (2 + 3) mov %2, 1 : end";
        let tokens: Vec<Token> = ku_script::lex_line(line, 0).0.into_iter().map(|(t, _)| t).collect();
        assert_eq!(command_starts(&tokens), vec![0, 4, 12, 17]);

        let aliased = ku_script::lex_line("if limit > 1 goto *x", 0).0;
        let tokens: Vec<Token> = aliased.into_iter().map(|(t, _)| t).collect();
        assert_eq!(command_starts(&tokens), vec![0, 4]);
    }
}
