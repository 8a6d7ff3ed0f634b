use kiwi::error::{Diagnostics, ErrorKind};
use kiwi::lexer::{Lexer, Token, TokenKind, TokenValue, MAX_TOKEN_LENGTH};
use kiwi::source::CharSource;

fn lexer(text: &str) -> (Lexer, Diagnostics) {
    let diagnostics = Diagnostics::new();
    let source = CharSource::new(text, None).with_diagnostics(diagnostics.clone());
    (Lexer::new(source), diagnostics)
}

fn lex(text: &str) -> (Vec<Token>, Diagnostics) {
    let (lexer, diagnostics) = lexer(text);
    (lexer.collect(), diagnostics)
}

fn kinds(text: &str) -> Vec<TokenKind> {
    lex(text).0.into_iter().map(|token| token.kind).collect()
}

fn float_value(token: &Token) -> f32 {
    match token.value {
        Some(TokenValue::Float(value)) => value,
        ref other => panic!("expected a float payload, got {:?}", other),
    }
}

#[test]
fn identifiers_separated_by_space() {
    let (tokens, diagnostics) = lex("abc def");

    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!(tokens[0].text(), Some("abc"));
    assert_eq!(tokens[1].kind, TokenKind::Identifier);
    assert_eq!(tokens[1].text(), Some("def"));
    assert_eq!(tokens[1].location.column, 4);
    assert_eq!(tokens[2].kind, TokenKind::Eof);
    assert!(diagnostics.is_empty());
}

#[test]
fn two_character_operators_do_not_lose_characters() {
    assert_eq!(
        kinds("a<=b"),
        vec![
            TokenKind::Identifier,
            TokenKind::LessEqual,
            TokenKind::Identifier,
            TokenKind::Eof
        ]
    );
    assert_eq!(
        kinds("a<b"),
        vec![
            TokenKind::Identifier,
            TokenKind::Less,
            TokenKind::Identifier,
            TokenKind::Eof
        ]
    );
    assert_eq!(
        kinds("== = != ! >= > -> -"),
        vec![
            TokenKind::Equal,
            TokenKind::Assign,
            TokenKind::NotEqual,
            TokenKind::Bang,
            TokenKind::GreaterEqual,
            TokenKind::Greater,
            TokenKind::Arrow,
            TokenKind::Minus,
            TokenKind::Eof
        ]
    );
}

#[test]
fn punctuation() {
    assert_eq!(
        kinds("(){}[],;.+*/"),
        vec![
            TokenKind::LeftParen,
            TokenKind::RightParen,
            TokenKind::LeftBrace,
            TokenKind::RightBrace,
            TokenKind::LeftBracket,
            TokenKind::RightBracket,
            TokenKind::Comma,
            TokenKind::Semicolon,
            TokenKind::Dot,
            TokenKind::Plus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Eof
        ]
    );
}

#[test]
fn keywords_are_recognized() {
    assert_eq!(
        kinds("var if else and or while for return switch def class new not in"),
        vec![
            TokenKind::Var,
            TokenKind::If,
            TokenKind::Else,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::While,
            TokenKind::For,
            TokenKind::Return,
            TokenKind::Switch,
            TokenKind::Def,
            TokenKind::Class,
            TokenKind::New,
            TokenKind::Not,
            TokenKind::In,
            TokenKind::Eof
        ]
    );
    // Keywords are whole words only
    assert_eq!(kinds("variable"), vec![TokenKind::Identifier, TokenKind::Eof]);
}

#[test]
fn numbers() {
    let (tokens, diagnostics) = lex("42 3.25 0 0.5 2147483647");

    assert_eq!(tokens[0].value, Some(TokenValue::Int(42)));
    assert_eq!(tokens[1].kind, TokenKind::Float);
    assert!((float_value(&tokens[1]) - 3.25).abs() < 1e-6);
    assert_eq!(tokens[2].value, Some(TokenValue::Int(0)));
    assert!((float_value(&tokens[3]) - 0.5).abs() < 1e-6);
    assert_eq!(tokens[4].value, Some(TokenValue::Int(i32::MAX)));
    assert!(diagnostics.is_empty());
}

#[test]
fn leading_zero_is_a_complete_integer() {
    let (tokens, _) = lex("012");
    assert_eq!(tokens[0].value, Some(TokenValue::Int(0)));
    assert_eq!(tokens[1].value, Some(TokenValue::Int(12)));
}

#[test]
fn overflowing_constant_is_reported_and_skipped() {
    let (tokens, diagnostics) = lex("2147483648 x");

    assert_eq!(diagnostics.kinds(), vec![ErrorKind::ConstantTooBig]);
    assert_eq!(
        tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![TokenKind::Integer, TokenKind::Identifier, TokenKind::Eof]
    );
    assert_eq!(tokens[1].text(), Some("x"));
}

#[test]
fn very_long_constant_terminates() {
    let (tokens, diagnostics) = lex(&"9".repeat(1000));
    assert_eq!(diagnostics.count(ErrorKind::ConstantTooBig), 1);
    assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    assert_eq!(tokens.len(), 2);
}

#[test]
fn dot_without_digit_is_malformed() {
    let (tokens, diagnostics) = lex("1.x");

    assert_eq!(diagnostics.kinds(), vec![ErrorKind::MalformedNumber]);
    assert_eq!(tokens[0].kind, TokenKind::Float);
    assert!((float_value(&tokens[0]) - 1.0).abs() < 1e-6);
    assert_eq!(tokens[1].text(), Some("x"));
}

#[test]
fn too_many_fraction_digits() {
    let text = format!("1.{}", "0".repeat(MAX_TOKEN_LENGTH + 10));
    let (tokens, diagnostics) = lex(&text);

    assert_eq!(diagnostics.kinds(), vec![ErrorKind::TokenTooLong]);
    assert_eq!(tokens.len(), 2);
    assert!((float_value(&tokens[0]) - 1.0).abs() < 1e-6);
}

#[test]
fn strings_and_escapes() {
    let (tokens, diagnostics) = lex(r#""a\tb\"c" 'it\'s' "\q""#);

    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].text(), Some("a\tb\"c"));
    assert_eq!(tokens[1].text(), Some("it's"));
    // Unknown escapes are kept as written
    assert_eq!(tokens[2].text(), Some("\\q"));
    assert!(diagnostics.is_empty());
}

#[test]
fn unclosed_string_keeps_its_content() {
    let (tokens, diagnostics) = lex("\"abc\nx");

    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnclosedString]);
    assert_eq!(tokens[0].text(), Some("abc"));
    assert_eq!(tokens[1].text(), Some("x"));
    assert_eq!(tokens[1].location.line, 2);

    let (tokens, diagnostics) = lex("'abc");
    assert_eq!(diagnostics.count(ErrorKind::UnclosedString), 1);
    assert_eq!(tokens[0].text(), Some("abc"));
    assert_eq!(tokens[1].kind, TokenKind::Eof);
}

#[test]
fn comments_run_to_end_of_line() {
    let (tokens, diagnostics) = lex("a // note\nb / c");

    assert_eq!(
        tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![
            TokenKind::Identifier,
            TokenKind::Comment,
            TokenKind::Identifier,
            TokenKind::Slash,
            TokenKind::Identifier,
            TokenKind::Eof
        ]
    );
    assert_eq!(tokens[1].text(), Some(" note"));
    assert_eq!(tokens[2].location.line, 2);
    assert!(diagnostics.is_empty());
}

#[test]
fn overlong_identifier_is_truncated_and_lexing_continues() {
    let text = format!("{} next", "a".repeat(MAX_TOKEN_LENGTH + 50));
    let (tokens, diagnostics) = lex(&text);

    assert_eq!(diagnostics.kinds(), vec![ErrorKind::TokenTooLong]);
    assert_eq!(tokens[0].text().map(str::len), Some(MAX_TOKEN_LENGTH));
    assert_eq!(tokens[1].text(), Some("next"));
    assert_eq!(tokens[2].kind, TokenKind::Eof);
}

#[test]
fn overlong_string_is_truncated() {
    let text = format!("\"{}\" next", "s".repeat(MAX_TOKEN_LENGTH * 2));
    let (tokens, diagnostics) = lex(&text);

    assert_eq!(diagnostics.kinds(), vec![ErrorKind::TokenTooLong]);
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[1].text(), Some("next"));
}

#[test]
fn emoji_identifiers() {
    let (tokens, diagnostics) = lex("🥝 = x😀");
    assert_eq!(tokens[0].text(), Some("🥝"));
    assert_eq!(tokens[1].kind, TokenKind::Assign);
    assert_eq!(tokens[2].text(), Some("x😀"));
    assert!(diagnostics.is_empty());
}

#[test]
fn unknown_character_is_reported_and_skipped() {
    let (tokens, diagnostics) = lex("a $ b");

    assert_eq!(
        tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![
            TokenKind::Identifier,
            TokenKind::Unknown,
            TokenKind::Identifier,
            TokenKind::Eof
        ]
    );
    assert_eq!(diagnostics.kinds(), vec![ErrorKind::UnknownCharacter]);
}

#[test]
fn unknown_character_diagnostic_underlines_it() {
    let (tokens, diagnostics) = lex("var x = $;");
    assert_eq!(tokens.len(), 6);
    assert_eq!(
        diagnostics.render(),
        "1 Errors, most recent errors first:\n1:8: unknown character\nvar x = $\n        ^\n"
    );
}

#[test]
fn eof_is_idempotent() {
    let (mut lexer, _) = lexer("x");
    assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
    for _ in 0..3 {
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }
    assert_eq!(lexer.current_token().map(|t| t.kind), Some(TokenKind::Eof));
}

#[test]
fn token_text_form() {
    let (tokens, _) = lex("42 ( \"hi\" name");
    assert_eq!(tokens[0].to_string(), "IntToken(type=Integer, value=[42])");
    assert_eq!(tokens[1].to_string(), "Token(type=LeftParen)");
    assert_eq!(tokens[2].to_string(), "StringToken(type=String, value=[hi])");
    assert_eq!(tokens[3].to_string(), "StringToken(type=Identifier, value=[name])");
    assert_eq!(tokens[4].to_string(), "Token(type=Eof)");
}
