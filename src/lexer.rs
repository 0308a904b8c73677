use crate::diagnostics::Diagnostics;
use crate::token::{keyword_kind, Token, TokenKind};

/// Turns UTF-8 source text into a token stream, synthesizing `Indent`/`Dedent`
/// tokens from leading whitespace after each newline. Errors accumulate in the
/// diagnostics sink; the stream is always delivered in full.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    start_pos: usize,
    start_line: u32,
    start_column: u32,
    indent_stack: Vec<usize>,
    tokens: Vec<Token>,
    diagnostics: Diagnostics,
}

pub fn tokenize(source: &str) -> (Vec<Token>, Diagnostics) {
    Lexer::new(source).run()
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
            indent_stack: vec![0],
            tokens: Vec::new(),
            diagnostics: Diagnostics::new("Lexical"),
        }
    }

    pub fn run(mut self) -> (Vec<Token>, Diagnostics) {
        while !self.is_at_end() {
            self.scan_token();
        }

        // A file that does not end in a newline still terminates its last
        // statement; open indentation levels all close before EOF.
        let last_real = self
            .tokens
            .iter()
            .rev()
            .find(|token| !matches!(token.kind, TokenKind::Indent | TokenKind::Dedent));
        if last_real.is_some_and(|token| token.kind != TokenKind::Newline) {
            self.push_synthetic(TokenKind::Newline);
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push_synthetic(TokenKind::Dedent);
        }
        self.push_synthetic(TokenKind::Eof);

        (self.tokens, self.diagnostics)
    }

    fn scan_token(&mut self) {
        self.start_pos = self.pos;
        self.start_line = self.line;
        self.start_column = self.column;
        let Some(c) = self.advance() else { return };

        match c {
            ' ' | '\r' | '\t' => {}
            '\n' => {
                self.add_token(TokenKind::Newline, "");
                self.handle_indentation();
            }
            '#' => self.skip_comment(),
            '@' => self.scan_annotation(),
            '(' => self.add_token(TokenKind::LeftParen, "("),
            ')' => self.add_token(TokenKind::RightParen, ")"),
            '[' => self.add_token(TokenKind::LeftBracket, "["),
            ']' => self.add_token(TokenKind::RightBracket, "]"),
            '{' => self.add_token(TokenKind::LeftBrace, "{"),
            '}' => self.add_token(TokenKind::RightBrace, "}"),
            ',' => self.add_token(TokenKind::Comma, ","),
            '.' => self.add_token(TokenKind::Dot, "."),
            ';' => self.add_token(TokenKind::Semicolon, ";"),
            '$' => self.add_token(TokenKind::Dollar, "$"),
            '^' => self.add_token(TokenKind::BitXor, "^"),
            '~' => self.add_token(TokenKind::BitNot, "~"),
            ':' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::InferAssign, ":=");
                } else {
                    self.add_token(TokenKind::Colon, ":");
                }
            }
            '+' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::PlusAssign, "+=");
                } else {
                    self.add_token(TokenKind::Plus, "+");
                }
            }
            '-' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::MinusAssign, "-=");
                } else if self.match_char('>') {
                    self.add_token(TokenKind::Arrow, "->");
                } else {
                    self.add_token(TokenKind::Minus, "-");
                }
            }
            '*' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::MultiplyAssign, "*=");
                } else {
                    self.add_token(TokenKind::Multiply, "*");
                }
            }
            '/' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::DivideAssign, "/=");
                } else {
                    self.add_token(TokenKind::Divide, "/");
                }
            }
            '%' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::ModuloAssign, "%=");
                } else {
                    self.add_token(TokenKind::Modulo, "%");
                }
            }
            '=' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::Equal, "==");
                } else {
                    self.add_token(TokenKind::Assign, "=");
                }
            }
            '!' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::NotEqual, "!=");
                } else {
                    self.add_token(TokenKind::LogicalNot, "!");
                }
            }
            '<' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::LessEqual, "<=");
                } else if self.match_char('<') {
                    self.add_token(TokenKind::ShiftLeft, "<<");
                } else {
                    self.add_token(TokenKind::Less, "<");
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::GreaterEqual, ">=");
                } else if self.match_char('>') {
                    self.add_token(TokenKind::ShiftRight, ">>");
                } else {
                    self.add_token(TokenKind::Greater, ">");
                }
            }
            '&' => {
                if self.match_char('&') {
                    self.add_token(TokenKind::LogicalAnd, "&&");
                } else {
                    self.add_token(TokenKind::BitAnd, "&");
                }
            }
            '|' => {
                if self.match_char('|') {
                    self.add_token(TokenKind::LogicalOr, "||");
                } else {
                    self.add_token(TokenKind::BitOr, "|");
                }
            }
            '"' | '\'' => self.scan_string(c),
            _ if c.is_ascii_digit() => self.scan_number(),
            _ if is_identifier_start(c) => self.scan_identifier(),
            _ => {
                self.diagnostics
                    .error(self.start_line, format!("Unexpected character: {c}"));
                self.add_token(TokenKind::Invalid, c.to_string());
            }
        }
    }

    fn scan_number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_float = false;

        // A decimal point only belongs to the literal when a digit follows it.
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let lexeme = self.source[self.start_pos..self.pos].to_string();
        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Integer
        };
        self.add_token(kind, lexeme);
    }

    fn scan_identifier(&mut self) {
        while self.peek().is_some_and(is_identifier_continue) {
            self.advance();
        }
        let lexeme = self.source[self.start_pos..self.pos].to_string();
        let kind = keyword_kind(&lexeme).unwrap_or(TokenKind::Identifier);
        self.add_token(kind, lexeme);
    }

    fn scan_string(&mut self, quote: char) {
        let mut value = String::new();

        loop {
            match self.peek() {
                None => {
                    self.diagnostics.error(self.start_line, "Unterminated string");
                    return;
                }
                Some(c) if c == quote => break,
                Some('\\') => {
                    self.advance();
                    let Some(escaped) = self.advance() else {
                        self.diagnostics.error(self.start_line, "Unterminated string");
                        return;
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        // An unrecognized escape keeps the character and
                        // drops the backslash.
                        other => value.push(other),
                    }
                }
                Some(_) => {
                    if let Some(c) = self.advance() {
                        value.push(c);
                    }
                }
            }
        }

        self.advance(); // closing quote
        self.add_token(TokenKind::Str, value);
    }

    fn scan_annotation(&mut self) {
        if !self.peek().is_some_and(is_identifier_start) {
            self.diagnostics.error(self.start_line, "Invalid annotation");
            return;
        }
        while self.peek().is_some_and(is_identifier_continue) {
            self.advance();
        }
        let lexeme = self.source[self.start_pos..self.pos].to_string();
        self.add_token(TokenKind::Annotation, lexeme);
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
        }
    }

    /// Runs after every newline token: counts leading whitespace (tab = 4
    /// spaces) and emits `Indent`/`Dedent` tokens against the indent stack.
    /// Blank and comment-only lines leave the stack untouched.
    fn handle_indentation(&mut self) {
        let mut indent_level = 0usize;
        while let Some(c) = self.peek() {
            match c {
                ' ' => indent_level += 1,
                '\t' => indent_level += 4,
                _ => break,
            }
            self.advance();
        }

        if matches!(self.peek(), Some('\n' | '#')) {
            return;
        }

        let current = self.current_indent();
        if indent_level > current {
            self.indent_stack.push(indent_level);
            self.push_synthetic(TokenKind::Indent);
        } else if indent_level < current {
            while self.current_indent() > indent_level {
                self.indent_stack.pop();
                self.push_synthetic(TokenKind::Dedent);
            }
            if self.current_indent() != indent_level {
                self.diagnostics.error(self.line, "Invalid indentation level");
            }
        }
    }

    fn current_indent(&self) -> usize {
        self.indent_stack.last().copied().unwrap_or(0)
    }

    fn add_token(&mut self, kind: TokenKind, lexeme: impl Into<String>) {
        self.tokens.push(Token::new(
            kind,
            lexeme,
            self.start_line,
            self.start_column,
        ));
    }

    fn push_synthetic(&mut self, kind: TokenKind) {
        self.tokens
            .push(Token::new(kind, "", self.line, self.column));
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next()?;
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diagnostics) = tokenize(source);
        assert!(
            !diagnostics.has_errors(),
            "unexpected lex errors: {:?}",
            diagnostics.iter().collect::<Vec<_>>()
        );
        tokens.into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn lexes_if_block_with_indentation() {
        let source = "if x:\n    y\n    z\n";
        let (tokens, diagnostics) = tokenize(source);
        assert!(!diagnostics.has_errors());

        let observed: Vec<(TokenKind, &str)> = tokens
            .iter()
            .map(|token| (token.kind, token.lexeme.as_str()))
            .collect();
        assert_eq!(
            observed,
            vec![
                (TokenKind::If, "if"),
                (TokenKind::Identifier, "x"),
                (TokenKind::Colon, ":"),
                (TokenKind::Newline, ""),
                (TokenKind::Indent, ""),
                (TokenKind::Identifier, "y"),
                (TokenKind::Newline, ""),
                (TokenKind::Identifier, "z"),
                (TokenKind::Newline, ""),
                (TokenKind::Dedent, ""),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    fn lexes_compound_operators() {
        assert_eq!(
            kinds("a := b + 1\n"),
            vec![
                TokenKind::Identifier,
                TokenKind::InferAssign,
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::Integer,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            &kinds("x <<= 1\n")[1..3],
            &[TokenKind::ShiftLeft, TokenKind::Assign]
        );
        assert_eq!(
            kinds("f(a) -> int\n"),
            vec![
                TokenKind::Identifier,
                TokenKind::LeftParen,
                TokenKind::Identifier,
                TokenKind::RightParen,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn float_promotion_requires_digit_after_dot() {
        let (tokens, _) = tokenize("a = 7.\n");
        let observed: Vec<(TokenKind, &str)> = tokens
            .iter()
            .map(|token| (token.kind, token.lexeme.as_str()))
            .collect();
        assert_eq!(observed[2], (TokenKind::Integer, "7"));
        assert_eq!(observed[3], (TokenKind::Dot, "."));

        let (tokens, _) = tokenize("b = 1.5e-3\n");
        assert_eq!(tokens[2].kind, TokenKind::Float);
        assert_eq!(tokens[2].lexeme, "1.5e-3");

        let (tokens, _) = tokenize("c = 2E8\n");
        assert_eq!(tokens[2].kind, TokenKind::Float);
        assert_eq!(tokens[2].lexeme, "2E8");
    }

    #[test]
    fn string_escapes_resolve_and_unknown_escape_drops_backslash() {
        let (tokens, diagnostics) = tokenize("s = \"a\\nb\\qc\"\n");
        assert!(!diagnostics.has_errors());
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].lexeme, "a\nbqc");
    }

    #[test]
    fn single_quoted_strings_lex_like_double_quoted() {
        let (tokens, _) = tokenize("s = 'hi \"there\"'\n");
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].lexeme, "hi \"there\"");
    }

    #[test]
    fn errors_on_unterminated_string() {
        let (tokens, diagnostics) = tokenize("x = \"abc");
        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Unterminated string")));
        assert!(!tokens.iter().any(|t| t.kind == TokenKind::Str));
    }

    #[test]
    fn annotations_keep_the_at_sign() {
        let (tokens, diagnostics) = tokenize("@export\nvar x = 1\n");
        assert!(!diagnostics.has_errors());
        assert_eq!(tokens[0].kind, TokenKind::Annotation);
        assert_eq!(tokens[0].lexeme, "@export");
    }

    #[test]
    fn bare_at_sign_is_an_invalid_annotation() {
        let (_, diagnostics) = tokenize("@ x\n");
        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Invalid annotation")));
    }

    #[test]
    fn errors_on_inconsistent_dedent() {
        let source = indoc! {"
            if x:
                a = 1
              b = 2
        "};
        let (_, diagnostics) = tokenize(source);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Invalid indentation level")));
    }

    #[test]
    fn blank_lines_and_comments_do_not_change_indentation() {
        let source = indoc! {"
            if x:
                a = 1

                # comment
                b = 2
        "};
        let observed = kinds(source);
        let indents = observed
            .iter()
            .filter(|k| **k == TokenKind::Indent)
            .count();
        let dedents = observed
            .iter()
            .filter(|k| **k == TokenKind::Dedent)
            .count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn emits_dedent_for_every_open_level_at_eof() {
        let source = "while a:\n    if b:\n        c";
        let observed = kinds(source);
        let dedents = observed
            .iter()
            .filter(|k| **k == TokenKind::Dedent)
            .count();
        assert_eq!(dedents, 2);
        // The statement without a trailing newline still terminates.
        assert_eq!(
            &observed[observed.len() - 4..],
            &[
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Dedent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn indent_and_dedent_counts_balance() {
        let source = indoc! {"
            func f():
                if a:
                    b = 1
                else:
                    c = 2
            f()
        "};
        let observed = kinds(source);
        let indents = observed
            .iter()
            .filter(|k| **k == TokenKind::Indent)
            .count();
        let dedents = observed
            .iter()
            .filter(|k| **k == TokenKind::Dedent)
            .count();
        assert_eq!(indents, dedents);
    }

    #[test]
    fn unexpected_character_is_reported_and_stream_continues() {
        let (tokens, diagnostics) = tokenize("x = 1 ? 2\n");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Unexpected character: ?")));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Invalid));
        // Lexing continued past the bad character.
        assert_eq!(
            tokens
                .iter()
                .filter(|t| t.kind == TokenKind::Integer)
                .count(),
            2
        );
    }

    #[test]
    fn lexemes_reassemble_the_source_line() {
        let source = "total:=x+42*len(items)\n";
        let (tokens, diagnostics) = tokenize(source);
        assert!(!diagnostics.has_errors());
        let joined: String = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(joined, "total:=x+42*len(items)");
    }

    #[test]
    fn tokens_record_start_positions() {
        let (tokens, _) = tokenize("var x = 10\nvar y = 20\n");
        let y_decl: Vec<&Token> = tokens.iter().filter(|t| t.line == 2).collect();
        assert!(y_decl.iter().any(|t| t.lexeme == "y"));
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
    }
}
