use crate::ast::{
    ClassDecl, ConstDecl, EnumDecl, EnumValueDecl, Expression, ExpressionKind, FuncDecl,
    MatchCase, Parameter, Program, SignalDecl, Statement, StatementKind, VarDecl,
};
use crate::diagnostics::Diagnostics;
use crate::token::{Token, TokenKind};

const MAX_STUCK_COUNT: u32 = 100;

const ASSIGN_OPS: [TokenKind; 7] = [
    TokenKind::Assign,
    TokenKind::InferAssign,
    TokenKind::PlusAssign,
    TokenKind::MinusAssign,
    TokenKind::MultiplyAssign,
    TokenKind::DivideAssign,
    TokenKind::ModuloAssign,
];

/// Recursive-descent parser over the token stream. Errors are recorded and
/// recovered from; a `Program` is always produced.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Diagnostics,
}

pub fn parse_tokens(tokens: Vec<Token>) -> (Program, Diagnostics) {
    Parser::new(tokens).parse()
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::new(TokenKind::Eof, "", 0, 0));
        }
        Self {
            tokens,
            pos: 0,
            diagnostics: Diagnostics::new("Syntax"),
        }
    }

    pub fn parse(mut self) -> (Program, Diagnostics) {
        let mut statements = Vec::new();
        let mut last_pos = usize::MAX;
        let mut stuck_count = 0;

        while !self.is_at_end() {
            while self.match_kind(TokenKind::Newline) {}
            if self.is_at_end() {
                break;
            }

            // A parse that stops consuming tokens is forcibly advanced so a
            // single malformed construct cannot stall the whole file.
            if self.pos == last_pos {
                stuck_count += 1;
                if stuck_count >= MAX_STUCK_COUNT {
                    let token = self.peek().clone();
                    self.diagnostics.error(
                        token.line,
                        format!("Parser stuck at '{}', forcing advance", token.lexeme),
                    );
                    self.advance();
                    stuck_count = 0;
                    continue;
                }
            } else {
                stuck_count = 0;
                last_pos = self.pos;
            }

            match self.statement() {
                Some(statement) => statements.push(statement),
                None => self.synchronize(),
            }
        }

        (Program { statements }, self.diagnostics)
    }

    fn statement(&mut self) -> Option<Statement> {
        let mut annotations = Vec::new();
        while self.check(TokenKind::Annotation) {
            annotations.push(self.advance().lexeme);
            while self.match_kind(TokenKind::Newline) {}
        }

        let (line, column) = self.position();

        if self.match_kind(TokenKind::ClassName) {
            let name = self
                .consume(TokenKind::Identifier, "Expected class name after 'class_name'")
                .lexeme;
            self.consume(
                TokenKind::Newline,
                "Expected newline after class_name declaration",
            );
            // Degenerate class declaration carrying only the script's name;
            // members continue to parse at top level.
            return Some(Statement::new(
                StatementKind::Class(ClassDecl {
                    name,
                    base_class: String::new(),
                    members: Vec::new(),
                    annotations,
                }),
                line,
                column,
            ));
        }

        if self.match_kind(TokenKind::Extends) {
            let base_class = self
                .consume(TokenKind::Identifier, "Expected base class name after 'extends'")
                .lexeme;
            self.consume(
                TokenKind::Newline,
                "Expected newline after extends declaration",
            );
            return Some(Statement::new(
                StatementKind::Class(ClassDecl {
                    name: String::new(),
                    base_class,
                    members: Vec::new(),
                    annotations,
                }),
                line,
                column,
            ));
        }

        if self.match_kind(TokenKind::Class) {
            return self.class_declaration(annotations, line, column);
        }

        if self.match_kind(TokenKind::Static) {
            if self.match_kind(TokenKind::Func) {
                return self.func_declaration(annotations, true, line, column);
            }
            if self.match_kind(TokenKind::Var) {
                return self.var_declaration(annotations, true, line, column);
            }
            self.diagnostics
                .error(line, "Expected 'func' or 'var' after 'static'");
            return None;
        }

        if self.match_kind(TokenKind::Func) {
            return self.func_declaration(annotations, false, line, column);
        }
        if self.match_kind(TokenKind::Var) {
            return self.var_declaration(annotations, false, line, column);
        }
        if self.match_kind(TokenKind::Const) {
            return self.const_declaration(line, column);
        }
        if self.match_kind(TokenKind::Enum) {
            return self.enum_declaration(line, column);
        }
        if self.match_kind(TokenKind::Signal) {
            return self.signal_declaration(line, column);
        }

        if self.match_kind(TokenKind::If) {
            return self.if_statement(line, column);
        }
        if self.match_kind(TokenKind::While) {
            return self.while_statement(line, column);
        }
        if self.match_kind(TokenKind::For) {
            return self.for_statement(line, column);
        }
        if self.match_kind(TokenKind::Match) {
            return self.match_statement(line, column);
        }
        if self.match_kind(TokenKind::Return) {
            return self.return_statement(line, column);
        }

        if self.match_kind(TokenKind::Break) {
            self.consume(TokenKind::Newline, "Expected newline after 'break'");
            return Some(Statement::new(StatementKind::Break, line, column));
        }
        if self.match_kind(TokenKind::Continue) {
            self.consume(TokenKind::Newline, "Expected newline after 'continue'");
            return Some(Statement::new(StatementKind::Continue, line, column));
        }
        if self.match_kind(TokenKind::Pass) {
            self.consume(TokenKind::Newline, "Expected newline after 'pass'");
            return Some(Statement::new(StatementKind::Pass, line, column));
        }

        // `name := expr` declares a variable with an inferred type.
        if self.check(TokenKind::Identifier) && self.peek_kind_at(1) == TokenKind::InferAssign {
            let name = self.advance().lexeme;
            self.advance(); // :=
            let initializer = self.expression()?;
            self.consume(
                TokenKind::Newline,
                "Expected newline after type inference assignment",
            );
            return Some(Statement::new(
                StatementKind::Var(VarDecl {
                    name,
                    type_name: String::new(),
                    initializer: Some(initializer),
                    is_static: false,
                    annotations,
                }),
                line,
                column,
            ));
        }

        self.expression_statement(line, column)
    }

    /// An `Indent`-delimited statement list ending at `Dedent`. Newlines
    /// between statements are skipped.
    fn block_statement(&mut self) -> Statement {
        let (line, column) = self.position();
        self.consume(TokenKind::Indent, "Expected indentation");

        let mut statements = Vec::new();
        while !self.check(TokenKind::Dedent) && !self.is_at_end() {
            if self.match_kind(TokenKind::Newline) {
                continue;
            }
            if let Some(statement) = self.statement() {
                statements.push(statement);
            }
        }

        self.consume(TokenKind::Dedent, "Expected dedentation");
        Statement::new(StatementKind::Block { statements }, line, column)
    }

    fn if_statement(&mut self, line: u32, column: u32) -> Option<Statement> {
        let condition = self.expression()?;
        self.consume(TokenKind::Colon, "Expected ':' after if condition");
        self.consume(TokenKind::Newline, "Expected newline after ':'");
        let then_branch = Box::new(self.block_statement());

        let mut else_branch = None;
        if self.match_kind(TokenKind::Elif) {
            // elif chains nest as the else branch.
            let token = self.previous().clone();
            else_branch = self.if_statement(token.line, token.column).map(Box::new);
        } else if self.match_kind(TokenKind::Else) {
            self.consume(TokenKind::Colon, "Expected ':' after else");
            self.consume(TokenKind::Newline, "Expected newline after ':'");
            else_branch = Some(Box::new(self.block_statement()));
        }

        Some(Statement::new(
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            },
            line,
            column,
        ))
    }

    fn while_statement(&mut self, line: u32, column: u32) -> Option<Statement> {
        let condition = self.expression()?;
        self.consume(TokenKind::Colon, "Expected ':' after while condition");
        self.consume(TokenKind::Newline, "Expected newline after ':'");
        let body = Box::new(self.block_statement());
        Some(Statement::new(
            StatementKind::While { condition, body },
            line,
            column,
        ))
    }

    fn for_statement(&mut self, line: u32, column: u32) -> Option<Statement> {
        let variable = self
            .consume(TokenKind::Identifier, "Expected variable name")
            .lexeme;
        self.consume(TokenKind::In, "Expected 'in' after for variable");
        let iterable = self.expression()?;
        self.consume(TokenKind::Colon, "Expected ':' after for expression");
        self.consume(TokenKind::Newline, "Expected newline after ':'");
        let body = Box::new(self.block_statement());
        Some(Statement::new(
            StatementKind::For {
                variable,
                iterable,
                body,
            },
            line,
            column,
        ))
    }

    fn match_statement(&mut self, line: u32, column: u32) -> Option<Statement> {
        let expression = self.expression()?;
        self.consume(TokenKind::Colon, "Expected ':' after match expression");
        self.consume(TokenKind::Newline, "Expected newline after ':'");
        self.consume(TokenKind::Indent, "Expected indentation");

        let mut cases = Vec::new();
        while !self.check(TokenKind::Dedent) && !self.is_at_end() {
            if self.match_kind(TokenKind::Newline) {
                continue;
            }
            let Some(pattern) = self.expression() else { break };
            self.consume(TokenKind::Colon, "Expected ':' after match pattern");
            self.consume(TokenKind::Newline, "Expected newline after ':'");
            let body = self.block_statement();
            cases.push(MatchCase { pattern, body });
        }

        self.consume(TokenKind::Dedent, "Expected dedentation");
        Some(Statement::new(
            StatementKind::Match { expression, cases },
            line,
            column,
        ))
    }

    fn return_statement(&mut self, line: u32, column: u32) -> Option<Statement> {
        let mut value = None;
        if !self.check(TokenKind::Newline) && !self.check(TokenKind::Dedent) {
            value = self.expression();
        }

        while self.match_kind(TokenKind::Newline) {}
        if !self.check(TokenKind::Newline) && !self.check(TokenKind::Dedent) && !self.is_at_end() {
            self.consume(TokenKind::Newline, "Expected newline after return statement");
        }

        Some(Statement::new(StatementKind::Return { value }, line, column))
    }

    fn expression_statement(&mut self, line: u32, column: u32) -> Option<Statement> {
        let expression = self.expression()?;
        self.end_of_statement("Expected newline after expression");
        Some(Statement::new(
            StatementKind::Expression { expression },
            line,
            column,
        ))
    }

    fn var_declaration(
        &mut self,
        annotations: Vec<String>,
        is_static: bool,
        line: u32,
        column: u32,
    ) -> Option<Statement> {
        let name = self
            .consume(TokenKind::Identifier, "Expected variable name")
            .lexeme;

        let mut type_name = String::new();
        if self.match_kind(TokenKind::Colon) {
            type_name = self
                .consume(TokenKind::Identifier, "Expected type name")
                .lexeme;
            // Single generic parameter, stored textually: Array[String]
            if self.match_kind(TokenKind::LeftBracket) {
                let generic = self
                    .consume(TokenKind::Identifier, "Expected generic type name")
                    .lexeme;
                self.consume(TokenKind::RightBracket, "Expected ']' after generic type");
                type_name = format!("{type_name}[{generic}]");
            }
        }

        let mut initializer = None;
        if self.match_kind(TokenKind::Assign) || self.match_kind(TokenKind::InferAssign) {
            initializer = self.expression();
        }

        self.end_of_statement("Expected newline after variable declaration");
        Some(Statement::new(
            StatementKind::Var(VarDecl {
                name,
                type_name,
                initializer,
                is_static,
                annotations,
            }),
            line,
            column,
        ))
    }

    fn const_declaration(&mut self, line: u32, column: u32) -> Option<Statement> {
        let name = self
            .consume(TokenKind::Identifier, "Expected constant name")
            .lexeme;
        self.consume(TokenKind::Assign, "Expected '=' after constant name");
        let value = self.expression()?;
        self.consume(
            TokenKind::Newline,
            "Expected newline after constant declaration",
        );
        Some(Statement::new(
            StatementKind::Const(ConstDecl { name, value }),
            line,
            column,
        ))
    }

    fn func_declaration(
        &mut self,
        annotations: Vec<String>,
        is_static: bool,
        line: u32,
        column: u32,
    ) -> Option<Statement> {
        let name = self
            .consume(TokenKind::Identifier, "Expected function name")
            .lexeme;
        self.consume(TokenKind::LeftParen, "Expected '(' after function name");
        let parameters = self.parameters();
        self.consume(TokenKind::RightParen, "Expected ')' after parameters");

        let mut return_type = String::new();
        if self.match_kind(TokenKind::Arrow) {
            if self.check(TokenKind::Void) {
                return_type = self.advance().lexeme;
            } else {
                return_type = self
                    .consume(TokenKind::Identifier, "Expected return type")
                    .lexeme;
            }
        }

        self.consume(TokenKind::Colon, "Expected ':' after function signature");
        self.consume(TokenKind::Newline, "Expected newline after ':'");
        let body = Box::new(self.block_statement());

        Some(Statement::new(
            StatementKind::Func(FuncDecl {
                name,
                parameters,
                return_type,
                body,
                is_static,
                annotations,
            }),
            line,
            column,
        ))
    }

    fn class_declaration(
        &mut self,
        annotations: Vec<String>,
        line: u32,
        column: u32,
    ) -> Option<Statement> {
        let name = self
            .consume(TokenKind::Identifier, "Expected class name")
            .lexeme;

        let mut base_class = String::new();
        if self.match_kind(TokenKind::Extends) {
            base_class = self
                .consume(TokenKind::Identifier, "Expected base class name")
                .lexeme;
        }

        self.consume(TokenKind::Colon, "Expected ':' after class declaration");
        self.consume(TokenKind::Newline, "Expected newline after ':'");
        self.consume(TokenKind::Indent, "Expected indentation");

        let mut members = Vec::new();
        while !self.check(TokenKind::Dedent) && !self.is_at_end() {
            if self.match_kind(TokenKind::Newline) {
                continue;
            }
            if let Some(member) = self.statement() {
                if member.is_declaration() {
                    members.push(member);
                } else {
                    self.diagnostics
                        .error(member.line, "Only declarations are allowed in class bodies");
                }
            }
        }

        self.consume(TokenKind::Dedent, "Expected dedentation");
        Some(Statement::new(
            StatementKind::Class(ClassDecl {
                name,
                base_class,
                members,
                annotations,
            }),
            line,
            column,
        ))
    }

    fn signal_declaration(&mut self, line: u32, column: u32) -> Option<Statement> {
        let name = self
            .consume(TokenKind::Identifier, "Expected signal name")
            .lexeme;

        let mut parameters = Vec::new();
        if self.match_kind(TokenKind::LeftParen) {
            parameters = self.parameters();
            self.consume(TokenKind::RightParen, "Expected ')' after signal parameters");
        }

        self.consume(
            TokenKind::Newline,
            "Expected newline after signal declaration",
        );
        Some(Statement::new(
            StatementKind::Signal(SignalDecl { name, parameters }),
            line,
            column,
        ))
    }

    fn enum_declaration(&mut self, line: u32, column: u32) -> Option<Statement> {
        let name = self
            .consume(TokenKind::Identifier, "Expected enum name")
            .lexeme;
        self.consume(TokenKind::LeftBrace, "Expected '{' after enum name");

        let mut values = Vec::new();
        while self.match_kind(TokenKind::Newline) {}

        if !self.check(TokenKind::RightBrace) {
            loop {
                while self.match_kind(TokenKind::Newline) {}
                while self.match_kind(TokenKind::Indent) || self.match_kind(TokenKind::Dedent) {}
                if self.check(TokenKind::RightBrace) || self.is_at_end() {
                    break;
                }
                if !self.check(TokenKind::Identifier) {
                    let token = self.peek().clone();
                    self.diagnostics.error(
                        token.line,
                        format!("Expected enum value name, got '{}'", token.lexeme),
                    );
                    self.advance();
                    continue;
                }

                let value_name = self.advance().lexeme;
                let mut value = None;
                if self.match_kind(TokenKind::Assign) {
                    value = self.expression();
                }
                values.push(EnumValueDecl {
                    name: value_name,
                    value,
                });

                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        while self.match_kind(TokenKind::Newline) || self.match_kind(TokenKind::Dedent) {}
        if self.check(TokenKind::RightBrace) {
            self.advance();
        } else {
            let at = self.peek().line;
            self.diagnostics.error(at, "Expected '}' after enum values");
            while !self.check(TokenKind::Newline) && !self.is_at_end() {
                self.advance();
            }
        }

        if self.check(TokenKind::Newline) {
            self.advance();
        } else if !self.is_at_end() {
            let at = self.peek().line;
            self.diagnostics
                .error(at, "Expected newline after enum declaration");
        }

        Some(Statement::new(
            StatementKind::Enum(EnumDecl { name, values }),
            line,
            column,
        ))
    }

    fn parameters(&mut self) -> Vec<Parameter> {
        let mut params = Vec::new();
        if self.check(TokenKind::RightParen) {
            return params;
        }

        loop {
            let name = self
                .consume(TokenKind::Identifier, "Expected parameter name")
                .lexeme;

            let mut type_name = String::new();
            if self.match_kind(TokenKind::Colon) {
                type_name = self
                    .consume(TokenKind::Identifier, "Expected parameter type")
                    .lexeme;
            }

            let mut default_value = None;
            if self.match_kind(TokenKind::Assign) {
                default_value = self.expression();
            }

            params.push(Parameter {
                name,
                type_name,
                default_value,
            });

            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        params
    }

    fn arguments(&mut self) -> Vec<Expression> {
        let mut args = Vec::new();
        if self.check(TokenKind::RightParen) {
            return args;
        }

        loop {
            let Some(argument) = self.expression() else { break };
            args.push(argument);
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        args
    }

    fn expression(&mut self) -> Option<Expression> {
        self.assignment()
    }

    fn assignment(&mut self) -> Option<Expression> {
        let expr = self.ternary()?;

        if let Some(op) = self.match_any(&ASSIGN_OPS) {
            let value = self.assignment()?;
            let (line, column) = (expr.line, expr.column);
            return Some(Expression::new(
                ExpressionKind::Binary {
                    left: Box::new(expr),
                    op,
                    right: Box::new(value),
                },
                line,
                column,
            ));
        }

        Some(expr)
    }

    fn ternary(&mut self) -> Option<Expression> {
        let expr = self.logical_or()?;

        // true_expr if condition else false_expr
        if self.match_kind(TokenKind::If) {
            let condition = self.logical_or()?;
            self.consume(TokenKind::Else, "Expected 'else' in ternary expression");
            let false_expr = self.ternary()?;
            let (line, column) = (expr.line, expr.column);
            return Some(Expression::new(
                ExpressionKind::Ternary {
                    condition: Box::new(condition),
                    true_expr: Box::new(expr),
                    false_expr: Box::new(false_expr),
                },
                line,
                column,
            ));
        }

        Some(expr)
    }

    fn binary_level(
        &mut self,
        ops: &[TokenKind],
        next: fn(&mut Self) -> Option<Expression>,
    ) -> Option<Expression> {
        let mut expr = next(self)?;
        while let Some(op) = self.match_any(ops) {
            let right = next(self)?;
            let (line, column) = (expr.line, expr.column);
            expr = Expression::new(
                ExpressionKind::Binary {
                    left: Box::new(expr),
                    op,
                    right: Box::new(right),
                },
                line,
                column,
            );
        }
        Some(expr)
    }

    fn logical_or(&mut self) -> Option<Expression> {
        self.binary_level(&[TokenKind::Or, TokenKind::LogicalOr], Self::logical_and)
    }

    fn logical_and(&mut self) -> Option<Expression> {
        self.binary_level(&[TokenKind::And, TokenKind::LogicalAnd], Self::equality)
    }

    fn equality(&mut self) -> Option<Expression> {
        self.binary_level(&[TokenKind::Equal, TokenKind::NotEqual], Self::comparison)
    }

    fn comparison(&mut self) -> Option<Expression> {
        self.binary_level(
            &[
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::In,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Option<Expression> {
        self.binary_level(&[TokenKind::Minus, TokenKind::Plus], Self::factor)
    }

    fn factor(&mut self) -> Option<Expression> {
        self.binary_level(
            &[TokenKind::Divide, TokenKind::Multiply, TokenKind::Modulo],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Option<Expression> {
        if let Some(op) = self.match_any(&[
            TokenKind::Not,
            TokenKind::LogicalNot,
            TokenKind::Minus,
            TokenKind::Plus,
        ]) {
            let token = self.previous().clone();
            let operand = self.unary()?;
            return Some(Expression::new(
                ExpressionKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                token.line,
                token.column,
            ));
        }
        self.call()
    }

    fn call(&mut self) -> Option<Expression> {
        let mut expr = self.primary()?;

        loop {
            if self.match_kind(TokenKind::LeftParen) {
                let arguments = self.arguments();
                self.consume(TokenKind::RightParen, "Expected ')' after arguments");
                let (line, column) = (expr.line, expr.column);
                expr = Expression::new(
                    ExpressionKind::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                    line,
                    column,
                );
            } else if self.match_kind(TokenKind::Dot) {
                let member = self
                    .consume(TokenKind::Identifier, "Expected property name after '.'")
                    .lexeme;
                let (line, column) = (expr.line, expr.column);
                expr = Expression::new(
                    ExpressionKind::MemberAccess {
                        object: Box::new(expr),
                        member,
                    },
                    line,
                    column,
                );
            } else if self.match_kind(TokenKind::LeftBracket) {
                let index = self.expression()?;
                self.consume(TokenKind::RightBracket, "Expected ']' after array index");
                let (line, column) = (expr.line, expr.column);
                expr = Expression::new(
                    ExpressionKind::ArrayAccess {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                    column,
                );
            } else {
                break;
            }
        }

        Some(expr)
    }

    fn primary(&mut self) -> Option<Expression> {
        let token = self.peek().clone();
        let (line, column) = (token.line, token.column);

        match token.kind {
            TokenKind::Boolean
            | TokenKind::Null
            | TokenKind::Integer
            | TokenKind::Float
            | TokenKind::Str => {
                self.advance();
                Some(Expression::new(
                    ExpressionKind::Literal {
                        value: token.lexeme,
                        literal: token.kind,
                    },
                    line,
                    column,
                ))
            }
            TokenKind::Identifier => {
                self.advance();
                Some(Expression::new(
                    ExpressionKind::Identifier { name: token.lexeme },
                    line,
                    column,
                ))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::RightParen, "Expected ')' after expression");
                Some(expr)
            }
            TokenKind::LeftBracket => {
                self.advance();
                self.array_literal(line, column)
            }
            TokenKind::LeftBrace => {
                self.advance();
                self.dict_literal(line, column)
            }
            TokenKind::Func => {
                self.advance();
                self.lambda(line, column)
            }
            _ => {
                self.diagnostics.error(line, "Expected expression");
                // Advance once so callers always make progress.
                self.advance();
                None
            }
        }
    }

    fn array_literal(&mut self, line: u32, column: u32) -> Option<Expression> {
        let mut elements = Vec::new();
        while self.match_kind(TokenKind::Newline) || self.match_kind(TokenKind::Indent) {}

        if !self.check(TokenKind::RightBracket) {
            loop {
                while self.match_kind(TokenKind::Newline) || self.match_kind(TokenKind::Indent) {}
                if self.check(TokenKind::RightBracket)
                    || self.check(TokenKind::Dedent)
                    || self.is_at_end()
                {
                    break;
                }

                let Some(element) = self.expression() else { break };
                elements.push(element);

                while self.match_kind(TokenKind::Newline) {}
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        while self.match_kind(TokenKind::Newline) || self.match_kind(TokenKind::Dedent) {}
        self.consume(TokenKind::RightBracket, "Expected ']' after array elements");
        Some(Expression::new(
            ExpressionKind::ArrayLiteral { elements },
            line,
            column,
        ))
    }

    fn dict_literal(&mut self, line: u32, column: u32) -> Option<Expression> {
        let mut pairs = Vec::new();
        while self.match_kind(TokenKind::Newline) || self.match_kind(TokenKind::Indent) {}

        if !self.check(TokenKind::RightBrace) {
            loop {
                while self.match_kind(TokenKind::Newline) || self.match_kind(TokenKind::Indent) {}
                if self.check(TokenKind::RightBrace)
                    || self.check(TokenKind::Dedent)
                    || self.is_at_end()
                {
                    break;
                }

                let Some(key) = self.expression() else { break };
                self.consume(TokenKind::Colon, "Expected ':' after dictionary key");
                let Some(value) = self.expression() else { break };
                pairs.push((key, value));

                while self.match_kind(TokenKind::Newline) {}
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        while self.match_kind(TokenKind::Newline) || self.match_kind(TokenKind::Dedent) {}
        self.consume(
            TokenKind::RightBrace,
            "Expected '}' after dictionary elements",
        );
        Some(Expression::new(
            ExpressionKind::DictLiteral { pairs },
            line,
            column,
        ))
    }

    fn lambda(&mut self, line: u32, column: u32) -> Option<Expression> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'func'");
        let parameters = self.parameters();
        self.consume(TokenKind::RightParen, "Expected ')' after lambda parameters");
        self.consume(TokenKind::Colon, "Expected ':' after lambda parameters");
        let body = self.expression()?;
        Some(Expression::new(
            ExpressionKind::Lambda {
                parameters,
                body: Box::new(body),
            },
            line,
            column,
        ))
    }

    /// Consumes a trailing newline when present; at the end of a block or
    /// the file none is required.
    fn end_of_statement(&mut self, message: &str) {
        if self.check(TokenKind::Newline) {
            self.advance();
        } else if !self.check(TokenKind::Dedent) && !self.is_at_end() {
            self.consume(TokenKind::Newline, message);
        }
    }

    /// Skips to the next statement boundary after an unrecoverable error.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Newline {
                return;
            }
            match self.peek_kind() {
                TokenKind::Class
                | TokenKind::Func
                | TokenKind::Var
                | TokenKind::Const
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Token {
        if self.check(kind) {
            return self.advance();
        }
        let line = self.peek().line;
        self.diagnostics.error(line, message.to_string());
        // Always advance so an expectation failure cannot stall the parse.
        self.advance()
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek_kind() == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> Option<TokenKind> {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return Some(kind);
            }
        }
        None
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn position(&self) -> (u32, u32) {
        let token = self.peek();
        (token.line, token.column)
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }
}
