use crate::ast::{
    BinaryOp, Block, CastType, ClassDef, Expr, FuncDef, LogicalOp, Program, RelationalOp, Stmt,
    UnaryOp, VarDecl,
};
use crate::error::{Diagnostic, Diagnostics, ErrorKind, Location};
use crate::lexer::{Lexer, Token, TokenKind, TokenValue};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// A construct failed to parse. Its diagnostic has already been recorded.
#[derive(Debug)]
struct Failed;

type ParseResult<T> = Result<T, Failed>;

/// How deeply expressions, unary operators and blocks may nest.
pub const MAX_NESTING_DEPTH: usize = 64;

pub struct Parser {
    lexer: Lexer,
    current: Token,
    /// Open parentheses, braces and brackets consumed so far.
    depth: usize,
    /// Recursive constructs currently being parsed.
    nesting: usize,
    diagnostics: Diagnostics,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        let diagnostics = lexer.diagnostics().clone();
        let mut parser = Self {
            lexer,
            current: Token::new(TokenKind::Eof, Location::default()),
            depth: 0,
            nesting: 0,
            diagnostics,
        };
        parser.current = parser.next_significant();
        parser
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Parses every definition in the input. A malformed definition is
    /// reported and skipped; parsing resumes at the next one.
    pub fn parse(&mut self) -> Program {
        let mut program = Program::default();

        while !self.check(TokenKind::Eof) {
            if self.check(TokenKind::Class) {
                match self.class_def() {
                    Ok(class) => self.add_class(&mut program, class),
                    Err(Failed) => self.synchronize(),
                }
            } else {
                match self.func_def() {
                    Ok(function) => self.add_function(&mut program, function),
                    Err(Failed) => self.synchronize(),
                }
            }
        }

        tracing::debug!(
            functions = program.functions.len(),
            classes = program.classes.len(),
            "parsed program"
        );
        program
    }

    fn add_function(&self, program: &mut Program, function: FuncDef) {
        match program.functions.entry(function.name.clone()) {
            Entry::Occupied(_) => {
                self.already_declared(&function.name, function.location, "function");
            }
            Entry::Vacant(entry) => {
                entry.insert(function);
            }
        }
    }

    fn add_class(&self, program: &mut Program, class: ClassDef) {
        match program.classes.entry(class.name.clone()) {
            Entry::Occupied(_) => self.already_declared(&class.name, class.location, "class"),
            Entry::Vacant(entry) => {
                entry.insert(class);
            }
        }
    }

    /// Skips to the next token that can start a definition outside any
    /// brackets.
    fn synchronize(&mut self) {
        loop {
            self.advance();
            match self.current.kind {
                TokenKind::Eof => return,
                TokenKind::Identifier | TokenKind::Class | TokenKind::Def if self.depth == 0 => {
                    return
                }
                _ => {}
            }
        }
    }

    fn class_def(&mut self) -> ParseResult<ClassDef> {
        self.expect(TokenKind::Class)?;
        let (name, location) = self.expect_identifier("class name")?;
        self.expect(TokenKind::LeftBrace)?;

        let mut class = ClassDef {
            name,
            methods: HashMap::new(),
            attributes: Vec::new(),
            location,
        };

        while !self.check(TokenKind::RightBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            if self.matches(TokenKind::Var) {
                let attribute = self.var_decl()?;
                if class.attribute(&attribute.name).is_some()
                    || class.methods.contains_key(&attribute.name)
                {
                    self.already_declared(&attribute.name, attribute.location, "attribute");
                } else {
                    class.attributes.push(attribute);
                }
            } else {
                let method = self.func_def()?;
                if class.methods.contains_key(&method.name)
                    || class.attribute(&method.name).is_some()
                {
                    self.already_declared(&method.name, method.location, "method");
                } else {
                    class.methods.insert(method.name.clone(), method);
                }
            }
        }
        self.advance();

        tracing::debug!(
            name = %class.name,
            methods = class.methods.len(),
            attributes = class.attributes.len(),
            "parsed class"
        );
        Ok(class)
    }

    fn func_def(&mut self) -> ParseResult<FuncDef> {
        self.matches(TokenKind::Def);
        let (name, location) = self.expect_identifier("function name")?;
        self.expect(TokenKind::LeftParen)?;

        let mut params: Vec<String> = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let (param, param_location) = self.expect_identifier("parameter name")?;
                if params.contains(&param) {
                    self.already_declared(&param, param_location, "parameter");
                } else {
                    params.push(param);
                }
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        let body = self.code_block()?;

        tracing::debug!(%name, params = params.len(), "parsed function");
        Ok(FuncDef {
            name,
            params,
            body,
            location,
        })
    }

    /// `var` has been consumed.
    fn var_decl(&mut self) -> ParseResult<VarDecl> {
        let (name, location) = self.expect_identifier("variable name")?;
        let initializer = if self.matches(TokenKind::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(VarDecl {
            name,
            initializer,
            location,
        })
    }

    fn code_block(&mut self) -> ParseResult<Block> {
        self.nested(|this| {
            this.expect(TokenKind::LeftBrace)?;
            let mut statements = Vec::new();
            while !this.check(TokenKind::RightBrace) {
                if this.check(TokenKind::Eof) {
                    return Err(this.unexpected("'}'"));
                }
                statements.push(this.statement()?);
            }
            this.advance();
            Ok(Block { statements })
        })
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        let location = self.current.location.clone();
        match self.current.kind {
            TokenKind::If => {
                self.advance();
                self.if_statement(location)
            }
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LeftParen)?;
                let condition = self.expression()?;
                self.expect(TokenKind::RightParen)?;
                let body = self.code_block()?;
                Ok(Stmt::While {
                    condition,
                    body,
                    location,
                })
            }
            TokenKind::For => {
                self.advance();
                self.expect(TokenKind::LeftParen)?;
                let (iterator, _) = self.expect_identifier("loop variable")?;
                self.expect(TokenKind::In)?;
                let iterable = self.expression()?;
                self.expect(TokenKind::RightParen)?;
                let body = self.code_block()?;
                Ok(Stmt::For {
                    iterator,
                    iterable,
                    body,
                    location,
                })
            }
            TokenKind::Switch => {
                self.advance();
                self.switch_statement(location)
            }
            TokenKind::Var => {
                self.advance();
                Ok(Stmt::Var(self.var_decl()?))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Return { value, location })
            }
            _ => {
                let expr = self.expression()?;
                if self.matches(TokenKind::Assign) {
                    let value = self.expression()?;
                    self.expect(TokenKind::Semicolon)?;
                    Ok(Stmt::Assign {
                        target: expr,
                        value,
                        location,
                    })
                } else {
                    self.expect(TokenKind::Semicolon)?;
                    Ok(Stmt::Expression { expr, location })
                }
            }
        }
    }

    /// `if` has been consumed. `else if` nests the chained conditional in an
    /// else block of its own.
    fn if_statement(&mut self, location: Location) -> ParseResult<Stmt> {
        self.expect(TokenKind::LeftParen)?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParen)?;
        let then_block = self.code_block()?;

        let else_block = if self.matches(TokenKind::Else) {
            if self.check(TokenKind::If) {
                let nested_location = self.advance().location;
                let nested = self.nested(|this| this.if_statement(nested_location))?;
                Some(Block {
                    statements: vec![nested],
                })
            } else {
                Some(self.code_block()?)
            }
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_block,
            else_block,
            location,
        })
    }

    fn switch_statement(&mut self, location: Location) -> ParseResult<Stmt> {
        self.expect(TokenKind::LeftParen)?;
        let scrutinee = self.expression()?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::LeftBrace)?;

        let mut cases = Vec::new();
        while !self.check(TokenKind::RightBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            let label = self.expression()?;
            self.expect(TokenKind::Arrow)?;
            let block = self.code_block()?;
            cases.push((label, block));
        }
        self.advance();

        Ok(Stmt::Switch {
            scrutinee,
            cases,
            location,
        })
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.nested(Self::or)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while self.check(TokenKind::Or) {
            let location = self.advance().location;
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::Or,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.relational()?;

        while self.check(TokenKind::And) {
            let location = self.advance().location;
            let right = self.relational()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::And,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn relational(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::Equal => RelationalOp::Equal,
                TokenKind::NotEqual => RelationalOp::NotEqual,
                TokenKind::Less => RelationalOp::Less,
                TokenKind::LessEqual => RelationalOp::LessEqual,
                TokenKind::Greater => RelationalOp::Greater,
                TokenKind::GreaterEqual => RelationalOp::GreaterEqual,
                _ => break,
            };
            let location = self.advance().location;
            let right = self.term()?;
            expr = Expr::Relational {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => break,
            };
            let location = self.advance().location;
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                _ => break,
            };
            let location = self.advance().location;
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let operator = match self.current.kind {
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Bang | TokenKind::Not => UnaryOp::Not,
            _ => return self.postfix(),
        };
        let location = self.advance().location;
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            operator,
            operand: Box::new(operand),
            location,
        })
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.check(TokenKind::Dot) {
                let location = self.advance().location;
                let (name, _) = self.expect_identifier("member name")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    name,
                    location,
                };
            } else if self.matches(TokenKind::LeftParen) {
                let location = expr.location().clone();
                let args = self.arguments(TokenKind::RightParen)?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    location,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Comma separated expressions up to and including `close`.
    fn arguments(&mut self, close: TokenKind) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.check(close) {
            loop {
                args.push(self.expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(close)?;
        Ok(args)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let location = self.current.location.clone();

        let expr = match (self.current.kind, &self.current.value) {
            (TokenKind::Integer, Some(TokenValue::Int(value))) => Expr::Integer {
                value: *value,
                location,
            },
            (TokenKind::Float, Some(TokenValue::Float(value))) => Expr::Float {
                value: *value,
                location,
            },
            (TokenKind::String, Some(TokenValue::Str(value))) => Expr::String {
                value: value.clone(),
                location,
            },
            (TokenKind::Identifier, Some(TokenValue::Str(name))) => {
                let name = name.clone();
                self.advance();
                return self.identifier_or_cast(name, location);
            }
            (TokenKind::LeftParen, _) => {
                self.advance();
                return self.grouping(location);
            }
            (TokenKind::LeftBracket, _) => {
                self.advance();
                let elements = self.arguments(TokenKind::RightBracket)?;
                return Ok(Expr::List { elements, location });
            }
            (TokenKind::New, _) => {
                self.advance();
                let (class, _) = self.expect_identifier("class name")?;
                self.expect(TokenKind::LeftParen)?;
                let args = self.arguments(TokenKind::RightParen)?;
                return Ok(Expr::New {
                    class,
                    args,
                    location,
                });
            }
            _ => return Err(self.unexpected("expression")),
        };

        self.advance();
        Ok(expr)
    }

    /// The identifier has been consumed. `int(..)` and `float(..)` are casts.
    fn identifier_or_cast(&mut self, name: String, location: Location) -> ParseResult<Expr> {
        if let Some(target) = CastType::from_name(&name) {
            if self.matches(TokenKind::LeftParen) {
                let operand = self.expression()?;
                self.expect(TokenKind::RightParen)?;
                return Ok(Expr::Cast {
                    target,
                    operand: Box::new(operand),
                    location,
                });
            }
        }
        Ok(Expr::Identifier { name, location })
    }

    /// `(` has been consumed. `(target = value)` is an assignment expression.
    fn grouping(&mut self, location: Location) -> ParseResult<Expr> {
        let expr = self.expression()?;
        let expr = if self.matches(TokenKind::Assign) {
            let value = self.expression()?;
            Expr::Assign {
                target: Box::new(expr),
                value: Box::new(value),
                location,
            }
        } else {
            expr
        };
        self.expect(TokenKind::RightParen)?;
        Ok(expr)
    }

    fn next_significant(&mut self) -> Token {
        loop {
            let token = self.lexer.next_token();
            // Comments carry no meaning and unknown characters are already reported.
            if !matches!(token.kind, TokenKind::Comment | TokenKind::Unknown) {
                return token;
            }
        }
    }

    /// Consumes the current token and returns it.
    fn advance(&mut self) -> Token {
        match self.current.kind {
            TokenKind::LeftParen | TokenKind::LeftBrace | TokenKind::LeftBracket => {
                self.depth += 1
            }
            TokenKind::RightParen | TokenKind::RightBrace | TokenKind::RightBracket => {
                self.depth = self.depth.saturating_sub(1)
            }
            _ => {}
        }
        let next = self.next_significant();
        std::mem::replace(&mut self.current, next)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<(String, Location)> {
        if let (TokenKind::Identifier, Some(TokenValue::Str(name))) =
            (self.current.kind, &self.current.value)
        {
            let name = name.clone();
            let location = self.advance().location;
            Ok((name, location))
        } else {
            Err(self.unexpected(what))
        }
    }

    /// Parses one level deeper, or reports `NestingTooDeep` once
    /// `MAX_NESTING_DEPTH` levels are open.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.nesting >= MAX_NESTING_DEPTH {
            let fragment = self.current.fragment();
            let mut diagnostic = Diagnostic::new(
                ErrorKind::NestingTooDeep,
                self.current.location.clone(),
                self.lexer.recent_line(),
            )
            .with_explanation(format!("more than {} nested levels", MAX_NESTING_DEPTH));
            if !fragment.is_empty() {
                diagnostic = diagnostic.with_fragment(fragment);
            }
            self.diagnostics.report(diagnostic);
            return Err(Failed);
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn unexpected(&self, expected: &str) -> Failed {
        let fragment = self.current.fragment();
        let mut diagnostic = Diagnostic::new(
            ErrorKind::UnexpectedToken,
            self.current.location.clone(),
            self.lexer.recent_line(),
        )
        .with_explanation(format!(
            "expected {}, found {}",
            expected,
            self.current.kind.describe()
        ));
        if !fragment.is_empty() {
            diagnostic = diagnostic.with_fragment(fragment);
        }
        self.diagnostics.report(diagnostic);
        Failed
    }

    fn already_declared(&self, name: &str, location: Location, what: &str) {
        self.diagnostics.report(
            Diagnostic::new(ErrorKind::AlreadyDeclared, location, self.lexer.recent_line())
                .with_fragment(name)
                .with_explanation(format!("{} '{}' is already declared", what, name)),
        );
    }
}
