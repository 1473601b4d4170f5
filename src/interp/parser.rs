//! Recursive-descent parser producing [`Node`] trees

use std::rc::Rc;

use super::ast::{
    AssignOp, BinaryOp, DeclarationKind, Declarator, FunctionDef, Literal, LogicalOp,
    MemberProperty, Node, NodeKind, NodeRef, UnaryOp, UpdateOp,
};
use super::lexer::{Keyword, Lexer, Spanned, Token};
use super::ParseError;

/// Deepest statement and expression nesting the parser accepts
pub const MAX_NESTING: usize = 256;

/// Parse a complete program
pub fn parse_program(src: &str) -> Result<NodeRef, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
        prev_end: 0,
        depth: 0,
    };

    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(Node::new(0, src.len(), NodeKind::Program { body }))
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    prev_end: usize,
    /// Current statement and expression nesting
    depth: usize,
}

impl<'a> Parser<'a> {
    // === Token helpers ===

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .or_else(|| self.tokens.last())
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn start(&self) -> usize {
        self.tokens.get(self.pos).map(|s| s.start).unwrap_or(self.src.len())
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let spanned = self.tokens.get(self.pos).cloned();
        match spanned {
            Some(s) if s.token != Token::Eof => {
                self.pos += 1;
                self.prev_end = s.end;
                s.token
            }
            _ => Token::Eof,
        }
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Token::Punct(q) if *q == p)
    }

    fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Token::Keyword(k) if *k == kw)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), ParseError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{p}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let found = match self.peek() {
            Token::Eof => "end of input".to_string(),
            Token::Number(n) => format!("number {n}"),
            Token::String(s) => format!("string \"{s}\""),
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Keyword(kw) => format!("keyword '{}'", format!("{kw:?}").to_lowercase()),
            Token::Punct(p) => format!("'{p}'"),
        };
        ParseError::new(
            self.src,
            self.start(),
            format!("Unexpected {found}, expected {expected}"),
        )
    }

    fn finish(&self, start: usize, kind: NodeKind) -> NodeRef {
        Node::new(start, self.prev_end.max(start), kind)
    }

    fn consume_semicolon(&mut self) {
        self.eat_punct(";");
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`]
    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<NodeRef, ParseError>,
    ) -> Result<NodeRef, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new(
                self.src,
                self.start(),
                format!("Nesting too deep (limit {MAX_NESTING})"),
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // === Statements ===

    fn statement(&mut self) -> Result<NodeRef, ParseError> {
        self.nested(Self::statement_body)
    }

    fn statement_body(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        match self.peek().clone() {
            Token::Keyword(Keyword::Var | Keyword::Let | Keyword::Const) => {
                let node = self.variable_declaration()?;
                self.consume_semicolon();
                Ok(self.finish(start, node.kind.clone()))
            }
            Token::Keyword(Keyword::Function) => {
                self.advance();
                let def = self.function_rest(true)?;
                Ok(self.finish(start, NodeKind::FunctionDeclaration(def)))
            }
            Token::Keyword(Keyword::Return) => {
                self.advance();
                let argument = if self.is_punct(";") || self.is_punct("}") || self.at_eof() {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.consume_semicolon();
                Ok(self.finish(start, NodeKind::ReturnStatement { argument }))
            }
            Token::Keyword(Keyword::If) => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let consequent = self.statement()?;
                let alternate = if self.eat_keyword(Keyword::Else) {
                    Some(self.statement()?)
                } else {
                    None
                };
                Ok(self.finish(
                    start,
                    NodeKind::IfStatement {
                        test,
                        consequent,
                        alternate,
                    },
                ))
            }
            Token::Keyword(Keyword::For) => self.for_statement(start),
            Token::Keyword(Keyword::While) => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let body = self.statement()?;
                Ok(self.finish(start, NodeKind::WhileStatement { test, body }))
            }
            Token::Keyword(Keyword::Do) => {
                self.advance();
                let body = self.statement()?;
                if !self.eat_keyword(Keyword::While) {
                    return Err(self.unexpected("'while'"));
                }
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                self.consume_semicolon();
                Ok(self.finish(start, NodeKind::DoWhileStatement { body, test }))
            }
            Token::Keyword(Keyword::Break) => {
                self.advance();
                self.consume_semicolon();
                Ok(self.finish(start, NodeKind::BreakStatement))
            }
            Token::Keyword(Keyword::Continue) => {
                self.advance();
                self.consume_semicolon();
                Ok(self.finish(start, NodeKind::ContinueStatement))
            }
            Token::Keyword(Keyword::Throw) => {
                self.advance();
                let argument = self.expression()?;
                self.consume_semicolon();
                Ok(self.finish(start, NodeKind::ThrowStatement { argument }))
            }
            Token::Punct("{") => self.block(),
            Token::Punct(";") => {
                self.advance();
                Ok(self.finish(start, NodeKind::EmptyStatement))
            }
            Token::Eof => Err(self.unexpected("statement")),
            _ => {
                let expression = self.expression()?;
                self.consume_semicolon();
                Ok(self.finish(start, NodeKind::ExpressionStatement { expression }))
            }
        }
    }

    fn block(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(self.finish(start, NodeKind::BlockStatement { body }))
    }

    /// Declaration without the trailing semicolon, shared with `for` heads
    fn variable_declaration(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        let kind = match self.advance() {
            Token::Keyword(Keyword::Var) => DeclarationKind::Var,
            Token::Keyword(Keyword::Let) => DeclarationKind::Let,
            _ => DeclarationKind::Const,
        };

        let mut declarations = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                if kind == DeclarationKind::Const {
                    return Err(ParseError::new(
                        self.src,
                        self.prev_end,
                        "Missing initializer in const declaration",
                    ));
                }
                None
            };
            declarations.push(Declarator { name, init });
            if !self.eat_punct(",") {
                break;
            }
        }

        Ok(self.finish(start, NodeKind::VariableDeclaration { kind, declarations }))
    }

    fn for_statement(&mut self, start: usize) -> Result<NodeRef, ParseError> {
        self.advance();
        self.expect_punct("(")?;

        let init = if self.is_punct(";") {
            None
        } else if matches!(
            self.peek(),
            Token::Keyword(Keyword::Var | Keyword::Let | Keyword::Const)
        ) {
            Some(self.variable_declaration()?)
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;

        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;

        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;

        let body = self.statement()?;
        Ok(self.finish(
            start,
            NodeKind::ForStatement {
                init,
                test,
                update,
                body,
            },
        ))
    }

    /// Parameters and body after the `function` keyword
    fn function_rest(&mut self, require_name: bool) -> Result<Rc<FunctionDef>, ParseError> {
        let name = if matches!(self.peek(), Token::Ident(_)) {
            Some(self.expect_ident()?)
        } else if require_name {
            return Err(self.unexpected("function name"));
        } else {
            None
        };
        let params = self.params()?;
        let body = self.block()?;
        Ok(Rc::new(FunctionDef {
            name,
            params,
            body,
            is_arrow: false,
        }))
    }

    fn params(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.eat_punct(")") {
            loop {
                params.push(self.expect_ident()?);
                if self.eat_punct(")") {
                    break;
                }
                self.expect_punct(",")?;
            }
        }
        Ok(params)
    }

    // === Expressions ===

    fn expression(&mut self) -> Result<NodeRef, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<NodeRef, ParseError> {
        self.nested(Self::assignment_body)
    }

    fn assignment_body(&mut self) -> Result<NodeRef, ParseError> {
        if self.arrow_ahead() {
            return self.arrow_function();
        }

        let start = self.start();
        let target = self.conditional()?;

        let operator = match self.peek() {
            Token::Punct("=") => AssignOp::Assign,
            Token::Punct("+=") => AssignOp::AddAssign,
            Token::Punct("-=") => AssignOp::SubAssign,
            Token::Punct("*=") => AssignOp::MulAssign,
            Token::Punct("/=") => AssignOp::DivAssign,
            Token::Punct("%=") => AssignOp::ModAssign,
            _ => return Ok(target),
        };

        if !matches!(
            target.kind,
            NodeKind::Identifier { .. } | NodeKind::MemberExpression { .. }
        ) {
            return Err(ParseError::new(
                self.src,
                target.start,
                "Invalid left-hand side in assignment",
            ));
        }

        self.advance();
        let value = self.assignment()?;
        Ok(self.finish(
            start,
            NodeKind::AssignmentExpression {
                operator,
                target,
                value,
            },
        ))
    }

    /// `x =>` or `( ... ) =>` at the current position
    fn arrow_ahead(&self) -> bool {
        match self.peek() {
            Token::Ident(_) => matches!(self.peek_at(1), Token::Punct("=>")),
            Token::Punct("(") => {
                let mut depth = 0usize;
                let mut i = 0;
                loop {
                    match self.peek_at(i) {
                        Token::Punct("(") => depth += 1,
                        Token::Punct(")") => {
                            depth -= 1;
                            if depth == 0 {
                                return matches!(self.peek_at(i + 1), Token::Punct("=>"));
                            }
                        }
                        Token::Eof => return false,
                        _ => {}
                    }
                    i += 1;
                }
            }
            _ => false,
        }
    }

    fn arrow_function(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        let params = if self.is_punct("(") {
            self.params()?
        } else {
            vec![self.expect_ident()?]
        };
        self.expect_punct("=>")?;
        let body = if self.is_punct("{") {
            self.block()?
        } else {
            self.assignment()?
        };
        let def = Rc::new(FunctionDef {
            name: None,
            params,
            body,
            is_arrow: true,
        });
        Ok(self.finish(start, NodeKind::FunctionExpression(def)))
    }

    fn conditional(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        let test = self.logical_or()?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(":")?;
        let alternate = self.assignment()?;
        Ok(self.finish(
            start,
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            },
        ))
    }

    fn logical_or(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        let mut left = self.logical_and()?;
        while self.eat_punct("||") {
            let right = self.logical_and()?;
            left = self.finish(
                start,
                NodeKind::LogicalExpression {
                    operator: LogicalOp::Or,
                    left,
                    right,
                },
            );
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        let mut left = self.binary(0)?;
        while self.eat_punct("&&") {
            let right = self.binary(0)?;
            left = self.finish(
                start,
                NodeKind::LogicalExpression {
                    operator: LogicalOp::And,
                    left,
                    right,
                },
            );
        }
        Ok(left)
    }

    /// Left-associative binary levels: equality, relational, additive,
    /// multiplicative. Exponentiation is handled in [`Self::exponent`].
    fn binary(&mut self, level: usize) -> Result<NodeRef, ParseError> {
        const LEVELS: &[&[(&str, BinaryOp)]] = &[
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNotEq),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::NotEq),
            ],
            &[
                ("<=", BinaryOp::LtEq),
                (">=", BinaryOp::GtEq),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Mod),
            ],
        ];

        let Some(ops) = LEVELS.get(level) else {
            return self.exponent();
        };

        let start = self.start();
        let mut left = self.binary(level + 1)?;
        loop {
            let operator = ops
                .iter()
                .find(|(p, _)| self.is_punct(p))
                .map(|(_, op)| *op);
            let Some(operator) = operator else {
                return Ok(left);
            };
            self.advance();
            let right = self.binary(level + 1)?;
            left = self.finish(
                start,
                NodeKind::BinaryExpression {
                    operator,
                    left,
                    right,
                },
            );
        }
    }

    fn exponent(&mut self) -> Result<NodeRef, ParseError> {
        self.nested(Self::exponent_body)
    }

    fn exponent_body(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        let base = self.unary()?;
        if !self.eat_punct("**") {
            return Ok(base);
        }
        let right = self.exponent()?;
        Ok(self.finish(
            start,
            NodeKind::BinaryExpression {
                operator: BinaryOp::Pow,
                left: base,
                right,
            },
        ))
    }

    fn unary(&mut self) -> Result<NodeRef, ParseError> {
        self.nested(Self::unary_body)
    }

    fn unary_body(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        let operator = match self.peek() {
            Token::Punct("-") => Some(UnaryOp::Minus),
            Token::Punct("+") => Some(UnaryOp::Plus),
            Token::Punct("!") => Some(UnaryOp::Not),
            Token::Keyword(Keyword::Typeof) => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(operator) = operator {
            self.advance();
            let argument = self.unary()?;
            return Ok(self.finish(start, NodeKind::UnaryExpression { operator, argument }));
        }

        let update = match self.peek() {
            Token::Punct("++") => Some(UpdateOp::Increment),
            Token::Punct("--") => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(operator) = update {
            self.advance();
            let argument = self.unary()?;
            self.check_update_target(&argument)?;
            return Ok(self.finish(
                start,
                NodeKind::UpdateExpression {
                    operator,
                    prefix: true,
                    argument,
                },
            ));
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        let argument = self.call_member()?;
        let operator = match self.peek() {
            Token::Punct("++") => UpdateOp::Increment,
            Token::Punct("--") => UpdateOp::Decrement,
            _ => return Ok(argument),
        };
        self.check_update_target(&argument)?;
        self.advance();
        Ok(self.finish(
            start,
            NodeKind::UpdateExpression {
                operator,
                prefix: false,
                argument,
            },
        ))
    }

    fn check_update_target(&self, target: &Node) -> Result<(), ParseError> {
        match target.kind {
            NodeKind::Identifier { .. } | NodeKind::MemberExpression { .. } => Ok(()),
            _ => Err(ParseError::new(
                self.src,
                target.start,
                "Invalid left-hand side expression in update operation",
            )),
        }
    }

    fn call_member(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct(".") {
                let name = self.expect_property_name()?;
                expr = self.finish(
                    start,
                    NodeKind::MemberExpression {
                        object: expr,
                        property: MemberProperty::Named(name),
                    },
                );
            } else if self.eat_punct("[") {
                let property = self.expression()?;
                self.expect_punct("]")?;
                expr = self.finish(
                    start,
                    NodeKind::MemberExpression {
                        object: expr,
                        property: MemberProperty::Computed(property),
                    },
                );
            } else if self.eat_punct("(") {
                let mut arguments = Vec::new();
                if !self.eat_punct(")") {
                    loop {
                        arguments.push(self.assignment()?);
                        if self.eat_punct(")") {
                            break;
                        }
                        self.expect_punct(",")?;
                    }
                }
                expr = self.finish(
                    start,
                    NodeKind::CallExpression {
                        callee: expr,
                        arguments,
                    },
                );
            } else {
                return Ok(expr);
            }
        }
    }

    /// Property names after `.` may be keywords (`obj.return` is legal)
    fn expect_property_name(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            Token::Keyword(kw) => {
                self.advance();
                Ok(format!("{kw:?}").to_lowercase())
            }
            _ => Err(self.unexpected("property name")),
        }
    }

    fn primary(&mut self) -> Result<NodeRef, ParseError> {
        let start = self.start();
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(self.finish(start, NodeKind::Literal(Literal::Number(n))))
            }
            Token::String(s) => {
                self.advance();
                Ok(self.finish(start, NodeKind::Literal(Literal::String(s))))
            }
            Token::Keyword(Keyword::True) => {
                self.advance();
                Ok(self.finish(start, NodeKind::Literal(Literal::Boolean(true))))
            }
            Token::Keyword(Keyword::False) => {
                self.advance();
                Ok(self.finish(start, NodeKind::Literal(Literal::Boolean(false))))
            }
            Token::Keyword(Keyword::Null) => {
                self.advance();
                Ok(self.finish(start, NodeKind::Literal(Literal::Null)))
            }
            Token::Keyword(Keyword::Function) => {
                self.advance();
                let def = self.function_rest(false)?;
                Ok(self.finish(start, NodeKind::FunctionExpression(def)))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(self.finish(start, NodeKind::Identifier { name }))
            }
            Token::Punct("(") => {
                self.advance();
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Token::Punct("[") => {
                self.advance();
                let mut elements = Vec::new();
                while !self.eat_punct("]") {
                    elements.push(self.assignment()?);
                    if !self.eat_punct(",") {
                        self.expect_punct("]")?;
                        break;
                    }
                }
                Ok(self.finish(start, NodeKind::ArrayExpression { elements }))
            }
            Token::Punct("{") => {
                self.advance();
                let mut properties = Vec::new();
                while !self.eat_punct("}") {
                    let key = match self.advance() {
                        Token::Ident(name) | Token::String(name) => name,
                        Token::Number(n) => super::value::format_number(n),
                        _ => {
                            self.pos = self.pos.saturating_sub(1);
                            return Err(self.unexpected("property key"));
                        }
                    };
                    self.expect_punct(":")?;
                    properties.push((key, self.assignment()?));
                    if !self.eat_punct(",") {
                        self.expect_punct("}")?;
                        break;
                    }
                }
                Ok(self.finish(start, NodeKind::ObjectExpression { properties }))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_expr(src: &str) -> NodeRef {
        let program = parse_program(src).unwrap();
        match &program.kind {
            NodeKind::Program { body } => match &body[0].kind {
                NodeKind::ExpressionStatement { expression } => expression.clone(),
                other => panic!("expected expression statement, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = first_expr("1 + 2 * 3;");
        match &expr.kind {
            NodeKind::BinaryExpression {
                operator: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                right.kind,
                NodeKind::BinaryExpression {
                    operator: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_exponent_is_right_associative() {
        let expr = first_expr("2 ** 3 ** 2;");
        match &expr.kind {
            NodeKind::BinaryExpression { left, right, .. } => {
                assert!(matches!(left.kind, NodeKind::Literal(Literal::Number(n)) if n == 2.0));
                assert_eq!(right.type_name(), "BinaryExpression");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_node_spans_cover_source() {
        let src = "let x = 1; view([[\"x\", \"X\"]]);";
        let program = parse_program(src).unwrap();
        let NodeKind::Program { body } = &program.kind else {
            unreachable!()
        };
        assert_eq!(body[0].source(src), "let x = 1;");
        assert_eq!(body[1].source(src), "view([[\"x\", \"X\"]]);");
        let NodeKind::ExpressionStatement { expression } = &body[1].kind else {
            unreachable!()
        };
        assert_eq!(expression.source(src), "view([[\"x\", \"X\"]])");
    }

    #[test]
    fn test_arrow_functions() {
        let expr = first_expr("(a, b) => a + b;");
        match &expr.kind {
            NodeKind::FunctionExpression(def) => {
                assert!(def.is_arrow);
                assert_eq!(def.params, vec!["a", "b"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        let expr = first_expr("x => { return x; };");
        assert_eq!(expr.type_name(), "ArrowFunctionExpression");
    }

    #[test]
    fn test_parenthesized_expression_is_not_arrow() {
        let expr = first_expr("(a + b) * c;");
        assert_eq!(expr.type_name(), "BinaryExpression");
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_program("1 = 2;").unwrap_err();
        assert!(err.to_string().contains("Invalid left-hand side"));
    }

    #[test]
    fn test_missing_paren_reports_location() {
        let err = parse_program("let a = 1;\nif (a { }").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.to_string().contains("expected ')'"));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let deep = format!("var x = {}1{};", "(".repeat(100_000), ")".repeat(100_000));
        let err = parse_program(&deep).unwrap_err();
        assert!(err.to_string().contains("Nesting too deep"));

        let negations = format!("var x = {}1;", "-".repeat(100_000));
        assert!(parse_program(&negations).is_err());

        let blocks = format!("{}{}", "{".repeat(100_000), "}".repeat(100_000));
        assert!(parse_program(&blocks).is_err());
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let src = format!("var x = {}1{};", "(".repeat(30), ")".repeat(30));
        assert!(parse_program(&src).is_ok());
        assert!(parse_program("var y = 2 ** 2 ** 2 ** 2;").is_ok());
    }

    #[test]
    fn test_declared_names_include_params_and_globals() {
        let program =
            parse_program("let a = 1; function f(p, q) { var r = p; } g = 2; a++;").unwrap();
        assert_eq!(
            crate::interp::ast::declared_names(&program),
            vec!["a", "f", "p", "q", "r", "g"]
        );
    }
}
