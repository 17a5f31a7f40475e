//! Recursive-descent parser

use crate::ast::{
    AssignOp, BinOp, DeclType, Expr, FieldDecl, FnDecl, LoopHeader, MacroDecl, Param, Program,
    Span, Spanned, Stmt, StructDecl, SwitchCase, UnOp,
};
use crate::error::{CompileError, Result};
use crate::lexer::Token;


/// Parse tokens into a program AST
pub fn parse(tokens: Vec<(Token, Span)>) -> Result<Program> {
    let mut parser = Parser::new(&tokens);
    parser.parse_program()
}

struct Parser<'a> {
    tokens: &'a [(Token, Span)],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [(Token, Span)]) -> Self {
        Parser { tokens, pos: 0 }
    }

    // ---- token stream helpers ----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => *span,
            None => self
                .tokens
                .last()
                .map(|(_, s)| Span::new(s.end, s.end + 1))
                .unwrap_or(Span::new(0, 1)),
        }
    }

    fn prev_span(&self) -> Span {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|(_, s)| *s)
            .unwrap_or(Span::new(0, 1))
    }

    fn advance(&mut self) -> Option<&(Token, Span)> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, context: &str) -> Result<Span> {
        if self.check(&token) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.unexpected(&format!("expected {token} {context}")))
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<Spanned<String>> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                let span = self.current_span();
                self.pos += 1;
                Ok(Spanned::new(name, span))
            }
            _ => Err(self.unexpected(&format!("expected identifier {context}"))),
        }
    }

    fn unexpected(&self, message: &str) -> CompileError {
        let found = match self.peek() {
            Some(tok) => format!("{message}, found {tok}"),
            None => format!("{message}, found end of input"),
        };
        CompileError::parser(found, self.current_span())
    }

    // ---- statements ----

    fn parse_program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();
        while self.peek().is_some() {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Spanned<Stmt>> {
        match self.peek() {
            Some(Token::Let) | Some(Token::Const) => self.parse_var_decl(),
            Some(Token::Fn) => {
                let decl = self.parse_fn_decl()?;
                let span = decl.span;
                Ok(Spanned::new(Stmt::FnDecl(decl), span))
            }
            Some(Token::Struct) => self.parse_struct_decl(),
            Some(Token::Macro) => self.parse_macro_decl(),
            Some(Token::LBrace) => self.parse_block(),
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => self.parse_while(),
            Some(Token::For) => self.parse_for(),
            Some(Token::Loop) => self.parse_loop(),
            Some(Token::Switch) => self.parse_switch(),
            Some(Token::Break) => {
                let span = self.current_span();
                self.advance();
                let end = self.expect(Token::Semicolon, "after break")?;
                Ok(Spanned::new(Stmt::Break, span.merge(end)))
            }
            Some(Token::Continue) => {
                let span = self.current_span();
                self.advance();
                let end = self.expect(Token::Semicolon, "after continue")?;
                Ok(Spanned::new(Stmt::Continue, span.merge(end)))
            }
            Some(Token::Return) => {
                let span = self.current_span();
                self.advance();
                let value = if self.check(&Token::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let end = self.expect(Token::Semicolon, "after return")?;
                Ok(Spanned::new(Stmt::Return(value), span.merge(end)))
            }
            Some(Token::Print) => {
                let span = self.current_span();
                self.advance();
                let expr = self.parse_expr()?;
                let end = self.expect(Token::Semicolon, "after print")?;
                Ok(Spanned::new(Stmt::Print(expr), span.merge(end)))
            }
            Some(Token::Import) => {
                let span = self.current_span();
                self.advance();
                let path = match self.peek().cloned() {
                    Some(Token::StrLit(path)) => {
                        let s = self.current_span();
                        self.advance();
                        Spanned::new(path, s)
                    }
                    _ => return Err(self.unexpected("expected string path after import")),
                };
                let end = self.expect(Token::Semicolon, "after import")?;
                Ok(Spanned::new(Stmt::Import(path), span.merge(end)))
            }
            Some(_) => {
                let expr = self.parse_expr()?;
                let span = expr.span;
                let end = self.expect(Token::Semicolon, "after expression")?;
                Ok(Spanned::new(Stmt::Expr(expr), span.merge(end)))
            }
            None => Err(self.unexpected("expected statement")),
        }
    }

    fn parse_var_decl(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.current_span();
        let is_const = matches!(self.peek(), Some(Token::Const));
        self.advance();
        let name = self.expect_ident("after let/const")?;
        let ty = if self.eat(&Token::Colon) {
            self.parse_type()?
        } else {
            DeclType::Unknown
        };
        let init = if self.eat(&Token::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = self.expect(Token::Semicolon, "after declaration")?;
        Ok(Spanned::new(
            Stmt::VarDecl {
                name,
                ty,
                init,
                is_const,
            },
            start.merge(end),
        ))
    }

    fn parse_type(&mut self) -> Result<DeclType> {
        let ty = match self.peek() {
            Some(Token::TyInt) => DeclType::Int,
            Some(Token::TyFloat) => DeclType::Float,
            Some(Token::TyBool) => DeclType::Bool,
            Some(Token::TyChar) => DeclType::Char,
            Some(Token::TyString) => DeclType::Str,
            Some(Token::TyArray) => DeclType::Array,
            Some(Token::TyPointer) => DeclType::Pointer,
            Some(Token::TyVoid) => DeclType::Void,
            _ => return Err(self.unexpected("expected type name")),
        };
        self.advance();
        Ok(ty)
    }

    fn parse_fn_decl(&mut self) -> Result<FnDecl> {
        let start = self.current_span();
        self.expect(Token::Fn, "at function declaration")?;
        let name = self.expect_ident("after fn")?;
        self.expect(Token::LParen, "after function name")?;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            if !params.is_empty() {
                self.expect(Token::Comma, "between parameters")?;
            }
            let pname = self.expect_ident("as parameter name")?;
            let ty = if self.eat(&Token::Colon) {
                self.parse_type()?
            } else {
                DeclType::Unknown
            };
            params.push(Param { name: pname, ty });
        }
        self.expect(Token::RParen, "after parameters")?;
        let ret_ty = if self.eat(&Token::Colon) {
            self.parse_type()?
        } else {
            DeclType::Void
        };
        let body = self.parse_brace_body()?;
        let span = start.merge(self.prev_span());
        Ok(FnDecl {
            name,
            params,
            ret_ty,
            body,
            span,
        })
    }

    fn parse_struct_decl(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.current_span();
        self.expect(Token::Struct, "at struct declaration")?;
        let name = self.expect_ident("after struct")?;
        let parent = if self.eat(&Token::Colon) {
            Some(self.expect_ident("as parent struct name")?)
        } else {
            None
        };
        self.expect(Token::LBrace, "after struct name")?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.check(&Token::Fn) {
                methods.push(self.parse_fn_decl()?);
            } else {
                let fname = self.expect_ident("as field name")?;
                self.expect(Token::Colon, "after field name")?;
                let ty = self.parse_type()?;
                fields.push(FieldDecl { name: fname, ty });
                if !self.check(&Token::RBrace) && !self.check(&Token::Fn) {
                    self.expect(Token::Comma, "between struct fields")?;
                }
            }
        }
        let end = self.expect(Token::RBrace, "after struct body")?;
        let span = start.merge(end);
        Ok(Spanned::new(
            Stmt::StructDecl(StructDecl {
                name,
                parent,
                fields,
                methods,
                span,
            }),
            span,
        ))
    }

    fn parse_macro_decl(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.current_span();
        self.expect(Token::Macro, "at macro declaration")?;
        let name = self.expect_ident("after macro")?;
        self.expect(Token::LParen, "after macro name")?;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            if !params.is_empty() {
                self.expect(Token::Comma, "between macro parameters")?;
            }
            params.push(self.expect_ident("as macro parameter")?);
        }
        self.expect(Token::RParen, "after macro parameters")?;
        let body = self.parse_brace_body()?;
        let span = start.merge(self.prev_span());
        Ok(Spanned::new(
            Stmt::MacroDecl(MacroDecl {
                name,
                params,
                body,
                span,
            }),
            span,
        ))
    }

    /// Parse `{ statements }` and return the inner statements
    fn parse_brace_body(&mut self) -> Result<Vec<Spanned<Stmt>>> {
        self.expect(Token::LBrace, "to open block")?;
        let mut statements = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(self.unexpected("expected } to close block"));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(Token::RBrace, "to close block")?;
        Ok(statements)
    }

    fn parse_block(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.current_span();
        let statements = self.parse_brace_body()?;
        Ok(Spanned::new(
            Stmt::Block(statements),
            start.merge(self.prev_span()),
        ))
    }

    fn parse_if(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.current_span();
        self.expect(Token::If, "at if statement")?;
        self.expect(Token::LParen, "after if")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, "after if condition")?;
        let then_branch = Box::new(self.parse_block()?);
        let else_branch = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                Some(Box::new(self.parse_block()?))
            }
        } else {
            None
        };
        Ok(Spanned::new(
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            },
            start.merge(self.prev_span()),
        ))
    }

    fn parse_while(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.current_span();
        self.expect(Token::While, "at while statement")?;
        self.expect(Token::LParen, "after while")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, "after while condition")?;
        let body = Box::new(self.parse_block()?);
        Ok(Spanned::new(
            Stmt::While { cond, body },
            start.merge(self.prev_span()),
        ))
    }

    fn parse_for(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.current_span();
        self.expect(Token::For, "at for statement")?;
        self.expect(Token::LParen, "after for")?;

        let init = if self.eat(&Token::Semicolon) {
            None
        } else if matches!(self.peek(), Some(Token::Let) | Some(Token::Const)) {
            Some(Box::new(self.parse_var_decl()?))
        } else {
            let expr = self.parse_expr()?;
            let span = expr.span;
            self.expect(Token::Semicolon, "after for initializer")?;
            Some(Box::new(Spanned::new(Stmt::Expr(expr), span)))
        };

        let cond = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::Semicolon, "after for condition")?;

        let update = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::RParen, "after for clauses")?;

        let body = Box::new(self.parse_block()?);
        Ok(Spanned::new(
            Stmt::For {
                init,
                cond,
                update,
                body,
            },
            start.merge(self.prev_span()),
        ))
    }

    fn parse_loop(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.current_span();
        self.expect(Token::Loop, "at loop statement")?;
        let header = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Ident(_)), Some(Token::From)) => {
                let var = self.expect_ident("as loop variable")?;
                self.expect(Token::From, "after loop variable")?;
                let start_expr = self.parse_expr()?;
                self.expect(Token::To, "after range start")?;
                let end_expr = self.parse_expr()?;
                LoopHeader::Range {
                    var,
                    start: start_expr,
                    end: end_expr,
                }
            }
            (Some(Token::Ident(_)), Some(Token::In)) => {
                let var = self.expect_ident("as loop variable")?;
                self.expect(Token::In, "after loop variable")?;
                let iterable = self.parse_expr()?;
                LoopHeader::In { var, iterable }
            }
            _ => LoopHeader::Infinite,
        };
        let body = Box::new(self.parse_block()?);
        Ok(Spanned::new(
            Stmt::Loop { header, body },
            start.merge(self.prev_span()),
        ))
    }

    fn parse_switch(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.current_span();
        self.expect(Token::Switch, "at switch statement")?;
        self.expect(Token::LParen, "after switch")?;
        let scrutinee = self.parse_expr()?;
        self.expect(Token::RParen, "after switch expression")?;
        self.expect(Token::LBrace, "to open switch body")?;

        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(&Token::RBrace) {
            if self.check(&Token::Case) {
                let case_start = self.current_span();
                self.advance();
                let value = self.parse_expr()?;
                self.expect(Token::Colon, "after case value")?;
                let body = self.parse_case_body()?;
                cases.push(SwitchCase {
                    value,
                    body,
                    span: case_start.merge(self.prev_span()),
                });
            } else if self.check(&Token::Default) {
                if default.is_some() {
                    return Err(self.unexpected("duplicate default case"));
                }
                self.advance();
                self.expect(Token::Colon, "after default")?;
                default = Some(self.parse_case_body()?);
            } else {
                return Err(self.unexpected("expected case or default in switch"));
            }
        }
        let end = self.expect(Token::RBrace, "to close switch body")?;
        Ok(Spanned::new(
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            },
            start.merge(end),
        ))
    }

    /// Statements of a case arm, up to the next case/default label or `}`
    fn parse_case_body(&mut self) -> Result<Vec<Spanned<Stmt>>> {
        let mut body = Vec::new();
        while !matches!(
            self.peek(),
            Some(Token::Case) | Some(Token::Default) | Some(Token::RBrace) | None
        ) {
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Spanned<Expr>> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Spanned<Expr>> {
        let target = self.parse_ternary()?;
        let op = match self.peek() {
            Some(Token::Eq) => AssignOp::Assign,
            Some(Token::PlusEq) => AssignOp::Add,
            Some(Token::MinusEq) => AssignOp::Sub,
            Some(Token::StarEq) => AssignOp::Mul,
            Some(Token::SlashEq) => AssignOp::Div,
            Some(Token::PercentEq) => AssignOp::Mod,
            _ => return Ok(target),
        };
        if !matches!(
            target.node,
            Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }
        ) {
            return Err(CompileError::parser(
                "invalid assignment target",
                target.span,
            ));
        }
        self.advance();
        let value = self.parse_assignment()?;
        let span = target.span.merge(value.span);
        Ok(Spanned::new(
            Expr::Assign {
                target: Box::new(target),
                op,
                value: Box::new(value),
            },
            span,
        ))
    }

    fn parse_ternary(&mut self) -> Result<Spanned<Expr>> {
        let cond = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then_expr = self.parse_expr()?;
        self.expect(Token::Colon, "in conditional expression")?;
        let else_expr = self.parse_ternary()?;
        let span = cond.span.merge(else_expr.span);
        Ok(Spanned::new(
            Expr::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            span,
        ))
    }

    fn parse_or(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary {
                    left: Box::new(left),
                    op: BinOp::Or,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary {
                    left: Box::new(left),
                    op: BinOp::And,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Le) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Ge) => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Spanned<Expr>> {
        let start = self.current_span();
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnOp::Neg),
            Some(Token::Not) => Some(UnOp::Not),
            Some(Token::Star) => Some(UnOp::Deref),
            Some(Token::Amp) => Some(UnOp::AddrOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            return Ok(Spanned::new(
                Expr::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        if matches!(self.peek(), Some(Token::PlusPlus) | Some(Token::MinusMinus)) {
            let dec = matches!(self.peek(), Some(Token::MinusMinus));
            self.advance();
            let operand = self.parse_unary()?;
            if !matches!(operand.node, Expr::Ident(_)) {
                return Err(CompileError::parser(
                    "increment/decrement target must be a variable",
                    operand.span,
                ));
            }
            let span = start.merge(operand.span);
            return Ok(Spanned::new(
                Expr::IncDec {
                    target: Box::new(operand),
                    dec,
                    postfix: false,
                },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Spanned<Expr>> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    let args = self.parse_call_args()?;
                    let span = expr.span.merge(self.prev_span());
                    expr = Spanned::new(
                        Expr::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                Some(Token::Dot) => {
                    self.advance();
                    let name = self.expect_ident("after .")?;
                    if self.check(&Token::LParen) {
                        let args = self.parse_call_args()?;
                        let span = expr.span.merge(self.prev_span());
                        expr = Spanned::new(
                            Expr::MethodCall {
                                object: Box::new(expr),
                                method: name,
                                args,
                            },
                            span,
                        );
                    } else {
                        let span = expr.span.merge(name.span);
                        expr = Spanned::new(
                            Expr::Member {
                                object: Box::new(expr),
                                field: name,
                            },
                            span,
                        );
                    }
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.parse_expr()?;
                    let end = self.expect(Token::RBracket, "after index")?;
                    let span = expr.span.merge(end);
                    expr = Spanned::new(
                        Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                Some(Token::PlusPlus) | Some(Token::MinusMinus) => {
                    let dec = matches!(self.peek(), Some(Token::MinusMinus));
                    if !matches!(expr.node, Expr::Ident(_)) {
                        return Err(CompileError::parser(
                            "increment/decrement target must be a variable",
                            expr.span,
                        ));
                    }
                    let end = self.current_span();
                    self.advance();
                    let span = expr.span.merge(end);
                    expr = Spanned::new(
                        Expr::IncDec {
                            target: Box::new(expr),
                            dec,
                            postfix: true,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Spanned<Expr>>> {
        self.expect(Token::LParen, "to open argument list")?;
        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            if !args.is_empty() {
                self.expect(Token::Comma, "between arguments")?;
            }
            args.push(self.parse_expr()?);
        }
        self.expect(Token::RParen, "after arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Spanned<Expr>> {
        let span = self.current_span();
        let token = match self.peek().cloned() {
            Some(tok) => tok,
            None => return Err(self.unexpected("expected expression")),
        };
        match token {
            Token::IntLit(n) => {
                self.advance();
                Ok(Spanned::new(Expr::IntLit(n), span))
            }
            Token::FloatLit(f) => {
                self.advance();
                Ok(Spanned::new(Expr::FloatLit(f), span))
            }
            Token::StrLit(s) => {
                self.advance();
                Ok(Spanned::new(Expr::StrLit(s), span))
            }
            Token::CharLit(c) => {
                self.advance();
                Ok(Spanned::new(Expr::CharLit(c), span))
            }
            Token::True => {
                self.advance();
                Ok(Spanned::new(Expr::BoolLit(true), span))
            }
            Token::False => {
                self.advance();
                Ok(Spanned::new(Expr::BoolLit(false), span))
            }
            Token::Null => {
                self.advance();
                Ok(Spanned::new(Expr::NullLit, span))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Spanned::new(Expr::Ident(name), span))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, "after parenthesized expression")?;
                Ok(inner)
            }
            Token::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&Token::RBracket) {
                    if !elements.is_empty() {
                        self.expect(Token::Comma, "between array elements")?;
                    }
                    elements.push(self.parse_expr()?);
                }
                let end = self.expect(Token::RBracket, "after array literal")?;
                Ok(Spanned::new(Expr::ArrayLit(elements), span.merge(end)))
            }
            Token::New => {
                self.advance();
                let type_name = self.expect_ident("after new")?;
                self.expect(Token::LParen, "after struct name")?;
                let mut inits = Vec::new();
                while !self.check(&Token::RParen) {
                    if !inits.is_empty() {
                        self.expect(Token::Comma, "between field initializers")?;
                    }
                    let field = self.expect_ident("as field name")?;
                    self.expect(Token::Colon, "after field name")?;
                    let value = self.parse_expr()?;
                    inits.push((field, value));
                }
                let end = self.expect(Token::RParen, "after field initializers")?;
                Ok(Spanned::new(
                    Expr::New { type_name, inits },
                    span.merge(end),
                ))
            }
            Token::Typeof => self.parse_builtin_query(span, |e| Expr::Typeof(e)),
            Token::Sizeof => self.parse_builtin_query(span, |e| Expr::Sizeof(e)),
            Token::Alignof => self.parse_builtin_query(span, |e| Expr::Alignof(e)),
            _ => Err(self.unexpected("expected expression")),
        }
    }

    fn parse_builtin_query(
        &mut self,
        start: Span,
        build: fn(Box<Spanned<Expr>>) -> Expr,
    ) -> Result<Spanned<Expr>> {
        self.advance();
        self.expect(Token::LParen, "after type query")?;
        let operand = self.parse_expr()?;
        let end = self.expect(Token::RParen, "after type query operand")?;
        Ok(Spanned::new(build(Box::new(operand)), start.merge(end)))
    }
}
