//! Parser for the evaluated subset.
//!
//! Produces a flat table of `FuncDef`s (the whole program is itself the last
//! entry) holding plain ASTs; the interpreter walks them directly. Function
//! indices in the AST are pre-offset by the context's existing function
//! table length so several evaluations can share one table.
//!
//! The grammar is the subset documented in the crate root: `var`,
//! `function`, `if`/`else`, `while`, `for(;;)`, `return`, `throw`, the usual
//! expression forms, array and object literals, `new` with an identifier
//! chain callee. Functions do not capture enclosing locals; their free names
//! resolve against the global object at run time.

pub mod json;
mod lexer;

use lexer::{Lexer, Tok, Token};

const MAX_PARSE_DEPTH: u32 = 256;

#[derive(Clone, Debug)]
pub struct ParseError {
    pub(crate) message: String,
    pub(crate) line: u32,
    pub(crate) column: u32,
}

impl ParseError {
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 0-based source line of the error.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 0-based source column of the error.
    pub fn column(&self) -> u32 {
        self.column
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnOp {
    Neg,
    Pos,
    Not,
    TypeOf,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    LtEq,
    Gt,
    GtEq,
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    ArrayLit(Vec<Expr>),
    ObjectLit(Vec<(String, Expr)>),
    Func(usize),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>, u32),
    New(Box<Expr>, Vec<Expr>, u32),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Logic(bool, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, Option<BinOp>, Box<Expr>, u32),
    PostIncDec(Box<Expr>, bool, u32),
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Expr(Expr, u32),
    VarDecl(Vec<(String, Option<Expr>)>, u32),
    FuncDecl(usize, u32),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>, u32),
    While(Expr, Box<Stmt>, u32),
    For(
        Option<Box<Stmt>>,
        Option<Expr>,
        Option<Expr>,
        Box<Stmt>,
        u32,
    ),
    Return(Option<Expr>, u32),
    Throw(Expr, u32),
    Block(Vec<Stmt>),
    Empty,
}

/// One parsed function. Locals are laid out `[params..., arguments, vars...]`
/// in the interpreter's frame; the program itself is a `FuncDef` whose
/// `var`s bind globals instead of frame slots.
#[derive(Clone, Debug)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    pub vars: Vec<String>,
    pub body: Vec<Stmt>,
    pub is_toplevel: bool,
}

impl FuncDef {
    pub fn local_slot(&self, name: &str) -> Option<usize> {
        if self.is_toplevel {
            return None;
        }
        if let Some(i) = self.params.iter().position(|p| p == name) {
            return Some(i);
        }
        if name == "arguments" {
            return Some(self.params.len());
        }
        self.vars
            .iter()
            .position(|v| v == name)
            .map(|i| self.params.len() + 1 + i)
    }

    pub fn n_locals(&self) -> usize {
        if self.is_toplevel {
            0
        } else {
            self.params.len() + 1 + self.vars.len()
        }
    }
}

#[derive(Debug)]
pub(crate) struct ParseOutput {
    pub funcs: Vec<FuncDef>,
    /// Index of the program entry, already offset by `base_index`.
    pub main: usize,
}

/// Parse a whole program. `base_index` is the length of the context's
/// function table before this parse; indices in the returned ASTs start
/// there.
pub(crate) fn parse_program(source: &str, base_index: usize) -> Result<ParseOutput, ParseError> {
    let mut parser = Parser::new(source.as_bytes(), base_index)?;
    let mut body = Vec::new();
    parser.var_collectors.push(Vec::new());
    while parser.cur.tok != Tok::Eof {
        let stmt = parser.parse_stmt()?;
        body.push(stmt);
    }
    parser.var_collectors.pop();
    let main_local = parser.funcs.len();
    parser.funcs.push(FuncDef {
        name: String::new(),
        params: Vec::new(),
        vars: Vec::new(),
        body,
        is_toplevel: true,
    });
    Ok(ParseOutput {
        funcs: parser.funcs,
        main: base_index + main_local,
    })
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    funcs: Vec<FuncDef>,
    base: usize,
    var_collectors: Vec<Vec<String>>,
    depth: u32,
}

impl<'a> Parser<'a> {
    fn new(source: &'a [u8], base: usize) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let cur = lexer.next_token()?;
        Ok(Self {
            lexer,
            cur,
            funcs: Vec::new(),
            base,
            var_collectors: Vec::new(),
            depth: 0,
        })
    }

    fn bump(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(core::mem::replace(&mut self.cur, next))
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.cur.line,
            column: self.cur.column,
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ParseError> {
        if self.cur.tok == tok {
            self.bump()?;
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn eat(&mut self, tok: Tok) -> Result<bool, ParseError> {
        if self.cur.tok == tok {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.cur.tok.clone() {
            Tok::Ident(name) => {
                self.bump()?;
                Ok(name)
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    fn optional_semi(&mut self) -> Result<(), ParseError> {
        self.eat(Tok::Semi)?;
        Ok(())
    }

    fn declare_var(&mut self, name: &str) {
        if let Some(vars) = self.var_collectors.last_mut() {
            if name != "arguments" && !vars.iter().any(|v| v == name) {
                vars.push(name.to_string());
            }
        }
    }

    fn in_function(&self) -> bool {
        self.var_collectors.len() > 1
    }

    // ---- statements ----

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur.line;
        match self.cur.tok {
            Tok::LBrace => {
                self.bump()?;
                let mut body = Vec::new();
                while self.cur.tok != Tok::RBrace {
                    if self.cur.tok == Tok::Eof {
                        return Err(self.error("expected '}'"));
                    }
                    body.push(self.parse_stmt()?);
                }
                self.bump()?;
                Ok(Stmt::Block(body))
            }
            Tok::Var => {
                let decl = self.parse_var_decl()?;
                self.optional_semi()?;
                Ok(decl)
            }
            Tok::Function => {
                self.bump()?;
                let name = self.expect_ident("function name")?;
                self.declare_var(&name);
                let idx = self.parse_function_rest(name)?;
                Ok(Stmt::FuncDecl(idx, line))
            }
            Tok::If => {
                self.bump()?;
                self.expect(Tok::LParen, "'('")?;
                let cond = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                let then = Box::new(self.parse_stmt()?);
                let otherwise = if self.eat(Tok::Else)? {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If(cond, then, otherwise, line))
            }
            Tok::While => {
                self.bump()?;
                self.expect(Tok::LParen, "'('")?;
                let cond = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::While(cond, body, line))
            }
            Tok::For => {
                self.bump()?;
                self.expect(Tok::LParen, "'('")?;
                let init = if self.cur.tok == Tok::Semi {
                    None
                } else if self.cur.tok == Tok::Var {
                    Some(Box::new(self.parse_var_decl()?))
                } else {
                    let expr = self.parse_expr()?;
                    Some(Box::new(Stmt::Expr(expr, line)))
                };
                self.expect(Tok::Semi, "';'")?;
                let cond = if self.cur.tok == Tok::Semi {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(Tok::Semi, "';'")?;
                let update = if self.cur.tok == Tok::RParen {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(Tok::RParen, "')'")?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::For(init, cond, update, body, line))
            }
            Tok::Return => {
                if !self.in_function() {
                    return Err(self.error("return not in a function"));
                }
                self.bump()?;
                let value = if matches!(self.cur.tok, Tok::Semi | Tok::RBrace | Tok::Eof) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.optional_semi()?;
                Ok(Stmt::Return(value, line))
            }
            Tok::Throw => {
                self.bump()?;
                let value = self.parse_expr()?;
                self.optional_semi()?;
                Ok(Stmt::Throw(value, line))
            }
            Tok::Semi => {
                self.bump()?;
                Ok(Stmt::Empty)
            }
            _ => {
                let expr = self.parse_expr()?;
                self.optional_semi()?;
                Ok(Stmt::Expr(expr, line))
            }
        }
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur.line;
        self.expect(Tok::Var, "'var'")?;
        let mut decls = Vec::new();
        loop {
            let name = self.expect_ident("variable name")?;
            self.declare_var(&name);
            let init = if self.eat(Tok::Assign)? {
                Some(self.parse_assign()?)
            } else {
                None
            };
            decls.push((name, init));
            if !self.eat(Tok::Comma)? {
                break;
            }
        }
        Ok(Stmt::VarDecl(decls, line))
    }

    /// Parse the parameter list and body of a function whose `function`
    /// keyword (and optional name) have been consumed. Returns the final
    /// function-table index.
    fn parse_function_rest(&mut self, name: String) -> Result<usize, ParseError> {
        self.expect(Tok::LParen, "'('")?;
        let mut params = Vec::new();
        if self.cur.tok != Tok::RParen {
            loop {
                params.push(self.expect_ident("parameter name")?);
                if !self.eat(Tok::Comma)? {
                    break;
                }
            }
        }
        self.expect(Tok::RParen, "')'")?;
        self.expect(Tok::LBrace, "'{'")?;
        self.var_collectors.push(Vec::new());
        let mut body = Vec::new();
        while self.cur.tok != Tok::RBrace {
            if self.cur.tok == Tok::Eof {
                self.var_collectors.pop();
                return Err(self.error("expected '}'"));
            }
            body.push(self.parse_stmt()?);
        }
        self.bump()?;
        let vars = self.var_collectors.pop().unwrap_or_default();
        let idx = self.base + self.funcs.len();
        self.funcs.push(FuncDef {
            name,
            params,
            vars,
            body,
            is_toplevel: false,
        });
        Ok(idx)
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            self.depth -= 1;
            return Err(self.error("expression nests too deeply"));
        }
        let out = self.parse_assign();
        self.depth -= 1;
        out
    }

    fn parse_assign(&mut self) -> Result<Expr, ParseError> {
        let line = self.cur.line;
        let left = self.parse_cond()?;
        let op = match self.cur.tok {
            Tok::Assign => None,
            Tok::PlusAssign => Some(BinOp::Add),
            Tok::MinusAssign => Some(BinOp::Sub),
            _ => return Ok(left),
        };
        if !is_lvalue(&left) {
            return Err(self.error("invalid assignment target"));
        }
        self.bump()?;
        let right = self.parse_assign()?;
        Ok(Expr::Assign(Box::new(left), op, Box::new(right), line))
    }

    fn parse_cond(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if self.eat(Tok::Question)? {
            let then = self.parse_assign()?;
            self.expect(Tok::Colon, "':'")?;
            let otherwise = self.parse_assign()?;
            Ok(Expr::Cond(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ))
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(Tok::OrOr)? {
            let right = self.parse_and()?;
            left = Expr::Logic(false, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(Tok::AndAnd)? {
            let right = self.parse_equality()?;
            left = Expr::Logic(true, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.cur.tok {
                Tok::EqEq => BinOp::EqEq,
                Tok::NotEq => BinOp::NotEq,
                Tok::EqEqEq => BinOp::StrictEq,
                Tok::NotEqEq => BinOp::StrictNotEq,
                _ => return Ok(left),
            };
            self.bump()?;
            let right = self.parse_relational()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.cur.tok {
                Tok::Lt => BinOp::Lt,
                Tok::LtEq => BinOp::LtEq,
                Tok::Gt => BinOp::Gt,
                Tok::GtEq => BinOp::GtEq,
                _ => return Ok(left),
            };
            self.bump()?;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.cur.tok {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            self.bump()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.cur.tok {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::Percent => BinOp::Mod,
                _ => return Ok(left),
            };
            self.bump()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            self.depth -= 1;
            return Err(self.error("expression nests too deeply"));
        }
        let out = self.parse_unary_inner();
        self.depth -= 1;
        out
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, ParseError> {
        let op = match self.cur.tok {
            Tok::Minus => Some(UnOp::Neg),
            Tok::Plus => Some(UnOp::Pos),
            Tok::Not => Some(UnOp::Not),
            Tok::Typeof => Some(UnOp::TypeOf),
            Tok::New => {
                let line = self.cur.line;
                self.bump()?;
                let callee = self.parse_member_chain()?;
                let args = if self.cur.tok == Tok::LParen {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                return Ok(Expr::New(Box::new(callee), args, line));
            }
            _ => None,
        };
        if let Some(op) = op {
            self.bump()?;
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        self.parse_postfix()
    }

    /// Member accesses without calls; used for `new` callees.
    fn parse_member_chain(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(Tok::Dot)? {
                let name = self.expect_ident("property name")?;
                expr = Expr::Member(Box::new(expr), name);
            } else if self.eat(Tok::LBracket)? {
                let index = self.parse_expr()?;
                self.expect(Tok::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(Tok::LParen, "'('")?;
        let mut args = Vec::new();
        if self.cur.tok != Tok::RParen {
            loop {
                args.push(self.parse_assign()?);
                if !self.eat(Tok::Comma)? {
                    break;
                }
            }
        }
        self.expect(Tok::RParen, "')'")?;
        Ok(args)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            let line = self.cur.line;
            if self.eat(Tok::Dot)? {
                let name = self.expect_ident("property name")?;
                expr = Expr::Member(Box::new(expr), name);
            } else if self.eat(Tok::LBracket)? {
                let index = self.parse_expr()?;
                self.expect(Tok::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.cur.tok == Tok::LParen {
                let args = self.parse_args()?;
                expr = Expr::Call(Box::new(expr), args, line);
            } else {
                break;
            }
        }
        let line = self.cur.line;
        if self.cur.tok == Tok::PlusPlus || self.cur.tok == Tok::MinusMinus {
            let inc = self.cur.tok == Tok::PlusPlus;
            if !is_lvalue(&expr) {
                return Err(self.error("invalid increment target"));
            }
            self.bump()?;
            expr = Expr::PostIncDec(Box::new(expr), inc, line);
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.cur.tok.clone() {
            Tok::Num(value) => {
                self.bump()?;
                Ok(Expr::Number(value))
            }
            Tok::Str(text) => {
                self.bump()?;
                Ok(Expr::Str(text))
            }
            Tok::True => {
                self.bump()?;
                Ok(Expr::Bool(true))
            }
            Tok::False => {
                self.bump()?;
                Ok(Expr::Bool(false))
            }
            Tok::Null => {
                self.bump()?;
                Ok(Expr::Null)
            }
            Tok::Undefined => {
                self.bump()?;
                Ok(Expr::Undefined)
            }
            Tok::Ident(name) => {
                self.bump()?;
                Ok(Expr::Ident(name))
            }
            Tok::LParen => {
                self.bump()?;
                let expr = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(expr)
            }
            Tok::LBracket => {
                self.bump()?;
                let mut items = Vec::new();
                if self.cur.tok != Tok::RBracket {
                    loop {
                        items.push(self.parse_assign()?);
                        if !self.eat(Tok::Comma)? {
                            break;
                        }
                        if self.cur.tok == Tok::RBracket {
                            break;
                        }
                    }
                }
                self.expect(Tok::RBracket, "']'")?;
                Ok(Expr::ArrayLit(items))
            }
            Tok::LBrace => {
                self.bump()?;
                let mut props = Vec::new();
                if self.cur.tok != Tok::RBrace {
                    loop {
                        let key = match self.cur.tok.clone() {
                            Tok::Ident(name) => {
                                self.bump()?;
                                name
                            }
                            Tok::Str(text) => {
                                self.bump()?;
                                text
                            }
                            Tok::Num(value) => {
                                self.bump()?;
                                crate::conversion::js_number_to_string(value)
                            }
                            _ => return Err(self.error("expected property name")),
                        };
                        self.expect(Tok::Colon, "':'")?;
                        let value = self.parse_assign()?;
                        props.push((key, value));
                        if !self.eat(Tok::Comma)? {
                            break;
                        }
                        if self.cur.tok == Tok::RBrace {
                            break;
                        }
                    }
                }
                self.expect(Tok::RBrace, "'}'")?;
                Ok(Expr::ObjectLit(props))
            }
            Tok::Function => {
                self.bump()?;
                let name = match self.cur.tok.clone() {
                    Tok::Ident(text) => {
                        self.bump()?;
                        text
                    }
                    _ => String::new(),
                };
                let idx = self.parse_function_rest(name)?;
                Ok(Expr::Func(idx))
            }
            _ => Err(self.error("unexpected token")),
        }
    }
}

fn is_lvalue(expr: &Expr) -> bool {
    matches!(expr, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParseOutput {
        parse_program(src, 0).expect("parse")
    }

    #[test]
    fn parses_expression_statement() {
        let out = parse("2 + 3;");
        let main = &out.funcs[out.main];
        assert!(main.is_toplevel);
        assert_eq!(main.body.len(), 1);
        match &main.body[0] {
            Stmt::Expr(Expr::Binary(BinOp::Add, ..), _) => {}
            other => panic!("unexpected stmt {other:?}"),
        }
    }

    #[test]
    fn collects_function_locals() {
        let out = parse("function f(a, b) { var x = 1; var y; return a; }");
        assert_eq!(out.funcs.len(), 2);
        let f = &out.funcs[0];
        assert_eq!(f.name, "f");
        assert_eq!(f.params, vec!["a", "b"]);
        assert_eq!(f.vars, vec!["x", "y"]);
        assert_eq!(f.local_slot("a"), Some(0));
        assert_eq!(f.local_slot("arguments"), Some(2));
        assert_eq!(f.local_slot("y"), Some(4));
        assert_eq!(f.local_slot("zz"), None);
        assert_eq!(f.n_locals(), 5);
    }

    #[test]
    fn toplevel_vars_do_not_bind_slots() {
        let out = parse("var x = 1;");
        let main = &out.funcs[out.main];
        assert_eq!(main.local_slot("x"), None);
        assert_eq!(main.n_locals(), 0);
    }

    #[test]
    fn function_indices_respect_base() {
        let out = parse_program("var f = function() { return 1; };", 7).expect("parse");
        assert_eq!(out.main, 8);
        match &out.funcs[0].body[..] {
            [Stmt::Return(Some(Expr::Number(n)), _)] => assert_eq!(*n, 1.0),
            other => panic!("unexpected body {other:?}"),
        }
        let main = &out.funcs[1];
        match &main.body[0] {
            Stmt::VarDecl(decls, _) => match &decls[0].1 {
                Some(Expr::Func(idx)) => assert_eq!(*idx, 7),
                other => panic!("unexpected init {other:?}"),
            },
            other => panic!("unexpected stmt {other:?}"),
        }
    }

    #[test]
    fn parses_new_and_member_chains() {
        let out = parse("throw new Error(\"boom\");");
        let main = &out.funcs[out.main];
        match &main.body[0] {
            Stmt::Throw(Expr::New(callee, args, _), _) => {
                assert!(matches!(&**callee, Expr::Ident(name) if name == "Error"));
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected stmt {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_assignment_targets() {
        assert!(parse_program("1 = 2;", 0).is_err());
        assert!(parse_program("f() = 2;", 0).is_err());
    }

    #[test]
    fn rejects_toplevel_return() {
        assert!(parse_program("return 1;", 0).is_err());
    }

    #[test]
    fn reports_error_position() {
        let err = parse_program("var x = @;", 0).expect_err("error");
        assert_eq!(err.line(), 0);
        assert!(err.column() > 0);
    }

    #[test]
    fn parses_control_flow() {
        let out = parse(
            "var i = 0;\n\
             while (i < 10) { i = i + 1; }\n\
             for (var j = 0; j < 3; j++) { ; }\n\
             if (i === 10) { i = 0; } else { i = 1; }",
        );
        let main = &out.funcs[out.main];
        assert_eq!(main.body.len(), 4);
        assert!(matches!(main.body[1], Stmt::While(..)));
        assert!(matches!(main.body[2], Stmt::For(..)));
        assert!(matches!(main.body[3], Stmt::If(..)));
    }
}
