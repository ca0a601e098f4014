//! Reading command arguments off a token slice.
//!
//! Handlers receive an [`Args`] positioned after the command word. Every
//! read consumes tokens; whatever position the reader ends at is where the
//! loop continues when the handler returns no flags.

use ku_script::Token;

use crate::config::EngineSettings;
use crate::error::{ScriptError, ScriptResult};
use crate::variables::VariableStore;

/// What expressions may read: registers and aliases.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'e> {
    /// Registers.
    pub vars: &'e VariableStore,
    /// Alias tables.
    pub settings: &'e EngineSettings,
}

impl Scope<'_> {
    fn num_alias(&self, name: &str) -> ScriptResult<i32> {
        self.settings
            .num_aliases
            .get(name)
            .copied()
            .ok_or_else(|| ScriptError::UnknownAlias(name.to_string()))
    }

    fn alias_index(&self, name: &str) -> ScriptResult<u32> {
        let value = self.num_alias(name)?;
        u32::try_from(value).map_err(|_| ScriptError::VariableRange(value.unsigned_abs()))
    }

    fn str_alias(&self, name: &str) -> Option<&str> {
        self.settings.str_aliases.get(name).map(String::as_str)
    }
}

/// A variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRef {
    /// `%n`.
    Num(u32),
    /// `$n`.
    Str(u32),
}

/// Cursor over one command's arguments.
#[derive(Debug)]
pub struct Args<'a> {
    tokens: &'a [Token],
    pos: usize,
    command: &'a str,
}

impl<'a> Args<'a> {
    /// Arguments of `command`, starting at token `pos`.
    pub fn new(tokens: &'a [Token], pos: usize, command: &'a str) -> Self {
        Self {
            tokens,
            pos,
            command,
        }
    }

    /// The command being read.
    pub fn command(&self) -> &str {
        self.command
    }

    /// Index of the next unread token.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether this command's arguments are exhausted.
    pub fn at_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Colon))
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expected(&self, what: &'static str) -> ScriptError {
        ScriptError::Expected {
            expected: what,
            found: self
                .peek()
                .map_or_else(|| "end of line".to_string(), ToString::to_string),
        }
    }

    /// A `Malformed` error for this command.
    pub fn malformed(&self, detail: impl Into<String>) -> ScriptError {
        ScriptError::Malformed {
            command: self.command.to_string(),
            detail: detail.into(),
        }
    }

    /// Require a `,`.
    pub fn comma(&mut self) -> ScriptResult<()> {
        if self.eat(&Token::Comma) {
            Ok(())
        } else {
            Err(self.expected("','"))
        }
    }

    /// Consume `token` if it is next.
    pub fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a keyword if it is next.
    pub fn eat_word(&mut self, word: &str) -> bool {
        match self.peek() {
            Some(Token::Word(w)) if w == word => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    /// A bare word.
    pub fn word(&mut self) -> ScriptResult<String> {
        match self.peek() {
            Some(Token::Word(w)) => {
                self.pos += 1;
                Ok(w.clone())
            }
            _ => Err(self.expected("a word")),
        }
    }

    /// A `*label`.
    pub fn label(&mut self) -> ScriptResult<String> {
        match self.peek() {
            Some(Token::Label(l)) => {
                self.pos += 1;
                Ok(l.clone())
            }
            _ => Err(self.expected("a label")),
        }
    }

    /// A `*label` if one is next.
    pub fn opt_label(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token::Label(_)) => self.label().ok(),
            _ => None,
        }
    }

    /// `on`/`off`, or a number (non-zero is on).
    pub fn switch(&mut self, scope: &Scope<'_>) -> ScriptResult<bool> {
        if self.eat_word("on") {
            return Ok(true);
        }
        if self.eat_word("off") {
            return Ok(false);
        }
        Ok(self.int(scope)? != 0)
    }

    /// A numeric variable reference, `%n` or `%alias`.
    pub fn num_var(&mut self, scope: &Scope<'_>) -> ScriptResult<u32> {
        match self.peek() {
            Some(Token::NumVar(n)) => {
                self.pos += 1;
                Ok(*n)
            }
            Some(Token::NumAlias(a)) => {
                self.pos += 1;
                scope.alias_index(a)
            }
            _ => Err(self.expected("a numeric variable")),
        }
    }

    /// A string variable reference, `$n` or `$alias`.
    pub fn str_var(&mut self, scope: &Scope<'_>) -> ScriptResult<u32> {
        match self.peek() {
            Some(Token::StrVar(n)) => {
                self.pos += 1;
                Ok(*n)
            }
            Some(Token::StrAlias(a)) => {
                self.pos += 1;
                scope.alias_index(a)
            }
            _ => Err(self.expected("a string variable")),
        }
    }

    /// Either kind of variable reference.
    pub fn var(&mut self, scope: &Scope<'_>) -> ScriptResult<VarRef> {
        match self.peek() {
            Some(Token::NumVar(_) | Token::NumAlias(_)) => self.num_var(scope).map(VarRef::Num),
            Some(Token::StrVar(_) | Token::StrAlias(_)) => self.str_var(scope).map(VarRef::Str),
            _ => Err(self.expected("a variable")),
        }
    }

    /// A numeric expression.
    pub fn int(&mut self, scope: &Scope<'_>) -> ScriptResult<i32> {
        let mut value = self.term(scope)?;
        loop {
            if self.eat(&Token::Plus) {
                value = value.wrapping_add(self.term(scope)?);
            } else if self.eat(&Token::Minus) {
                value = value.wrapping_sub(self.term(scope)?);
            } else {
                return Ok(value);
            }
        }
    }

    /// A numeric expression that must not be negative.
    pub fn uint(&mut self, scope: &Scope<'_>) -> ScriptResult<u32> {
        let value = self.int(scope)?;
        u32::try_from(value).map_err(|_| self.malformed(format!("{value} must not be negative")))
    }

    fn term(&mut self, scope: &Scope<'_>) -> ScriptResult<i32> {
        let mut value = self.factor(scope)?;
        loop {
            if self.eat(&Token::Star) {
                value = value.wrapping_mul(self.factor(scope)?);
            } else if self.eat(&Token::Slash) {
                let rhs = nonzero(self.factor(scope)?)?;
                value = value.wrapping_div(rhs);
            } else if self.eat_word("mod") {
                let rhs = nonzero(self.factor(scope)?)?;
                value = value.wrapping_rem(rhs);
            } else {
                return Ok(value);
            }
        }
    }

    fn factor(&mut self, scope: &Scope<'_>) -> ScriptResult<i32> {
        match self.peek() {
            Some(Token::Int(n)) => {
                self.pos += 1;
                Ok(*n)
            }
            Some(Token::NumVar(_) | Token::NumAlias(_)) => {
                let index = self.num_var(scope)?;
                scope.vars.num(index)
            }
            Some(Token::Word(w)) if w != "mod" => {
                self.pos += 1;
                scope.num_alias(w)
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(self.factor(scope)?.wrapping_neg())
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let value = self.int(scope)?;
                if self.eat(&Token::RParen) {
                    Ok(value)
                } else {
                    Err(self.expected("')'"))
                }
            }
            _ => Err(self.expected("a number")),
        }
    }

    /// Whether the next operand is a string.
    pub fn at_string(&self, scope: &Scope<'_>) -> bool {
        match self.peek() {
            Some(Token::Str(_) | Token::StrVar(_) | Token::StrAlias(_)) => true,
            Some(Token::Word(w)) => scope.str_alias(w).is_some(),
            _ => false,
        }
    }

    /// A string expression: operands joined by `+`.
    pub fn string(&mut self, scope: &Scope<'_>) -> ScriptResult<String> {
        let mut value = self.string_atom(scope)?;
        while self.peek() == Some(&Token::Plus) {
            self.pos += 1;
            value.push_str(&self.string_atom(scope)?);
        }
        Ok(value)
    }

    fn string_atom(&mut self, scope: &Scope<'_>) -> ScriptResult<String> {
        match self.peek() {
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(s.clone())
            }
            Some(Token::StrVar(_) | Token::StrAlias(_)) => {
                let index = self.str_var(scope)?;
                scope.vars.str(index).map(str::to_string)
            }
            Some(Token::Word(w)) => match scope.str_alias(w) {
                Some(s) => {
                    self.pos += 1;
                    Ok(s.to_string())
                }
                None => Err(self.expected("a string")),
            },
            _ => Err(self.expected("a string")),
        }
    }

    /// An image argument: a file name string, a `#rrggbb` colour, or the
    /// words `black` and `white`.
    pub fn image(&mut self, scope: &Scope<'_>) -> ScriptResult<String> {
        match self.peek() {
            Some(Token::Color(rgb)) => {
                self.pos += 1;
                Ok(format!("#{rgb:06x}"))
            }
            Some(Token::Word(w)) if w == "black" => {
                self.pos += 1;
                Ok("#000000".into())
            }
            Some(Token::Word(w)) if w == "white" => {
                self.pos += 1;
                Ok("#ffffff".into())
            }
            _ => self.string(scope),
        }
    }

    /// `, effect` if present, else effect 0.
    pub fn effect(&mut self, scope: &Scope<'_>) -> ScriptResult<i32> {
        if self.eat(&Token::Comma) {
            self.int(scope)
        } else {
            Ok(0)
        }
    }

    /// A condition: comparisons joined by `&&`.
    pub fn condition(&mut self, scope: &Scope<'_>) -> ScriptResult<bool> {
        let mut result = self.comparison(scope)?;
        while self.eat(&Token::And) {
            let next = self.comparison(scope)?;
            result = result && next;
        }
        Ok(result)
    }

    fn comparison(&mut self, scope: &Scope<'_>) -> ScriptResult<bool> {
        if self.at_string(scope) {
            let lhs = self.string(scope)?;
            let Some(op) = self.comparison_op() else {
                return Ok(!lhs.is_empty());
            };
            let rhs = self.string(scope)?;
            return Ok(compare(op, lhs.cmp(&rhs)));
        }
        let lhs = self.int(scope)?;
        let Some(op) = self.comparison_op() else {
            return Ok(lhs != 0);
        };
        let rhs = self.int(scope)?;
        Ok(compare(op, lhs.cmp(&rhs)))
    }

    fn comparison_op(&mut self) -> Option<Token> {
        match self.peek() {
            Some(
                op @ (Token::Eq | Token::Ne | Token::Lt | Token::Le | Token::Gt | Token::Ge),
            ) => {
                self.pos += 1;
                Some(op.clone())
            }
            _ => None,
        }
    }

    /// Skip to the end of this command.
    pub fn skip_rest(&mut self) {
        while !self.at_end() {
            self.bump();
        }
    }
}

fn nonzero(divisor: i32) -> ScriptResult<i32> {
    if divisor == 0 {
        Err(ScriptError::DivisionByZero)
    } else {
        Ok(divisor)
    }
}

fn compare(op: Token, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match op {
        Token::Eq => ordering == Equal,
        Token::Ne => ordering != Equal,
        Token::Lt => ordering == Less,
        Token::Le => ordering != Greater,
        Token::Gt => ordering == Greater,
        Token::Ge => ordering != Less,
        _ => false,
    }
}
