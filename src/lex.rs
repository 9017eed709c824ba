/// #Notes
/// The filter language has no quoting: anything that isn't an operator or a
///  separator accumulates into an identifier, so `a b.c/d` is one value.
///  A backslash directly before `,` or `;` embeds that separator in the value.
/// Spaces between tokens are skipped; spaces and tabs at the edges of an
///  identifier are trimmed, interior ones are kept.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenType {
    Invalid,
    Eof,
    And, // ;
    Or,  // ,
    Ident,
    Equal,              // ==
    NotEqual,           // !=
    Include,            // =@
    NotInclude,         // !@
    StartsWith,         // ^=
    EndsWith,           // $=
    Match,              // =~
    NotMatch,           // !~
    GreaterThan,        // >
    LessThan,           // <
    GreaterThanOrEqual, // >=
    LessThanOrEqual,    // <=
}

impl TokenType {
    pub fn is_operator(&self) -> bool {
        !matches!(
            self,
            Self::Invalid | Self::Eof | Self::And | Self::Or | Self::Ident
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub ty: TokenType,
    /// Source text for operators and separators, the unescaped and trimmed
    ///  text for identifiers, the offending character for invalid tokens.
    pub value: String,
    /// Byte index into the source
    pub start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("incomplete operator `{op}` at {start}, expected {expected} after it")]
    IncompleteOperator {
        op: char,
        expected: &'static str,
        start: usize,
    },
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, ':' | '.' | ' ' | '/' | '_' | '-' | '*' | '+' | '\t')
        || !c.is_ascii()
}

/// Produces tokens lazily from the source. One token can be pushed back with
///  [Tokenizer::undo], which is all the lookahead the parser needs.
#[derive(Clone)]
pub struct Tokenizer<'input> {
    source: &'input str,
    current: usize,
    pending: Option<Token>,
    finished: bool,
}

impl<'input> Tokenizer<'input> {
    pub fn new(source: &'input str) -> Self {
        Self {
            source,
            current: 0,
            pending: None,
            finished: false,
        }
    }

    #[inline]
    fn remaining(&self) -> &'input str {
        &self.source[self.current..]
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    #[inline]
    fn pop(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += c.len_utf8();
        Some(c)
    }

    /// If current starts with [expected], consume it and return true.
    fn consume1(&mut self, expected: char) -> bool {
        if let Some(c) = self.peek()
            && c == expected
        {
            self.current += c.len_utf8();
            true
        } else {
            false
        }
    }

    #[inline]
    fn consume_whitespace(&mut self) {
        while self.consume1(' ') {}
    }

    /// Push a token back; the next call to [Tokenizer::next_token] returns it.
    pub fn undo(&mut self, token: Token) {
        debug_assert!(self.pending.is_none(), "only one token can be undone");
        self.pending = Some(token);
    }

    pub fn peek_token(&mut self) -> Result<Token, Error> {
        let token = self.next_token()?;
        self.undo(token.clone());
        Ok(token)
    }

    /// Returns the next token. Once the source is exhausted every call
    ///  returns an EOF token.
    pub fn next_token(&mut self) -> Result<Token, Error> {
        if let Some(token) = self.pending.take() {
            return Ok(token);
        }

        self.consume_whitespace();
        let start = self.current;

        macro_rules! tok {
            ($name:ident) => {{
                Token {
                    ty: TokenType::$name,
                    value: self.source[start..self.current].to_string(),
                    start,
                }
            }};
        }

        let incomplete = |op, expected| Error::IncompleteOperator {
            op,
            expected,
            start,
        };

        let Some(c) = self.pop() else {
            return Ok(tok!(Eof));
        };

        Ok(match c {
            '=' => {
                if self.consume1('=') {
                    tok!(Equal)
                } else if self.consume1('@') {
                    tok!(Include)
                } else if self.consume1('~') {
                    tok!(Match)
                } else {
                    // The character after `=` is left for the next call
                    Token {
                        ty: TokenType::Invalid,
                        value: self.peek().unwrap_or(c).to_string(),
                        start: self.current,
                    }
                }
            }
            '!' => {
                if self.consume1('=') {
                    tok!(NotEqual)
                } else if self.consume1('@') {
                    tok!(NotInclude)
                } else if self.consume1('~') {
                    tok!(NotMatch)
                } else {
                    return Err(incomplete('!', "`=`, `@` or `~`"));
                }
            }
            '^' => {
                if self.consume1('=') {
                    tok!(StartsWith)
                } else {
                    return Err(incomplete('^', "`=`"));
                }
            }
            '$' => {
                if self.consume1('=') {
                    tok!(EndsWith)
                } else {
                    return Err(incomplete('$', "`=`"));
                }
            }
            '>' => {
                if self.consume1('=') {
                    tok!(GreaterThanOrEqual)
                } else {
                    tok!(GreaterThan)
                }
            }
            '<' => {
                if self.consume1('=') {
                    tok!(LessThanOrEqual)
                } else {
                    tok!(LessThan)
                }
            }
            ';' => tok!(And),
            ',' => tok!(Or),
            _ => {
                self.current = start;
                self.ident(start)
            }
        })
    }

    fn ident(&mut self, start: usize) -> Token {
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pop();
                    match self.peek() {
                        Some(c @ (',' | ';')) => {
                            self.pop();
                            value.push(c);
                        }
                        _ => value.push('\\'),
                    }
                }
                Some(c) if is_ident_char(c) => {
                    self.pop();
                    value.push(c);
                }
                terminator => {
                    let trimmed = value.trim_matches([' ', '\t']);
                    if !trimmed.is_empty() {
                        return Token {
                            ty: TokenType::Ident,
                            value: trimmed.to_string(),
                            start,
                        };
                    }
                    let at = self.current;
                    return match terminator {
                        // Only blanks were left in the source
                        None => Token {
                            ty: TokenType::Eof,
                            value: String::new(),
                            start: at,
                        },
                        Some(c) => {
                            self.pop();
                            Token {
                                ty: TokenType::Invalid,
                                value: c.to_string(),
                                start: at,
                            }
                        }
                    };
                }
            }
        }
    }
}

/// Yields every token up to (not including) EOF. Iteration stops after an
///  error or an invalid token.
impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_token() {
            Ok(Token {
                ty: TokenType::Eof, ..
            }) => {
                self.finished = true;
                None
            }
            Ok(token) => {
                self.finished = token.ty == TokenType::Invalid;
                Some(Ok(token))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
