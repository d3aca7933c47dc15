use std::fmt;

pub type Pos = u32;

/// A byte range in the input.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Range {
    pub start: Pos,
    pub end: Pos,
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Symbol,
    Number,
    Color,
    String,
    Ident,
    Error,
}

#[derive(Debug, Clone)]
pub struct Lexeme {
    pub token: Token,
    pub text: String,
    pub range: Range,
}

#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,

    /// The byte offset just past the last character consumed.
    offset: Pos,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            offset: 0,
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn next_char(&mut self) -> Option<(Pos, char)> {
        self.chars.next().map(|(off, c)| {
            self.offset = (off + c.len_utf8()) as Pos;
            (off as Pos, c)
        })
    }

    fn consume(&mut self) {
        self.next_char();
    }

    fn consume_if<P: FnOnce(char) -> bool>(&mut self, pred: P) -> Option<char> {
        self.chars.next_if(|(_, c)| pred(*c)).map(|(ix, c)| {
            self.offset = (ix + c.len_utf8()) as Pos;
            c
        })
    }

    fn consume_while<P: FnMut(char) -> bool>(&mut self, mut pred: P) -> usize {
        let mut count = 0;
        while self.consume_if(&mut pred).is_some() {
            count += 1;
        }
        count
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek_char() {
            match c {
                ';' => self.skip_line(),
                c if c.is_whitespace() => self.consume(),
                _ => break,
            }
        }
    }

    /// Skip to the next line.
    fn skip_line(&mut self) {
        while self.consume_if(|c| c != '\n').is_some() {}
    }

    /// Consume the rest of an identifier, after its leading letter.
    fn consume_ident_tail(&mut self) {
        self.consume_while(|c| c.is_ascii_alphanumeric() || "-_!?".contains(c));
    }

    /// Consume the rest of a number, returning `false` when no digits were seen.
    fn consume_number(&mut self, first: char) -> bool {
        let mut digits = first.is_ascii_digit();
        let mut dot = first == '.';

        self.consume_while(|c| {
            if c.is_ascii_digit() {
                digits = true;
                return true;
            }

            if !dot && c == '.' {
                dot = true;
                return true;
            }

            false
        });

        digits
    }

    fn consume_color(&mut self) -> bool {
        self.consume_while(|c| c.is_ascii_hexdigit()) > 0
    }

    /// Consume a string body and its closing quote, honoring backslash escapes.
    fn consume_string(&mut self) -> bool {
        let mut escaped = false;
        while let Some((_, c)) = self.next_char() {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => return true,
                _ => {}
            }
        }
        false
    }

    /// Construct a lexeme that began at `start`.
    fn lexeme(&self, start: Pos, token: Token) -> Lexeme {
        let end = self.offset;
        Lexeme {
            token,
            text: String::from(&self.input[start as usize..end as usize]),
            range: Range { start, end },
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Lexeme;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace_and_comments();

        let (start, c) = self.next_char()?;
        let tok = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ':' => {
                if self.consume_if(|c| c.is_ascii_alphabetic()).is_some() {
                    self.consume_ident_tail();
                    Token::Symbol
                } else {
                    Token::Error
                }
            }
            '#' => {
                if self.consume_color() {
                    Token::Color
                } else {
                    Token::Error
                }
            }
            '"' => {
                if self.consume_string() {
                    Token::String
                } else {
                    Token::Error
                }
            }

            '-' | '+' | '.' => {
                if self.consume_number(c) {
                    Token::Number
                } else {
                    Token::Error
                }
            }

            _ if c.is_ascii_digit() => {
                self.consume_number(c);
                Token::Number
            }

            _ if c.is_ascii_alphabetic() => {
                self.consume_ident_tail();
                Token::Ident
            }

            _ => Token::Error,
        };

        Some(self.lexeme(start, tok))
    }
}

#[cfg(test)]
macro_rules! lexer_next {
    ($lexer:ident, $token:expr, $text:expr) => {
        let result = $lexer.next();
        assert!(result.is_some());

        let result = result.unwrap();
        assert_eq!($token, result.token);
        assert_eq!($text, result.text);
    };
}

#[test]
fn test_lex_basic() {
    let input = "(:symbol 0.1 #6600ff \"foo.\\\"bar\"))";
    let mut lexer = Lexer::new(input);
    lexer_next!(lexer, Token::LParen, "(");
    lexer_next!(lexer, Token::Symbol, ":symbol");
    lexer_next!(lexer, Token::Number, "0.1");
    lexer_next!(lexer, Token::Color, "#6600ff");
    lexer_next!(lexer, Token::String, "\"foo.\\\"bar\"");
    lexer_next!(lexer, Token::RParen, ")");
    lexer_next!(lexer, Token::RParen, ")");
    assert!(lexer.next().is_none());
}

#[test]
fn test_lex_numbers() {
    let mut lexer = Lexer::new("-2 3.5 -0.25 .5 - 12");
    lexer_next!(lexer, Token::Number, "-2");
    lexer_next!(lexer, Token::Number, "3.5");
    lexer_next!(lexer, Token::Number, "-0.25");
    lexer_next!(lexer, Token::Number, ".5");
    lexer_next!(lexer, Token::Error, "-");
    lexer_next!(lexer, Token::Number, "12");
}

#[test]
fn test_lex_idents() {
    let mut lexer = Lexer::new("waterpool :view-min spot_1");
    lexer_next!(lexer, Token::Ident, "waterpool");
    lexer_next!(lexer, Token::Symbol, ":view-min");
    lexer_next!(lexer, Token::Ident, "spot_1");
}

#[test]
fn test_lex_ranges() {
    let mut lexer = Lexer::new("  (sphere)");
    assert_eq!(Range { start: 2, end: 3 }, lexer.next().unwrap().range);
    assert_eq!(Range { start: 3, end: 9 }, lexer.next().unwrap().range);
}

#[test]
fn test_lex_errors() {
    let mut lexer = Lexer::new(": # \"open");
    lexer_next!(lexer, Token::Error, ":");
    lexer_next!(lexer, Token::Error, "#");
    lexer_next!(lexer, Token::Error, "\"open");
}

#[test]
fn test_lex_leading_comment() {
    let input = "    ;; foo comment\n     :symbol";
    let mut lexer = Lexer::new(input);
    lexer_next!(lexer, Token::Symbol, ":symbol");
}
