use thiserror::Error;

mod lexer;
mod parser;

pub use lexer::Range;
pub use parser::parse;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected input at {range}")]
    Lexer { range: lexer::Range },

    #[error("parse error at {range}: {message}")]
    Parser { range: lexer::Range, message: String },

    #[error("unknown name `{0}`")]
    UnknownName(String),

    #[error("invalid parameter `{name}`: {message}")]
    Param { name: String, message: String },
}
