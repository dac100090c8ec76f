use crate::object::{Callable, Object};
use crate::Interpreter;

use gc::{Finalize, Trace};
use lox_common::error::{Error, IoError, Result};
use lox_common::types::Span;

use std::fmt::{self, Display, Formatter};
use std::io::{self, BufRead, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Functions provided by the host and bound in the global scope.
#[derive(Clone, Debug, Eq, Finalize, Trace, PartialEq)]
pub enum Native {
    Clock,
    Input,
}

impl Native {
    pub const ALL: [Native; 2] = [Native::Clock, Native::Input];
}

impl Callable for Native {
    fn arity(&self) -> usize {
        match self {
            Native::Clock | Native::Input => 0,
        }
    }

    fn name(&self) -> &str {
        match self {
            Native::Clock => "clock",
            Native::Input => "input",
        }
    }

    fn call_unchecked<W: Write>(
        &self,
        _interpreter: &mut Interpreter<W>,
        _args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        match self {
            Native::Clock => {
                let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
                Ok(Object::Number(now.as_millis() as f64 / 1000.0))
            }
            Native::Input => {
                let line = read_line(&mut io::stdin().lock()).map_err(|_| {
                    (Error::IoError(IoError::ReadError { file: "stdin".to_string() }), span.clone())
                })?;
                Ok(line.map_or(Object::Nil, Object::String))
            }
        }
    }
}

/// Reads one line without its terminator (`\n` or `\r\n`). `None` at end of
/// input.
fn read_line(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = match line.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => &line,
    };
    Ok(Some(line.to_string()))
}

impl Display for Native {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

#[allow(clippy::from_over_into)]
impl Into<Object> for Native {
    fn into(self) -> Object {
        Object::Native(self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn read(input: &str) -> Option<String> {
        read_line(&mut Cursor::new(input)).expect("in-memory read")
    }

    #[test]
    fn input_is_nil_at_end_of_input() {
        assert_eq!(read(""), None);
    }

    #[test]
    fn input_strips_one_line_terminator() {
        assert_eq!(read("a\n"), Some("a".to_string()));
        assert_eq!(read("a\r\n"), Some("a".to_string()));
        assert_eq!(read("a"), Some("a".to_string()));
        assert_eq!(read("\n"), Some(String::new()));
        assert_eq!(read("a\r\r\n"), Some("a\r".to_string()));
        assert_eq!(read("a\r"), Some("a\r".to_string()));
    }

    #[test]
    fn input_reads_a_single_line() {
        let mut reader = Cursor::new("first\nsecond\r\n");
        assert_eq!(read_line(&mut reader).expect("first"), Some("first".to_string()));
        assert_eq!(read_line(&mut reader).expect("second"), Some("second".to_string()));
        assert_eq!(read_line(&mut reader).expect("eof"), None);
    }
}
