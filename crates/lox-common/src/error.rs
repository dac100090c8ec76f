use crate::types::{Span, Spanned};

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::{Files, SimpleFile};
use codespan_reporting::term;
use termcolor::WriteColor;
use thiserror::Error;

pub type Result<T, E = ErrorS> = std::result::Result<T, E>;
pub type ErrorS = Spanned<Error>;

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("AttributeError: {0}")]
    AttributeError(AttributeError),
    #[error("IOError: {0}")]
    IoError(IoError),
    #[error("NameError: {0}")]
    NameError(NameError),
    #[error("RecursionError: {0}")]
    RecursionError(RecursionError),
    #[error("SyntaxError: {0}")]
    SyntaxError(SyntaxError),
    #[error("TypeError: {0}")]
    TypeError(TypeError),
}

impl Error {
    /// Errors raised while scanning, parsing or resolving. These stop a
    /// program from running at all.
    pub fn is_static(&self) -> bool {
        match self {
            Error::NameError(e) => !matches!(e, NameError::NotDefined { .. }),
            Error::SyntaxError(_) => true,
            Error::AttributeError(_)
            | Error::IoError(_)
            | Error::RecursionError(_)
            | Error::TypeError(_) => false,
        }
    }
}

impl AsDiagnostic for Error {
    fn as_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        let code = match self {
            Error::AttributeError(_) => "AttributeError",
            Error::IoError(_) => "IOError",
            Error::NameError(_) => "NameError",
            Error::RecursionError(_) => "RecursionError",
            Error::SyntaxError(_) => "SyntaxError",
            Error::TypeError(_) => "TypeError",
        };
        let message = match self {
            Error::AttributeError(e) => e.to_string(),
            Error::IoError(e) => e.to_string(),
            Error::NameError(e) => e.to_string(),
            Error::RecursionError(e) => e.to_string(),
            Error::SyntaxError(e) => e.to_string(),
            Error::TypeError(e) => e.to_string(),
        };
        let diagnostic = Diagnostic::error()
            .with_code(code)
            .with_message(message)
            .with_labels(vec![Label::primary((), span.clone())]);
        match self {
            Error::SyntaxError(
                SyntaxError::UnrecognizedEOF { expected }
                | SyntaxError::UnrecognizedToken { expected, .. },
            ) => diagnostic.with_notes(vec![format!("expected: {}", one_of(expected))]),
            _ => diagnostic,
        }
    }
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum AttributeError {
    #[error("{type_:?} object has no attribute {name:?}")]
    NoSuchAttribute { type_: String, name: String },
    #[error("only instances have properties, not {type_:?}")]
    NotAnInstance { type_: String, name: String },
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum IoError {
    #[error("unable to read from file: {file:?}")]
    ReadError { file: String },
    #[error("unable to write to file: {file:?}")]
    WriteError { file: String },
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum NameError {
    #[error("cannot read local variable {name:?} in its own initializer")]
    AccessInsideInitializer { name: String },
    #[error("name {name:?} is already defined in this scope")]
    AlreadyDefined { name: String },
    #[error("name {name:?} is not defined")]
    NotDefined { name: String },
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RecursionError {
    #[error("maximum call depth of {max_depth} exceeded")]
    MaxDepthExceeded { max_depth: usize },
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SyntaxError {
    #[error("class {name:?} cannot inherit from itself")]
    InheritFromSelf { name: String },
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error(r#""return" outside function"#)]
    ReturnOutsideFunction,
    #[error(r#""init" cannot return a value"#)]
    ReturnValueInInitializer,
    #[error(r#""super" used outside class"#)]
    SuperOutsideClass,
    #[error(r#""super" used in class {name:?} with no superclass"#)]
    SuperWithoutSuperclass { name: String },
    #[error(r#""this" used outside class"#)]
    ThisOutsideClass,
    #[error("cannot have more than 255 arguments")]
    TooManyArguments,
    #[error("cannot have more than 255 parameters")]
    TooManyParameters,
    #[error("unexpected input: {token:?}")]
    UnexpectedInput { token: String },
    #[error("unexpected end of file")]
    UnrecognizedEOF { expected: Vec<String> },
    #[error("unexpected {token:?}")]
    UnrecognizedToken { token: String, expected: Vec<String> },
    #[error("unterminated string")]
    UnterminatedString,
}

#[remain::sorted]
#[derive(Debug, Error, Eq, PartialEq)]
pub enum TypeError {
    #[error("{name}() takes {exp_args} arguments but {got_args} were given")]
    ArityMismatch { name: String, exp_args: usize, got_args: usize },
    #[error("{type_:?} object is not callable")]
    NotCallable { type_: String },
    #[error(r#"superclass should be of type "class", not {type_:?}"#)]
    SuperclassInvalidType { type_: String },
    #[error("unsupported operand type(s) for {op}: {lt_type:?} and {rt_type:?}")]
    UnsupportedOperandInfix { op: String, lt_type: String, rt_type: String },
    #[error("unsupported operand type for {op}: {rt_type:?}")]
    UnsupportedOperandPrefix { op: String, rt_type: String },
}

trait AsDiagnostic {
    fn as_diagnostic(&self, span: &Span) -> Diagnostic<()>;
}

fn one_of(tokens: &[String]) -> String {
    let (token_last, tokens) = match tokens.split_last() {
        Some((token_last, &[])) => return token_last.to_string(),
        Some((token_last, tokens)) => (token_last, tokens),
        None => return "nothing".to_string(),
    };

    let mut output = String::new();
    for token in tokens {
        output.push_str(token);
        output.push_str(", ");
    }
    output.push_str("or ");
    output.push_str(token_last);
    output
}

/// Returns the 1-based line on which `span` starts.
pub fn line_of(source: &str, span: &Span) -> usize {
    let file = SimpleFile::new("<script>", source);
    file.line_index((), span.start.min(source.len())).map_or(1, |idx| idx + 1)
}

/// Renders diagnostics for `errors` in source order, each one followed by
/// the `[line N]` it was raised on.
pub fn report_err(writer: &mut dyn WriteColor, source: &str, mut errors: Vec<ErrorS>) {
    errors.sort_unstable_by_key(|(_, span)| (span.start, span.end));

    let file = SimpleFile::new("<script>", source);
    let config = term::Config::default();

    for (e, span) in errors {
        let line = line_of(source, &span);
        let diagnostic = e.as_diagnostic(&span);
        let mut notes = diagnostic.notes.clone();
        notes.push(format!("[line {line}]"));
        let diagnostic = diagnostic.with_notes(notes);
        // A failing stderr leaves nowhere else to report to.
        let _ = term::emit(writer, &config, &file, &diagnostic);
    }
}
