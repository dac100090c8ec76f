use std::borrow::Cow;
use std::io::{self, StdoutLock};
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, warn};
use lox_common::error;
use lox_interpreter::Interpreter;
use reedline::{
    EditCommand, Emacs, FileBackedHistory, KeyCode, KeyModifiers, PromptEditMode, PromptHistorySearch, Reedline,
    ReedlineEvent, Signal, ValidationResult,
};
use termcolor::{ColorChoice, StandardStream};

const HISTORY_SIZE: usize = 1000;

/// An interactive session. Every input runs against the same interpreter,
/// so definitions carry over from one input to the next.
pub struct Session {
    editor: Reedline,
    interpreter: Interpreter<StdoutLock<'static>>,
    prompt: Prompt,
}

impl Session {
    pub fn new() -> Result<Self> {
        let mut keybindings = reedline::default_emacs_keybindings();
        keybindings.add_binding(
            KeyModifiers::ALT,
            KeyCode::Enter,
            ReedlineEvent::Edit(vec![EditCommand::InsertNewline]),
        );

        let mut editor =
            Reedline::create().with_edit_mode(Box::new(Emacs::new(keybindings))).with_validator(Box::new(Validator));
        match history_path() {
            Some(path) => {
                debug!("keeping history in {}", path.display());
                let history = FileBackedHistory::with_file(HISTORY_SIZE, path.clone())
                    .with_context(|| format!("could not open history file: {}", path.display()))?;
                editor = editor.with_history(Box::new(history));
            }
            None => warn!("no data directory found, history will not be saved"),
        }

        Ok(Self { editor, interpreter: Interpreter::new(io::stdout().lock()), prompt: Prompt::default() })
    }

    /// Reads and runs inputs until end of input (Ctrl-D).
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.editor.read_line(&self.prompt).context("could not read line")? {
                Signal::Success(line) if line.trim().is_empty() => (),
                Signal::Success(line) => {
                    self.eval(&line);
                    self.prompt.inputs += 1;
                }
                Signal::CtrlC => eprintln!("^C"),
                Signal::CtrlD => return Ok(()),
            }
        }
    }

    fn eval(&mut self, line: &str) {
        if let Err(errors) = self.interpreter.run(line) {
            debug!("input {} failed with {} error(s)", self.prompt.inputs + 1, errors.len());
            let mut stderr = StandardStream::stderr(ColorChoice::Auto);
            error::report_err(&mut stderr, self.interpreter.source(), errors);
        }
    }
}

fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("lox").join("history.txt"))
}

/// Accepts an input once every brace, parenthesis and string is closed.
struct Validator;

impl reedline::Validator for Validator {
    fn validate(&self, line: &str) -> ValidationResult {
        if lox_syntax::is_complete(line) {
            ValidationResult::Complete
        } else {
            ValidationResult::Incomplete
        }
    }
}

/// Numbers each input, `[1]> `, and lines up continuation lines under it.
#[derive(Debug, Default)]
struct Prompt {
    inputs: usize,
}

impl Prompt {
    fn label(&self) -> String {
        format!("[{}]", self.inputs + 1)
    }
}

impl reedline::Prompt for Prompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Owned(self.label())
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _: PromptEditMode) -> Cow<str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Owned(format!("{:>width$} ", "...", width = self.label().len() + 1))
    }

    fn render_prompt_history_search_indicator(&self, _: PromptHistorySearch) -> Cow<str> {
        Cow::Borrowed("(search) ")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use reedline::{Prompt as _, Validator as _};

    use super::*;

    #[test]
    fn prompt_counts_inputs() {
        let mut prompt = Prompt::default();
        assert_eq!(prompt.render_prompt_left(), "[1]");
        prompt.inputs = 11;
        assert_eq!(prompt.render_prompt_left(), "[12]");
        assert_eq!(prompt.render_prompt_multiline_indicator(), "  ... ");
    }

    #[test]
    fn validator_waits_for_closing_delimiters() {
        for complete in ["print 1;", "", "fun f() {}", "print \"}\";"] {
            assert!(matches!(Validator.validate(complete), ValidationResult::Complete), "{complete:?}");
        }
        for incomplete in ["fun f() {", "print (1 +", "print \"abc", "class A { f() { }"] {
            assert!(matches!(Validator.validate(incomplete), ValidationResult::Incomplete), "{incomplete:?}");
        }
    }
}
