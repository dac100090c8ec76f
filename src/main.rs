mod cmd;
#[cfg(feature = "repl")]
mod repl;

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use termcolor::{ColorChoice, StandardStream};

use crate::cmd::Cmd;

fn main() -> ExitCode {
    human_panic::setup_panic!();

    let cmd = Cmd::parse();
    cmd.init_logger();
    match cmd.run() {
        Ok(code) => code,
        Err(e) => {
            let mut stderr = StandardStream::stderr(ColorChoice::Auto);
            let _ = writeln!(&mut stderr, "Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}
