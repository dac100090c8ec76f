use lox_interpreter::Interpreter;
use pretty_assertions::assert_eq;
use test_generator::test_resources;

use std::fs;
use std::str;

#[test_resources("crates/lox-interpreter/res/examples/**/*.lox")]
fn lox(path: &str) {
    // The resource glob is relative to the workspace root; tests run from the crate directory.
    let path = &format!("{}/../../{path}", env!("CARGO_MANIFEST_DIR"));
    let source = fs::read_to_string(path).unwrap_or_else(|_| panic!("could not read test file: {path}"));

    let mut exp_output = String::new();
    for line in source.lines() {
        const OUT_COMMENT: &str = "// out: ";
        if let Some(idx) = line.find(OUT_COMMENT) {
            exp_output += &line[idx + OUT_COMMENT.len()..];
            exp_output += "\n";
        }
    }

    let mut interpreter = Interpreter::new(Vec::new());
    let result = interpreter.run(&source);
    let mut got_output = str::from_utf8(interpreter.stdout()).expect("invalid UTF-8 in output").to_string();
    if let Err(errors) = result {
        let (e, _) = errors.first().expect("received empty error");
        got_output += &format!("{e}\n");
    }
    assert_eq!(exp_output, got_output);
}
