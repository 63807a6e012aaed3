//! # Test Utilities
//!
//! Helpers for running "ui tests": small scripts of forth-ish lines that are
//! compiled straight into an image and executed on a fresh engine.
//!
//! ## UI Tests
//!
//! Each line of a ui test is one of:
//!
//! * Configuration values for the engine, specified as "frontmatter
//!   comments". These must appear before any other non-comment lines.
//!   Currently accepted:
//!     * `( capacity USIZE )`
//!     * `( return_stack_size USIZE )`
//!     * `( output_buf_size USIZE )`
//! * Comment lines, any other line starting with `(`.
//! * Definitions, `: name word word ... ;`. The words are compiled into a
//!   composed word that every later line can use.
//! * Successful input lines, starting with `> ...`. The rest of the line is
//!   compiled into a hidden composed word, set as the entry word of a fresh
//!   engine, and run until it halts.
//! * Successful output lines, starting with `< ...`.
//!     * Any successful input line can have zero or more output lines
//!     * If *no* output lines are specified, ANY output is accepted/ignored.
//! * Stack lines, starting with `=`. The parameter stack after the last
//!   input line must hold exactly these numbers, bottom first. A bare `=`
//!   expects an empty stack.
//! * Unsuccessful input lines, starting with `x ...`. Running the line must
//!   end in an `Err()`.
//!
//! Integer tokens compile to `(literal) n`; every other token must name a
//! word already in the dictionary.
//!
//! ### Example
//!
//! ```rust
//! # use yulark::testutil::blocking_runtest;
//! #
//! # blocking_runtest(r#"
//! ( specify engine settings with frontmatter )
//! ( capacity 8192 )
//!
//! ( define words )
//! : star 42 emit ;
//!
//! ( specify input and output )
//! > star star
//! < **
//!
//! ( check the stack )
//! > 1 2 +
//! = 3
//!
//! ( specify lines that cause errors )
//! x 1 0 /
//! # "#)
//! ```

use crate::{
    dictionary::ImageBuilder, CoreCallback, Engine, EngineParams, Error, NativeEntry, Step, Word,
};

const ANON_NAME: &str = "(ui-test)";

/// Run the given ui test both ways an engine can be driven.
///
/// A helper for calling [`blocking_runtest`] and [`stepping_runtest`]. This
/// is a good default to use for unit tests.
pub fn all_runtest(contents: &str) {
    blocking_runtest(contents);
    stepping_runtest(contents);
}

/// Run the given ui test with [`Engine::run`].
pub fn blocking_runtest(contents: &str) {
    runtest_with((), &[], contents, Drive::Blocking);
}

/// Run the given ui test, calling [`Engine::step`] until it reports
/// [`Step::Done`].
pub fn stepping_runtest(contents: &str) {
    runtest_with((), &[], contents, Drive::Stepping);
}

/// Like [`blocking_runtest`], with host natives and a host context. Each
/// input line gets a clone of `host_ctxt`.
pub fn blocking_runtest_with<T: Clone + 'static>(
    host_ctxt: T,
    natives: &'static [NativeEntry<T>],
    contents: &str,
) {
    runtest_with(host_ctxt, natives, contents, Drive::Blocking);
}

#[derive(Debug, Clone, Copy)]
enum Drive {
    Blocking,
    Stepping,
}

fn runtest_with<T: Clone + 'static>(
    host_ctxt: T,
    natives: &'static [NativeEntry<T>],
    contents: &str,
    drive: Drive,
) {
    let tokd = tokenize(contents).unwrap();
    let mut builder = ImageBuilder::with_natives(natives).unwrap();

    for step in tokd.steps.iter() {
        match step {
            Item::Define { name, body } => {
                let body = compile(&builder, body);
                builder.colon(name, &body).unwrap();
            }
            Item::Run(run) => {
                #[cfg(not(miri))]
                println!("> {}", run.input);
                let mut image = builder.clone();
                let body = compile(&image, &run.input);
                let exit = image.cfa("exit").unwrap();
                let entry = body
                    .iter()
                    .fold(image.build_entry(ANON_NAME).unwrap().hidden(), |e, w| {
                        e.write_word(*w)
                    })
                    .write_word(exit)
                    .finish(CoreCallback::Docol.id());
                image.set_entry(entry);
                let image = image.finish();

                let mut engine =
                    Engine::new(tokd.settings, Some(&image), host_ctxt.clone(), natives).unwrap();
                let res = match drive {
                    Drive::Blocking => engine.run(),
                    Drive::Stepping => step_to_end(&mut engine),
                };
                check_output(res, &run.outcome, &engine.output.as_str());
                if let Some(expected) = &run.stack {
                    check_stack(&engine, expected);
                }
            }
        }
    }
}

fn step_to_end<T: 'static>(engine: &mut Engine<T>) -> Result<(), Error> {
    loop {
        if engine.step()? == Step::Done {
            return Ok(());
        }
    }
}

fn compile(builder: &ImageBuilder, source: &str) -> Vec<Word> {
    let lit = builder.cfa("(literal)").unwrap();
    let mut body = Vec::new();
    for tok in source.split_whitespace() {
        match tok.parse::<i64>() {
            Ok(n) => body.extend([lit, Word::data(n)]),
            Err(_) => match builder.cfa(tok) {
                Ok(cfa) => body.push(cfa),
                Err(e) => panic!("cannot compile '{tok}': {e}"),
            },
        }
    }
    body
}

fn check_output(res: Result<(), Error>, outcome: &Outcome, output: &str) {
    #[cfg(not(miri))]
    println!("< {output}");
    match (res, outcome) {
        (Ok(()), Outcome::OkAnyOutput) => {}
        (Ok(()), Outcome::OkWithOutput(exp)) => {
            let act_lines = output.lines().collect::<Vec<&str>>();
            assert_eq!(act_lines.len(), exp.len());
            act_lines.iter().zip(exp.iter()).for_each(|(a, e)| {
                assert_eq!(a.trim_end(), e.trim_end());
            })
        }
        (Err(_e), Outcome::FatalError) => {}
        (res, exp) => {
            eprintln!("Error!");
            eprintln!("Expected: {exp:?}");
            eprintln!("Got: {res:?}");
            if res.is_ok() {
                eprintln!("Output:\n{}", output);
            }
            panic!();
        }
    }
}

fn check_stack<T: 'static>(engine: &Engine<T>, expected: &[i64]) {
    let actual = engine
        .param_stack()
        .unwrap()
        .iter()
        .map(|w| w.as_i64())
        .collect::<Vec<i64>>();
    assert_eq!(actual, expected, "parameter stack");
}

#[derive(Debug)]
enum Outcome {
    OkAnyOutput,
    OkWithOutput(Vec<String>),
    FatalError,
}

#[derive(Debug)]
struct Run {
    input: String,
    outcome: Outcome,
    stack: Option<Vec<i64>>,
}

#[derive(Debug)]
enum Item {
    Define { name: String, body: String },
    Run(Run),
}

#[derive(Default, Debug)]
struct Tokenized {
    settings: EngineParams,
    steps: Vec<Item>,
}

impl Tokenized {
    fn last_run(&mut self) -> &mut Run {
        match self.steps.last_mut() {
            Some(Item::Run(run)) => run,
            _ => panic!("expectation with no input line before it"),
        }
    }
}

fn tokenize(contents: &str) -> Result<Tokenized, ()> {
    let mut output = Tokenized::default();
    let mut frontmatter_done = false;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (tok, remain) = line.split_once(' ').unwrap_or((line, ""));

        match tok {
            ">" | "x" => {
                frontmatter_done = true;
                let outcome = if tok == ">" {
                    Outcome::OkAnyOutput
                } else {
                    Outcome::FatalError
                };
                output.steps.push(Item::Run(Run {
                    input: remain.to_string(),
                    outcome,
                    stack: None,
                }));
            }
            "<" => {
                frontmatter_done = true;
                let cur = output.last_run();
                let expected_out = remain.to_string();
                match &mut cur.outcome {
                    Outcome::OkAnyOutput => {
                        cur.outcome = Outcome::OkWithOutput(vec![expected_out]);
                    }
                    Outcome::OkWithOutput(o) => o.push(expected_out),
                    Outcome::FatalError => panic!("Fatal error can't set output"),
                }
            }
            "=" => {
                frontmatter_done = true;
                let cur = output.last_run();
                assert!(
                    !matches!(cur.outcome, Outcome::FatalError),
                    "Fatal error can't check the stack"
                );
                let stack = remain
                    .split_whitespace()
                    .map(|n| n.parse::<i64>().map_err(drop))
                    .collect::<Result<Vec<_>, ()>>()?;
                cur.stack = Some(stack);
            }
            ":" => {
                frontmatter_done = true;
                let def = remain.trim_end().strip_suffix(';').ok_or(())?;
                let (name, body) = def.trim().split_once(' ').unwrap_or((def.trim(), ""));
                output.steps.push(Item::Define {
                    name: name.to_string(),
                    body: body.to_string(),
                });
            }
            "(" => {
                let mut split = remain.split_whitespace();
                let setting = match split.next() {
                    Some("capacity") => &mut output.settings.capacity,
                    Some("return_stack_size") => &mut output.settings.return_stack_size,
                    Some("output_buf_size") => &mut output.settings.output_buf_size,
                    _ => continue,
                };
                assert!(!frontmatter_done, "Unexpected frontmatter settings!");
                *setting = split.next().ok_or(())?.parse::<usize>().map_err(drop)?;
                assert_eq!(Some(")"), split.next());
            }
            _ => {}
        }
    }

    Ok(output)
}

#[cfg(test)]
mod test {
    use super::{all_runtest, blocking_runtest_with, tokenize, Outcome, Item};
    use crate::{native, Engine, Error, NativeEntry, Word};

    #[test]
    fn tokenizer() {
        let tokd = tokenize(
            r#"
            ( capacity 9000 )
            ( just a comment )
            : sq dup * ;
            > 3 sq
            =
            x 0 0 /
            > 1 .
            < 1
            "#,
        )
        .unwrap();
        assert_eq!(tokd.settings.capacity, 9000);
        assert_eq!(tokd.steps.len(), 4);
        match &tokd.steps[0] {
            Item::Define { name, body } => {
                assert_eq!(name, "sq");
                assert_eq!(body.trim(), "dup *");
            }
            other => panic!("unexpected {other:?}"),
        }
        match &tokd.steps[1] {
            Item::Run(run) => assert_eq!(run.stack, Some(vec![])),
            other => panic!("unexpected {other:?}"),
        }
        match &tokd.steps[3] {
            Item::Run(run) => assert!(matches!(run.outcome, Outcome::OkWithOutput(_))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn runs_ui_tests() {
        all_runtest(
            r#"
            ( capacity 8192 )
            ( return_stack_size 512 )
            : sq dup * ;
            : cube dup sq * ;
            > 3 cube
            = 27
            > 2 sq .
            < 4
            x sq
            "#,
        );
    }

    #[derive(Clone, Default)]
    struct Counter(u64);

    fn bump(engine: &mut Engine<Counter>) -> Result<(), Error> {
        engine.host_ctxt.0 += 1;
        engine.push(Word::uint(engine.host_ctxt.0))?;
        engine.next()
    }

    static NATIVES: &[NativeEntry<Counter>] = &[native!("bump", bump)];

    #[test]
    fn host_natives() {
        blocking_runtest_with(
            Counter(10),
            NATIVES,
            r#"
            : twice bump bump ;
            > twice
            = 11 12
            > bump
            = 11
            "#,
        );
    }
}
