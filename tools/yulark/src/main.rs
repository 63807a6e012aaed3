use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use miette::{Context, IntoDiagnostic};
use serde::Deserialize;
use yulark::{
    dictionary::{EntryRef, Image, ImageBuilder},
    native, normalize, CoreCallback, Engine, EngineParams, Error, NativeEntry, Word,
};

fn main() -> miette::Result<()> {
    use tracing_subscriber::prelude::*;

    let App {
        cmd,
        engine,
        output,
    } = App::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(io::stderr),
        )
        .with(output.trace_filter)
        .init();

    match cmd {
        Cmd::Run { image, entry, stack } => {
            let bytes = fs::read(&image)
                .into_diagnostic()
                .with_context(|| format!("failed to read {}", image.display()))?;
            let image = Image::from_bytes(bytes)
                .into_diagnostic()
                .with_context(|| format!("{} is not a dictionary image", image.display()))?;
            run_image(engine.params()?, &image, entry.as_deref(), stack)
        }
        Cmd::Words { image } => {
            let bytes = fs::read(&image)
                .into_diagnostic()
                .with_context(|| format!("failed to read {}", image.display()))?;
            let image = Image::from_bytes(bytes).into_diagnostic()?;
            list_words(&image).into_diagnostic()
        }
        Cmd::Demo { out } => {
            let image = demo_image().into_diagnostic()?;
            match out {
                Some(path) => fs::write(&path, image.as_bytes())
                    .into_diagnostic()
                    .with_context(|| format!("failed to write {}", path.display())),
                None => run_image(engine.params()?, &image, None, false),
            }
        }
        Cmd::Compress => {
            let written = normalize::normalize(io::stdin().lock(), io::stdout().lock())
                .into_diagnostic()
                .context("failed to normalise stdin")?;
            tracing::debug!(written, "normalised");
            Ok(())
        }
    }
}

/// Run, inspect and build yulark dictionary images.
#[derive(Debug, Parser)]
#[clap(about, version)]
struct App {
    #[clap(subcommand)]
    cmd: Cmd,

    #[clap(flatten)]
    engine: EngineOptions,

    #[clap(flatten)]
    output: OutputOptions,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Load an image file and run it until it halts.
    Run {
        image: PathBuf,

        /// Start from this word instead of the image's entry word.
        #[clap(long, short)]
        entry: Option<String>,

        /// Print the parameter stack after the run.
        #[clap(long)]
        stack: bool,
    },
    /// List the words an image defines, most recent first.
    Words { image: PathBuf },
    /// Build the `double`/`quad` demo image and run it, or write it out.
    Demo {
        #[clap(long, short)]
        out: Option<PathBuf>,
    },
    /// Strip comments and collapse whitespace, stdin to stdout.
    Compress,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Engine Options")]
struct EngineOptions {
    /// A TOML file with an `[engine]` table.
    #[clap(long, short, global = true, env = "YULARK_CONFIG")]
    config: Option<PathBuf>,

    /// Arena size in bytes. Overrides the config file.
    #[clap(long, global = true, env = "YULARK_CAPACITY")]
    capacity: Option<usize>,

    /// Return stack size in bytes. Overrides the config file.
    #[clap(long = "return-stack", global = true)]
    return_stack: Option<usize>,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Output Options")]
struct OutputOptions {
    /// Tracing filter, as `tracing_subscriber` targets.
    #[clap(
        long = "trace",
        alias = "log",
        env = "RUST_LOG",
        default_value = "warn",
        global = true
    )]
    trace_filter: tracing_subscriber::filter::Targets,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    engine: EngineParams,
}

impl EngineOptions {
    fn params(&self) -> miette::Result<EngineParams> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .into_diagnostic()
                    .with_context(|| format!("failed to read {}", path.display()))?;
                toml::from_str::<Config>(&text)
                    .into_diagnostic()
                    .with_context(|| format!("invalid config in {}", path.display()))?
            }
            None => Config::default(),
        };
        if let Some(capacity) = self.capacity {
            config.engine.capacity = capacity;
        }
        if let Some(return_stack) = self.return_stack {
            config.engine.return_stack_size = return_stack;
        }
        tracing::debug!(params = ?config.engine, "engine settings");
        Ok(config.engine)
    }
}

fn double(engine: &mut Engine<()>) -> Result<(), Error> {
    let val = engine.pop()?.as_i64();
    engine.push(Word::data(val.wrapping_mul(2)))?;
    engine.next()
}

/// Host words every image run by this tool may use.
static NATIVES: &[NativeEntry<()>] = &[native!("double", double)];

fn demo_image() -> Result<Image, Error> {
    let mut builder = ImageBuilder::with_natives(NATIVES)?;
    let double = builder.cfa("double")?;
    let lit = builder.cfa("(literal)")?;
    let dot = builder.cfa(".")?;
    let cr = builder.cfa("cr")?;
    let quad = builder.colon("quad", &[double, double])?;
    let main = builder.colon("main", &[lit, Word::data(21), quad, dot, cr])?;
    builder.set_entry(main);
    Ok(builder.finish())
}

fn run_image(
    params: EngineParams,
    image: &Image,
    entry: Option<&str>,
    show_stack: bool,
) -> miette::Result<()> {
    let mut engine = Engine::new(params, Some(image), (), NATIVES).into_diagnostic()?;
    let res = match entry {
        Some(name) => {
            let cfa = engine
                .find_word(name)
                .ok_or_else(|| miette::miette!("no word named '{name}'"))?;
            engine.run_from(cfa)
        }
        None => engine.run(),
    };

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(&engine.take_output_bytes())
        .into_diagnostic()?;
    if show_stack {
        let stack = engine.param_stack().into_diagnostic()?;
        write!(stdout, "<{}>", stack.len()).into_diagnostic()?;
        for w in stack {
            write!(stdout, " {}", w.as_i64()).into_diagnostic()?;
        }
        writeln!(stdout).into_diagnostic()?;
    }
    stdout.flush().into_diagnostic()?;

    tracing::info!(cycles = engine.cycles(), "run finished");
    res.into_diagnostic().context("engine halted")
}

fn kind(entry: &EntryRef<'_>) -> String {
    match entry.core_callback() {
        Some(CoreCallback::Docol) => "colon".to_string(),
        Some(CoreCallback::Dovar) => "variable".to_string(),
        Some(CoreCallback::Doconst) => "constant".to_string(),
        Some(_) => "core".to_string(),
        None => {
            let host = (entry.code().as_u64() as usize).checked_sub(CoreCallback::COUNT);
            match host.and_then(|idx| NATIVES.get(idx)) {
                Some(native) => format!("host ({})", native.name),
                None => format!("unknown callback {:#x}", entry.code().as_u64()),
            }
        }
    }
}

fn list_words(image: &Image) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    let dict = image.dictionary();
    for entry in dict.entries() {
        let flags = match (entry.is_immediate(), entry.is_hidden()) {
            (true, true) => "IH",
            (true, false) => "I ",
            (false, true) => " H",
            (false, false) => "  ",
        };
        writeln!(
            stdout,
            "{:>6} {flags} {:<24} {}",
            entry.cfa().as_u64(),
            entry.name(),
            kind(&entry)
        )?;
    }
    stdout.flush()
}
