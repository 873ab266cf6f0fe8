use clap::Parser;
use pocketjs::bridge::{self, Channel};
use pocketjs::{api, Context, ContextConfig, EvalFlags, STDLIB};
use std::io::Write;
use std::path::Path;
use std::{fs, process};

const DEFAULT_MEMORY_LIMIT: usize = 16 << 20;
/// Refuse to slurp source files larger than this; anything bigger cannot
/// fit a default arena anyway.
const MAX_SOURCE_BYTES: u64 = 64 << 20;

#[derive(Debug, Parser)]
#[command(name = "pocketjs-cli", about = "Run JavaScript-subset programs in a fixed-memory engine")]
struct Args {
    /// Evaluate an inline expression instead of a file.
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Arena size, with optional k/m/g suffix (default 16m).
    #[arg(long = "memory-limit")]
    memory_limit: Option<String>,

    /// Drop column information from syntax-error locations.
    #[arg(long = "no-column", default_value_t = false)]
    no_column: bool,

    /// Print arena statistics after the run.
    #[arg(short = 'd', long = "dump-memory", action = clap::ArgAction::Count)]
    dump: u8,

    /// Seed Math.random for reproducible runs.
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Script file followed by its arguments (or, with -e, just arguments).
    /// Arguments may start with dashes; everything after the file is passed
    /// through untouched.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    file_and_args: Vec<String>,
}

#[derive(Debug, Default, Eq, PartialEq)]
struct CliConfig {
    memory_limit: usize,
    parse_flags: EvalFlags,
    dump_memory: u8,
    seed: Option<u64>,
    eval: Option<String>,
    file: Option<String>,
    script_args: Vec<String>,
}

#[derive(Debug, Eq, PartialEq)]
enum ConfigError {
    MissingMemoryLimit,
    InvalidMemoryLimit,
    MissingInput,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingMemoryLimit => write!(f, "expecting memory limit"),
            ConfigError::InvalidMemoryLimit => write!(f, "invalid memory limit"),
            ConfigError::MissingInput => write!(f, "expecting a script file or -e EXPR"),
        }
    }
}

#[derive(Debug)]
enum CliError {
    Io(String),
    Init(String),
    Bridge(String),
    Eval,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Io(msg) => write!(f, "{msg}"),
            CliError::Init(msg) => write!(f, "{msg}"),
            CliError::Bridge(msg) => write!(f, "{msg}"),
            CliError::Eval => write!(f, "evaluation failed"),
        }
    }
}

fn main() {
    let args = Args::parse();
    let config = match build_config(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };
    match run_cli(config) {
        Ok(()) => {}
        // The script error was already reported through the error channel.
        Err(CliError::Eval) => process::exit(1),
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

fn build_config(args: Args) -> Result<CliConfig, ConfigError> {
    let mut config = CliConfig {
        memory_limit: DEFAULT_MEMORY_LIMIT,
        ..CliConfig::default()
    };

    if let Some(limit) = args.memory_limit.as_deref() {
        config.memory_limit = parse_memory_limit(limit)?;
    }
    if args.no_column {
        config.parse_flags |= EvalFlags::STRIP_COL;
    }
    config.dump_memory = args.dump;
    config.seed = args.seed;
    config.eval = args.eval;

    if config.eval.is_some() {
        config.script_args = args.file_and_args;
    } else if !args.file_and_args.is_empty() {
        config.file = Some(args.file_and_args[0].clone());
        config.script_args = args.file_and_args[1..].to_vec();
    } else {
        return Err(ConfigError::MissingInput);
    }
    Ok(config)
}

fn parse_memory_limit(input: &str) -> Result<usize, ConfigError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingMemoryLimit);
    }

    let mut bytes = trimmed.as_bytes();
    let mut suffix = None;
    if let Some(last) = bytes.last().copied() {
        if matches!(last, b'g' | b'G' | b'm' | b'M' | b'k' | b'K') {
            suffix = Some(last);
            bytes = &bytes[..bytes.len() - 1];
        }
    }
    if bytes.is_empty() {
        return Err(ConfigError::MissingMemoryLimit);
    }

    let number_str = std::str::from_utf8(bytes).map_err(|_| ConfigError::InvalidMemoryLimit)?;
    let mut value: f64 = number_str
        .parse()
        .map_err(|_| ConfigError::InvalidMemoryLimit)?;

    let multiplier = match suffix {
        Some(b'g') | Some(b'G') => 1024.0 * 1024.0 * 1024.0,
        Some(b'm') | Some(b'M') => 1024.0 * 1024.0,
        Some(b'k') | Some(b'K') => 1024.0,
        _ => 1.0,
    };
    value *= multiplier;
    if value.is_sign_negative() || !value.is_finite() {
        return Err(ConfigError::InvalidMemoryLimit);
    }
    Ok(value as usize)
}

fn run_cli(config: CliConfig) -> Result<(), CliError> {
    let mut ctx = Context::new(ContextConfig {
        memory_size: config.memory_limit,
        stdlib: &STDLIB,
    })
    .map_err(|err| CliError::Init(format!("context init failed: {err}")))?;
    set_log_stdout(&mut ctx);
    match config.seed {
        Some(seed) => ctx.set_random_seed(seed),
        None => seed_random(&mut ctx),
    }
    bridge::install(&mut ctx, &config.script_args)
        .map_err(|err| CliError::Bridge(err.to_string()))?;

    let failed = if let Some(expr) = config.eval.as_deref() {
        let flags = config.parse_flags | EvalFlags::RETVAL | EvalFlags::REPL;
        let v = api::eval_with_filename(&mut ctx, expr.as_bytes(), "<cmdline>", flags);
        finish_eval(&mut ctx, v, true)
    } else if let Some(file) = config.file.as_deref() {
        let buf = read_file(file)?;
        let v = api::eval_with_filename(&mut ctx, &buf, file, config.parse_flags);
        finish_eval(&mut ctx, v, false)
    } else {
        false
    };

    if config.dump_memory > 0 {
        ctx.dump_memory();
    }
    if failed {
        return Err(CliError::Eval);
    }
    Ok(())
}

/// Flush both channels, report any pending error, and (for -e) print the
/// completion value. Returns whether the evaluation failed.
fn finish_eval(ctx: &mut Context, v: pocketjs::JsValue, print_value: bool) -> bool {
    // Output logged before a throw still belongs to the run.
    flush_output(ctx);
    if pocketjs::value::is_exception(v) {
        dump_error(ctx);
        return true;
    }
    if print_value && !pocketjs::value::is_undefined(v) {
        println!("{}", ctx.to_rust_string(v));
    }
    false
}

fn flush_output(ctx: &mut Context) {
    if let Some(block) = bridge::flush(ctx, Channel::Out) {
        println!("{block}");
    }
    if let Some(block) = bridge::flush(ctx, Channel::Err) {
        eprintln!("{block}");
    }
}

fn dump_error(ctx: &mut Context) {
    let err = ctx.take_exception();
    eprintln!("{}", ctx.error_message(err));
    if let Some(stack) = ctx.error_stack(err) {
        eprint!("{stack}");
        if !stack.ends_with('\n') {
            eprintln!();
        }
    }
}

fn set_log_stdout(ctx: &mut Context) {
    ctx.set_log_func(|bytes| {
        let _ = std::io::stdout().write_all(bytes);
    });
}

fn seed_random(ctx: &mut Context) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let seed = (now.as_secs() << 32) | u64::from(now.subsec_micros());
    ctx.set_random_seed(seed);
}

fn read_file(path: &str) -> Result<Vec<u8>, CliError> {
    let meta = fs::metadata(Path::new(path))
        .map_err(|err| CliError::Io(format!("{path}: {err}")))?;
    if meta.len() > MAX_SOURCE_BYTES {
        return Err(CliError::Io(format!(
            "{path}: file too large ({} bytes, limit {MAX_SOURCE_BYTES})",
            meta.len()
        )));
    }
    fs::read(Path::new(path)).map_err(|err| CliError::Io(format!("{path}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_from<I, S>(input: I) -> Args
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        Args::parse_from(input)
    }

    #[test]
    fn memory_limit_defaults_to_16m() {
        let args = args_from(["pjs", "script.js"]);
        let config = build_config(args).expect("config");
        assert_eq!(config.memory_limit, DEFAULT_MEMORY_LIMIT);
    }

    #[test]
    fn memory_limit_parses_suffixes() {
        let args = args_from(["pjs", "--memory-limit", "2k", "script.js"]);
        let config = build_config(args).expect("config");
        assert_eq!(config.memory_limit, 2 * 1024);

        let args = args_from(["pjs", "--memory-limit", "1m", "script.js"]);
        let config = build_config(args).expect("config");
        assert_eq!(config.memory_limit, 1024 * 1024);

        let args = args_from(["pjs", "--memory-limit", "1.5g", "script.js"]);
        let config = build_config(args).expect("config");
        assert_eq!(
            config.memory_limit,
            (1.5 * 1024.0 * 1024.0 * 1024.0) as usize
        );
    }

    #[test]
    fn invalid_memory_limit_is_rejected() {
        let args = args_from(["pjs", "--memory-limit", "abc", "script.js"]);
        assert_eq!(
            build_config(args).expect_err("error"),
            ConfigError::InvalidMemoryLimit
        );

        let args = args_from(["pjs", "--memory-limit", "-4m", "script.js"]);
        assert_eq!(
            build_config(args).expect_err("error"),
            ConfigError::InvalidMemoryLimit
        );
    }

    #[test]
    fn no_column_sets_parse_flag() {
        let args = args_from(["pjs", "--no-column", "script.js"]);
        let config = build_config(args).expect("config");
        assert!(config.parse_flags.contains(EvalFlags::STRIP_COL));
    }

    #[test]
    fn file_and_script_args_are_captured() {
        let args = args_from(["pjs", "script.js", "-i", "--verbose", "hello"]);
        let config = build_config(args).expect("config");
        assert_eq!(config.file.as_deref(), Some("script.js"));
        assert_eq!(config.script_args, vec!["-i", "--verbose", "hello"]);
    }

    #[test]
    fn eval_takes_all_trailing_words_as_args() {
        let args = args_from(["pjs", "-e", "1 + 1", "a", "b"]);
        let config = build_config(args).expect("config");
        assert_eq!(config.eval.as_deref(), Some("1 + 1"));
        assert_eq!(config.file, None);
        assert_eq!(config.script_args, vec!["a", "b"]);
    }

    #[test]
    fn missing_input_is_an_error() {
        let args = args_from(["pjs"]);
        assert_eq!(
            build_config(args).expect_err("error"),
            ConfigError::MissingInput
        );
    }
}
