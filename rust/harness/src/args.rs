//! Command-line splitting.
//!
//! A runexp invocation mixes three things: harness options (declared below
//! with clap), free-form sweep parameters (`--gpu 1,2,4`), and the command
//! to run. Harness options are recognised by asking clap which flags it
//! knows; every other flag is a parameter, and the first plain token starts
//! the command.

use std::io::Read;

use clap::{CommandFactory, Parser};

const PARAMETER_HELP: &str = "\
Parameters:
  Any other --name value, --name=value, -n value or -n=value is a parameter.
  Names become uppercase environment variables, with '-' mapped to '_'
  (--batch-size becomes BATCH_SIZE, -n becomes N).

Values:
  Comma-separated lists   1,2,4
  Ranges (end exclusive)  1:4 or 1..4  (expands to 1,2,3)
  Expressions over earlier parameters:
    n   n+1   2n   n*n   n^2   2(n+1)
  Anything else is a literal string.

Examples:
  runexp --metrics accuracy --gpu 1,2,4 --batchsize 32,64 python train.py
  runexp --metrics accuracy --n 1,2,4 --gpu n --batchsize 32n python train.py
  runexp --preserve-output --gpu 1,2 <<'EOF'
  python tune.py --gpu $GPU
  EOF";

/// Harness options.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "runexp",
    version,
    about = "Run a command for every combination of parameter values",
    override_usage = "runexp [OPTIONS] --param value ... COMMAND [ARGS...]\n       runexp [OPTIONS] --param value ... < script.sh",
    after_help = PARAMETER_HELP
)]
pub struct HarnessArgs {
    /// Parse metrics from stdout only
    #[arg(long, conflicts_with = "stderr")]
    pub stdout: bool,

    /// Parse metrics from stderr only
    #[arg(long)]
    pub stderr: bool,

    /// Metrics to record (comma-separated, case-insensitive substrings)
    #[arg(short, long, value_delimiter = ',', value_name = "M1,M2")]
    pub metrics: Option<Vec<String>>,

    /// Include stdout/stderr columns in the result CSV
    #[arg(short, long)]
    pub preserve_output: bool,

    /// Result file [default: results.csv]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Run up to N experiments in parallel [default: 1]
    #[arg(short, long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Kill an experiment after this many seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// TOML file with a [harness] table of default settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Print the expanded combinations and exit
    #[arg(long)]
    pub dry_run: bool,
}

impl HarnessArgs {
    /// Settings given explicitly on the command line, as a TOML table that
    /// overlays the config file.
    #[must_use]
    pub fn overrides(&self) -> toml::Table {
        let mut table = toml::Table::new();
        if let Some(ref output) = self.output {
            table.insert("output".into(), output.clone().into());
        }
        if let Some(concurrency) = self.concurrency {
            let concurrency = i64::try_from(concurrency).unwrap_or(i64::MAX);
            table.insert("concurrency".into(), concurrency.into());
        }
        if let Some(ref metrics) = self.metrics {
            let metrics: Vec<toml::Value> = metrics
                .iter()
                .map(|m| m.trim())
                .filter(|m| !m.is_empty())
                .map(toml::Value::from)
                .collect();
            table.insert("metrics".into(), toml::Value::Array(metrics));
        }
        if self.preserve_output {
            table.insert("preserve_output".into(), true.into());
        }
        if self.stdout {
            table.insert("stream".into(), "stdout".into());
        } else if self.stderr {
            table.insert("stream".into(), "stderr".into());
        }
        if let Some(timeout) = self.timeout {
            let timeout = i64::try_from(timeout).unwrap_or(i64::MAX);
            table.insert("timeout_secs".into(), timeout.into());
        }
        table
    }
}

/// A split command line.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub args: HarnessArgs,
    /// `(NAME, value-spec)` in command-line order.
    pub params: Vec<(String, String)>,
    /// Command and its arguments; empty means "read a script from stdin".
    pub command: Vec<String>,
}

impl Invocation {
    /// Parameter names in command-line order.
    #[must_use]
    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|(n, _)| n.clone()).collect()
    }
}

/// Split `argv` (without the program name) into options, parameters and
/// the command.
pub fn split_args(argv: &[String]) -> Result<Invocation, ArgsError> {
    let mut cmd = HarnessArgs::command();
    cmd.build();

    let mut options = vec!["runexp".to_string()];
    let mut params: Vec<(String, String)> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let token = &argv[i];
        if token == "--" {
            i += 1;
            break;
        }

        let flag = if let Some(long) = token.strip_prefix("--") {
            long
        } else if let Some(short) = token.strip_prefix('-')
            && !short.is_empty()
        {
            short
        } else {
            break;
        };
        let (name, inline) = match flag.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (flag, None),
        };
        let is_long = token.starts_with("--");
        if !is_long && name.chars().count() != 1 {
            return Err(ArgsError::UnknownFlag(token.clone()));
        }

        let known = cmd.get_arguments().find(|arg| {
            if is_long {
                arg.get_long() == Some(name)
            } else {
                arg.get_short().is_some_and(|c| name.starts_with(c))
            }
        });

        if let Some(arg) = known {
            options.push(token.clone());
            if inline.is_none() && arg.get_action().takes_values() {
                i += 1;
                let value = argv
                    .get(i)
                    .ok_or_else(|| ArgsError::MissingValue(token.clone()))?;
                options.push(value.clone());
            }
            i += 1;
            continue;
        }

        let value = match inline {
            Some(value) => value.to_string(),
            None => {
                i += 1;
                argv.get(i)
                    .cloned()
                    .ok_or_else(|| ArgsError::MissingValue(token.clone()))?
            }
        };
        let param = param_name(name)?;
        if params.iter().any(|(n, _)| *n == param) {
            return Err(ArgsError::DuplicateParam(param));
        }
        params.push((param, value));
        i += 1;
    }

    let args = HarnessArgs::try_parse_from(options)?;
    if params.is_empty() {
        return Err(ArgsError::NoParams);
    }

    Ok(Invocation {
        args,
        params,
        command: argv[i..].to_vec(),
    })
}

/// `batch-size` -> `BATCH_SIZE`.
fn param_name(raw: &str) -> Result<String, ArgsError> {
    let valid = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !raw.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        return Err(ArgsError::InvalidName(raw.to_string()));
    }
    Ok(raw.replace('-', "_").to_uppercase())
}

/// Read a script from `input` and wrap it as `bash -c <script>`.
pub fn read_script(mut input: impl Read) -> Result<Vec<String>, ArgsError> {
    let mut script = String::new();
    input.read_to_string(&mut script).map_err(ArgsError::Stdin)?;
    if script.trim().is_empty() {
        return Err(ArgsError::NoCommand);
    }
    Ok(vec!["bash".into(), "-c".into(), script])
}

/// Errors that can occur when splitting the command line.
#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error(transparent)]
    Clap(#[from] clap::Error),
    #[error("{0} requires a value")]
    MissingValue(String),
    #[error("unknown flag {0} (single-dash flags take one letter)")]
    UnknownFlag(String),
    #[error("invalid parameter name {0:?}")]
    InvalidName(String),
    #[error("parameter {0} given more than once")]
    DuplicateParam(String),
    #[error("no parameters specified")]
    NoParams,
    #[error("no command specified and no script on stdin")]
    NoCommand,
    #[error("failed to read script from stdin: {0}")]
    Stdin(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(args: &[&str]) -> Result<Invocation, ArgsError> {
        let argv: Vec<String> = args.iter().map(|s| (*s).to_string()).collect();
        split_args(&argv)
    }

    #[test]
    fn test_params_options_and_command() {
        let inv = split(&[
            "--metrics",
            "accuracy,loss",
            "--gpu",
            "1,2,4",
            "-c",
            "2",
            "--batch-size=32,64",
            "-n",
            "3",
            "python",
            "train.py",
            "--epochs",
            "5",
        ])
        .unwrap();

        assert_eq!(
            inv.params,
            vec![
                ("GPU".to_string(), "1,2,4".to_string()),
                ("BATCH_SIZE".to_string(), "32,64".to_string()),
                ("N".to_string(), "3".to_string()),
            ]
        );
        assert_eq!(inv.command, ["python", "train.py", "--epochs", "5"]);
        assert_eq!(
            inv.args.metrics,
            Some(vec!["accuracy".to_string(), "loss".to_string()])
        );
        assert_eq!(inv.args.concurrency, Some(2));
    }

    #[test]
    fn test_inline_option_values() {
        let inv = split(&["--output=out.csv", "-m=acc", "--x", "1", "true"]).unwrap();
        assert_eq!(inv.args.output.as_deref(), Some("out.csv"));
        assert_eq!(inv.args.metrics, Some(vec!["acc".to_string()]));
        assert_eq!(inv.command, ["true"]);
    }

    #[test]
    fn test_boolean_options_take_no_value() {
        let inv = split(&["-p", "--stdout", "--gpu", "1", "echo", "hi"]).unwrap();
        assert!(inv.args.preserve_output);
        assert!(inv.args.stdout);
        assert_eq!(inv.params.len(), 1);
        assert_eq!(inv.command, ["echo", "hi"]);
    }

    #[test]
    fn test_double_dash_ends_flags() {
        let inv = split(&["-p", "--gpu", "1", "--", "--weird-command"]).unwrap();
        assert_eq!(inv.command, ["--weird-command"]);
    }

    #[test]
    fn test_no_command_means_stdin() {
        let inv = split(&["-p", "--gpu", "1"]).unwrap();
        assert!(inv.command.is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            split(&["-p", "--gpu"]),
            Err(ArgsError::MissingValue(_))
        ));
        assert!(matches!(
            split(&["-p", "echo"]),
            Err(ArgsError::NoParams)
        ));
        assert!(matches!(
            split(&["-p", "--gpu", "1", "--GPU", "2", "x"]),
            Err(ArgsError::DuplicateParam(name)) if name == "GPU"
        ));
        assert!(matches!(
            split(&["-p", "-lr", "0.1", "x"]),
            Err(ArgsError::UnknownFlag(_))
        ));
        assert!(matches!(
            split(&["-p", "--a.b", "1", "x"]),
            Err(ArgsError::InvalidName(_))
        ));
        assert!(matches!(
            split(&["--stdout", "--stderr", "-p", "--gpu", "1", "x"]),
            Err(ArgsError::Clap(_))
        ));
    }

    #[test]
    fn test_overrides_only_contain_explicit_settings() {
        let inv = split(&["--stderr", "-m", "acc", "--gpu", "1", "x"]).unwrap();
        let table = inv.args.overrides();
        assert_eq!(table.len(), 2);
        assert_eq!(table["stream"].as_str(), Some("stderr"));
        assert_eq!(table["metrics"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_read_script() {
        let cmd = read_script("echo accuracy: $GPU\n".as_bytes()).unwrap();
        assert_eq!(cmd, ["bash", "-c", "echo accuracy: $GPU\n"]);
        assert!(matches!(
            read_script("  \n".as_bytes()),
            Err(ArgsError::NoCommand)
        ));
    }
}
