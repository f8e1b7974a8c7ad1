//! Command-line parsing

use std::fmt;
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: void-assetc [--config <file>] [--root <dir>] <command>

Commands:
  compile <path>... [--force] [--android]   Compile individual assets
  build [--android]                         Compile every asset under the root
  clean                                     Remove orphaned metadata and artifacts
  info <path>                               Show the metadata of an asset
  watch                                     Recompile on change until Ctrl-C
  help                                      Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Compile {
        paths: Vec<PathBuf>,
        force: bool,
        android: bool,
    },
    Build {
        android: bool,
    },
    Clean,
    Info {
        path: PathBuf,
    },
    Watch,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgsError(String);

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ArgsError {}

impl Args {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut config = None;
        let mut root = None;
        let mut force = false;
        let mut android = false;
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => config = Some(PathBuf::from(value_of(&arg, args.next())?)),
                "--root" | "-r" => root = Some(PathBuf::from(value_of(&arg, args.next())?)),
                "--force" | "-f" => force = true,
                "--android" => android = true,
                "--help" | "-h" => positional.insert(0, "help".to_string()),
                flag if flag.starts_with('-') => return Err(ArgsError(format!("unknown option {}", flag))),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            None | Some("help") => Command::Help,
            Some("compile") => {
                let paths: Vec<PathBuf> = positional.by_ref().map(PathBuf::from).collect();
                if paths.is_empty() {
                    return Err(ArgsError("compile needs at least one path".to_string()));
                }
                Command::Compile { paths, force, android }
            }
            Some("build") => Command::Build { android },
            Some("clean") => Command::Clean,
            Some("info") => match positional.next() {
                Some(path) => Command::Info { path: PathBuf::from(path) },
                None => return Err(ArgsError("info needs a path".to_string())),
            },
            Some("watch") => Command::Watch,
            Some(other) => return Err(ArgsError(format!("unknown command {}", other))),
        };

        if let Some(extra) = positional.next() {
            return Err(ArgsError(format!("unexpected argument {}", extra)));
        }

        Ok(Self { config, root, command })
    }
}

fn value_of(flag: &str, value: Option<String>) -> Result<String, ArgsError> {
    value.ok_or_else(|| ArgsError(format!("{} needs a value", flag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Args, ArgsError> {
        Args::parse(line.split_whitespace().map(String::from))
    }

    #[test]
    fn test_compile_with_flags() {
        let args = parse("--root assets compile a.png b.obj --force").unwrap();
        assert_eq!(args.root, Some(PathBuf::from("assets")));
        assert_eq!(
            args.command,
            Command::Compile {
                paths: vec![PathBuf::from("a.png"), PathBuf::from("b.obj")],
                force: true,
                android: false,
            }
        );
    }

    #[test]
    fn test_build_android() {
        let args = parse("build --android -c pipeline.json").unwrap();
        assert_eq!(args.config, Some(PathBuf::from("pipeline.json")));
        assert_eq!(args.command, Command::Build { android: true });
    }

    #[test]
    fn test_defaults_to_help() {
        assert_eq!(parse("").unwrap().command, Command::Help);
        assert_eq!(parse("build -h").unwrap().command, Command::Help);
    }

    #[test]
    fn test_errors() {
        assert!(parse("compile").is_err());
        assert!(parse("info").is_err());
        assert!(parse("frobnicate").is_err());
        assert!(parse("clean extra").is_err());
        assert!(parse("build --verbose").is_err());
        assert!(parse("build --root").is_err());
    }
}
