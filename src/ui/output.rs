//! Output verbosity.

use std::fmt;
use std::str::FromStr;

/// How much a command prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Status lines plus streamed engine output.
    Verbose,
    /// Status lines and spinners.
    #[default]
    Normal,
    /// Errors only.
    Quiet,
}

impl OutputMode {
    pub fn shows_status(&self) -> bool {
        matches!(self, Self::Verbose | Self::Normal)
    }

    pub fn shows_spinners(&self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Engine build and push output is echoed line by line.
    pub fn shows_engine_output(&self) -> bool {
        matches!(self, Self::Verbose)
    }

    /// Pick the mode from the `--verbose`/`--quiet` flags.
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Verbose => "verbose",
            Self::Normal => "normal",
            Self::Quiet => "quiet",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "verbose" => Ok(Self::Verbose),
            "normal" => Ok(Self::Normal),
            "quiet" => Ok(Self::Quiet),
            other => Err(format!("unknown output mode: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(OutputMode::from_flags(true, true), OutputMode::Quiet);
        assert_eq!(OutputMode::from_flags(true, false), OutputMode::Verbose);
        assert_eq!(OutputMode::from_flags(false, false), OutputMode::Normal);
    }

    #[test]
    fn visibility_per_mode() {
        assert!(OutputMode::Normal.shows_spinners());
        assert!(!OutputMode::Verbose.shows_spinners());
        assert!(OutputMode::Verbose.shows_engine_output());
        assert!(!OutputMode::Quiet.shows_status());
    }

    #[test]
    fn parses_names() {
        assert_eq!("Quiet".parse::<OutputMode>().unwrap(), OutputMode::Quiet);
        assert!("loud".parse::<OutputMode>().is_err());
        assert_eq!(OutputMode::Verbose.to_string(), "verbose");
    }
}
