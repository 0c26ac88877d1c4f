// system configuration and command line processing

use std::path::PathBuf;

use argh::FromArgs;
use tracing::Level;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(FromArgs)]
/// command line arguments for cellforth.
pub struct Config {
    /// load a Forth source file at startup.
    #[argh(option, short = 'f')]
    pub file: Option<PathBuf>,

    /// file used by SAVE-SNAP and LOAD-SNAP.
    #[argh(option, short = 's')]
    pub snapshot: Option<PathBuf>,

    /// restore the snapshot file at startup.
    #[argh(switch, short = 'r')]
    pub restore: bool,

    /// read plain lines from stdin instead of using the line editor.
    #[argh(switch, short = 'p')]
    pub plain: bool,

    /// log level for diagnostics on stderr (error, warn, info, debug, trace).
    #[argh(option, short = 'l', default = "Level::WARN")]
    pub log_level: Level,

    /// don't print the banner.
    #[argh(switch, short = 'q')]
    pub quiet: bool,
}

impl Config {
    pub fn from_env() -> Config {
        argh::from_env()
    }
}

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_args(&["cellforth"], &[]).unwrap();
        assert!(config.file.is_none());
        assert!(!config.restore);
        assert_eq!(config.log_level, Level::WARN);
    }

    #[test]
    fn test_flags() {
        let config = Config::from_args(
            &["cellforth"],
            &["-f", "boot.fs", "-s", "image.snap", "-r", "-p", "-l", "debug", "-q"],
        )
        .unwrap();
        assert_eq!(config.file, Some(PathBuf::from("boot.fs")));
        assert_eq!(config.snapshot, Some(PathBuf::from("image.snap")));
        assert!(config.restore && config.plain && config.quiet);
        assert_eq!(config.log_level, Level::DEBUG);
    }
}
