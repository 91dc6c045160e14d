use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Severity threshold accepted by `--log-level`.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Critical conditions; applied when no level is configured.
    #[default]
    Critical,
    /// Warnings and above.
    Warning,
    /// Informational messages and above.
    Message,
    /// Alias of [`LogLevel::Message`].
    Info,
    /// Everything, including debug output.
    Debug,
}

/// Errors encountered while parsing a [`LogLevel`] from text.
pub type LogLevelParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("error", LogLevel::Error)]
    #[case("CRITICAL", LogLevel::Critical)]
    #[case("warning", LogLevel::Warning)]
    #[case("message", LogLevel::Message)]
    #[case("Info", LogLevel::Info)]
    #[case("debug", LogLevel::Debug)]
    fn parses_level_names(#[case] text: &str, #[case] expected: LogLevel) {
        assert_eq!(text.parse::<LogLevel>().expect("level"), expected);
    }

    #[rstest]
    fn unknown_level_is_rejected() {
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[rstest]
    fn unset_level_is_critical() {
        assert_eq!(LogLevel::default(), LogLevel::Critical);
    }
}
