use std::fmt;

use strum::Display;

use crate::error::OptionError;

/// Argument kind accepted by an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum OptionKind {
    /// Boolean switch without a value.
    Flag,
    /// Signed 64-bit integer.
    Int,
    /// Floating point number.
    Double,
    /// Free-form text.
    String,
    /// Comma separated list of strings.
    StringList,
}

impl OptionKind {
    /// Returns `true` when the option consumes a value on the command line.
    #[must_use]
    pub const fn takes_value(self) -> bool {
        !matches!(self, Self::Flag)
    }

    /// Parses command-line text into a value of this kind.
    ///
    /// # Errors
    ///
    /// Returns [`OptionError::InvalidValue`] when `text` does not parse.
    pub fn parse(self, name: &str, text: &str) -> Result<OptionValue, OptionError> {
        let invalid = || OptionError::InvalidValue {
            name: name.to_owned(),
            value: text.to_owned(),
            expected: self,
        };
        match self {
            Self::Flag => match text {
                "true" | "1" | "yes" => Ok(OptionValue::Flag(true)),
                "false" | "0" | "no" => Ok(OptionValue::Flag(false)),
                _ => Err(invalid()),
            },
            Self::Int => text
                .trim()
                .parse()
                .map(OptionValue::Int)
                .map_err(|_| invalid()),
            Self::Double => text
                .trim()
                .parse()
                .map(OptionValue::Double)
                .map_err(|_| invalid()),
            Self::String => Ok(OptionValue::String(text.to_owned())),
            Self::StringList => Ok(OptionValue::StringList(split_list(text))),
        }
    }
}

/// Splits a comma separated list, dropping empty items.
pub(crate) fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Value of a flag option.
    Flag(bool),
    /// Value of an integer option.
    Int(i64),
    /// Value of a double option.
    Double(f64),
    /// Value of a string option.
    String(String),
    /// Value of a string-list option.
    StringList(Vec<String>),
}

impl OptionValue {
    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> OptionKind {
        match self {
            Self::Flag(_) => OptionKind::Flag,
            Self::Int(_) => OptionKind::Int,
            Self::Double(_) => OptionKind::Double,
            Self::String(_) => OptionKind::String,
            Self::StringList(_) => OptionKind::StringList,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::StringList(values) => f.write_str(&values.join(",")),
        }
    }
}

/// Origin of an option's current value, ordered by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum OptionSource {
    /// Compiled-in default; the slot counts as unset.
    Default,
    /// Remote configuration document.
    Remote,
    /// Local key-file.
    KeyFile,
    /// Command line.
    CommandLine,
}
