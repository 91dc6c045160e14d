use super::value::{OptionKind, OptionValue};

/// Visibility group an option is listed under in help output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionGroup {
    /// Options understood before anything else is loaded.
    Base,
    /// Daemon options.
    Core,
    /// Options contributed by the named plugin.
    Plugin(String),
    /// Accepted but not listed.
    Hidden,
}

impl OptionGroup {
    pub(crate) const fn is_visible(&self) -> bool {
        !matches!(self, Self::Hidden)
    }

    pub(crate) fn title(&self) -> String {
        match self {
            Self::Base => "Base options".to_owned(),
            Self::Core => "Daemon options".to_owned(),
            Self::Plugin(name) => format!("{name} plugin options"),
            Self::Hidden => "Hidden options".to_owned(),
        }
    }
}

/// Declaration of a single option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDescriptor {
    name: String,
    short: Option<char>,
    kind: OptionKind,
    default: Option<OptionValue>,
    help: String,
    value_hint: Option<String>,
    group: OptionGroup,
}

impl OptionDescriptor {
    /// Declares a core option without a short flag or default.
    pub fn new(name: impl Into<String>, kind: OptionKind, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short: None,
            kind,
            default: None,
            help: help.into(),
            value_hint: None,
            group: OptionGroup::Core,
        }
    }

    /// Adds a short flag.
    #[must_use]
    pub const fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Sets the compiled-in default.
    #[must_use]
    pub fn with_default(mut self, default: OptionValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Names the value in help output, for example `<file>`.
    #[must_use]
    pub fn with_value_hint(mut self, hint: impl Into<String>) -> Self {
        self.value_hint = Some(hint.into());
        self
    }

    /// Places the option in `group`.
    #[must_use]
    pub fn in_group(mut self, group: OptionGroup) -> Self {
        self.group = group;
        self
    }

    /// Long option name, without leading dashes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Short flag, if any.
    #[must_use]
    pub const fn short(&self) -> Option<char> {
        self.short
    }

    /// Argument kind.
    #[must_use]
    pub const fn kind(&self) -> OptionKind {
        self.kind
    }

    /// Compiled-in default.
    #[must_use]
    pub const fn default_value(&self) -> Option<&OptionValue> {
        self.default.as_ref()
    }

    /// Help text.
    #[must_use]
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Visibility group.
    #[must_use]
    pub const fn group(&self) -> &OptionGroup {
        &self.group
    }

    pub(crate) fn usage_line(&self) -> String {
        let mut line = match self.short {
            Some(short) => format!("-{short}, --{}", self.name),
            None => format!("--{}", self.name),
        };
        if self.kind.takes_value() {
            line.push('=');
            line.push_str(self.value_hint.as_deref().unwrap_or("<value>"));
        }
        if line.len() < 40 {
            line.push_str(&" ".repeat(40 - line.len()));
        } else {
            line.push(' ');
        }
        line.push_str(&self.help);
        if let Some(default) = &self.default
            && self.kind.takes_value()
        {
            line.push_str(&format!(" (default: {default})"));
        }
        line
    }
}
