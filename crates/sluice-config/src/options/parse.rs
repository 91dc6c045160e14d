use std::mem;

use super::{OptionKind, OptionRegistry, OptionSource, OptionValue};
use crate::error::OptionError;

const END_OF_OPTIONS: &str = "--";

enum Token<'a> {
    Known { index: usize, inline: Option<&'a str> },
    Unrecognised,
}

impl OptionRegistry {
    /// Consumes recognised options from `args`, writing them into their
    /// slots with [`OptionSource::CommandLine`].
    ///
    /// `args` must not contain the program name. Unrecognised tokens are left
    /// in `args` in their original order. With `strict` set, any leftover
    /// token is an error instead. Everything after `--` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionError`] for malformed values, missing values, and
    /// (in strict mode) for leftover tokens. `args` is unspecified on error.
    pub fn parse(&mut self, args: &mut Vec<String>, strict: bool) -> Result<(), OptionError> {
        let tokens = mem::take(args);
        let mut remaining = Vec::new();
        let mut iter = tokens.into_iter();

        while let Some(token) = iter.next() {
            if token == END_OF_OPTIONS {
                remaining.push(token);
                remaining.extend(iter.by_ref());
                break;
            }
            match self.classify(&token) {
                Token::Known { index, inline } => {
                    let value = self.read_value(index, inline, &mut iter)?;
                    self.store_command_line(index, value);
                }
                Token::Unrecognised => remaining.push(token),
            }
        }

        if strict {
            reject_leftovers(&remaining)?;
        }
        *args = remaining;
        Ok(())
    }

    fn classify<'a>(&self, token: &'a str) -> Token<'a> {
        if let Some(body) = token.strip_prefix("--") {
            let (name, inline) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };
            return self
                .by_name
                .get(name)
                .map_or(Token::Unrecognised, |index| Token::Known {
                    index: *index,
                    inline,
                });
        }
        let mut chars = token.chars();
        if let (Some('-'), Some(short), None) = (chars.next(), chars.next(), chars.next()) {
            return self
                .by_short
                .get(&short)
                .map_or(Token::Unrecognised, |index| Token::Known {
                    index: *index,
                    inline: None,
                });
        }
        Token::Unrecognised
    }

    fn read_value(
        &self,
        index: usize,
        inline: Option<&str>,
        rest: &mut impl Iterator<Item = String>,
    ) -> Result<OptionValue, OptionError> {
        let Some(slot) = self.slots.get(index) else {
            return Err(OptionError::NotRegistered {
                name: format!("#{index}"),
            });
        };
        let descriptor = &slot.descriptor;
        let name = descriptor.name();
        match (descriptor.kind(), inline) {
            (OptionKind::Flag, None) => Ok(OptionValue::Flag(true)),
            (OptionKind::Flag, Some(_)) => Err(OptionError::UnexpectedValue {
                name: name.to_owned(),
            }),
            (kind, Some(text)) => kind.parse(name, text),
            (kind, None) => {
                let text = rest.next().ok_or_else(|| OptionError::MissingValue {
                    name: name.to_owned(),
                })?;
                kind.parse(name, &text)
            }
        }
    }

    fn store_command_line(&mut self, index: usize, value: OptionValue) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        let accumulate = slot.source == OptionSource::CommandLine;
        match (slot.value.as_mut(), value) {
            (Some(OptionValue::StringList(existing)), OptionValue::StringList(extra))
                if accumulate =>
            {
                existing.extend(extra);
            }
            (_, value) => slot.value = Some(value),
        }
        slot.source = OptionSource::CommandLine;
    }
}

fn reject_leftovers(remaining: &[String]) -> Result<(), OptionError> {
    let Some(token) = remaining
        .iter()
        .find(|token| token.as_str() != END_OF_OPTIONS)
    else {
        return Ok(());
    };
    if token.starts_with('-') && token.len() > 1 {
        Err(OptionError::UnknownOption {
            token: token.clone(),
        })
    } else {
        Err(OptionError::UnexpectedArgument {
            token: token.clone(),
        })
    }
}
