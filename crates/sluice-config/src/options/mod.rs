//! Typed option catalog shared by the command line, the key-file and the
//! remote document.
//!
//! Every registered option owns one slot holding its current value and the
//! [`OptionSource`] that last wrote it. Command-line parsing happens in two
//! passes over the same registry: a tolerant pass that leaves unknown tokens
//! behind for options registered later, and a strict pass that rejects
//! whatever is still left.

mod descriptor;
mod parse;
mod value;


use std::collections::HashMap;
use std::fmt;

pub use descriptor::{OptionDescriptor, OptionGroup};
pub use value::{OptionKind, OptionSource, OptionValue};
pub(crate) use value::split_list;

use crate::error::OptionError;

#[derive(Debug)]
struct Slot {
    descriptor: OptionDescriptor,
    value: Option<OptionValue>,
    source: OptionSource,
}

/// Registry of named, typed options.
#[derive(Debug, Default)]
pub struct OptionRegistry {
    slots: Vec<Slot>,
    by_name: HashMap<String, usize>,
    by_short: HashMap<char, usize>,
}

impl OptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`OptionError::DuplicateOption`] when the long name is taken,
    /// [`OptionError::DuplicateShortFlag`] when the short flag is taken, and
    /// [`OptionError::DefaultKind`] when the default does not match the kind.
    pub fn register(&mut self, descriptor: OptionDescriptor) -> Result<(), OptionError> {
        if self.by_name.contains_key(descriptor.name()) {
            return Err(OptionError::DuplicateOption {
                name: descriptor.name().to_owned(),
            });
        }
        if let Some(short) = descriptor.short()
            && self.by_short.contains_key(&short)
        {
            return Err(OptionError::DuplicateShortFlag {
                short,
                name: descriptor.name().to_owned(),
            });
        }
        if let Some(default) = descriptor.default_value()
            && default.kind() != descriptor.kind()
        {
            return Err(OptionError::DefaultKind {
                name: descriptor.name().to_owned(),
                expected: descriptor.kind(),
            });
        }

        let index = self.slots.len();
        self.by_name.insert(descriptor.name().to_owned(), index);
        if let Some(short) = descriptor.short() {
            self.by_short.insert(short, index);
        }
        self.slots.push(Slot {
            descriptor,
            value: None,
            source: OptionSource::Default,
        });
        Ok(())
    }

    /// Registers every descriptor in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Propagates the first [`OptionRegistry::register`] failure.
    pub fn register_all(
        &mut self,
        descriptors: impl IntoIterator<Item = OptionDescriptor>,
    ) -> Result<(), OptionError> {
        descriptors
            .into_iter()
            .try_for_each(|descriptor| self.register(descriptor))
    }

    /// Number of registered options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when no option is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Looks up the descriptor registered under `name`.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&OptionDescriptor> {
        self.slot(name).map(|slot| &slot.descriptor)
    }

    /// Iterates over the registered descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &OptionDescriptor> {
        self.slots.iter().map(|slot| &slot.descriptor)
    }

    /// Writes `value` into the slot for `name` when `source` has at least
    /// the priority of the slot's current source.
    ///
    /// Returns whether the slot was written.
    ///
    /// # Errors
    ///
    /// Fails when `name` is not registered or `value` has the wrong kind.
    pub fn apply(
        &mut self,
        name: &str,
        value: OptionValue,
        source: OptionSource,
    ) -> Result<bool, OptionError> {
        let slot = self.slot_mut(name)?;
        if value.kind() != slot.descriptor.kind() {
            return Err(OptionError::KindMismatch {
                name: name.to_owned(),
                expected: value.kind(),
                actual: slot.descriptor.kind(),
            });
        }
        if source < slot.source {
            return Ok(false);
        }
        slot.value = Some(value);
        slot.source = source;
        Ok(true)
    }

    /// Current value of `name`, falling back to its default.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&OptionValue> {
        self.slot(name)
            .and_then(|slot| slot.value.as_ref().or(slot.descriptor.default_value()))
    }

    /// Source of the current value of `name`.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<OptionSource> {
        self.slot(name).map(|slot| slot.source)
    }

    /// Returns `true` when `name` was written by any source.
    #[must_use]
    pub fn is_explicit(&self, name: &str) -> bool {
        self.source(name)
            .is_some_and(|source| source != OptionSource::Default)
    }

    /// Reads a flag option.
    ///
    /// # Errors
    ///
    /// Fails when `name` is not registered or is not a flag.
    pub fn flag(&self, name: &str) -> Result<bool, OptionError> {
        match self.typed(name, OptionKind::Flag)? {
            Some(OptionValue::Flag(value)) => Ok(*value),
            _ => Ok(false),
        }
    }

    /// Reads an integer option.
    ///
    /// # Errors
    ///
    /// Fails when `name` is not registered or is not an integer.
    pub fn int(&self, name: &str) -> Result<Option<i64>, OptionError> {
        match self.typed(name, OptionKind::Int)? {
            Some(OptionValue::Int(value)) => Ok(Some(*value)),
            _ => Ok(None),
        }
    }

    /// Reads a double option.
    ///
    /// # Errors
    ///
    /// Fails when `name` is not registered or is not a double.
    pub fn double(&self, name: &str) -> Result<Option<f64>, OptionError> {
        match self.typed(name, OptionKind::Double)? {
            Some(OptionValue::Double(value)) => Ok(Some(*value)),
            _ => Ok(None),
        }
    }

    /// Reads a string option.
    ///
    /// # Errors
    ///
    /// Fails when `name` is not registered or is not a string.
    pub fn string(&self, name: &str) -> Result<Option<&str>, OptionError> {
        match self.typed(name, OptionKind::String)? {
            Some(OptionValue::String(value)) => Ok(Some(value.as_str())),
            _ => Ok(None),
        }
    }

    /// Reads a string-list option.
    ///
    /// # Errors
    ///
    /// Fails when `name` is not registered or is not a string list.
    pub fn string_list(&self, name: &str) -> Result<&[String], OptionError> {
        match self.typed(name, OptionKind::StringList)? {
            Some(OptionValue::StringList(values)) => Ok(values.as_slice()),
            _ => Ok(&[]),
        }
    }

    /// Renders usage text grouped by visibility group.
    #[must_use]
    pub fn help(&self, program: &str) -> String {
        Help {
            registry: self,
            program,
        }
        .to_string()
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.by_name
            .get(name)
            .and_then(|index| self.slots.get(*index))
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut Slot, OptionError> {
        self.by_name
            .get(name)
            .copied()
            .and_then(|index| self.slots.get_mut(index))
            .ok_or_else(|| OptionError::NotRegistered {
                name: name.to_owned(),
            })
    }

    fn typed(&self, name: &str, expected: OptionKind) -> Result<Option<&OptionValue>, OptionError> {
        let slot = self.slot(name).ok_or_else(|| OptionError::NotRegistered {
            name: name.to_owned(),
        })?;
        if slot.descriptor.kind() != expected {
            return Err(OptionError::KindMismatch {
                name: name.to_owned(),
                expected,
                actual: slot.descriptor.kind(),
            });
        }
        Ok(slot.value.as_ref().or(slot.descriptor.default_value()))
    }
}

/// Usage text for a registry, grouped by visibility group.
struct Help<'a> {
    registry: &'a OptionRegistry,
    program: &'a str,
}

impl fmt::Display for Help<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Usage:\n  {} [OPTION...]", self.program)?;
        let slots = &self.registry.slots;
        let mut groups: Vec<&OptionGroup> = Vec::new();
        for slot in slots {
            let group = slot.descriptor.group();
            if group.is_visible() && !groups.contains(&group) {
                groups.push(group);
            }
        }
        for group in groups {
            write!(f, "\n{}:\n", group.title())?;
            for slot in slots.iter().filter(|slot| slot.descriptor.group() == group) {
                writeln!(f, "  {}", slot.descriptor.usage_line())?;
            }
        }
        Ok(())
    }
}
