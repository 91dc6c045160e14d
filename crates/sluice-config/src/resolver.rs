//! Merges the command line, the key-file and the remote document.

use std::ffi::OsString;

use camino::Utf8PathBuf;

use crate::catalog::{names, register_base_options, register_core_options};
use crate::document::ConfigDocument;
use crate::error::{ConfigError, OptionError};
use crate::options::{OptionDescriptor, OptionRegistry, OptionSource};
use crate::raw::RawConfig;
use crate::remote::RemoteSource;

const DEFAULT_PROGRAM: &str = "sluiced";

/// Drives the two-pass command-line parse around the file-based sources.
///
/// The tolerant pass runs first so explicitly given options are marked as
/// set. The key-file and remote document then fill slots that are still
/// unset, and once plugins have registered their options the documents are
/// re-applied and the strict pass rejects whatever is left.
#[derive(Debug)]
pub struct ConfigurationResolver {
    program: String,
    args: Vec<String>,
    registry: OptionRegistry,
    documents: Vec<(ConfigDocument, OptionSource)>,
}

impl ConfigurationResolver {
    /// Registers the base and daemon options for `args`, whose first item
    /// is the program name.
    ///
    /// # Errors
    ///
    /// Fails when an argument is not UTF-8.
    pub fn new<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut tokens = args.into_iter().map(|arg| {
            arg.into_string().map_err(|arg| OptionError::NonUtf8Argument {
                lossy: arg.to_string_lossy().into_owned(),
            })
        });
        let program = tokens
            .next()
            .transpose()?
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_owned());
        let args = tokens.collect::<Result<Vec<_>, _>>()?;

        let mut registry = OptionRegistry::new();
        register_base_options(&mut registry)?;
        register_core_options(&mut registry)?;
        Ok(Self {
            program,
            args,
            registry,
            documents: Vec::new(),
        })
    }

    /// Runs every phase without plugin options and returns the raw values.
    ///
    /// # Errors
    ///
    /// Propagates the first failing phase.
    pub fn resolve<I>(args: I, remote: &dyn RemoteSource) -> Result<RawConfig, ConfigError>
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut resolver = Self::new(args)?;
        resolver.parse_tolerant()?;
        resolver.load_sources(remote)?;
        resolver.parse_strict()?;
        resolver.raw_config()
    }

    /// Consumes every recognised option, leaving unknown tokens for later.
    ///
    /// # Errors
    ///
    /// Fails on malformed values.
    pub fn parse_tolerant(&mut self) -> Result<(), ConfigError> {
        Ok(self.registry.parse(&mut self.args, false)?)
    }

    /// Applies the key-file named by `--defaults-file` and then the document
    /// named by `remote-conf-url`, each only to slots still unset.
    ///
    /// # Errors
    ///
    /// Fails when either document cannot be read, fetched or applied.
    pub fn load_sources(&mut self, remote: &dyn RemoteSource) -> Result<(), ConfigError> {
        if let Some(path) = self.registry.string(names::DEFAULTS_FILE)? {
            let document = ConfigDocument::load(&Utf8PathBuf::from(path))?;
            document.apply_to(&mut self.registry, OptionSource::KeyFile)?;
            self.documents.push((document, OptionSource::KeyFile));
        }
        if let Some(url) = self.registry.string(names::REMOTE_CONF_URL)? {
            let document = remote.load(url)?;
            document.apply_to(&mut self.registry, OptionSource::Remote)?;
            self.documents.push((document, OptionSource::Remote));
        }
        Ok(())
    }

    /// Registers plugin-contributed options and re-applies the documents so
    /// the new options pick up file-based values.
    ///
    /// # Errors
    ///
    /// Fails when an option name is taken or a document value has the wrong
    /// type for a newly registered option.
    pub fn register_plugin_options(
        &mut self,
        descriptors: Vec<OptionDescriptor>,
    ) -> Result<usize, ConfigError> {
        let added = descriptors.len();
        self.registry.register_all(descriptors)?;
        for (document, source) in &self.documents {
            document.apply_to(&mut self.registry, *source)?;
        }
        Ok(added)
    }

    /// Parses the leftover tokens, rejecting any that match no option.
    ///
    /// # Errors
    ///
    /// Fails on unknown options, positional arguments and malformed values.
    pub fn parse_strict(&mut self) -> Result<(), ConfigError> {
        Ok(self.registry.parse(&mut self.args, true)?)
    }

    /// Reads the daemon options out of the registry.
    ///
    /// # Errors
    ///
    /// Fails when `log-level` names no known level.
    pub fn raw_config(&self) -> Result<RawConfig, ConfigError> {
        RawConfig::from_registry(&self.registry)
    }

    /// Document keys that match no registered option, as `(origin, key)`.
    #[must_use]
    pub fn unknown_document_keys(&self) -> Vec<(String, String)> {
        self.documents
            .iter()
            .flat_map(|(document, _)| {
                document
                    .unknown_keys(&self.registry)
                    .into_iter()
                    .map(move |key| (document.origin().to_owned(), key))
            })
            .collect()
    }

    /// Usage text for every registered option.
    #[must_use]
    pub fn help(&self) -> String {
        self.registry.help(&self.program)
    }

    /// Program name taken from the first argument.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &OptionRegistry {
        &self.registry
    }
}
