//! The two-phase batch driver
//!
//! Phase 1 extracts every file independently and merges the results into a
//! [`Registry`] in input order. The registry is then frozen and Phase 2
//! resolves all documentation against it.

use rayon::prelude::*;

use crate::config::ExtractorConfig;
use crate::diagnostic::{sort_diagnostics, Diagnostic};
use crate::doc::{DocExtractor, DocModel, FileExtract};
use crate::lexer::FileId;
use crate::registry::{Registry, RegistryError};

/// The result of a run, handed to a renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocOutput {
    pub model: DocModel,
    /// Sorted by file, position and message
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs extraction and resolution over a batch of in-memory sources
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: ExtractorConfig,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Run both phases over `(file name, source text)` pairs.
    ///
    /// Files get ids in input order.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if a file cannot be registered.
    #[tracing::instrument(level = "debug", skip_all, fields(files = inputs.len()))]
    pub fn run<N, S>(&self, inputs: &[(N, S)]) -> Result<DocOutput, RegistryError>
    where
        N: AsRef<str> + Sync,
        S: AsRef<str> + Sync,
    {
        match self.thread_pool() {
            Some(pool) => pool.install(|| self.run_phases(inputs)),
            None => self.run_phases(inputs),
        }
    }

    /// Phase 1 only: extract every file and merge into a registry.
    ///
    /// The returned registry is not frozen yet.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if a file cannot be registered.
    pub fn register<N, S>(&self, inputs: &[(N, S)]) -> Result<Registry, RegistryError>
    where
        N: AsRef<str> + Sync,
        S: AsRef<str> + Sync,
    {
        let extractor = DocExtractor::new(&self.config);
        let extract = |(i, (name, source)): (usize, &(N, S))| -> FileExtract {
            let file = FileId(u32::try_from(i).unwrap_or(u32::MAX));
            extractor.extract(file, name.as_ref(), source.as_ref())
        };
        let extracts: Vec<FileExtract> = if self.config.parallel {
            inputs.par_iter().enumerate().map(extract).collect()
        } else {
            inputs.iter().enumerate().map(extract).collect()
        };

        let mut registry = Registry::new();
        for extract in extracts {
            registry.register_file(extract)?;
        }
        tracing::debug!(
            symbols = registry.symbols().len(),
            groups = registry.groups().len(),
            "registration complete"
        );
        Ok(registry)
    }

    fn run_phases<N, S>(&self, inputs: &[(N, S)]) -> Result<DocOutput, RegistryError>
    where
        N: AsRef<str> + Sync,
        S: AsRef<str> + Sync,
    {
        let mut registry = self.register(inputs)?;
        registry.freeze();

        let (model, resolved) =
            DocModel::assemble(&registry, self.config.autobrief, self.config.parallel)?;
        let mut diagnostics = registry.diagnostics().to_vec();
        diagnostics.extend(resolved);
        sort_diagnostics(&mut diagnostics);

        Ok(DocOutput { model, diagnostics })
    }

    fn thread_pool(&self) -> Option<rayon::ThreadPool> {
        let threads = self.config.threads.filter(|_| self.config.parallel)?;
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Some(pool),
            Err(err) => {
                tracing::warn!(threads, error = %err, "failed to build thread pool, using the global pool");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Category;
    use crate::symbol::{KindFilter, SymbolKind};

    #[test]
    fn test_register_leaves_registry_open() {
        let pipeline = Pipeline::default();
        let registry = pipeline
            .register(&[("a.h", "/** A. */\nint a(void);\n")])
            .unwrap();
        assert!(!registry.is_frozen());
        assert_eq!(
            registry.symbols().lookup("a", KindFilter::Any).unwrap_err(),
            RegistryError::NotFrozen
        );
    }

    #[test]
    fn test_reference_to_later_file() {
        let inputs = [
            ("first.h", "/** Calls later(). */\nint first(void);\n"),
            ("second.h", "/** Later. */\nint later(void);\n"),
        ];
        let output = Pipeline::default().run(&inputs).unwrap();
        let first = output.model.symbol("first", SymbolKind::Function).unwrap();
        let later = output.model.symbol("later", SymbolKind::Function).unwrap();
        let reference = first.doc().unwrap().brief.as_ref().unwrap().references().next().unwrap();
        assert_eq!(reference.resolution.symbol(), Some(later.id));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_dedicated_pool() {
        let config = ExtractorConfig::default().with_threads(2);
        let inputs = [("a.h", "/** See ::missing. */\nint a(void);\n")];
        let output = Pipeline::new(config).run(&inputs).unwrap();
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].category(), Category::ReferenceUnresolved);
    }

    #[test]
    fn test_sequential_run() {
        let config = ExtractorConfig::default().with_parallel(false);
        let inputs = [("a.h", "/** A. */\nint a(void);\n")];
        let output = Pipeline::new(config).run(&inputs).unwrap();
        assert_eq!(output.model.symbols.len(), 1);
    }
}
