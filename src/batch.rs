//! Batch normalization across every function of a source

use std::time::Instant;
use rayon::prelude::*;

use crate::{
    DatasetSink, DisassemblySource, FunctionId, NormalizedDataset, NormalizedFunction,
    RebaseError,
};
use crate::rebase::rebase;
use crate::resolve::{CompiledDialect, Dialect};

/// Drives the function rebaser over all functions a source exposes.
#[derive(Debug, Clone, Default)]
pub struct BatchNormalizer {
    dialect: CompiledDialect,
    parallel: bool,
}

impl BatchNormalizer {
    /// Normalizer using the default dialect, processing functions sequentially
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer for a custom dialect
    pub fn with_dialect(dialect: &Dialect) -> Result<Self, RebaseError> {
        Ok(Self {
            dialect: dialect.compile()?,
            parallel: false,
        })
    }

    /// Process functions on the rayon thread pool. Output order is unchanged.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Normalize every function of `source`, in its enumeration order.
    ///
    /// # Returns
    /// The complete dataset, or the first source/ingestion error
    pub fn run(&self, source: &dyn DisassemblySource) -> Result<NormalizedDataset, RebaseError> {
        let start_time = Instant::now();
        let ids = source.functions()?;

        log::info!(
            "Normalizing {} functions ({})",
            ids.len(),
            if self.parallel { "parallel" } else { "sequential" }
        );

        let functions: Vec<NormalizedFunction> = if self.parallel {
            ids.par_iter()
                .map(|&id| self.normalize_one(source, id))
                .collect::<Result<_, _>>()?
        } else {
            ids.iter()
                .map(|&id| self.normalize_one(source, id))
                .collect::<Result<_, _>>()?
        };

        let dataset = NormalizedDataset::new(functions);
        log::info!(
            "Normalized {} functions ({} instructions) in {:?}",
            dataset.len(),
            dataset.instruction_count(),
            start_time.elapsed()
        );

        Ok(dataset)
    }

    /// Normalize `source` and hand the finished dataset to `sink` once.
    ///
    /// Nothing reaches the sink if any function fails.
    pub fn run_into(
        &self,
        source: &dyn DisassemblySource,
        sink: &mut dyn DatasetSink,
    ) -> Result<NormalizedDataset, RebaseError> {
        let dataset = self.run(source)?;
        sink.persist(&dataset)?;
        Ok(dataset)
    }

    fn normalize_one(
        &self,
        source: &dyn DisassemblySource,
        id: FunctionId,
    ) -> Result<NormalizedFunction, RebaseError> {
        log::debug!("Function 0x{:x}", id);
        let instructions = source.instructions(id)?;
        rebase(&instructions, &self.dialect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FunctionListing, Instruction};
    use crate::source::ListingSource;

    /// Sink that records what it was given
    #[derive(Default)]
    struct RecordingSink {
        persisted: Vec<NormalizedDataset>,
    }

    impl DatasetSink for RecordingSink {
        fn persist(&mut self, dataset: &NormalizedDataset) -> Result<(), RebaseError> {
            self.persisted.push(dataset.clone());
            Ok(())
        }
    }

    /// Source whose instruction lookup fails for one function
    struct FlakySource {
        inner: ListingSource,
        broken: FunctionId,
    }

    impl DisassemblySource for FlakySource {
        fn functions(&self) -> Result<Vec<FunctionId>, RebaseError> {
            self.inner.functions()
        }

        fn instructions(&self, function: FunctionId) -> Result<Vec<Instruction>, RebaseError> {
            if function == self.broken {
                return Err(RebaseError::Source(format!("cannot read 0x{:x}", function)));
            }
            self.inner.instructions(function)
        }
    }

    fn sample_source(count: u64) -> ListingSource {
        // Entries deliberately not sorted: enumeration order must win
        let functions = (0..count)
            .rev()
            .map(|i| {
                let base = 0x1000 * (i + 1);
                FunctionListing::new(
                    base,
                    vec![
                        Instruction::new(base + 4, format!("jz loc_{:x}", base)),
                        Instruction::new(base, format!("cmp eax, {}", i)),
                        Instruction::new(base + 6, "retn"),
                    ],
                )
            })
            .collect();
        ListingSource::new(functions).unwrap()
    }

    #[test]
    fn test_enumeration_order_preserved() {
        let source = sample_source(4);
        let dataset = BatchNormalizer::new().run(&source).unwrap();

        assert_eq!(dataset.len(), 4);
        let firsts: Vec<&str> = dataset
            .functions()
            .iter()
            .map(|f| f.get(1).unwrap())
            .collect();
        assert_eq!(firsts, vec!["cmp eax, 3", "cmp eax, 2", "cmp eax, 1", "cmp eax, 0"]);
        for func in dataset.functions() {
            assert_eq!(func.get(2), Some("jz INSTR2"));
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let source = sample_source(64);
        let sequential = BatchNormalizer::new().run(&source).unwrap();
        let parallel = BatchNormalizer::new().parallel(true).run(&source).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_sink_receives_dataset_once() {
        let source = sample_source(3);
        let mut sink = RecordingSink::default();

        let dataset = BatchNormalizer::new().run_into(&source, &mut sink).unwrap();

        assert_eq!(sink.persisted.len(), 1);
        assert_eq!(sink.persisted[0], dataset);
    }

    #[test]
    fn test_source_failure_writes_nothing() {
        let source = FlakySource {
            inner: sample_source(3),
            broken: 0x2000,
        };
        let mut sink = RecordingSink::default();

        let err = BatchNormalizer::new().run_into(&source, &mut sink).unwrap_err();

        assert!(matches!(err, RebaseError::Source(_)));
        assert!(sink.persisted.is_empty());
    }

    #[test]
    fn test_empty_source() {
        let source = ListingSource::new(Vec::new()).unwrap();
        let dataset = BatchNormalizer::new().run(&source).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_custom_dialect() {
        let dialect = Dialect {
            branch_prefixes: vec!["b".to_string()],
            ..Dialect::default()
        };
        let source = ListingSource::new(vec![FunctionListing::new(
            0,
            vec![
                Instruction::new(0, "nop"),
                Instruction::new(4, "b loc_0"),
                Instruction::new(8, "jmp loc_0"),
            ],
        )])
        .unwrap();

        let dataset = BatchNormalizer::with_dialect(&dialect)
            .unwrap()
            .run(&source)
            .unwrap();

        let func = &dataset.functions()[0];
        assert_eq!(func.get(2), Some("b INSTR2"));
        // 'j' is no longer a branch prefix
        assert_eq!(func.get(3), Some("jmp loc_0"));
    }
}
