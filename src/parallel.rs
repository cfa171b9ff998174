//! Multi-threaded processing of whole sequences
//!
//! Handles are never shared between threads. Every worker opens its own handle on
//! the same path, which only reads the header and the index, and then decodes its
//! share of the sequences independently.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use crate::error::{Result, UnsupportedError};
use crate::twobit::TwoBitFile;

/// Trait for twoBit readers that can process sequences in parallel
///
/// This is implemented by the **reader** not by the **processor**.
/// For the **processor**, see the [`ParallelProcessor`] trait.
pub trait ParallelReader {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()>;
}

/// Trait for types that can process sequences in parallel.
///
/// This is implemented by the **processor** not by the **reader**.
/// For the **reader**, see the [`ParallelReader`] trait.
pub trait ParallelProcessor: Send + Clone {
    /// Process a single decoded sequence
    ///
    /// Sequences are decoded with soft-masking applied.
    fn process_sequence(&mut self, name: &str, sequence: &[u8]) -> Result<()>;

    /// Called when a thread finishes processing its batch
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each thread should call this method with its own unique ID.
    #[allow(unused_variables)]
    fn set_tid(&mut self, tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

impl TwoBitFile<BufReader<File>> {
    /// Processes the named sequences in parallel
    ///
    /// Works with both the in-file directory and an external index, since the
    /// names are supplied by the caller. Names are split into contiguous batches,
    /// one per thread.
    ///
    /// # Arguments
    ///
    /// * `processor` - Cloned once per thread
    /// * `num_threads` - Number of threads to spawn; zero uses every core
    /// * `names` - Sequences to process
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any worker, including a missing sequence
    /// or an error raised by the processor.
    pub fn process_parallel_names<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        names: Vec<String>,
    ) -> Result<()> {
        let Some(path) = self.path().map(std::path::Path::to_path_buf) else {
            return Err(UnsupportedError::MissingPath {
                file: self.source().to_string(),
            }
            .into());
        };
        let index_path = self.index_path().map(std::path::Path::to_path_buf);

        // Calculate the number of threads to use
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        };
        if names.is_empty() {
            return Ok(());
        }
        let names_per_thread = names.len().div_ceil(num_threads);
        let names = Arc::new(names);
        log::debug!(
            "processing {} sequences from {} on {num_threads} threads",
            names.len(),
            path.display()
        );

        let mut handles = Vec::new();
        for tid in 0..num_threads {
            let mut processor = processor.clone();
            let names = names.clone();
            let path = path.clone();
            let index_path = index_path.clone();
            processor.set_tid(tid);

            let handle = std::thread::spawn(move || -> Result<()> {
                let start_idx = tid * names_per_thread;
                let end_idx = (start_idx + names_per_thread).min(names.len());
                if start_idx >= end_idx {
                    return Ok(()); // No sequences for this thread
                }

                let mut file = match &index_path {
                    Some(index_path) => TwoBitFile::open_with_external_index(&path, index_path)?,
                    None => TwoBitFile::open(&path)?,
                };
                for name in &names[start_idx..end_idx] {
                    let sequence = file.read_fragment(name, 0, 0, true)?;
                    processor.process_sequence(name, &sequence)?;
                }
                processor.on_batch_complete()?;
                Ok(())
            });
            handles.push(handle);
        }

        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("sequence processing thread panicked"))??;
        }
        Ok(())
    }
}

impl ParallelReader for TwoBitFile<BufReader<File>> {
    /// Processes every sequence of a file opened with its in-file directory
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let names = self.sequence_names()?;
        self.process_parallel_names(processor, num_threads, names)
    }
}

#[cfg(test)]
mod testing {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;
    use crate::twobit::TwoBitWriterBuilder;
    use crate::Error;

    #[derive(Clone, Default)]
    struct GcCounter {
        tid: Option<usize>,
        local: HashMap<String, (usize, usize)>,
        global: Arc<Mutex<HashMap<String, (usize, usize)>>>,
        batches: Arc<Mutex<usize>>,
    }
    impl ParallelProcessor for GcCounter {
        fn process_sequence(&mut self, name: &str, sequence: &[u8]) -> Result<()> {
            let gc = sequence
                .iter()
                .filter(|b| matches!(b, b'G' | b'C' | b'g' | b'c'))
                .count();
            self.local.insert(name.to_string(), (gc, sequence.len()));
            Ok(())
        }

        fn on_batch_complete(&mut self) -> Result<()> {
            self.global.lock().extend(self.local.drain());
            *self.batches.lock() += 1;
            Ok(())
        }

        fn set_tid(&mut self, tid: usize) {
            self.tid = Some(tid);
        }

        fn get_tid(&self) -> Option<usize> {
            self.tid
        }
    }

    fn write_genome(dir: &std::path::Path) -> Result<std::path::PathBuf> {
        let mut writer = TwoBitWriterBuilder::default().build();
        for i in 0..25 {
            let seq: Vec<u8> = b"GCAT".iter().copied().cycle().take(10 + i).collect();
            writer.add_sequence(&format!("contig{i}"), &seq)?;
        }
        let path = dir.join("genome.2bit");
        writer.write_to_path(&path)?;
        writer.write_bpt_index_to_path(dir.join("genome.2bit.bpt"))?;
        Ok(path)
    }

    #[test]
    fn test_process_all_sequences() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_genome(dir.path())?;
        let processor = GcCounter::default();
        TwoBitFile::open(&path)?.process_parallel(processor.clone(), 4)?;

        let counts = processor.global.lock();
        assert_eq!(counts.len(), 25);
        for i in 0..25 {
            let len = 10 + i;
            // GCAT repeats: G and C are the first two of every four bases
            let expected_gc = (len / 4) * 2 + (len % 4).min(2);
            assert_eq!(counts[&format!("contig{i}")], (expected_gc, len));
        }
        assert!(*processor.batches.lock() >= 1);
        Ok(())
    }

    #[test]
    fn test_external_index_with_explicit_names() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_genome(dir.path())?;
        let file = TwoBitFile::open_with_external_index(&path, dir.path().join("genome.2bit.bpt"))?;
        assert!(matches!(
            file.sequence_names(),
            Err(Error::UnsupportedError(_))
        ));

        let processor = GcCounter::default();
        let names = vec!["contig3".to_string(), "contig20".to_string()];
        file.process_parallel_names(processor.clone(), 2, names)?;
        let counts = processor.global.lock();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["contig20"].1, 30);
        Ok(())
    }

    #[test]
    fn test_missing_sequence_propagates() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_genome(dir.path())?;
        let result = TwoBitFile::open(&path)?.process_parallel_names(
            GcCounter::default(),
            2,
            vec!["contig1".to_string(), "nope".to_string()],
        );
        assert!(matches!(result, Err(Error::NotFoundError(_))));
        Ok(())
    }
}
