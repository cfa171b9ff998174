//! FASTA import and export
//!
//! Import parses (optionally compressed) FASTA into a [`TwoBitWriter`]; the record
//! id, up to the first whitespace, becomes the sequence name. Export writes a
//! sequence, or a fragment of one, from an open [`TwoBitFile`].

use std::io::{Read, Seek, Write};
use std::path::Path;

use seq_io::fasta::{Reader, Record};

use super::reader::TwoBitFile;
use super::writer::TwoBitWriter;
use crate::error::Result;

/// Default number of bases per FASTA line
pub const DEFAULT_LINE_WIDTH: usize = 50;

impl TwoBitWriter {
    /// Adds every record of a FASTA stream
    ///
    /// Returns the number of sequences added.
    pub fn add_fasta<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut reader = Reader::new(reader);
        let mut added = 0;
        while let Some(record) = reader.next() {
            let record = record?;
            let name = record.id()?;
            self.add_sequence(name, &record.full_seq())?;
            added += 1;
        }
        log::debug!("imported {added} FASTA records");
        Ok(added)
    }

    /// Adds every record of a FASTA file, decompressing it if needed
    pub fn add_fasta_path<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let (reader, _format) = niffler::from_path(path)?;
        self.add_fasta(reader)
    }
}

/// Writes one FASTA record, wrapping the bases every `line_width` characters
///
/// A `line_width` of zero writes all bases on a single line.
pub fn write_fasta_record<W: Write>(
    writer: &mut W,
    header: &str,
    sequence: &[u8],
    line_width: usize,
) -> Result<()> {
    writeln!(writer, ">{header}")?;
    if line_width == 0 {
        writer.write_all(sequence)?;
        writer.write_all(b"\n")?;
        return Ok(());
    }
    for line in sequence.chunks(line_width) {
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

impl<R: Read + Seek> TwoBitFile<R> {
    /// Writes `[frag_start, frag_end)` of `name` as FASTA
    ///
    /// Whole sequences are headed by their name, fragments by `name:start-end`.
    pub fn write_fasta<W: Write>(
        &mut self,
        writer: &mut W,
        name: &str,
        frag_start: usize,
        frag_end: usize,
        do_mask: bool,
        line_width: usize,
    ) -> Result<()> {
        let bases = self.read_fragment(name, frag_start, frag_end, do_mask)?;
        let whole = (frag_start == 0 && frag_end == 0)
            || (frag_start == 0 && frag_end == self.sequence_size(name)? as usize);
        let header = if whole {
            name.to_string()
        } else {
            format!("{name}:{frag_start}-{frag_end}")
        };
        write_fasta_record(writer, &header, &bases, line_width)
    }

    /// Writes every sequence, in file order, as FASTA
    pub fn write_all_fasta<W: Write>(
        &mut self,
        writer: &mut W,
        do_mask: bool,
        line_width: usize,
    ) -> Result<()> {
        for name in self.sequence_names()? {
            self.write_fasta(writer, &name, 0, 0, do_mask, line_width)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use std::io::Cursor;

    use super::*;
    use crate::twobit::TwoBitWriterBuilder;
    use crate::Error;

    const FASTA: &[u8] = b">chr1 assembled\nACGTacgtNN\nNNacgtACGT\n>chrM\nGATTACA\n";

    fn roundtrip(fasta: &[u8]) -> Result<TwoBitFile<Cursor<Vec<u8>>>> {
        let mut writer = TwoBitWriterBuilder::default().build();
        writer.add_fasta(fasta)?;
        let mut bytes = Vec::new();
        writer.write(&mut bytes)?;
        TwoBitFile::new(Cursor::new(bytes))
    }

    #[test]
    fn test_import() -> Result<()> {
        let mut file = roundtrip(FASTA)?;
        assert_eq!(file.sequence_names()?, vec!["chr1", "chrM"]);
        assert_eq!(file.read_fragment("chr1", 0, 0, true)?, b"ACGTacgtNNNNacgtACGT");
        Ok(())
    }

    #[test]
    fn test_export_wraps_lines() -> Result<()> {
        let mut file = roundtrip(FASTA)?;
        let mut out = Vec::new();
        file.write_all_fasta(&mut out, true, 8)?;
        assert_eq!(
            out,
            b">chr1\nACGTacgt\nNNNNacgt\nACGT\n>chrM\nGATTACA\n".to_vec()
        );
        Ok(())
    }

    #[test]
    fn test_export_fragment_header() -> Result<()> {
        let mut file = roundtrip(FASTA)?;
        let mut out = Vec::new();
        file.write_fasta(&mut out, "chr1", 4, 12, false, DEFAULT_LINE_WIDTH)?;
        assert_eq!(out, b">chr1:4-12\nACGTNNNN\n".to_vec());

        out.clear();
        file.write_fasta(&mut out, "chrM", 0, 7, true, 0)?;
        assert_eq!(out, b">chrM\nGATTACA\n".to_vec());
        Ok(())
    }

    #[test]
    fn test_import_rejects_duplicates() {
        let mut writer = TwoBitWriterBuilder::default().build();
        let result = writer.add_fasta(&b">a\nACGT\n>a\nTTTT\n"[..]);
        assert!(matches!(result, Err(Error::FormatError(_))));
    }

    #[test]
    fn test_import_from_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reads.fa");
        std::fs::write(&path, FASTA)?;
        let mut writer = TwoBitWriterBuilder::default().build();
        assert_eq!(writer.add_fasta_path(&path)?, 2);
        Ok(())
    }
}
