use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;

/// Builds ZIP archives in memory.
///
/// Entries keep the order they are given in. Timestamps are pinned so equal
/// input yields equal bytes.
#[derive(Clone, Copy)]
pub struct ArchiveWriter {
    options: FileOptions,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    pub fn new() -> Self {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        Self { options }
    }

    pub fn write<I, N, B>(&self, entries: I) -> Result<Vec<u8>, ArchiveError>
    where
        I: IntoIterator<Item = (N, B)>,
        N: AsRef<str>,
        B: AsRef<[u8]>,
    {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for (name, data) in entries {
            writer.start_file(name.as_ref(), self.options)?;
            writer.write_all(data.as_ref())?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_entries(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), data)
            })
            .collect()
    }

    #[test]
    fn test_entries_survive_in_order() {
        let entries = vec![
            ("page1.html".to_string(), b"x".to_vec()),
            ("page2.html".to_string(), b"y".to_vec()),
        ];

        let bytes = ArchiveWriter::new().write(entries.clone()).unwrap();
        assert_eq!(read_entries(bytes), entries);
    }

    #[test]
    fn test_output_is_deterministic() {
        let entries = [("b.txt", "second"), ("a.txt", "first")];
        let writer = ArchiveWriter::new();

        let first = writer.write(entries).unwrap();
        let second = writer.write(entries).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let bytes = ArchiveWriter::new().write(Vec::<(String, Vec<u8>)>::new()).unwrap();
        assert!(read_entries(bytes).is_empty());
    }
}
