//! Extension categories and size/age buckets
//!
//! All three classifications are total functions over their input: every
//! extension maps to exactly one category, every size to exactly one size
//! bucket and every non-negative age to exactly one age bucket.

use serde::{Deserialize, Serialize};
use std::fmt;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Category derived from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileCategory {
    Documents,
    Images,
    Videos,
    Audio,
    Archives,
    Code,
    Executables,
    Databases,
    Logs,
    Temporary,
    Other,
}

/// Extension tables, checked in order; the first table containing the
/// extension wins (`.bak` is both a database and a temp extension).
const CATEGORY_TABLE: &[(FileCategory, &[&str])] = &[
    (
        FileCategory::Documents,
        &[
            ".doc", ".docx", ".pdf", ".rtf", ".odt", ".xls", ".xlsx", ".ppt", ".pptx", ".csv",
        ],
    ),
    (
        FileCategory::Images,
        &[
            ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".svg", ".ico", ".webp", ".raw",
        ],
    ),
    (
        FileCategory::Videos,
        &[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v"],
    ),
    (
        FileCategory::Audio,
        &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".wma", ".m4a"],
    ),
    (
        FileCategory::Archives,
        &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"],
    ),
    (
        FileCategory::Code,
        &[
            ".cs", ".js", ".ts", ".py", ".java", ".cpp", ".h", ".ps1", ".psm1", ".sh", ".json",
            ".xml", ".yaml", ".yml",
        ],
    ),
    (
        FileCategory::Executables,
        &[".exe", ".dll", ".msi", ".bat", ".cmd", ".com"],
    ),
    (
        FileCategory::Databases,
        &[".sql", ".mdf", ".ldf", ".bak", ".db", ".sqlite"],
    ),
    (FileCategory::Logs, &[".log", ".evt", ".evtx"]),
    (
        FileCategory::Temporary,
        &[".tmp", ".temp", ".bak", ".swp", ".cache"],
    ),
];

impl FileCategory {
    /// Classify an extension (with leading dot, any case)
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.to_ascii_lowercase();
        CATEGORY_TABLE
            .iter()
            .find(|(_, exts)| exts.contains(&ext.as_str()))
            .map(|(category, _)| *category)
            .unwrap_or(FileCategory::Other)
    }

    /// Label as delivered to the sink
    pub fn label(&self) -> &'static str {
        match self {
            FileCategory::Documents => "Documents",
            FileCategory::Images => "Images",
            FileCategory::Videos => "Videos",
            FileCategory::Audio => "Audio",
            FileCategory::Archives => "Archives",
            FileCategory::Code => "Code",
            FileCategory::Executables => "Executables",
            FileCategory::Databases => "Databases",
            FileCategory::Logs => "Logs",
            FileCategory::Temporary => "Temporary",
            FileCategory::Other => "Other",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Size bucket label for a byte count (half-open intervals)
pub fn size_bucket(size_bytes: u64) -> &'static str {
    match size_bytes {
        s if s < KB => "< 1 KB",
        s if s < MB => "1 KB - 1 MB",
        s if s < 10 * MB => "1 MB - 10 MB",
        s if s < 100 * MB => "10 MB - 100 MB",
        s if s < 500 * MB => "100 MB - 500 MB",
        s if s < GB => "500 MB - 1 GB",
        s if s < 5 * GB => "1 GB - 5 GB",
        s if s < 10 * GB => "5 GB - 10 GB",
        _ => "10+ GB",
    }
}

/// Age bucket label for an age in whole days
pub fn age_bucket(age_in_days: u32) -> &'static str {
    match age_in_days {
        0..=7 => "0-7 days",
        8..=30 => "8-30 days",
        31..=90 => "31-90 days",
        91..=180 => "91-180 days",
        181..=365 => "181-365 days",
        366..=730 => "1-2 years",
        731..=1825 => "2-5 years",
        _ => "5+ years",
    }
}

/// Split a file name into its extension, dot included
///
/// Leading dots do not start an extension, so `.bashrc` has none and
/// `archive.tar.gz` yields `.gz`.
pub fn split_extension(name: &str) -> &str {
    let stem_start = name.len() - name.trim_start_matches('.').len();
    match name[stem_start..].rfind('.') {
        Some(idx) => &name[stem_start + idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_case_insensitive() {
        for ext in [".PDF", ".Pdf", ".JPG", ".Mp4", ".ZIP", ".PY", ".EXE", ".LOG"] {
            assert_eq!(
                FileCategory::from_extension(ext),
                FileCategory::from_extension(&ext.to_lowercase()),
                "{ext}"
            );
        }
        assert_eq!(FileCategory::from_extension(".PDF"), FileCategory::Documents);
    }

    #[test]
    fn test_unknown_extensions_are_other() {
        for ext in ["", ".txt", ".xyz", ".unknown", "pdf"] {
            assert_eq!(FileCategory::from_extension(ext), FileCategory::Other, "{ext:?}");
        }
    }

    #[test]
    fn test_first_table_wins() {
        assert_eq!(FileCategory::from_extension(".bak"), FileCategory::Databases);
        assert_eq!(FileCategory::from_extension(".tmp"), FileCategory::Temporary);
    }

    #[test]
    fn test_size_bucket_boundaries() {
        assert_eq!(size_bucket(0), "< 1 KB");
        assert_eq!(size_bucket(1023), "< 1 KB");
        assert_eq!(size_bucket(1024), "1 KB - 1 MB");
        assert_eq!(size_bucket(MB - 1), "1 KB - 1 MB");
        assert_eq!(size_bucket(MB), "1 MB - 10 MB");
        assert_eq!(size_bucket(2 * MB), "1 MB - 10 MB");
        assert_eq!(size_bucket(10 * MB), "10 MB - 100 MB");
        assert_eq!(size_bucket(100 * MB), "100 MB - 500 MB");
        assert_eq!(size_bucket(500 * MB), "500 MB - 1 GB");
        assert_eq!(size_bucket(GB), "1 GB - 5 GB");
        assert_eq!(size_bucket(5 * GB), "5 GB - 10 GB");
        assert_eq!(size_bucket(10 * GB - 1), "5 GB - 10 GB");
        assert_eq!(size_bucket(10 * GB), "10+ GB");
        assert_eq!(size_bucket(u64::MAX), "10+ GB");
    }

    #[test]
    fn test_age_bucket_boundaries() {
        let cases = [
            (0, "0-7 days"),
            (7, "0-7 days"),
            (8, "8-30 days"),
            (30, "8-30 days"),
            (31, "31-90 days"),
            (90, "31-90 days"),
            (91, "91-180 days"),
            (180, "91-180 days"),
            (181, "181-365 days"),
            (365, "181-365 days"),
            (366, "1-2 years"),
            (730, "1-2 years"),
            (731, "2-5 years"),
            (1825, "2-5 years"),
            (1826, "5+ years"),
            (u32::MAX, "5+ years"),
        ];
        for (age, expected) in cases {
            assert_eq!(age_bucket(age), expected, "age {age}");
        }
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.txt"), ".txt");
        assert_eq!(split_extension("archive.tar.gz"), ".gz");
        assert_eq!(split_extension("README"), "");
        assert_eq!(split_extension(".bashrc"), "");
        assert_eq!(split_extension("..hidden.cfg"), ".cfg");
        assert_eq!(split_extension("trailing."), ".");
        assert_eq!(split_extension(""), "");
    }
}
