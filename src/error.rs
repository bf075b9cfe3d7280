use thiserror::Error;

/// Structural failure while walking a class file.
///
/// Only corruption is reported here. Attributes and annotation targets the
/// reader does not interpret are skipped, never rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("truncated record: needed {needed} byte(s) at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("bad magic 0x{0:08X}")]
    BadMagic(u32),
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { index: u16, tag: u8 },
    #[error("constant pool index {index} is not a {expected} entry")]
    BadConstantIndex { index: u16, expected: &'static str },
    #[error("attribute {attribute} declares {declared} byte(s) but {consumed} were parsed")]
    AttributeLength {
        attribute: String,
        declared: usize,
        consumed: usize,
    },
    #[error("unknown annotation element tag {0:?}")]
    UnknownElementTag(char),
    #[error("annotation values nested deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("{0} trailing byte(s) after end of record")]
    TrailingBytes(usize),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("malformed class record {candidate}: {source}")]
    MalformedRecord {
        candidate: String,
        #[source]
        source: ReadError,
    },
    #[error(
        "class file {candidate} declares {class_name} but the class could not be found in the loading context"
    )]
    NameResolution {
        candidate: String,
        class_name: String,
    },
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            ScanError::NameResolution { .. } => ErrorKind::NameResolution,
        }
    }

    pub fn candidate(&self) -> &str {
        match self {
            ScanError::MalformedRecord { candidate, .. } => candidate,
            ScanError::NameResolution { candidate, .. } => candidate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedRecord,
    NameResolution,
    /// A classpath entry that could not be opened or listed.
    Unreadable,
}
