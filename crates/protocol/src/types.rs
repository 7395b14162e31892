use std::fmt;

use uuid::Uuid;

/// Length in bytes of a content digest on the wire.
pub const DIGEST_LEN: usize = 16;

/// Server-assigned identifier correlating every chunk upload and the
/// completion request of one multipart transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CopyId(Uuid);

impl CopyId {
    /// Allocates a fresh random identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CopyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated form doubles as the scratch directory name.
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A content digest as carried in success responses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Checksum(pub [u8; DIGEST_LEN]);

impl Checksum {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex rendering, used in logs and error messages.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Closed set of error kinds a server can report in an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    ParseHeader = 0,
    CopyInProgress = 1,
    SingleCopyWrite = 2,
    PartWrite = 3,
    CopyIdNotFound = 4,
    Reassembly = 5,
}

impl ErrorKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Maps a wire code back to its kind. Returns `None` for codes outside
    /// the defined set.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::ParseHeader),
            1 => Some(Self::CopyInProgress),
            2 => Some(Self::SingleCopyWrite),
            3 => Some(Self::PartWrite),
            4 => Some(Self::CopyIdNotFound),
            5 => Some(Self::Reassembly),
            _ => None,
        }
    }

    /// Human-readable description shown to the client user.
    pub fn message(self) -> &'static str {
        match self {
            Self::ParseHeader => "error parsing headers",
            Self::CopyInProgress => "copy operation already in progress for this path",
            Self::SingleCopyWrite => "error writing single file at server",
            Self::PartWrite => "error writing part at server",
            Self::CopyIdNotFound => "copyId supplied by the client is not known",
            Self::Reassembly => "error stitching parts at server",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
