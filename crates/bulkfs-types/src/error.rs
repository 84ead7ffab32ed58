//! Error taxonomy and OS error-code classification for bulkfs
//!
//! The engine reacts to failures through a closed set of domain errors.
//! Raw OS error codes are mapped into that set by [`classify_os_code`],
//! which is pure and total, so the engine core stays platform-neutral and
//! testable with synthetic codes. The mapping from an error to a
//! retry/skip/abort action is *not* here; that decision belongs to the
//! caller-supplied [`RecoveryPolicy`](crate::traits::RecoveryPolicy).

use std::path::{Path, PathBuf};

/// Domain error produced while loading, checking, or processing paths.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcessError {
    /// A file-system entry already exists at the destination path
    #[error("entry already exists: {path}")]
    AlreadyExists {
        /// Destination path that is already occupied
        path: PathBuf,
    },

    /// The source or destination path does not exist
    #[error("path not found: {path}")]
    NotFound {
        /// Path that could not be found
        path: PathBuf,
    },

    /// The entry cannot be read or written due to permissions
    #[error("access denied: {path}")]
    AccessDenied {
        /// Path the access check failed for
        path: PathBuf,
    },

    /// The entry or its volume is write-protected
    #[error("read-only: {path}")]
    ReadOnly {
        /// Write-protected path
        path: PathBuf,
    },

    /// Another process holds the entry open without sharing
    #[error("sharing violation: {path}")]
    SharingViolation {
        /// Path locked by another process
        path: PathBuf,
    },

    /// The destination volume cannot hold the remaining work
    #[error("not enough space on destination ({required} bytes required, {available} available)")]
    NotEnoughSpace {
        /// Bytes the remaining batch needs
        required: u64,
        /// Bytes the destination volume reports free
        available: u64,
    },

    /// The destination volume is missing or not ready
    #[error("drive not ready: {path}")]
    DriveNotReady {
        /// Root path of the volume that is not ready
        path: PathBuf,
    },

    /// The device reported a hardware-level failure
    #[error("disk error: {message}")]
    DiskError {
        /// Description of the device failure
        message: String,
    },

    /// File-system level encryption or decryption failed
    #[error("encryption failure: {path}")]
    EncryptionFailed {
        /// Path the encryption operation failed for
        path: PathBuf,
    },

    /// No collision-free renamed destination could be validated
    #[error("renaming failed: {path}")]
    RenamingFailed {
        /// Destination path that could not be renamed around
        path: PathBuf,
    },

    /// The batch or the current item was cancelled by the caller
    #[error("aborted by user")]
    Aborted,

    /// A lifecycle method was called from the wrong state
    #[error("invalid transition: {operation} is not allowed in state {state}")]
    InvalidTransition {
        /// The method that was refused
        operation: String,
        /// The state the engine was in
        state: String,
    },

    /// Any failure outside the closed taxonomy
    #[error("{message}")]
    Unknown {
        /// Human-readable description of the failure
        message: String,
        /// Originating OS error code, when one exists
        code: Option<i32>,
    },
}

impl ProcessError {
    /// Create an unknown error from a message alone.
    pub fn unknown<S: Into<String>>(message: S) -> Self {
        Self::Unknown {
            message: message.into(),
            code: None,
        }
    }

    /// Create a disk error.
    pub fn disk<S: Into<String>>(message: S) -> Self {
        Self::DiskError {
            message: message.into(),
        }
    }

    /// Create an invalid-transition error.
    pub fn invalid_transition(operation: &str, state: impl std::fmt::Debug) -> Self {
        Self::InvalidTransition {
            operation: operation.to_string(),
            state: format!("{state:?}"),
        }
    }

    /// The originating OS error code, for the kinds that map one.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::AlreadyExists { .. } => Some(codes::ALREADY_EXISTS),
            Self::NotFound { .. } => Some(codes::PATH_NOT_FOUND),
            Self::AccessDenied { .. } => Some(codes::ACCESS_DENIED),
            Self::ReadOnly { .. } => Some(codes::WRITE_PROTECT),
            Self::SharingViolation { .. } => Some(codes::SHARING_VIOLATION),
            Self::NotEnoughSpace { .. } => Some(codes::DISK_FULL),
            Self::DriveNotReady { .. } => Some(codes::NOT_READY),
            Self::DiskError { .. } => Some(codes::CRC),
            Self::EncryptionFailed { .. } => Some(codes::ENCRYPTION_FAILED),
            Self::Unknown { code, .. } => *code,
            _ => None,
        }
    }

    /// Whether this error is the cooperative-cancellation marker.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// The path this error is about, for the kinds that carry one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::AlreadyExists { path }
            | Self::NotFound { path }
            | Self::AccessDenied { path }
            | Self::ReadOnly { path }
            | Self::SharingViolation { path }
            | Self::DriveNotReady { path }
            | Self::EncryptionFailed { path }
            | Self::RenamingFailed { path } => Some(path),
            _ => None,
        }
    }
}

/// Canonical OS error-code space used by [`classify_os_code`].
///
/// Windows numbering is the canonical space because that is where the
/// full taxonomy (sharing violations, drive readiness, encryption) is
/// observable; Unix codes are bridged in [`classify_io_error`].
pub mod codes {
    /// ERROR_FILE_NOT_FOUND
    pub const FILE_NOT_FOUND: i32 = 2;
    /// ERROR_PATH_NOT_FOUND
    pub const PATH_NOT_FOUND: i32 = 3;
    /// ERROR_ACCESS_DENIED
    pub const ACCESS_DENIED: i32 = 5;
    /// ERROR_WRITE_PROTECT
    pub const WRITE_PROTECT: i32 = 19;
    /// ERROR_NOT_READY
    pub const NOT_READY: i32 = 21;
    /// ERROR_CRC
    pub const CRC: i32 = 23;
    /// ERROR_SHARING_VIOLATION
    pub const SHARING_VIOLATION: i32 = 32;
    /// ERROR_LOCK_VIOLATION
    pub const LOCK_VIOLATION: i32 = 33;
    /// ERROR_HANDLE_DISK_FULL
    pub const HANDLE_DISK_FULL: i32 = 39;
    /// ERROR_FILE_EXISTS
    pub const FILE_EXISTS: i32 = 80;
    /// ERROR_DISK_FULL
    pub const DISK_FULL: i32 = 112;
    /// ERROR_ALREADY_EXISTS
    pub const ALREADY_EXISTS: i32 = 183;
    /// ERROR_IO_DEVICE
    pub const IO_DEVICE: i32 = 1117;
    /// ERROR_FILE_CORRUPT
    pub const FILE_CORRUPT: i32 = 1392;
    /// ERROR_ENCRYPTION_FAILED
    pub const ENCRYPTION_FAILED: i32 = 6000;
    /// ERROR_DECRYPTION_FAILED
    pub const DECRYPTION_FAILED: i32 = 6001;
    /// ERROR_FILE_ENCRYPTED
    pub const FILE_ENCRYPTED: i32 = 6002;
}

/// Map a raw OS error code into the domain taxonomy.
///
/// Pure and total: every `i32` maps to exactly one error kind, with
/// unrecognized codes landing in [`ProcessError::Unknown`].
pub fn classify_os_code(code: i32, path: &Path) -> ProcessError {
    let path = path.to_path_buf();
    match code {
        codes::FILE_NOT_FOUND | codes::PATH_NOT_FOUND => ProcessError::NotFound { path },
        codes::ACCESS_DENIED => ProcessError::AccessDenied { path },
        codes::WRITE_PROTECT => ProcessError::ReadOnly { path },
        codes::NOT_READY => ProcessError::DriveNotReady { path },
        codes::SHARING_VIOLATION | codes::LOCK_VIOLATION => {
            ProcessError::SharingViolation { path }
        }
        codes::FILE_EXISTS | codes::ALREADY_EXISTS => ProcessError::AlreadyExists { path },
        codes::DISK_FULL | codes::HANDLE_DISK_FULL => ProcessError::NotEnoughSpace {
            required: 0,
            available: 0,
        },
        codes::CRC | codes::IO_DEVICE | codes::FILE_CORRUPT => ProcessError::DiskError {
            message: format!("device failure (code {code}) on {}", path.display()),
        },
        codes::ENCRYPTION_FAILED | codes::DECRYPTION_FAILED | codes::FILE_ENCRYPTED => {
            ProcessError::EncryptionFailed { path }
        }
        _ => ProcessError::Unknown {
            message: format!("unclassified OS error {code} on {}", path.display()),
            code: Some(code),
        },
    }
}

/// Map an [`std::io::Error`] into the domain taxonomy.
///
/// The platform-neutral `ErrorKind` carries most of the signal; the raw
/// OS code fills in the kinds `ErrorKind` cannot express on the current
/// platform (disk-full, write-protection, sharing violations).
pub fn classify_io_error(err: &std::io::Error, path: &Path) -> ProcessError {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::NotFound => {
            return ProcessError::NotFound {
                path: path.to_path_buf(),
            }
        }
        ErrorKind::PermissionDenied => {
            return ProcessError::AccessDenied {
                path: path.to_path_buf(),
            }
        }
        ErrorKind::AlreadyExists => {
            return ProcessError::AlreadyExists {
                path: path.to_path_buf(),
            }
        }
        _ => {}
    }

    if let Some(code) = err.raw_os_error() {
        #[cfg(windows)]
        {
            return classify_os_code(code, path);
        }
        #[cfg(unix)]
        {
            // ENOSPC / EDQUOT, EROFS, ETXTBSY, EIO
            return match code {
                28 | 122 => ProcessError::NotEnoughSpace {
                    required: 0,
                    available: 0,
                },
                30 => ProcessError::ReadOnly {
                    path: path.to_path_buf(),
                },
                26 => ProcessError::SharingViolation {
                    path: path.to_path_buf(),
                },
                5 => ProcessError::DiskError {
                    message: format!("I/O error on {}: {err}", path.display()),
                },
                _ => ProcessError::Unknown {
                    message: format!("{err} on {}", path.display()),
                    code: Some(code),
                },
            };
        }
        #[cfg(not(any(unix, windows)))]
        {
            return ProcessError::Unknown {
                message: format!("{err} on {}", path.display()),
                code: Some(code),
            };
        }
    }

    ProcessError::Unknown {
        message: format!("{err} on {}", path.display()),
        code: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    #[test]
    fn known_codes_map_to_their_kinds() {
        let p = Path::new("/data/file.bin");
        assert!(matches!(
            classify_os_code(codes::FILE_NOT_FOUND, p),
            ProcessError::NotFound { .. }
        ));
        assert!(matches!(
            classify_os_code(codes::PATH_NOT_FOUND, p),
            ProcessError::NotFound { .. }
        ));
        assert!(matches!(
            classify_os_code(codes::ACCESS_DENIED, p),
            ProcessError::AccessDenied { .. }
        ));
        assert!(matches!(
            classify_os_code(codes::WRITE_PROTECT, p),
            ProcessError::ReadOnly { .. }
        ));
        assert!(matches!(
            classify_os_code(codes::NOT_READY, p),
            ProcessError::DriveNotReady { .. }
        ));
        assert!(matches!(
            classify_os_code(codes::SHARING_VIOLATION, p),
            ProcessError::SharingViolation { .. }
        ));
        assert!(matches!(
            classify_os_code(codes::DISK_FULL, p),
            ProcessError::NotEnoughSpace { .. }
        ));
        assert!(matches!(
            classify_os_code(codes::FILE_CORRUPT, p),
            ProcessError::DiskError { .. }
        ));
        assert!(matches!(
            classify_os_code(codes::FILE_ENCRYPTED, p),
            ProcessError::EncryptionFailed { .. }
        ));
        assert!(matches!(
            classify_os_code(codes::ALREADY_EXISTS, p),
            ProcessError::AlreadyExists { .. }
        ));
    }

    proptest! {
        // Classification is total: any code yields exactly one kind, and
        // unknown codes keep the original code for post-mortem reporting.
        #[test]
        fn classification_is_total(code in any::<i32>()) {
            let err = classify_os_code(code, Path::new("/x"));
            if let ProcessError::Unknown { code: carried, .. } = &err {
                prop_assert_eq!(*carried, Some(code));
            }
        }
    }

    #[test]
    fn io_error_kind_bridging() {
        let p = Path::new("/missing");
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            classify_io_error(&io, p),
            ProcessError::NotFound { .. }
        ));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(
            classify_io_error(&io, p),
            ProcessError::AccessDenied { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn unix_raw_codes_bridge_to_taxonomy() {
        let p = Path::new("/dev/full");
        let enospc = std::io::Error::from_raw_os_error(28);
        assert!(matches!(
            classify_io_error(&enospc, p),
            ProcessError::NotEnoughSpace { .. }
        ));

        let erofs = std::io::Error::from_raw_os_error(30);
        assert!(matches!(
            classify_io_error(&erofs, p),
            ProcessError::ReadOnly { .. }
        ));
    }

    #[test]
    fn display_carries_the_path() {
        let err = ProcessError::SharingViolation {
            path: PathBuf::from("/locked/file"),
        };
        assert!(err.to_string().contains("/locked/file"));
        assert_eq!(err.os_code(), Some(codes::SHARING_VIOLATION));
    }

    #[test]
    fn aborted_marker() {
        assert!(ProcessError::Aborted.is_aborted());
        assert!(!ProcessError::unknown("x").is_aborted());
        assert_eq!(ProcessError::Aborted.os_code(), None);
    }
}
