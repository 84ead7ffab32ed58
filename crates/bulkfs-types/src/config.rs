//! Configuration types for the bulkfs engine
//!
//! Options are plain data handed to the engine at construction; validated
//! newtypes guard the values with real invariants.

/// Options shared by every batch operation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessOptions {
    /// On a destination collision, derive a numbered sibling name instead
    /// of failing the item.
    pub auto_rename: bool,
    /// Chunk length for byte-for-byte duplicate comparison. Zero disables
    /// comparison entirely: colliding files are renamed unconditionally.
    pub comparison_buffer: usize,
    /// Discard the partially-loaded work queue when loading aborts.
    pub clear_on_error: bool,
    /// The collaborator layer must confirm with the user before `start`.
    /// Carried configuration only; the engine itself never prompts.
    pub require_confirmation: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            auto_rename: false,
            comparison_buffer: 0,
            clear_on_error: true,
            require_confirmation: false,
        }
    }
}

/// Streaming-copy chunk size with validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CopyChunkSize(usize);

impl CopyChunkSize {
    /// Minimum chunk size (4KB)
    pub const MIN: usize = 4 * 1024;
    /// Maximum chunk size (64MB)
    pub const MAX: usize = 64 * 1024 * 1024;
    /// Default chunk size (1MB)
    pub const DEFAULT: usize = 1024 * 1024;

    /// Create a new chunk size with validation.
    pub fn new(size: usize) -> Result<Self, String> {
        if size < Self::MIN {
            Err(format!("chunk size {} is below minimum {}", size, Self::MIN))
        } else if size > Self::MAX {
            Err(format!("chunk size {} exceeds maximum {}", size, Self::MAX))
        } else if !size.is_power_of_two() {
            Err(format!("chunk size {} must be a power of two", size))
        } else {
            Ok(Self(size))
        }
    }

    /// Get the chunk size value.
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for CopyChunkSize {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Zstandard compression level with validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// Fastest compression
    pub const FASTEST: u8 = 1;
    /// Default compression
    pub const DEFAULT: u8 = 3;
    /// Best compression
    pub const BEST: u8 = 22;

    /// Create a new compression level with validation.
    pub fn new(level: u8) -> Result<Self, String> {
        if level < Self::FASTEST || level > Self::BEST {
            Err(format!(
                "compression level {} outside {}..={}",
                level,
                Self::FASTEST,
                Self::BEST
            ))
        } else {
            Ok(Self(level))
        }
    }

    /// Get the compression level value.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(4 * 1024, true)]
    #[case(1024 * 1024, true)]
    #[case(1024, false)] // too small
    #[case(5000, false)] // not a power of two
    #[case(128 * 1024 * 1024, false)] // too large
    fn chunk_size_validation(#[case] size: usize, #[case] ok: bool) {
        assert_eq!(CopyChunkSize::new(size).is_ok(), ok);
    }

    #[test]
    fn compression_level_bounds() {
        assert!(CompressionLevel::new(1).is_ok());
        assert!(CompressionLevel::new(22).is_ok());
        assert!(CompressionLevel::new(0).is_err());
        assert!(CompressionLevel::new(23).is_err());
        assert_eq!(CompressionLevel::default().get(), 3);
    }

    #[test]
    fn options_default_to_safe_values() {
        let opts = ProcessOptions::default();
        assert!(!opts.auto_rename);
        assert_eq!(opts.comparison_buffer, 0);
        assert!(opts.clear_on_error);
        assert!(!opts.require_confirmation);
    }
}
