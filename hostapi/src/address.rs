//! Address codec: human-readable bech32 strings to canonical bytes and back.

use bech32::{Bech32, Hrp};

use crate::error::HostError;
use crate::types::{HostConfig, DEFAULT_CANONICAL_LENGTH, MAX_LENGTH_HUMAN_ADDRESS};

/// Converts between human and canonical address forms.
pub trait AddressCodec: Send + Sync {
    /// Parse a human address into its canonical bytes.
    fn canonicalize(&self, human: &str) -> Result<Vec<u8>, HostError>;

    /// Render canonical bytes as a human address.
    fn humanize(&self, canonical: &[u8]) -> Result<String, HostError>;

    /// Accept `human` only if it survives a canonicalize/humanize round trip
    /// unchanged.
    fn validate(&self, human: &str) -> Result<(), HostError> {
        let canonical = self.canonicalize(human)?;
        let normalized = self.humanize(&canonical)?;
        if normalized != human {
            return Err(HostError::InvalidAddress(format!(
                "address not normalized: {human}"
            )));
        }
        Ok(())
    }
}

/// Bech32 codec with a fixed prefix and canonical length.
#[derive(Debug, Clone)]
pub struct Bech32Codec {
    hrp: Hrp,
    canonical_len: usize,
    max_human_len: usize,
}

impl Default for Bech32Codec {
    fn default() -> Self {
        Self {
            hrp: Hrp::parse_unchecked(crate::types::DEFAULT_BECH32_PREFIX),
            canonical_len: DEFAULT_CANONICAL_LENGTH,
            max_human_len: MAX_LENGTH_HUMAN_ADDRESS,
        }
    }
}

impl Bech32Codec {
    /// Create a codec for `prefix` producing `canonical_len`-byte addresses.
    pub fn new(prefix: &str, canonical_len: usize) -> Result<Self, HostError> {
        let hrp = Hrp::parse(prefix)
            .map_err(|e| HostError::InvalidEncoding(format!("bech32 prefix {prefix:?}: {e}")))?;
        Ok(Self {
            hrp,
            canonical_len,
            max_human_len: MAX_LENGTH_HUMAN_ADDRESS,
        })
    }

    /// Build the codec described by a host config.
    pub fn from_config(config: &HostConfig) -> Result<Self, HostError> {
        let mut codec = Self::new(&config.bech32_prefix, config.canonical_address_len)?;
        codec.max_human_len = config.max_human_address_len;
        Ok(codec)
    }

    pub fn prefix(&self) -> &str {
        self.hrp.as_str()
    }

    pub fn canonical_len(&self) -> usize {
        self.canonical_len
    }
}

impl AddressCodec for Bech32Codec {
    fn canonicalize(&self, human: &str) -> Result<Vec<u8>, HostError> {
        if human.is_empty() {
            return Err(HostError::EmptyAddress);
        }
        let normalized = human.to_lowercase();
        if normalized.len() < 3 {
            return Err(HostError::AddressTooShort(human.to_string()));
        }
        if normalized.len() > self.max_human_len {
            return Err(HostError::AddressTooLong {
                length: normalized.len(),
                max: self.max_human_len,
            });
        }

        let (hrp, data) = bech32::decode(&normalized)
            .map_err(|e| HostError::InvalidAddress(format!("{human}: {e}")))?;
        if hrp != self.hrp {
            return Err(HostError::InvalidAddress(format!(
                "{human}: wrong prefix, expected {}",
                self.hrp
            )));
        }
        if data.len() != self.canonical_len {
            return Err(HostError::InvalidCanonicalLength {
                expected: self.canonical_len,
                got: data.len(),
            });
        }
        Ok(data)
    }

    fn humanize(&self, canonical: &[u8]) -> Result<String, HostError> {
        if canonical.len() != self.canonical_len {
            return Err(HostError::InvalidCanonicalLength {
                expected: self.canonical_len,
                got: canonical.len(),
            });
        }
        bech32::encode::<Bech32>(self.hrp, canonical)
            .map_err(|e| HostError::InvalidEncoding(format!("bech32 encode: {e}")))
    }
}
