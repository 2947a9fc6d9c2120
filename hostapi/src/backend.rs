//! The set of backend capabilities a runtime owns.

use crate::address::{AddressCodec, Bech32Codec};
use crate::error::HostError;
use crate::mem_store::MemoryStorage;
use crate::querier::{BasicQuerier, Querier};
use crate::storage::Storage;
use crate::types::HostConfig;

/// Storage, address codec and querier handed to a runtime at construction.
///
/// The runtime owns its backend exclusively; two runtimes must not share
/// one store.
pub struct Backend {
    pub api: Box<dyn AddressCodec>,
    pub storage: Box<dyn Storage>,
    pub querier: Box<dyn Querier>,
}

impl Backend {
    pub fn new(
        api: impl AddressCodec + 'static,
        storage: impl Storage + 'static,
        querier: impl Querier + 'static,
    ) -> Self {
        Self {
            api: Box::new(api),
            storage: Box::new(storage),
            querier: Box::new(querier),
        }
    }

    /// In-memory backend: `MemoryStorage`, a bech32 codec configured from
    /// `config`, and a `BasicQuerier` with the bank handler.
    pub fn in_memory(config: &HostConfig) -> Result<Self, HostError> {
        let storage = MemoryStorage::new().with_max_key_len(config.max_key_len);
        Ok(Self::new(
            Bech32Codec::from_config(config)?,
            storage,
            BasicQuerier::new(),
        ))
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}
