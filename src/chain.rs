//! The host chain as seen by the indexer.

use crate::types::BlockTimestamp;
use parking_lot::RwLock;

/// Read access to the host's block state.
pub trait ChainHead: Send + Sync {
    /// Number of the block the delivered transactions belong to.
    fn pending_block_num(&self) -> u32;

    fn pending_block_time(&self) -> BlockTimestamp;

    fn last_irreversible_block(&self) -> u32;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockPosition {
    pub pending_block_num: u32,
    pub pending_block_time: BlockTimestamp,
    pub last_irreversible_block: u32,
}

/// A [`ChainHead`] whose position is set explicitly by the host loop.
#[derive(Debug, Default)]
pub struct ManualChainHead {
    position: RwLock<BlockPosition>,
}

impl ManualChainHead {
    pub fn new(position: BlockPosition) -> Self {
        Self {
            position: RwLock::new(position),
        }
    }

    /// Move to a new pending block.
    pub fn start_block(&self, block_num: u32, block_time: BlockTimestamp) {
        let mut position = self.position.write();
        position.pending_block_num = block_num;
        position.pending_block_time = block_time;
    }

    pub fn set_last_irreversible(&self, block_num: u32) {
        self.position.write().last_irreversible_block = block_num;
    }

    pub fn position(&self) -> BlockPosition {
        *self.position.read()
    }
}

impl ChainHead for ManualChainHead {
    fn pending_block_num(&self) -> u32 {
        self.position.read().pending_block_num
    }

    fn pending_block_time(&self) -> BlockTimestamp {
        self.position.read().pending_block_time
    }

    fn last_irreversible_block(&self) -> u32 {
        self.position.read().last_irreversible_block
    }
}
