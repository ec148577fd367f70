use thiserror::Error;

use shm_region::RegionError;
use shm_ring::RingError;

pub type FabricResult<T> = Result<T, FabricError>;

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("region error: {0}")]
    Region(#[from] RegionError),

    #[error("ring error: {0}")]
    Ring(#[from] RingError),

    #[error("invalid region layout: {0}")]
    InvalidLayout(&'static str),
}
