//! Storage counters reported by `CMD_GET_FREE_SIZES`

/// Record counts and capacities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceSizes {
    pub users: u32,
    pub fingers: u32,
    pub records: u32,
    pub dummy: u32,
    pub cards: u32,
    pub fingers_cap: u32,
    pub users_cap: u32,
    pub records_cap: u32,
    pub fingers_available: u32,
    pub users_available: u32,
    pub records_available: u32,
    /// Only reported by terminals with a face reader
    pub faces: Option<u32>,
    pub faces_cap: Option<u32>,
}
