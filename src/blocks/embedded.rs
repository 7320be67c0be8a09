/// The nine block definitions in block order.
pub(super) const BLOCKS_JSON: &str = include_str!("../../resources/blocks.json");
