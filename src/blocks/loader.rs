use std::sync::OnceLock;

use super::embedded::BLOCKS_JSON;
use super::schema::BlockDefinition;
use crate::types::BLOCK_NUMBERS;

static CATALOG: OnceLock<Vec<BlockDefinition>> = OnceLock::new();

/// Parse a block catalog from JSON and validate it.
pub fn parse_catalog(json: &str) -> Result<Vec<BlockDefinition>, String> {
    let blocks: Vec<BlockDefinition> =
        serde_json::from_str(json).map_err(|e| format!("Failed to parse block catalog: {}", e))?;
    validate_catalog(&blocks)?;
    Ok(blocks)
}

/// Validate that a catalog holds exactly blocks 1..=9, in order, with sane ranges.
pub fn validate_catalog(blocks: &[BlockDefinition]) -> Result<(), String> {
    let expected: Vec<u8> = BLOCK_NUMBERS.collect();
    let actual: Vec<u8> = blocks.iter().map(|b| b.number).collect();
    if actual != expected {
        return Err(format!(
            "Block catalog must list blocks {:?} in order, got {:?}",
            expected, actual
        ));
    }
    for block in blocks {
        if block.name.trim().is_empty() {
            return Err(format!("Block {} has no name", block.number));
        }
        if block.min_words > block.max_words {
            return Err(format!(
                "Block {} has min_words {} above max_words {}",
                block.number, block.min_words, block.max_words
            ));
        }
    }
    Ok(())
}

/// The embedded catalog, parsed on first use.
///
/// The embedded JSON is validated by the test suite, so a parse failure here
/// means a broken build; it is logged and yields an empty catalog.
pub fn catalog() -> &'static [BlockDefinition] {
    CATALOG.get_or_init(|| {
        parse_catalog(BLOCKS_JSON).unwrap_or_else(|e| {
            log::error!("Blocks: {}", e);
            Vec::new()
        })
    })
}

/// Look up a block definition by number.
pub fn block(number: u8) -> Option<&'static BlockDefinition> {
    catalog().iter().find(|b| b.number == number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::WordCountStatus;

    #[test]
    fn test_embedded_catalog_is_valid() {
        let blocks = parse_catalog(BLOCKS_JSON).expect("embedded catalog should parse");
        assert_eq!(blocks.len(), 9);
        assert_eq!(catalog().len(), 9);
    }

    #[test]
    fn test_block_lookup() {
        let first = block(1).unwrap();
        assert_eq!(first.name, "EL PROBLEMA");
        assert_eq!((first.min_words, first.max_words), (80, 120));
        assert_eq!(block(7).unwrap().min_words, 60);
        assert!(block(0).is_none());
        assert!(block(10).is_none());
    }

    #[test]
    fn test_validate_rejects_out_of_order() {
        let mut blocks = parse_catalog(BLOCKS_JSON).unwrap();
        blocks.swap(0, 1);
        assert!(validate_catalog(&blocks).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut blocks = parse_catalog(BLOCKS_JSON).unwrap();
        blocks[2].min_words = 500;
        let err = validate_catalog(&blocks).unwrap_err();
        assert!(err.contains("Block 3"));
    }

    #[test]
    fn test_word_count_status() {
        let def = block(7).unwrap();
        assert_eq!(def.word_count_status("muy corto"), WordCountStatus::Under);
        let in_range = vec!["palabra"; 80].join(" ");
        assert_eq!(def.word_count_status(&in_range), WordCountStatus::InRange);
        let over = vec!["palabra"; 101].join(" ");
        assert_eq!(def.word_count_status(&over), WordCountStatus::Over);
    }

    #[test]
    fn test_constraints_carry_guidance() {
        let constraints = block(3).unwrap().constraints();
        assert_eq!(constraints.name, "EL SUPERPODER");
        assert_eq!(constraints.structure.len(), 3);
        assert!(!constraints.restrictions.is_empty());
        assert!(!constraints.prohibited.is_empty());
        assert!(constraints.example.starts_with("Coursera"));
    }
}
