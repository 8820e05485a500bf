//! Cropland Data Layer class mappings for the study basins
//!
//! Both tables collapse USDA CDL crop codes into three classes:
//! 1 = agriculture, 2 = open water, 3 = developed. Everything else
//! (background, fallow/idle, grassland, forest, wetlands) is sent to the
//! no-data code. The two basins were digitised separately and differ
//! at a few breaks, e.g. `(60.5, 61.5]` here against `(59.5, 61.5]` for Kansas.

use super::reclassify::{ClassRule, ClassificationRule};

/// No-data / background class used by both tables
pub const CDL_NO_DATA: f64 = 0.0;

fn build(table: &[(f64, f64, f64)]) -> ClassificationRule {
    ClassificationRule::new(
        table
            .iter()
            .map(|&(low, high, code)| ClassRule::new(low, high, code))
            .collect(),
    )
    .unwrap_or_else(|e| unreachable!("built-in CDL table is valid: {e}"))
}

/// Arizona basin mapping
pub fn cdl_arizona() -> ClassificationRule {
    build(&[
        (0.0, 0.5, CDL_NO_DATA),
        (1.0, 59.5, 1.0),
        (67.5, 75.5, 1.0),
        (203.5, 250.0, 1.0),
        (110.5, 111.5, 2.0),
        (120.5, 124.5, 3.0),
        (60.5, 61.5, CDL_NO_DATA),
        (130.5, 195.5, CDL_NO_DATA),
    ])
}

/// Kansas basin mapping
pub fn cdl_kansas() -> ClassificationRule {
    build(&[
        (0.0, 0.5, CDL_NO_DATA),
        (1.0, 59.5, 1.0),
        (66.5, 77.5, 1.0),
        (203.5, 255.0, 1.0),
        (110.5, 111.5, 2.0),
        (111.5, 112.5, CDL_NO_DATA),
        (120.5, 124.5, 3.0),
        (59.5, 61.5, CDL_NO_DATA),
        (130.5, 195.5, CDL_NO_DATA),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert_eq!(cdl_arizona().len(), 8);
        assert_eq!(cdl_kansas().len(), 9);
    }

    #[test]
    fn test_common_codes() {
        for rules in [cdl_arizona(), cdl_kansas()] {
            assert_eq!(rules.classify(24.0), Some(1.0)); // winter wheat
            assert_eq!(rules.classify(111.0), Some(2.0)); // open water
            assert_eq!(rules.classify(122.0), Some(3.0)); // developed, low intensity
            assert_eq!(rules.classify(176.0), Some(CDL_NO_DATA)); // grassland/pasture
        }
    }

    #[test]
    fn test_basins_differ_on_fallow_break() {
        // code 60 (switchgrass) is unmapped in Arizona, background in Kansas
        assert_eq!(cdl_arizona().classify(60.0), None);
        assert_eq!(cdl_kansas().classify(60.0), Some(CDL_NO_DATA));
        // code 76 (walnuts) only counted as agriculture in Kansas
        assert_eq!(cdl_arizona().classify(76.0), None);
        assert_eq!(cdl_kansas().classify(76.0), Some(1.0));
    }
}
