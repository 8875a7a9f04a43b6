//! Simulated extraction tier.
//!
//! Used when no credential is configured (or on any failure, under the
//! permissive policy). Returns plausible exemplar values after an artificial
//! delay so callers keep the same timing assumptions as the live tier.

use std::time::Duration;

use rand::seq::SliceRandom;

use super::parse::{FactoryDetails, OcDetails, DEFECT_CATEGORIES};

const DEFECT_DESCRIPTIONS: &[&str] = &[
    "Single vertical line visible across the full panel height, consistent with a broken source driver bond.",
    "Cluster of bright dots in the upper-left quadrant; backlight and TFT layers otherwise intact.",
    "Panel powers on but shows no image; backlight active, suspect T-CON board or LVDS connection failure.",
    "Horizontal banding across the lower third of the display, intensity varies with content brightness.",
];

const OC_SERIALS: &[&str] = &["TA5144002917", "1500258113094", "0MF2L9A03217"];
const WC_CODES: &[&str] = &["2505", "2451", "2507"];
const MODEL_PNS: &[&str] = &["ST3151A07-2", "CV500U5-L04", "V430DJ2-Q01"];
const VERSIONS: &[&str] = &["Ver.2.9", "Rev: 02", "P2"];

const ODF_NUMBERS: &[&str] = &["TS2501-291", "IDL2507002", "TS2503-118"];
const SIZES: &[&str] = &["32\"", "43\"", "50\"", "65\""];
const BOMS: &[&str] = &["2300132VA1Z01510", "2300143VB2Z00220", "2300150VA1Z01880"];

fn pick(pool: &[&str]) -> String {
    pool.choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}

async fn delay(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Synthetic free-text defect description.
pub async fn defect_description(delay_ms: u64) -> String {
    delay(delay_ms).await;
    pick(DEFECT_DESCRIPTIONS)
}

/// Synthetic category, always a member of the fixed set.
pub async fn defect_category(delay_ms: u64) -> String {
    delay(delay_ms).await;
    pick(&DEFECT_CATEGORIES)
}

/// Synthetic OC label fields.
pub async fn oc_details(delay_ms: u64) -> OcDetails {
    delay(delay_ms).await;
    OcDetails {
        oc_serial_number: pick(OC_SERIALS),
        wc: pick(WC_CODES),
        model_pn: pick(MODEL_PNS),
        ver: pick(VERSIONS),
    }
}

/// Synthetic factory label fields.
pub async fn factory_details(delay_ms: u64) -> FactoryDetails {
    delay(delay_ms).await;
    FactoryDetails {
        odf: pick(ODF_NUMBERS),
        size: pick(SIZES),
        bom: pick(BOMS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_category_in_fixed_set() {
        for _ in 0..20 {
            let category = defect_category(0).await;
            assert!(DEFECT_CATEGORIES.contains(&category.as_str()));
        }
    }

    #[tokio::test]
    async fn test_simulated_fields_all_non_empty() {
        let oc = oc_details(0).await;
        assert!(!oc.oc_serial_number.is_empty());
        assert!(!oc.wc.is_empty());
        assert!(!oc.model_pn.is_empty());
        assert!(!oc.ver.is_empty());

        let factory = factory_details(0).await;
        assert!(!factory.odf.is_empty());
        assert!(!factory.size.is_empty());
        assert!(!factory.bom.is_empty());

        assert!(!defect_description(0).await.is_empty());
    }
}
