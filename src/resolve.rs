//! Clothing and activity descriptors to clo / met values (ISO 7730 tables).

use tracing::{debug, info};

use crate::records::{AlignedRecord, ResolvedRecord};

/// Clothing ensembles and their insulation in clo.
pub static CLOTHING_INSULATION: &[(&str, f64)] = &[
    ("Caleçon, combinaison, chaussettes, chaussures", 0.70),
    ("Caleçon, chemise, combinaison, chaussettes, chaussures", 0.80),
    ("Caleçon, chemise, pantalon, blouse, chaussettes, chaussures", 0.90),
    (
        "Sous-vêtements à manches et jambes courtes, chemise, pantalon, veste, chaussettes, chaussures",
        1.00,
    ),
    (
        "Sous-vêtements à manches et jambes longues, veste isolante, chaussettes, chaussures",
        1.20,
    ),
    (
        "Sous-vêtements à manches et jambes courtes, chemise, pantalon, veste, veste et pantalon isolants, chaussettes, chaussures, casquette, gants",
        1.40,
    ),
    (
        "Sous-vêtements à manches et jambes courtes, chemise, pantalon, veste, veste et pantalon isolants, chaussettes, chaussures",
        2.00,
    ),
    (
        "Sous-vêtements à manches et jambes longues, veste et pantalon isolant, parka isolante, combinaison ouatinée, chaussettes, chaussures, casquette, gants",
        2.55,
    ),
];

/// Activities and their metabolic rate in met.
pub static ACTIVITY_METABOLIC_RATE: &[(&str, f64)] = &[
    ("Repos, couché", 0.8),
    ("Repos, assis", 1.0),
    ("Activité sédentaire (bureau, domicile, école, laboratoire)", 1.2),
    ("Activité légère, debout (achats, laboratoire, industrie légère)", 1.6),
    ("Activité moyenne, debout (vente, travail ménager, travail sur machine)", 2.0),
    ("Marche à plat: 2 km/h", 1.9),
    ("Marche à plat: 3 km/h", 2.4),
    ("Marche à plat: 4 km/h", 2.8),
    ("Marche à plat: 5 km/h", 3.4),
];

fn lookup(table: &[(&str, f64)], descriptor: &str) -> Option<f64> {
    let descriptor = descriptor.trim();
    table
        .iter()
        .find(|(name, _)| *name == descriptor)
        .map(|(_, value)| *value)
}

/// Clothing insulation for a descriptor, `None` when it is not in the table.
pub fn resolve_clo(clothing: &str) -> Option<f64> {
    lookup(CLOTHING_INSULATION, clothing)
}

/// Metabolic rate for a descriptor, `None` when it is not in the table.
pub fn resolve_met(activity: &str) -> Option<f64> {
    lookup(ACTIVITY_METABOLIC_RATE, activity)
}

/// Resolved records plus counts of descriptors that matched nothing.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub records: Vec<ResolvedRecord>,
    pub unmapped_clothing: usize,
    pub unmapped_activity: usize,
}

/// Looks up clo and met for every aligned record.
///
/// Descriptors are trimmed on output too, so later artifacts carry the text
/// that was actually looked up.
pub fn resolve(aligned: &[AlignedRecord]) -> Resolution {
    let mut unmapped_clothing = 0;
    let mut unmapped_activity = 0;

    let records = aligned
        .iter()
        .map(|record| {
            let mut record = record.clone();
            record.survey.clothing = record.survey.clothing.trim().to_string();
            record.survey.activity = record.survey.activity.trim().to_string();

            let clo = resolve_clo(&record.survey.clothing);
            let met = resolve_met(&record.survey.activity);

            if clo.is_none() {
                unmapped_clothing += 1;
                debug!(clothing = %record.survey.clothing, "Unmapped clothing descriptor");
            }
            if met.is_none() {
                unmapped_activity += 1;
                debug!(activity = %record.survey.activity, "Unmapped activity descriptor");
            }

            ResolvedRecord {
                aligned: record,
                clo,
                met,
            }
        })
        .collect();

    info!(unmapped_clothing, unmapped_activity, "Descriptors resolved");

    Resolution {
        records,
        unmapped_clothing,
        unmapped_activity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SurveyResponse;
    use chrono::NaiveDate;

    fn aligned(clothing: &str, activity: &str) -> AlignedRecord {
        AlignedRecord {
            partition_key: "101".into(),
            survey_time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            survey: SurveyResponse {
                clothing: clothing.into(),
                activity: activity.into(),
            },
            matched_time: None,
            environment: None,
        }
    }

    #[test]
    fn test_every_table_entry_resolves() {
        for (name, clo) in CLOTHING_INSULATION {
            assert_eq!(resolve_clo(name), Some(*clo));
        }
        for (name, met) in ACTIVITY_METABOLIC_RATE {
            assert_eq!(resolve_met(name), Some(*met));
        }
    }

    #[test]
    fn test_descriptors_are_trimmed() {
        assert_eq!(resolve_met("  Repos, assis \t"), Some(1.0));
        assert_eq!(
            resolve_clo(" Caleçon, combinaison, chaussettes, chaussures\n"),
            Some(0.70)
        );
    }

    #[test]
    fn test_activity_in_clothing_field_is_absent() {
        assert_eq!(resolve_clo("Repos, assis"), None);
        assert_eq!(
            resolve_met("Caleçon, combinaison, chaussettes, chaussures"),
            None
        );
    }

    #[test]
    fn test_no_default_for_unknown_or_empty() {
        assert_eq!(resolve_clo(""), None);
        assert_eq!(resolve_met("repos, assis"), None);
        assert_eq!(resolve_met("Marche à plat: 6 km/h"), None);
    }

    #[test]
    fn test_resolve_counts_unmapped() {
        let input = vec![
            aligned("Repos, assis", "Caleçon, combinaison, chaussettes, chaussures"),
            aligned(
                " Caleçon, chemise, combinaison, chaussettes, chaussures ",
                "Repos, couché",
            ),
        ];

        let resolution = resolve(&input);

        assert_eq!(resolution.records.len(), 2);
        assert_eq!(resolution.unmapped_clothing, 1);
        assert_eq!(resolution.unmapped_activity, 1);

        let first = &resolution.records[0];
        assert_eq!(first.clo, None);
        assert_eq!(first.met, None);

        let second = &resolution.records[1];
        assert_eq!(second.clo, Some(0.80));
        assert_eq!(second.met, Some(0.8));
        assert_eq!(
            second.aligned.survey.clothing,
            "Caleçon, chemise, combinaison, chaussettes, chaussures"
        );
    }

    #[test]
    fn test_resolve_leaves_input_untouched() {
        let input = vec![aligned("  x  ", "  y  ")];
        let _ = resolve(&input);
        assert_eq!(input[0].survey.clothing, "  x  ");
    }
}
