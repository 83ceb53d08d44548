//! Derived aggregates computed before persistence

use std::cmp::Reverse;

use crate::git::languages::is_non_code_language;
use crate::git::{Hundredths, LanguageShare, LanguageStat};

/// Drop non-code formats and restate byte shares in exact hundredths of a percent that
/// sum to 100.00.
///
/// Shares are rounded half-up; the rounding residual is added to the entry with the
/// largest rounded share. Ordered by share, largest first. When the remaining
/// languages have no bytes every share is zero.
pub fn normalize_language_shares(languages: Vec<LanguageStat>) -> Vec<LanguageShare> {
    let code: Vec<LanguageStat> = languages
        .into_iter()
        .filter(|language| !is_non_code_language(&language.name))
        .collect();

    let whole = i64::from(Hundredths::WHOLE.0);
    let total: u128 = code.iter().map(|l| u128::from(l.bytes)).sum();
    if total == 0 {
        return code
            .into_iter()
            .map(|language| share(language, Hundredths::ZERO))
            .collect();
    }

    let mut shares: Vec<(i64, LanguageStat)> = code
        .into_iter()
        .map(|language| {
            let hundredths = (u128::from(language.bytes) * whole as u128 + total / 2) / total;
            (hundredths as i64, language)
        })
        .collect();
    shares.sort_by_key(|(hundredths, language)| (Reverse(*hundredths), language.name.clone()));

    let residual = whole - shares.iter().map(|(h, _)| h).sum::<i64>();
    if let Some((largest, _)) = shares.first_mut() {
        *largest += residual;
    }

    shares
        .into_iter()
        .map(|(hundredths, language)| {
            share(language, Hundredths(u32::try_from(hundredths).unwrap_or(0)))
        })
        .collect()
}

fn share(language: LanguageStat, percentage: Hundredths) -> LanguageShare {
    LanguageShare {
        name: language.name,
        bytes: language.bytes,
        lines: language.lines,
        percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn stat(name: &str, bytes: u64) -> LanguageStat {
        LanguageStat {
            name: name.to_string(),
            bytes,
            lines: bytes / 40,
            percentage: 0.0,
        }
    }

    fn hundredths(languages: &[LanguageShare]) -> Vec<u32> {
        languages.iter().map(|l| l.percentage.0).collect()
    }

    fn total(languages: &[LanguageShare]) -> Hundredths {
        languages.iter().map(|l| l.percentage).sum()
    }

    #[test]
    fn test_residual_lands_on_largest_share() {
        // 33.335 / 66.665 / 0.000 both round up, overshooting by 0.01
        let normalized = normalize_language_shares(vec![
            stat("Python", 66_670),
            stat("Rust", 133_330),
            stat("Shell", 0),
        ]);

        let names: Vec<&str> = normalized.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Rust", "Python", "Shell"]);
        assert_eq!(hundredths(&normalized), vec![6666, 3334, 0]);
        assert_eq!(total(&normalized), Hundredths::WHOLE);
    }

    #[test]
    fn test_thirds_are_corrected_upwards() {
        let normalized =
            normalize_language_shares(vec![stat("C", 100), stat("Go", 100), stat("Zig", 100)]);
        assert_eq!(hundredths(&normalized), vec![3334, 3333, 3333]);
        assert_eq!(normalized[0].name, "C");
    }

    #[test]
    fn test_shares_that_drift_as_floats_sum_exactly() {
        // 57.90 + 36.84 + 5.26 is 100.00000000000001 in f64
        let normalized =
            normalize_language_shares(vec![stat("Rust", 11), stat("Go", 7), stat("C", 1)]);
        assert_eq!(hundredths(&normalized), vec![5790, 3684, 526]);
        assert_eq!(total(&normalized), Hundredths::WHOLE);
        assert_eq!(total(&normalized).to_string(), "100.00");
    }

    #[test]
    fn test_small_triples_always_sum_to_whole() {
        for a in 1..60u64 {
            for b in 1..60u64 {
                let normalized = normalize_language_shares(vec![
                    stat("A", a),
                    stat("B", b),
                    stat("C", 7),
                ]);
                assert_eq!(total(&normalized), Hundredths::WHOLE, "bytes {a}/{b}/7");
            }
        }
    }

    #[test]
    fn test_non_code_languages_are_excluded() {
        let normalized = normalize_language_shares(vec![
            stat("TypeScript", 300),
            stat("JSON", 5_000),
            stat("Markdown", 2_000),
            stat("CSS", 100),
        ]);
        let names: Vec<&str> = normalized.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["TypeScript", "CSS"]);
        assert_eq!(hundredths(&normalized), vec![7500, 2500]);
    }

    #[test]
    fn test_only_non_code_yields_nothing() {
        let normalized = normalize_language_shares(vec![stat("YAML", 10), stat("TOML", 5)]);
        assert!(normalized.is_empty());
    }

    #[test]
    fn test_zero_bytes_yield_zero_shares() {
        let normalized = normalize_language_shares(vec![stat("Rust", 0), stat("Go", 0)]);
        assert_eq!(hundredths(&normalized), vec![0, 0]);
    }

    proptest! {
        #[test]
        fn prop_shares_sum_to_exactly_one_hundred(
            sizes in proptest::collection::vec(0u64..5_000_000, 1..24)
        ) {
            prop_assume!(sizes.iter().any(|&bytes| bytes > 0));
            let languages: Vec<LanguageStat> = sizes
                .iter()
                .enumerate()
                .map(|(i, &bytes)| stat(&format!("Lang{i}"), bytes))
                .collect();

            let normalized = normalize_language_shares(languages);
            prop_assert_eq!(total(&normalized), Hundredths::WHOLE);
        }
    }
}
