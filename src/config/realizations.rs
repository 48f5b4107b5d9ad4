//! Parsing of active-realization range strings such as `0-9,12,15-17`.

use crate::context::ActiveMask;
use crate::error::{RunError, RunResult};

/// Parse a comma separated list of indices and inclusive ranges into a mask
/// over `ensemble_size` realizations.
pub fn parse_realizations(ranges: &str, ensemble_size: usize) -> RunResult<ActiveMask> {
    let mut indices = Vec::new();
    for part in ranges.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start, ranges)?;
                let end = parse_index(end, ranges)?;
                check_bound(end, ensemble_size)?;
                if end < start {
                    return Err(RunError::InvalidConfiguration(format!(
                        "realization range '{}' is reversed",
                        part
                    )));
                }
                indices.extend(start..=end);
            }
            None => {
                let index = parse_index(part, ranges)?;
                check_bound(index, ensemble_size)?;
                indices.push(index);
            }
        }
    }
    ActiveMask::from_indices(ensemble_size, &indices)
}

fn check_bound(index: usize, ensemble_size: usize) -> RunResult<()> {
    if index >= ensemble_size {
        return Err(RunError::InvalidConfiguration(format!(
            "realization {} is outside the ensemble of {} realizations",
            index, ensemble_size
        )));
    }
    Ok(())
}

fn parse_index(raw: &str, ranges: &str) -> RunResult<usize> {
    raw.trim().parse().map_err(|_| {
        RunError::InvalidConfiguration(format!(
            "cannot parse '{}' in realization selection '{}'",
            raw.trim(),
            ranges
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ranges_and_singles() {
        let mask = parse_realizations("0-2, 5,7-8", 10).unwrap();
        assert_eq!(mask.active_indices(), vec![0, 1, 2, 5, 7, 8]);
        assert_eq!(mask.len(), 10);
    }

    #[test]
    fn test_empty_selection_gives_no_active() {
        let mask = parse_realizations("", 4).unwrap();
        assert_eq!(mask.count_active(), 0);
    }

    #[test]
    fn test_reversed_range() {
        assert!(parse_realizations("5-2", 10).is_err());
    }

    #[test]
    fn test_garbage() {
        let err = parse_realizations("1,x", 10).unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_out_of_range() {
        assert!(parse_realizations("0-10", 10).is_err());
        assert!(parse_realizations("12", 10).is_err());
    }

    #[test]
    fn test_huge_upper_bound_is_rejected_without_expanding() {
        let err = parse_realizations("0-18446744073709551615", 10).unwrap_err();
        assert!(matches!(err, RunError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("outside the ensemble of 10"));

        assert!(parse_realizations("3-4000000000", 10).is_err());
    }
}
