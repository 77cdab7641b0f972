//! Built-in sort routines, selectable by name from a config
mod dead_time_sort;
mod spectrum_sort;

pub use dead_time_sort::DeadTimeSort;
pub use spectrum_sort::SpectrumSort;

use super::sort_routine::SortRoutine;

/// Names accepted by [`routine_by_name`]
pub const ROUTINE_NAMES: [&str; 2] = [SpectrumSort::NAME, DeadTimeSort::NAME];

/// Create a fresh, uninitialized routine from its name
pub fn routine_by_name(name: &str) -> Option<Box<dyn SortRoutine>> {
    match name {
        SpectrumSort::NAME => Some(Box::new(SpectrumSort::new())),
        DeadTimeSort::NAME => Some(Box::new(DeadTimeSort::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routine_by_name() {
        for name in ROUTINE_NAMES {
            assert_eq!(routine_by_name(name).map(|r| r.name().to_string()), Some(name.to_string()));
        }
        assert!(routine_by_name("Nope").is_none());
    }
}
