/// Phase of a replay, used to color progress bars
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SortPhase {
    #[default]
    Starting,
    Sorting,
    Finished,
}

/// Progress message sent from the sort thread to the UI
#[derive(Debug, Clone, Default)]
pub struct SortStatus {
    pub progress: f32,
    pub events_sorted: u64,
    pub phase: SortPhase,
}

impl SortStatus {
    pub fn new(progress: f32, events_sorted: u64, phase: SortPhase) -> Self {
        Self {
            progress,
            events_sorted,
            phase,
        }
    }
}
