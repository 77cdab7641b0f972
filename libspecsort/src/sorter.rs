use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::{EventSourceError, MonitorError, SortError};
use super::event_source::EventSource;
use super::parameter_map::ParameterMap;
use super::session::Session;
use super::sort_routine::{Event, SortRoutine, SortSetup};

/// Sorter owns the active sort routine and feeds it events.
///
/// A routine is initialized exactly once, in [`Sorter::activate`]. If initialization
/// fails, everything the routine registered is removed from the session and the routine
/// is dropped. Events shorter than the routine's parameter list are skipped and
/// counted, never sorted. Stopping takes effect between events.
pub struct Sorter {
    session: Arc<Session>,
    routine: Arc<dyn SortRoutine>,
    parameters: ParameterMap,
    events_sorted: u64,
    short_events: u64,
    stop_flag: Arc<AtomicBool>,
}

impl Sorter {
    /// Initialize `routine` against `session` and make it the active routine
    pub fn activate(
        session: Arc<Session>,
        mut routine: Box<dyn SortRoutine>,
    ) -> Result<Self, SortError> {
        let name = routine.name().to_string();
        if session.has_group(&name) {
            return Err(SortError::GroupInUse(name));
        }

        let mut setup = SortSetup::new(&session, &name);
        let result = routine.initialize(&mut setup);
        let parameters = setup.into_parameters();
        let result = result.and_then(|_| {
            if parameters.is_empty() {
                Err(SortError::NoParameters(name.clone()))
            } else {
                Ok(())
            }
        });

        if let Err(e) = result {
            spdlog::error!("Sort routine {} failed to initialize: {}", name, e);
            session.remove_group(&name);
            return Err(e);
        }

        spdlog::info!(
            "Activated sort routine {} with {} event parameters, {} histograms",
            name,
            parameters.event_size(),
            session.histograms_in_group(&name).len()
        );
        Ok(Self {
            session,
            routine: Arc::from(routine),
            parameters,
            events_sorted: 0,
            short_events: 0,
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn name(&self) -> &str {
        self.routine.name()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Shared handle to the routine, for the monitor timer
    pub fn routine(&self) -> Arc<dyn SortRoutine> {
        self.routine.clone()
    }

    pub fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    /// Number of words the routine expects in each event
    pub fn event_size(&self) -> usize {
        self.parameters.event_size()
    }

    pub fn events_sorted(&self) -> u64 {
        self.events_sorted
    }

    pub fn short_events(&self) -> u64 {
        self.short_events
    }

    /// Sort a single event. Returns false if the event was too short to sort.
    pub fn sort_event(&mut self, words: &[i32]) -> bool {
        if words.len() < self.parameters.event_size() {
            self.short_events += 1;
            return false;
        }
        self.routine.sort(&Event::new(words));
        self.events_sorted += 1;
        true
    }

    /// Update all monitors of the session, asking this routine for custom values
    pub fn update_monitors(&self) -> Result<(), MonitorError> {
        self.session.update_monitors(Some(self.routine.as_ref()))
    }

    /// Flag that can be raised from another thread to stop sorting
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Sort every event of `source` until it is exhausted or the sorter is stopped.
    ///
    /// Returns the number of events sorted by this call.
    pub fn sort_source(&mut self, source: &mut dyn EventSource) -> Result<u64, EventSourceError> {
        let start = self.events_sorted;
        let mut buffer: Vec<i32> = Vec::with_capacity(self.event_size());
        while !self.is_stopped() && source.next_event(&mut buffer)? {
            self.sort_event(&buffer);
        }
        if self.short_events > 0 {
            spdlog::warn!(
                "Sort routine {} skipped {} events shorter than {} words",
                self.name(),
                self.short_events,
                self.event_size()
            );
        }
        Ok(self.events_sorted - start)
    }
}
