//! # specsort
//!
//! specsort is an event-driven histogramming engine for nuclear-physics spectroscopy,
//! written in Rust. It takes a stream of raw events (fixed-size integer arrays produced by
//! digitizer hardware or replayed from a file) and reduces them in real time into 1-D and
//! 2-D histograms, conditionally filtered by gates, while tracking scaler counters and
//! rate monitors.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, you will
//! most likely need to install the Rust tool chain. See the
//! [Rust docs](https://www.rust-lang.org/tools/install) for installation instructions.
//!
//! To download specsort clone the git repository using
//! `git clone https://github.com/attpc/specsort.git`
//!
//! To build and install the replay CLI use `cargo install --path ./specsort_cli` from the
//! top level specsort repository.
//!
//! ## Overview
//!
//! Everything lives in a [`session::Session`]: histograms, gates, scalers and monitors, each
//! registered under the name of the sort routine that created it. A sort routine
//! implements [`sort_routine::SortRoutine`]. It is handed to a [`sorter::Sorter`], which
//! initializes it exactly once and then feeds it events:
//!
//! ```no_run
//! use std::sync::Arc;
//! use libspecsort::routines::SpectrumSort;
//! use libspecsort::session::Session;
//! use libspecsort::sorter::Sorter;
//!
//! let session = Arc::new(Session::new());
//! let mut sorter = Sorter::activate(session.clone(), Box::new(SpectrumSort::new())).unwrap();
//! sorter.sort_event(&[100, 5]);
//! let e = session.histogram("E").unwrap();
//! assert_eq!(e.area(), 1.0);
//! ```
//!
//! During initialization the routine declares its event parameters by hardware address
//! (slot, channel, threshold) and gets back the index of each one in the event array. It
//! also creates its histograms and gates, receiving typed handles
//! ([`histogram::Histogram1D`], [`gate::Gate2D`], ...) so a 1-D gate can never be asked
//! about a 2-D coordinate. If anything fails, every object the routine registered is
//! removed again.
//!
//! Counts are stored in per-bin atomics, so snapshots can be taken from any thread while
//! sorting continues. 2-D gates precompute a bit mask of the channels inside their
//! polygon; changing the polygon builds a new mask and swaps it in under a lock.
//!
//! Monitors are recomputed on a timer ([`monitor_timer::MonitorTimer`]): scaler and gate
//! monitors report a rate, custom monitors ask the routine.
//!
//! ## Configuration
//!
//! The replay CLI reads a YAML config:
//!
//! ```yml
//! event_path: /path/to/run_0001.evt
//! routine: SpectrumSort
//! event_size: 2
//! monitor_interval: 10.0
//! max_events: null
//! log_path: ./specsort.log
//! ```
//!
//! `routine` must be one of the built-in routines (`SpectrumSort`, `DeadTimeSort`).
//! `event_size` is the number of 32-bit words per event in the event file.
//! `monitor_interval` is in seconds. If `max_events` is set, replay stops after that many
//! events.
//!
//! ### Event File Format
//!
//! An event file is a flat stream of little-endian signed 32-bit words, `event_size` words
//! per event, with no headers. A file that ends in the middle of an event is an error.
pub mod calibration;
pub mod compression;
pub mod config;
pub mod constants;
pub mod error;
pub mod event_source;
pub mod gate;
pub mod histogram;
pub mod monitor;
pub mod monitor_timer;
pub mod parameter_map;
pub mod peak_finder;
pub mod process;
pub mod routines;
pub mod scaler;
pub mod session;
pub mod sort_routine;
pub mod sort_status;
pub mod sorter;
