//! Event sinks for application lifecycle events

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use log::{error, info};

use crate::ps_interface::{AppId, Event, EventSink, SimTime};

// ============================================================================
// Console Logging Sink
// ============================================================================

/// Writes each event through the `log` facade at info level
pub struct ConsoleEventSink {
    enabled: bool,
}

impl ConsoleEventSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl EventSink for ConsoleEventSink {
    fn log(&mut self, time: SimTime, event: Event) {
        if !self.enabled {
            return;
        }

        match event {
            Event::ApplicationStarted {
                app,
                node,
                type_name,
            } => {
                info!("{} node:{} app:{} {} started", time, node, app, type_name);
            }
            Event::ApplicationStopped {
                app,
                node,
                type_name,
            } => {
                info!("{} node:{} app:{} {} stopped", time, node, app, type_name);
            }
            Event::SimulationStopped => {
                info!("{} simulation stopped", time);
            }
        }
    }
}

// ============================================================================
// CSV Event Sink
// ============================================================================

/// CSV event sink for structured data export
pub struct CsvEventSink {
    writer: BufWriter<File>,
}

impl CsvEventSink {
    pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "time_ns,event,node,app,app_type")?;

        Ok(Self { writer })
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl EventSink for CsvEventSink {
    fn log(&mut self, time: SimTime, event: Event) {
        let t = time.as_nanos();
        let result = match event {
            Event::ApplicationStarted {
                app,
                node,
                type_name,
            } => writeln!(self.writer, "{},ApplicationStarted,{},{},{}", t, node, app, type_name),
            Event::ApplicationStopped {
                app,
                node,
                type_name,
            } => writeln!(self.writer, "{},ApplicationStopped,{},{},{}", t, node, app, type_name),
            Event::SimulationStopped => writeln!(self.writer, "{},SimulationStopped,,,", t),
        };

        if let Err(e) = result {
            error!("Error writing to CSV: {}", e);
        }
    }
}

impl Drop for CsvEventSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

// ============================================================================
// Collector Event Sink (In-Memory)
// ============================================================================

/// Collects events in memory for programmatic analysis
#[derive(Default)]
pub struct CollectorEventSink {
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub time: SimTime,
    pub event: Event,
}

impl CollectorEventSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn starts(&self) -> impl Iterator<Item = &EventRecord> {
        self.events
            .iter()
            .filter(|e| matches!(e.event, Event::ApplicationStarted { .. }))
    }

    pub fn stops(&self) -> impl Iterator<Item = &EventRecord> {
        self.events
            .iter()
            .filter(|e| matches!(e.event, Event::ApplicationStopped { .. }))
    }

    pub fn for_app(&self, app_id: AppId) -> impl Iterator<Item = &EventRecord> {
        self.events.iter().filter(move |e| match e.event {
            Event::ApplicationStarted { app, .. } | Event::ApplicationStopped { app, .. } => {
                app == app_id
            }
            Event::SimulationStopped => false,
        })
    }

    /// Time of the terminal stop event, if it fired
    pub fn stopped_at(&self) -> Option<SimTime> {
        self.events
            .iter()
            .find(|e| e.event == Event::SimulationStopped)
            .map(|e| e.time)
    }

    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut csv_sink = CsvEventSink::new(path)?;
        for record in &self.events {
            csv_sink.log(record.time, record.event.clone());
        }
        csv_sink.flush()
    }
}

impl EventSink for CollectorEventSink {
    fn log(&mut self, time: SimTime, event: Event) {
        self.events.push(EventRecord { time, event });
    }
}

// ============================================================================
// Shared and Multi Sinks
// ============================================================================

/// Lets the caller keep a handle on a sink the engine owns
impl<T: EventSink> EventSink for Rc<RefCell<T>> {
    fn log(&mut self, time: SimTime, event: Event) {
        self.borrow_mut().log(time, event);
    }
}

/// Combines multiple event sinks
#[derive(Default)]
pub struct MultiEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl MultiEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for MultiEventSink {
    fn log(&mut self, time: SimTime, event: Event) {
        for sink in &mut self.sinks {
            sink.log(time, event.clone());
        }
    }
}
