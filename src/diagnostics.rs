//! Diagnostic event stream for the generation pipeline.
//!
//! The orchestrator reports progress through a sink handed to it by the
//! caller instead of writing to a global logger. The binary forwards
//! events to `tracing`; tests record them.

use std::fmt;

/// Pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Elevation,
    Landmass,
    Coastline,
    Mountains,
    Cliffs,
    Forests,
    Regions,
    Obstruction,
    Roads,
    Spawns,
    Expansions,
    NeutralStructures,
    Resources,
    Decoration,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Elevation => "elevation",
            Stage::Landmass => "landmass",
            Stage::Coastline => "coastline",
            Stage::Mountains => "mountains",
            Stage::Cliffs => "cliffs",
            Stage::Forests => "forests",
            Stage::Regions => "regions",
            Stage::Obstruction => "obstruction",
            Stage::Roads => "roads",
            Stage::Spawns => "spawns",
            Stage::Expansions => "expansions",
            Stage::NeutralStructures => "neutral structures",
            Stage::Resources => "resources",
            Stage::Decoration => "decoration",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A structured progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationEvent {
    StageStarted(Stage),
    StageFinished { stage: Stage, detail: String },
    PathTiled {
        kind: String,
        points: usize,
        cost: f32,
    },
    ResourceShortfall { target: u64, placed: u64 },
    Note(String),
}

/// Receiver of generation events.
pub trait DiagnosticSink {
    fn event(&mut self, event: &GenerationEvent);
}

impl<F: FnMut(&GenerationEvent)> DiagnosticSink for F {
    fn event(&mut self, event: &GenerationEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Default, Debug)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn event(&mut self, _event: &GenerationEvent) {}
}

/// Keeps every event in order.
#[derive(Default, Debug)]
pub struct RecordingSink {
    pub events: Vec<GenerationEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages that reported completion, in order.
    pub fn finished_stages(&self) -> Vec<Stage> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GenerationEvent::StageFinished { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn event(&mut self, event: &GenerationEvent) {
        self.events.push(event.clone());
    }
}

/// Forwards events to the `tracing` subscriber installed by the host.
#[derive(Default, Debug)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn event(&mut self, event: &GenerationEvent) {
        match event {
            GenerationEvent::StageStarted(stage) => tracing::debug!(%stage, "stage started"),
            GenerationEvent::StageFinished { stage, detail } => {
                tracing::info!(%stage, "{detail}")
            }
            GenerationEvent::PathTiled { kind, points, cost } => {
                tracing::debug!(%kind, points, cost, "path tiled")
            }
            GenerationEvent::ResourceShortfall { target, placed } => {
                tracing::warn!(resource_target = *target, placed = *placed, "resource target not reached")
            }
            GenerationEvent::Note(text) => tracing::info!("{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink_receives_events() {
        let mut count = 0;
        {
            let mut sink = |_: &GenerationEvent| count += 1;
            sink.event(&GenerationEvent::Note("hello".into()));
            sink.event(&GenerationEvent::StageStarted(Stage::Elevation));
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_recording_sink_lists_finished_stages() {
        let mut sink = RecordingSink::new();
        sink.event(&GenerationEvent::StageStarted(Stage::Elevation));
        sink.event(&GenerationEvent::StageFinished {
            stage: Stage::Elevation,
            detail: String::new(),
        });
        assert_eq!(sink.finished_stages(), vec![Stage::Elevation]);
    }
}
