// src/export.rs - Per-session feedback log and summary files
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::feedback::FeedbackEvent;
use crate::state_machine::Phase;

/// `<exercise>_<YYYYmmdd_HHMMSS>` in local time.
pub fn default_session_name(exercise: &str) -> String {
    let slug = exercise.trim().to_lowercase().replace(' ', "_");
    format!("{}_{}", slug, Local::now().format("%Y%m%d_%H%M%S"))
}

#[derive(Debug, Serialize)]
struct FeedbackRecord<'a> {
    frame: usize,
    timestamp: f64,
    tracked: bool,
    phase: Phase,
    count: u32,
    perfect: bool,
    error: Option<&'a str>,
    guidance: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub exercise: String,
    pub session: String,
    pub frames: usize,
    pub tracked_ratio: f64,
    pub duration_seconds: f64,
    pub final_count: u32,
    pub perfect_reps: usize,
    pub most_frequent_error: Option<String>,
}

pub struct SessionRecorder {
    output_dir: PathBuf,
    session_name: String,
    exercise: String,
    events: Vec<FeedbackEvent>,
    timestamps: Vec<f64>,
}

impl SessionRecorder {
    pub fn new(output_dir: impl AsRef<Path>, exercise: &str, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| default_session_name(exercise));

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            exercise: exercise.to_string(),
            events: Vec::new(),
            timestamps: Vec::new(),
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn add_frame(&mut self, timestamp: f64, event: FeedbackEvent) {
        self.timestamps.push(timestamp);
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let dir = self.session_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating session directory {}", dir.display()))?;

        let csv_path = dir.join("feedback.csv");
        let file = File::create(&csv_path)
            .with_context(|| format!("creating {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);

        for (i, (event, timestamp)) in self.events.iter().zip(&self.timestamps).enumerate() {
            writer.serialize(FeedbackRecord {
                frame: i,
                timestamp: *timestamp,
                tracked: event.tracked,
                phase: event.phase,
                count: event.count,
                perfect: event.perfect,
                error: event.error.as_deref(),
                guidance: &event.guidance,
            })?;
        }

        writer.flush()?;
        Ok(csv_path)
    }

    pub fn summary(&self) -> SessionSummary {
        let frames = self.events.len();
        let tracked = self.events.iter().filter(|e| e.tracked).count();

        // Tracking-loss labels are not form errors
        let mut errors: HashMap<&str, usize> = HashMap::new();
        for event in self.events.iter().filter(|e| e.tracked) {
            if let Some(error) = &event.error {
                *errors.entry(error.as_str()).or_default() += 1;
            }
        }
        let most_frequent_error = errors
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(label, _)| label.to_string());

        let duration_seconds = match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => (last - first).max(0.0),
            _ => 0.0,
        };

        SessionSummary {
            exercise: self.exercise.clone(),
            session: self.session_name.clone(),
            frames,
            tracked_ratio: if frames == 0 {
                0.0
            } else {
                tracked as f64 / frames as f64
            },
            duration_seconds,
            final_count: self.events.iter().map(|e| e.count).max().unwrap_or(0),
            perfect_reps: self.events.iter().filter(|e| e.perfect && e.phase == Phase::Up).count(),
            most_frequent_error,
        }
    }

    pub fn export_summary(&self) -> Result<PathBuf> {
        let dir = self.session_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating session directory {}", dir.display()))?;

        let path = dir.join("summary.json");
        let json = serde_json::to_string_pretty(&self.summary())?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Write both files and return the session directory.
    pub fn export(&self) -> Result<PathBuf> {
        self.export_csv()?;
        self.export_summary()?;
        Ok(self.session_dir())
    }
}
