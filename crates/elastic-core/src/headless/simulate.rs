//! Scripted gesture replay
//!
//! A [`GestureScript`] describes one container and a timed list of touch
//! steps. [`Simulation`] replays it against a [`HeadlessDom`] driven by a real
//! [`ElasticBounce`], sampling the container once per frame.

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{HeadlessDom, NodeId};
use crate::config::{BounceOptions, BounceOptionsPatch, SimulationConfig};
use crate::fleet::ElasticBounce;
use crate::host::{Dom, Scheduler};
use crate::Result;

const SIMULATED_ID: &str = "elastic-simulation";

/// Scroll geometry of the simulated container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default = "default_client_height")]
    pub client_height: f64,
    #[serde(default = "default_scroll_height")]
    pub scroll_height: f64,
    #[serde(default)]
    pub scroll_top: f64,
}

impl Default for ContainerSpec {
    fn default() -> Self {
        Self {
            client_height: default_client_height(),
            scroll_height: default_scroll_height(),
            scroll_top: 0.0,
        }
    }
}

impl From<&SimulationConfig> for ContainerSpec {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            client_height: config.container_height,
            scroll_height: config.scroll_height,
            scroll_top: 0.0,
        }
    }
}

fn default_client_height() -> f64 {
    400.0
}

fn default_scroll_height() -> f64 {
    1200.0
}

/// One input applied to the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GestureAction {
    Start { y: f64 },
    Move { y: f64 },
    End,
    Cancel,
    /// Jump the native scroll offset
    ScrollTo { top: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureStep {
    /// Time from the start of the simulation
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: GestureAction,
}

impl GestureStep {
    fn at(&self) -> Duration {
        Duration::from_millis(self.at_ms)
    }
}

/// Replayable gesture
///
/// ```json
/// {
///   "container": { "client_height": 400, "scroll_height": 1200 },
///   "options": { "maxStretch": 0.2 },
///   "steps": [
///     { "at_ms": 0, "event": "start", "y": 100 },
///     { "at_ms": 16, "event": "move", "y": 200 },
///     { "at_ms": 200, "event": "end" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GestureScript {
    #[serde(default)]
    pub container: Option<ContainerSpec>,
    #[serde(default)]
    pub options: BounceOptionsPatch,
    #[serde(default)]
    pub steps: Vec<GestureStep>,
}

impl GestureScript {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Container state at the end of one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSample {
    pub at_ms: u64,
    /// Inline `transform`, `none` when unset
    pub transform: String,
    pub origin: Option<String>,
    /// Visual scale including any running transition
    pub rendered_scale: f64,
    pub touching: bool,
}

impl fmt::Display for FrameSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>6}ms  scale {:.4}  {:<24} origin {:<6} {}",
            self.at_ms,
            self.rendered_scale,
            self.transform,
            self.origin.as_deref().unwrap_or("-"),
            if self.touching { "touching" } else { "" }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub frames: Vec<FrameSample>,
    pub peak_scale: f64,
    pub final_scale: f64,
    pub status: String,
}

/// Frame-by-frame replay of a [`GestureScript`]
pub struct Simulation {
    dom: Rc<HeadlessDom>,
    fleet: ElasticBounce<HeadlessDom>,
    container: NodeId,
    steps: VecDeque<GestureStep>,
    frame_interval: Duration,
    end: Duration,
}

impl Simulation {
    /// Prepare a document holding one managed container
    ///
    /// `defaults` come from the config file; the script's own options are
    /// merged on top.
    pub fn new(script: &GestureScript, defaults: &BounceOptions, config: &SimulationConfig) -> Self {
        let frame_interval = Duration::from_millis(config.frame_interval_ms.max(1));
        let dom = Rc::new(HeadlessDom::new());
        dom.set_frame_interval(frame_interval);

        let spec = script
            .container
            .unwrap_or_else(|| ContainerSpec::from(config));
        let container = dom
            .element("div")
            .id(SIMULATED_ID)
            .scrollable(spec.scroll_top, spec.scroll_height, spec.client_height)
            .append_to(dom.body());

        let mut base = defaults.merged(&script.options);
        base.container = format!("#{}", SIMULATED_ID);
        let fleet = ElasticBounce::with_defaults(Rc::clone(&dom), base);
        fleet.init(&BounceOptionsPatch::default());

        let mut steps: Vec<GestureStep> = script.steps.clone();
        steps.sort_by_key(|s| s.at_ms);
        let last = steps.last().map(GestureStep::at).unwrap_or_default();
        // leave room for the settle window and the whole recovery
        let end = last + fleet.options().scroll.animation_duration() + frame_interval * 4;

        Self {
            dom,
            fleet,
            container,
            steps: steps.into(),
            frame_interval,
            end,
        }
    }

    pub fn dom(&self) -> &HeadlessDom {
        &self.dom
    }

    pub fn fleet(&self) -> &ElasticBounce<HeadlessDom> {
        &self.fleet
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn is_finished(&self) -> bool {
        self.steps.is_empty() && self.dom.now() >= self.end
    }

    /// Advance one frame, applying any steps due within it
    pub fn step(&mut self) -> Option<FrameSample> {
        if self.is_finished() {
            return None;
        }
        let frame_end = self.dom.now() + self.frame_interval;
        while self.steps.front().is_some_and(|s| s.at() <= frame_end) {
            let Some(step) = self.steps.pop_front() else {
                break;
            };
            let now = self.dom.now();
            self.dom.advance(step.at().saturating_sub(now));
            self.apply(&step.action);
        }
        let now = self.dom.now();
        self.dom.advance(frame_end.saturating_sub(now));
        Some(self.sample())
    }

    fn apply(&self, action: &GestureAction) {
        let target = self.container;
        match *action {
            GestureAction::Start { y } => {
                self.dom.touch_start(target, y);
            }
            GestureAction::Move { y } => {
                self.dom.touch_move(target, y);
            }
            GestureAction::End => {
                self.dom.touch_end(target);
            }
            GestureAction::Cancel => {
                self.dom.touch_cancel(target);
            }
            GestureAction::ScrollTo { top } => self.dom.set_scroll_top(target, top),
        }
    }

    fn sample(&self) -> FrameSample {
        let el = self.container;
        FrameSample {
            at_ms: self.dom.now().as_millis() as u64,
            transform: self
                .dom
                .style(&el, "transform")
                .unwrap_or_else(|| "none".to_string()),
            origin: self.dom.style(&el, "transform-origin"),
            rendered_scale: self.dom.rendered_scale(el),
            touching: self
                .fleet
                .controller(&el)
                .is_some_and(|c| c.is_touching()),
        }
    }

    /// Replay to the end and summarize
    pub fn run(mut self) -> SimulationReport {
        let mut frames = Vec::new();
        while let Some(frame) = self.step() {
            frames.push(frame);
        }
        let peak_scale = frames
            .iter()
            .map(|f| f.rendered_scale)
            .fold(1.0, f64::max);
        let final_scale = frames.last().map(|f| f.rendered_scale).unwrap_or(1.0);
        SimulationReport {
            frames,
            peak_scale,
            final_scale,
            status: self.fleet.status().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PULL_DOWN: &str = r#"{
        "container": { "client_height": 400, "scroll_height": 1200 },
        "steps": [
            { "at_ms": 0, "event": "start", "y": 100 },
            { "at_ms": 16, "event": "move", "y": 200 },
            { "at_ms": 96, "event": "end" }
        ]
    }"#;

    #[test]
    fn test_parse_script() {
        let script = GestureScript::from_json(PULL_DOWN).unwrap();
        assert_eq!(script.steps.len(), 3);
        assert_eq!(script.steps[1].action, GestureAction::Move { y: 200.0 });
        assert_eq!(script.steps[2].action, GestureAction::End);
        assert!(script.options.scroll.is_empty());
    }

    #[test]
    fn test_replay_stretches_and_recovers() {
        let script = GestureScript::from_json(PULL_DOWN).unwrap();
        let report = Simulation::new(
            &script,
            &BounceOptions::default(),
            &SimulationConfig::default(),
        )
        .run();

        assert!((report.peak_scale - 1.038).abs() < 0.002);
        assert_eq!(report.final_scale, 1.0);
        assert_eq!(report.status, "ready");
        assert!(report.frames.iter().any(|f| f.touching));
        assert!(!report.frames.last().unwrap().touching);
    }

    #[test]
    fn test_script_options_override_defaults() {
        let mut script = GestureScript::from_json(PULL_DOWN).unwrap();
        script.options = BounceOptionsPatch::from_json(r#"{"maxStretch": 0.01}"#).unwrap();
        let report = Simulation::new(
            &script,
            &BounceOptions::default(),
            &SimulationConfig::default(),
        )
        .run();
        assert!((report.peak_scale - 1.01).abs() < 1e-9);
    }

    #[test]
    fn test_scrolled_container_does_not_stretch() {
        let script = GestureScript {
            container: Some(ContainerSpec {
                scroll_top: 300.0,
                ..Default::default()
            }),
            steps: vec![
                GestureStep { at_ms: 0, action: GestureAction::Start { y: 0.0 } },
                GestureStep { at_ms: 16, action: GestureAction::Move { y: 80.0 } },
                GestureStep { at_ms: 48, action: GestureAction::End },
            ],
            ..Default::default()
        };
        let report = Simulation::new(
            &script,
            &BounceOptions::default(),
            &SimulationConfig::default(),
        )
        .run();
        assert_eq!(report.peak_scale, 1.0);
    }
}
