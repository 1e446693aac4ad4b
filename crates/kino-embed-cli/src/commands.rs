//! CLI command implementations

use crate::output::{to_json, to_table, OutputFormat};
use anyhow::{bail, Context};
use console::style;
use kino_embed::headless::HeadlessHost;
use kino_embed::{
    destination, EmbedBridge, EmbedConfig, EmbedContext, EmbedEvents, InboundMessage, ParamValue,
};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tabled::Tabled;
use tracing::debug;

/// Parse a `KEY=VALUE` parameter, inferring booleans and numbers
pub fn parse_param(raw: &str) -> anyhow::Result<(String, ParamValue)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("parameter {:?} is not KEY=VALUE", raw))?;
    if key.is_empty() {
        bail!("parameter {:?} has an empty key", raw);
    }

    let value = match value {
        "true" => ParamValue::Bool(true),
        "false" => ParamValue::Bool(false),
        _ => {
            if let Ok(n) = value.parse::<i64>() {
                ParamValue::Int(n)
            } else if let Ok(n) = value.parse::<f64>() {
                ParamValue::Float(n)
            } else {
                ParamValue::Text(value.to_string())
            }
        }
    };

    Ok((key.to_string(), value))
}

/// Parse an `ORIGIN=JSON` inbound message. Payloads that are not JSON are
/// taken as plain strings.
pub fn parse_message(raw: &str) -> anyhow::Result<(String, Value)> {
    let (origin, data) = raw
        .split_once('=')
        .with_context(|| format!("message {:?} is not ORIGIN=JSON", raw))?;
    let data = serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string()));
    Ok((origin.to_string(), data))
}

fn load_config(path: &Path) -> anyhow::Result<EmbedConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    EmbedConfig::from_json(&json).with_context(|| format!("failed to parse {}", path.display()))
}

#[derive(Serialize)]
struct ComposeReport {
    url: String,
    destination: String,
}

/// Compose an embed URL
pub fn compose(src: &str, params: &[String], format: &str) -> anyhow::Result<()> {
    let mut config = EmbedConfig::new(src);
    for raw in params {
        let (key, value) = parse_param(raw)?;
        config.params.insert(key, value);
    }

    let url = config.composed_url();
    let report = ComposeReport {
        destination: destination(&url),
        url,
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", to_json(&report)?),
        OutputFormat::Table | OutputFormat::Text => {
            println!("{}", report.url);
            println!("  preconnect: {}", report.destination);
        }
    }
    Ok(())
}

#[derive(Serialize, Tabled)]
struct LintRow {
    level: String,
    message: String,
}

/// Check an embed configuration file
pub fn validate(path: &Path, strict: bool, format: &str) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let warnings = config.lint();

    let rows = || -> Vec<LintRow> {
        warnings
            .iter()
            .map(|w| LintRow {
                level: "warning".into(),
                message: w.clone(),
            })
            .collect()
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", to_json(&rows())?),
        OutputFormat::Table => println!("{}", to_table(&rows())),
        OutputFormat::Text => {
            println!("Validating embed: {}", path.display());
            println!("  Composed URL: {}", config.composed_url());
            println!("  Lazy: {}", config.lazy);
            for warning in &warnings {
                println!("  {} {}", style("warning:").yellow(), warning);
            }
            if warnings.is_empty() {
                println!("  {}", style("OK").green());
            }
        }
    }

    if strict && !warnings.is_empty() {
        bail!("{} warning(s) in {}", warnings.len(), path.display());
    }
    Ok(())
}

/// Options for the preview command
#[derive(Debug, Default)]
pub struct PreviewOptions {
    pub config: Option<PathBuf>,
    pub src: Option<String>,
    pub params: Vec<String>,
    pub eager: bool,
    pub enter_viewport: bool,
    pub load: bool,
    pub messages: Vec<String>,
    pub posts: Vec<String>,
}

/// One line of the preview trace
#[derive(Debug, Serialize, Tabled)]
pub struct TraceRow {
    pub step: String,
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewReport {
    pub dom_id: String,
    pub composed_url: String,
    pub final_state: String,
    pub trace: Vec<TraceRow>,
}

struct Trace<'a> {
    host: &'a HeadlessHost,
    seen_ops: usize,
    rows: Vec<TraceRow>,
}

impl<'a> Trace<'a> {
    fn capture(&mut self, step: &str, events: &mut EmbedEvents) {
        let ops = self.host.ops();
        for op in &ops[self.seen_ops..] {
            self.rows.push(TraceRow {
                step: step.to_string(),
                kind: "host".into(),
                detail: op.to_string(),
            });
        }
        self.seen_ops = ops.len();

        while let Ok(event) = events.try_recv() {
            let detail = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));
            self.rows.push(TraceRow {
                step: step.to_string(),
                kind: "event".into(),
                detail,
            });
        }
    }
}

/// Run the preview scenario and collect everything that happened
pub fn run_preview(options: PreviewOptions) -> anyhow::Result<PreviewReport> {
    let mut config = match &options.config {
        Some(path) => load_config(path)?,
        None => EmbedConfig::default(),
    };
    if let Some(src) = options.src {
        config.src = src;
    }
    for raw in &options.params {
        let (key, value) = parse_param(raw)?;
        config.params.insert(key, value);
    }
    if options.eager {
        config.lazy = false;
    }
    if config.src.is_empty() {
        bail!("no embed source: pass --src or a configuration with \"src\"");
    }
    debug!(?config, "Previewing embed");

    let host = Rc::new(HeadlessHost::new());
    let ctx = EmbedContext::new(host.clone());
    let (bridge, mut events) = EmbedBridge::new(ctx, config);
    let mut trace = Trace {
        host: &host,
        seen_ops: 0,
        rows: Vec::new(),
    };

    bridge.start()?;
    trace.capture("start", &mut events);

    if options.enter_viewport {
        host.set_visible(&bridge.dom_id(), true);
        trace.capture("enter viewport", &mut events);
    }

    let handle = bridge
        .context_handle()
        .context("embed has no browsing context after start")?;

    if options.load {
        host.complete_load(handle);
        trace.capture("load", &mut events);
    }

    for raw in &options.messages {
        let (origin, data) = parse_message(raw)?;
        host.dispatch(InboundMessage::new(handle, origin, data));
        trace.capture("message", &mut events);
    }

    for raw in &options.posts {
        let message: Value = serde_json::from_str(raw)
            .with_context(|| format!("post payload {:?} is not JSON", raw))?;
        bridge.post_message(&message, None)?;
        trace.capture("post", &mut events);
    }

    let final_state = bridge.state().to_string();
    let dom_id = bridge.dom_id();
    let composed_url = bridge.composed_url();

    bridge.stop();
    trace.capture("stop", &mut events);

    Ok(PreviewReport {
        dom_id,
        composed_url,
        final_state,
        trace: trace.rows,
    })
}

/// Preview an embed's lifecycle
pub fn preview(options: PreviewOptions, format: &str) -> anyhow::Result<()> {
    let report = run_preview(options)?;

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", to_json(&report)?),
        OutputFormat::Table => {
            println!("{} ({})", report.composed_url, report.dom_id);
            println!("{}", to_table(&report.trace));
            println!("Final state: {}", report.final_state);
        }
        OutputFormat::Text => {
            println!("Previewing embed: {}", report.composed_url);
            let mut current = "";
            for row in &report.trace {
                if row.step != current {
                    println!("\n{}", style(&row.step).bold());
                    current = &row.step;
                }
                let kind = if row.kind == "event" {
                    style(row.kind.as_str()).green()
                } else {
                    style(row.kind.as_str()).cyan()
                };
                println!("  {:>5}  {}", kind, row.detail);
            }
            println!("\nFinal state: {}", report.final_state);
        }
    }
    Ok(())
}
