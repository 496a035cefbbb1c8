//! Status printers for a deployed release.

use anyhow::Context;
use chrono::{DateTime, Utc};
use convoy_types::{Hook, HookEvent, Release};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            other => Err(format!("invalid output format {other:?}: expected table, json or yaml")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => f.write_str("table"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

/// What the table printer includes beyond the summary lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusOptions {
    /// Adds user-supplied values, hooks and the manifest.
    pub debug: bool,
    pub show_description: bool,
}

pub fn render_status(
    release: &Release,
    format: OutputFormat,
    opts: StatusOptions,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Table => render_status_table(release, opts),
        OutputFormat::Json => render_status_json(release),
        OutputFormat::Yaml => render_status_yaml(release),
    }
}

pub fn render_status_json(release: &Release) -> anyhow::Result<String> {
    let mut out = serde_json::to_string_pretty(release).context("encode release as json")?;
    out.push('\n');
    Ok(out)
}

pub fn render_status_yaml(release: &Release) -> anyhow::Result<String> {
    serde_yaml::to_string(release).context("encode release as yaml")
}

pub fn render_status_table(release: &Release, opts: StatusOptions) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "NAME: {}", release.name)?;
    if let Some(ts) = release.info.last_deployed {
        writeln!(out, "LAST DEPLOYED: {}", ansic(ts))?;
    }
    writeln!(out, "NAMESPACE: {}", release.namespace)?;
    writeln!(out, "STATUS: {}", release.info.status)?;
    writeln!(out, "REVISION: {}", release.revision)?;
    if opts.show_description {
        writeln!(out, "DESCRIPTION: {}", release.info.description)?;
    }

    let tests = hooks_for(release, HookEvent::Test);
    if tests.is_empty() {
        writeln!(out, "TEST SUITE: None")?;
    } else {
        for hook in tests {
            // Never-run hooks have nothing to report.
            let Some(started) = hook.last_run.started_at else {
                continue;
            };
            let completed = hook
                .last_run
                .completed_at
                .map(ansic)
                .unwrap_or_default();
            writeln!(out, "TEST SUITE:     {}", hook.name)?;
            writeln!(out, "Last Started:   {}", ansic(started))?;
            writeln!(out, "Last Completed: {completed}")?;
            writeln!(out, "Phase:          {}", hook.last_run.phase)?;
        }
    }

    if opts.debug {
        writeln!(out, "USER-SUPPLIED VALUES:")?;
        out.push_str(&serde_yaml::to_string(&release.config).context("encode values as yaml")?);
        out.push('\n');
    }

    if release.info.description.eq_ignore_ascii_case("Dry run complete") || opts.debug {
        writeln!(out, "HOOKS:")?;
        for hook in &release.hooks {
            writeln!(out, "---\n# Source: {}\n{}", hook.path, hook.manifest)?;
        }
        writeln!(out, "MANIFEST:\n{}", release.manifest)?;
    }

    if !release.info.notes.trim().is_empty() {
        writeln!(out, "NOTES:\n{}", release.info.notes.trim())?;
    }
    Ok(out)
}

fn hooks_for(release: &Release, event: HookEvent) -> Vec<&Hook> {
    release
        .hooks
        .iter()
        .filter(|h| h.events.contains(&event))
        .collect()
}

fn ansic(ts: DateTime<Utc>) -> String {
    ts.format("%a %b %e %H:%M:%S %Y").to_string()
}
