//! File-backed sinks.
//!
//! * [`FileSink`]: the final results of one stage in `jsonl`, `csv` or `txt`.
//! * [`IntermediateSink`]: every stage's envelopes, one append-only JSONL file per stage.
//! * [`FanoutSink`]: hands each envelope to several sinks.
//!
//! [`read_stage_hosts`] reads an [`IntermediateSink`] file back to seed a
//! continued scan.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use sigma_core::sink::{Envelope, Record, Sink, SinkError, Stage};

use crate::commands::OutputFormat;

pub struct FileSink {
    out: Mutex<Output>,
    stage: Stage,
}

enum Output {
    Jsonl(BufWriter<File>),
    Txt(BufWriter<File>),
    Csv(csv::Writer<BufWriter<File>>),
}

impl FileSink {
    /// Opens `path` for the records of `stage`. A CSV header is written
    /// unless appending to a file that already has content.
    pub fn create(path: &Path, format: OutputFormat, append: bool, stage: Stage) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .with_context(|| format!("could not open output file {}", path.display()))?;

        let has_content = file.metadata().map(|m| m.len() > 0).unwrap_or(false);
        let writer = BufWriter::new(file);
        let out = match format {
            OutputFormat::Jsonl => Output::Jsonl(writer),
            OutputFormat::Txt => Output::Txt(writer),
            OutputFormat::Csv => {
                let mut csv = csv::Writer::from_writer(writer);
                if !has_content {
                    csv.write_record(csv_header(stage))
                        .with_context(|| format!("could not write header to {}", path.display()))?;
                }
                Output::Csv(csv)
            }
        };

        Ok(Self {
            out: Mutex::new(out),
            stage,
        })
    }
}

impl Sink for FileSink {
    fn write(&self, envelope: &Envelope<'_>) -> Result<(), SinkError> {
        if envelope.stage != self.stage {
            return Ok(());
        }
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *out {
            Output::Jsonl(writer) => {
                let line = serde_json::to_string(&envelope.payload).map_err(|e| SinkError::Encode(e.to_string()))?;
                writeln!(writer, "{line}")?;
            }
            Output::Txt(writer) => writeln!(writer, "{}", envelope.payload.hostname())?,
            Output::Csv(writer) => writer.write_record(csv_fields(&envelope.payload)).map_err(csv_error)?,
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *out {
            Output::Jsonl(writer) | Output::Txt(writer) => writer.flush()?,
            Output::Csv(writer) => writer.flush()?,
        }
        Ok(())
    }
}

pub struct IntermediateSink {
    dir: PathBuf,
    files: BTreeMap<Stage, Mutex<BufWriter<File>>>,
}

impl IntermediateSink {
    pub fn create(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("could not create {}", dir.display()))?;

        let mut files = BTreeMap::new();
        for stage in Stage::ALL {
            let path = stage_file(dir, stage);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("could not open {}", path.display()))?;
            files.insert(stage, Mutex::new(BufWriter::new(file)));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Sink for IntermediateSink {
    fn write(&self, envelope: &Envelope<'_>) -> Result<(), SinkError> {
        let Some(file) = self.files.get(&envelope.stage) else {
            return Ok(());
        };
        let line = serde_json::to_string(envelope).map_err(|e| SinkError::Encode(e.to_string()))?;
        let mut writer = file.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(writer, "{line}")?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        for file in self.files.values() {
            file.lock().unwrap_or_else(|e| e.into_inner()).flush()?;
        }
        Ok(())
    }
}

pub fn stage_file(dir: &Path, stage: Stage) -> PathBuf {
    dir.join(format!("{stage}.jsonl"))
}

/// Hostnames of the `stage` envelopes saved under `dir`, first occurrence order.
/// Resolved hosts flagged as wildcard suspects are left out when asked.
pub fn read_stage_hosts(dir: &Path, stage: Stage, skip_wildcard_suspects: bool) -> anyhow::Result<Vec<String>> {
    let path = stage_file(dir, stage);
    let raw = fs::read_to_string(&path).with_context(|| format!("could not read {}", path.display()))?;

    let mut seen = BTreeSet::new();
    let mut hosts = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let at = || format!("{}:{}", path.display(), idx + 1);
        let envelope: serde_json::Value =
            serde_json::from_str(line).with_context(|| format!("{}: not a JSON record", at()))?;
        anyhow::ensure!(
            envelope["stage"].as_str() == Some(stage.as_str()),
            "{}: expected a {stage} record",
            at()
        );

        let payload = &envelope["payload"];
        let Some(host) = payload["hostname"].as_str() else {
            anyhow::bail!("{}: record has no hostname", at());
        };
        if skip_wildcard_suspects && payload["wildcard_suspect"].as_bool() == Some(true) {
            continue;
        }
        if seen.insert(host.to_string()) {
            hosts.push(host.to_string());
        }
    }

    anyhow::ensure!(!hosts.is_empty(), "nothing to continue from in {}", path.display());
    Ok(hosts)
}

/// Writes to every inner sink; reports the first failure after trying them all.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn Sink>>,
}

impl FanoutSink {
    pub fn push(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(&self, mut op: impl FnMut(&dyn Sink) -> Result<(), SinkError>) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(err) = op(sink.as_ref()) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Sink for FanoutSink {
    fn write(&self, envelope: &Envelope<'_>) -> Result<(), SinkError> {
        self.each(|sink| sink.write(envelope))
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.each(|sink| sink.flush())
    }
}

fn csv_header(stage: Stage) -> &'static [&'static str] {
    match stage {
        Stage::Discover => &["hostname", "source", "discovered_at"],
        Stage::Dedupe => &["hostname", "primary_source", "sources", "first_seen"],
        Stage::Resolve => &["hostname", "addresses", "cname", "wildcard_suspect"],
        Stage::Probe => &["hostname", "url", "http_status", "title", "tech_tags", "error"],
    }
}

/// CSV columns for `record`. List fields are joined with `;`.
fn csv_fields(record: &Record<'_>) -> Vec<String> {
    match record {
        Record::Discovered(c) => vec![c.hostname.clone(), c.source.to_string(), c.discovered_at.to_rfc3339()],
        Record::Unique(c) => vec![
            c.hostname.clone(),
            c.primary_source.to_string(),
            join(c.sources.iter()),
            c.first_seen.to_rfc3339(),
        ],
        Record::Resolved(h) => vec![
            h.hostname.clone(),
            join(h.addresses.iter()),
            h.cname.clone().unwrap_or_default(),
            h.wildcard_suspect.to_string(),
        ],
        Record::Probe(p) => vec![
            p.hostname.clone(),
            p.url.clone(),
            p.http_status.map(|s| s.to_string()).unwrap_or_default(),
            p.title.clone().unwrap_or_default(),
            join(p.tech_tags.iter()),
            p.error_detail.clone().unwrap_or_default(),
        ],
    }
}

fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| i.to_string()).collect::<Vec<_>>().join(";")
}

fn csv_error(err: csv::Error) -> SinkError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => SinkError::Io(io),
        other => SinkError::Encode(format!("{other:?}")),
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
