use std::net::IpAddr;

use colored::*;
use sigma_common::models::run::PipelineRun;
use sigma_common::models::stats::{SourceOutcome, SourceRunStats};
use sigma_core::sink::Stage;

use crate::terminal::{colors, print};

type Detail = (String, ColoredString);

/// Everything the terminal shows once a run has finished.
pub fn print_run(run: &PipelineRun, final_stage: Stage, quiet: u8, show_records: bool) {
    if show_records {
        match quiet {
            0 | 1 => print_records(run, final_stage, quiet),
            _ => print_bare(run, final_stage),
        }
    }

    if quiet < 2 {
        print_sources(run, quiet);
        print_summary(run, final_stage, quiet);
    }
    warn_about(run);
}

fn print_records(run: &PipelineRun, final_stage: Stage, quiet: u8) {
    let title = format!("results for {}", run.target());
    let count = match final_stage {
        Stage::Discover | Stage::Dedupe => run.candidates().len(),
        Stage::Resolve => run.resolved().len(),
        Stage::Probe => run.probes().len(),
    };
    if count == 0 {
        print::header("ZERO HOSTS DETECTED", quiet);
        if quiet == 0 {
            print::no_hosts(
                run.target().root(),
                &["try more sources with --all-sources", "check the domain spelling"],
            );
        }
        return;
    }

    print::header(&title, quiet);
    match final_stage {
        Stage::Discover | Stage::Dedupe => {
            for (idx, candidate) in run.candidates().iter().enumerate() {
                print::tree_head(idx, &candidate.hostname);
                let sources: Vec<&str> = candidate.sources.iter().map(|s| s.as_str()).collect();
                print::as_tree_one_level(vec![(
                    "Sources".to_string(),
                    sources.join(", ").color(colors::SOURCE),
                )]);
            }
        }
        Stage::Resolve => {
            for (idx, host) in run.resolved().iter().enumerate() {
                print::tree_head(idx, &host.hostname);
                let mut details = addresses(host.addresses.iter());
                if let Some(cname) = &host.cname {
                    details.push(("CNAME".to_string(), cname.color(colors::CNAME)));
                }
                if host.wildcard_suspect {
                    details.push(("Wildcard".to_string(), "suspect".yellow()));
                }
                print::as_tree_one_level(details);
            }
        }
        Stage::Probe => {
            for (idx, probe) in run.probes().iter().enumerate() {
                print::tree_head(idx, &probe.hostname);
                let mut details: Vec<Detail> = vec![("URL".to_string(), probe.url.normal())];
                match (probe.http_status, &probe.error_detail) {
                    (Some(status), _) => {
                        details.push(("Status".to_string(), status.to_string().color(colors::for_status(status))));
                    }
                    (None, Some(detail)) => details.push(("Error".to_string(), detail.red())),
                    (None, None) => {}
                }
                if let Some(title) = &probe.title {
                    details.push(("Title".to_string(), title.normal()));
                }
                if !probe.tech_tags.is_empty() {
                    let tags: Vec<&str> = probe.tech_tags.iter().map(String::as_str).collect();
                    details.push(("Tech".to_string(), tags.join(", ").color(colors::ACCENT)));
                }
                details.extend(addresses(probe.resolved.addresses.iter()));
                print::as_tree_one_level(details);
            }
        }
    }
}

/// Plain lines on stdout, for piping.
fn print_bare(run: &PipelineRun, final_stage: Stage) {
    match final_stage {
        Stage::Discover | Stage::Dedupe => run.candidates().iter().for_each(|c| println!("{}", c.hostname)),
        Stage::Resolve => run.resolved().iter().for_each(|h| println!("{}", h.hostname)),
        Stage::Probe => run
            .probes()
            .iter()
            .filter(|p| p.is_live())
            .for_each(|p| println!("{}", p.url)),
    }
}

fn addresses<'a>(ips: impl Iterator<Item = &'a IpAddr>) -> Vec<Detail> {
    ips.map(|ip| match ip {
        IpAddr::V4(v4) => ("IPv4".to_string(), v4.to_string().color(colors::IPV4_ADDR)),
        IpAddr::V6(v6) => ("IPv6".to_string(), v6.to_string().color(colors::IPV6_ADDR)),
    })
    .collect()
}

fn print_sources(run: &PipelineRun, quiet: u8) {
    print::header("sources", quiet);
    let rows = run
        .source_stats()
        .values()
        .map(|stats| (stats.source_id.as_str(), source_line(stats)))
        .collect();
    print::aligned_lines(rows);
}

fn source_line(stats: &SourceRunStats) -> ColoredString {
    let found = format!("{} found", stats.candidates_found);
    let timing = format!("{:.1}s", stats.duration_ms as f64 / 1000.0);
    let mut line = format!("{found} in {timing}");
    if stats.errors > 0 {
        line.push_str(&format!(", {} request errors", stats.errors));
    }
    if stats.rate_limited {
        line.push_str(", rate limited");
    }

    match stats.outcome {
        SourceOutcome::Failed => {
            let reason = stats.detail.as_deref().unwrap_or("failed");
            format!("{line} ({reason})").red()
        }
        SourceOutcome::Cancelled => format!("{line} (cancelled)").yellow(),
        _ => line.normal(),
    }
}

fn print_summary(run: &PipelineRun, final_stage: Stage, quiet: u8) {
    let counters = run.counters();
    let elapsed = run.duration().num_milliseconds().max(0) as f64 / 1000.0;
    let total_time = format!("{elapsed:.2}s").bold().yellow();

    let found = match final_stage {
        Stage::Discover | Stage::Dedupe => format!("{} unique hostnames", counters.candidates_unique),
        Stage::Resolve => format!(
            "{} of {} hostnames resolved",
            counters.resolved, counters.candidates_unique
        ),
        Stage::Probe => format!(
            "{} live endpoints across {} resolved hosts",
            run.probes().iter().filter(|p| p.is_live()).count(),
            counters.resolved
        ),
    };
    let verb = if run.is_cancelled() { "Run Cancelled" } else { "Run Complete" };
    let output = format!("{verb}: {} in {total_time}", found.bold().green()).color(colors::TEXT_DEFAULT);

    match quiet {
        0 => {
            print::separator();
            print::centered(&output);
            print::separator();
        }
        _ => print::print_status(output.to_string()),
    }
}

fn warn_about(run: &PipelineRun) {
    let failed: Vec<String> = run
        .failed_sources()
        .map(|s| match s.error {
            Some(kind) => format!("{} ({kind})", s.source_id),
            None => s.source_id.to_string(),
        })
        .collect();
    if !failed.is_empty() {
        sigma_common::warn!("{} source(s) failed: {}", failed.len(), failed.join(", "));
    }

    let counters = run.counters();
    if counters.wildcard_filtered > 0 {
        sigma_common::warn!("{} wildcard suspect(s) were not probed", counters.wildcard_filtered);
    }
    if counters.candidates_dropped > 0 {
        sigma_common::warn!("{} hostnames dropped past the candidate cap", counters.candidates_dropped);
    }
    if counters.sink_failures > 0 {
        sigma_common::warn!("{} records could not be written", counters.sink_failures);
    }
}
