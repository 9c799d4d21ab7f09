use std::time::Duration;

use colored::*;
use indicatif::ProgressStyle;
use sigma_common::models::run::PipelineState;
use sigma_common::models::stats::StageCounters;
use sigma_core::pipeline::Progress;
use tokio::sync::watch;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::terminal::colors;

const TIP_EVERY: Duration = Duration::from_secs(6);
const TIP_FOR: Duration = Duration::from_secs(2);
const TIPS: &[&str] = &["You can press 'q' to finish early"];

pub fn style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ])
}

/// One line describing where a run stands.
pub fn progress_message(progress: &Progress) -> String {
    let StageCounters {
        candidates_unique,
        resolved,
        probed,
        ..
    } = progress.counters;

    let detail = match progress.state {
        PipelineState::Idle | PipelineState::Discovering | PipelineState::Deduping => {
            format!("{} unique hostnames", candidates_unique.to_string().green().bold())
        }
        PipelineState::Resolving | PipelineState::Validating => format!(
            "{} of {} resolved",
            resolved.to_string().green().bold(),
            candidates_unique
        ),
        _ => format!(
            "{} of {} probed",
            probed.to_string().green().bold(),
            resolved
        ),
    };

    format!("{}: {}", progress.state.as_str().color(colors::ACCENT), detail)
        .color(colors::TEXT_DEFAULT)
        .to_string()
}

/// Mirrors run progress into the span's spinner until the sender goes away.
///
/// The span must have been created with `indicatif.pb_show = true`.
pub async fn follow(span: Span, mut progress: watch::Receiver<Progress>, show_tips: bool) {
    let mut tip_index = 0;
    let mut tips = tokio::time::interval(TIP_EVERY);
    tips.tick().await;

    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let message = progress_message(&progress.borrow_and_update());
                span.pb_set_message(&message);
            }
            _ = tips.tick(), if show_tips => {
                let tip = TIPS[tip_index % TIPS.len()];
                tip_index += 1;
                span.pb_set_message(&format!("{}", tip.italic().white()));
                tokio::time::sleep(TIP_FOR).await;
                span.pb_set_message(&progress_message(&progress.borrow()));
            }
        }
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
