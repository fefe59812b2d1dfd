use std::path::Path;

use anyhow::Result;
use tracing::info;

use historytrends::capabilities::Capabilities;
use historytrends::cli::{self, Command};
use historytrends::{config, logging, parsers, sink, util};

fn main() -> Result<()> {
    logging::init_logging();

    let cli_opts = cli::parse();
    let loaded = config::load_config(cli_opts.config_path.as_deref())?;
    let cfg = loaded.config;
    let caps = Capabilities::default();
    let tool_version = env!("CARGO_PKG_VERSION");

    match cli_opts.command {
        Command::Decode {
            input,
            output,
            export_time,
            format,
        } => {
            let export_time = export_time.as_deref().map(util::parse_export_time).transpose()?;
            let run_output_dir = output.join(&cfg.run_id);
            util::ensure_output_dir(&run_output_dir)?;
            info!(
                "starting run_id={} inputs={} output={}",
                cfg.run_id,
                input.len(),
                run_output_dir.display()
            );

            let exports = util::decode_exports(&input, export_time, &caps)?;
            let sink = sink::build_sink(
                util::backend_from_cli(format),
                tool_version,
                &loaded.config_hash,
                &run_output_dir,
            )?;
            let summary =
                util::write_visits(sink.as_ref(), &cfg.run_id, &exports, cfg.dedup_visits)?;
            info!(
                "wrote {} visits ({} duplicates dropped)",
                summary.visits_written, summary.duplicates_dropped
            );
        }
        Command::Encode {
            input,
            output,
            timezone,
        } => {
            let zone_name = timezone.as_deref().unwrap_or(&cfg.output_timezone);
            let zone = config::parse_output_zone(zone_name)?;
            let visits = util::read_visits_jsonl(&input)?;
            let written = util::encode_visits(&output, &visits, &caps, zone.to_fixed())?;
            info!("encoded {written} visits to {}", output.display());
        }
        Command::Chrome {
            input,
            output,
            format,
        } => {
            let run_output_dir = output.join(&cfg.run_id);
            util::ensure_output_dir(&run_output_dir)?;
            let visits = parsers::chrome_history::extract_chrome_visits(&input, &caps)?;
            let export = historytrends::export::Export {
                source: source_name(&input),
                export_time: None,
                visits,
            };
            let sink = sink::build_sink(
                util::backend_from_cli(format),
                tool_version,
                &loaded.config_hash,
                &run_output_dir,
            )?;
            let summary =
                util::write_visits(sink.as_ref(), &cfg.run_id, &[export], cfg.dedup_visits)?;
            info!("wrote {} visits from {}", summary.visits_written, input.display());
        }
    }

    info!("historytrends run finished");
    Ok(())
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
