use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentinel_download::config::DEFAULT_CONFIG_FILE;
use sentinel_download::{DiveHeader, DownloadConfig, LogLine, SerialLink, Session};

#[derive(Parser)]
#[command(name = "sentinel-download")]
#[command(about = "Download dive logs from a Sentinel rebreather over its serial port")]
struct Cli {
    /// Serial device, overrides the config file
    #[arg(short, long)]
    device: Option<String>,

    /// Settings file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// List the dives stored on the unit
    #[arg(short, long, conflicts_with_all = ["dive", "from", "to"])]
    list: bool,

    /// Download a single dive
    #[arg(short = 'n', long, conflicts_with_all = ["from", "to"])]
    dive: Option<u32>,

    /// First dive of a range
    #[arg(short, long, requires = "to")]
    from: Option<u32>,

    /// Last dive of a range
    #[arg(short, long, requires = "from")]
    to: Option<u32>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print records as JSON
    #[arg(long)]
    json: bool,
}

enum Mode {
    List,
    Dive(u32),
    Range(u32, u32),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "sentinel_download=debug" } else { "sentinel_download=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mode = match (cli.list, cli.dive, cli.from, cli.to) {
        (true, _, _, _) => Mode::List,
        (_, Some(n), _, _) => Mode::Dive(n),
        (_, _, Some(from), Some(to)) => {
            if from > to {
                bail!("--from {from} is after --to {to}");
            }
            Mode::Range(from, to)
        }
        _ => bail!("nothing to do: pass --list, --dive <n> or --from <n> --to <n>"),
    };

    let mut config = DownloadConfig::load_from_path(&cli.config);
    if let Some(device) = cli.device {
        config.device = device;
    }
    debug!(?config, "effective configuration");

    let link = SerialLink::open(&config.device, config.baud_rate)
        .with_context(|| format!("failed to open {}", config.device))?;
    let mut session = Session::new(link, config.link_timing());

    match mode {
        Mode::List => cmd_list(&mut session, cli.json),
        Mode::Dive(index) => cmd_dive(&mut session, index, cli.json),
        Mode::Range(from, to) => cmd_range(&mut session, from, to, cli.json),
    }
}

fn cmd_list(session: &mut Session<SerialLink>, json: bool) -> Result<()> {
    let list = session.list_dives().context("dive listing failed")?;
    info!(dives = list.headers.len(), "listing received");

    if json {
        println!("{}", serde_json::to_string_pretty(&list.headers)?);
    } else {
        for (i, header) in list.headers.iter().enumerate() {
            println!("Dive {i}");
            print_header(header);
            println!();
        }
    }

    for failure in &list.failures {
        eprintln!("record {}: {}", failure.record, failure.error);
    }
    if !list.is_complete() {
        bail!("{} listing record(s) could not be decoded", list.failures.len());
    }
    Ok(())
}

fn cmd_dive(session: &mut Session<SerialLink>, index: u32, json: bool) -> Result<()> {
    let mut header = DiveHeader::default();
    session
        .download_dive(index, &mut header)
        .with_context(|| format!("download of dive {index} failed"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&header)?);
    } else {
        print_dive(index, &header);
    }
    Ok(())
}

fn cmd_range(session: &mut Session<SerialLink>, from: u32, to: u32, json: bool) -> Result<()> {
    let downloads = session.download_range(from, to)?;

    let mut dives = Vec::new();
    let mut failed = 0usize;
    for download in downloads {
        match download.result {
            Ok(header) => dives.push((download.index, header)),
            Err(e) => {
                failed += 1;
                eprintln!("dive {}: {e}", download.index);
            }
        }
    }

    if json {
        let headers: Vec<&DiveHeader> = dives.iter().map(|(_, h)| h).collect();
        println!("{}", serde_json::to_string_pretty(&headers)?);
    } else {
        for (index, header) in &dives {
            print_dive(*index, header);
            println!();
        }
    }

    if failed > 0 {
        bail!("{failed} of {} dive(s) failed to download", to - from + 1);
    }
    Ok(())
}

fn print_dive(index: u32, header: &DiveHeader) {
    println!("Dive {index}");
    print_header(header);
    if let Some(log) = &header.log {
        println!("Log ({} lines)", log.len());
        for line in log {
            print_log_line(line);
        }
    }
}

fn print_header(h: &DiveHeader) {
    println!("  Version: {}", h.version);
    println!("  Serial number: {}", h.serial_number);
    println!("  Record interval: {} s", h.record_interval);
    println!("  Log lines: {}", h.log_lines);
    println!("  Start: {}", h.start_time);
    println!("  End: {}", h.end_time);
    println!("  Length: {}", h.length);
    println!("  Max depth: {:.1} m", h.max_depth);
    println!("  Status: {}", h.status);
    println!("  OTU: {}", h.otu);
    println!("  CNS: {:.1}", h.cns);
    println!("  Atmospheric: {} mbar", h.atm);
    println!("  Stack: {}", h.stack);
    println!("  Usage: {}", h.usage);
    println!("  Safety: {:.1}", h.safety);
    println!("  Expert: {}", h.expert);
    println!("  TPM: {}", h.tpm);
    println!("  Deco algorithm: {}", h.deco_algorithm);
    println!(
        "  VGM safety max/stop/mid: {:.1}/{:.1}/{:.1}",
        h.vgm_max_safety, h.vgm_stop_safety, h.vgm_mid_safety
    );
    println!("  Filter type: {}", h.filter_type);
    for (i, health) in h.cell_health.iter().enumerate() {
        println!("  Cell {} health: {health}", i + 1);
    }
    for (i, gas) in h.gas.iter().enumerate().filter(|(_, g)| g.enabled) {
        println!(
            "  Gas {i}: O2 {}% He {}% N2 {}% max depth {}",
            gas.o2, gas.he, gas.n2, gas.max_depth
        );
    }
    for (i, t) in h.tissue.iter().enumerate() {
        println!("  Tissue {i}: {} {}", t.t1, t.t2);
    }
}

fn print_log_line(l: &LogLine) {
    let notes: Vec<String> = l
        .notes
        .iter()
        .map(|n| format!("{} ({})", n.keyword, n.severity.label()))
        .collect();
    println!(
        "  {} depth {:.1} m pO2 {:.2} temp {} scrubber {:.1} batt {:.2}/{:.2} dil {} O2 {} \
         cells {:.2}/{:.2}/{:.2} sp {:.2} ceil {} CO2 {} {}",
        l.time_string,
        l.depth,
        l.po2,
        l.temperature,
        l.scrubber_left,
        l.primary_battery_v,
        l.secondary_battery_v,
        l.diluent_pressure,
        l.o2_pressure,
        l.cell_po2[0],
        l.cell_po2[1],
        l.cell_po2[2],
        l.setpoint,
        l.ceiling,
        l.co2,
        notes.join(", ")
    );
}
