use clap::Parser;
use clap::error::ErrorKind;
use humansize::{DECIMAL, format_size};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use saturn_downloader::{
    DEFAULT_DOWNLOAD_ROOT, DEFAULT_DOWNLOAD_WORKERS, DEFAULT_LOCATE_WORKERS, DEFAULT_REQUEST_TIMEOUT,
    PipelineConfig, ProgressEvent, SeriesReport, download_series,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Download every episode of an anime series
#[derive(Debug, Parser)]
#[command(name = "saturn-downloader", version, about)]
struct Cli {
    /// URL of the series page
    url: String,

    /// Directory the series folder is created in
    #[arg(short, long, default_value = DEFAULT_DOWNLOAD_ROOT)]
    output: PathBuf,

    /// Number of episode pages looked up at the same time
    #[arg(long, default_value_t = DEFAULT_LOCATE_WORKERS)]
    locate_workers: usize,

    /// Number of files downloaded at the same time
    #[arg(long, default_value_t = DEFAULT_DOWNLOAD_WORKERS)]
    download_workers: usize,

    /// Request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            download_root: self.output.clone(),
            locate_workers: self.locate_workers,
            download_workers: self.download_workers,
            request_timeout: Duration::from_secs(self.timeout),
            ..PipelineConfig::default()
        }
        .normalized()
    }
}

/// Routes log lines around the progress bars so they do not tear the display
#[derive(Clone)]
struct SuspendingWriter {
    multi: MultiProgress,
}

struct SuspendedStderr {
    multi: MultiProgress,
}

impl Write for SuspendedStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for SuspendingWriter {
    type Writer = SuspendedStderr;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendedStderr {
            multi: self.multi.clone(),
        }
    }
}

fn init_logging(verbose: bool, multi: &MultiProgress) {
    let filter = if verbose {
        EnvFilter::new("saturn_downloader=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("saturn_downloader=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(SuspendingWriter {
            multi: multi.clone(),
        })
        .init();
}

fn task_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:>16} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

fn unknown_size_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:>16} {spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:>16} [{elapsed_precise}] {wide_bar} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Renders progress events as one bar per running download plus an overall bar
struct ProgressDisplay {
    multi: MultiProgress,
    overall: ProgressBar,
    tasks: Mutex<HashMap<usize, ProgressBar>>,
}

impl ProgressDisplay {
    fn new(multi: MultiProgress) -> Self {
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(overall_style());
        overall.set_prefix("Episodes");

        Self {
            multi,
            overall,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn task_bar(&self, task: usize) -> Option<ProgressBar> {
        self.tasks.lock().ok()?.get(&task).cloned()
    }

    fn handle(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::SeriesResolved { series, directory } => {
                let _ = self.multi.println(format!(
                    "Downloading '{}' into {}",
                    series.display_name,
                    directory.display()
                ));
            }
            ProgressEvent::EpisodesListed { count } => {
                let _ = self.multi.println(format!("Found {} episode(s)", count));
            }
            ProgressEvent::WatchUrlsLocated { located, failed } => {
                if failed > 0 {
                    let _ = self.multi.println(format!(
                        "Located {} watch page(s), {} episode(s) skipped",
                        located, failed
                    ));
                }
            }
            ProgressEvent::DownloadsQueued { total } => {
                self.overall.set_length(total as u64);
            }
            ProgressEvent::DownloadStarted { task, label, .. } => {
                let bar = self
                    .multi
                    .insert_before(&self.overall, ProgressBar::new(100));
                bar.set_style(task_style());
                bar.set_prefix(label);

                if let Ok(mut tasks) = self.tasks.lock() {
                    tasks.insert(task, bar);
                }
            }
            ProgressEvent::DownloadProgress {
                task,
                downloaded,
                total_bytes,
                percent,
            } => {
                let Some(bar) = self.task_bar(task) else {
                    return;
                };

                match (percent, total_bytes) {
                    (Some(percent), Some(total_bytes)) => {
                        bar.set_position(percent.round() as u64);
                        bar.set_message(format!(
                            "{} / {}",
                            format_size(downloaded, DECIMAL),
                            format_size(total_bytes, DECIMAL)
                        ));
                    }
                    _ => {
                        bar.set_style(unknown_size_style());
                        bar.set_message(format_size(downloaded, DECIMAL));
                        bar.tick();
                    }
                }
            }
            ProgressEvent::DownloadFinished {
                task,
                completed,
                failed,
                ..
            } => {
                let bar = self.tasks.lock().ok().and_then(|mut tasks| tasks.remove(&task));
                if let Some(bar) = bar {
                    bar.finish_and_clear();
                }

                self.overall.set_position((completed + failed) as u64);
                if failed > 0 {
                    self.overall.set_message(format!("({} failed)", failed));
                }
            }
            ProgressEvent::Complete { .. } => {
                self.overall.finish_and_clear();
            }
        }
    }
}

fn print_summary(report: &SeriesReport) {
    println!("\n=== Download Summary ===\n");
    println!("Series:     {}", report.series.display_name);
    println!("Directory:  {}", report.directory.display());
    println!("Episodes:   {}", report.episode_pages);
    println!(
        "Downloaded: {} ({})",
        report.downloaded(),
        format_size(report.total_bytes(), DECIMAL)
    );

    if report.failed() > 0 {
        println!("Failed:     {}", report.failed());
        for (kind, count) in report.failure_counts() {
            println!("  {:>3} x {}", count, kind);
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    let multi = MultiProgress::new();
    init_logging(cli.verbose, &multi);

    let config = cli.pipeline_config();
    let display = ProgressDisplay::new(multi.clone());

    let result = download_series(&cli.url, &config, |event| display.handle(event));
    let _ = multi.clear();

    match result {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error: Failed to serialize summary: {}", e);
                        process::exit(1);
                    }
                }
            } else {
                print_summary(&report);
            }
        }
        Err(e) => {
            eprintln!("\nError: {}", e);
            process::exit(1);
        }
    }
}
