use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use lc3serial_redirect::{
    RedirectConfig, RedirectError, Redirector, SessionHandle, SessionState, TaskExit,
};
use tracing::info;

use crate::cmd::{open_port, parse_duration, RunArgs};
use crate::exit::{
    io_error, redirect_error, CliError, CliResult, INTERNAL, INTERRUPTED, SUCCESS, USAGE,
};
use crate::output::{print_report, OutputFormat};

enum Endpoints {
    Console,
    Files {
        source: BufReader<File>,
        sink_path: PathBuf,
    },
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = RedirectConfig {
        read_timeout: parse_duration(&args.read_timeout)?,
        grace_period: parse_duration(&args.grace)?,
        line_ending: args.line_ending(),
        ..RedirectConfig::default()
    };

    // Validate everything local before touching the board.
    let image = args
        .objfile
        .as_deref()
        .map(|path| args.image.load(path))
        .transpose()?;
    let endpoints = open_endpoints(&args)?;

    let port = open_port(&args.serial)?;
    let mut redirector = Redirector::with_config(port, config);

    if let Some(image) = &image {
        redirector
            .program(image)
            .map_err(|err| redirect_error("programming failed", err))?;
    }

    let console = matches!(endpoints, Endpoints::Console);
    install_ctrlc_handler(redirector.handle(), console)?;

    let report = match endpoints {
        Endpoints::Console => {
            let mut source = std::io::stdin().lock();
            redirector.start(&mut source, std::io::stdout())
        }
        Endpoints::Files {
            mut source,
            sink_path,
        } => {
            let sink = create_sink(&sink_path)?;
            redirector.start(&mut source, sink)
        }
    };
    let report = match report {
        Ok(report) => report,
        Err(RedirectError::AlreadyStarted(SessionState::Stopped)) => {
            info!("interrupted before redirection started");
            return Ok(INTERRUPTED);
        }
        Err(err) => return Err(redirect_error("redirection failed", err)),
    };

    info!(
        records = report.records_sent,
        sent = report.bytes_sent,
        received = report.bytes_received,
        "redirection finished"
    );
    // In console mode stdout carries device output.
    if !console {
        print_report(&report, format);
    }

    if report.writer_exit == TaskExit::Cancelled {
        return Ok(INTERRUPTED);
    }
    Ok(SUCCESS)
}

fn open_endpoints(args: &RunArgs) -> CliResult<Endpoints> {
    if args.stdio {
        return Ok(Endpoints::Console);
    }
    let (Some(in_path), Some(out_path)) = (&args.in_file, &args.out_file) else {
        return Err(CliError::new(
            USAGE,
            "IN_FILE and OUT_FILE are required without --stdio",
        ));
    };

    let source = File::open(in_path)
        .map_err(|err| io_error(&format!("failed opening {}", in_path.display()), err))?;
    Ok(Endpoints::Files {
        source: BufReader::new(source),
        sink_path: out_path.clone(),
    })
}

/// Created only once the board is reachable, so a failed open leaves an
/// existing capture untouched.
fn create_sink(path: &Path) -> CliResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|err| io_error(&format!("failed creating {}", path.display()), err))
}

fn install_ctrlc_handler(handle: SessionHandle, console: bool) -> CliResult<()> {
    ctrlc::set_handler(move || {
        handle.stop();
        // A blocking stdin read cannot be interrupted; leave instead.
        if console {
            std::process::exit(INTERRUPTED);
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
