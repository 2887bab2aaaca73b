pub(crate) mod image;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use log::{error, info, warn, LevelFilter};

use image::{Job, Outcome, Report, LAYOUT};

/// Serial bootloader build output, relative to the application project.
const BOOT_DIR: &str =
    "../../../../../../sam/applications/serial_bootloader/samg55j19_pl360g55cx_ek/as5_arm";
const SIGN_TOOL: &str = "../../../../../../FirmwareManagementToolCli/FirmwareManagementToolCli.exe";

// -- Data types for command-line options -- //
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Application binary; patched and extended in place
    #[arg(value_name = "APP_BIN")]
    application: PathBuf,

    /// Bootloader binary, inside the bootloader build directory
    #[arg(value_name = "BOOT_BIN")]
    bootloader: PathBuf,

    #[arg(long, value_name = "DIR", default_value = BOOT_DIR)]
    boot_dir: PathBuf,

    #[arg(long, value_name = "PATH", default_value = SIGN_TOOL)]
    signer: PathBuf,

    /// Where 'bininfo.txt' goes, and where the sign tool runs
    #[arg(long, value_name = "DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Verbosity of generated output?
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn job(&self) -> Job {
        Job {
            application: self.application.clone(),
            bootloader: self.boot_dir.join(&self.bootloader),
            signer: self.signer.clone(),
            work_dir: self.work_dir.clone(),
        }
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // 'RUST_LOG' takes precedence over '-v'
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn summary(report: &Report) {
    info!("Firmware image:");
    info!(" - Application: {} bytes", report.app_len);
    info!(" - Bootloader:  {} bytes", report.boot_len);
    info!(" - CRC16:       0x{:04X}", report.crc16);
    info!(" - Length:      {} bytes", report.image_len);
    info!(" - Copy:        {}", report.copy.display());
    info!(" - Info:        {}", report.bininfo);
    if !report.signer.is_signed() {
        warn!("Image was NOT signed");
    }
    if !report.cleanup.is_clean() {
        warn!(
            "{} leftover file(s) couldn't be deleted",
            report.cleanup.failed.len()
        );
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.verbose);

    let job = args.job();
    info!(
        "Files needed: {} {}",
        job.application.display(),
        job.bootloader.display()
    );

    let now = Local::now().naive_local();
    match image::build(&job, &LAYOUT, &now) {
        Ok(Outcome::Built(report)) => {
            summary(&report);
            ExitCode::SUCCESS
        }
        Ok(Outcome::Rejected(e)) => {
            error!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

//----------------------------------------------------------------------------
// Tests
//----------------------------------------------------------------------------
