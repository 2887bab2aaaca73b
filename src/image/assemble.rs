use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{debug, info};

use super::artifacts::{self, BININFO_FILE};
use super::cleanup::{self, Cleanup};
use super::error::PreconditionError;
use super::layout::Layout;
use super::signer::{Signer, SignerStatus};

/**
 * Inputs for one build. Paths are used as given; relative ones resolve
 * against the process' current directory.
 */
#[derive(Debug, Clone)]
pub struct Job {
    pub application: PathBuf,
    pub bootloader: PathBuf,
    pub signer: PathBuf,
    pub work_dir: PathBuf,
}

#[derive(Debug)]
pub struct Report {
    pub app_len: u32,
    pub boot_len: u32,
    pub crc16: u16,
    pub image_len: u64,
    pub copy: PathBuf,
    pub bininfo: String,
    pub signer: SignerStatus,
    pub cleanup: Cleanup,
}

#[derive(Debug)]
pub enum Outcome {
    Built(Report),
    Rejected(PreconditionError),
}

/// What preflight learned about the inputs.
#[derive(Debug)]
pub struct Checked {
    pub app_len: u32,
    pub boot_len: u32,
    pub signer: PathBuf,
}

fn size_field(path: &Path, len: u64) -> Result<u32, PreconditionError> {
    u32::try_from(len).map_err(|_| PreconditionError::TooLarge {
        path: path.to_path_buf(),
        len,
    })
}

/**
 * Validate every input before anything is written: both binaries and the
 * sign tool must exist, and the application must be large enough for the
 * layout.
 *
 * The signer path is made absolute, as it runs from the work directory.
 */
pub fn preflight(job: &Job, layout: &Layout) -> Result<Checked, PreconditionError> {
    let app = fs::metadata(&job.application)
        .ok()
        .filter(|m| m.is_file())
        .ok_or_else(|| PreconditionError::MissingApplication(job.application.clone()))?;
    let boot = fs::metadata(&job.bootloader)
        .ok()
        .filter(|m| m.is_file())
        .ok_or_else(|| PreconditionError::MissingBootloader(job.bootloader.clone()))?;
    let signer = fs::canonicalize(&job.signer)
        .map_err(|_| PreconditionError::MissingSigner(job.signer.clone()))?;

    if app.len() < layout.min_len() {
        return Err(PreconditionError::ApplicationTooSmall {
            path: job.application.clone(),
            len: app.len(),
            min: layout.min_len(),
        });
    }

    Ok(Checked {
        app_len: size_field(&job.application, app.len())?,
        boot_len: size_field(&job.bootloader, boot.len())?,
        signer,
    })
}

/**
 * Patch the application binary in place and append the bootloader. Returns
 * the application length before appending, and the checksum.
 */
fn combine(application: &Path, boot: &[u8], layout: &Layout) -> Result<(u32, u16)> {
    let boot_len =
        u32::try_from(boot.len()).context("Bootloader doesn't fit a 32-bit size field")?;

    let mut app = OpenOptions::new()
        .read(true)
        .write(true)
        .open(application)
        .with_context(|| format!("Unable to open {}", application.display()))?;

    let len = app.metadata()?.len();
    let app_len = size_field(application, len)?;

    let crc = layout
        .patch(&mut app, app_len, boot_len)
        .with_context(|| format!("Unable to patch {}", application.display()))?;
    info!("CRC16: 0x{:04X}", crc);

    info!("Appending bootloader bin");
    app.seek(SeekFrom::End(0))?;
    app.write_all(boot)
        .with_context(|| format!("Unable to append bootloader to {}", application.display()))?;
    app.flush()?;

    Ok((app_len, crc))
}

/**
 * Assemble, copy, describe, sign and clean up, in that order.
 *
 * Precondition failures come back as `Outcome::Rejected` with nothing
 * touched. I/O errors while producing the image abort the build. Signer and
 * cleanup failures are recorded in the report and don't.
 */
pub fn build(job: &Job, layout: &Layout, now: &NaiveDateTime) -> Result<Outcome> {
    let checked = match preflight(job, layout) {
        Ok(checked) => checked,
        Err(e) => return Ok(Outcome::Rejected(e)),
    };
    info!("Both bin files found");
    debug!(
        "{}: {} bytes, {}: {} bytes",
        job.application.display(),
        checked.app_len,
        job.bootloader.display(),
        checked.boot_len
    );
    info!("Sign tool located at: {}", checked.signer.display());

    let boot = fs::read(&job.bootloader)
        .with_context(|| format!("Unable to read {}", job.bootloader.display()))?;
    info!("Boot file size: {}", boot.len());

    let (app_len, crc16) = combine(&job.application, &boot, layout)?;
    debug!(
        "{}: {} + {} bytes",
        job.application.display(),
        app_len,
        boot.len()
    );

    let copy = artifacts::timestamped_path(&job.application, now);
    fs::copy(&job.application, &copy).with_context(|| {
        format!(
            "Unable to copy {} to {}",
            job.application.display(),
            copy.display()
        )
    })?;
    // The signer runs from the work directory
    let copy = fs::canonicalize(&copy)
        .with_context(|| format!("Unable to resolve {}", copy.display()))?;
    info!("Copied to {}", copy.display());

    let image_len = fs::metadata(&job.application)?.len();
    let bininfo = artifacts::bininfo(image_len);
    let bininfo_path = job.work_dir.join(BININFO_FILE);
    fs::write(&bininfo_path, &bininfo)
        .with_context(|| format!("Unable to write {}", bininfo_path.display()))?;
    debug!("{}: {}", bininfo_path.display(), bininfo);

    let signer = Signer::new(&checked.signer, &job.work_dir).sign(&copy);
    let cleanup = cleanup::remove_leftovers(&job.work_dir);

    Ok(Outcome::Built(Report {
        app_len,
        boot_len: checked.boot_len,
        crc16,
        image_len,
        copy,
        bininfo,
        signer,
        cleanup,
    }))
}

//----------------------------------------------------------------------------
// Tests
//----------------------------------------------------------------------------
