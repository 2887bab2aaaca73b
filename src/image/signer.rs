use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

/// Flags passed to the firmware management tool, around the image path.
const SIGN_FLAGS: [&str; 2] = ["-s", "-i"];
const KEY_FLAGS: [&str; 6] = ["-e", "ISKMO5", "-f", "ISK-IMG-MOD-ISK", "-g", "04"];

/// Spawn attempts while the tool's executable is still open for writing.
const BUSY_RETRIES: u64 = 10;

#[cfg(target_os = "linux")]
fn is_busy(e: &io::Error) -> bool {
    // ETXTBSY
    e.raw_os_error() == Some(26)
}

#[cfg(not(target_os = "linux"))]
fn is_busy(_: &io::Error) -> bool {
    false
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerStatus {
    Signed,
    Failed(String),
}

impl SignerStatus {
    pub fn is_signed(&self) -> bool {
        matches!(self, SignerStatus::Signed)
    }
}

/**
 * One run of the external signing tool over a single image.
 */
#[derive(Debug, Clone)]
pub struct Signer {
    program: PathBuf,
    work_dir: PathBuf,
}

impl Signer {
    pub fn new(program: &Path, work_dir: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// `-s -i <image> -e ISKMO5 -f ISK-IMG-MOD-ISK -g 04`
    pub fn args(image: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = SIGN_FLAGS.iter().map(OsString::from).collect();
        args.push(image.as_os_str().to_owned());
        args.extend(KEY_FLAGS.iter().map(OsString::from));
        args
    }

    /**
     * Run the signer to completion. Any failure, including failing to start
     * the process, is returned as `SignerStatus::Failed` and never as an
     * error.
     */
    pub fn sign(&self, image: &Path) -> SignerStatus {
        let args = Signer::args(image);
        debug!("{} {:?}", self.program.display(), args);

        let output = match self.run(&args) {
            Ok(output) => output,
            Err(e) => {
                let reason = format!("couldn't run {}: {}", self.program.display(), e);
                warn!("Sign tool failed: {}", reason);
                return SignerStatus::Failed(reason);
            }
        };

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!("signer: {}", line);
        }

        if output.status.success() {
            info!("Signed {}", image.display());
            SignerStatus::Signed
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match stderr.trim() {
                "" => format!("sign tool returned {}", output.status),
                detail => format!("sign tool returned {}: {}", output.status, detail),
            };
            warn!("Sign tool failed: {}", reason);
            SignerStatus::Failed(reason)
        }
    }

    fn run(&self, args: &[OsString]) -> io::Result<Output> {
        let mut attempt = 0;
        loop {
            match Command::new(&self.program)
                .args(args)
                .current_dir(&self.work_dir)
                .output()
            {
                Err(e) if is_busy(&e) && attempt < BUSY_RETRIES => {
                    attempt += 1;
                    debug!("{} is busy, retrying", self.program.display());
                    thread::sleep(Duration::from_millis(10 * attempt));
                }
                result => return result,
            }
        }
    }
}

//----------------------------------------------------------------------------
// Tests
//----------------------------------------------------------------------------
