use std::path::PathBuf;

use thiserror::Error;

/**
 * Reasons a build is refused before any file is touched.
 */
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("application file doesn't exist: {}", .0.display())]
    MissingApplication(PathBuf),

    #[error("bootloader file doesn't exist: {}", .0.display())]
    MissingBootloader(PathBuf),

    #[error("sign tool doesn't exist at: {}", .0.display())]
    MissingSigner(PathBuf),

    #[error("application file {} is {len} bytes, the image layout needs at least {min}", path.display())]
    ApplicationTooSmall { path: PathBuf, len: u64, min: u64 },

    #[error("{} is {len} bytes, which doesn't fit a 32-bit size field", path.display())]
    TooLarge { path: PathBuf, len: u64 },
}
