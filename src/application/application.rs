use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use compio::fs;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::RuntimeConfig;
use crate::filesystem::{SnapshotError, Tree, snapshot};
use crate::shell::Session;

pub struct Application;

impl Application {
    /// Loads the backing disk file (or starts fresh if it does not exist),
    /// runs the console loop over stdin, and writes the snapshot back on
    /// exit. Errors here are the fatal ones; everything the user types is
    /// handled inside the session and never ends up here.
    pub async fn run(config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let config: RuntimeConfig = config.into();
        let tree = Self::load_or_fresh(&config.disk).await?;
        let mut session = Session::with_tree(tree);

        Self::console_loop(&mut session);

        let bytes = snapshot::save(session.tree()).context(SnapshotSaveSnafu)?;
        debug!(
            "Writing {} snapshot bytes to {}",
            bytes.len(),
            config.disk.display()
        );
        fs::write(&config.disk, bytes)
            .await
            .0
            .context(DiskWriteSnafu { path: &config.disk })?;
        Ok(())
    }

    async fn load_or_fresh(path: &Path) -> Result<Tree, ApplicationError> {
        match fs::read(path).await {
            Ok(bytes) => {
                info!("Loading snapshot from {}", path.display());
                snapshot::load(&bytes).context(SnapshotLoadSnafu { path })
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                info!("No disk file at {}, starting fresh", path.display());
                Ok(Tree::new())
            }
            Err(error) => Err(error).context(DiskReadSnafu { path }),
        }
    }

    fn console_loop(session: &mut Session) {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        let mut line = String::new();
        loop {
            print!("{}", session.prompt());
            let _ = stdout.flush();

            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => {
                    info!("End of input, exiting");
                    break;
                }
                Ok(_) => {}
                Err(error) => {
                    warn!("Failed to read console input: {error}");
                    break;
                }
            }

            let reply = session.dispatch(&line);
            for output in &reply.lines {
                println!("{output}");
            }
            if reply.exit {
                break;
            }
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Failed to read the disk file {}", path.display()))]
    DiskReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Refusing to start from the corrupt disk file {}", path.display()))]
    SnapshotLoadError {
        path: PathBuf,
        source: SnapshotError,
    },
    #[snafu(display("Failed to encode the snapshot"))]
    SnapshotSaveError { source: SnapshotError },
    #[snafu(display("Failed to write the disk file {}", path.display()))]
    DiskWriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}
