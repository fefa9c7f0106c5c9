//! Binary entry point: parses arguments, opens the infile/outfile/mapfile,
//! builds the recovery session, mounts the FUSE filesystem on a background
//! thread, and runs the control shell on the main thread until `exit` or
//! end-of-file on standard input — then unmounts and saves the map on the
//! way out.

use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use clap::Parser;
use log::LevelFilter;

use fuserescue::cli::Args;
use fuserescue::map::{Map, RecoverStates, SegmentState};
use fuserescue::recovery::PositionedFile;
use fuserescue::session::{self, LogLevel, RuntimeConfig, SessionState};
use fuserescue::{fs, shell, RescueError, Session};

fn main() {
    env_logger::init();
    log::set_max_level(LevelFilter::Warn);

    let args = Args::parse();
    match run(args) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("fuserescue: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

fn run(args: Args) -> Result<(), RescueError> {
    let infile = session::open_infile(&args.infile)
        .map_err(|e| RescueError::Usage(format!("cannot open infile {}: {}", args.infile.display(), e)))?;

    let infile_len = seekable_length(&infile)
        .map_err(|e| RescueError::Usage(format!("cannot determine infile length: {e}")))?;

    if args.offset >= infile_len {
        return Err(RescueError::Usage(format!(
            "offset {} is not strictly less than the infile's length {}",
            args.offset, infile_len
        )));
    }
    let remaining = infile_len.saturating_sub(args.offset);
    let size = match args.size {
        Some(requested) if requested > remaining => {
            return Err(RescueError::Usage(format!(
                "requested size {requested} exceeds the infile's remaining length {remaining}"
            )))
        }
        Some(requested) => requested,
        None => remaining,
    };

    let blocksize = session::discover_blocksize(&infile);

    let outfile = session::open_outfile(&args.outfile, size)
        .map_err(|e| RescueError::Usage(format!("cannot open outfile {}: {}", args.outfile.display(), e)))?;

    let map = Map::load(&args.mapfile)?;

    let mountpoint_meta = std::fs::metadata(&args.mountpoint)
        .map_err(|e| RescueError::Usage(format!("cannot stat mountpoint {}: {}", args.mountpoint.display(), e)))?;
    if !mountpoint_meta.is_file() {
        return Err(RescueError::Usage(format!(
            "mountpoint {} is not a regular file",
            args.mountpoint.display()
        )));
    }

    let mut recover_states = RecoverStates::NONE;
    recover_states.set(SegmentState::NonTrimmed);
    recover_states.set(SegmentState::NonTried);

    let state = SessionState {
        config: RuntimeConfig {
            infile_path: args.infile.clone(),
            mapfile_path: args.mapfile.clone(),
            offset: args.offset,
            size,
            blocksize,
            recover_states,
            allowed: false,
            unsaved: false,
            loglevel: LogLevel::Default,
        },
        map,
        infile: Box::new(PositionedFile::new(infile)),
        outfile,
    };
    let session = Arc::new(Session::new(state));

    let mount = fs::spawn(Arc::clone(&session), &args.mountpoint)
        .map_err(|e| RescueError::Usage(format!("cannot mount {}: {}", args.mountpoint.display(), e)))?;

    let stdin = std::io::stdin();
    shell::run(&session, stdin.lock()).map_err(|e| RescueError::Usage(format!("shell I/O error: {e}")))?;

    drop(mount);

    let mapfile_path = session.lock().config.mapfile_path.clone();
    session.lock().map.save(&mapfile_path)?;

    Ok(())
}

/// Infile length via seek-to-end-then-rewind, since block devices do not
/// report a useful `metadata().len()`.
fn seekable_length(file: &std::fs::File) -> std::io::Result<u64> {
    let mut file = file.try_clone()?;
    let len = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Ok(len)
}
