mod cli;

use std::{fs, process::ExitCode};

use clap::Parser;
use cli::{Cli, Command, HeadersAction, KeysAction, MdAction, PagesAction, PdeAction};
use freedom_core::{config::Config, error::CoreError, Environment};
use log::LevelFilter;

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

/// Maps a `CoreError` to the exit code recorded in the configuration surface
/// table: distinct codes let scripts branch on *why* a command refused,
/// without having to parse stderr.
fn exit_code_for(err: &CoreError) -> u8 {
    match err {
        CoreError::RefusedUnconfirmed => 2,
        CoreError::WrongTuple => 3,
        CoreError::PreconditionUnmet { .. } | CoreError::ArrayInconsistent { .. } => 4,
        CoreError::InsufficientSpace { .. } => 5,
        CoreError::PreflightFailure { .. } => 6,
        CoreError::ToolFailure { .. } | CoreError::NotFound { .. } | CoreError::Io(_) => 1,
    }
}

fn run(cli: Cli) -> Result<(), CoreError> {
    let config = load_config(cli.config.as_deref()).unwrap_or_else(|e| {
        log::warn!("failed to load config, falling back to defaults: {e}");
        Config::default()
    });
    let env = Environment::new(config);
    env.preflight()?;

    match cli.command {
        Command::Pages { action } => match action {
            PagesAction::Create { limit, page_size, simulate } => {
                let allocation = env.pages_allocate(limit, page_size, simulate)?;
                for path in &allocation.created {
                    println!("{}", path.display());
                }
            }
            PagesAction::Remove { yes } => {
                if !yes {
                    return Err(CoreError::RefusedUnconfirmed);
                }
                env.pages_remove()?;
            }
            PagesAction::List => {
                for page in env.pages_list()?.pages {
                    println!(
                        "{}\t{}\t{}",
                        page.path.display(),
                        page.size_bytes,
                        page.loop_device.map(|d| d.display().to_string()).unwrap_or_else(|| "-".to_string())
                    );
                }
            }
            PagesAction::Activate => {
                env.pages_activate()?;
            }
            PagesAction::Deactivate => {
                env.pages_deactivate()?;
            }
        },

        Command::Md { action } => match action {
            MdAction::Start => {
                let array = env.md_start()?;
                println!("/dev/md/{}", array.name);
            }
            MdAction::Stop => env.md_stop()?,
            MdAction::Status => match env.md_status()? {
                Some(array) => println!("{}\t{} member(s)", array.name, array.member_devices.len()),
                None => println!("inactive"),
            },
            MdAction::PopulateSafezone => env.md_populate_safezone()?,
        },

        Command::Keys { action } => match action {
            KeysAction::Create { count } => {
                for path in env.keys_create(count)? {
                    println!("{}", path.display());
                }
            }
            KeysAction::Remove { yes } => {
                if !yes {
                    return Err(CoreError::RefusedUnconfirmed);
                }
                env.keys_remove(true)?;
            }
            KeysAction::List => {
                for key in env.keys_list()? {
                    println!("{}\t{}", key.name, key.fingerprint);
                }
            }
        },

        Command::Headers { action } => match action {
            HeadersAction::Create { count } => {
                for record in env.headers_create(count)? {
                    println!(
                        "{}\tkey={}\tkeyfile_offset={}\tpayload_offset={}",
                        record.header_name, record.key_name, record.keyfile_offset, record.payload_offset
                    );
                }
            }
            HeadersAction::Remove { yes } => {
                if !yes {
                    return Err(CoreError::RefusedUnconfirmed);
                }
                env.headers_remove(true)?;
            }
            HeadersAction::List => {
                for header in env.headers_list()? {
                    println!("{}\t{}", header.name, header.size_bytes);
                }
            }
        },

        Command::Pde { action } => match action {
            PdeAction::Start {
                header,
                key,
                keyfile_offset,
                bless,
            } => {
                let mapped = env.pde_start(&header, &key, keyfile_offset, bless)?;
                println!("{}", mapped.display());
            }
            PdeAction::Stop => env.pde_stop()?,
        },

        Command::Status => {
            let state = env.status()?;
            println!("backing pages: {} ({})", state.backing_page_count, if state.backing_active { "active" } else { "inactive" });
            println!("array: {}", state.md_name.as_deref().unwrap_or("inactive"));
            println!("mapping: {}", if state.luks_open { "open" } else { "closed" });
            println!("keys: {}", state.key_count);
            println!("headers: {}", state.header_count);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("freedomctl: {e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
