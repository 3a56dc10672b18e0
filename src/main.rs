use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use log::info;
use std::rc::Rc;

mod client;
mod config;
mod error;
mod models;
mod patch;
mod pipeline;
mod playlist;


use crate::client::{ListenBrainzApi, ListenBrainzClient};
use crate::config::load_config;
use crate::patch::runner::{RunOptions, generate_playlist};
use crate::patch::{InputKind, PatchArgs, PatchRegistry};

#[derive(Parser)]
#[command(name = "playlist-pipeline")]
#[command(about = "Generate MusicBrainz playlists from ListenBrainz data using patches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a playlist using a patch
    Playlist {
        /// Slug of the patch to run, see `list`
        patch: String,

        /// Turn on debug logging
        #[arg(long)]
        debug: bool,

        /// Show the generated playlist
        #[arg(short = 'p', long = "print")]
        print: bool,

        /// Save the generated playlist as JSPF in the current directory
        #[arg(short = 's', long)]
        save: bool,

        /// ListenBrainz user token used to upload, see https://listenbrainz.org/profile
        #[arg(short = 't', long)]
        token: Option<String>,

        /// Upload the generated playlist to ListenBrainz; requires a token
        #[arg(short = 'u', long)]
        upload: bool,

        /// The ListenBrainz user the playlist was created for
        #[arg(short = 'c', long)]
        created_for: Option<String>,

        /// Override the default name of the generated playlist
        #[arg(short = 'n', long)]
        name: Option<String>,

        /// Override the default description of the generated playlist
        #[arg(short = 'd', long)]
        desc: Option<String>,

        /// Minimum number of recordings the playlist must have
        #[arg(short = 'm', long)]
        min_recordings: Option<usize>,

        /// Arguments and options passed on to the patch
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List all available patches
    List,

    /// Show the inputs of a patch
    Info { patch: String },

    /// Look up a MusicBrainz area id by its exact name
    Area { name: String },
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let debug = matches!(cli.command, Command::Playlist { debug: true, .. });
    init_logging(debug);

    let cli_token = match &cli.command {
        Command::Playlist { token, .. } => token.clone(),
        _ => None,
    };
    // The client reads with the same token it uploads with
    let config = load_config().with_token(cli_token);
    let client = Rc::new(ListenBrainzClient::new(&config));
    let api: Rc<dyn ListenBrainzApi> = client.clone();
    let registry = PatchRegistry::builtin();

    match cli.command {
        Command::List => {
            println!("Available patches:");
            for slug in registry.slugs() {
                if let Some(patch) = registry.get(slug, api.clone()) {
                    println!("  {slug:<20} {}", patch.description());
                }
            }
            Ok(())
        }

        Command::Info { patch } => {
            let patch = registry
                .get(&patch, api)
                .ok_or_else(|| anyhow!("Cannot load patch '{patch}'. Use the list command to get a list of available patches."))?;
            println!("{}\n", patch.slug());
            println!("{}\n", patch.description());
            for input in patch.inputs() {
                let usage = match input.kind {
                    InputKind::Argument => input.name.to_uppercase(),
                    InputKind::Option => format!("--{} VALUE", input.name.replace('_', "-")),
                };
                let required = if input.required { " (required)" } else { "" };
                println!("  {usage:<24} {}{required}", input.help);
            }
            Ok(())
        }

        Command::Area { name } => {
            let area_id = api.lookup_area(&name)?;
            println!("{name}: {area_id}");
            Ok(())
        }

        Command::Playlist {
            patch,
            debug: _,
            print,
            save,
            token: _,
            upload,
            created_for,
            name,
            desc,
            min_recordings,
            args,
        } => {
            let patch = registry
                .get(&patch, api)
                .ok_or_else(|| anyhow!("Cannot load patch '{patch}'. Use the list command to get a list of available patches."))?;
            let patch_args = PatchArgs::parse(patch.inputs(), &args)?;

            let options = RunOptions {
                print,
                save,
                save_dir: None,
                upload,
                token: config.token.clone(),
                created_for,
                name,
                desc,
                min_recordings,
            };

            let outcome = generate_playlist(patch.as_ref(), &patch_args, &options, client.as_ref())?;

            info!("{} playlist(s) generated", outcome.playlists.len());
            for path in &outcome.saved {
                println!("✓ Saved playlist: {}", path.display());
            }
            for url in &outcome.urls {
                println!("✓ Submitted playlist: {url}");
            }
            if !outcome.feedback.is_empty() {
                println!("User feedback:");
                for feedback in &outcome.feedback {
                    println!("  * {feedback}");
                }
                println!();
            }

            if outcome.completed {
                Ok(())
            } else {
                Err(anyhow!("✗ Playlist was not generated"))
            }
        }
    }
}
