use clap::{
    Args, CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use musux::{
    cli::{self, PlayerAction},
    config, error,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify through the local relay
    Auth,

    /// Forget the stored session
    Logout,

    /// Run the OAuth relay server
    Serve,

    /// Show the current track and available devices
    Status(DeviceOption),

    /// Play a track (URI, open.spotify.com link or id)
    Play(PlayOptions),

    /// Resume the loaded track
    Resume(DeviceOption),

    /// Pause playback
    Pause(DeviceOption),

    /// Toggle between play and pause
    Toggle(DeviceOption),

    /// Skip to the next track
    Next(DeviceOption),

    /// Skip to the previous track
    Previous(DeviceOption),

    /// Seek within the current track
    Seek(SeekOptions),

    /// Set the playback volume (0-100)
    Volume(VolumeOptions),

    /// Follow playback live until Ctrl-C
    Watch(DeviceOption),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Args, Debug, Clone)]
pub struct DeviceOption {
    /// Route commands through the named Connect device when it is available
    #[clap(long)]
    pub bridge: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PlayOptions {
    pub track: String,

    #[clap(flatten)]
    pub device: DeviceOption,
}

#[derive(Args, Debug, Clone)]
pub struct SeekOptions {
    /// Position as seconds or m:ss
    pub position: String,

    #[clap(flatten)]
    pub device: DeviceOption,
}

#[derive(Args, Debug, Clone)]
pub struct VolumeOptions {
    /// Values outside 0-100 are clamped
    #[clap(allow_negative_numbers = true)]
    pub percent: i32,

    #[clap(flatten)]
    pub device: DeviceOption,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Auth => cli::auth().await,
        Command::Logout => cli::logout().await,
        Command::Serve => cli::serve().await,
        Command::Status(opt) => cli::status(opt.bridge).await,
        Command::Play(opt) => cli::run(PlayerAction::Play(opt.track), opt.device.bridge).await,
        Command::Resume(opt) => cli::run(PlayerAction::Resume, opt.bridge).await,
        Command::Pause(opt) => cli::run(PlayerAction::Pause, opt.bridge).await,
        Command::Toggle(opt) => cli::run(PlayerAction::Toggle, opt.bridge).await,
        Command::Next(opt) => cli::run(PlayerAction::Next, opt.bridge).await,
        Command::Previous(opt) => cli::run(PlayerAction::Previous, opt.bridge).await,
        Command::Seek(opt) => {
            cli::run(PlayerAction::Seek(opt.position), opt.device.bridge).await
        }
        Command::Volume(opt) => {
            cli::run(PlayerAction::Volume(opt.percent), opt.device.bridge).await
        }
        Command::Watch(opt) => cli::watch(opt.bridge).await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
