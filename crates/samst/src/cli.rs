//! Clap derive structures for the `samst` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// samst -- diagnostics for Samsung SmartThings devices
#[derive(Debug, Parser)]
#[command(
    name = "samst",
    version,
    about = "Inspect and control Samsung SmartThings devices from the command line",
    long_about = "Talks to Samsung TVs, Frame TVs and soundbars through the SmartThings\n\
        cloud API and their LAN protocols, with the same polling, retry and\n\
        feature-probing behaviour a home-automation host would use.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "SAMST_PROFILE", global = true)]
    pub profile: Option<String>,

    /// SmartThings token (overrides profile)
    #[arg(long, env = "SAMST_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// API root (overrides profile)
    #[arg(long, env = "SAMST_API_BASE", global = true)]
    pub api_base: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SAMST_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "SAMST_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List and inspect SmartThings devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Read the full status of a device once
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Send a capability command
    #[command(alias = "cmd")]
    Command(CommandArgs),

    /// Follow a device's poll loop and print every published snapshot
    Watch(WatchArgs),

    /// Validate which sound modes a soundbar accepts
    Probe(ProbeArgs),

    /// TV apps: list the catalog or launch one
    Apps(AppsArgs),

    /// Soundbar execute features over the cloud
    #[command(alias = "sb")]
    Soundbar(SoundbarArgs),

    /// Talk to a Frame TV art channel on the LAN
    Frame(FrameArgs),

    /// Talk to a Wi-Fi soundbar's JSON-RPC endpoint on the LAN
    LocalSoundbar(LocalSoundbarArgs),

    /// Check the token against the SmartThings account
    Whoami,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices visible to the token
    #[command(alias = "ls")]
    List {
        /// Include non-Samsung devices
        #[arg(long, short = 'a')]
        all: bool,
    },

    /// Show one device with its capabilities
    Get {
        /// Device ID or label
        device: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STATUS / COMMAND / WATCH / PROBE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Device ID or label
    pub device: String,

    /// Only show this component (default: main, unless --all)
    #[arg(long, short = 'c')]
    pub component: Option<String>,

    /// Show every component
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct CommandArgs {
    /// Device ID or label
    pub device: String,

    /// Capability id (e.g. `switch`, `audioVolume`)
    pub capability: String,

    /// Command name (e.g. `on`, `setVolume`)
    pub command: String,

    /// Arguments as JSON: a list, a scalar (wrapped in a list), or null
    #[arg(long, short = 'A', default_value = "")]
    pub args: String,

    /// Target component
    #[arg(long, short = 'c', default_value = "main")]
    pub component: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Device ID or label
    pub device: String,

    /// Stop after this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Poll interval in seconds (never below 5)
    #[arg(long)]
    pub interval: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Soundbar device ID or label
    pub device: String,

    /// Drop cached results and validate again
    #[arg(long, short = 'f')]
    pub force: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  APPS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct AppsArgs {
    #[command(subcommand)]
    pub command: AppsCommand,
}

#[derive(Debug, Subcommand)]
pub enum AppsCommand {
    /// List the built-in app catalog
    #[command(alias = "ls")]
    List,

    /// Launch an app through the cloud
    Launch {
        /// TV device ID or label
        device: String,

        /// App id, "Name (id)" label, or name
        app: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SOUNDBAR (CLOUD)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SoundbarArgs {
    /// Soundbar device ID or label
    pub device: String,

    #[command(subcommand)]
    pub command: SoundbarCommand,
}

#[derive(Debug, Subcommand)]
pub enum SoundbarCommand {
    /// Read sound mode, woofer, EQ and advanced audio
    State,

    /// Switch the input source (cycles when only "next" is supported)
    Input { source: String },

    /// Set the sound mode
    SoundMode { mode: String },

    /// Set the woofer level (-12..=6)
    #[command(allow_negative_numbers = true)]
    Woofer { level: i64 },

    /// Select an EQ preset
    Eq { preset: String },

    /// Night mode on/off
    Night { state: Toggle },

    /// Bass boost on/off
    BassBoost { state: Toggle },

    /// Voice amplifier on/off
    VoiceAmp { state: Toggle },

    /// Active voice amplifier on/off
    ActiveVoiceAmp { state: Toggle },

    /// SpaceFit sound on/off
    SpaceFit { state: Toggle },

    /// Channel level of one speaker (-12..=6)
    #[command(allow_negative_numbers = true)]
    SpeakerLevel {
        /// Speaker id, e.g. Spk_Center
        speaker: String,
        level: i64,
    },

    /// Rear speaker placement
    RearSpeaker {
        /// Front or Rear
        mode: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  FRAME (LAN)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct FrameArgs {
    /// TV address (overrides the profile's `frame.host`)
    #[arg(long)]
    pub host: Option<String>,

    /// Art channel port (8002 TLS, 8001 plain)
    #[arg(long)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: FrameCommand,
}

#[derive(Debug, Subcommand)]
pub enum FrameCommand {
    /// Aggregated art-mode state
    State,

    /// Read or set art mode
    ArtMode { state: Option<Toggle> },

    /// Read or set art brightness (1-10)
    Brightness { level: Option<i64> },

    /// List stored artworks
    Artworks {
        /// Only this category (e.g. MY-C0002)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show the artwork on display
    Current,

    /// Display an artwork
    Select {
        content_id: String,

        /// Switch to art mode right away
        #[arg(long)]
        show: bool,
    },

    /// Delete artworks
    Delete {
        #[arg(required = true)]
        content_ids: Vec<String>,
    },

    /// Change the matte of an artwork
    Matte { content_id: String, matte_id: String },

    /// Apply a photo filter to an artwork
    Filter { content_id: String, filter_id: String },

    /// Set slideshow duration, order and category
    Slideshow {
        /// Minutes between images; "off" disables
        duration: String,

        #[arg(long)]
        shuffle: bool,

        #[arg(long)]
        category: Option<String>,
    },

    /// Motion timer ("off" or minutes)
    MotionTimer { value: String },

    /// Motion sensitivity (1-3)
    MotionSensitivity { value: String },

    /// Brightness sensor on/off
    BrightnessSensor { state: Toggle },

    /// Installed apps (remote channel)
    Apps,

    /// Launch an app (remote channel)
    Launch { app: String },

    /// Open a URL in the TV browser
    OpenUrl { url: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SOUNDBAR (LAN)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LocalSoundbarArgs {
    /// Soundbar address (overrides the profile's `soundbar.host`)
    #[arg(long)]
    pub host: Option<String>,

    #[command(subcommand)]
    pub command: LocalSoundbarCommand,
}

#[derive(Debug, Subcommand)]
pub enum LocalSoundbarCommand {
    /// Consolidated status
    Status,

    /// Power on/off
    Power { state: Toggle },

    /// Read or set the volume (0-100)
    Volume { level: Option<u8> },

    /// Toggle mute
    Mute,

    /// Read or select the input
    Input { source: Option<String> },

    /// Read or set the sound mode
    SoundMode { mode: Option<String> },

    /// Sound modes the soundbar reports
    SoundModes,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Set a profile value
    Set {
        /// Key, e.g. `scan_interval`, `frame.host`, `soundbar.host`
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store the token in the system keyring
    SetToken {
        /// Token value; read from stdin when omitted
        token: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
