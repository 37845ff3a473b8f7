use std::path::PathBuf;
use std::str::FromStr;

use clap::Args;

use anime3rb::DEFAULT_UPLOAD_ENDPOINT;

#[derive(Debug, Clone, Args)]
pub struct AppArgs {
    /// Logging verbosity (error, warn, info, debug)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Use interactive prompts to edit arguments before execution
    #[arg(short, long)]
    pub interactive: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SiteArgs {
    /// Cookie header from a browser session that passed the bot challenge
    #[arg(short, long, env = "ANIME3RB_COOKIES", hide_env_values = true)]
    pub cookies: Option<String>,

    /// Minimum delay between two page requests in milliseconds (0 disables)
    #[arg(long, default_value_t = 1000)]
    pub rate_limit_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
    /// anime3rb title/episode url or slug
    #[arg(short, long)]
    pub series: Option<String>,

    /// Episodes to process, by 1-indexed position: a number (3), a range (1-12) or `all`.
    /// Prompted for when omitted
    #[arg(short, long)]
    pub episodes: Option<EpisodeRange>,

    #[command(flatten)]
    pub site: SiteArgs,

    #[command(flatten)]
    pub app_args: AppArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ResolveCommandArgs {
    /// List every quality on each episode page, not only the one a download would pick
    #[arg(long)]
    pub all_options: bool,

    #[command(flatten)]
    pub resolve: ResolveArgs,
}

#[derive(Debug, Clone, Args)]
pub struct UploadArgs {
    /// Upload every downloaded episode once the run is over
    #[arg(long)]
    pub upload: bool,

    /// Access token of the upload destination
    #[arg(long, env = "ANIME3RB_UPLOAD_TOKEN", hide_env_values = true)]
    pub upload_token: Option<String>,

    /// Page or account id the videos are published to
    #[arg(long, env = "ANIME3RB_UPLOAD_DESTINATION")]
    pub upload_destination: Option<String>,

    /// Description attached to every uploaded video
    #[arg(long, default_value = "")]
    pub upload_description: String,

    /// API root of the upload destination
    #[arg(long, env = "ANIME3RB_UPLOAD_ENDPOINT", default_value = DEFAULT_UPLOAD_ENDPOINT)]
    pub upload_endpoint: String,
}

#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Output directory for downloaded files
    #[arg(short, long, default_value = "output")]
    pub dir: PathBuf,

    /// Number of episodes downloaded at the same time
    #[arg(short = 'n', long, default_value_t = 3)]
    pub connections: usize,

    /// Attempts per episode, the first one included
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Seconds to wait between two attempts
    #[arg(long, default_value_t = 5)]
    pub retry_delay: u64,

    /// Smallest plausible episode size in KiB; smaller files are retried
    #[arg(long, default_value_t = 100)]
    pub min_size: u64,

    /// Seconds without a response or a new chunk before an attempt is abandoned
    #[arg(long, default_value_t = 60)]
    pub stall_timeout: u64,

    #[command(flatten)]
    pub upload: UploadArgs,

    #[command(flatten)]
    pub resolve: ResolveArgs,
}

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Search terms; lists the catalog when omitted
    pub query: Option<String>,

    /// Catalog page to list
    #[arg(short, long, default_value_t = 1)]
    pub page: u32,

    /// Restrict the catalog listing to a genre
    #[arg(short, long)]
    pub genre: Option<String>,

    /// Print the available genres instead
    #[arg(long)]
    pub genres: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub site: SiteArgs,

    #[command(flatten)]
    pub app_args: AppArgs,
}

#[derive(Debug, Clone, Args)]
pub struct InfoArgs {
    /// anime3rb title/episode url or slug
    #[arg(short, long)]
    pub series: Option<String>,

    /// Print the details as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub site: SiteArgs,

    #[command(flatten)]
    pub app_args: AppArgs,
}

/// inclusive range of 1-indexed episode positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeRange {
    All,
    Range { start: usize, end: usize },
}

impl FromStr for EpisodeRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(EpisodeRange::All);
        }

        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (
                start.trim().parse::<usize>().map_err(|_| "invalid start")?,
                end.trim().parse::<usize>().map_err(|_| "invalid end")?,
            ),
            None => {
                let value = s.parse::<usize>().map_err(|_| "invalid number")?;
                (value, value)
            }
        };

        if start == 0 {
            return Err("episodes are numbered from 1".into());
        }
        if start > end {
            return Err("start cannot be greater than end".into());
        }

        Ok(EpisodeRange::Range { start, end })
    }
}

impl std::fmt::Display for EpisodeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Range { start, end } if start == end => write!(f, "{start}"),
            Self::Range { start, end } => write!(f, "{start}-{end}"),
        }
    }
}
