use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

use anime3rb::resolver::select_best;
use anime3rb::{
    AnimeSummary, DownloadConfig, DownloadEvent, EpisodeRef, EventSink, HttpMediaSource,
    HttpUploadSink, Pipeline, RunRequest, UploadConfig, upload_all,
};

use crate::args::*;
use crate::episode::*;
use crate::logger::*;
use crate::progress::*;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub download_args: DownloadArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download a range of episodes of a series (default)
    Download(DownloadArgs),
    /// Print the best download link of each selected episode
    Resolve(ResolveCommandArgs),
    /// Search titles, or browse the catalog
    Search(SearchArgs),
    /// Show the details of a series
    Info(InfoArgs),
}

impl Cli {
    fn app_args(&self) -> &AppArgs {
        match &self.command {
            Some(Commands::Download(args)) => &args.resolve.app_args,
            Some(Commands::Resolve(args)) => &args.resolve.app_args,
            Some(Commands::Search(args)) => &args.app_args,
            Some(Commands::Info(args)) => &args.app_args,
            None => &self.download_args.resolve.app_args,
        }
    }
}

pub struct App {
    cli: Cli,
    logger: Arc<CliLogger>,
}

impl App {
    pub fn new() -> Self {
        let cli = Cli::parse();
        let logger = Arc::new(CliLogger::new(&cli.app_args().log_level));
        init_tracing(Arc::clone(&logger));
        Self { cli, logger }
    }

    /// 0 once the command ran to completion, even with failed episodes;
    /// 1 when it was aborted before anything was downloaded.
    pub async fn run(&self) -> ExitCode {
        let result = match &self.cli.command {
            Some(Commands::Download(args)) => self.download(args.clone()).await,
            Some(Commands::Resolve(args)) => self.resolve(args.clone()).await,
            Some(Commands::Search(args)) => self.search(args.clone()).await,
            Some(Commands::Info(args)) => self.info(args.clone()).await,
            None => self.download(self.cli.download_args.clone()).await,
        };

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                self.logger.failed(format!("{err:#}"));
                ExitCode::FAILURE
            }
        }
    }

    pub async fn resolve(&self, args: ResolveCommandArgs) -> Result<()> {
        let logger = &self.logger;
        let selection = select_episodes(&args.resolve, logger).await?;

        for episode in &selection.episodes {
            if args.all_options {
                self.list_options(&selection, episode).await;
                continue;
            }

            let resolved = logger
                .while_loading(
                    format!("resolving episode {}", episode.number),
                    selection.client.resolve_episode(&episode.url),
                )
                .await;

            match resolved {
                Ok(Some(option)) => logger.success(format!(
                    "episode {} [{}]: {}",
                    episode.number,
                    option.quality,
                    option.url.yellow()
                )),
                Ok(None) => logger.warn(format!(
                    "episode {}: no acceptable download option",
                    episode.number
                )),
                Err(err) => logger.warn(format!("episode {}: {err}", episode.number)),
            }
        }

        Ok(())
    }

    async fn list_options(&self, selection: &EpisodeSelection, episode: &EpisodeRef) {
        let logger = &self.logger;
        let options = logger
            .while_loading(
                format!("reading episode {}", episode.number),
                selection.client.fetch_download_options(&episode.url),
            )
            .await;

        match options {
            Ok(options) if options.is_empty() => {
                logger.warn(format!("episode {}: no download section", episode.number))
            }
            Ok(options) => {
                let best = select_best(&options).map(|o| o.url.as_str());
                logger.success(format!("episode {}:", episode.number));
                for option in &options {
                    let mark = if best == Some(option.url.as_str()) { "*" } else { " " };
                    logger.print(format!(
                        "  {mark} {:<12} {:<24} {}",
                        option.quality.to_string(),
                        option.label,
                        option.url.yellow()
                    ));
                }
            }
            Err(err) => logger.warn(format!("episode {}: {err}", episode.number)),
        }
    }

    pub async fn download(&self, args: DownloadArgs) -> Result<()> {
        let logger = &self.logger;

        // credentials are checked before anything is fetched
        let uploader = if args.upload.upload {
            let config = UploadConfig::new(
                args.upload.upload_token.clone(),
                args.upload.upload_destination.clone(),
            )
            .endpoint(&args.upload.upload_endpoint);
            config.credentials()?;
            Some(HttpUploadSink::new(config)?)
        } else {
            None
        };

        let selection = select_episodes(&args.resolve, logger).await?;

        let source = Arc::new(HttpMediaSource::new(Duration::from_secs(
            args.resolve.site.timeout.max(1),
        ))?);
        let config = DownloadConfig::new(&args.dir)
            .retry(args.retries.max(1), Duration::from_secs(args.retry_delay))
            .min_file_size(args.min_size.saturating_mul(1024))
            .stall_timeout(Duration::from_secs(args.stall_timeout.max(1)));

        let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
        let sink: EventSink = Arc::new(move |event: DownloadEvent| {
            let _ = events_tx.send(event);
        });
        let pipeline = Pipeline::new(Arc::clone(&selection.client), source, config).on_event(sink);

        let request = RunRequest {
            anime_url: selection.series_url.clone(),
            episodes: selection.episodes.clone(),
            max_concurrency: args.connections.max(1),
            final_episode: selection.listing.final_episode().map(str::to_string),
        };

        logger.success(format!(
            "downloading {} episode(s) of {} into {}",
            request.episodes.len().yellow(),
            selection.title().yellow(),
            args.dir.display().yellow()
        ));

        let mut progress_renderer = DownloadProgressRenderer::new(logger.level >= LogLevel::Info);
        let mut tick = tokio::time::interval(Duration::from_millis(80));
        let mut run_fut = std::pin::pin!(pipeline.run(request));

        let run_result = loop {
            tokio::select! {
                result = &mut run_fut => break result,
                maybe_event = events_rx.recv() => {
                    if let Some(event) = maybe_event {
                        progress_renderer.handle(event);
                    }
                }
                _ = tick.tick() => {
                    progress_renderer.tick();
                }
            }
        };

        while let Ok(event) = events_rx.try_recv() {
            progress_renderer.handle(event);
        }
        progress_renderer.finish();

        let report = run_result?;
        for skipped in &report.skipped {
            logger.warn(format!("episode {} skipped: {}", skipped.episode, skipped.reason));
        }
        for result in &report.results {
            match result.failure_reason() {
                None => logger.success(format!(
                    "episode {} saved to {}",
                    result.episode,
                    result.path.display().yellow()
                )),
                Some(reason) => logger.failed(format!("episode {}: {reason}", result.episode)),
            }
        }

        if report.succeeded() == report.requested {
            logger.success(report.summary());
        } else {
            logger.warn(report.summary());
        }

        if let Some(uploader) = uploader {
            if report.succeeded() == 0 {
                logger.warn("nothing to upload");
                return Ok(());
            }

            let uploads = upload_all(&uploader, &report, &args.upload.upload_description).await;
            for upload in &uploads {
                match &upload.result {
                    Ok(_) => logger.success(format!("uploaded {}", upload.title.yellow())),
                    Err(err) => logger.failed(format!("upload of episode {}: {err}", upload.episode)),
                }
            }
        }

        Ok(())
    }

    pub async fn search(&self, args: SearchArgs) -> Result<()> {
        let logger = &self.logger;
        let client = build_client(&args.site)?;

        if args.genres {
            let genres = logger
                .while_loading("retrieving genres", client.list_genres())
                .await?;
            if args.json {
                logger.print(serde_json::to_string_pretty(&genres)?);
            } else {
                genres.iter().for_each(|genre| logger.print(genre));
            }
            return Ok(());
        }

        let (items, more) = match args.query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => {
                let items = logger
                    .while_loading(format!("searching for {}", query.yellow()), client.search(query))
                    .await?;
                (items, None)
            }
            _ => {
                let page = logger
                    .while_loading(
                        format!("listing page {}", args.page),
                        client.list_anime(args.page.max(1), args.genre.as_deref()),
                    )
                    .await?;
                let more = page.has_next.then_some(page.page + 1);
                (page.items, more)
            }
        };

        if args.json {
            logger.print(serde_json::to_string_pretty(&items)?);
            return Ok(());
        }

        if items.is_empty() {
            logger.warn("no titles found");
        }
        for anime in &items {
            logger.print(summary_line(anime));
        }
        if let Some(next) = more {
            logger.print(format!("more on page {next} (--page {next})").dimmed().to_string());
        }

        Ok(())
    }

    pub async fn info(&self, args: InfoArgs) -> Result<()> {
        let logger = &self.logger;
        let url = series_url(args.series.as_deref(), args.app_args.interactive)?;
        let client = build_client(&args.site)?;

        let anime = logger
            .while_loading(format!("getting info from: {}", url.yellow()), client.get_anime(&url))
            .await?;

        if args.json {
            logger.print(serde_json::to_string_pretty(&anime)?);
            return Ok(());
        }

        logger.print(anime.title.bold().to_string());
        if !anime.alt_titles.is_empty() {
            logger.print(anime.alt_titles.join(" / ").dimmed().to_string());
        }
        logger.print(format!("url:      {}", anime.url.yellow()));
        if let Some(status) = &anime.status {
            logger.print(format!("status:   {status}"));
        }
        if let Some(year) = anime.year {
            logger.print(format!("year:     {year}"));
        }
        if let Some(count) = anime.episode_count {
            logger.print(format!("episodes: {count}"));
        }
        if let Some(rating) = anime.rating {
            logger.print(format!("rating:   {rating:.2}"));
        }
        if !anime.genres.is_empty() {
            logger.print(format!("genres:   {}", anime.genres.join(", ")));
        }
        if let Some(synopsis) = &anime.synopsis {
            logger.print(format!("\n{synopsis}"));
        }

        Ok(())
    }
}

fn summary_line(anime: &AnimeSummary) -> String {
    let mut details = Vec::new();
    if let Some(year) = anime.year {
        details.push(year.to_string());
    }
    if let Some(count) = anime.episode_count {
        details.push(format!("{count} ep"));
    }
    if let Some(rating) = anime.rating {
        details.push(format!("★ {rating:.1}"));
    }

    if details.is_empty() {
        format!("{}  {}", anime.title, anime.slug.dimmed())
    } else {
        format!("{}  {}  ({})", anime.title, anime.slug.dimmed(), details.join(", "))
    }
}
