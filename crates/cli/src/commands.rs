//! Subcommand handlers

use anyhow::{bail, Context as _, Result};
use core_pipeline::config::AppConfig;
use core_pipeline::output;
use core_pipeline::{
    FriendRegistry, PipelineError, RecognizeError, RegionBox, Roster, RosterPipeline, TesseractCli,
    Team,
};
use stats_bridge::{
    Credentials, EnrichmentEngine, EnrichmentReport, LeaderboardClient, LeaderboardConfig,
    SharedRegistry,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Where settings live and what they say
pub struct Context {
    pub config_path: PathBuf,
    pub config: AppConfig,
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("config_dir() unavailable")?;
    Ok(base.join("rosterscan").join("config.json"))
}

impl Context {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let config = AppConfig::load(&config_path)?;
        Ok(Self {
            config_path,
            config,
        })
    }

    fn friends_path(&self) -> PathBuf {
        self.config.friends_path_for(&self.config_path)
    }

    fn load_registry(&self) -> Result<FriendRegistry> {
        Ok(FriendRegistry::load(&self.friends_path())?)
    }

    fn save_registry(&self, registry: &FriendRegistry) -> Result<()> {
        Ok(registry.save(&self.friends_path())?)
    }

    /// Registry plus the match persisted in the team files
    fn load_roster(&self, output_dir: &Path) -> Result<Roster> {
        let mut roster = Roster::new(self.load_registry()?);
        for team in Team::ALL {
            let names = output::read_team_file(output_dir, team)?;
            roster.set_team_names(team, names);
        }
        Ok(roster)
    }

    fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path)?;
        println!("Saved {}", self.config_path.display());
        Ok(())
    }
}

/// True when `err` comes from a missing or unlaunchable recognition engine
pub fn is_engine_unavailable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<RecognizeError>()
            .is_some_and(RecognizeError::is_engine_unavailable)
            || cause.downcast_ref::<PipelineError>().is_some_and(|e| {
                matches!(e, PipelineError::Recognition(r) if r.is_engine_unavailable())
            })
    })
}

pub struct ScanOptions {
    pub image: PathBuf,
    pub team: Option<Team>,
    pub save_crops: bool,
    pub enrich: bool,
    pub output_dir: Option<PathBuf>,
    pub raw: bool,
}

pub async fn scan(ctx: &Context, options: ScanOptions) -> Result<()> {
    let frame = image::open(&options.image).map_err(|source| PipelineError::ImageLoad {
        path: options.image.clone(),
        source,
    })?;

    let recognizer = TesseractCli::locate(ctx.config.checked_engine_path()?)?;
    let mut config = ctx.config.clone();
    if options.raw {
        config.preprocess = false;
    }
    let pipeline = RosterPipeline::new(recognizer, &config);

    let run = match options.team {
        Some(team) => pipeline.run_whole(&frame, team)?,
        None => pipeline.run(&frame, &config.regions.specs()?)?,
    };
    for (region, err) in run.failures() {
        eprintln!("warning: region `{}`: {}", region, err);
    }

    let output_dir = options
        .output_dir
        .unwrap_or_else(|| config.output_dir.clone());
    let mut roster = ctx.load_roster(&output_dir)?;
    run.apply_to(&mut roster);

    for (team, result) in run.write_outputs(&output_dir) {
        match result {
            Ok(path) => info!(team = %team, path = %path.display(), "names written"),
            Err(e) => eprintln!("error: could not save {}: {}", team, e),
        }
    }
    if options.save_crops {
        for (team, result) in run.save_crops(&output_dir) {
            match result {
                Ok(path) => println!("Saved {} crop to {}", team, path.display()),
                Err(e) => eprintln!("error: could not save {} crop: {}", team, e),
            }
        }
    }

    let enrichment = if options.enrich {
        enrich_roster(&ctx.config, &mut roster, false).await
    } else {
        Ok(None)
    };
    ctx.save_registry(roster.friends())?;

    let (report, enrich_error) = settle_enrichment(enrichment);
    info!(
        regions_extracted = run.regions_extracted(),
        names_recognized = run.names_recognized(),
        found = report.found,
        not_found = report.not_found,
        failed = report.failed,
        "run complete"
    );

    print_match(&roster, &ctx.config.username);
    match enrich_error {
        Some(err) => Err(err.context("stats were not fetched; run `rosterscan enrich` to retry")),
        None => Ok(()),
    }
}

/// Split an enrichment outcome so the scan can still be saved and shown
/// before a failed lookup is reported
fn settle_enrichment(
    enrichment: Result<Option<EnrichmentReport>>,
) -> (EnrichmentReport, Option<anyhow::Error>) {
    match enrichment {
        Ok(report) => (report.unwrap_or_default(), None),
        Err(err) => (EnrichmentReport::default(), Some(err)),
    }
}

pub async fn enrich(ctx: &Context, all: bool) -> Result<()> {
    let mut roster = ctx.load_roster(&ctx.config.output_dir)?;
    enrich_roster(&ctx.config, &mut roster, all).await?;
    ctx.save_registry(roster.friends())?;
    print_match(&roster, &ctx.config.username);
    Ok(())
}

async fn enrich_roster(
    config: &AppConfig,
    roster: &mut Roster,
    all: bool,
) -> Result<Option<EnrichmentReport>> {
    let names = lookup_names(roster, &config.username, all);
    if names.is_empty() {
        println!("Nobody to look up.");
        return Ok(None);
    }

    let credentials = Credentials::from_env()?;
    let session = LeaderboardClient::new(LeaderboardConfig::from(&config.enrichment))?
        .login(&credentials)
        .await
        .context("leaderboard login failed")?;

    let engine = EnrichmentEngine::new(Arc::new(session), &config.enrichment);
    let shared = Arc::new(SharedRegistry::new(std::mem::take(roster.friends_mut())));
    let report = engine.enrich(&names, &shared).await;

    *roster.friends_mut() = match Arc::try_unwrap(shared) {
        Ok(shared) => shared.into_inner(),
        Err(shared) => shared.snapshot(),
    };
    roster.refresh_stats();

    println!(
        "Stats: {} found, {} not found, {} failed",
        report.found, report.not_found, report.failed
    );
    if report.failed > 0 {
        warn!(
            failed = report.failed,
            "some lookups failed; run `rosterscan enrich` again later"
        );
    }
    Ok(Some(report))
}

/// Names to fetch: the match (or the whole registry) plus the user
fn lookup_names(roster: &Roster, username: &str, all: bool) -> Vec<String> {
    let mut names = if all {
        roster.friends().names()
    } else {
        roster.match_names()
    };
    if !username.is_empty() && !names.iter().any(|n| n == username) {
        names.push(username.to_string());
    }
    names
}

pub fn show(ctx: &Context) -> Result<()> {
    let roster = ctx.load_roster(&ctx.config.output_dir)?;
    print_match(&roster, &ctx.config.username);
    Ok(())
}

pub fn clear(ctx: &Context) -> Result<()> {
    let removed = output::clear_team_files(&ctx.config.output_dir)?;
    if removed.is_empty() {
        println!("No match to clear.");
    } else {
        for path in removed {
            println!("Removed {}", path.display());
        }
    }
    Ok(())
}

fn friend_line(name: &str, marker: &str, summary: &str) -> String {
    if summary.is_empty() {
        format!("  {}{}", name, marker)
    } else {
        format!("  {}{}: {}", name, marker, summary)
    }
}

/// The match listing: the user's own entry, both teams by rank, then
/// everyone else in the registry
fn match_lines(roster: &Roster, username: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let user = Some(username)
        .filter(|name| !name.is_empty())
        .and_then(|name| roster.friends().get(name));
    if let Some(entry) = user {
        lines.push("Your Stats".to_string());
        lines.push(friend_line(username, "", &entry.summary()));
        lines.push(String::new());
    }

    for team in Team::ALL {
        lines.push(team.to_string());
        let entries = roster.sorted_team(team);
        if entries.is_empty() {
            lines.push("  (empty)".to_string());
        }
        for entry in entries {
            let marker = if !username.is_empty() && entry.name == username {
                " (you)"
            } else {
                ""
            };
            let summary = roster
                .friends()
                .get(&entry.name)
                .map(|f| f.summary())
                .unwrap_or_default();
            lines.push(friend_line(&entry.name, marker, &summary));
        }
        lines.push(String::new());
    }

    for name in roster.cross_team_duplicates() {
        lines.push(format!("warning: {} is listed on both teams", name));
    }

    let others: Vec<_> = roster
        .other_friends()
        .into_iter()
        .filter(|(name, _)| user.is_none() || *name != username)
        .collect();
    if !others.is_empty() {
        lines.push("Other friends".to_string());
        for (name, entry) in others {
            lines.push(friend_line(name, "", &entry.summary()));
        }
    }
    lines
}

fn print_match(roster: &Roster, username: &str) {
    for line in match_lines(roster, username) {
        println!("{}", line);
    }
}

/// Put a player the recognizer missed into the current match
pub fn add_player(ctx: &Context, team: Team, name: &str) -> Result<()> {
    let output_dir = &ctx.config.output_dir;
    let mut roster = ctx.load_roster(output_dir)?;
    roster.add_manual(team, name)?;

    let names: Vec<String> = roster.team(team).iter().map(|e| e.name.clone()).collect();
    output::write_team_file(output_dir, team, &names)?;
    ctx.save_registry(roster.friends())?;
    println!("Added {} to {}", name.trim(), team);
    Ok(())
}

pub fn friends_list(ctx: &Context, query: Option<&str>) -> Result<()> {
    let roster = Roster::new(ctx.load_registry()?);
    let listed = match query {
        Some(q) => roster.matches(q),
        None => roster.friends().ranked(),
    };
    if listed.is_empty() {
        println!("No friends found.");
    }
    for (name, entry) in listed {
        let summary = entry.summary();
        if summary.is_empty() {
            println!("{}", name);
        } else {
            println!("{}: {}", name, summary);
        }
    }
    Ok(())
}

pub fn friends_add(ctx: &Context, name: &str, notes: &str) -> Result<()> {
    let mut registry = ctx.load_registry()?;
    registry.add(name, notes)?;
    ctx.save_registry(&registry)?;
    println!("Added {}", name.trim());
    Ok(())
}

pub fn friends_edit(
    ctx: &Context,
    name: &str,
    notes: Option<&str>,
    rename: Option<&str>,
) -> Result<()> {
    if notes.is_none() && rename.is_none() {
        bail!("nothing to change; pass --notes and/or --rename");
    }
    let mut registry = ctx.load_registry()?;
    if let Some(notes) = notes {
        registry.set_notes(name, notes)?;
    }
    if let Some(new_name) = rename {
        registry.rename(name, new_name)?;
    }
    ctx.save_registry(&registry)?;
    println!("Updated {}", rename.unwrap_or(name).trim());
    Ok(())
}

pub fn friends_remove(ctx: &Context, name: &str) -> Result<()> {
    let mut registry = ctx.load_registry()?;
    registry.remove(name)?;
    ctx.save_registry(&registry)?;
    println!("Removed {}", name);
    Ok(())
}

pub fn regions_show(ctx: &Context) -> Result<()> {
    for team in Team::ALL {
        match ctx.config.regions.get(team) {
            Some(rect) => println!("{:<10} {}", team.region_id(), rect),
            None => println!("{:<10} (not set)", team.region_id()),
        }
    }
    Ok(())
}

pub fn regions_set(
    mut ctx: Context,
    team: Team,
    [left, top, right, bottom]: [u32; 4],
) -> Result<()> {
    let rect = RegionBox::new(left, top, right, bottom)?;
    ctx.config.regions.set(team, rect);
    ctx.save_config()?;
    println!("{} region set to {}", team, rect);
    Ok(())
}

pub fn config_show(ctx: &Context) -> Result<()> {
    println!("# {}", ctx.config_path.display());
    println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    Ok(())
}

pub fn config_init(ctx: &Context, force: bool) -> Result<()> {
    if ctx.config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            ctx.config_path.display()
        );
    }
    AppConfig::default().save(&ctx.config_path)?;
    println!("Wrote default config to {}", ctx.config_path.display());
    Ok(())
}

pub fn config_set_engine(mut ctx: Context, path: PathBuf) -> Result<()> {
    if !path.exists() {
        return Err(core_pipeline::ConfigError::EnginePathMissing(path).into());
    }
    let engine = TesseractCli::locate(Some(&path))?;
    let version = engine.version().unwrap_or_else(|e| format!("unknown ({})", e));

    ctx.config.engine_path = Some(path);
    ctx.save_config()?;
    println!("Using {} ({})", engine.executable().display(), version);
    Ok(())
}

pub fn check_engine(ctx: &Context) -> Result<()> {
    let engine = TesseractCli::locate(ctx.config.checked_engine_path()?)?;
    let version = engine.version()?;
    println!("{}: {}", engine.executable().display(), version);
    Ok(())
}
