use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use tokio::sync::watch;
use tracing::{error, info};

use storybook::cli::{parse_args, usage, CliCommand};
use storybook::config::Config;
use storybook::db::models::NewChild;
use storybook::db::Database;
use storybook::jobs::{JobHandle, JobWorker, StoryJobQueue};
use storybook::llm::build_generator;
use storybook::story::models::{decode_image, ProfileParameters};
use storybook::story::StoryPipeline;
use storybook::utils::logging::init_logging;

fn demo_profile() -> ProfileParameters {
    ProfileParameters {
        age_range: "4-6".to_string(),
        sex: "Female".to_string(),
        eye_color: "Brown".to_string(),
        hair_type: "Curly".to_string(),
        hair_color: "Black".to_string(),
        ethnicity: "Medium".to_string(),
        fav_animals: Some("foxes and owls".to_string()),
        fav_activities: Some("building blanket forts".to_string()),
        fav_shows: None,
    }
}

fn build_pipeline(config: &Config, db: &Arc<Database>) -> Result<StoryPipeline> {
    let mode = config.generation_mode()?;
    info!("Generation mode: {}", mode.label());
    let generator = build_generator(mode, &config.openai_base_url);
    Ok(StoryPipeline::new(generator, db.clone(), db.clone())
        .with_text_options(config.text_options())
        .with_image_options(config.image_options())
        .with_timeout(config.generation_timeout()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_image(path: &Path, encoded: &str) -> Result<()> {
    let bytes = decode_image(encoded).ok_or_else(|| anyhow!("stored image is not valid base64"))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

async fn run_worker(config: &Config, db: Arc<Database>, once: bool) -> Result<()> {
    let pipeline = build_pipeline(config, &db)?;
    let worker =
        JobWorker::new(db, pipeline, config.job_poll_interval()).with_lease(config.job_lease());
    if once {
        let processed = worker.run_once().await?;
        info!("Worker pass finished, job processed: {processed}");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {err}");
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });
    worker.run(shutdown_rx).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_args(&args)?;
    if command == CliCommand::Help {
        println!("{}", usage());
        return Ok(());
    }

    let config = Config::load()?;
    let _guards = init_logging(&config.logs_dir, &config.log_level);

    let db = Arc::new(Database::init(&config.database_url).await?);

    match command {
        CliCommand::InitDb => {
            db.health_check().await?;
            println!("Database ready at {}", config.database_url);
        }
        CliCommand::AddDemoChild { name } => {
            let child_id = db
                .insert_child(&NewChild::from_profile(&name, &demo_profile()))
                .await?;
            println!("{child_id}");
        }
        CliCommand::Generate(request) => {
            let pipeline = build_pipeline(&config, &db)?;
            let payload = pipeline.generate_story(&request).await?;
            print_json(&payload)?;
        }
        CliCommand::Submit(request) => {
            let handle = StoryJobQueue::new(db.clone()).submit(&request).await?;
            print_json(&handle)?;
        }
        CliCommand::Status { job_id } => {
            let outcome = StoryJobQueue::new(db.clone())
                .fetch_result(&JobHandle { job_id })
                .await?;
            print_json(&outcome)?;
        }
        CliCommand::Worker { once } => run_worker(&config, db, once).await?,
        CliCommand::ShowStory {
            story_id,
            export_dir,
        } => {
            let story = db.get_story(&story_id).await?;
            println!("{}\n", story.title);
            for chapter in &story.chapters {
                println!("Chapter {}: {}\n{}\n", chapter.order, chapter.title, chapter.content);
            }
            if let Some(dir) = export_dir {
                for chapter in &story.chapters {
                    let path = dir.join(format!("chapter_{}.png", chapter.order));
                    write_image(&path, &chapter.image)?;
                }
                println!("Exported {} images to {}", story.chapters.len(), dir.display());
            }
        }
        CliCommand::ListStories { child_id } => {
            let stories = db.list_child_stories(&child_id).await?;
            print_json(&stories)?;
        }
        CliCommand::ProfileImage { child_id, output } => {
            let pipeline = build_pipeline(&config, &db)?;
            let image = pipeline.illustrate_profile(&child_id).await?;
            match output {
                Some(path) => {
                    write_image(&path, &image.encoded())?;
                    println!("Wrote {} ({})", path.display(), image.mime_type);
                }
                None => println!("Stored {} profile image for {child_id}", image.mime_type),
            }
        }
        CliCommand::Help => println!("{}", usage()),
    }

    Ok(())
}
