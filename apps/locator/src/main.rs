use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, load_settings_from},
    ClientEvent, EntityDirectory, LocatorClient, NoticeLevel, SearchOutcome,
};
use shared::{
    domain::{directions_url, format_distance, Denomination, EntityId, LatLng},
    protocol::{Entity, EntityPayload},
};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Search and maintain the places of worship directory")]
struct Cli {
    /// Overrides the api url from settings and environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Settings file; defaults to ./locator.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print a plain listing instead of the map render plan as JSON.
    #[arg(long)]
    plain: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the baseline listing.
    List,
    Get {
        id: i64,
    },
    /// Free-text search by name, address or denomination.
    Search {
        query: String,
        #[arg(long)]
        select: Option<i64>,
    },
    /// Places within a radius of a point, nearest first.
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Search radius in kilometres.
        #[arg(long, default_value_t = 5.0)]
        radius: f64,
    },
    Add {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[command(flatten)]
        fields: EntityFields,
    },
    Update {
        id: i64,
        #[command(flatten)]
        fields: EntityFields,
    },
    Delete {
        id: i64,
    },
}

#[derive(clap::Args, Debug, Default)]
struct EntityFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    denomination: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    website: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

impl EntityFields {
    fn apply(self, payload: &mut EntityPayload) {
        if let Some(name) = self.name {
            payload.name = Some(name);
        }
        if let Some(denomination) = self.denomination {
            payload.denomination = Some(Denomination::from(denomination));
        }
        if let Some(address) = self.address {
            payload.address = Some(address);
        }
        if let Some(phone) = self.phone {
            payload.phone = Some(phone);
        }
        if let Some(website) = self.website {
            payload.website = Some(website);
        }
        if let Some(description) = self.description {
            payload.description = Some(description);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings(),
    };
    if let Some(api_url) = cli.api_url.clone() {
        settings.api_url = api_url;
    }
    settings.validate()?;
    info!(api_url = %settings.api_url, collection = %settings.collection, "locator: starting");

    let client = LocatorClient::connect(settings).context("failed to build directory client")?;
    let mut events = client.subscribe_events();

    let outcome = run(&client, cli.command, cli.plain).await;
    print_notices(&mut events);
    if let Err(err) = &outcome {
        error!(error = %err, "locator: command failed");
    }
    outcome
}

async fn run(client: &Arc<LocatorClient>, command: Command, plain: bool) -> Result<()> {
    match command {
        Command::List => {
            client.refresh_baseline().await?;
            print_display(client, plain).await?;
        }
        Command::Get { id } => {
            let entity = client.directory().get(EntityId(id)).await?;
            println!("{}", serde_json::to_string_pretty(&entity)?);
        }
        Command::Search { query, select } => {
            let outcome = client.run_text_search(&query).await?;
            if !report_outcome(&outcome) {
                return Ok(());
            }
            if let Some(id) = select {
                client.on_marker_clicked(EntityId(id)).await;
                client.center_on_entity(EntityId(id)).await;
            }
            print_display(client, plain).await?;
        }
        Command::Nearby {
            lat,
            lng,
            radius,
        } => {
            let outcome = client
                .run_proximity_search(Some(LatLng { lat, lng }), radius)
                .await?;
            if report_outcome(&outcome) {
                print_display(client, plain).await?;
            }
        }
        Command::Add { lat, lng, fields } => {
            client.set_add_mode(true).await;
            let location = client
                .on_map_clicked(LatLng { lat, lng })
                .await?
                .ok_or_else(|| anyhow!("add mode did not capture a location"))?;
            let mut payload = EntityPayload::at(location);
            fields.apply(&mut payload);
            let created = client.submit_entry(payload).await?;
            println!("created id={}", created.id);
        }
        Command::Update { id, fields } => {
            let entity = client.begin_edit(EntityId(id)).await?;
            let Some(mut payload) = entity.to_payload() else {
                client.cancel_entry().await;
                return Err(anyhow!("entity {id} has no valid location"));
            };
            fields.apply(&mut payload);
            let updated = client.submit_entry(payload).await?;
            println!("updated id={}", updated.id);
        }
        Command::Delete { id } => {
            client.begin_edit(EntityId(id)).await?;
            client.delete_editing().await?;
            println!("deleted id={id}");
        }
    }
    Ok(())
}

/// Returns whether the outcome was applied to the coordinator.
fn report_outcome(outcome: &SearchOutcome) -> bool {
    match outcome.results() {
        Some(results) => {
            if results.is_empty() {
                eprintln!("no matches");
            }
            true
        }
        None => {
            eprintln!("search {} was superseded", outcome.request_id().0);
            false
        }
    }
}

async fn print_display(client: &LocatorClient, plain: bool) -> Result<()> {
    if !plain {
        let plan = client.render_plan().await;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let display = client.display_set().await;
    if display.is_empty() {
        println!("no entities");
        return Ok(());
    }
    for entity in display.iter() {
        println!("{}", describe(entity));
    }
    Ok(())
}

fn describe(entity: &Entity) -> String {
    let mut line = format!("{:>6}  {}", entity.id.0, entity.display_name());
    if let Some(denomination) = &entity.denomination {
        line.push_str(&format!(" ({denomination})"));
    }
    if let Some(distance) = entity.distance_meters {
        line.push_str(&format!("  {}", format_distance(distance)));
    }
    if let Some(location) = entity.location() {
        line.push_str(&format!("  {}", directions_url(location)));
    }
    line
}

fn print_notices(events: &mut broadcast::Receiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::Notice(notice) = event {
            let tag = match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Success => "ok",
                NoticeLevel::Warning => "warn",
                NoticeLevel::Error => "error",
            };
            eprintln!("[{tag}] {}: {}", notice.title, notice.description);
        }
    }
}
