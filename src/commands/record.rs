//! `glor game|hero|about|news ...`: the same CRUD commands for every
//! collection, driven by the shared [`Crud`] controller.

use clap::{Args, Subcommand, ValueEnum};
use glor_core::{
    AboutBlock, Crud, Entity, Game, HeroContent, News, NewsStatus, Record, Snapshot,
    StoreError, ValidationError, ValidationReason,
};
use std::fmt::Display;
use tokio::sync::mpsc;

use super::{confirm, truncate, Context, OutputFormat};

/// How a record type shows up in list output.
pub trait Listing: Entity + Display {
    /// Singular name used in messages.
    const LABEL: &'static str;
    /// Plural name used in messages.
    const PLURAL: &'static str;

    /// Main column of the list view.
    fn headline(&self) -> String;

    /// Secondary column of the list view.
    fn detail(&self) -> String;

    /// Publication state, for types that have one.
    fn status(&self) -> Option<NewsStatus> {
        None
    }
}

impl Listing for Game {
    const LABEL: &'static str = "game";
    const PLURAL: &'static str = "games";

    fn headline(&self) -> String {
        self.title.clone()
    }

    fn detail(&self) -> String {
        format!("{:<10} {:>4}  {}", self.category, self.rating, self.release_date)
    }
}

impl Listing for HeroContent {
    const LABEL: &'static str = "hero content";
    const PLURAL: &'static str = "hero content entries";

    fn headline(&self) -> String {
        self.title.clone()
    }

    fn detail(&self) -> String {
        self.video_url.clone()
    }
}

impl Listing for AboutBlock {
    const LABEL: &'static str = "about block";
    const PLURAL: &'static str = "about blocks";

    fn headline(&self) -> String {
        self.docs.clone()
    }

    fn detail(&self) -> String {
        self.description.clone()
    }
}

impl Listing for News {
    const LABEL: &'static str = "news article";
    const PLURAL: &'static str = "news articles";

    fn headline(&self) -> String {
        if self.title.is_empty() {
            "(No title)".to_string()
        } else {
            self.title.clone()
        }
    }

    fn detail(&self) -> String {
        let modified = self
            .last_modified()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("{:<10} {}", self.status, modified)
    }

    fn status(&self) -> Option<NewsStatus> {
        Some(self.status)
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    Draft,
    Published,
}

impl From<StatusFilter> for NewsStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Draft => NewsStatus::Draft,
            StatusFilter::Published => NewsStatus::Published,
        }
    }
}

#[derive(Args)]
pub struct RecordCommand {
    #[command(subcommand)]
    pub command: RecordSubcommand,
}

#[derive(Subcommand)]
pub enum RecordSubcommand {
    /// List all records
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Only show articles with this status (news only)
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
    },

    /// Show one record
    Show {
        /// Record ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a record
    Add {
        /// Field value (can be repeated)
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },

    /// Change fields of an existing record
    Edit {
        /// Record ID
        id: String,

        /// Field value (can be repeated)
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },

    /// Delete a record
    Delete {
        /// Record ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Print the list again whenever it changes
    Watch {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Parses `field=value`. The value may be empty or contain `=`.
fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected FIELD=VALUE, got '{}'", raw)),
    }
}

impl RecordCommand {
    pub async fn run<T: Listing>(&self, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
        let crud: Crud<T> = Crud::new(ctx.store());

        match &self.command {
            RecordSubcommand::List { format, status } => {
                let snapshot = crud.refresh().await?;
                let records = filter_status(&snapshot, *status)?;

                if records.is_empty() {
                    println!("No {} found", T::PLURAL);
                    return Ok(());
                }
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
                    OutputFormat::Text => print_table(&records),
                }
                Ok(())
            }

            RecordSubcommand::Show { id, format } => {
                let record = crud.get(id).await?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
                    OutputFormat::Text => {
                        println!("ID: {}", record.id);
                        println!("{}", record.data);
                    }
                }
                Ok(())
            }

            RecordSubcommand::Add { set } => {
                ctx.require_user()?;
                apply(&crud, set)?;

                let id = crud.add().await?;
                println!("Created {}: {}", T::LABEL, id);
                if let Some(record) = crud.current().find(&id) {
                    println!("{}", record.data);
                }
                Ok(())
            }

            RecordSubcommand::Edit { id, set } => {
                ctx.require_user()?;
                if set.is_empty() {
                    return Err("Nothing to change. Pass at least one --set FIELD=VALUE".into());
                }
                crud.edit_by_id(id).await?;
                apply(&crud, set)?;

                crud.save().await?;
                println!("Updated {}: {}", T::LABEL, id);
                if let Some(record) = crud.current().find(id) {
                    println!("{}", record.data);
                }
                Ok(())
            }

            RecordSubcommand::Delete { id, force } => {
                ctx.require_user()?;
                let record = crud.get(id).await?;

                if !force
                    && !confirm(&format!(
                        "Delete {} '{}'?",
                        T::LABEL,
                        record.data.headline()
                    ))?
                {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                crud.remove(id).await?;
                println!("Deleted {}: {}", T::LABEL, record.data.headline());
                Ok(())
            }

            RecordSubcommand::Watch { format } => {
                let format = format.clone();
                let (ended_tx, mut ended_rx) = mpsc::unbounded_channel();
                let mut handle = crud
                    .subscribe_with_errors(
                        move |snapshot: Snapshot<T>| print_update(&snapshot, &format),
                        move |e| {
                            if matches!(e, StoreError::Transport(_)) {
                                let _ = ended_tx.send(e);
                            }
                        },
                    )
                    .await?;

                eprintln!("Watching {}. Press Ctrl+C to stop.", T::PLURAL);
                let result: Result<(), Box<dyn std::error::Error>> = tokio::select! {
                    signal = tokio::signal::ctrl_c() => signal.map_err(Into::into),
                    Some(e) = ended_rx.recv() => {
                        Err(format!("Lost connection while watching {}: {}", T::PLURAL, e).into())
                    }
                };
                handle.unsubscribe();
                result
            }
        }
    }
}

fn print_update<T: Listing>(snapshot: &Snapshot<T>, format: &OutputFormat) {
    let records: Vec<&Record<T>> = snapshot.iter().collect();
    match format {
        OutputFormat::Json => match serde_json::to_string(&records) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!("Failed to encode update: {}", e),
        },
        OutputFormat::Text => {
            println!();
            if records.is_empty() {
                println!("No {} found", T::PLURAL);
            } else {
                print_table(&records);
            }
        }
    }
}

/// Applies `--set` pairs in order, stopping at the first rejected one.
fn apply<T: Listing>(crud: &Crud<T>, set: &[(String, String)]) -> Result<(), ValidationError> {
    for (field, value) in set {
        crud.set_field(field, value).inspect_err(|e| {
            if e.reason == ValidationReason::UnknownField {
                let fields: Vec<_> = T::schema().editable_fields().collect();
                eprintln!("Editable fields: {}", fields.join(", "));
            }
        })?;
    }
    Ok(())
}

fn filter_status<T: Listing>(
    snapshot: &Snapshot<T>,
    status: Option<StatusFilter>,
) -> Result<Vec<&Record<T>>, String> {
    let Some(filter) = status else {
        return Ok(snapshot.iter().collect());
    };
    let wanted = NewsStatus::from(filter);
    if T::default().status().is_none() {
        return Err(format!("{} have no status to filter by", T::PLURAL));
    }
    Ok(snapshot
        .iter()
        .filter(|record| record.data.status() == Some(wanted))
        .collect())
}

fn print_table<T: Listing>(records: &[&Record<T>]) {
    println!("{:<36}  {:<30}  DETAILS", "ID", "TITLE");
    println!("{}", "-".repeat(90));
    for record in records {
        println!(
            "{:<36}  {:<30}  {}",
            record.id,
            truncate(&record.data.headline(), 30),
            truncate(&record.data.detail(), 40)
        );
    }
    println!("\nTotal: {} {}", records.len(), T::PLURAL);
}
