use glor_core::models::split_by_status;
use glor_core::{Crud, Game, GamesSummary, News};
use serde::Serialize;

use super::{Context, OutputFormat};

#[derive(Serialize)]
struct NewsCounts {
    published: usize,
    drafts: usize,
}

#[derive(Serialize)]
struct Dashboard {
    games: GamesSummary,
    news: NewsCounts,
}

/// Prints the games summary plus article counts. Read-only, so no login
/// is needed.
pub async fn show_dashboard(
    ctx: &Context,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let games: Crud<Game> = Crud::new(ctx.store());
    let news: Crud<News> = Crud::new(ctx.store());
    let (games, news) = tokio::try_join!(games.refresh(), news.refresh())?;

    let (drafts, published) = split_by_status(&news);
    let dashboard = Dashboard {
        games: GamesSummary::from_games(&games),
        news: NewsCounts {
            published: published.len(),
            drafts: drafts.len(),
        },
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dashboard)?),
        OutputFormat::Text => {
            print!("{}", dashboard.games);
            println!(
                "\nNews: {} published, {} draft(s)",
                dashboard.news.published, dashboard.news.drafts
            );
        }
    }
    Ok(())
}
