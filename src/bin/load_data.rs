// Catalog loader
//
// Usage:
//   load_data ingredients <path/to/ingredients.csv>
//   load_data tags <path/to/tags.csv>

use std::path::PathBuf;

use foodgram::{
    config::Config,
    data_seeder::{load_ingredients_csv, load_tags_csv},
    database::RecipeDatabase,
    infrastructure::logging,
    services::CatalogService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let mut args = std::env::args().skip(1);
    let (kind, path) = match (args.next(), args.next()) {
        (Some(kind), Some(path)) => (kind, PathBuf::from(path)),
        _ => anyhow::bail!("usage: load_data <ingredients|tags> <csv file>"),
    };

    let config = Config::from_env()?;
    let database = RecipeDatabase::new(&config.database).await?;
    database.init().await?;
    let catalog = CatalogService::new(std::sync::Arc::new(database));

    let report = match kind.as_str() {
        "ingredients" => load_ingredients_csv(&catalog, &path).await?,
        "tags" => load_tags_csv(&catalog, &path).await?,
        other => anyhow::bail!("unknown catalog '{}', expected ingredients or tags", other),
    };

    tracing::info!(
        catalog = %kind,
        path = %path.display(),
        loaded = report.loaded,
        skipped = report.skipped,
        "load finished"
    );
    Ok(())
}
