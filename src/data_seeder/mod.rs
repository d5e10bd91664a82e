// Catalog seeding from CSV files.
//
// ingredients.csv: `name,measurement_unit`
// tags.csv:        `name,color,slug`
//
// A leading header row is skipped when its first column is `name`.

use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;

use crate::{
    error::{AppError, AppResult},
    services::CatalogService,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub loaded: usize,
    pub skipped: usize,
}

pub async fn load_ingredients_csv(catalog: &CatalogService, path: &Path) -> AppResult<SeedReport> {
    let rows = read_rows(open(path)?, 2)?;
    let mut report = SeedReport::default();

    for (line, row) in rows {
        match catalog.create_ingredient(&row[0], &row[1]).await {
            Ok(_) => report.loaded += 1,
            Err(AppError::Validation(errors)) => {
                tracing::warn!(line, ?errors, "skipping invalid ingredient row");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(loaded = report.loaded, skipped = report.skipped, "ingredients loaded");
    Ok(report)
}

/// Existing slugs are left untouched and counted as skipped
pub async fn load_tags_csv(catalog: &CatalogService, path: &Path) -> AppResult<SeedReport> {
    let rows = read_rows(open(path)?, 3)?;
    let mut report = SeedReport::default();

    for (line, row) in rows {
        match catalog.create_tag(&row[0], &row[1], &row[2]).await {
            Ok(_) => report.loaded += 1,
            Err(AppError::Validation(errors)) => {
                tracing::warn!(line, ?errors, "skipping tag row");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(loaded = report.loaded, skipped = report.skipped, "tags loaded");
    Ok(report)
}

fn open(path: &Path) -> AppResult<std::fs::File> {
    std::fs::File::open(path)
        .map_err(|e| AppError::Internal(format!("Failed to open {}: {}", path.display(), e)))
}

/// Parse rows with at least `columns` fields, trimmed, paired with their 1-based line number
fn read_rows<R: Read>(source: R, columns: usize) -> AppResult<Vec<(u64, Vec<String>)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| AppError::BadRequest(format!("Malformed CSV: {}", e)))?;
        let line = record.position().map(|p| p.line()).unwrap_or(index as u64 + 1);

        if index == 0 && record.get(0).is_some_and(|v| v.eq_ignore_ascii_case("name")) {
            continue;
        }
        if record.len() < columns {
            return Err(AppError::BadRequest(format!(
                "Line {}: expected {} columns, found {}",
                line,
                columns,
                record.len()
            )));
        }
        rows.push((line, record.iter().take(columns).map(str::to_string).collect()));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::RecipeDatabase;
    use std::io::Write;
    use std::sync::Arc;

    async fn catalog() -> CatalogService {
        CatalogService::new(Arc::new(RecipeDatabase::new_in_memory().await.unwrap()))
    }

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_header_row_is_skipped() {
        let rows = read_rows("name,measurement_unit\nSalt,g\n".as_bytes(), 2).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, vec!["Salt", "g"]);

        let rows = read_rows("Salt,g\nSugar, g \n".as_bytes(), 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].1[1], "g");
    }

    #[test]
    fn test_short_row_is_rejected() {
        assert!(read_rows("Salt\n".as_bytes(), 2).is_err());
    }

    #[tokio::test]
    async fn test_ingredient_load_is_idempotent() {
        let catalog = catalog().await;
        let file = csv_file("name,measurement_unit\nSalt,g\nFlour,g\nMilk,ml\n");

        let first = load_ingredients_csv(&catalog, file.path()).await.unwrap();
        assert_eq!(first.loaded, 3);
        load_ingredients_csv(&catalog, file.path()).await.unwrap();

        assert_eq!(catalog.list_ingredients(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tag_load_skips_existing() {
        let catalog = catalog().await;
        let file = csv_file("Breakfast,#E26C2D,breakfast\nLunch,#49B64E,lunch\n");

        let first = load_tags_csv(&catalog, file.path()).await.unwrap();
        assert_eq!(first, SeedReport { loaded: 2, skipped: 0 });

        let second = load_tags_csv(&catalog, file.path()).await.unwrap();
        assert_eq!(second, SeedReport { loaded: 0, skipped: 2 });
    }
}
