use std::sync::Arc;

use crate::{
    config::Config,
    database::RecipeDatabase,
    infrastructure::{middleware::HasDatabase, LocalMediaStorage, MediaStorage},
    services::{CatalogService, RecipeService, RelationService, ShoppingListService, UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub database: Arc<RecipeDatabase>,
    pub media: Arc<LocalMediaStorage>,
    pub catalog: CatalogService,
    pub recipes: RecipeService,
    pub relations: RelationService,
    pub shopping_list: ShoppingListService,
    pub users: UserService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let database = RecipeDatabase::new(&config.database).await?;
        database.init().await?;
        Ok(Self::from_parts(config, Arc::new(database)))
    }

    /// Wire services over an already initialised database
    pub fn from_parts(config: Config, database: Arc<RecipeDatabase>) -> Self {
        let media = Arc::new(LocalMediaStorage::new(&config.media));
        let storage: Arc<dyn MediaStorage> = media.clone();

        Self {
            catalog: CatalogService::new(database.clone()),
            recipes: RecipeService::new(database.clone(), storage.clone(), config.limits.clone()),
            relations: RelationService::new(database.clone(), storage.clone()),
            shopping_list: ShoppingListService::new(database.clone()),
            users: UserService::new(database.clone(), storage),
            media,
            database,
            config,
        }
    }
}

impl HasDatabase for AppState {
    fn database(&self) -> &RecipeDatabase {
        &self.database
    }
}
