// Business logic: every function takes the viewer explicitly and talks to SQLite through sqlx

pub mod catalog_service;
pub mod recipe_service;
pub mod relation_service;
pub mod shopping_list;
pub mod user_service;

pub use catalog_service::CatalogService;
pub use recipe_service::RecipeService;
pub use relation_service::{RecipeRelation, RelationService};
pub use shopping_list::{ShoppingItem, ShoppingList, ShoppingListService};
pub use user_service::UserService;
