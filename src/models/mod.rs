// Row types read with sqlx and the JSON shapes served over HTTP

pub mod catalog;
pub mod recipe;
pub mod user;

pub use catalog::{Ingredient, Tag};
pub use recipe::{
    IngredientAmount, RecipeFilter, RecipeIngredientLine, RecipeResponse, RecipeRow, RecipeShort,
    RecipeWriteRequest,
};
pub use user::{
    CreateUserRequest, CreatedUserResponse, SetPasswordRequest, SubscriptionResponse, UserResponse,
    UserRow,
};

pub type UserId = i64;
pub type RecipeId = i64;
pub type IngredientId = i64;
pub type TagId = i64;
