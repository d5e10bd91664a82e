// Infrastructure shared by the HTTP layer and the services
pub mod logging;               // Tracing subscriber setup
pub mod media;                 // Recipe image storage
pub mod middleware;            // Viewer context middleware and extractor
pub mod security;              // Password hashing and token lookup
pub mod viewer;                // Viewer context

pub use media::{LocalMediaStorage, MediaStorage};
pub use middleware::Vc;
pub use viewer::ViewerContext;
