pub mod cache;
pub mod postgrest;
pub mod state;
pub mod tenant;

pub use cache::{InMemoryCache, SharedCache};
pub use postgrest::{DbError, PostgrestClient};
pub use state::AppState;
pub use tenant::{TenantDirectory, TenantHandle};
