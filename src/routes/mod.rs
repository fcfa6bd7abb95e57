pub mod auth;
pub mod comments;
pub mod resources;
pub mod users;

pub use auth::auth_routes;
pub use comments::comments_routes;
pub use resources::resources_routes;
pub use users::users_routes;
