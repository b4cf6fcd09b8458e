pub mod catalog_routes;
pub mod entry_routes;
pub mod tag_routes;
