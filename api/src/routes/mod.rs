pub mod bundle_route;
pub mod search;
