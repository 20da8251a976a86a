// Storemark library: text watermarks for storefront listing images

pub mod api; // Storefront REST client
pub mod config;
pub mod logging;
pub mod watermark;
