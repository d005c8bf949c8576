//! HTTP handlers for the Agrocast API

pub mod forecast;
pub mod health;
pub mod trends;

pub use forecast::{get_crop_forecast, get_field_forecast};
pub use health::health_check;
pub use trends::get_weather_trends;
