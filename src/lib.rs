pub mod aqi_pipeline;
pub mod logger;
