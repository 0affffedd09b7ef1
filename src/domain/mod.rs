pub mod classification;
pub mod models;
pub mod nps;
pub mod timeout;
