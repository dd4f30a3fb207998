//! Infrastructure: HTTP client, settings, codecs

pub mod client;
pub mod settings;
pub mod util;
